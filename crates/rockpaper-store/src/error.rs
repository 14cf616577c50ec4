/// Errors that can occur in the store layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The client is not connected, so the operation was not attempted.
    #[error("store is offline")]
    Offline,

    /// The backend could not serve the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
