//! Two scripted players on one in-memory backend.
//!
//! ```bash
//! cargo run -p duel
//! RUST_LOG=debug cargo run -p duel
//! ```

use std::time::Duration;

use rockpaper::prelude::*;
use tracing_subscriber::EnvFilter;

type Player = OnlineMatch<MemoryStore>;

/// Moves per round as `(host, guest)`. The second round is a tie.
const SCRIPT: [(Move, Move); 4] = [
    (Move::Rock, Move::Scissors),
    (Move::Paper, Move::Paper),
    (Move::Scissors, Move::Rock),
    (Move::Paper, Move::Rock),
];

#[tokio::main]
async fn main() -> Result<(), RockpaperError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let backend = MemoryBackend::new();
    let mut host = OnlineMatch::new(backend.connect(), Identity::generate().with_name("Ada"));
    let mut guest = OnlineMatch::new(backend.connect(), Identity::generate().with_name("Bo"));

    let code = host.host(3, TapBattleMode::TiesOnly).await?;
    tracing::info!(room = %code, "share this code");
    guest.join(code.as_str()).await?;
    settle(&mut host, &mut guest).await;

    for (round, (h, g)) in SCRIPT.into_iter().enumerate() {
        if host.phase() == MatchPhase::MatchOver {
            break;
        }
        host.submit_move(h).await?;
        guest.submit_move(g).await?;
        settle(&mut host, &mut guest).await;
        host.countdown_finished().await?;
        guest.countdown_finished().await?;

        if host.phase() == MatchPhase::TapBattle {
            // The guest is a little quicker on the draw.
            for _ in 0..12 {
                host.tap();
            }
            for _ in 0..14 {
                guest.tap();
            }
            finish_battle(&mut host).await;
            finish_battle(&mut guest).await;
            settle(&mut host, &mut guest).await;
        }

        let (host_score, guest_score) = host.machine().scores();
        tracing::info!(
            round = round + 1,
            outcome = ?host.machine().round_outcome(),
            flavor = host.machine().flavor_text().unwrap_or("-"),
            host_score,
            guest_score,
            "round over"
        );

        host.next_round().await?;
        guest.next_round().await?;
        settle(&mut host, &mut guest).await;
    }

    let winner = match host.machine().match_winner() {
        Some(Role::Host) => host.machine().host_name().to_string(),
        Some(Role::Guest) => host.machine().guest_name().to_string(),
        None => "nobody".to_string(),
    };
    tracing::info!(%winner, "match over");

    host.reset().await;
    guest.reset().await;
    Ok(())
}

/// Applies every room event already delivered to either player.
async fn settle(a: &mut Player, b: &mut Player) {
    for _ in 0..2 {
        drain(a).await;
        drain(b).await;
    }
}

async fn drain(player: &mut Player) {
    while let Ok(Some(_)) = tokio::time::timeout(Duration::from_millis(20), player.pump()).await {}
}

async fn finish_battle(player: &mut Player) {
    while player.tap_timer().is_armed() {
        if player.pump().await.is_none() {
            break;
        }
    }
}
