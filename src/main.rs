//! Gizmo Party Server
//!
//! Runs a loopback match: one server and two clients in one process, a
//! build phase followed by a timed round.

use anyhow::Context;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::info;
use tracing_subscriber::EnvFilter;

use gizmo_party::{
    BodyId, ClientId, GameConfig, GridPos, VERSION,
    core::hash::short_hex,
    game::{events::GameEvent, input::{InputFrame, ScriptedInput}},
    network::{Loopback, Session},
};

/// Runs toward the goal.
const RUNNER: ClientId = ClientId(1);
/// Stands still.
const IDLER: ClientId = ClientId(2);

/// Frame rate of the demo loop.
const FRAME_HZ: f64 = 60.0;
/// Round time limit in seconds.
const ROUND_SECONDS: f64 = 8.0;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => GameConfig::from_file(&path).with_context(|| format!("failed to load config from {}", path))?,
        None => GameConfig::default(),
    };

    info!("Gizmo Party Server v{}", VERSION);
    info!("Logic: {} Hz, physics: {} Hz", config.tick.logic_hz, config.tick.physics_hz);

    demo_match(config).await
}

/// Build phase and one round over the loopback transport.
async fn demo_match(config: GameConfig) -> anyhow::Result<()> {
    info!("=== Starting Demo Match ===");

    // Body ids are handed out in spawn order
    let mut runner_input = ScriptedInput::new();
    runner_input.push(BodyId(1), [InputFrame::with_movement(127).sprint()]);

    let mut net = Loopback::new(Session::server(config.clone()))?;
    net.add_client(Session::client(RUNNER, config.clone()).with_input(Box::new(runner_input)))?;
    net.add_client(Session::client(IDLER, config))?;

    let session_id = net.server_mut().start_clock()?;
    info!("Session: {}", session_id);

    let runner = net.server_mut().spawn_body(RUNNER)?;
    let idler = net.server_mut().spawn_body(IDLER)?;
    net.pump();

    // Build phase
    info!("=== Build Phase ===");
    net.server_mut().select_gizmo(RUNNER, "plank")?;
    net.server_mut().select_gizmo(IDLER, "spinning_saw")?;
    net.pump();

    net.client_mut(RUNNER)
        .context("runner session missing")?
        .request_placement(GridPos::new(2, 4), 0, "plank")?;
    net.client_mut(IDLER)
        .context("idler session missing")?
        .request_placement(GridPos::new(9, 6), 90, "spinning_saw")?;
    net.pump();

    let graph_hash = net.server().graph().state_hash();
    info!("Placed {} gizmos, graph {}", net.server().graph().len(), short_hex(&graph_hash));
    for id in net.client_ids().collect::<Vec<_>>() {
        if let Some(client) = net.client(id) {
            let converged = client.graph().state_hash() == graph_hash;
            info!("{} graph {} (converged: {})", id, short_hex(&client.graph().state_hash()), converged);
        }
    }

    // Round
    info!("=== Round ===");
    net.server_mut().start_round_hazards()?;
    for body in [runner, idler] {
        net.server_mut().respawn_body(body)?;
    }
    net.pump();

    let mut ticker = interval(Duration::from_secs_f64(1.0 / FRAME_HZ));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let started = Instant::now();
    let mut last = started;
    let mut next_report = 1.0;

    loop {
        ticker.tick().await;
        let now = Instant::now();
        net.advance((now - last).as_secs_f64());
        last = now;

        let mut round_over = false;
        for event in net.server_mut().drain_events() {
            match event {
                GameEvent::PlayerFinished { client, place } => info!("{} finished #{}", client, place),
                GameEvent::PlayerDied { client, cause } => info!("{} died: {:?}", client, cause),
                GameEvent::RoundOver => round_over = true,
                _ => {}
            }
        }

        let elapsed = (now - started).as_secs_f64();
        if elapsed >= next_report {
            let position = net.server().body_state(runner).map(|s| s.position);
            info!(
                "t={:.1}s runner at {:?}, bodies {}",
                elapsed,
                position,
                short_hex(&net.server().bodies_hash())
            );
            next_report += 1.0;
        }

        if round_over {
            info!("Round over after {:.2}s", elapsed);
            break;
        }
        if elapsed >= ROUND_SECONDS {
            info!("Round timed out");
            break;
        }
    }

    net.server_mut().stop_round_hazards()?;
    let scores = net.server_mut().score_round()?;
    net.pump();

    // Print final results
    info!("=== Round Results ===");
    for score in &scores {
        info!(
            "{}: +{} (finish {}, underdog {}, single {}, first {}, traps {})",
            score.client,
            score.total(),
            score.finish,
            score.underdog,
            score.single,
            score.first,
            score.traps
        );
    }
    for (client, points) in net.server().points().standings() {
        info!("{}: {} points", client, points);
    }
    info!("Messages delivered: {}", net.delivered());

    Ok(())
}
