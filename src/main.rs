use drift_server::config::SimConfig;
use drift_server::net::serve;
use drift_server::state::SharedGameState;

use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drift_server=info".into()),
        )
        .init();

    info!("starting drift server");

    let config = SimConfig::load()?;
    let setup = config.setup()?;
    info!(
        mass = setup.vehicle.m,
        wheelbase = setup.vehicle.l,
        scale = setup.vehicle.scale_factor,
        tick_hz = config.server.tick_hz,
        "vehicle configured"
    );

    let state = Arc::new(Mutex::new(SharedGameState::new(setup)));

    let listener = TcpListener::bind(config.server.bind.as_str()).await?;
    tokio::spawn(serve(listener, Arc::clone(&state)));

    // Frame clock: every car gets one step per tick, dt taken from real time
    let mut ticker = interval(config.server.tick_period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let start = Instant::now();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = start.elapsed().as_secs_f64();
                let mut game = state.lock().await;
                game.step_all(now);
                game.broadcast_snapshot();
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}
