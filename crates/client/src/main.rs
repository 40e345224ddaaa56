mod driver;
mod geo;
mod handler;
mod net;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;

use locshare::session::{DEFAULT_MIN_MOVEMENT_M, DEFAULT_SERVER_URL, Role, SessionConfig};

use driver::Driver;
use net::{ClientConfig, Route};

#[derive(Parser)]
#[command(name = "locshare-client")]
#[command(about = "Real-time location sharing client")]
struct Args {
    #[arg(short, long, default_value = DEFAULT_SERVER_URL, help = "API base address (http, https, ws or wss)")]
    server: String,

    #[arg(short, long)]
    user: u64,

    #[arg(short, long = "room", required = true, help = "Room to join; repeat to watch several")]
    rooms: Vec<u64>,

    #[arg(long, default_value = "worker", help = "worker, normal or admin")]
    role: Role,

    #[arg(short, long, help = "Assignment to track once connected")]
    assignment: Option<u64>,

    #[arg(long, help = "JSON route for the simulated position source")]
    route: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_MIN_MOVEMENT_M, help = "Minimum movement in metres between updates")]
    min_movement: f64,

    #[arg(long, default_value_t = 30)]
    heartbeat_secs: u64,

    #[arg(long, default_value_t = 5)]
    max_reconnects: u32,

    #[arg(long, default_value_t = 2000)]
    watch_interval_ms: u64,

    #[arg(long, help = "Simulate a device that refuses continuous watching")]
    no_watch: bool,

    #[arg(long, help = "Chat message to send after connecting")]
    say: Option<String>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<ClientConfig> {
        if !(self.min_movement.is_finite() && self.min_movement >= 0.0) {
            anyhow::bail!("--min-movement must be a non-negative number");
        }

        let route = match &self.route {
            Some(path) => Route::load(path)?,
            None => Route::default(),
        };

        let mut rooms = self.rooms;
        rooms.sort_unstable();
        rooms.dedup();

        let session = SessionConfig {
            min_movement_m: self.min_movement,
            heartbeat_interval: Duration::from_secs(self.heartbeat_secs.max(1)),
            max_reconnect_attempts: self.max_reconnects,
            ..SessionConfig::with_server_url(self.server)
        };

        Ok(ClientConfig {
            session,
            user_id: self.user,
            rooms,
            role: self.role,
            assignment_id: self.assignment,
            route,
            watch_enabled: !self.no_watch,
            watch_interval: Duration::from_millis(self.watch_interval_ms.max(100)),
            greeting: self.say,
            ..Default::default()
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config()?;
    log::info!(
        "Starting {} session(s) for user {} against {}",
        config.rooms.len(),
        config.user_id,
        config.session.server_url
    );

    let (tx, rx) = mpsc::unbounded_channel();
    Driver::new(config, tx).run(rx).await
}
