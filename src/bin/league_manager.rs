use std::net::SocketAddr;
use std::sync::Arc;

use league_runtime::league::config::LeagueManagerConfig;
use league_runtime::league::league_manager::LeagueManagerState;
use league_runtime::league::server;

#[tokio::main]
async fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = LeagueManagerConfig::from_args(&args);

    log::info!("starting league manager for league {}", config.league_id);
    let addr: SocketAddr = format!("127.0.0.1:{}", config.port).parse().expect("invalid port");
    let state = Arc::new(LeagueManagerState::new(config));

    if let Err(e) = server::serve(addr, state).await {
        log::error!("league manager server failed: {}", e);
        std::process::exit(1);
    }
}
