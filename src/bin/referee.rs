use std::net::SocketAddr;
use std::sync::Arc;

use league_runtime::league::config::RefereeConfig;
use league_runtime::league::referee::RefereeState;
use league_runtime::league::server;

#[tokio::main]
async fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = RefereeConfig::from_args(&args);

    log::info!("starting referee {}", config.referee_id);
    let addr: SocketAddr = format!("127.0.0.1:{}", config.port).parse().expect("invalid port");
    let state = Arc::new(RefereeState::new(config));

    let server_state = Arc::clone(&state);
    let server_task = tokio::spawn(async move {
        if let Err(e) = server::serve(addr, server_state).await {
            log::error!("referee server failed: {}", e);
        }
    });

    if let Err(e) = state.register_with_league_manager().await {
        log::error!("failed to register with league manager: {}", e);
        std::process::exit(1);
    }

    let _ = server_task.await;
}
