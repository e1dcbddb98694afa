// src/main.rs
use std::sync::Arc;
use env_logger::Env;
use log::{error, info};
use tokio::net::TcpListener;
use rqproxy::config::Config;
use rqproxy::server::{self, ProxyState};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    env_logger::init_from_env(Env::default().default_filter_or("info"));

    // Load configuration
    let config = Config::from_env();

    let state = match ProxyState::new(config) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to start: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
        }
    };

    if let Some(directory) = &state.directory {
        directory.load_persisted().await;
    } else {
        info!("No directory token configured, querying servers directly");
    }

    server::spawn_sweeper(state.clone());

    let listener = TcpListener::bind(&state.config.bind_address).await?;
    info!(
        "Server started: {} ({} allowed networks, burst limit {})",
        listener.local_addr()?,
        state.allow_list.len(),
        state.config.update_burst_limit
    );

    server::serve(listener, state).await;
    Ok(())
}
