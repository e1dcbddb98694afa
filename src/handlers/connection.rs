// src/handlers/connection.rs
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use crate::codec::frame::{encode_entry, read_request};
use crate::error::ProxyError;
use crate::models::server::ServerRecord;
use crate::server::ProxyState;

pub const NET_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Serves one client request. The whole exchange runs inside the batch section.
pub async fn handle_connection<S>(mut stream: S, peer: SocketAddr, state: Arc<ProxyState>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let _section = state.batch_guard.enter().await;

    match process(&mut stream, &state).await {
        Ok(count) => debug!("InConn | {} | Answered {} servers", peer, count),
        Err(e) => warn!("InConn | {} | {}", peer, e),
    }

    let _ = stream.shutdown().await;
}

async fn process<S>(stream: &mut S, state: &ProxyState) -> Result<usize, ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = timeout(NET_READ_TIMEOUT, read_request(&mut *stream)).await??;

    let records: Vec<Arc<ServerRecord>> = request.addresses
        .iter()
        .map(|address| state.records.get_or_create(*address))
        .collect();

    state.scheduler.refresh_batch(&records).await;

    let mut response = Vec::new();
    for record in &records {
        encode_entry(&mut response, record.address(), &record.snapshot(), request.version);
    }

    timeout(NET_READ_TIMEOUT, async {
        stream.write_all(&response).await?;
        stream.flush().await
    }).await??;

    Ok(records.len())
}
