// src/storage/snapshot.rs
use std::io::ErrorKind;
use std::path::Path;
use crate::error::ProxyError;
use crate::models::directory::DirectorySnapshot;

/// Returns `None` when nothing has been persisted yet.
pub async fn load(path: &Path) -> Result<Option<DirectorySnapshot>, ProxyError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Writes through a temporary file so a crash never leaves a half-written snapshot.
pub async fn save(path: &Path, snapshot: &DirectorySnapshot) -> Result<(), ProxyError> {
    let bytes = serde_json::to_vec(snapshot)?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
