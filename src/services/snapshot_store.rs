use crate::error::SnapshotError;
use crate::repositories::RegistrySnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Newest document version this build can read and the one it writes
pub const SNAPSHOT_VERSION: u32 = 1;

/// On-disk document
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDocument {
    version: u32,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    state: RegistrySnapshot,
}

/// Durable, versioned storage for registry state
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the snapshot.
    ///
    /// Writes to a sibling temp file and renames it over the target, so a
    /// reader never sees a half-written document.
    pub async fn save(&self, snapshot: &RegistrySnapshot) -> Result<(), SnapshotError> {
        let document = SnapshotDocument {
            version: SNAPSHOT_VERSION,
            saved_at: Some(Utc::now()),
            state: snapshot.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&document)
            .map_err(|e| SnapshotError::CorruptData(format!("Failed to encode snapshot: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let tmp_path = self.tmp_path();
        let result = async {
            fs::write(&tmp_path, &bytes).await?;
            fs::rename(&tmp_path, &self.path).await?;
            Ok::<(), std::io::Error>(())
        }
        .await;

        if let Err(e) = result {
            // Clean up partial temp file on any error
            let _ = fs::remove_file(&tmp_path).await;
            return Err(SnapshotError::Io(e));
        }

        debug!(path = %self.path.display(), items = snapshot.items.len(), "Snapshot saved");
        Ok(())
    }

    /// Read the snapshot; a missing file is an empty registry
    pub async fn load(&self) -> Result<RegistrySnapshot, SnapshotError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No snapshot found, starting empty");
                return Ok(RegistrySnapshot::default());
            }
            Err(e) => return Err(SnapshotError::Io(e)),
        };

        let document: SnapshotDocument = serde_json::from_slice(&bytes)?;
        if document.version == 0 || document.version > SNAPSHOT_VERSION {
            return Err(SnapshotError::CorruptData(format!(
                "Unsupported snapshot version {} (supported: 1..={})",
                document.version, SNAPSHOT_VERSION
            )));
        }

        info!(
            path = %self.path.display(),
            items = document.state.items.len(),
            "Snapshot loaded"
        );
        Ok(document.state)
    }

    /// Load, falling back to an empty registry when the file is unreadable
    pub async fn load_or_default(&self) -> RegistrySnapshot {
        match self.load().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(path = %self.path.display(), "Could not load snapshot, starting empty: {}", e);
                RegistrySnapshot::default()
            }
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
