//! On-disk state for a monitoring session.
//!
//! One JSON document per session, tagged with a schema version so older files
//! keep loading after the model grows. Writes go to a sibling temp file and are
//! renamed into place.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::Error;
use crate::monitor::store::SharedChannels;
use housebot_common::models::TrackedChannel;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "version")]
enum PersistedState {
    #[serde(rename = "1")]
    V1 { channels: Vec<TrackedChannel> },
}

pub struct StatePersister {
    path: PathBuf,
    /// Serializes writers so an older snapshot never lands after a newer one.
    write_lock: Mutex<()>,
}

impl StatePersister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the session file. A missing file is a first run and loads empty.
    pub async fn load(&self) -> Result<HashMap<String, TrackedChannel>, Error> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(
                    "Monitor state {} does not exist on disk. Will be created on first save.",
                    self.path.display()
                );
                return Ok(HashMap::new());
            }
            Err(e) => {
                return Err(Error::Persistence(format!(
                    "reading {}: {e}",
                    self.path.display()
                )))
            }
        };

        let state: PersistedState = serde_json::from_slice(&bytes).map_err(|e| {
            Error::Persistence(format!("decoding {}: {e}", self.path.display()))
        })?;

        let channels = match state {
            PersistedState::V1 { channels } => channels,
        };
        info!("Loaded {} tracked channel(s) from {}", channels.len(), self.path.display());

        Ok(channels
            .into_iter()
            .map(|channel| (channel.login.clone(), channel))
            .collect())
    }

    /// Writes the given snapshot.
    pub async fn save(&self, channels: &HashMap<String, TrackedChannel>) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;
        self.write(channels).await
    }

    /// Waits for any in-progress write, then snapshots `channels` and writes it.
    pub async fn save_latest(&self, channels: &SharedChannels) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;
        let snapshot = channels.read().await.clone();
        self.write(&snapshot).await
    }

    /// Fire-and-forget `save_latest`; failures are only logged.
    pub fn spawn_save(self: &Arc<Self>, channels: SharedChannels) -> JoinHandle<()> {
        let persister = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = persister.save_latest(&channels).await {
                warn!(error = %e, "Failed to persist monitor state");
            }
        })
    }

    async fn write(&self, channels: &HashMap<String, TrackedChannel>) -> Result<(), Error> {
        let mut sorted: Vec<TrackedChannel> = channels.values().cloned().collect();
        sorted.sort_by(|a, b| a.login.cmp(&b.login));
        let bytes = serde_json::to_vec_pretty(&PersistedState::V1 { channels: sorted })?;

        let tmp = self.path.with_extension("json.tmp");
        match tokio::fs::write(&tmp, &bytes).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if let Some(parent) = tmp.parent().filter(|p| !p.as_os_str().is_empty()) {
                    debug!("Creating state directory {}", parent.display());
                    tokio::fs::create_dir_all(parent).await.map_err(|e| {
                        Error::Persistence(format!("creating {}: {e}", parent.display()))
                    })?;
                }
                tokio::fs::write(&tmp, &bytes).await.map_err(|e| {
                    Error::Persistence(format!("writing {}: {e}", tmp.display()))
                })?;
            }
            Err(e) => {
                return Err(Error::Persistence(format!("writing {}: {e}", tmp.display())));
            }
        }

        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            Error::Persistence(format!("replacing {}: {e}", self.path.display()))
        })?;
        debug!("Saved {} tracked channel(s) to {}", channels.len(), self.path.display());
        Ok(())
    }
}
