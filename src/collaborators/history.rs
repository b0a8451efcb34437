use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use super::error::CollaboratorError;
use super::HistoryStore;
use crate::workflow::state::WorkflowState;

/// Appends one JSON document per finished run to a local file.
#[derive(Debug)]
pub struct JsonlHistoryStore {
    path: PathBuf,
    // Serialises appends from concurrent runs so lines never interleave.
    write_lock: Mutex<()>,
}

impl JsonlHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every stored run back, oldest first.
    pub async fn load_all(&self) -> Result<Vec<WorkflowState>, CollaboratorError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(CollaboratorError::from))
            .collect()
    }
}

#[async_trait]
impl HistoryStore for JsonlHistoryStore {
    async fn save(&self, state: &WorkflowState) -> Result<(), CollaboratorError> {
        let mut line = serde_json::to_string(state)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        debug!(run_id = %state.run_id(), path = %self.path.display(), "Workflow history saved");
        Ok(())
    }
}
