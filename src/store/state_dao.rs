//! panel state dao, keeps the last known target and output vector across restarts
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::common::error::PanelError;
use crate::entity::po::panel_state_po::PanelStatePo;
use crate::debug;

const LOG_TAG: &str = "state_dao";

/// single record store, a missing record is `Ok(None)`, not an error
#[async_trait]
pub trait StateDao: Send + Sync {
    async fn load(&self) -> Result<Option<PanelStatePo>, PanelError>;

    async fn save(&self, state: &PanelStatePo) -> Result<(), PanelError>;
}

/// json file on local disk
pub struct JsonFileStateDao {
    file_path: PathBuf,
}

impl JsonFileStateDao {
    pub fn new(file_path: impl AsRef<Path>) -> Self {
        JsonFileStateDao {
            file_path: file_path.as_ref().to_path_buf(),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.file_path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.file_path.with_file_name(name)
    }
}

#[async_trait]
impl StateDao for JsonFileStateDao {
    async fn load(&self) -> Result<Option<PanelStatePo>, PanelError> {
        let content = match tokio::fs::read_to_string(&self.file_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(LOG_TAG, "no state file at {}", self.file_path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(PanelError::state_store(format!(
                    "read state file {} error: {}", self.file_path.display(), e
                )))
            }
        };
        let state = serde_json::from_str(&content).map_err(|e| {
            PanelError::state_store(format!("state file {} is not valid: {}", self.file_path.display(), e))
        })?;
        Ok(Some(state))
    }

    /// write to a sibling temp file first, then rename over the record
    async fn save(&self, state: &PanelStatePo) -> Result<(), PanelError> {
        let json = serde_json::to_string(state)
            .map_err(|e| PanelError::state_store(format!("encode state error: {}", e)))?;
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, json).await.map_err(|e| {
            PanelError::state_store(format!("write state file {} error: {}", temp_path.display(), e))
        })?;
        tokio::fs::rename(&temp_path, &self.file_path).await.map_err(|e| {
            PanelError::state_store(format!("replace state file {} error: {}", self.file_path.display(), e))
        })?;
        debug!(LOG_TAG, "state saved to {}", self.file_path.display());
        Ok(())
    }
}
