//! Configuration models that aggregate all settings.
//!
//! This module provides the unified `AppConfig` structure that binds the
//! parsed engine configuration to the workspace root it was loaded from.

use std::path::{Path, PathBuf};
use std::time::Duration;
use wa_protocol::config_models::{EngineConfig, WatchConfig};

/// Unified application configuration loaded from `.watch-attach/`.
///
/// # Example
///
/// ```rust,no_run
/// use wa_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Polling every {:?} for {} watch tasks",
///          config.poll_interval(),
///          config.engine.watch.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory containing the `.watch-attach/` folder.
    pub root: PathBuf,

    /// Parsed engine settings.
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Default configuration rooted at `root`.
    pub fn with_root(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            engine: EngineConfig::default(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.engine.poll_interval_ms)
    }

    /// Workspace root a watch task runs in: its own `workspace` entry, or
    /// the configuration root.
    pub fn workspace_for(&self, watch: &WatchConfig) -> String {
        match &watch.workspace {
            Some(workspace) => workspace.clone(),
            None => self.root.to_string_lossy().into_owned(),
        }
    }
}
