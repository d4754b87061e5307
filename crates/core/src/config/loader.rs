//! Configuration file loader for the `.watch-attach/` directory.
//!
//! The directory holds a single `config.toml` with polling, debounce,
//! attach and watch task settings. Every key is optional.

use crate::config::error::ConfigError;
use crate::config::error::ConfigResult;
use crate::config::models::AppConfig;
use std::path::Path;
use tracing::debug;
use wa_protocol::config_models::EngineConfig;

/// Name of the configuration directory under the workspace root.
pub const CONFIG_DIR: &str = ".watch-attach";

/// Loads the configuration from `<root>/.watch-attach/config.toml`.
///
/// # Arguments
///
/// * `root` - Root directory containing the `.watch-attach/` folder
///
/// # Returns
///
/// An `AppConfig` rooted at `root`. If the directory or the file is
/// missing, returns the default configuration rather than an error.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - The file exists but cannot be read
/// - The file has invalid TOML syntax or wrong value types
/// - Values fail validation (zero intervals, empty debugger type)
///
/// # Example
///
/// ```rust,no_run
/// use wa_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Loaded {} watch tasks", config.engine.watch.len());
/// # Ok(())
/// # }
/// ```
pub async fn load_config(root: &Path) -> ConfigResult<AppConfig> {
    let config_path = root.join(CONFIG_DIR).join("config.toml");

    // If config.toml doesn't exist, return default config
    if !config_path.exists() {
        debug!(path = %config_path.display(), "No config file, using defaults");
        return Ok(AppConfig::with_root(root));
    }

    let content = tokio::fs::read_to_string(&config_path)
        .await
        .map_err(|source| ConfigError::FileRead {
            path: config_path.clone(),
            source,
        })?;

    let engine: EngineConfig =
        toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
            path: config_path.clone(),
            source,
        })?;

    validate(&config_path, &engine)?;

    Ok(AppConfig {
        root: root.to_path_buf(),
        engine,
    })
}

/// Checks values that would make the engine misbehave.
pub fn validate(path: &Path, engine: &EngineConfig) -> ConfigResult<()> {
    let invalid = |reason: &str| ConfigError::InvalidConfig {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    if engine.poll_interval_ms == 0 {
        return Err(invalid("poll_interval_ms must be greater than zero"));
    }
    if engine.missing_ticks_before_disconnect == 0 {
        return Err(invalid(
            "missing_ticks_before_disconnect must be greater than zero",
        ));
    }
    if engine.debug.kind.trim().is_empty() {
        return Err(invalid("debug.type must not be empty"));
    }
    if engine.debug.name.trim().is_empty() {
        return Err(invalid("debug.name must not be empty"));
    }
    if engine.matcher.project_extensions.is_empty() {
        return Err(invalid("matcher.project_extensions must not be empty"));
    }
    for (index, watch) in engine.watch.iter().enumerate() {
        if watch.name.trim().is_empty() {
            return Err(ConfigError::InvalidConfig {
                path: path.to_path_buf(),
                reason: format!("watch[{index}] is missing a name"),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_config_acceptance() {
        let dir = tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        let wa_dir = root.join(CONFIG_DIR);
        fs::create_dir_all(&wa_dir).expect("Failed to create config dir");

        let config_toml = r#"
poll_interval_ms = 250
eviction_debounce_ms = 30000

[debug]
name = "Attach"

[[watch]]
name = "api"
project = "Api/Api.csproj"
args = ["--no-hot-reload"]
"#;
        fs::write(wa_dir.join("config.toml"), config_toml).expect("Failed to write config.toml");

        let config = load_config(root).await.expect("Failed to load config");

        assert_eq!(config.root, root);
        assert_eq!(config.engine.poll_interval_ms, 250);
        assert_eq!(config.poll_interval().as_millis(), 250);
        assert_eq!(config.engine.eviction_debounce_ms, 30_000);
        assert_eq!(config.engine.debug.kind, "coreclr");
        assert_eq!(config.engine.debug.name, "Attach");
        assert_eq!(config.engine.watch.len(), 1);

        let watch = &config.engine.watch[0];
        assert_eq!(watch.name, "api");
        assert_eq!(config.workspace_for(watch), root.to_string_lossy());
    }

    #[tokio::test]
    async fn test_load_config_empty_directory() {
        let dir = tempdir().expect("Failed to create temp dir");

        let config = load_config(dir.path())
            .await
            .expect("Should handle missing .watch-attach");

        assert_eq!(config.engine, EngineConfig::default());
        assert!(config.engine.watch.is_empty());
    }

    #[tokio::test]
    async fn test_load_config_invalid_toml() {
        let dir = tempdir().expect("Failed to create temp dir");
        let wa_dir = dir.path().join(CONFIG_DIR);
        fs::create_dir_all(&wa_dir).expect("Failed to create config dir");
        fs::write(wa_dir.join("config.toml"), "poll_interval_ms = [invalid toml")
            .expect("Failed to write config.toml");

        let result = load_config(dir.path()).await;

        if let Err(ConfigError::TomlParse { path, .. }) = result {
            assert!(path.ends_with("config.toml"));
        } else {
            panic!("Expected TomlParse error");
        }
    }

    #[tokio::test]
    async fn test_load_config_rejects_zero_interval() {
        let dir = tempdir().expect("Failed to create temp dir");
        let wa_dir = dir.path().join(CONFIG_DIR);
        fs::create_dir_all(&wa_dir).expect("Failed to create config dir");
        fs::write(wa_dir.join("config.toml"), "poll_interval_ms = 0")
            .expect("Failed to write config.toml");

        let result = load_config(dir.path()).await;

        if let Err(ConfigError::InvalidConfig { reason, .. }) = result {
            assert!(reason.contains("poll_interval_ms"));
        } else {
            panic!("Expected InvalidConfig error");
        }
    }

    #[test]
    fn test_validate_unnamed_watch() {
        let mut engine = EngineConfig::default();
        engine.watch.push(Default::default());

        let err = validate(Path::new("config.toml"), &engine).expect_err("Should reject");
        assert!(err.to_string().contains("watch[0]"));
    }

    #[test]
    fn test_workspace_override() {
        let config = AppConfig::with_root(Path::new("/repo"));
        let watch = wa_protocol::WatchConfig {
            name: "web".to_string(),
            workspace: Some("/other".to_string()),
            ..Default::default()
        };

        assert_eq!(config.workspace_for(&watch), "/other");
    }
}
