//! Watch task launch preparation.
//!
//! Resolves which project file a watch configuration refers to and builds
//! the request the task host uses to spawn `dotnet watch`.

use crate::config::models::AppConfig;
use crate::engine::inbox::EngineHandle;
use crate::host::{HostError, WorkspaceHost};
use crate::matcher::path_has_prefix;
use crate::tasks::registry::TaskRegistry;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};
use wa_protocol::config_models::WatchConfig;
use wa_protocol::task_models::{BuildTaskRequest, WatchTask};

/// Executable launched for every watch task.
pub const WATCH_COMMAND: &str = "dotnet";

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Watch configuration '{config}': no project file found under {root}")]
    ProjectNotFound { config: String, root: String },

    #[error("Watch configuration '{config}': project is ambiguous, {} candidates match", .candidates.len())]
    AmbiguousProject {
        config: String,
        candidates: Vec<String>,
    },

    #[error("Watch configuration '{config}': project selection cancelled")]
    Cancelled { config: String },

    #[error("Watch configuration '{config}': project discovery failed: {source}")]
    Discovery {
        config: String,
        #[source]
        source: HostError,
    },

    #[error("Attachment engine has stopped")]
    EngineStopped,
}

/// Resolves the project file a watch configuration refers to.
///
/// # Arguments
///
/// * `watch` - The watch configuration
/// * `workspace_root` - Root searched for project files
/// * `extensions` - Project file extensions to consider
/// * `host` - Workspace host used for discovery and the picker
///
/// # Returns
///
/// The absolute path of the project file.
///
/// # Errors
///
/// - `ProjectNotFound` if nothing matches
/// - `AmbiguousProject` if a configured project matches several files
/// - `Cancelled` if the user dismissed the picker
pub async fn resolve_project(
    watch: &WatchConfig,
    workspace_root: &str,
    extensions: &[String],
    host: &dyn WorkspaceHost,
) -> Result<String, LaunchError> {
    let mut discovered = host
        .find_project_files(workspace_root, extensions)
        .await
        .map_err(|source| LaunchError::Discovery {
            config: watch.name.clone(),
            source,
        })?;
    debug!(config = %watch.name, count = discovered.len(), "Discovered project files");

    if let Some(configured) = &watch.project {
        let mut matching: Vec<String> = discovered
            .into_iter()
            .filter(|file| matches_configured(file, configured, workspace_root))
            .collect();

        return match matching.len() {
            0 => Err(LaunchError::ProjectNotFound {
                config: watch.name.clone(),
                root: workspace_root.to_string(),
            }),
            1 => Ok(matching.remove(0)),
            _ => Err(LaunchError::AmbiguousProject {
                config: watch.name.clone(),
                candidates: matching,
            }),
        };
    }

    match discovered.len() {
        0 => Err(LaunchError::ProjectNotFound {
            config: watch.name.clone(),
            root: workspace_root.to_string(),
        }),
        1 => Ok(discovered.remove(0)),
        _ => host
            .select_project(&discovered)
            .await
            .ok_or_else(|| LaunchError::Cancelled {
                config: watch.name.clone(),
            }),
    }
}

/// A configured project matches a discovered file by absolute path, by
/// path relative to the workspace root, or by trailing path components
/// (`Api.csproj`, `Api/Api.csproj`).
fn matches_configured(file: &str, configured: &str, workspace_root: &str) -> bool {
    let file = file.replace('\\', "/");
    let configured = configured.replace('\\', "/");
    let configured = configured.trim_start_matches("./");

    if Path::new(configured).is_absolute() {
        return file == configured;
    }

    let joined = format!("{}/{configured}", workspace_root.replace('\\', "/").trim_end_matches('/'));
    if file == joined {
        return true;
    }

    file.ends_with(&format!("/{configured}")) && path_has_prefix(&file, workspace_root)
}

/// Builds the request that launches `dotnet watch` for `task`.
pub fn build_request(task: &WatchTask, watch: &WatchConfig) -> BuildTaskRequest {
    let mut args = vec![
        "watch".to_string(),
        "--project".to_string(),
        task.project_file.clone(),
        "run".to_string(),
    ];
    args.extend(watch.args.iter().cloned());

    BuildTaskRequest {
        task_id: task.id.clone(),
        label: format!("Watch {}", task.project_name),
        workspace_root: task.workspace_root.clone(),
        command: WATCH_COMMAND.to_string(),
        args,
        env: watch.env.clone(),
        cwd: task.workspace_root.clone(),
    }
}

/// Resolves the project for `watch` and asks the engine to start it.
///
/// Returns the id the task will be registered under.
pub async fn launch_watch(
    handle: &EngineHandle,
    host: &dyn WorkspaceHost,
    config: &AppConfig,
    watch: &WatchConfig,
) -> Result<String, LaunchError> {
    let workspace_root = config.workspace_for(watch);
    let project_file = resolve_project(
        watch,
        &workspace_root,
        &config.engine.matcher.project_extensions,
        host,
    )
    .await?;

    let task_id = TaskRegistry::task_id(&workspace_root, &project_file);
    info!(config = %watch.name, project = %project_file, "Starting watch task");
    handle
        .start_watch(workspace_root, project_file, watch.clone())
        .await
        .map_err(|_| LaunchError::EngineStopped)?;

    Ok(task_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeWorkspace {
        files: Vec<String>,
        pick: Option<usize>,
        picker_calls: Mutex<usize>,
    }

    impl FakeWorkspace {
        fn new(files: &[&str], pick: Option<usize>) -> Self {
            Self {
                files: files.iter().map(|f| f.to_string()).collect(),
                pick,
                picker_calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl WorkspaceHost for FakeWorkspace {
        fn list_workspace_roots(&self) -> Vec<String> {
            vec!["/repo".to_string()]
        }

        async fn find_project_files(
            &self,
            _root: &str,
            _extensions: &[String],
        ) -> Result<Vec<String>, HostError> {
            Ok(self.files.clone())
        }

        async fn select_project(&self, candidates: &[String]) -> Option<String> {
            *self.picker_calls.lock().unwrap() += 1;
            self.pick.map(|i| candidates[i].clone())
        }

        fn notify(&self, _message: &str) {}
    }

    fn watch(project: Option<&str>) -> WatchConfig {
        WatchConfig {
            name: "api".to_string(),
            project: project.map(str::to_string),
            ..Default::default()
        }
    }

    fn exts() -> Vec<String> {
        vec!["csproj".to_string()]
    }

    #[tokio::test]
    async fn test_single_project_is_used() {
        let host = FakeWorkspace::new(&["/repo/Api/Api.csproj"], None);
        let project = resolve_project(&watch(None), "/repo", &exts(), &host)
            .await
            .expect("Failed to resolve");
        assert_eq!(project, "/repo/Api/Api.csproj");
        assert_eq!(*host.picker_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_several_projects_use_picker() {
        let host = FakeWorkspace::new(&["/repo/Api/Api.csproj", "/repo/Web/Web.csproj"], Some(1));
        let project = resolve_project(&watch(None), "/repo", &exts(), &host)
            .await
            .expect("Failed to resolve");
        assert_eq!(project, "/repo/Web/Web.csproj");
        assert_eq!(*host.picker_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dismissed_picker_cancels() {
        let host = FakeWorkspace::new(&["/repo/Api/Api.csproj", "/repo/Web/Web.csproj"], None);
        let result = resolve_project(&watch(None), "/repo", &exts(), &host).await;
        assert!(matches!(result, Err(LaunchError::Cancelled { .. })));
    }

    #[tokio::test]
    async fn test_no_projects() {
        let host = FakeWorkspace::new(&[], None);
        let result = resolve_project(&watch(None), "/repo", &exts(), &host).await;
        assert!(matches!(result, Err(LaunchError::ProjectNotFound { .. })));
    }

    #[tokio::test]
    async fn test_configured_project_matches() {
        let host = FakeWorkspace::new(&["/repo/Api/Api.csproj", "/repo/Web/Web.csproj"], None);

        for configured in ["Api/Api.csproj", "./Api/Api.csproj", "/repo/Api/Api.csproj", "Api.csproj"] {
            let project = resolve_project(&watch(Some(configured)), "/repo", &exts(), &host)
                .await
                .expect("Failed to resolve");
            assert_eq!(project, "/repo/Api/Api.csproj", "configured: {configured}");
        }
        assert_eq!(*host.picker_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_configured_project_ambiguous_names_config() {
        let host = FakeWorkspace::new(&["/repo/a/Api.csproj", "/repo/b/Api.csproj"], None);
        let err = resolve_project(&watch(Some("Api.csproj")), "/repo", &exts(), &host)
            .await
            .expect_err("Should be ambiguous");

        assert!(matches!(err, LaunchError::AmbiguousProject { ref candidates, .. } if candidates.len() == 2));
        assert!(err.to_string().contains("'api'"));
    }

    #[tokio::test]
    async fn test_configured_project_missing() {
        let host = FakeWorkspace::new(&["/repo/Api/Api.csproj"], None);
        let result = resolve_project(&watch(Some("Web/Web.csproj")), "/repo", &exts(), &host).await;
        assert!(matches!(result, Err(LaunchError::ProjectNotFound { .. })));
    }

    #[test]
    fn test_build_request() {
        let task = WatchTask {
            id: "id".to_string(),
            workspace_root: "/repo".to_string(),
            project_file: "/repo/Api/Api.csproj".to_string(),
            project_name: "Api".to_string(),
            process_id: None,
            handle: None,
            started_at: Utc::now(),
        };
        let mut watch = watch(None);
        watch.args = vec!["--urls".to_string(), "http://localhost:5000".to_string()];
        watch.env = HashMap::from([("ASPNETCORE_ENVIRONMENT".to_string(), "Development".to_string())]);

        let request = build_request(&task, &watch);

        assert_eq!(request.command, "dotnet");
        assert_eq!(
            request.args,
            vec!["watch", "--project", "/repo/Api/Api.csproj", "run", "--urls", "http://localhost:5000"]
        );
        assert_eq!(request.cwd, "/repo");
        assert_eq!(request.label, "Watch Api");
        assert_eq!(request.env.len(), 1);
    }
}
