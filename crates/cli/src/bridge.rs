//! The `run` command: engine, watch tasks and the stdio protocol bridge.
//!
//! Events are written to stdout as one JSON object per line. Operations are
//! read from stdin the same way; answers go to the prompt that asked, host
//! notifications go to the engine inbox. The bridge exits on `shutdown`,
//! end of input or ctrl-c, and the engine terminates its watch tasks on the
//! way out.

use clap::Args;
use color_eyre::eyre::{bail, Result, WrapErr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wa_core::config::loader::load_config;
use wa_core::config::models::AppConfig;
use wa_core::host::channel::{decode_op, encode_event};
use wa_core::host::{ChannelHost, ProcessTaskHost, WorkspaceHost};
use wa_core::snapshot::SysinfoSnapshotProvider;
use wa_core::tasks::launch_watch;
use wa_core::{AttachmentEngine, Collaborators, EngineHandle};
use wa_protocol::config_models::WatchConfig;
use wa_protocol::ipc::{Event, Op};

const EVENT_BUFFER: usize = 64;

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Workspace root; repeat for multi-root workspaces [default: .]
    #[arg(long = "root")]
    pub roots: Vec<PathBuf>,

    /// Watch this project file instead of the configured watch tasks
    #[arg(long)]
    pub project: Option<String>,

    /// Poll interval in milliseconds
    #[arg(long)]
    pub poll_ms: Option<u64>,

    /// Arguments passed to the application
    #[arg(last = true)]
    pub args: Vec<String>,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let roots = workspace_roots(&args.roots)?;
    let mut config = load_config(&roots[0])
        .await
        .wrap_err("Failed to load configuration")?;
    if let Some(poll_ms) = args.poll_ms {
        if poll_ms == 0 {
            bail!("--poll-ms must be greater than zero");
        }
        config.engine.poll_interval_ms = poll_ms;
    }
    let watches = watch_list(&config, &roots, &args);

    let root_names = roots
        .iter()
        .map(|root| root.to_string_lossy().into_owned())
        .collect();
    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let host = Arc::new(ChannelHost::new(root_names, events_tx));
    let (handle, inbox) = EngineHandle::channel();
    let task_host = Arc::new(ProcessTaskHost::new(handle.clone()));

    let engine = AttachmentEngine::new(
        config.engine.clone(),
        Collaborators {
            snapshot: Arc::new(SysinfoSnapshotProvider::new()),
            workspace: host.clone(),
            tasks: task_host,
            debug: host.clone(),
            prompt: host.clone(),
        },
        inbox,
    );
    let engine_task = tokio::spawn(engine.run());
    let writer = tokio::spawn(write_events(events_rx));

    info!(
        roots = roots.len(),
        watches = watches.len(),
        poll_ms = config.engine.poll_interval_ms,
        "watch-attach started"
    );

    let config = Arc::new(config);
    for watch in watches {
        let handle = handle.clone();
        let host = host.clone();
        let config = config.clone();
        tokio::spawn(async move {
            match launch_watch(&handle, host.as_ref(), &config, &watch).await {
                Ok(task_id) => debug!(%task_id, "Watch task requested"),
                Err(e) => {
                    warn!(watch = %watch.name, error = %e, "Watch task not started");
                    host.notify(&e.to_string());
                }
            }
        });
    }

    let reader = tokio::spawn(read_ops(host.clone(), handle.clone()));
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        _ = reader => debug!("Input closed"),
    }

    handle.stop();
    engine_task.await.wrap_err("Engine task failed")?;
    writer.abort();
    info!("watch-attach stopped");
    Ok(())
}

/// Canonical workspace roots, defaulting to the current directory.
fn workspace_roots(roots: &[PathBuf]) -> Result<Vec<PathBuf>> {
    if roots.is_empty() {
        return Ok(vec![std::env::current_dir()?]);
    }
    roots
        .iter()
        .map(|root| {
            root.canonicalize()
                .wrap_err_with(|| format!("Workspace root not found: {}", root.display()))
        })
        .collect()
}

/// Watch tasks to launch.
///
/// `--project` replaces the configured list. Without configured tasks each
/// workspace root gets one watch whose project is discovered. Trailing
/// arguments are appended to every task's own arguments.
fn watch_list(config: &AppConfig, roots: &[PathBuf], args: &RunArgs) -> Vec<WatchConfig> {
    if let Some(project) = &args.project {
        return vec![WatchConfig {
            name: "cli".to_string(),
            project: Some(project.clone()),
            args: args.args.clone(),
            ..Default::default()
        }];
    }

    if config.engine.watch.is_empty() {
        return roots
            .iter()
            .map(|root| WatchConfig {
                name: "default".to_string(),
                workspace: Some(root.to_string_lossy().into_owned()),
                args: args.args.clone(),
                ..Default::default()
            })
            .collect();
    }

    config
        .engine
        .watch
        .iter()
        .cloned()
        .map(|mut watch| {
            watch.args.extend(args.args.iter().cloned());
            watch
        })
        .collect()
}

async fn write_events(mut events_rx: mpsc::Receiver<Event>) {
    let mut stdout = tokio::io::stdout();
    while let Some(event) = events_rx.recv().await {
        let line = match encode_event(&event) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to encode event");
                continue;
            }
        };
        if stdout.write_all(format!("{line}\n").as_bytes()).await.is_err()
            || stdout.flush().await.is_err()
        {
            warn!("stdout closed, dropping events");
            break;
        }
    }
}

/// Reads operations until `shutdown`, end of input or a closed engine.
async fn read_ops(host: Arc<ChannelHost>, handle: EngineHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed to read stdin");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let op = match decode_op(&line) {
            Ok(op) => op,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed operation");
                continue;
            }
        };
        if op == Op::Shutdown {
            break;
        }
        if host.answer(&op) {
            continue;
        }
        if let Some(event) = op.into_host_event() {
            if handle.notify(event).await.is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn config_with(watches: Vec<WatchConfig>) -> AppConfig {
        let mut config = AppConfig::with_root(Path::new("/repo"));
        config.engine.watch = watches;
        config
    }

    #[test]
    fn test_project_flag_replaces_configured_watches() {
        let config = config_with(vec![WatchConfig {
            name: "api".to_string(),
            ..Default::default()
        }]);
        let args = RunArgs {
            project: Some("Api/Api.csproj".to_string()),
            args: vec!["--urls".to_string(), "http://localhost:5000".to_string()],
            ..Default::default()
        };

        let watches = watch_list(&config, &[PathBuf::from("/repo")], &args);

        assert_eq!(watches.len(), 1);
        assert_eq!(watches[0].project.as_deref(), Some("Api/Api.csproj"));
        assert_eq!(watches[0].args, args.args);
    }

    #[test]
    fn test_default_watch_per_root() {
        let config = config_with(Vec::new());
        let roots = vec![PathBuf::from("/repo"), PathBuf::from("/other")];

        let watches = watch_list(&config, &roots, &RunArgs::default());

        let workspaces: Vec<_> = watches
            .iter()
            .map(|watch| watch.workspace.as_deref())
            .collect();
        assert_eq!(workspaces, vec![Some("/repo"), Some("/other")]);
    }

    #[test]
    fn test_trailing_args_extend_configured_args() {
        let config = config_with(vec![WatchConfig {
            name: "api".to_string(),
            args: vec!["--no-launch-profile".to_string()],
            ..Default::default()
        }]);
        let args = RunArgs {
            args: vec!["--verbose".to_string()],
            ..Default::default()
        };

        let watches = watch_list(&config, &[PathBuf::from("/repo")], &args);

        assert_eq!(watches[0].args, vec!["--no-launch-profile", "--verbose"]);
    }
}
