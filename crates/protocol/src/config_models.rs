//! Engine configuration models for `.watch-attach/config.toml`.
//!
//! This module defines the structure of the configuration file that
//! controls polling, debounce windows, the attach configuration handed to
//! the IDE, and the watch tasks to launch.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ts_rs::TS;

/// Represents all settings from `.watch-attach/config.toml`.
///
/// Every field has a default, so an empty file is a valid configuration.
///
/// # Example
///
/// ```toml
/// # .watch-attach/config.toml
/// poll_interval_ms = 1000
/// disconnect_debounce_ms = 2000
///
/// [debug]
/// type = "coreclr"
/// name = ".NET Core Attach - AUTO"
///
/// [[watch]]
/// name = "api"
/// project = "Api/Api.csproj"
/// args = ["--urls", "http://localhost:5000"]
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(default)]
pub struct EngineConfig {
    /// Interval between two process scans.
    pub poll_interval_ms: u64,

    /// Delay between a session-terminated event and marking the session
    /// disconnected. A rebuild restart inside this window is attached
    /// silently instead of prompting.
    pub disconnect_debounce_ms: u64,

    /// How long a disconnected session is kept before it is evicted.
    pub eviction_debounce_ms: u64,

    /// Delay after a successful task termination before the session entry
    /// is evicted.
    pub stop_confirm_ms: u64,

    /// Consecutive ticks an attached process may be missing before its
    /// session is force-disconnected.
    pub missing_ticks_before_disconnect: u32,

    /// Attach configuration template.
    pub debug: DebugSettings,

    /// Command line classification settings.
    pub matcher: MatcherSettings,

    /// Watch tasks to launch on startup.
    pub watch: Vec<WatchConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            disconnect_debounce_ms: 2000,
            eviction_debounce_ms: 60_000,
            stop_confirm_ms: 2000,
            missing_ticks_before_disconnect: 2,
            debug: DebugSettings::default(),
            matcher: MatcherSettings::default(),
            watch: Vec::new(),
        }
    }
}

/// Base attach configuration; the engine fills in the pid and decorates
/// the name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(default)]
pub struct DebugSettings {
    /// Debugger type passed to the IDE.
    #[serde(rename = "type")]
    pub kind: String,

    /// Request kind passed to the IDE.
    pub request: String,

    /// Base display name of attached sessions.
    pub name: String,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            kind: "coreclr".to_string(),
            request: "attach".to_string(),
            name: ".NET Core Attach - AUTO".to_string(),
        }
    }
}

/// Settings for recognising runtime processes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(default)]
pub struct MatcherSettings {
    /// Case-insensitive tokens that disqualify a command line, for build
    /// tool invocations that live under the workspace but are not the
    /// running application.
    pub false_positive_tokens: Vec<String>,

    /// Project file extensions considered when discovering projects.
    pub project_extensions: Vec<String>,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            false_positive_tokens: vec![
                "msbuild".to_string(),
                "vbcscompiler".to_string(),
                "dotnet-watch".to_string(),
            ],
            project_extensions: vec!["csproj".to_string(), "fsproj".to_string()],
        }
    }
}

/// A watch task to launch.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, TS)]
#[serde(default)]
pub struct WatchConfig {
    /// Configuration name, used in error messages.
    pub name: String,

    /// Workspace root; defaults to the directory the configuration was
    /// loaded from.
    pub workspace: Option<String>,

    /// Project file, absolute or relative to the workspace root. When
    /// unset the project is discovered.
    pub project: Option<String>,

    /// Extra arguments appended after `run`.
    pub args: Vec<String>,

    /// Extra environment variables for the watch process.
    pub env: HashMap<String, String>,
}
