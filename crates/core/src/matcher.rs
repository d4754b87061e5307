//! Command line classification.
//!
//! Maps a process command line to the workspace root it was started from,
//! using only text: the program path argument is extracted from the command
//! line and compared against the known roots by path prefix. Nothing here
//! touches the filesystem or mutates state.

use regex::Regex;
use std::sync::LazyLock;

/// Leading `dotnet exec` launcher, quoted or not, with an optional
/// directory and `.exe` suffix.
#[allow(clippy::expect_used)] // literal
static LAUNCHER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^\s*(?:"(?:[^"]*[\\/])?dotnet(?:\.exe)?"|(?:[^"\s]*[\\/])?dotnet(?:\.exe)?)\s+exec\s+"#,
    )
    .expect("launcher pattern")
});

/// First argument, quoted or up to the next whitespace.
#[allow(clippy::expect_used)] // literal
static ARGUMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*(?:"([^"]+)"?|(\S+))"#).expect("argument pattern"));

/// Classifies command lines against workspace roots.
///
/// Holds the lower-cased false-positive tokens so they are normalised
/// once rather than on every tick.
#[derive(Debug, Clone)]
pub struct WorkspaceMatcher {
    false_positive_tokens: Vec<String>,
}

impl Default for WorkspaceMatcher {
    fn default() -> Self {
        Self::new(&wa_protocol::MatcherSettings::default().false_positive_tokens)
    }
}

impl WorkspaceMatcher {
    pub fn new(false_positive_tokens: &[String]) -> Self {
        Self {
            false_positive_tokens: false_positive_tokens
                .iter()
                .map(|token| token.to_lowercase())
                .filter(|token| !token.is_empty())
                .collect(),
        }
    }

    /// Returns true when the command line contains a token that marks it as
    /// a build tool invocation rather than the running application.
    pub fn is_false_positive(&self, command_line: &str) -> bool {
        let lowered = command_line.to_lowercase();
        self.false_positive_tokens
            .iter()
            .any(|token| lowered.contains(token.as_str()))
    }

    /// Extracts the program path unless the command line is a known false
    /// positive.
    pub fn candidate_path(&self, command_line: &str) -> Option<String> {
        if self.is_false_positive(command_line) {
            return None;
        }
        extract_program_path(command_line)
    }

    /// Returns the first root that is a path prefix of the program path
    /// found in `command_line`.
    ///
    /// # Example
    ///
    /// ```
    /// use wa_core::matcher::WorkspaceMatcher;
    ///
    /// let matcher = WorkspaceMatcher::default();
    /// let roots = vec!["/repo".to_string()];
    /// let root = matcher.match_workspace(r#"dotnet exec "/repo/bin/app.dll""#, &roots);
    /// assert_eq!(root.as_deref(), Some("/repo"));
    /// ```
    pub fn match_workspace(&self, command_line: &str, roots: &[String]) -> Option<String> {
        let path = self.candidate_path(command_line)?;
        roots
            .iter()
            .find(|root| path_has_prefix(&path, root))
            .cloned()
    }
}

/// Extracts the path of the program being run.
///
/// For `dotnet exec <path>` launches (quoted or not) the path after `exec`
/// is returned; otherwise the first argument of the command line is the
/// program itself.
pub fn extract_program_path(command_line: &str) -> Option<String> {
    let rest = match LAUNCHER.find(command_line) {
        Some(launcher) => &command_line[launcher.end()..],
        None => command_line,
    };

    let captures = ARGUMENT.captures(rest)?;
    let path = captures.get(1).or_else(|| captures.get(2))?.as_str();
    let path = path.trim_matches('"').trim();
    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

/// Component-aware prefix test that treats `\` and `/` alike and ignores
/// trailing separators on the prefix.
///
/// `/repo/Api` is a prefix of `/repo/Api/bin/app.dll` but not of
/// `/repo/ApiTests/bin/app.dll`.
pub fn path_has_prefix(path: &str, prefix: &str) -> bool {
    let path = normalize(path);
    let prefix = normalize(prefix);
    let prefix = prefix.trim_end_matches('/');

    if prefix.is_empty() {
        return path.starts_with('/');
    }

    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn normalize(path: &str) -> String {
    path.trim().replace('\\', "/")
}
