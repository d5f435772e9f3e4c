//! Version control backends.
//!
//! Everything shells out: `git` for Git and `cm` for Plastic SCM. A
//! [`CommandRunner`] owns process spawning so the backends can be exercised
//! with scripted output, and [`VersionControl`] is the capability surface the
//! engine needs from either system.

pub mod git;
pub mod plastic;

use std::process::Command;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::VersioningConfig;
use crate::count::BranchCounts;
use crate::describe::DescribeResult;
use crate::error::{VersioningError, VersioningResult};

pub use git::GitVcs;
pub use plastic::PlasticVcs;

/// Errors from running a VCS executable.
#[derive(Error, Debug)]
pub enum VcsError {
    /// The executable is not on `PATH`.
    #[error("{program} is not installed or not on PATH")]
    NotInstalled {
        /// Executable name.
        program: String,
    },

    /// Failed to spawn or wait on the executable.
    #[error("failed to run {program}: {source}")]
    Exec {
        /// Executable name.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The working directory is not a repository or workspace.
    #[error("{program}: not a repository: {stderr}")]
    NotARepo {
        /// Executable name.
        program: String,
        /// Captured stderr.
        stderr: String,
    },

    /// The executable returned a non-zero exit code.
    #[error("{program} {command} failed ({}): {stderr}", describe_exit(.exit_code))]
    Command {
        /// Executable name.
        program: String,
        /// Full argument list, space-joined.
        command: String,
        /// Exit code, `None` when killed by a signal.
        exit_code: Option<i32>,
        /// Captured stderr.
        stderr: String,
    },

    /// The command succeeded but printed something unexpected.
    #[error("unexpected output from {program} {command}: {output:?}")]
    UnexpectedOutput {
        /// Executable name.
        program: String,
        /// Full argument list, space-joined.
        command: String,
        /// Captured stdout.
        output: String,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(|| "terminated by signal".to_string(), |c| format!("exit code {c}"))
}

impl VcsError {
    /// Whether this means the VCS cannot be used here at all.
    pub const fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::NotInstalled { .. } | Self::Exec { .. } | Self::NotARepo { .. }
        )
    }
}

/// Result alias for VCS command execution.
pub type VcsResult<T> = Result<T, VcsError>;

/// Markers VCS executables print when run outside a repository.
const NOT_A_REPO_MARKERS: &[&str] = &[
    "not a git repository",
    "is not in a workspace",
    "is not a workspace",
];

/// Runs one VCS executable and captures its stdout.
pub trait CommandRunner {
    /// Executable name, for messages.
    fn program(&self) -> &str;

    /// Run with `args` and return stdout.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError::Command`] on a non-zero exit, and the unavailable
    /// variants when the executable or repository is missing.
    fn run(&self, args: &[&str]) -> VcsResult<String>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn program(&self) -> &str {
        (**self).program()
    }

    fn run(&self, args: &[&str]) -> VcsResult<String> {
        (**self).run(args)
    }
}

/// Spawns the real executable, optionally in a fixed working directory.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: String,
    working_dir: Option<Utf8PathBuf>,
}

impl ProcessRunner {
    /// Runner for `program` in the current directory.
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            working_dir: None,
        }
    }

    /// Run commands in `dir`.
    pub fn in_dir<P: AsRef<Utf8Path>>(mut self, dir: P) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }
}

impl CommandRunner for ProcessRunner {
    fn program(&self) -> &str {
        &self.program
    }

    #[instrument(skip(self), fields(program = %self.program))]
    fn run(&self, args: &[&str]) -> VcsResult<String> {
        let mut command = Command::new(&self.program);
        // Untranslated messages keep the not-a-repository markers matchable
        command.args(args).env("LC_ALL", "C").env("LANGUAGE", "C");
        if let Some(ref dir) = self.working_dir {
            command.current_dir(dir);
        }

        // `output` waits for the child and drops its handles on every path
        let output = command.output().map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                VcsError::NotInstalled {
                    program: self.program.clone(),
                }
            } else {
                VcsError::Exec {
                    program: self.program.clone(),
                    source,
                }
            }
        })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let lowered = stderr.to_lowercase();
        if NOT_A_REPO_MARKERS.iter().any(|m| lowered.contains(m)) {
            return Err(VcsError::NotARepo {
                program: self.program.clone(),
                stderr,
            });
        }

        debug!(code = ?output.status.code(), %stderr, "command failed");
        Err(VcsError::Command {
            program: self.program.clone(),
            command: args.join(" "),
            exit_code: output.status.code(),
            stderr,
        })
    }
}

/// Which VCS a repository uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VcsKind {
    /// Git, via the `git` executable.
    #[default]
    Git,
    /// Plastic SCM, via the `cm` executable.
    #[value(name = "plastic", alias = "plastic-scm", alias = "cm")]
    PlasticScm,
}

impl VcsKind {
    /// Executable that implements this VCS.
    pub const fn program(self) -> &'static str {
        match self {
            Self::Git => "git",
            Self::PlasticScm => "cm",
        }
    }

    /// Canonical config name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Git => "git",
            Self::PlasticScm => "plastic",
        }
    }

    /// Hash reported when this VCS cannot be used.
    pub const fn unavailable_hash(self) -> &'static str {
        match self {
            Self::Git => "not git",
            Self::PlasticScm => "not plastic",
        }
    }
}

impl std::fmt::Display for VcsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VcsKind {
    type Err = VersioningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "git" => Ok(Self::Git),
            "plastic" | "plastic-scm" | "plasticscm" | "cm" => Ok(Self::PlasticScm),
            _ => Err(VersioningError::UnsupportedVcsKind(s.to_string())),
        }
    }
}

impl TryFrom<String> for VcsKind {
    type Error = VersioningError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VcsKind> for String {
    fn from(kind: VcsKind) -> Self {
        kind.as_str().to_string()
    }
}

/// What the engine needs from a VCS.
///
/// Log lines are trimmed, non-empty and in the VCS's native order (HEAD
/// first).
pub trait VersionControl {
    /// Which VCS this is.
    fn kind(&self) -> VcsKind;

    /// The most recent version tag and HEAD's position relative to it.
    ///
    /// # Errors
    ///
    /// [`VersioningError::NoVersionTagFound`] when no tag matches,
    /// [`VersioningError::VcsUnavailable`] when the VCS cannot be used here,
    /// [`VersioningError::MalformedDescribeOutput`] on unparseable output.
    fn describe(&self) -> VersioningResult<DescribeResult>;

    /// The full commit log.
    ///
    /// # Errors
    ///
    /// Propagates command failures.
    fn commit_log(&self) -> VcsResult<Vec<String>>;

    /// Log lines newer than the tag in `describe`.
    ///
    /// # Errors
    ///
    /// Propagates command failures.
    fn log_since(&self, describe: &DescribeResult) -> VersioningResult<Vec<String>>;

    /// Commits on main up to the fork point and since it.
    ///
    /// Best-effort: a count that cannot be determined is 0. `log` is the full
    /// commit log, for backends that derive counts from it.
    fn branch_counts(&self, log: &[String]) -> BranchCounts;

    /// Commits on HEAD that are not on main; best-effort like
    /// [`VersionControl::branch_counts`].
    fn since_fork(&self, log: &[String]) -> u64 {
        self.branch_counts(log).since_fork
    }

    /// Working-tree change lines (modified, added, untracked, ...).
    ///
    /// # Errors
    ///
    /// Propagates command failures.
    fn status(&self) -> VcsResult<Vec<String>>;
}

/// Open the configured backend for `working_dir`.
///
/// # Errors
///
/// Returns [`VersioningError::InvalidPattern`] when the Plastic version tag
/// pattern does not compile.
pub fn open(
    config: &VersioningConfig,
    working_dir: &Utf8Path,
) -> VersioningResult<Box<dyn VersionControl>> {
    let kind = config.version_control_system;
    let runner = ProcessRunner::new(kind.program()).in_dir(working_dir);
    debug!(%kind, %working_dir, "opening version control");
    Ok(match kind {
        VcsKind::Git => Box::new(GitVcs::new(runner, config)),
        VcsKind::PlasticScm => Box::new(PlasticVcs::new(runner, config)?),
    })
}

/// Location of `kind`'s executable on `PATH`, if installed.
pub fn find_executable(kind: VcsKind) -> Option<Utf8PathBuf> {
    which::which(kind.program())
        .ok()
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

/// Whether `kind`'s executable is on `PATH`.
pub fn is_installed(kind: VcsKind) -> bool {
    find_executable(kind).is_some()
}

/// Split command output into trimmed, non-empty lines.
pub(crate) fn split_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted runner for exercising backends without a repository.

    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::{CommandRunner, VcsError, VcsResult};

    /// Replays canned output keyed by the space-joined argument list.
    #[derive(Debug, Default)]
    pub struct ScriptedRunner {
        program: String,
        responses: HashMap<String, Result<String, (Option<i32>, String)>>,
        unavailable: Option<String>,
        pub calls: RefCell<Vec<String>>,
    }

    impl ScriptedRunner {
        pub fn new(program: &str) -> Self {
            Self {
                program: program.to_string(),
                ..Self::default()
            }
        }

        pub fn ok(mut self, args: &str, stdout: &str) -> Self {
            self.responses
                .insert(args.to_string(), Ok(stdout.to_string()));
            self
        }

        pub fn fail(mut self, args: &str, code: i32, stderr: &str) -> Self {
            self.responses
                .insert(args.to_string(), Err((Some(code), stderr.to_string())));
            self
        }

        /// Every command fails as if outside a repository.
        pub fn not_a_repo(mut self, stderr: &str) -> Self {
            self.unavailable = Some(stderr.to_string());
            self
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn program(&self) -> &str {
            &self.program
        }

        fn run(&self, args: &[&str]) -> VcsResult<String> {
            let key = args.join(" ");
            self.calls.borrow_mut().push(key.clone());
            if let Some(ref stderr) = self.unavailable {
                return Err(VcsError::NotARepo {
                    program: self.program.clone(),
                    stderr: stderr.clone(),
                });
            }
            match self.responses.get(&key) {
                Some(Ok(stdout)) => Ok(stdout.clone()),
                Some(Err((code, stderr))) => Err(VcsError::Command {
                    program: self.program.clone(),
                    command: key,
                    exit_code: *code,
                    stderr: stderr.clone(),
                }),
                None => Err(VcsError::Command {
                    program: self.program.clone(),
                    command: key.clone(),
                    exit_code: Some(1),
                    stderr: format!("unscripted command: {key}"),
                }),
            }
        }
    }
}
