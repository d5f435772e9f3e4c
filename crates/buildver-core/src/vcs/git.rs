//! Git backend.
//!
//! Shells out to `git` so the user's configuration, alternates and
//! credentials apply exactly as on the command line.

use tracing::{debug, instrument, warn};

use super::{CommandRunner, ProcessRunner, VcsError, VcsKind, VcsResult, VersionControl, split_lines};
use crate::config::VersioningConfig;
use crate::count::BranchCounts;
use crate::describe::{DescribeResult, parse_git_describe};
use crate::error::{VersioningError, VersioningResult};

/// Exit code git uses for fatal errors, including "No names found".
const NO_NAMES_EXIT_CODE: i32 = 128;

/// Git repository accessed through a [`CommandRunner`].
#[derive(Debug)]
pub struct GitVcs<R = ProcessRunner> {
    runner: R,
    main_branch: String,
    tag_pattern: String,
}

impl<R: CommandRunner> GitVcs<R> {
    /// Create a backend using `runner` and the configured branch and tag
    /// pattern.
    pub fn new(runner: R, config: &VersioningConfig) -> Self {
        Self {
            runner,
            main_branch: config.main_branch_name.clone(),
            tag_pattern: config.git.tag_pattern.clone(),
        }
    }

    fn log_lines(&self, args: &[&str]) -> VcsResult<Vec<String>> {
        match self.runner.run(args) {
            Ok(output) => Ok(split_lines(&output)),
            // A repository with no commits yet has an empty history
            Err(VcsError::Command { ref stderr, .. })
                if stderr.contains("does not have any commits yet") =>
            {
                debug!("repository has no commits");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    fn rev_list_count(&self, range: &str) -> VcsResult<u64> {
        let output = self.runner.run(&["rev-list", "--count", range])?;
        output
            .trim()
            .parse()
            .map_err(|_| VcsError::UnexpectedOutput {
                program: self.runner.program().to_string(),
                command: format!("rev-list --count {range}"),
                output,
            })
    }

    /// Commits reachable from the merge base of main and HEAD.
    fn commits_on_main_to_fork(&self) -> VcsResult<u64> {
        let base = self
            .runner
            .run(&["merge-base", &self.main_branch, "HEAD"])?;
        self.rev_list_count(base.trim())
    }

    /// Commits on HEAD that are not on main.
    fn commits_since_main(&self) -> VcsResult<u64> {
        self.rev_list_count(&format!("{}..HEAD", self.main_branch))
    }
}

impl<R: CommandRunner> VersionControl for GitVcs<R> {
    fn kind(&self) -> VcsKind {
        VcsKind::Git
    }

    #[instrument(skip(self), fields(pattern = %self.tag_pattern))]
    fn describe(&self) -> VersioningResult<DescribeResult> {
        let args = ["describe", "--tags", "--long", "--match", self.tag_pattern.as_str()];
        match self.runner.run(&args) {
            Ok(output) => {
                let described = parse_git_describe(&output)?;
                debug!(tag = %described.tag, commits = described.commits_since_tag, "described HEAD");
                Ok(described)
            }
            Err(e) if e.is_unavailable() => Err(VersioningError::VcsUnavailable {
                reason: e.to_string(),
            }),
            Err(VcsError::Command {
                exit_code: Some(NO_NAMES_EXIT_CODE),
                stderr,
                ..
            }) => Err(VersioningError::NoVersionTagFound {
                detail: format!("exit code {NO_NAMES_EXIT_CODE}: {stderr}"),
            }),
            Err(e) => Err(VersioningError::VcsUnavailable {
                reason: e.to_string(),
            }),
        }
    }

    #[instrument(skip(self))]
    fn commit_log(&self) -> VcsResult<Vec<String>> {
        self.log_lines(&["log"])
    }

    #[instrument(skip(self, describe), fields(tag = %describe.tag))]
    fn log_since(&self, describe: &DescribeResult) -> VersioningResult<Vec<String>> {
        let range = format!("{}..HEAD", describe.tag);
        Ok(self.log_lines(&["log", &range])?)
    }

    #[instrument(skip(self, _log), fields(main = %self.main_branch))]
    fn branch_counts(&self, _log: &[String]) -> BranchCounts {
        let main_to_fork = self.commits_on_main_to_fork().unwrap_or_else(|e| {
            warn!(error = %e, "could not count commits on main up to the fork point");
            0
        });
        let since_fork = self.commits_since_main().unwrap_or_else(|e| {
            warn!(error = %e, "could not count commits since main");
            0
        });
        BranchCounts {
            main_to_fork,
            since_fork,
        }
    }

    fn since_fork(&self, _log: &[String]) -> u64 {
        self.commits_since_main().unwrap_or_else(|e| {
            warn!(error = %e, "could not count commits since main");
            0
        })
    }

    fn status(&self) -> VcsResult<Vec<String>> {
        Ok(split_lines(&self.runner.run(&["status", "--porcelain"])?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::testing::ScriptedRunner;

    const DESCRIBE: &str = "describe --tags --long --match *v[0-9]*";

    fn git(runner: ScriptedRunner) -> GitVcs<ScriptedRunner> {
        GitVcs::new(runner, &VersioningConfig::default())
    }

    #[test]
    fn describe_parses_output() {
        let vcs = git(ScriptedRunner::new("git").ok(DESCRIBE, "v2.3-4-g1a2b3c4\n"));
        let d = vcs.describe().unwrap();
        assert_eq!((d.major, d.minor, d.commits_since_tag), (2, 3, 4));
        assert_eq!(d.hash, "g1a2b3c4");
    }

    #[test]
    fn describe_uses_configured_pattern() {
        let config = VersioningConfig {
            git: crate::config::GitSettings {
                tag_pattern: "app-v*".into(),
            },
            ..VersioningConfig::default()
        };
        let runner = ScriptedRunner::new("git")
            .ok("describe --tags --long --match app-v*", "app-v1.0-0-gabc\n");
        let vcs = GitVcs::new(runner, &config);
        assert_eq!(vcs.describe().unwrap().tag, "app-v1.0");
    }

    #[test]
    fn exit_128_is_no_version_tag() {
        let vcs = git(ScriptedRunner::new("git").fail(
            DESCRIBE,
            128,
            "fatal: No names found, cannot describe anything.",
        ));
        let err = vcs.describe().unwrap_err();
        assert!(matches!(err, VersioningError::NoVersionTagFound { .. }), "{err}");
    }

    #[test]
    fn other_failures_are_unavailable() {
        let vcs = git(ScriptedRunner::new("git").fail(DESCRIBE, 1, "error: something"));
        assert!(matches!(
            vcs.describe().unwrap_err(),
            VersioningError::VcsUnavailable { .. }
        ));

        let vcs = git(ScriptedRunner::new("git").not_a_repo("fatal: not a git repository"));
        assert!(matches!(
            vcs.describe().unwrap_err(),
            VersioningError::VcsUnavailable { .. }
        ));
    }

    #[test]
    fn malformed_describe_is_fatal() {
        let vcs = git(ScriptedRunner::new("git").ok(DESCRIBE, "garbage\n"));
        let err = vcs.describe().unwrap_err();
        assert!(matches!(err, VersioningError::MalformedDescribeOutput { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn log_since_uses_tag_range() {
        let runner = ScriptedRunner::new("git").ok("log v1.2..HEAD", "commit abc\n\n    fix: y\n");
        let vcs = git(runner);
        let d = parse_git_describe("v1.2-1-gabc").unwrap();
        assert_eq!(vcs.log_since(&d).unwrap(), ["commit abc", "fix: y"]);
    }

    #[test]
    fn empty_repository_has_empty_log() {
        let vcs = git(ScriptedRunner::new("git").fail(
            "log",
            128,
            "fatal: your current branch 'main' does not have any commits yet",
        ));
        assert!(vcs.commit_log().unwrap().is_empty());
    }

    #[test]
    fn branch_counts_use_merge_base() {
        let runner = ScriptedRunner::new("git")
            .ok("merge-base main HEAD", "abc123\n")
            .ok("rev-list --count abc123", "57\n")
            .ok("rev-list --count main..HEAD", "4\n");
        let vcs = git(runner);
        assert_eq!(
            vcs.branch_counts(&[]),
            BranchCounts {
                main_to_fork: 57,
                since_fork: 4
            }
        );
    }

    #[test]
    fn since_fork_skips_merge_base() {
        let runner = ScriptedRunner::new("git").ok("rev-list --count main..HEAD", "4\n");
        let vcs = GitVcs::new(&runner, &VersioningConfig::default());
        assert_eq!(vcs.since_fork(&[]), 4);
        assert_eq!(*runner.calls.borrow(), ["rev-list --count main..HEAD"]);
    }

    #[test]
    fn branch_counts_are_best_effort() {
        let runner = ScriptedRunner::new("git")
            .fail("merge-base main HEAD", 1, "fatal: Not a valid object name main")
            .ok("rev-list --count main..HEAD", "not a number");
        let vcs = git(runner);
        assert_eq!(vcs.branch_counts(&[]), BranchCounts::default());
    }

    #[test]
    fn status_counts_porcelain_lines() {
        let vcs = git(ScriptedRunner::new("git").ok("status --porcelain", " M a.txt\n?? b.txt\n"));
        assert_eq!(vcs.status().unwrap().len(), 2);

        let vcs = git(ScriptedRunner::new("git").ok("status --porcelain", ""));
        assert!(vcs.status().unwrap().is_empty());
    }
}
