//! # Switch Transaction
//!
//! A switch transaction brings one working copy onto the target branch. It is
//! a fixed sequence of git invocations, each depending on the state left by
//! the previous one, so nothing inside a transaction runs in parallel:
//!
//! 1.  **Working tree**: with `preserve_local_changes`, a dirty tree is
//!     stashed (tracked and untracked files). Without it, tracked changes are
//!     reset and untracked files removed.
//! 2.  **Fetch**: all remotes, pruning stale tracking branches, with tags.
//! 3.  **Branch resolution**: an existing local branch is force-checked-out;
//!     otherwise a branch tracking `origin/<target>` is created; otherwise
//!     the transaction fails with "branch not found".
//! 4.  **Pull**: fast-forward only. A diverged branch fails here rather than
//!     growing a merge commit.
//! 5.  **Restore**: a stash created in step 1 is popped with its index. If
//!     the pop fails the stash is left in place and the whole transaction is
//!     reported as failed.
//!
//! Which step failures end the transaction is decided by
//! [`Step::fatality`], not by the control flow. Every command attempted is
//! recorded in the transcript, including the ones before a failure.

use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::{FetchFailurePolicy, SyncOptions};
use crate::defaults;
use crate::inspector::{BranchInspector, REMOTE};
use crate::process::{CommandOutput, ProcessRunner};

/// Marker git prints when `stash push` found nothing to save.
const NOTHING_TO_STASH: &str = "No local changes to save";

/// One stage of the switch protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    /// Dirtiness check and `stash push`.
    Stash,
    /// `reset --hard` and `clean -fd` before fetching.
    Discard,
    Fetch,
    /// Looking up which form of the branch exists.
    Resolve,
    /// Force checkout of an existing local branch.
    Checkout,
    /// Creating a local branch that tracks `origin/<target>`.
    TrackCheckout,
    Pull,
    /// `stash pop --index`.
    Restore,
}

/// Whether a failed step ends the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fatality {
    Fatal,
    /// Recorded, then the transaction carries on.
    Continue,
}

impl Step {
    /// Identifier used in transcripts and reports.
    pub fn id(self) -> &'static str {
        match self {
            Step::Stash => "stash",
            Step::Discard => "discard",
            Step::Fetch => "fetch",
            Step::Resolve => "resolve",
            Step::Checkout => "checkout",
            Step::TrackCheckout => "track-checkout",
            Step::Pull => "pull",
            Step::Restore => "restore",
        }
    }

    /// What a failure of this step means for the transaction.
    pub fn fatality(self, fetch_policy: FetchFailurePolicy) -> Fatality {
        match (self, fetch_policy) {
            (Step::Fetch, FetchFailurePolicy::Continue) => Fatality::Continue,
            _ => Fatality::Fatal,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Progress through the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionState {
    Start,
    WorkingTreeHandled,
    Fetched,
    BranchResolved,
    Pulled,
    Restored,
    Done,
    Failed,
}

/// Why a transaction failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// A git command exited non-zero, could not launch, or timed out.
    CommandFailed,
    /// The branch exists neither locally nor on `origin`.
    BranchNotFound,
    /// The stash could not be popped and was kept.
    StashNotRestored,
    /// The task running the transaction panicked.
    Fault,
}

/// The error that ended a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    /// `None` only for faults outside the protocol.
    pub step: Option<Step>,
    pub kind: FailureKind,
    pub message: String,
}

impl StepFailure {
    fn new(step: Step, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            step: Some(step),
            kind,
            message: message.into(),
        }
    }

    pub fn step_id(&self) -> &'static str {
        self.step.map_or("task", Step::id)
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.step_id(), self.message)
    }
}

/// A line of the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptEntry {
    Command {
        step: Step,
        command: String,
        exit_code: i32,
        /// Tail of the command output.
        output: String,
    },
    Note {
        step: Step,
        message: String,
    },
}

impl TranscriptEntry {
    pub fn step(&self) -> Step {
        match self {
            TranscriptEntry::Command { step, .. } | TranscriptEntry::Note { step, .. } => *step,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TranscriptEntry::Command { exit_code, .. } if *exit_code != 0)
    }
}

impl fmt::Display for TranscriptEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptEntry::Command {
                step,
                command,
                exit_code,
                output,
            } => {
                if *exit_code == 0 {
                    write!(f, "[{}] {}", step, command)
                } else {
                    write!(f, "[{}] {} (exit {})", step, command, exit_code)?;
                    for line in output.lines() {
                        write!(f, "\n    {}", line)?;
                    }
                    Ok(())
                }
            }
            TranscriptEntry::Note { step, message } => write!(f, "[{}] {}", step, message),
        }
    }
}

/// Result of one transaction. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchOutcome {
    pub success: bool,
    /// `Done` or `Failed`.
    pub state: TransactionState,
    /// Last state reached before finishing or failing.
    pub reached: TransactionState,
    pub transcript: Vec<TranscriptEntry>,
    pub failure: Option<StepFailure>,
    pub stash_created: bool,
    pub elapsed: Duration,
}

impl SwitchOutcome {
    /// A failed outcome for a task that blew up outside the protocol.
    pub fn from_fault(message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            success: false,
            state: TransactionState::Failed,
            reached: TransactionState::Start,
            transcript: Vec::new(),
            failure: Some(StepFailure {
                step: None,
                kind: FailureKind::Fault,
                message: message.into(),
            }),
            stash_created: false,
            elapsed,
        }
    }

    pub fn failed_step(&self) -> Option<Step> {
        self.failure.as_ref().and_then(|f| f.step)
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure.as_ref().map(|f| f.kind)
    }

    /// One-line description for status displays.
    pub fn summary(&self) -> String {
        match &self.failure {
            None => "switched".to_string(),
            Some(failure) => failure.to_string(),
        }
    }

    /// Transcript rendered one entry per line, ending with the failure.
    pub fn transcript_text(&self) -> String {
        let mut lines: Vec<String> = self.transcript.iter().map(|e| e.to_string()).collect();
        if let Some(failure) = &self.failure {
            lines.push(format!("FAILED {}", failure));
        }
        lines.join("\n")
    }
}

/// Runs the switch protocol against one repository root.
pub struct SwitchTransaction<'a> {
    runner: &'a dyn ProcessRunner,
    options: &'a SyncOptions,
}

/// Mutable bookkeeping for one execution.
struct Run<'r> {
    root: &'r Path,
    started: Instant,
    state: TransactionState,
    transcript: Vec<TranscriptEntry>,
    stash_created: bool,
}

impl Run<'_> {
    fn note(&mut self, step: Step, message: impl Into<String>) {
        self.transcript.push(TranscriptEntry::Note {
            step,
            message: message.into(),
        });
    }

    fn advance(&mut self, state: TransactionState) {
        debug!("{}: {:?}", self.root.display(), state);
        self.state = state;
    }

    fn finish(self, failure: Option<StepFailure>) -> SwitchOutcome {
        let success = failure.is_none();
        SwitchOutcome {
            success,
            state: if success {
                TransactionState::Done
            } else {
                TransactionState::Failed
            },
            reached: self.state,
            transcript: self.transcript,
            failure,
            stash_created: self.stash_created,
            elapsed: self.started.elapsed(),
        }
    }
}

impl<'a> SwitchTransaction<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, options: &'a SyncOptions) -> Self {
        Self { runner, options }
    }

    fn inspector(&self) -> BranchInspector<'a> {
        BranchInspector::new(self.runner, self.options.per_command_timeout)
    }

    /// Run one git command and record it.
    fn git(&self, run: &mut Run<'_>, step: Step, args: &[&str]) -> CommandOutput {
        let output = self
            .runner
            .run(run.root, args, self.options.per_command_timeout);
        run.transcript.push(TranscriptEntry::Command {
            step,
            command: format!("git {}", args.join(" ")),
            exit_code: output.exit_code,
            output: output.tail(defaults::TRANSCRIPT_TAIL_LINES),
        });
        output
    }

    /// Run a command and apply the step's fatality on failure.
    fn git_step(
        &self,
        run: &mut Run<'_>,
        step: Step,
        args: &[&str],
    ) -> Result<CommandOutput, StepFailure> {
        let output = self.git(run, step, args);
        if output.success() {
            return Ok(output);
        }

        let message = format!("git {}: {}", args.join(" "), output.tail(3));
        match step.fatality(self.options.fetch_failure_policy) {
            Fatality::Fatal => Err(StepFailure::new(step, FailureKind::CommandFailed, message)),
            Fatality::Continue => {
                warn!("{}: continuing after {}", run.root.display(), message);
                run.note(step, "failed; continuing with already-known remote refs");
                Ok(output)
            }
        }
    }

    /// Execute the protocol against `root`. Never panics on git failure;
    /// every problem ends up in the returned outcome.
    pub fn execute(&self, root: &Path) -> SwitchOutcome {
        let mut run = Run {
            root,
            started: Instant::now(),
            state: TransactionState::Start,
            transcript: Vec::new(),
            stash_created: false,
        };

        let failure = self.drive(&mut run).err();
        if let Some(step) = failure.as_ref().and_then(|f| f.step) {
            if run.stash_created && step != Step::Restore {
                run.note(
                    step,
                    "local changes are in the stash (not dropped); run \
                     `git stash pop --index` once this is resolved",
                );
            }
        }
        match &failure {
            None => info!(
                "{}: on {}",
                root.display(),
                self.options.target_branch
            ),
            Some(f) => info!("{}: failed {}", root.display(), f),
        }
        run.finish(failure)
    }

    fn drive(&self, run: &mut Run<'_>) -> Result<(), StepFailure> {
        self.handle_working_tree(run)?;
        run.advance(TransactionState::WorkingTreeHandled);

        self.git_step(
            run,
            Step::Fetch,
            &["fetch", "--all", "--prune", "--tags", "--no-progress"],
        )?;
        run.advance(TransactionState::Fetched);

        self.resolve_branch(run)?;
        run.advance(TransactionState::BranchResolved);

        self.git_step(run, Step::Pull, &["pull", "--ff-only", "--no-progress"])?;
        run.advance(TransactionState::Pulled);

        self.restore(run)?;
        run.advance(TransactionState::Restored);
        Ok(())
    }

    fn handle_working_tree(&self, run: &mut Run<'_>) -> Result<(), StepFailure> {
        if !self.options.preserve_local_changes {
            return self.discard(run, Step::Discard);
        }

        let dirty = self.inspector().is_dirty(run.root).map_err(|e| {
            StepFailure::new(
                Step::Stash,
                FailureKind::CommandFailed,
                format!("could not check for local changes: {}", e),
            )
        })?;
        if !dirty {
            run.note(Step::Stash, "working tree clean, nothing to stash");
            return Ok(());
        }

        let label = format!("branch-sync: before switching to {}", self.options.target_branch);
        let output = self.git_step(
            run,
            Step::Stash,
            &["stash", "push", "--include-untracked", "-m", &label],
        )?;
        run.stash_created = !output.stdout.contains(NOTHING_TO_STASH);
        if !run.stash_created {
            run.note(Step::Stash, "git found nothing to stash");
        }
        Ok(())
    }

    /// Drop tracked modifications and untracked files.
    fn discard(&self, run: &mut Run<'_>, step: Step) -> Result<(), StepFailure> {
        self.git_step(run, step, &["reset", "--hard"])?;
        self.git_step(run, step, &["clean", "-fd"])?;
        Ok(())
    }

    fn resolve_branch(&self, run: &mut Run<'_>) -> Result<(), StepFailure> {
        let branch = self.options.target_branch.as_str();
        let inspector = self.inspector();

        if inspector.has_local_branch(run.root, branch) {
            run.note(Step::Resolve, format!("local branch '{}' exists", branch));
            self.git_step(run, Step::Checkout, &["checkout", "--force", branch])?;
            return Ok(());
        }

        if inspector.has_remote_branch(run.root, branch) {
            let upstream = format!("{}/{}", REMOTE, branch);
            run.note(
                Step::Resolve,
                format!("creating '{}' tracking '{}'", branch, upstream),
            );
            if !self.options.preserve_local_changes {
                // Fetch may have left new untracked files behind
                self.discard(run, Step::TrackCheckout)?;
            }
            self.git_step(
                run,
                Step::TrackCheckout,
                &["checkout", "--force", "--track", "-b", branch, &upstream],
            )?;
            return Ok(());
        }

        Err(StepFailure::new(
            Step::Resolve,
            FailureKind::BranchNotFound,
            format!(
                "branch '{}' not found locally or on {}",
                branch, REMOTE
            ),
        ))
    }

    fn restore(&self, run: &mut Run<'_>) -> Result<(), StepFailure> {
        if !run.stash_created {
            return Ok(());
        }

        let output = self.git(run, Step::Restore, &["stash", "pop", "--index"]);
        if output.success() {
            return Ok(());
        }

        let message = format!(
            "git stash pop --index: {}; the stash was NOT dropped, resolve the conflicts \
             manually and run `git stash drop` once your changes are back",
            output.tail(3)
        );
        run.note(Step::Restore, "stash kept (not dropped); manual resolution required");
        Err(StepFailure::new(
            Step::Restore,
            FailureKind::StashNotRestored,
            message,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;
    use std::path::PathBuf;

    fn root() -> PathBuf {
        PathBuf::from("/work/app")
    }

    fn local_exists(runner: &ScriptedRunner, branch: &str) {
        let reference = format!("refs/heads/{}", branch);
        runner.on(&["show-ref", "--verify", "--quiet", &reference], CommandOutput::ok(""));
    }

    fn remote_exists(runner: &ScriptedRunner, branch: &str) {
        let reference = format!("refs/remotes/origin/{}", branch);
        runner.on(&["show-ref", "--verify", "--quiet", &reference], CommandOutput::ok(""));
    }

    /// A runner where no branch exists unless a test says so.
    fn runner() -> ScriptedRunner {
        let runner = ScriptedRunner::new();
        runner.on(&["show-ref"], CommandOutput::failed(1, ""));
        runner
    }

    fn execute(runner: &ScriptedRunner, options: &SyncOptions) -> SwitchOutcome {
        SwitchTransaction::new(runner, options).execute(&root())
    }

    #[test]
    fn test_clean_local_branch_never_stashes() {
        let runner = runner();
        local_exists(&runner, "main");
        let outcome = execute(&runner, &SyncOptions::new("main"));

        assert!(outcome.success, "{}", outcome.transcript_text());
        assert_eq!(outcome.state, TransactionState::Done);
        assert_eq!(outcome.reached, TransactionState::Restored);
        assert!(!outcome.stash_created);
        assert!(runner.called(&["status", "--porcelain"]));
        assert!(!runner.called(&["stash"]));
        assert!(runner.called(&["checkout", "--force", "main"]));
        assert!(runner.called(&["pull", "--ff-only"]));
    }

    #[test]
    fn test_steps_run_in_order() {
        let runner = runner();
        local_exists(&runner, "main");
        execute(&runner, &SyncOptions::new("main"));

        let firsts: Vec<String> = runner.calls().iter().map(|c| c.args[0].clone()).collect();
        let position = |name: &str| firsts.iter().position(|a| a == name).unwrap();
        assert!(position("status") < position("fetch"));
        assert!(position("fetch") < position("show-ref"));
        assert!(position("show-ref") < position("checkout"));
        assert!(position("checkout") < position("pull"));
    }

    #[test]
    fn test_dirty_tree_is_stashed_and_restored() {
        let runner = runner();
        local_exists(&runner, "main");
        runner
            .on(&["status"], CommandOutput::ok(" M src/lib.rs"))
            .on(&["stash", "push"], CommandOutput::ok("Saved working directory"));
        let outcome = execute(&runner, &SyncOptions::new("main"));

        assert!(outcome.success, "{}", outcome.transcript_text());
        assert!(outcome.stash_created);
        let stash = runner
            .calls()
            .into_iter()
            .find(|c| c.starts_with(&["stash", "push"]))
            .unwrap();
        assert!(stash.args.contains(&"--include-untracked".to_string()));
        assert!(runner.called(&["stash", "pop", "--index"]));
    }

    #[test]
    fn test_stash_failure_aborts_before_fetch() {
        let runner = runner();
        runner
            .on(&["status"], CommandOutput::ok("?? scratch.txt"))
            .on(&["stash", "push"], CommandOutput::failed(1, "error: could not write index"));
        let outcome = execute(&runner, &SyncOptions::new("main"));

        assert!(!outcome.success);
        assert_eq!(outcome.failed_step(), Some(Step::Stash));
        assert_eq!(outcome.reached, TransactionState::Start);
        assert!(!runner.called(&["fetch"]));
        assert!(!runner.called(&["checkout"]));
    }

    #[test]
    fn test_status_failure_counts_as_stash_failure() {
        let runner = runner();
        runner.on(&["status"], CommandOutput::failed(128, "fatal: index file corrupt"));
        let outcome = execute(&runner, &SyncOptions::new("main"));

        assert_eq!(outcome.failed_step(), Some(Step::Stash));
        assert!(outcome.summary().contains("index file corrupt"));
        assert!(!runner.called(&["fetch"]));
    }

    #[test]
    fn test_nothing_to_stash_does_not_pop() {
        let runner = runner();
        local_exists(&runner, "main");
        runner
            .on(&["status"], CommandOutput::ok(" M sub"))
            .on(&["stash", "push"], CommandOutput::ok(NOTHING_TO_STASH));
        let outcome = execute(&runner, &SyncOptions::new("main"));

        assert!(outcome.success);
        assert!(!outcome.stash_created);
        assert!(!runner.called(&["stash", "pop"]));
    }

    #[test]
    fn test_discard_mode_cleans_before_fetch() {
        let runner = runner();
        local_exists(&runner, "main");
        let options = SyncOptions::new("main").preserve_local_changes(false);
        let outcome = execute(&runner, &options);

        assert!(outcome.success);
        let calls = runner.calls();
        assert!(calls[0].starts_with(&["reset", "--hard"]));
        assert!(calls[1].starts_with(&["clean", "-fd"]));
        assert!(calls[2].starts_with(&["fetch"]));
        assert!(!runner.called(&["status"]));
        assert!(!runner.called(&["stash"]));
    }

    #[test]
    fn test_remote_branch_gets_tracking_branch() {
        let runner = runner();
        remote_exists(&runner, "release/2.0");
        let outcome = execute(&runner, &SyncOptions::new("release/2.0"));

        assert!(outcome.success, "{}", outcome.transcript_text());
        assert!(runner.called(&[
            "checkout",
            "--force",
            "--track",
            "-b",
            "release/2.0",
            "origin/release/2.0"
        ]));
    }

    #[test]
    fn test_remote_branch_in_discard_mode_recleans() {
        let runner = runner();
        remote_exists(&runner, "dev");
        let options = SyncOptions::new("dev").preserve_local_changes(false);
        execute(&runner, &options);

        let resets = runner
            .calls()
            .iter()
            .filter(|c| c.starts_with(&["reset", "--hard"]))
            .count();
        assert_eq!(resets, 2);

        let calls = runner.calls();
        let fetch = calls.iter().position(|c| c.starts_with(&["fetch"])).unwrap();
        let last_reset = calls.iter().rposition(|c| c.starts_with(&["reset"])).unwrap();
        assert!(last_reset > fetch);
    }

    #[test]
    fn test_track_checkout_failure() {
        let runner = runner();
        remote_exists(&runner, "dev");
        runner.on(&["checkout"], CommandOutput::failed(128, "fatal: cannot lock ref"));
        let outcome = execute(&runner, &SyncOptions::new("dev"));

        assert_eq!(outcome.failed_step(), Some(Step::TrackCheckout));
        assert!(!runner.called(&["pull"]));
    }

    #[test]
    fn test_branch_not_found() {
        let runner = runner();
        let outcome = execute(&runner, &SyncOptions::new("release/9.9"));

        assert!(!outcome.success);
        assert_eq!(outcome.failure_kind(), Some(FailureKind::BranchNotFound));
        assert_eq!(outcome.reached, TransactionState::Fetched);
        assert!(outcome.summary().contains("release/9.9"));
        assert!(!runner.called(&["checkout"]));
        assert!(!runner.called(&["pull"]));
    }

    #[test]
    fn test_branch_not_found_restores_nothing_but_keeps_stash() {
        let runner = runner();
        runner
            .on(&["status"], CommandOutput::ok(" M a"))
            .on(&["stash", "push"], CommandOutput::ok("Saved"));
        let outcome = execute(&runner, &SyncOptions::new("missing"));

        assert_eq!(outcome.failure_kind(), Some(FailureKind::BranchNotFound));
        assert!(outcome.stash_created);
        assert!(!runner.called(&["stash", "pop"]));
        assert!(outcome
            .transcript
            .iter()
            .any(|e| e.step() == Step::Resolve && e.to_string().contains("not dropped")));
    }

    #[test]
    fn test_failed_pull_after_stash_says_where_changes_are() {
        let runner = runner();
        local_exists(&runner, "main");
        runner
            .on(&["status"], CommandOutput::ok(" M a.txt"))
            .on(&["stash", "push"], CommandOutput::ok("Saved"))
            .on(&["pull"], CommandOutput::failed(128, "fatal: Not possible to fast-forward"));
        let outcome = execute(&runner, &SyncOptions::new("main"));

        assert_eq!(outcome.failed_step(), Some(Step::Pull));
        assert!(outcome.stash_created);
        let notice = outcome
            .transcript
            .iter()
            .find(|e| e.to_string().contains("not dropped"))
            .map(|e| e.to_string());
        assert_eq!(
            notice.as_deref(),
            Some(
                "[pull] local changes are in the stash (not dropped); run \
                 `git stash pop --index` once this is resolved"
            )
        );
        assert!(!runner.called(&["stash", "pop"]));
        assert!(!runner.called(&["stash", "drop"]));
    }

    #[test]
    fn test_failure_without_stash_has_no_stash_notice() {
        let runner = runner();
        local_exists(&runner, "main");
        runner.on(&["pull"], CommandOutput::failed(1, "fatal: diverged"));
        let outcome = execute(&runner, &SyncOptions::new("main"));

        assert!(!outcome.transcript_text().contains("not dropped"));
    }

    #[test]
    fn test_second_run_after_restore_finds_clean_tree() {
        let runner = runner();
        local_exists(&runner, "main");
        runner
            .on_seq(&["status"], vec![CommandOutput::ok(" M a.txt"), CommandOutput::ok("")])
            .on(&["stash", "push"], CommandOutput::ok("Saved"));
        let options = SyncOptions::new("main");
        let first = execute(&runner, &options);
        let second = execute(&runner, &options);

        assert!(first.success && second.success);
        assert!(first.stash_created);
        assert!(!second.stash_created);
        let pushes = runner
            .calls()
            .iter()
            .filter(|c| c.starts_with(&["stash", "push"]))
            .count();
        assert_eq!(pushes, 1);
    }

    #[test]
    fn test_fetch_failure_continues_by_default() {
        let runner = runner();
        local_exists(&runner, "main");
        runner.on(&["fetch"], CommandOutput::failed(128, "fatal: unable to access remote"));
        let outcome = execute(&runner, &SyncOptions::new("main"));

        assert!(outcome.success);
        assert!(outcome
            .transcript
            .iter()
            .any(|e| e.step() == Step::Fetch && e.is_failure()));
        assert!(outcome.transcript_text().contains("unable to access remote"));
    }

    #[test]
    fn test_fetch_failure_aborts_under_abort_policy() {
        let runner = runner();
        local_exists(&runner, "main");
        runner.on(&["fetch"], CommandOutput::failed(128, "fatal: unable to access remote"));
        let options = SyncOptions::new("main").fetch_failure_policy(FetchFailurePolicy::Abort);
        let outcome = execute(&runner, &options);

        assert_eq!(outcome.failed_step(), Some(Step::Fetch));
        assert!(!runner.called(&["checkout"]));
    }

    #[test]
    fn test_checkout_failure() {
        let runner = runner();
        local_exists(&runner, "main");
        runner.on(&["checkout"], CommandOutput::failed(1, "error: pathspec"));
        let outcome = execute(&runner, &SyncOptions::new("main"));
        assert_eq!(outcome.failed_step(), Some(Step::Checkout));
        assert_eq!(outcome.reached, TransactionState::Fetched);
    }

    #[test]
    fn test_diverged_pull_fails() {
        let runner = runner();
        local_exists(&runner, "main");
        runner.on(
            &["pull"],
            CommandOutput::failed(128, "fatal: Not possible to fast-forward, aborting."),
        );
        let outcome = execute(&runner, &SyncOptions::new("main"));

        assert!(!outcome.success);
        assert_eq!(outcome.failed_step(), Some(Step::Pull));
        assert_eq!(outcome.reached, TransactionState::BranchResolved);
    }

    #[test]
    fn test_failed_pop_fails_transaction_and_keeps_stash() {
        let runner = runner();
        local_exists(&runner, "main");
        runner
            .on(&["status"], CommandOutput::ok(" M a.txt"))
            .on(&["stash", "push"], CommandOutput::ok("Saved"))
            .on(
                &["stash", "pop"],
                CommandOutput::failed(1, "CONFLICT (content): Merge conflict in a.txt"),
            );
        let outcome = execute(&runner, &SyncOptions::new("main"));

        assert!(!outcome.success);
        assert_eq!(outcome.failed_step(), Some(Step::Restore));
        assert_eq!(outcome.failure_kind(), Some(FailureKind::StashNotRestored));
        assert_eq!(outcome.reached, TransactionState::Pulled);
        assert!(outcome.transcript_text().contains("NOT dropped"));
        assert!(!runner.called(&["stash", "drop"]));
    }

    #[test]
    fn test_transcript_keeps_steps_before_failure() {
        let runner = runner();
        local_exists(&runner, "main");
        runner.on(&["pull"], CommandOutput::failed(1, "fatal: diverged"));
        let outcome = execute(&runner, &SyncOptions::new("main"));

        let steps: Vec<Step> = outcome.transcript.iter().map(|e| e.step()).collect();
        assert!(steps.contains(&Step::Fetch));
        assert!(steps.contains(&Step::Checkout));
        assert_eq!(steps.last(), Some(&Step::Pull));
        let text = outcome.transcript_text();
        assert!(text.contains("git pull --ff-only --no-progress (exit 1)"));
        assert!(text.contains("fatal: diverged"));
        assert!(text.ends_with("FAILED [pull] git pull --ff-only --no-progress: fatal: diverged"));
    }

    #[test]
    fn test_repeated_runs_are_idempotent() {
        let runner = runner();
        local_exists(&runner, "main");
        let options = SyncOptions::new("main");
        let first = execute(&runner, &options);
        let second = execute(&runner, &options);

        assert!(first.success && second.success);
        assert!(!first.stash_created && !second.stash_created);
    }

    #[test]
    fn test_fatality_table() {
        use FetchFailurePolicy::*;
        assert_eq!(Step::Fetch.fatality(Continue), Fatality::Continue);
        assert_eq!(Step::Fetch.fatality(Abort), Fatality::Fatal);
        for step in [
            Step::Stash,
            Step::Discard,
            Step::Resolve,
            Step::Checkout,
            Step::TrackCheckout,
            Step::Pull,
            Step::Restore,
        ] {
            assert_eq!(step.fatality(Continue), Fatality::Fatal, "{}", step);
        }
    }

    #[test]
    fn test_from_fault() {
        let outcome = SwitchOutcome::from_fault("boom", Duration::from_millis(3));
        assert!(!outcome.success);
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Fault));
        assert_eq!(outcome.failed_step(), None);
        assert_eq!(outcome.summary(), "[task] boom");
    }
}
