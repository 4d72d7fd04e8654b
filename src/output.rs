//! # Output Configuration
//!
//! This module controls how the CLI presents results: colour and emoji
//! support based on terminal capabilities and user preferences, formatting
//! of per-repository lines, and a progress bar driven by scheduler events.
//!
//! ## Respecting User Preferences
//!
//! The module respects the following environment variables and flags:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals
//!
//! ## Usage
//!
//! ```rust,ignore
//! use branch_sync::output::{OutputConfig, emoji};
//!
//! let config = OutputConfig::from_env_and_flag("auto");
//! println!("{} Switching...", emoji(&config, "🔀", "[SYNC]"));
//! ```

use std::env;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::defaults;
use crate::repository::{Repository, UpstreamStatus};
use crate::scheduler::{ProgressEvent, ProgressSink};
use crate::transaction::SwitchOutcome;

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// # Arguments
    /// * `color_flag` - The value of the --color CLI flag: "always", "never", or "auto"
    ///
    /// In auto mode, colors are disabled if:
    /// - `NO_COLOR` environment variable is set (any value, including empty)
    /// - `CLICOLOR=0` is set
    /// - `TERM=dumb` is set
    /// - stdout is not a TTY (unless `CLICOLOR_FORCE=1`)
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        // Presence alone disables colors, even when empty
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    /// Create a configuration with colors always enabled.
    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    /// Create a configuration with colors always disabled.
    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Returns the emoji when colors are enabled, otherwise the plain text.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// Human-readable upstream position, e.g. `ahead 2, behind 1`.
pub fn upstream_label(upstream: UpstreamStatus) -> String {
    match upstream {
        UpstreamStatus::NoUpstream => "no upstream".to_string(),
        UpstreamStatus::Tracking(counts) => match (counts.ahead, counts.behind) {
            (0, 0) => "up to date".to_string(),
            (ahead, 0) => format!("ahead {}", ahead),
            (0, behind) => format!("behind {}", behind),
            (ahead, behind) => format!("ahead {}, behind {}", ahead, behind),
        },
    }
}

/// One line describing how a repository's switch ended.
pub fn outcome_line(config: &OutputConfig, name: &str, outcome: &SwitchOutcome) -> String {
    let seconds = format!("({:.1}s)", outcome.elapsed.as_secs_f64());
    if outcome.success {
        let stash = if outcome.stash_created {
            ", local changes restored"
        } else {
            ""
        };
        let text = format!("{}: switched{} {}", name, stash, seconds);
        format!("{} {}", emoji(config, "✅", "[OK]"), paint(config, text, Tone::Good))
    } else {
        let text = format!("{}: {} {}", name, outcome.summary(), seconds);
        format!("{} {}", emoji(config, "❌", "[FAIL]"), paint(config, text, Tone::Bad))
    }
}

/// One line describing the inspected state of a repository.
pub fn status_line(config: &OutputConfig, repo: &Repository) -> String {
    let mut parts = vec![upstream_label(repo.upstream())];
    if repo.dirty {
        parts.push("dirty".to_string());
    }
    if repo.stash_count > 0 {
        parts.push(format!("{} stashed", repo.stash_count));
    }

    let branch = paint(config, repo.branch_label().to_string(), Tone::Accent);
    format!("{}: {} [{}]", repo.name, branch, parts.join(", "))
}

enum Tone {
    Good,
    Bad,
    Accent,
}

fn paint(config: &OutputConfig, text: String, tone: Tone) -> String {
    if !config.use_color {
        return text;
    }
    let styled = match tone {
        Tone::Good => style(text).green(),
        Tone::Bad => style(text).red(),
        Tone::Accent => style(text).cyan().bold(),
    };
    styled.force_styling(true).to_string()
}

/// Progress bar fed by scheduler events.
///
/// Finished repositories are printed to stdout while the bar (on stderr) is
/// suspended; with `verbose` set the
/// transcript of every repository follows its line, otherwise only failed
/// ones show the tail of theirs.
pub struct ProgressReporter {
    bar: ProgressBar,
    config: OutputConfig,
    verbose: bool,
}

impl ProgressReporter {
    pub fn new(total: usize, config: OutputConfig, quiet: bool, verbose: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
            if let Ok(progress_style) =
                ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} {msg}")
            {
                bar.set_style(progress_style.progress_chars("##-"));
            }
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        };
        Self {
            bar,
            config,
            verbose,
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn print(&self, text: &str) {
        if self.bar.is_hidden() {
            println!("{}", text);
        } else {
            self.bar.suspend(|| println!("{}", text));
        }
    }
}

impl ProgressSink for ProgressReporter {
    fn on_progress(&self, event: &ProgressEvent<'_>) {
        self.bar.set_position(event.index as u64);
        self.bar.set_message(event.repository.name.clone());
        self.print(&outcome_line(&self.config, &event.repository.name, event.outcome));

        if self.verbose {
            for line in event.outcome.transcript_text().lines() {
                self.print(&format!("    {}", line));
            }
        } else if !event.outcome.success {
            let transcript = event.outcome.transcript_text();
            let lines: Vec<&str> = transcript.lines().collect();
            let start = lines.len().saturating_sub(defaults::TRANSCRIPT_TAIL_LINES);
            for line in &lines[start..] {
                self.print(&format!("    {}", line));
            }
        }
    }
}
