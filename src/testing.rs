//! Scripted process runner shared by the unit tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::process::{CommandOutput, ProcessRunner};

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub dir: PathBuf,
    pub args: Vec<String>,
}

impl Call {
    pub fn starts_with(&self, prefix: &[&str]) -> bool {
        self.args.len() >= prefix.len() && self.args.iter().zip(prefix).all(|(a, p)| a == p)
    }
}

enum Reply {
    Outputs(VecDeque<CommandOutput>),
    Panic(String),
}

struct Rule {
    dir: Option<PathBuf>,
    prefix: Vec<String>,
    reply: Reply,
}

/// Replies to commands by argument prefix; unmatched commands succeed with
/// empty output. Later rules take precedence over earlier ones.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Call>>,
    delay: Option<Duration>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn push(&self, dir: Option<&Path>, args: &[&str], reply: Reply) {
        self.rules.lock().unwrap().push(Rule {
            dir: dir.map(Path::to_path_buf),
            prefix: args.iter().map(|a| a.to_string()).collect(),
            reply,
        });
    }

    pub fn on(&self, args: &[&str], output: CommandOutput) -> &Self {
        self.push(None, args, Reply::Outputs(VecDeque::from([output])));
        self
    }

    /// Successive replies; the last one repeats.
    pub fn on_seq(&self, args: &[&str], outputs: Vec<CommandOutput>) -> &Self {
        self.push(None, args, Reply::Outputs(outputs.into()));
        self
    }

    pub fn on_in(&self, dir: &Path, args: &[&str], output: CommandOutput) -> &Self {
        self.push(Some(dir), args, Reply::Outputs(VecDeque::from([output])));
        self
    }

    pub fn panic_in(&self, dir: &Path, args: &[&str], message: &str) -> &Self {
        self.push(Some(dir), args, Reply::Panic(message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_in(&self, dir: &Path) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.dir == dir).collect()
    }

    pub fn called(&self, prefix: &[&str]) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    /// Highest number of calls that were in flight at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn reply(&self, dir: &Path, args: &[&str]) -> Reply {
        let mut rules = self.rules.lock().unwrap();
        let matched = rules.iter_mut().rev().find(|rule| {
            rule.dir.as_deref().map_or(true, |d| d == dir)
                && args.len() >= rule.prefix.len()
                && rule.prefix.iter().zip(args).all(|(p, a)| p == a)
        });
        match matched {
            None => Reply::Outputs(VecDeque::from([CommandOutput::ok("")])),
            Some(rule) => match &mut rule.reply {
                Reply::Panic(message) => Reply::Panic(message.clone()),
                Reply::Outputs(outputs) => {
                    let output = if outputs.len() > 1 {
                        outputs.pop_front()
                    } else {
                        outputs.front().cloned()
                    };
                    Reply::Outputs(output.into_iter().collect())
                }
            },
        }
    }
}

impl ProcessRunner for ScriptedRunner {
    fn run(&self, dir: &Path, args: &[&str], _timeout: Duration) -> CommandOutput {
        self.calls.lock().unwrap().push(Call {
            dir: dir.to_path_buf(),
            args: args.iter().map(|a| a.to_string()).collect(),
        });

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        match self.reply(dir, args) {
            Reply::Panic(message) => panic!("{}", message),
            Reply::Outputs(mut outputs) => outputs.pop_front().unwrap_or_else(|| CommandOutput::ok("")),
        }
    }
}
