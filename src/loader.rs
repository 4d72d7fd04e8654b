//! # Superseding Loader
//!
//! Discovery and inspection can take a while across many repositories, and
//! a newer request may arrive before an older one finishes. Every load is
//! tagged with a generation number taken from a shared counter:
//!
//! - [`Loader::begin`] bumps the counter and hands out a [`LoadTicket`].
//!   Any ticket issued earlier is superseded from that moment on.
//! - [`Loader::load`] checks the ticket before each repository and gives up
//!   with [`Error::Superseded`] as soon as it is stale.
//! - [`Loader::publish`] installs a result only if its ticket is still
//!   current. Readers hold `Arc` snapshots, so a publish never disturbs a
//!   snapshot that is already being displayed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use log::{debug, warn};
use rayon::prelude::*;

use crate::discovery::{self, Candidate};
use crate::error::{Error, Result};
use crate::inspector::BranchInspector;
use crate::repository::Repository;

/// An immutable published view of the repositories.
pub type Snapshot = Arc<Vec<Repository>>;

/// Identifies one load; stale once a newer load has begun.
#[derive(Debug, Clone)]
pub struct LoadTicket {
    generation: u64,
    counter: Arc<AtomicU64>,
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.generation
    }

    fn check(&self) -> Result<()> {
        if self.is_current() {
            Ok(())
        } else {
            Err(Error::Superseded {
                generation: self.generation,
            })
        }
    }
}

/// Shared handle; clones see the same generation and snapshot.
#[derive(Debug, Clone, Default)]
pub struct Loader {
    generation: Arc<AtomicU64>,
    current: Arc<RwLock<Snapshot>>,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new load, superseding every earlier ticket.
    pub fn begin(&self) -> LoadTicket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("load generation {} started", generation);
        LoadTicket {
            generation,
            counter: Arc::clone(&self.generation),
        }
    }

    /// Invalidate outstanding tickets without starting a load.
    pub fn supersede(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Discover the candidates and inspect each repository.
    ///
    /// Inspection failures are logged and leave the repository with default
    /// state. Nothing is published.
    pub fn load(
        &self,
        ticket: &LoadTicket,
        candidates: &[Candidate],
        inspector: &BranchInspector<'_>,
    ) -> Result<Vec<Repository>> {
        ticket.check()?;
        let mut repositories = discovery::discover(candidates);
        ticket.check()?;

        repositories.par_iter_mut().try_for_each(|repo| {
            ticket.check()?;
            if let Err(e) = inspector.refresh(repo) {
                warn!("{}: could not inspect: {}", repo.name, e);
            }
            Ok::<(), Error>(())
        })?;

        Ok(repositories)
    }

    /// Install `repositories` as the current snapshot if `ticket` is current.
    pub fn publish(&self, ticket: &LoadTicket, repositories: Vec<Repository>) -> Result<Snapshot> {
        let mut current = self.current.write().map_err(|_| Error::LockPoisoned {
            context: "repository snapshot".to_string(),
        })?;
        if let Err(e) = ticket.check() {
            warn!(
                "discarding results of superseded load {}",
                ticket.generation
            );
            return Err(e);
        }
        let snapshot = Arc::new(repositories);
        *current = Arc::clone(&snapshot);
        Ok(snapshot)
    }

    /// Begin, load and publish in one go.
    pub fn refresh(&self, candidates: &[Candidate], inspector: &BranchInspector<'_>) -> Result<Snapshot> {
        let ticket = self.begin();
        let repositories = self.load(&ticket, candidates, inspector)?;
        self.publish(&ticket, repositories)
    }

    /// The most recently published repositories.
    pub fn snapshot(&self) -> Result<Snapshot> {
        self.current
            .read()
            .map(|current| Arc::clone(&current))
            .map_err(|_| Error::LockPoisoned {
                context: "repository snapshot".to_string(),
            })
    }
}
