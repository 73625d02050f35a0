//! Finds a running Hauptwerk instance and lets it run on every logical
//! processor of the host.
//!
//! The host is reached through three seams, [`PrivilegeChecker`],
//! [`ProcessDirectory`] and [`Notifier`]. [`sys`] provides the real ones;
//! tests substitute their own.

use std::num::NonZeroUsize;

mod error;
mod mask;
mod notify;
pub mod sys;

pub use error::{ Error, Result };
pub use mask::AffinityMask;
pub use notify::{ Message, Notifier, Severity, TerminalNotifier, TITLE };

/// Process names to look for, in priority order.
pub const CANDIDATES: &[&str] = &[
    "Hauptwerk",
    "Hauptwerk (alt config 1)",
    "Hauptwerk (alt config 2)",
    "Hauptwerk (alt config 3)",
];

/// Reports whether the current context may change other processes' scheduling.
pub trait PrivilegeChecker {
    fn is_elevated(&self) -> Result<bool>;
}

/// A live process as seen by a [`ProcessDirectory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
}

/// Read access to the process table and write access to affinity.
pub trait ProcessDirectory {
    /// Every live process called `name`, in the order they should be tried.
    ///
    /// Whether the comparison is case-sensitive is up to the host.
    fn processes_named(&self, name: &str) -> Result<Vec<ProcessEntry>>;

    /// Bind `process` to the processors in `mask`.
    fn set_affinity(&self, process: &ProcessEntry, mask: &AffinityMask) -> Result<()>;
}

/// The process whose affinity was set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub name: String,
    pub pid: u32,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Unprivileged,
    Applied(Applied),
    NotFound,
}

impl Outcome {
    /// Process exit status for this outcome. Not finding a candidate is
    /// still a clean exit.
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Applied(_) | Outcome::NotFound => 0,
            Outcome::Unprivileged => 1,
        }
    }
}

/// Apply `mask` to the first instance of the first candidate that accepts it.
///
/// Candidates are tried in order and, within a name, instances in directory
/// order. A failed attempt is logged and the scan moves on; the first success
/// ends it. Returns `None` when nothing was running or every attempt failed.
pub fn set_affinity<D>(directory: &D, candidates: &[&str], mask: &AffinityMask) -> Option<Applied>
    where D: ProcessDirectory + ?Sized
{
    let mut failures = 0usize;

    for &name in candidates {
        let instances = match directory.processes_named(name) {
            Ok(instances) => instances,
            Err(err) => {
                log::warn!("{}", err);
                continue;
            }
        };
        log::trace!("{} running instance(s) of {:?}", instances.len(), name);

        for process in &instances {
            match directory.set_affinity(process, mask) {
                Ok(()) => {
                    log::info!("Affinity set for {} (pid {}).", process.name, process.pid);
                    return Some(Applied {
                        name: process.name.clone(),
                        pid: process.pid,
                    });
                }
                Err(err) => {
                    failures += 1;
                    log::warn!("Error: {}", err);
                }
            }
        }
    }

    log::debug!("no candidate updated, {} failed attempt(s)", failures);
    None
}

/// One full run: privilege check, scan, and a single notification.
///
/// The directory is not touched at all unless the context is elevated.
pub fn run(
    privilege: &dyn PrivilegeChecker,
    directory: &dyn ProcessDirectory,
    notifier: &mut dyn Notifier,
    candidates: &[&str],
    processors: NonZeroUsize
) -> Result<Outcome> {
    if !privilege.is_elevated()? {
        notifier.notify(&Message::ElevationRequired);
        return Ok(Outcome::Unprivileged);
    }

    let mask = AffinityMask::all(processors);
    log::debug!("target mask {} ({} processors)", mask, processors);

    let outcome = match set_affinity(directory, candidates, &mask) {
        Some(applied) => {
            notifier.notify(&Message::AffinitySet { process: applied.name.clone() });
            Outcome::Applied(applied)
        }
        None => {
            let checked = candidates.iter().map(|name| name.to_string()).collect();
            notifier.notify(&Message::NotFound { checked });
            Outcome::NotFound
        }
    };
    Ok(outcome)
}

/// Number of logical processors on the host.
///
/// Falls back to [`std::thread::available_parallelism`] when the host query
/// fails, and to a single processor after that.
pub fn logical_processors() -> NonZeroUsize {
    sys::logical_processors()
        .map_err(|err| log::warn!("{}", err))
        .ok()
        .and_then(NonZeroUsize::new)
        .or_else(|| std::thread::available_parallelism().ok())
        .unwrap_or(NonZeroUsize::MIN)
}
