use std::io;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while inspecting or mutating the host.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The elevation state of the current process could not be determined.
    #[error("failed to query elevation state: {0}")]
    PrivilegeQuery(#[source] io::Error),

    /// The process table could not be read.
    #[error("failed to enumerate processes named {name:?}: {source}")]
    Enumerate { name: String, source: io::Error },

    /// Applying the mask to one process instance failed.
    #[error("failed to set affinity of {name} (pid {pid}): {source}")]
    SetAffinity {
        name: String,
        pid: u32,
        source: io::Error,
    },

    /// The host would not report its processor count.
    #[error("failed to count logical processors: {0}")]
    ProcessorCount(#[source] io::Error),

    #[cfg(target_os = "linux")]
    #[error(transparent)]
    Proc(#[from] procfs::ProcError),

    #[error("process affinity is not supported on this platform")]
    Unsupported,
}
