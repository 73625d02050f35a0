//! Host implementations of the crate's seams.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::{ logical_processors, HostPrivilege, HostProcesses };

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use self::windows::{ logical_processors, HostPrivilege, HostProcesses, MessageBoxNotifier };

#[cfg(not(any(target_os = "linux", windows)))]
mod unsupported;
#[cfg(not(any(target_os = "linux", windows)))]
pub use unsupported::{ logical_processors, HostPrivilege, HostProcesses };
