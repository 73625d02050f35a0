use std::{ ffi::{ c_void, OsStr, OsString }, io, mem, os::windows::ffi::{ OsStrExt, OsStringExt }, ptr };

use windows_sys::Win32::{
    Foundation::{ CloseHandle, HANDLE, INVALID_HANDLE_VALUE },
    Security::{ GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY },
    System::{
        Diagnostics::ToolHelp::{
            CreateToolhelp32Snapshot,
            Process32FirstW,
            Process32NextW,
            PROCESSENTRY32W,
            TH32CS_SNAPPROCESS,
        },
        Threading::{
            GetActiveProcessorCount,
            GetCurrentProcess,
            OpenProcess,
            OpenProcessToken,
            SetProcessAffinityMask,
            PROCESS_QUERY_LIMITED_INFORMATION,
            PROCESS_SET_INFORMATION,
        },
    },
    UI::WindowsAndMessaging::{ MessageBoxW, MB_ICONERROR, MB_ICONINFORMATION, MB_OK },
};

use crate::{
    AffinityMask,
    Error,
    Message,
    Notifier,
    PrivilegeChecker,
    ProcessDirectory,
    ProcessEntry,
    Result,
    Severity,
};

const ALL_PROCESSOR_GROUPS: u16 = 0xffff;

/// Closes the wrapped handle on drop.
struct OwnedHandle(HANDLE);

impl OwnedHandle {
    fn new(handle: HANDLE) -> io::Result<Self> {
        if handle.is_null() || handle == INVALID_HANDLE_VALUE {
            Err(io::Error::last_os_error())
        } else {
            Ok(Self(handle))
        }
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        unsafe {
            CloseHandle(self.0);
        }
    }
}

/// Elevated means the process token carries `TokenElevation`.
pub struct HostPrivilege;

impl PrivilegeChecker for HostPrivilege {
    fn is_elevated(&self) -> Result<bool> {
        let mut token: HANDLE = ptr::null_mut();
        if unsafe { OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token) } == 0 {
            return Err(Error::PrivilegeQuery(io::Error::last_os_error()));
        }
        let token = OwnedHandle(token);

        let mut elevation = TOKEN_ELEVATION { TokenIsElevated: 0 };
        let mut returned = 0u32;
        let ok = unsafe {
            GetTokenInformation(
                token.0,
                TokenElevation,
                &mut elevation as *mut TOKEN_ELEVATION as *mut c_void,
                mem::size_of::<TOKEN_ELEVATION>() as u32,
                &mut returned
            )
        };
        if ok == 0 {
            return Err(Error::PrivilegeQuery(io::Error::last_os_error()));
        }
        Ok(elevation.TokenIsElevated != 0)
    }
}

/// A Toolhelp snapshot of the process table.
///
/// Names are the executable name without `.exe`, compared case-insensitively.
/// Instances are returned in snapshot order.
pub struct HostProcesses;

fn process_name(entry: &PROCESSENTRY32W) -> String {
    let len = entry.szExeFile
        .iter()
        .position(|&c| c == 0)
        .unwrap_or(entry.szExeFile.len());
    let exe = OsString::from_wide(&entry.szExeFile[..len]).to_string_lossy().into_owned();
    match exe.len().checked_sub(4) {
        Some(stem) if exe.is_char_boundary(stem) && exe[stem..].eq_ignore_ascii_case(".exe") =>
            exe[..stem].to_string(),
        _ => exe,
    }
}

impl ProcessDirectory for HostProcesses {
    fn processes_named(&self, name: &str) -> Result<Vec<ProcessEntry>> {
        let enumerate = |source: io::Error| Error::Enumerate { name: name.to_string(), source };

        let snapshot = OwnedHandle::new(unsafe {
            CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0)
        }).map_err(enumerate)?;

        let wanted = name.to_lowercase();
        let mut found = Vec::new();
        let mut entry: PROCESSENTRY32W = unsafe { mem::zeroed() };
        entry.dwSize = mem::size_of::<PROCESSENTRY32W>() as u32;

        if unsafe { Process32FirstW(snapshot.0, &mut entry) } == 0 {
            return Err(enumerate(io::Error::last_os_error()));
        }
        loop {
            let candidate = process_name(&entry);
            if candidate.to_lowercase() == wanted {
                found.push(ProcessEntry {
                    pid: entry.th32ProcessID,
                    name: candidate,
                });
            }
            if unsafe { Process32NextW(snapshot.0, &mut entry) } == 0 {
                break;
            }
        }

        Ok(found)
    }

    fn set_affinity(&self, process: &ProcessEntry, mask: &AffinityMask) -> Result<()> {
        let failed = |source: io::Error| Error::SetAffinity {
            name: process.name.clone(),
            pid: process.pid,
            source,
        };

        let bits = match mask.to_u64() {
            Some(bits) => bits,
            None => {
                log::warn!("mask {} is wider than one processor group, using its low 64 bits", mask);
                mask.low_word()
            }
        };

        let handle = OwnedHandle::new(unsafe {
            OpenProcess(
                PROCESS_SET_INFORMATION | PROCESS_QUERY_LIMITED_INFORMATION,
                0,
                process.pid
            )
        }).map_err(failed)?;

        if unsafe { SetProcessAffinityMask(handle.0, bits as usize) } == 0 {
            return Err(failed(io::Error::last_os_error()));
        }
        Ok(())
    }
}

/// Logical processors across all processor groups.
pub fn logical_processors() -> Result<usize> {
    match unsafe { GetActiveProcessorCount(ALL_PROCESSOR_GROUPS) } {
        0 => Err(Error::ProcessorCount(io::Error::last_os_error())),
        count => Ok(count as usize),
    }
}

fn wide(text: &str) -> Vec<u16> {
    OsStr::new(text).encode_wide().chain(Some(0)).collect()
}

/// Shows messages in a modal message box.
pub struct MessageBoxNotifier;

impl Notifier for MessageBoxNotifier {
    fn notify(&mut self, message: &Message) -> bool {
        let icon = match message.severity() {
            Severity::Info => MB_ICONINFORMATION,
            Severity::Error => MB_ICONERROR,
        };
        let text = wide(&message.to_string());
        let title = wide(message.title());
        let pressed = unsafe {
            MessageBoxW(ptr::null_mut(), text.as_ptr(), title.as_ptr(), MB_OK | icon)
        };
        if pressed == 0 {
            log::error!("failed to display message: {}", io::Error::last_os_error());
            return false;
        }
        true
    }
}
