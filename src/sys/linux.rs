use std::io;

use procfs::{ process::{ all_processes, Process }, CpuInfo, Current, ProcError, ProcResult };
use rustix::{ io::Errno, process::{ geteuid, sched_setaffinity, CpuSet, Pid } };

use crate::{ AffinityMask, Error, PrivilegeChecker, ProcessDirectory, ProcessEntry, Result };

/// Elevated means running as root; nothing less may re-pin another user's
/// processes.
pub struct HostPrivilege;

impl PrivilegeChecker for HostPrivilege {
    fn is_elevated(&self) -> Result<bool> {
        Ok(geteuid().is_root())
    }
}

/// The `/proc` process table.
///
/// Names compare byte for byte. Instances are returned by ascending pid.
pub struct HostProcesses;

/// The executable's file name, or the kernel `comm` name (at most 15 bytes)
/// when the executable link cannot be read.
fn process_name(process: &Process) -> ProcResult<String> {
    if let Some(name) = process.exe().ok().as_deref().and_then(|exe| exe.file_name()) {
        let name = name.to_string_lossy();
        let name = name.strip_suffix(" (deleted)").unwrap_or(&*name);
        return Ok(name.to_string());
    }
    Ok(process.stat()?.comm)
}

fn proc_io(err: ProcError) -> io::Error {
    match err {
        ProcError::Io(err, _) => err,
        ProcError::NotFound(_) => io::Error::from(io::ErrorKind::NotFound),
        ProcError::PermissionDenied(_) => io::Error::from(io::ErrorKind::PermissionDenied),
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}

fn enumerate_failed(name: &str, err: ProcError) -> Error {
    Error::Enumerate {
        name: name.to_string(),
        source: proc_io(err),
    }
}

/// Thread ids of `pid`, ascending.
fn task_ids(pid: i32) -> ProcResult<Vec<i32>> {
    let mut tids: Vec<i32> = Process::new(pid)?
        .tasks()?
        .filter_map(|task| task.ok())
        .map(|task| task.tid)
        .collect();
    tids.sort_unstable();
    Ok(tids)
}

/// Runs `apply` on every task of `pid` and returns how many were updated.
///
/// The main task has to succeed. Other threads may exit while they are
/// walked or refuse the change; those are logged and skipped.
fn apply_to_tasks<F>(pid: i32, tids: &[i32], mut apply: F) -> rustix::io::Result<usize>
    where F: FnMut(i32) -> rustix::io::Result<()>
{
    let mut updated = 0;
    for &tid in tids {
        match apply(tid) {
            Ok(()) => {
                updated += 1;
            }
            Err(errno) if tid == pid => {
                return Err(errno);
            }
            Err(errno) if errno == Errno::SRCH => {
                log::trace!("task {} of pid {} exited", tid, pid);
            }
            Err(errno) => {
                log::warn!("failed to set affinity of task {} of pid {}: {}", tid, pid, errno);
            }
        }
    }
    if updated == 0 {
        return Err(Errno::SRCH);
    }
    Ok(updated)
}

fn cpu_set(mask: &AffinityMask) -> CpuSet {
    let mut set = CpuSet::new();
    for cpu in mask.cpus() {
        if cpu >= CpuSet::MAX_CPU {
            log::warn!(
                "processors from {} up are beyond the {} sched_setaffinity accepts",
                cpu,
                CpuSet::MAX_CPU
            );
            break;
        }
        set.set(cpu);
    }
    set
}

impl ProcessDirectory for HostProcesses {
    fn processes_named(&self, name: &str) -> Result<Vec<ProcessEntry>> {
        let mut found = Vec::new();

        for process in all_processes().map_err(|err| enumerate_failed(name, err))? {
            // processes may exit while /proc is being walked
            let process = match process {
                Ok(process) => process,
                Err(err) => {
                    log::trace!("skipping process: {}", err);
                    continue;
                }
            };
            match process_name(&process) {
                Ok(candidate) if candidate == name => {
                    found.push(ProcessEntry {
                        pid: process.pid() as u32,
                        name: candidate,
                    });
                }
                Ok(_) => {}
                Err(err) => log::trace!("skipping pid {}: {}", process.pid(), err),
            }
        }

        found.sort_by_key(|entry| entry.pid);
        Ok(found)
    }

    fn set_affinity(&self, process: &ProcessEntry, mask: &AffinityMask) -> Result<()> {
        let failed = |source: io::Error| Error::SetAffinity {
            name: process.name.clone(),
            pid: process.pid,
            source,
        };

        // pid 0 would address the calling thread
        let pid = i32::try_from(process.pid)
            .ok()
            .filter(|&pid| pid > 0)
            .ok_or_else(|| failed(io::Error::from(io::ErrorKind::InvalidInput)))?;

        let set = cpu_set(mask);
        // sched_setaffinity works per thread, so every task gets the mask
        let tids = task_ids(pid).map_err(|err| failed(proc_io(err)))?;
        let updated = apply_to_tasks(pid, &tids, |tid| {
            sched_setaffinity(Pid::from_raw(tid), &set)
        }).map_err(|errno| failed(errno.into()))?;

        log::debug!("mask applied to {} of {} task(s) of pid {}", updated, tids.len(), pid);
        Ok(())
    }
}

/// Number of `processor` entries in `/proc/cpuinfo`.
pub fn logical_processors() -> Result<usize> {
    Ok(CpuInfo::current()?.num_cores())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{ num::NonZeroUsize, sync::mpsc, thread };

    use rustix::{ process::sched_getaffinity, thread::gettid };

    #[test]
    fn finds_the_test_process_by_executable_name() {
        let exe = std::env::current_exe().unwrap();
        let name = exe.file_name().unwrap().to_str().unwrap();

        let found = HostProcesses.processes_named(name).unwrap();
        assert!(found.iter().any(|entry| entry.pid == std::process::id()));
        assert!(found.iter().all(|entry| entry.name == name));
        assert!(found.windows(2).all(|pair| pair[0].pid < pair[1].pid));
    }

    #[test]
    fn unknown_name_has_no_instances() {
        let found = HostProcesses.processes_named("no-such-process-hw-affinity").unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn vanished_process_is_a_set_affinity_error() {
        let entry = ProcessEntry { pid: i32::MAX as u32, name: "gone".into() };
        let mask = AffinityMask::all(NonZeroUsize::new(1).unwrap());
        match HostProcesses.set_affinity(&entry, &mask) {
            Err(Error::SetAffinity { pid, .. }) => assert_eq!(pid, i32::MAX as u32),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn pid_zero_is_rejected() {
        let entry = ProcessEntry { pid: 0, name: "self".into() };
        let mask = AffinityMask::all(NonZeroUsize::new(1).unwrap());
        let err = HostProcesses.set_affinity(&entry, &mask).unwrap_err();
        assert!(matches!(err, Error::SetAffinity { pid: 0, .. }));
    }

    #[test]
    fn cpuinfo_reports_processors() {
        assert!(logical_processors().unwrap() >= 1);
    }

    #[test]
    fn unreadable_process_table_names_the_lookup() {
        match enumerate_failed("Hauptwerk", ProcError::PermissionDenied(None)) {
            Error::Enumerate { name, source } => {
                assert_eq!(name, "Hauptwerk");
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(proc_io(ProcError::NotFound(None)).kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn every_task_is_visited() {
        let mut touched = Vec::new();
        let updated = apply_to_tasks(10, &[10, 11, 12], |tid| {
            touched.push(tid);
            Ok(())
        }).unwrap();
        assert_eq!(updated, 3);
        assert_eq!(touched, vec![10, 11, 12]);
    }

    #[test]
    fn exited_or_refusing_threads_are_skipped() {
        let updated = apply_to_tasks(10, &[10, 11, 12], |tid| {
            match tid {
                11 => Err(Errno::SRCH),
                12 => Err(Errno::PERM),
                _ => Ok(()),
            }
        }).unwrap();
        assert_eq!(updated, 1);
    }

    #[test]
    fn main_task_failure_fails_the_process() {
        let mut touched = Vec::new();
        let err = apply_to_tasks(10, &[10, 11], |tid| {
            touched.push(tid);
            if tid == 10 { Err(Errno::PERM) } else { Ok(()) }
        }).unwrap_err();
        assert_eq!(err, Errno::PERM);
        assert_eq!(touched, vec![10]);
    }

    #[test]
    fn no_updated_task_is_an_error() {
        assert_eq!(apply_to_tasks(10, &[], |_| Ok(())).unwrap_err(), Errno::SRCH);
        let err = apply_to_tasks(10, &[11], |_| Err(Errno::SRCH)).unwrap_err();
        assert_eq!(err, Errno::SRCH);
    }

    #[test]
    fn reaches_every_thread_of_the_process() {
        let (tid_tx, tid_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let worker = thread::spawn(move || {
            // narrow this thread to one processor so widening is observable
            let current = sched_getaffinity(None).unwrap();
            let first = (0..CpuSet::MAX_CPU).find(|&cpu| current.is_set(cpu)).unwrap();
            let mut single = CpuSet::new();
            single.set(first);
            sched_setaffinity(None, &single).unwrap();
            tid_tx.send(gettid()).unwrap();
            done_rx.recv().unwrap();
        });
        let tid = tid_rx.recv().unwrap();

        let pid = std::process::id();
        assert!(task_ids(pid as i32).unwrap().contains(&tid.as_raw_nonzero().get()));

        let entry = ProcessEntry { pid, name: "self".into() };
        let mask = AffinityMask::all(crate::logical_processors());
        HostProcesses.set_affinity(&entry, &mask).unwrap();

        let ours = sched_getaffinity(None).unwrap();
        let theirs = sched_getaffinity(Some(tid)).unwrap();
        assert!((0..CpuSet::MAX_CPU).all(|cpu| ours.is_set(cpu) == theirs.is_set(cpu)));

        done_tx.send(()).unwrap();
        worker.join().unwrap();
    }
}
