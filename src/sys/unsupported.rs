use crate::{ AffinityMask, Error, PrivilegeChecker, ProcessDirectory, ProcessEntry, Result };

pub struct HostPrivilege;

impl PrivilegeChecker for HostPrivilege {
    fn is_elevated(&self) -> Result<bool> {
        Err(Error::Unsupported)
    }
}

pub struct HostProcesses;

impl ProcessDirectory for HostProcesses {
    fn processes_named(&self, _name: &str) -> Result<Vec<ProcessEntry>> {
        Err(Error::Unsupported)
    }

    fn set_affinity(&self, _process: &ProcessEntry, _mask: &AffinityMask) -> Result<()> {
        Err(Error::Unsupported)
    }
}

pub fn logical_processors() -> Result<usize> {
    Err(Error::Unsupported)
}
