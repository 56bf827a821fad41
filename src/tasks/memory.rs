//! Process memory probing for heap-based eviction.

use parking_lot::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Source of the memory figure compared against `cleanup.heapTarget`.
pub trait MemoryProbe: Send + Sync {
    /// Current memory usage in bytes.
    fn used_bytes(&self) -> u64;
}

impl<F> MemoryProbe for F
where
    F: Fn() -> u64 + Send + Sync,
{
    fn used_bytes(&self) -> u64 {
        self()
    }
}

/// Resident set size of the current process, read through `sysinfo`.
pub struct ProcessMemory {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl ProcessMemory {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl Default for ProcessMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for ProcessMemory {
    /// Returns 0 when the process can't be inspected, which never triggers
    /// eviction.
    fn used_bytes(&self) -> u64 {
        let Some(pid) = self.pid else {
            return 0;
        };
        let mut system = self.system.lock();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::new().with_memory(),
        );
        system.process(pid).map(|p| p.memory()).unwrap_or(0)
    }
}
