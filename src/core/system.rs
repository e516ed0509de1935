use sysinfo::{Pid, System};

/// Returns the resident memory of the current process, in mebibytes.
///
/// Used by the periodic progress records of the engine; returns 0 when the
/// information is unavailable on the platform.
#[must_use]
pub(crate) fn process_memory_mb() -> u64 {
    let pid = Pid::from_u32(std::process::id());
    let mut system = System::new();
    if !system.refresh_process(pid) {
        return 0;
    }
    system.process(pid).map_or(0, |p| p.memory() >> 20)
}
