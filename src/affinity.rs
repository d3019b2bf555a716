//! CPU-affinity policy for worker slots (spec §4.1).
//!
//! Given a worker slot index, map it to a CPU id that honors NUMA layout:
//! when hardware threads are enumerated interleaved across nodes (node 0
//! gets even ids, node 1 odd, and so on), the map skips non-primary hardware
//! threads so each worker gets a distinct physical core before any core is
//! reused via hyperthreading.

use crate::error::{Error, Result};

/// Maps worker slot indices to CPU ids.
///
/// A missing `afn_step` (the caller never configured one) makes the map a
/// no-op: `cpu_for_slot` always returns `None` and pinning is skipped
/// entirely, which is the default for multi-threaded workers that manage
/// their own affinity.
#[derive(Debug, Clone, Copy)]
pub struct AffinityMap {
    core_threads: u32,
    nodes: u32,
    afn_step: Option<u32>,
}

impl AffinityMap {
    /// `core_threads` is hardware threads per physical core (2 for SMT/HT,
    /// 1 if disabled). `nodes` is the NUMA node count. `afn_step` is the
    /// caller-configured affinity step; `None` disables pinning.
    pub fn new(core_threads: u32, nodes: u32, afn_step: Option<u32>) -> Result<Self> {
        if core_threads == 0 {
            return Err(Error::ConfigInvalid(
                "core_threads must be >= 1".to_string(),
            ));
        }
        if nodes == 0 {
            return Err(Error::ConfigInvalid("nodes must be >= 1".to_string()));
        }
        if let Some(step) = afn_step
            && step == 0
        {
            return Err(Error::ConfigInvalid("afn_step must be >= 1".to_string()));
        }
        Ok(AffinityMap {
            core_threads,
            nodes,
            afn_step,
        })
    }

    /// CPU id for a given worker slot, or `None` if affinity is disabled.
    pub fn cpu_for_slot(&self, slot_index: usize) -> Option<u32> {
        let step = self.afn_step?;
        let i = slot_index as u32 * step;
        Some(i + (i / self.nodes) * self.nodes * (self.core_threads - 1))
    }

    /// Pin the current OS thread to the CPU mapped to `slot_index`. A no-op
    /// (returns `Ok(())` without pinning) when affinity is disabled or the
    /// platform has no affinity facility.
    pub fn pin_current_thread(&self, slot_index: usize) -> Result<()> {
        let Some(cpu) = self.cpu_for_slot(slot_index) else {
            return Ok(());
        };
        pin_thread_to_cpu(cpu)
    }
}

#[cfg(target_os = "linux")]
fn pin_thread_to_cpu(cpu: u32) -> Result<()> {
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu as usize, &mut set);
        let rc = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set);
        if rc != 0 {
            return Err(Error::ConfigInvalid(format!(
                "sched_setaffinity(cpu={cpu}) failed: {}",
                std::io::Error::last_os_error()
            )));
        }
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn pin_thread_to_cpu(_cpu: u32) -> Result<()> {
    tracing::debug!("CPU affinity pinning is not implemented on this platform; skipping");
    Ok(())
}
