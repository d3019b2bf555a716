//! Pool configuration (spec §3 ExecPool attributes, §9 Design Notes).
//!
//! The original source's process-wide globals (`_LIMIT_WORKERS_RAM`,
//! `_CHAINED_CONSTRAINTS`) become plain configuration fields here instead of
//! process-global flags, so multiple pools can coexist with independent
//! policies.

use serde::Deserialize;

use crate::error::{Error, Result};

/// Auto-selected latency spans this half-open range (spec §9 Design Notes).
pub const AUTO_LATENCY_MIN_S: f64 = 2.0;
pub const AUTO_LATENCY_SPAN_S: f64 = 1.0;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Configured worker slot count (spec `wks_num`).
    pub wks_num: usize,
    /// Affinity step; `None`/absent disables CPU pinning.
    pub afn_step: Option<u32>,
    /// 0.0 means unlimited.
    pub vm_limit_gb: f64,
    /// 0.0 auto-selects a value in `[2.0, 3.0)` seeded from `wks_num`.
    pub latency_s: f64,
    /// Hardware threads per physical core (for [`crate::affinity::AffinityMap`]).
    pub core_threads: u32,
    /// NUMA node count.
    pub nodes: u32,
    /// Evict-and-reschedule under memory pressure (spec `_CHAINED_CONSTRAINTS`).
    pub chained_constraints: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            wks_num: 1,
            afn_step: None,
            vm_limit_gb: 0.0,
            latency_s: 0.0,
            core_threads: 1,
            nodes: 1,
            chained_constraints: true,
        }
    }
}

impl PoolConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: PoolConfig =
            toml::from_str(s).map_err(|e| Error::ConfigInvalid(format!("invalid TOML: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigInvalid(format!(
                "failed to read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.wks_num == 0 {
            return Err(Error::ConfigInvalid("wks_num must be >= 1".into()));
        }
        if self.vm_limit_gb < 0.0 {
            return Err(Error::ConfigInvalid("vm_limit_gb must be >= 0".into()));
        }
        if self.latency_s < 0.0 {
            return Err(Error::ConfigInvalid("latency_s must be >= 0".into()));
        }
        if self.core_threads == 0 {
            return Err(Error::ConfigInvalid("core_threads must be >= 1".into()));
        }
        if self.nodes == 0 {
            return Err(Error::ConfigInvalid("nodes must be >= 1".into()));
        }
        if let Some(step) = self.afn_step
            && step == 0
        {
            return Err(Error::ConfigInvalid("afn_step must be >= 1".into()));
        }
        Ok(())
    }

    pub fn vm_limit_bytes(&self) -> u64 {
        (self.vm_limit_gb * 1024.0 * 1024.0 * 1024.0).round() as u64
    }

    /// `latency_s == 0.0` auto-selects a value in `[2.0, 3.0)` seeded from
    /// `wks_num`, so two pools configured differently don't wake in lockstep,
    /// but the same config always yields the same tick cadence (spec §9).
    pub fn effective_latency_s(&self) -> f64 {
        if self.latency_s == 0.0 {
            auto_latency_s(self.wks_num)
        } else {
            self.latency_s
        }
    }
}

fn auto_latency_s(wks_num: usize) -> f64 {
    let spread = (wks_num as u64).wrapping_mul(2_654_435_761) % 1000;
    AUTO_LATENCY_MIN_S + AUTO_LATENCY_SPAN_S * (spread as f64 / 1000.0)
}
