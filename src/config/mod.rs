//! Runtime configuration: module toggles plus the numeric constants
//! referenced throughout the cognitive subsystems (promotion thresholds,
//! HDC dimension, decay time constant, strength ceiling, ...).
//!
//! Grounded on `config::CognitiveConfig`'s preset-constructor style
//! (`human()`/`supercomputer()`), generalised from cycle timing to the
//! solve loop's module toggles and tunables. Re-read at the start of
//! each solve rather than cached, per the module-toggle guidance.

use serde::{Deserialize, Serialize};

/// Per-subsystem enable flags, checked at the start of each solve. A
/// disabled subsystem is bypassed entirely (e.g. disabling `gut` skips
/// aggregation and always yields `Uncertain`) rather than merely muted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModuleToggles {
    pub hdc: bool,
    pub aif: bool,
    pub ebbinghaus: bool,
    pub gut: bool,
    pub emotions: bool,
    pub stm: bool,
    pub symbolic_regression: bool,
    pub cross_domain: bool,
    pub reflection: bool,
}

impl Default for ModuleToggles {
    fn default() -> Self {
        Self {
            hdc: true,
            aif: true,
            ebbinghaus: true,
            gut: true,
            emotions: true,
            stm: true,
            symbolic_regression: true,
            cross_domain: true,
            reflection: true,
        }
    }
}

impl ModuleToggles {
    /// All subsystems enabled: the default operating mode.
    #[must_use]
    pub fn all_enabled() -> Self {
        Self::default()
    }

    /// Every subsystem off except the deterministic/promoted tiers,
    /// useful as an ablation baseline.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            hdc: false,
            aif: false,
            ebbinghaus: false,
            gut: false,
            emotions: false,
            stm: false,
            symbolic_regression: false,
            cross_domain: false,
            reflection: false,
        }
    }
}

/// Numeric constants shared by the cognitive subsystems, collected so
/// they are not scattered as magic numbers across modules. Defaults
/// mirror the reference values each subsystem documents individually.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tunables {
    /// Hypervector dimensionality used by the executor's encoder.
    pub hv_dim: usize,
    /// Distinct-success threshold for S2 -> S1 promotion.
    pub promote_s1_min_wins: u32,
    /// Total-success threshold for S1 -> S0 promotion.
    pub promote_s0_min_wins: u32,
    /// Window (in attempts) within which a first-try solve counts toward
    /// S1 -> S0 promotion.
    pub first_try_window: u32,
    /// Ebbinghaus decay time constant, in seconds.
    pub tau_seconds: f32,
    /// Retention floor below which a record is garbage-collected.
    pub decay_threshold: f32,
    /// Ceiling on episodic-record strength.
    pub max_strength: f32,
    /// Batches making up one circadian day.
    pub batches_per_day: u32,
    /// NREM+REM pass pairs run per `run_sleep_cycle` call.
    pub cycles_per_night: u32,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            hv_dim: 4096,
            promote_s1_min_wins: 3,
            promote_s0_min_wins: 5,
            first_try_window: 10,
            tau_seconds: crate::memory::TAU_SECONDS,
            decay_threshold: crate::memory::DECAY_THRESHOLD,
            max_strength: crate::memory::MAX_STRENGTH,
            batches_per_day: 48,
            cycles_per_night: 4,
        }
    }
}

impl Tunables {
    /// A higher-dimensional research preset (D=10000): more separation
    /// between concept prototypes at the cost of more compute per bind.
    #[must_use]
    pub fn research() -> Self {
        Self {
            hv_dim: 10_000,
            ..Self::default()
        }
    }
}

/// Top-level configuration: module toggles plus tunables, re-read by the
/// caller at each solve boundary rather than cached inside `Core`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(flatten)]
    pub toggles: ModuleToggles,
    #[serde(flatten)]
    pub tunables: Tunables,
}

impl Config {
    #[must_use]
    pub fn research() -> Self {
        Self {
            toggles: ModuleToggles::all_enabled(),
            tunables: Tunables::research(),
        }
    }

    #[must_use]
    pub fn minimal() -> Self {
        Self {
            toggles: ModuleToggles::minimal(),
            tunables: Tunables::default(),
        }
    }

    /// Load from a JSON file, falling back to all-modules-enabled
    /// defaults on any read or parse error (per the "config read error"
    /// recovery policy: proceed rather than fail the whole process).
    pub fn load_or_default(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(error = %e, path = %path.display(), "config file unparsable, using defaults");
                Self::default()
            }),
            Err(e) => {
                tracing::debug!(error = %e, path = %path.display(), "no config file, using defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_enables_every_module() {
        let config = Config::default();
        assert!(config.toggles.hdc);
        assert!(config.toggles.reflection);
    }

    #[test]
    fn minimal_config_disables_every_module() {
        let config = Config::minimal();
        assert!(!config.toggles.hdc);
        assert!(!config.toggles.gut);
    }

    #[test]
    fn research_preset_raises_hv_dim_without_touching_toggles() {
        let config = Config::research();
        assert_eq!(config.tunables.hv_dim, 10_000);
        assert!(config.toggles.aif);
    }

    #[test]
    fn load_or_default_falls_back_on_missing_file() {
        let config = Config::load_or_default(std::path::Path::new("/nonexistent/cascade-core-config.json"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = Config::research();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
