//! Tunable parameters for the needs/vitals mechanics.
//!
//! All values live on the 0-100 integer scale used by
//! [`CitizenAgent`](crate::citizen::CitizenAgent). Defaults are calibrated
//! so that an idle agent declines slowly and a well-directed agent can keep
//! all four needs healthy indefinitely.

use serde::Deserialize;

/// Configuration of need decay, restoration, and health coupling.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NeedsConfig {
    /// Amount every need decays each tick.
    #[serde(default = "default_decay_per_tick")]
    pub decay_per_tick: u32,

    /// Needs strictly below this value are critical and drain health.
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: u32,

    /// Needs strictly below this value are flagged `low` in feedback.
    #[serde(default = "default_low_threshold")]
    pub low_threshold: u32,

    /// Amount a zone restores of its primary need each tick.
    #[serde(default = "default_primary_restore")]
    pub primary_restore: u32,

    /// Amount a zone restores of its secondary need each tick, if it has one.
    #[serde(default = "default_secondary_restore")]
    pub secondary_restore: u32,

    /// Health lost per critical need per tick.
    #[serde(default = "default_health_damage_per_critical")]
    pub health_damage_per_critical: u32,

    /// Health regained per tick when no need is critical.
    #[serde(default = "default_natural_heal_rate")]
    pub natural_heal_rate: u32,

    /// Lower bound of randomized initial need levels.
    #[serde(default = "default_initial_need_min")]
    pub initial_need_min: u32,

    /// Upper bound of randomized initial need levels.
    #[serde(default = "default_initial_need_max")]
    pub initial_need_max: u32,
}

impl Default for NeedsConfig {
    fn default() -> Self {
        Self {
            decay_per_tick: default_decay_per_tick(),
            critical_threshold: default_critical_threshold(),
            low_threshold: default_low_threshold(),
            primary_restore: default_primary_restore(),
            secondary_restore: default_secondary_restore(),
            health_damage_per_critical: default_health_damage_per_critical(),
            natural_heal_rate: default_natural_heal_rate(),
            initial_need_min: default_initial_need_min(),
            initial_need_max: default_initial_need_max(),
        }
    }
}

const fn default_decay_per_tick() -> u32 {
    5
}

const fn default_critical_threshold() -> u32 {
    25
}

const fn default_low_threshold() -> u32 {
    40
}

const fn default_primary_restore() -> u32 {
    40
}

const fn default_secondary_restore() -> u32 {
    15
}

const fn default_health_damage_per_critical() -> u32 {
    3
}

const fn default_natural_heal_rate() -> u32 {
    1
}

const fn default_initial_need_min() -> u32 {
    40
}

const fn default_initial_need_max() -> u32 {
    75
}
