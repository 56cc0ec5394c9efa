//! The needs-driven citizen archetype.
//!
//! A citizen lives in one of four zones and carries four needs on a 0-100
//! scale. Executing a command moves the citizen, then applies the per-tick
//! state transitions in a fixed order:
//!
//! 1. Move to the commanded zone (idle stays put)
//! 2. Decay every need by `decay_per_tick`
//! 3. Apply the current zone's restoration (primary and, where present,
//!    secondary need)
//! 4. Apply the health rule: each critical need drains health; no critical
//!    needs lets health recover slowly
//! 5. Check for death (health 0)
//!
//! All arithmetic is checked or saturating. A dead citizen stays in the
//! roster -- it acknowledges every further command with an inert feedback
//! payload and mutates nothing.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use vivarium_types::commands::{Command, CommandAction};
use vivarium_types::events::Payload;
use vivarium_types::ids::AgentId;

use crate::config::NeedsConfig;
use crate::error::AgentError;

/// Upper bound of every need value.
pub const NEED_MAX: u32 = 100;

/// Upper bound of the health value.
pub const HEALTH_MAX: u32 = 100;

/// The zones of the simulated world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    /// Home. Restores energy.
    Home,
    /// The office. Restores work.
    Work,
    /// The cafe. Restores hunger, and a little social.
    Cafe,
    /// The park. Restores social, and a little energy.
    Park,
}

impl Zone {
    /// The snake_case name of this zone.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Work => "work",
            Self::Cafe => "cafe",
            Self::Park => "park",
        }
    }

    /// The zone a movement action leads to, or `None` for idle.
    pub const fn for_action(action: CommandAction) -> Option<Self> {
        match action {
            CommandAction::Idle => None,
            CommandAction::GoHome => Some(Self::Home),
            CommandAction::GoWork => Some(Self::Work),
            CommandAction::GoCafe => Some(Self::Cafe),
            CommandAction::GoPark => Some(Self::Park),
        }
    }

    /// The need this zone restores, plus an optional secondary need.
    pub const fn restores(self) -> (Need, Option<Need>) {
        match self {
            Self::Home => (Need::Energy, None),
            Self::Work => (Need::Work, None),
            Self::Cafe => (Need::Hunger, Some(Need::Social)),
            Self::Park => (Need::Social, Some(Need::Energy)),
        }
    }
}

impl core::fmt::Display for Zone {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The four needs a citizen maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Need {
    /// Satiation; restored at the cafe.
    Hunger,
    /// Rest; restored at home.
    Energy,
    /// Company; restored at the park.
    Social,
    /// Purpose; restored at the office.
    Work,
}

impl Need {
    /// Every need, in a stable order used for worst-need tie-breaking.
    pub const ALL: [Self; 4] = [Self::Hunger, Self::Energy, Self::Social, Self::Work];

    /// The snake_case name of this need.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hunger => "hunger",
            Self::Energy => "energy",
            Self::Social => "social",
            Self::Work => "work",
        }
    }

    /// The action that restores this need.
    pub const fn remedy(self) -> CommandAction {
        match self {
            Self::Hunger => CommandAction::GoCafe,
            Self::Energy => CommandAction::GoHome,
            Self::Social => CommandAction::GoPark,
            Self::Work => CommandAction::GoWork,
        }
    }
}

impl core::fmt::Display for Need {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Current levels of all four needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Needs {
    /// Satiation level (0-100).
    pub hunger: u32,
    /// Rest level (0-100).
    pub energy: u32,
    /// Company level (0-100).
    pub social: u32,
    /// Purpose level (0-100).
    pub work: u32,
}

impl Needs {
    /// Start every need at the same level.
    pub const fn uniform(level: u32) -> Self {
        Self {
            hunger: level,
            energy: level,
            social: level,
            work: level,
        }
    }

    /// The current level of one need.
    pub const fn level(&self, need: Need) -> u32 {
        match need {
            Need::Hunger => self.hunger,
            Need::Energy => self.energy,
            Need::Social => self.social,
            Need::Work => self.work,
        }
    }

    /// The lowest need and its level. Ties resolve in [`Need::ALL`] order.
    pub fn worst(&self) -> (Need, u32) {
        let mut worst = (Need::Hunger, self.hunger);
        for need in Need::ALL {
            let level = self.level(need);
            if level < worst.1 {
                worst = (need, level);
            }
        }
        worst
    }

    /// Decay every need by `amount`, flooring at zero.
    fn decay(&mut self, amount: u32) {
        self.hunger = self.hunger.saturating_sub(amount);
        self.energy = self.energy.saturating_sub(amount);
        self.social = self.social.saturating_sub(amount);
        self.work = self.work.saturating_sub(amount);
    }

    /// Restore one need by `amount`, capping at [`NEED_MAX`].
    fn restore(&mut self, need: Need, amount: u32) {
        let restored = self.level(need).saturating_add(amount).min(NEED_MAX);
        match need {
            Need::Hunger => self.hunger = restored,
            Need::Energy => self.energy = restored,
            Need::Social => self.social = restored,
            Need::Work => self.work = restored,
        }
    }

    /// Count of needs strictly below `threshold`.
    fn count_below(&self, threshold: u32) -> u32 {
        let mut count = 0u32;
        for need in Need::ALL {
            if self.level(need) < threshold {
                count = count.saturating_add(1);
            }
        }
        count
    }
}

/// Coarse health of a citizen's needs, reported in feedback so the decision
/// engine can see which agents require attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedStatus {
    /// Every need is at or above the low threshold.
    Ok,
    /// At least one need is below the low threshold.
    Low,
    /// At least one need is below the critical threshold; health is draining.
    Dying,
}

impl NeedStatus {
    /// The snake_case name of this status.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Low => "low",
            Self::Dying => "dying",
        }
    }
}

/// An agent with needs, a zone, and a survival instinct it does not get to
/// exercise -- the decision engine chooses where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitizenAgent {
    id: AgentId,
    name: String,
    zone: Zone,
    needs: Needs,
    health: u32,
    alive: bool,
    death_cause: Option<Need>,
    config: NeedsConfig,
}

impl CitizenAgent {
    /// Create a citizen at home with the given initial need levels.
    pub const fn new(id: AgentId, name: String, needs: Needs, config: NeedsConfig) -> Self {
        Self {
            id,
            name,
            zone: Zone::Home,
            needs,
            health: HEALTH_MAX,
            alive: true,
            death_cause: None,
            config,
        }
    }

    /// Create a citizen with need levels drawn from the configured initial
    /// range using the provided RNG (seeded by the caller for reproducible
    /// rosters).
    pub fn with_random_needs(
        id: AgentId,
        name: String,
        config: NeedsConfig,
        rng: &mut impl Rng,
    ) -> Self {
        let low = config.initial_need_min.min(config.initial_need_max);
        let high = config.initial_need_max.max(config.initial_need_min).min(NEED_MAX);
        let mut draw = || rng.random_range(low..=high);
        let needs = Needs {
            hunger: draw(),
            energy: draw(),
            social: draw(),
            work: draw(),
        };
        Self::new(id, name, needs, config)
    }

    /// This citizen's id.
    pub const fn id(&self) -> &AgentId {
        &self.id
    }

    /// This citizen's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The zone the citizen currently occupies.
    pub const fn zone(&self) -> Zone {
        self.zone
    }

    /// Current need levels.
    pub const fn needs(&self) -> Needs {
        self.needs
    }

    /// Current health (0-100).
    pub const fn health(&self) -> u32 {
        self.health
    }

    /// Whether the citizen is alive.
    pub const fn is_alive(&self) -> bool {
        self.alive
    }

    /// The need that killed this citizen, if it has died.
    pub const fn death_cause(&self) -> Option<Need> {
        self.death_cause
    }

    /// Coarse need status under the configured thresholds.
    pub fn status(&self) -> NeedStatus {
        let (_, worst) = self.needs.worst();
        if worst < self.config.critical_threshold {
            NeedStatus::Dying
        } else if worst < self.config.low_threshold {
            NeedStatus::Low
        } else {
            NeedStatus::Ok
        }
    }

    /// Execute one command and return the observation payload.
    ///
    /// Total over valid commands: idle and movement both produce a full
    /// observation. A dead citizen produces an inert acknowledgement and
    /// mutates nothing.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ArithmeticOverflow`] if the health damage
    /// computation overflows (only reachable with absurd configuration).
    pub fn execute(&mut self, command: &Command) -> Result<Payload, AgentError> {
        if !self.alive {
            return Ok(self.inert_observation(command.action));
        }

        if let Some(zone) = Zone::for_action(command.action) {
            self.zone = zone;
        }

        self.needs.decay(self.config.decay_per_tick);

        let (primary, secondary) = self.zone.restores();
        self.needs.restore(primary, self.config.primary_restore);
        if let Some(need) = secondary {
            self.needs.restore(need, self.config.secondary_restore);
        }

        self.apply_health_rule()?;

        if self.health == 0 {
            self.alive = false;
            let (cause, _) = self.needs.worst();
            self.death_cause = Some(cause);
        }

        Ok(self.observation(command.action))
    }

    /// Apply health drain for critical needs, or slow recovery when none
    /// are critical.
    fn apply_health_rule(&mut self) -> Result<(), AgentError> {
        let critical = self.needs.count_below(self.config.critical_threshold);
        if critical > 0 {
            let damage = self
                .config
                .health_damage_per_critical
                .checked_mul(critical)
                .ok_or_else(|| AgentError::ArithmeticOverflow {
                    context: String::from("health damage multiplication"),
                })?;
            self.health = self.health.saturating_sub(damage);
        } else {
            self.health = self
                .health
                .saturating_add(self.config.natural_heal_rate)
                .min(HEALTH_MAX);
        }
        Ok(())
    }

    /// Build the observation payload for a live citizen.
    fn observation(&self, action: CommandAction) -> Payload {
        let (worst, worst_level) = self.needs.worst();
        let mut payload = Payload::new();
        payload.insert("action".to_owned(), json!(action.as_str()));
        payload.insert("alive".to_owned(), json!(self.alive));
        payload.insert("zone".to_owned(), json!(self.zone.as_str()));
        payload.insert("health".to_owned(), json!(self.health));
        payload.insert(
            "needs".to_owned(),
            json!({
                "hunger": self.needs.hunger,
                "energy": self.needs.energy,
                "social": self.needs.social,
                "work": self.needs.work,
            }),
        );
        payload.insert("status".to_owned(), json!(self.status().as_str()));
        payload.insert("worst_need".to_owned(), json!(worst.as_str()));
        payload.insert("worst_level".to_owned(), json!(worst_level));
        payload.insert("remedy".to_owned(), json!(worst.remedy().as_str()));
        if let Some(cause) = self.death_cause {
            payload.insert("death_cause".to_owned(), json!(cause.as_str()));
        }
        payload
    }

    /// Build the inert acknowledgement a dead citizen returns.
    fn inert_observation(&self, action: CommandAction) -> Payload {
        let mut payload = Payload::new();
        payload.insert("action".to_owned(), json!(action.as_str()));
        payload.insert("alive".to_owned(), json!(false));
        payload.insert("zone".to_owned(), json!(self.zone.as_str()));
        payload.insert("health".to_owned(), json!(0));
        if let Some(cause) = self.death_cause {
            payload.insert("death_cause".to_owned(), json!(cause.as_str()));
        }
        payload
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use vivarium_types::commands::Command;

    use super::*;

    fn command(action: CommandAction) -> Command {
        Command::new(AgentId::new("alice"), action)
    }

    fn citizen(needs: Needs) -> CitizenAgent {
        CitizenAgent::new(
            AgentId::new("alice"),
            String::from("Alice"),
            needs,
            NeedsConfig::default(),
        )
    }

    #[test]
    fn idle_decays_and_restores_home_energy() {
        let mut agent = citizen(Needs::uniform(60));
        let payload = agent.execute(&command(CommandAction::Idle)).unwrap();

        // Still at home: energy decays 5 then restores 40 (capped at 100).
        assert_eq!(agent.zone(), Zone::Home);
        assert_eq!(agent.needs().energy, 95);
        // The other needs only decay.
        assert_eq!(agent.needs().hunger, 55);
        assert_eq!(agent.needs().social, 55);
        assert_eq!(agent.needs().work, 55);
        assert_eq!(payload.get("alive"), Some(&serde_json::json!(true)));
    }

    #[test]
    fn movement_changes_zone_before_effects() {
        let mut agent = citizen(Needs::uniform(50));
        agent.execute(&command(CommandAction::GoCafe)).unwrap();

        assert_eq!(agent.zone(), Zone::Cafe);
        // hunger: 50 - 5 + 40 = 85; social: 50 - 5 + 15 = 60.
        assert_eq!(agent.needs().hunger, 85);
        assert_eq!(agent.needs().social, 60);
        // energy and work only decay.
        assert_eq!(agent.needs().energy, 45);
        assert_eq!(agent.needs().work, 45);
    }

    #[test]
    fn critical_needs_drain_health() {
        let mut agent = citizen(Needs {
            hunger: 10,
            energy: 10,
            social: 80,
            work: 80,
        });
        agent.execute(&command(CommandAction::GoPark)).unwrap();

        // hunger 5 and energy 5+15=20 are both below the critical
        // threshold of 25 after decay: 2 critical needs, 3 damage each.
        assert_eq!(agent.health(), HEALTH_MAX - 6);
        assert_eq!(agent.status(), NeedStatus::Dying);
    }

    #[test]
    fn healthy_citizen_recovers_health() {
        // Run the citizen critical for a few ticks to lose health, then
        // keep it comfortable and watch health climb back.
        let mut agent = citizen(Needs {
            hunger: 10,
            energy: 90,
            social: 90,
            work: 90,
        });
        agent.execute(&command(CommandAction::Idle)).unwrap();
        let drained = agent.health();
        assert!(drained < HEALTH_MAX);

        agent.execute(&command(CommandAction::GoCafe)).unwrap();
        agent.execute(&command(CommandAction::Idle)).unwrap();
        assert!(agent.health() > drained);
    }

    #[test]
    fn starvation_eventually_kills() {
        let config = NeedsConfig {
            decay_per_tick: 30,
            health_damage_per_critical: 40,
            ..NeedsConfig::default()
        };
        let mut agent = CitizenAgent::new(
            AgentId::new("alice"),
            String::from("Alice"),
            Needs::uniform(30),
            config,
        );

        let mut died = false;
        for _ in 0..10 {
            let payload = agent.execute(&command(CommandAction::GoWork)).unwrap();
            if payload.get("alive") == Some(&serde_json::json!(false)) {
                died = true;
                break;
            }
        }
        assert!(died, "citizen should have died under aggressive decay");
        assert!(!agent.is_alive());
        assert!(agent.death_cause().is_some());
    }

    #[test]
    fn dead_citizen_is_inert() {
        let config = NeedsConfig {
            decay_per_tick: 100,
            health_damage_per_critical: 100,
            ..NeedsConfig::default()
        };
        let mut agent = CitizenAgent::new(
            AgentId::new("alice"),
            String::from("Alice"),
            Needs::uniform(10),
            config,
        );
        agent.execute(&command(CommandAction::Idle)).unwrap();
        assert!(!agent.is_alive());

        let needs_at_death = agent.needs();
        let payload = agent.execute(&command(CommandAction::GoCafe)).unwrap();
        // No mutation after death, and the acknowledgement says so.
        assert_eq!(agent.needs(), needs_at_death);
        assert_eq!(payload.get("alive"), Some(&serde_json::json!(false)));
        assert!(payload.contains_key("death_cause"));
    }

    #[test]
    fn worst_need_ties_resolve_stably() {
        let needs = Needs::uniform(30);
        let (need, level) = needs.worst();
        assert_eq!(need, Need::Hunger);
        assert_eq!(level, 30);
    }

    #[test]
    fn random_needs_stay_in_range() {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let config = NeedsConfig::default();
        let agent = CitizenAgent::with_random_needs(
            AgentId::new("alice"),
            String::from("Alice"),
            config.clone(),
            &mut rng,
        );
        for need in Need::ALL {
            let level = agent.needs().level(need);
            assert!(level >= config.initial_need_min);
            assert!(level <= config.initial_need_max);
        }
    }

    #[test]
    fn observation_carries_remedy_for_worst_need() {
        let mut agent = citizen(Needs {
            hunger: 20,
            energy: 80,
            social: 80,
            work: 80,
        });
        let payload = agent.execute(&command(CommandAction::Idle)).unwrap();
        assert_eq!(payload.get("worst_need"), Some(&serde_json::json!("hunger")));
        assert_eq!(payload.get("remedy"), Some(&serde_json::json!("go_cafe")));
    }
}
