use hunter_protocol::HeroId;
use serde::Deserialize;

/// Knobs of a bot session. Every field has a default so partial config files work.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub network: String,
    /// Client version; compared against the latest published one.
    pub version: u32,
    /// Resource-shield mode: alternate strikes, shields gate work and home.
    pub mode_amazon: bool,
    pub mode_adventure: bool,
    pub min_hero_energy_percentage: f64,
    /// Heroes that always win a home slot.
    pub house_heroes: Vec<HeroId>,
    /// When non-empty, only these heroes play adventure.
    pub adventure_heroes: Vec<HeroId>,
    pub alert_shield: i64,
    pub num_hero_work: usize,
    pub force_exit: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            network: "BSC".to_string(),
            version: 1,
            mode_amazon: true,
            mode_adventure: false,
            min_hero_energy_percentage: 90.0,
            house_heroes: Vec::new(),
            adventure_heroes: Vec::new(),
            alert_shield: 0,
            num_hero_work: 15,
            force_exit: true,
        }
    }
}

impl BotConfig {
    pub fn is_house_hero(&self, id: HeroId) -> bool {
        self.house_heroes.contains(&id)
    }

    pub fn may_adventure(&self, id: HeroId) -> bool {
        self.adventure_heroes.is_empty() || self.adventure_heroes.contains(&id)
    }
}
