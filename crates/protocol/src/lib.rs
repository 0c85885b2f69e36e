use serde::{Deserialize, Serialize};
use std::fmt;

pub type HeroId = u64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    #[default]
    Common,
    Rare,
    SuperRare,
    Epic,
    Legend,
    SuperLegend,
}

impl Rarity {
    pub fn index(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Common => "Common",
            Self::Rare => "Rare",
            Self::SuperRare => "SuperRare",
            Self::Epic => "Epic",
            Self::Legend => "Legend",
            Self::SuperLegend => "SuperLegend",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeroState {
    Work,
    #[default]
    Sleep,
    Home,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shield {
    pub current: i64,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hero {
    pub id: HeroId,
    #[serde(default)]
    pub rarity: Rarity,
    #[serde(default)]
    pub hero_type: u8,
    pub energy: i64,
    pub max_energy: i64,
    pub speed: u32,
    /// Bombs the hero may have in flight at once.
    pub capacity: u32,
    pub range: u32,
    pub damage: i64,
    #[serde(default)]
    pub state: HeroState,
    #[serde(default)]
    pub shields: Vec<Shield>,
}

impl Hero {
    pub fn energy_percent(&self) -> f64 {
        if self.max_energy <= 0 {
            return 0.0;
        }
        self.energy as f64 / self.max_energy as f64 * 100.0
    }

    pub fn shield_sum(&self) -> i64 {
        self.shields.iter().map(|s| s.current).sum()
    }

    pub fn has_shield(&self) -> bool {
        !self.shields.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub i: i64,
    pub j: i64,
}

impl Position {
    pub const fn new(i: i64, j: i64) -> Self {
        Self { i, j }
    }

    pub fn manhattan(self, other: Position) -> u64 {
        self.i.abs_diff(other.i) + self.j.abs_diff(other.j)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.i, self.j)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Rock,
    Wood,
    /// Holds a hero; destroying it grants the hero.
    Cage,
    Chest,
    Other,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rock => "Rock",
            Self::Wood => "Wood",
            Self::Cage => "Cage",
            Self::Chest => "Chest",
            Self::Other => "Other",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub pos: Position,
    pub kind: BlockKind,
    pub hp: i64,
    pub max_hp: i64,
}

/// Absolute hit points of one block after a strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHp {
    pub pos: Position,
    pub hp: i64,
}

/// Hero state change confirmed by the backend. `energy` is absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroUpdate {
    pub id: HeroId,
    pub energy: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct House {
    pub id: u64,
    pub slots: usize,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    pub network: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: f64,
}

pub mod rewards {
    pub const KEY: &str = "Key";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enemy {
    pub id: u64,
    pub hp: i64,
    pub max_hp: i64,
}

impl Enemy {
    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryMap {
    pub door: Position,
    /// Destructible blocks of the instanced map.
    pub positions: Vec<Position>,
    pub enemies: Vec<Enemy>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryDetails {
    pub max_level: u32,
    /// Heroes that already played the current story progress.
    pub played_heroes: Vec<HeroId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoorReward {
    pub rewards: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrikeRequest {
    pub hero_id: HeroId,
    pub hero_type: u8,
    pub bomb_id: u32,
    pub pos: Position,
}

/// Positive response to a strike. `energy` is what the hero has left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrikeOutcome {
    pub energy: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplosionResult {
    pub hero_id: HeroId,
    /// Energy consumed by this strike (a delta, not the remaining energy).
    pub energy_spent: i64,
    pub blocks: Vec<BlockHp>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryExplosionResult {
    /// Blocks destroyed by the strike.
    pub blocks: Vec<Position>,
    /// Enemies spawned by the strike.
    pub enemies: Vec<Enemy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyDamage {
    pub id: u64,
    pub hp: i64,
}

/// Every remote event the engine mirrors into its local state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum Delta {
    MapLoaded(Vec<Block>),
    SquadLoaded(Vec<Hero>),
    HeroSlept(HeroUpdate),
    HeroWentHome(HeroUpdate),
    HeroWentToWork(HeroUpdate),
    Explosion(ExplosionResult),
    StoryExplosion(StoryExplosionResult),
    EnemyDamaged(EnemyDamage),
}

impl Delta {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MapLoaded(_) => "map_loaded",
            Self::SquadLoaded(_) => "squad_loaded",
            Self::HeroSlept(_) => "hero_slept",
            Self::HeroWentHome(_) => "hero_went_home",
            Self::HeroWentToWork(_) => "hero_went_to_work",
            Self::Explosion(_) => "explosion",
            Self::StoryExplosion(_) => "story_explosion",
            Self::EnemyDamaged(_) => "enemy_damaged",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMode {
    #[default]
    Starting,
    Treasure,
    Amazon,
    Adventure,
    Sleeping,
}

impl fmt::Display for PlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Starting => "starting",
            Self::Treasure => "Treasure",
            Self::Amazon => "Amazon",
            Self::Adventure => "Adventure",
            Self::Sleeping => "sleep for 10 seconds",
        };
        f.write_str(text)
    }
}
