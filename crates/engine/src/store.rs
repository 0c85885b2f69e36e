//! Local mirrors of the remote squad and treasure map.

use hunter_protocol::{Block, BlockKind, Hero, HeroId, HeroState, Position};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Energy part of a hero patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyPatch {
    Keep,
    /// Absolute value; replaying it is harmless.
    Set(i64),
    /// Delta; replaying it subtracts twice.
    Spend(i64),
}

#[derive(Debug, Clone, Default)]
pub struct Squad {
    heroes: Vec<Hero>,
}

impl Squad {
    pub fn new(heroes: Vec<Hero>) -> Self {
        Self { heroes }
    }

    pub fn apply_full(&mut self, heroes: Vec<Hero>) {
        self.heroes = heroes;
    }

    pub fn heroes(&self) -> &[Hero] {
        &self.heroes
    }

    pub fn len(&self) -> usize {
        self.heroes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heroes.is_empty()
    }

    pub fn get(&self, id: HeroId) -> Option<&Hero> {
        self.heroes.iter().find(|h| h.id == id)
    }

    pub fn by_state(&self, state: HeroState) -> Vec<&Hero> {
        self.heroes.iter().filter(|h| h.state == state).collect()
    }

    pub fn working(&self) -> Vec<&Hero> {
        self.by_state(HeroState::Work)
    }

    pub fn sleeping(&self) -> Vec<&Hero> {
        self.by_state(HeroState::Sleep)
    }

    pub fn home(&self) -> Vec<&Hero> {
        self.by_state(HeroState::Home)
    }

    pub fn not_working(&self) -> Vec<&Hero> {
        self.heroes
            .iter()
            .filter(|h| h.state != HeroState::Work)
            .collect()
    }

    /// Returns `false` (and logs) when the hero is unknown.
    pub fn patch_hero(&mut self, id: HeroId, energy: EnergyPatch, state: Option<HeroState>) -> bool {
        let Some(hero) = self.heroes.iter_mut().find(|h| h.id == id) else {
            warn!(hero = id, "inconsistency: patch for unknown hero ignored");
            return false;
        };
        match energy {
            EnergyPatch::Keep => {}
            EnergyPatch::Set(value) => hero.energy = value,
            EnergyPatch::Spend(delta) => hero.energy -= delta,
        }
        if let Some(state) = state {
            hero.state = state;
        }
        true
    }
}

/// Damage a hero would deal by striking `pos`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileDamage {
    pub pos: Position,
    pub damage: i64,
}

#[derive(Debug, Clone, Default)]
pub struct TreasureMap {
    blocks: Vec<Block>,
    total_life: i64,
}

impl TreasureMap {
    pub fn new(blocks: Vec<Block>) -> Self {
        let mut map = Self::default();
        map.apply_full(blocks);
        map
    }

    pub fn apply_full(&mut self, blocks: Vec<Block>) {
        self.total_life = blocks.iter().map(|b| b.hp.max(0)).sum();
        self.blocks = blocks;
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, pos: Position) -> Option<&Block> {
        self.blocks.iter().find(|b| b.pos == pos)
    }

    pub fn total_life(&self) -> i64 {
        self.total_life
    }

    pub fn max_life(&self) -> i64 {
        self.blocks.iter().map(|b| b.max_hp).sum()
    }

    /// Sets the absolute hp of one block. Returns `false` (and logs) for unknown cells.
    pub fn patch_block(&mut self, pos: Position, hp: i64) -> bool {
        let Some(block) = self.blocks.iter_mut().find(|b| b.pos == pos) else {
            warn!(%pos, "inconsistency: patch for unknown block ignored");
            return false;
        };
        let hp = hp.max(0);
        self.total_life += hp - block.hp.max(0);
        block.hp = hp;
        true
    }

    pub fn damage_at(&self, hero: &Hero, pos: Position) -> i64 {
        self.block(pos)
            .map(|b| block_damage(hero, b))
            .unwrap_or(0)
    }

    /// Every block in map order with the damage `hero` would deal there.
    pub fn damage_for_map(&self, hero: &Hero) -> Vec<TileDamage> {
        self.blocks
            .iter()
            .map(|b| TileDamage {
                pos: b.pos,
                damage: block_damage(hero, b),
            })
            .collect()
    }

    pub fn remaining_by_kind(&self) -> BTreeMap<BlockKind, usize> {
        let mut out = BTreeMap::new();
        for block in self.blocks.iter().filter(|b| b.hp > 0) {
            *out.entry(block.kind).or_insert(0) += 1;
        }
        out
    }
}

fn block_damage(hero: &Hero, block: &Block) -> i64 {
    if block.hp <= 0 {
        return 0;
    }
    hero.damage.min(block.hp).max(0)
}

impl fmt::Display for TreasureMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let alive = self.blocks.iter().filter(|b| b.hp > 0).count();
        write!(
            f,
            "Total life: {}/{} | Blocks: {}/{}",
            self.total_life,
            self.max_life(),
            alive,
            self.blocks.len()
        )
    }
}
