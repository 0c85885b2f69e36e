//! Target choice and admission control for strikes.
//!
//! Each hero keeps a sticky target until it stops paying off, and may only fire again
//! once it had time to walk from its previous strike (`distance / speed * 500ms`) and
//! still has a free bomb slot.

use crate::slots::{SlotId, SlotTracker};
use crate::store::{TileDamage, TreasureMap};
use hunter_protocol::{Hero, HeroId, Position};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

pub const HISTORY_SIZE: usize = 5;
/// Walking time of one distance unit at speed 1.
pub const MOVE_UNIT: Duration = Duration::from_millis(500);

/// Last cells struck by any hero, oldest first.
#[derive(Debug, Clone, Default)]
pub struct RecencyHistory {
    cells: VecDeque<Position>,
}

impl RecencyHistory {
    /// Re-committing a cell moves it to the back instead of duplicating it.
    pub fn push(&mut self, pos: Position) {
        self.cells.retain(|p| *p != pos);
        self.cells.push_back(pos);
        while self.cells.len() > HISTORY_SIZE {
            self.cells.pop_front();
        }
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.cells.contains(&pos)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.cells.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cooldown {
    pub at: Instant,
    pub pos: Position,
}

/// Per-run dispatch state shared by every hero's action task.
#[derive(Debug, Default)]
pub struct Dispatcher {
    cooldowns: HashMap<HeroId, Cooldown>,
    sticky: HashMap<HeroId, TileDamage>,
    history: RecencyHistory,
    slots: SlotTracker,
}

impl Dispatcher {
    pub fn reset(&mut self) {
        self.cooldowns.clear();
        self.sticky.clear();
        self.history = RecencyHistory::default();
        self.slots.clear();
    }

    pub fn history(&self) -> &RecencyHistory {
        &self.history
    }

    pub fn sticky(&self, hero: HeroId) -> Option<TileDamage> {
        self.sticky.get(&hero).copied()
    }

    pub fn outstanding(&self, hero: HeroId) -> usize {
        self.slots.outstanding(hero)
    }

    pub fn next_target(&mut self, hero: &Hero, map: &TreasureMap) -> Option<TileDamage> {
        if let Some(current) = self.sticky.get(&hero.id).copied() {
            if map.damage_at(hero, current.pos) > 0 {
                return Some(current);
            }
        }

        let candidates: Vec<TileDamage> = map
            .damage_for_map(hero)
            .into_iter()
            .filter(|t| t.damage > 0)
            .collect();

        let selected = if candidates.len() <= HISTORY_SIZE {
            candidates.first()
        } else {
            candidates
                .iter()
                .find(|t| !self.history.contains(t.pos))
                .or_else(|| candidates.first())
        }
        .copied();

        match selected {
            Some(target) => {
                self.sticky.insert(hero.id, target);
            }
            None => {
                self.sticky.remove(&hero.id);
            }
        }
        selected
    }

    /// Minimum time since the hero's previous strike before it may strike `target`.
    pub fn required_wait(&self, hero: &Hero, target: Position) -> Duration {
        let Some(last) = self.cooldowns.get(&hero.id) else {
            return Duration::ZERO;
        };
        let distance = target.manhattan(last.pos) as f64;
        MOVE_UNIT.mul_f64(distance / f64::from(hero.speed.max(1)))
    }

    pub fn admit(&self, hero: &Hero, target: Position, now: Instant) -> bool {
        let walked = match self.cooldowns.get(&hero.id) {
            Some(last) => now.saturating_duration_since(last.at) >= self.required_wait(hero, target),
            None => true,
        };
        walked && self.slots.outstanding(hero.id) < hero.capacity as usize
    }

    /// Commits a strike: takes a slot, stamps the cooldown, advances the sticky target
    /// and records the cell. `None` when no slot is free.
    pub fn begin(
        &mut self,
        hero: &Hero,
        target: Position,
        map: &TreasureMap,
        now: Instant,
    ) -> Option<SlotId> {
        let slot = self.slots.acquire(hero.id, hero.capacity)?;
        self.sticky.remove(&hero.id);
        self.cooldowns.insert(hero.id, Cooldown { at: now, pos: target });
        self.next_target(hero, map);
        self.history.push(target);
        Some(slot)
    }

    /// Target choice, admission and slot acquisition as one step.
    pub fn try_dispatch(
        &mut self,
        hero: &Hero,
        map: &TreasureMap,
        now: Instant,
    ) -> Option<(Position, SlotId)> {
        let target = self.next_target(hero, map)?;
        if !self.admit(hero, target.pos, now) {
            return None;
        }
        let slot = self.begin(hero, target.pos, map, now)?;
        Some((target.pos, slot))
    }

    pub fn finish(&mut self, hero: HeroId, slot: SlotId) {
        self.slots.release(hero, slot);
    }
}
