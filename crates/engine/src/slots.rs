use hunter_protocol::HeroId;
use std::collections::{BTreeSet, HashMap};

pub type SlotId = u32;

#[derive(Debug, Clone, Default)]
struct HeroSlots {
    last_id: SlotId,
    outstanding: BTreeSet<SlotId>,
}

/// Bounds the strikes each hero has in flight to its capacity.
#[derive(Debug, Clone, Default)]
pub struct SlotTracker {
    heroes: HashMap<HeroId, HeroSlots>,
}

impl SlotTracker {
    /// Issues the next free id in `1..=capacity`, or `None` when the hero is full.
    pub fn acquire(&mut self, hero: HeroId, capacity: u32) -> Option<SlotId> {
        let slots = self.heroes.entry(hero).or_default();
        if capacity == 0 || slots.outstanding.len() >= capacity as usize {
            return None;
        }
        let mut id = slots.last_id;
        loop {
            id += 1;
            if id > capacity {
                id = 1;
            }
            if slots.outstanding.insert(id) {
                slots.last_id = id;
                return Some(id);
            }
        }
    }

    pub fn release(&mut self, hero: HeroId, id: SlotId) {
        if let Some(slots) = self.heroes.get_mut(&hero) {
            slots.outstanding.remove(&id);
        }
    }

    pub fn outstanding(&self, hero: HeroId) -> usize {
        self.heroes.get(&hero).map_or(0, |s| s.outstanding.len())
    }

    pub fn clear(&mut self) {
        self.heroes.clear();
    }
}
