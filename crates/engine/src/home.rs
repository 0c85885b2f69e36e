//! Home slot rotation.
//!
//! Heroes resting at home recover faster, but the active house only has a few slots.
//! Priority heroes (configured `house_heroes`) always get in, evicting the weakest
//! non-priority occupant when the house is full; other heroes only take free slots.

use crate::config::BotConfig;
use crate::store::Squad;
use hunter_protocol::{Hero, HeroId, HeroState, House};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeMove {
    SendHome(HeroId),
    /// Put `out` to sleep, then send `into` home.
    Swap { out: HeroId, into: HeroId },
}

/// Slots of the first active house, 0 without one.
pub fn home_slots(houses: &[House]) -> usize {
    houses.iter().find(|h| h.active).map_or(0, |h| h.slots)
}

/// Heroes that deserve a home slot, best first, at most `slots` of them.
pub fn rank_candidates(squad: &Squad, config: &BotConfig, slots: usize) -> Vec<HeroId> {
    let mut pool: Vec<&Hero> = squad
        .not_working()
        .into_iter()
        .filter(|h| !config.mode_amazon || (h.has_shield() && h.shield_sum() > 0))
        .collect();
    pool.sort_by(|a, b| {
        config
            .is_house_hero(b.id)
            .cmp(&config.is_house_hero(a.id))
            .then(b.rarity.cmp(&a.rarity))
    });
    pool.into_iter().take(slots).map(|h| h.id).collect()
}

/// What to do for `candidate` given the current squad. `None` when it stays put.
pub fn plan_move(squad: &Squad, candidate: HeroId, config: &BotConfig, slots: usize) -> Option<HomeMove> {
    let hero = squad.get(candidate)?;
    if hero.state == HeroState::Home {
        return None;
    }
    let occupants = squad.home();
    if occupants.len() < slots {
        return Some(HomeMove::SendHome(candidate));
    }
    if !config.is_house_hero(candidate) {
        return None;
    }
    occupants
        .into_iter()
        .filter(|h| !config.is_house_hero(h.id))
        .min_by_key(|h| h.rarity)
        .map(|out| HomeMove::Swap {
            out: out.id,
            into: candidate,
        })
}
