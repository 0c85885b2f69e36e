//! Applies remote deltas to the local stores.
//!
//! This is the only writer of the squad, map and adventure mirrors from outside the
//! orchestration loop. Every delta kind is handled by one arm of [`SyncLayer::apply`].
//!
//! Replay safety: payloads carrying absolute values (hero state changes, block hp,
//! enemy hp) may be applied any number of times. `Delta::Explosion` carries the energy
//! *spent*, so replaying it subtracts twice; the engine relies on the client delivering
//! each explosion at most once.

use crate::adventure::AdventureSession;
use crate::client::Notifier;
use crate::store::{EnergyPatch, Squad, TreasureMap};
use hunter_protocol::{BlockKind, Delta, HeroState, HeroUpdate};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Locks are only ever held for synchronous updates, so a poisoned lock still guards
/// consistent data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
pub struct Stores {
    pub squad: Mutex<Squad>,
    pub map: Mutex<TreasureMap>,
    pub adventure: Mutex<AdventureSession>,
}

impl Stores {
    pub fn squad(&self) -> MutexGuard<'_, Squad> {
        lock(&self.squad)
    }

    pub fn map(&self) -> MutexGuard<'_, TreasureMap> {
        lock(&self.map)
    }

    pub fn adventure(&self) -> MutexGuard<'_, AdventureSession> {
        lock(&self.adventure)
    }
}

#[derive(Clone)]
pub struct SyncLayer {
    stores: Arc<Stores>,
    notifier: Arc<dyn Notifier>,
}

impl fmt::Debug for SyncLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncLayer").finish_non_exhaustive()
    }
}

impl SyncLayer {
    pub fn new(stores: Arc<Stores>, notifier: Arc<dyn Notifier>) -> Self {
        Self { stores, notifier }
    }

    pub fn apply(&self, delta: Delta) {
        debug!(kind = delta.kind(), "applying delta");
        match delta {
            Delta::MapLoaded(blocks) => self.stores.map().apply_full(blocks),
            Delta::SquadLoaded(heroes) => self.stores.squad().apply_full(heroes),
            Delta::HeroSlept(update) => self.hero_state(update, HeroState::Sleep),
            Delta::HeroWentHome(update) => self.hero_state(update, HeroState::Home),
            Delta::HeroWentToWork(update) => self.hero_state(update, HeroState::Work),
            Delta::Explosion(result) => {
                self.stores.squad().patch_hero(
                    result.hero_id,
                    EnergyPatch::Spend(result.energy_spent),
                    None,
                );
                let mut map = self.stores.map();
                for block in &result.blocks {
                    let won_cage = map
                        .block(block.pos)
                        .is_some_and(|b| b.kind == BlockKind::Cage && b.hp > 0 && block.hp <= 0);
                    if won_cage {
                        info!(pos = %block.pos, "cage destroyed");
                        self.notifier.notify("you won a hero");
                    }
                    map.patch_block(block.pos, block.hp);
                }
            }
            Delta::StoryExplosion(result) => {
                let mut session = self.stores.adventure();
                session.remove_blocks(&result.blocks);
                if !result.enemies.is_empty() {
                    info!(count = result.enemies.len(), "enemies spawned");
                    session.add_enemies(result.enemies);
                }
            }
            Delta::EnemyDamaged(damage) => {
                if !self.stores.adventure().set_enemy_hp(damage.id, damage.hp) {
                    warn!(enemy = damage.id, "inconsistency: damage for unknown enemy ignored");
                }
            }
        }
    }

    fn hero_state(&self, update: HeroUpdate, state: HeroState) {
        self.stores
            .squad()
            .patch_hero(update.id, EnergyPatch::Set(update.energy), Some(state));
    }
}
