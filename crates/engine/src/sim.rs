//! In-memory game backend.
//!
//! Implements [`GameClient`] against local state and reports every confirmed change as
//! a [`Delta`] to the registered handlers, the way the remote backend would. Used by
//! the server when no transport is configured and by the engine tests.

use crate::client::{ClientResult, GameClient};
use crate::error::ClientError;
use crate::sync::{lock, SyncLayer};
use hunter_protocol::{
    rewards, Block, BlockHp, Delta, DoorReward, Enemy, EnemyDamage, ExplosionResult, Hero,
    HeroId, HeroState, HeroUpdate, House, Reward, StoryDetails, StoryExplosionResult, StoryMap,
    StrikeOutcome, StrikeRequest,
};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
struct SimState {
    connected: bool,
    logged_in: bool,
    heroes: Vec<Hero>,
    roster: Option<Vec<Hero>>,
    blocks: Vec<Block>,
    map_template: Vec<Block>,
    houses: Vec<House>,
    rewards: Vec<Reward>,
    story: StoryDetails,
    story_template: Option<StoryMap>,
    story_map: Option<StoryMap>,
    story_run: Option<(HeroId, u32)>,
    door_enemies: Vec<Enemy>,
    door_reward: f64,
    energy_cost: i64,
    version: u32,
    map_open: bool,
    fail_on: Option<(&'static str, ClientError)>,
    calls: Vec<&'static str>,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            connected: false,
            logged_in: false,
            heroes: Vec::new(),
            roster: None,
            blocks: Vec::new(),
            map_template: Vec::new(),
            houses: Vec::new(),
            rewards: Vec::new(),
            story: StoryDetails::default(),
            story_template: None,
            story_map: None,
            story_run: None,
            door_enemies: Vec::new(),
            door_reward: 1.0,
            energy_cost: 1,
            version: 1,
            map_open: false,
            fail_on: None,
            calls: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SimulatedClient {
    state: Mutex<SimState>,
    handlers: Mutex<Vec<SyncLayer>>,
    latency: Duration,
}

impl SimulatedClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn edit(self, f: impl FnOnce(&mut SimState)) -> Self {
        f(&mut lock(&self.state));
        self
    }

    /// Active squad, as returned by `fetch_squad`.
    pub fn with_heroes(self, heroes: Vec<Hero>) -> Self {
        self.edit(|s| s.heroes = heroes)
    }

    /// Full account roster. Defaults to the active squad.
    pub fn with_roster(self, roster: Vec<Hero>) -> Self {
        self.edit(|s| s.roster = Some(roster))
    }

    /// The map, also used to refill it once cleared.
    pub fn with_blocks(self, blocks: Vec<Block>) -> Self {
        self.edit(|s| {
            s.map_template = blocks.clone();
            s.blocks = blocks;
        })
    }

    pub fn with_houses(self, houses: Vec<House>) -> Self {
        self.edit(|s| s.houses = houses)
    }

    pub fn with_rewards(self, rewards: Vec<Reward>) -> Self {
        self.edit(|s| s.rewards = rewards)
    }

    pub fn with_story(self, details: StoryDetails, map: StoryMap) -> Self {
        self.edit(|s| {
            s.story = details;
            s.story_template = Some(map);
        })
    }

    /// Enemies that appear when the door is struck.
    pub fn with_door_enemies(self, enemies: Vec<Enemy>) -> Self {
        self.edit(|s| s.door_enemies = enemies)
    }

    pub fn with_energy_cost(self, cost: i64) -> Self {
        self.edit(|s| s.energy_cost = cost)
    }

    pub fn with_version(self, version: u32) -> Self {
        self.edit(|s| s.version = version)
    }

    /// Fails every call named `call` with `err`.
    pub fn failing(self, call: &'static str, err: ClientError) -> Self {
        self.edit(|s| s.fail_on = Some((call, err)))
    }

    /// Round-trip time of strikes.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Publishes a new latest version.
    pub fn set_version(&self, version: u32) {
        lock(&self.state).version = version;
    }

    /// Names of the calls made so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        lock(&self.state).calls.clone()
    }

    pub fn count(&self, call: &str) -> usize {
        lock(&self.state).calls.iter().filter(|c| **c == call).count()
    }

    pub fn handler_count(&self) -> usize {
        lock(&self.handlers).len()
    }

    pub fn hero(&self, id: HeroId) -> Option<Hero> {
        lock(&self.state).heroes.iter().find(|h| h.id == id).cloned()
    }

    pub fn rewards_snapshot(&self) -> Vec<Reward> {
        lock(&self.state).rewards.clone()
    }

    pub fn story_details_snapshot(&self) -> StoryDetails {
        lock(&self.state).story.clone()
    }

    pub fn is_map_open(&self) -> bool {
        lock(&self.state).map_open
    }

    /// Delivers a delta to every handler, as the backend would push it.
    pub fn emit(&self, delta: Delta) {
        let handlers = lock(&self.handlers).clone();
        for handler in handlers {
            handler.apply(delta.clone());
        }
    }

    fn enter(&self, call: &'static str) -> ClientResult<MutexGuard<'_, SimState>> {
        let mut state = lock(&self.state);
        state.calls.push(call);
        let failure = match &state.fail_on {
            Some((name, err)) if *name == call => Some(err.clone()),
            _ => None,
        };
        match failure {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }

    async fn round_trip(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn move_hero(&self, call: &'static str, id: HeroId, to: HeroState) -> ClientResult<()> {
        let update = {
            let mut state = self.enter(call)?;
            let hero = state
                .heroes
                .iter_mut()
                .find(|h| h.id == id)
                .ok_or_else(|| ClientError::Rejected(format!("unknown hero {id}")))?;
            hero.state = to;
            HeroUpdate {
                id,
                energy: hero.energy,
            }
        };
        self.emit(match to {
            HeroState::Work => Delta::HeroWentToWork(update),
            HeroState::Sleep => Delta::HeroSlept(update),
            HeroState::Home => Delta::HeroWentHome(update),
        });
        Ok(())
    }

    async fn explode(&self, call: &'static str, req: StrikeRequest) -> ClientResult<Option<StrikeOutcome>> {
        self.round_trip().await;
        let result = {
            let mut state = self.enter(call)?;
            let cost = state.energy_cost;
            let Some(hero) = state.heroes.iter().find(|h| h.id == req.hero_id).cloned() else {
                return Ok(None);
            };
            if hero.state != HeroState::Work || hero.energy <= 0 {
                return Ok(None);
            }
            let mut blocks = Vec::new();
            if let Some(block) = state.blocks.iter_mut().find(|b| b.pos == req.pos && b.hp > 0) {
                block.hp = (block.hp - hero.damage).max(0);
                blocks.push(BlockHp {
                    pos: block.pos,
                    hp: block.hp,
                });
            }
            let energy = match state.heroes.iter_mut().find(|h| h.id == req.hero_id) {
                Some(h) => {
                    h.energy -= cost;
                    h.energy
                }
                None => 0,
            };
            (
                ExplosionResult {
                    hero_id: req.hero_id,
                    energy_spent: cost,
                    blocks,
                },
                energy,
            )
        };
        let (explosion, energy) = result;
        self.emit(Delta::Explosion(explosion));
        Ok(Some(StrikeOutcome { energy }))
    }

    fn roster_hero(state: &SimState, id: HeroId) -> Option<Hero> {
        state
            .roster
            .as_ref()
            .unwrap_or(&state.heroes)
            .iter()
            .find(|h| h.id == id)
            .cloned()
    }
}

impl GameClient for SimulatedClient {
    async fn connect(&self) -> ClientResult<()> {
        self.enter("connect")?.connected = true;
        Ok(())
    }

    async fn login(&self) -> ClientResult<()> {
        let mut state = self.enter("login")?;
        if !state.connected {
            return Err(ClientError::Transport("not connected".to_string()));
        }
        state.logged_in = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    fn is_logged_in(&self) -> bool {
        lock(&self.state).logged_in
    }

    fn clear_handlers(&self) {
        lock(&self.handlers).clear();
    }

    fn register_handler(&self, handler: SyncLayer) {
        lock(&self.handlers).push(handler);
    }

    async fn fetch_map(&self) -> ClientResult<()> {
        let blocks = {
            let mut state = self.enter("fetch_map")?;
            if state.blocks.iter().all(|b| b.hp <= 0) {
                state.blocks = state.map_template.clone();
            }
            state.blocks.clone()
        };
        self.emit(Delta::MapLoaded(blocks));
        Ok(())
    }

    async fn fetch_squad(&self) -> ClientResult<()> {
        let heroes = self.enter("fetch_squad")?.heroes.clone();
        self.emit(Delta::SquadLoaded(heroes));
        Ok(())
    }

    async fn fetch_roster(&self) -> ClientResult<Vec<Hero>> {
        let state = self.enter("fetch_roster")?;
        Ok(state.roster.clone().unwrap_or_else(|| state.heroes.clone()))
    }

    async fn go_work(&self, hero: HeroId) -> ClientResult<()> {
        self.move_hero("go_work", hero, HeroState::Work)
    }

    async fn go_sleep(&self, hero: HeroId) -> ClientResult<()> {
        self.move_hero("go_sleep", hero, HeroState::Sleep)
    }

    async fn go_home(&self, hero: HeroId) -> ClientResult<()> {
        self.move_hero("go_home", hero, HeroState::Home)
    }

    async fn open_map(&self, _amazon: bool) -> ClientResult<()> {
        self.enter("open_map")?.map_open = true;
        Ok(())
    }

    async fn close_map(&self) -> ClientResult<()> {
        self.enter("close_map")?.map_open = false;
        Ok(())
    }

    async fn strike(&self, req: StrikeRequest) -> ClientResult<Option<StrikeOutcome>> {
        self.explode("strike", req).await
    }

    async fn strike_alternate(&self, req: StrikeRequest) -> ClientResult<Option<StrikeOutcome>> {
        self.explode("strike_alternate", req).await
    }

    async fn story_strike(&self, req: StrikeRequest) -> ClientResult<()> {
        self.round_trip().await;
        let result = {
            let mut guard = self.enter("story_strike")?;
            let state = &mut *guard;
            let map = state
                .story_map
                .as_mut()
                .ok_or_else(|| ClientError::Rejected("no story map".to_string()))?;
            if req.pos == map.door {
                let spawned = std::mem::take(&mut state.door_enemies);
                map.enemies.extend(spawned.iter().cloned());
                StoryExplosionResult {
                    blocks: Vec::new(),
                    enemies: spawned,
                }
            } else {
                let before = map.positions.len();
                map.positions.retain(|p| *p != req.pos);
                let destroyed = if map.positions.len() < before {
                    vec![req.pos]
                } else {
                    Vec::new()
                };
                StoryExplosionResult {
                    blocks: destroyed,
                    enemies: Vec::new(),
                }
            }
        };
        self.emit(Delta::StoryExplosion(result));
        Ok(())
    }

    async fn enemy_take_damage(&self, enemy: u64, hero: HeroId) -> ClientResult<()> {
        self.round_trip().await;
        let damage = {
            let mut state = self.enter("enemy_take_damage")?;
            let power = Self::roster_hero(&state, hero).map_or(0, |h| h.damage);
            let map = state
                .story_map
                .as_mut()
                .ok_or_else(|| ClientError::Rejected("no story map".to_string()))?;
            let target = map
                .enemies
                .iter_mut()
                .find(|e| e.id == enemy)
                .ok_or_else(|| ClientError::Rejected(format!("unknown enemy {enemy}")))?;
            target.hp = (target.hp - power).max(0);
            EnemyDamage {
                id: enemy,
                hp: target.hp,
            }
        };
        self.emit(Delta::EnemyDamaged(damage));
        Ok(())
    }

    async fn story_details(&self) -> ClientResult<StoryDetails> {
        Ok(self.enter("story_details")?.story.clone())
    }

    async fn story_map(&self, hero: HeroId, level: u32) -> ClientResult<StoryMap> {
        let mut state = self.enter("story_map")?;
        let key = state
            .rewards
            .iter_mut()
            .find(|r| r.kind == rewards::KEY && r.value >= 1.0)
            .ok_or_else(|| ClientError::Rejected("no keys".to_string()))?;
        key.value -= 1.0;
        let map = state
            .story_template
            .clone()
            .ok_or_else(|| ClientError::Rejected("no story available".to_string()))?;
        state.story_map = Some(map.clone());
        state.story_run = Some((hero, level));
        Ok(map)
    }

    async fn enter_door(&self) -> ClientResult<DoorReward> {
        let mut state = self.enter("enter_door")?;
        let (hero, level) = state
            .story_run
            .take()
            .ok_or_else(|| ClientError::Rejected("no adventure running".to_string()))?;
        state.story.max_level = state.story.max_level.max(level);
        state.story.played_heroes.push(hero);
        state.story_map = None;
        Ok(DoorReward {
            rewards: state.door_reward,
        })
    }

    async fn rewards(&self) -> ClientResult<Vec<Reward>> {
        Ok(self.enter("rewards")?.rewards.clone())
    }

    async fn houses(&self) -> ClientResult<Vec<House>> {
        Ok(self.enter("houses")?.houses.clone())
    }

    async fn ping(&self) -> ClientResult<()> {
        self.enter("ping")?;
        Ok(())
    }

    async fn latest_version(&self) -> ClientResult<u32> {
        Ok(self.enter("latest_version")?.version)
    }
}
