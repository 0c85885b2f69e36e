//! Adventure (story) mode: one hero clears an instanced map full of enemies, strikes
//! the exit door, and walks through it for the level reward.

use crate::bot::TreasureBot;
use crate::client::GameClient;
use crate::error::Result;
use hunter_protocol::{rewards, Enemy, Hero, HeroId, Position, StoryDetails, StoryMap, StrikeRequest};
use rand::Rng;
use std::time::Duration;
use tracing::info;

/// Story grid bounds (inclusive).
pub const STORY_MAX_I: i64 = 28;
pub const STORY_MAX_J: i64 = 10;
pub const MAX_POSITION_DRAWS: usize = 100;
pub const MIN_ROSTER: usize = 15;
pub const MAX_STORY_LEVEL: u32 = 45;
const PAUSE_SECS: std::ops::Range<f64> = 4.0..9.0;

const CORNERS: [Position; 4] = [
    Position::new(0, 0),
    Position::new(0, STORY_MAX_J),
    Position::new(STORY_MAX_I, 0),
    Position::new(STORY_MAX_I, STORY_MAX_J),
];

/// Blocks and enemies of the running adventure.
#[derive(Debug, Clone, Default)]
pub struct AdventureSession {
    blocks: Vec<Position>,
    enemies: Vec<Enemy>,
}

impl AdventureSession {
    pub fn begin(&mut self, blocks: Vec<Position>, enemies: Vec<Enemy>) {
        self.blocks = blocks;
        self.enemies = enemies;
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
        self.enemies.clear();
    }

    pub fn blocks(&self) -> &[Position] {
        &self.blocks
    }

    pub fn enemies(&self) -> &[Enemy] {
        &self.enemies
    }

    pub fn live_enemies(&self) -> Vec<&Enemy> {
        self.enemies.iter().filter(|e| e.is_alive()).collect()
    }

    pub fn remove_blocks(&mut self, destroyed: &[Position]) {
        self.blocks.retain(|b| !destroyed.contains(b));
    }

    pub fn add_enemies(&mut self, enemies: Vec<Enemy>) {
        self.enemies.extend(enemies);
    }

    pub fn set_enemy_hp(&mut self, id: u64, hp: i64) -> bool {
        match self.enemies.iter_mut().find(|e| e.id == id) {
            Some(enemy) => {
                enemy.hp = hp;
                true
            }
            None => false,
        }
    }
}

/// True when `pos` is out of `range` of the door on both axes.
fn clear_of_door(pos: Position, door: Position, range: u32) -> bool {
    let range = i64::from(range);
    (door.i < pos.i - range || door.i > pos.i + range)
        && (door.j < pos.j - range || door.j > pos.j + range)
}

/// Draws positions until one is clear of the door blast. After
/// [`MAX_POSITION_DRAWS`] misses the grid corners are tried, and if none of them is
/// clear either the last draw is returned as is.
pub fn random_position(range: u32, door: Position, mut draw: impl FnMut() -> Position) -> Position {
    let mut last = door;
    for _ in 0..MAX_POSITION_DRAWS {
        last = draw();
        if clear_of_door(last, door, range) {
            return last;
        }
    }
    CORNERS
        .into_iter()
        .find(|&corner| clear_of_door(corner, door, range))
        .unwrap_or(last)
}

/// First roster hero that has not played the current story progress.
pub fn pick_hero<'a>(
    roster: &'a [Hero],
    details: &StoryDetails,
    allowed: impl Fn(HeroId) -> bool,
) -> Option<&'a Hero> {
    roster
        .iter()
        .find(|h| !details.played_heroes.contains(&h.id) && allowed(h.id))
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdventureOutcome {
    SmallRoster(usize),
    NoKeys,
    NoHero,
    Stopped,
    Finished { level: u32, rewards: f64 },
}

impl<C: GameClient> TreasureBot<C> {
    pub async fn adventure(&self) -> Result<AdventureOutcome> {
        let client = self.client();
        let roster = client.fetch_roster().await?;
        if roster.len() < MIN_ROSTER {
            return Ok(AdventureOutcome::SmallRoster(roster.len()));
        }

        info!("adventure mode iteration");
        let keys = client
            .rewards()
            .await?
            .into_iter()
            .find(|r| r.kind == rewards::KEY)
            .map_or(0.0, |r| r.value);
        if keys <= 0.0 {
            info!("no keys to play right now");
            return Ok(AdventureOutcome::NoKeys);
        }
        info!(keys, "keys available for adventure");

        let details = client.story_details().await?;
        let Some(hero) = pick_hero(&roster, &details, |id| self.config().may_adventure(id)).cloned()
        else {
            info!("no hero available for adventure");
            return Ok(AdventureOutcome::NoHero);
        };

        let level = (details.max_level + 1).min(MAX_STORY_LEVEL);
        info!(level, hero = hero.id, "playing adventure level");
        let map = client.story_map(hero.id, level).await?;
        self.stores()
            .adventure()
            .begin(map.positions.clone(), map.enemies.clone());
        info!(enemies = map.enemies.len(), "adventure map loaded");

        self.fight(&hero, &map).await?;

        info!(door = %map.door, "striking door");
        self.story_strike(&hero, map.door).await?;
        let after_door = self.stores().adventure().live_enemies().len();
        info!(enemies = after_door, "enemies after door");
        self.fight(&hero, &map).await?;

        if !self.is_running() {
            return Ok(AdventureOutcome::Stopped);
        }
        info!("entering door");
        let reward = client.enter_door().await?;
        info!(rewards = reward.rewards, "finished adventure");
        Ok(AdventureOutcome::Finished {
            level,
            rewards: reward.rewards,
        })
    }

    /// Strikes random live enemies until none is left or the bot stops.
    async fn fight(&self, hero: &Hero, map: &StoryMap) -> Result<()> {
        while self.is_running() {
            let Some((enemy, target)) = self.pick_engagement(hero, map) else {
                break;
            };
            let live = self.stores().adventure().live_enemies().len();
            info!(
                hero = hero.id,
                enemy = enemy.id,
                hp = enemy.hp,
                max_hp = enemy.max_hp,
                live,
                pos = %target,
                "attacking enemy"
            );
            let client = self.client();
            let (strike, damage) = tokio::join!(
                client.story_strike(story_request(hero, target)),
                client.enemy_take_damage(enemy.id, hero.id),
            );
            strike?;
            damage?;

            let pause = self.with_rng(|rng| rng.gen_range(PAUSE_SECS));
            tokio::time::sleep(Duration::from_secs_f64(pause)).await;
        }
        Ok(())
    }

    fn pick_engagement(&self, hero: &Hero, map: &StoryMap) -> Option<(Enemy, Position)> {
        let (enemy, block) = {
            let session = self.stores().adventure();
            let live = session.live_enemies();
            if live.is_empty() {
                return None;
            }
            self.with_rng(|rng| {
                let enemy = live[rng.gen_range(0..live.len())].clone();
                let blocks = session.blocks();
                let block = (!blocks.is_empty()).then(|| blocks[rng.gen_range(0..blocks.len())]);
                (enemy, block)
            })
        };
        let target = block.unwrap_or_else(|| {
            random_position(hero.range, map.door, || {
                self.with_rng(|rng| {
                    Position::new(rng.gen_range(0..=STORY_MAX_I), rng.gen_range(0..=STORY_MAX_J))
                })
            })
        });
        Some((enemy, target))
    }

    async fn story_strike(&self, hero: &Hero, target: Position) -> Result<()> {
        info!(hero = hero.id, damage = hero.damage, pos = %target, "placing story bomb");
        self.client().story_strike(story_request(hero, target)).await?;
        Ok(())
    }
}

fn story_request(hero: &Hero, pos: Position) -> StrikeRequest {
    StrikeRequest {
        hero_id: hero.id,
        hero_type: hero.hero_type,
        bomb_id: 0,
        pos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures::hero;

    fn scripted(draws: Vec<Position>) -> impl FnMut() -> Position {
        let mut it = draws.into_iter().cycle();
        move || it.next().unwrap_or(Position::new(0, 0))
    }

    #[test]
    fn first_clear_draw_wins() {
        let door = Position::new(10, 5);
        let draws = vec![Position::new(10, 5), Position::new(11, 9), Position::new(20, 0)];
        assert_eq!(random_position(1, door, scripted(draws)), Position::new(20, 0));
    }

    #[test]
    fn must_clear_both_axes() {
        let door = Position::new(10, 5);
        assert!(!clear_of_door(Position::new(20, 5), door, 2));
        assert!(!clear_of_door(Position::new(10, 0), door, 2));
        assert!(clear_of_door(Position::new(13, 8), door, 2));
        assert!(!clear_of_door(Position::new(12, 8), door, 2));
    }

    #[test]
    fn never_returns_blocked_draw_when_a_later_one_is_clear() {
        let door = Position::new(14, 5);
        for valid_at in 0..MAX_POSITION_DRAWS {
            let mut draws = vec![door; MAX_POSITION_DRAWS];
            draws[valid_at] = Position::new(0, 0);
            let mut calls = 0;
            let mut it = draws.into_iter();
            let pos = random_position(3, door, || {
                calls += 1;
                it.next().unwrap_or(door)
            });
            assert_eq!(pos, Position::new(0, 0));
            assert_eq!(calls, valid_at + 1);
        }
    }

    #[test]
    fn falls_back_to_corners_after_exhausting_draws() {
        let door = Position::new(2, 2);
        let mut calls = 0;
        let pos = random_position(2, door, || {
            calls += 1;
            door
        });
        assert_eq!(calls, MAX_POSITION_DRAWS);
        // (0, 0) and (0, 10) are within range on the i axis; (28, 0) is within on j.
        assert_eq!(pos, Position::new(STORY_MAX_I, STORY_MAX_J));
    }

    #[test]
    fn falls_back_to_last_draw_when_nothing_is_clear() {
        let door = Position::new(14, 5);
        let last = Position::new(13, 4);
        let mut n = 0;
        let pos = random_position(30, door, || {
            n += 1;
            if n == MAX_POSITION_DRAWS {
                last
            } else {
                door
            }
        });
        assert_eq!(pos, last);
    }

    #[test]
    fn picks_first_unplayed_allowed_hero() {
        let roster = vec![hero(1), hero(2), hero(3)];
        let details = StoryDetails {
            max_level: 3,
            played_heroes: vec![1],
        };
        assert_eq!(pick_hero(&roster, &details, |_| true).unwrap().id, 2);
        assert_eq!(pick_hero(&roster, &details, |id| id == 3).unwrap().id, 3);
        assert!(pick_hero(&roster, &details, |id| id == 1).is_none());
    }

    #[test]
    fn session_tracks_live_enemies() {
        let mut session = AdventureSession::default();
        session.begin(
            vec![Position::new(1, 1)],
            vec![Enemy { id: 1, hp: 3, max_hp: 3 }, Enemy { id: 2, hp: 0, max_hp: 3 }],
        );
        assert_eq!(session.live_enemies().len(), 1);
        assert!(session.set_enemy_hp(1, 0));
        assert!(!session.set_enemy_hp(9, 0));
        assert!(session.live_enemies().is_empty());
        session.clear();
        assert!(session.blocks().is_empty());
    }
}
