//! The treasure/amazon loop and everything it owns.

use crate::admission::Dispatcher;
use crate::client::{GameClient, LogNotifier, Notifier};
use crate::config::BotConfig;
use crate::error::{BotError, Result};
use crate::home::{home_slots, plan_move, rank_candidates, HomeMove};
use crate::shield::ShieldMonitor;
use crate::sync::{lock, Stores, SyncLayer};
use hunter_protocol::{Hero, HeroId, HeroState, House, PlayMode, StrikeRequest};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{info, warn};

/// Pause between launching two heroes' strikes in a round.
pub const STAGGER: Duration = Duration::from_millis(70);
pub const CYCLE_PAUSE: Duration = Duration::from_secs(10);
pub const PING_INTERVAL: Duration = Duration::from_secs(10);
pub const ADVENTURE_INTERVAL: Duration = Duration::from_secs(10 * 60);
pub const VERSION_CHECK_INTERVAL: Duration = Duration::from_secs(60);
/// Grace period for in-flight strikes when stopping.
pub const STOP_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
pub(crate) struct Session {
    pub selection: Vec<HeroId>,
    pub rotation: usize,
    pub houses: Vec<House>,
    pub mode: PlayMode,
    pub last_adventure: Option<Instant>,
    pub last_adventure_at: Option<OffsetDateTime>,
    pub last_version_check: Option<Instant>,
    pub shields: ShieldMonitor,
}

struct Inner<C> {
    client: C,
    config: BotConfig,
    stores: Arc<Stores>,
    notifier: Arc<dyn Notifier>,
    dispatch: Mutex<Dispatcher>,
    session: Mutex<Session>,
    rng: Mutex<SmallRng>,
    running: AtomicBool,
}

/// Drives a squad against the treasure map, and optionally through adventure mode.
///
/// Cheap to clone; every clone shares the same state. Each hero's strike runs as its
/// own task holding a clone.
pub struct TreasureBot<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for TreasureBot<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: GameClient> TreasureBot<C> {
    pub fn new(client: C, config: BotConfig) -> Self {
        Self::with_parts(client, config, Arc::new(LogNotifier), SmallRng::from_entropy())
    }

    pub fn with_parts(
        client: C,
        config: BotConfig,
        notifier: Arc<dyn Notifier>,
        rng: SmallRng,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                config,
                stores: Arc::new(Stores::default()),
                notifier,
                dispatch: Mutex::new(Dispatcher::default()),
                session: Mutex::new(Session::default()),
                rng: Mutex::new(rng),
                running: AtomicBool::new(false),
            }),
        }
    }

    pub fn client(&self) -> &C {
        &self.inner.client
    }

    pub fn config(&self) -> &BotConfig {
        &self.inner.config
    }

    pub fn stores(&self) -> &Stores {
        &self.inner.stores
    }

    pub fn mode(&self) -> PlayMode {
        self.session().mode
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Asks the loop to stop. In-flight calls finish; no new ones start.
    pub fn request_stop(&self) {
        self.set_running(false);
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.inner.running.store(running, Ordering::SeqCst);
    }

    fn map_life(&self) -> i64 {
        self.inner.stores.map().total_life()
    }

    pub(crate) fn session(&self) -> MutexGuard<'_, Session> {
        lock(&self.inner.session)
    }

    pub(crate) fn dispatch(&self) -> MutexGuard<'_, Dispatcher> {
        lock(&self.inner.dispatch)
    }

    pub(crate) fn with_rng<T>(&self, f: impl FnOnce(&mut SmallRng) -> T) -> T {
        f(&mut lock(&self.inner.rng))
    }

    fn set_mode(&self, mode: PlayMode) {
        self.session().mode = mode;
    }

    /// Selected heroes that are still working and have energy left.
    pub fn working_selection(&self) -> Vec<Hero> {
        let ids = self.session().selection.clone();
        let squad = self.inner.stores.squad();
        ids.iter()
            .filter_map(|id| squad.get(*id))
            .filter(|h| h.state == HeroState::Work && h.energy > 0)
            .cloned()
            .collect()
    }

    /// Working heroes for the next round, starting one further along each time.
    fn round_order(&self) -> Vec<HeroId> {
        let working = self.working_selection();
        if working.is_empty() {
            return Vec::new();
        }
        let start = {
            let mut session = self.session();
            let start = session.rotation % working.len();
            session.rotation = session.rotation.wrapping_add(1);
            start
        };
        working
            .iter()
            .cycle()
            .skip(start)
            .take(working.len())
            .map(|h| h.id)
            .collect()
    }

    /// Main loop. Returns once stopped, after in-flight strikes drained.
    pub async fn run(&self) -> Result<()> {
        self.set_running(true);
        self.check_version(true).await?;
        self.log_in().await?;

        let pinger = self.spawn_keep_alive();
        let result = self.play().await;
        pinger.abort();
        result
    }

    async fn play(&self) -> Result<()> {
        self.load_houses().await?;
        self.refresh_map().await?;
        loop {
            self.cycle().await?;
            if !self.is_running() {
                break;
            }
            self.set_mode(PlayMode::Sleeping);
            info!("will sleep for 10 seconds");
            tokio::time::sleep(CYCLE_PAUSE).await;
            if !self.is_running() {
                break;
            }
        }
        Ok(())
    }

    /// One pass: open map, work, rest, rotate home, close map, maybe adventure.
    pub(crate) async fn cycle(&self) -> Result<()> {
        self.check_version(false).await?;
        if self.map_life() <= 0 {
            self.refresh_map().await?;
        }

        info!("opening map");
        let amazon = self.inner.config.mode_amazon;
        self.set_mode(if amazon { PlayMode::Amazon } else { PlayMode::Treasure });
        self.inner.client.open_map(amazon).await?;

        self.refresh_selection().await?;
        self.run_rounds().await?;
        self.sleep_all().await?;
        self.refresh_home().await?;

        info!("closing map");
        self.inner.client.close_map().await?;
        info!("there are no heroes to work now");

        if self.adventure_due() {
            self.stores().adventure().clear();
            self.set_mode(PlayMode::Adventure);
            let outcome = self.adventure().await?;
            info!(?outcome, "adventure finished");
            let mut session = self.session();
            session.last_adventure = Some(Instant::now());
            session.last_adventure_at = Some(OffsetDateTime::now_utc());
        }
        Ok(())
    }

    fn adventure_due(&self) -> bool {
        self.inner.config.mode_adventure
            && self
                .session()
                .last_adventure
                .map_or(true, |at| at.elapsed() > ADVENTURE_INTERVAL)
    }

    /// Compares the running version with the latest published one. Unless `force`d,
    /// checks at most once per [`VERSION_CHECK_INTERVAL`].
    pub async fn check_version(&self, force: bool) -> Result<()> {
        if !force {
            let recent = self
                .session()
                .last_version_check
                .is_some_and(|at| at.elapsed() < VERSION_CHECK_INTERVAL);
            if recent {
                return Ok(());
            }
        }
        let latest = self.inner.client.latest_version().await?;
        self.session().last_version_check = Some(Instant::now());
        let local = self.inner.config.version;
        if latest != local {
            self.inner.notifier.notify("Please update your code version");
            self.request_stop();
            return Err(BotError::VersionMismatch {
                local,
                remote: latest,
            });
        }
        Ok(())
    }

    pub async fn log_in(&self) -> Result<()> {
        if self.inner.client.is_logged_in() {
            return Ok(());
        }
        info!("logging in");
        self.inner.client.connect().await?;
        self.reset();
        self.inner.client.login().await?;
        info!("logged in successfully");
        Ok(())
    }

    /// Re-registers the sync layer with the client and clears per-run state.
    pub fn reset(&self) {
        let client = &self.inner.client;
        client.clear_handlers();
        client.register_handler(SyncLayer::new(
            Arc::clone(&self.inner.stores),
            Arc::clone(&self.inner.notifier),
        ));
        self.reset_state();
    }

    fn reset_state(&self) {
        self.dispatch().reset();
        let mut session = self.session();
        session.selection.clear();
        session.rotation = 0;
    }

    fn spawn_keep_alive(&self) -> JoinHandle<()> {
        let bot = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(PING_INTERVAL);
            tick.tick().await;
            loop {
                tick.tick().await;
                if let Err(err) = bot.inner.client.ping().await {
                    warn!(%err, "keep-alive ping failed");
                }
            }
        })
    }

    pub async fn load_houses(&self) -> Result<()> {
        let houses = self.inner.client.houses().await?;
        info!(count = houses.len(), "houses loaded");
        self.session().houses = houses;
        Ok(())
    }

    pub fn home_slots(&self) -> usize {
        home_slots(&self.session().houses)
    }

    /// Refetches the map; an exhausted map also clears every per-run record.
    pub async fn refresh_map(&self) -> Result<()> {
        info!("refreshing map");
        if self.map_life() <= 0 {
            self.reset_state();
            let rewards = self.inner.client.rewards().await?;
            info!(?rewards, "map exhausted");
        }
        self.inner.client.fetch_map().await?;
        info!(map = %*self.inner.stores.map(), "current map state");
        Ok(())
    }

    /// Reloads the squad, sends rested heroes to work and rotates the home.
    pub async fn refresh_selection(&self) -> Result<()> {
        info!("refreshing heroes");
        self.inner.client.fetch_squad().await?;
        let config = &self.inner.config;

        let rested: Vec<Hero> = {
            let squad = self.inner.stores.squad();
            self.session().selection = squad.working().iter().map(|h| h.id).collect();
            let mut rest: Vec<Hero> = squad.not_working().into_iter().cloned().collect();
            rest.sort_by(|a, b| b.energy_percent().total_cmp(&a.energy_percent()));
            rest
        };

        for hero in rested {
            if hero.energy_percent() < config.min_hero_energy_percentage {
                continue;
            }
            if config.mode_amazon {
                let check = self
                    .session()
                    .shields
                    .check(&hero, config.alert_shield, Instant::now());
                if check.alert {
                    let message = format!("Hero {} needs shield repair", hero.id);
                    info!("{message}");
                    self.inner.notifier.notify(&message);
                }
                if check.skip {
                    continue;
                }
            }
            if self.working_selection().len() < config.num_hero_work {
                info!(hero = hero.id, "sending hero to work");
                self.inner.client.go_work(hero.id).await?;
                self.session().selection.push(hero.id);
            }
        }

        let sent = self.session().selection.len();
        info!(count = sent, "heroes at work");
        self.refresh_home().await
    }

    pub async fn refresh_home(&self) -> Result<()> {
        let config = &self.inner.config;
        let slots = self.home_slots();
        let ranked = rank_candidates(&self.inner.stores.squad(), config, slots);
        info!(slots, "will send heroes home");

        for id in ranked {
            let step = plan_move(&self.inner.stores.squad(), id, config, slots);
            match step {
                Some(HomeMove::SendHome(id)) => {
                    info!(hero = id, "sending hero home");
                    self.inner.client.go_home(id).await?;
                }
                Some(HomeMove::Swap { out, into }) => {
                    info!(hero = out, "removing hero from home");
                    self.inner.client.go_sleep(out).await?;
                    info!(hero = into, "sending hero home");
                    self.inner.client.go_home(into).await?;
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Launches strike tasks round after round until the map is cleared, nobody can
    /// work, the bot stops or a newer version is published; then waits for every task.
    ///
    /// A hero's admission check may run while another hero's strike is still in
    /// flight, against a map that does not reflect it yet.
    pub async fn run_rounds(&self) -> Result<()> {
        let mut tasks = JoinSet::new();
        let mut failure: Option<BotError> = None;

        'rounds: while self.map_life() > 0 && self.is_running() {
            if let Err(err) = self.check_version(false).await {
                failure = Some(err);
                break;
            }
            let order = self.round_order();
            if order.is_empty() {
                break;
            }
            for hero in order {
                tokio::time::sleep(STAGGER).await;
                let bot = self.clone();
                tasks.spawn(async move { bot.strike_with(hero).await });
            }
            while let Some(joined) = tasks.try_join_next() {
                if let Err(err) = joined.map_err(BotError::from).and_then(|r| r) {
                    failure = Some(err);
                    break 'rounds;
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined.map_err(BotError::from).and_then(|r| r) {
                failure.get_or_insert(err);
            }
        }
        failure.map_or(Ok(()), Err)
    }

    /// One admission-gated strike for `hero_id`; a no-op when not admitted.
    pub async fn strike_with(&self, hero_id: HeroId) -> Result<()> {
        let Some(hero) = self.inner.stores.squad().get(hero_id).cloned() else {
            return Ok(());
        };
        let claim = {
            let map = self.inner.stores.map();
            self.dispatch().try_dispatch(&hero, &map, Instant::now())
        };
        let Some((pos, slot)) = claim else {
            return Ok(());
        };

        info!(
            rarity = %hero.rarity,
            hero = hero.id,
            energy = hero.energy,
            max_energy = hero.max_energy,
            %pos,
            "will place bomb"
        );
        let req = StrikeRequest {
            hero_id: hero.id,
            hero_type: hero.hero_type,
            bomb_id: slot,
            pos,
        };
        let client = &self.inner.client;
        let result = if self.inner.config.mode_amazon {
            client.strike_alternate(req).await
        } else {
            client.strike(req).await
        };
        self.dispatch().finish(hero.id, slot);

        let Some(outcome) = result? else {
            return Ok(());
        };
        if outcome.energy <= 0 {
            info!(hero = hero.id, "sending hero to sleep");
            client.go_sleep(hero.id).await?;
            self.refresh_selection().await?;
        }
        Ok(())
    }

    pub async fn sleep_all(&self) -> Result<()> {
        info!("sleep all heroes");
        for hero in self.working_selection() {
            self.inner.client.go_sleep(hero.id).await?;
        }
        Ok(())
    }

    /// Stops the loop, gives in-flight strikes a grace period, and puts the squad to
    /// sleep.
    pub async fn stop(&self) -> Result<()> {
        info!("sending heroes to sleep");
        self.request_stop();
        tokio::time::sleep(STOP_GRACE).await;
        self.sleep_all().await
    }
}
