use super::*;
use crate::store::fixtures::{block, hero};
use hunter_protocol::{
    rewards, Enemy, Hero, HeroState, House, PlayMode, Position, Rarity, Reward, StoryDetails,
    StoryMap,
};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Recorder(Mutex<Vec<String>>);

impl Notifier for Recorder {
    fn notify(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }
}

impl Recorder {
    fn messages(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

fn treasure_config() -> BotConfig {
    BotConfig {
        mode_amazon: false,
        ..BotConfig::default()
    }
}

fn worker(id: u64, damage: i64) -> Hero {
    let mut h = hero(id);
    h.state = HeroState::Work;
    h.damage = damage;
    h
}

fn bot_with(client: SimulatedClient, config: BotConfig) -> (TreasureBot<SimulatedClient>, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let bot = TreasureBot::with_parts(
        client,
        config,
        recorder.clone(),
        SmallRng::seed_from_u64(7),
    );
    (bot, recorder)
}

fn key(value: f64) -> Reward {
    Reward {
        network: "BSC".to_string(),
        kind: rewards::KEY.to_string(),
        value,
    }
}

fn keys_left(client: &SimulatedClient) -> f64 {
    client
        .rewards_snapshot()
        .iter()
        .find(|r| r.kind == rewards::KEY)
        .map_or(0.0, |r| r.value)
}

#[tokio::test(start_paused = true)]
async fn strikes_follow_the_sticky_target_until_it_is_spent() {
    let client = SimulatedClient::new()
        .with_heroes(vec![worker(1, 100)])
        .with_blocks(vec![block(0, 0, 200), block(0, 1, 300)]);
    let (bot, _) = bot_with(client, treasure_config());
    bot.log_in().await.unwrap();
    bot.client().fetch_squad().await.unwrap();
    bot.refresh_map().await.unwrap();
    assert_eq!(bot.stores().map().total_life(), 500);

    bot.strike_with(1).await.unwrap();
    assert_eq!(bot.stores().map().total_life(), 400);
    assert_eq!(bot.stores().squad().get(1).unwrap().energy, 99);

    bot.strike_with(1).await.unwrap();
    assert_eq!(bot.stores().map().total_life(), 300);
    assert_eq!(bot.dispatch().sticky(1).unwrap().pos, Position::new(0, 0));

    // The next cell is one step away: 1 / speed 10 * 500ms of walking first.
    bot.strike_with(1).await.unwrap();
    assert_eq!(bot.client().count("strike"), 2);
    assert_eq!(bot.dispatch().sticky(1).unwrap().pos, Position::new(0, 1));

    tokio::time::sleep(Duration::from_millis(60)).await;
    bot.strike_with(1).await.unwrap();
    assert_eq!(bot.client().count("strike"), 3);
    assert_eq!(bot.stores().map().block(Position::new(0, 1)).unwrap().hp, 200);
}

#[tokio::test(start_paused = true)]
async fn concurrent_strikes_respect_bomb_capacity() {
    let mut h = worker(1, 1);
    h.capacity = 2;
    let client = SimulatedClient::new()
        .with_heroes(vec![h])
        .with_blocks((0..4).map(|j| block(0, j, 10)).collect())
        .with_latency(Duration::from_secs(1));
    let (bot, _) = bot_with(client, treasure_config());
    bot.log_in().await.unwrap();
    bot.client().fetch_squad().await.unwrap();
    bot.refresh_map().await.unwrap();

    let (a, b, c) = tokio::join!(bot.strike_with(1), bot.strike_with(1), bot.strike_with(1));
    a.unwrap();
    b.unwrap();
    c.unwrap();

    assert_eq!(bot.client().count("strike"), 2);
    assert_eq!(bot.dispatch().outstanding(1), 0);
    assert_eq!(bot.stores().map().total_life(), 38);
}

#[tokio::test(start_paused = true)]
async fn priority_hero_swaps_out_the_weakest_occupant() {
    let mut common = hero(1);
    common.state = HeroState::Home;
    let mut rare = hero(2);
    rare.state = HeroState::Home;
    rare.rarity = Rarity::Rare;
    let mut legend = hero(3);
    legend.rarity = Rarity::Legend;
    let client = SimulatedClient::new()
        .with_heroes(vec![common, rare, legend])
        .with_houses(vec![House { id: 9, slots: 2, active: true }]);
    let config = BotConfig {
        house_heroes: vec![3],
        ..treasure_config()
    };
    let (bot, _) = bot_with(client, config);
    bot.log_in().await.unwrap();
    bot.load_houses().await.unwrap();
    bot.client().fetch_squad().await.unwrap();
    assert_eq!(bot.home_slots(), 2);

    bot.refresh_home().await.unwrap();

    let client = bot.client();
    assert_eq!(client.count("go_sleep"), 1);
    assert_eq!(client.count("go_home"), 1);
    assert_eq!(client.hero(1).unwrap().state, HeroState::Sleep);
    assert_eq!(client.hero(3).unwrap().state, HeroState::Home);
    let squad = bot.stores().squad();
    let mut home: Vec<u64> = squad.home().iter().map(|h| h.id).collect();
    home.sort_unstable();
    assert_eq!(home, vec![2, 3]);
}

#[tokio::test(start_paused = true)]
async fn small_roster_skips_adventure_without_spending_keys() {
    let client = SimulatedClient::new()
        .with_roster((1..=14).map(hero).collect())
        .with_rewards(vec![key(3.0)]);
    let (bot, _) = bot_with(client, treasure_config());
    bot.log_in().await.unwrap();

    let outcome = bot.adventure().await.unwrap();

    assert_eq!(outcome, AdventureOutcome::SmallRoster(14));
    assert_eq!(bot.client().count("story_map"), 0);
    assert_eq!(keys_left(bot.client()), 3.0);
}

#[tokio::test(start_paused = true)]
async fn adventure_without_keys_stops_early() {
    let client = SimulatedClient::new()
        .with_roster((1..=15).map(hero).collect())
        .with_rewards(vec![key(0.0)]);
    let (bot, _) = bot_with(client, treasure_config());
    bot.log_in().await.unwrap();

    assert_eq!(bot.adventure().await.unwrap(), AdventureOutcome::NoKeys);
    assert_eq!(bot.client().count("story_details"), 0);
}

#[tokio::test(start_paused = true)]
async fn adventure_clears_enemies_and_enters_the_door() {
    let door = Position::new(14, 5);
    let client = SimulatedClient::new()
        .with_roster((1..=15).map(hero).collect())
        .with_rewards(vec![key(2.0)])
        .with_story(
            StoryDetails {
                max_level: 2,
                played_heroes: vec![1],
            },
            StoryMap {
                door,
                positions: vec![Position::new(1, 1)],
                enemies: vec![Enemy { id: 1, hp: 2, max_hp: 2 }],
            },
        )
        .with_door_enemies(vec![Enemy { id: 2, hp: 1, max_hp: 1 }]);
    let (bot, _) = bot_with(client, treasure_config());
    bot.log_in().await.unwrap();
    bot.set_running(true);

    let outcome = bot.adventure().await.unwrap();

    assert_eq!(
        outcome,
        AdventureOutcome::Finished {
            level: 3,
            rewards: 1.0
        }
    );
    let client = bot.client();
    assert_eq!(keys_left(client), 1.0);
    assert_eq!(client.count("enemy_take_damage"), 3);
    let details = client.story_details_snapshot();
    assert_eq!(details.max_level, 3);
    assert_eq!(details.played_heroes, vec![1, 2]);

    let session = bot.stores().adventure();
    assert!(session.blocks().is_empty());
    assert_eq!(session.enemies().len(), 2);
    assert!(session.live_enemies().is_empty());
}

#[tokio::test(start_paused = true)]
async fn adventure_respects_allowed_heroes() {
    let client = SimulatedClient::new()
        .with_roster((1..=15).map(hero).collect())
        .with_rewards(vec![key(1.0)])
        .with_story(
            StoryDetails {
                max_level: 0,
                played_heroes: vec![4],
            },
            StoryMap {
                door: Position::new(0, 0),
                positions: Vec::new(),
                enemies: Vec::new(),
            },
        );
    let config = BotConfig {
        adventure_heroes: vec![4],
        ..treasure_config()
    };
    let (bot, _) = bot_with(client, config);
    bot.log_in().await.unwrap();

    assert_eq!(bot.adventure().await.unwrap(), AdventureOutcome::NoHero);
    assert_eq!(keys_left(bot.client()), 1.0);
}

#[tokio::test(start_paused = true)]
async fn cycle_works_the_map_then_rests_the_squad() {
    let client = SimulatedClient::new()
        .with_heroes(vec![hero(1), hero(2)])
        .with_blocks(vec![block(0, 0, 3)]);
    let (bot, _) = bot_with(client, treasure_config());
    bot.log_in().await.unwrap();
    bot.load_houses().await.unwrap();
    bot.refresh_map().await.unwrap();
    bot.set_running(true);
    let before = bot.client().calls().len();

    bot.cycle().await.unwrap();

    let calls = bot.client().calls();
    assert_eq!(
        calls[before..].to_vec(),
        vec![
            "latest_version",
            "open_map",
            "fetch_squad",
            "go_work",
            "go_work",
            "strike",
            "strike",
            "strike",
            "go_sleep",
            "go_sleep",
            "close_map",
        ]
    );
    assert_eq!(bot.stores().map().total_life(), 0);
    assert!(!bot.client().is_map_open());
    assert!(bot.stores().squad().working().is_empty());
}

#[tokio::test(start_paused = true)]
async fn tired_heroes_stay_asleep() {
    let mut tired = hero(1);
    tired.energy = 50;
    let client = SimulatedClient::new()
        .with_heroes(vec![tired, hero(2)])
        .with_blocks(vec![block(0, 0, 3)]);
    let config = BotConfig {
        num_hero_work: 5,
        ..treasure_config()
    };
    let (bot, _) = bot_with(client, config);
    bot.log_in().await.unwrap();

    bot.refresh_selection().await.unwrap();

    assert_eq!(bot.client().count("go_work"), 1);
    let working: Vec<u64> = bot.working_selection().iter().map(|h| h.id).collect();
    assert_eq!(working, vec![2]);
}

#[tokio::test(start_paused = true)]
async fn shield_mode_alerts_and_benches_broken_shields() {
    let mut broken = hero(1);
    broken.shields[0].current = 0;
    let client = SimulatedClient::new().with_heroes(vec![broken, hero(2)]);
    let (bot, recorder) = bot_with(client, BotConfig::default());
    bot.log_in().await.unwrap();

    bot.refresh_selection().await.unwrap();
    bot.refresh_selection().await.unwrap();

    assert_eq!(recorder.messages(), vec!["Hero 1 needs shield repair".to_string()]);
    assert_eq!(bot.client().hero(1).unwrap().state, HeroState::Sleep);
    assert_eq!(bot.client().hero(2).unwrap().state, HeroState::Work);
}

#[tokio::test(start_paused = true)]
async fn exhausted_hero_is_sent_to_sleep() {
    let mut h = worker(1, 1);
    h.energy = 1;
    let client = SimulatedClient::new()
        .with_heroes(vec![h])
        .with_blocks(vec![block(0, 0, 5)]);
    let (bot, _) = bot_with(client, treasure_config());
    bot.log_in().await.unwrap();
    bot.client().fetch_squad().await.unwrap();
    bot.refresh_map().await.unwrap();

    bot.strike_with(1).await.unwrap();

    let client = bot.client();
    assert_eq!(client.count("go_sleep"), 1);
    assert_eq!(client.count("fetch_squad"), 2);
    assert_eq!(client.hero(1).unwrap().state, HeroState::Sleep);
    assert_eq!(bot.stores().squad().get(1).unwrap().energy, 0);
    assert!(bot.working_selection().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_strike_aborts_the_cycle() {
    let client = SimulatedClient::new()
        .with_heroes(vec![hero(1)])
        .with_blocks(vec![block(0, 0, 3)])
        .failing("strike", ClientError::Transport("socket closed".to_string()));
    let (bot, _) = bot_with(client, treasure_config());
    bot.log_in().await.unwrap();
    bot.refresh_map().await.unwrap();
    bot.set_running(true);

    let err = bot.cycle().await.unwrap_err();

    assert!(matches!(err, BotError::Client(ClientError::Transport(_))));
    assert!(bot.client().is_map_open());
    assert_eq!(bot.dispatch().outstanding(1), 0);
}

#[tokio::test(start_paused = true)]
async fn version_mismatch_stops_the_bot() {
    let client = SimulatedClient::new().with_version(2);
    let (bot, recorder) = bot_with(client, treasure_config());

    let err = bot.run().await.unwrap_err();

    assert!(matches!(err, BotError::VersionMismatch { local: 1, remote: 2 }));
    assert!(err.is_fatal());
    assert!(!bot.is_running());
    assert_eq!(recorder.messages(), vec!["Please update your code version".to_string()]);
    assert_eq!(bot.client().count("login"), 0);
}

#[tokio::test(start_paused = true)]
async fn reset_keeps_a_single_handler() {
    let (bot, _) = bot_with(SimulatedClient::new(), treasure_config());
    bot.reset();
    bot.reset();
    assert_eq!(bot.client().handler_count(), 1);

    bot.client().emit(hunter_protocol::Delta::SquadLoaded(vec![hero(1)]));
    assert_eq!(bot.stores().squad().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn run_loops_until_stopped() {
    let client = SimulatedClient::new().with_blocks(vec![block(0, 0, 3)]);
    let (bot, _) = bot_with(client, treasure_config());
    let handle = tokio::spawn({
        let bot = bot.clone();
        async move { bot.run().await }
    });

    tokio::time::sleep(Duration::from_secs(15)).await;
    assert!(bot.is_running());
    assert_eq!(bot.mode(), PlayMode::Sleeping);
    bot.request_stop();
    handle.await.unwrap().unwrap();

    let client = bot.client();
    assert_eq!(client.count("open_map"), 2);
    assert_eq!(client.count("close_map"), 2);
    assert_eq!(client.count("latest_version"), 1);
    assert!(client.count("ping") >= 1);
}

#[tokio::test(start_paused = true)]
async fn stop_puts_the_squad_to_sleep() {
    let client = SimulatedClient::new()
        .with_heroes(vec![hero(1), hero(2)])
        .with_blocks(vec![block(0, 0, 3)]);
    let (bot, _) = bot_with(client, treasure_config());
    bot.log_in().await.unwrap();
    bot.refresh_selection().await.unwrap();
    bot.set_running(true);

    bot.stop().await.unwrap();

    assert!(!bot.is_running());
    assert_eq!(bot.client().count("go_sleep"), 2);
    assert!(bot.stores().squad().working().is_empty());
}

#[tokio::test(start_paused = true)]
async fn reward_report_needs_a_connection() {
    let client = SimulatedClient::new().with_rewards(vec![
        key(3.0),
        Reward {
            network: "POLYGON".to_string(),
            kind: "BCOIN".to_string(),
            value: 1.5,
        },
    ]);
    let (bot, _) = bot_with(client, treasure_config());

    assert!(matches!(
        bot.render_reward_report().await,
        Err(BotError::NotConnected)
    ));

    bot.log_in().await.unwrap();
    let report = bot.render_reward_report().await.unwrap();
    assert_eq!(report, "Rewards:\nPOLYGON-BCOIN: 1.50\nBSC-Key: 3");
}

#[tokio::test(start_paused = true)]
async fn status_report_lists_map_and_heroes() {
    let mut resting = hero(2);
    resting.energy = 50;
    let mut home = hero(3);
    home.state = HeroState::Home;
    home.energy = 50;
    let client = SimulatedClient::new()
        .with_heroes(vec![worker(1, 1), resting, home])
        .with_blocks(vec![block(0, 0, 3), block(0, 1, 0)]);
    let config = BotConfig {
        house_heroes: vec![3],
        ..treasure_config()
    };
    let (bot, _) = bot_with(client, config);
    bot.log_in().await.unwrap();
    bot.refresh_map().await.unwrap();
    bot.refresh_selection().await.unwrap();

    let report = bot.render_status_report();

    assert!(report.starts_with("Playing mode: starting\n"));
    assert!(report.contains("Network: BSC"));
    assert!(report.contains("Total life: 3/3 | Blocks: 1/2"));
    assert!(report.contains("Heroes selected for home(1): 3"));
    assert!(report.contains("Wood: 1"));
    assert!(report.contains("Last adventure: never"));
    assert!(report.contains("Working heroes (1): \nCommon [1]: 100/100 | 100/100"));
    assert!(report.contains("Resting heroes (1): \nCommon [2]: 50/100 | 100/100"));
    assert!(report.ends_with("Resting heroes at home (1): \n* Common [3]: 50/100 | 100/100"));
    assert!(!report.contains("Total enemies adventure"));
}

#[tokio::test(start_paused = true)]
async fn adventure_runs_at_most_once_per_interval() {
    let client = SimulatedClient::new().with_blocks(vec![block(0, 0, 3)]);
    let config = BotConfig {
        mode_adventure: true,
        ..treasure_config()
    };
    let (bot, _) = bot_with(client, config);
    bot.log_in().await.unwrap();
    bot.refresh_map().await.unwrap();
    bot.set_running(true);
    assert!(bot.render_status_report().contains("Last adventure: never"));

    bot.cycle().await.unwrap();
    assert_eq!(bot.client().count("fetch_roster"), 1);
    assert_eq!(bot.mode(), PlayMode::Adventure);
    assert!(!bot.render_status_report().contains("Last adventure: never"));

    tokio::time::sleep(Duration::from_secs(5 * 60)).await;
    bot.cycle().await.unwrap();
    assert_eq!(bot.client().count("fetch_roster"), 1);
    assert_eq!(bot.mode(), PlayMode::Treasure);

    tokio::time::sleep(bot::ADVENTURE_INTERVAL).await;
    bot.cycle().await.unwrap();
    assert_eq!(bot.client().count("fetch_roster"), 2);
}

#[tokio::test(start_paused = true)]
async fn exhausted_map_clears_per_run_records() {
    let client = SimulatedClient::new()
        .with_heroes(vec![worker(1, 1)])
        .with_blocks(vec![block(0, 0, 1), block(0, 5, 0)]);
    let (bot, _) = bot_with(client, treasure_config());
    bot.log_in().await.unwrap();
    bot.refresh_selection().await.unwrap();
    bot.refresh_map().await.unwrap();
    bot.session().rotation = 3;

    bot.strike_with(1).await.unwrap();
    assert_eq!(bot.stores().map().total_life(), 0);
    let h = bot.stores().squad().get(1).cloned().unwrap();
    {
        let dispatch = bot.dispatch();
        assert!(dispatch.sticky(1).is_some());
        assert_eq!(dispatch.history().len(), 1);
        assert!(dispatch.required_wait(&h, Position::new(0, 5)) > Duration::ZERO);
    }
    {
        let map = bot.stores().map();
        let slot = bot
            .dispatch()
            .begin(&h, Position::new(0, 0), &map, tokio::time::Instant::now());
        assert!(slot.is_some());
    }
    assert_eq!(bot.dispatch().outstanding(1), 1);
    assert_eq!(bot.session().selection, vec![1]);

    bot.refresh_map().await.unwrap();

    let dispatch = bot.dispatch();
    assert!(dispatch.sticky(1).is_none());
    assert!(dispatch.history().is_empty());
    assert_eq!(dispatch.outstanding(1), 0);
    assert_eq!(dispatch.required_wait(&h, Position::new(0, 5)), Duration::ZERO);
    drop(dispatch);
    let session = bot.session();
    assert!(session.selection.is_empty());
    assert_eq!(session.rotation, 0);
    drop(session);
    assert_eq!(bot.stores().map().total_life(), 1);
    assert_eq!(bot.client().count("rewards"), 2);
}

#[tokio::test(start_paused = true)]
async fn new_version_is_noticed_between_rounds() {
    let mut h = hero(1);
    h.energy = 100_000;
    h.max_energy = 100_000;
    let client = SimulatedClient::new()
        .with_heroes(vec![h])
        .with_blocks(vec![block(0, 0, 100_000)]);
    let (bot, recorder) = bot_with(client, treasure_config());
    bot.log_in().await.unwrap();
    bot.refresh_map().await.unwrap();
    bot.set_running(true);
    let handle = tokio::spawn({
        let bot = bot.clone();
        async move { bot.cycle().await }
    });

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(!handle.is_finished());
    bot.client().set_version(2);
    let err = handle.await.unwrap().unwrap_err();

    assert!(matches!(err, BotError::VersionMismatch { local: 1, remote: 2 }));
    assert!(!bot.is_running());
    assert_eq!(recorder.messages(), vec!["Please update your code version".to_string()]);
    assert_eq!(bot.client().count("latest_version"), 2);
    assert!(bot.stores().map().total_life() > 0);
}
