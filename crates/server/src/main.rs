use clap::Parser;
use hunter_engine::{SimulatedClient, TreasureBot};
use hunter_protocol::{
    Block, BlockKind, Enemy, Hero, HeroState, House, Position, Rarity, Reward, Shield,
    StoryDetails, StoryMap,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Hunter treasure bot with a local status interface", long_about = None)]
struct Cli {
    /// YAML bot config. Defaults to ~/.hunter/config.yaml.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "127.0.0.1:39333")]
    status_addr: SocketAddr,

    /// Play adventure mode between treasure cycles.
    #[arg(long)]
    adventure: bool,

    /// Plain treasure strikes instead of the shielded amazon map.
    #[arg(long)]
    treasure: bool,
}

fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hunter")
        .join("config.yaml")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = hunter_server::load_config(&cli.config.unwrap_or_else(default_config_path))?;
    if cli.adventure {
        config.mode_adventure = true;
    }
    if cli.treasure {
        config.mode_amazon = false;
    }
    let force_exit = config.force_exit;

    let bot = TreasureBot::new(demo_client(), config);
    let listener = tokio::net::TcpListener::bind(cli.status_addr).await?;
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(hunter_server::serve_listener(
        listener,
        bot.clone(),
        async move {
            let _ = shutdown_rx.await;
        },
    ));

    let outcome = tokio::select! {
        res = bot.run() => res,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            Ok(())
        }
    };
    if let Err(err) = &outcome {
        error!(%err, fatal = err.is_fatal(), "bot stopped");
    }
    bot.stop().await?;

    if !force_exit {
        info!("bot stopped; status interface stays up until interrupted");
        tokio::signal::ctrl_c().await?;
    }
    let _ = shutdown_tx.send(());
    server.await??;
    outcome.map_err(Into::into)
}

/// Local backend seeded with a full squad, a treasure map and one adventure level.
fn demo_client() -> SimulatedClient {
    const RARITIES: [Rarity; 6] = [
        Rarity::Common,
        Rarity::Rare,
        Rarity::SuperRare,
        Rarity::Epic,
        Rarity::Legend,
        Rarity::SuperLegend,
    ];
    let heroes: Vec<Hero> = (1..=16u64)
        .map(|id| {
            let rarity = RARITIES[(id as usize) % RARITIES.len()];
            let power = i64::from(rarity.index()) + 1;
            Hero {
                id,
                rarity,
                hero_type: (id % 4) as u8,
                energy: 100 + power * 20,
                max_energy: 100 + power * 20,
                speed: 4 + (id % 5) as u32,
                capacity: 1 + (id % 3) as u32,
                range: 1 + (id % 2) as u32,
                damage: power,
                state: HeroState::Sleep,
                shields: vec![Shield {
                    current: 300 * power,
                    total: 300 * power,
                }],
            }
        })
        .collect();

    let blocks: Vec<Block> = (0..29i64)
        .flat_map(|i| (0..11i64).map(move |j| (i, j)))
        .filter(|(i, j)| (i * 7 + j * 3) % 5 == 0)
        .map(|(i, j)| {
            let (kind, hp) = match (i + j) % 9 {
                0 => (BlockKind::Chest, 12),
                1 => (BlockKind::Cage, 20),
                2 | 3 => (BlockKind::Rock, 8),
                _ => (BlockKind::Wood, 3),
            };
            Block {
                pos: Position::new(i, j),
                kind,
                hp,
                max_hp: hp,
            }
        })
        .collect();

    let story = StoryMap {
        door: Position::new(14, 5),
        positions: (0..6).map(|k| Position::new(3 + k * 4, k % 3)).collect(),
        enemies: (1..=4)
            .map(|id| Enemy {
                id,
                hp: 6,
                max_hp: 6,
            })
            .collect(),
    };

    SimulatedClient::new()
        .with_heroes(heroes)
        .with_blocks(blocks)
        .with_houses(vec![House {
            id: 1,
            slots: 4,
            active: true,
        }])
        .with_rewards(vec![
            Reward {
                network: "BSC".to_string(),
                kind: "BCOIN".to_string(),
                value: 0.0,
            },
            Reward {
                network: "BSC".to_string(),
                kind: hunter_protocol::rewards::KEY.to_string(),
                value: 3.0,
            },
        ])
        .with_story(StoryDetails::default(), story)
        .with_door_enemies(vec![Enemy {
            id: 99,
            hp: 10,
            max_hp: 10,
        }])
}
