//! Read-only text projections for the status interface.

use crate::bot::TreasureBot;
use crate::client::GameClient;
use crate::error::{BotError, Result};
use hunter_protocol::{Hero, PlayMode};
use std::fmt::Write as _;
use time::format_description::well_known::Rfc3339;

impl<C: GameClient> TreasureBot<C> {
    pub fn render_status_report(&self) -> String {
        let (mode, last_adventure) = {
            let session = self.session();
            (session.mode, session.last_adventure_at)
        };
        let config = self.config();
        let format_hero = |hero: &Hero| {
            let shield = hero
                .shields
                .first()
                .map_or_else(|| "empty shield".to_string(), |s| format!("{}/{}", s.current, s.total));
            let mark = if config.is_house_hero(hero.id) { "* " } else { "" };
            format!(
                "{mark}{} [{}]: {}/{} | {shield}",
                hero.rarity, hero.id, hero.energy, hero.max_energy
            )
        };

        let mut out = String::new();
        let _ = writeln!(out, "Playing mode: {mode}\n");
        if mode == PlayMode::Adventure {
            let session = self.stores().adventure();
            let _ = writeln!(
                out,
                "Total enemies adventure: {}/{}\n",
                session.live_enemies().len(),
                session.enemies().len()
            );
        }
        let _ = writeln!(out, "Network: {}", config.network);
        {
            let map = self.stores().map();
            let _ = writeln!(out, "Treasure/Amazon:\n{map}");
            let ids: Vec<String> = config.house_heroes.iter().map(|id| id.to_string()).collect();
            let _ = writeln!(
                out,
                "Heroes selected for home({}): {}",
                ids.len(),
                ids.join(", ")
            );
            let _ = writeln!(out, "Remaining blocks:");
            for (kind, count) in map.remaining_by_kind() {
                let _ = writeln!(out, "{kind}: {count}");
            }
        }
        let adventure = last_adventure
            .and_then(|at| at.format(&Rfc3339).ok())
            .unwrap_or_else(|| "never".to_string());
        let _ = writeln!(out, "Last adventure: {adventure}\n");

        let working: Vec<String> = self.working_selection().iter().map(format_hero).collect();
        let (sleeping, home): (Vec<String>, Vec<String>) = {
            let squad = self.stores().squad();
            (
                squad.sleeping().into_iter().map(format_hero).collect(),
                squad.home().into_iter().map(format_hero).collect(),
            )
        };
        let _ = writeln!(out, "INFO: LIFE HERO | SHIELD HERO");
        let _ = writeln!(out, "Working heroes ({}): \n{}\n", working.len(), working.join("\n"));
        let _ = writeln!(out, "Resting heroes ({}): \n{}\n", sleeping.len(), sleeping.join("\n"));
        let _ = write!(out, "Resting heroes at home ({}): \n{}", home.len(), home.join("\n"));
        out
    }

    pub async fn render_reward_report(&self) -> Result<String> {
        if !self.client().is_connected() {
            return Err(BotError::NotConnected);
        }
        let mut rewards = self.client().rewards().await?;
        rewards.sort_by(|a, b| b.network.cmp(&a.network));
        let lines: Vec<String> = rewards
            .iter()
            .map(|r| {
                if r.value.fract() == 0.0 {
                    format!("{}-{}: {}", r.network, r.kind, r.value)
                } else {
                    format!("{}-{}: {:.2}", r.network, r.kind, r.value)
                }
            })
            .collect();
        Ok(format!("Rewards:\n{}", lines.join("\n")))
    }
}
