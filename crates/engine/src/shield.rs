use hunter_protocol::{Hero, HeroId};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

pub const ALERT_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShieldCheck {
    /// Emit a "needs shield repair" alert now.
    pub alert: bool,
    /// Keep the hero out of work this cycle.
    pub skip: bool,
}

/// Rate-limited alerts for heroes running out of shield.
#[derive(Debug, Clone, Default)]
pub struct ShieldMonitor {
    last_alert: HashMap<HeroId, Instant>,
}

impl ShieldMonitor {
    pub fn check(&mut self, hero: &Hero, threshold: i64, now: Instant) -> ShieldCheck {
        let sum = hero.shield_sum();
        if hero.has_shield() && sum > threshold {
            return ShieldCheck::default();
        }
        ShieldCheck {
            alert: self.stamp(hero.id, now),
            skip: !hero.has_shield() || sum == 0,
        }
    }

    /// Records an alert unless one went out for this hero within the interval.
    fn stamp(&mut self, hero: HeroId, now: Instant) -> bool {
        match self.last_alert.get(&hero) {
            Some(last) if now.saturating_duration_since(*last) <= ALERT_INTERVAL => false,
            _ => {
                self.last_alert.insert(hero, now);
                true
            }
        }
    }
}
