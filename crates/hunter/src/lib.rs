//! Hunter: a bot that works a squad of heroes through the treasure map, rotates them
//! through the home, and plays adventure levels between cycles.
//!
//! Depend on this crate alone and reach the pieces through [`engine`] and [`protocol`],
//! or pull the usual set in with [`prelude`].

pub use hunter_engine as engine;
pub use hunter_protocol as protocol;

pub mod prelude {
    pub use hunter_engine::{
        AdventureOutcome, BotConfig, BotError, ClientError, GameClient, LogNotifier, Notifier,
        SimulatedClient, TreasureBot,
    };
    pub use hunter_protocol::{Delta, Hero, HeroId, HeroState, PlayMode, Position};
}
