//! Orchestration engine for Hunter.
//!
//! [`TreasureBot`] drives a squad of heroes against the treasure map through a
//! [`GameClient`], keeping local mirrors ([`Stores`]) in step with the backend through
//! the [`SyncLayer`].

pub mod admission;
pub mod adventure;
pub mod bot;
pub mod client;
pub mod config;
pub mod error;
pub mod home;
pub mod report;
pub mod shield;
pub mod sim;
pub mod slots;
pub mod store;
pub mod sync;

pub use adventure::AdventureOutcome;
pub use bot::TreasureBot;
pub use client::{GameClient, LogNotifier, Notifier};
pub use config::BotConfig;
pub use error::{BotError, ClientError};
pub use sim::SimulatedClient;
pub use store::{Squad, TreasureMap};
pub use sync::{Stores, SyncLayer};

#[cfg(test)]
mod tests;
