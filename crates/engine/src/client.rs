//! Boundary with the outside world: the game backend and the chat notifier.
//!
//! Transport, authentication and encoding live behind [`GameClient`]. Calls that change
//! remote state report the confirmed result as a [`hunter_protocol::Delta`] through the
//! registered [`SyncLayer`] before their future resolves.

use crate::error::ClientError;
use crate::sync::SyncLayer;
use hunter_protocol::{
    DoorReward, Hero, HeroId, House, Reward, StoryDetails, StoryMap, StrikeOutcome,
    StrikeRequest,
};
use std::future::Future;

pub type ClientResult<T> = Result<T, ClientError>;

pub trait GameClient: Send + Sync + 'static {
    fn connect(&self) -> impl Future<Output = ClientResult<()>> + Send;
    fn login(&self) -> impl Future<Output = ClientResult<()>> + Send;
    fn is_connected(&self) -> bool;
    fn is_logged_in(&self) -> bool;

    /// Drops every registered handler.
    fn clear_handlers(&self);
    fn register_handler(&self, handler: SyncLayer);

    /// Delivers `Delta::MapLoaded`.
    fn fetch_map(&self) -> impl Future<Output = ClientResult<()>> + Send;
    /// Delivers `Delta::SquadLoaded` with the active heroes.
    fn fetch_squad(&self) -> impl Future<Output = ClientResult<()>> + Send;
    /// Every hero of the account, active or not.
    fn fetch_roster(&self) -> impl Future<Output = ClientResult<Vec<Hero>>> + Send;

    fn go_work(&self, hero: HeroId) -> impl Future<Output = ClientResult<()>> + Send;
    fn go_sleep(&self, hero: HeroId) -> impl Future<Output = ClientResult<()>> + Send;
    fn go_home(&self, hero: HeroId) -> impl Future<Output = ClientResult<()>> + Send;

    fn open_map(&self, amazon: bool) -> impl Future<Output = ClientResult<()>> + Send;
    fn close_map(&self) -> impl Future<Output = ClientResult<()>> + Send;

    /// `Ok(None)` means the backend gave no positive response.
    fn strike(
        &self,
        req: StrikeRequest,
    ) -> impl Future<Output = ClientResult<Option<StrikeOutcome>>> + Send;
    fn strike_alternate(
        &self,
        req: StrikeRequest,
    ) -> impl Future<Output = ClientResult<Option<StrikeOutcome>>> + Send;

    fn story_strike(&self, req: StrikeRequest) -> impl Future<Output = ClientResult<()>> + Send;
    fn enemy_take_damage(
        &self,
        enemy: u64,
        hero: HeroId,
    ) -> impl Future<Output = ClientResult<()>> + Send;
    fn story_details(&self) -> impl Future<Output = ClientResult<StoryDetails>> + Send;
    fn story_map(
        &self,
        hero: HeroId,
        level: u32,
    ) -> impl Future<Output = ClientResult<StoryMap>> + Send;
    fn enter_door(&self) -> impl Future<Output = ClientResult<DoorReward>> + Send;

    fn rewards(&self) -> impl Future<Output = ClientResult<Vec<Reward>>> + Send;
    fn houses(&self) -> impl Future<Output = ClientResult<Vec<House>>> + Send;
    fn ping(&self) -> impl Future<Output = ClientResult<()>> + Send;
    /// Latest published client version.
    fn latest_version(&self) -> impl Future<Output = ClientResult<u32>> + Send;
}

/// Outbound chat messages. Delivery is best effort.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, message: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        tracing::info!(target: "hunter::notify", "{message}");
    }
}
