use anyhow::Context;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hunter_engine::{BotConfig, BotError, GameClient, TreasureBot};
use hunter_protocol::PlayMode;
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

pub struct AppState<C> {
    pub bot: TreasureBot<C>,
}

pub fn build_router<C: GameClient>(state: AppState<C>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status::<C>))
        .route("/api/summary", get(summary::<C>))
        .route("/api/rewards", get(rewards::<C>))
        .route("/api/exit", post(exit::<C>))
        .with_state(Arc::new(state))
        .layer(middleware::from_fn(ip_allowlist))
        .layer(status_cors())
}

async fn health() -> &'static str {
    "ok"
}

async fn status<C: GameClient>(State(state): State<Arc<AppState<C>>>) -> String {
    state.bot.render_status_report()
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub mode: PlayMode,
    pub running: bool,
    pub total_life: i64,
    pub max_life: i64,
    pub working: usize,
    pub resting: usize,
    pub home: usize,
}

async fn summary<C: GameClient>(State(state): State<Arc<AppState<C>>>) -> Json<Summary> {
    let bot = &state.bot;
    let (total_life, max_life) = {
        let map = bot.stores().map();
        (map.total_life(), map.max_life())
    };
    let (resting, home) = {
        let squad = bot.stores().squad();
        (squad.sleeping().len(), squad.home().len())
    };
    Json(Summary {
        mode: bot.mode(),
        running: bot.is_running(),
        total_life,
        max_life,
        working: bot.working_selection().len(),
        resting,
        home,
    })
}

async fn rewards<C: GameClient>(
    State(state): State<Arc<AppState<C>>>,
) -> Result<String, (StatusCode, String)> {
    state.bot.render_reward_report().await.map_err(|err| {
        let code = match err {
            BotError::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_GATEWAY,
        };
        (code, err.to_string())
    })
}

async fn exit<C: GameClient>(State(state): State<Arc<AppState<C>>>) -> &'static str {
    info!("exit requested");
    state.bot.request_stop();
    "stopping"
}

/// Reads the YAML bot config. A missing file yields the defaults.
pub fn load_config(path: &Path) -> anyhow::Result<BotConfig> {
    if !path.exists() {
        warn!(path = %path.display(), "config file not found, using defaults");
        return Ok(BotConfig::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_config(&raw).with_context(|| format!("parsing {}", path.display()))
}

pub fn parse_config(raw: &str) -> anyhow::Result<BotConfig> {
    if raw.trim().is_empty() {
        return Ok(BotConfig::default());
    }
    Ok(serde_yaml::from_str(raw)?)
}

pub async fn serve<C: GameClient>(addr: SocketAddr, bot: TreasureBot<C>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_listener(listener, bot, std::future::pending()).await?;
    Ok(())
}

pub async fn serve_listener<C: GameClient>(
    listener: tokio::net::TcpListener,
    bot: TreasureBot<C>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<SocketAddr> {
    let app = build_router(AppState { bot });
    let addr = listener.local_addr()?;
    info!(%addr, "status interface listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(addr)
}

/// Hosts a browser may name in `Origin` when talking to the status interface.
const LOCAL_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "[::1]"];

/// Tailnet peers get addresses from the carrier-grade NAT block, 100.64.0.0/10.
const TAILNET: (Ipv4Addr, u32) = (Ipv4Addr::new(100, 64, 0, 0), 10);

async fn ip_allowlist(
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !is_allowed_peer_ip(peer.ip()) {
        warn!(%peer, path = %req.uri().path(), "status request from outside the tailnet");
        return (StatusCode::FORBIDDEN, "forbidden").into_response();
    }
    next.run(req).await
}

fn is_allowed_peer_ip(ip: IpAddr) -> bool {
    match ip.to_canonical() {
        IpAddr::V4(v4) => v4.is_loopback() || in_v4_block(v4, TAILNET),
        IpAddr::V6(v6) => v6.is_loopback(),
    }
}

fn in_v4_block(ip: Ipv4Addr, (base, prefix): (Ipv4Addr, u32)) -> bool {
    let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
    u32::from(ip) & mask == u32::from(base) & mask
}

fn status_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
            origin
                .to_str()
                .ok()
                .and_then(origin_host)
                .is_some_and(|host| LOCAL_HOSTS.contains(&host))
        }))
}

/// Host part of an `http` or `https` origin. The port, when present, must be numeric.
fn origin_host(origin: &str) -> Option<&str> {
    let (scheme, authority) = origin.split_once("://")?;
    if scheme != "http" && scheme != "https" {
        return None;
    }
    let (host, port) = match authority.rfind(':') {
        Some(at) if !authority.ends_with(']') => (&authority[..at], Some(&authority[at + 1..])),
        _ => (authority, None),
    };
    let port_ok = port.map_or(true, |p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
    (port_ok && !host.is_empty()).then_some(host)
}
