//! Shared application state: the roster registries, the live session slot
//! and the infrastructure handles every service reaches for.

pub mod control;
pub mod game;
pub mod sequence;
mod sse;

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};

use crate::config::AppConfig;
use crate::dao::game_store::GameStore;
use crate::error::ServiceError;
use crate::state::game::{Badge, Game, LiveSession, ScanRecord, Station, Team};

pub use self::sse::SseHub;

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

/// Central application state storing the roster, the live session and the
/// storage handle.
///
/// Roster registries are [`DashMap`]s so scan-path lookups never contend
/// with each other. The live session sits behind an [`RwLock`]: scans take
/// read guards and run concurrently, lifecycle changes take the write guard
/// and therefore observe no in-flight scan.
pub struct AppState {
    config: AppConfig,
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    degraded: watch::Sender<bool>,
    sse: SseHub,
    teams: DashMap<uuid::Uuid, Team>,
    badges: DashMap<String, Badge>,
    stations: DashMap<uuid::Uuid, Station>,
    games: DashMap<uuid::Uuid, Game>,
    session: RwLock<Option<LiveSession>>,
    session_gate: Mutex<()>,
    recent_scans: RwLock<VecDeque<ScanRecord>>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            game_store: RwLock::new(None),
            degraded: degraded_tx,
            sse: SseHub::new(16),
            teams: DashMap::new(),
            badges: DashMap::new(),
            stations: DashMap::new(),
            games: DashMap::new(),
            session: RwLock::new(None),
            session_gate: Mutex::new(()),
            recent_scans: RwLock::new(VecDeque::new()),
        })
    }

    /// Runtime configuration loaded at startup.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        let guard = self.game_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the game store or fail with [`ServiceError::StorageUnavailable`].
    pub async fn require_game_store(&self) -> Result<Arc<dyn GameStore>, ServiceError> {
        self.game_store()
            .await
            .ok_or(ServiceError::StorageUnavailable)
    }

    /// Install a new game store implementation and leave degraded mode.
    pub async fn set_game_store(&self, store: Arc<dyn GameStore>) {
        {
            let mut guard = self.game_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current game store and enter degraded mode.
    pub async fn clear_game_store(&self) {
        {
            let mut guard = self.game_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag. The supervisor may raise it while a store is
    /// still installed but failing its health checks.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag, notifying watchers only on a change.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Broadcast hub for the public SSE stream.
    pub fn sse(&self) -> &SseHub {
        &self.sse
    }

    /// Team registry keyed by team id.
    pub fn teams(&self) -> &DashMap<uuid::Uuid, Team> {
        &self.teams
    }

    /// Badge registry keyed by RFID uid.
    pub fn badges(&self) -> &DashMap<String, Badge> {
        &self.badges
    }

    /// Station registry keyed by station id.
    pub fn stations(&self) -> &DashMap<uuid::Uuid, Station> {
        &self.stations
    }

    /// Game definition registry keyed by game id.
    pub fn games(&self) -> &DashMap<uuid::Uuid, Game> {
        &self.games
    }

    /// Slot holding the live session, when one is running.
    pub fn session(&self) -> &RwLock<Option<LiveSession>> {
        &self.session
    }

    /// Gate serializing session lifecycle changes (start, stop, complete).
    pub fn session_gate(&self) -> &Mutex<()> {
        &self.session_gate
    }

    /// Append a scan to the bounded in-memory feed.
    pub async fn push_scan_record(&self, record: ScanRecord) {
        let cap = self.config.recent_scans_cap;
        let mut feed = self.recent_scans.write().await;
        if feed.len() >= cap {
            feed.pop_front();
        }
        feed.push_back(record);
    }

    /// Recent scans, newest first.
    pub async fn recent_scans(&self) -> Vec<ScanRecord> {
        let feed = self.recent_scans.read().await;
        feed.iter().rev().cloned().collect()
    }
}
