// =============================================================================
// Central Application State — pivot monitor
// =============================================================================
//
// The single source of truth shared between the Feed Client, the Refreshers,
// and every HTTP/SSE handler. Each subsystem owns its own interior
// mutability; AppState just ties the Arcs together.
// =============================================================================

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use crate::binance::client::BinanceClient;
use crate::broker::Broker;
use crate::config::Config;
use crate::pivot::store::Store;
use crate::signals::cooldown::CooldownGate;
use crate::signals::detector::Detector;
use crate::signals::history::History;
use crate::signals::signal::Signal;

/// Shared handles every API handler and background task needs.
pub struct AppState {
    pub config: Config,
    pub binance: BinanceClient,
    pub store: Arc<Store>,
    pub history: Arc<History>,
    pub broker: Broker<Signal>,
    pub cooldown: Arc<CooldownGate>,
    /// The Detector is single-writer (driven by the Feed Client task) but is
    /// still behind a mutex so ownership is explicit rather than `unsafe`.
    pub detector: StdMutex<Detector>,
}

impl AppState {
    pub fn new(config: Config) -> Arc<Self> {
        let binance = BinanceClient::new(config.base_url.clone());
        let store = Arc::new(Store::new(chrono::Duration::hours(2)));
        let history = Arc::new(History::new(config.history_cap));
        let broker: Broker<Signal> = Broker::new();
        let cooldown = Arc::new(CooldownGate::new(config.cooldown));

        let detector = Detector::new(store.clone(), cooldown.clone(), history.clone(), broker.clone());

        Arc::new(Self {
            config,
            binance,
            store,
            history,
            broker,
            cooldown,
            detector: StdMutex::new(detector),
        })
    }
}
