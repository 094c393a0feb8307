//! PriceUpdateEngine
//!
//! Simulates a live, slowly drifting price feed for a catalog of CNG stations.
//! Responsibilities:
//!   • Hold the current price and bounded history per station
//!   • Run a periodic tick that moves a few station prices
//!   • Broadcast each tick's batch to every subscriber
//!   • Answer point queries about current prices and history
//!
//! The engine is an Arc-managed service: the timer task holds a weak
//! reference, so dropping the last handle also stops the timer.

pub mod book;
pub mod drift;
pub mod history;
pub mod listeners;
pub mod types;

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{Instrument, debug, error, info, instrument, warn};

use crate::catalog::{StationCatalog, StationPrice};
use crate::config::{EngineConfig, interval_from_minutes};
use crate::error::PriceFeedError;
use crate::time::now_ms;

use book::PriceBook;
use drift::{PriceDrift, apply_delta};
use listeners::{ListenerRegistry, deliver};

pub use listeners::{PriceListener, Subscription};
pub use types::{PriceUpdate, StationPriceRecord};

/// Tick bookkeeping; only read or written while the tick gate is held.
#[derive(Default)]
struct TickState {
    /// A tick is generating or broadcasting on the gate-holding thread.
    running: Cell<bool>,
    /// A tick was requested from inside a running one.
    pending: Cell<bool>,
}

pub struct PriceUpdateEngine {
    config: EngineConfig,
    drift: PriceDrift,

    /// Cadence used by the next `connect`.
    update_interval: Mutex<Duration>,

    /// Station prices and history. Written only by ticks and seeding.
    book: Mutex<PriceBook>,

    listeners: Arc<ListenerRegistry>,

    rng: Mutex<StdRng>,

    /// Running timer task; `Some` while connected.
    timer: Mutex<Option<JoinHandle<()>>>,

    /// Serialises ticks and subscribe snapshots across threads. Reentrant so
    /// listeners may call back into the engine from inside a tick.
    tick_gate: ReentrantMutex<TickState>,

    tick_seq: AtomicU64,
}

impl PriceUpdateEngine {
    /// Create an engine with an empty book.
    pub fn new(config: EngineConfig) -> Arc<Self> {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let (update_interval, _) = interval_from_minutes(config.update_interval.as_secs_f64() / 60.0);

        Arc::new(Self {
            drift: PriceDrift::new(config.max_price_change, config.trend_amplitude),
            update_interval: Mutex::new(update_interval),
            book: Mutex::new(PriceBook::new(config.max_history_len, now_ms())),
            listeners: Arc::new(ListenerRegistry::default()),
            rng: Mutex::new(rng),
            timer: Mutex::new(None),
            tick_gate: ReentrantMutex::new(TickState::default()),
            tick_seq: AtomicU64::new(0),
            config,
        })
    }

    /// Create an engine and seed it from `catalog`.
    ///
    /// A failing catalog leaves the engine empty but usable.
    pub async fn from_catalog<C>(config: EngineConfig, catalog: &C) -> Arc<Self>
    where
        C: StationCatalog + ?Sized,
    {
        let engine = Self::new(config);
        engine.seed_from(catalog).await;
        engine
    }

    // =========================
    // Seeding
    // =========================

    /// Load stations from `catalog` and seed the book.
    ///
    /// Errors are logged and swallowed; returns the number of stations seeded.
    #[instrument(skip_all)]
    pub async fn seed_from<C>(&self, catalog: &C) -> usize
    where
        C: StationCatalog + ?Sized,
    {
        match catalog.load_stations().await {
            Ok(stations) => self.seed(stations),
            Err(e) => {
                let err = PriceFeedError::Seeding(format!("{e:#}"));
                error!(error = %err, "error initializing price history");
                0
            }
        }
    }

    /// Reset one record per station to its catalog price with empty history.
    pub fn seed<I>(&self, stations: I) -> usize
    where
        I: IntoIterator<Item = StationPrice>,
    {
        let seeded = self.book.lock().seed(stations);
        info!(seeded, "price book seeded from catalog");
        seeded
    }

    // =========================
    // Lifecycle
    // =========================

    /// Start the periodic timer and run one tick immediately.
    ///
    /// A no-op when already connected. Outside a tokio runtime the call is
    /// logged and the engine stays disconnected.
    ///
    /// Called from a listener, the eager tick runs once the current tick has
    /// reached every listener.
    pub fn connect(self: &Arc<Self>) {
        {
            let mut timer = self.timer.lock();
            if timer.is_some() {
                warn!("price update engine is already connected");
                return;
            }

            let runtime = match tokio::runtime::Handle::try_current() {
                Ok(handle) => handle,
                Err(e) => {
                    error!(error = %e, "cannot connect price update engine outside a tokio runtime");
                    return;
                }
            };

            let period = *self.update_interval.lock();
            let span = tracing::info_span!("price_timer", interval_secs = period.as_secs());
            *timer = Some(runtime.spawn(
                run_timer(Arc::downgrade(self), period).instrument(span),
            ));

            info!(interval_secs = period.as_secs(), "price update engine connected");
        }

        self.tick();
    }

    /// Stop the timer. Safe to call when not connected.
    ///
    /// Called from inside a listener during a tick, the current tick still
    /// completes; no further ticks run.
    pub fn disconnect(&self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.abort();
            info!("price update engine disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.timer.lock().is_some()
    }

    /// Change the tick cadence.
    ///
    /// Values below one minute are clamped to one minute. While connected
    /// the timer restarts right away with the new cadence.
    pub fn set_update_interval(self: &Arc<Self>, minutes: f64) {
        let (period, clamped) = interval_from_minutes(minutes);
        if clamped {
            let err = PriceFeedError::InvalidInterval(minutes);
            warn!(error = %err, "update interval cannot be less than 1 minute; using 1 minute");
        }

        *self.update_interval.lock() = period;
        debug!(interval_secs = period.as_secs(), "update interval changed");

        if self.is_connected() {
            self.disconnect();
            self.connect();
        }
    }

    pub fn update_interval(&self) -> Duration {
        *self.update_interval.lock()
    }

    // =========================
    // Subscriptions
    // =========================

    /// Register `callback` and immediately send it the current price of
    /// every known station (each with `change == 0`).
    ///
    /// Later calls receive each tick's batch. Errors and panics raised by
    /// the callback are logged and never reach other subscribers.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[PriceUpdate]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let listener: PriceListener = Arc::new(callback);

        // Snapshot and registration happen together under the tick gate, so
        // the first batch a subscriber sees is always the snapshot.
        let _gate = self.tick_gate.lock();
        let snapshot = self.current_prices();
        let id = self.listeners.register(Arc::clone(&listener));
        deliver(id, &listener, &snapshot);

        Subscription::new(id, &self.listeners)
    }

    /// Subscribe through a bounded channel.
    ///
    /// Batches that do not fit (or arrive after the receiver is dropped) are
    /// logged as listener failures.
    pub fn subscribe_channel(
        &self,
        capacity: usize,
    ) -> (Subscription, mpsc::Receiver<Vec<PriceUpdate>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let subscription = self.subscribe(move |updates| {
            tx.try_send(updates.to_vec())
                .map_err(|e| anyhow::anyhow!("price channel send failed: {e}"))
        });
        (subscription, rx)
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    // =========================
    // Queries
    // =========================

    /// `None` until the station has been seeded.
    pub fn current_price(&self, station_id: &str) -> Option<f64> {
        self.book.lock().current_price(station_id)
    }

    /// Newest-first history; empty for unknown stations.
    pub fn price_history(&self, station_id: &str) -> Vec<PriceUpdate> {
        self.book.lock().history(station_id)
    }

    /// Every station's current price as a zero-change update stamped with
    /// the last tick time.
    pub fn current_prices(&self) -> Vec<PriceUpdate> {
        self.book.lock().snapshot()
    }

    /// Effective price movement over the trailing `window`.
    pub fn recent_change(&self, station_id: &str, window: Duration) -> Option<f64> {
        let since = now_ms().saturating_sub(window.as_millis() as u64);
        self.book.lock().recent_change(station_id, since)
    }

    pub fn station_ids(&self) -> Vec<String> {
        self.book.lock().station_ids()
    }

    /// Time of the last tick (or of engine creation before any tick).
    pub fn last_update_ms(&self) -> u64 {
        self.book.lock().last_update_ms()
    }

    // =========================
    // Tick
    // =========================

    /// Run one update cycle now: move a random subset of stations, commit
    /// the moves, then broadcast the batch.
    ///
    /// Failures abandon this cycle only; the timer keeps running. A tick
    /// requested from inside a listener is deferred until the current batch
    /// has reached every listener.
    pub fn tick(&self) {
        let state = self.tick_gate.lock();
        if state.running.get() {
            state.pending.set(true);
            debug!("tick requested during broadcast; deferred");
            return;
        }

        state.running.set(true);
        loop {
            self.run_cycle();
            if !state.pending.replace(false) {
                break;
            }
        }
        state.running.set(false);
    }

    fn run_cycle(&self) {
        let seq = self.tick_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let span = common::logger::tick_span(seq);
        let _entered = span.enter();

        let updates = match self.generate_and_apply(now_ms()) {
            Ok(updates) => updates,
            Err(e) => {
                error!(error = %e, "error generating price updates");
                return;
            }
        };

        if updates.is_empty() {
            debug!("no stations to update");
            return;
        }

        let delivered = self.listeners.notify(&updates);
        debug!(batch = updates.len(), delivered, "price updates broadcast");
    }

    fn generate_and_apply(&self, ts_ms: u64) -> Result<Vec<PriceUpdate>, PriceFeedError> {
        let mut book = self.book.lock();
        let mut rng = self.rng.lock();

        let ids = book.station_ids();
        let selected: Vec<&String> = ids
            .choose_multiple(&mut *rng, self.config.update_batch_size)
            .collect();

        let mut updates = Vec::with_capacity(selected.len());
        for station_id in selected {
            let current = book
                .current_price(station_id)
                .unwrap_or(self.config.fallback_price);
            let change = self.drift.delta_at(ts_ms, &mut *rng)?;
            let new_price = apply_delta(current, change);
            if !new_price.is_finite() {
                return Err(PriceFeedError::Tick(format!(
                    "station {station_id} price {current} moved to {new_price}"
                )));
            }

            updates.push(PriceUpdate {
                station_id: station_id.clone(),
                new_price,
                timestamp_ms: ts_ms,
                change,
            });
        }

        book.set_last_update(ts_ms);
        for update in &updates {
            debug!(
                station_id = %update.station_id,
                new_price = update.new_price,
                change = update.change,
                "station price moved"
            );
            book.apply(update.clone());
        }

        Ok(updates)
    }
}

impl Drop for PriceUpdateEngine {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.get_mut().take() {
            handle.abort();
        }
    }
}

/// Tick every `period`, starting one period from now. Exits when the engine
/// is gone.
async fn run_timer(weak: Weak<PriceUpdateEngine>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let Some(engine) = weak.upgrade() else {
            debug!("price engine dropped; timer exiting");
            break;
        };
        engine.tick();
    }
}
