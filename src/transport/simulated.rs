//! Simulated Transport for Testing
//!
//! In-memory [`Transport`] that records every delivered buffer and can fail
//! on demand, either scripted (`fail_next_sends`, `set_reconnect_failure`)
//! or randomly from a seeded RNG and a [`FaultConfig`]. Same seed, same
//! fault sequence.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures::FutureExt;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::watch;

use super::{Transport, TransportFuture, WireLine};
use crate::buggify::{faults, FaultConfig};
use crate::error::TransportError;

struct SimState {
    rng: ChaCha8Rng,
    faults: FaultConfig,
    connected: bool,
    failing_sends: u32,
    fail_reconnects: bool,
    delivered: Vec<Bytes>,
    triggered: HashMap<&'static str, u64>,
}

impl SimState {
    fn roll(&mut self, fault_id: &'static str) -> bool {
        let draw: f64 = self.rng.gen();
        let hit = self.faults.should_trigger(fault_id, draw);
        if hit {
            *self.triggered.entry(fault_id).or_insert(0) += 1;
        }
        hit
    }
}

pub struct SimulatedTransport {
    state: Mutex<SimState>,
    send_calls: AtomicU64,
    reconnect_calls: AtomicU64,
    paused: watch::Sender<bool>,
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedTransport {
    /// Connected transport that never fails on its own
    pub fn new() -> Self {
        Self::with_faults(0, FaultConfig::disabled())
    }

    /// Connected transport injecting random faults drawn from `seed`
    pub fn with_faults(seed: u64, faults: FaultConfig) -> Self {
        let (paused, _) = watch::channel(false);
        SimulatedTransport {
            state: Mutex::new(SimState {
                rng: ChaCha8Rng::seed_from_u64(seed),
                faults,
                connected: true,
                failing_sends: 0,
                fail_reconnects: false,
                delivered: Vec::new(),
                triggered: HashMap::new(),
            }),
            send_calls: AtomicU64::new(0),
            reconnect_calls: AtomicU64::new(0),
            paused,
        }
    }

    pub fn set_faults(&self, faults: FaultConfig) {
        self.state.lock().faults = faults;
    }

    /// Make the next `count` sends fail with a broken pipe
    pub fn fail_next_sends(&self, count: u32) {
        self.state.lock().failing_sends = count;
    }

    /// Make every reconnect fail until reset
    pub fn set_reconnect_failure(&self, fail: bool) {
        self.state.lock().fail_reconnects = fail;
    }

    /// Hold sends after they are counted until [`resume_sends`](Self::resume_sends)
    pub fn pause_sends(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume_sends(&self) {
        self.paused.send_replace(false);
    }

    /// Drop the simulated connection; sends fail until a reconnect succeeds
    pub fn disconnect(&self) {
        self.state.lock().connected = false;
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Number of `send` calls, successful or not
    pub fn send_calls(&self) -> u64 {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn reconnect_calls(&self) -> u64 {
        self.reconnect_calls.load(Ordering::SeqCst)
    }

    /// Every buffer accepted so far, in delivery order
    pub fn delivered(&self) -> Vec<Bytes> {
        self.state.lock().delivered.clone()
    }

    /// Every accepted line, parsed
    pub fn delivered_lines(&self) -> Vec<WireLine> {
        self.state
            .lock()
            .delivered
            .iter()
            .flat_map(|buf| WireLine::parse_batch(buf))
            .collect()
    }

    pub fn clear_delivered(&self) {
        self.state.lock().delivered.clear();
    }

    /// How many times a random fault fired
    pub fn fault_count(&self, fault_id: &str) -> u64 {
        self.state.lock().triggered.get(fault_id).copied().unwrap_or(0)
    }

    async fn wait_until_resumed(&self) {
        let mut paused = self.paused.subscribe();
        loop {
            let is_paused = *paused.borrow_and_update();
            if !is_paused {
                return;
            }
            if paused.changed().await.is_err() {
                return;
            }
        }
    }

    fn deliver(&self, buf: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.state.lock();
        if state.failing_sends > 0 {
            state.failing_sends -= 1;
            return Err(simulated_error(io::ErrorKind::BrokenPipe, "scripted send failure"));
        }
        if !state.connected {
            return Err(simulated_error(io::ErrorKind::NotConnected, "connection is down"));
        }
        if state.roll(faults::transport::SEND_FAIL) {
            return Err(simulated_error(io::ErrorKind::BrokenPipe, "send failed"));
        }
        if state.roll(faults::transport::CONNECTION_RESET) {
            state.connected = false;
            return Err(simulated_error(io::ErrorKind::ConnectionReset, "connection reset"));
        }
        state.delivered.push(Bytes::copy_from_slice(buf));
        Ok(buf.len())
    }

    fn try_reconnect(&self) -> Result<(), TransportError> {
        self.reconnect_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if state.fail_reconnects || state.roll(faults::transport::RECONNECT_FAIL) {
            state.connected = false;
            return Err(TransportError::Connect {
                addr: "simulated".to_string(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "reconnect refused"),
            });
        }
        state.connected = true;
        Ok(())
    }
}

fn simulated_error(kind: io::ErrorKind, msg: &'static str) -> TransportError {
    TransportError::Io(io::Error::new(kind, msg))
}

impl Transport for SimulatedTransport {
    fn send<'a>(&'a self, buf: &'a [u8]) -> TransportFuture<'a, usize> {
        async move {
            self.send_calls.fetch_add(1, Ordering::SeqCst);
            self.wait_until_resumed().await;
            self.deliver(buf)
        }
        .boxed()
    }

    fn reconnect(&self) -> TransportFuture<'_, ()> {
        futures::future::ready(self.try_reconnect()).boxed()
    }
}
