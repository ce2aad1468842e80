//! Fixed-window request throttling per client address.
//!
//! The limiter is owned by the application state and injected into the
//! request path; nothing here is process-global.
use log::debug;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default cap on tracked clients; reaching it triggers a prune.
const DEFAULT_MAX_CLIENTS: usize = 4096;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    max_clients: usize,
    clients: Mutex<HashMap<IpAddr, Window>>,
}

impl RateLimiter {
    /// Allow `limit` requests per client within each `window`.
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            max_clients: DEFAULT_MAX_CLIENTS,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Cap the number of clients tracked at once.
    #[must_use]
    pub const fn with_max_clients(mut self, max_clients: usize) -> Self {
        self.max_clients = max_clients;
        self
    }

    #[must_use]
    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Record a request from `client` at `now`; returns false once the client
    /// is over its budget for the current window.
    pub fn allow(&self, client: IpAddr, now: Instant) -> bool {
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if clients.len() >= self.max_clients {
            self.prune(&mut clients, now);
        }
        let entry = clients.entry(client).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }
        if entry.count >= self.limit {
            return false;
        }
        entry.count += 1;
        true
    }

    /// Drop expired windows, then the oldest live ones until the map is at
    /// half capacity. Halving keeps the scan amortised across many requests.
    fn prune(&self, clients: &mut HashMap<IpAddr, Window>, now: Instant) {
        let window = self.window;
        clients.retain(|_, w| now.duration_since(w.started) < window);

        let target = self.max_clients / 2;
        if clients.len() <= target {
            return;
        }
        let excess = clients.len() - target;
        let mut starts: Vec<Instant> = clients.values().map(|w| w.started).collect();
        let (_, cutoff, _) = starts.select_nth_unstable(excess - 1);
        let cutoff = *cutoff;
        clients.retain(|_, w| w.started > cutoff);
        debug!("rate limiter evicted live windows; {} clients tracked", clients.len());
    }

    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.clients
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}
