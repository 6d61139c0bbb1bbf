use crate::error::ConfigError;
use crate::store::Store;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Ordered store endpoints. The head is the active one.
pub struct EndpointPool {
    stores: VecDeque<Arc<dyn Store>>,
}

impl EndpointPool {
    pub fn new(stores: Vec<Arc<dyn Store>>) -> Result<Self, ConfigError> {
        if stores.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        Ok(Self {
            stores: stores.into(),
        })
    }

    /// Pings every store once and starts with the fastest reachable one.
    ///
    /// Reachable stores are sorted by round-trip time; unreachable stores go
    /// to the tail in their original order so they can still be rotated to.
    pub async fn ordered_by_latency(stores: Vec<Arc<dyn Store>>) -> Result<Self, ConfigError> {
        if stores.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }

        let mut measured: Vec<(Option<Duration>, Arc<dyn Store>)> = Vec::with_capacity(stores.len());
        for store in stores {
            let started = Instant::now();
            let latency = match store.ping().await {
                Ok(()) => {
                    let elapsed = started.elapsed();
                    log::info!("[LATENCY] {} answered in {:?}", store.addr(), elapsed);
                    Some(elapsed)
                }
                Err(e) => {
                    log::warn!("[LATENCY] {} is unreachable: {}", store.addr(), e);
                    None
                }
            };
            measured.push((latency, store));
        }

        // Stable sort keeps the configured order among unreachable stores.
        measured.sort_by_key(|(latency, _)| latency.unwrap_or(Duration::MAX));
        Self::new(measured.into_iter().map(|(_, store)| store).collect())
    }

    pub fn active(&self) -> &Arc<dyn Store> {
        &self.stores[0]
    }

    /// Moves the active store to the tail; the next one becomes active.
    pub fn rotate(&mut self) {
        if self.stores.len() > 1 {
            self.stores.rotate_left(1);
        }
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    pub fn addrs(&self) -> Vec<String> {
        self.stores.iter().map(|s| s.addr().to_string()).collect()
    }
}
