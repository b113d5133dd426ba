use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// 按缓存键串行化并发未命中
#[derive(Default)]
pub struct SingleFlight {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

pub struct FlightGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    flight: Arc<SingleFlight>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(self: &Arc<Self>, key: &str) -> FlightGuard {
        let lock = self.locks.entry(key.to_string()).or_default().value().clone();
        let guard = lock.lock_owned().await;
        FlightGuard {
            guard: Some(guard),
            key: key.to_string(),
            flight: Arc::clone(self),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.locks.len()
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // 只剩表内引用时说明没有等待者
        self.flight
            .locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
