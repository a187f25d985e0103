//! Named-loop scheduler.
//!
//! Each registered loop is a tick function returning its next delay. The
//! scheduler runs every loop in its own task: tick, clamp the delay, sleep,
//! repeat. Both the tick and the sleep are raced against the shared
//! shutdown signal so an in-flight external call is abandoned promptly.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Floor applied to whatever a tick returns, so a zero or pathological
/// delay cannot spin a loop hot.
const MIN_DELAY: Duration = Duration::from_secs(1);

type TickFuture = Pin<Box<dyn Future<Output = Duration> + Send>>;
type TickFn = Arc<dyn Fn() -> TickFuture + Send + Sync>;

#[derive(Default)]
pub struct Scheduler {
    loops: Vec<(&'static str, TickFn)>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&mut self, name: &'static str, tick: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Duration> + Send + 'static,
    {
        self.loops
            .push((name, Arc::new(move || Box::pin(tick()) as TickFuture)));
    }

    /// Launch every registered loop. The returned handles complete once the
    /// shutdown signal flips.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        self.loops
            .into_iter()
            .map(|(name, tick)| {
                let mut shutdown = shutdown.clone();
                tokio::spawn(async move {
                    info!(name, "Loop started");
                    loop {
                        if *shutdown.borrow() {
                            break;
                        }
                        let delay = tokio::select! {
                            delay = tick() => delay,
                            _ = shutdown.changed() => break,
                        };
                        let delay = delay.max(MIN_DELAY);
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = shutdown.changed() => break,
                        }
                    }
                    debug!(name, "Loop stopped");
                })
            })
            .collect()
    }
}
