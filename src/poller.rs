use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::client::PunchTransport;
use crate::controller::{CycleRequest, FetchController};
use crate::error::RocError;
use crate::log::LogSink;

const STOP_CHECK: Duration = Duration::from_millis(100);

type Completion = (CycleRequest, Result<Vec<u8>, RocError>);

/// Fixed-interval driver for a [`FetchController`].
///
/// The controller lives on the calling thread. Fetches run on worker threads
/// and hand their result back over a channel, so the punch store is only
/// touched from here.
#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
    max_cycles: Option<u64>,
}

impl Poller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_cycles: None,
        }
    }

    pub fn with_max_cycles(mut self, max_cycles: Option<u64>) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Polls until `stop` is raised or `max_cycles` fetches have completed.
    /// Returns the number of completed cycles.
    pub fn run<L, T>(
        &self,
        controller: &mut FetchController<L>,
        transport: Arc<T>,
        stop: &AtomicBool,
    ) -> u64
    where
        L: LogSink,
        T: PunchTransport + 'static,
    {
        let (tx, rx) = mpsc::channel::<Completion>();
        let mut started = 0u64;
        let mut completed = 0u64;
        let mut in_flight = 0usize;
        let mut next_tick = Instant::now();

        loop {
            let exhausted = self.max_cycles.is_some_and(|max| started >= max);
            let stopping = stop.load(Ordering::SeqCst) || exhausted;
            if stopping && in_flight == 0 {
                break;
            }

            let now = Instant::now();
            if !stopping && now >= next_tick {
                if let Some(request) = controller.begin_cycle() {
                    let tx = tx.clone();
                    let transport = Arc::clone(&transport);
                    started += 1;
                    in_flight += 1;
                    thread::spawn(move || {
                        let result = panic::catch_unwind(AssertUnwindSafe(|| {
                            transport.fetch(request.url())
                        }))
                        .unwrap_or_else(|_| {
                            Err(RocError::Http("transport worker panicked".to_string()))
                        });
                        let _ = tx.send((request, result));
                    });
                }
                next_tick = now + self.interval;
            }

            match rx.recv_timeout(wait_for(stopping, next_tick, Instant::now())) {
                Ok((request, result)) => {
                    in_flight -= 1;
                    let summary = controller.complete_cycle(request, result);
                    completed += 1;
                    tracing::debug!(
                        cycle = completed,
                        new = summary.accepted,
                        stored = summary.store_size,
                        cursor = summary.cursor,
                        "cycle complete"
                    );
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        completed
    }
}

/// While draining, the tick deadline no longer moves and may lie in the past.
fn wait_for(stopping: bool, next_tick: Instant, now: Instant) -> Duration {
    if stopping {
        return STOP_CHECK;
    }
    next_tick.saturating_duration_since(now).min(STOP_CHECK)
}
