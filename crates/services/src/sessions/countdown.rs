use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// One elapsed period. `sequence` starts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub sequence: u64,
}

/// Periodic tick source for a running quiz.
///
/// The countdown never touches the session; it only delivers `Tick`s to the owner,
/// which forwards them to `QuizSessionController::tick`.
pub struct Countdown;

impl Countdown {
    /// Spawn a ticker on the current tokio runtime.
    ///
    /// The first tick arrives one `period` after the call. Late ticks are delayed,
    /// never delivered in a burst.
    #[must_use]
    pub fn start(period: Duration) -> CountdownHandle {
        let (tx, rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            let mut sequence = 0_u64;
            loop {
                interval.tick().await;
                sequence += 1;
                if tx.send(Tick { sequence }).await.is_err() {
                    break;
                }
            }
        });
        CountdownHandle {
            ticks: rx,
            task,
            cancelled: false,
        }
    }

    /// One tick per second.
    #[must_use]
    pub fn every_second() -> CountdownHandle {
        Self::start(Duration::from_secs(1))
    }
}

/// Receives ticks and cancels the ticker. Dropping the handle cancels too.
#[derive(Debug)]
pub struct CountdownHandle {
    ticks: mpsc::Receiver<Tick>,
    task: JoinHandle<()>,
    cancelled: bool,
}

impl CountdownHandle {
    /// Wait for the next tick. Returns `None` once cancelled.
    pub async fn next_tick(&mut self) -> Option<Tick> {
        if self.cancelled {
            return None;
        }
        self.ticks.recv().await
    }

    /// Stop the ticker. Ticks already queued are discarded.
    pub fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        self.task.abort();
        self.ticks.close();
        while self.ticks.try_recv().is_ok() {}
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
