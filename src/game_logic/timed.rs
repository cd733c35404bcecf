//! Per-question answer deadline for the console game.
//!
//! A countdown task and the answer wait share one `CancellationToken`. The
//! countdown cancels it when the deadline passes; the answer side cancels it
//! through [`Countdown::stop`] once an answer is in. Input arrives over a
//! channel, so a line read after the race was lost is never applied.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const TICK_BUFFER: usize = 4;

#[derive(Debug, PartialEq, Eq)]
pub enum WaitEvent<T> {
    /// A line from the input channel, `None` once the channel is closed.
    Input(Option<T>),
    /// Time left on the clock, sent once per tick.
    Tick(Duration),
    Expired,
}

pub struct Countdown {
    token: CancellationToken,
    deadline: Instant,
    ticks: mpsc::Receiver<Duration>,
    handle: JoinHandle<()>,
}

impl Countdown {
    pub fn start(limit: Duration, tick_every: Duration) -> Self {
        let token = CancellationToken::new();
        let deadline = Instant::now() + limit;
        let (tick_tx, ticks) = mpsc::channel(TICK_BUFFER);
        let handle = tokio::spawn(run_countdown(deadline, tick_every, tick_tx, token.clone()));
        Self {
            token,
            deadline,
            ticks,
            handle,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Waits for the next input line, tick or the deadline, whichever is first.
    /// Expiry wins ties.
    pub async fn next_event<T>(&mut self, input: &mut mpsc::Receiver<T>) -> WaitEvent<T> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => WaitEvent::Expired,
            line = input.recv() => WaitEvent::Input(line),
            Some(remaining) = self.ticks.recv() => WaitEvent::Tick(remaining),
        }
    }

    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Countdown task ended abnormally");
        }
    }
}

async fn run_countdown(
    deadline: Instant,
    tick_every: Duration,
    ticks: mpsc::Sender<Duration>,
    token: CancellationToken,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + tick_every, tick_every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = tokio::time::sleep_until(deadline) => {
                tracing::debug!("Answer deadline reached");
                token.cancel();
                return;
            }
            _ = interval.tick() => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                // A slow reader just misses a tick.
                let _ = ticks.try_send(remaining);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_countdown_expires_without_input() {
        let (_tx, mut rx) = mpsc::channel::<String>(1);
        let mut countdown = Countdown::start(Duration::from_millis(80), Duration::from_millis(20));

        let mut ticks = 0;
        loop {
            match countdown.next_event(&mut rx).await {
                WaitEvent::Tick(remaining) => {
                    assert!(remaining <= Duration::from_millis(80));
                    ticks += 1;
                }
                WaitEvent::Expired => break,
                WaitEvent::Input(line) => panic!("unexpected input {:?}", line),
            }
        }

        assert!(ticks >= 1);
        assert!(countdown.is_expired());
        assert_eq!(countdown.remaining(), Duration::ZERO);
        countdown.stop().await;
    }

    #[tokio::test]
    async fn test_input_before_deadline_wins() {
        let (tx, mut rx) = mpsc::channel(1);
        tx.send("2".to_string()).await.unwrap();
        let mut countdown = Countdown::start(Duration::from_secs(5), Duration::from_secs(1));

        assert_eq!(
            countdown.next_event(&mut rx).await,
            WaitEvent::Input(Some("2".to_string()))
        );
        assert!(!countdown.is_expired());
        assert!(countdown.remaining() > Duration::from_secs(4));
        countdown.stop().await;
    }

    #[tokio::test]
    async fn test_closed_input_is_reported() {
        let (tx, mut rx) = mpsc::channel::<String>(1);
        drop(tx);
        let mut countdown = Countdown::start(Duration::from_secs(5), Duration::from_secs(1));
        assert_eq!(countdown.next_event(&mut rx).await, WaitEvent::Input(None));
        countdown.stop().await;
    }
}
