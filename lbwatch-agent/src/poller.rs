//! Poll loop: fetch → diff → notify → publish, on a fixed period
//!
//! Each activation spawns one task owning a `PollSession` (credentials,
//! previous snapshot, first-load flag). Cycles run sequentially inside that
//! task and ticks missed while a cycle is still running are skipped, so two
//! fetches never overlap. Teardown fires the activation's cancel signal,
//! which drops any in-flight request and anything it would have committed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::api::{Pool, PoolSource};
use crate::cancel::{CancelSignal, CancelSource};
use crate::credentials::Credentials;
use crate::health::{diff, HealthSnapshot};
use crate::notifier::{CuePlayer, Notifier};

/// Idle → Loading → Success | Failed → Loading (next tick) …, Stopped on teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Loading,
    Success,
    Failed,
    Stopped,
}

/// Render state published after every phase change
#[derive(Debug, Clone)]
pub struct PollStatus {
    pub phase: CyclePhase,
    /// Last committed pool list; dropped when a cycle fails
    pub pools: Option<Arc<Vec<Pool>>>,
    pub error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
    /// Cycles that ended in Success or Failed
    pub cycles_completed: u64,
    pub muted: bool,
}

impl Default for PollStatus {
    fn default() -> Self {
        Self {
            phase: CyclePhase::Idle,
            pools: None,
            error: None,
            last_success: None,
            cycles_completed: 0,
            muted: false,
        }
    }
}

pub struct PollLoop {
    source: Arc<dyn PoolSource>,
    player: Arc<dyn CuePlayer>,
    period: Duration,
    status: Arc<watch::Sender<PollStatus>>,
}

impl PollLoop {
    pub fn new(source: Arc<dyn PoolSource>, player: Arc<dyn CuePlayer>, period: Duration) -> Self {
        let (tx, _rx) = watch::channel(PollStatus::default());
        Self {
            source,
            player,
            period,
            status: Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PollStatus> {
        self.status.subscribe()
    }

    /// Start polling. The first cycle runs immediately.
    pub fn activate(&self, credentials: Credentials, muted: bool) -> PollHandle {
        let cancel = CancelSource::new();

        self.status.send_replace(PollStatus {
            muted,
            ..PollStatus::default()
        });

        let session = PollSession {
            credentials,
            source: self.source.clone(),
            notifier: Notifier::new(self.player.clone(), muted),
            status: self.status.clone(),
            cancel: cancel.signal(),
            snapshot: HealthSnapshot::default(),
            first_load: true,
        };

        let task = tokio::spawn(session.run(self.period));

        PollHandle {
            cancel,
            task,
            status: self.status.clone(),
        }
    }
}

/// Running activation; dropping it cancels the loop without waiting
pub struct PollHandle {
    cancel: CancelSource,
    task: JoinHandle<()>,
    status: Arc<watch::Sender<PollStatus>>,
}

impl PollHandle {
    /// Cancel the in-flight cycle, stop the timer and wait for the task to end
    pub async fn deactivate(self) {
        let PollHandle {
            cancel,
            task,
            status,
        } = self;

        cancel.cancel();
        if let Err(e) = task.await {
            if e.is_panic() {
                error!("Poll loop task panicked: {}", e);
            }
        }
        status.send_modify(|s| s.phase = CyclePhase::Stopped);
        debug!("Poll loop deactivated");
    }
}

/// State owned by one activation
struct PollSession {
    credentials: Credentials,
    source: Arc<dyn PoolSource>,
    notifier: Notifier,
    status: Arc<watch::Sender<PollStatus>>,
    cancel: CancelSignal,
    snapshot: HealthSnapshot,
    first_load: bool,
}

impl PollSession {
    async fn run(mut self, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            account = %self.credentials.account_id(),
            period_secs = period.as_secs(),
            muted = self.notifier.is_muted(),
            "Poll loop started"
        );

        let cancel = self.cancel.clone();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let started = Instant::now();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.run_cycle() => {}
            }

            let elapsed = started.elapsed();
            if elapsed > period {
                warn!(?elapsed, "Poll cycle overran the interval, missed ticks skipped");
            }
        }

        debug!("Poll loop stopped");
    }

    async fn run_cycle(&mut self) {
        self.status.send_modify(|s| s.phase = CyclePhase::Loading);

        match self
            .source
            .fetch_all_pools(&self.credentials, &self.cancel)
            .await
        {
            Ok(pools) => {
                if self.cancel.is_cancelled() {
                    return;
                }

                let (events, next) = diff(&self.snapshot, &pools, self.first_load);
                self.snapshot = next;
                self.first_load = false;

                self.notifier.notify(&events).await;
                if self.cancel.is_cancelled() {
                    return;
                }

                debug!(
                    pools = pools.len(),
                    origins = self.snapshot.len(),
                    transitions = events.len(),
                    "Poll cycle committed"
                );

                let pools = Arc::new(pools);
                self.status.send_modify(|s| {
                    s.phase = CyclePhase::Success;
                    s.pools = Some(pools);
                    s.error = None;
                    s.last_success = Some(Utc::now());
                    s.cycles_completed += 1;
                });
            }
            Err(e) if e.is_cancelled() => {
                debug!("Pool fetch cancelled");
            }
            Err(e) => {
                warn!("Poll cycle failed: {}", e);
                let message = e.to_string();
                self.status.send_modify(|s| {
                    s.phase = CyclePhase::Failed;
                    s.pools = None;
                    s.error = Some(message);
                    s.cycles_completed += 1;
                });
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::api::FetchError;
    use crate::notifier::testing::RecordingPlayer;
    use crate::notifier::Cue;
    use async_trait::async_trait;
    use std::sync::atomic::Ordering;
    use tokio::sync::Notify;

    const PERIOD: Duration = Duration::from_secs(10);

    #[tokio::test(start_paused = true)]
    async fn test_first_cycle_is_silent_then_transitions_play() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(pool_with("a", Some(true))),
            Ok(pool_with("a", Some(false))),
        ]));
        let player = Arc::new(RecordingPlayer::default());
        let poller = PollLoop::new(source.clone(), player.clone(), PERIOD);
        let mut rx = poller.subscribe();

        let handle = poller.activate(creds(), false);

        rx.wait_for(|s| s.cycles_completed >= 1).await.unwrap();
        assert!(player.played().is_empty());
        assert_eq!(rx.borrow().phase, CyclePhase::Success);

        rx.wait_for(|s| s.cycles_completed >= 2).await.unwrap();
        assert_eq!(player.played(), vec![Cue::Offline]);
        assert_eq!(source.calls(), 2);

        handle.deactivate().await;
        assert_eq!(rx.borrow().phase, CyclePhase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_cycle_runs_immediately() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(pool_with("a", Some(true)))]));
        let player = Arc::new(RecordingPlayer::default());
        let poller = PollLoop::new(source.clone(), player, PERIOD);
        let mut rx = poller.subscribe();

        let started = Instant::now();
        let handle = poller.activate(creds(), false);
        rx.wait_for(|s| s.cycles_completed >= 1).await.unwrap();

        assert!(started.elapsed() < PERIOD);
        handle.deactivate().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_muted_loop_plays_nothing() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(pool_with("a", Some(true))),
            Ok(pool_with("a", Some(false))),
        ]));
        let player = Arc::new(RecordingPlayer::default());
        let poller = PollLoop::new(source, player.clone(), PERIOD);
        let mut rx = poller.subscribe();

        let handle = poller.activate(creds(), true);
        rx.wait_for(|s| s.cycles_completed >= 2).await.unwrap();

        assert!(player.played().is_empty());
        assert!(rx.borrow().muted);
        handle.deactivate().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_surfaces_error_and_next_tick_retries() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(pool_with("a", Some(true))),
            Err(FetchError::Transport {
                status: 500,
                body: "boom".into(),
            }),
            Ok(pool_with("a", Some(true))),
        ]));
        let player = Arc::new(RecordingPlayer::default());
        let poller = PollLoop::new(source, player, PERIOD);
        let mut rx = poller.subscribe();

        let handle = poller.activate(creds(), false);

        rx.wait_for(|s| s.cycles_completed >= 2).await.unwrap();
        {
            let status = rx.borrow();
            assert_eq!(status.phase, CyclePhase::Failed);
            assert!(status.pools.is_none());
            assert_eq!(status.error.as_deref(), Some("HTTP 500: boom"));
        }

        rx.wait_for(|s| s.cycles_completed >= 3).await.unwrap();
        {
            let status = rx.borrow();
            assert_eq!(status.phase, CyclePhase::Success);
            assert!(status.pools.is_some());
            assert!(status.error.is_none());
        }

        handle.deactivate().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_fetch_is_swallowed() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(FetchError::Cancelled),
            Ok(pool_with("a", Some(true))),
        ]));
        let player = Arc::new(RecordingPlayer::default());
        let poller = PollLoop::new(source.clone(), player, PERIOD);
        let mut rx = poller.subscribe();

        let handle = poller.activate(creds(), false);
        rx.wait_for(|s| s.cycles_completed >= 1).await.unwrap();

        assert_eq!(source.calls(), 2);
        assert!(rx.borrow().error.is_none());
        handle.deactivate().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_cycles_never_overlap() {
        let source = Arc::new(
            ScriptedSource::new(vec![Ok(pool_with("a", Some(true)))])
                .with_delay(Duration::from_secs(25)),
        );
        let player = Arc::new(RecordingPlayer::default());
        let poller = PollLoop::new(source.clone(), player, PERIOD);
        let mut rx = poller.subscribe();

        let handle = poller.activate(creds(), false);
        rx.wait_for(|s| s.cycles_completed >= 3).await.unwrap();

        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(source.calls(), 3);
        handle.deactivate().await;
    }

    /// Blocks every fetch until released, then returns pools with an offline origin
    struct GatedSource {
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl PoolSource for GatedSource {
        async fn fetch_all_pools(
            &self,
            _credentials: &Credentials,
            _cancel: &CancelSignal,
        ) -> Result<Vec<Pool>, FetchError> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(pool_with("a", Some(false)))
        }
    }

    #[tokio::test]
    async fn test_teardown_before_fetch_resolves_commits_nothing() {
        let source = Arc::new(GatedSource {
            started: Notify::new(),
            release: Notify::new(),
        });
        let player = Arc::new(RecordingPlayer::default());
        let poller = PollLoop::new(source.clone(), player.clone(), PERIOD);
        let rx = poller.subscribe();

        let handle = poller.activate(creds(), false);
        source.started.notified().await;

        handle.deactivate().await;
        source.release.notify_one();
        tokio::task::yield_now().await;

        let status = rx.borrow();
        assert_eq!(status.phase, CyclePhase::Stopped);
        assert!(status.pools.is_none());
        assert_eq!(status.cycles_completed, 0);
        assert!(player.played().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reactivation_starts_clean() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(pool_with("a", Some(true))),
            Ok(pool_with("a", Some(false))),
        ]));
        let player = Arc::new(RecordingPlayer::default());
        let poller = PollLoop::new(source.clone(), player.clone(), PERIOD);
        let mut rx = poller.subscribe();

        let handle = poller.activate(creds(), false);
        rx.wait_for(|s| s.cycles_completed >= 1).await.unwrap();
        handle.deactivate().await;

        // The flip to offline lands on the first cycle of a new activation
        let handle = poller.activate(creds(), false);
        rx.wait_for(|s| s.cycles_completed >= 1).await.unwrap();

        assert!(player.played().is_empty());
        assert_eq!(source.calls(), 2);
        handle.deactivate().await;
    }
}
