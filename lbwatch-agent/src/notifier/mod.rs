//! Audio notifier for origin transitions
//!
//! Within one `notify` call every offline cue plays before any online cue,
//! one at a time. Muted notifiers do nothing.

pub mod player;
pub mod tones;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::health::{Transition, TransitionEvent};

pub use player::{player_from_config, BellPlayer, CommandPlayer};

/// Named audio cue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    Online,
    Offline,
}

impl From<Transition> for Cue {
    fn from(transition: Transition) -> Self {
        match transition {
            Transition::Online => Cue::Online,
            Transition::Offline => Cue::Offline,
        }
    }
}

/// Audio output able to play a named cue
#[async_trait]
pub trait CuePlayer: Send + Sync {
    /// Bring a suspended output back before playback
    async fn resume(&self) -> Result<()>;

    /// Play one cue, resolving when playback has finished
    async fn play(&self, cue: Cue) -> Result<()>;
}

/// Offline cues first, then online cues
pub fn playback_order(events: &[TransitionEvent]) -> Vec<Cue> {
    let offline = events.iter().filter(|e| e.kind == Transition::Offline);
    let online = events.iter().filter(|e| e.kind == Transition::Online);
    offline.chain(online).map(|e| Cue::from(e.kind)).collect()
}

#[derive(Clone)]
pub struct Notifier {
    player: Arc<dyn CuePlayer>,
    muted: bool,
}

impl Notifier {
    pub fn new(player: Arc<dyn CuePlayer>, muted: bool) -> Self {
        Self { player, muted }
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub async fn notify(&self, events: &[TransitionEvent]) {
        if self.muted || events.is_empty() {
            return;
        }

        for event in events {
            info!(
                pool = %event.pool_name,
                origin = %event.origin_label,
                key = %event.origin_key,
                "Origin went {}",
                event.kind
            );
        }

        if let Err(e) = self.player.resume().await {
            warn!("Audio output could not be resumed: {:#}", e);
        }

        for cue in playback_order(events) {
            debug!(?cue, "Playing cue");
            if let Err(e) = self.player.play(cue).await {
                warn!(?cue, "Cue playback failed: {:#}", e);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// Records resume/play calls instead of producing sound
    #[derive(Default)]
    pub struct RecordingPlayer {
        pub played: Mutex<Vec<Cue>>,
        pub resumes: Mutex<usize>,
        pub fail_resume: bool,
        pub fail_cue: Option<Cue>,
    }

    impl RecordingPlayer {
        pub fn played(&self) -> Vec<Cue> {
            self.played.lock().clone()
        }
    }

    #[async_trait]
    impl CuePlayer for RecordingPlayer {
        async fn resume(&self) -> Result<()> {
            *self.resumes.lock() += 1;
            if self.fail_resume {
                anyhow::bail!("resume refused");
            }
            Ok(())
        }

        async fn play(&self, cue: Cue) -> Result<()> {
            self.played.lock().push(cue);
            if self.fail_cue == Some(cue) {
                anyhow::bail!("device busy");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingPlayer;
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    fn event(kind: Transition, key: &str) -> TransitionEvent {
        TransitionEvent {
            kind,
            origin_key: key.to_string(),
            pool_name: "web".to_string(),
            origin_label: key.to_string(),
        }
    }

    #[tokio::test]
    async fn test_offline_cues_play_first() {
        let player = Arc::new(RecordingPlayer::default());
        let notifier = Notifier::new(player.clone(), false);

        let events = vec![
            event(Transition::Offline, "p/a"),
            event(Transition::Online, "p/b"),
            event(Transition::Offline, "p/c"),
        ];
        notifier.notify(&events).await;

        assert_eq!(player.played(), vec![Cue::Offline, Cue::Offline, Cue::Online]);
        assert_eq!(*player.resumes.lock(), 1);
    }

    #[tokio::test]
    async fn test_muted_has_no_side_effect() {
        let player = Arc::new(RecordingPlayer::default());
        let notifier = Notifier::new(player.clone(), true);

        notifier.notify(&[event(Transition::Offline, "p/a")]).await;

        assert!(player.played().is_empty());
        assert_eq!(*player.resumes.lock(), 0);
    }

    #[tokio::test]
    async fn test_failed_resume_still_plays() {
        let player = Arc::new(RecordingPlayer {
            fail_resume: true,
            ..Default::default()
        });
        let notifier = Notifier::new(player.clone(), false);

        notifier.notify(&[event(Transition::Online, "p/a")]).await;

        assert_eq!(player.played(), vec![Cue::Online]);
    }

    #[tokio::test]
    async fn test_failed_cue_does_not_stop_the_rest() {
        let player = Arc::new(RecordingPlayer {
            fail_cue: Some(Cue::Offline),
            ..Default::default()
        });
        let notifier = Notifier::new(player.clone(), false);

        notifier
            .notify(&[
                event(Transition::Online, "p/a"),
                event(Transition::Offline, "p/b"),
            ])
            .await;

        assert_eq!(player.played(), vec![Cue::Offline, Cue::Online]);
    }

    #[tokio::test]
    async fn test_no_events_skips_resume() {
        let player = Arc::new(RecordingPlayer::default());
        Notifier::new(player.clone(), false).notify(&[]).await;
        assert_eq!(*player.resumes.lock(), 0);
    }

    /// Takes real (paused-clock) time per cue and tracks overlap
    #[derive(Default)]
    struct TimedPlayer {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        spans: parking_lot::Mutex<Vec<(Cue, Instant, Instant)>>,
    }

    #[async_trait]
    impl CuePlayer for TimedPlayer {
        async fn resume(&self) -> Result<()> {
            Ok(())
        }

        async fn play(&self, cue: Cue) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let started = Instant::now();
            tokio::time::sleep(tones::cue_duration(cue)).await;
            let ended = Instant::now();

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.spans.lock().push((cue, started, ended));
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cues_play_one_after_another() {
        let player = Arc::new(TimedPlayer::default());
        let notifier = Notifier::new(player.clone(), false);

        notifier
            .notify(&[
                event(Transition::Online, "p/a"),
                event(Transition::Offline, "p/b"),
                event(Transition::Online, "p/c"),
            ])
            .await;

        assert_eq!(player.max_in_flight.load(Ordering::SeqCst), 1);

        let spans = player.spans.lock().clone();
        let cues: Vec<Cue> = spans.iter().map(|(cue, _, _)| *cue).collect();
        assert_eq!(cues, vec![Cue::Offline, Cue::Online, Cue::Online]);

        for pair in spans.windows(2) {
            let (_, _, previous_end) = pair[0];
            let (cue, next_start, next_end) = pair[1];
            assert!(next_start >= previous_end);
            assert!(next_end - next_start >= tones::cue_duration(cue));
        }
    }
}
