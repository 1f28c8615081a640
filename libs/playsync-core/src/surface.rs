use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::time::Instant;

use crate::MediaSource;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("playback was rejected by the autoplay policy")]
    AutoplayRejected,
    #[error("media is not loaded")]
    NotLoaded,
    #[error("failed to load {0}")]
    Load(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Ready,
    /// Completion is reported later as a load succeeded command.
    Pending,
}

/// Local playback element driven by the engine. Deferred load completion and
/// the end of media are reported back to the engine as commands.
pub trait PlaybackSurface: Send {
    fn load(&mut self, source: &MediaSource) -> Result<LoadStatus, PlaybackError>;
    fn play(&mut self) -> Result<(), PlaybackError>;
    fn pause(&mut self);
    fn current_time(&self) -> f64;
    fn seek(&mut self, seconds: f64);
    /// `None` until the media is loaded.
    fn duration(&self) -> Option<f64>;
    fn set_muted(&mut self, muted: bool);
    fn set_looping(&mut self, looping: bool);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AutoplayPolicy {
    #[default]
    Allow,
    /// Unmuted playback is rejected, muted playback starts.
    RequireMuted,
    /// Every attempt is rejected until the user interacts with the page.
    RequireInteraction,
}

#[derive(Debug)]
struct SimulatedState {
    source: Option<MediaSource>,
    media_duration: f64,
    loaded: bool,
    deferred_load: bool,
    fail_load: bool,
    playing: bool,
    muted: bool,
    looping: bool,
    interacted: bool,
    policy: AutoplayPolicy,
    rate: f64,
    base: f64,
    anchor: Instant,
    play_attempts: usize,
    seeks: Vec<f64>,
}

impl SimulatedState {
    fn position(&self) -> f64 {
        if !self.loaded {
            return 0.0;
        }
        let elapsed = if self.playing {
            Instant::now().saturating_duration_since(self.anchor).as_secs_f64() * self.rate
        } else {
            0.0
        };
        let position = self.base + elapsed;
        if self.looping && self.media_duration > 0.0 {
            position % self.media_duration
        } else {
            position.min(self.media_duration)
        }
    }

    fn rebase(&mut self) {
        self.base = self.position();
        self.anchor = Instant::now();
    }
}

/// In-memory surface whose clock runs at a configurable rate, used to model
/// drifting participants. Clones share the same element.
#[derive(Debug, Clone)]
pub struct SimulatedSurface {
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedSurface {
    pub fn new(media_duration: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimulatedState {
                source: None,
                media_duration,
                loaded: false,
                deferred_load: false,
                fail_load: false,
                playing: false,
                muted: false,
                looping: false,
                interacted: false,
                policy: AutoplayPolicy::Allow,
                rate: 1.0,
                base: 0.0,
                anchor: Instant::now(),
                play_attempts: 0,
                seeks: Vec::new(),
            })),
        }
    }

    pub fn with_rate(self, rate: f64) -> Self {
        self.lock().rate = rate;
        self
    }

    pub fn with_autoplay(self, policy: AutoplayPolicy) -> Self {
        self.lock().policy = policy;
        self
    }

    pub fn with_load_failure(self) -> Self {
        self.lock().fail_load = true;
        self
    }

    /// Loads stay pending until [`SimulatedSurface::complete_load`].
    pub fn with_deferred_load(self) -> Self {
        self.lock().deferred_load = true;
        self
    }

    pub fn complete_load(&self) {
        let mut state = self.lock();
        if state.source.is_some() && !state.loaded {
            state.loaded = true;
            state.base = 0.0;
            state.anchor = Instant::now();
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimulatedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the playhead without recording a correction.
    pub fn set_position(&self, seconds: f64) {
        let mut state = self.lock();
        state.base = seconds;
        state.anchor = Instant::now();
    }

    pub fn set_rate(&self, rate: f64) {
        let mut state = self.lock();
        state.rebase();
        state.rate = rate;
    }

    /// Marks a user gesture, lifting the interaction requirement.
    pub fn interact(&self) {
        self.lock().interacted = true;
    }

    pub fn source(&self) -> Option<MediaSource> {
        self.lock().source.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.lock().playing
    }

    pub fn is_muted(&self) -> bool {
        self.lock().muted
    }

    pub fn is_looping(&self) -> bool {
        self.lock().looping
    }

    pub fn has_ended(&self) -> bool {
        let state = self.lock();
        state.loaded && !state.looping && state.position() >= state.media_duration
    }

    pub fn play_attempts(&self) -> usize {
        self.lock().play_attempts
    }

    /// Positions the engine seeked to, in order.
    pub fn seeks(&self) -> Vec<f64> {
        self.lock().seeks.clone()
    }
}

impl PlaybackSurface for SimulatedSurface {
    fn load(&mut self, source: &MediaSource) -> Result<LoadStatus, PlaybackError> {
        let mut state = self.lock();
        state.source = Some(source.clone());
        state.loaded = false;
        if state.fail_load {
            return Err(PlaybackError::Load(source.url().to_owned()));
        }
        if state.deferred_load {
            return Ok(LoadStatus::Pending);
        }
        state.loaded = true;
        state.base = 0.0;
        state.anchor = Instant::now();
        Ok(LoadStatus::Ready)
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        let mut state = self.lock();
        state.play_attempts += 1;
        if !state.loaded {
            return Err(PlaybackError::NotLoaded);
        }
        let allowed = match state.policy {
            AutoplayPolicy::Allow => true,
            AutoplayPolicy::RequireMuted => state.muted || state.interacted,
            AutoplayPolicy::RequireInteraction => state.interacted,
        };
        if !allowed {
            return Err(PlaybackError::AutoplayRejected);
        }
        if !state.playing {
            state.rebase();
            state.playing = true;
        }
        Ok(())
    }

    fn pause(&mut self) {
        let mut state = self.lock();
        if state.playing {
            state.rebase();
            state.playing = false;
        }
    }

    fn current_time(&self) -> f64 {
        self.lock().position()
    }

    fn seek(&mut self, seconds: f64) {
        let mut state = self.lock();
        state.seeks.push(seconds);
        state.base = seconds;
        state.anchor = Instant::now();
    }

    fn duration(&self) -> Option<f64> {
        let state = self.lock();
        state.loaded.then_some(state.media_duration)
    }

    fn set_muted(&mut self, muted: bool) {
        self.lock().muted = muted;
    }

    fn set_looping(&mut self, looping: bool) {
        let mut state = self.lock();
        state.rebase();
        state.looping = looping;
    }
}
