use std::time::Duration;

use tokio::time::Instant;

use crate::{
    debug, info, trace, warn, Actor, AuthorityResolver, ControlEvent, ControlEventRouter, Correction, DriftReconciler,
    Effect, EngineEvent, Envelope, EventBus, LoadStatus, MediaCategory, MediaSession, MediaSource, Phase,
    PlaybackError, PlaybackSurface, Role, RoomMessage, SourceMeta, SyncBroadcaster, SyncConfig, SyncError,
    SyncResult,
};

/// Configuration of one media item as provided by the host application.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub media_id: String,
    pub category: MediaCategory,
    pub role: Role,
    pub src: Option<String>,
    pub looping: bool,
    pub meta: Option<SourceMeta>,
}

impl SourceConfig {
    pub fn new<S: AsRef<str>>(media_id: S, category: MediaCategory, role: Role) -> Self {
        Self {
            media_id: media_id.as_ref().to_owned(),
            category,
            role,
            src: None,
            looping: false,
            meta: None,
        }
    }

    pub fn with_src<S: AsRef<str>>(mut self, src: S) -> Self {
        self.src = Some(src.as_ref().to_owned());
        self
    }

    pub fn with_loop(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_meta(mut self, meta: SourceMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

/// Runs one media session on one participant: routes control events, carries
/// out their effects on the surface and queues outbound room messages.
///
/// The driver is synchronous. Outbound messages accumulate until
/// [`SessionDriver::take_outbox`] and the timer is owned by the caller, which
/// calls [`SessionDriver::on_tick`] while [`SessionDriver::is_ticking`] holds.
#[derive(Debug)]
pub struct SessionDriver<S> {
    participant_id: String,
    config: SourceConfig,
    resolver: AuthorityResolver,
    session: MediaSession,
    surface: S,
    source: Option<MediaSource>,
    router: ControlEventRouter,
    reconciler: DriftReconciler,
    broadcaster: SyncBroadcaster,
    events: EventBus,
    outbox: Vec<RoomMessage>,
    broadcasting: bool,
    awaiting_interaction: bool,
    disposed: bool,
}

impl<S: PlaybackSurface> SessionDriver<S> {
    pub fn new<I: AsRef<str>>(
        participant_id: I,
        config: SourceConfig,
        settings: &SyncConfig,
        resolver: AuthorityResolver,
        surface: S,
        events: EventBus,
    ) -> Self {
        let session = MediaSession::new(&config.media_id, config.category, settings.drift_tolerance);
        let broadcaster = SyncBroadcaster::new(&config.media_id, config.category, settings.broadcast_interval);
        Self {
            participant_id: participant_id.as_ref().to_owned(),
            config,
            resolver,
            session,
            surface,
            source: None,
            router: ControlEventRouter,
            reconciler: DriftReconciler::new(settings.drift_tolerance),
            broadcaster,
            events,
            outbox: Vec::new(),
            broadcasting: false,
            awaiting_interaction: false,
            disposed: false,
        }
    }

    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    pub fn media_id(&self) -> &str {
        self.session.media_id()
    }

    pub fn session(&self) -> &MediaSession {
        &self.session
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn is_authority(&self) -> bool {
        self.resolver.is_authority(self.config.role)
    }

    pub fn is_broadcasting(&self) -> bool {
        self.broadcasting
    }

    /// Playing media emits local time updates, the authority also broadcasts.
    pub fn is_ticking(&self) -> bool {
        !self.disposed && (self.broadcasting || self.session.phase() == Phase::Playing)
    }

    pub fn is_awaiting_interaction(&self) -> bool {
        self.awaiting_interaction
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn broadcast_interval(&self) -> Duration {
        self.broadcaster.interval()
    }

    /// Applies the initial configuration: loop flag, source and ownership claim.
    pub fn start(&mut self) {
        let config = self.config.clone();
        self.apply_source(&config, true);
    }

    /// Reconfigures a running session. The ownership claim is only reconciled
    /// when it changed.
    pub fn apply_update(&mut self, config: SourceConfig) -> SyncResult<()> {
        if self.disposed {
            return Err(SyncError::SessionEnded(self.session.media_id().to_owned()));
        }
        if config.media_id != self.config.media_id {
            return Err(SyncError::MediaMismatch {
                expected: self.config.media_id.clone(),
                actual: config.media_id,
            });
        }
        if config.category != self.config.category {
            warn!(
                "{} cannot change category from {} to {}",
                config.media_id, self.config.category, config.category
            );
        }

        let was_authority = self.is_authority();
        let meta_changed = config.meta != self.config.meta;
        self.config.role = config.role;
        self.apply_source(&config, meta_changed);
        self.config = SourceConfig {
            category: self.session.category(),
            ..config
        };

        if was_authority != self.is_authority() {
            info!(
                "{} is {} the authority of {}",
                self.participant_id,
                if was_authority { "no longer" } else { "now" },
                self.session.media_id()
            );
            self.broadcasting = !was_authority && self.session.phase() == Phase::Playing;
        }
        Ok(())
    }

    fn apply_source(&mut self, config: &SourceConfig, apply_meta: bool) {
        self.session.set_looping(config.looping);
        self.surface.set_looping(config.looping);

        match config.src.as_deref().and_then(MediaSource::resolve) {
            Some(source) if self.session.phase() == Phase::Idle || self.source.as_ref() != Some(&source) => {
                if self.session.phase() != Phase::Idle {
                    info!("{} switches source to {}", self.session.media_id(), source.url());
                }
                self.route_logged(ControlEvent::SourceResolved(source))
            }
            Some(_) => {}
            None => debug!("{} has no source yet", self.session.media_id()),
        }

        if apply_meta {
            if let Some(meta) = &config.meta {
                self.apply_meta(meta);
            }
        }
    }

    fn apply_meta(&mut self, meta: &SourceMeta) {
        if meta.owner == self.participant_id {
            return;
        }
        if self.is_authority() {
            trace!("{} keeps its own clock over the claim of {}", self.participant_id, meta.owner);
            return;
        }
        if !meta.time.is_finite() || meta.time < 0.0 {
            warn!("ignore invalid ownership claim {:?} on {}", meta, self.session.media_id());
            return;
        }
        self.accept_position(&meta.owner, meta.time);
    }

    fn accept_position(&mut self, owner: &str, position: f64) {
        if self.session.is_terminal() {
            trace!("{} has ended, drop position from {}", self.session.media_id(), owner);
            return;
        }
        self.session.record_authoritative(owner, position, Instant::now());
        match self.session.phase() {
            Phase::Playing | Phase::Paused => self.correct(position),
            Phase::Idle | Phase::Loading => {
                debug!("defer position {} of {} until loaded", position, self.session.media_id())
            }
            Phase::Ended => {}
        }
    }

    fn correct(&mut self, authoritative: f64) {
        let local = self.surface.current_time();
        match self.reconciler.reconcile(local, authoritative) {
            Correction::Seek(target) => {
                info!(
                    "{} drifted on {}: {:.2}s, seek to {:.2}s",
                    self.participant_id,
                    self.session.media_id(),
                    local,
                    target
                );
                self.surface.seek(target);
            }
            Correction::WithinTolerance { delta } => {
                trace!("{} within tolerance ({:.2}s)", self.session.media_id(), delta)
            }
        }
    }

    pub fn play(&mut self) -> SyncResult<()> {
        self.handle_control(ControlEvent::LocalPlay)
    }

    pub fn pause(&mut self) -> SyncResult<()> {
        self.handle_control(ControlEvent::LocalPause)
    }

    /// Completion of a deferred load.
    pub fn notify_loaded(&mut self) -> SyncResult<()> {
        self.handle_control(ControlEvent::LoadSucceeded)
    }

    pub fn notify_ended(&mut self) -> SyncResult<()> {
        self.handle_control(ControlEvent::PlaybackEnded)
    }

    pub fn handle_control(&mut self, event: ControlEvent) -> SyncResult<()> {
        if self.disposed {
            return Err(SyncError::SessionEnded(self.session.media_id().to_owned()));
        }
        let actor = Actor {
            can_update: self.is_authority(),
        };
        let effects = self.router.route(&mut self.session, actor, event, Instant::now())?;
        for effect in effects {
            self.apply_effect(effect);
        }
        Ok(())
    }

    fn route_logged(&mut self, event: ControlEvent) {
        let name = event.name();
        if let Err(e) = self.handle_control(event) {
            debug!("{} on {} ignored: {}", name, self.session.media_id(), e);
        }
    }

    fn apply_effect(&mut self, effect: Effect) {
        match effect {
            Effect::BeginLoad(source) => {
                debug!("load {} from {}", self.session.media_id(), source.url());
                let status = self.surface.load(&source);
                self.source = Some(source);
                match status {
                    Ok(LoadStatus::Ready) => self.route_logged(ControlEvent::LoadSucceeded),
                    Ok(LoadStatus::Pending) => {}
                    Err(e) => self.route_logged(ControlEvent::LoadFailed(e.to_string())),
                }
            }
            Effect::StartPlayback | Effect::ResumeLocal => self.start_playback(),
            Effect::PauseLocal => self.surface.pause(),
            Effect::Publish(message) => self.outbox.push(message),
            Effect::StartBroadcaster => self.broadcasting = true,
            Effect::StopBroadcaster => self.broadcasting = false,
            Effect::ReplyPosition(participant_id) => match SyncBroadcaster::sample(&self.surface) {
                Some(sample) => {
                    debug!("send position {:.2}s to {}", sample.position, participant_id);
                    self.outbox.push(self.broadcaster.targeted_update(&participant_id, sample));
                }
                None => debug!("no position of {} to send to {}", self.session.media_id(), participant_id),
            },
            Effect::ReconcilePending => {
                if let Some(position) = self.session.authoritative_position_at(Instant::now()) {
                    self.correct(position);
                }
            }
            Effect::EmitEnded => {
                info!("{} ended", self.session.media_id());
                self.events.emit(EngineEvent::VideoEnded {
                    id: self.session.media_id().to_owned(),
                    category: self.session.category(),
                });
            }
            Effect::EmitOwnership => {
                let position = self.surface.current_time();
                let position = if position.is_finite() { position.max(0.0) } else { 0.0 };
                self.session
                    .record_authoritative(&self.participant_id, position, Instant::now());
                self.events.emit(EngineEvent::SourceMetadataUpdate {
                    id: self.session.media_id().to_owned(),
                    time: position.floor() as u64,
                    owner: self.participant_id.clone(),
                });
            }
        }
    }

    fn start_playback(&mut self) {
        match self.surface.play() {
            Ok(()) => {}
            Err(PlaybackError::AutoplayRejected) => {
                debug!("autoplay of {} rejected, retry muted", self.session.media_id());
                self.surface.set_muted(true);
                if let Err(e) = self.surface.play() {
                    info!("{} waits for a user gesture: {}", self.session.media_id(), e);
                    self.awaiting_interaction = true;
                }
            }
            Err(e) => warn!("failed to start {}: {}", self.session.media_id(), e),
        }
    }

    /// A user gesture happened, retry playback that autoplay blocked.
    pub fn user_interaction(&mut self) {
        if self.disposed || !self.awaiting_interaction {
            return;
        }
        self.awaiting_interaction = false;
        if self.session.phase() == Phase::Playing {
            if let Err(e) = self.surface.play() {
                warn!("failed to start {} after interaction: {}", self.session.media_id(), e);
            }
        }
    }

    /// Inbound room traffic. Messages from self, for other media, addressed
    /// to someone else or arriving after disposal have no effect.
    pub fn handle_envelope(&mut self, envelope: Envelope) {
        if self.disposed || envelope.sender_id == self.participant_id {
            return;
        }
        if !envelope.message.concerns(self.session.media_id()) {
            return;
        }

        match envelope.message {
            RoomMessage::UpdateVideoTime { id, time, .. } => {
                if !id.addresses(&self.participant_id) {
                    return;
                }
                if self.is_authority() {
                    trace!("{} ignores position from {}", self.participant_id, envelope.sender_id);
                    return;
                }
                self.accept_position(&envelope.sender_id, time as f64);
            }
            RoomMessage::VideoPlay { .. } => self.route_logged(ControlEvent::RemotePlay),
            RoomMessage::VideoPause { .. } => self.route_logged(ControlEvent::RemotePause),
            RoomMessage::UserJoined => self.route_logged(ControlEvent::UserJoined(envelope.sender_id)),
        }
    }

    /// One timer period: a local time update event on every participant and,
    /// on the authority, a room wide position update. Nothing is produced
    /// without a known duration.
    pub fn on_tick(&mut self) {
        if self.disposed {
            return;
        }
        if self.broadcasting && !self.is_authority() {
            debug!("{} lost authority, stop broadcasting", self.participant_id);
            self.broadcasting = false;
        }
        if self.session.phase() != Phase::Playing {
            return;
        }
        match SyncBroadcaster::sample(&self.surface) {
            Some(sample) => {
                if self.broadcasting {
                    trace!("broadcast {} at {:.2}s", self.session.media_id(), sample.position);
                    self.outbox.push(self.broadcaster.periodic_update(sample));
                }
                self.events.emit(self.broadcaster.time_update(sample));
            }
            None => trace!("{} has no duration yet, skip tick", self.session.media_id()),
        }
    }

    pub fn take_outbox(&mut self) -> Vec<RoomMessage> {
        std::mem::take(&mut self.outbox)
    }

    /// Idempotent. Stops broadcasting, drops queued messages and pauses the surface.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.broadcasting = false;
        self.awaiting_interaction = false;
        self.outbox.clear();
        self.surface.pause();
        info!("{} disposed {}", self.participant_id, self.session.media_id());
    }
}
