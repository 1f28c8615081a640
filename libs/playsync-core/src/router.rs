use tokio::time::Instant;

use crate::{trace, warn, MediaSession, MediaSource, Phase, RoomMessage, SyncError, SyncResult};

#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    SourceResolved(MediaSource),
    LoadSucceeded,
    LoadFailed(String),
    LocalPause,
    LocalPlay,
    RemotePause,
    RemotePlay,
    PlaybackEnded,
    /// Carries the id of the participant that joined.
    UserJoined(String),
}

impl ControlEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ControlEvent::SourceResolved(_) => "source resolved",
            ControlEvent::LoadSucceeded => "load succeeded",
            ControlEvent::LoadFailed(_) => "load failed",
            ControlEvent::LocalPause => "local pause",
            ControlEvent::LocalPlay => "local play",
            ControlEvent::RemotePause => "inbound pause",
            ControlEvent::RemotePlay => "inbound play",
            ControlEvent::PlaybackEnded => "playback ended",
            ControlEvent::UserJoined(_) => "user joined",
        }
    }

    fn is_playback_control(&self) -> bool {
        matches!(
            self,
            ControlEvent::LocalPause | ControlEvent::LocalPlay | ControlEvent::RemotePause | ControlEvent::RemotePlay
        )
    }

    fn is_local_action(&self) -> bool {
        matches!(self, ControlEvent::LocalPause | ControlEvent::LocalPlay)
    }
}

/// Side effects requested by a transition, carried out by the session driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    BeginLoad(MediaSource),
    StartPlayback,
    PauseLocal,
    ResumeLocal,
    Publish(RoomMessage),
    StartBroadcaster,
    StopBroadcaster,
    /// Targeted position update for a participant that just joined.
    ReplyPosition(String),
    /// Apply an authoritative position that arrived before the media was ready.
    ReconcilePending,
    EmitEnded,
    EmitOwnership,
}

/// Capabilities of the local participant at the time of the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub can_update: bool,
}

/// The only component allowed to move a session between phases.
#[derive(Debug, Default, Clone, Copy)]
pub struct ControlEventRouter;

impl ControlEventRouter {
    pub fn route(
        &self,
        session: &mut MediaSession,
        actor: Actor,
        event: ControlEvent,
        now: Instant,
    ) -> SyncResult<Vec<Effect>> {
        if session.is_terminal() {
            return Err(SyncError::SessionEnded(session.media_id().to_owned()));
        }

        if event.is_playback_control() && !session.category().accepts_playback_controls() {
            if event.is_local_action() {
                return Err(SyncError::Unsupported(session.category()));
            }
            trace!("{} ignores {}", session.category(), event.name());
            return Ok(vec![]);
        }

        if event.is_local_action() && !actor.can_update {
            return Err(SyncError::PermissionDenied(event.name()));
        }

        let media_id = Some(session.media_id().to_owned());
        let phase = session.phase();
        let effects = match (phase, event) {
            (Phase::Idle, ControlEvent::SourceResolved(source)) => {
                session.transition(Phase::Loading, now);
                vec![Effect::BeginLoad(source)]
            }
            // a new source on a mounted session reloads it from the start
            (Phase::Loading | Phase::Playing | Phase::Paused, ControlEvent::SourceResolved(source)) => {
                session.transition(Phase::Idle, now);
                session.forget_position();
                session.transition(Phase::Loading, now);
                vec![Effect::StopBroadcaster, Effect::BeginLoad(source)]
            }
            (Phase::Loading, ControlEvent::LoadSucceeded) => {
                session.transition(Phase::Playing, now);
                if actor.can_update {
                    vec![Effect::StartPlayback, Effect::StartBroadcaster, Effect::EmitOwnership]
                } else {
                    vec![Effect::StartPlayback, Effect::ReconcilePending]
                }
            }
            (Phase::Loading, ControlEvent::LoadFailed(reason)) => {
                warn!("failed to load {}: {}", session.media_id(), reason);
                session.transition(Phase::Idle, now);
                vec![Effect::StopBroadcaster]
            }
            (Phase::Playing, ControlEvent::LocalPause) => {
                session.transition(Phase::Paused, now);
                vec![
                    Effect::PauseLocal,
                    Effect::Publish(RoomMessage::VideoPause { media_id }),
                    Effect::StopBroadcaster,
                ]
            }
            (Phase::Paused, ControlEvent::LocalPlay) => {
                session.transition(Phase::Playing, now);
                vec![
                    Effect::ResumeLocal,
                    Effect::Publish(RoomMessage::VideoPlay { media_id }),
                    Effect::StartBroadcaster,
                ]
            }
            (Phase::Playing, ControlEvent::RemotePause) => {
                session.transition(Phase::Paused, now);
                vec![Effect::PauseLocal, Effect::StopBroadcaster]
            }
            (Phase::Paused, ControlEvent::RemotePlay) => {
                session.transition(Phase::Playing, now);
                if actor.can_update {
                    vec![Effect::ResumeLocal, Effect::StartBroadcaster]
                } else {
                    vec![Effect::ResumeLocal]
                }
            }
            // duplicated delivery of a control message the session already follows
            (Phase::Paused, ControlEvent::RemotePause) | (Phase::Playing, ControlEvent::RemotePlay) => vec![],
            (Phase::Playing, ControlEvent::PlaybackEnded) => {
                if session.looping() {
                    vec![]
                } else if actor.can_update {
                    session.transition(Phase::Ended, now);
                    vec![Effect::StopBroadcaster, Effect::EmitEnded]
                } else {
                    // followers hold the last frame until the authority says otherwise
                    vec![]
                }
            }
            (Phase::Playing | Phase::Paused, ControlEvent::UserJoined(participant_id)) => {
                if actor.can_update {
                    vec![Effect::ReplyPosition(participant_id)]
                } else {
                    vec![]
                }
            }
            (Phase::Idle | Phase::Loading, ControlEvent::UserJoined(_)) => vec![],
            (phase, event) => {
                return Err(SyncError::InvalidTransition {
                    phase,
                    event: event.name(),
                });
            }
        };

        Ok(effects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MediaCategory;

    const HOST: Actor = Actor { can_update: true };
    const GUEST: Actor = Actor { can_update: false };

    fn session_in(phase: Phase, category: MediaCategory) -> MediaSession {
        let now = Instant::now();
        let router = ControlEventRouter;
        let mut session = MediaSession::new("clip", category, 1.5);
        let steps: &[ControlEvent] = match phase {
            Phase::Idle => &[],
            Phase::Loading => &[ControlEvent::SourceResolved(MediaSource::Direct("clip.mp4".into()))],
            Phase::Playing | Phase::Paused | Phase::Ended => &[
                ControlEvent::SourceResolved(MediaSource::Direct("clip.mp4".into())),
                ControlEvent::LoadSucceeded,
            ],
        };
        for step in steps {
            router.route(&mut session, HOST, step.clone(), now).unwrap();
        }
        match phase {
            Phase::Paused => {
                router.route(&mut session, HOST, ControlEvent::LocalPause, now).unwrap();
            }
            Phase::Ended => {
                router
                    .route(&mut session, HOST, ControlEvent::PlaybackEnded, now)
                    .unwrap();
            }
            _ => {}
        }
        assert_eq!(session.phase(), phase);
        session
    }

    #[test]
    fn test_load_path() {
        let now = Instant::now();
        let router = ControlEventRouter;
        let mut session = MediaSession::new("clip", MediaCategory::Video, 1.5);
        let source = MediaSource::AdaptiveManifest("live.m3u8".into());

        let effects = router
            .route(&mut session, GUEST, ControlEvent::SourceResolved(source.clone()), now)
            .unwrap();
        assert_eq!(effects, vec![Effect::BeginLoad(source)]);
        assert_eq!(session.phase(), Phase::Loading);

        let effects = router
            .route(&mut session, GUEST, ControlEvent::LoadSucceeded, now)
            .unwrap();
        assert_eq!(effects, vec![Effect::StartPlayback, Effect::ReconcilePending]);
        assert_eq!(session.phase(), Phase::Playing);
    }

    #[test]
    fn test_authority_starts_broadcaster_on_load() {
        let now = Instant::now();
        let mut session = session_in(Phase::Loading, MediaCategory::Video);
        let effects = ControlEventRouter
            .route(&mut session, HOST, ControlEvent::LoadSucceeded, now)
            .unwrap();
        assert_eq!(
            effects,
            vec![Effect::StartPlayback, Effect::StartBroadcaster, Effect::EmitOwnership]
        );
    }

    #[test]
    fn test_load_failure_returns_to_idle() {
        let now = Instant::now();
        let mut session = session_in(Phase::Loading, MediaCategory::Video);
        let effects = ControlEventRouter
            .route(&mut session, HOST, ControlEvent::LoadFailed("404".into()), now)
            .unwrap();
        assert_eq!(effects, vec![Effect::StopBroadcaster]);
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[test]
    fn test_local_pause_requires_capability() {
        let now = Instant::now();
        let mut session = session_in(Phase::Playing, MediaCategory::OverlayVideo);

        let result = ControlEventRouter.route(&mut session, GUEST, ControlEvent::LocalPause, now);
        assert!(matches!(result, Err(SyncError::PermissionDenied(_))));
        assert_eq!(session.phase(), Phase::Playing);

        let effects = ControlEventRouter
            .route(&mut session, HOST, ControlEvent::LocalPause, now)
            .unwrap();
        assert_eq!(
            effects,
            vec![
                Effect::PauseLocal,
                Effect::Publish(RoomMessage::VideoPause {
                    media_id: Some("clip".into())
                }),
                Effect::StopBroadcaster,
            ]
        );
        assert_eq!(session.phase(), Phase::Paused);

        let effects = ControlEventRouter
            .route(&mut session, HOST, ControlEvent::LocalPlay, now)
            .unwrap();
        assert_eq!(
            effects,
            vec![
                Effect::ResumeLocal,
                Effect::Publish(RoomMessage::VideoPlay {
                    media_id: Some("clip".into())
                }),
                Effect::StartBroadcaster,
            ]
        );
        assert_eq!(session.phase(), Phase::Playing);
    }

    #[test]
    fn test_inbound_controls_and_duplicates() {
        let now = Instant::now();
        let mut session = session_in(Phase::Playing, MediaCategory::Video360);

        let effects = ControlEventRouter
            .route(&mut session, GUEST, ControlEvent::RemotePause, now)
            .unwrap();
        assert_eq!(effects, vec![Effect::PauseLocal, Effect::StopBroadcaster]);
        assert_eq!(session.phase(), Phase::Paused);

        let effects = ControlEventRouter
            .route(&mut session, GUEST, ControlEvent::RemotePause, now)
            .unwrap();
        assert!(effects.is_empty());

        let effects = ControlEventRouter
            .route(&mut session, GUEST, ControlEvent::RemotePlay, now)
            .unwrap();
        assert_eq!(effects, vec![Effect::ResumeLocal]);
        assert_eq!(session.phase(), Phase::Playing);

        let effects = ControlEventRouter
            .route(&mut session, GUEST, ControlEvent::RemotePlay, now)
            .unwrap();
        assert!(effects.is_empty());
    }

    #[test]
    fn test_plain_video_has_no_controls() {
        let now = Instant::now();
        let mut session = session_in(Phase::Playing, MediaCategory::Video);

        let result = ControlEventRouter.route(&mut session, HOST, ControlEvent::LocalPause, now);
        assert!(matches!(result, Err(SyncError::Unsupported(MediaCategory::Video))));

        let effects = ControlEventRouter
            .route(&mut session, GUEST, ControlEvent::RemotePause, now)
            .unwrap();
        assert!(effects.is_empty());
        assert_eq!(session.phase(), Phase::Playing);
    }

    #[test]
    fn test_end_of_media() {
        let now = Instant::now();

        let mut session = session_in(Phase::Playing, MediaCategory::Video);
        let effects = ControlEventRouter
            .route(&mut session, HOST, ControlEvent::PlaybackEnded, now)
            .unwrap();
        assert_eq!(effects, vec![Effect::StopBroadcaster, Effect::EmitEnded]);
        assert_eq!(session.phase(), Phase::Ended);

        // terminal: the duplicate ended notification is refused
        let result = ControlEventRouter.route(&mut session, HOST, ControlEvent::PlaybackEnded, now);
        assert!(matches!(result, Err(SyncError::SessionEnded(_))));

        let mut session = session_in(Phase::Playing, MediaCategory::Video);
        let effects = ControlEventRouter
            .route(&mut session, GUEST, ControlEvent::PlaybackEnded, now)
            .unwrap();
        assert!(effects.is_empty());
        assert_eq!(session.phase(), Phase::Playing);

        let mut session = session_in(Phase::Playing, MediaCategory::Video);
        session.set_looping(true);
        let effects = ControlEventRouter
            .route(&mut session, HOST, ControlEvent::PlaybackEnded, now)
            .unwrap();
        assert!(effects.is_empty());
        assert_eq!(session.phase(), Phase::Playing);
    }

    #[test]
    fn test_join_reply_only_from_authority() {
        let now = Instant::now();
        let mut session = session_in(Phase::Paused, MediaCategory::OverlayVideo);

        let effects = ControlEventRouter
            .route(&mut session, HOST, ControlEvent::UserJoined("guest-9".into()), now)
            .unwrap();
        assert_eq!(effects, vec![Effect::ReplyPosition("guest-9".into())]);
        assert_eq!(session.phase(), Phase::Paused);

        let effects = ControlEventRouter
            .route(&mut session, GUEST, ControlEvent::UserJoined("guest-9".into()), now)
            .unwrap();
        assert!(effects.is_empty());
    }

    #[test]
    fn test_ended_accepts_nothing() {
        let now = Instant::now();
        let mut session = session_in(Phase::Ended, MediaCategory::OverlayVideo);
        for event in [
            ControlEvent::RemotePlay,
            ControlEvent::LocalPlay,
            ControlEvent::UserJoined("late".into()),
            ControlEvent::LoadSucceeded,
        ] {
            assert!(matches!(
                ControlEventRouter.route(&mut session, HOST, event, now),
                Err(SyncError::SessionEnded(_))
            ));
        }
    }

    #[test]
    fn test_new_source_reloads() {
        let now = Instant::now();
        let mut session = session_in(Phase::Paused, MediaCategory::OverlayVideo);
        session.record_authoritative("host", 42.0, now);
        let source = MediaSource::AdaptiveManifest("next.m3u8".into());

        let effects = ControlEventRouter
            .route(&mut session, HOST, ControlEvent::SourceResolved(source.clone()), now)
            .unwrap();
        assert_eq!(effects, vec![Effect::StopBroadcaster, Effect::BeginLoad(source)]);
        assert_eq!(session.phase(), Phase::Loading);
        assert_eq!(session.authoritative(), None);
    }

    #[test]
    fn test_invalid_transition() {
        let now = Instant::now();
        let mut session = session_in(Phase::Idle, MediaCategory::Video);
        let result = ControlEventRouter.route(&mut session, HOST, ControlEvent::LoadSucceeded, now);
        assert!(matches!(
            result,
            Err(SyncError::InvalidTransition {
                phase: Phase::Idle,
                event: "load succeeded"
            })
        ));
    }
}
