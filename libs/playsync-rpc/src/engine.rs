use std::sync::Arc;

use playsync_core::{
    AuthorityResolver, ControlEvent, EngineEvent, EventBus, PlaybackSurface, SessionDriver, SourceConfig, SyncConfig,
    SyncResult,
};
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    task::JoinHandle,
};

use super::*;

/// Handle of one synchronized media session running on its own task.
///
/// Without a room channel the session plays locally and every send is a
/// no-op. Dropping the handle stops the session.
pub struct SyncEngine {
    participant_id: String,
    media_id: String,
    commands: mpsc::Sender<SessionCommand>,
    events: EventBus,
    task: Option<JoinHandle<()>>,
}

impl SyncEngine {
    pub fn start<P, S>(
        participant_id: P,
        config: SourceConfig,
        settings: &SyncConfig,
        resolver: AuthorityResolver,
        surface: S,
        channel: Option<Arc<dyn RoomChannel>>,
    ) -> Self
    where
        P: AsRef<str>,
        S: PlaybackSurface + 'static,
    {
        let participant_id = participant_id.as_ref().to_owned();
        let media_id = config.media_id.clone();
        let events = EventBus::new(settings.channel_capacity);
        let driver = SessionDriver::new(&participant_id, config, settings, resolver, surface, events.clone());

        // subscribe before the task runs so nothing sent in between is lost
        let subscription = match &channel {
            Some(channel) => channel.on_data(),
            None => {
                warn!("{} plays {} without a room channel", participant_id, media_id);
                RoomSubscription::detached(&participant_id)
            }
        };

        let (tx, rx) = mpsc::channel(settings.channel_capacity);
        let task = tokio::spawn(handle_session(driver, channel, subscription, rx));

        Self {
            participant_id,
            media_id,
            commands: tx,
            events,
            task: Some(task),
        }
    }

    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    pub fn media_id(&self) -> &str {
        &self.media_id
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    async fn request<F>(&self, command: F) -> RoomResult<()>
    where
        F: FnOnce(oneshot::Sender<SyncResult<()>>) -> SessionCommand,
    {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| RoomError::EngineStopped)?;
        rx.await.map_err(|_| RoomError::EngineStopped)??;
        Ok(())
    }

    async fn control(&self, event: ControlEvent) -> RoomResult<()> {
        self.request(|reply| SessionCommand::Control(event, reply)).await
    }

    pub async fn apply_update(&self, config: SourceConfig) -> RoomResult<()> {
        self.request(|reply| SessionCommand::Update(config, reply)).await
    }

    pub async fn play(&self) -> RoomResult<()> {
        self.control(ControlEvent::LocalPlay).await
    }

    pub async fn pause(&self) -> RoomResult<()> {
        self.control(ControlEvent::LocalPause).await
    }

    /// The surface finished a deferred load.
    pub async fn notify_loaded(&self) -> RoomResult<()> {
        self.control(ControlEvent::LoadSucceeded).await
    }

    /// The surface reached the end of the media.
    pub async fn notify_ended(&self) -> RoomResult<()> {
        self.control(ControlEvent::PlaybackEnded).await
    }

    pub async fn user_interaction(&self) -> RoomResult<()> {
        self.commands
            .send(SessionCommand::Interaction)
            .await
            .map_err(|_| RoomError::EngineStopped)
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map_or(false, |task| !task.is_finished())
    }

    /// Stops the session and waits for its task. Idempotent.
    pub async fn dispose(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        if self.commands.send(SessionCommand::Dispose).await.is_err() {
            debug!("session {} already stopped", self.media_id);
        }
        if let Err(e) = task.await {
            error!("session {} of {} failed: {}", self.media_id, self.participant_id, e);
        }
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use playsync_core::{MediaCategory, Role, RoomMessage, SimulatedSurface, SyncError, SyncTarget};
    use tokio::time::{sleep, timeout};

    use super::*;
    use crate::MinimumRoomContext;

    const SRC: &str = "https://cdn.example.com/clip.mp4";

    fn config(role: Role, category: MediaCategory) -> SourceConfig {
        SourceConfig::new("clip", category, role).with_src(SRC)
    }

    fn engine(
        participant_id: &str,
        role: Role,
        category: MediaCategory,
        surface: &SimulatedSurface,
        channel: Option<Arc<dyn RoomChannel>>,
    ) -> SyncEngine {
        SyncEngine::start(
            participant_id,
            config(role, category),
            &SyncConfig::default(),
            AuthorityResolver::default(),
            surface.clone(),
            channel,
        )
    }

    async fn next_update(subscription: &mut RoomSubscription) -> (SyncTarget, u64) {
        loop {
            match subscription.recv().await {
                Some(envelope) => {
                    if let RoomMessage::UpdateVideoTime { id, time, .. } = envelope.message {
                        return (id, time);
                    }
                }
                None => panic!("room closed"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_broadcast() {
        playsync_logger::init_logger();
        let context = MinimumRoomContext::new();
        let observer = context.join_room("room", "observer").await.unwrap();
        let mut observer_rx = observer.on_data();

        let surface = SimulatedSurface::new(600.0);
        let host_channel = context.join_room("room", "host").await.unwrap();
        let _host = engine("host", Role::Host, MediaCategory::Video, &surface, Some(host_channel));

        assert_eq!(next_update(&mut observer_rx).await, (SyncTarget::All, 3));
        assert_eq!(next_update(&mut observer_rx).await, (SyncTarget::All, 6));
        assert_eq!(next_update(&mut observer_rx).await, (SyncTarget::All, 9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drift_converges_across_room() {
        let context = MinimumRoomContext::new();
        let host_surface = SimulatedSurface::new(600.0);
        let host_channel = context.join_room("room", "host").await.unwrap();
        let _host = engine("host", Role::Host, MediaCategory::Video, &host_surface, Some(host_channel));

        // the guest clock runs at half speed
        let guest_surface = SimulatedSurface::new(600.0).with_rate(0.5);
        let guest_channel = context.join_room("room", "guest").await.unwrap();
        let _guest = engine("guest", Role::Guest, MediaCategory::Video, &guest_surface, Some(guest_channel));

        // 3s: 1.5s behind, within tolerance
        sleep(Duration::from_millis(3500)).await;
        assert!(guest_surface.seeks().is_empty());

        // 6s: 3s behind, corrected to the host position
        sleep(Duration::from_secs(3)).await;
        assert_eq!(guest_surface.seeks(), vec![6.0]);
        assert!(host_surface.seeks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_fast_path() {
        let context = MinimumRoomContext::new();
        let surface = SimulatedSurface::new(600.0);
        let host_channel = context.join_room("room", "host").await.unwrap();
        let _host = engine("host", Role::Host, MediaCategory::Video, &surface, Some(host_channel));

        sleep(Duration::from_secs(1)).await;
        let late = context.join_room("room", "late").await.unwrap();
        let mut late_rx = late.on_data();

        assert_eq!(
            next_update(&mut late_rx).await,
            (SyncTarget::Participant("late".into()), 1)
        );
        // nothing else before the next periodic tick
        assert!(timeout(Duration::from_millis(1500), late_rx.recv()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_stops_ticks() {
        let context = MinimumRoomContext::new();
        let observer = context.join_room("room", "observer").await.unwrap();
        let mut observer_rx = observer.on_data();

        let surface = SimulatedSurface::new(600.0);
        let host_channel = context.join_room("room", "host").await.unwrap();
        let mut host = engine("host", Role::Host, MediaCategory::OverlayVideo, &surface, Some(host_channel));

        assert_eq!(next_update(&mut observer_rx).await, (SyncTarget::All, 3));
        host.dispose().await;
        host.dispose().await;
        assert!(!host.is_running());
        assert!(!surface.is_playing());

        assert!(timeout(Duration::from_secs(10), observer_rx.recv()).await.is_err());
        assert!(matches!(host.play().await, Err(RoomError::EngineStopped)));

        // late traffic for the disposed session is harmless
        observer
            .send_data(&RoomMessage::VideoPlay {
                media_id: Some("clip".into()),
            })
            .await
            .unwrap();
        sleep(Duration::from_secs(1)).await;
        assert!(!surface.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recreated_session_corrects_once() {
        let context = MinimumRoomContext::new();
        let host = context.join_room("room", "host").await.unwrap();
        let guest_channel = context.join_room("room", "guest").await.unwrap();
        let surface = SimulatedSurface::new(600.0);

        let mut first = engine(
            "guest",
            Role::Guest,
            MediaCategory::Video,
            &surface,
            Some(guest_channel.clone()),
        );
        sleep(Duration::from_millis(100)).await;
        first.dispose().await;

        let _second = engine("guest", Role::Guest, MediaCategory::Video, &surface, Some(guest_channel));
        sleep(Duration::from_millis(100)).await;

        host.send_data(&RoomMessage::UpdateVideoTime {
            id: SyncTarget::All,
            time: 120,
            media_id: Some("clip".into()),
        })
        .await
        .unwrap();
        sleep(Duration::from_millis(100)).await;
        assert_eq!(surface.seeks(), vec![120.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_controls_over_room() {
        let context = MinimumRoomContext::new();
        let host_surface = SimulatedSurface::new(600.0);
        let host_channel = context.join_room("room", "host").await.unwrap();
        let host = engine("host", Role::Host, MediaCategory::OverlayVideo, &host_surface, Some(host_channel));

        let guest_surface = SimulatedSurface::new(600.0);
        let guest_channel = context.join_room("room", "guest").await.unwrap();
        let guest = engine("guest", Role::Guest, MediaCategory::OverlayVideo, &guest_surface, Some(guest_channel));
        sleep(Duration::from_millis(100)).await;

        assert!(matches!(
            guest.pause().await,
            Err(RoomError::Sync(SyncError::PermissionDenied(_)))
        ));
        assert!(host_surface.is_playing());

        host.pause().await.unwrap();
        sleep(Duration::from_millis(100)).await;
        assert!(!host_surface.is_playing());
        assert!(!guest_surface.is_playing());

        host.play().await.unwrap();
        sleep(Duration::from_millis(100)).await;
        assert!(guest_surface.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ended_once() {
        let surface = SimulatedSurface::new(600.0);
        let host = engine("host", Role::Host, MediaCategory::Video, &surface, None);
        let mut events = host.subscribe();

        host.notify_ended().await.unwrap();
        assert!(matches!(
            host.notify_ended().await,
            Err(RoomError::Sync(SyncError::SessionEnded(_)))
        ));

        let mut ended = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, EngineEvent::VideoEnded { .. }) {
                ended += 1;
            }
        }
        assert_eq!(ended, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_only_and_deferred_load() {
        let surface = SimulatedSurface::new(600.0).with_deferred_load();
        let host = engine("host", Role::Host, MediaCategory::Video360, &surface, None);
        let mut events = host.subscribe();

        sleep(Duration::from_secs(5)).await;
        assert!(!surface.is_playing());

        surface.complete_load();
        host.notify_loaded().await.unwrap();
        assert!(surface.is_playing());
        assert_eq!(
            events.recv().await.unwrap(),
            EngineEvent::SourceMetadataUpdate {
                id: "clip".into(),
                time: 0,
                owner: "host".into()
            }
        );

        // ticks run without a channel, only the local event is produced
        sleep(Duration::from_millis(3100)).await;
        assert_eq!(
            events.recv().await.unwrap(),
            EngineEvent::VideoTimeUpdate {
                id: "clip".into(),
                category: MediaCategory::Video360,
                time: 597
            }
        );
        host.pause().await.unwrap();
        assert!(!surface.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_role_update() {
        let context = MinimumRoomContext::new();
        let observer = context.join_room("room", "observer").await.unwrap();
        let mut observer_rx = observer.on_data();

        let surface = SimulatedSurface::new(600.0);
        let channel = context.join_room("room", "p-1").await.unwrap();
        let participant = engine("p-1", Role::Guest, MediaCategory::Video, &surface, Some(channel));

        assert!(timeout(Duration::from_secs(4), next_update(&mut observer_rx)).await.is_err());

        participant
            .apply_update(config(Role::Host, MediaCategory::Video))
            .await
            .unwrap();
        let (target, _) = next_update(&mut observer_rx).await;
        assert_eq!(target, SyncTarget::All);

        let result = participant
            .apply_update(SourceConfig::new("other", MediaCategory::Video, Role::Host))
            .await;
        assert!(matches!(result, Err(RoomError::Sync(SyncError::MediaMismatch { .. }))));
    }
}
