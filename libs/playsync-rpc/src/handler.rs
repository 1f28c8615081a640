use std::sync::Arc;

use futures::future::pending;
use playsync_core::{ControlEvent, PlaybackSurface, SessionDriver, SourceConfig, SyncResult};
use tokio::{
    sync::{mpsc::Receiver, oneshot},
    time::{interval_at, Instant, Interval, MissedTickBehavior},
};

use super::*;

#[derive(Debug)]
pub enum SessionCommand {
    Update(SourceConfig, oneshot::Sender<SyncResult<()>>),
    Control(ControlEvent, oneshot::Sender<SyncResult<()>>),
    Interaction,
    Dispose,
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending().await,
    }
}

// the timer only exists while the driver ticks
fn sync_ticker<S: PlaybackSurface>(driver: &SessionDriver<S>, ticker: &mut Option<Interval>) {
    match (driver.is_ticking(), ticker.is_some()) {
        (true, false) => {
            let period = driver.broadcast_interval();
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            *ticker = Some(interval);
            debug!("{} start ticking every {:?}", driver.media_id(), period);
        }
        (false, true) => {
            *ticker = None;
            debug!("{} stop ticking", driver.media_id());
        }
        _ => {}
    }
}

async fn flush<S: PlaybackSurface>(driver: &mut SessionDriver<S>, channel: Option<&dyn RoomChannel>) {
    let outbox = driver.take_outbox();
    let Some(channel) = channel else {
        if !outbox.is_empty() {
            trace!("no room channel, drop {} messages", outbox.len());
        }
        return;
    };
    for message in outbox {
        if let Err(e) = channel.send_data(&message).await {
            debug!("failed to send {}: {}", message.kind(), e);
        }
    }
}

/// Runs one session until it is disposed or its engine handle is dropped.
/// The timer and the room subscription live and die with this task.
pub async fn handle_session<S: PlaybackSurface>(
    mut driver: SessionDriver<S>,
    channel: Option<Arc<dyn RoomChannel>>,
    mut subscription: RoomSubscription,
    mut commands: Receiver<SessionCommand>,
) {
    info!("{} start session {}", driver.participant_id(), driver.media_id());

    driver.start();
    flush(&mut driver, channel.as_deref()).await;

    let mut ticker = None;
    let mut room_open = !subscription.is_closed();

    'session: loop {
        sync_ticker(&driver, &mut ticker);

        tokio::select! {
            command = commands.recv() => match command {
                Some(SessionCommand::Update(config, reply)) => {
                    if reply.send(driver.apply_update(config)).is_err() {
                        trace!("update caller went away");
                    }
                }
                Some(SessionCommand::Control(event, reply)) => {
                    let name = event.name();
                    let result = driver.handle_control(event);
                    if let Err(e) = &result {
                        debug!("{} on {} rejected: {}", name, driver.media_id(), e);
                    }
                    if reply.send(result).is_err() {
                        trace!("control caller went away");
                    }
                }
                Some(SessionCommand::Interaction) => driver.user_interaction(),
                Some(SessionCommand::Dispose) | None => break 'session,
            },
            envelope = subscription.recv(), if room_open => match envelope {
                Some(envelope) => {
                    trace!("{} recv {} from {}", driver.participant_id(), envelope.message.kind(), envelope.sender_id);
                    driver.handle_envelope(envelope);
                }
                None => {
                    info!("{} lost the room, {} continues locally", driver.participant_id(), driver.media_id());
                    room_open = false;
                }
            },
            _ = tick(&mut ticker) => driver.on_tick(),
        }

        flush(&mut driver, channel.as_deref()).await;
    }

    driver.dispose();
    info!("{} stop session {}", driver.participant_id(), driver.media_id());
}
