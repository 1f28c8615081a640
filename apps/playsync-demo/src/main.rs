use std::{str::FromStr, sync::Arc, time::Duration};

use anyhow::anyhow;
use nanoid::nanoid;
use playsync_core::{
    info, warn, AuthorityResolver, MediaCategory, PlaybackSurface, Role, SimulatedSurface, SourceConfig, SyncConfig,
};
use playsync_logger::init_logger;
use playsync_rpc::{MinimumRoomContext, RoomContextImpl, SyncEngine};
use rand::Rng;
use tokio::{
    sync::broadcast::error::RecvError,
    time::{interval, sleep},
};

const ROOM: &str = "demo";
const MEDIA_ID: &str = "intro";
const MEDIA_SRC: &str = "https://cdn.example.com/intro/index.m3u8";
const MEDIA_DURATION: f64 = 600.0;

struct Participant {
    id: String,
    surface: SimulatedSurface,
    engine: SyncEngine,
}

fn env_or<T: FromStr>(key: &str, default: T) -> anyhow::Result<T> {
    match dotenvy::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| anyhow!("{key}={value} is not a valid value")),
        Err(_) => Ok(default),
    }
}

async fn join(
    context: &Arc<MinimumRoomContext>,
    settings: &SyncConfig,
    id: String,
    role: Role,
    rate: f64,
) -> anyhow::Result<Participant> {
    let channel = context.join_room(ROOM, &id).await?;
    let surface = SimulatedSurface::new(MEDIA_DURATION).with_rate(rate);
    let config = SourceConfig::new(MEDIA_ID, MediaCategory::OverlayVideo, role).with_src(MEDIA_SRC);
    let engine = SyncEngine::start(
        &id,
        config,
        settings,
        AuthorityResolver::default(),
        surface.clone(),
        Some(channel),
    );
    info!("{} joined as {:?}, clock rate {:.2}", id, role, rate);
    Ok(Participant { id, surface, engine })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let settings = SyncConfig::from_env()?;
    let guests: usize = env_or("PLAYSYNC_DEMO_GUESTS", 3)?;
    let seconds: u64 = env_or("PLAYSYNC_DEMO_SECONDS", 20)?;
    let rates: Vec<f64> = {
        let mut rng = rand::thread_rng();
        (0..guests).map(|_| rng.gen_range(0.8..1.2)).collect()
    };

    let context = MinimumRoomContext::with_capacity(settings.channel_capacity);
    let host = join(&context, &settings, "host".into(), Role::Host, 1.0).await?;

    let mut events = host.engine.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => info!("host event: {}", json),
                    Err(e) => warn!("failed to encode event: {}", e),
                },
                Err(RecvError::Lagged(count)) => warn!("missed {} host events", count),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut participants = vec![host];
    for rate in rates {
        participants.push(join(&context, &settings, nanoid!(8), Role::Guest, rate).await?);
    }

    let deadline = sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);
    let mut report = interval(Duration::from_secs(2));
    let mut round = 0u64;
    let mut paused = false;

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            _ = report.tick() => {
                round += 1;
                let host_position = participants[0].surface.current_time();
                info!("host at {:.2}s", host_position);
                for guest in &participants[1..] {
                    let position = guest.surface.current_time();
                    info!("{} at {:.2}s ({:+.2}s)", guest.id, position, position - host_position);
                }

                if round % 5 == 0 {
                    let host = &participants[0].engine;
                    let result = if paused { host.play().await } else { host.pause().await };
                    match result {
                        Ok(()) => paused = !paused,
                        Err(e) => warn!("host control rejected: {}", e),
                    }
                }
            }
        }
    }

    for participant in &mut participants {
        participant.engine.dispose().await;
        context.leave_room(ROOM, &participant.id).await;
    }
    context.close_room(ROOM).await;
    info!("demo finished after {} reports", round);

    Ok(())
}
