use embassy_sync::{blocking_mutex::raw::RawMutex, channel::Receiver};
use embassy_time::{with_timeout, Duration, Instant};

use crate::{display::StatusDisplay, gps::ByteSource, mac::Event, mac::MacLayer, tracker::Tracker};

// Upper bound on a single wait so the loop never sleeps forever
const MAX_IDLE: Duration = Duration::from_secs(60);

/// Drives the tracker: runs every due job, then sleeps until the next
/// deadline or the next event from the LoRaWAN stack.
pub async fn run<M, S, D, R, const N: usize>(
    tracker: &mut Tracker<M, S, D>,
    events: Receiver<'_, R, Event, N>,
) -> !
where
    M: MacLayer,
    S: ByteSource,
    D: StatusDisplay,
    R: RawMutex,
{
    info!("Starting tracker");
    tracker.start(Instant::now());

    loop {
        step(tracker, &events).await;
    }
}

/// One pass of the loop: drain due jobs, then wait for the earliest
/// deadline or one event, whichever comes first.
pub async fn step<M, S, D, R, const N: usize>(
    tracker: &mut Tracker<M, S, D>,
    events: &Receiver<'_, R, Event, N>,
) where
    M: MacLayer,
    S: ByteSource,
    D: StatusDisplay,
    R: RawMutex,
{
    while tracker.run_due(Instant::now()).is_some() {}

    let idle = idle_for(tracker.next_deadline(), Instant::now());

    if let Ok(event) = with_timeout(idle, events.receive()).await {
        tracker.handle_event(Instant::now(), event);
    }
}

fn idle_for(deadline: Option<Instant>, now: Instant) -> Duration {
    deadline
        .map(|deadline| deadline.saturating_duration_since(now))
        .unwrap_or(MAX_IDLE)
        .min(MAX_IDLE)
}
