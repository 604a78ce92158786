use core::fmt::Write;

use embassy_time::Instant;
use heapless::String;

use crate::{
    config::{Timing, UPLINK_PORT},
    display::StatusDisplay,
    gps::{ByteSource, Fix, GpsDecoder},
    mac::{Event, MacLayer, TxResult},
    payload::{self, Position},
    schedule::{Job, Scheduler},
};

pub type StatusLine = String<64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JoinStatus {
    Joining,
    Joined,
}

/// Everything the periodic jobs and the event handler share.
///
/// Jobs and events are only ever handled from one loop, so plain `&mut self`
/// access is enough.
pub struct Tracker<M, S, D> {
    mac: M,
    serial: S,
    display: D,
    gps: GpsDecoder,
    join: JoinStatus,
    status: StatusLine,
    jobs: Scheduler,
    timing: Timing,
}

impl<M, S, D> Tracker<M, S, D>
where
    M: MacLayer,
    S: ByteSource,
    D: StatusDisplay,
{
    pub fn new(mac: M, serial: S, display: D, timing: Timing) -> Self {
        Self {
            mac,
            serial,
            display,
            gps: GpsDecoder::new(),
            join: JoinStatus::Joining,
            status: StatusLine::new(),
            jobs: Scheduler::new(),
            timing,
        }
    }

    pub fn join_status(&self) -> JoinStatus {
        self.join
    }

    pub fn fix(&self) -> &Fix {
        self.gps.fix()
    }

    /// Last human readable status, e.g. signal quality of the last uplink
    pub fn status(&self) -> &str {
        self.status.as_str()
    }

    pub fn jobs(&self) -> &Scheduler {
        &self.jobs
    }

    pub fn mac(&self) -> &M {
        &self.mac
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.jobs.next_deadline()
    }

    /// Kicks off the join and the periodic jobs
    pub fn start(&mut self, now: Instant) {
        // Link check validation is switched on during join by some stacks,
        // the network doesn't answer it
        self.mac.set_link_check(false);

        if let Err(e) = self.mac.join() {
            warn!("Join request rejected: {}", e);
        }

        self.on_send(now);
        self.jobs
            .schedule_after(Job::Rejoin, now, self.timing.rejoin_interval);
    }

    /// Runs the next job that is due at `now`, if any
    pub fn run_due(&mut self, now: Instant) -> Option<Job> {
        let job = self.jobs.pop_due(now)?;
        trace!("{}: running job", now.as_ticks());

        match job {
            Job::Send => self.on_send(now),
            Job::Rejoin => self.on_rejoin(now),
            Job::GpsPoll => self.on_gps_poll(now),
        }

        Some(job)
    }

    pub fn handle_event(&mut self, now: Instant, event: Event) {
        let ticks = now.as_ticks();

        match event {
            Event::TxComplete(result) => {
                info!("{}: TX complete (includes waiting for RX windows)", ticks);
                self.report_tx(&result);

                if result.downlink_len > 0 {
                    info!("Data received: {} bytes of payload", result.downlink_len);
                }

                self.jobs
                    .schedule_after(Job::Send, now, self.timing.send_interval);
            }
            Event::Joining => {
                info!("{}: Joining...", ticks);
                self.set_status("OTAA joining....");
                self.join = JoinStatus::Joining;
                self.display.show_line("OTAA joining....");

                // A session lost after joining needs the supervisor again
                if !self.jobs.is_pending(Job::Rejoin) {
                    self.jobs
                        .schedule_after(Job::Rejoin, now, self.timing.rejoin_interval);
                }
            }
            Event::JoinFailed => {
                warn!("{}: Joining failed", ticks);
                self.set_status("OTAA Joining failed");
                self.display.show_line("OTAA joining failed");
            }
            Event::Joined => {
                info!("{}: Joined", ticks);
                self.set_status("Joined!");
                self.join = JoinStatus::Joined;
                self.display.show_line("Joined TTN!");

                self.mac.set_link_check(false);

                self.on_gps_poll(now);
            }
            Event::RxComplete => info!("{}: RX complete", ticks),
            Event::LinkDead => warn!("{}: Link dead", ticks),
            Event::LinkAlive => info!("{}: Link alive", ticks),
            Event::Unknown(code) => warn!("{}: Unknown event {}", ticks, code),
        }
    }

    fn on_send(&mut self, now: Instant) {
        if self.join == JoinStatus::Joining {
            info!("Not joined yet");
            self.jobs
                .schedule_after(Job::Send, now, self.timing.send_interval);
            return;
        }

        if self.mac.tx_pending() {
            // Not re-armed here, the TX complete event does that
            info!("TX/RX pending, not sending");
            return;
        }

        if let Some(location) = self.gps.fix().location {
            info!("Sending position");
            let position = Position {
                latitude: location.latitude,
                longitude: location.longitude,
            };

            match payload::encode(&position) {
                Ok(buff) => {
                    if let Err(e) = self.mac.send_unconfirmed(UPLINK_PORT, &buff) {
                        warn!("Uplink request rejected: {}", e);
                    }
                }
                Err(e) => warn!("Could not build payload: {}", e),
            }
        }

        self.jobs
            .schedule_after(Job::Send, now, self.timing.send_interval);

        let mut line: String<32> = String::new();
        if write!(line, "[{}]data sending!", now.as_secs()).is_ok() {
            self.display.show_line(&line);
        }
    }

    fn on_rejoin(&mut self, now: Instant) {
        if self.join != JoinStatus::Joining {
            return;
        }

        warn!("Joining process takes too long, rejoining...");
        if let Err(e) = self.mac.join() {
            warn!("Join request rejected: {}", e);
        }
        self.jobs
            .schedule_after(Job::Rejoin, now, self.timing.rejoin_interval);
    }

    fn on_gps_poll(&mut self, now: Instant) {
        if self.gps.poll(&mut self.serial) {
            let mut line: String<96> = String::new();
            if write!(line, "{}", self.gps.fix()).is_ok() {
                info!("{}", line.as_str());
            }
        }

        self.jobs
            .schedule_after(Job::GpsPoll, now, self.timing.gps_interval);
    }

    fn report_tx(&mut self, result: &TxResult) {
        self.status.clear();
        if result.ack {
            info!("Received ack");
            let _ = self.status.push_str("Received ACK. ");
        }
        let _ = write!(self.status, "rssi:{} snr: {}", result.rssi, result.snr);
        info!("{}", self.status.as_str());
    }

    fn set_status(&mut self, text: &str) {
        self.status.clear();
        let _ = self.status.push_str(text);
    }
}
