//! Boundary between the tracker and the LoRaWAN stack.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    channel::{Channel, Sender},
};
use heapless::Vec;

use crate::error::{Error, Result};

/// Outcome of a finished uplink, including the receive windows after it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxResult {
    /// The network acknowledged the frame
    pub ack: bool,
    pub rssi: i16,
    pub snr: i8,
    /// Bytes of application downlink received in the rx windows
    pub downlink_len: usize,
}

/// Protocol events reported by the MAC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    Joining,
    Joined,
    JoinFailed,
    TxComplete(TxResult),
    RxComplete,
    LinkDead,
    LinkAlive,
    Unknown(u8),
}

/// What the tracker needs from the LoRaWAN stack. Requests are
/// fire-and-forget; results come back later as [`Event`]s.
pub trait MacLayer {
    /// Starts (or restarts) the OTAA join procedure
    fn join(&mut self) -> Result<()>;

    /// A transmission and its receive windows are still in progress
    fn tx_pending(&self) -> bool;

    fn send_unconfirmed(&mut self, port: u8, payload: &[u8]) -> Result<()>;

    fn set_link_check(&mut self, enabled: bool);
}

/// How an uplink ended, as far as the stack tells us
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UplinkOutcome {
    /// A downlink arrived in one of the rx windows
    Downlink { len: usize },
    /// Both rx windows closed without a downlink
    Quiet,
    /// Frame counters ran out, a new join is needed
    SessionExpired,
    /// The stack reported an error
    Failed,
}

impl UplinkOutcome {
    /// Event to report for this outcome. A downlink after a confirmed
    /// uplink carries the ack.
    pub fn event(self, confirmed: bool) -> Event {
        match self {
            UplinkOutcome::Downlink { len } => Event::TxComplete(TxResult {
                ack: confirmed,
                downlink_len: len,
                ..TxResult::default()
            }),
            UplinkOutcome::Quiet | UplinkOutcome::Failed => {
                Event::TxComplete(TxResult::default())
            }
            UplinkOutcome::SessionExpired => Event::LinkDead,
        }
    }

    pub fn needs_rejoin(self) -> bool {
        self == UplinkOutcome::SessionExpired
    }
}

pub fn join_event(accepted: bool) -> Event {
    if accepted {
        Event::Joined
    } else {
        Event::JoinFailed
    }
}

/// Largest application payload any EU868 data rate carries
pub const MAX_PAYLOAD: usize = 51;

pub const QUEUE_DEPTH: usize = 4;

/// Requests from the tracker loop to the task driving the LoRaWAN stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join,
    Send {
        port: u8,
        payload: Vec<u8, MAX_PAYLOAD>,
        confirmed: bool,
    },
}

pub type CommandChannel = Channel<CriticalSectionRawMutex, Command, QUEUE_DEPTH>;
pub type EventChannel = Channel<CriticalSectionRawMutex, Event, QUEUE_DEPTH>;

/// [`MacLayer`] that forwards requests over a channel to the task owning the
/// radio. The stack task clears `pending` once the uplink and its receive
/// windows are done.
pub struct ChannelMac<'a> {
    commands: Sender<'a, CriticalSectionRawMutex, Command, QUEUE_DEPTH>,
    pending: &'a AtomicBool,
    link_check: bool,
}

impl<'a> ChannelMac<'a> {
    pub fn new(
        commands: Sender<'a, CriticalSectionRawMutex, Command, QUEUE_DEPTH>,
        pending: &'a AtomicBool,
    ) -> Self {
        Self {
            commands,
            pending,
            link_check: false,
        }
    }

    pub fn link_check(&self) -> bool {
        self.link_check
    }

    fn submit(&self, command: Command) -> Result<()> {
        self.commands
            .try_send(command)
            .map_err(|_| Error::QueueFull)
    }
}

impl MacLayer for ChannelMac<'_> {
    fn join(&mut self) -> Result<()> {
        self.submit(Command::Join)
    }

    fn tx_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    fn send_unconfirmed(&mut self, port: u8, payload: &[u8]) -> Result<()> {
        let payload = Vec::from_slice(payload).map_err(|_| Error::PayloadTooLarge)?;

        self.pending.store(true, Ordering::Release);
        self.submit(Command::Send {
            port,
            payload,
            confirmed: false,
        })
        .inspect_err(|_| self.pending.store(false, Ordering::Release))
    }

    fn set_link_check(&mut self, enabled: bool) {
        // lorawan-device only sends LinkCheckReq on request, so this is just
        // remembered
        self.link_check = enabled;
    }
}
