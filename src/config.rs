//! Static device configuration.
//!
//! Credentials are baked in at build time. Set `TRACKER_DEV_EUI`,
//! `TRACKER_JOIN_EUI` and `TRACKER_APP_KEY` (plain hex) in the build
//! environment to override the defaults. The EUIs are given LSB first, the
//! key MSB first, which is the byte order `lorawan-device` expects.

use embassy_time::Duration;

use crate::error::{Error, Result};

/// Application port every position uplink is sent on
pub const UPLINK_PORT: u8 = 1;

/// Uplink data rate until ADR takes over
pub const DATA_RATE: DataRate = DataRate::Dr5;

/// Radio output power, also the cap handed to the LoRaWAN stack
pub const TX_POWER_DBM: u8 = 14;

// SX127x PA_BOOST tops out at 20dBm
const _: () = assert!(TX_POWER_DBM >= 2 && TX_POWER_DBM <= 20);

pub const GPS_BAUD_RATE: u32 = 9600;

/// EU868 LoRa data rates at 125kHz
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataRate {
    Dr0,
    Dr1,
    Dr2,
    Dr3,
    Dr4,
    Dr5,
}

impl DataRate {
    pub fn spreading_factor(self) -> u8 {
        match self {
            DataRate::Dr0 => 12,
            DataRate::Dr1 => 11,
            DataRate::Dr2 => 10,
            DataRate::Dr3 => 9,
            DataRate::Dr4 => 8,
            DataRate::Dr5 => 7,
        }
    }
}

const DEFAULT_DEV_EUI: &str = "899d2dae4edd3772";
const DEFAULT_JOIN_EUI: &str = "0000000000000000";
const DEFAULT_APP_KEY: &str = "0e69611b1c9bae4477a35c97b4274ee4";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Credentials {
    pub dev_eui: [u8; 8],
    pub join_eui: [u8; 8],
    pub app_key: [u8; 16],
}

impl Credentials {
    pub fn from_hex(dev_eui: &str, join_eui: &str, app_key: &str) -> Result<Self> {
        Ok(Self {
            dev_eui: decode_hex(dev_eui)?,
            join_eui: decode_hex(join_eui)?,
            app_key: decode_hex(app_key)?,
        })
    }

    /// Credentials from the build environment, falling back to the defaults
    pub fn from_env() -> Result<Self> {
        Self::from_hex(
            option_env!("TRACKER_DEV_EUI").unwrap_or(DEFAULT_DEV_EUI),
            option_env!("TRACKER_JOIN_EUI").unwrap_or(DEFAULT_JOIN_EUI),
            option_env!("TRACKER_APP_KEY").unwrap_or(DEFAULT_APP_KEY),
        )
    }
}

/// How often each periodic job re-arms itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub send_interval: Duration,
    pub rejoin_interval: Duration,
    pub gps_interval: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            send_interval: Duration::from_secs(30),
            rejoin_interval: Duration::from_secs(60),
            gps_interval: Duration::from_secs(2),
        }
    }
}

fn decode_hex<const N: usize>(input: &str) -> Result<[u8; N]> {
    let input = input.trim().as_bytes();
    if input.len() != N * 2 {
        return Err(Error::InvalidLength {
            expected: N,
            found: input.len() / 2,
        });
    }

    let mut out = [0u8; N];
    for (byte, pair) in out.iter_mut().zip(input.chunks_exact(2)) {
        *byte = (nibble(pair[0])? << 4) | nibble(pair[1])?;
    }
    Ok(out)
}

fn nibble(c: u8) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(Error::InvalidHex),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_credentials_decode() {
        let creds = Credentials::from_env().unwrap();
        if option_env!("TRACKER_DEV_EUI").is_none() {
            assert_eq!(
                creds.dev_eui,
                [0x89, 0x9d, 0x2d, 0xae, 0x4e, 0xdd, 0x37, 0x72]
            );
        }
        if option_env!("TRACKER_APP_KEY").is_none() {
            assert_eq!(creds.app_key[0], 0x0e);
            assert_eq!(creds.app_key[15], 0xe4);
        }
    }

    #[test]
    fn mixed_case_hex() {
        let creds =
            Credentials::from_hex("0102ABcd0102abCD", "FFFFFFFFFFFFFFFF", "00112233445566778899aabbccddeeff")
                .unwrap();
        assert_eq!(creds.dev_eui, [0x01, 0x02, 0xab, 0xcd, 0x01, 0x02, 0xab, 0xcd]);
        assert_eq!(creds.join_eui, [0xff; 8]);
        assert_eq!(creds.app_key[9], 0x99);
    }

    #[test]
    fn rejects_bad_credentials() {
        assert_eq!(
            Credentials::from_hex("0102", "0000000000000000", "00112233445566778899aabbccddeeff"),
            Err(Error::InvalidLength { expected: 8, found: 2 })
        );
        assert_eq!(
            Credentials::from_hex("zz02abcd0102abcd", "0000000000000000", "00112233445566778899aabbccddeeff"),
            Err(Error::InvalidHex)
        );
    }

    #[test]
    fn radio_defaults() {
        assert_eq!(DATA_RATE, DataRate::Dr5);
        assert_eq!(DATA_RATE.spreading_factor(), 7);
        assert_eq!(DataRate::Dr0.spreading_factor(), 12);
        assert_eq!(TX_POWER_DBM, 14);
    }

    #[test]
    fn default_timing() {
        let timing = Timing::default();
        assert_eq!(timing.send_interval.as_secs(), 30);
        assert_eq!(timing.rejoin_interval.as_secs(), 60);
        assert_eq!(timing.gps_interval.as_secs(), 2);
    }
}
