//! Wire format of the position uplink.
//!
//! Sixteen bytes: latitude then longitude, each an IEEE-754 `f64` in
//! little-endian order. postcard writes floats as fixed little-endian bytes,
//! so a plain struct of two `f64` serializes to exactly this layout.

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const PAYLOAD_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

pub fn encode(position: &Position) -> Result<[u8; PAYLOAD_LEN]> {
    let mut buff = [0u8; PAYLOAD_LEN];
    let used = postcard::to_slice(position, &mut buff)?.len();
    debug_assert_eq!(used, PAYLOAD_LEN);
    Ok(buff)
}

/// Network side decoding of an uplink, as done by the LNS payload decoder.
/// Trailing bytes are ignored.
pub fn decode_uplink(bytes: &[u8]) -> Option<Position> {
    postcard::from_bytes(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_two_le_doubles() {
        let position = Position {
            latitude: 37.422,
            longitude: -122.084,
        };
        let buff = encode(&position).unwrap();

        assert_eq!(&buff[..8], &37.422_f64.to_le_bytes());
        assert_eq!(&buff[8..], &(-122.084_f64).to_le_bytes());
    }

    #[test]
    fn round_trip_is_bit_exact() {
        let awkward = [
            (0.0, -0.0),
            (90.0, -180.0),
            (-33.868820123456789, 151.209296987654321),
            (f64::MIN_POSITIVE, f64::EPSILON),
        ];

        for (latitude, longitude) in awkward {
            let buff = encode(&Position { latitude, longitude }).unwrap();
            let lat = f64::from_le_bytes(buff[..8].try_into().unwrap());
            let lng = f64::from_le_bytes(buff[8..].try_into().unwrap());
            assert_eq!(lat.to_bits(), latitude.to_bits());
            assert_eq!(lng.to_bits(), longitude.to_bits());
        }
    }

    #[test]
    fn decoder_matches_encoder() {
        let position = Position {
            latitude: 48.1173,
            longitude: 11.516666666666667,
        };
        let buff = encode(&position).unwrap();
        assert_eq!(decode_uplink(&buff), Some(position));
    }

    #[test]
    fn decoder_rejects_short_payload() {
        assert_eq!(decode_uplink(&[0u8; 12]), None);
        assert_eq!(decode_uplink(&[]), None);
    }
}
