use core::fmt;

use embassy_sync::{blocking_mutex::raw::RawMutex, pipe::Pipe};
use nmea0183::{ParseResult, Parser};

/// Non-blocking source of raw GPS serial bytes
pub trait ByteSource {
    /// Next byte if one is already available
    fn read_byte(&mut self) -> Option<u8>;
}

impl ByteSource for &[u8] {
    fn read_byte(&mut self) -> Option<u8> {
        let (&byte, rest) = self.split_first()?;
        *self = rest;
        Some(byte)
    }
}

// The UART reader task fills the pipe, the poll job drains it
impl<M: RawMutex, const N: usize> ByteSource for &Pipe<M, N> {
    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.try_read(&mut byte) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Time {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub centisecond: u8,
}

impl From<&nmea0183::datetime::Time> for Time {
    fn from(time: &nmea0183::datetime::Time) -> Self {
        let second = time.seconds as u8;
        let centisecond = ((time.seconds - second as f32) * 100.0 + 0.5) as u8;
        Self {
            hour: time.hours,
            minute: time.minutes,
            second,
            centisecond: centisecond.min(99),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Date {
    pub month: u8,
    pub day: u8,
    pub year: u16,
}

/// Latest decoded GPS reading. `None` marks a field that no sentence has
/// supplied yet.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fix {
    pub location: Option<Location>,
    pub time: Option<Time>,
    pub date: Option<Date>,
}

impl fmt::Display for Fix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Location: ")?;
        match self.location {
            Some(l) => write!(f, "{:.6},{:.6}", l.latitude, l.longitude)?,
            None => f.write_str("INVALID, CAN'T REACH SATELLITE")?,
        }

        f.write_str("  Date/Time: ")?;
        match self.date {
            Some(d) => write!(f, "{}/{}/{}", d.month, d.day, d.year)?,
            None => f.write_str("INVALID")?,
        }

        f.write_str(" ")?;
        match self.time {
            Some(t) => write!(
                f,
                "{:02}:{:02}:{:02}.{:02}",
                t.hour, t.minute, t.second, t.centisecond
            ),
            None => f.write_str("INVALID"),
        }
    }
}

pub struct GpsDecoder {
    parser: Parser,
    fix: Fix,
}

impl Default for GpsDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl GpsDecoder {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
            fix: Fix::default(),
        }
    }

    pub fn fix(&self) -> &Fix {
        &self.fix
    }

    /// Feeds one byte, returning true once it completes a valid sentence
    pub fn feed(&mut self, byte: u8) -> bool {
        match self.parser.parse_from_byte(byte) {
            None => false,
            Some(Ok(result)) => {
                self.apply(result);
                true
            }
            Some(Err(e)) => {
                warn!("NMEA parse error: {}", e);
                false
            }
        }
    }

    /// Drains `serial` until a sentence completes or no bytes are left.
    /// Anything after the completed sentence stays in `serial`.
    pub fn poll<S: ByteSource>(&mut self, serial: &mut S) -> bool {
        while let Some(byte) = serial.read_byte() {
            if self.feed(byte) {
                return true;
            }
        }
        false
    }

    fn apply(&mut self, result: ParseResult) {
        match result {
            ParseResult::GGA(Some(gga)) => {
                self.fix.location = Some(Location {
                    latitude: gga.latitude.as_f64(),
                    longitude: gga.longitude.as_f64(),
                });
                self.fix.time = Some(Time::from(&gga.time));
            }
            ParseResult::RMC(Some(rmc)) => {
                self.fix.location = Some(Location {
                    latitude: rmc.latitude.as_f64(),
                    longitude: rmc.longitude.as_f64(),
                });
                self.fix.time = Some(Time::from(&rmc.datetime.time));
                self.fix.date = Some(Date {
                    month: rmc.datetime.date.month,
                    day: rmc.datetime.date.day,
                    year: rmc.datetime.date.year,
                });
            }
            _ => {
                // Sentences without a position carry no usable time either,
                // the last reading stays in place
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GGA: &[u8] = b"$GPGGA,081836.75,3725.320,N,12205.040,W,1,08,0.9,10.0,M,-30.0,M,,*64\r\n";
    const RMC: &[u8] =
        b"$GPRMC,081836.75,A,3725.320,N,12205.040,W,000.0,360.0,191026,011.3,E,A*28\r\n";
    const MUNICH_GGA: &[u8] =
        b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n";

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_input_is_a_no_op() {
        let mut gps = GpsDecoder::new();
        let mut serial: &[u8] = &[];

        assert!(!gps.poll(&mut serial));
        assert_eq!(*gps.fix(), Fix::default());
    }

    #[test]
    fn gga_sets_location_and_time() {
        let mut gps = GpsDecoder::new();
        let mut serial = GGA;

        assert!(gps.poll(&mut serial));

        let location = gps.fix().location.unwrap();
        assert!(close(location.latitude, 37.422));
        assert!(close(location.longitude, -122.084));
        assert_eq!(
            gps.fix().time,
            Some(Time {
                hour: 8,
                minute: 18,
                second: 36,
                centisecond: 75
            })
        );
        assert_eq!(gps.fix().date, None);
    }

    #[test]
    fn rmc_sets_date() {
        let mut gps = GpsDecoder::new();
        let mut serial = RMC;

        assert!(gps.poll(&mut serial));

        let date = gps.fix().date.unwrap();
        assert_eq!((date.month, date.day), (10, 19));
        assert!(gps.fix().location.is_some());
    }

    #[test]
    fn stops_after_first_complete_sentence() {
        let mut input = [0u8; 256];
        input[..GGA.len()].copy_from_slice(GGA);
        input[GGA.len()..GGA.len() + MUNICH_GGA.len()].copy_from_slice(MUNICH_GGA);
        let mut serial = &input[..GGA.len() + MUNICH_GGA.len()];

        let mut gps = GpsDecoder::new();
        assert!(gps.poll(&mut serial));
        assert_eq!(serial, MUNICH_GGA);
        assert!(close(gps.fix().location.unwrap().latitude, 37.422));

        // next tick picks up the rest
        assert!(gps.poll(&mut serial));
        assert!(serial.is_empty());
        let location = gps.fix().location.unwrap();
        assert!(close(location.latitude, 48.0 + 7.038 / 60.0));
        assert!(close(location.longitude, 11.0 + 31.0 / 60.0));
    }

    #[test]
    fn partial_sentence_waits_for_more_bytes() {
        let mut gps = GpsDecoder::new();
        let (head, tail) = GGA.split_at(20);

        let mut serial = head;
        assert!(!gps.poll(&mut serial));
        assert_eq!(gps.fix().location, None);

        let mut serial = tail;
        assert!(gps.poll(&mut serial));
        assert!(gps.fix().location.is_some());
    }

    #[test]
    fn corrupt_checksum_is_ignored() {
        let mut gps = GpsDecoder::new();
        let mut serial: &[u8] =
            b"$GPGGA,081836.75,3725.320,N,12205.040,W,1,08,0.9,10.0,M,-30.0,M,,*00\r\n";

        assert!(!gps.poll(&mut serial));
        assert_eq!(gps.fix().location, None);
    }

    #[test]
    fn no_fix_sentence_keeps_previous_location() {
        let mut gps = GpsDecoder::new();
        let mut serial = GGA;
        gps.poll(&mut serial);

        let mut serial: &[u8] = b"$GPGGA,,,,,,0,00,99.99,,,,,,*48\r\n";
        gps.poll(&mut serial);

        assert!(close(gps.fix().location.unwrap().latitude, 37.422));
    }

    #[test]
    fn no_fix_sentence_completes_without_time() {
        let mut gps = GpsDecoder::new();
        let mut serial: &[u8] = b"$GPGGA,081836.00,,,,,0,00,99.99,,,,,,*62\r\n";

        assert!(gps.poll(&mut serial));
        assert_eq!(gps.fix().time, None);
        assert_eq!(gps.fix().location, None);
    }

    #[test]
    fn fix_display_without_data() {
        assert_eq!(
            Fix::default().to_string(),
            "Location: INVALID, CAN'T REACH SATELLITE  Date/Time: INVALID INVALID"
        );
    }

    #[test]
    fn fix_display_pads_time() {
        let fix = Fix {
            location: Some(Location {
                latitude: 37.422,
                longitude: -122.084,
            }),
            time: Some(Time {
                hour: 8,
                minute: 5,
                second: 3,
                centisecond: 7,
            }),
            date: Some(Date {
                month: 10,
                day: 19,
                year: 2026,
            }),
        };
        assert_eq!(
            fix.to_string(),
            "Location: 37.422000,-122.084000  Date/Time: 10/19/2026 08:05:03.07"
        );
    }
}
