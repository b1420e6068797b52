//! Telemetry line parser
//!
//! Splits the stream body into lines and decodes each line into a
//! [`StreamEvent`].

use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::trace;

use super::types::{ShiftState, StreamError, StreamEvent, StreamResult, FIELD_COUNT};

/// Line parser state
#[derive(Debug, Default)]
pub struct LineParser {
    /// Buffer for an incomplete trailing line
    buffer: Vec<u8>,
}

impl LineParser {
    /// Create a new line parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes into the parser and decode every complete line
    pub fn feed(&mut self, bytes: Bytes) -> Vec<StreamResult<StreamEvent>> {
        let mut events = Vec::new();

        self.buffer.extend_from_slice(&bytes);

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line = self.buffer.drain(..=pos).collect::<Vec<_>>();
            events.push(decode_bytes(&line[..line.len() - 1]));
        }

        events
    }

    /// Decode a final line left without a terminating newline
    pub fn finish(&mut self) -> Option<StreamResult<StreamEvent>> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        Some(decode_bytes(&line))
    }
}

fn decode_bytes(line: &[u8]) -> StreamResult<StreamEvent> {
    // Handle \r\n line endings
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let line = String::from_utf8_lossy(line);
    decode_line(&line)
}

/// Decode one telemetry line
///
/// The field count is the only validation: a line with anything other than
/// 13 fields is a [`StreamError::BadMessage`]; a field that is empty or does
/// not decode is `None`.
pub fn decode_line(line: &str) -> StreamResult<StreamEvent> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != FIELD_COUNT {
        trace!("Telemetry line has {} fields: {:?}", fields.len(), line);
        return Err(StreamError::BadMessage {
            fields: fields.len(),
        });
    }

    Ok(StreamEvent {
        timestamp: parse::<i64>(fields[0]).and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        speed: parse(fields[1]),
        odometer: parse(fields[2]),
        soc: parse(fields[3]),
        elevation: parse(fields[4]),
        est_heading: parse(fields[5]),
        est_lat: parse(fields[6]),
        est_lng: parse(fields[7]),
        power: parse(fields[8]),
        shift_state: parse::<ShiftState>(fields[9]),
        range: parse(fields[10]),
        est_range: parse(fields[11]),
        heading: parse(fields[12]),
    })
}

fn parse<T: FromStr>(field: &str) -> Option<T> {
    if field.is_empty() {
        return None;
    }
    field.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const GOOD_LINE: &str = "1460905367,65,9550.3,88,10,76,30.493001,-100.457018,,,227,184,75";
    const BAD_LINE: &str = "1460905367    9550.3,88    76,30.493001,-100.457018,,,227,184,75";

    #[test]
    fn test_decode_good_line() {
        let event = decode_line(GOOD_LINE).unwrap();

        assert_eq!(event.timestamp.unwrap().timestamp(), 1_460_905_367);
        assert_eq!(event.speed, Some(65));
        assert_eq!(event.odometer, Some(9550.3));
        assert_eq!(event.soc, Some(88));
        assert_eq!(event.elevation, Some(10));
        assert_eq!(event.est_heading, Some(76));
        assert_eq!(event.est_lat, Some(30.493001));
        assert_eq!(event.est_lng, Some(-100.457018));
        assert_eq!(event.power, None);
        assert_eq!(event.shift_state, None);
        assert_eq!(event.range, Some(227));
        assert_eq!(event.est_range, Some(184));
        assert_eq!(event.heading, Some(75));
    }

    #[test]
    fn test_reencode_preserves_fields() {
        let event = decode_line(GOOD_LINE).unwrap();
        assert_eq!(event.to_line(), GOOD_LINE);

        let driving = "1460905400,42,9551.1,87,12,80,30.5,-100.46,-12,D,226,183,80";
        let event = decode_line(driving).unwrap();
        assert_eq!(event.shift_state, Some(ShiftState::Drive));
        assert_eq!(event.power, Some(-12));
        assert_eq!(event.to_line(), driving);
    }

    #[test]
    fn test_wrong_field_count_is_bad_message() {
        let err = decode_line(BAD_LINE).unwrap_err();
        assert!(matches!(err, StreamError::BadMessage { fields: 9 }));
        assert_eq!(err.to_string(), "bad message from API stream");

        let too_many = format!("{},1", GOOD_LINE);
        assert!(matches!(
            decode_line(&too_many),
            Err(StreamError::BadMessage { fields: 14 })
        ));
        assert!(matches!(
            decode_line(""),
            Err(StreamError::BadMessage { fields: 1 })
        ));
    }

    #[test]
    fn test_undecodable_field_is_absent() {
        let event = decode_line("1460905367,fast,9550.3,88,10,76,30.5,-100.4,,X,227,184,75").unwrap();
        assert_eq!(event.speed, None);
        assert_eq!(event.shift_state, None);
        assert_eq!(event.odometer, Some(9550.3));
    }

    #[test]
    fn test_feed_multiple_lines() {
        let mut parser = LineParser::new();
        let input = format!("{}\n{}\n{}\n", GOOD_LINE, GOOD_LINE, BAD_LINE);
        let results = parser.feed(Bytes::from(input));

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(matches!(results[2], Err(StreamError::BadMessage { .. })));
    }

    #[test]
    fn test_feed_chunked_data() {
        let mut parser = LineParser::new();

        let (head, tail) = GOOD_LINE.split_at(20);
        assert!(parser.feed(Bytes::copy_from_slice(head.as_bytes())).is_empty());

        let results = parser.feed(Bytes::from(format!("{}\r\n", tail)));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap().speed, Some(65));
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut parser = LineParser::new();
        assert!(parser.feed(Bytes::from_static(GOOD_LINE.as_bytes())).is_empty());
        assert!(parser.finish().unwrap().is_ok());
        assert!(parser.finish().is_none());
    }
}
