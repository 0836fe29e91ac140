//! Polyline representation for leg geometries.
//!
//! Geometry travels through the planner and the stores in the compact
//! encoded-polyline format (precision 1e-5) exactly as routing providers
//! return it. [`Polyline`] is the decoded form for consumers that need the
//! coordinates, and decoding is also how provider geometry is validated.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const PRECISION: f64 = 1e5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolylineError {
    #[error("invalid polyline character at byte {0}")]
    InvalidCharacter(usize),
    #[error("polyline ends in the middle of a value")]
    Truncated,
}

/// A polyline representing a route geometry as decoded coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<(f64, f64)>,
}

impl Polyline {
    /// Creates a new Polyline from decoded coordinate points.
    ///
    /// Each point is a (latitude, longitude) tuple.
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Decode an encoded polyline string.
    pub fn decode(encoded: &str) -> Result<Self, PolylineError> {
        let bytes = encoded.as_bytes();
        let mut index = 0;
        let mut lat = 0i64;
        let mut lng = 0i64;
        let mut points = Vec::new();

        while index < bytes.len() {
            lat += next_value(bytes, &mut index)?;
            if index >= bytes.len() {
                return Err(PolylineError::Truncated);
            }
            lng += next_value(bytes, &mut index)?;
            points.push((lat as f64 / PRECISION, lng as f64 / PRECISION));
        }

        Ok(Self { points })
    }

    /// Encode to the compact string format.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        let mut prev_lat = 0i64;
        let mut prev_lng = 0i64;
        for &(lat, lng) in &self.points {
            let lat = (lat * PRECISION).round() as i64;
            let lng = (lng * PRECISION).round() as i64;
            push_value(&mut out, lat - prev_lat);
            push_value(&mut out, lng - prev_lng);
            prev_lat = lat;
            prev_lng = lng;
        }
        out
    }
}

fn next_value(bytes: &[u8], index: &mut usize) -> Result<i64, PolylineError> {
    let mut result = 0i64;
    let mut shift = 0;
    loop {
        let Some(&byte) = bytes.get(*index) else {
            return Err(PolylineError::Truncated);
        };
        let chunk = i64::from(byte) - 63;
        if !(0..64).contains(&chunk) || shift > 60 {
            return Err(PolylineError::InvalidCharacter(*index));
        }
        *index += 1;
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }
    Ok(if result & 1 == 1 { !(result >> 1) } else { result >> 1 })
}

fn push_value(out: &mut String, delta: i64) {
    let mut value = if delta < 0 { !(delta << 1) } else { delta << 1 };
    while value >= 0x20 {
        out.push(char::from((0x20 | (value & 0x1f)) as u8 + 63));
        value >>= 5;
    }
    out.push(char::from(value as u8 + 63));
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE: &str = "_p~iF~ps|U_ulLnnqC_mqNvxq`@";

    #[test]
    fn test_decode_reference_polyline() {
        let polyline = Polyline::decode(REFERENCE).unwrap();
        assert_eq!(
            polyline.points(),
            &[(38.5, -120.2), (40.7, -120.95), (43.252, -126.453)][..]
        );
    }

    #[test]
    fn test_encode_reference_polyline() {
        let polyline = Polyline::new(vec![(38.5, -120.2), (40.7, -120.95), (43.252, -126.453)]);
        assert_eq!(polyline.encode(), REFERENCE);
    }

    #[test]
    fn test_empty_polyline() {
        assert!(Polyline::decode("").unwrap().points().is_empty());
        assert_eq!(Polyline::new(vec![]).encode(), "");
    }

    #[test]
    fn test_truncated_polyline_rejected() {
        assert_eq!(Polyline::decode("_p~iF"), Err(PolylineError::Truncated));
        assert_eq!(Polyline::decode("_p~iF~ps|"), Err(PolylineError::Truncated));
    }

    #[test]
    fn test_invalid_character_rejected() {
        assert_eq!(Polyline::decode("_p~iF ps|U"), Err(PolylineError::InvalidCharacter(5)));
    }
}
