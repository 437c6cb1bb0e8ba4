//! Encoded polyline codec (signed deltas, 5-bit groups, ASCII offset 63).
//!
//! Coordinates are `(latitude, longitude)` pairs. Precision 5 is the classic
//! format; some directions providers also emit precision 6.

use thiserror::Error;

use crate::types::TrackPoint;

pub const DEFAULT_PRECISION: u32 = 5;

const CHUNK_MASK: u64 = 0x1f;
const CONTINUATION_BIT: u64 = 0x20;
const ASCII_OFFSET: u8 = 63;
// 13 groups of 5 bits cover a full 64-bit value
const MAX_SHIFT: u32 = 60;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("polyline ends inside a value starting at byte {position}")]
    Truncated { position: usize },

    #[error("invalid polyline character {byte:#04x} at byte {position}")]
    InvalidCharacter { position: usize, byte: u8 },

    #[error("latitude at byte {position} has no matching longitude")]
    MissingLongitude { position: usize },

    #[error("value starting at byte {position} overflows 64 bits")]
    Overflow { position: usize },
}

fn factor(precision: u32) -> f64 {
    10f64.powi(precision as i32)
}

/// Read one zig-zag encoded delta starting at `*index`, advancing it.
fn read_delta(bytes: &[u8], index: &mut usize) -> Result<i64, DecodeError> {
    let start = *index;
    let mut result: u64 = 0;
    let mut shift: u32 = 0;

    loop {
        let Some(&byte) = bytes.get(*index) else {
            return Err(DecodeError::Truncated { position: start });
        };
        if !(ASCII_OFFSET..=126).contains(&byte) {
            return Err(DecodeError::InvalidCharacter {
                position: *index,
                byte,
            });
        }
        if shift > MAX_SHIFT {
            return Err(DecodeError::Overflow { position: start });
        }
        *index += 1;

        let chunk = u64::from(byte - ASCII_OFFSET);
        result |= (chunk & CHUNK_MASK) << shift;
        shift += 5;

        if chunk & CONTINUATION_BIT == 0 {
            break;
        }
    }

    let magnitude = (result >> 1) as i64;
    Ok(if result & 1 == 1 { !magnitude } else { magnitude })
}

pub fn decode(encoded: &str) -> Result<Vec<(f64, f64)>, DecodeError> {
    decode_with_precision(encoded, DEFAULT_PRECISION)
}

/// Decode into `(lat, lon)` pairs, accumulating both axes independently.
pub fn decode_with_precision(encoded: &str, precision: u32) -> Result<Vec<(f64, f64)>, DecodeError> {
    let bytes = encoded.as_bytes();
    let factor = factor(precision);
    let mut coordinates = Vec::with_capacity(bytes.len() / 4);
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lon: i64 = 0;

    while index < bytes.len() {
        let lat_start = index;
        lat = lat
            .checked_add(read_delta(bytes, &mut index)?)
            .ok_or(DecodeError::Overflow { position: lat_start })?;
        if index >= bytes.len() {
            return Err(DecodeError::MissingLongitude { position: lat_start });
        }
        let lon_start = index;
        lon = lon
            .checked_add(read_delta(bytes, &mut index)?)
            .ok_or(DecodeError::Overflow { position: lon_start })?;
        coordinates.push((lat as f64 / factor, lon as f64 / factor));
    }

    Ok(coordinates)
}

/// Decode straight into route points. Decoded geometry carries no timestamps.
pub fn decode_track(encoded: &str, precision: u32) -> Result<Vec<TrackPoint>, DecodeError> {
    Ok(decode_with_precision(encoded, precision)?
        .into_iter()
        .map(|(lat, lon)| TrackPoint::new(lat, lon))
        .collect())
}

fn write_delta(delta: i64, out: &mut String) {
    let mut value = ((delta << 1) ^ (delta >> 63)) as u64;
    while value >= CONTINUATION_BIT {
        out.push(((CONTINUATION_BIT | (value & CHUNK_MASK)) as u8 + ASCII_OFFSET) as char);
        value >>= 5;
    }
    out.push((value as u8 + ASCII_OFFSET) as char);
}

pub fn encode(coordinates: &[(f64, f64)]) -> String {
    encode_with_precision(coordinates, DEFAULT_PRECISION)
}

pub fn encode_with_precision(coordinates: &[(f64, f64)], precision: u32) -> String {
    let factor = factor(precision);
    let mut out = String::with_capacity(coordinates.len() * 8);
    let mut prev_lat: i64 = 0;
    let mut prev_lon: i64 = 0;

    for &(lat, lon) in coordinates {
        let lat = (lat * factor).round() as i64;
        let lon = (lon * factor).round() as i64;
        write_delta(lat - prev_lat, &mut out);
        write_delta(lon - prev_lon, &mut out);
        prev_lat = lat;
        prev_lon = lon;
    }

    out
}
