//! Conversions from capture values into tag-ready rationals and strings.

use chrono::{DateTime, Local, Timelike};
use exif::{Rational, SRational};

use crate::buffer::RationalStep;
use crate::error::PostprocError;

/// Framing written before the GPS processing-method text.
pub const GPS_PROCESSING_METHOD_PREFIX: [u8; 8] = *b"ASCII\0\0\0";

const FOCAL_LENGTH_PRECISION: i64 = 1000;
const ALTITUDE_PRECISION: i64 = 1000;
const SECONDS_PRECISION: i64 = 10000;

/// Builds an unsigned rational. Negative numerators and non-positive
/// denominators are rejected.
pub fn rational(num: i64, denom: i64) -> Result<Rational, PostprocError> {
    if num < 0 || denom <= 0 {
        return Err(PostprocError::invalid_argument(format!(
            "rational {}/{} out of range",
            num, denom
        )));
    }
    let num = u32::try_from(num)
        .map_err(|_| PostprocError::invalid_argument(format!("numerator {} overflows", num)))?;
    let denom = u32::try_from(denom)
        .map_err(|_| PostprocError::invalid_argument(format!("denominator {} overflows", denom)))?;
    Ok(Rational { num, denom })
}

/// Builds a signed rational. Zero denominators are rejected.
pub fn srational(num: i32, denom: i32) -> Result<SRational, PostprocError> {
    if denom == 0 {
        return Err(PostprocError::invalid_argument(format!(
            "srational {}/0 has no value",
            num
        )));
    }
    Ok(SRational { num, denom })
}

/// Focal length in millimetres at 1/1000 precision.
pub fn focal_length(value: f32) -> Result<Rational, PostprocError> {
    rational(
        (f64::from(value) * FOCAL_LENGTH_PRECISION as f64) as i64,
        FOCAL_LENGTH_PRECISION,
    )
}

/// Exposure time as `1 / raw`, or 1/60 when the sensor reported zero.
pub fn exposure_time(raw: i64) -> Result<Rational, PostprocError> {
    if raw == 0 {
        return rational(1, 60);
    }
    rational(1, raw)
}

/// Exposure bias as `compensation * step`.
pub fn exposure_bias(compensation: i32, step: RationalStep) -> Result<SRational, PostprocError> {
    let num = compensation.checked_mul(step.numerator).ok_or_else(|| {
        PostprocError::invalid_argument(format!(
            "exposure compensation {} overflows",
            compensation
        ))
    })?;
    srational(num, step.denominator)
}

/// Splits signed decimal degrees into degree, minute and second rationals.
///
/// The sign is dropped; the caller records it as a hemisphere reference.
/// Seconds keep four decimal places.
pub fn degrees_to_dms(value: f64) -> Result<[Rational; 3], PostprocError> {
    if !value.is_finite() {
        return Err(PostprocError::invalid_argument(format!(
            "coordinate {} is not finite",
            value
        )));
    }
    let value = value.abs();
    let degrees = value.trunc();
    let minutes_f = (value - degrees) * 60.0;
    let minutes = minutes_f.trunc();
    let seconds = (minutes_f - minutes) * 60.0;
    Ok([
        rational(degrees as i64, 1)?,
        rational(minutes as i64, 1)?,
        rational((seconds * SECONDS_PRECISION as f64) as i64, SECONDS_PRECISION)?,
    ])
}

/// Recombines a degree/minute/second triplet into decimal degrees.
pub fn dms_to_degrees(dms: &[Rational; 3]) -> f64 {
    dms[0].to_f64() + dms[1].to_f64() / 60.0 + dms[2].to_f64() / 3600.0
}

pub fn latitude_ref(latitude: f64) -> &'static str {
    if latitude < 0.0 {
        "S"
    } else {
        "N"
    }
}

pub fn longitude_ref(longitude: f64) -> &'static str {
    if longitude < 0.0 {
        "W"
    } else {
        "E"
    }
}

/// Altitude reference byte and magnitude: 0 above sea level, 1 below.
pub fn altitude(value: f64) -> Result<(u8, Rational), PostprocError> {
    if !value.is_finite() {
        return Err(PostprocError::invalid_argument(format!(
            "altitude {} is not finite",
            value
        )));
    }
    let reference = if value < 0.0 { 1 } else { 0 };
    let magnitude = rational(
        (value.abs() * ALTITUDE_PRECISION as f64) as i64,
        ALTITUDE_PRECISION,
    )?;
    Ok((reference, magnitude))
}

/// GPS processing method framed with its 8-byte character-code prefix
/// and a terminating NUL.
pub fn gps_processing_method(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(GPS_PROCESSING_METHOD_PREFIX.len() + text.len() + 1);
    bytes.extend_from_slice(&GPS_PROCESSING_METHOD_PREFIX);
    bytes.extend_from_slice(text.as_bytes());
    bytes.push(0);
    bytes
}

/// UTC date stamp (`YYYY:MM:DD`) and hour/minute/second rationals for a
/// GPS fix time in Unix seconds.
pub fn gps_timestamp(seconds: i64) -> Result<(String, [Rational; 3]), PostprocError> {
    let utc = DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
        PostprocError::invalid_argument(format!("gps timestamp {} out of range", seconds))
    })?;
    let date = utc.format("%Y:%m:%d").to_string();
    let time = [
        rational(i64::from(utc.hour()), 1)?,
        rational(i64::from(utc.minute()), 1)?,
        rational(i64::from(utc.second()), 1)?,
    ];
    Ok((date, time))
}

/// Local date/time (`YYYY:MM:DD HH:MM:SS`) and six-digit microseconds.
pub fn datetime_strings(now: &DateTime<Local>) -> (String, String) {
    let datetime = now.format("%Y:%m:%d %H:%M:%S").to_string();
    let subsec = format!("{:06}", now.timestamp_subsec_micros() % 1_000_000);
    (datetime, subsec)
}
