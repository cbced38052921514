//! Binary encoding for telemetry readings: `u64 ts-ns | u8 name-len | name
//! bytes | u64 value-bits`, no padding. Shared by the WAL payload format
//! and the streaming transport's wire frames.
//!
//! Grounded on `original_source/.../telemetrylog/marshal.go`.

use crate::domain::{Reading, SensorNameError, Timestamp, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated reading: expected more bytes than available")]
    Truncated,
    #[error("invalid sensor name in encoded reading: {0}")]
    InvalidSensorName(#[from] SensorNameError),
}

/// Append the wire encoding of `readings` to `buf`.
pub fn encode_readings(readings: &[Reading], buf: &mut Vec<u8>) {
    for r in readings {
        encode_reading(r, buf);
    }
}

pub fn encode_reading(r: &Reading, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&(r.timestamp.as_nanos() as u64).to_le_bytes());
    let name = r.sensor.as_str().as_bytes();
    buf.push(name.len() as u8);
    buf.extend_from_slice(name);
    buf.extend_from_slice(&r.value.to_bits().to_le_bytes());
}

/// Total encoded size of `readings`, without allocating.
pub fn encoded_len(readings: &[Reading]) -> usize {
    readings
        .iter()
        .map(|r| 8 + 1 + r.sensor.as_str().len() + 8)
        .sum()
}

/// Decode a concatenated sequence of encoded readings.
pub fn decode_readings(buf: &[u8]) -> Result<Vec<Reading>, DecodeError> {
    let mut readings = Vec::new();
    let mut i = 0;

    while i < buf.len() {
        if i + 8 > buf.len() {
            return Err(DecodeError::Truncated);
        }
        let ts = i64::from_le_bytes(buf[i..i + 8].try_into().unwrap());
        i += 8;

        if i >= buf.len() {
            return Err(DecodeError::Truncated);
        }
        let name_len = buf[i] as usize;
        i += 1;
        if i + name_len > buf.len() {
            return Err(DecodeError::Truncated);
        }
        let name = String::from_utf8_lossy(&buf[i..i + name_len]).into_owned();
        i += name_len;

        if i + 8 > buf.len() {
            return Err(DecodeError::Truncated);
        }
        let value_bits = u64::from_le_bytes(buf[i..i + 8].try_into().unwrap());
        i += 8;

        readings.push(Reading {
            sensor: crate::domain::SensorName::new(name)?,
            value: Value::new(f64::from_bits(value_bits)),
            timestamp: Timestamp::from_nanos(ts),
        });
    }

    Ok(readings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    #[test]
    fn roundtrips_a_batch() {
        let readings = vec![
            Reading::new("s1", 1.5, SystemTime::now()).unwrap(),
            Reading::new("s2", f64::NAN, SystemTime::now()).unwrap(),
            Reading::new("s3", -0.0, SystemTime::now()).unwrap(),
        ];

        let mut buf = Vec::new();
        encode_readings(&readings, &mut buf);
        assert_eq!(buf.len(), encoded_len(&readings));

        let decoded = decode_readings(&buf).unwrap();
        assert_eq!(decoded.len(), readings.len());
        for (a, b) in readings.iter().zip(decoded.iter()) {
            assert_eq!(a.sensor, b.sensor);
            assert_eq!(a.timestamp, b.timestamp);
            assert_eq!(a.value.to_bits(), b.value.to_bits());
        }
    }

    #[test]
    fn decode_rejects_truncated_input() {
        let readings = vec![Reading::new("sensor", 1.0, SystemTime::now()).unwrap()];
        let mut buf = Vec::new();
        encode_readings(&readings, &mut buf);
        buf.truncate(buf.len() - 1);
        assert_eq!(decode_readings(&buf).unwrap_err(), DecodeError::Truncated);
    }
}
