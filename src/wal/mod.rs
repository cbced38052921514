//! Write-ahead log for telemetry batches: `[header(28B) | payload | CRC32(4B)]`
//! records appended sequentially to a single file.
//!
//! Not safe for concurrent use — callers serialize writes, typically by
//! owning the [`Wal`] behind a `parking_lot::Mutex` and running `append`
//! inside `spawn_blocking` so the fsync never blocks the async runtime.
//!
//! Grounded on `original_source/.../telemetrylog/log.go`.

pub mod header;
pub mod reader;

use crate::domain::Reading;
use crate::error::WalError;
use crate::wire;
use header::{RecordHeader, CRC_LEN, HEADER_LEN};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::SystemTime;

pub use reader::BatchReader;

pub struct Wal {
    file: File,
    seq: u64,
    closed: bool,
}

impl Wal {
    /// Open (creating if absent) the log at `path`, recovering by
    /// truncating at the first short read, bad magic/version, torn tail,
    /// or CRC mismatch.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WalError> {
        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path)?;

        let seq = recover(&mut file)?;
        file.seek(SeekFrom::End(0))?;

        Ok(Self {
            file,
            seq,
            closed: false,
        })
    }

    /// Append a batch as one record: header, payload, CRC32 over both.
    pub fn append(&mut self, readings: &[Reading]) -> Result<(), WalError> {
        if self.closed {
            return Err(WalError::LogClosed);
        }

        let mut payload = Vec::with_capacity(wire::encoded_len(readings));
        wire::encode_readings(readings, &mut payload);

        if payload.len() > u32::MAX as usize {
            return Err(WalError::BatchTooLarge);
        }

        let header = RecordHeader {
            version: header::FORMAT_VERSION,
            flags: 0,
            timestamp: Timestamp::now_nanos(),
            seq: self.seq,
            payload_len: payload.len() as u32,
        };

        let mut record = Vec::with_capacity(HEADER_LEN + payload.len() + CRC_LEN);
        let mut header_buf = [0u8; HEADER_LEN];
        header.encode(&mut header_buf);
        record.extend_from_slice(&header_buf);
        record.extend_from_slice(&payload);

        let mut crc = crc32fast::Hasher::new();
        crc.update(&record);
        record.extend_from_slice(&crc.finalize().to_le_bytes());

        self.file.write_all(&record)?;
        self.file.sync_all()?;

        self.seq += 1;
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), WalError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.file.flush()?;
        Ok(())
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Epoch-nanosecond timestamp helper, kept local to avoid pulling
/// `domain::Timestamp` (which targets reading values, not record headers)
/// into the log format.
struct Timestamp;

impl Timestamp {
    fn now_nanos() -> i64 {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0)
    }
}

/// Scan the log from the start, truncating at the first sign of a
/// partial or corrupted record. Returns the sequence number to resume
/// appending at (i.e. one past the last good record).
fn recover(file: &mut File) -> Result<u64, WalError> {
    let size = file.metadata()?.len();
    let mut offset: u64 = 0;
    let mut seq: u64 = 0;

    loop {
        if offset + (HEADER_LEN + CRC_LEN) as u64 > size {
            break;
        }

        let mut header_buf = [0u8; HEADER_LEN];
        file.seek(SeekFrom::Start(offset))?;
        if file.read_exact(&mut header_buf).is_err() {
            file.set_len(offset)?;
            break;
        }

        let hdr = match RecordHeader::decode(&header_buf) {
            Some(h) => h,
            None => {
                file.set_len(offset)?;
                break;
            }
        };

        let record_len = HEADER_LEN as u64 + hdr.payload_len as u64 + CRC_LEN as u64;
        if offset + record_len > size {
            file.set_len(offset)?;
            break;
        }

        let mut payload = vec![0u8; hdr.payload_len as usize];
        if file.read_exact(&mut payload).is_err() {
            file.set_len(offset)?;
            break;
        }

        let mut crc_buf = [0u8; CRC_LEN];
        if file.read_exact(&mut crc_buf).is_err() {
            file.set_len(offset)?;
            break;
        }
        let stored_crc = u32::from_le_bytes(crc_buf);

        let mut crc = crc32fast::Hasher::new();
        crc.update(&header_buf);
        crc.update(&payload);
        if crc.finalize() != stored_crc {
            file.set_len(offset)?;
            break;
        }

        offset += record_len;
        seq += 1;
    }

    Ok(seq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;
    use tempfile::NamedTempFile;

    fn reading(name: &str, v: f64) -> Reading {
        Reading::new(name, v, SystemTime::now()).unwrap()
    }

    #[test]
    fn appends_and_recovers_full_batches() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();

        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&[reading("s1", 1.0), reading("s2", 2.0)])
                .unwrap();
            wal.append(&[reading("s3", 3.0)]).unwrap();
            assert_eq!(wal.seq(), 2);
        }

        let wal = Wal::open(&path).unwrap();
        assert_eq!(wal.seq(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn creates_log_file_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.wal");

        let _wal = Wal::open(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn truncates_a_torn_tail_on_open() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();

        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&[reading("s1", 1.0)]).unwrap();
        }

        // Simulate a crash mid-write: append a truncated second record.
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[0xAA; HEADER_LEN + 3]).unwrap();
        }

        let wal = Wal::open(&path).unwrap();
        assert_eq!(wal.seq(), 1);

        // Recovery truncated the torn tail away: exactly one good record remains.
        let len = std::fs::metadata(&path).unwrap().len();
        assert!(len > 0 && len < (HEADER_LEN * 2 + CRC_LEN * 2) as u64);
    }

    #[test]
    fn rejects_append_after_close() {
        let tmp = NamedTempFile::new().unwrap();
        let mut wal = Wal::open(tmp.path()).unwrap();
        wal.close().unwrap();
        assert!(matches!(
            wal.append(&[reading("s1", 1.0)]),
            Err(WalError::LogClosed)
        ));
    }
}
