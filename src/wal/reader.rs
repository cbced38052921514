//! Snapshot reader over a telemetry log: sees the file as it was at open
//! time, oblivious to appends made afterward.
//!
//! Grounded on `original_source/.../telemetrylog/reader.go`.

use crate::domain::Reading;
use crate::error::WalError;
use crate::wire;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use super::header::{RecordHeader, CRC_LEN, HEADER_LEN};

pub struct BatchReader {
    file: File,
    offset: u64,
    size: u64,
}

impl BatchReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WalError> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file,
            offset: 0,
            size,
        })
    }

    /// Read the next batch, or `Ok(None)` at end of the snapshot.
    pub fn next_batch(&mut self) -> Result<Option<Vec<Reading>>, WalError> {
        if self.offset >= self.size {
            return Ok(None);
        }

        let mut header_buf = [0u8; HEADER_LEN];
        self.file.seek(SeekFrom::Start(self.offset))?;
        match self.file.read_exact(&mut header_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let hdr = RecordHeader::decode(&header_buf).ok_or(WalError::CorruptLog)?;
        let record_len = HEADER_LEN as u64 + hdr.payload_len as u64 + CRC_LEN as u64;
        if self.offset + record_len > self.size {
            return Err(WalError::PartialBatch);
        }

        let mut payload = vec![0u8; hdr.payload_len as usize];
        self.file.read_exact(&mut payload)?;

        let mut crc_buf = [0u8; CRC_LEN];
        self.file.read_exact(&mut crc_buf)?;
        let stored_crc = u32::from_le_bytes(crc_buf);

        let mut crc = crc32fast::Hasher::new();
        crc.update(&header_buf);
        crc.update(&payload);
        if crc.finalize() != stored_crc {
            return Err(WalError::CorruptLog);
        }

        self.offset += record_len;
        Ok(Some(wire::decode_readings(&payload)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::Wal;
    use std::time::SystemTime;
    use tempfile::NamedTempFile;

    fn reading(name: &str, v: f64) -> Reading {
        Reading::new(name, v, SystemTime::now()).unwrap()
    }

    #[test]
    fn reads_batches_written_before_open() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();

        let mut wal = Wal::open(&path).unwrap();
        wal.append(&[reading("s1", 1.0), reading("s2", 2.0)])
            .unwrap();
        wal.append(&[reading("s3", 3.0)]).unwrap();

        let mut reader = BatchReader::open(&path).unwrap();
        let first = reader.next_batch().unwrap().unwrap();
        assert_eq!(first.len(), 2);
        let second = reader.next_batch().unwrap().unwrap();
        assert_eq!(second.len(), 1);
        assert!(reader.next_batch().unwrap().is_none());
    }

    #[test]
    fn snapshot_is_blind_to_later_appends() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();

        let mut wal = Wal::open(&path).unwrap();
        wal.append(&[reading("s1", 1.0)]).unwrap();

        let mut reader = BatchReader::open(&path).unwrap();
        wal.append(&[reading("s2", 2.0)]).unwrap();

        assert_eq!(reader.next_batch().unwrap().unwrap().len(), 1);
        assert!(reader.next_batch().unwrap().is_none());
    }
}
