//! Fixed 28-byte record header: magic, format version, flags, a reserved
//! pad, the write timestamp, the batch sequence number, and the payload
//! length. Grounded on `original_source/.../telemetrylog/header.go`.

pub const MAGIC: u32 = 0x544C_5942; // "TLYB"
pub const FORMAT_VERSION: u8 = 1;

const MAGIC_LEN: usize = 4;
const VERSION_LEN: usize = 1;
const FLAGS_LEN: usize = 1;
const RESERVED_LEN: usize = 2;
const TIMESTAMP_LEN: usize = 8;
const SEQ_LEN: usize = 8;
const PAYLOAD_LEN_LEN: usize = 4;

pub const HEADER_LEN: usize =
    MAGIC_LEN + VERSION_LEN + FLAGS_LEN + RESERVED_LEN + TIMESTAMP_LEN + SEQ_LEN + PAYLOAD_LEN_LEN;
pub const CRC_LEN: usize = 4;

const OFF_MAGIC: usize = 0;
const OFF_VERSION: usize = OFF_MAGIC + MAGIC_LEN;
const OFF_FLAGS: usize = OFF_VERSION + VERSION_LEN;
const OFF_RESERVED: usize = OFF_FLAGS + FLAGS_LEN;
const OFF_TIMESTAMP: usize = OFF_RESERVED + RESERVED_LEN;
const OFF_SEQ: usize = OFF_TIMESTAMP + TIMESTAMP_LEN;
const OFF_PAYLOAD_LEN: usize = OFF_SEQ + SEQ_LEN;

#[derive(Debug, Clone, Copy)]
pub struct RecordHeader {
    pub version: u8,
    pub flags: u8,
    pub timestamp: i64,
    pub seq: u64,
    pub payload_len: u32,
}

impl RecordHeader {
    pub fn encode(&self, buf: &mut [u8; HEADER_LEN]) {
        buf[OFF_MAGIC..OFF_VERSION].copy_from_slice(&MAGIC.to_le_bytes());
        buf[OFF_VERSION] = self.version;
        buf[OFF_FLAGS] = self.flags;
        buf[OFF_RESERVED..OFF_TIMESTAMP].copy_from_slice(&[0, 0]);
        buf[OFF_TIMESTAMP..OFF_SEQ].copy_from_slice(&(self.timestamp as u64).to_le_bytes());
        buf[OFF_SEQ..OFF_PAYLOAD_LEN].copy_from_slice(&self.seq.to_le_bytes());
        buf[OFF_PAYLOAD_LEN..HEADER_LEN].copy_from_slice(&self.payload_len.to_le_bytes());
    }

    /// Decode a header buffer, distinguishing "not our magic / wrong
    /// version" (treated as corruption by the caller) from a well-formed
    /// record.
    pub fn decode(buf: &[u8; HEADER_LEN]) -> Option<Self> {
        let magic = u32::from_le_bytes(buf[OFF_MAGIC..OFF_VERSION].try_into().unwrap());
        if magic != MAGIC {
            return None;
        }
        let version = buf[OFF_VERSION];
        if version != FORMAT_VERSION {
            return None;
        }
        Some(Self {
            version,
            flags: buf[OFF_FLAGS],
            timestamp: u64::from_le_bytes(buf[OFF_TIMESTAMP..OFF_SEQ].try_into().unwrap()) as i64,
            seq: u64::from_le_bytes(buf[OFF_SEQ..OFF_PAYLOAD_LEN].try_into().unwrap()),
            payload_len: u32::from_le_bytes(buf[OFF_PAYLOAD_LEN..HEADER_LEN].try_into().unwrap()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrips() {
        let h = RecordHeader {
            version: FORMAT_VERSION,
            flags: 0,
            timestamp: 123_456,
            seq: 7,
            payload_len: 42,
        };
        let mut buf = [0u8; HEADER_LEN];
        h.encode(&mut buf);
        let decoded = RecordHeader::decode(&buf).unwrap();
        assert_eq!(decoded.timestamp, h.timestamp);
        assert_eq!(decoded.seq, h.seq);
        assert_eq!(decoded.payload_len, h.payload_len);
    }

    #[test]
    fn header_rejects_bad_magic() {
        let buf = [0xffu8; HEADER_LEN];
        assert!(RecordHeader::decode(&buf).is_none());
    }
}
