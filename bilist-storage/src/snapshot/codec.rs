//! Typed byte codec for snapshots
//!
//! Fixed-width integers are little-endian; byte strings carry a u32 length
//! prefix. The writer appends a CRC32 of everything it wrote, and the
//! reader refuses data whose checksum does not match before handing out a
//! single field.

use bytes::{Buf, BufMut, BytesMut};
use crc32fast::Hasher;

use bilist_core::{Error, Result};

/// Accumulates snapshot fields and seals them with a checksum
#[derive(Default)]
pub struct SnapshotWriter {
    buf: BytesMut,
}

impl SnapshotWriter {
    /// Creates an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw bytes without a length prefix (framing fields)
    pub fn put_raw(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// Appends an unsigned 64-bit field
    pub fn put_unsigned(&mut self, value: u64) {
        self.buf.put_u64_le(value);
    }

    /// Appends a signed 64-bit field
    pub fn put_signed(&mut self, value: i64) {
        self.buf.put_i64_le(value);
    }

    /// Appends a length-prefixed byte string
    pub fn put_bytes(&mut self, data: &[u8]) {
        self.buf.put_u32_le(data.len() as u32);
        self.buf.put_slice(data);
    }

    /// Seals the snapshot: returns the fields followed by their CRC32
    pub fn finish(self) -> Vec<u8> {
        let mut hasher = Hasher::new();
        hasher.update(&self.buf);
        let checksum = hasher.finalize();

        let mut out = self.buf.to_vec();
        out.extend_from_slice(&checksum.to_le_bytes());
        out
    }
}

/// Reads snapshot fields back out of a checksummed byte slice
pub struct SnapshotReader<'a> {
    data: &'a [u8],
}

impl<'a> SnapshotReader<'a> {
    /// Verifies the trailing checksum and positions at the first field
    ///
    /// # Errors
    ///
    /// Returns `Error::Corruption` if the data is too small to carry a
    /// checksum or the checksum does not match.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::Corruption("snapshot too small".to_string()));
        }

        let (fields, trailer) = data.split_at(data.len() - 4);
        let expected = u32::from_le_bytes(trailer.try_into().expect("4-byte trailer"));

        let mut hasher = Hasher::new();
        hasher.update(fields);
        if hasher.finalize() != expected {
            return Err(Error::Corruption("snapshot checksum mismatch".to_string()));
        }

        Ok(Self { data: fields })
    }

    /// Reads `len` raw bytes (framing fields)
    pub fn get_raw(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.data.len() < len {
            return Err(Error::Corruption("snapshot truncated".to_string()));
        }
        let (head, rest) = self.data.split_at(len);
        self.data = rest;
        Ok(head)
    }

    /// Reads an unsigned 64-bit field
    pub fn get_unsigned(&mut self) -> Result<u64> {
        if self.data.len() < 8 {
            return Err(Error::Corruption("snapshot truncated".to_string()));
        }
        Ok(self.data.get_u64_le())
    }

    /// Reads a signed 64-bit field
    pub fn get_signed(&mut self) -> Result<i64> {
        if self.data.len() < 8 {
            return Err(Error::Corruption("snapshot truncated".to_string()));
        }
        Ok(self.data.get_i64_le())
    }

    /// Reads a length-prefixed byte string
    pub fn get_bytes(&mut self) -> Result<&'a [u8]> {
        if self.data.len() < 4 {
            return Err(Error::Corruption("snapshot truncated".to_string()));
        }
        let len = self.data.get_u32_le() as usize;
        self.get_raw(len)
    }

    /// Returns the number of unread field bytes
    pub fn remaining(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_round_trip() {
        let mut writer = SnapshotWriter::new();
        writer.put_raw(b"hdr");
        writer.put_unsigned(u64::MAX);
        writer.put_signed(-12_345);
        writer.put_bytes(b"payload");
        writer.put_bytes(b"");

        let data = writer.finish();
        let mut reader = SnapshotReader::new(&data).unwrap();

        assert_eq!(reader.get_raw(3).unwrap(), b"hdr");
        assert_eq!(reader.get_unsigned().unwrap(), u64::MAX);
        assert_eq!(reader.get_signed().unwrap(), -12_345);
        assert_eq!(reader.get_bytes().unwrap(), b"payload");
        assert_eq!(reader.get_bytes().unwrap(), b"");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_corruption_detection() {
        let mut writer = SnapshotWriter::new();
        writer.put_unsigned(7);
        let mut data = writer.finish();

        data[3] ^= 0xFF;
        assert!(matches!(
            SnapshotReader::new(&data),
            Err(bilist_core::Error::Corruption(_))
        ));
    }

    #[test]
    fn test_truncated_reads_fail() {
        let mut writer = SnapshotWriter::new();
        writer.put_unsigned(7);
        let data = writer.finish();

        let mut reader = SnapshotReader::new(&data).unwrap();
        reader.get_unsigned().unwrap();
        assert!(reader.get_unsigned().is_err());
        assert!(reader.get_bytes().is_err());
    }

    #[test]
    fn test_declared_length_beyond_data_fails() {
        let mut writer = SnapshotWriter::new();
        writer.put_bytes(b"abc");
        let mut data = writer.finish();

        // Inflate the declared string length, keeping the checksum honest.
        data.truncate(data.len() - 4);
        data[0] = 200;
        let mut hasher = Hasher::new();
        hasher.update(&data);
        let checksum = hasher.finalize();
        data.extend_from_slice(&checksum.to_le_bytes());

        let mut reader = SnapshotReader::new(&data).unwrap();
        assert!(reader.get_bytes().is_err());
    }
}
