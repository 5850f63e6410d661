//! Binary record codec.
//!
//! All fixed-width integers are big-endian and variable-length byte strings
//! carry a u32 length prefix, so every record has exactly one encoding and
//! keys sort in numeric order. Decode failures surface as
//! [`StoreError::Codec`] with the field that failed.

use rollupindex_merkle::Hash32;

use crate::error::StoreError;
use crate::schema::Address;

/// Append-only encoder.
#[derive(Debug, Default)]
pub struct Sink {
    buf: Vec<u8>,
}

impl Sink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    pub fn write_u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn write_u64(&mut self, v: u64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn write_address(&mut self, a: &Address) -> &mut Self {
        self.buf.extend_from_slice(&a.0);
        self
    }

    pub fn write_hash(&mut self, h: &Hash32) -> &mut Self {
        self.buf.extend_from_slice(&h.0);
        self
    }

    /// Arbitrary bytes with a u32 length prefix.
    pub fn write_var_bytes(&mut self, b: &[u8]) -> &mut Self {
        self.write_u32(b.len() as u32);
        self.buf.extend_from_slice(b);
        self
    }

    /// Raw bytes, no prefix. For fixed-layout tails only.
    pub fn write_raw(&mut self, b: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(b);
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }
}

/// Zero-copy decoder over an encoded record.
pub struct Source<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Source<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], StoreError> {
        if self.remaining() < n {
            return Err(StoreError::codec(
                context,
                format!("need {} bytes, {} left", n, self.remaining()),
            ));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_u32(&mut self, context: &'static str) -> Result<u32, StoreError> {
        let b = self.take(4, context)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(b);
        Ok(u32::from_be_bytes(raw))
    }

    pub fn read_u64(&mut self, context: &'static str) -> Result<u64, StoreError> {
        let b = self.take(8, context)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_be_bytes(raw))
    }

    pub fn read_address(&mut self, context: &'static str) -> Result<Address, StoreError> {
        let b = self.take(20, context)?;
        let mut raw = [0u8; 20];
        raw.copy_from_slice(b);
        Ok(Address(raw))
    }

    pub fn read_hash(&mut self, context: &'static str) -> Result<Hash32, StoreError> {
        let b = self.take(32, context)?;
        let mut raw = [0u8; 32];
        raw.copy_from_slice(b);
        Ok(Hash32(raw))
    }

    /// Exactly `n` raw bytes, no prefix.
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], StoreError> {
        self.take(n, context)
    }

    pub fn read_var_bytes(&mut self, context: &'static str) -> Result<Vec<u8>, StoreError> {
        let len = self.read_u32(context)? as usize;
        Ok(self.take(len, context)?.to_vec())
    }
}

/// A record that round-trips through the binary codec.
pub trait Record: Sized {
    fn encode(&self, sink: &mut Sink);

    fn decode(source: &mut Source<'_>) -> Result<Self, StoreError>;

    fn to_bytes(&self) -> Vec<u8> {
        let mut sink = Sink::new();
        self.encode(&mut sink);
        sink.into_bytes()
    }

    fn from_bytes(data: &[u8]) -> Result<Self, StoreError> {
        let mut source = Source::new(data);
        Self::decode(&mut source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_big_endian() {
        let mut sink = Sink::new();
        sink.write_u64(0x0102030405060708).write_u32(0xAABBCCDD);
        assert_eq!(
            sink.bytes(),
            &[1, 2, 3, 4, 5, 6, 7, 8, 0xAA, 0xBB, 0xCC, 0xDD]
        );
    }

    #[test]
    fn var_bytes_roundtrip() {
        let mut sink = Sink::new();
        sink.write_var_bytes(b"hello").write_u64(7);
        let data = sink.into_bytes();
        let mut src = Source::new(&data);
        assert_eq!(src.read_var_bytes("payload").unwrap(), b"hello");
        assert_eq!(src.read_u64("tail").unwrap(), 7);
        assert!(src.is_empty());
    }

    #[test]
    fn truncated_read_names_field() {
        let mut src = Source::new(&[0, 0, 0]);
        let err = src.read_u64("queue_index").unwrap_err();
        match err {
            StoreError::Codec { context, .. } => assert_eq!(context, "queue_index"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn var_bytes_length_beyond_input_rejected() {
        // Claims 100 bytes of payload but carries 2.
        let mut data = vec![0, 0, 0, 100];
        data.extend_from_slice(b"ab");
        let mut src = Source::new(&data);
        assert!(src.read_var_bytes("payload").is_err());
    }
}
