//! Byte buffer that commands are marshalled into.
//!
//! Fixed-width values are written in native byte order with no padding.
//! Variable-size values are prefixed with a `u32` length.

use bytemuck::Pod;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarshalError {
    #[error("unexpected end of parcel: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("invalid {what} value {value}")]
    InvalidValue { what: &'static str, value: u64 },

    #[error("length {len} does not fit the u32 length prefix")]
    TooLarge { len: usize },

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("no command registered for type {command_type} subtype {subtype}")]
    UnknownCommand { command_type: u16, subtype: u16 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parcel {
    data: Vec<u8>,
    read_pos: usize,
}

impl Parcel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap received bytes for reading from the start.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data, read_pos: 0 }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes not yet consumed by reads.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.read_pos
    }

    pub fn read_position(&self) -> usize {
        self.read_pos
    }

    pub fn write_pod<T: Pod>(&mut self, value: &T) {
        self.data.extend_from_slice(bytemuck::bytes_of(value));
    }

    pub fn read_pod<T: Pod>(&mut self) -> Result<T, MarshalError> {
        let bytes = self.take(std::mem::size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    pub fn write_len(&mut self, len: usize) -> Result<(), MarshalError> {
        let len = u32::try_from(len).map_err(|_| MarshalError::TooLarge { len })?;
        self.write_pod(&len);
        Ok(())
    }

    /// Read a length prefix. A length larger than the unread payload is
    /// rejected up front so corrupt input never drives a huge allocation.
    pub fn read_len(&mut self) -> Result<usize, MarshalError> {
        let len = self.read_pod::<u32>()? as usize;
        if len > self.remaining() {
            return Err(MarshalError::UnexpectedEof {
                needed: len,
                remaining: self.remaining(),
            });
        }
        Ok(len)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), MarshalError> {
        self.write_len(bytes.len())?;
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>, MarshalError> {
        let len = self.read_len()?;
        Ok(self.take(len)?.to_vec())
    }

    fn take(&mut self, size: usize) -> Result<&[u8], MarshalError> {
        if size > self.remaining() {
            return Err(MarshalError::UnexpectedEof {
                needed: size,
                remaining: self.remaining(),
            });
        }
        let start = self.read_pos;
        self.read_pos += size;
        Ok(&self.data[start..self.read_pos])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pod_values_are_fixed_width() {
        let mut parcel = Parcel::new();
        parcel.write_pod(&7u16);
        parcel.write_pod(&u64::MAX);
        assert_eq!(parcel.len(), 10);

        let mut reader = Parcel::from_bytes(parcel.into_bytes());
        assert_eq!(reader.read_pod::<u16>(), Ok(7));
        assert_eq!(reader.read_pod::<u64>(), Ok(u64::MAX));
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_short_read_fails() {
        let mut parcel = Parcel::from_bytes(vec![1, 2, 3]);
        assert_eq!(
            parcel.read_pod::<u32>(),
            Err(MarshalError::UnexpectedEof {
                needed: 4,
                remaining: 3
            })
        );
    }

    #[test]
    fn test_oversized_length_prefix_is_rejected() {
        let mut parcel = Parcel::new();
        parcel.write_pod(&1000u32);
        parcel.write_pod(&0u8);
        let mut reader = Parcel::from_bytes(parcel.into_bytes());
        assert!(matches!(
            reader.read_bytes(),
            Err(MarshalError::UnexpectedEof { needed: 1000, .. })
        ));
    }

    #[test]
    fn test_bytes_are_length_prefixed() {
        let mut parcel = Parcel::new();
        parcel.write_bytes(b"abc").unwrap();
        parcel.write_bytes(&[]).unwrap();
        assert_eq!(parcel.len(), 4 + 3 + 4);

        let mut reader = Parcel::from_bytes(parcel.into_bytes());
        assert_eq!(reader.read_bytes().unwrap(), b"abc");
        assert!(reader.read_bytes().unwrap().is_empty());
    }
}
