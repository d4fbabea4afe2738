//! Big-endian field codec for message payloads.
//!
//! Integers are 32-bit signed, floats are 32-bit IEEE, booleans take one byte and
//! strings carry a `u32` byte length ahead of their UTF-8 bytes.

use glam::Vec2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("payload truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
    #[error("unknown opcode {0}")]
    UnknownOpcode(i32),
    #[error("invalid {kind} value {value}")]
    InvalidValue { kind: &'static str, value: i32 },
    #[error("negative count {0}")]
    NegativeCount(i32),
    #[error("string is not valid utf-8")]
    InvalidString,
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
}

#[derive(Debug, Default)]
pub struct PacketWriter {
    buffer: Vec<u8>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(64),
        }
    }

    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn write_f32(&mut self, value: f32) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.buffer.push(u8::from(value));
        self
    }

    pub fn write_vec2(&mut self, value: Vec2) -> &mut Self {
        self.write_f32(value.x).write_f32(value.y)
    }

    pub fn write_count(&mut self, count: usize) -> &mut Self {
        self.write_i32(i32::try_from(count).unwrap_or(i32::MAX))
    }

    pub fn write_str(&mut self, value: &str) -> &mut Self {
        self.buffer
            .extend_from_slice(&(value.len() as u32).to_be_bytes());
        self.buffer.extend_from_slice(value.as_bytes());
        self
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

pub struct PacketReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let bytes = self.take_slice(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn take_slice(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < len {
            return Err(ProtocolError::Truncated {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    pub fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        self.take::<4>().map(i32::from_be_bytes)
    }

    pub fn read_f32(&mut self) -> Result<f32, ProtocolError> {
        self.take::<4>().map(f32::from_be_bytes)
    }

    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        let [byte] = self.take::<1>()?;
        Ok(byte != 0)
    }

    pub fn read_vec2(&mut self) -> Result<Vec2, ProtocolError> {
        Ok(Vec2::new(self.read_f32()?, self.read_f32()?))
    }

    /// Reads an element count and checks that at least `min_element_size` bytes
    /// per element are still available, so a bogus count cannot trigger a huge
    /// allocation.
    pub fn read_count(&mut self, min_element_size: usize) -> Result<usize, ProtocolError> {
        let count = self.read_i32()?;
        if count < 0 {
            return Err(ProtocolError::NegativeCount(count));
        }
        let count = count as usize;
        let needed = count.saturating_mul(min_element_size);
        if needed > self.remaining() {
            return Err(ProtocolError::Truncated {
                needed,
                remaining: self.remaining(),
            });
        }
        Ok(count)
    }

    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        let len = u32::from_be_bytes(self.take::<4>()?) as usize;
        let bytes = self.take_slice(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidString)
    }

    pub fn finish(&self) -> Result<(), ProtocolError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(ProtocolError::TrailingBytes(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_big_endian() {
        let mut writer = PacketWriter::new();
        writer.write_i32(1).write_f32(1.0).write_bool(true);
        assert_eq!(
            writer.into_bytes(),
            vec![0, 0, 0, 1, 0x3f, 0x80, 0, 0, 1]
        );
    }

    #[test]
    fn string_is_length_prefixed() {
        let mut writer = PacketWriter::new();
        writer.write_str("hi");
        let bytes = writer.into_bytes();
        assert_eq!(bytes, vec![0, 0, 0, 2, b'h', b'i']);

        let mut reader = PacketReader::new(&bytes);
        assert_eq!(reader.read_string().unwrap(), "hi");
        assert!(reader.finish().is_ok());
    }

    #[test]
    fn short_read_is_an_error() {
        let mut reader = PacketReader::new(&[0, 0, 1]);
        assert_eq!(
            reader.read_i32(),
            Err(ProtocolError::Truncated {
                needed: 4,
                remaining: 3
            })
        );
    }

    #[test]
    fn count_is_checked_against_remaining_bytes() {
        let mut writer = PacketWriter::new();
        writer.write_i32(1_000_000).write_i32(7);
        let bytes = writer.into_bytes();
        let mut reader = PacketReader::new(&bytes);
        assert!(matches!(
            reader.read_count(16),
            Err(ProtocolError::Truncated { .. })
        ));

        let mut writer = PacketWriter::new();
        writer.write_i32(-3);
        let bytes = writer.into_bytes();
        let mut reader = PacketReader::new(&bytes);
        assert_eq!(reader.read_count(4), Err(ProtocolError::NegativeCount(-3)));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let bytes = [0, 0, 0, 2, 0xff, 0xfe];
        let mut reader = PacketReader::new(&bytes);
        assert_eq!(reader.read_string(), Err(ProtocolError::InvalidString));
    }
}
