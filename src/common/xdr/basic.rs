//! Basic XDR types, see [RFC4506](https://datatracker.ietf.org/doc/html/rfc4506).
//!
//! Provides the subset of XDR this crate puts on the wire:
//!
//! | XDR Type         | Rust type |
//! |------------------|-----------|
//! | integer          | i32       |
//! | unsigned integer | u32       |
//! | Boolean          | bool      |
//! | opaque[n]        | [u8; N]   |
//! | opaque<>         | Opaque    |
//! | string<>         | String    |
//!
//! Everything is big-endian and padded to 4-byte alignment. Narrow integers
//! (u8/u16) travel as full 32-bit words.

use byteorder::{NetworkEndian, ReadBytesExt, WriteBytesExt};
use std::io::{ErrorKind, Read, Result, Write};

macro_rules! read_padding {
    ($reader:expr, $len:expr) => {
        let pad = (4 - ($len & 3)) & 3;
        for _ in 0..pad {
            let _ = $reader.read_u8()?;
        }
    };
}

macro_rules! write_padding {
    ($writer:expr, $len:expr) => {
        let pad = (4 - ($len & 3)) & 3;
        for _ in 0..pad {
            $writer.write_u8(0)?;
        }
    };
}

pub trait XdrDecode {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read;
}

pub trait XdrEncode {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write;
}

impl XdrDecode for () {
    fn read_xdr<RD>(&mut self, _reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        Ok(())
    }
}

impl XdrEncode for () {
    fn write_xdr<WR>(&self, _writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        Ok(())
    }
}

// 4.1 Integer
impl XdrDecode for i32 {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        *self = reader.read_i32::<NetworkEndian>()?;
        Ok(())
    }
}

impl XdrEncode for i32 {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        writer.write_i32::<NetworkEndian>(*self)
    }
}

// 4.2 Unsigned Integer
impl XdrDecode for u32 {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        *self = reader.read_u32::<NetworkEndian>()?;
        Ok(())
    }
}

impl XdrEncode for u32 {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        writer.write_u32::<NetworkEndian>(*self)
    }
}

impl XdrDecode for u16 {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        *self = reader.read_u32::<NetworkEndian>()? as Self;
        Ok(())
    }
}

impl XdrEncode for u16 {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        writer.write_u32::<NetworkEndian>(*self as u32)
    }
}

impl XdrDecode for u8 {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        *self = reader.read_u32::<NetworkEndian>()? as Self;
        Ok(())
    }
}

impl XdrEncode for u8 {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        writer.write_u32::<NetworkEndian>(*self as u32)
    }
}

// 4.4 Booleans
impl XdrDecode for bool {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        *self = reader.read_i32::<NetworkEndian>()? != 0;
        Ok(())
    }
}

impl XdrEncode for bool {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        writer.write_i32::<NetworkEndian>(if *self { 1 } else { 0 })
    }
}

// 4.9 Fixed-Length Opaque Data
impl<const N: usize> XdrDecode for [u8; N] {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        reader.read_exact(self)?;
        read_padding!(reader, N);
        Ok(())
    }
}

impl<const N: usize> XdrEncode for [u8; N] {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        writer.write_all(self)?;
        write_padding!(writer, N);
        Ok(())
    }
}

// 4.10 Variable-Length Opaque Data
//
// A newtype rather than Vec<u8>: opaque bytes are raw with one length
// prefix, not per-element words.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Opaque(pub Vec<u8>);

impl std::ops::Deref for Opaque {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<u8>> for Opaque {
    fn from(v: Vec<u8>) -> Self {
        Opaque(v)
    }
}

impl From<&[u8]> for Opaque {
    fn from(v: &[u8]) -> Self {
        Opaque(v.to_vec())
    }
}

impl XdrDecode for Opaque {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        let len = reader.read_u32::<NetworkEndian>()? as usize;
        let mut buf = Vec::new();
        if buf.try_reserve(len).is_err() {
            return Err(ErrorKind::OutOfMemory.into());
        }
        buf.resize(len, 0);
        reader.read_exact(&mut buf)?;
        read_padding!(reader, len);
        self.0 = buf;
        Ok(())
    }
}

impl XdrEncode for Opaque {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        writer.write_u32::<NetworkEndian>(self.0.len() as u32)?;
        writer.write_all(&self.0)?;
        write_padding!(writer, self.0.len());
        Ok(())
    }
}

// 4.11 String
impl XdrDecode for String {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        let mut bytes = Opaque::default();
        bytes.read_xdr(reader)?;
        *self = String::from_utf8(bytes.0).map_err(|_| ErrorKind::InvalidData)?;
        Ok(())
    }
}

impl XdrEncode for String {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        let bytes = self.as_bytes();
        writer.write_u32::<NetworkEndian>(bytes.len() as u32)?;
        writer.write_all(bytes)?;
        write_padding!(writer, bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod test_xdr_integer {
    use std::io::Cursor;

    use super::{XdrDecode, XdrEncode};

    #[test]
    fn decode() {
        let mut cursor = Cursor::new(b"\xff\xff\xff\xfe");
        let mut i: i32 = 0;
        i.read_xdr(&mut cursor).unwrap();

        assert_eq!(i, -2)
    }

    #[test]
    fn encode() {
        let mut cursor = Cursor::new(Vec::new());
        let i: i32 = -2;
        i.write_xdr(&mut cursor).unwrap();

        assert_eq!(cursor.get_ref()[..], b"\xff\xff\xff\xfe"[..])
    }

    #[test]
    fn truncated_input_fails() {
        let mut cursor = Cursor::new(b"\x00\x00");
        let mut i: u32 = 0;
        assert!(i.read_xdr(&mut cursor).is_err())
    }
}


#[cfg(test)]
mod test_xdr_opaque {
    use std::io::Cursor;

    use super::{Opaque, XdrDecode, XdrEncode};

    #[test]
    fn decode() {
        let mut cursor = Cursor::new(b"\x00\x00\x00\x02\x01\x02\x00\x00");
        let mut i = Opaque::default();
        i.read_xdr(&mut cursor).unwrap();

        assert_eq!(i.0, vec![1u8, 2u8]);

        let mut cursor = Cursor::new(b"\x00\x00\x00\x04\x01\x02\x03\x04");
        let mut i = Opaque::default();
        i.read_xdr(&mut cursor).unwrap();

        assert_eq!(i.0, vec![1u8, 2u8, 3u8, 4u8])
    }

    #[test]
    fn encode() {
        let mut cursor = Cursor::new(Vec::new());
        let i = Opaque(vec![1u8, 2u8]);
        i.write_xdr(&mut cursor).unwrap();

        assert_eq!(cursor.get_ref()[..], b"\x00\x00\x00\x02\x01\x02\x00\x00"[..]);

        let mut cursor = Cursor::new(Vec::new());
        let i = Opaque(vec![1u8, 2u8, 3u8, 4u8]);
        i.write_xdr(&mut cursor).unwrap();

        assert_eq!(cursor.get_ref()[..], b"\x00\x00\x00\x04\x01\x02\x03\x04"[..])
    }

    #[test]
    fn length_beyond_input_fails() {
        // Claims 16 bytes, carries 2.
        let mut cursor = Cursor::new(b"\x00\x00\x00\x10\x01\x02");
        let mut i = Opaque::default();
        assert!(i.read_xdr(&mut cursor).is_err())
    }
}
