//! TCP record marking, see RFC 5531 §11.
//!
//! A record is one or more fragments, each prefixed by a 32-bit header whose
//! top bit marks the last fragment and whose low 31 bits carry the fragment
//! length. UDP transports skip this module entirely; a datagram is a record.

use std::io::{ErrorKind, Result};

use byteorder::{ByteOrder, NetworkEndian};
use futures::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const LAST_FRAGMENT: u32 = 0x8000_0000;
const FRAGMENT_LEN: u32 = 0x7FFF_FFFF;

/// Reassemble one record. Records claiming more than `maxlen` bytes are
/// rejected with [`ErrorKind::OutOfMemory`], which tears the connection down.
pub(crate) async fn read_record<RD>(reader: &mut RD, maxlen: usize) -> Result<Vec<u8>>
where
    RD: AsyncRead + Unpin,
{
    let mut record = Vec::new();

    loop {
        let mut header = [0u8; 4];
        reader.read_exact(&mut header).await?;
        let header = NetworkEndian::read_u32(&header);

        let len = (header & FRAGMENT_LEN) as usize;
        if record.len() + len > maxlen || record.try_reserve(len).is_err() {
            return Err(ErrorKind::OutOfMemory.into());
        }

        let start = record.len();
        record.resize(start + len, 0);
        reader.read_exact(&mut record[start..]).await?;

        if header & LAST_FRAGMENT != 0 {
            break Ok(record);
        }
    }
}

/// Send one record as a single terminal fragment.
pub(crate) async fn write_record<WR>(writer: &mut WR, record: Vec<u8>) -> Result<()>
where
    WR: AsyncWrite + Unpin,
{
    let mut header = [0u8; 4];
    NetworkEndian::write_u32(&mut header, LAST_FRAGMENT | (record.len() as u32 & FRAGMENT_LEN));
    writer.write_all(&header).await?;
    writer.write_all(&record).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use futures::io::Cursor;

    #[async_std::test]
    async fn reassemble_single_fragment() {
        let mut cursor = Cursor::new(b"\x80\x00\x00\x04\x01\x02\x03\x04");
        let rec = super::read_record(&mut cursor, 10).await.unwrap();

        assert_eq!(rec[..], [1, 2, 3, 4])
    }

    #[async_std::test]
    async fn reassemble_multiple_fragments() {
        let mut cursor = Cursor::new(b"\x00\x00\x00\x02\x01\x02\x80\x00\x00\x02\x03\x04");
        let rec = super::read_record(&mut cursor, 10).await.unwrap();

        assert_eq!(rec[..], [1, 2, 3, 4])
    }

    #[async_std::test]
    async fn oversized_fragment_rejected() {
        let mut cursor = Cursor::new(b"\x80\x00\x00\x0A\x01\x02\x03\x04");
        assert!(super::read_record(&mut cursor, 4).await.is_err())
    }

    #[async_std::test]
    async fn eof_mid_fragment_fails() {
        let mut cursor = Cursor::new(b"\x80\x00\x00\x04\x01\x02");
        assert!(super::read_record(&mut cursor, 10).await.is_err())
    }

    #[async_std::test]
    async fn writer_sets_last_fragment_bit() {
        let mut cursor = Cursor::new(Vec::new());
        super::write_record(&mut cursor, vec![1, 2, 3]).await.unwrap();

        assert_eq!(cursor.get_ref()[..], b"\x80\x00\x00\x03\x01\x02\x03"[..])
    }
}
