//! Variable-length (type, count) packets for the record stream.
//!
//! A packet starts with a byte holding the 2-bit region type in its low
//! bits, the low 5 bits of `count - 1` above them, and a continuation flag
//! in the top bit; continuation bytes carry 7 more bits each, least
//! significant first.

use crate::error::{EcmError, Result};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Decoded count value marking the end of the record stream.
pub(crate) const END_SENTINEL: u32 = 0xffff_ffff;

/// Emit a (type, count) packet. The count is biased down by one on the
/// wire; passing 0 wraps around and produces the end-of-stream sentinel.
pub(crate) fn write_type_count<W: Write>(out: &mut W, code: u8, count: u32) -> Result<()> {
    let mut count = count.wrapping_sub(1);
    out.write_u8((((count >= 32) as u8) << 7) | (((count & 31) as u8) << 2) | code)
        .map_err(|_| EcmError::ErrorWritingOutputFile)?;
    count >>= 5;
    while count != 0 {
        out.write_u8((((count >= 128) as u8) << 7) | (count & 127) as u8)
            .map_err(|_| EcmError::ErrorWritingOutputFile)?;
        count >>= 7;
    }
    Ok(())
}

/// Read a (type, count) packet, yielding the region code and the re-biased
/// count. A count of [`END_SENTINEL`] is the end-of-stream marker and is
/// returned as-is. Continuation chunks that would extend past bit 31 reject
/// the stream.
pub(crate) fn read_type_count<R: Read>(input: &mut R) -> Result<(u8, u32)> {
    let mut c = input
        .read_u8()
        .map_err(|_| EcmError::ErrorReadingInputFile)?;
    let code = c & 3;
    let mut num = u32::from((c >> 2) & 0x1f);
    let mut bits = 5u32;
    while c & 0x80 != 0 {
        c = input
            .read_u8()
            .map_err(|_| EcmError::ErrorReadingInputFile)?;
        let chunk = u32::from(c & 0x7f);
        if bits > 31 || chunk >= (0x8000_0000u32 >> (bits - 1)) {
            return Err(EcmError::InvalidEcmFile);
        }
        num |= chunk << bits;
        bits += 7;
    }
    if num == END_SENTINEL {
        Ok((code, END_SENTINEL))
    } else {
        Ok((code, num + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip(code: u8, count: u32) -> (u8, u32) {
        let mut buf = Vec::new();
        write_type_count(&mut buf, code, count).unwrap();
        read_type_count(&mut Cursor::new(buf)).unwrap()
    }

    #[test]
    fn packets_roundtrip() {
        for count in [1u32, 2, 31, 32, 33, 127, 128, 4096, 0x0123_4567, 0x7fff_ffff] {
            for code in 0u8..4 {
                assert_eq!(roundtrip(code, count), (code, count));
            }
        }
        assert_eq!(roundtrip(1, 0x8000_0000), (1, 0x8000_0000));
    }

    #[test]
    fn single_byte_packet() {
        let mut buf = Vec::new();
        write_type_count(&mut buf, 0, 1).unwrap();
        assert_eq!(buf, [0x00]);

        let mut buf = Vec::new();
        write_type_count(&mut buf, 1, 1).unwrap();
        assert_eq!(buf, [0x01]);
    }

    #[test]
    fn sentinel_encoding() {
        let mut buf = Vec::new();
        write_type_count(&mut buf, 0, 0).unwrap();
        assert_eq!(buf, [0xfc, 0xff, 0xff, 0xff, 0x03]);

        let (code, num) = read_type_count(&mut Cursor::new(buf)).unwrap();
        assert_eq!(code, 0);
        assert_eq!(num, END_SENTINEL);
    }

    #[test]
    fn continuation_past_bit_31_is_rejected() {
        // fifth continuation chunk would not fit in 32 bits
        let bad = [0x83u8, 0xff, 0xff, 0xff, 0x7f];
        assert_eq!(
            read_type_count(&mut Cursor::new(bad)),
            Err(EcmError::InvalidEcmFile)
        );
    }

    #[test]
    fn truncated_packet_is_a_read_error() {
        let bad = [0x83u8, 0xff];
        assert_eq!(
            read_type_count(&mut Cursor::new(bad)),
            Err(EcmError::ErrorReadingInputFile)
        );
    }
}
