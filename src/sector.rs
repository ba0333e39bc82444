//! Sector classification and reconstruction.
//!
//! Classification looks at the head of a byte window and decides whether it
//! is the start of a sector whose derivable fields (sync, mode, redundant
//! subheader, EDC, ECC) check out; reconstruction is the inverse, rebuilding
//! those fields around a stripped payload.

use crate::cdrom::{
    CD_ADDRESS_OFFSET, CD_HEADER_SIZE, CD_MODE2_BODY_SIZE, CD_MODE_OFFSET, CD_SECTOR_SIZE,
    CD_SYNC_HEADER, CD_SYNC_NUM_BYTES, ECC_OFFSET, ECC_SIZE, MODE1_DATA_OFFSET, MODE1_EDC_OFFSET,
    MODE1_RESERVED_OFFSET, MODE1_RESERVED_SIZE, MODE2_FORM1_EDC_OFFSET, MODE2_FORM2_EDC_OFFSET,
    MODE2_SUBHEADER_COPY_OFFSET, MODE2_SUBHEADER_OFFSET, MODE2_SUBHEADER_SIZE,
};
use crate::ecc::{ecc_check_sector, ecc_write_sector, EDC, ZERO_ADDRESS};
use byteorder::{ByteOrder, LittleEndian};
use num_derive::FromPrimitive;

/// The region types carried in the record stream. The discriminants are
/// stable wire constants.
#[repr(u8)]
#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorKind {
    /// Not a recognizable sector; a single raw byte.
    Literal = 0,
    /// Raw 2352-byte Mode 1 sector.
    Mode1 = 1,
    /// 2336-byte Mode 2 Form 1 sector body.
    Mode2Form1 = 2,
    /// 2336-byte Mode 2 Form 2 sector body.
    Mode2Form2 = 3,
}

impl SectorKind {
    /// Wire code of this region type.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Number of input bytes one region of this kind spans.
    pub const fn raw_size(self) -> usize {
        match self {
            SectorKind::Literal => 1,
            SectorKind::Mode1 => CD_SECTOR_SIZE,
            SectorKind::Mode2Form1 | SectorKind::Mode2Form2 => CD_MODE2_BODY_SIZE,
        }
    }

    /// Bytes left on the wire per region once the derivable fields are
    /// stripped.
    pub const fn stripped_size(self) -> usize {
        match self {
            SectorKind::Literal => 1,
            SectorKind::Mode1 => 0x803,
            SectorKind::Mode2Form1 => 0x804,
            SectorKind::Mode2Form2 => 0x918,
        }
    }
}

/// Classify the bytes at the head of `window`.
///
/// A Mode 1 match needs a full raw sector: sync pattern, mode byte 0x01,
/// zeroed reserved bytes, valid parity against the header address and a
/// valid EDC. Mode 2 windows start at the subheader; both forms require the
/// subheader to match its redundant copy, Form 1 additionally carries parity
/// against the zero address. Anything else is a literal byte.
pub fn detect_sector(window: &[u8]) -> SectorKind {
    if window.len() >= CD_SECTOR_SIZE
        && window[..CD_SYNC_NUM_BYTES] == CD_SYNC_HEADER
        && window[CD_MODE_OFFSET] == 0x01
        && window[MODE1_RESERVED_OFFSET..MODE1_RESERVED_OFFSET + MODE1_RESERVED_SIZE]
            .iter()
            .all(|&b| b == 0)
    {
        let address = [
            window[CD_ADDRESS_OFFSET],
            window[CD_ADDRESS_OFFSET + 1],
            window[CD_ADDRESS_OFFSET + 2],
            window[CD_ADDRESS_OFFSET + 3],
        ];
        if ecc_check_sector(
            &address,
            &window[MODE1_DATA_OFFSET..],
            &window[ECC_OFFSET..ECC_OFFSET + ECC_SIZE],
        ) && EDC.checksum(&window[..MODE1_EDC_OFFSET])
            == LittleEndian::read_u32(&window[MODE1_EDC_OFFSET..])
        {
            return SectorKind::Mode1;
        }
    } else if window.len() >= CD_MODE2_BODY_SIZE
        && window[..MODE2_SUBHEADER_SIZE] == window[MODE2_SUBHEADER_SIZE..2 * MODE2_SUBHEADER_SIZE]
    {
        let body_ecc_offset = ECC_OFFSET - CD_HEADER_SIZE;
        if ecc_check_sector(
            &ZERO_ADDRESS,
            window,
            &window[body_ecc_offset..body_ecc_offset + ECC_SIZE],
        ) && EDC.checksum(&window[..MODE2_FORM1_EDC_OFFSET])
            == LittleEndian::read_u32(&window[MODE2_FORM1_EDC_OFFSET..])
        {
            return SectorKind::Mode2Form1;
        }
        if EDC.checksum(&window[..MODE2_FORM2_EDC_OFFSET])
            == LittleEndian::read_u32(&window[MODE2_FORM2_EDC_OFFSET..])
        {
            return SectorKind::Mode2Form2;
        }
    }

    SectorKind::Literal
}

/// Regenerate the derivable fields of a raw sector in place.
///
/// The stripped payload must already sit at its raw offsets: the address at
/// 0x00C for Mode 1, the subheader at its redundant copy position 0x014 for
/// Mode 2 forms. Literal regions carry no derivable fields, so the call is a
/// no-op for them.
pub fn reconstruct_sector(sector: &mut [u8; CD_SECTOR_SIZE], kind: SectorKind) {
    if kind == SectorKind::Literal {
        return;
    }

    sector[..CD_SYNC_NUM_BYTES].copy_from_slice(&CD_SYNC_HEADER);

    match kind {
        SectorKind::Mode1 => {
            sector[CD_MODE_OFFSET] = 0x01;
            sector[MODE1_RESERVED_OFFSET..MODE1_RESERVED_OFFSET + MODE1_RESERVED_SIZE].fill(0);

            let edc = EDC.checksum(&sector[..MODE1_EDC_OFFSET]);
            LittleEndian::write_u32(&mut sector[MODE1_EDC_OFFSET..MODE1_EDC_OFFSET + 4], edc);

            let address = [
                sector[CD_ADDRESS_OFFSET],
                sector[CD_ADDRESS_OFFSET + 1],
                sector[CD_ADDRESS_OFFSET + 2],
                sector[CD_ADDRESS_OFFSET + 3],
            ];
            let (head, parity) = sector.split_at_mut(ECC_OFFSET);
            ecc_write_sector(&address, &head[MODE1_DATA_OFFSET..], &mut parity[..ECC_SIZE]);
        }
        SectorKind::Mode2Form1 => {
            sector[CD_MODE_OFFSET] = 0x02;
            sector.copy_within(
                MODE2_SUBHEADER_COPY_OFFSET..MODE2_SUBHEADER_COPY_OFFSET + MODE2_SUBHEADER_SIZE,
                MODE2_SUBHEADER_OFFSET,
            );

            let edc_offset = CD_HEADER_SIZE + MODE2_FORM1_EDC_OFFSET;
            let edc = EDC.checksum(&sector[CD_HEADER_SIZE..edc_offset]);
            LittleEndian::write_u32(&mut sector[edc_offset..edc_offset + 4], edc);

            let (head, parity) = sector.split_at_mut(ECC_OFFSET);
            ecc_write_sector(&ZERO_ADDRESS, &head[CD_HEADER_SIZE..], &mut parity[..ECC_SIZE]);
        }
        SectorKind::Mode2Form2 => {
            sector[CD_MODE_OFFSET] = 0x02;
            sector.copy_within(
                MODE2_SUBHEADER_COPY_OFFSET..MODE2_SUBHEADER_COPY_OFFSET + MODE2_SUBHEADER_SIZE,
                MODE2_SUBHEADER_OFFSET,
            );

            let edc_offset = CD_HEADER_SIZE + MODE2_FORM2_EDC_OFFSET;
            let edc = EDC.checksum(&sector[CD_HEADER_SIZE..edc_offset]);
            LittleEndian::write_u32(&mut sector[edc_offset..edc_offset + 4], edc);
        }
        SectorKind::Literal => {}
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::{synth_mode1, synth_mode2};
    use super::*;

    #[test]
    fn detects_mode1() {
        let sector = synth_mode1(1);
        assert_eq!(detect_sector(&sector), SectorKind::Mode1);
        // a truncated window cannot match
        assert_eq!(detect_sector(&sector[..2336]), SectorKind::Literal);
    }

    #[test]
    fn detects_mode2_forms() {
        let f1 = synth_mode2(SectorKind::Mode2Form1, 2);
        assert_eq!(
            detect_sector(&f1[CD_HEADER_SIZE..]),
            SectorKind::Mode2Form1
        );

        let f2 = synth_mode2(SectorKind::Mode2Form2, 3);
        assert_eq!(
            detect_sector(&f2[CD_HEADER_SIZE..]),
            SectorKind::Mode2Form2
        );
    }

    #[test]
    fn raw_mode2_sector_start_is_not_a_sector() {
        // At the start of a raw Mode 2 sector the window shows sync + mode
        // 0x02: not Mode 1 (mode byte), not Mode 2 (no duplicated subheader).
        let f2 = synth_mode2(SectorKind::Mode2Form2, 4);
        assert_eq!(detect_sector(&f2), SectorKind::Literal);
    }

    #[test]
    fn corrupt_sectors_fall_back_to_literal() {
        let mut sector = synth_mode1(5);
        sector[MODE1_DATA_OFFSET + 17] ^= 0x01;
        assert_eq!(detect_sector(&sector), SectorKind::Literal);

        let mut f1 = synth_mode2(SectorKind::Mode2Form1, 6);
        f1[CD_HEADER_SIZE + 100] ^= 0x01;
        assert_eq!(detect_sector(&f1[CD_HEADER_SIZE..]), SectorKind::Literal);
    }

    #[test]
    fn reconstruction_is_exact() {
        // strip the derivable fields, rebuild, compare bit-for-bit
        let reference = synth_mode1(7);
        let mut stripped = reference;
        stripped[..CD_SYNC_NUM_BYTES].fill(0xaa);
        stripped[CD_MODE_OFFSET] = 0xaa;
        stripped[MODE1_EDC_OFFSET..].fill(0xaa);
        reconstruct_sector(&mut stripped, SectorKind::Mode1);
        assert_eq!(stripped, reference);

        let reference = synth_mode2(SectorKind::Mode2Form1, 8);
        let mut stripped = reference;
        stripped[..CD_HEADER_SIZE].fill(0xaa);
        stripped[CD_HEADER_SIZE + MODE2_FORM1_EDC_OFFSET..].fill(0xaa);
        reconstruct_sector(&mut stripped, SectorKind::Mode2Form1);
        assert_eq!(&stripped[CD_HEADER_SIZE..], &reference[CD_HEADER_SIZE..]);

        let reference = synth_mode2(SectorKind::Mode2Form2, 9);
        let mut stripped = reference;
        stripped[..CD_HEADER_SIZE].fill(0xaa);
        stripped[CD_HEADER_SIZE + MODE2_FORM2_EDC_OFFSET..].fill(0xaa);
        reconstruct_sector(&mut stripped, SectorKind::Mode2Form2);
        assert_eq!(&stripped[CD_HEADER_SIZE..], &reference[CD_HEADER_SIZE..]);
    }

    #[test]
    fn wire_codes_are_stable() {
        use num_traits::FromPrimitive;
        for (code, kind) in [
            (0u8, SectorKind::Literal),
            (1, SectorKind::Mode1),
            (2, SectorKind::Mode2Form1),
            (3, SectorKind::Mode2Form2),
        ] {
            assert_eq!(kind.code(), code);
            assert_eq!(SectorKind::from_u8(code), Some(kind));
        }
        assert_eq!(SectorKind::from_u8(4), None);
    }
}
