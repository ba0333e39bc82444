//! CD-ROM sector geometry.
//!
//! Offsets into a raw 2352-byte sector are fixed by the yellow book; they are
//! part of the wire contract and shared by the classifier, the reconstructor
//! and the codec streams. Mode 2 offsets marked "body-relative" count from the
//! start of the subheader, which is where classification windows begin.

/// Size of a raw CD-ROM sector including sync, header and parity.
pub const CD_SECTOR_SIZE: usize = 2352;
/// Size of a Mode 2 sector body (everything after sync, address and mode).
pub const CD_MODE2_BODY_SIZE: usize = 2336;
/// Size of the sync + address + mode prefix of a raw sector.
pub const CD_HEADER_SIZE: usize = 0x010;

pub const CD_SYNC_NUM_BYTES: usize = 12;
pub const CD_SYNC_HEADER: [u8; CD_SYNC_NUM_BYTES] = [
    0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00,
];

/// Offset of the 3-byte BCD address in a raw sector.
pub const CD_ADDRESS_OFFSET: usize = 0x00c;
/// Offset of the mode byte in a raw sector.
pub const CD_MODE_OFFSET: usize = 0x00f;

// Mode 1 layout.
pub const MODE1_DATA_OFFSET: usize = 0x010;
pub const MODE1_DATA_SIZE: usize = 0x800;
pub const MODE1_EDC_OFFSET: usize = 0x810;
pub const MODE1_RESERVED_OFFSET: usize = 0x814;
pub const MODE1_RESERVED_SIZE: usize = 8;

/// Offset of the P parity plane; Q follows at [`ECC_Q_OFFSET`] within it.
pub const ECC_OFFSET: usize = 0x81c;
/// P (172 bytes) followed by Q (104 bytes).
pub const ECC_SIZE: usize = 0x114;
pub const ECC_Q_OFFSET: usize = 0xac;

// Mode 2 layout. The 4-byte subheader is carried twice for redundancy.
pub const MODE2_SUBHEADER_OFFSET: usize = 0x010;
pub const MODE2_SUBHEADER_COPY_OFFSET: usize = 0x014;
pub const MODE2_SUBHEADER_SIZE: usize = 4;

/// Body-relative EDC offset of a Mode 2 Form 1 sector.
pub const MODE2_FORM1_EDC_OFFSET: usize = 0x808;
/// Body-relative EDC offset of a Mode 2 Form 2 sector.
pub const MODE2_FORM2_EDC_OFFSET: usize = 0x91c;
