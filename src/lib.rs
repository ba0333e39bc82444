//! Lossless codec for the ECM (Error Code Modeler) disc image format.
//!
//! A raw CD-ROM image spends a large share of every 2352-byte sector on
//! fields that are fully derivable from the payload: the sync pattern, the
//! mode byte, the EDC checksum and the P/Q parity planes. This crate detects
//! Mode 1 and Mode 2 sectors in an arbitrary byte stream, strips those
//! fields on encode and rebuilds them bit-for-bit on decode, verified by a
//! file-wide checksum trailer. Bytes that are not sector-shaped pass through
//! as literals, so any input round-trips exactly.
//!
//! ## Usage
//! Encoding and decoding are resumable sessions: each step performs a
//! bounded amount of work, so a frontend can repaint progress between steps.
//!
//! ```
//! use ecm::{Decoder, Encoder, State};
//! use std::io::Cursor;
//!
//! let image = vec![0u8; 4096];
//!
//! let mut encoded = Vec::new();
//! let mut encoder = Encoder::new(Cursor::new(&image), &mut encoded, 1 << 20)?;
//! while encoder.step().state == State::InProgress {}
//! drop(encoder);
//!
//! let mut decoded = Vec::new();
//! let mut decoder =
//!     Decoder::new(Cursor::new(&encoded), &mut decoded, 1 << 20, Some(encoded.len() as u64))?;
//! while decoder.step().state == State::InProgress {}
//! drop(decoder);
//!
//! assert_eq!(decoded, image);
//! # Ok::<(), ecm::EcmError>(())
//! ```

pub mod error;
pub mod progress;
pub mod sector;

mod cdrom;
mod decode;
mod ecc;
mod encode;
mod io;
mod runs;

pub use decode::Decoder;
pub use encode::Encoder;
pub use error::{EcmError, Result};
pub use progress::{Progress, State};

/// Magic identifier at the start of every ECM stream.
pub const ECM_MAGIC: [u8; 4] = [b'E', b'C', b'M', 0x00];
