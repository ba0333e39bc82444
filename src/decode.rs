//! Streaming ECM decoder.
//!
//! The decoder reads (type, count) packets and reassembles the original byte
//! stream: literal runs are copied through, sector runs are rebuilt around
//! their stripped payloads. A rolling EDC over everything written out is
//! checked against the stream trailer.

use crate::cdrom::{
    CD_ADDRESS_OFFSET, CD_HEADER_SIZE, CD_MODE2_BODY_SIZE, CD_SECTOR_SIZE, MODE1_DATA_OFFSET,
    MODE1_DATA_SIZE, MODE2_SUBHEADER_COPY_OFFSET,
};
use crate::ecc::EDC;
use crate::error::{EcmError, Result};
use crate::io::{CountingReader, CountingWriter};
use crate::progress::{percentage, Progress, State};
use crate::runs::{read_type_count, END_SENTINEL};
use crate::sector::{reconstruct_sector, SectorKind};
use crate::ECM_MAGIC;
use byteorder::{LittleEndian, ReadBytesExt};
use crc::Digest;
use num_traits::FromPrimitive;
use std::io::{Read, Write};
use std::mem;

/// Where the decoder resumes on the next step.
#[derive(Clone, Copy)]
enum Phase {
    Header,
    Literals { remaining: u32 },
    Sectors { kind: SectorKind, remaining: u32 },
    Trailer,
}

/// A resumable decoding session over a plain byte source.
///
/// Construction validates the stream magic. `input_len`, when known, drives
/// the progress percentage; pass `None` for unseekable sources and the
/// percentage stays frozen. Each [`step`](Decoder::step) performs up to
/// `max_step_in_bytes` of work; the session is finished once the progress
/// state leaves [`State::InProgress`].
pub struct Decoder<R: Read, W: Write> {
    input: CountingReader<R>,
    output: CountingWriter<W>,
    max_step: usize,
    input_len: Option<u64>,

    edc: Digest<'static, u32>,
    phase: Phase,
    counter_decode: u64,

    sector_buf: [u8; CD_SECTOR_SIZE],
    progress: Progress,
}

impl<R: Read, W: Write> Decoder<R, W> {
    /// Start a decoding session and validate the stream magic.
    pub fn new(input: R, output: W, max_step_in_bytes: usize, input_len: Option<u64>) -> Result<Self> {
        let mut input = CountingReader::new(input);
        let mut magic = [0u8; 4];
        input
            .read_exact(&mut magic)
            .map_err(|_| EcmError::InvalidEcmFile)?;
        if magic != ECM_MAGIC {
            return Err(EcmError::InvalidEcmFile);
        }

        Ok(Decoder {
            input,
            output: CountingWriter::new(output),
            max_step: max_step_in_bytes,
            input_len,
            edc: EDC.digest(),
            phase: Phase::Header,
            counter_decode: 0,
            sector_buf: [0; CD_SECTOR_SIZE],
            progress: Progress::default(),
        })
    }

    /// Latest progress snapshot.
    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Perform one bounded unit of work. Once the session has reached a
    /// terminal state this is a no-op.
    pub fn step(&mut self) -> &Progress {
        if self.progress.state == State::InProgress {
            if let Err(e) = self.try_step() {
                self.progress.state = State::Failure;
                self.progress.failure = Some(e);
            }
        }
        &self.progress
    }

    /// Consume the session, returning the input and output streams.
    pub fn into_inner(self) -> (R, W) {
        (self.input.into_inner(), self.output.into_inner())
    }

    fn try_step(&mut self) -> Result<()> {
        if matches!(self.phase, Phase::Header) {
            let (code, num) = read_type_count(&mut self.input)?;
            if num == END_SENTINEL {
                self.phase = Phase::Trailer;
            } else if code == 0 {
                self.phase = Phase::Literals { remaining: num };
            } else {
                let kind = SectorKind::from_u8(code).ok_or(EcmError::InvalidEcmFile)?;
                self.phase = Phase::Sectors {
                    kind,
                    remaining: num,
                };
            }
        }

        if !matches!(self.phase, Phase::Trailer) {
            self.pump_run()?;
            self.refresh_progress();
            return Ok(());
        }

        self.verify_trailer()
    }

    /// Replay the current run, stopping at the step budget. Completed runs
    /// hand the phase back to `Header`; an interrupted run keeps its
    /// remaining count for the next step.
    fn pump_run(&mut self) -> Result<()> {
        let mut step_bytes = 0usize;

        if let Phase::Literals { remaining } = &mut self.phase {
            while *remaining > 0 {
                let chunk = (*remaining).min(CD_SECTOR_SIZE as u32) as usize;
                let buf = &mut self.sector_buf[..chunk];
                self.input
                    .read_exact(buf)
                    .map_err(|_| EcmError::ErrorReadingInputFile)?;
                step_bytes += chunk;
                self.edc.update(buf);
                self.output
                    .write_all(buf)
                    .map_err(|_| EcmError::ErrorWritingOutputFile)?;
                *remaining -= chunk as u32;
                self.counter_decode = self.input.position();

                if step_bytes >= self.max_step {
                    return Ok(());
                }
            }
            self.phase = Phase::Header;
        } else if let Phase::Sectors { kind, remaining } = &mut self.phase {
            let kind = *kind;
            while *remaining > 0 {
                match kind {
                    SectorKind::Mode1 => {
                        self.input
                            .read_exact(
                                &mut self.sector_buf[CD_ADDRESS_OFFSET..CD_ADDRESS_OFFSET + 3],
                            )
                            .map_err(|_| EcmError::ErrorReadingInputFile)?;
                        self.input
                            .read_exact(
                                &mut self.sector_buf
                                    [MODE1_DATA_OFFSET..MODE1_DATA_OFFSET + MODE1_DATA_SIZE],
                            )
                            .map_err(|_| EcmError::ErrorReadingInputFile)?;
                        step_bytes += 0x003 + MODE1_DATA_SIZE;

                        reconstruct_sector(&mut self.sector_buf, SectorKind::Mode1);
                        self.edc.update(&self.sector_buf);
                        self.output
                            .write_all(&self.sector_buf)
                            .map_err(|_| EcmError::ErrorWritingOutputFile)?;
                    }
                    SectorKind::Mode2Form1 | SectorKind::Mode2Form2 => {
                        let payload = kind.stripped_size();
                        self.input
                            .read_exact(
                                &mut self.sector_buf
                                    [MODE2_SUBHEADER_COPY_OFFSET..MODE2_SUBHEADER_COPY_OFFSET + payload],
                            )
                            .map_err(|_| EcmError::ErrorReadingInputFile)?;
                        step_bytes += payload;

                        reconstruct_sector(&mut self.sector_buf, kind);
                        let body =
                            &self.sector_buf[CD_HEADER_SIZE..CD_HEADER_SIZE + CD_MODE2_BODY_SIZE];
                        self.edc.update(body);
                        self.output
                            .write_all(body)
                            .map_err(|_| EcmError::ErrorWritingOutputFile)?;
                    }
                    // literal runs never take the sector path
                    SectorKind::Literal => {}
                }
                *remaining -= 1;

                if step_bytes >= self.max_step {
                    return Ok(());
                }
                self.counter_decode = self.input.position();
            }
            self.phase = Phase::Header;
        }

        Ok(())
    }

    /// Read the trailing EDC and compare it with the rolling checksum of
    /// everything written out.
    fn verify_trailer(&mut self) -> Result<()> {
        let stored = self
            .input
            .read_u32::<LittleEndian>()
            .map_err(|_| EcmError::ErrorReadingInputFile)?;

        self.progress.bytes_before_processing = self.input.position();
        self.progress.bytes_after_processing = self.output.position();

        let computed = mem::replace(&mut self.edc, EDC.digest()).finalize();
        if stored != computed {
            return Err(EcmError::ErrorInChecksum);
        }

        self.output
            .flush()
            .map_err(|_| EcmError::ErrorWritingOutputFile)?;
        self.progress.state = State::Completed;
        Ok(())
    }

    fn refresh_progress(&mut self) {
        if let Some(total) = self.input_len {
            self.progress.codec_percentage = percentage(self.counter_decode, total);
        }
    }
}
