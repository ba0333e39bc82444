//! Streaming ECM encoder.
//!
//! The encoder scans its input through a lookahead queue, classifying each
//! position and accumulating runs of identically-typed regions. When a run
//! closes it seeks back to the run's first byte and streams a (type, count)
//! packet followed by the stripped payload. A rolling EDC over every input
//! byte is appended as the stream trailer.

use crate::cdrom::{
    CD_ADDRESS_OFFSET, CD_MODE2_BODY_SIZE, CD_MODE_OFFSET, CD_SECTOR_SIZE, CD_SYNC_HEADER,
    CD_SYNC_NUM_BYTES, MODE1_DATA_OFFSET, MODE1_DATA_SIZE, MODE2_SUBHEADER_SIZE,
};
use crate::ecc::EDC;
use crate::error::{EcmError, Result};
use crate::io::CountingWriter;
use crate::progress::{percentage, Progress, State};
use crate::runs::write_type_count;
use crate::sector::{detect_sector, SectorKind};
use crate::ECM_MAGIC;
use byteorder::{LittleEndian, WriteBytesExt};
use crc::Digest;
use std::io::{Read, Seek, SeekFrom, Write};
use std::mem;

/// Lookahead queue sizing; clamps to 256 KiB on every real target.
const QUEUE_SIZE: usize = if usize::MAX - 4095 < 0x40000 {
    usize::MAX - 4095
} else {
    0x40000
};

/// Run-count cap; a run reaching it is flushed and restarted so the biased
/// wire count never exceeds 31 bits.
const RUN_COUNT_CAP: u32 = 0x7fff_ffff;

/// What the scanner saw at the head of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Region(SectorKind),
    EndOfInput,
}

/// Resumption state for a run flush interrupted at the step boundary.
#[derive(Clone, Copy)]
enum Flush {
    Idle,
    Header { kind: SectorKind, count: u32 },
    Literals { remaining: u32 },
    Sectors { kind: SectorKind, remaining: u32 },
}

#[derive(PartialEq, Eq)]
enum StepOutcome {
    Done,
    Partial,
}

/// A resumable encoding session over a seekable byte source.
///
/// Construction writes the stream magic and measures the input length; each
/// [`step`](Encoder::step) then performs up to `max_step_in_bytes` of work
/// and refreshes the progress record. The session is finished once the
/// progress state leaves [`State::InProgress`]. Dropping the session
/// releases the queue and both streams.
pub struct Encoder<R: Read + Seek, W: Write> {
    input: R,
    output: CountingWriter<W>,
    max_step: usize,

    queue: Vec<u8>,
    queue_start: usize,
    queue_avail: usize,

    edc: Digest<'static, u32>,

    cur: Scan,
    cur_count: u32,
    run_start: u64,
    literal_skip: u32,

    input_len: u64,
    bytes_checked: u64,
    bytes_queued: u64,

    tally: [u64; 4],

    pending: Scan,
    flush: Flush,

    counter_analyze: u64,
    counter_encode: u64,

    sector_buf: [u8; CD_SECTOR_SIZE],
    progress: Progress,
}

impl<R: Read + Seek, W: Write> Encoder<R, W> {
    /// Start an encoding session and write the stream magic.
    pub fn new(mut input: R, output: W, max_step_in_bytes: usize) -> Result<Self> {
        let input_len = input
            .seek(SeekFrom::End(0))
            .map_err(|_| EcmError::ErrorReadingInputFile)?;

        let mut output = CountingWriter::new(output);
        output
            .write_all(&ECM_MAGIC)
            .map_err(|_| EcmError::ErrorWritingOutputFile)?;

        Ok(Encoder {
            input,
            output,
            max_step: max_step_in_bytes,
            queue: vec![0u8; QUEUE_SIZE],
            queue_start: 0,
            queue_avail: 0,
            edc: EDC.digest(),
            cur: Scan::EndOfInput,
            cur_count: 0,
            run_start: 0,
            literal_skip: 0,
            input_len,
            bytes_checked: 0,
            bytes_queued: 0,
            tally: [0; 4],
            pending: Scan::EndOfInput,
            flush: Flush::Idle,
            counter_analyze: 0,
            counter_encode: 0,
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
        (self.input, self.output.into_inner())
    }

    fn try_step(&mut self) -> Result<()> {
        if matches!(self.flush, Flush::Idle) {
            self.refill()?;
            self.pending = self.classify();
        }

        if matches!(self.flush, Flush::Idle)
            && self.pending == self.cur
            && self.cur_count <= RUN_COUNT_CAP
        {
            self.cur_count += 1;
        } else {
            if self.cur_count > 0 || !matches!(self.flush, Flush::Idle) {
                if matches!(self.flush, Flush::Idle) {
                    // run boundary: rewind to the first byte of the finished
                    // run before streaming it out
                    self.input
                        .seek(SeekFrom::Start(self.run_start))
                        .map_err(|_| EcmError::ErrorReadingInputFile)?;
                    if let Scan::Region(kind) = self.cur {
                        self.tally[kind.code() as usize] += u64::from(self.cur_count);
                        self.flush = Flush::Header {
                            kind,
                            count: self.cur_count,
                        };
                    }
                }
                if self.flush_run()? == StepOutcome::Partial {
                    self.refresh_progress();
                    return Ok(());
                }
                self.flush = Flush::Idle;
            }
            self.cur = self.pending;
            self.run_start = self.bytes_checked;
            self.cur_count = 1;
        }

        if let Scan::Region(kind) = self.cur {
            let size = kind.raw_size();
            self.bytes_checked += size as u64;
            self.queue_start += size;
            self.queue_avail -= size;
            self.refresh_progress();
            return Ok(());
        }

        self.finish()
    }

    /// Top up the lookahead queue when it holds less than one raw sector
    /// and unqueued input remains, folding the fresh bytes into the rolling
    /// EDC.
    fn refill(&mut self) -> Result<()> {
        if self.queue_avail < CD_SECTOR_SIZE
            && (self.queue_avail as u64) < self.input_len - self.bytes_queued
        {
            let mut willread = self.input_len - self.bytes_queued;
            let maxread = (QUEUE_SIZE - self.queue_avail) as u64;
            if willread > maxread {
                willread = maxread;
            }
            if willread > self.max_step as u64 {
                willread = self.max_step as u64;
            }

            if self.queue_start > 0 {
                self.queue
                    .copy_within(self.queue_start..self.queue_start + self.queue_avail, 0);
                self.queue_start = 0;
            }
            if willread > 0 {
                let willread = willread as usize;
                self.counter_analyze = self.bytes_queued;

                self.input
                    .seek(SeekFrom::Start(self.bytes_queued))
                    .map_err(|_| EcmError::ErrorReadingInputFile)?;
                let dst = &mut self.queue[self.queue_avail..self.queue_avail + willread];
                self.input
                    .read_exact(dst)
                    .map_err(|_| EcmError::ErrorReadingInputFile)?;
                self.edc.update(dst);

                self.bytes_queued += willread as u64;
                self.queue_avail += willread;
            }
        }
        Ok(())
    }

    fn classify(&mut self) -> Scan {
        if self.queue_avail == 0 {
            return Scan::EndOfInput;
        }
        if self.literal_skip > 0 {
            self.literal_skip -= 1;
            return Scan::Region(SectorKind::Literal);
        }

        let window = &self.queue[self.queue_start..self.queue_start + self.queue_avail];

        // A Mode 2 payload may embed what looks like the start of a raw
        // sector. Right after an accepted Mode 2 region, treat a sync-shaped
        // prefix with mode 0x02 as literals so the classifier cannot lock
        // onto it.
        if matches!(
            self.cur,
            Scan::Region(SectorKind::Mode2Form1 | SectorKind::Mode2Form2)
        ) && window.len() >= 0x10
            && window[..CD_SYNC_NUM_BYTES] == CD_SYNC_HEADER
            && window[CD_MODE_OFFSET] == 0x02
        {
            self.literal_skip = 15;
            return Scan::Region(SectorKind::Literal);
        }

        Scan::Region(detect_sector(window))
    }

    /// Stream the pending run: its (type, count) packet, then the stripped
    /// payload. Returns `Partial` when the step budget runs out; the
    /// remaining work is captured in `self.flush` for the next step.
    fn flush_run(&mut self) -> Result<StepOutcome> {
        let mut step_bytes = 0usize;

        if let Flush::Header { kind, count } = self.flush {
            write_type_count(&mut self.output, kind.code(), count)?;
            self.flush = match kind {
                SectorKind::Literal => Flush::Literals { remaining: count },
                _ => Flush::Sectors {
                    kind,
                    remaining: count,
                },
            };
        }

        if let Flush::Literals { remaining } = &mut self.flush {
            while *remaining > 0 {
                let chunk = (*remaining).min(CD_SECTOR_SIZE as u32) as usize;
                let buf = &mut self.sector_buf[..chunk];
                self.input
                    .read_exact(buf)
                    .map_err(|_| EcmError::ErrorReadingInputFile)?;
                self.output
                    .write_all(buf)
                    .map_err(|_| EcmError::ErrorWritingOutputFile)?;
                *remaining -= chunk as u32;
                step_bytes += chunk;
                self.counter_encode = self
                    .input
                    .stream_position()
                    .map_err(|_| EcmError::ErrorReadingInputFile)?;

                if *remaining > 0 && step_bytes >= self.max_step {
                    return Ok(StepOutcome::Partial);
                }
            }
            return Ok(StepOutcome::Done);
        }

        if let Flush::Sectors { kind, remaining } = &mut self.flush {
            let kind = *kind;
            while *remaining > 0 {
                match kind {
                    SectorKind::Mode1 => {
                        self.input
                            .read_exact(&mut self.sector_buf)
                            .map_err(|_| EcmError::ErrorReadingInputFile)?;
                        self.output
                            .write_all(&self.sector_buf[CD_ADDRESS_OFFSET..CD_ADDRESS_OFFSET + 3])
                            .map_err(|_| EcmError::ErrorWritingOutputFile)?;
                        self.output
                            .write_all(
                                &self.sector_buf
                                    [MODE1_DATA_OFFSET..MODE1_DATA_OFFSET + MODE1_DATA_SIZE],
                            )
                            .map_err(|_| EcmError::ErrorWritingOutputFile)?;
                        step_bytes += 0x003 + MODE1_DATA_SIZE;
                    }
                    SectorKind::Mode2Form1 => {
                        self.input
                            .read_exact(&mut self.sector_buf[..CD_MODE2_BODY_SIZE])
                            .map_err(|_| EcmError::ErrorReadingInputFile)?;
                        self.output
                            .write_all(
                                &self.sector_buf[MODE2_SUBHEADER_SIZE
                                    ..MODE2_SUBHEADER_SIZE + SectorKind::Mode2Form1.stripped_size()],
                            )
                            .map_err(|_| EcmError::ErrorWritingOutputFile)?;
                        step_bytes += CD_MODE2_BODY_SIZE + SectorKind::Mode2Form1.stripped_size();
                    }
                    SectorKind::Mode2Form2 => {
                        self.input
                            .read_exact(&mut self.sector_buf[..CD_MODE2_BODY_SIZE])
                            .map_err(|_| EcmError::ErrorReadingInputFile)?;
                        self.output
                            .write_all(
                                &self.sector_buf[MODE2_SUBHEADER_SIZE
                                    ..MODE2_SUBHEADER_SIZE + SectorKind::Mode2Form2.stripped_size()],
                            )
                            .map_err(|_| EcmError::ErrorWritingOutputFile)?;
                        step_bytes += SectorKind::Mode2Form2.stripped_size();
                    }
                    // literal runs never take the sector path
                    SectorKind::Literal => {}
                }
                *remaining -= 1;
                self.counter_encode = self
                    .input
                    .stream_position()
                    .map_err(|_| EcmError::ErrorReadingInputFile)?;

                if step_bytes >= self.max_step {
                    return Ok(StepOutcome::Partial);
                }
            }
        }

        Ok(StepOutcome::Done)
    }

    /// Emit the end-of-stream sentinel and the trailing EDC, then complete.
    fn finish(&mut self) -> Result<()> {
        write_type_count(&mut self.output, 0, 0)?;

        let edc = mem::replace(&mut self.edc, EDC.digest()).finalize();
        self.output
            .write_u32::<LittleEndian>(edc)
            .map_err(|_| EcmError::ErrorWritingOutputFile)?;
        self.output
            .flush()
            .map_err(|_| EcmError::ErrorWritingOutputFile)?;

        self.progress.state = State::Completed;
        self.progress.analyze_percentage = 100;
        self.progress.codec_percentage = 100;
        self.progress.literal_bytes = self.tally[SectorKind::Literal.code() as usize];
        self.progress.mode_1_sectors = self.tally[SectorKind::Mode1.code() as usize];
        self.progress.mode_2_form_1_sectors = self.tally[SectorKind::Mode2Form1.code() as usize];
        self.progress.mode_2_form_2_sectors = self.tally[SectorKind::Mode2Form2.code() as usize];
        self.progress.bytes_before_processing = self.input_len;
        self.progress.bytes_after_processing = self.output.position();
        Ok(())
    }

    fn refresh_progress(&mut self) {
        self.progress.analyze_percentage = percentage(self.counter_analyze, self.input_len);
        self.progress.codec_percentage = percentage(self.counter_encode, self.input_len);
    }
}
