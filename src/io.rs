//! Positional adapters over plain byte streams.
//!
//! The codec reports byte positions in its progress record, but the decoder
//! must also run over unseekable sources such as a pipe. These thin wrappers
//! keep the absolute stream position as bytes flow through them.

use std::io::{self, Read, Write};

/// `Read` adapter tracking the absolute number of bytes consumed.
pub(crate) struct CountingReader<R: Read> {
    inner: R,
    position: u64,
}

impl<R: Read> CountingReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        CountingReader { inner, position: 0 }
    }

    /// Absolute position: bytes read so far.
    pub(crate) fn position(&self) -> u64 {
        self.position
    }

    pub(crate) fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

/// `Write` adapter tracking the absolute number of bytes emitted.
pub(crate) struct CountingWriter<W: Write> {
    inner: W,
    position: u64,
}

impl<W: Write> CountingWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        CountingWriter { inner, position: 0 }
    }

    /// Absolute position: bytes written so far.
    pub(crate) fn position(&self) -> u64 {
        self.position
    }

    pub(crate) fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_follow_the_stream() {
        let mut reader = CountingReader::new(&[1u8, 2, 3, 4, 5][..]);
        let mut buf = [0u8; 3];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(reader.position(), 3);

        let mut writer = CountingWriter::new(Vec::new());
        writer.write_all(&buf).unwrap();
        writer.write_all(&buf).unwrap();
        assert_eq!(writer.position(), 6);
        assert_eq!(writer.into_inner().len(), 6);
    }
}
