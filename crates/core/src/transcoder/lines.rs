//! Splitting of ffmpeg's diagnostic stream into lines.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK: usize = 4096;

/// Reads lines terminated by `\n`, `\r\n` or a bare `\r`.
///
/// ffmpeg redraws its progress line with carriage returns, so a plain
/// newline splitter would only see progress once the process ends.
/// Invalid UTF-8 is replaced rather than rejected.
///
/// `next_line` is cancel safe: the only await point is a single read, and
/// buffered bytes are never lost if the future is dropped.
#[derive(Debug)]
pub struct DiagnosticLines<R> {
    reader: R,
    buf: Vec<u8>,
    chunk: Box<[u8]>,
    skip_lf: bool,
    eof: bool,
}

impl<R: AsyncRead + Unpin> DiagnosticLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            chunk: vec![0; READ_CHUNK].into_boxed_slice(),
            skip_lf: false,
            eof: false,
        }
    }

    /// Next line without its terminator, or `None` at end of stream.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }
            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let rest = std::mem::take(&mut self.buf);
                return Ok(Some(String::from_utf8_lossy(&rest).into_owned()));
            }

            let n = self.reader.read(&mut self.chunk).await?;
            if n == 0 {
                self.eof = true;
                continue;
            }

            let mut data = &self.chunk[..n];
            if self.skip_lf {
                self.skip_lf = false;
                if data.first() == Some(&b'\n') {
                    data = &data[1..];
                }
            }
            self.buf.extend_from_slice(data);
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|&b| b == b'\n' || b == b'\r')?;
        let terminator = self.buf[pos];
        let mut consumed = pos + 1;

        if terminator == b'\r' {
            match self.buf.get(consumed) {
                Some(b'\n') => consumed += 1,
                Some(_) => {}
                // The matching `\n` may arrive with the next read.
                None => self.skip_lf = true,
            }
        }

        let line = String::from_utf8_lossy(&self.buf[..pos]).into_owned();
        self.buf.drain(..consumed);
        Some(line)
    }
}
