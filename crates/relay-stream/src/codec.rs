use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::{debug, warn};

/// Cuts an upstream byte stream into complete `\n`-terminated lines.
///
/// Bytes are buffered until a newline arrives, so a frame split across any
/// number of network reads decodes the same as one delivered whole. A
/// trailing `\r` is stripped and blank lines are skipped. Lines longer than
/// `max_len` are dropped up to their newline. At end of stream an
/// unterminated tail is discarded, never emitted as a frame.
#[derive(Debug)]
pub struct FrameDecoder {
    max_len: usize,
    /// Where to resume the newline search in the buffer.
    next_index: usize,
    /// Inside an oversized line, waiting for its newline.
    discarding: bool,
}

impl FrameDecoder {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            next_index: 0,
            discarding: false,
        }
    }
}

impl Decoder for FrameDecoder {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        loop {
            let newline = buf[self.next_index..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| self.next_index + offset);

            let Some(end) = newline else {
                if buf.len() > self.max_len {
                    if !self.discarding {
                        warn!(max = self.max_len, "upstream frame exceeds limit, dropping it");
                        self.discarding = true;
                    }
                    buf.clear();
                    self.next_index = 0;
                } else {
                    self.next_index = buf.len();
                }
                return Ok(None);
            };

            self.next_index = 0;
            let line = buf.split_to(end + 1);

            if self.discarding {
                self.discarding = false;
                continue;
            }
            if end > self.max_len {
                warn!(len = end, max = self.max_len, "upstream frame exceeds limit, dropping it");
                continue;
            }

            let mut line = &line[..end];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            if line.is_empty() {
                continue;
            }

            match std::str::from_utf8(line) {
                Ok(text) => return Ok(Some(text.to_string())),
                Err(e) => {
                    debug!(error = %e, "skipping non UTF-8 frame");
                    continue;
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        // The producer terminates every line; a tail here means the
        // connection died mid-frame.
        if !buf.is_empty() && !self.discarding {
            warn!(bytes = buf.len(), "discarding unterminated frame at end of stream");
        }
        buf.clear();
        self.next_index = 0;
        self.discarding = false;
        Ok(None)
    }
}
