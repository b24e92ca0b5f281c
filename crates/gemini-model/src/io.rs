//! Byte-level plumbing for the streamed response body.

#[cfg(test)]
use std::collections::VecDeque;

use bytes::Bytes;
use reqwest::Response;

/// A transport-level read failure.
#[derive(Debug, PartialEq, Eq)]
pub struct TransportError;

/// An adapter for streaming byte chunks.
pub enum ChunkSource {
    Response(Response),
    #[cfg(test)]
    Scripted(VecDeque<Bytes>),
}

impl ChunkSource {
    pub fn from_response(response: Response) -> Self {
        ChunkSource::Response(response)
    }

    #[cfg(test)]
    pub fn from_script(chunks: VecDeque<Bytes>) -> Self {
        ChunkSource::Scripted(chunks)
    }

    #[inline]
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
        match self {
            ChunkSource::Response(response) => {
                let Ok(chunk) = response.chunk().await else {
                    return Err(TransportError);
                };
                Ok(chunk)
            }
            #[cfg(test)]
            ChunkSource::Scripted(chunks) => Ok(chunks.pop_front()),
        }
    }
}

/// A reader that extracts `data` payloads from a server-sent-event
/// chunk stream.
///
/// Event blocks that carry no `data` field, or that are not valid
/// UTF-8, are skipped instead of failing the stream. Only a read
/// failure on the underlying transport is an error.
pub struct SseReader {
    buf: Vec<u8>,
    chunks: ChunkSource,
}

impl SseReader {
    #[inline]
    pub fn new(chunks: ChunkSource) -> Self {
        Self {
            buf: Vec::new(),
            chunks,
        }
    }

    /// Returns the next `data` payload, or `None` when the stream ends.
    pub async fn next_data(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            // Drain complete event blocks already in the buffer.
            while let Some(block) = self.take_block() {
                match parse_data_field(&block) {
                    Some(data) => return Ok(Some(data)),
                    None => {
                        debug!("skipping sse frame without data field");
                    }
                }
            }

            // The buffer holds no complete event, read more.
            let Some(bytes) = self.chunks.next_chunk().await? else {
                return Ok(None);
            };
            self.buf.extend_from_slice(&bytes);
        }
    }

    /// Removes and returns the next complete event block, bytes up to
    /// the blank-line terminator.
    ///
    /// For `end-of-line`, we only handle line feed.
    ///
    /// event         = *( comment / field ) end-of-line
    /// field         = 1*name-char [ colon [ space ] *any-char ] end-of-line
    /// end-of-line   = ( cr lf / cr / lf )
    fn take_block(&mut self) -> Option<Vec<u8>> {
        let eol_idx = self.buf.windows(2).position(|w| w == b"\n\n")?;
        let block = self.buf[..eol_idx].to_vec();
        self.buf.drain(0..eol_idx + 2);
        Some(block)
    }
}

/// Extracts the payload of the first `data` field in an event block.
///
/// The block terminator is ASCII, so blocks always split on character
/// boundaries; a block that still fails UTF-8 validation is malformed
/// and yields `None`.
fn parse_data_field(block: &[u8]) -> Option<String> {
    let block = str::from_utf8(block).ok()?;
    for line in block.lines() {
        let Some(payload) = line.strip_prefix("data:") else {
            continue;
        };
        let payload = payload.strip_prefix(' ').unwrap_or(payload);
        return Some(payload.to_owned());
    }
    None
}
