use super::error::WireError;
use crate::constants::LENGTH_PREFIX_SIZE;

/// Prefixes `payload` with its length as a 4-byte big-endian integer.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, WireError> {
    let length = u32::try_from(payload.len()).map_err(|_| WireError::FrameTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    frame.extend_from_slice(&length.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Reassembles length-prefixed frames from an arbitrarily chunked byte stream.
pub struct FrameDecoder {
    buffer: Vec<u8>,
    max_frame_size: Option<usize>,
}

impl FrameDecoder {
    pub fn new(max_frame_size: Option<usize>) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame_size,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Returns the next complete payload, `None` if more bytes are needed.
    /// An oversized length header is an error and the stream is unusable
    /// afterwards.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, WireError> {
        if self.buffer.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let mut header = [0u8; LENGTH_PREFIX_SIZE];
        header.copy_from_slice(&self.buffer[..LENGTH_PREFIX_SIZE]);
        let length = u32::from_be_bytes(header) as usize;

        if let Some(max) = self.max_frame_size {
            if length > max {
                return Err(WireError::FrameTooLarge { size: length, max });
            }
        }

        let end = LENGTH_PREFIX_SIZE + length;
        if self.buffer.len() < end {
            return Ok(None);
        }

        let payload = self.buffer[LENGTH_PREFIX_SIZE..end].to_vec();
        self.buffer.drain(..end);
        Ok(Some(payload))
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
