use bson::Document;
use bytes::BytesMut;

use crate::codec::Codec;
use crate::error::CodecError;

/// Reassembles streamed records from arbitrarily split body chunks.
///
/// Extended JSON records are newline terminated; BSON records carry their own
/// little-endian length prefix.
pub struct RecordDecoder {
    codec: Codec,
    buffer: BytesMut,
    /// Bytes at the front of `buffer` already searched for a newline.
    scanned: usize,
}

impl RecordDecoder {
    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            buffer: BytesMut::new(),
            scanned: 0,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Pop the next complete record, or `None` when more bytes are needed.
    pub fn next_record(&mut self) -> Result<Option<Document>, CodecError> {
        match self.codec {
            Codec::ExtendedJson => loop {
                let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n')
                else {
                    self.scanned = self.buffer.len();
                    return Ok(None);
                };
                let newline = self.scanned + offset;
                self.scanned = 0;
                let mut line = self.buffer.split_to(newline + 1);
                line.truncate(newline);
                if line.last() == Some(&b'\r') {
                    line.truncate(line.len() - 1);
                }
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                return self.codec.decode_record(&line).map(Some);
            },
            Codec::Bson => {
                if self.buffer.len() < 4 {
                    return Ok(None);
                }
                let prefix = &self.buffer[..4];
                let declared = i32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
                let len = usize::try_from(declared)
                    .ok()
                    .filter(|len| *len >= 5)
                    .ok_or_else(|| {
                        CodecError::Syntax(format!("invalid BSON record length {declared}"))
                    })?;
                if self.buffer.len() < len {
                    return Ok(None);
                }
                let record = self.buffer.split_to(len);
                self.codec.decode_record(&record).map(Some)
            }
        }
    }

    /// Check the stream ended on a record boundary.
    pub fn finish(&self) -> Result<(), CodecError> {
        if self.buffer.iter().all(u8::is_ascii_whitespace) {
            Ok(())
        } else {
            Err(CodecError::Truncated)
        }
    }
}
