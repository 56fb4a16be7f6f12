//! Line codec for the ethminer API stream.
//!
//! Wraps [`LinesCodec`] so that a bad line is an item, not a decoder error.
//! `Framed` ends the stream after any decoder error, which would turn one
//! oversized or non-UTF-8 line into a dead connection. Here those lines come
//! out as [`Frame::Undecodable`] and the stream keeps going.

use std::io;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

/// One delimited unit read from the miner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Line(String),
    /// The line was consumed but could not be turned into text.
    Undecodable(String),
}

pub struct LineCodec {
    inner: LinesCodec,
    max_length: usize,
}

impl LineCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            inner: LinesCodec::new_with_max_length(max_length),
            max_length,
        }
    }

    fn frame(&self, decoded: Result<Option<String>, LinesCodecError>) -> Option<Frame> {
        match decoded {
            Ok(line) => line.map(Frame::Line),
            // The inner codec is now discarding up to the next newline.
            Err(LinesCodecError::MaxLineLengthExceeded) => Some(Frame::Undecodable(format!(
                "line longer than {} bytes",
                self.max_length
            ))),
            // LinesCodec does no I/O of its own; its only Io error is a
            // UTF-8 failure on a line already split off the buffer.
            Err(LinesCodecError::Io(e)) => Some(Frame::Undecodable(e.to_string())),
        }
    }
}

impl Decoder for LineCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        let decoded = self.inner.decode(src);
        Ok(self.frame(decoded))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        let decoded = self.inner.decode_eof(src);
        Ok(self.frame(decoded))
    }
}

impl<T: AsRef<str>> Encoder<T> for LineCodec {
    type Error = io::Error;

    fn encode(&mut self, line: T, dst: &mut BytesMut) -> Result<(), io::Error> {
        self.inner.encode(line, dst).map_err(|e| match e {
            LinesCodecError::Io(e) => e,
            LinesCodecError::MaxLineLengthExceeded => {
                io::Error::new(io::ErrorKind::InvalidData, "line too long")
            }
        })
    }
}
