//! Incremental gzip and brotli encoders that can be reset and reused

use brotli::CompressorWriter;
use bytes::Bytes;
use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};
use std::fmt;
use std::io::{self, Write};

/// Fixed gzip member header: deflate, no flags, no mtime, unknown OS
const GZIP_HEADER: [u8; 10] = [0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff];
const BROTLI_BUFFER_SIZE: usize = 4096;

/// Content codings the service can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentCoding {
    Brotli,
    Gzip,
}

impl ContentCoding {
    /// Token used in `Accept-Encoding` and `Content-Encoding`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Brotli => "br",
            Self::Gzip => "gzip",
        }
    }
}

impl fmt::Display for ContentCoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoder tuning shared by all pooled instances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    pub gzip_level: u32,
    pub brotli_quality: u32,
    pub brotli_window: u32,
}

/// A compressor fed one body chunk at a time
///
/// After `finish` the encoder must be `reset` before it is used again.
pub trait StreamEncoder: Send {
    fn coding(&self) -> ContentCoding;

    /// Compress `chunk` and return whatever output is ready
    fn encode_chunk(&mut self, chunk: &[u8]) -> io::Result<Bytes>;

    /// Terminate the stream and return the remaining output
    fn finish(&mut self) -> io::Result<Bytes>;

    /// Drop all stream state so the encoder can start a new stream
    fn reset(&mut self);
}

pub fn new_encoder(coding: ContentCoding, settings: &EncoderSettings) -> Box<dyn StreamEncoder> {
    match coding {
        ContentCoding::Gzip => Box::new(GzipEncoder::new(settings.gzip_level)),
        ContentCoding::Brotli => Box::new(BrotliEncoder::new(
            settings.brotli_quality,
            settings.brotli_window,
        )),
    }
}

/// gzip framing around a raw deflate stream
///
/// The deflate state is reset in place between streams instead of being
/// reallocated.
pub struct GzipEncoder {
    level: Compression,
    deflate: DeflateEncoder<Vec<u8>>,
    crc: Crc,
    header_written: bool,
}

impl GzipEncoder {
    pub fn new(level: u32) -> Self {
        let level = Compression::new(level);
        Self {
            level,
            deflate: DeflateEncoder::new(Vec::new(), level),
            crc: Crc::new(),
            header_written: false,
        }
    }

    fn take_output(&mut self, out: &mut Vec<u8>) {
        if !self.header_written {
            out.extend_from_slice(&GZIP_HEADER);
            self.header_written = true;
        }
        out.append(self.deflate.get_mut());
    }
}

impl StreamEncoder for GzipEncoder {
    fn coding(&self) -> ContentCoding {
        ContentCoding::Gzip
    }

    fn encode_chunk(&mut self, chunk: &[u8]) -> io::Result<Bytes> {
        self.crc.update(chunk);
        self.deflate.write_all(chunk)?;
        self.deflate.flush()?;

        let mut out = Vec::new();
        self.take_output(&mut out);
        Ok(Bytes::from(out))
    }

    fn finish(&mut self) -> io::Result<Bytes> {
        self.deflate.try_finish()?;

        let mut out = Vec::new();
        self.take_output(&mut out);
        out.extend_from_slice(&self.crc.sum().to_le_bytes());
        out.extend_from_slice(&self.crc.amount().to_le_bytes());
        Ok(Bytes::from(out))
    }

    fn reset(&mut self) {
        let buffer = std::mem::take(self.deflate.get_mut());
        if self.deflate.reset(buffer).is_err() {
            self.deflate = DeflateEncoder::new(Vec::new(), self.level);
        }
        self.deflate.get_mut().clear();
        self.crc.reset();
        self.header_written = false;
    }
}

/// brotli stream encoder
///
/// The brotli crate cannot restart a finished stream, so every stream gets a
/// fresh compressor. What carries over between streams is the output buffer,
/// which keeps its capacity.
pub struct BrotliEncoder {
    quality: u32,
    window: u32,
    writer: Option<CompressorWriter<Vec<u8>>>,
    spare: Vec<u8>,
}

impl BrotliEncoder {
    pub fn new(quality: u32, window: u32) -> Self {
        Self {
            quality,
            window,
            writer: None,
            spare: Vec::new(),
        }
    }

    fn writer(&mut self) -> &mut CompressorWriter<Vec<u8>> {
        let (quality, window) = (self.quality, self.window);
        let spare = &mut self.spare;
        self.writer.get_or_insert_with(|| {
            CompressorWriter::new(std::mem::take(spare), BROTLI_BUFFER_SIZE, quality, window)
        })
    }
}

impl StreamEncoder for BrotliEncoder {
    fn coding(&self) -> ContentCoding {
        ContentCoding::Brotli
    }

    fn encode_chunk(&mut self, chunk: &[u8]) -> io::Result<Bytes> {
        let writer = self.writer();
        writer.write_all(chunk)?;
        writer.flush()?;

        let buffer = writer.get_mut();
        let out = Bytes::copy_from_slice(buffer);
        buffer.clear();
        Ok(out)
    }

    fn finish(&mut self) -> io::Result<Bytes> {
        self.writer();
        let Some(writer) = self.writer.take() else {
            return Err(io::Error::other("brotli stream already finished"));
        };

        let mut buffer = writer.into_inner();
        let out = Bytes::copy_from_slice(&buffer);
        buffer.clear();
        self.spare = buffer;
        Ok(out)
    }

    fn reset(&mut self) {
        // An abandoned stream still owns the buffer
        if let Some(writer) = self.writer.take() {
            let mut buffer = writer.into_inner();
            buffer.clear();
            self.spare = buffer;
        }
    }
}
