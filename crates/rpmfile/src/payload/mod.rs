// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Streaming compression codecs wrapping the cpio payload. Selection is
//! driven by the `PAYLOAD_COMPRESSOR` setting string; codec specifics
//! stay behind the reader/writer pair.

use std::io::{self, BufReader, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use thiserror::Error;
use xz2::read::XzDecoder;
use xz2::stream::{LzmaOptions, Stream};
use xz2::write::XzEncoder;

pub mod cpio;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Format {
    Gzip,
    Lzma,
    Xz,
    Zstd,
}

/// A parsed compressor setting: format plus an optional level hint from
/// the `name:level` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compressor {
    pub format: Format,
    pub level: Option<u32>,
}

impl Compressor {
    /// Parse a `PAYLOAD_COMPRESSOR` setting. The empty string selects
    /// gzip, matching what old writers omit.
    pub fn parse(setting: &str) -> Result<Self, Error> {
        let (name, level) = match setting.split_once(':') {
            None => (setting, None),
            Some((name, level)) => {
                let level = level
                    .parse::<u32>()
                    .map_err(|_| Error::MalformedSetting(setting.to_owned()))?;
                (name, Some(level))
            }
        };

        let format = match name {
            "" | "gzip" => Format::Gzip,
            "lzma" => Format::Lzma,
            "xz" => Format::Xz,
            "zstd" => Format::Zstd,
            _ => return Err(Error::UnsupportedCompressor(name.to_owned())),
        };

        Ok(Self { format, level })
    }
}

/// Transparent decompression over the remainder of an rpm file
pub enum PayloadReader<R: Read> {
    Gzip(GzDecoder<R>),
    Lzma(XzDecoder<R>),
    Xz(XzDecoder<R>),
    Zstd(zstd::stream::read::Decoder<'static, BufReader<R>>),
}

impl<R: Read> PayloadReader<R> {
    pub fn new(reader: R, compressor: Compressor) -> Result<Self, Error> {
        Ok(match compressor.format {
            Format::Gzip => PayloadReader::Gzip(GzDecoder::new(reader)),
            Format::Lzma => {
                let stream = Stream::new_lzma_decoder(u64::MAX).map_err(into_io)?;
                PayloadReader::Lzma(XzDecoder::new_stream(reader, stream))
            }
            Format::Xz => PayloadReader::Xz(XzDecoder::new(reader)),
            Format::Zstd => {
                let mut decoder = zstd::stream::read::Decoder::new(reader)?;
                decoder.window_log_max(31)?;
                PayloadReader::Zstd(decoder)
            }
        })
    }
}

impl<R: Read> Read for PayloadReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            PayloadReader::Gzip(reader) => reader.read(buf),
            PayloadReader::Lzma(reader) => reader.read(buf),
            PayloadReader::Xz(reader) => reader.read(buf),
            PayloadReader::Zstd(reader) => reader.read(buf),
        }
    }
}

/// Transparent compression producing the payload section
pub enum PayloadWriter<W: Write> {
    Gzip(GzEncoder<W>),
    Lzma(XzEncoder<W>),
    Xz(XzEncoder<W>),
    Zstd(zstd::stream::write::Encoder<'static, W>),
}

impl<W: Write> PayloadWriter<W> {
    pub fn new(writer: W, compressor: Compressor) -> Result<Self, Error> {
        Ok(match compressor.format {
            Format::Gzip => {
                let level = compressor
                    .level
                    .map(flate2::Compression::new)
                    .unwrap_or_default();
                PayloadWriter::Gzip(GzEncoder::new(writer, level))
            }
            Format::Lzma => {
                let options = LzmaOptions::new_preset(compressor.level.unwrap_or(6)).map_err(into_io)?;
                let stream = Stream::new_lzma_encoder(&options).map_err(into_io)?;
                PayloadWriter::Lzma(XzEncoder::new_stream(writer, stream))
            }
            Format::Xz => PayloadWriter::Xz(XzEncoder::new(writer, compressor.level.unwrap_or(6))),
            Format::Zstd => PayloadWriter::Zstd(zstd::stream::write::Encoder::new(
                writer,
                compressor.level.unwrap_or(0) as i32,
            )?),
        })
    }

    /// Flush the trailing frame and hand back the inner writer
    pub fn finish(self) -> Result<W, Error> {
        Ok(match self {
            PayloadWriter::Gzip(encoder) => encoder.finish()?,
            PayloadWriter::Lzma(encoder) => encoder.finish()?,
            PayloadWriter::Xz(encoder) => encoder.finish()?,
            PayloadWriter::Zstd(encoder) => encoder.finish()?,
        })
    }
}

impl<W: Write> Write for PayloadWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            PayloadWriter::Gzip(writer) => writer.write(buf),
            PayloadWriter::Lzma(writer) => writer.write(buf),
            PayloadWriter::Xz(writer) => writer.write(buf),
            PayloadWriter::Zstd(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            PayloadWriter::Gzip(writer) => writer.flush(),
            PayloadWriter::Lzma(writer) => writer.flush(),
            PayloadWriter::Xz(writer) => writer.flush(),
            PayloadWriter::Zstd(writer) => writer.flush(),
        }
    }
}

fn into_io(error: xz2::stream::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, error)
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported compressor: {0}")]
    UnsupportedCompressor(String),
    #[error("malformed compressor setting: {0}")]
    MalformedSetting(String),
    #[error("archive: {0}")]
    Archive(#[from] cpio::Error),
    #[error("io")]
    Io(#[from] io::Error),
}
