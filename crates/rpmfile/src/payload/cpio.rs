// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! cpio *newc* (new ASCII) archive support, the payload framing rpm
//! uses inside its compressed stream.

use std::io::{self, Read, Write};

use thiserror::Error;

use crate::ReadExt;

pub const MAGIC: &[u8; 6] = b"070701";

const TRAILER: &str = "TRAILER!!!";

/// Magic plus thirteen 8-digit hex fields
const HEADER_SIZE: usize = 110;

/// One archive member, body included. rpm stores a symlink's target as
/// the member body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub mode: u32,
    pub mtime: u32,
    pub body: Vec<u8>,
}

/// Streams entries into a *newc* archive, tracking the plain byte count
/// for the payload size bookkeeping.
pub struct Writer<W: Write> {
    writer: W,
    bytes: u64,
    inode: u32,
}

impl<W: Write> Writer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            bytes: 0,
            inode: 0,
        }
    }

    pub fn append(&mut self, name: &str, mode: u32, mtime: u32, body: &[u8]) -> io::Result<()> {
        self.inode += 1;
        self.entry(self.inode, name, mode, mtime, body)
    }

    /// Terminate the archive. Returns the inner writer and the total
    /// number of archive bytes produced.
    pub fn finish(mut self) -> io::Result<(W, u64)> {
        self.entry(0, TRAILER, 0, 0, &[])?;
        Ok((self.writer, self.bytes))
    }

    fn entry(&mut self, inode: u32, name: &str, mode: u32, mtime: u32, body: &[u8]) -> io::Result<()> {
        let name_size = name.len() as u32 + 1;

        let mut header = Vec::with_capacity(HEADER_SIZE + name.len() + 4);
        header.extend_from_slice(MAGIC);
        for field in [
            inode,
            mode,
            0, // uid: ownership travels in the package header
            0, // gid
            1, // nlink
            mtime,
            body.len() as u32,
            0, // devmajor
            0, // devminor
            0, // rdevmajor
            0, // rdevminor
            name_size,
            0, // checksum, unused by the 070701 variant
        ] {
            write!(header, "{field:08x}")?;
        }
        header.extend_from_slice(name.as_bytes());
        header.push(0);
        // Header plus name pads to a four byte boundary, as does the body
        while header.len() % 4 != 0 {
            header.push(0);
        }

        self.writer.write_all(&header)?;
        self.writer.write_all(body)?;
        let body_pad = (4 - body.len() % 4) % 4;
        self.writer.write_all(&[0u8; 3][..body_pad])?;

        self.bytes += header.len() as u64 + body.len() as u64 + body_pad as u64;

        Ok(())
    }
}

/// Walks the members of a *newc* archive in order.
pub struct Reader<R: Read> {
    reader: R,
    done: bool,
}

impl<R: Read> Reader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            done: false,
        }
    }

    /// Next member, or `None` once the trailer (or a clean end of
    /// stream) is reached.
    pub fn next_entry(&mut self) -> Result<Option<Entry>, Error> {
        if self.done {
            return Ok(None);
        }

        let mut magic = [0u8; 6];
        match self.reader.read_exact(&mut magic) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => {
                self.done = true;
                return Ok(None);
            }
            Err(error) => return Err(error.into()),
        }
        if &magic != MAGIC {
            return Err(Error::BadMagic);
        }

        let _inode = self.read_hex()?;
        let mode = self.read_hex()?;
        let _uid = self.read_hex()?;
        let _gid = self.read_hex()?;
        let _nlink = self.read_hex()?;
        let mtime = self.read_hex()?;
        let body_size = self.read_hex()? as usize;
        let _devmajor = self.read_hex()?;
        let _devminor = self.read_hex()?;
        let _rdevmajor = self.read_hex()?;
        let _rdevminor = self.read_hex()?;
        let name_size = self.read_hex()? as usize;
        let _checksum = self.read_hex()?;

        let name_bytes = self.reader.read_vec(name_size)?;
        let name = match name_bytes.split_last() {
            Some((&0, name)) => String::from_utf8_lossy(name).into_owned(),
            _ => return Err(Error::FilenameDecode),
        };
        let name_pad = (4 - (HEADER_SIZE + name_size) % 4) % 4;
        self.reader.read_vec(name_pad)?;

        if name == TRAILER {
            self.done = true;
            return Ok(None);
        }

        let body = self.reader.read_vec(body_size)?;
        let body_pad = (4 - body_size % 4) % 4;
        self.reader.read_vec(body_pad)?;

        Ok(Some(Entry {
            name,
            mode,
            mtime,
            body,
        }))
    }

    fn read_hex(&mut self) -> Result<u32, Error> {
        let bytes: [u8; 8] = self.reader.read_array()?;
        let text = std::str::from_utf8(&bytes).map_err(|_| Error::BadHeaderField)?;
        u32::from_str_radix(text, 16).map_err(|_| Error::BadHeaderField)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("bad archive magic")]
    BadMagic,
    #[error("archive header field is not hexadecimal")]
    BadHeaderField,
    #[error("archive member name could not be decoded")]
    FilenameDecode,
    #[error("io")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod test {
    use super::*;

    fn collect(bytes: &[u8]) -> Vec<Entry> {
        let mut reader = Reader::new(bytes);
        let mut entries = vec![];
        while let Some(entry) = reader.next_entry().unwrap() {
            entries.push(entry);
        }
        entries
    }

    #[test]
    fn roundtrip() {
        let mut writer = Writer::new(vec![]);
        writer
            .append("./usr/bin/hello", 0o100755, 7, b"#!/bin/sh\n")
            .unwrap();
        writer.append("./usr/bin/hi", 0o120777, 7, b"hello").unwrap();
        let (bytes, plain) = writer.finish().unwrap();
        assert_eq!(bytes.len() as u64, plain);

        let entries = collect(&bytes);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "./usr/bin/hello");
        assert_eq!(entries[0].mode, 0o100755);
        assert_eq!(entries[0].mtime, 7);
        assert_eq!(entries[0].body, b"#!/bin/sh\n");
        assert_eq!(entries[1].body, b"hello");
    }

    #[test]
    fn members_are_four_byte_aligned() {
        // Name lengths chosen so both pad branches are exercised
        for name in ["./a", "./ab", "./abc", "./abcd"] {
            let mut writer = Writer::new(vec![]);
            writer.append(name, 0o100644, 0, b"xyz").unwrap();
            writer.append("./tail", 0o100644, 0, b"").unwrap();
            let (bytes, _) = writer.finish().unwrap();

            let entries = collect(&bytes);
            assert_eq!(entries.len(), 2, "name {name:?}");
            assert_eq!(entries[0].body, b"xyz");
        }
    }

    #[test]
    fn empty_archive_is_just_a_trailer() {
        let (bytes, plain) = Writer::new(vec![]).finish().unwrap();
        assert!(plain > 0);
        assert!(collect(&bytes).is_empty());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut reader = Reader::new(&b"07070200000000"[..]);
        assert!(matches!(reader.next_entry(), Err(Error::BadMagic)));
    }
}
