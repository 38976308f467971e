// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::collections::BTreeMap;
use std::io::{self, Read, Write};

use thiserror::Error;

use crate::{ReadExt, WriteExt};

pub use self::value::{Kind, Value};

pub mod value;

/// Magic plus four reserved bytes opening every header
pub const MAGIC: [u8; 8] = [0x8e, 0xad, 0xe8, 0x01, 0, 0, 0, 0];

/// Bytes per index record, and per eigen payload
const RECORD_SIZE: usize = 16;

/// Which of the two header sections an index belongs to. The value
/// doubles as the tag of the self-referential eigen entry.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum HeaderKind {
    Signatures = 0x3e,
    Immutable = 0x3f,
}

/// A tag keyed map of typed entries, the core structure of both the
/// signature section and the immutable metadata section.
///
/// The eigen entry is not stored here; it is synthesised on encode and
/// validated away on decode. Encoding canonicalises tag order to
/// ascending and zeroes all alignment padding, so a header encodes
/// identically regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    kind: HeaderKind,
    entries: BTreeMap<u32, Value>,
}

impl Header {
    pub fn new(kind: HeaderKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> HeaderKind {
        self.kind
    }

    pub fn insert(&mut self, tag: u32, value: Value) {
        self.entries.insert(tag, value);
    }

    pub fn remove(&mut self, tag: u32) -> Option<Value> {
        self.entries.remove(&tag)
    }

    pub fn get(&self, tag: u32) -> Option<&Value> {
        self.entries.get(&tag)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = (u32, Value)>) {
        self.entries.extend(entries);
    }

    pub fn into_entries(self) -> BTreeMap<u32, Value> {
        self.entries
    }

    pub fn encode<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        // First pass: lay out the data region so offsets are known.
        let mut data = vec![];
        let mut records = Vec::with_capacity(self.entries.len());
        for (&tag, value) in &self.entries {
            let alignment = value.kind().alignment();
            while data.len() % alignment != 0 {
                data.push(0);
            }
            records.push((tag, value.kind().code(), data.len() as u32, value.count() as u32));
            value.encode_into(&mut data);
        }

        // The eigen payload goes last in the data region. It is itself an
        // index record whose offset is the negative byte length of the
        // index array.
        let total = self.entries.len() as u32 + 1;
        data.extend_from_slice(&(self.kind as u32).to_be_bytes());
        data.extend_from_slice(&Kind::Binary.code().to_be_bytes());
        data.extend_from_slice(&(-((RECORD_SIZE as u32 * total) as i32)).to_be_bytes());
        data.extend_from_slice(&(RECORD_SIZE as u32).to_be_bytes());

        writer.write_array(MAGIC)?;
        writer.write_u32(total)?;
        writer.write_u32(data.len() as u32)?;

        // Eigen index record first, then the real entries in tag order
        writer.write_u32(self.kind as u32)?;
        writer.write_u32(Kind::Binary.code())?;
        writer.write_u32(data.len() as u32 - RECORD_SIZE as u32)?;
        writer.write_u32(RECORD_SIZE as u32)?;
        for (tag, code, offset, count) in records {
            writer.write_u32(tag)?;
            writer.write_u32(code)?;
            writer.write_u32(offset)?;
            writer.write_u32(count)?;
        }

        writer.write_all(&data)?;

        Ok(())
    }

    pub fn decode<R: Read>(reader: &mut R, expected: HeaderKind) -> Result<Self, DecodeError> {
        let magic: [u8; 8] = reader.read_array()?;
        if magic != MAGIC {
            return Err(DecodeError::InvalidMagic);
        }

        let count = reader.read_u32()? as usize;
        let size = reader.read_u32()? as usize;
        if count == 0 || size < RECORD_SIZE {
            return Err(DecodeError::CorruptHeader);
        }

        let mut records = Vec::with_capacity(count);
        for _ in 0..count {
            let tag = reader.read_u32()?;
            let code = reader.read_u32()?;
            let offset = reader.read_u32()?;
            let entry_count = reader.read_u32()?;
            records.push((tag, code, offset, entry_count));
        }

        let (eigen_tag, _, eigen_offset, _) = records[0];
        if eigen_tag != expected as u32 {
            return Err(DecodeError::HeaderKindMismatch {
                expected: expected as u32,
                found: eigen_tag,
            });
        }
        if eigen_offset as usize + RECORD_SIZE != size {
            return Err(DecodeError::CorruptHeader);
        }

        let data = reader.read_vec(size)?;

        let mut entries = BTreeMap::new();
        for &(tag, code, offset, entry_count) in &records[1..] {
            let kind = Kind::from_code(code).ok_or(DecodeError::UnsupportedType(code))?;
            let value = Value::decode(kind, &data, offset as usize, entry_count as usize)?;
            if entries.insert(tag, value).is_some() {
                return Err(DecodeError::CorruptHeader);
            }
        }

        Ok(Self {
            kind: expected,
            entries,
        })
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid header magic")]
    InvalidMagic,
    #[error("header kind mismatch: expected {expected:#x}, found {found:#x}")]
    HeaderKindMismatch { expected: u32, found: u32 },
    #[error("header size, offset and count fields disagree")]
    CorruptHeader,
    #[error("header data region ends mid-entry")]
    TruncatedHeader,
    #[error("unsupported entry type code {0:#x}")]
    UnsupportedType(u32),
    #[error("io")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("io")]
    Io(#[from] io::Error),
}
