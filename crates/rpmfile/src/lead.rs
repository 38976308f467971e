// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::io::{self, Read, Write};

use thiserror::Error;

use crate::{ReadExt, WriteExt};

pub const MAGIC: [u8; 4] = [0xed, 0xab, 0xee, 0xdb];

/// Length of the NUL padded name-version field
const NAME_SIZE: usize = 66;

/// The legacy 96 byte preamble of an RPM file. Modern readers ignore
/// almost all of it, but writers still have to emit it correctly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lead {
    pub major: u8,
    pub minor: u8,
    pub file_type: u16,
    pub arch_num: u16,
    pub name: String,
    pub os_num: u16,
    pub signature_type: u16,
}

impl Lead {
    pub const SIZE: usize = 96;

    /// Lead for a binary package named `name-version`
    pub fn new(name: &str) -> Self {
        Self {
            major: 3,
            minor: 0,
            file_type: 0,
            arch_num: 0,
            name: name.to_owned(),
            os_num: 1,
            signature_type: 5,
        }
    }

    pub fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_array(MAGIC)?;
        writer.write_array([self.major, self.minor])?;
        writer.write_u16(self.file_type)?;
        writer.write_u16(self.arch_num)?;

        let mut name = [0u8; NAME_SIZE];
        let bytes = self.name.as_bytes();
        // Truncate over-long names, always leaving a terminator
        let length = bytes.len().min(NAME_SIZE - 1);
        name[..length].copy_from_slice(&bytes[..length]);
        writer.write_array(name)?;

        writer.write_u16(self.os_num)?;
        writer.write_u16(self.signature_type)?;
        writer.write_array([0u8; 16])?;

        Ok(())
    }

    pub fn decode<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let magic: [u8; 4] = reader.read_array()?;
        if magic != MAGIC {
            return Err(DecodeError::InvalidMagic);
        }

        let [major, minor] = reader.read_array()?;
        if (major, minor) != (3, 0) {
            return Err(DecodeError::UnsupportedVersion { major, minor });
        }

        let file_type = reader.read_u16()?;
        let arch_num = reader.read_u16()?;

        let name: [u8; NAME_SIZE] = reader.read_array()?;
        let length = name.iter().position(|&b| b == 0).unwrap_or(NAME_SIZE);
        let name = String::from_utf8_lossy(&name[..length]).into_owned();

        let os_num = reader.read_u16()?;
        let signature_type = reader.read_u16()?;
        let _reserved: [u8; 16] = reader.read_array()?;

        Ok(Self {
            major,
            minor,
            file_type,
            arch_num,
            name,
            os_num,
            signature_type,
        })
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("not an rpm file")]
    InvalidMagic,
    #[error("unsupported rpm version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },
    #[error("io")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;

    fn literal() -> Vec<u8> {
        let mut bytes = vec![0xed, 0xab, 0xee, 0xdb, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00];
        let mut name = b"pkg-1.0".to_vec();
        name.resize(NAME_SIZE, 0);
        bytes.extend(name);
        bytes.extend([0x00, 0x01, 0x00, 0x05]);
        bytes.extend([0u8; 16]);
        bytes
    }

    #[test]
    fn decode_literal_buffer() {
        let bytes = literal();
        assert_eq!(bytes.len(), Lead::SIZE);

        let lead = Lead::decode(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(lead.name, "pkg-1.0");
        assert_eq!(lead.major, 3);
        assert_eq!(lead.os_num, 1);
        assert_eq!(lead.signature_type, 5);
    }

    #[test]
    fn encode_matches_literal() {
        let mut bytes = vec![];
        Lead::new("pkg-1.0").encode(&mut bytes).unwrap();
        assert_eq!(bytes, literal());
    }

    #[test]
    fn long_names_are_truncated() {
        let mut bytes = vec![];
        Lead::new(&"x".repeat(80)).encode(&mut bytes).unwrap();
        assert_eq!(bytes.len(), Lead::SIZE);

        let lead = Lead::decode(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(lead.name.len(), NAME_SIZE - 1);
    }

    #[test]
    fn bad_magic_is_rejected() {
        assert!(matches!(
            Lead::decode(&mut Cursor::new(&[0u8; 96])),
            Err(DecodeError::InvalidMagic)
        ));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut bytes = literal();
        bytes[4] = 4;
        assert!(matches!(
            Lead::decode(&mut Cursor::new(&bytes)),
            Err(DecodeError::UnsupportedVersion { major: 4, minor: 0 })
        ));
    }
}
