// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::io::{Read, Result, Write};

pub mod header;
pub mod lead;
pub mod package;
pub mod payload;
pub mod read;
pub mod tag;
pub mod write;

pub use self::header::{Header, HeaderKind, Value};
pub use self::lead::Lead;
pub use self::package::{FileEntry, Package, Script, SignError, Signer};
pub use self::read::{read, read_bytes};

pub trait ReadExt: Read {
    fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_array()?;
        Ok(u16::from_be_bytes(bytes))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_array()?;
        Ok(u32::from_be_bytes(bytes))
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut bytes = [0u8; N];
        self.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn read_vec(&mut self, length: usize) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; length];
        self.read_exact(&mut bytes)?;
        Ok(bytes)
    }
}

impl<T: Read> ReadExt for T {}

pub trait WriteExt: Write {
    fn write_u16(&mut self, item: u16) -> Result<()> {
        self.write_array(item.to_be_bytes())
    }

    fn write_u32(&mut self, item: u32) -> Result<()> {
        self.write_array(item.to_be_bytes())
    }

    fn write_array<const N: usize>(&mut self, bytes: [u8; N]) -> Result<()> {
        self.write_all(&bytes)?;
        Ok(())
    }
}

impl<T: Write> WriteExt for T {}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::package::{flags, sense, ChangelogEntry, Relation};
    use super::*;

    fn sample() -> Package {
        let mut package = Package::new("hello", "1.0", "1");
        package.summary = "A friendly greeter".into();
        package.description = "Greets the caller.".into();
        package.build_host = "builder.example".into();
        package
    }

    #[test]
    fn empty_package_roundtrip() {
        let package = sample();

        let mut bytes = vec![];
        package.write(&mut bytes).unwrap();

        // Lead, two headers with their eigen entries, empty archive
        assert!(bytes.len() >= 96 + 16 + 16 + 16);

        let reread = read_bytes(&bytes).unwrap();
        assert_eq!(reread.name, "hello");
        assert_eq!(reread.version, "1.0");
        assert_eq!(reread.release, "1");
        assert_eq!(reread.arch, "noarch");
        assert_eq!(reread.os, "linux");
        assert_eq!(reread.summary, package.summary);
        assert_eq!(reread.description, package.description);
        assert_eq!(reread.build_host, "builder.example");
        assert_eq!(reread.compressor, "gzip");
        assert!(reread.files.is_empty());
        assert!(reread.changelog.is_empty());
        assert!(reread.unknown.is_empty());
    }

    #[test]
    fn write_is_deterministic() {
        let mut package = sample();
        package.changelog.push(ChangelogEntry {
            time: 100,
            author: "a".into(),
            text: "x".into(),
        });
        package.add_file(FileEntry::regular(
            "/usr/bin/hello",
            0o100755,
            "root",
            "root",
            1_700_000_000,
            b"#!/bin/sh\necho hello\n".to_vec(),
        ));

        let mut first = vec![];
        package.write(&mut first).unwrap();
        let mut second = vec![];
        package.write(&mut second).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn immutable_header_is_eight_byte_aligned() {
        let package = sample();
        let mut bytes = vec![];
        package.write(&mut bytes).unwrap();

        let mut cursor = Cursor::new(bytes.as_slice());
        cursor.set_position(96);
        Header::decode(&mut cursor, HeaderKind::Signatures).unwrap();

        let position = cursor.position() as usize;
        let aligned = position + (8 - position % 8) % 8;
        assert_eq!(aligned % 8, 0);
        assert_eq!(bytes[aligned..aligned + 8], header::MAGIC);
    }

    #[test]
    fn file_manifest_roundtrip() {
        let mut package = sample();
        package.add_file(FileEntry::regular(
            "/usr/bin/hello",
            0o100755,
            "root",
            "root",
            1_700_000_000,
            b"#!/bin/sh\necho hello\n".to_vec(),
        ));
        package.add_file(FileEntry::symlink(
            "/usr/bin/hi",
            "hello",
            1_700_000_000,
        ));

        let mut bytes = vec![];
        package.write(&mut bytes).unwrap();
        let reread = read_bytes(&bytes).unwrap();

        assert_eq!(reread.files.len(), 2);
        let hello = &reread.files[0];
        assert_eq!(hello.path, "/usr/bin/hello");
        assert_eq!(hello.mode, 0o100755);
        assert_eq!(hello.owner, "root");
        assert_eq!(hello.group, "root");
        assert_eq!(hello.body, b"#!/bin/sh\necho hello\n");
        assert_eq!(hello.flags, flags::NONE);
        assert!(!hello.digest.is_empty());

        let hi = &reread.files[1];
        assert_eq!(hi.path, "/usr/bin/hi");
        assert_eq!(hi.link_to, "hello");
        assert_eq!(hi.body, b"hello");
    }

    #[test]
    fn relations_roundtrip() {
        let mut package = sample();
        package.requires.push(Relation {
            name: "libc.so.6".into(),
            version: String::new(),
            sense: sense::ANY,
        });
        package.provides.push(Relation {
            name: "greeter".into(),
            version: "1.0".into(),
            sense: sense::EQUAL,
        });

        let mut bytes = vec![];
        package.write(&mut bytes).unwrap();
        let reread = read_bytes(&bytes).unwrap();

        assert_eq!(reread.requires, package.requires);
        assert_eq!(reread.provides, package.provides);
        assert!(reread.conflicts.is_empty());
    }

    #[test]
    fn changelog_is_sorted_on_write() {
        let mut package = sample();
        for (time, author, text) in [(100, "a", "x"), (200, "b", "y"), (100, "c", "w")] {
            package.changelog.push(ChangelogEntry {
                time,
                author: author.into(),
                text: text.into(),
            });
        }

        let mut bytes = vec![];
        package.write(&mut bytes).unwrap();
        let reread = read_bytes(&bytes).unwrap();

        let order = reread
            .changelog
            .iter()
            .map(|e| (e.time, e.author.as_str(), e.text.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(order, vec![(200, "b", "y"), (100, "a", "x"), (100, "c", "w")]);
    }

    #[test]
    fn unknown_tags_survive_rewrites() {
        let package = sample();
        let mut bytes = vec![];
        package.write(&mut bytes).unwrap();

        let mut tagged = read_bytes(&bytes).unwrap();
        tagged
            .unknown
            .insert(9999, Value::String("synthetic".into()));

        let mut rewritten = vec![];
        tagged.write(&mut rewritten).unwrap();
        let reread = read_bytes(&rewritten).unwrap();

        assert_eq!(
            reread.unknown.get(&9999),
            Some(&Value::String("synthetic".into()))
        );
    }

    #[test]
    fn metadata_survives_changelog_mutation() {
        let mut package = sample();
        package.changelog.push(ChangelogEntry {
            time: 1,
            author: "a".into(),
            text: "t".into(),
        });

        let mut bytes = vec![];
        package.write(&mut bytes).unwrap();

        let mut mutated = read_bytes(&bytes).unwrap();
        mutated.changelog.clear();
        let mut rewritten = vec![];
        mutated.write(&mut rewritten).unwrap();

        let reread = read_bytes(&rewritten).unwrap();
        assert_eq!(reread.build_host, "builder.example");
        assert!(reread.changelog.is_empty());
    }

    #[test]
    fn signer_output_lands_in_signature_header() {
        let mut package = sample();
        package.set_signer(Signer::pgp(|_| Ok(b"SIG".to_vec())));

        let mut bytes = vec![];
        package.write(&mut bytes).unwrap();

        let mut cursor = Cursor::new(bytes.as_slice());
        cursor.set_position(96);
        let signatures = Header::decode(&mut cursor, HeaderKind::Signatures).unwrap();
        assert_eq!(
            signatures.get(tag::sig::PGP),
            Some(&Value::Binary(b"SIG".to_vec()))
        );
    }

    #[test]
    fn zstd_payload_roundtrip() {
        let mut package = sample();
        package.compressor = "zstd:19".into();
        package.add_file(FileEntry::regular(
            "/usr/share/doc/hello/README",
            0o100644,
            "root",
            "root",
            1_700_000_000,
            b"hello docs\n".to_vec(),
        ));

        let mut bytes = vec![];
        package.write(&mut bytes).unwrap();
        let reread = read_bytes(&bytes).unwrap();

        assert_eq!(reread.compressor, "zstd");
        assert_eq!(reread.files[0].body, b"hello docs\n");
    }
}
