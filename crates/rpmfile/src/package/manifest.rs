// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use sha2::{Digest, Sha256};

use crate::tag;
use crate::{Header, Value};

use super::ProjectError;

/// Classification bits for `FILE_FLAGS`. A file may carry several,
/// OR-ed together; zero marks a plain file.
pub mod flags {
    pub const NONE: u32 = 0;
    pub const CONFIG: u32 = 1 << 0;
    pub const DOC: u32 = 1 << 1;
    /// Reserved, conforming packages do not set it
    pub const DO_NOT_USE: u32 = 1 << 2;
    pub const MISSING_OK: u32 = 1 << 3;
    pub const NO_REPLACE: u32 = 1 << 4;
    pub const SPEC: u32 = 1 << 5;
    /// Owned but not shipped in the payload, e.g. a runtime log file
    pub const GHOST: u32 = 1 << 6;
    pub const LICENCE: u32 = 1 << 7;
    pub const README: u32 = 1 << 8;
    pub const PUBKEY: u32 = 1 << 11;
    pub const ARTIFACT: u32 = 1 << 12;
}

/// One file carried by the package.
///
/// `body` holds the payload bytes; for symlinks it mirrors the link
/// target. The on-wire form splits `path` into an interned directory
/// and a basename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub body: Vec<u8>,
    pub mode: u16,
    pub owner: String,
    pub group: String,
    pub mtime: u32,
    pub digest: String,
    pub link_to: String,
    pub flags: u32,
}

impl FileEntry {
    /// A regular file; the digest is derived from the body.
    pub fn regular(
        path: impl Into<String>,
        mode: u16,
        owner: impl Into<String>,
        group: impl Into<String>,
        mtime: u32,
        body: Vec<u8>,
    ) -> Self {
        let digest = hex::encode(Sha256::digest(&body));
        Self {
            path: path.into(),
            body,
            mode,
            owner: owner.into(),
            group: group.into(),
            mtime,
            digest,
            link_to: String::new(),
            flags: flags::NONE,
        }
    }

    /// A symbolic link; the target doubles as the payload body.
    pub fn symlink(path: impl Into<String>, target: impl Into<String>, mtime: u32) -> Self {
        let target = target.into();
        Self {
            path: path.into(),
            body: target.clone().into_bytes(),
            mode: 0o120777,
            owner: "root".to_owned(),
            group: "root".to_owned(),
            mtime,
            digest: String::new(),
            link_to: target,
            flags: flags::NONE,
        }
    }

    pub fn size(&self) -> u32 {
        self.body.len() as u32
    }

    /// Directory (with trailing slash) and basename halves of the path
    fn split(&self) -> (&str, &str) {
        match self.path.rfind('/') {
            Some(at) => (&self.path[..=at], &self.path[at + 1..]),
            None => ("", self.path.as_str()),
        }
    }
}

/// Flatten the manifest into its parallel arrays, interning directories
/// in first-seen order. An empty manifest emits nothing.
pub fn flatten(header: &mut Header, files: &[FileEntry]) {
    if files.is_empty() {
        return;
    }

    let mut dirnames: Vec<String> = vec![];
    let mut dirindexes = Vec::with_capacity(files.len());
    let mut basenames = Vec::with_capacity(files.len());

    for file in files {
        let (dir, base) = file.split();
        let index = match dirnames.iter().position(|d| d == dir) {
            Some(index) => index,
            None => {
                dirnames.push(dir.to_owned());
                dirnames.len() - 1
            }
        };
        dirindexes.push(index as u32);
        basenames.push(base.to_owned());
    }

    header.insert(tag::BASENAMES, Value::StringArray(basenames));
    header.insert(tag::DIR_INDEXES, Value::Int32(dirindexes));
    header.insert(tag::DIR_NAMES, Value::StringArray(dirnames));
    header.insert(
        tag::FILE_SIZES,
        Value::Int32(files.iter().map(FileEntry::size).collect()),
    );
    header.insert(
        tag::FILE_MODES,
        Value::Int16(files.iter().map(|f| f.mode).collect()),
    );
    header.insert(
        tag::FILE_USER_NAME,
        Value::StringArray(files.iter().map(|f| f.owner.clone()).collect()),
    );
    header.insert(
        tag::FILE_GROUP_NAME,
        Value::StringArray(files.iter().map(|f| f.group.clone()).collect()),
    );
    header.insert(
        tag::FILE_MTIMES,
        Value::Int32(files.iter().map(|f| f.mtime).collect()),
    );
    header.insert(
        tag::FILE_DIGESTS,
        Value::StringArray(files.iter().map(|f| f.digest.clone()).collect()),
    );
    header.insert(
        tag::FILE_LINK_TOS,
        Value::StringArray(files.iter().map(|f| f.link_to.clone()).collect()),
    );
    header.insert(
        tag::FILE_FLAGS,
        Value::Int32(files.iter().map(|f| f.flags).collect()),
    );
    header.insert(
        tag::FILE_DIGEST_ALGO,
        Value::Int32(vec![tag::DIGEST_ALGO_SHA256]),
    );
}

/// Drain the manifest arrays back into file records. Bodies are not
/// part of the header; the payload reader attaches them afterwards.
pub fn project(header: &mut Header) -> Result<Vec<FileEntry>, ProjectError> {
    let basenames = header.remove(tag::BASENAMES).and_then(Value::into_strings);
    let dirindexes = header.remove(tag::DIR_INDEXES).and_then(Value::into_u32s);
    let dirnames = header.remove(tag::DIR_NAMES).and_then(Value::into_strings);
    let sizes = header.remove(tag::FILE_SIZES).and_then(Value::into_u32s);
    let modes = header.remove(tag::FILE_MODES).and_then(Value::into_u16s);
    let owners = header
        .remove(tag::FILE_USER_NAME)
        .and_then(Value::into_strings);
    let groups = header
        .remove(tag::FILE_GROUP_NAME)
        .and_then(Value::into_strings);
    let mtimes = header.remove(tag::FILE_MTIMES).and_then(Value::into_u32s);
    let digests = header
        .remove(tag::FILE_DIGESTS)
        .and_then(Value::into_strings);
    let link_tos = header
        .remove(tag::FILE_LINK_TOS)
        .and_then(Value::into_strings);
    let file_flags = header.remove(tag::FILE_FLAGS).and_then(Value::into_u32s);

    let present = [
        basenames.is_some(),
        dirindexes.is_some(),
        dirnames.is_some(),
        sizes.is_some(),
        modes.is_some(),
        owners.is_some(),
        groups.is_some(),
        mtimes.is_some(),
        digests.is_some(),
        link_tos.is_some(),
        file_flags.is_some(),
    ];
    // All absent means no files; partial presence is a damaged manifest
    if present.iter().all(|&p| !p) {
        return Ok(vec![]);
    }
    let (
        Some(basenames),
        Some(dirindexes),
        Some(dirnames),
        Some(sizes),
        Some(modes),
        Some(owners),
        Some(groups),
        Some(mtimes),
        Some(digests),
        Some(link_tos),
        Some(file_flags),
    ) = (
        basenames, dirindexes, dirnames, sizes, modes, owners, groups, mtimes, digests, link_tos,
        file_flags,
    )
    else {
        return Err(ProjectError::InconsistentManifest);
    };

    let count = basenames.len();

    if [
        dirindexes.len(),
        sizes.len(),
        modes.len(),
        owners.len(),
        groups.len(),
        mtimes.len(),
        digests.len(),
        link_tos.len(),
        file_flags.len(),
    ]
    .iter()
    .any(|&len| len != count)
    {
        return Err(ProjectError::InconsistentManifest);
    }

    let mut files = Vec::with_capacity(count);
    for i in 0..count {
        let dir = dirnames
            .get(dirindexes[i] as usize)
            .ok_or(ProjectError::InconsistentManifest)?;
        files.push(FileEntry {
            path: format!("{dir}{}", basenames[i]),
            body: vec![],
            mode: modes[i],
            owner: owners[i].clone(),
            group: groups[i].clone(),
            mtime: mtimes[i],
            digest: digests[i].clone(),
            link_to: link_tos[i].clone(),
            flags: file_flags[i],
        });
    }

    Ok(files)
}

#[cfg(test)]
mod test {
    use crate::HeaderKind;

    use super::*;

    #[test]
    fn directories_are_interned() {
        let files = vec![
            FileEntry::regular("/usr/bin/hello", 0o100755, "root", "root", 1, b"a".to_vec()),
            FileEntry::regular("/usr/bin/hi", 0o100755, "root", "root", 1, b"b".to_vec()),
            FileEntry::regular("/etc/hello.conf", 0o100644, "root", "root", 1, b"c".to_vec()),
        ];

        let mut header = Header::new(HeaderKind::Immutable);
        flatten(&mut header, &files);

        assert_eq!(
            header.get(tag::DIR_NAMES),
            Some(&Value::StringArray(vec![
                "/usr/bin/".into(),
                "/etc/".into()
            ]))
        );
        assert_eq!(
            header.get(tag::DIR_INDEXES),
            Some(&Value::Int32(vec![0, 0, 1]))
        );
        assert_eq!(
            header.get(tag::BASENAMES),
            Some(&Value::StringArray(vec![
                "hello".into(),
                "hi".into(),
                "hello.conf".into()
            ]))
        );
    }

    #[test]
    fn roundtrip_preserves_records() {
        let mut config =
            FileEntry::regular("/etc/hello.conf", 0o100644, "root", "root", 7, b"x".to_vec());
        config.flags = flags::CONFIG | flags::NO_REPLACE;
        let files = vec![
            config,
            FileEntry::symlink("/usr/bin/hi", "hello", 7),
        ];

        let mut header = Header::new(HeaderKind::Immutable);
        flatten(&mut header, &files);
        let mut reread = project(&mut header).unwrap();

        // Bodies travel in the payload, not the header
        assert!(reread.iter().all(|f| f.body.is_empty()));
        reread[0].body = b"x".to_vec();
        reread[1].body = b"hello".to_vec();
        assert_eq!(reread, files);

        // Digest algorithm marker is regenerated, not projected
        assert_eq!(header.len(), 1);
        assert!(header.get(tag::FILE_DIGEST_ALGO).is_some());
    }

    #[test]
    fn empty_manifest_emits_nothing() {
        let mut header = Header::new(HeaderKind::Immutable);
        flatten(&mut header, &[]);
        assert!(header.is_empty());
        assert!(project(&mut header).unwrap().is_empty());
    }

    #[test]
    fn missing_array_is_inconsistent() {
        let files = vec![FileEntry::regular(
            "/usr/bin/hello",
            0o100755,
            "root",
            "root",
            1,
            b"a".to_vec(),
        )];
        let mut header = Header::new(HeaderKind::Immutable);
        flatten(&mut header, &files);
        header.remove(tag::FILE_MTIMES);

        assert!(matches!(
            project(&mut header),
            Err(ProjectError::InconsistentManifest)
        ));
    }

    #[test]
    fn dangling_dirindex_is_inconsistent() {
        let files = vec![FileEntry::regular(
            "/usr/bin/hello",
            0o100755,
            "root",
            "root",
            1,
            b"a".to_vec(),
        )];
        let mut header = Header::new(HeaderKind::Immutable);
        flatten(&mut header, &files);
        header.insert(tag::DIR_INDEXES, Value::Int32(vec![4]));

        assert!(matches!(
            project(&mut header),
            Err(ProjectError::InconsistentManifest)
        ));
    }
}
