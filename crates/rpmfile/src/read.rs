// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::io::{self, Cursor, Read, Seek, SeekFrom};

use log::trace;
use thiserror::Error;

use crate::payload::{cpio, Compressor, PayloadReader};
use crate::{header, lead, package, payload};
use crate::{Header, HeaderKind, Lead, Package};

/// Parse a full RPM file: lead, signature header, alignment padding,
/// immutable header, then the compressed cpio payload whose members are
/// attached to the manifest in order.
pub fn read<R: Read + Seek>(mut reader: R) -> Result<Package, Error> {
    let lead = Lead::decode(&mut reader)?;
    trace!("read lead for {}", lead.name);

    // Sizes, digests and signatures all describe bytes a rewrite
    // replaces, so nothing of the signature header is retained.
    let _signatures = Header::decode(&mut reader, HeaderKind::Signatures)?;

    // The immutable header starts at the next 8 byte boundary,
    // measured from the start of the file.
    let position = reader.stream_position()?;
    let pad = (8 - position % 8) % 8;
    if pad > 0 {
        reader.seek(SeekFrom::Current(pad as i64))?;
    }

    let header = Header::decode(&mut reader, HeaderKind::Immutable)?;
    let mut package = Package::from_header(header)?;

    let compressor = Compressor::parse(&package.compressor)?;
    let mut archive = cpio::Reader::new(PayloadReader::new(reader, compressor)?);

    let mut index = 0;
    while let Some(entry) = archive.next_entry()? {
        let Some(file) = package.files.get_mut(index) else {
            return Err(Error::PayloadManifestMismatch);
        };
        file.body = entry.body;
        index += 1;
    }
    if index != package.files.len() {
        return Err(Error::TruncatedPayload);
    }

    Ok(package)
}

pub fn read_bytes(bytes: &[u8]) -> Result<Package, Error> {
    read(Cursor::new(bytes))
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("lead: {0}")]
    Lead(#[from] lead::DecodeError),
    #[error("header: {0}")]
    Header(#[from] header::DecodeError),
    #[error("projection: {0}")]
    Project(#[from] package::ProjectError),
    #[error("payload: {0}")]
    Payload(#[from] payload::Error),
    #[error("archive: {0}")]
    Archive(#[from] cpio::Error),
    #[error("payload ended before the file manifest was satisfied")]
    TruncatedPayload,
    #[error("payload carries more members than the file manifest")]
    PayloadManifestMismatch,
    #[error("io")]
    Io(#[from] io::Error),
}
