// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::io::{self, Write};

use md5::Md5;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::payload::{cpio, Compressor, PayloadWriter};
use crate::tag;
use crate::{header, package, payload};
use crate::{Header, HeaderKind, Lead, Package, Value};

impl Package {
    /// Serialise the package: lead, signature header, zero padding to
    /// the next 8 byte boundary, immutable header, compressed payload.
    ///
    /// The signature header is assembled last since its tags cover the
    /// already serialised immutable-header-plus-payload range. The
    /// package itself is left untouched.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        let compressor = Compressor::parse(&self.compressor)?;

        // Payload first: cpio members must line up with the manifest
        // arrays, so both come from the same file order.
        let mut archive = cpio::Writer::new(PayloadWriter::new(vec![], compressor)?);
        for file in &self.files {
            archive.append(
                &format!(".{}", file.path),
                file.mode as u32,
                file.mtime,
                &file.body,
            )?;
        }
        let (encoder, plain_size) = archive.finish()?;
        let payload = encoder.finish()?;

        let mut header = self.to_header();
        header.insert(
            tag::SIZE,
            Value::Int32(vec![self.files.iter().map(|f| f.body.len() as u32).sum()]),
        );
        header.insert(tag::PAYLOAD_FORMAT, Value::String("cpio".to_owned()));
        header.insert(
            tag::PAYLOAD_COMPRESSOR,
            Value::String(compressor.format.to_string()),
        );
        header.insert(tag::PAYLOAD_FLAGS, Value::String("9".to_owned()));
        header.insert(
            tag::PAYLOAD_DIGEST,
            Value::StringArray(vec![hex::encode(Sha256::digest(&payload))]),
        );
        header.insert(
            tag::PAYLOAD_DIGEST_ALGO,
            Value::Int32(vec![tag::DIGEST_ALGO_SHA256]),
        );

        let mut immutable = vec![];
        header.encode(&mut immutable)?;

        let mut signatures = Header::new(HeaderKind::Signatures);
        signatures.insert(
            tag::sig::SHA256,
            Value::String(hex::encode(Sha256::digest(&immutable))),
        );
        signatures.insert(
            tag::sig::SIZE,
            Value::Int32(vec![(immutable.len() + payload.len()) as u32]),
        );
        signatures.insert(tag::sig::PAYLOAD_SIZE, Value::Int32(vec![plain_size as u32]));

        let mut md5 = Md5::new();
        md5.update(&immutable);
        md5.update(&payload);
        signatures.insert(tag::sig::MD5, Value::Binary(md5.finalize().to_vec()));

        if let Some(signer) = &self.signer {
            let mut signed = Vec::with_capacity(immutable.len() + payload.len());
            signed.extend_from_slice(&immutable);
            signed.extend_from_slice(&payload);
            signatures.insert(signer.tag(), Value::Binary(signer.sign(&signed)?));
        }

        let mut signature_bytes = vec![];
        signatures.encode(&mut signature_bytes)?;

        Lead::new(&format!("{}-{}", self.name, self.full_version())).encode(writer)?;
        writer.write_all(&signature_bytes)?;
        let pad = (8 - (Lead::SIZE + signature_bytes.len()) % 8) % 8;
        writer.write_all(&[0u8; 7][..pad])?;
        writer.write_all(&immutable)?;
        writer.write_all(&payload)?;

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("header: {0}")]
    Header(#[from] header::EncodeError),
    #[error("payload: {0}")]
    Payload(#[from] payload::Error),
    #[error("signer: {0}")]
    Sign(#[from] package::SignError),
    #[error("io")]
    Io(#[from] io::Error),
}
