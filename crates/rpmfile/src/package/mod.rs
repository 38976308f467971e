// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::collections::BTreeMap;

use log::trace;
use thiserror::Error;

use crate::tag;
use crate::{Header, HeaderKind, Value};

pub use self::changelog::ChangelogEntry;
pub use self::manifest::{flags, FileEntry};
pub use self::relation::{sense, Relation};
pub use self::script::{Script, Scripts};

pub mod changelog;
pub mod manifest;
pub mod relation;
pub mod script;

/// Tags consumed on read and regenerated (or deliberately dropped) on
/// the next write. Keeping the per-file stat tags in the opaque bag
/// would re-emit stale parallel arrays once the manifest is mutated.
const DRAINED: [u32; 11] = [
    tag::HEADER_I18N_TABLE,
    tag::SIZE,
    tag::PAYLOAD_FORMAT,
    tag::PAYLOAD_FLAGS,
    tag::PAYLOAD_DIGEST,
    tag::PAYLOAD_DIGEST_ALGO,
    tag::FILE_DIGEST_ALGO,
    tag::FILE_INODES,
    tag::FILE_VERIFY_FLAGS,
    tag::FILE_RDEVS,
    tag::FILE_LANGS,
];

/// The projected view of an RPM: flat metadata, dependency relations,
/// changelog, scriptlets, the file manifest, and whatever header tags
/// the projection does not understand.
///
/// Construct one fresh with [`Package::new`] and fill it by mutation,
/// or parse one with [`crate::read`]. [`Package::write`] serialises the
/// state at call time without consuming it.
pub struct Package {
    pub name: String,
    pub version: String,
    pub release: String,
    pub epoch: Option<u32>,
    pub summary: String,
    pub description: String,
    pub arch: String,
    pub os: String,
    pub vendor: String,
    pub url: String,
    pub packager: String,
    pub group: String,
    pub licence: String,
    pub build_host: String,
    pub source_rpm: String,
    pub build_time: Option<u32>,
    pub prefixes: Vec<String>,
    /// Payload compressor setting, e.g. `gzip` or `zstd:19`
    pub compressor: String,

    pub provides: Vec<Relation>,
    pub requires: Vec<Relation>,
    pub conflicts: Vec<Relation>,
    pub obsoletes: Vec<Relation>,
    pub suggests: Vec<Relation>,
    pub recommends: Vec<Relation>,

    pub changelog: Vec<ChangelogEntry>,
    pub scripts: Scripts,
    pub files: Vec<FileEntry>,

    /// Header tags preserved verbatim across read-modify-write
    pub unknown: BTreeMap<u32, Value>,

    pub(crate) signer: Option<Signer>,
}

impl Package {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        release: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            release: release.into(),
            epoch: None,
            summary: String::new(),
            description: String::new(),
            arch: "noarch".to_owned(),
            os: "linux".to_owned(),
            vendor: String::new(),
            url: String::new(),
            packager: String::new(),
            group: String::new(),
            licence: String::new(),
            build_host: String::new(),
            source_rpm: String::new(),
            build_time: None,
            prefixes: vec![],
            compressor: "gzip".to_owned(),
            provides: vec![],
            requires: vec![],
            conflicts: vec![],
            obsoletes: vec![],
            suggests: vec![],
            recommends: vec![],
            changelog: vec![],
            scripts: Scripts::default(),
            files: vec![],
            unknown: BTreeMap::new(),
            signer: None,
        }
    }

    pub fn add_file(&mut self, file: FileEntry) {
        self.files.push(file);
    }

    /// Register the signing hook invoked on the next write.
    pub fn set_signer(&mut self, signer: Signer) {
        self.signer = Some(signer);
    }

    /// `version-release`, or just `version` when no release is set
    pub fn full_version(&self) -> String {
        if self.release.is_empty() {
            self.version.clone()
        } else {
            format!("{}-{}", self.version, self.release)
        }
    }

    /// Drain an immutable header into the projected view. Known tags
    /// are consumed; the remainder lands in the opaque bag.
    pub fn from_header(mut header: Header) -> Result<Self, ProjectError> {
        let mut package = Package::new("", "", "");

        package.name = take_string(&mut header, tag::NAME).unwrap_or_default();
        package.version = take_string(&mut header, tag::VERSION).unwrap_or_default();
        package.release = take_string(&mut header, tag::RELEASE).unwrap_or_default();
        package.epoch = take_u32(&mut header, tag::EPOCH);
        package.summary = take_string(&mut header, tag::SUMMARY).unwrap_or_default();
        package.description = take_string(&mut header, tag::DESCRIPTION).unwrap_or_default();
        package.arch = take_string(&mut header, tag::ARCH).unwrap_or_default();
        package.os = take_string(&mut header, tag::OS).unwrap_or_default();
        package.vendor = take_string(&mut header, tag::VENDOR).unwrap_or_default();
        package.url = take_string(&mut header, tag::URL).unwrap_or_default();
        package.packager = take_string(&mut header, tag::PACKAGER).unwrap_or_default();
        package.group = take_string(&mut header, tag::GROUP).unwrap_or_default();
        package.licence = take_string(&mut header, tag::LICENCE).unwrap_or_default();
        package.build_host = take_string(&mut header, tag::BUILDHOST).unwrap_or_default();
        package.source_rpm = take_string(&mut header, tag::SOURCE_RPM).unwrap_or_default();
        package.build_time = take_u32(&mut header, tag::BUILDTIME);
        package.prefixes = header
            .remove(tag::PREFIXES)
            .and_then(Value::into_strings)
            .unwrap_or_default();
        package.compressor = take_string(&mut header, tag::PAYLOAD_COMPRESSOR)
            .unwrap_or_else(|| "gzip".to_owned());

        package.provides = relation::project(&mut header, relation::PROVIDES)?;
        package.requires = relation::project(&mut header, relation::REQUIRES)?;
        package.conflicts = relation::project(&mut header, relation::CONFLICTS)?;
        package.obsoletes = relation::project(&mut header, relation::OBSOLETES)?;
        package.suggests = relation::project(&mut header, relation::SUGGESTS)?;
        package.recommends = relation::project(&mut header, relation::RECOMMENDS)?;

        package.changelog = changelog::project(&mut header)?;
        package.scripts = Scripts::project(&mut header);
        package.files = manifest::project(&mut header)?;

        for tag in DRAINED {
            if header.remove(tag).is_some() {
                trace!("dropping regenerated tag {tag}");
            }
        }

        package.unknown = header.into_entries();

        Ok(package)
    }

    /// Flatten the projected view into a fresh immutable header. The
    /// payload-derived tags (sizes, payload digests) are the writer's
    /// business.
    pub fn to_header(&self) -> Header {
        let mut header = Header::new(HeaderKind::Immutable);

        header.insert(
            tag::HEADER_I18N_TABLE,
            Value::StringArray(vec!["C".to_owned()]),
        );

        insert_string(&mut header, tag::NAME, &self.name);
        insert_string(&mut header, tag::VERSION, &self.version);
        insert_string(&mut header, tag::RELEASE, &self.release);
        if let Some(epoch) = self.epoch {
            header.insert(tag::EPOCH, Value::Int32(vec![epoch]));
        }
        insert_string(&mut header, tag::SUMMARY, &self.summary);
        insert_string(&mut header, tag::DESCRIPTION, &self.description);
        insert_string(&mut header, tag::ARCH, &self.arch);
        insert_string(&mut header, tag::OS, &self.os);
        insert_string(&mut header, tag::VENDOR, &self.vendor);
        insert_string(&mut header, tag::URL, &self.url);
        insert_string(&mut header, tag::PACKAGER, &self.packager);
        insert_string(&mut header, tag::GROUP, &self.group);
        insert_string(&mut header, tag::LICENCE, &self.licence);
        insert_string(&mut header, tag::BUILDHOST, &self.build_host);
        insert_string(&mut header, tag::SOURCE_RPM, &self.source_rpm);
        if let Some(time) = self.build_time {
            header.insert(tag::BUILDTIME, Value::Int32(vec![time]));
        }
        if !self.prefixes.is_empty() {
            header.insert(tag::PREFIXES, Value::StringArray(self.prefixes.clone()));
        }

        relation::flatten(&mut header, relation::PROVIDES, &self.provides);
        relation::flatten(&mut header, relation::REQUIRES, &self.requires);
        relation::flatten(&mut header, relation::CONFLICTS, &self.conflicts);
        relation::flatten(&mut header, relation::OBSOLETES, &self.obsoletes);
        relation::flatten(&mut header, relation::SUGGESTS, &self.suggests);
        relation::flatten(&mut header, relation::RECOMMENDS, &self.recommends);

        changelog::flatten(&mut header, &self.changelog);
        self.scripts.flatten(&mut header);
        manifest::flatten(&mut header, &self.files);

        header.extend(self.unknown.clone());

        header
    }
}

fn take_string(header: &mut Header, tag: u32) -> Option<String> {
    header.remove(tag).and_then(Value::into_string)
}

fn take_u32(header: &mut Header, tag: u32) -> Option<u32> {
    header.remove(tag).as_ref().and_then(Value::as_u32)
}

fn insert_string(header: &mut Header, tag: u32, value: &str) {
    if !value.is_empty() {
        header.insert(tag, Value::String(value.to_owned()));
    }
}

/// An externally supplied signing function plus the signature tag its
/// output is stored under. The library never touches keys itself.
pub struct Signer {
    tag: u32,
    func: Box<dyn Fn(&[u8]) -> Result<Vec<u8>, SignError> + Send + Sync>,
}

impl Signer {
    /// Store the signature under `SIG_PGP`
    pub fn pgp(func: impl Fn(&[u8]) -> Result<Vec<u8>, SignError> + Send + Sync + 'static) -> Self {
        Self {
            tag: tag::sig::PGP,
            func: Box::new(func),
        }
    }

    /// Store the signature under `SIG_RSA`
    pub fn rsa(func: impl Fn(&[u8]) -> Result<Vec<u8>, SignError> + Send + Sync + 'static) -> Self {
        Self {
            tag: tag::sig::RSA,
            func: Box::new(func),
        }
    }

    pub(crate) fn tag(&self) -> u32 {
        self.tag
    }

    pub(crate) fn sign(&self, bytes: &[u8]) -> Result<Vec<u8>, SignError> {
        (self.func)(bytes)
    }
}

#[derive(Debug, Error)]
#[error("signer failure: {0}")]
pub struct SignError(pub String);

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("relation arrays starting at tag {tag} are partial or disagree in length")]
    InconsistentRelation { tag: u32 },
    #[error("changelog arrays are partial or disagree in length")]
    InconsistentChangelog,
    #[error("file manifest arrays are partial or disagree in length")]
    InconsistentManifest,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn projection_roundtrip() {
        let mut package = Package::new("hello", "1.0", "1");
        package.epoch = Some(2);
        package.summary = "greeter".into();
        package.licence = "MIT".into();
        package.prefixes = vec!["/usr".into()];
        package.build_time = Some(1_700_000_000);
        package.requires.push(Relation {
            name: "libc.so.6".into(),
            version: String::new(),
            sense: sense::ANY,
        });
        package.scripts.postin = Some(Script::new("ldconfig"));
        package.unknown.insert(9999, Value::String("keep".into()));

        let reread = Package::from_header(package.to_header()).unwrap();

        assert_eq!(reread.name, package.name);
        assert_eq!(reread.version, package.version);
        assert_eq!(reread.release, package.release);
        assert_eq!(reread.epoch, package.epoch);
        assert_eq!(reread.summary, package.summary);
        assert_eq!(reread.licence, package.licence);
        assert_eq!(reread.prefixes, package.prefixes);
        assert_eq!(reread.build_time, package.build_time);
        assert_eq!(reread.requires, package.requires);
        assert_eq!(reread.scripts, package.scripts);
        assert_eq!(reread.unknown, package.unknown);
    }

    #[test]
    fn absent_scalars_emit_no_entries() {
        let package = Package::new("hello", "1.0", "1");
        let header = package.to_header();

        assert!(header.get(tag::VENDOR).is_none());
        assert!(header.get(tag::URL).is_none());
        assert!(header.get(tag::EPOCH).is_none());
    }

    #[test]
    fn localised_scalars_are_accepted() {
        let mut header = Package::new("hello", "1.0", "1").to_header();
        header.insert(
            tag::SUMMARY,
            Value::I18nString(vec!["greeter".into(), "saluto".into()]),
        );

        let package = Package::from_header(header).unwrap();
        assert_eq!(package.summary, "greeter");
    }
}
