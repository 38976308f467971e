// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use crate::tag;
use crate::{Header, Value};

use super::ProjectError;

/// Comparison and scope bits carried by a relation's sense field
pub mod sense {
    pub const ANY: u32 = 0;
    pub const LESS: u32 = 1 << 1;
    pub const GREATER: u32 = 1 << 2;
    pub const EQUAL: u32 = 1 << 3;
    pub const INTERP: u32 = 1 << 8;
    pub const SCRIPT_PRE: u32 = 1 << 9;
    pub const SCRIPT_POST: u32 = 1 << 10;
    pub const SCRIPT_PREUN: u32 = 1 << 11;
    pub const SCRIPT_POSTUN: u32 = 1 << 12;
    pub const RPMLIB: u32 = 1 << 24;
}

/// One dependency statement: `name [sense version]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub name: String,
    pub version: String,
    pub sense: u32,
}

/// The tag triple one relation kind is flattened into
#[derive(Debug, Clone, Copy)]
pub struct Tags {
    pub name: u32,
    pub version: u32,
    pub flags: u32,
}

pub const PROVIDES: Tags = Tags {
    name: tag::PROVIDE_NAME,
    version: tag::PROVIDE_VERSION,
    flags: tag::PROVIDE_FLAGS,
};
pub const REQUIRES: Tags = Tags {
    name: tag::REQUIRE_NAME,
    version: tag::REQUIRE_VERSION,
    flags: tag::REQUIRE_FLAGS,
};
pub const CONFLICTS: Tags = Tags {
    name: tag::CONFLICT_NAME,
    version: tag::CONFLICT_VERSION,
    flags: tag::CONFLICT_FLAGS,
};
pub const OBSOLETES: Tags = Tags {
    name: tag::OBSOLETE_NAME,
    version: tag::OBSOLETE_VERSION,
    flags: tag::OBSOLETE_FLAGS,
};
pub const SUGGESTS: Tags = Tags {
    name: tag::SUGGEST_NAME,
    version: tag::SUGGEST_VERSION,
    flags: tag::SUGGEST_FLAGS,
};
pub const RECOMMENDS: Tags = Tags {
    name: tag::RECOMMEND_NAME,
    version: tag::RECOMMEND_VERSION,
    flags: tag::RECOMMEND_FLAGS,
};

/// Drain one relation kind out of a header. All three arrays must be
/// present with equal lengths, or all absent.
pub fn project(header: &mut Header, tags: Tags) -> Result<Vec<Relation>, ProjectError> {
    let names = header.remove(tags.name).and_then(Value::into_strings);
    let versions = header.remove(tags.version).and_then(Value::into_strings);
    let senses = header.remove(tags.flags).and_then(Value::into_u32s);

    match (names, versions, senses) {
        (None, None, None) => Ok(vec![]),
        (Some(names), Some(versions), Some(senses))
            if names.len() == versions.len() && names.len() == senses.len() =>
        {
            Ok(names
                .into_iter()
                .zip(versions)
                .zip(senses)
                .map(|((name, version), sense)| Relation {
                    name,
                    version,
                    sense,
                })
                .collect())
        }
        _ => Err(ProjectError::InconsistentRelation { tag: tags.name }),
    }
}

/// Flatten one relation kind into its three parallel arrays. Empty
/// relations emit nothing.
pub fn flatten(header: &mut Header, tags: Tags, relations: &[Relation]) {
    if relations.is_empty() {
        return;
    }

    header.insert(
        tags.name,
        Value::StringArray(relations.iter().map(|r| r.name.clone()).collect()),
    );
    header.insert(
        tags.version,
        Value::StringArray(relations.iter().map(|r| r.version.clone()).collect()),
    );
    header.insert(
        tags.flags,
        Value::Int32(relations.iter().map(|r| r.sense).collect()),
    );
}
