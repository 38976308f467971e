// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::cmp::Reverse;

use crate::tag;
use crate::{Header, Value};

use super::ProjectError;

/// One release note: when, who, what
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogEntry {
    pub time: u32,
    pub author: String,
    pub text: String,
}

/// Drain the three changelog arrays. Equal lengths enforced; all-absent
/// means no changelog.
pub fn project(header: &mut Header) -> Result<Vec<ChangelogEntry>, ProjectError> {
    let times = header.remove(tag::CHANGELOG_TIME).and_then(Value::into_u32s);
    let authors = header
        .remove(tag::CHANGELOG_NAME)
        .and_then(Value::into_strings);
    let texts = header
        .remove(tag::CHANGELOG_TEXT)
        .and_then(Value::into_strings);

    match (times, authors, texts) {
        (None, None, None) => Ok(vec![]),
        (Some(times), Some(authors), Some(texts))
            if times.len() == authors.len() && times.len() == texts.len() =>
        {
            Ok(times
                .into_iter()
                .zip(authors)
                .zip(texts)
                .map(|((time, author), text)| ChangelogEntry { time, author, text })
                .collect())
        }
        _ => Err(ProjectError::InconsistentChangelog),
    }
}

/// Flatten the changelog in canonical order: newest first, ties broken
/// by author then text.
pub fn flatten(header: &mut Header, entries: &[ChangelogEntry]) {
    if entries.is_empty() {
        return;
    }

    let mut sorted = entries.to_vec();
    sorted.sort_by(|a, b| {
        (Reverse(a.time), &a.author, &a.text).cmp(&(Reverse(b.time), &b.author, &b.text))
    });

    header.insert(
        tag::CHANGELOG_TIME,
        Value::Int32(sorted.iter().map(|e| e.time).collect()),
    );
    header.insert(
        tag::CHANGELOG_NAME,
        Value::StringArray(sorted.iter().map(|e| e.author.clone()).collect()),
    );
    header.insert(
        tag::CHANGELOG_TEXT,
        Value::StringArray(sorted.iter().map(|e| e.text.clone()).collect()),
    );
}
