// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use crate::tag;
use crate::{Header, Value};

pub const DEFAULT_INTERPRETER: &str = "/bin/sh";

/// A scriptlet body plus the interpreter that runs it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub body: String,
    pub interpreter: String,
}

impl Script {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            interpreter: DEFAULT_INTERPRETER.to_owned(),
        }
    }
}

/// The six scriptlet slots a package may carry. Each slot flattens into
/// its own `(body, interpreter)` tag pair; empty slots emit nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scripts {
    pub pretrans: Option<Script>,
    pub prein: Option<Script>,
    pub postin: Option<Script>,
    pub preun: Option<Script>,
    pub postun: Option<Script>,
    pub posttrans: Option<Script>,
}

impl Scripts {
    pub fn project(header: &mut Header) -> Self {
        Self {
            pretrans: take(header, tag::PRETRANS, tag::PRETRANS_PROG),
            prein: take(header, tag::PREIN, tag::PREIN_PROG),
            postin: take(header, tag::POSTIN, tag::POSTIN_PROG),
            preun: take(header, tag::PREUN, tag::PREUN_PROG),
            postun: take(header, tag::POSTUN, tag::POSTUN_PROG),
            posttrans: take(header, tag::POSTTRANS, tag::POSTTRANS_PROG),
        }
    }

    pub fn flatten(&self, header: &mut Header) {
        emit(header, tag::PRETRANS, tag::PRETRANS_PROG, &self.pretrans);
        emit(header, tag::PREIN, tag::PREIN_PROG, &self.prein);
        emit(header, tag::POSTIN, tag::POSTIN_PROG, &self.postin);
        emit(header, tag::PREUN, tag::PREUN_PROG, &self.preun);
        emit(header, tag::POSTUN, tag::POSTUN_PROG, &self.postun);
        emit(header, tag::POSTTRANS, tag::POSTTRANS_PROG, &self.posttrans);
    }
}

fn take(header: &mut Header, body_tag: u32, prog_tag: u32) -> Option<Script> {
    let body = header.remove(body_tag).and_then(Value::into_string);
    let interpreter = header.remove(prog_tag).and_then(Value::into_string);

    let body = body.filter(|body| !body.is_empty())?;
    Some(Script {
        body,
        interpreter: interpreter.unwrap_or_else(|| DEFAULT_INTERPRETER.to_owned()),
    })
}

fn emit(header: &mut Header, body_tag: u32, prog_tag: u32, script: &Option<Script>) {
    let Some(script) = script else {
        return;
    };
    if script.body.is_empty() {
        return;
    }

    header.insert(body_tag, Value::String(script.body.clone()));
    header.insert(prog_tag, Value::String(script.interpreter.clone()));
}
