// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// URL construction for the validation server.
//
//   {base}/{resource}                           collection (search, create)
//   {base}/{resource}/{id}                      single record
//   {base}/{resource}?name[0]=contains:{text}   name search

use metasync_core::error::{MetaError, Result};
use url::Url;

/// Server collections the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Dependencies,
    Oes,
    Requests,
    Vendors,
    Persons,
    Addresses,
    Modules,
}

impl Resource {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Dependencies => "dependencies",
            Self::Oes => "oes",
            Self::Requests => "requests",
            Self::Vendors => "vendors",
            Self::Persons => "persons",
            Self::Addresses => "addresses",
            Self::Modules => "modules",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Endpoint builder bound to one server base URL.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    pub fn new(base: &str) -> Result<Self> {
        let trimmed = base.trim_end_matches('/');
        let base = Url::parse(trimmed)
            .map_err(|e| MetaError::Config(format!("invalid server URL '{base}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(MetaError::Config(format!("server URL '{trimmed}' has no path")));
        }
        Ok(Self { base })
    }

    fn base_str(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    pub fn collection(&self, resource: Resource) -> String {
        format!("{}/{}", self.base_str(), resource)
    }

    pub fn record(&self, resource: Resource, id: u32) -> String {
        format!("{}/{}/{}", self.base_str(), resource, id)
    }

    /// Server-relative path of a record, the form used inside payloads
    /// (e.g. `/acvp/v1/dependencies/12`).
    pub fn record_path(&self, resource: Resource, id: u32) -> String {
        format!("{}/{}/{}", self.base.path().trim_end_matches('/'), resource, id)
    }

    /// Case-sensitive substring search on the `name` field.
    pub fn search(&self, resource: Resource, name: &str) -> String {
        format!(
            "{}?name[0]=contains:{}",
            self.collection(resource),
            urlencoding::encode(name)
        )
    }

    /// Turn a link from a server document (absolute, or a server-relative
    /// path) into a full URL.
    pub fn resolve_link(&self, link: &str) -> Result<String> {
        self.base
            .join(link)
            .map(String::from)
            .map_err(|e| MetaError::Malformed(format!("bad link '{link}': {e}")))
    }
}

/// Numeric id at the end of a record URL, e.g. `.../dependencies/1234`.
pub fn trailing_number(url: &str) -> Result<u32> {
    let last = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    last.parse::<u32>()
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| MetaError::Malformed(format!("no numeric id at the end of '{url}'")))
}
