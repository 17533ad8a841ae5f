/*
 * Copyright 2022 Collabora, Ltd.
 *
 * SPDX-License-Identifier: MIT
 */
use std::fmt;

use log::trace;
use thiserror::Error;

/// Suffix Go tooling uses to mean "this package and everything below it".
pub const WILDCARD: &str = "/...";

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("repository URL {0} has no scheme")]
    NoScheme(String),
    #[error("unable to parse repository URL {0}: {1}")]
    Parse(String, url::ParseError),
    #[error("cannot derive a package name from {0}; use -n")]
    NoName(String),
}

/// Strip the wildcard marker, reporting whether it was present.
pub fn trim_wildcard(raw: &str) -> (&str, bool) {
    match raw.strip_suffix(WILDCARD) {
        Some(trimmed) => (trimmed, true),
        None => (raw, false),
    }
}

/// Turn `user@host:path` authorities into `user@host/path`.
///
/// A numeric port is a real port and is left alone.
fn fix_scp_authority(rest: &str) -> String {
    let end = rest.find('/').unwrap_or_else(|| rest.len());
    let authority = &rest[..end];
    let host_start = authority.rfind('@').map(|i| i + 1).unwrap_or(0);
    let host = &authority[host_start..];
    if host.starts_with('[') {
        return rest.to_string();
    }

    match host.find(':') {
        Some(colon) if !host[colon + 1..].chars().all(|c| c.is_ascii_digit()) => {
            let at = host_start + colon;
            format!("{}/{}", &rest[..at], &rest[at + 1..])
        }
        _ => rest.to_string(),
    }
}

/// A repository URL in the form the package builder can fetch from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoUrl {
    url: String,
    scheme_end: usize,
    wildcard: bool,
}

impl RepoUrl {
    pub fn parse(raw: &str) -> Result<RepoUrl, RepoError> {
        let (trimmed, wildcard) = trim_wildcard(raw);

        let (scheme, rest) = match trimmed.split_once("://") {
            Some((scheme, rest)) => (scheme, rest.to_string()),
            None => {
                // git@github.com:user/repo.git
                let colon = trimmed
                    .find(':')
                    .filter(|&c| !trimmed[..c].contains('/') && c > 0)
                    .ok_or_else(|| RepoError::NoScheme(raw.to_string()))?;
                ("ssh", format!("{}/{}", &trimmed[..colon], &trimmed[colon + 1..]))
            }
        };

        let scheme = if scheme.eq_ignore_ascii_case("ssh") || scheme.eq_ignore_ascii_case("ssh+git")
        {
            "git+ssh"
        } else {
            scheme
        };

        let url = format!("{}://{}", scheme, fix_scp_authority(&rest));
        url::Url::parse(&url).map_err(|e| RepoError::Parse(raw.to_string(), e))?;
        trace!("normalized {} to {} (wildcard: {})", raw, url, wildcard);

        Ok(RepoUrl {
            scheme_end: scheme.len(),
            url,
            wildcard,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn scheme(&self) -> &str {
        &self.url[..self.scheme_end]
    }

    /// Whether every main package under the repository should be built.
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Package name derived from the last path segment, minus its extension.
    pub fn package_name(&self) -> Result<String, RepoError> {
        let path = self.url[self.scheme_end + 3..].trim_end_matches('/');
        let base = path.rsplit('/').next().unwrap_or(path);
        let stem = match base.rfind('.') {
            Some(dot) if dot > 0 => &base[..dot],
            _ => base,
        };
        if stem.is_empty() || !path.contains('/') {
            return Err(RepoError::NoName(self.url.clone()));
        }
        Ok(stem.to_string())
    }

    /// The URL as a VCS source, prefixed with `git+` unless the scheme
    /// already says git.
    pub fn source(&self) -> String {
        let scheme = self.scheme();
        if scheme == "git" || scheme.starts_with("git+") {
            self.url.clone()
        } else {
            format!("git+{}", self.url)
        }
    }
}

impl fmt::Display for RepoUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}
