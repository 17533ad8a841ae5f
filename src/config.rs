/*
 * Copyright 2022 Collabora, Ltd.
 *
 * SPDX-License-Identifier: MIT
 */
use std::path::PathBuf;

pub const DEFAULT_LICENSE: &str = "GPL";
pub const DEFAULT_RELEASE: &str = "1";
pub const DEFAULT_DIR: &str = "build";
pub const DEFAULT_OUTPUT: &str = "PKGBUILD";

/// Everything one invocation needs, as parsed from the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub description: String,
    pub repo: String,
    pub files: Vec<String>,
    /// Overrides the name derived from the repository URL.
    pub name: Option<String>,
    pub license: String,
    pub release: String,
    pub dir: PathBuf,
    pub output: String,
    pub maintainer: Option<String>,
    /// Global variable that receives `$pkgver` through `-ldflags -X`.
    pub version_var: Option<String>,
    pub depends: Vec<String>,
    pub makedepends: Vec<String>,
    pub service: bool,
    pub gitignore: bool,
    pub build: bool,
    pub clean: bool,
}

impl Config {
    pub fn new<D: Into<String>, R: Into<String>>(description: D, repo: R) -> Self {
        Config {
            description: description.into(),
            repo: repo.into(),
            files: Vec::new(),
            name: None,
            license: DEFAULT_LICENSE.to_string(),
            release: DEFAULT_RELEASE.to_string(),
            dir: PathBuf::from(DEFAULT_DIR),
            output: DEFAULT_OUTPUT.to_string(),
            maintainer: None,
            version_var: None,
            depends: Vec::new(),
            makedepends: Vec::new(),
            service: false,
            gitignore: false,
            build: false,
            clean: false,
        }
    }
}

/// Split a comma-separated package list, dropping blank entries.
pub fn parse_list(src: &str) -> Vec<String> {
    src.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = Config::new("desc", "git://example.com/foo/bar.git");
        assert_eq!(cfg.license, "GPL");
        assert_eq!(cfg.release, "1");
        assert_eq!(cfg.dir, PathBuf::from("build"));
        assert_eq!(cfg.output, "PKGBUILD");
        assert!(!cfg.service && !cfg.gitignore && !cfg.build && !cfg.clean);
    }

    #[test]
    fn lists() {
        assert_eq!(parse_list("glibc, openssl,,"), vec!["glibc", "openssl"]);
        assert!(parse_list("").is_empty());
    }
}
