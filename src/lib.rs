/*
 * Copyright 2022 Collabora, Ltd.
 *
 * SPDX-License-Identifier: MIT
 */
use std::path::PathBuf;

pub mod collect;
pub mod config;
pub mod generate;
pub mod identity;
pub mod repo;
pub mod template;

/// An item waiting to be staged into a package
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    /// The location on disk of the item
    pub location: PathBuf,
    /// The item's name in the build directory
    pub name: String,
    /// The item's path relative to the filesystem root, as given by the user
    pub path: String,
    /// Hex MD5 digest of the item's contents
    pub hash: String,
}

/// Top-level directories whose entries are installed exactly where their
/// path says.
const SYSTEM_ROOTS: &[&str] = &["etc/", "usr/", "opt/", "var/", "srv/"];

impl FileEntry {
    /// Whether the package manager should preserve local changes to this file.
    pub fn is_backup(&self) -> bool {
        self.path.starts_with("etc/")
    }

    /// Path the item is installed to, relative to the package root.
    ///
    /// Paths under any of `SYSTEM_ROOTS` are kept as given; the generated
    /// unit file relies on this to land in `usr/lib/systemd/system`.
    pub fn install_path(&self) -> String {
        if SYSTEM_ROOTS.iter().any(|root| self.path.starts_with(root)) {
            self.path.clone()
        } else {
            let rel = self.path.strip_prefix("bin/").unwrap_or(&self.name);
            format!("usr/bin/{}", rel)
        }
    }

    /// Permission bits passed to `install -m`.
    pub fn install_mode(&self) -> &'static str {
        if SYSTEM_ROOTS.iter().any(|root| self.path.starts_with(root)) {
            "644"
        } else {
            "755"
        }
    }
}

/// Print a top-level progress line in the style of `makepkg`.
pub fn step(msg: &str) {
    println!("\x1b[1;32m==> \x1b[39m{}\x1b[0m", msg);
}

/// Print a progress line nested under the last [`step`].
pub fn substep(msg: &str) {
    println!("  \x1b[1;34m-> \x1b[39m{}\x1b[0m", msg);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str) -> FileEntry {
        FileEntry {
            location: PathBuf::from(path),
            name: path.rsplit('/').next().unwrap().to_string(),
            path: path.to_string(),
            hash: String::new(),
        }
    }

    #[test]
    fn config_files_install_verbatim() {
        let e = entry("etc/app/config.conf");
        assert!(e.is_backup());
        assert_eq!(e.install_path(), "etc/app/config.conf");
        assert_eq!(e.install_mode(), "644");
    }

    #[test]
    fn unit_files_install_verbatim_without_backup() {
        let e = entry("usr/lib/systemd/system/app.service");
        assert!(!e.is_backup());
        assert_eq!(e.install_path(), "usr/lib/systemd/system/app.service");
    }

    #[test]
    fn other_files_install_as_binaries() {
        assert_eq!(entry("README").install_path(), "usr/bin/README");
        assert_eq!(entry("bin/helper").install_path(), "usr/bin/helper");
        assert_eq!(entry("scripts/run.sh").install_path(), "usr/bin/run.sh");
        assert_eq!(entry("scripts/run.sh").install_mode(), "755");
    }
}
