/*
 * Copyright 2022 Collabora, Ltd.
 *
 * SPDX-License-Identifier: MIT
 */
use std::process::{Command, Stdio};

use log::{debug, trace};

/// Environment variable carrying the default maintainer.
pub const MAINTAINER_VAR: &str = "GO_MAKEPKG_MAINTAINER";

fn git_config(git: &str, key: &str) -> Option<String> {
    trace!("querying {} config --global {}", git, key);
    let output = Command::new(git)
        .args(&["config", "--global", key])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| debug!("unable to run {}: {}", git, e))
        .ok()?;

    if !output.status.success() {
        debug!("{} config {} exited with {}", git, key, output.status);
        return None;
    }

    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// `Name <email>` from the given git binary's global configuration.
pub fn lookup(git: &str) -> Option<String> {
    let name = git_config(git, "user.name")?;
    let email = git_config(git, "user.email")?;
    Some(format!("{} <{}>", name, email))
}

/// The maintainer to use when none is given on the command line.
///
/// Any failure, including git not being installed, yields `None`.
pub fn default_maintainer() -> Option<String> {
    lookup("git")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_git_is_not_fatal() {
        assert_eq!(lookup("/nonexistent/git-for-go-makepkg-tests"), None);
    }

    #[test]
    fn failing_git_is_not_fatal() {
        assert_eq!(lookup("false"), None);
    }
}
