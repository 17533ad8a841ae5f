/*
 * Copyright 2022 Collabora, Ltd.
 *
 * SPDX-License-Identifier: MIT
 */
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use log::{debug, trace};
use md5::{Digest, Md5};
use thiserror::Error;

use crate::FileEntry;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("could not find file {}", .0.to_string_lossy())]
    Missing(PathBuf),
    #[error("IO error while reading {}: {1}", .0.to_string_lossy())]
    IO(PathBuf, std::io::Error),
    #[error("{0} has no file name")]
    NoFileName(String),
    #[error("{0} and {1} would both be staged as {2}")]
    DuplicateName(String, String, String),
}

type CollectResult<T> = Result<T, CollectError>;

/// Hex MD5 digest of a file's contents.
pub fn hash_file<P: AsRef<Path>>(path: P) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Hex MD5 digest of an in-memory buffer.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Gathers the user's extra files, skipping anything generated.
pub struct Collector {
    root: PathBuf,
    out_dir: PathBuf,
    script: String,
}

impl Collector {
    /// `root` is what relative inputs are resolved against; `out_dir` and
    /// `script` name the build directory and build script to leave out.
    pub fn new<P, Q>(root: P, out_dir: Q, script: &str) -> Self
    where
        P: Into<PathBuf>,
        Q: AsRef<Path>,
    {
        let root = root.into();
        let out_dir = normalize(&root.join(out_dir));
        Collector {
            root,
            out_dir,
            script: script.to_string(),
        }
    }

    pub fn collect<S: AsRef<str>>(&self, names: &[S]) -> CollectResult<Vec<FileEntry>> {
        let mut entries: Vec<FileEntry> = Vec::new();

        for name in names {
            let name = name.as_ref();
            let rel = normalize(Path::new(name));
            let path = rel.to_string_lossy().to_string();
            let location = normalize(&self.root.join(&rel));

            let meta = match fs::metadata(&location) {
                Ok(meta) => meta,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(CollectError::Missing(location));
                }
                Err(e) => return Err(CollectError::IO(location, e)),
            };
            if path == self.script {
                debug!("skipped {}: generated build script", name);
                continue;
            }
            if location.starts_with(&self.out_dir) {
                debug!("skipped {}: inside the build directory", name);
                continue;
            }
            if meta.is_dir() {
                trace!("skipped {}: directory", name);
                continue;
            }

            let file_name = rel
                .file_name()
                .ok_or_else(|| CollectError::NoFileName(name.to_string()))?
                .to_string_lossy()
                .to_string();

            if let Some(prev) = entries.iter().find(|e| e.name == file_name) {
                if prev.location == location {
                    trace!("skipped {}: listed twice", name);
                    continue;
                }
                return Err(CollectError::DuplicateName(
                    prev.path.clone(),
                    path,
                    file_name,
                ));
            }

            let hash = hash_file(&location).map_err(|e| CollectError::IO(location.clone(), e))?;
            trace!("collected {} ({})", path, hash);
            entries.push(FileEntry {
                location,
                name: file_name,
                path,
                hash,
            });
        }

        Ok(entries)
    }
}

/// Install paths the package manager should keep local changes to.
pub fn backup_list(files: &[FileEntry]) -> Vec<String> {
    files
        .iter()
        .filter(|f| f.is_backup())
        .map(|f| f.path.clone())
        .collect()
}
