/*
 * Copyright 2022 Collabora, Ltd.
 *
 * SPDX-License-Identifier: MIT
 */
use std::fs::{self, DirBuilder};
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use log::{debug, trace, warn};
use thiserror::Error;

use crate::collect::{backup_list, hash_bytes, CollectError, Collector};
use crate::config::Config;
use crate::repo::{RepoError, RepoUrl};
use crate::template::{self, Package, PkgbuildTemplate, RenderError, Service, ServiceTemplate};
use crate::{step, substep, FileEntry};

/// The package builder run by `-B`.
pub const MAKEPKG: &str = "makepkg";

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("output directory {} already exists", .0.to_string_lossy())]
    OutputExists(PathBuf),
    #[error("IO error while writing {}: {1}", .0.to_string_lossy())]
    IO(PathBuf, std::io::Error),
    #[error("invalid repository: {0}")]
    Repo(#[from] RepoError),
    #[error("unable to collect package files: {0}")]
    Collect(#[from] CollectError),
    #[error("unable to render template: {0}")]
    Render(#[from] RenderError),
    #[error("unable to run {0}: {1}")]
    Spawn(String, std::io::Error),
    #[error("{0} failed: {1}")]
    Build(String, ExitStatus),
}

type GenerateResult<T> = Result<T, GenerateError>;

/// What a successful run left behind.
#[derive(Debug)]
pub struct Generated {
    pub name: String,
    pub dir: PathBuf,
    pub script: PathBuf,
}

/// Create the build directory, refusing to reuse one that exists.
pub fn create_output_dir<P: AsRef<Path>>(dir: P) -> GenerateResult<()> {
    let dir = dir.as_ref();
    match DirBuilder::new().mode(0o755).create(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(GenerateError::OutputExists(dir.to_path_buf()))
        }
        Err(e) => Err(GenerateError::IO(dir.to_path_buf(), e)),
    }
}

/// Hard link each file into `dir` by name, leaving existing entries alone.
///
/// Links that cannot be made, e.g. across filesystems, fall back to a copy.
pub fn stage_files<P: AsRef<Path>>(files: &[FileEntry], dir: P) -> GenerateResult<()> {
    for file in files {
        substep(&format!("Including file in the package: {}", file.path));
        let target = dir.as_ref().join(&file.name);
        match fs::hard_link(&file.location, &target) {
            Ok(()) => trace!("linked {:?} to {:?}", file.location, target),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!("{:?} already staged", target);
            }
            Err(e) => {
                warn!("unable to link {:?} ({}), copying instead", file.location, e);
                fs::copy(&file.location, &target).map_err(|e| GenerateError::IO(target, e))?;
            }
        }
    }
    Ok(())
}

fn write_file<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> GenerateResult<()> {
    fs::write(path.as_ref(), contents).map_err(|e| GenerateError::IO(path.as_ref().to_path_buf(), e))
}

/// Run the package builder in `dir` with the terminal attached.
pub fn run_build<P: AsRef<Path>>(program: &str, dir: P, clean: bool) -> GenerateResult<()> {
    let mut cmd = Command::new(program);
    cmd.arg("-f");
    if clean {
        cmd.arg("-c");
    }
    cmd.current_dir(dir.as_ref());
    debug!("running {:?} in {:?}", cmd, dir.as_ref());

    let status = cmd
        .status()
        .map_err(|e| GenerateError::Spawn(program.to_string(), e))?;
    if !status.success() {
        return Err(GenerateError::Build(program.to_string(), status));
    }
    Ok(())
}

/// Remove the repository checkout the builder leaves in `dir`.
pub fn clean_up<P: AsRef<Path>>(dir: P, pkgname: &str) -> GenerateResult<()> {
    let checkout = dir.as_ref().join(pkgname);
    match fs::remove_dir_all(&checkout) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(GenerateError::IO(checkout, e)),
    }
}

/// Turns a [`Config`] into a build directory.
pub struct Generator {
    root: PathBuf,
    pkgbuild: PkgbuildTemplate,
    service: ServiceTemplate,
    builder: String,
}

impl Generator {
    /// Relative paths in the configuration are resolved against `root`.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Generator {
            root: root.into(),
            pkgbuild: PkgbuildTemplate::default(),
            service: ServiceTemplate::default(),
            builder: MAKEPKG.to_string(),
        }
    }

    /// Use another program in place of `makepkg`.
    pub fn with_builder<S: Into<String>>(mut self, builder: S) -> Self {
        self.builder = builder.into();
        self
    }

    fn render_unit(
        &self,
        cfg: &Config,
        name: &str,
        out_dir: &Path,
        files: &[FileEntry],
    ) -> GenerateResult<(FileEntry, Vec<u8>)> {
        step("Creating service file...");
        let svc = Service {
            description: cfg.description.clone(),
            exec_name: name.to_string(),
        };
        let mut unit = Vec::new();
        self.service.render(&svc, &mut unit)?;

        let entry = FileEntry {
            location: out_dir.join(svc.unit_name()),
            name: svc.unit_name(),
            path: svc.unit_path(),
            hash: hash_bytes(&unit),
        };
        if let Some(clash) = files.iter().find(|f| f.name == entry.name) {
            return Err(CollectError::DuplicateName(
                clash.path.clone(),
                entry.path,
                entry.name,
            )
            .into());
        }
        Ok((entry, unit))
    }

    pub fn run(&self, cfg: &Config) -> GenerateResult<Generated> {
        let repo = RepoUrl::parse(&cfg.repo)?;
        let name = match cfg.name {
            Some(ref name) => name.clone(),
            None => repo.package_name()?,
        };
        let out_dir = self.root.join(&cfg.dir);

        step("Collecting files...");
        let files = Collector::new(&self.root, &cfg.dir, &cfg.output).collect(&cfg.files)?;

        step("Checking backup files...");
        let backup = backup_list(&files);
        for path in &backup {
            substep(&format!("Adding to backup: {}", path));
        }

        let unit = if cfg.service {
            Some(self.render_unit(cfg, &name, &out_dir, &files)?)
        } else {
            None
        };

        step(&format!("Creating {}...", cfg.output));
        let mut package_files = files.clone();
        if let Some((ref entry, _)) = unit {
            package_files.push(entry.clone());
        }
        let package = Package {
            maintainer: cfg.maintainer.clone(),
            name: name.clone(),
            release: cfg.release.clone(),
            description: cfg.description.clone(),
            repo,
            license: cfg.license.clone(),
            files: package_files,
            backup,
            depends: cfg.depends.clone(),
            makedepends: cfg.makedepends.clone(),
            version_var: cfg.version_var.clone(),
        };
        let mut script = Vec::new();
        self.pkgbuild.render(&package, &mut script)?;

        create_output_dir(&out_dir)?;

        step("Preparing local files...");
        stage_files(&files, &out_dir)?;

        if let Some((entry, unit)) = unit {
            write_file(&entry.location, unit)?;
        }

        let script_path = out_dir.join(&cfg.output);
        write_file(&script_path, script)?;

        if cfg.gitignore {
            step("Creating .gitignore...");
            write_file(out_dir.join(".gitignore"), template::gitignore(&name))?;
        }

        if cfg.build {
            step(&format!("Running {}...", self.builder));
            run_build(&self.builder, &out_dir, cfg.clean)?;
        }

        if cfg.clean {
            step("Cleaning up...");
            clean_up(&out_dir, &name)?;
        }

        Ok(Generated {
            name,
            dir: out_dir,
            script: script_path,
        })
    }
}
