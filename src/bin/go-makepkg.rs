/*
 * Copyright 2022 Collabora, Ltd.
 *
 * SPDX-License-Identifier: MIT
 */
use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use go_makepkg::config::{parse_list, Config};
use go_makepkg::generate::Generator;
use go_makepkg::identity::{self, MAINTAINER_VAR};
use log::debug;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "go-makepkg",
    about = "PKGBUILD generator for Golang programs.",
    long_about = "PKGBUILD generator for Golang programs.

Creates a PKGBUILD which builds a package from the given repository, \
optionally including additional files in the package. It can also create a \
simple systemd service file for the program and a .gitignore for the build \
directory.

Additional files are installed by the path they are given with, so a config \
file should be passed as e.g. 'etc/somename/config.conf'. Files under etc/ \
are marked as backup files.

For projects that keep their binaries in sub-directories, append '/...' to \
the repository URL, like:
  go-makepkg \"gb tool\" git://github.com/constabulary/gb/... -B",
    version_short = "v"
)]
struct Opt {
    #[structopt(short = "s", long, help = "Create service file and include it in the package.")]
    service: bool,
    #[structopt(short = "g", long, help = "Create .gitignore file.")]
    gitignore: bool,
    #[structopt(short = "B", long, help = "Run 'makepkg' after creating PKGBUILD.")]
    build: bool,
    #[structopt(short = "c", long, help = "Clean up leftover files and folders.")]
    clean: bool,
    #[structopt(
        short = "n",
        long,
        value_name = "PKGNAME",
        help = "Use the given package name instead of deriving it from <repo>."
    )]
    name: Option<String>,
    #[structopt(short = "l", long, value_name = "LICENSE", default_value = "GPL", help = "License to use.")]
    license: String,
    #[structopt(short = "r", long, value_name = "PKGREL", default_value = "1", help = "Package release number.")]
    release: String,
    #[structopt(
        short = "d",
        long,
        value_name = "DIR",
        default_value = "build",
        parse(from_os_str),
        help = "Directory to place PKGBUILD in."
    )]
    dir: PathBuf,
    #[structopt(short = "o", long, value_name = "NAME", default_value = "PKGBUILD", help = "File to write PKGBUILD to.")]
    output: String,
    #[structopt(
        short = "m",
        long,
        value_name = "NAME",
        env = "GO_MAKEPKG_MAINTAINER",
        help = "Maintainer, defaults to the git identity."
    )]
    maintainer: Option<String>,
    #[structopt(
        short = "p",
        long,
        value_name = "VAR",
        help = "Pass pkgver to the given global variable using ldflags."
    )]
    version_var: Option<String>,
    #[structopt(
        short = "D",
        long,
        value_name = "LIST",
        help = "Comma-separated list of runtime package dependencies (depends)."
    )]
    depends: Option<String>,
    #[structopt(
        short = "M",
        long,
        value_name = "LIST",
        help = "Comma-separated list of make package dependencies (makedepends)."
    )]
    makedepends: Option<String>,
    #[structopt(name = "desc", help = "Package description.")]
    description: String,
    #[structopt(name = "repo", help = "Repository URL, optionally ending in '/...'.")]
    repo: String,
    #[structopt(name = "file", help = "Additional files to include in the package.")]
    files: Vec<String>,
}

impl From<Opt> for Config {
    fn from(opt: Opt) -> Config {
        let mut cfg = Config::new(opt.description, opt.repo);
        cfg.files = opt.files;
        cfg.name = opt.name;
        cfg.license = opt.license;
        cfg.release = opt.release;
        cfg.dir = opt.dir;
        cfg.output = opt.output;
        cfg.maintainer = opt.maintainer;
        cfg.version_var = opt.version_var;
        cfg.depends = opt.depends.as_deref().map(parse_list).unwrap_or_default();
        cfg.makedepends = opt.makedepends.as_deref().map(parse_list).unwrap_or_default();
        cfg.service = opt.service;
        cfg.gitignore = opt.gitignore;
        cfg.build = opt.build;
        cfg.clean = opt.clean;
        cfg
    }
}

fn main() -> Result<()> {
    env_logger::init();

    // Resolved before parsing so that --help can show it.
    if env::var_os(MAINTAINER_VAR).is_none() {
        if let Some(maintainer) = identity::default_maintainer() {
            debug!("default maintainer is {}", maintainer);
            env::set_var(MAINTAINER_VAR, maintainer);
        }
    }

    let config = Config::from(Opt::from_args());
    let root = env::current_dir().context("unable to find the current directory")?;
    let generated = Generator::new(root).run(&config)?;

    println!("{}", generated.script.to_string_lossy());
    Ok(())
}
