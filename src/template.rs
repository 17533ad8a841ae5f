/*
 * Copyright 2022 Collabora, Ltd.
 *
 * SPDX-License-Identifier: MIT
 */
use std::borrow::Cow;
use std::io::{self, Write};

use thiserror::Error;

use crate::repo::RepoUrl;
use crate::FileEntry;

/// Where unit files live, relative to the filesystem root.
pub const UNIT_DIR: &str = "usr/lib/systemd/system";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("the field {0} must not be empty")]
    MissingField(&'static str),
    #[error("invalid {0} {1:?}: {2}")]
    InvalidField(&'static str, String, &'static str),
    #[error("IO error while rendering {0}: {1}")]
    IO(&'static str, std::io::Error),
}

type RenderResult<T> = Result<T, RenderError>;

/// Everything the build script says about the package.
#[derive(Clone, Debug)]
pub struct Package {
    pub maintainer: Option<String>,
    pub name: String,
    pub release: String,
    pub description: String,
    pub repo: RepoUrl,
    pub license: String,
    pub files: Vec<FileEntry>,
    pub backup: Vec<String>,
    pub depends: Vec<String>,
    pub makedepends: Vec<String>,
    pub version_var: Option<String>,
}

impl Package {
    pub fn is_wildcard(&self) -> bool {
        self.repo.is_wildcard()
    }

    fn check(&self) -> RenderResult<()> {
        check_name(&self.name)?;
        check_release(&self.release)?;
        if self.description.trim().is_empty() {
            return Err(RenderError::MissingField("pkgdesc"));
        }
        if self.license.trim().is_empty() {
            return Err(RenderError::MissingField("license"));
        }
        if let Some(ref var) = self.version_var {
            let ok = !var.is_empty()
                && var
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "_./-".contains(c));
            if !ok {
                return Err(RenderError::InvalidField(
                    "version variable",
                    var.clone(),
                    "expected a Go identifier, optionally package-qualified",
                ));
            }
        }
        Ok(())
    }
}

fn check_name(name: &str) -> RenderResult<()> {
    if name.is_empty() {
        return Err(RenderError::MissingField("pkgname"));
    }
    if name.starts_with('-') || name.starts_with('.') {
        return Err(RenderError::InvalidField(
            "pkgname",
            name.to_string(),
            "must not start with '-' or '.'",
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "@._+-".contains(c))
    {
        return Err(RenderError::InvalidField(
            "pkgname",
            name.to_string(),
            "only letters, digits and @._+- are allowed",
        ));
    }
    Ok(())
}

fn check_release(release: &str) -> RenderResult<()> {
    if release.is_empty() {
        return Err(RenderError::MissingField("pkgrel"));
    }
    let parts = release.split('.').collect::<Vec<_>>();
    let digits = parts
        .iter()
        .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    if parts.len() > 2 || !digits {
        return Err(RenderError::InvalidField(
            "pkgrel",
            release.to_string(),
            "expected an integer with an optional .N suffix",
        ));
    }
    Ok(())
}

/// What the unit file needs to know.
#[derive(Clone, Debug)]
pub struct Service {
    pub description: String,
    pub exec_name: String,
}

impl Service {
    pub fn unit_name(&self) -> String {
        format!("{}.service", self.exec_name)
    }

    /// Install path of the unit, relative to the filesystem root.
    pub fn unit_path(&self) -> String {
        format!("{}/{}", UNIT_DIR, self.unit_name())
    }
}

/// Single-quote a value for bash.
fn quoted(value: &str) -> Cow<'_, str> {
    if value.is_empty() {
        return Cow::Borrowed("''");
    }
    match shell_words::quote(value) {
        Cow::Borrowed(plain) => Cow::Owned(format!("'{}'", plain)),
        escaped => escaped,
    }
}

/// Escape a value for use inside a double-quoted bash string.
fn dq_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '$' | '`' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn write_array<W, I, S>(out: &mut W, key: &str, items: I) -> io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let indent = " ".repeat(key.len() + 2);
    write!(out, "{}=(", key)?;
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            write!(out, "\n{}", indent)?;
        }
        write!(out, "{}", quoted(item.as_ref()))?;
    }
    writeln!(out, ")")
}

/// The build script every package gets. Built once per run and borrowed by
/// the generator.
#[derive(Clone, Debug)]
pub struct PkgbuildTemplate {
    pub arch: Vec<&'static str>,
    /// Build dependencies every Go package has.
    pub toolchain: Vec<&'static str>,
}

impl Default for PkgbuildTemplate {
    fn default() -> Self {
        PkgbuildTemplate {
            arch: vec!["i686", "x86_64"],
            toolchain: vec!["go", "git"],
        }
    }
}

impl PkgbuildTemplate {
    pub fn render<W: Write>(&self, pkg: &Package, out: &mut W) -> RenderResult<()> {
        pkg.check()?;
        self.write_header(pkg, out)
            .and_then(|_| self.write_functions(pkg, out))
            .map_err(|e| RenderError::IO("PKGBUILD", e))
    }

    fn write_header<W: Write>(&self, pkg: &Package, out: &mut W) -> io::Result<()> {
        if let Some(ref maintainer) = pkg.maintainer {
            if !maintainer.trim().is_empty() {
                writeln!(out, "# Maintainer: {}", maintainer.replace('\n', " "))?;
                writeln!(out)?;
            }
        }

        writeln!(out, "pkgname={}", pkg.name)?;
        writeln!(out, "pkgver=autogenerated")?;
        writeln!(out, "pkgrel={}", pkg.release)?;
        writeln!(out, "pkgdesc={}", quoted(&pkg.description))?;
        writeln!(
            out,
            "arch=({})",
            self.arch.iter().map(|a| quoted(a)).collect::<Vec<_>>().join(" ")
        )?;
        writeln!(out, "url={}", quoted(pkg.repo.as_str()))?;
        writeln!(out, "license=({})", quoted(&pkg.license))?;

        if !pkg.depends.is_empty() {
            write_array(out, "depends", &pkg.depends)?;
        }

        let mut makedepends = self
            .toolchain
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();
        for dep in &pkg.makedepends {
            if !makedepends.contains(dep) {
                makedepends.push(dep.clone());
            }
        }
        write_array(out, "makedepends", &makedepends)?;

        if !pkg.backup.is_empty() {
            write_array(out, "backup", &pkg.backup)?;
        }

        let repo_source = format!("{}::{}", pkg.name, pkg.repo.source());
        write_array(
            out,
            "source",
            std::iter::once(repo_source.as_str()).chain(pkg.files.iter().map(|f| f.name.as_str())),
        )?;
        write_array(
            out,
            "md5sums",
            std::iter::once("SKIP").chain(pkg.files.iter().map(|f| f.hash.as_str())),
        )?;

        Ok(())
    }

    fn write_functions<W: Write>(&self, pkg: &Package, out: &mut W) -> io::Result<()> {
        writeln!(
            out,
            r#"
pkgver() {{
	cd "$srcdir/$pkgname"
	printf "r%s.%s" "$(git rev-list --count HEAD)" "$(git rev-parse --short HEAD)"
}}

prepare() {{
	cd "$srcdir/$pkgname"
	export GOPATH="$srcdir/gopath"
	export GOFLAGS="-modcacherw"
	if [ -f go.mod ]; then
		go mod download
	fi
}}

build() {{
	cd "$srcdir/$pkgname"
	export GOPATH="$srcdir/gopath"
	export GOFLAGS="-buildmode=pie -trimpath -modcacherw"
	export CGO_CPPFLAGS="$CPPFLAGS" CGO_CFLAGS="$CFLAGS" CGO_CXXFLAGS="$CXXFLAGS" CGO_LDFLAGS="$LDFLAGS"
	mkdir -p "$srcdir/bin""#
        )?;

        let ldflags = match pkg.version_var {
            Some(ref var) if var.contains('.') => format!(" -ldflags \"-X {}=$pkgver\"", var),
            Some(ref var) => format!(" -ldflags \"-X main.{}=$pkgver\"", var),
            None => String::new(),
        };
        if pkg.is_wildcard() {
            writeln!(out, "\tgo build{} -o \"$srcdir/bin/\" ./...", ldflags)?;
        } else {
            writeln!(out, "\tgo build{} -o \"$srcdir/bin/$pkgname\" .", ldflags)?;
        }

        writeln!(
            out,
            r#"}}

package() {{
	find "$srcdir/bin" -type f -executable | while read -r binary; do
		install -Dm755 "$binary" "$pkgdir/usr/bin/${{binary##*/}}"
	done"#
        )?;
        for file in &pkg.files {
            writeln!(
                out,
                "\tinstall -Dm{} \"$srcdir/{}\" \"$pkgdir/{}\"",
                file.install_mode(),
                dq_escape(&file.name),
                dq_escape(&file.install_path()),
            )?;
        }
        writeln!(out, "}}")
    }
}

/// A minimal systemd unit that keeps the package's binary running.
#[derive(Clone, Debug)]
pub struct ServiceTemplate {
    pub restart: &'static str,
    pub wanted_by: &'static str,
}

impl Default for ServiceTemplate {
    fn default() -> Self {
        ServiceTemplate {
            restart: "always",
            wanted_by: "multi-user.target",
        }
    }
}

impl ServiceTemplate {
    pub fn render<W: Write>(&self, svc: &Service, out: &mut W) -> RenderResult<()> {
        if svc.exec_name.is_empty() {
            return Err(RenderError::MissingField("ExecStart"));
        }
        write!(
            out,
            "[Unit]
Description={}

[Service]
ExecStart=/usr/bin/{}
Restart={}

[Install]
WantedBy={}
",
            svc.description, svc.exec_name, self.restart, self.wanted_by
        )
        .map_err(|e| RenderError::IO("service", e))
    }
}

/// Contents of the build directory's `.gitignore`.
pub fn gitignore(pkgname: &str) -> String {
    let lines = ["/*.tar.xz", "/pkg", "/src"];
    let mut contents = lines.join("\n");
    contents.push_str(&format!("\n/{}\n", pkgname));
    contents
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn package(repo: &str) -> Package {
        Package {
            maintainer: Some("Jane Doe <jane@example.com>".to_string()),
            name: "bar".to_string(),
            release: "1".to_string(),
            description: "my cool package".to_string(),
            repo: RepoUrl::parse(repo).unwrap(),
            license: "GPL".to_string(),
            files: vec![FileEntry {
                location: PathBuf::from("/src/etc/bar/bar.conf"),
                name: "bar.conf".to_string(),
                path: "etc/bar/bar.conf".to_string(),
                hash: "d41d8cd98f00b204e9800998ecf8427e".to_string(),
            }],
            backup: vec!["etc/bar/bar.conf".to_string()],
            depends: vec!["glibc".to_string()],
            makedepends: vec!["git".to_string(), "make".to_string()],
            version_var: None,
        }
    }

    fn render(pkg: &Package) -> String {
        let mut out = Vec::new();
        PkgbuildTemplate::default().render(pkg, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn pkgbuild_header() {
        let text = render(&package("git://example.com/foo/bar.git"));
        assert!(text.starts_with("# Maintainer: Jane Doe <jane@example.com>\n\npkgname=bar\n"));
        assert!(text.contains("\npkgver=autogenerated\n"));
        assert!(text.contains("\npkgrel=1\n"));
        assert!(text.contains("\npkgdesc='my cool package'\n"));
        assert!(text.contains("\narch=('i686' 'x86_64')\n"));
        assert!(text.contains("\nlicense=('GPL')\n"));
        assert!(text.contains("\ndepends=('glibc')\n"));
        assert!(text.contains("\nmakedepends=('go'\n             'git'\n             'make')\n"));
        assert!(text.contains("\nbackup=('etc/bar/bar.conf')\n"));
        assert!(text.contains("\nsource=('bar::git://example.com/foo/bar.git'\n        'bar.conf')\n"));
        assert!(text.contains("\nmd5sums=('SKIP'\n         'd41d8cd98f00b204e9800998ecf8427e')\n"));
    }

    #[test]
    fn pkgbuild_stages() {
        let text = render(&package("git://example.com/foo/bar.git"));
        assert!(text.contains("\tgo build -o \"$srcdir/bin/$pkgname\" .\n"));
        assert!(text.contains(
            "\tinstall -Dm644 \"$srcdir/bar.conf\" \"$pkgdir/etc/bar/bar.conf\"\n"
        ));
        assert!(text.ends_with("}\n"));
        assert!(!text.contains("-ldflags"));
    }

    #[test]
    fn wildcard_and_version_variable() {
        let mut pkg = package("git://github.com/constabulary/gb/...");
        pkg.version_var = Some("version".to_string());
        let text = render(&pkg);
        assert!(text.contains("\tgo build -ldflags \"-X main.version=$pkgver\" -o \"$srcdir/bin/\" ./...\n"));

        pkg.version_var = Some("github.com/x/y/build.Version".to_string());
        let text = render(&pkg);
        assert!(text.contains("-X github.com/x/y/build.Version=$pkgver"));
    }

    #[test]
    fn no_maintainer_no_header() {
        let mut pkg = package("git://example.com/foo/bar.git");
        pkg.maintainer = None;
        assert!(render(&pkg).starts_with("pkgname=bar\n"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let pkg = package("https://example.com/foo/bar");
        assert_eq!(render(&pkg), render(&pkg));
        assert!(render(&pkg).contains("'bar::git+https://example.com/foo/bar'"));
    }

    #[test]
    fn invalid_descriptors_write_nothing() {
        let template = PkgbuildTemplate::default();
        let cases: Vec<Box<dyn Fn(&mut Package)>> = vec![
            Box::new(|p: &mut Package| p.name.clear()),
            Box::new(|p: &mut Package| p.name = "bar/baz".to_string()),
            Box::new(|p: &mut Package| p.name = "-bar".to_string()),
            Box::new(|p: &mut Package| p.release = "1.".to_string()),
            Box::new(|p: &mut Package| p.release = "1.2.3".to_string()),
            Box::new(|p: &mut Package| p.release = "x".to_string()),
            Box::new(|p: &mut Package| p.description.clear()),
            Box::new(|p: &mut Package| p.version_var = Some("a b".to_string())),
        ];
        for mutate in cases {
            let mut pkg = package("git://example.com/foo/bar.git");
            mutate(&mut pkg);
            let mut out = Vec::new();
            assert!(template.render(&pkg, &mut out).is_err());
            assert!(out.is_empty());
        }
    }

    #[test]
    fn release_with_subrelease_is_accepted() {
        let mut pkg = package("git://example.com/foo/bar.git");
        pkg.release = "2.1".to_string();
        assert!(render(&pkg).contains("\npkgrel=2.1\n"));
        pkg.release = "0".to_string();
        assert!(render(&pkg).contains("\npkgrel=0\n"));
    }

    #[test]
    fn mixed_case_names_are_accepted() {
        let mut pkg = package("git://example.com/foo/bar.git");
        pkg.name = "GoTool".to_string();
        assert!(render(&pkg).contains("\npkgname=GoTool\n"));
    }

    #[test]
    fn service_unit() {
        let svc = Service {
            description: "my cool package".to_string(),
            exec_name: "bar".to_string(),
        };
        let mut out = Vec::new();
        ServiceTemplate::default().render(&svc, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[Unit]\nDescription=my cool package\n\n[Service]\nExecStart=/usr/bin/bar\nRestart=always\n\n[Install]\nWantedBy=multi-user.target\n"
        );
        assert_eq!(svc.unit_path(), "usr/lib/systemd/system/bar.service");
    }

    #[test]
    fn gitignore_lines() {
        assert_eq!(gitignore("foo"), "/*.tar.xz\n/pkg\n/src\n/foo\n");
    }
}
