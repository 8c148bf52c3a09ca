//! Bullseye code coverage.
//!
//! The coverage tools are steered through `PATH` and `COVFILE`. Both are passed
//! as an explicit environment overlay on each invocation; the process
//! environment is never modified.

use std::{
    collections::BTreeMap,
    ffi::OsString,
    path::{Path, PathBuf},
};

use crate::{
    cmd::{Invocation, Runner, prepend_path},
    error::{Error, Result},
};

pub const DEFAULT_INSTALL_DIR: &str = "/opt/BullseyeCoverage";

/// Coverage data outside this selection is excluded from reports.
const EXCLUDE_THIRD_PARTY: &str = "!third_party/";

#[derive(Debug, Clone)]
pub struct Bullseye {
    install_dir: PathBuf,
    covfile: PathBuf,
}

impl Bullseye {
    /// `covfile` is made absolute immediately so that tools running in other
    /// working directories agree on its location.
    pub fn new(install_dir: impl Into<PathBuf>, covfile: &Path) -> Result<Self> {
        Ok(Self {
            install_dir: install_dir.into(),
            covfile: absolute(covfile)?,
        })
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.install_dir.join("bin")
    }

    pub fn covfile(&self) -> &Path {
        &self.covfile
    }

    /// `PATH` with the Bullseye tools first, plus `COVFILE`.
    pub fn env(&self) -> BTreeMap<OsString, OsString> {
        let mut env = covfile_env(&self.covfile);
        env.insert("PATH".into(), prepend_path(&self.bin_dir()));
        env
    }

    fn tool(&self, name: &str) -> Invocation {
        Invocation::new(self.bin_dir().join(name))
            .labelled("Bullseye")
            .add_envs(&self.env())
    }

    /// Turn compiler interception on (`cov01 -1`).
    pub fn enable(&self) -> Invocation {
        tracing::info!("Bullseye covfile: {}", self.covfile.display());
        self.tool("cov01").add_arg("-1")
    }

    /// Turn compiler interception off (`cov01 -0`).
    pub fn disable(&self) -> Invocation {
        self.tool("cov01").add_arg("-0")
    }

    /// Drop third-party sources from the coverage selection.
    pub fn select_paths(&self) -> Invocation {
        self.tool("covselect")
            .add_arg("--file")
            .add_arg(&self.covfile)
            .add_arg("--add")
            .add_arg(EXCLUDE_THIRD_PARTY)
    }

    /// Per-source-file text report.
    pub fn report(&self) -> Invocation {
        self.tool("covsrc")
            .add_arg("--file")
            .add_arg(&self.covfile)
            .add_args(["--by-name", "--width", "120"])
    }

    pub fn html_report(&self, destination: &Path) -> Invocation {
        self.tool("covhtml")
            .add_arg("--file")
            .add_arg(&self.covfile)
            .add_arg(destination)
    }
}

/// Overlay pointing the instrumented binaries at `covfile`.
pub fn covfile_env(covfile: &Path) -> BTreeMap<OsString, OsString> {
    BTreeMap::from([(OsString::from("COVFILE"), covfile.as_os_str().to_owned())])
}

pub(crate) fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| Error::fs(path, e))
}

/// Print the coverage report, optionally rendering HTML as well.
pub fn report(runner: &dyn Runner, bullseye: &Bullseye, html: Option<&Path>) -> Result<()> {
    bullseye.report().execute(runner)?;
    if let Some(destination) = html {
        bullseye.html_report(destination).execute(runner)?;
    }
    Ok(())
}
