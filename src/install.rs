//! Third-party dependency bootstrap.
//!
//! Each dependency is cloned at a pinned tag into a scratch directory under
//! the install root and then either built and installed with CMake or has a
//! header subtree copied out. The existence of `<install root>/<name>` marks a
//! dependency as installed; its contents are not verified.

use std::path::{Path, PathBuf};

use crate::{
    cmake::{install_configure, install_target, platform_generator_args},
    cmd::{Invocation, Runner},
    error::{Error, Result},
    fs::{copy_tree, ensure_dir, remove_dir_all_forced},
    repo,
};

/// Directory under the repository root that receives the dependencies.
pub const INSTALL_DIR: &str = "third_party";

/// Scratch directory name under the install root.
pub const SCRATCH_DIR: &str = "tmp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStrategy {
    /// Configure with tests disabled and run the `install` target.
    BuildAndInstall,
    /// Copy `from` (relative to the checkout) to `to` (relative to the
    /// dependency's install directory).
    CopyHeaders {
        from: &'static str,
        to: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencySpec {
    pub name: &'static str,
    pub source_url: &'static str,
    pub pinned_ref: &'static str,
    /// Directory the clone lands in, inside the scratch directory.
    pub checkout_dir: &'static str,
    pub strategy: InstallStrategy,
}

pub const DEPENDENCIES: [DependencySpec; 3] = [
    DependencySpec {
        name: "catch2",
        source_url: "https://github.com/catchorg/Catch2.git",
        pinned_ref: "v2.13.10",
        checkout_dir: "Catch2",
        strategy: InstallStrategy::BuildAndInstall,
    },
    DependencySpec {
        name: "opencl",
        source_url: "https://github.com/KhronosGroup/OpenCL-Headers.git",
        pinned_ref: "v2024.10.24",
        checkout_dir: "OpenCL-Headers",
        strategy: InstallStrategy::CopyHeaders {
            from: "CL",
            to: "include/CL",
        },
    },
    DependencySpec {
        name: "level_zero",
        source_url: "https://github.com/oneapi-src/level-zero.git",
        pinned_ref: "v1.19.2",
        checkout_dir: "level-zero",
        strategy: InstallStrategy::CopyHeaders {
            from: "include",
            to: "include",
        },
    },
];

impl DependencySpec {
    /// Shallow clone of the pinned reference into `checkout_dir`.
    pub fn fetch(&self, scratch: &Path) -> Invocation {
        Invocation::new("git")
            .labelled("Git")
            .set_cwd(scratch)
            .add_args(["clone", self.source_url, "--depth", "1", "--branch", self.pinned_ref])
            .add_arg(self.checkout_dir)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Installed,
    /// The install directory already existed.
    Skipped,
}

pub struct Installer<'a> {
    runner: &'a dyn Runner,
    install_root: PathBuf,
    generator_args: Vec<String>,
    clear: bool,
}

impl<'a> Installer<'a> {
    pub fn new(runner: &'a dyn Runner, install_root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            install_root: install_root.into(),
            generator_args: platform_generator_args(),
            clear: false,
        }
    }

    /// Remove and reinstall dependencies that are already present.
    pub fn set_clear(mut self, clear: bool) -> Self {
        self.clear = clear;
        self
    }

    pub fn set_generator_args(mut self, args: Vec<String>) -> Self {
        self.generator_args = args;
        self
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.install_root.join(SCRATCH_DIR)
    }

    /// Install `deps` in order, stopping at the first failure.
    ///
    /// The scratch directory is purged before the first dependency and removed
    /// afterwards whatever the outcome. If both a dependency and the final
    /// cleanup fail, the dependency's error is returned.
    pub fn install_all(&self, deps: &[DependencySpec]) -> Result<Vec<(&'static str, Outcome)>> {
        ensure_dir(&self.install_root)?;

        let scratch = self.scratch_dir();
        remove_dir_all_forced(&scratch)?;
        ensure_dir(&scratch)?;

        let installed = deps
            .iter()
            .map(|dep| self.install(dep, &scratch).map(|outcome| (dep.name, outcome)))
            .collect::<Result<Vec<_>>>();

        let cleanup = remove_dir_all_forced(&scratch);
        match (installed, cleanup) {
            (Ok(report), Ok(())) => Ok(report),
            (Err(e), Err(cleanup_err)) => {
                tracing::error!("failed to remove scratch directory: {cleanup_err}");
                Err(e)
            }
            (Err(e), Ok(())) | (Ok(_), Err(e)) => Err(e),
        }
    }

    fn install(&self, dep: &DependencySpec, scratch: &Path) -> Result<Outcome> {
        let target = self.install_root.join(dep.name);
        if target.exists() {
            if !self.clear {
                tracing::info!("{} already installed", dep.name);
                return Ok(Outcome::Skipped);
            }
            tracing::info!("removing existing {} for reinstall", dep.name);
            remove_dir_all_forced(&target)?;
        }

        let checkout = scratch.join(dep.checkout_dir);
        remove_dir_all_forced(&checkout)?;

        dep.fetch(scratch)
            .execute(self.runner)
            .map_err(|e| Error::Fetch {
                name: dep.name.to_string(),
                reference: dep.pinned_ref.to_string(),
                source: Box::new(e),
            })?;

        // a half-populated target would pass for installed on the next run
        if let Err(e) = self.apply_strategy(dep, &checkout, &target) {
            if let Err(cleanup_err) = remove_dir_all_forced(&target) {
                tracing::error!("failed to remove partial install of {}: {cleanup_err}", dep.name);
            }
            return Err(e);
        }

        tracing::info!("{} {} installed into {}", dep.name, dep.pinned_ref, target.display());
        Ok(Outcome::Installed)
    }

    fn apply_strategy(&self, dep: &DependencySpec, checkout: &Path, target: &Path) -> Result<()> {
        match dep.strategy {
            InstallStrategy::BuildAndInstall => {
                let build_dir = checkout.join("build");
                install_configure(checkout, &build_dir, target, &self.generator_args)
                    .execute(self.runner)
                    .and_then(|_| install_target(&build_dir).execute(self.runner))
                    .map_err(|e| Error::Build {
                        name: dep.name.to_string(),
                        source: Box::new(e),
                    })?;
            }
            InstallStrategy::CopyHeaders { from, to } => {
                let headers = checkout.join(from);
                if !headers.is_dir() {
                    return Err(Error::MissingArtifact {
                        name: dep.name.to_string(),
                        path: PathBuf::from(from),
                    });
                }
                copy_tree(&headers, &target.join(to))?;
            }
        }
        Ok(())
    }
}

/// Install [`DEPENDENCIES`] into `install_root`, or into `third_party` under
/// the repository containing `start` when no root is given.
pub fn install_dependencies(
    runner: &dyn Runner,
    start: &Path,
    install_root: Option<&Path>,
    clear: bool,
) -> Result<Vec<(&'static str, Outcome)>> {
    let install_root = match install_root {
        Some(root) => root.to_path_buf(),
        None => repo::find_root(start)?.join(INSTALL_DIR),
    };
    tracing::debug!("installing dependencies into {}", install_root.display());

    Installer::new(runner, install_root)
        .set_clear(clear)
        .install_all(&DEPENDENCIES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_names_are_unique_and_ordered() {
        let names: Vec<_> = DEPENDENCIES.iter().map(|d| d.name).collect();
        assert_eq!(names, ["catch2", "opencl", "level_zero"]);
    }

    #[test]
    fn fetch_is_a_shallow_pinned_clone() {
        let inv = DEPENDENCIES[1].fetch(Path::new("/repo/third_party/tmp"));
        assert_eq!(
            inv.argv(),
            [
                "git",
                "clone",
                "https://github.com/KhronosGroup/OpenCL-Headers.git",
                "--depth",
                "1",
                "--branch",
                "v2024.10.24",
                "OpenCL-Headers"
            ]
        );
        assert_eq!(inv.cwd(), Some(Path::new("/repo/third_party/tmp")));
    }

    #[test]
    fn scratch_lives_under_the_install_root() {
        struct Never;
        impl Runner for Never {
            fn run(&self, _: &Invocation) -> Result<crate::cmd::Output> {
                unreachable!("no commands expected")
            }
        }

        let installer = Installer::new(&Never, "/repo/third_party");
        assert_eq!(installer.scratch_dir(), Path::new("/repo/third_party/tmp"));
    }
}
