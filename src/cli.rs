//! Command-line surface: one subcommand per workflow.
//!
//! Defaults mirror a checkout where the tool runs from `scripts/` next to a
//! sibling `build/` directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::{
    cmake::{self, BuildOptions, ConfigureOptions, Sanitizer},
    cmd::Runner,
    coverage::{self, Bullseye},
    ctest::{self, TestOptions},
    format, install, repo, tidy,
};

#[derive(Parser, Debug)]
#[command(name = "cassian-dev")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct BuildDir {
    /// build directory
    #[arg(long = "build-directory", default_value = "../build")]
    pub build_directory: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct SourceDir {
    /// source directory
    #[arg(long = "source-directory", default_value = "../")]
    pub source_directory: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct BullseyeDir {
    /// path to Bullseye installation directory
    #[arg(long, env = "BULLSEYE_PATH", default_value = coverage::DEFAULT_INSTALL_DIR)]
    pub bullseye: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct Covfile {
    /// path to Bullseye coverage file
    #[arg(long, default_value = "../test.cov")]
    pub covfile: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate the CMake build tree
    Configure {
        #[command(flatten)]
        build: BuildDir,
        #[command(flatten)]
        source: SourceDir,
        /// configure preset from CMakePresets.json
        #[arg(long)]
        preset: Option<String>,
        /// CMake generator to use
        #[arg(long)]
        generator: Option<String>,
        /// use ccache
        #[arg(long)]
        ccache: bool,
        /// extra CMake flags
        #[arg(long, num_args = 0.., allow_hyphen_values = true)]
        extra: Vec<String>,
        /// path to C compiler
        #[arg(long)]
        c_compiler: Option<String>,
        /// path to C++ compiler
        #[arg(long)]
        cxx_compiler: Option<String>,
        /// path to linker
        #[arg(long)]
        linker: Option<String>,
        /// build shared libraries
        #[arg(long)]
        shared: bool,
        /// CMake build type to use
        #[arg(long)]
        build_type: Option<String>,
        /// use clang-tidy
        #[arg(long)]
        clang_tidy: bool,
        /// use include-what-you-use
        #[arg(long)]
        iwyu: bool,
        /// use link-what-you-use
        #[arg(long)]
        lwyu: bool,
        /// use clang sanitizer
        #[arg(long, value_enum)]
        sanitizer: Option<Sanitizer>,
        /// build documentation
        #[arg(long)]
        docs: bool,
        /// do not build unit tests
        #[arg(long)]
        no_tests: bool,
        /// package types to prepare, separated by ;
        #[arg(long)]
        packages: Option<String>,
        /// enable Bullseye coverage
        #[arg(long)]
        code_coverage: bool,
        #[command(flatten)]
        bullseye: BullseyeDir,
    },

    /// Build the configured project
    Build {
        #[command(flatten)]
        build: BuildDir,
        /// number of parallel jobs to run
        #[arg(long)]
        jobs: Option<u32>,
        /// target to build
        #[arg(long)]
        target: Option<String>,
        /// CMake build type to use
        #[arg(long)]
        build_type: Option<String>,
        /// enable Bullseye coverage
        #[arg(long)]
        code_coverage: bool,
        #[command(flatten)]
        bullseye: BullseyeDir,
        #[command(flatten)]
        covfile: Covfile,
    },

    /// Remove the build directory
    Clean {
        /// directory to clean
        #[arg(value_name = "build-directory", default_value = "../build")]
        build_directory: PathBuf,
    },

    /// Run unit tests with CTest
    Test {
        #[command(flatten)]
        build: BuildDir,
        /// number of parallel jobs to run
        #[arg(long)]
        jobs: Option<u32>,
        /// CMake build type to use
        #[arg(long)]
        build_type: Option<String>,
        /// enable Bullseye coverage
        #[arg(long)]
        code_coverage: bool,
        #[command(flatten)]
        covfile: Covfile,
    },

    /// Print the Bullseye coverage report
    CoverageReport {
        #[command(flatten)]
        bullseye: BullseyeDir,
        #[command(flatten)]
        covfile: Covfile,
        /// generate HTML report in addition to the regular one
        #[arg(long)]
        html: bool,
        /// destination directory for HTML report
        #[arg(long, default_value = "../coverage_report")]
        html_path: PathBuf,
    },

    /// Format C++ and OpenCL sources in place
    ClangFormat {
        #[command(flatten)]
        source: SourceDir,
    },

    /// Fail if lines changed since the main branch are not clang-formatted
    CheckClangFormat {
        /// path to clang-format-diff
        #[arg(long, env = "CLANG_FORMAT_DIFF")]
        clang_format_diff: Option<PathBuf>,
        #[command(flatten)]
        source: SourceDir,
    },

    /// Format CMake scripts in place
    CmakeFormat {
        #[command(flatten)]
        source: SourceDir,
    },

    /// Fail if CMake scripts are not cmake-formatted
    CheckCmakeFormat {
        #[command(flatten)]
        source: SourceDir,
    },

    /// Run clang-tidy over the project sources
    ClangTidy {
        #[command(flatten)]
        build: BuildDir,
        #[command(flatten)]
        source: SourceDir,
        /// path to run-clang-tidy
        #[arg(long, env = "RUN_CLANG_TIDY")]
        run_clang_tidy: Option<PathBuf>,
    },

    /// Fetch and install pinned third-party dependencies
    InstallDeps {
        /// install directory (default: third_party under the repository root)
        #[arg(long)]
        install_root: Option<PathBuf>,
        /// reinstall dependencies that are already present
        #[arg(long)]
        clear: bool,
    },
}

/// Execute `command`, sending every external call through `runner`.
pub fn dispatch(command: Command, runner: &dyn Runner) -> Result<()> {
    tracing::debug!("Arguments: {command:?}");

    match command {
        Command::Configure {
            build,
            source,
            preset,
            generator,
            ccache,
            extra,
            c_compiler,
            cxx_compiler,
            linker,
            shared,
            build_type,
            clang_tidy,
            iwyu,
            lwyu,
            sanitizer,
            docs,
            no_tests,
            packages,
            code_coverage,
            bullseye,
        } => {
            let options = ConfigureOptions {
                build_dir: build.build_directory,
                source_dir: source.source_directory,
                preset,
                generator,
                ccache,
                extra,
                c_compiler,
                cxx_compiler,
                linker,
                shared,
                build_type,
                clang_tidy,
                iwyu,
                lwyu,
                sanitizer,
                docs,
                no_tests,
                packages,
                bullseye: code_coverage.then_some(bullseye.bullseye),
            };
            cmake::configure(runner, &options).context("configure failed")?;
        }

        Command::Build {
            build,
            jobs,
            target,
            build_type,
            code_coverage,
            bullseye,
            covfile,
        } => {
            let options = BuildOptions {
                build_dir: build.build_directory,
                jobs,
                target,
                build_type,
            };
            let coverage = if code_coverage {
                Some(Bullseye::new(bullseye.bullseye, &covfile.covfile)?)
            } else {
                None
            };
            cmake::build(runner, &options, coverage.as_ref()).context("build failed")?;
        }

        Command::Clean { build_directory } => cmake::clean(&build_directory)?,

        Command::Test {
            build,
            jobs,
            build_type,
            code_coverage,
            covfile,
        } => {
            let options = TestOptions {
                build_dir: build.build_directory,
                jobs,
                build_type,
                covfile: code_coverage.then_some(covfile.covfile),
            };
            ctest::run_unit_tests(runner, &options).context("unit tests failed")?;
        }

        Command::CoverageReport {
            bullseye,
            covfile,
            html,
            html_path,
        } => {
            let bullseye = Bullseye::new(bullseye.bullseye, &covfile.covfile)?;
            coverage::report(runner, &bullseye, html.then_some(html_path.as_path()))
                .context("coverage report failed")?;
        }

        Command::ClangFormat { source } => {
            let root = repo::find_root(&source.source_directory)?;
            format::run_clang_format(runner, &root)?;
        }

        Command::CheckClangFormat {
            clang_format_diff,
            source,
        } => {
            let tool = match clang_format_diff {
                Some(path) => path,
                None => format::find_clang_format_diff()?,
            };
            format::check_clang_format(runner, &tool, &source.source_directory)
                .context("clang-format check failed")?;
        }

        Command::CmakeFormat { source } => {
            let root = repo::find_root(&source.source_directory)?;
            format::run_cmake_format(runner, &root)?;
        }

        Command::CheckCmakeFormat { source } => {
            let root = repo::find_root(&source.source_directory)?;
            format::check_cmake_format(runner, &root).context("cmake-format check failed")?;
        }

        Command::ClangTidy {
            build,
            source,
            run_clang_tidy,
        } => {
            let tool = match run_clang_tidy {
                Some(path) => path,
                None => tidy::find_run_clang_tidy()?,
            };
            tidy::run_clang_tidy(runner, &tool, &build.build_directory, &source.source_directory)
                .context("clang-tidy failed")?;
        }

        Command::InstallDeps { install_root, clear } => {
            let cwd = std::env::current_dir().context("cannot read current directory")?;
            install_deps(runner, &cwd, install_root.as_deref(), clear)?;
        }
    }

    Ok(())
}

fn install_deps(runner: &dyn Runner, start: &Path, install_root: Option<&Path>, clear: bool) -> Result<()> {
    let report = install::install_dependencies(runner, start, install_root, clear)
        .context("dependency installation failed")?;
    for (name, outcome) in report {
        tracing::info!("{name}: {outcome:?}");
    }
    Ok(())
}
