//! # cassian-devtools
//!
//! Developer workflow commands for a CMake based C++ project: configure,
//! build, clean, unit tests, Bullseye coverage, clang-format / cmake-format /
//! clang-tidy, and bootstrapping of pinned third-party dependencies.
//!
//! Every external tool call is an [`Invocation`]: a program, an argument list
//! and an explicit environment overlay, run through a [`Runner`]. Workflows
//! never touch the process environment and never go through a shell.
//!
//! ## Quick Start
//!
//! ```no_run
//! use cassian_devtools::{SystemRunner, cmake::BuildOptions};
//!
//! let options = BuildOptions {
//!     build_dir: "../build".into(),
//!     jobs: Some(8),
//!     ..Default::default()
//! };
//! cassian_devtools::cmake::build(&SystemRunner, &options, None)?;
//! # Ok::<(), cassian_devtools::Error>(())
//! ```
//!
//! ```no_run
//! use std::path::Path;
//!
//! use cassian_devtools::{SystemRunner, install};
//!
//! // installs catch2, opencl and level_zero into <repo>/third_party
//! let report = install::install_dependencies(&SystemRunner, Path::new("."), None, false)?;
//! for (name, outcome) in report {
//!     println!("{name}: {outcome:?}");
//! }
//! # Ok::<(), cassian_devtools::Error>(())
//! ```

pub mod cli;
pub mod cmake;
pub mod cmd;
pub mod coverage;
pub mod ctest;
pub mod error;
pub mod format;
pub mod fs;
pub mod git;
pub mod install;
pub mod repo;
pub mod tidy;

pub use cmd::{Invocation, Output, Runner, SystemRunner};
pub use error::{Error, Result};
