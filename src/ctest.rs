use std::path::PathBuf;

use crate::{
    cmd::{Invocation, Runner},
    coverage::{absolute, covfile_env},
    error::Result,
};

/// Flags for running the unit tests registered with CTest.
#[derive(Debug, Clone, Default)]
pub struct TestOptions {
    pub build_dir: PathBuf,
    pub jobs: Option<u32>,
    pub build_type: Option<String>,
    /// Record coverage into this file while the tests run.
    pub covfile: Option<PathBuf>,
}

impl TestOptions {
    pub fn invocation(&self) -> Result<Invocation> {
        let mut cmd = Invocation::new("ctest")
            .labelled("CTest")
            .set_cwd(&self.build_dir)
            .add_arg("--output-on-failure");

        if let Some(build_type) = &self.build_type {
            cmd = cmd.add_arg("-C").add_arg(build_type);
        }
        cmd = cmd.add_arg("--parallel");
        if let Some(jobs) = self.jobs {
            cmd = cmd.add_arg(jobs.to_string());
        }
        if let Some(covfile) = &self.covfile {
            let covfile = absolute(covfile)?;
            tracing::info!("Bullseye covfile: {}", covfile.display());
            cmd = cmd.add_envs(&covfile_env(&covfile));
        }
        Ok(cmd)
    }
}

pub fn run_unit_tests(runner: &dyn Runner, options: &TestOptions) -> Result<()> {
    options.invocation()?.execute(runner)?;
    Ok(())
}
