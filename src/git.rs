use std::path::PathBuf;

use crate::{
    cmd::{Invocation, Runner},
    error::Result,
};

/// Branch the formatting checks diff against.
pub const MAIN_REF: &str = "remotes/origin/main";

/// Git commands run against one working tree.
pub struct Git<'a> {
    runner: &'a dyn Runner,
    dir: PathBuf,
}

impl<'a> Git<'a> {
    pub fn new(runner: &'a dyn Runner, dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            dir: dir.into(),
        }
    }

    pub fn command<I, T>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString>, {
        Invocation::new("git")
            .labelled("Git")
            .set_cwd(&self.dir)
            .add_args(args)
    }

    fn capture<I, T>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString>, {
        Ok(self.command(args).execute(self.runner)?.trim().to_string())
    }

    pub fn rev_parse(&self, rev: &str) -> Result<String> {
        self.capture(["rev-parse", rev])
    }

    pub fn merge_base(&self, a: &str, b: &str) -> Result<String> {
        self.capture(["merge-base", a, b])
    }

    /// Commit the current branch forked from.
    ///
    /// On the main branch itself that is the parent of `HEAD`, so the check
    /// still covers the latest commit.
    pub fn common_ancestor(&self) -> Result<String> {
        let main = self.rev_parse(MAIN_REF)?;
        let head = self.rev_parse("HEAD")?;
        if main == head {
            return self.rev_parse("HEAD^");
        }
        self.merge_base(&main, "HEAD")
    }

    /// Zero-context, colorless diff of `base..HEAD`, as patch tools expect.
    pub fn diff_since(&self, base: &str) -> Result<String> {
        let range = format!("{base}..HEAD");
        self.command(["diff", "-U0", "--no-color", range.as_str()])
            .execute(self.runner)
    }

    /// Fails when the working tree differs from the index.
    pub fn diff_exit_code(&self) -> Result<()> {
        self.command(["diff", "--exit-code"]).execute(self.runner)?;
        Ok(())
    }
}
