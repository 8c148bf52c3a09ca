use std::path::{Path, PathBuf};

use crate::{
    cmd::{Invocation, Runner, locate_tool},
    error::Result,
    format::SOURCE_DIRS,
};

pub fn find_run_clang_tidy() -> Result<PathBuf> {
    let mut candidates = vec!["run-clang-tidy", "run-clang-tidy.py"];
    if cfg!(windows) {
        candidates.push("C:\\Program Files\\LLVM\\share\\clang\\run-clang-tidy.py");
    }
    locate_tool(&candidates)
}

/// Lint `src/` and `tests/` using the compilation database in `build_dir`.
pub fn invocation(run_clang_tidy: &Path, build_dir: &Path, source_dir: &Path) -> Invocation {
    Invocation::new(run_clang_tidy)
        .labelled("run-clang-tidy")
        .add_args(SOURCE_DIRS.map(|dir| source_dir.join(dir)))
        .add_arg("-p")
        .add_arg(build_dir)
}

pub fn run_clang_tidy(
    runner: &dyn Runner,
    run_clang_tidy: &Path,
    build_dir: &Path,
    source_dir: &Path,
) -> Result<()> {
    invocation(run_clang_tidy, build_dir, source_dir).execute(runner)?;
    Ok(())
}
