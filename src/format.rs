//! Source formatting: clang-format for C++/OpenCL sources and cmake-format for
//! the CMake build scripts, each with a check mode that fails on drift.

use std::path::{Path, PathBuf};

use crate::{
    cmd::{Invocation, Runner, locate_tool},
    error::Result,
    fs::collect_files,
    git::Git,
};

/// Top-level directories holding formatted sources.
pub const SOURCE_DIRS: [&str; 2] = ["src", "tests"];

pub const SOURCE_EXTENSIONS: [&str; 4] = ["cpp", "hpp", "h", "cl"];

fn is_source(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

/// Sources under `src/` and `tests/` of `root`.
pub fn clang_format_targets(root: &Path) -> Result<Vec<PathBuf>> {
    let mut targets = Vec::new();
    for dir in SOURCE_DIRS {
        targets.extend(collect_files(&root.join(dir), &is_source)?);
    }
    Ok(targets)
}

/// Format every source file in place, one `clang-format -i` per file.
pub fn run_clang_format(runner: &dyn Runner, root: &Path) -> Result<()> {
    let targets = clang_format_targets(root)?;
    tracing::info!("formatting {} files under {}", targets.len(), root.display());

    for path in &targets {
        Invocation::new("clang-format")
            .labelled("clang-format")
            .add_arg("-i")
            .add_arg(path)
            .execute(runner)?;
    }
    Ok(())
}

pub fn find_clang_format_diff() -> Result<PathBuf> {
    let mut candidates = vec!["clang-format-diff", "clang-format-diff.py"];
    if cfg!(windows) {
        candidates.push("C:\\Program Files\\LLVM\\share\\clang\\clang-format-diff.py");
    }
    locate_tool(&candidates)
}

/// Reformat the lines changed since the branch point and fail if that
/// changed anything.
///
/// The diff is handed to clang-format-diff on stdin rather than through a
/// shell pipe.
pub fn check_clang_format(runner: &dyn Runner, clang_format_diff: &Path, source_dir: &Path) -> Result<()> {
    let git = Git::new(runner, source_dir);
    let ancestor = git.common_ancestor()?;
    let diff = git.diff_since(&ancestor)?;

    Invocation::new(clang_format_diff)
        .labelled("clang-format-diff")
        .set_cwd(source_dir)
        .add_args(["-p1", "-i"])
        .set_stdin(diff)
        .execute(runner)?;

    git.diff_exit_code()
}

/// CMake scripts of the project: the root `CMakeLists.txt`, `cmake/*.cmake`
/// and every `CMakeLists.txt` below `src/` and `tests/`.
pub fn cmake_format_targets(root: &Path) -> Result<Vec<PathBuf>> {
    let is_lists = |p: &Path| p.file_name().is_some_and(|name| name == "CMakeLists.txt");

    let mut targets = Vec::new();
    let top = root.join("CMakeLists.txt");
    if top.is_file() {
        targets.push(top);
    }

    let modules = root.join("cmake");
    targets.extend(
        collect_files(&modules, &|p| p.extension().is_some_and(|ext| ext == "cmake"))?
            .into_iter()
            .filter(|p| p.parent() == Some(modules.as_path())),
    );

    for dir in SOURCE_DIRS {
        targets.extend(collect_files(&root.join(dir), &is_lists)?);
    }
    Ok(targets)
}

/// Format all CMake scripts in place with a single `cmake-format -i` call.
pub fn run_cmake_format(runner: &dyn Runner, root: &Path) -> Result<()> {
    let targets = cmake_format_targets(root)?;
    if targets.is_empty() {
        tracing::info!("no CMake scripts found under {}", root.display());
        return Ok(());
    }

    Invocation::new("cmake-format")
        .labelled("cmake-format")
        .add_arg("-i")
        .add_args(&targets)
        .execute(runner)?;
    Ok(())
}

/// Run cmake-format and fail if it changed the working tree.
pub fn check_cmake_format(runner: &dyn Runner, root: &Path) -> Result<()> {
    run_cmake_format(runner, root)?;
    Git::new(runner, root).diff_exit_code()
}
