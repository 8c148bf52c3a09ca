//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use cassian_devtools::{Invocation, Output, Result, Runner};

type Predicate = Box<dyn Fn(&[String]) -> bool>;

/// Records every invocation instead of running it.
///
/// `git clone` and the CMake install target leave behind the files the real
/// tools would, so installer tests can inspect the resulting tree.
pub struct FakeRunner {
    calls: RefCell<Vec<Invocation>>,
    responses: HashMap<String, String>,
    failure: Option<(i32, Predicate)>,
    fail_after_side_effects: bool,
    stderr: String,
    install_prefix: RefCell<Option<PathBuf>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            responses: HashMap::new(),
            failure: None,
            fail_after_side_effects: false,
            stderr: String::new(),
            install_prefix: RefCell::new(None),
        }
    }

    /// Exit with `code` for every invocation whose argv matches `when`.
    pub fn failing_with(mut self, code: i32, when: impl Fn(&[String]) -> bool + 'static) -> Self {
        self.failure = Some((code, Box::new(when)));
        self
    }

    /// Like [`FakeRunner::failing_with`], but the matching command still
    /// leaves its files behind before exiting, as an interrupted install does.
    pub fn failing_midway_with(
        self,
        code: i32,
        when: impl Fn(&[String]) -> bool + 'static,
    ) -> Self {
        let mut runner = self.failing_with(code, when);
        runner.fail_after_side_effects = true;
        runner
    }

    /// Write `text` to stderr on every call.
    pub fn warning_on_stderr(mut self, text: &str) -> Self {
        self.stderr = text.to_string();
        self
    }

    /// Print `text` when called with exactly `args` (program excluded).
    pub fn responding(mut self, args: &str, text: &str) -> Self {
        self.responses.insert(args.to_string(), text.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    pub fn argvs(&self) -> Vec<Vec<String>> {
        self.calls.borrow().iter().map(Invocation::argv).collect()
    }

    pub fn clones(&self) -> Vec<String> {
        self.argvs()
            .into_iter()
            .filter(|argv| argv[0] == "git" && argv[1] == "clone")
            .map(|argv| argv.last().cloned().unwrap_or_default())
            .collect()
    }

    fn simulate(&self, invocation: &Invocation) {
        let argv = invocation.argv();
        if argv[0] == "git" && argv[1] == "clone" {
            let dest = invocation.cwd().unwrap().join(argv.last().unwrap());
            checkout_fixture(&dest);
        } else if argv[0] == "cmake" {
            if let Some(prefix) = argv
                .iter()
                .find_map(|arg| arg.strip_prefix("-DCMAKE_INSTALL_PREFIX="))
            {
                *self.install_prefix.borrow_mut() = Some(PathBuf::from(prefix));
            }
            if argv.ends_with(&["--target".to_string(), "install".to_string()]) {
                let prefix = self.install_prefix.borrow().clone().expect("configure runs first");
                write(&prefix.join("include/catch2/catch.hpp"), "// catch2");
                write(&prefix.join("lib/cmake/Catch2/Catch2Config.cmake"), "# config");
            }
        }
    }
}

impl Runner for FakeRunner {
    fn run(&self, invocation: &Invocation) -> Result<Output> {
        self.calls.borrow_mut().push(invocation.clone());
        let argv = invocation.argv();

        let failure = self
            .failure
            .as_ref()
            .filter(|(_, when)| when(&argv))
            .map(|(code, _)| *code);

        if failure.is_none() || self.fail_after_side_effects {
            self.simulate(invocation);
        }
        if let Some(code) = failure {
            return Ok(Output {
                code: Some(code),
                stdout: String::new(),
                stderr: "fatal: simulated failure".to_string(),
            });
        }

        let stdout = self
            .responses
            .get(&argv[1..].join(" "))
            .cloned()
            .unwrap_or_default();
        Ok(Output {
            code: Some(0),
            stdout,
            stderr: self.stderr.clone(),
        })
    }
}

/// Populate a checkout the way the upstream repositories are laid out.
fn checkout_fixture(dest: &Path) {
    match dest.file_name().and_then(|n| n.to_str()) {
        Some("Catch2") => {
            write(&dest.join("CMakeLists.txt"), "project(Catch2)");
            write(&dest.join("single_include/catch2/catch.hpp"), "// catch2");
        }
        Some("OpenCL-Headers") => {
            write(&dest.join("CL/cl.h"), "// cl.h");
            write(&dest.join("CL/cl_ext.h"), "// cl_ext.h");
            write(&dest.join("README.md"), "OpenCL headers");
        }
        Some("level-zero") => {
            write(&dest.join("include/ze_api.h"), "// ze_api.h");
            write(&dest.join("include/layers/zel_tracing_api.h"), "// tracing");
        }
        _ => fs::create_dir_all(dest).unwrap(),
    }
}

pub fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Whether `dir` exists and holds at least one entry.
pub fn is_populated(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Relative path -> contents for every file under `root`.
pub fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let files = cassian_devtools::fs::collect_files(root, &|_| true).unwrap();
    files
        .into_iter()
        .map(|path| {
            let contents = fs::read(&path).unwrap();
            (path.strip_prefix(root).unwrap().to_path_buf(), contents)
        })
        .collect()
}
