use std::{
    collections::BTreeMap,
    ffi::{OsStr, OsString},
    fmt,
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    thread,
};

use crate::error::{Error, Result};

/// A single external tool call: program, argument list, working directory and
/// an environment overlay merged on top of the inherited environment.
///
/// Arguments are never joined into a shell string, so nothing is quoted or
/// re-split on the way to the tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    label: String,
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    env: BTreeMap<OsString, OsString>,
    stdin: Option<Vec<u8>>,
}

impl Invocation {
    pub fn new<T>(program: T) -> Self
    where
        T: Into<OsString>, {
        let program = program.into();
        let label = Path::new(&program)
            .file_name()
            .unwrap_or(program.as_os_str())
            .to_string_lossy()
            .into_owned();
        Self {
            label,
            program,
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            stdin: None,
        }
    }

    /// Name used in log lines and errors, e.g. `CMake` or `Bullseye`.
    pub fn labelled<T>(mut self, label: T) -> Self
    where
        T: Into<String>, {
        self.label = label.into();
        self
    }

    pub fn add_arg<T>(mut self, arg: T) -> Self
    where
        T: Into<OsString>, {
        self.args.push(arg.into());
        self
    }

    pub fn add_args<I, T>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>, {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn set_cwd<T>(mut self, dir: T) -> Self
    where
        T: Into<PathBuf>, {
        self.cwd = Some(dir.into());
        self
    }

    pub fn set_env<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<OsString>,
        V: Into<OsString>, {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn add_envs(mut self, env: &BTreeMap<OsString, OsString>) -> Self {
        self.env.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn set_stdin<T>(mut self, input: T) -> Self
    where
        T: Into<Vec<u8>>, {
        self.stdin = Some(input.into());
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn env(&self) -> &BTreeMap<OsString, OsString> {
        &self.env
    }

    pub fn stdin(&self) -> Option<&[u8]> {
        self.stdin.as_deref()
    }

    /// Program followed by its arguments, lossily converted to UTF-8.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|s| s.to_string_lossy().into_owned())
            .collect()
    }

    /// Run through `runner`, logging the command line and captured output.
    ///
    /// Returns stdout alone. A non-zero exit becomes [`Error::ToolFailed`]
    /// carrying stdout and stderr together.
    pub fn execute(&self, runner: &dyn Runner) -> Result<String> {
        tracing::info!("{} command line: {}", self.label, self);
        if !self.env.is_empty() {
            tracing::debug!(env = ?self.env, "{} environment overlay", self.label);
        }

        let output = runner.run(self)?;
        tracing::info!("{} output:\n{}", self.label, output.combined());

        if !output.success() {
            return Err(Error::ToolFailed {
                tool: self.label.clone(),
                code: output.code,
                output: output.combined(),
            });
        }

        Ok(output.stdout)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let argv = self.argv();
        let mut first = true;
        for arg in &argv {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, "\"{arg}\"")?;
            } else {
                f.write_str(arg)?;
            }
        }
        Ok(())
    }
}

/// Exit status and captured streams of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Output {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stdout followed by stderr, for logs and error reports.
    pub fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        text.push_str(&self.stderr);
        text
    }
}

/// Executes invocations. Workflows only talk to tools through this trait so
/// tests can substitute a recording fake.
pub trait Runner {
    fn run(&self, invocation: &Invocation) -> Result<Output>;
}

/// Runs invocations as real child processes and blocks until they exit.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl Runner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<Output> {
        let program = resolve_program(invocation)?;

        let mut command = Command::new(&program);
        command
            .args(invocation.args())
            .envs(invocation.env())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if invocation.stdin().is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });
        if let Some(dir) = invocation.cwd() {
            command.current_dir(dir);
        }

        let spawn_err = |source| Error::Spawn {
            program: program.display().to_string(),
            source,
        };

        let mut child = command.spawn().map_err(spawn_err)?;

        // feed stdin from a separate thread so a chatty child cannot deadlock
        // against a full stdout pipe
        let writer = match (child.stdin.take(), invocation.stdin()) {
            (Some(mut pipe), Some(input)) => {
                let input = input.to_vec();
                Some(thread::spawn(move || pipe.write_all(&input)))
            }
            _ => None,
        };

        let output = child.wait_with_output().map_err(spawn_err)?;
        if let Some(writer) = writer {
            if let Ok(Err(e)) = writer.join() {
                tracing::debug!("{}: stdin closed early: {e}", invocation.label());
            }
        }

        Ok(Output {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Resolve the program against the `PATH` the child will actually see, which
/// may come from the invocation's environment overlay.
fn resolve_program(invocation: &Invocation) -> Result<PathBuf> {
    let search_path = invocation
        .env()
        .get(OsStr::new("PATH"))
        .cloned()
        .or_else(|| std::env::var_os("PATH"));
    let cwd = match invocation.cwd() {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().map_err(|e| Error::fs(".", e))?,
    };

    which::which_in(invocation.program(), search_path, cwd).map_err(|_| Error::ToolNotFound {
        candidates: vec![invocation.program().to_string_lossy().into_owned()],
    })
}

/// First candidate found in `PATH`, in order.
pub fn locate_tool(candidates: &[&str]) -> Result<PathBuf> {
    candidates
        .iter()
        .find_map(|candidate| which::which(candidate).ok())
        .ok_or_else(|| Error::ToolNotFound {
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
        })
}

/// Prepend `dir` to the inherited `PATH`, producing a value for an overlay.
pub fn prepend_path(dir: &Path) -> OsString {
    let mut entries = vec![dir.to_path_buf()];
    if let Some(current) = std::env::var_os("PATH") {
        entries.extend(std::env::split_paths(&current));
    }
    // split_paths output always rejoins
    std::env::join_paths(entries).unwrap_or_else(|_| dir.as_os_str().to_owned())
}
