use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    cmd::{Invocation, Runner, prepend_path},
    coverage::Bullseye,
    error::{Error, Result},
};

const PRESETS_FILE: &str = "CMakePresets.json";

#[derive(Debug, Serialize, Deserialize)]
pub struct CMakePreset {
    name: String,
    #[serde(default)]
    hidden: bool,
}

impl CMakePreset {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }
}

/// The configure presets of a `CMakePresets.json` file.
#[derive(Debug, Serialize, Deserialize)]
pub struct CMakePresets {
    #[serde(rename = "configurePresets", default)]
    configure_presets: Vec<CMakePreset>,
    #[serde(skip)]
    path: PathBuf,
}

impl CMakePresets {
    /// Load presets from a `CMakePresets.json` file or the directory holding one.
    pub fn load<T>(path: T) -> Result<Self>
    where
        T: Into<PathBuf>, {
        let path = path.into();

        let path = if path.ends_with(PRESETS_FILE) {
            path
        } else {
            path.join(PRESETS_FILE)
        };

        let content = std::fs::read_to_string(&path).map_err(|e| Error::fs(&path, e))?;
        let mut presets: CMakePresets =
            serde_json::from_str(&content).map_err(|source| Error::InvalidPresets {
                path: path.clone(),
                source,
            })?;
        presets.path = path;

        Ok(presets)
    }

    pub fn get_preset(&self, name: &str) -> Option<&CMakePreset> {
        self.configure_presets.iter().find(|p| p.name == name)
    }

    /// Look up a preset that may be passed to `cmake --preset`.
    ///
    /// Hidden presets only exist to be inherited from, so they are rejected.
    pub fn selectable(&self, name: &str) -> Result<&CMakePreset> {
        self.get_preset(name)
            .filter(|p| !p.is_hidden())
            .ok_or_else(|| Error::PresetNotFound {
                name: name.to_string(),
                path: self.path.clone(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Sanitizer {
    Asan,
    Tsan,
    Ubsan,
    Lsan,
}

impl Sanitizer {
    fn define(self) -> &'static str {
        match self {
            Self::Asan => "-DUSE_ASAN=ON",
            Self::Tsan => "-DUSE_TSAN=ON",
            Self::Ubsan => "-DUSE_UBSAN=ON",
            Self::Lsan => "-DUSE_LSAN=ON",
        }
    }
}

/// Flags for the configure step of the project build.
#[derive(Debug, Clone, Default)]
pub struct ConfigureOptions {
    pub build_dir: PathBuf,
    pub source_dir: PathBuf,
    pub preset: Option<String>,
    pub generator: Option<String>,
    pub ccache: bool,
    pub extra: Vec<String>,
    pub c_compiler: Option<String>,
    pub cxx_compiler: Option<String>,
    pub linker: Option<String>,
    pub shared: bool,
    pub build_type: Option<String>,
    pub clang_tidy: bool,
    pub iwyu: bool,
    pub lwyu: bool,
    pub sanitizer: Option<Sanitizer>,
    pub docs: bool,
    pub no_tests: bool,
    pub packages: Option<String>,
    /// Bullseye installation whose `bin` directory is put first on `PATH`
    /// so its compiler interceptors are picked up.
    pub bullseye: Option<PathBuf>,
}

impl ConfigureOptions {
    pub fn invocation(&self) -> Result<Invocation> {
        let mut cmd = Invocation::new("cmake")
            .labelled("CMake")
            .add_arg("-B")
            .add_arg(&self.build_dir)
            .add_arg("-S")
            .add_arg(&self.source_dir);

        if let Some(name) = &self.preset {
            let presets = CMakePresets::load(&self.source_dir)?;
            let preset = presets.selectable(name)?;
            cmd = cmd.add_arg(format!("--preset={}", preset.name()));
        }
        if let Some(generator) = &self.generator {
            cmd = cmd.add_arg("-G").add_arg(generator);
        }
        if self.ccache {
            cmd = cmd.add_arg("-DCMAKE_CXX_COMPILER_LAUNCHER=ccache");
        }
        cmd = cmd.add_args(&self.extra).add_args(self.derived_defines());

        if let Some(cc) = &self.c_compiler {
            cmd = cmd.add_arg(format!("-DCMAKE_C_COMPILER={cc}"));
        }
        if let Some(cxx) = &self.cxx_compiler {
            cmd = cmd.add_arg(format!("-DCMAKE_CXX_COMPILER={cxx}"));
        }
        if let Some(linker) = &self.linker {
            cmd = cmd.add_arg(format!("-DCMAKE_LINKER={linker}"));
        }
        if self.shared {
            cmd = cmd.add_arg("-DBUILD_SHARED_LIBS=ON");
            if cfg!(windows) {
                cmd = cmd.add_arg("-DCMAKE_WINDOWS_EXPORT_ALL_SYMBOLS=ON");
            }
        }
        if let Some(build_type) = self.effective_build_type() {
            cmd = cmd.add_arg(format!("-DCMAKE_BUILD_TYPE={build_type}"));
        }
        if let Some(bullseye) = &self.bullseye {
            cmd = cmd.set_env("PATH", prepend_path(&bullseye.join("bin")));
        }

        Ok(cmd)
    }

    fn derived_defines(&self) -> Vec<String> {
        let mut defines = Vec::new();
        if self.clang_tidy || self.iwyu {
            defines.push("-DCMAKE_EXPORT_COMPILE_COMMANDS=ON".to_string());
        }
        if self.iwyu {
            defines.push("-DCMAKE_CXX_INCLUDE_WHAT_YOU_USE=iwyu;-Xiwyu;--no_fwd_decls".to_string());
        }
        if self.lwyu {
            defines.push("-DCMAKE_LINK_WHAT_YOU_USE=ON".to_string());
        }
        if let Some(sanitizer) = self.sanitizer {
            defines.push(sanitizer.define().to_string());
        }
        if self.docs {
            defines.push("-DBUILD_DOCS=ON".to_string());
        }
        if self.no_tests {
            defines.push("-DBUILD_TESTING=OFF".to_string());
        }
        if let Some(packages) = &self.packages {
            defines.push(format!("-DCPACK_GENERATOR={packages}"));
        }
        defines
    }

    /// Sanitized builds need debug info to produce readable reports.
    fn effective_build_type(&self) -> Option<&str> {
        match (&self.build_type, self.sanitizer) {
            (Some(build_type), _) => Some(build_type.as_str()),
            (None, Some(_)) => Some("RelWithDebInfo"),
            (None, None) => None,
        }
    }
}

/// Flags for `cmake --build`.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub build_dir: PathBuf,
    pub jobs: Option<u32>,
    pub target: Option<String>,
    pub build_type: Option<String>,
}

impl BuildOptions {
    pub fn invocation(&self) -> Invocation {
        let mut cmd = Invocation::new("cmake")
            .labelled("CMake")
            .add_arg("--build")
            .add_arg(&self.build_dir)
            .add_arg("--parallel");

        if let Some(jobs) = self.jobs {
            cmd = cmd.add_arg(jobs.to_string());
        }
        if let Some(target) = &self.target {
            cmd = cmd.add_arg("--target").add_arg(target);
        }
        if let Some(build_type) = &self.build_type {
            cmd = cmd.add_arg("--config").add_arg(build_type);
        }
        cmd
    }
}

/// Generator qualifier for dependency builds: the 64-bit toolset on Windows,
/// nothing elsewhere.
pub fn platform_generator_args() -> Vec<String> {
    if cfg!(windows) {
        vec!["-A".to_string(), "x64".to_string()]
    } else {
        Vec::new()
    }
}

/// Configure a fetched dependency for installation into `prefix`, tests off.
pub fn install_configure(
    source_dir: &Path,
    build_dir: &Path,
    prefix: &Path,
    generator_args: &[String],
) -> Invocation {
    let mut prefix_define = std::ffi::OsString::from("-DCMAKE_INSTALL_PREFIX=");
    prefix_define.push(prefix);

    Invocation::new("cmake")
        .labelled("CMake")
        .add_arg("-S")
        .add_arg(source_dir)
        .add_arg("-B")
        .add_arg(build_dir)
        .add_arg("-DBUILD_TESTING=OFF")
        .add_arg(prefix_define)
        .add_args(generator_args)
}

/// Build and run the `install` target of a configured dependency.
pub fn install_target(build_dir: &Path) -> Invocation {
    Invocation::new("cmake")
        .labelled("CMake")
        .add_arg("--build")
        .add_arg(build_dir)
        .add_arg("--target")
        .add_arg("install")
}

pub fn configure(runner: &dyn Runner, options: &ConfigureOptions) -> Result<()> {
    options.invocation()?.execute(runner)?;
    Ok(())
}

/// Build the project, wrapping the build in Bullseye interception when
/// `coverage` is given.
///
/// Interception is switched off again even when the build fails; the build
/// error is the one reported.
pub fn build(runner: &dyn Runner, options: &BuildOptions, coverage: Option<&Bullseye>) -> Result<()> {
    let Some(bullseye) = coverage else {
        options.invocation().execute(runner)?;
        return Ok(());
    };

    bullseye.enable().execute(runner)?;
    let built = options
        .invocation()
        .add_envs(&bullseye.env())
        .execute(runner)
        .and_then(|_| bullseye.select_paths().execute(runner));
    let disabled = bullseye.disable().execute(runner);

    match (built, disabled) {
        (Err(e), Err(disable_err)) => {
            tracing::error!("failed to disable Bullseye after build failure: {disable_err}");
            Err(e)
        }
        (Err(e), _) | (_, Err(e)) => Err(e),
        (Ok(_), Ok(_)) => Ok(()),
    }
}

pub fn clean(build_dir: &Path) -> Result<()> {
    tracing::info!("Cleaning: {}", build_dir.display());
    crate::fs::remove_dir_all_forced(build_dir)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write_presets(dir: &Path) {
        std::fs::write(
            dir.join(PRESETS_FILE),
            r#"{
                "version": 3,
                "configurePresets": [
                    { "name": "base", "hidden": true },
                    { "name": "default", "inherits": "base" }
                ]
            }"#,
        )
        .unwrap();
    }

    fn base() -> ConfigureOptions {
        ConfigureOptions {
            build_dir: "../build".into(),
            source_dir: "../".into(),
            ..Default::default()
        }
    }

    #[test]
    fn get_cmake_preset() {
        let tmp = TempDir::new().unwrap();
        write_presets(tmp.path());

        let presets = CMakePresets::load(tmp.path()).unwrap();
        let preset = presets.get_preset("default").expect("Failed to get preset default");
        assert_eq!(preset.name(), "default");
        assert!(presets.get_preset("base").unwrap().is_hidden());

        let direct = CMakePresets::load(tmp.path().join(PRESETS_FILE)).unwrap();
        assert!(direct.get_preset("default").is_some());
    }

    #[test]
    fn hidden_or_unknown_presets_are_rejected() {
        let tmp = TempDir::new().unwrap();
        write_presets(tmp.path());
        let presets = CMakePresets::load(tmp.path()).unwrap();

        assert!(matches!(presets.selectable("base"), Err(Error::PresetNotFound { .. })));
        assert!(matches!(presets.selectable("ci"), Err(Error::PresetNotFound { .. })));
    }

    #[test]
    fn malformed_presets_are_reported() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(PRESETS_FILE), "{ not json").unwrap();
        assert!(matches!(
            CMakePresets::load(tmp.path()),
            Err(Error::InvalidPresets { .. })
        ));
    }

    #[test]
    fn minimal_configure_command() {
        let inv = base().invocation().unwrap();
        assert_eq!(inv.argv(), ["cmake", "-B", "../build", "-S", "../"]);
        assert!(inv.env().is_empty());
    }

    #[test]
    fn configure_flag_order_follows_options() {
        let options = ConfigureOptions {
            generator: Some("Ninja".into()),
            ccache: true,
            extra: vec!["-DFOO=1".into()],
            iwyu: true,
            lwyu: true,
            docs: true,
            no_tests: true,
            packages: Some("DEB;RPM".into()),
            c_compiler: Some("clang".into()),
            cxx_compiler: Some("clang++".into()),
            linker: Some("lld".into()),
            build_type: Some("Debug".into()),
            ..base()
        };
        let argv = options.invocation().unwrap().argv();
        assert_eq!(
            &argv[5..],
            [
                "-G",
                "Ninja",
                "-DCMAKE_CXX_COMPILER_LAUNCHER=ccache",
                "-DFOO=1",
                "-DCMAKE_EXPORT_COMPILE_COMMANDS=ON",
                "-DCMAKE_CXX_INCLUDE_WHAT_YOU_USE=iwyu;-Xiwyu;--no_fwd_decls",
                "-DCMAKE_LINK_WHAT_YOU_USE=ON",
                "-DBUILD_DOCS=ON",
                "-DBUILD_TESTING=OFF",
                "-DCPACK_GENERATOR=DEB;RPM",
                "-DCMAKE_C_COMPILER=clang",
                "-DCMAKE_CXX_COMPILER=clang++",
                "-DCMAKE_LINKER=lld",
                "-DCMAKE_BUILD_TYPE=Debug",
            ]
        );
    }

    #[test]
    fn sanitizer_implies_debug_info_build() {
        let options = ConfigureOptions {
            sanitizer: Some(Sanitizer::Tsan),
            ..base()
        };
        let argv = options.invocation().unwrap().argv();
        assert!(argv.contains(&"-DUSE_TSAN=ON".to_string()));
        assert_eq!(argv.last().unwrap(), "-DCMAKE_BUILD_TYPE=RelWithDebInfo");

        let explicit = ConfigureOptions {
            sanitizer: Some(Sanitizer::Asan),
            build_type: Some("Debug".into()),
            ..base()
        };
        assert_eq!(
            explicit.invocation().unwrap().argv().last().unwrap(),
            "-DCMAKE_BUILD_TYPE=Debug"
        );
    }

    #[test]
    fn clang_tidy_exports_compile_commands() {
        let options = ConfigureOptions {
            clang_tidy: true,
            ..base()
        };
        assert_eq!(
            options.invocation().unwrap().argv().last().unwrap(),
            "-DCMAKE_EXPORT_COMPILE_COMMANDS=ON"
        );
    }

    #[test]
    fn preset_is_validated_against_source_tree() {
        let tmp = TempDir::new().unwrap();
        write_presets(tmp.path());
        let options = ConfigureOptions {
            source_dir: tmp.path().to_path_buf(),
            preset: Some("default".into()),
            ..base()
        };
        assert_eq!(options.invocation().unwrap().argv()[5], "--preset=default");

        let missing = ConfigureOptions {
            preset: Some("release".into()),
            ..options
        };
        assert!(missing.invocation().is_err());
    }

    #[test]
    fn bullseye_only_touches_the_invocation_environment() {
        let options = ConfigureOptions {
            bullseye: Some("/opt/BullseyeCoverage".into()),
            ..base()
        };
        let inv = options.invocation().unwrap();
        let path = inv.env().get(std::ffi::OsStr::new("PATH")).unwrap();
        assert_eq!(
            std::env::split_paths(path).next().unwrap(),
            PathBuf::from("/opt/BullseyeCoverage/bin")
        );
        assert_ne!(std::env::var_os("PATH").as_ref(), Some(path));
    }

    #[test]
    fn build_command_variants() {
        let plain = BuildOptions {
            build_dir: "../build".into(),
            ..Default::default()
        };
        assert_eq!(
            plain.invocation().argv(),
            ["cmake", "--build", "../build", "--parallel"]
        );

        let full = BuildOptions {
            jobs: Some(8),
            target: Some("cassian_tests".into()),
            build_type: Some("Release".into()),
            ..plain
        };
        assert_eq!(
            full.invocation().argv(),
            [
                "cmake",
                "--build",
                "../build",
                "--parallel",
                "8",
                "--target",
                "cassian_tests",
                "--config",
                "Release"
            ]
        );
    }

    #[test]
    fn dependency_install_commands() {
        let configure = install_configure(
            Path::new("/deps/tmp/Catch2"),
            Path::new("/deps/tmp/Catch2/build"),
            Path::new("/deps/catch2"),
            &["-A".to_string(), "x64".to_string()],
        );
        assert_eq!(
            configure.argv(),
            [
                "cmake",
                "-S",
                "/deps/tmp/Catch2",
                "-B",
                "/deps/tmp/Catch2/build",
                "-DBUILD_TESTING=OFF",
                "-DCMAKE_INSTALL_PREFIX=/deps/catch2",
                "-A",
                "x64"
            ]
        );
        assert_eq!(
            install_target(Path::new("/deps/tmp/Catch2/build")).argv(),
            ["cmake", "--build", "/deps/tmp/Catch2/build", "--target", "install"]
        );
    }

    #[test]
    fn clean_removes_build_directory() {
        let tmp = TempDir::new().unwrap();
        let build = tmp.path().join("build");
        std::fs::create_dir_all(build.join("CMakeFiles")).unwrap();
        clean(&build).unwrap();
        assert!(!build.exists());
    }
}
