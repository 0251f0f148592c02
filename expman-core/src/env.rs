//! Environment in which simulations are executed.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use crate::error::Error;
use crate::util;
use crate::{Config, Result, DEFAULT_TOOLCHAIN_EXEC, MODEL_EXEC_NAME};

/// Abstraction over the environment where simulations are executed.
///
/// Validated once on creation. Models are compiled executables laid out
/// as `<models_dir>/<model_type>/<model_name>/main`, each invoked as a
/// separate process.
#[derive(Debug, Clone)]
pub struct SimEnvironment {
    toolchain_dir: PathBuf,
    models_dir: PathBuf,
}

impl SimEnvironment {
    /// Creates a new environment, checking that the toolchain directory
    /// and the default toolchain executable exist.
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(toolchain_dir: P, models_dir: Q) -> Result<Self> {
        Self::with_toolchain_exec(toolchain_dir, DEFAULT_TOOLCHAIN_EXEC, models_dir)
    }

    /// Creates a new environment using the paths from the given config.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_toolchain_exec(
            config.toolchain_dir.clone(),
            &config.toolchain_exec,
            config.models_dir.clone(),
        )
    }

    /// Creates a new environment, checking that the toolchain directory
    /// and the named toolchain executable within it exist.
    pub fn with_toolchain_exec<P: Into<PathBuf>, Q: Into<PathBuf>>(
        toolchain_dir: P,
        toolchain_exec: &str,
        models_dir: Q,
    ) -> Result<Self> {
        let toolchain_dir = toolchain_dir.into();
        if !toolchain_dir.is_dir() {
            return Err(Error::Configuration(format!(
                "toolchain directory not found: {}",
                toolchain_dir.display()
            )));
        }
        debug!("checking for toolchain executable");
        let exec = toolchain_dir.join(toolchain_exec);
        if !exec.is_file() {
            return Err(Error::Configuration(format!(
                "toolchain executable not found: {}",
                exec.display()
            )));
        }
        debug!("toolchain ok");
        Ok(Self {
            toolchain_dir,
            models_dir: models_dir.into(),
        })
    }

    pub fn toolchain_dir(&self) -> &Path {
        &self.toolchain_dir
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Path to the directory of the given model.
    pub fn model_path(&self, model_name: &str, model_type: &str) -> PathBuf {
        util::model_path(&self.models_dir, model_name, model_type)
    }

    /// Checks whether the model is ready for execution, meaning both its
    /// directory and its compiled executable exist.
    pub fn check_model(&self, model_name: &str, model_type: &str) -> Result<()> {
        debug!(
            "checking if model {} ({}) is ready for execution",
            model_name, model_type
        );
        let mdir = self.model_path(model_name, model_type);
        if !mdir.is_dir() {
            return Err(Error::ModelNotFound(format!(
                "model directory not found: {}",
                mdir.display()
            )));
        }
        let mexec = mdir.join(MODEL_EXEC_NAME);
        if !mexec.is_file() {
            return Err(Error::ModelNotFound(format!(
                "model executable not found: {}",
                mexec.display()
            )));
        }
        Ok(())
    }

    /// Executes the model for the given number of steps, starting from the
    /// state stored at `starting_state`.
    ///
    /// The executable is invoked from within the model directory with the
    /// step count and the absolute starting-state path as arguments. Blocks
    /// until the process exits. The exit status is returned as is, a
    /// non-zero status is not turned into an error.
    pub fn run(
        &self,
        model_name: &str,
        model_type: &str,
        starting_state: &Path,
        steps: u32,
    ) -> Result<ExitStatus> {
        self.check_model(model_name, model_type)?;
        let state_path = dunce::canonicalize(starting_state).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::FileNotFound(starting_state.to_path_buf()),
            _ => Error::from(e),
        })?;
        let mdir = dunce::canonicalize(self.model_path(model_name, model_type))?;
        let exec = mdir.join(MODEL_EXEC_NAME);
        info!(
            "executing '{} {} {}' in {}",
            exec.display(),
            steps,
            state_path.display(),
            mdir.display()
        );
        let status = Command::new(&exec)
            .arg(steps.to_string())
            .arg(&state_path)
            .current_dir(&mdir)
            .status()?;
        Ok(status)
    }
}

#[cfg(all(test, unix))]
pub(crate) mod testing {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Writes an executable shell script at the given path.
    pub fn write_script(path: &Path, body: &str) {
        fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        let mut perms = fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).unwrap();
    }

    /// Creates a toolchain directory and a models root with a single model
    /// whose executable logs its arguments to `calls.log`.
    pub fn fake_env(root: &Path, model_name: &str, model_type: &str) -> (PathBuf, PathBuf) {
        let toolchain = root.join("xparser");
        fs::create_dir_all(&toolchain).unwrap();
        write_script(&toolchain.join("xparser"), "exit 0");
        let models = root.join("models");
        let mdir = models.join(model_type).join(model_name);
        fs::create_dir_all(&mdir).unwrap();
        write_script(&mdir.join("main"), "echo \"$1 $2\" >> calls.log");
        (toolchain, models)
    }
}

#[test]
fn env_missing_toolchain_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let res = SimEnvironment::new(tmp.path().join("none"), tmp.path());
    assert!(matches!(res, Err(Error::Configuration(_))));
}

#[test]
fn env_missing_toolchain_exec() {
    let tmp = tempfile::tempdir().unwrap();
    let res = SimEnvironment::new(tmp.path(), tmp.path());
    assert!(matches!(res, Err(Error::Configuration(_))));
}

#[cfg(unix)]
#[test]
fn env_check_model() {
    let tmp = tempfile::tempdir().unwrap();
    let (toolchain, models) = testing::fake_env(tmp.path(), "bielefeld", "xmml");
    let env = SimEnvironment::new(toolchain, &models).unwrap();
    assert!(env.check_model("bielefeld", "xmml").is_ok());
    assert!(matches!(
        env.check_model("nowhere", "xmml"),
        Err(Error::ModelNotFound(_))
    ));

    // directory present, executable missing
    std::fs::create_dir_all(models.join("xmml").join("uncompiled")).unwrap();
    assert!(matches!(
        env.check_model("uncompiled", "xmml"),
        Err(Error::ModelNotFound(_))
    ));
}

#[cfg(unix)]
#[test]
fn env_run_passes_steps_and_absolute_state_path() {
    let tmp = tempfile::tempdir().unwrap();
    let (toolchain, models) = testing::fake_env(tmp.path(), "bielefeld", "xmml");
    let env = SimEnvironment::new(toolchain, &models).unwrap();
    let state = tmp.path().join("0.xml");
    std::fs::write(&state, "<states/>").unwrap();

    let status = env.run("bielefeld", "xmml", &state, 7).unwrap();
    assert!(status.success());

    let log = std::fs::read_to_string(models.join("xmml/bielefeld/calls.log")).unwrap();
    let expected = format!("7 {}\n", dunce::canonicalize(&state).unwrap().display());
    assert_eq!(log, expected);
}

#[cfg(unix)]
#[test]
fn env_run_returns_raw_failure_status() {
    let tmp = tempfile::tempdir().unwrap();
    let (toolchain, models) = testing::fake_env(tmp.path(), "failing", "xmml");
    testing::write_script(&models.join("xmml/failing/main"), "exit 3");
    let env = SimEnvironment::new(toolchain, &models).unwrap();
    let state = tmp.path().join("0.xml");
    std::fs::write(&state, "<states/>").unwrap();

    let status = env.run("failing", "xmml", &state, 1).unwrap();
    assert_eq!(status.code(), Some(3));
}
