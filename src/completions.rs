use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap_complete::{generate, Shell};
use tracing::debug;

use crate::app::AppError;

const BIN_NAME: &str = "actgen";

pub fn generate_completions(shell: Shell, buf: &mut dyn Write) {
    let mut cmd = crate::cli::styled_command();
    generate(shell, &mut cmd, BIN_NAME, buf);
}

/// Picks the shell from the argument when given, otherwise from `$SHELL`.
/// Both accept a bare name or a path such as `/usr/bin/zsh`.
fn resolve_shell(arg: Option<&str>, env_shell: Option<&str>) -> Result<Shell, AppError> {
    match arg {
        Some(name) => Shell::from_shell_path(name.trim())
            .ok_or_else(|| AppError::InvalidArgument(format!("unknown shell '{name}'"))),
        None => env_shell
            .and_then(|raw| Shell::from_shell_path(raw.trim()))
            .ok_or_else(|| {
                AppError::InvalidArgument(
                    "unable to detect shell from $SHELL; pass a shell name".to_string(),
                )
            }),
    }
}

/// Base directories for installed scripts. `XDG_DATA_HOME` and
/// `XDG_CONFIG_HOME` win over the usual locations under `$HOME`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BaseDirs {
    home: PathBuf,
    data: PathBuf,
    config: PathBuf,
}

impl BaseDirs {
    fn under(home: &Path) -> Self {
        Self {
            home: home.to_path_buf(),
            data: home.join(".local/share"),
            config: home.join(".config"),
        }
    }

    fn from_env() -> Result<Self, AppError> {
        let home = env::var_os("HOME").filter(|v| !v.is_empty()).ok_or_else(|| {
            AppError::InvalidArgument("HOME is not set; cannot install completions".to_string())
        })?;
        let mut dirs = Self::under(Path::new(&home));
        if let Some(data) = absolute_env_dir("XDG_DATA_HOME") {
            dirs.data = data;
        }
        if let Some(config) = absolute_env_dir("XDG_CONFIG_HOME") {
            dirs.config = config;
        }
        Ok(dirs)
    }
}

// Relative XDG values are invalid and ignored.
fn absolute_env_dir(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .map(PathBuf::from)
        .filter(|path| path.is_absolute())
}

/// A line a shell startup file must contain before the script is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StartupHook {
    rc_file: PathBuf,
    line: String,
}

impl StartupHook {
    /// Appends the line unless it is already present. Returns whether the
    /// file changed.
    fn ensure(&self) -> io::Result<bool> {
        match fs::read_to_string(&self.rc_file) {
            Ok(content) if content.lines().any(|l| l.trim() == self.line) => return Ok(false),
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.rc_file)?;
        writeln!(file)?;
        writeln!(file, "# {BIN_NAME} shell completions")?;
        writeln!(file, "{}", self.line)?;
        Ok(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct InstallTarget {
    script: PathBuf,
    hook: Option<StartupHook>,
}

impl InstallTarget {
    /// Bash and fish pick scripts up from their completion directories. Zsh
    /// needs an explicit `source` line in `.zshrc`. Other shells have no
    /// install location.
    fn for_shell(shell: Shell, dirs: &BaseDirs) -> Option<Self> {
        match shell {
            Shell::Bash => Some(Self {
                script: dirs.data.join("bash-completion/completions").join(BIN_NAME),
                hook: None,
            }),
            Shell::Fish => Some(Self {
                script: dirs
                    .config
                    .join("fish/completions")
                    .join(format!("{BIN_NAME}.fish")),
                hook: None,
            }),
            Shell::Zsh => {
                let script = dirs
                    .data
                    .join(BIN_NAME)
                    .join("completions")
                    .join(format!("_{BIN_NAME}"));
                let hook = StartupHook {
                    rc_file: dirs.home.join(".zshrc"),
                    line: format!("source \"{}\"", script.display()),
                };
                Some(Self {
                    script,
                    hook: Some(hook),
                })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Installed {
    script: PathBuf,
    hooked: Option<PathBuf>,
}

fn install(shell: Shell, dirs: &BaseDirs) -> Result<Installed, AppError> {
    let target = InstallTarget::for_shell(shell, dirs).ok_or_else(|| {
        AppError::InvalidArgument(format!("installing completions for {shell} is not supported"))
    })?;
    if let Some(parent) = target.script.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut script = Vec::new();
    generate_completions(shell, &mut script);
    fs::write(&target.script, script)?;
    debug!(shell = %shell, path = %target.script.display(), "wrote completion script");

    let mut hooked = None;
    if let Some(hook) = &target.hook {
        if hook.ensure()? {
            hooked = Some(hook.rc_file.clone());
        }
    }
    Ok(Installed {
        script: target.script,
        hooked,
    })
}

pub fn run_completions_command(shell_arg: Option<&str>, install_script: bool) -> Result<(), AppError> {
    let env_shell = env::var("SHELL").ok();
    let shell = resolve_shell(shell_arg, env_shell.as_deref())?;

    if !install_script {
        let mut stdout = io::stdout().lock();
        generate_completions(shell, &mut stdout);
        return Ok(());
    }

    let installed = install(shell, &BaseDirs::from_env()?)?;
    println!("completions installed to {}", installed.script.display());
    if let Some(rc_file) = installed.hooked {
        println!("added a source line to {}", rc_file.display());
    }
    Ok(())
}
