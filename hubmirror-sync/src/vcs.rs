//! Source-code mirroring through the `git` command line.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::VcsError;

/// Clone-or-update access to a version-control mirror.
pub trait VcsMirror {
    /// Is there already a working copy at `path`?
    fn exists(&self, path: &Path) -> bool;

    fn clone_repo(&self, address: &str, path: &Path) -> Result<(), VcsError>;

    fn pull(&self, path: &Path) -> Result<(), VcsError>;
}

/// [`VcsMirror`] that shells out to `git`.
///
/// A token is handed to each `git` invocation as an `http.extraHeader`
/// override, so it never lands in the working copy's `remote.origin.url`.
pub struct GitCli {
    program: PathBuf,
    token: Option<String>,
}

impl GitCli {
    /// A bare executable name is resolved on `PATH`; anything else is used
    /// as given.
    pub fn new(executable: impl Into<PathBuf>, token: Option<String>) -> Self {
        let executable = executable.into();
        let program = if executable.components().count() == 1 {
            which::which(&executable).unwrap_or(executable)
        } else {
            executable
        };
        Self {
            program,
            token: token.filter(|t| !t.is_empty()),
        }
    }

    /// `-c http.extraHeader=...` carrying the token, or nothing.
    fn auth_args(&self) -> Vec<OsString> {
        match &self.token {
            Some(token) => vec![
                OsString::from("-c"),
                OsString::from(format!("http.extraHeader={}", basic_auth_header(token))),
            ],
            None => Vec::new(),
        }
    }

    /// Run `git` with `args`. `shown` is the redacted form used in logs and
    /// errors.
    fn run(&self, args: Vec<OsString>, shown: &str) -> Result<(), VcsError> {
        let command = format!("git {shown}");
        tracing::info!("+ {command}");
        let output = Command::new(&self.program)
            .args(self.auth_args())
            .args(args)
            .stdin(Stdio::null())
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .map_err(|source| VcsError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;
        if output.status.success() {
            return Ok(());
        }
        Err(VcsError::Failed {
            command,
            status: output.status.to_string(),
            stderr: self.redact(String::from_utf8_lossy(&output.stderr).trim()),
        })
    }

    fn redact(&self, text: &str) -> String {
        match &self.token {
            Some(token) => text
                .replace(&basic_auth_header(token), "Authorization: ***")
                .replace(token.as_str(), "***"),
            None => text.to_string(),
        }
    }
}

impl VcsMirror for GitCli {
    fn exists(&self, path: &Path) -> bool {
        path.join(".git").exists()
    }

    fn clone_repo(&self, address: &str, path: &Path) -> Result<(), VcsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| VcsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let args = vec![
            OsString::from("clone"),
            OsString::from(address),
            path.as_os_str().to_owned(),
        ];
        self.run(args, &format!("clone {address} {}", path.display()))
    }

    fn pull(&self, path: &Path) -> Result<(), VcsError> {
        let args = vec![
            OsString::from("-C"),
            path.as_os_str().to_owned(),
            OsString::from("pull"),
            OsString::from("--ff-only"),
        ];
        self.run(args, &format!("-C {} pull --ff-only", path.display()))
    }
}

/// Basic credentials in the form GitHub accepts for token auth over https.
fn basic_auth_header(token: &str) -> String {
    let credentials = STANDARD.encode(format!("x-access-token:{token}"));
    format!("Authorization: Basic {credentials}")
}
