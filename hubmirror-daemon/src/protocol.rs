use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;

/// JSON newline-delimited request.
///
/// `sync` needs `repo_url`; `token` is optional and only used for that sync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonRequest {
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl DaemonRequest {
    pub fn command(cmd: &str) -> Self {
        Self {
            cmd: cmd.to_string(),
            ..Self::default()
        }
    }

    pub fn sync(repo_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            cmd: "sync".to_string(),
            repo_url: Some(repo_url.into()),
            token,
        }
    }
}

/// JSON newline-delimited response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// How many times [`request_status`] tries to reach a daemon that is still
/// binding its socket.
const STATUS_ATTEMPTS: u32 = 5;
const STATUS_RETRY_DELAY: Duration = Duration::from_millis(100);

/// One connection to the daemon socket. Each request opens a fresh one.
pub struct DaemonClient {
    socket: PathBuf,
    stream: UnixStream,
}

impl DaemonClient {
    pub fn connect(home: &Path) -> Result<Self, DaemonError> {
        let socket = socket_path(home);
        if !socket.exists() {
            return Err(DaemonError::DaemonNotRunning { socket });
        }
        match UnixStream::connect(&socket) {
            Ok(stream) => Ok(Self { socket, stream }),
            Err(err) if is_not_listening(&err) => Err(DaemonError::DaemonNotRunning { socket }),
            Err(err) => Err(io_err(&socket, err)),
        }
    }

    /// Write `request` as one line and read one response line back.
    pub fn call(mut self, request: &DaemonRequest) -> Result<DaemonResponse, DaemonError> {
        let mut line = serde_json::to_vec(request)?;
        line.push(b'\n');
        self.stream
            .write_all(&line)
            .and_then(|()| self.stream.flush())
            .map_err(|e| io_err(&self.socket, e))?;

        let mut reply = String::new();
        let read = BufReader::new(&self.stream)
            .read_line(&mut reply)
            .map_err(|e| io_err(&self.socket, e))?;
        if read == 0 {
            return Err(DaemonError::Protocol(format!(
                "daemon at {} hung up without a response",
                self.socket.display()
            )));
        }
        Ok(serde_json::from_str(reply.trim_end())?)
    }
}

fn is_not_listening(err: &std::io::Error) -> bool {
    use std::io::ErrorKind;
    matches!(
        err.kind(),
        ErrorKind::NotFound | ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset
    )
}

/// Send one request and return the daemon's response.
pub fn send_request(home: &Path, request: &DaemonRequest) -> Result<DaemonResponse, DaemonError> {
    DaemonClient::connect(home)?.call(request)
}

/// Query status, retrying briefly while a freshly started daemon binds.
pub fn request_status(home: &Path) -> Result<Value, DaemonError> {
    let request = DaemonRequest::command("status");
    let mut attempt = 1;
    loop {
        match send_request(home, &request) {
            Ok(response) => return response_into_data(response),
            Err(DaemonError::DaemonNotRunning { .. }) if attempt < STATUS_ATTEMPTS => {
                attempt += 1;
                sleep(STATUS_RETRY_DELAY);
            }
            Err(err) => return Err(err),
        }
    }
}

pub fn request_stop(home: &Path) -> Result<(), DaemonError> {
    send_request(home, &DaemonRequest::command("stop")).and_then(response_into_data)?;
    Ok(())
}

/// Ask the daemon to sync `repo_url` and wait for its outcome.
pub fn request_sync(
    home: &Path,
    repo_url: &str,
    token: Option<String>,
) -> Result<Value, DaemonError> {
    send_request(home, &DaemonRequest::sync(repo_url, token)).and_then(response_into_data)
}

fn response_into_data(response: DaemonResponse) -> Result<Value, DaemonError> {
    match response {
        DaemonResponse { ok: true, data, .. } => Ok(data.unwrap_or(Value::Null)),
        DaemonResponse { error, .. } => Err(DaemonError::Protocol(
            error.unwrap_or_else(|| "daemon reported failure without a message".to_string()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn request_omits_absent_fields() {
        let encoded = serde_json::to_value(DaemonRequest::command("status")).unwrap();
        assert_eq!(encoded, json!({"cmd": "status"}));

        let decoded: DaemonRequest =
            serde_json::from_str(r#"{"cmd":"sync","repo_url":"acme/widget"}"#).unwrap();
        assert_eq!(decoded.repo_url.as_deref(), Some("acme/widget"));
        assert!(decoded.token.is_none());
    }

    #[test]
    fn error_response_becomes_protocol_error() {
        let err = response_into_data(DaemonResponse::error("boom")).unwrap_err();
        assert!(matches!(err, DaemonError::Protocol(ref m) if m == "boom"));
        let data = response_into_data(DaemonResponse::ok(json!({"x": 1}))).unwrap();
        assert_eq!(data["x"], 1);
    }

    #[test]
    fn missing_socket_means_not_running() {
        let home = TempDir::new().unwrap();
        let err = send_request(home.path(), &DaemonRequest::command("status")).unwrap_err();
        assert!(matches!(err, DaemonError::DaemonNotRunning { .. }));
    }
}
