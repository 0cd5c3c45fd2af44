use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot, Mutex, RwLock, Semaphore};
use tokio::time::Instant;
use tracing_subscriber::fmt::MakeWriter;

use hubmirror_core::{config, MirrorConfig, ProjectName, RepoAddress};
use hubmirror_store::{open_backend, ProjectStore};
use hubmirror_sync::{pipeline, Credentials, SyncError, SyncOutcome};

use crate::error::{io_err, DaemonError};
use crate::log_rotation::{rotate_logs, RotationPolicy};
use crate::paths::{hubmirror_root, logs_dir, socket_path, stderr_log_path, stdout_log_path};
use crate::protocol::{DaemonRequest, DaemonResponse};

/// Per-project last successful sync (Unix seconds), keyed by project name.
pub type SyncTimestamps = HashMap<String, u64>;

/// Runs one blocking project sync. The default calls [`pipeline::run`].
pub type SyncRunner =
    Arc<dyn Fn(&RepoAddress, &Credentials) -> Result<SyncOutcome, SyncError> + Send + Sync>;

struct SyncJob {
    address: RepoAddress,
    credentials: Credentials,
    respond_to: oneshot::Sender<Result<SyncOutcome, String>>,
}

/// State shared by every daemon task.
pub struct DaemonState {
    home: PathBuf,
    config: MirrorConfig,
    store: Arc<dyn ProjectStore>,
    runner: SyncRunner,
    permits: Arc<Semaphore>,
    project_locks: Mutex<HashMap<ProjectName, Arc<Mutex<()>>>>,
    timestamps: RwLock<SyncTimestamps>,
    active: RwLock<HashSet<String>>,
    started_at_unix: u64,
}

impl DaemonState {
    pub fn new(home: PathBuf, config: MirrorConfig, store: Arc<dyn ProjectStore>) -> Self {
        let runner: SyncRunner = {
            let home = home.clone();
            let config = config.clone();
            let store = store.clone();
            Arc::new(move |address: &RepoAddress, credentials: &Credentials| {
                pipeline::run(&home, &config, store.as_ref(), address.as_str(), credentials)
            })
        };
        Self {
            permits: Arc::new(Semaphore::new(config.max_parallel_syncs.max(1))),
            home,
            config,
            store,
            runner,
            project_locks: Mutex::new(HashMap::new()),
            timestamps: RwLock::new(HashMap::new()),
            active: RwLock::new(HashSet::new()),
            started_at_unix: unix_seconds_now(),
        }
    }

    /// Replace the sync runner.
    pub fn with_runner(mut self, runner: SyncRunner) -> Self {
        self.runner = runner;
        self
    }

    async fn project_lock(&self, name: &ProjectName) -> Arc<Mutex<()>> {
        let mut locks = self.project_locks.lock().await;
        locks.entry(name.clone()).or_default().clone()
    }

    /// Drop the project's lock entry once no other job holds or awaits it.
    async fn release_project_lock(&self, name: &ProjectName, lock: Arc<Mutex<()>>) {
        let mut locks = self.project_locks.lock().await;
        // One reference in the map, one here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(name);
        }
    }
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing(home)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Load configuration and store for `home`, then serve until stopped.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    let config = config::load_at(&home)?;
    let store: Arc<dyn ProjectStore> = Arc::from(open_backend(&config, &home)?);
    tracing::info!(
        backend = ?config.backend,
        data_dir = %config.data_dir_at(&home).display(),
        max_parallel_syncs = config.max_parallel_syncs,
        "daemon starting",
    );
    serve(Arc::new(DaemonState::new(home, config, store))).await
}

/// Run the socket server, sync processor, log rotation and signal handler.
pub async fn serve(state: Arc<DaemonState>) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&state.home)?;

    let (sync_tx, sync_rx) = mpsc::channel::<SyncJob>(64);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let result = sync_processor_task(state, sync_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let result =
                socket_server_task(state, sync_tx, shutdown.clone(), shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let rotation_handle = {
        let shutdown = shutdown_tx.clone();
        let home = state.home.clone();
        tokio::spawn(async move {
            let result = log_rotation_task(home, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!(
                            "ctrl-c handler failed: {err}"
                        ))),
                    }
                }
            }
        })
    };

    let (processor_result, socket_result, rotation_result, signal_result) =
        tokio::join!(processor_handle, socket_handle, rotation_handle, signal_handle);

    handle_join("sync_processor", processor_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("log_rotation", rotation_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("daemon stopped");
    Ok(())
}

async fn sync_processor_task(
    state: Arc<DaemonState>,
    mut sync_rx: mpsc::Receiver<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = sync_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let state = state.clone();
                tokio::spawn(async move {
                    let outcome = run_job(&state, job.address, job.credentials).await;
                    let _ = job.respond_to.send(outcome.map_err(|err| err.to_string()));
                });
            }
        }
    }
    Ok(())
}

/// One sync: serialized per project, bounded across projects.
async fn run_job(
    state: &Arc<DaemonState>,
    address: RepoAddress,
    credentials: Credentials,
) -> Result<SyncOutcome, DaemonError> {
    let name = address.project_name();
    let lock = state.project_lock(&name).await;
    let result = {
        let _project_guard = lock.lock().await;
        run_locked(state, &name, address, credentials).await
    };
    state.release_project_lock(&name, lock).await;
    result
}

async fn run_locked(
    state: &Arc<DaemonState>,
    name: &ProjectName,
    address: RepoAddress,
    credentials: Credentials,
) -> Result<SyncOutcome, DaemonError> {
    let _permit = state
        .permits
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync permits"))?;

    state.active.write().await.insert(name.0.clone());
    let started = Instant::now();
    let runner = state.runner.clone();
    let result = tokio::task::spawn_blocking(move || runner(&address, &credentials)).await;
    state.active.write().await.remove(name.as_str());

    let outcome = result
        .map_err(|err| DaemonError::Protocol(format!("sync task join error: {err}")))?
        .map_err(|err| {
            tracing::error!(project = %name, error = %err, "sync failed");
            err
        })?;

    if let SyncOutcome::Synced(report) = &outcome {
        state
            .timestamps
            .write()
            .await
            .insert(name.0.clone(), unix_seconds_now());
        tracing::info!(
            project = %name,
            written = report.written(),
            duration_ms = started.elapsed().as_millis() as u64,
            "sync completed",
        );
    }
    Ok(outcome)
}

async fn socket_server_task(
    state: Arc<DaemonState>,
    sync_tx: mpsc::Sender<SyncJob>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&state.home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let state = state.clone();
                let sync_tx = sync_tx.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    let result = handle_socket_client(stream, state, sync_tx, shutdown_tx).await;
                    if let Err(err) = result {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    state: Arc<DaemonState>,
    sync_tx: mpsc::Sender<SyncJob>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let response = match request.cmd.as_str() {
            "status" => DaemonResponse::ok(build_status_payload(&state).await),
            "sync" => match parse_sync_request(&request) {
                Ok((address, credentials)) => {
                    match enqueue_sync(&sync_tx, address, credentials).await {
                        Ok(outcome) => DaemonResponse::ok(serde_json::to_value(&outcome)?),
                        Err(err) => DaemonResponse::error(err.to_string()),
                    }
                }
                Err(message) => DaemonResponse::error(message),
            },
            "stop" => {
                let _ = shutdown_tx.send(());
                DaemonResponse::ok(json!({ "stopping": true }))
            }
            other => DaemonResponse::error(format!("unknown command '{other}'")),
        };

        write_response(&mut writer, &response).await?;
        if request.cmd == "stop" {
            break;
        }
    }

    Ok(())
}

fn parse_sync_request(request: &DaemonRequest) -> Result<(RepoAddress, Credentials), String> {
    let repo_url = request
        .repo_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| "sync requires 'repo_url' (and optionally 'token')".to_string())?;
    let address = RepoAddress::parse(repo_url).map_err(|err| err.to_string())?;
    let credentials = Credentials {
        token: request.token.clone().filter(|t| !t.is_empty()),
    };
    Ok((address, credentials))
}

async fn enqueue_sync(
    sync_tx: &mpsc::Sender<SyncJob>,
    address: RepoAddress,
    credentials: Credentials,
) -> Result<SyncOutcome, DaemonError> {
    let (tx, rx) = oneshot::channel();
    sync_tx
        .send(SyncJob {
            address,
            credentials,
            respond_to: tx,
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync queue"))?;

    let outcome = rx
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync response"))?;
    outcome.map_err(DaemonError::Protocol)
}

async fn build_status_payload(state: &DaemonState) -> Value {
    let timestamps: SyncTimestamps = state.timestamps.read().await.clone();
    let active: HashSet<String> = state.active.read().await.clone();

    let store = state.store.clone();
    let stored = match tokio::task::spawn_blocking(move || store.list_projects()).await {
        Ok(Ok(projects)) => projects,
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "cannot list stored projects");
            Vec::new()
        }
        Err(err) => {
            tracing::warn!(error = %err, "project listing task failed");
            Vec::new()
        }
    };

    let projects: Vec<Value> = stored
        .iter()
        .map(|project| {
            let name = project.name.as_str();
            json!({
                "name": name,
                "stored": project.stored_total(),
                "synced_at": project.synced_at,
                "last_sync_at_unix": timestamps.get(name).copied().unwrap_or(0),
                "syncing": active.contains(name),
            })
        })
        .collect();

    json!({
        "running": true,
        "started_at_unix": state.started_at_unix,
        "last_sync_at_unix": timestamps.values().copied().max().unwrap_or(0),
        "active_syncs": active.len(),
        "max_parallel_syncs": state.config.max_parallel_syncs,
        "projects": projects,
        "socket": socket_path(&state.home).display().to_string(),
        "data_dir": state.config.data_dir_at(&state.home).display().to_string(),
    })
}

async fn log_rotation_task(
    home: PathBuf,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut interval = tokio::time::interval(Duration::from_secs(5));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick fires immediately; rotating at startup is not wanted.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                let home = home.clone();
                tokio::task::spawn_blocking(move || rotate_logs(&home, RotationPolicy::default()))
                    .await
                    .ok();
            }
        }
    }
    Ok(())
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    for dir in [hubmirror_root(home), logs_dir(home)] {
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
    }
    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Log to stdout and to `logs/daemon.log`; warnings and errors also go to
/// `logs/daemon-err.log`.
fn init_tracing(home: &Path) -> Result<(), DaemonError> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;
    use tracing_subscriber::{fmt, EnvFilter};

    let files = log_file_writer(home)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stdout.and(files))
        .try_init();
    Ok(())
}

/// Writer appending every event to the stdout log and warnings and errors to
/// the stderr log. Both are opened for append; rotation truncates in place.
fn log_file_writer(
    home: &Path,
) -> Result<impl for<'w> MakeWriter<'w> + Send + Sync + 'static, DaemonError> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    ensure_runtime_dirs(home)?;
    let open = |path: PathBuf| {
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| io_err(&path, e))
    };
    let out = open(stdout_log_path(home))?;
    let err = open(stderr_log_path(home))?;
    Ok(std::sync::Mutex::new(out)
        .and(std::sync::Mutex::new(err).with_max_level(tracing::Level::WARN)))
}

fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use hubmirror_store::FileStore;
    use tempfile::TempDir;

    fn state(home: &TempDir, max_parallel_syncs: usize) -> DaemonState {
        let config = MirrorConfig {
            max_parallel_syncs,
            ..MirrorConfig::default()
        };
        let store: Arc<dyn ProjectStore> =
            Arc::new(FileStore::new(config.data_dir_at(home.path())));
        DaemonState::new(home.path().to_path_buf(), config, store)
    }

    fn request(repo_url: Option<&str>, token: Option<&str>) -> DaemonRequest {
        DaemonRequest {
            cmd: "sync".to_string(),
            repo_url: repo_url.map(str::to_string),
            token: token.map(str::to_string),
        }
    }

    #[test]
    fn sync_request_needs_a_repo_url() {
        let err = parse_sync_request(&request(None, None)).unwrap_err();
        assert!(err.contains("repo_url"), "got: {err}");
        let err = parse_sync_request(&request(Some("  "), None)).unwrap_err();
        assert!(err.contains("repo_url"));
        let err = parse_sync_request(&request(Some("widget"), None)).unwrap_err();
        assert!(err.contains("widget"));
    }

    #[test]
    fn sync_request_carries_token() {
        let (address, credentials) =
            parse_sync_request(&request(Some("https://github.com/acme/widget"), Some("t")))
                .unwrap();
        assert_eq!(address.project_name(), ProjectName::from("acme_widget"));
        assert_eq!(credentials.token.as_deref(), Some("t"));

        let (_, credentials) = parse_sync_request(&request(Some("acme/widget"), Some(""))).unwrap();
        assert!(credentials.token.is_none());
    }

    #[tokio::test]
    async fn status_payload_before_any_sync() {
        let home = TempDir::new().expect("home");
        let state = state(&home, 3);
        let payload = build_status_payload(&state).await;

        assert_eq!(payload["running"], json!(true));
        assert_eq!(payload["last_sync_at_unix"], json!(0u64));
        assert_eq!(payload["max_parallel_syncs"], json!(3));
        assert_eq!(payload["active_syncs"], json!(0));
        assert!(payload["projects"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_payload_lists_stored_projects_with_timestamps() {
        let home = TempDir::new().expect("home");
        let state = state(&home, 1);
        let name = ProjectName::from("acme_widget");
        state.store.open_session(&name).unwrap();
        state
            .store
            .close_session(&name, &hubmirror_core::Project::new(name.clone()))
            .unwrap();
        state
            .timestamps
            .write()
            .await
            .insert("acme_widget".to_string(), 1_000_200);

        let payload = build_status_payload(&state).await;
        assert_eq!(payload["last_sync_at_unix"], json!(1_000_200u64));
        let projects = payload["projects"].as_array().unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0]["name"], "acme_widget");
        assert_eq!(projects[0]["syncing"], json!(false));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn jobs_serialize_per_project_and_respect_the_permit_limit() {
        let home = TempDir::new().expect("home");
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let widget_running = Arc::new(AtomicUsize::new(0));
        let widget_peak = Arc::new(AtomicUsize::new(0));

        let runner: SyncRunner = {
            let (running, peak) = (running.clone(), peak.clone());
            let (widget_running, widget_peak) = (widget_running.clone(), widget_peak.clone());
            Arc::new(move |address: &RepoAddress, _: &Credentials| {
                let is_widget = address.repo() == "widget";
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                if is_widget {
                    let now = widget_running.fetch_add(1, Ordering::SeqCst) + 1;
                    widget_peak.fetch_max(now, Ordering::SeqCst);
                }
                std::thread::sleep(Duration::from_millis(50));
                if is_widget {
                    widget_running.fetch_sub(1, Ordering::SeqCst);
                }
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(SyncOutcome::Skipped {
                    name: address.project_name(),
                })
            })
        };
        let state = Arc::new(state(&home, 2).with_runner(runner));

        let addresses = ["acme/widget", "acme/widget.git", "acme/gadget", "acme/gizmo"];
        let handles: Vec<_> = addresses
            .iter()
            .map(|raw| {
                let state = state.clone();
                let address = RepoAddress::parse(raw).unwrap();
                tokio::spawn(async move { run_job(&state, address, Credentials::default()).await })
            })
            .collect();
        for handle in handles {
            handle.await.expect("join").expect("job");
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(widget_peak.load(Ordering::SeqCst), 1);
        assert!(state.active.read().await.is_empty());
        assert!(state.project_locks.lock().await.is_empty());
    }

    #[test]
    fn daemon_events_are_written_to_the_log_files() {
        let home = TempDir::new().expect("home");
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(log_file_writer(home.path()).expect("open logs"))
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("daemon starting");
            tracing::warn!("sync failed");
        });

        let out = fs::read_to_string(stdout_log_path(home.path())).unwrap();
        assert!(out.contains("daemon starting"), "stdout log: {out}");
        assert!(out.contains("sync failed"));
        let err = fs::read_to_string(stderr_log_path(home.path())).unwrap();
        assert!(err.contains("sync failed"), "stderr log: {err}");
        assert!(!err.contains("daemon starting"));
    }

    #[tokio::test]
    async fn failed_sync_leaves_no_timestamp() {
        let home = TempDir::new().expect("home");
        let runner: SyncRunner = Arc::new(|address: &RepoAddress, _: &Credentials| {
            Err(SyncError::Remote(hubmirror_sync::RemoteError::NotFound {
                address: address.to_string(),
            }))
        });
        let state = Arc::new(state(&home, 1).with_runner(runner));

        let address = RepoAddress::parse("acme/widget").unwrap();
        let err = run_job(&state, address, Credentials::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DaemonError::Sync(_)), "got: {err}");
        assert!(state.timestamps.read().await.is_empty());
        assert!(state.project_locks.lock().await.is_empty());
    }
}
