//! Supervision of a running artifact.
//!
//! The artifact is launched through the host shell with piped output. Two
//! reader tasks forward lines and a monitor task waits for exit, so the caller
//! sees a single ordered stream of [`ProcessEvent`]s ending in one
//! [`ProcessEvent::Exited`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// How long readers may keep draining after the process exited.
pub const READER_GRACE: Duration = Duration::from_millis(200);

/// Something the supervised process did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// A line written to stdout.
    Output(String),
    /// A line written to stderr, or a launch failure.
    Error(String),
    /// The process ended; `None` when killed by a signal.
    Exited(Option<i32>),
}

/// Event stream of one run.
#[derive(Debug)]
pub struct ProcessEvents {
    rx: mpsc::UnboundedReceiver<ProcessEvent>,
}

impl ProcessEvents {
    /// Next event; `None` once the run is over and drained.
    pub async fn recv(&mut self) -> Option<ProcessEvent> {
        self.rx.recv().await
    }

    /// Drain every remaining event.
    pub async fn collect(mut self) -> Vec<ProcessEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }
}

struct Running {
    kill_tx: oneshot::Sender<()>,
    monitor: JoinHandle<()>,
}

/// Runs one artifact at a time.
#[derive(Default)]
pub struct ProcessSupervisor {
    running: Option<Running>,
    file_path: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    /// Host for `.dll` artifacts; `dotnet` from `PATH` when unset.
    dotnet: Option<PathBuf>,
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch managed assemblies through a specific `dotnet` host.
    pub fn with_dotnet(dotnet: impl Into<PathBuf>) -> Self {
        Self {
            dotnet: Some(dotnet.into()),
            ..Self::default()
        }
    }

    /// Launch `path` in `working_dir`, stopping any previous run first.
    ///
    /// Must be called within a tokio runtime. Launch failures arrive as a
    /// single [`ProcessEvent::Error`] after which the stream closes.
    pub async fn execute(&mut self, path: &Path, working_dir: &Path) -> ProcessEvents {
        self.stop().await;

        let (tx, rx) = mpsc::unbounded_channel();
        let events = ProcessEvents { rx };

        let mut command = shell_command(path, self.dotnet.as_deref());
        command
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!("Failed to launch {}: {}", path.display(), e);
                let _ = tx.send(ProcessEvent::Error(format!(
                    "failed to launch {}: {}",
                    path.display(),
                    e
                )));
                return events;
            }
        };

        tracing::info!(
            "Started {} (pid {:?}) in {}",
            path.display(),
            child.id(),
            working_dir.display()
        );

        let readers: Vec<JoinHandle<()>> = [
            child
                .stdout
                .take()
                .map(|out| spawn_reader(out, tx.clone(), ProcessEvent::Output)),
            child
                .stderr
                .take()
                .map(|err| spawn_reader(err, tx.clone(), ProcessEvent::Error)),
        ]
        .into_iter()
        .flatten()
        .collect();

        let (kill_tx, kill_rx) = oneshot::channel();
        let monitor = tokio::spawn(monitor(child, readers, kill_rx, tx));

        self.running = Some(Running { kill_tx, monitor });
        self.file_path = Some(path.to_path_buf());
        self.working_dir = Some(working_dir.to_path_buf());
        events
    }

    /// Kill the current run and wait for it to finish. No-op when idle.
    pub async fn stop(&mut self) {
        self.file_path = None;
        self.working_dir = None;

        let Some(running) = self.running.take() else {
            return;
        };
        // Fails only if the process already exited.
        let _ = running.kill_tx.send(());
        if let Err(e) = running.monitor.await {
            tracing::warn!("Process monitor ended abnormally: {}", e);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.monitor.is_finished())
    }

    /// Artifact of the current run.
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }
}

/// Shell invocation for an artifact; managed assemblies go through `dotnet`.
///
/// Paths travel as arguments, never inside the command string.
fn shell_command(path: &Path, dotnet: Option<&Path>) -> Command {
    let is_assembly = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("dll"));
    let (program, args): (&Path, Vec<&Path>) = if is_assembly {
        (dotnet.unwrap_or(Path::new("dotnet")), vec![path])
    } else {
        (path, Vec::new())
    };

    #[cfg(windows)]
    {
        let mut command = Command::new("cmd");
        command.arg("/C").arg(program).args(args);
        command
    }

    #[cfg(not(windows))]
    {
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg("exec \"$0\" \"$@\"")
            .arg(program)
            .args(args);
        command
    }
}

fn spawn_reader<R>(
    reader: R,
    tx: mpsc::UnboundedSender<ProcessEvent>,
    wrap: fn(String) -> ProcessEvent,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']).to_string();
                    if tx.send(wrap(line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!("Output reader stopped: {}", e);
                    break;
                }
            }
        }
    })
}

async fn monitor(
    mut child: Child,
    readers: Vec<JoinHandle<()>>,
    mut kill_rx: oneshot::Receiver<()>,
    tx: mpsc::UnboundedSender<ProcessEvent>,
) {
    let pid = child.id();

    let status = tokio::select! {
        status = child.wait() => status,
        _ = &mut kill_rx => {
            kill_child(&mut child, pid);
            child.wait().await
        }
    };

    let code = match status {
        Ok(status) => status.code(),
        Err(e) => {
            tracing::warn!("Failed to wait for pid {:?}: {}", pid, e);
            None
        }
    };

    let aborts: Vec<_> = readers.iter().map(JoinHandle::abort_handle).collect();
    let drained = tokio::time::timeout(READER_GRACE, async {
        for reader in readers {
            let _ = reader.await;
        }
    })
    .await;
    if drained.is_err() {
        // Something still holds the pipes open; drop the remaining output.
        for abort in aborts {
            abort.abort();
        }
    }

    tracing::info!("Process {:?} exited with {:?}", pid, code);
    let _ = tx.send(ProcessEvent::Exited(code));
}

fn kill_child(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    {
        if let Some(pid) = pid {
            // The child leads its own group; take the whole tree down.
            unsafe {
                libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
    }

    if let Err(e) = child.start_kill() {
        tracing::debug!("start_kill: {}", e);
    }
}
