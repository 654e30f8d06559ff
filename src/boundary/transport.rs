//! Moving frames between the host and a framework host.
use super::protocol::{self, ClientFrame, ServerFrame, CONFIG_ENV, PROTOCOL_VERSION, SERVE_FLAG};
use crate::{errors::HostError, host::Registry};
use std::{
    io::{self, Write},
    path::Path,
    process::Stdio,
    sync::{mpsc, Arc},
    thread,
    time::Duration,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    process::{Child, ChildStdin, ChildStdout, Command},
    runtime::{self, Runtime},
    time,
};

/// How long a framework host gets to greet us.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);
/// How long a framework host gets to exit after its input closes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A bidirectional, blocking frame channel.
pub(crate) trait Transport: Send {
    fn send(&mut self, frame: &ClientFrame) -> Result<(), HostError>;

    /// Next frame from the framework host. The end of the stream is an
    /// error: a call in flight can no longer complete.
    fn recv(&mut self) -> Result<ServerFrame, HostError>;

    /// Tear the channel down. Never fails; problems are logged.
    fn close(&mut self);
}

fn check_hello(frame: ServerFrame) -> Result<(), HostError> {
    match frame {
        ServerFrame::Hello { protocol } if protocol == PROTOCOL_VERSION => Ok(()),
        ServerFrame::Hello { protocol } => Err(HostError::Configuration(format!(
            "framework host speaks protocol {}, this host speaks {}",
            protocol, PROTOCOL_VERSION
        ))),
        other => Err(HostError::Protocol(format!(
            "expected hello from framework host, got {:?}",
            other
        ))),
    }
}

/// A framework host running as a child process, speaking frames over its
/// stdin and stdout.
pub(crate) struct ProcessTransport {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    program: String,
    // Dropped last: the pipes above are registered with it.
    runtime: Runtime,
}

impl ProcessTransport {
    /// Start `program`. Failing to start it at all is reported as an I/O
    /// error so callers can fall back.
    pub fn spawn(program: &Path, config: Option<&Path>) -> io::Result<Self> {
        let runtime = runtime::Builder::new_current_thread().enable_all().build()?;

        let mut cmd = Command::new(program);
        cmd.arg(SERVE_FLAG)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(config) = config {
            cmd.env(CONFIG_ENV, config);
        }

        let mut child = {
            let _guard = runtime.enter();
            cmd.spawn()?
        };
        let stdin = child.stdin.take();
        let stdout = child.stdout.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::BrokenPipe, "framework host has no stdout")
        })?;

        let stdout = {
            let _guard = runtime.enter();
            BufReader::new(stdout).lines()
        };
        Ok(Self {
            child,
            stdin,
            stdout,
            program: program.display().to_string(),
            runtime,
        })
    }

    /// Wait for the greeting and check protocol compatibility.
    pub fn handshake(&mut self) -> Result<(), HostError> {
        let Self {
            runtime,
            stdout,
            program,
            ..
        } = self;
        let line = runtime
            .block_on(async { time::timeout(HANDSHAKE_TIMEOUT, stdout.next_line()).await })
            .map_err(|_| {
                HostError::Boundary(format!(
                    "{} did not greet within {}s",
                    program,
                    HANDSHAKE_TIMEOUT.as_secs()
                ))
            })??;
        match line {
            Some(line) => check_hello(protocol::decode(&line)?),
            None => Err(HostError::Boundary(format!(
                "{} exited before greeting",
                program
            ))),
        }
    }
}

impl Transport for ProcessTransport {
    fn send(&mut self, frame: &ClientFrame) -> Result<(), HostError> {
        let mut line = protocol::encode(frame)?;
        line.push('\n');
        let Self { runtime, stdin, .. } = self;
        let stdin = stdin.as_mut().ok_or(HostError::Disposed)?;
        runtime.block_on(async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.flush().await
        })?;
        Ok(())
    }

    fn recv(&mut self) -> Result<ServerFrame, HostError> {
        let Self {
            runtime,
            stdout,
            program,
            ..
        } = self;
        loop {
            match runtime.block_on(stdout.next_line())? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return protocol::decode(&line),
                None => {
                    return Err(HostError::Boundary(format!(
                        "{} closed its output",
                        program
                    )))
                }
            }
        }
    }

    fn close(&mut self) {
        if self.stdin.is_some() {
            let _ = self.send(&ClientFrame::Shutdown);
        }
        // Closing stdin is the signal to exit.
        self.stdin.take();

        let Self {
            runtime,
            child,
            program,
            ..
        } = self;
        runtime.block_on(async {
            match time::timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(Ok(status)) => log::debug!("{} exited with {}", program, status),
                Ok(Err(err)) => log::warn!("failed to wait for {}: {}", program, err),
                Err(_) => {
                    log::warn!(
                        "{} did not exit within {}s, killing it",
                        program,
                        SHUTDOWN_GRACE.as_secs()
                    );
                    if let Err(err) = child.kill().await {
                        log::warn!("failed to kill {}: {}", program, err);
                    }
                }
            }
        });
    }
}

/// Collects written bytes into lines and forwards each complete line.
struct ChannelWriter {
    tx: mpsc::Sender<String>,
    buf: Vec<u8>,
}

impl Write for ChannelWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            self.tx.send(text).map_err(|_| {
                io::Error::new(io::ErrorKind::BrokenPipe, "domain host has gone away")
            })?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A framework host running on a dedicated thread. Nothing is shared with
/// it: every call and message is serialized, exactly as for a process.
pub(crate) struct DomainTransport {
    outgoing: Option<mpsc::Sender<String>>,
    incoming: mpsc::Receiver<String>,
    worker: Option<thread::JoinHandle<()>>,
}

impl DomainTransport {
    pub fn spawn(registry: Arc<Registry>) -> Result<Self, HostError> {
        let (to_domain, domain_rx) = mpsc::channel::<String>();
        let (domain_tx, from_domain) = mpsc::channel::<String>();

        let worker = thread::Builder::new()
            .name("runt-host-domain".to_string())
            .spawn(move || {
                let writer = ChannelWriter {
                    tx: domain_tx,
                    buf: Vec::new(),
                };
                let incoming = domain_rx.into_iter().map(Ok);
                if let Err(err) = crate::host::serve(registry, incoming, writer) {
                    log::warn!("domain host stopped: {}", err);
                }
            })?;

        let mut transport = Self {
            outgoing: Some(to_domain),
            incoming: from_domain,
            worker: Some(worker),
        };
        let hello = transport.recv()?;
        check_hello(hello)?;
        Ok(transport)
    }
}

impl Transport for DomainTransport {
    fn send(&mut self, frame: &ClientFrame) -> Result<(), HostError> {
        let line = protocol::encode(frame)?;
        self.outgoing
            .as_ref()
            .ok_or(HostError::Disposed)?
            .send(line)
            .map_err(|_| HostError::Boundary("domain host has shut down".to_string()))
    }

    fn recv(&mut self) -> Result<ServerFrame, HostError> {
        let line = self
            .incoming
            .recv()
            .map_err(|_| HostError::Boundary("domain host has shut down".to_string()))?;
        protocol::decode(&line)
    }

    fn close(&mut self) {
        if let Some(outgoing) = self.outgoing.take() {
            let _ = outgoing.send(protocol::encode(&ClientFrame::Shutdown).unwrap_or_default());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("domain host panicked");
            }
        }
    }
}

impl Drop for DomainTransport {
    fn drop(&mut self) {
        self.close();
    }
}
