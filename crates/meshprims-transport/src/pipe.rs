//! Subprocess pipe transport.
//!
//! Spawns a command and speaks HDLC frames over its stdin/stdout. A single
//! worker thread per instance reads frames and, when the stream ends, drives
//! the [`ReconnectSupervisor`] to respawn the process.

use std::io::Read;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;

use meshprims_frame::{FrameError, FrameReader, FrameWriter};
use parking_lot::Mutex;

use crate::config::PipeSettings;
use crate::error::{InterfaceError, Result};
use crate::state::{InterfaceKind, InterfaceState};
use crate::supervisor::{FailurePolicy, ReaderExit, ReconnectSupervisor, Recovery, StopSignal};
use crate::traits::{Inbound, Transport};

/// Transport backed by a spawned subprocess.
pub struct PipeTransport {
    shared: Arc<PipeShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct PipeShared {
    state: InterfaceState,
    settings: PipeSettings,
    supervisor: ReconnectSupervisor,
    inbound: Arc<dyn Inbound>,
    child: Mutex<Option<Child>>,
    writer: Mutex<Option<FrameWriter<ChildStdin>>>,
    stdout: Mutex<Option<ChildStdout>>,
}

impl PipeTransport {
    /// Spawn the configured command and start reading from it.
    ///
    /// Fails if the command cannot be spawned.
    pub fn new(
        settings: PipeSettings,
        inbound: Arc<dyn Inbound>,
        policy: FailurePolicy,
    ) -> Result<Self> {
        let supervisor = ReconnectSupervisor::new(settings.respawn_delay, policy, StopSignal::new());
        let shared = Arc::new(PipeShared {
            state: InterfaceState::new(settings.name.clone(), InterfaceKind::Pipe),
            settings,
            supervisor,
            inbound,
            child: Mutex::new(None),
            writer: Mutex::new(None),
            stdout: Mutex::new(None),
        });

        let transport = Self {
            shared,
            worker: Mutex::new(None),
        };
        transport.open()?;
        Ok(transport)
    }

    /// Number of times the subprocess has been respawned.
    pub fn respawn_count(&self) -> u64 {
        self.shared.supervisor.reconnect_count()
    }

    /// OS process id of the current subprocess, if one is running.
    pub fn child_id(&self) -> Option<u32> {
        self.shared.child.lock().as_ref().map(Child::id)
    }

    pub fn supervisor(&self) -> &ReconnectSupervisor {
        &self.shared.supervisor
    }

    pub fn settings(&self) -> &PipeSettings {
        &self.shared.settings
    }
}

impl Transport for PipeTransport {
    fn open(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        if self.shared.supervisor.stop_signal().is_stopped() {
            return Err(InterfaceError::Shutdown);
        }
        // A live worker owns recovery; nothing to do.
        if worker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }
        if let Some(handle) = worker.take() {
            let _ = handle.join();
        }

        self.shared.spawn_child()?;
        // Set before the worker starts so an immediate exit is not masked.
        self.shared.supervisor.mark_connected();
        self.shared.state.set_online(true);

        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name(format!("meshprims-pipe-{}", self.shared.state.name()))
            .spawn(move || shared.run());
        match handle {
            Ok(handle) => {
                *worker = Some(handle);
                tracing::info!(interface = %self.shared.state, "pipe interface online");
                Ok(())
            }
            Err(err) => {
                self.shared.state.set_online(false);
                self.shared.terminate_child();
                Err(InterfaceError::Io(err))
            }
        }
    }

    fn send(&self, payload: &[u8]) -> Result<()> {
        let state = &self.shared.state;
        if !state.is_online() {
            return Err(InterfaceError::Offline(state.name().to_string()));
        }

        let mut guard = self.shared.writer.lock();
        let writer = guard
            .as_mut()
            .ok_or_else(|| InterfaceError::Offline(state.name().to_string()))?;

        match writer.send(payload) {
            Ok(wire_len) => {
                state.stats().record_tx(wire_len);
                Ok(())
            }
            Err(FrameError::ShortWrite { written, expected }) => {
                state.stats().record_tx(written);
                tracing::error!(interface = %state, written, expected, "short write to subprocess");
                Err(FrameError::ShortWrite { written, expected }.into())
            }
            Err(err) => {
                tracing::warn!(interface = %state, error = %err, "send to subprocess failed");
                Err(err.into())
            }
        }
    }

    fn state(&self) -> &InterfaceState {
        &self.shared.state
    }

    fn shutdown(&self) {
        self.shared.supervisor.stop_signal().stop();
        self.shared.terminate_child();

        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                tracing::error!(interface = %self.shared.state, "pipe worker panicked");
            }
        }
        self.shared.state.set_online(false);
    }
}

impl Drop for PipeTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for PipeTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeTransport")
            .field("state", &self.shared.state)
            .field("command", &self.shared.settings.command_line)
            .finish()
    }
}

impl PipeShared {
    fn spawn_child(&self) -> Result<()> {
        if self.supervisor.stop_signal().is_stopped() {
            return Err(InterfaceError::Shutdown);
        }

        let (program, args) = self
            .settings
            .argv
            .split_first()
            .ok_or_else(|| InterfaceError::invalid(self.state.name(), "command", "empty command"))?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        // Own process group, so descendants holding stdout die with the child.
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut command, 0);

        let mut child = command
            .spawn()
            .map_err(|source| InterfaceError::Spawn {
                command: self.settings.command_line.clone(),
                source,
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            reap(&mut child);
            return Err(InterfaceError::Io(std::io::Error::other(
                "subprocess stdio was not captured",
            )));
        };

        tracing::debug!(interface = %self.state, pid = child.id(), "subprocess spawned");
        *self.writer.lock() = Some(FrameWriter::new(stdin));
        *self.stdout.lock() = Some(stdout);
        *self.child.lock() = Some(child);

        // Shutdown may have raced with the spawn.
        if self.supervisor.stop_signal().is_stopped() {
            self.terminate_child();
            return Err(InterfaceError::Shutdown);
        }
        Ok(())
    }

    /// Kill and reap the current subprocess, then release its pipes.
    fn terminate_child(&self) {
        if let Some(mut child) = self.child.lock().take() {
            tracing::debug!(interface = %self.state, pid = child.id(), "terminating subprocess");
            reap(&mut child);
        }
        self.writer.lock().take();
        self.stdout.lock().take();
    }

    fn run(&self) {
        loop {
            let exit = match self.stdout.lock().take() {
                Some(stdout) => read_frames(FrameReader::new(stdout), &self.state, &*self.inbound),
                None => ReaderExit::Failed("subprocess stdout unavailable".to_string()),
            };

            self.state.set_online(false);
            self.terminate_child();

            if self.supervisor.stop_signal().is_stopped() {
                break;
            }
            if self.supervisor.on_reader_exit(self.state.name(), &exit) == Recovery::Escalated {
                break;
            }
            if !self
                .supervisor
                .reconnect(self.state.name(), || self.spawn_child())
            {
                break;
            }
            self.state.set_online(true);
            tracing::info!(interface = %self.state, "pipe interface back online");
        }
        tracing::debug!(interface = %self.state, "pipe worker exiting");
    }
}

/// Kill the subprocess and everything in its process group, then wait for it.
#[cfg(unix)]
fn reap(child: &mut Child) {
    match libc::pid_t::try_from(child.id()) {
        // SAFETY: the child leads its own group (process_group(0) at spawn) and
        // is not yet reaped, so its pid still names that group.
        Ok(pgid) => unsafe {
            libc::killpg(pgid, libc::SIGKILL);
        },
        Err(_) => {
            let _ = child.kill();
        }
    }
    let _ = child.wait();
}

#[cfg(not(unix))]
fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Deliver frames from `reader` until the stream ends or fails.
pub(crate) fn read_frames<R: Read>(
    mut reader: FrameReader<R>,
    state: &InterfaceState,
    inbound: &dyn Inbound,
) -> ReaderExit {
    loop {
        match reader.read_frame() {
            Ok(frame) => {
                state.stats().record_rx(frame.len());
                tracing::trace!(interface = %state, len = frame.len(), "frame received");
                inbound.inbound(frame, state);
            }
            Err(FrameError::ConnectionClosed) => return ReaderExit::EndOfStream,
            Err(err) => return ReaderExit::Failed(err.to_string()),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::PipeConfig;
    use crate::traits::{inbound_channel, InboundFrame};
    use bytes::Bytes;
    use std::io::Cursor;
    use std::sync::mpsc::Receiver;
    use std::time::{Duration, Instant};

    const RECV_TIMEOUT: Duration = Duration::from_secs(5);

    fn cat_pipe(name: &str, respawn_delay: f64) -> (PipeTransport, Receiver<InboundFrame>) {
        let (inbound, rx) = inbound_channel();
        let settings = PipeConfig::new(name, "cat")
            .with_respawn_delay(respawn_delay)
            .resolve()
            .unwrap();
        let pipe = PipeTransport::new(settings, inbound, FailurePolicy::Reconnect).unwrap();
        (pipe, rx)
    }

    fn wait_for(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        cond()
    }

    #[test]
    fn loopback_through_cat() {
        let (pipe, rx) = cat_pipe("cat0", 0.2);
        assert!(pipe.is_online());

        pipe.send(b"hello\x7e\x7dworld").unwrap();
        let frame = rx.recv_timeout(RECV_TIMEOUT).unwrap();
        assert_eq!(frame.interface, "cat0");
        assert_eq!(frame.payload.as_ref(), b"hello\x7e\x7dworld");

        let stats = pipe.stats();
        assert_eq!(stats.rx_bytes, 12);
        // payload + 2 escapes + 2 flags
        assert_eq!(stats.tx_bytes, 16);
    }

    #[test]
    fn sequential_sends_arrive_in_order() {
        let (pipe, rx) = cat_pipe("cat1", 0.2);
        for i in 0..50u8 {
            pipe.send(&[i, 0x7e, i]).unwrap();
        }
        for i in 0..50u8 {
            let frame = rx.recv_timeout(RECV_TIMEOUT).unwrap();
            assert_eq!(frame.payload.as_ref(), &[i, 0x7e, i]);
        }
    }

    #[test]
    fn respawns_after_child_is_killed() {
        let (pipe, rx) = cat_pipe("cat2", 0.5);
        let pid = pipe.child_id().unwrap();

        // SAFETY: pid belongs to the child this test spawned.
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGKILL) };
        assert_eq!(rc, 0);

        assert!(wait_for(Duration::from_secs(2), || !pipe.is_online()));
        let went_offline = Instant::now();
        assert!(matches!(
            pipe.send(b"dropped"),
            Err(InterfaceError::Offline(_))
        ));

        assert!(wait_for(Duration::from_secs(5), || pipe.is_online()));
        assert!(went_offline.elapsed() < Duration::from_millis(500) + Duration::from_secs(2));
        assert_eq!(pipe.respawn_count(), 1);
        assert_ne!(pipe.child_id(), Some(pid));

        pipe.send(b"after respawn").unwrap();
        let frame = rx.recv_timeout(RECV_TIMEOUT).unwrap();
        assert_eq!(frame.payload.as_ref(), b"after respawn");
    }

    #[test]
    fn spawn_failure_is_reported() {
        let (inbound, _rx) = inbound_channel();
        let settings = PipeConfig::new("bad", "/nonexistent/meshprims-modem")
            .resolve()
            .unwrap();
        let err = PipeTransport::new(settings, inbound, FailurePolicy::Reconnect).unwrap_err();
        assert!(matches!(err, InterfaceError::Spawn { .. }));
    }

    #[test]
    fn shutdown_stops_worker_and_goes_offline() {
        let (pipe, _rx) = cat_pipe("cat3", 0.1);
        pipe.shutdown();
        assert!(!pipe.is_online());
        assert!(pipe.child_id().is_none());
        assert!(matches!(pipe.send(b"x"), Err(InterfaceError::Offline(_))));
        assert!(matches!(pipe.open(), Err(InterfaceError::Shutdown)));
    }

    #[test]
    fn shutdown_kills_descendants_holding_stdout() {
        let (inbound, _rx) = inbound_channel();
        let settings = PipeConfig::new("sh0", "sh -c 'sleep 30 & exec cat'")
            .resolve()
            .unwrap();
        let pipe = PipeTransport::new(settings, inbound, FailurePolicy::Reconnect).unwrap();
        std::thread::sleep(Duration::from_millis(200));

        let started = Instant::now();
        pipe.shutdown();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!pipe.is_online());
    }

    #[test]
    fn open_is_idempotent_while_running() {
        let (pipe, _rx) = cat_pipe("cat4", 0.1);
        let pid = pipe.child_id();
        pipe.open().unwrap();
        assert_eq!(pipe.child_id(), pid);
    }

    #[test]
    fn read_frames_delivers_then_reports_end_of_stream() {
        let state = InterfaceState::new("r0", InterfaceKind::Pipe);
        let seen = Mutex::new(Vec::new());
        let handler = |payload: Bytes, _: &InterfaceState| seen.lock().push(payload);

        let mut wire = meshprims_frame::encode(b"one").to_vec();
        wire.extend_from_slice(&meshprims_frame::encode(b"two"));

        let exit = read_frames(FrameReader::new(Cursor::new(wire)), &state, &handler);
        assert_eq!(exit, ReaderExit::EndOfStream);
        assert_eq!(seen.lock().len(), 2);
        assert_eq!(state.stats().rx_bytes(), 6);
    }

    #[test]
    fn read_frames_reports_failure() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("device unplugged"))
            }
        }

        let state = InterfaceState::new("r1", InterfaceKind::Pipe);
        let handler = |_: Bytes, _: &InterfaceState| {};
        let exit = read_frames(FrameReader::new(Broken), &state, &handler);
        assert!(exit.is_abnormal());
    }

    #[test]
    fn clean_exit_respawns_under_abort_policy() {
        let escalated = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = Arc::clone(&escalated);
        let policy = FailurePolicy::Abort(Arc::new(move |reason: &str| {
            sink.lock().push(reason.to_string());
        }));

        // `true` exits immediately: a clean end of stream is still respawned.
        let (inbound, _rx) = inbound_channel();
        let settings = PipeConfig::new("t0", "true")
            .with_respawn_delay(0.05)
            .resolve()
            .unwrap();
        let pipe = PipeTransport::new(settings, inbound, policy).unwrap();

        assert!(wait_for(Duration::from_secs(5), || pipe.respawn_count() >= 1));
        assert!(escalated.lock().is_empty());
        pipe.shutdown();
    }
}
