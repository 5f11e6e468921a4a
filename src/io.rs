//! The facade: buffered reader + transform/log pipeline + target dispatch
//! (§4.5, §4.7). The only place "already recv'd but not yet yielded" bytes
//! live is `Zio::buffer` (invariant 3, §3).

use crate::error::{ReadKind, ZioError, ZioResult};
use crate::pattern::{match_pattern, Pattern};
use crate::transform::{self, LogSink, Transform};
use crate::transport::process::{ProcessTransport, SighupDisposition, SpawnConfig};
use crate::transport::socket::SocketTransport;
use crate::transport::{IoMode, RecvOutcome, Target, Transport};
use std::collections::HashMap;
use std::net::TcpStream;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Bounded chunk size per recv, per §4.5.
const CHUNK_SIZE: usize = 1536;

const DEFAULT_TIMEOUT_SECS: u64 = 16;

/// Construction-time options; anything omitted falls back to the defaults
/// documented in spec §3 "Facade state".
pub struct ZioOptions {
    pub timeout: Duration,
    pub read_transform: Transform,
    pub write_transform: Transform,
    pub print_read: bool,
    pub print_write: bool,
    pub log_sink: Box<dyn LogSink>,
    pub stdin_mode: IoMode,
    pub stdout_mode: IoMode,
    pub cwd: Option<PathBuf>,
    pub env: Option<HashMap<String, String>>,
    pub sighup_disposition: Option<SighupDisposition>,
    pub write_delay: Duration,
    pub close_delay: Duration,
    pub terminate_delay: Duration,
}

impl Default for ZioOptions {
    fn default() -> Self {
        ZioOptions {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            read_transform: Transform::raw(),
            write_transform: Transform::raw(),
            print_read: true,
            print_write: true,
            log_sink: transform::stderr_sink(),
            stdin_mode: IoMode::Tty,
            stdout_mode: IoMode::Tty,
            cwd: None,
            env: None,
            sighup_disposition: None,
            write_delay: Duration::from_millis(50),
            close_delay: Duration::from_millis(100),
            terminate_delay: Duration::from_millis(100),
        }
    }
}

/// A non-positive or absent timeout falls back to the 16s default (§3).
fn normalize_timeout(timeout: Duration) -> Duration {
    if timeout.is_zero() {
        Duration::from_secs(DEFAULT_TIMEOUT_SECS)
    } else {
        timeout
    }
}

/// The unified client API over either transport backend.
pub struct Zio {
    transport: Box<dyn Transport>,
    buffer: Vec<u8>,
    timeout: Duration,
    read_transform: Transform,
    write_transform: Transform,
    print_read: bool,
    print_write: bool,
    log_sink: Box<dyn LogSink>,
}

impl Zio {
    /// Dispatches on `target` per §4.7: a host/port or existing socket
    /// selects the socket transport; anything else selects the process
    /// transport, with `CommandString` tokenized by POSIX shell-word rules.
    /// Invalid targets fail here, before any I/O.
    pub fn new(target: Target, opts: ZioOptions) -> ZioResult<Self> {
        target.validate()?;
        let timeout = normalize_timeout(opts.timeout);
        debug!(?timeout, "zio facade dispatching on target");

        let transport: Box<dyn Transport> = match target {
            Target::HostPort(host, port) => {
                Box::new(SocketTransport::connect(&host, port, timeout)?)
            }
            Target::ExistingSocket(fd) => {
                use std::os::fd::{FromRawFd, IntoRawFd};
                let stream = unsafe { TcpStream::from_raw_fd(fd.into_raw_fd()) };
                Box::new(SocketTransport::from_stream(stream))
            }
            Target::CommandString(s) => {
                let argv = crate::transport::process::tokenize_command(&s)?;
                Box::new(ProcessTransport::spawn(SpawnConfig {
                    args: argv,
                    stdin_mode: opts.stdin_mode,
                    stdout_mode: opts.stdout_mode,
                    cwd: opts.cwd.clone(),
                    env: opts.env.clone(),
                    sighup_disposition: opts.sighup_disposition,
                    write_delay: opts.write_delay,
                    close_delay: opts.close_delay,
                    terminate_delay: opts.terminate_delay,
                })?)
            }
            Target::CommandArgv(argv) => Box::new(ProcessTransport::spawn(SpawnConfig {
                args: argv,
                stdin_mode: opts.stdin_mode,
                stdout_mode: opts.stdout_mode,
                cwd: opts.cwd.clone(),
                env: opts.env.clone(),
                sighup_disposition: opts.sighup_disposition,
                write_delay: opts.write_delay,
                close_delay: opts.close_delay,
                terminate_delay: opts.terminate_delay,
            })?),
        };

        Ok(Zio {
            transport,
            buffer: Vec::new(),
            timeout,
            read_transform: opts.read_transform,
            write_transform: opts.write_transform,
            print_read: opts.print_read,
            print_write: opts.print_write,
            log_sink: opts.log_sink,
        })
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = normalize_timeout(timeout);
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The getter mirrors the source's `print_read`/`print_write` exactly:
    /// `true` iff the transform in that direction is not the `none()`
    /// sentinel. Two distinct knobs are kept internally (`print_read` and
    /// `read_transform`) so callers can still compose a custom transform and
    /// disable logging independently — see DESIGN.md's resolution of the
    /// corresponding open question.
    pub fn print_read(&self) -> bool {
        self.print_read && !self.read_transform.is_none()
    }

    pub fn print_write(&self) -> bool {
        self.print_write && !self.write_transform.is_none()
    }

    pub fn set_print_read(&mut self, enabled: bool) {
        self.print_read = enabled;
    }

    pub fn set_print_write(&mut self, enabled: bool) {
        self.print_write = enabled;
    }

    pub fn set_read_transform(&mut self, t: Transform) {
        self.read_transform = t;
    }

    pub fn set_write_transform(&mut self, t: Transform) {
        self.write_transform = t;
    }

    fn log_read(&mut self, bytes: &[u8]) {
        if self.print_read() {
            let out = self.read_transform.apply(bytes);
            if !out.is_empty() {
                self.log_sink.write_bytes(&out);
            }
        }
    }

    fn log_write(&mut self, bytes: &[u8]) {
        if self.print_write() {
            let out = self.write_transform.apply(bytes);
            if !out.is_empty() {
                self.log_sink.write_bytes(&out);
            }
        }
    }

    /// Pulls one bounded chunk from the transport into `buffer`. Returns
    /// `Ok(true)` on data, `Ok(false)` on timeout with nothing new, and sets
    /// the caller up to detect EOF via `self.transport.eof_seen()`.
    fn fill_once(&mut self, remaining: Duration) -> ZioResult<bool> {
        match self.transport.recv(CHUNK_SIZE, remaining)? {
            RecvOutcome::Data(bytes) => {
                self.log_read(&bytes);
                self.buffer.extend_from_slice(&bytes);
                Ok(true)
            }
            RecvOutcome::TimedOut => Ok(false),
            RecvOutcome::Eof => Ok(false),
        }
    }

    /// Reads until EOF (`size` absent/negative handled by caller passing
    /// `None`) or until `|buffer| >= size`. On EOF before `size` bytes
    /// accumulate, fails with `UnexpectedEof` carrying the partial buffer.
    pub fn read(&mut self, size: Option<usize>) -> ZioResult<Vec<u8>> {
        match size {
            None => {
                while !self.transport.eof_seen() {
                    self.fill_once(self.timeout)?;
                }
                Ok(std::mem::take(&mut self.buffer))
            }
            Some(size) => {
                while self.buffer.len() < size {
                    if self.transport.eof_seen() {
                        return Err(ZioError::UnexpectedEof {
                            kind: ReadKind::ExactSize,
                            partial: self.buffer.clone(),
                        });
                    }
                    self.fill_once(self.timeout)?;
                }
                let rest = self.buffer.split_off(size);
                let head = std::mem::replace(&mut self.buffer, rest);
                Ok(head)
            }
        }
    }

    /// Scans `buffer` with `patterns` (§4.2's declaration-order tie-break)
    /// after each extension; on match, trims `buffer` to `[end:]` and
    /// returns `buffer[:end]` if `keep` else `buffer[:start]`.
    pub fn read_until(&mut self, patterns: &[Pattern], keep: bool) -> ZioResult<Vec<u8>> {
        loop {
            if let Some((_idx, (start, end))) = match_pattern(patterns, &self.buffer) {
                let rest = self.buffer.split_off(end);
                let prefix = std::mem::replace(&mut self.buffer, rest);
                return Ok(if keep {
                    prefix
                } else {
                    prefix[..start].to_vec()
                });
            }

            if self.transport.eof_seen() {
                return Err(ZioError::UnexpectedEof {
                    kind: ReadKind::Pattern,
                    partial: self.buffer.clone(),
                });
            }
            self.fill_once(self.timeout)?;
        }
    }

    /// `read_until(b"\n", keep=true)`, optionally stripping a trailing
    /// `\r?\n`.
    pub fn read_line(&mut self, keep: bool) -> ZioResult<Vec<u8>> {
        let mut line = self.read_until(&[Pattern::literal(b"\n".to_vec())], true)?;
        if !keep {
            if line.last() == Some(&b'\n') {
                line.pop();
            }
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        Ok(line)
    }

    /// Pass-through to `transport.recv`; never touches `buffer`. Returns
    /// `Some(bytes)` (non-empty) on data, `None` on EOF.
    pub fn read_some(&mut self, size: usize) -> ZioResult<Option<Vec<u8>>> {
        match self.transport.recv(size, self.timeout)? {
            RecvOutcome::Data(bytes) => {
                self.log_read(&bytes);
                Ok(Some(bytes))
            }
            RecvOutcome::TimedOut => Ok(Some(Vec::new())),
            RecvOutcome::Eof => Ok(None),
        }
    }

    /// Polls for up to `t`; on readiness, recvs once and returns the drained
    /// buffer plus the newly read data; on timeout, returns whatever the
    /// buffer already holds (possibly empty).
    pub fn read_until_timeout(&mut self, t: Duration) -> ZioResult<Vec<u8>> {
        match self.transport.recv(CHUNK_SIZE, t)? {
            RecvOutcome::Data(bytes) => {
                self.log_read(&bytes);
                self.buffer.extend_from_slice(&bytes);
                Ok(std::mem::take(&mut self.buffer))
            }
            RecvOutcome::TimedOut | RecvOutcome::Eof => Ok(std::mem::take(&mut self.buffer)),
        }
    }

    /// Logs then send-alls `b`; returns `|b|`.
    pub fn write(&mut self, b: &[u8]) -> ZioResult<usize> {
        self.log_write(b);
        self.transport.send(b)?;
        Ok(b.len())
    }

    /// `write(b ++ line-sep)` with the host's native newline.
    pub fn write_line(&mut self, b: &[u8]) -> ZioResult<usize> {
        let mut line = b.to_vec();
        line.push(b'\n');
        self.write(&line)
    }

    pub fn send_eof(&mut self) -> ZioResult<()> {
        self.transport.send_eof(true)
    }

    pub fn close(&mut self) -> ZioResult<()> {
        self.transport.close(true)
    }

    pub fn eof_seen(&self) -> bool {
        self.transport.eof_seen()
    }

    pub fn eof_sent(&self) -> bool {
        self.transport.eof_sent()
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }

    /// `None` for non-process targets (is_alive/terminate only make sense
    /// for a process transport, §9 design notes).
    pub fn is_alive(&mut self) -> ZioResult<Option<bool>> {
        match self.transport.as_process_mut() {
            Some(p) => p.is_alive().map(Some),
            None => Ok(None),
        }
    }

    pub fn terminate(&mut self, force: bool) -> ZioResult<Option<bool>> {
        match self.transport.as_process_mut() {
            Some(p) => p.terminate(force).map(Some),
            None => Ok(None),
        }
    }

    pub fn wait(&mut self) -> ZioResult<Option<i32>> {
        match self.transport.as_process_mut() {
            Some(p) => p.wait().map(Some),
            None => Ok(None),
        }
    }

    pub fn pid(&mut self) -> Option<i32> {
        self.transport
            .as_process_mut()
            .map(|p| p.pid().as_raw())
    }

    pub(crate) fn transport_mut(&mut self) -> &mut dyn Transport {
        self.transport.as_mut()
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buffer
    }

    pub(crate) fn read_transform(&self) -> &Transform {
        &self.read_transform
    }

    pub(crate) fn write_transform(&self) -> &Transform {
        &self.write_transform
    }

    pub(crate) fn print_read_flag(&self) -> bool {
        self.print_read()
    }

    pub(crate) fn print_write_flag(&self) -> bool {
        self.print_write()
    }

    pub(crate) fn log_sink_mut(&mut self) -> &mut dyn LogSink {
        self.log_sink.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::process::SpawnConfig;

    fn spawn_zio(args: &[&str]) -> Zio {
        let opts = ZioOptions {
            stdin_mode: IoMode::Pipe,
            stdout_mode: IoMode::Pipe,
            ..ZioOptions::default()
        };
        Zio::new(
            Target::CommandArgv(args.iter().map(|s| s.to_string()).collect()),
            opts,
        )
        .unwrap()
    }

    #[test]
    fn read_until_consumes_exact_prefix_and_retains_remainder() {
        let mut z = spawn_zio(&["cat"]);
        z.write(b"hello\nworld").unwrap();
        let line = z.read_until(&[Pattern::literal(b"\n".to_vec())], true).unwrap();
        assert_eq!(line, b"hello\n");
    }

    #[test]
    fn read_exact_size_then_unexpected_eof_on_short_stream() {
        let mut z = spawn_zio(&["printf", "abc"]);
        let err = z.read(Some(10)).unwrap_err();
        match err {
            ZioError::UnexpectedEof { partial, .. } => assert_eq!(partial, b"abc"),
            other => panic!("expected UnexpectedEof, got {other:?}"),
        }
    }

    #[test]
    fn read_drains_to_eof_when_size_absent() {
        let mut z = spawn_zio(&["printf", "all of it"]);
        let out = z.read(None).unwrap();
        assert_eq!(out, b"all of it");
    }

    #[test]
    fn write_line_appends_native_newline() {
        let mut z = spawn_zio(&["cat"]);
        z.write_line(b"hi").unwrap();
        let line = z.read_until(&[Pattern::literal(b"\n".to_vec())], false).unwrap();
        assert_eq!(line, b"hi");
    }

    #[test]
    fn print_read_false_is_equivalent_to_none_transform() {
        let mut z = spawn_zio(&["cat"]);
        z.set_print_read(false);
        assert!(!z.print_read());
        z.set_print_read(true);
        z.set_read_transform(Transform::none());
        assert!(!z.print_read());
    }
}
