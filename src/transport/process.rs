//! Process transport: fork + pty/pipe wiring, termios raw-mode management,
//! liveness/termination (§4.4). Grounded in the teacher's `run_pty_wrapper`/
//! `parent_process`/`child_process`/`setup_raw_mode` and enriched from the
//! `ptyprocess`/`expectrl` reference implementations for the controlling-tty
//! dance, independent stdin/stdout pty pairs, and signal-escalation teardown.

use super::termios_ext;
use super::{IoMode, RecvOutcome, Transport};
use crate::error::{ZioError, ZioResult};
use nix::errno::Errno;
use nix::fcntl::{fcntl, open, FcntlArg, FdFlag, OFlag};
use nix::pty::openpty;
use nix::sys::select::FdSet;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::stat::Mode;
use nix::sys::termios::Termios;
use nix::sys::time::TimeVal;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{
    chdir, close, dup2, execvp, execvpe, fork, isatty, pipe, setsid, write, ForkResult, Pid,
};
use std::collections::HashMap;
use std::ffi::CString;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Only these two dispositions may be installed for `SIGHUP` in the child
/// (§4.4.1 step 4): anything else risks surprising the parent's own handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SighupDisposition {
    Default,
    Ignore,
}

/// What the caller asked to spawn.
pub struct SpawnConfig {
    pub args: Vec<String>,
    pub stdin_mode: IoMode,
    pub stdout_mode: IoMode,
    pub cwd: Option<PathBuf>,
    pub env: Option<HashMap<String, String>>,
    pub sighup_disposition: Option<SighupDisposition>,
    pub write_delay: Duration,
    pub close_delay: Duration,
    pub terminate_delay: Duration,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        SpawnConfig {
            args: Vec::new(),
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

/// POSIX shell-word tokenization for `Target::CommandString` (§3, §4.7).
pub fn tokenize_command(s: &str) -> ZioResult<Vec<String>> {
    shell_words::split(s).map_err(|e| ZioError::config(format!("invalid shell command: {e}")))
}

fn is_executable(p: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(p)
        .map(|m| m.is_file() && (m.permissions().mode() & 0o111 != 0))
        .unwrap_or(false)
}

/// Resolves `argv[0]` against `PATH`, failing if not found or not executable
/// (§4.4.1 step 1).
pub fn resolve_executable(name: &str) -> ZioResult<PathBuf> {
    if name.is_empty() {
        return Err(ZioError::config("executable name must not be empty"));
    }
    if name.contains('/') {
        let p = PathBuf::from(name);
        return if is_executable(&p) {
            Ok(p)
        } else {
            Err(ZioError::config(format!(
                "'{name}' is not an executable file"
            )))
        };
    }
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Ok(candidate);
        }
    }
    Err(ZioError::config(format!(
        "executable '{name}' not found in PATH"
    )))
}

fn set_cloexec(fd: &OwnedFd) -> nix::Result<()> {
    let flags = fcntl(fd.as_raw_fd(), FcntlArg::F_GETFD)?;
    let flags = FdFlag::from_bits_truncate(flags) | FdFlag::FD_CLOEXEC;
    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(flags))?;
    Ok(())
}

fn clear_cloexec(fd: RawFd) -> nix::Result<()> {
    let flags = fcntl(fd, FcntlArg::F_GETFD)?;
    let flags = FdFlag::from_bits_truncate(flags) & !FdFlag::FD_CLOEXEC;
    fcntl(fd, FcntlArg::F_SETFD(flags))?;
    Ok(())
}

/// One end of a child's stdin or stdout: the end handed to the child and the
/// end kept by the parent, plus whether it's a pty (and its slave path, if
/// so — needed again for the controlling-tty dance).
struct OpenedStream {
    child_fd: OwnedFd,
    parent_fd: OwnedFd,
    is_tty: bool,
    slave_path: Option<String>,
}

fn open_stdin_stream(mode: IoMode) -> ZioResult<OpenedStream> {
    match mode {
        IoMode::Pipe => {
            let (read_end, write_end) = pipe()?;
            set_cloexec(&read_end)?;
            set_cloexec(&write_end)?;
            Ok(OpenedStream {
                child_fd: read_end,
                parent_fd: write_end,
                is_tty: false,
                slave_path: None,
            })
        }
        IoMode::Tty | IoMode::TtyRaw => {
            let pty = openpty(None, None)?;
            set_cloexec(&pty.master)?;
            let slave_path = nix::pty::ptsname_r(&pty.master).ok();
            Ok(OpenedStream {
                child_fd: pty.slave,
                parent_fd: pty.master,
                is_tty: true,
                slave_path,
            })
        }
    }
}

fn open_stdout_stream(mode: IoMode) -> ZioResult<OpenedStream> {
    match mode {
        IoMode::Pipe => {
            let (read_end, write_end) = pipe()?;
            set_cloexec(&read_end)?;
            set_cloexec(&write_end)?;
            Ok(OpenedStream {
                child_fd: write_end,
                parent_fd: read_end,
                is_tty: false,
                slave_path: None,
            })
        }
        IoMode::Tty | IoMode::TtyRaw => {
            let pty = openpty(None, None)?;
            set_cloexec(&pty.master)?;
            let slave_path = nix::pty::ptsname_r(&pty.master).ok();
            Ok(OpenedStream {
                child_fd: pty.slave,
                parent_fd: pty.master,
                is_tty: true,
                slave_path,
            })
        }
    }
}

/// Disconnects from any controlling terminal, starts a new session, and
/// makes `slave_path` the controlling terminal — verifying each step, since
/// a silent failure here means the child never receives job-control signals
/// (§4.4.1 step 4).
fn make_controlling_tty(slave_path: &str) -> ZioResult<()> {
    match open("/dev/tty", OFlag::O_RDWR | OFlag::O_NOCTTY, Mode::empty()) {
        Ok(fd) => {
            close(fd)?;
        }
        Err(Errno::ENXIO) => {}
        Err(e) => return Err(e.into()),
    }

    setsid()?;

    match open("/dev/tty", OFlag::O_RDWR | OFlag::O_NOCTTY, Mode::empty()) {
        Err(Errno::ENXIO) => {}
        Ok(fd) => {
            let _ = close(fd);
            return Err(ZioError::config(
                "still connected to a controlling tty after setsid",
            ));
        }
        Err(e) => return Err(e.into()),
    }

    let fd = open(slave_path, OFlag::O_RDWR, Mode::empty())?;
    close(fd)?;

    match open("/dev/tty", OFlag::O_WRONLY, Mode::empty()) {
        Ok(fd) => {
            close(fd)?;
        }
        Err(e) => {
            return Err(ZioError::config(format!(
                "controlling tty not available for write after reattach: {e}"
            )))
        }
    }

    Ok(())
}

/// Best-effort: copies the real process stdin's window size onto the child's
/// stdout slave. Reads the *process's own* fd 0, which is meaningless if it
/// isn't the controlling terminal (e.g. stdin redirected) — the source
/// suppresses that case silently, and so do we (§9 open questions).
fn copy_window_size(src_fd: RawFd, dst_fd: RawFd) {
    let mut ws: nix::libc::winsize = unsafe { std::mem::zeroed() };
    let rc = unsafe { nix::libc::ioctl(src_fd, nix::libc::TIOCGWINSZ, &mut ws) };
    if rc != 0 {
        return;
    }
    unsafe {
        nix::libc::ioctl(dst_fd, nix::libc::TIOCSWINSZ, &ws);
    }
}

fn close_fds_above(min_fd: RawFd, keep: RawFd) {
    let mut rl: nix::libc::rlimit = unsafe { std::mem::zeroed() };
    let max_fd: RawFd = unsafe {
        if nix::libc::getrlimit(nix::libc::RLIMIT_NOFILE, &mut rl) == 0 {
            rl.rlim_cur as RawFd
        } else {
            1024
        }
    };
    for fd in min_fd..max_fd {
        if fd == keep {
            continue;
        }
        let _ = close(fd);
    }
}

fn dup_onto(src: RawFd, target: RawFd) -> nix::Result<()> {
    if src == target {
        clear_cloexec(target)
    } else {
        dup2(src, target)?;
        Ok(())
    }
}

/// Runs entirely in the forked child. Never returns on success (the exec
/// call replaces the process image); any `Err` is reported back to the
/// parent through `err_fd` and the child exits 255 (§4.4.1 step 4).
fn child_main(
    stdin_stream: OpenedStream,
    stdout_stream: OpenedStream,
    args: &[String],
    cwd: Option<&Path>,
    env: Option<&HashMap<String, String>>,
    sighup: Option<SighupDisposition>,
    err_fd: RawFd,
) -> ZioResult<()> {
    let real_stdin_is_tty = isatty(std::io::stdin().as_raw_fd()).unwrap_or(false);

    drop(stdin_stream.parent_fd);
    drop(stdout_stream.parent_fd);

    if stdin_stream.is_tty {
        if let Some(path) = &stdin_stream.slave_path {
            make_controlling_tty(path)?;
        }
    }

    if stdout_stream.is_tty && real_stdin_is_tty {
        copy_window_size(0, stdout_stream.child_fd.as_raw_fd());
    }

    let stdin_fd = stdin_stream.child_fd.as_raw_fd();
    let stdout_fd = stdout_stream.child_fd.as_raw_fd();

    dup_onto(stdout_fd, nix::libc::STDOUT_FILENO)?;
    dup_onto(stdout_fd, nix::libc::STDERR_FILENO)?;
    dup_onto(stdin_fd, nix::libc::STDIN_FILENO)?;

    drop(stdin_stream.child_fd);
    drop(stdout_stream.child_fd);

    // Keep `err_fd` open across this sweep: it's how a failure past this
    // point (sighup disposition, chdir, NUL checks, exec itself) gets
    // reported back to the parent. It's FD_CLOEXEC, so a successful exec
    // closes it for us; we only close it ourselves once exec has failed.
    close_fds_above(3, err_fd);

    if let Some(disp) = sighup {
        let handler = match disp {
            SighupDisposition::Default => SigHandler::SigDfl,
            SighupDisposition::Ignore => SigHandler::SigIgn,
        };
        unsafe { signal::signal(Signal::SIGHUP, handler) }?;
    }

    if let Some(dir) = cwd {
        chdir(dir)?;
    }

    let cmd = CString::new(args[0].as_str())
        .map_err(|_| ZioError::config("executable path contains a NUL byte"))?;
    let exec_args: Vec<CString> = args
        .iter()
        .map(|a| CString::new(a.as_str()))
        .collect::<Result<_, _>>()
        .map_err(|_| ZioError::config("argument contains a NUL byte"))?;

    if let Some(env_map) = env {
        let env_cstrings: Vec<CString> = env_map
            .iter()
            .map(|(k, v)| CString::new(format!("{k}={v}")))
            .collect::<Result<_, _>>()
            .map_err(|_| ZioError::config("environment variable contains a NUL byte"))?;
        execvpe(&cmd, &exec_args, &env_cstrings)?;
    } else {
        execvp(&cmd, &exec_args)?;
    }

    unreachable!("exec only returns on failure, which is mapped to Err above")
}

fn error_errno_code(e: &ZioError) -> i32 {
    match e {
        ZioError::Os(errno) => *errno as i32,
        _ => 255,
    }
}

static SHUTDOWN_PIDS: OnceLock<Mutex<Vec<Pid>>> = OnceLock::new();
static SHUTDOWN_HOOK_INSTALLED: OnceLock<()> = OnceLock::new();

fn shutdown_pids() -> &'static Mutex<Vec<Pid>> {
    SHUTDOWN_PIDS.get_or_init(|| Mutex::new(Vec::new()))
}

extern "C" fn shutdown_hook() {
    if let Ok(guard) = shutdown_pids().lock() {
        for &pid in guard.iter() {
            let _ = signal::kill(pid, Signal::SIGHUP);
        }
    }
}

/// Installs the process-wide "SIGHUP still-living children on exit" hook
/// exactly once (§9 "Global state").
fn register_shutdown_hook_once() {
    SHUTDOWN_HOOK_INSTALLED.get_or_init(|| unsafe {
        nix::libc::atexit(shutdown_hook);
    });
}

fn register_child_for_shutdown(pid: Pid) {
    register_shutdown_hook_once();
    if let Ok(mut guard) = shutdown_pids().lock() {
        guard.push(pid);
    }
}

/// Removes `pid` from the shutdown registry, e.g. on `close()`, so long-lived
/// programs that spawn many transports don't leak entries (§9).
fn deregister_child_for_shutdown(pid: Pid) {
    if let Ok(mut guard) = shutdown_pids().lock() {
        guard.retain(|&p| p != pid);
    }
}

fn snapshot_and_maybe_raw(fd: BorrowedFd<'_>, mode: IoMode) -> ZioResult<(Termios, Termios)> {
    let init = termios_ext::get(fd)?;
    let mut raw = init.clone();
    termios_ext::apply_full_raw(&mut raw, false);
    if mode.is_raw() {
        termios_ext::set(fd, &raw)?;
    }
    Ok((init, raw))
}

/// A process attached via pty/pipe, the core transport of this crate (§4.4).
pub struct ProcessTransport {
    rfd: Option<OwnedFd>,
    wfd: Option<OwnedFd>,
    pid: Pid,
    exit_code: Option<i32>,
    eof_seen: bool,
    eof_sent: bool,
    closed: bool,
    rfd_is_tty: bool,
    wfd_is_tty: bool,
    wfd_init_mode: Option<Termios>,
    wfd_raw_mode: Option<Termios>,
    rfd_init_mode: Option<Termios>,
    rfd_raw_mode: Option<Termios>,
    args: Vec<String>,
    write_delay: Duration,
    close_delay: Duration,
    terminate_delay: Duration,
}

impl ProcessTransport {
    pub fn spawn(cfg: SpawnConfig) -> ZioResult<Self> {
        if cfg.args.is_empty() {
            return Err(ZioError::config("command argv must not be empty"));
        }

        let resolved_path = resolve_executable(&cfg.args[0])?;
        let mut resolved_args = cfg.args.clone();
        resolved_args[0] = resolved_path.to_string_lossy().into_owned();

        let stdin_stream = open_stdin_stream(cfg.stdin_mode)?;
        let stdout_stream = open_stdout_stream(cfg.stdout_mode)?;

        let (err_read, err_write) = pipe()?;
        set_cloexec(&err_write)?;

        // SAFETY: only close/dup2/setsid/chdir/exec-family calls run in the
        // child between `fork` and `execvp`/`execvpe`, all async-signal-safe.
        match unsafe { fork()? } {
            ForkResult::Child => {
                drop(err_read);
                let err_fd = err_write.as_raw_fd();
                let result = child_main(
                    stdin_stream,
                    stdout_stream,
                    &resolved_args,
                    cfg.cwd.as_deref(),
                    cfg.env.as_ref(),
                    cfg.sighup_disposition,
                    err_fd,
                );
                let code = match result {
                    Ok(()) => 255,
                    Err(e) => error_errno_code(&e),
                };
                let _ = write(&err_write, &code.to_be_bytes());
                std::process::exit(255);
            }
            ForkResult::Parent { child } => {
                drop(stdin_stream.child_fd);
                drop(stdout_stream.child_fd);
                drop(err_write);

                let mut buf = [0u8; 4];
                let n = nix::unistd::read(&err_read, &mut buf).unwrap_or(0);
                drop(err_read);
                if n == 4 {
                    let code = i32::from_be_bytes(buf);
                    let _ = waitpid(child, None);
                    return Err(ZioError::Os(Errno::from_i32(code)));
                }

                let wfd = stdin_stream.parent_fd;
                let rfd = stdout_stream.parent_fd;

                let (wfd_init, wfd_raw) = if stdin_stream.is_tty {
                    let (i, r) = snapshot_and_maybe_raw(wfd.as_fd(), cfg.stdin_mode)?;
                    (Some(i), Some(r))
                } else {
                    (None, None)
                };
                let (rfd_init, rfd_raw) = if stdout_stream.is_tty {
                    let (i, r) = snapshot_and_maybe_raw(rfd.as_fd(), cfg.stdout_mode)?;
                    (Some(i), Some(r))
                } else {
                    (None, None)
                };

                register_child_for_shutdown(child);
                debug!(pid = child.as_raw(), args = ?resolved_args, "process transport spawned");

                thread::sleep(cfg.close_delay);

                Ok(ProcessTransport {
                    rfd: Some(rfd),
                    wfd: Some(wfd),
                    pid: child,
                    exit_code: None,
                    eof_seen: false,
                    eof_sent: false,
                    closed: false,
                    rfd_is_tty: stdout_stream.is_tty,
                    wfd_is_tty: stdin_stream.is_tty,
                    wfd_init_mode: wfd_init,
                    wfd_raw_mode: wfd_raw,
                    rfd_init_mode: rfd_init,
                    rfd_raw_mode: rfd_raw,
                    args: resolved_args,
                    write_delay: cfg.write_delay,
                    close_delay: cfg.close_delay,
                    terminate_delay: cfg.terminate_delay,
                })
            }
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn wfd_is_tty(&self) -> bool {
        self.wfd_is_tty
    }

    pub fn rfd_is_tty(&self) -> bool {
        self.rfd_is_tty
    }

    pub fn wfd_modes(&self) -> Option<(&Termios, &Termios)> {
        match (&self.wfd_init_mode, &self.wfd_raw_mode) {
            (Some(i), Some(r)) => Some((i, r)),
            _ => None,
        }
    }

    fn reap(&mut self, flag: Option<WaitPidFlag>) -> ZioResult<Option<WaitStatus>> {
        if self.exit_code.is_some() {
            return Ok(None);
        }
        match waitpid(self.pid, flag) {
            Ok(WaitStatus::StillAlive) => Ok(None),
            Ok(status @ WaitStatus::Exited(_, code)) => {
                self.exit_code = Some(code);
                deregister_child_for_shutdown(self.pid);
                Ok(Some(status))
            }
            Ok(status @ WaitStatus::Signaled(_, sig, _)) => {
                self.exit_code = Some(128 + sig as i32);
                deregister_child_for_shutdown(self.pid);
                Ok(Some(status))
            }
            Ok(WaitStatus::Stopped(_, _)) => Err(ZioError::ChildStopped),
            Ok(status) => Ok(Some(status)),
            Err(Errno::ECHILD) => Err(ZioError::Os(Errno::ECHILD)),
            Err(e) => Err(e.into()),
        }
    }

    /// Non-blocking unless `eof_seen` (Linux needs a blocking reap to clear a
    /// zombie whose output pipe was already drained, §4.4.2). Retries once on
    /// an immediate "still alive" to tolerate Solaris-style reporting lag.
    pub fn is_alive(&mut self) -> ZioResult<bool> {
        if self.exit_code.is_some() {
            return Ok(false);
        }

        let flag = if self.eof_seen {
            None
        } else {
            Some(WaitPidFlag::WNOHANG)
        };

        if self.reap(flag)?.is_some() {
            return Ok(self.exit_code.is_none());
        }

        if flag.is_some() {
            // tolerate a stale zero-status report
            if self.reap(flag)?.is_some() {
                return Ok(self.exit_code.is_none());
            }
        }

        Ok(true)
    }

    /// Blocks until the child exits; fails if the child is already reaped.
    pub fn wait(&mut self) -> ZioResult<i32> {
        if let Some(code) = self.exit_code {
            return Ok(code);
        }
        self.reap(None)?;
        self.exit_code
            .ok_or_else(|| ZioError::config("wait() returned without an exit status"))
    }

    /// Escalates `SIGHUP -> SIGCONT -> SIGINT -> (if force) SIGKILL`, sleeping
    /// `terminate_delay` between steps (§4.4.2). Returns whether the child
    /// actually exited.
    pub fn terminate(&mut self, force: bool) -> ZioResult<bool> {
        if !self.is_alive()? {
            return Ok(true);
        }

        let mut signals = vec![Signal::SIGHUP, Signal::SIGCONT, Signal::SIGINT];
        if force {
            signals.push(Signal::SIGKILL);
        }

        for sig in signals {
            let _ = signal::kill(self.pid, sig);
            thread::sleep(self.terminate_delay);
            if !self.is_alive()? {
                return Ok(true);
            }
        }

        Ok(!self.is_alive()?)
    }

    fn select_read_ready(&self, fd: RawFd, timeout: Duration) -> ZioResult<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            let mut fds = FdSet::new();
            let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
            fds.insert(borrowed);
            let mut tv = TimeVal::new(
                remaining.as_secs() as i64,
                remaining.subsec_micros() as i64,
            );
            match nix::sys::select::select(Some(fd + 1), Some(&mut fds), None, None, Some(&mut tv)) {
                Ok(0) => return Ok(false),
                Ok(_) => return Ok(true),
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Transport for ProcessTransport {
    fn recv(&mut self, n: usize, timeout: Duration) -> ZioResult<RecvOutcome> {
        if self.eof_seen {
            return Ok(RecvOutcome::Eof);
        }
        let Some(rfd) = &self.rfd else {
            return Ok(RecvOutcome::Eof);
        };
        let raw = rfd.as_raw_fd();

        if !self.select_read_ready(raw, timeout)? {
            return Ok(RecvOutcome::TimedOut);
        }

        let mut buf = vec![0u8; n.max(1)];
        let borrowed = unsafe { BorrowedFd::borrow_raw(raw) };
        match nix::unistd::read(borrowed, &mut buf) {
            Ok(0) => {
                self.eof_seen = true;
                Ok(RecvOutcome::Eof)
            }
            Ok(sz) => Ok(RecvOutcome::Data(buf[..sz].to_vec())),
            Err(Errno::EIO) => {
                trace!("EIO on process rfd read, treating as peer gone");
                self.eof_seen = true;
                Ok(RecvOutcome::Eof)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn send(&mut self, b: &[u8]) -> ZioResult<()> {
        thread::sleep(self.write_delay);
        self.send_immediate(b)
    }

    fn send_eof(&mut self, force_close: bool) -> ZioResult<()> {
        self.eof_sent = true;
        let Some(wfd) = self.wfd.take() else {
            return Ok(());
        };

        if !self.wfd_is_tty {
            drop(wfd);
            return Ok(());
        }

        #[cfg(target_os = "macos")]
        {
            drop(wfd);
            return Ok(());
        }

        #[cfg(not(target_os = "macos"))]
        {
            // Linux (and, per the open question in §9, FreeBSD by the same
            // path): closing a pty master does not deliver EOF to the slave
            // side's reader the way closing a pipe does. Instead shorten the
            // read timeout so the child's next blocking read on its stdin
            // returns zero bytes.
            if let Ok(mut t) = termios_ext::get(wfd.as_fd()) {
                termios_ext::set_eof_poll_timing(&mut t);
                let _ = termios_ext::set(wfd.as_fd(), &t);
            }
            if force_close {
                thread::sleep(self.close_delay);
                drop(wfd);
            } else {
                self.wfd = Some(wfd);
            }
            Ok(())
        }
    }

    fn close(&mut self, force: bool) -> ZioResult<()> {
        if self.closed {
            return Ok(());
        }
        self.wfd.take();
        self.rfd.take();
        thread::sleep(self.close_delay);
        if self.is_alive().unwrap_or(false) {
            let _ = self.terminate(force);
        }
        self.eof_seen = true;
        self.eof_sent = true;
        self.closed = true;
        deregister_child_for_shutdown(self.pid);
        Ok(())
    }

    fn rfd(&self) -> RawFd {
        self.rfd.as_ref().map(|f| f.as_raw_fd()).unwrap_or(-1)
    }

    fn wfd(&self) -> RawFd {
        self.wfd.as_ref().map(|f| f.as_raw_fd()).unwrap_or(-1)
    }

    fn eof_seen(&self) -> bool {
        self.eof_seen
    }

    fn eof_sent(&self) -> bool {
        self.eof_sent
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn wfd_is_distinct_tty(&self) -> bool {
        self.wfd_is_tty && self.wfd.is_some()
    }

    fn close_delay(&self) -> std::time::Duration {
        self.close_delay
    }

    fn as_process_mut(&mut self) -> Option<&mut ProcessTransport> {
        Some(self)
    }
}

impl ProcessTransport {
    /// Writes without the process transport's `write_delay`, for the
    /// interactive relay where byte-for-byte latency matters (§5).
    pub fn send_immediate(&mut self, b: &[u8]) -> ZioResult<()> {
        let Some(wfd) = &self.wfd else {
            return Err(ZioError::config("write side already closed"));
        };
        let mut off = 0;
        while off < b.len() {
            match nix::unistd::write(wfd, &b[off..]) {
                Ok(0) => break,
                Ok(n) => off += n,
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl Drop for ProcessTransport {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.close(true);
        }
    }
}
