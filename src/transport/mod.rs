//! Transport polymorphism: two backends behind one narrow capability trait.
//!
//! Modeled as a tagged union (`Box<dyn Transport>`) rather than an enum with
//! match arms at every call site, per §9 "Transport polymorphism".

pub mod process;
pub mod socket;
pub mod termios_ext;

use crate::error::ZioResult;
use std::os::fd::RawFd;
use std::time::Duration;

/// What a `Zio` facade is constructed against.
pub enum Target {
    HostPort(String, u16),
    ExistingSocket(std::os::fd::OwnedFd),
    CommandString(String),
    CommandArgv(Vec<String>),
}

impl Target {
    /// Validates the target shape per §4.7: empty targets and out-of-range
    /// ports fail at construction, before any I/O is attempted.
    pub fn validate(&self) -> ZioResult<()> {
        use crate::error::ZioError;
        match self {
            Target::HostPort(host, _port) => {
                if host.is_empty() {
                    return Err(ZioError::config("host must not be empty"));
                }
                Ok(())
            }
            Target::CommandString(s) => {
                if s.trim().is_empty() {
                    return Err(ZioError::config("command string must not be empty"));
                }
                Ok(())
            }
            Target::CommandArgv(argv) => {
                if argv.is_empty() || argv[0].is_empty() {
                    return Err(ZioError::config("command argv must not be empty"));
                }
                Ok(())
            }
            Target::ExistingSocket(_) => Ok(()),
        }
    }
}

/// Per-stream mode for a process transport's stdin/stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoMode {
    /// Anonymous pipe: simple, byte-transparent, subject to child stdio buffering.
    Pipe,
    /// Pseudo-terminal in cooked mode.
    Tty,
    /// Pseudo-terminal in raw mode.
    TtyRaw,
}

impl IoMode {
    pub fn is_tty(self) -> bool {
        matches!(self, IoMode::Tty | IoMode::TtyRaw)
    }

    pub fn is_raw(self) -> bool {
        matches!(self, IoMode::TtyRaw)
    }
}

impl std::str::FromStr for IoMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pipe" => Ok(IoMode::Pipe),
            "tty" => Ok(IoMode::Tty),
            "ttyraw" => Ok(IoMode::TtyRaw),
            other => Err(format!(
                "unknown io mode '{other}', expected one of: pipe, tty, ttyraw"
            )),
        }
    }
}

/// Distinguishes "peer closed" from "no bytes arrived before the deadline" —
/// the sentinel §4.3 requires `recv` to return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecvOutcome {
    Data(Vec<u8>),
    TimedOut,
    Eof,
}

/// The narrow capability set every transport exposes to the facade and relay.
///
/// `recv`/`send`/`send_eof`/`close` may block; see §5 for the suspension
/// points. `eof_seen`/`eof_sent` are monotonic (invariant 1/2, §3).
pub trait Transport: Send {
    /// Reads up to `n` bytes within `timeout`. See [`RecvOutcome`].
    fn recv(&mut self, n: usize, timeout: Duration) -> ZioResult<RecvOutcome>;

    /// Writes all of `b`, blocking until every byte is handed to the kernel.
    fn send(&mut self, b: &[u8]) -> ZioResult<()>;

    /// Half-closes the write side (or the transport-specific equivalent).
    fn send_eof(&mut self, force_close: bool) -> ZioResult<()>;

    /// Idempotent; invalidates both descriptors and latches both eof flags.
    fn close(&mut self, force: bool) -> ZioResult<()>;

    fn rfd(&self) -> RawFd;
    fn wfd(&self) -> RawFd;

    fn eof_seen(&self) -> bool;
    fn eof_sent(&self) -> bool;

    fn is_closed(&self) -> bool;

    /// `true` when this transport's `wfd` is a distinct tty the relay should
    /// also select on to pick up echo (process transports with a tty stdin
    /// whose fd differs from `rfd`). Sockets and pipe-stdin processes answer
    /// `false`.
    fn wfd_is_distinct_tty(&self) -> bool {
        false
    }

    /// The transport's configured `close_delay` (§3), i.e. how long the
    /// relay's post-loop drain window (§4.6) should run. Transports with no
    /// such concept (sockets) fall back to the same 100ms default the
    /// process transport uses.
    fn close_delay(&self) -> Duration {
        Duration::from_millis(100)
    }

    /// Escape hatch for the process-only operations (`is_alive`/`terminate`/
    /// `wait`/`pid`) the facade exposes conditionally. `None` for transports
    /// with no attached child, e.g. [`socket::SocketTransport`].
    fn as_process_mut(&mut self) -> Option<&mut process::ProcessTransport> {
        None
    }
}
