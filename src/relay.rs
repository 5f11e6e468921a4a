//! The interactive relay (§4.6): hands the local terminal to the user while
//! multiplexing it against the transport, generalizing the teacher's
//! `parent_process` select loop from a single pty master to the facade's
//! `{rfd, wfd}` pair plus the EOF/timeout bookkeeping `RecvOutcome` carries.

use crate::error::{ZioError, ZioResult};
use crate::io::Zio;
use crate::transform::Transform;
use crate::transport::termios_ext;
use crate::transport::RecvOutcome;
use nix::errno::Errno;
use nix::sys::select::{select, FdSet};
use nix::sys::termios::Termios;
use nix::sys::time::TimeVal;
use std::io::Write;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// 100ms, chosen so the select loop re-checks child liveness and the SIGINT
/// flag promptly without busy-looping (same cadence as the teacher's).
fn poll_interval() -> TimeVal {
    TimeVal::new(0, 100_000)
}

const RECV_CHUNK: usize = 16384;

/// RAII guard restoring the local terminal's termios on every exit path,
/// including early returns via `?` inside [`interact`].
struct TermiosGuard {
    fd: RawFd,
    saved: Termios,
}

impl Drop for TermiosGuard {
    fn drop(&mut self) {
        let fd = unsafe { BorrowedFd::borrow_raw(self.fd) };
        if let Err(e) = termios_ext::set(fd, &self.saved) {
            warn!(error = %e, "failed to restore local terminal mode");
        }
    }
}

/// Hands control of the local terminal to the user, relaying bytes between
/// stdin/stdout and the transport until EOF, child death, or `SIGINT`
/// (§4.6). Always restores the local terminal mode before returning.
///
/// `stdin_decode`, when set, is applied to each chunk read from the local
/// terminal before it is logged/sent — the CLI's `-d/--decode` (§6), letting
/// a user type `eval`/`unhex`-encoded bytes that decode to the real traffic.
pub fn interact(zio: &mut Zio, stdin_decode: Option<&Transform>) -> ZioResult<()> {
    let stdin = std::io::stdin();
    let stdin_fd = stdin.as_fd();
    let stdin_raw = stdin.as_raw_fd();

    let saved = termios_ext::get(stdin_fd)?;
    let mut raw = termios_ext::get(stdin_fd)?;
    termios_ext::apply_full_raw(&mut raw, false);
    termios_ext::set(stdin_fd, &raw)?;
    let _restore = TermiosGuard { fd: stdin_raw, saved };

    let interrupted = Arc::new(AtomicBool::new(false));
    let _sigint_guard =
        signal_hook::flag::register(signal_hook::consts::SIGINT, interrupted.clone())
            .map_err(|e| ZioError::config(format!("failed to install SIGINT handler: {e}")))?;

    restore_child_wfd_if_untouched(zio)?;

    let mut wfd_active = zio.transport_mut().wfd_is_distinct_tty();
    let mut rfd_active = true;
    let mut stdin_open = true;

    loop {
        if interrupted.load(Ordering::Relaxed) {
            debug!("relay interrupted by SIGINT, exiting cleanly");
            break;
        }

        if let Some(alive) = zio.is_alive()? {
            if !alive && !wfd_active && !rfd_active {
                break;
            }
        }
        if !stdin_open && !wfd_active && !rfd_active {
            break;
        }

        let rfd = zio.transport_mut().rfd();
        let wfd = zio.transport_mut().wfd();

        let mut read_fds = FdSet::new();
        if stdin_open {
            read_fds.insert(stdin_fd);
        }
        if rfd_active && rfd >= 0 {
            read_fds.insert(unsafe { BorrowedFd::borrow_raw(rfd) });
        }
        if wfd_active && wfd >= 0 {
            read_fds.insert(unsafe { BorrowedFd::borrow_raw(wfd) });
        }

        let highest = [
            if stdin_open { stdin_raw } else { -1 },
            if rfd_active { rfd } else { -1 },
            if wfd_active { wfd } else { -1 },
        ]
        .into_iter()
        .max()
        .unwrap_or(-1);
        if highest < 0 {
            break;
        }

        let mut timeout = poll_interval();
        match select(
            Some(highest + 1),
            Some(&mut read_fds),
            None,
            None,
            Some(&mut timeout),
        ) {
            Ok(0) => continue,
            Ok(_) => {}
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e.into()),
        }

        if wfd_active && wfd >= 0 && read_fds.contains(unsafe { BorrowedFd::borrow_raw(wfd) }) {
            let mut buf = [0u8; RECV_CHUNK];
            let borrowed = unsafe { BorrowedFd::borrow_raw(wfd) };
            match nix::unistd::read(borrowed, &mut buf) {
                Ok(0) => wfd_active = false,
                Ok(n) => write_stdout(&buf[..n])?,
                Err(Errno::EIO) => {
                    trace!("EIO on relay wfd, dropping from select set");
                    wfd_active = false;
                }
                Err(Errno::EAGAIN) => {}
                Err(e) => return Err(e.into()),
            }
        }

        if rfd_active && rfd >= 0 && read_fds.contains(unsafe { BorrowedFd::borrow_raw(rfd) }) {
            match zio
                .transport_mut()
                .recv(RECV_CHUNK, Duration::from_millis(1))?
            {
                RecvOutcome::Data(bytes) => {
                    let shown = zio.read_transform().apply(&bytes);
                    if zio.print_read_flag() && !shown.is_empty() {
                        zio.log_sink_mut().write_bytes(&shown);
                    }
                    write_stdout(&bytes)?;
                }
                RecvOutcome::Eof => {
                    debug!("transport EOF seen during relay, dropping rfd from select set");
                    rfd_active = false;
                }
                RecvOutcome::TimedOut => {}
            }
        }

        if stdin_open && read_fds.contains(stdin_fd) {
            let mut buf = [0u8; RECV_CHUNK];
            match nix::unistd::read(stdin_fd, &mut buf) {
                Ok(0) => {
                    stdin_open = false;
                    zio.send_eof()?;
                }
                Ok(n) => {
                    let mut chunk = match stdin_decode {
                        Some(t) => t.apply(&buf[..n]),
                        None => buf[..n].to_vec(),
                    };
                    if !wfd_active {
                        for b in chunk.iter_mut() {
                            if *b == b'\r' {
                                *b = b'\n';
                            }
                        }
                        write_stdout(&chunk)?;
                    }
                    let logged = zio.write_transform().apply(&chunk);
                    if zio.print_write_flag() && !logged.is_empty() {
                        zio.log_sink_mut().write_bytes(&logged);
                    }
                    send_until_drained_or_dead(zio, &chunk)?;
                }
                Err(Errno::EINTR) | Err(Errno::EAGAIN) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    drain_remaining(zio)
}

/// If the child never touched its stdin pty's mode (it still reads back as
/// the snapshotted raw mode), restore the snapshotted initial mode on entry
/// so line editing works in the child once control is handed to the user
/// (§4.6) — programs that leave `wfd` alone otherwise stay stuck in the raw
/// mode this crate put them in for non-interactive scripting.
fn restore_child_wfd_if_untouched(zio: &mut Zio) -> ZioResult<()> {
    let wfd_raw = zio.transport_mut().wfd();
    if wfd_raw < 0 {
        return Ok(());
    }
    let Some(p) = zio.transport_mut().as_process_mut() else {
        return Ok(());
    };
    if !p.wfd_is_tty() {
        return Ok(());
    }
    let Some((init, raw)) = p.wfd_modes() else {
        return Ok(());
    };
    let (init, raw) = (init.clone(), raw.clone());

    let fd = unsafe { BorrowedFd::borrow_raw(wfd_raw) };
    let current = match termios_ext::get(fd) {
        Ok(t) => t,
        Err(_) => return Ok(()),
    };
    if termios_equal(&current, &raw) {
        let _ = termios_ext::set(fd, &init);
    }
    Ok(())
}

fn termios_equal(a: &Termios, b: &Termios) -> bool {
    a.input_flags == b.input_flags
        && a.output_flags == b.output_flags
        && a.control_flags == b.control_flags
        && a.local_flags == b.local_flags
        && a.control_chars == b.control_chars
}

fn write_stdout(bytes: &[u8]) -> ZioResult<()> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    lock.write_all(bytes).map_err(ZioError::Io)?;
    lock.flush().map_err(ZioError::Io)
}

/// Loops `send` until the whole chunk is handed off or the child has died,
/// bypassing the process transport's `write_delay` per §5.
fn send_until_drained_or_dead(zio: &mut Zio, chunk: &[u8]) -> ZioResult<()> {
    if chunk.is_empty() {
        return Ok(());
    }
    if let Some(p) = zio.transport_mut().as_process_mut() {
        if !p.is_alive()? {
            return Ok(());
        }
        return p.send_immediate(chunk);
    }
    zio.transport_mut().send(chunk)
}

/// Final short capture window so output the child flushed right before
/// exiting is not lost (§4.6). Runs for up to the transport's configured
/// `close_delay`, not the read timeout.
fn drain_remaining(zio: &mut Zio) -> ZioResult<()> {
    let budget = zio.transport_mut().close_delay();
    let deadline = std::time::Instant::now() + budget;
    loop {
        let remaining = deadline.saturating_duration_since(std::time::Instant::now());
        if remaining.is_zero() {
            return Ok(());
        }
        match zio.transport_mut().recv(RECV_CHUNK, remaining)? {
            RecvOutcome::Data(bytes) => write_stdout(&bytes)?,
            RecvOutcome::Eof | RecvOutcome::TimedOut => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_interval_is_100ms() {
        assert_eq!(poll_interval(), TimeVal::new(0, 100_000));
    }
}
