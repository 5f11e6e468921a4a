//! TCP transport: connect, recv/send/half-close, EOF detection (§4.3).

use super::{RecvOutcome, Transport};
use crate::error::{ZioError, ZioResult};
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;
use tracing::debug;

pub struct SocketTransport {
    stream: TcpStream,
    eof_seen: bool,
    eof_sent: bool,
    closed: bool,
}

impl SocketTransport {
    pub fn connect(host: &str, port: u16, timeout: Duration) -> ZioResult<Self> {
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(ZioError::Io)?
            .next()
            .ok_or_else(|| ZioError::config(format!("could not resolve {host}:{port}")))?;

        let stream = TcpStream::connect_timeout(&addr, timeout).map_err(ZioError::Io)?;
        stream.set_nodelay(true).map_err(ZioError::Io)?;
        debug!(%host, port, "socket transport connected");

        Ok(SocketTransport {
            stream,
            eof_seen: false,
            eof_sent: false,
            closed: false,
        })
    }

    /// Wraps a pre-existing connected socket (`Target::ExistingSocket`).
    pub fn from_stream(stream: TcpStream) -> Self {
        SocketTransport {
            stream,
            eof_seen: false,
            eof_sent: false,
            closed: false,
        }
    }
}

impl Transport for SocketTransport {
    fn recv(&mut self, n: usize, timeout: Duration) -> ZioResult<RecvOutcome> {
        if self.eof_seen {
            return Ok(RecvOutcome::Eof);
        }
        self.stream.set_read_timeout(Some(timeout)).map_err(ZioError::Io)?;

        let mut buf = vec![0u8; n.max(1)];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => {
                    self.eof_seen = true;
                    return Ok(RecvOutcome::Eof);
                }
                Ok(read) => return Ok(RecvOutcome::Data(buf[..read].to_vec())),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    return Ok(RecvOutcome::TimedOut);
                }
                Err(e) => return Err(ZioError::Io(e)),
            }
        }
    }

    fn send(&mut self, b: &[u8]) -> ZioResult<()> {
        self.stream.write_all(b).map_err(ZioError::Io)
    }

    fn send_eof(&mut self, _force_close: bool) -> ZioResult<()> {
        self.eof_sent = true;
        let _ = self.stream.shutdown(Shutdown::Write);
        Ok(())
    }

    fn close(&mut self, _force: bool) -> ZioResult<()> {
        if self.closed {
            return Ok(());
        }
        let _ = self.stream.shutdown(Shutdown::Both);
        self.eof_seen = true;
        self.eof_sent = true;
        self.closed = true;
        Ok(())
    }

    fn rfd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    fn wfd(&self) -> RawFd {
        self.stream.as_raw_fd()
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn connect_recv_send_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            sock.read_exact(&mut buf).unwrap();
            sock.write_all(&buf).unwrap();
        });

        let mut t = SocketTransport::connect(
            &addr.ip().to_string(),
            addr.port(),
            Duration::from_secs(2),
        )
        .unwrap();
        t.send(b"ping").unwrap();
        let got = t.recv(4, Duration::from_secs(2)).unwrap();
        assert_eq!(got, RecvOutcome::Data(b"ping".to_vec()));

        handle.join().unwrap();
    }

    #[test]
    fn eof_is_seen_and_monotonic() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (sock, _) = listener.accept().unwrap();
            drop(sock);
        });

        let mut t = SocketTransport::connect(
            &addr.ip().to_string(),
            addr.port(),
            Duration::from_secs(2),
        )
        .unwrap();
        let r = t.recv(16, Duration::from_secs(2)).unwrap();
        assert_eq!(r, RecvOutcome::Eof);
        assert!(t.eof_seen());
        let r2 = t.recv(16, Duration::from_secs(2)).unwrap();
        assert_eq!(r2, RecvOutcome::Eof);

        handle.join().unwrap();
    }

    #[test]
    fn close_latches_both_eof_flags() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let _ = listener.accept().unwrap();
        });
        let mut t = SocketTransport::connect(
            &addr.ip().to_string(),
            addr.port(),
            Duration::from_secs(2),
        )
        .unwrap();
        t.close(true).unwrap();
        assert!(t.eof_seen());
        assert!(t.eof_sent());
        assert!(t.is_closed());
        handle.join().unwrap();
    }
}
