//! End-to-end scenarios over the socket transport (spec §8, E2/E4): a real
//! loopback TCP listener spawned in-test, driven through the public API.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;
use zio::io::{Zio, ZioOptions};
use zio::transport::Target;

fn connect(addr: std::net::SocketAddr) -> Zio {
    Zio::new(
        Target::HostPort(addr.ip().to_string(), addr.port()),
        ZioOptions {
            timeout: Duration::from_secs(5),
            ..ZioOptions::default()
        },
    )
    .expect("connect should succeed")
}

/// E2: a TCP echo server round-trips an exact-size read.
#[test]
fn tcp_echo_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;

    let handle = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();
        let mut buf = [0u8; 4];
        sock.read_exact(&mut buf).unwrap();
        sock.write_all(&buf).unwrap();
    });

    let mut z = connect(addr);
    z.write(b"ping")?;
    let got = z.read(Some(4))?;
    assert_eq!(got, b"ping");

    handle.join().unwrap();
    Ok(())
}

/// E4: when the peer closes after writing fewer bytes than requested, the
/// exact-size read fails with unexpected-EOF carrying what did arrive.
#[test]
fn peer_closing_early_yields_unexpected_eof_with_partial_bytes() -> Result<(), Box<dyn std::error::Error>>
{
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;

    let handle = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();
        sock.write_all(b"abc").unwrap();
        // dropping `sock` here closes the connection after only 3 bytes
    });

    let mut z = connect(addr);
    let err = z.read(Some(5)).unwrap_err();
    let partial = err.partial().expect("unexpected-EOF carries partial buffer");
    assert_eq!(partial, b"abc");

    handle.join().unwrap();
    Ok(())
}

/// `send_eof` half-closes the write side while the read side keeps working.
#[test]
fn send_eof_half_closes_write_side_only() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;

    let handle = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();
        let mut buf = Vec::new();
        sock.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"done");
        sock.write_all(b"ack").unwrap();
    });

    let mut z = connect(addr);
    z.write(b"done")?;
    z.send_eof()?;
    assert!(z.eof_sent());

    let reply = z.read(Some(3))?;
    assert_eq!(reply, b"ack");

    handle.join().unwrap();
    Ok(())
}

/// Connecting to a closed port fails at construction rather than hanging.
#[test]
fn connect_to_closed_port_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = Zio::new(
        Target::HostPort(addr.ip().to_string(), addr.port()),
        ZioOptions {
            timeout: Duration::from_millis(500),
            ..ZioOptions::default()
        },
    );
    assert!(result.is_err());
}
