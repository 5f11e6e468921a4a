//! Pure `bytes -> bytes` transforms applied to every chunk crossing the
//! transport boundary, plus the `bytes -> ()` log sink they feed.

use crate::codec;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// SGR text attributes, combinable via `COLORED`'s `attrs` slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attr {
    Bold,
    Dark,
    Underline,
    Blink,
    Reverse,
    Concealed,
}

impl Attr {
    fn code(self) -> u8 {
        match self {
            Attr::Bold => 1,
            Attr::Dark => 2,
            Attr::Underline => 4,
            Attr::Blink => 5,
            Attr::Reverse => 7,
            Attr::Concealed => 8,
        }
    }
}

/// Foreground color, SGR 30-37.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl Color {
    fn fg_code(self) -> u8 {
        30 + self as u8
    }

    fn bg_code(self) -> u8 {
        40 + self as u8
    }
}

/// A pure `bytes -> bytes` transform. Cloning shares the underlying closure.
#[derive(Clone)]
pub struct Transform {
    f: Arc<dyn Fn(&[u8]) -> Vec<u8> + Send + Sync>,
    name: &'static str,
}

impl Transform {
    fn new(name: &'static str, f: impl Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static) -> Self {
        Transform { f: Arc::new(f), name }
    }

    pub fn apply(&self, bytes: &[u8]) -> Vec<u8> {
        (self.f)(bytes)
    }

    /// Identity transform.
    pub fn raw() -> Self {
        Transform::new("raw", |b| b.to_vec())
    }

    /// Always produces empty output; disables logging on its direction.
    pub fn none() -> Self {
        Transform::new("none", |_| Vec::new())
    }

    pub fn hex() -> Self {
        Transform::new("hex", |b| {
            let mut out = codec::hex_encode(b).into_bytes();
            out.extend_from_slice(b"\r\n");
            out
        })
    }

    pub fn unhex() -> Self {
        Transform::new("unhex", |b| {
            codec::hex_decode(&String::from_utf8_lossy(b), false, codec::PadSide::Left)
                .unwrap_or_default()
        })
    }

    pub fn repr() -> Self {
        Transform::new("repr", codec::repr_encode)
    }

    pub fn eval() -> Self {
        Transform::new("eval", |b| codec::eval_decode(b).unwrap_or_default())
    }

    pub fn bin() -> Self {
        Transform::new("bin", |b| {
            let mut out = codec::bin_encode(b).into_bytes();
            out.extend_from_slice(b"\r\n");
            out
        })
    }

    pub fn unbin() -> Self {
        Transform::new("unbin", |b| {
            codec::bin_decode(&String::from_utf8_lossy(b), false, codec::PadSide::Left)
                .unwrap_or_default()
        })
    }

    /// Wraps `inner`, surrounding its output with SGR escapes. Always
    /// terminated by `ESC [ 0 m` regardless of which colors/attrs are set.
    pub fn colored(
        inner: Transform,
        fg: Option<Color>,
        bg: Option<Color>,
        attrs: &[Attr],
    ) -> Self {
        let mut codes: Vec<u8> = Vec::new();
        if let Some(fg) = fg {
            codes.push(fg.fg_code());
        }
        if let Some(bg) = bg {
            codes.push(bg.bg_code());
        }
        for a in attrs {
            codes.push(a.code());
        }
        let prefix = if codes.is_empty() {
            Vec::new()
        } else {
            let joined = codes
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(";");
            format!("\x1b[{}m", joined).into_bytes()
        };

        Transform::new("colored", move |b| {
            let body = inner.apply(b);
            if body.is_empty() {
                return body;
            }
            let mut out = prefix.clone();
            out.extend_from_slice(&body);
            out.extend_from_slice(b"\x1b[0m");
            out
        })
    }

    /// `true` iff this transform is the `none()` sentinel by identity.
    ///
    /// Exposed so callers can implement the `print_read`/`print_write`
    /// boolean view atop a `Transform` without conflating "disabled" with
    /// "explicitly set to a transform that happens to return empty bytes".
    /// See DESIGN.md's resolution of the `print_read`/`transform` open question.
    pub fn is_none(&self) -> bool {
        self.name == "none"
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl std::fmt::Debug for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transform").field("name", &self.name).finish()
    }
}

/// A `bytes -> ()` sink that every chunk crossing the boundary is routed to.
pub trait LogSink: Send {
    fn write_bytes(&mut self, bytes: &[u8]);
}

/// Writes to any `std::io::Write`, e.g. `std::io::stderr()` (the default) or
/// a file opened for append (`--debug PATH`).
pub struct WriterSink<W: Write + Send> {
    inner: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(inner: W) -> Self {
        WriterSink { inner: Mutex::new(inner) }
    }
}

impl<W: Write + Send> LogSink for WriterSink<W> {
    fn write_bytes(&mut self, bytes: &[u8]) {
        if let Ok(mut guard) = self.inner.lock() {
            let _ = guard.write_all(bytes);
            let _ = guard.flush();
        }
    }
}

pub fn stderr_sink() -> Box<dyn LogSink> {
    Box::new(WriterSink::new(std::io::stderr()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_disables_output() {
        assert_eq!(Transform::none().apply(b"anything"), Vec::<u8>::new());
        assert!(Transform::none().is_none());
        assert!(!Transform::raw().is_none());
    }

    #[test]
    fn raw_is_identity() {
        assert_eq!(Transform::raw().apply(b"xyz"), b"xyz".to_vec());
    }

    #[test]
    fn hex_unhex_roundtrip_ignoring_crlf() {
        let encoded = Transform::hex().apply(b"abc");
        assert!(encoded.ends_with(b"\r\n"));
        assert_eq!(Transform::unhex().apply(&encoded), b"abc".to_vec());
    }

    #[test]
    fn colored_wraps_with_sgr_and_terminates_with_reset() {
        let t = Transform::colored(Transform::raw(), Some(Color::Yellow), None, &[]);
        let out = t.apply(b"hi");
        assert!(out.starts_with(b"\x1b[33m"));
        assert!(out.ends_with(b"\x1b[0m"));
        assert!(out.windows(2).any(|w| w == b"hi"));
    }

    #[test]
    fn colored_of_empty_output_stays_empty() {
        let t = Transform::colored(Transform::none(), Some(Color::Cyan), None, &[]);
        assert_eq!(t.apply(b"anything"), Vec::<u8>::new());
    }

    /// `--debug PATH` (§6) opens a file for append and hands it to
    /// `WriterSink`; exercise that path directly rather than through stderr.
    #[test]
    fn writer_sink_appends_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zio-debug.log");
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .unwrap();
        let mut sink = WriterSink::new(file);
        sink.write_bytes(b"first\n");
        sink.write_bytes(b"second\n");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }
}
