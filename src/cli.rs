//! Argument parsing for the `zio` binary (§6), mirroring the teacher's
//! `#[derive(Parser)]` style in `main.rs`.

use clap::Parser;
use std::str::FromStr;

/// Read/write transform choice exposed on the CLI; `Hex`/`Repr` get their
/// teacher-mandated SGR coloring (yellow for reads, cyan for writes) applied
/// by the caller, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    Raw,
    None,
    Hex,
    Repr,
}

impl FromStr for TransformKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(TransformKind::Raw),
            "none" => Ok(TransformKind::None),
            "hex" => Ok(TransformKind::Hex),
            "repr" => Ok(TransformKind::Repr),
            other => Err(format!(
                "unknown transform '{other}', expected one of: raw, none, hex, repr"
            )),
        }
    }
}

/// stdin decode applied during `interact` (`-d/--decode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeKind {
    Eval,
    Unhex,
}

impl FromStr for DecodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eval" => Ok(DecodeKind::Eval),
            "unhex" => Ok(DecodeKind::Unhex),
            other => Err(format!("unknown decode '{other}', expected one of: eval, unhex")),
        }
    }
}

/// A buffer literal passed to `-a/--ahead` or `-b/--before`: taken verbatim
/// as raw bytes, same as the teacher's plain `String` positional arguments.
#[derive(Debug, Clone)]
pub struct ByteLiteral(pub Vec<u8>);

impl FromStr for ByteLiteral {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ByteLiteral(s.as_bytes().to_vec()))
    }
}

#[derive(Parser, Debug)]
#[command(name = "zio")]
#[command(version)]
#[command(about = "Buffered byte-oriented I/O over a pty-attached process or a TCP socket")]
pub struct Args {
    /// stdin pty mode for process targets
    #[arg(short = 'i', long = "stdin", value_enum, default_value = "tty")]
    pub stdin_mode: crate::transport::IoMode,

    /// stdout pty mode for process targets
    #[arg(short = 'o', long = "stdout", value_enum, default_value = "tty")]
    pub stdout_mode: crate::transport::IoMode,

    /// recv/read_until timeout, in whole seconds
    #[arg(short = 't', long = "timeout", default_value_t = 16)]
    pub timeout: i64,

    /// how to render bytes read from the peer on the log sink
    #[arg(short = 'r', long = "read", value_enum, default_value = "raw")]
    pub read_transform: TransformKind,

    /// how to render bytes written to the peer on the log sink
    #[arg(short = 'w', long = "write", value_enum, default_value = "raw")]
    pub write_transform: TransformKind,

    /// bytes to send before entering interact
    #[arg(short = 'a', long = "ahead")]
    pub ahead: Option<ByteLiteral>,

    /// bytes to read_until before any send
    #[arg(short = 'b', long = "before")]
    pub before: Option<ByteLiteral>,

    /// decode applied to local stdin during interact
    #[arg(short = 'd', long = "decode", value_enum)]
    pub decode: Option<DecodeKind>,

    /// write_delay, in fractional seconds
    #[arg(short = 'l', long = "delay", default_value_t = 0.05)]
    pub delay: f64,

    /// append the byte-level log to this file instead of stderr
    #[arg(long = "debug", value_name = "PATH")]
    pub debug: Option<std::path::PathBuf>,

    /// command words, or `<host> <port>` for a socket target
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub positional: Vec<String>,
}

impl clap::ValueEnum for crate::transport::IoMode {
    fn value_variants<'a>() -> &'a [Self] {
        &[
            crate::transport::IoMode::Tty,
            crate::transport::IoMode::TtyRaw,
            crate::transport::IoMode::Pipe,
        ]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            crate::transport::IoMode::Tty => clap::builder::PossibleValue::new("tty"),
            crate::transport::IoMode::TtyRaw => clap::builder::PossibleValue::new("ttyraw"),
            crate::transport::IoMode::Pipe => clap::builder::PossibleValue::new("pipe"),
        })
    }
}

impl clap::ValueEnum for TransformKind {
    fn value_variants<'a>() -> &'a [Self] {
        &[
            TransformKind::Raw,
            TransformKind::None,
            TransformKind::Hex,
            TransformKind::Repr,
        ]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            TransformKind::Raw => clap::builder::PossibleValue::new("raw"),
            TransformKind::None => clap::builder::PossibleValue::new("none"),
            TransformKind::Hex => clap::builder::PossibleValue::new("hex"),
            TransformKind::Repr => clap::builder::PossibleValue::new("repr"),
        })
    }
}

impl clap::ValueEnum for DecodeKind {
    fn value_variants<'a>() -> &'a [Self] {
        &[DecodeKind::Eval, DecodeKind::Unhex]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            DecodeKind::Eval => clap::builder::PossibleValue::new("eval"),
            DecodeKind::Unhex => clap::builder::PossibleValue::new("unhex"),
        })
    }
}

/// Positional dispatch per §6: exactly two args where the second parses as a
/// valid `u16` port yields a socket target; otherwise all positionals
/// together form the command (argv form when `> 1`, string form when `1`).
pub enum Dispatch {
    Socket { host: String, port: u16 },
    CommandArgv(Vec<String>),
    CommandString(String),
}

pub fn dispatch(positional: &[String]) -> Result<Dispatch, String> {
    if positional.is_empty() {
        return Err("no command or host/port given".to_string());
    }
    if positional.len() == 2 {
        if let Ok(port) = positional[1].parse::<u16>() {
            return Ok(Dispatch::Socket {
                host: positional[0].clone(),
                port,
            });
        }
    }
    if positional.len() == 1 {
        Ok(Dispatch::CommandString(positional[0].clone()))
    } else {
        Ok(Dispatch::CommandArgv(positional.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_positionals_with_valid_port_is_socket() {
        match dispatch(&["example.com".to_string(), "4444".to_string()]).unwrap() {
            Dispatch::Socket { host, port } => {
                assert_eq!(host, "example.com");
                assert_eq!(port, 4444);
            }
            _ => panic!("expected socket dispatch"),
        }
    }

    #[test]
    fn two_positionals_with_non_numeric_second_is_argv_command() {
        match dispatch(&["ssh".to_string(), "host".to_string()]).unwrap() {
            Dispatch::CommandArgv(argv) => assert_eq!(argv, vec!["ssh", "host"]),
            _ => panic!("expected argv dispatch"),
        }
    }

    #[test]
    fn single_positional_is_command_string() {
        match dispatch(&["/bin/sh -c 'echo hi'".to_string()]).unwrap() {
            Dispatch::CommandString(s) => assert_eq!(s, "/bin/sh -c 'echo hi'"),
            _ => panic!("expected command-string dispatch"),
        }
    }

    #[test]
    fn three_positionals_is_argv_command() {
        match dispatch(&["cat".to_string(), "-A".to_string(), "file".to_string()]).unwrap() {
            Dispatch::CommandArgv(argv) => assert_eq!(argv.len(), 3),
            _ => panic!("expected argv dispatch"),
        }
    }
}
