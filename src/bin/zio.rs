//! Thin CLI wrapper over the `zio` library, generalizing the teacher's
//! single-file `main` into the dispatch/transform/exit-code rules of §6.

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use zio::cli::{self, Args, DecodeKind, Dispatch, TransformKind};
use zio::io::{Zio, ZioOptions};
use zio::pattern::Pattern;
use zio::transform::{self, Color, Transform};
use zio::transport::Target;

/// Argument parse failure (§6: exit 10).
const EXIT_ARGS: i32 = 10;
/// Bad `--timeout` (§6: exit 11).
const EXIT_TIMEOUT: i32 = 11;

fn main() {
    if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    let args = match Args::try_parse() {
        Ok(a) => a,
        Err(e) => {
            let _ = e.print();
            std::process::exit(EXIT_ARGS);
        }
    };

    match run(args) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("zio: {e:#}");
            std::process::exit(1);
        }
    }
}

fn build_read_transform(kind: TransformKind) -> Transform {
    match kind {
        TransformKind::Raw => Transform::raw(),
        TransformKind::None => Transform::none(),
        TransformKind::Hex => Transform::colored(Transform::hex(), Some(Color::Yellow), None, &[]),
        TransformKind::Repr => {
            Transform::colored(Transform::repr(), Some(Color::Yellow), None, &[])
        }
    }
}

fn build_write_transform(kind: TransformKind) -> Transform {
    match kind {
        TransformKind::Raw => Transform::raw(),
        TransformKind::None => Transform::none(),
        TransformKind::Hex => Transform::colored(Transform::hex(), Some(Color::Cyan), None, &[]),
        TransformKind::Repr => {
            Transform::colored(Transform::repr(), Some(Color::Cyan), None, &[])
        }
    }
}

fn build_decode_transform(kind: DecodeKind) -> Transform {
    match kind {
        DecodeKind::Eval => Transform::eval(),
        DecodeKind::Unhex => Transform::unhex(),
    }
}

fn run(args: Args) -> Result<()> {
    if args.timeout <= 0 {
        std::process::exit(EXIT_TIMEOUT);
    }
    let timeout = Duration::from_secs(args.timeout as u64);

    let dispatch = cli::dispatch(&args.positional).unwrap_or_else(|e| {
        eprintln!("zio: {e}");
        std::process::exit(EXIT_ARGS);
    });

    let target = match dispatch {
        Dispatch::Socket { host, port } => Target::HostPort(host, port),
        Dispatch::CommandArgv(argv) => Target::CommandArgv(argv),
        Dispatch::CommandString(s) => Target::CommandString(s),
    };

    let log_sink: Box<dyn transform::LogSink> = match &args.debug {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening --debug log {}", path.display()))?;
            Box::new(transform::WriterSink::new(file))
        }
        None => transform::stderr_sink(),
    };

    let opts = ZioOptions {
        timeout,
        read_transform: build_read_transform(args.read_transform),
        write_transform: build_write_transform(args.write_transform),
        print_read: true,
        print_write: true,
        log_sink,
        stdin_mode: args.stdin_mode,
        stdout_mode: args.stdout_mode,
        cwd: None,
        env: None,
        sighup_disposition: None,
        write_delay: Duration::from_secs_f64(args.delay.max(0.0)),
        close_delay: Duration::from_millis(100),
        terminate_delay: Duration::from_millis(100),
    };

    let mut z = Zio::new(target, opts).context("constructing transport")?;

    if let Some(before) = &args.before {
        z.read_until(&[Pattern::literal(before.0.clone())], true)
            .context("reading --before pattern")?;
    }

    if let Some(ahead) = &args.ahead {
        z.write(&ahead.0).context("writing --ahead bytes")?;
    }

    let decode = args.decode.map(build_decode_transform);
    zio::relay::interact(&mut z, decode.as_ref()).context("interactive relay")?;

    z.close().context("closing transport")?;
    Ok(())
}
