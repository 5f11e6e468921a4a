//! A buffered, byte-oriented I/O facade over pty-attached processes and TCP
//! sockets, for exploit-development and protocol-probing workflows.

pub mod cli;
pub mod codec;
pub mod error;
pub mod io;
pub mod pattern;
pub mod relay;
pub mod transform;
pub mod transport;

pub use error::{ReadKind, ZioError, ZioResult};
pub use io::{Zio, ZioOptions};
pub use pattern::Pattern;
pub use transform::Transform;
pub use transport::{IoMode, Target};
