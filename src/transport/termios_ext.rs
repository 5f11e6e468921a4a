//! Terminal mode policy (§4.4.3): selective raw-in/raw-out flag clearing,
//! generalized from the teacher's hard-coded `setup_raw_mode`.

use nix::sys::termios::{
    self, ControlFlags, InputFlags, LocalFlags, OutputFlags, SetArg, SpecialCharacterIndices,
    Termios,
};
use std::os::fd::BorrowedFd;

/// Clears `BRKINT|ICRNL|INPCK|ISTRIP|IXON` from input flags, `CSIZE|PARENB`
/// from control flags (setting `CS8`), and `ICANON|IEXTEN|ISIG` (plus `ECHO`
/// unless `echo` is requested) from local flags. `VMIN=1`, `VTIME=0`.
///
/// This is the "raw in" half of §4.4.3; callers compose it with
/// [`apply_raw_out`] depending on which of stdin/stdout is in `TtyRaw` mode.
pub fn apply_raw_in(termios: &mut Termios, echo: bool) {
    termios.input_flags &= !(InputFlags::BRKINT
        | InputFlags::ICRNL
        | InputFlags::INPCK
        | InputFlags::ISTRIP
        | InputFlags::IXON);

    termios.control_flags &= !(ControlFlags::CSIZE | ControlFlags::PARENB);
    termios.control_flags |= ControlFlags::CS8;

    let mut cleared = LocalFlags::ICANON | LocalFlags::IEXTEN | LocalFlags::ISIG;
    if !echo {
        cleared |= LocalFlags::ECHO;
    }
    termios.local_flags &= !cleared;

    termios.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
    termios.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
}

/// Clears `OPOST` from output flags ("raw out", §4.4.3).
pub fn apply_raw_out(termios: &mut Termios) {
    termios.output_flags &= !OutputFlags::OPOST;
}

/// Applies both raw-in and raw-out, matching a plain `TtyRaw` mode.
pub fn apply_full_raw(termios: &mut Termios, echo: bool) {
    apply_raw_in(termios, echo);
    apply_raw_out(termios);
}

/// Sets `VMIN=0, VTIME=1` so a blocking read on this fd times out and
/// returns zero bytes — used to fake EOF on a Linux pty master (§4.4.4).
pub fn set_eof_poll_timing(termios: &mut Termios) {
    termios.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
    termios.control_chars[SpecialCharacterIndices::VTIME as usize] = 1;
}

pub fn get(fd: BorrowedFd<'_>) -> nix::Result<Termios> {
    termios::tcgetattr(fd)
}

pub fn set(fd: BorrowedFd<'_>, t: &Termios) -> nix::Result<()> {
    termios::tcsetattr(fd, SetArg::TCSAFLUSH, t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::pty::openpty;
    use std::os::fd::AsFd;

    #[test]
    fn raw_in_clears_expected_flags_and_sets_cs8() {
        let pty = openpty(None, None).expect("openpty");
        let mut t = get(pty.master.as_fd()).expect("tcgetattr");
        apply_raw_in(&mut t, false);
        assert!(!t.local_flags.contains(LocalFlags::ICANON));
        assert!(!t.local_flags.contains(LocalFlags::ECHO));
        assert!(!t.local_flags.contains(LocalFlags::ISIG));
        assert!(t.control_flags.contains(ControlFlags::CS8));
        assert_eq!(t.control_chars[SpecialCharacterIndices::VMIN as usize], 1);
        assert_eq!(t.control_chars[SpecialCharacterIndices::VTIME as usize], 0);
    }

    #[test]
    fn raw_in_preserves_echo_when_requested() {
        let pty = openpty(None, None).expect("openpty");
        let mut t = get(pty.master.as_fd()).expect("tcgetattr");
        apply_raw_in(&mut t, true);
        assert!(t.local_flags.contains(LocalFlags::ECHO));
    }

    #[test]
    fn raw_out_clears_opost() {
        let pty = openpty(None, None).expect("openpty");
        let mut t = get(pty.master.as_fd()).expect("tcgetattr");
        apply_raw_out(&mut t);
        assert!(!t.output_flags.contains(OutputFlags::OPOST));
    }
}
