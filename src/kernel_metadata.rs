use nix::sys::signal::Signal;
use std::convert::TryFrom;

/// Name of a signal the way the kernel headers spell it. Signals outside
/// the portable set (realtime signals and anything the platform does not
/// define) fall back to the raw number.
pub fn signal_name(sig: i32) -> String {
    match Signal::try_from(sig) {
        Ok(sig) => sig.as_str().into(),
        Err(_) => sig.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_signals() {
        assert_eq!(signal_name(libc::SIGTRAP), "SIGTRAP");
        assert_eq!(signal_name(libc::SIGSEGV), "SIGSEGV");
        assert_eq!(signal_name(libc::SIGSYS), "SIGSYS");
    }

    #[test]
    fn unknown_signals_fall_back_to_the_number() {
        assert_eq!(signal_name(0), "0");
        assert_eq!(signal_name(63), "63");
    }
}
