//! Signal plumbing
//!
//! `SIGUSR1` is the interrupt signal. Its handler does nothing; delivery only
//! makes the blocked syscall on the target thread fail with `EINTR`. The
//! handler is installed without `SA_RESTART` so the call is not resumed.
//!
//! The process blocks the interrupt signal and the stop signals on the main
//! thread before spawning anything, so every thread inherits the mask. A
//! listener worker unblocks the interrupt signal for itself only.

use crate::error::{Result, TransportError};
use nix::sys::pthread::{pthread_kill, Pthread};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::sync::OnceLock;
use tracing::debug;

pub const INTERRUPT_SIGNAL: Signal = Signal::SIGUSR1;

/// Signals that request an orderly proxy shutdown
pub const STOP_SIGNALS: [Signal; 4] = [
    Signal::SIGINT,
    Signal::SIGHUP,
    Signal::SIGTERM,
    Signal::SIGQUIT,
];

/// Signals masked on every thread besides the stop set
const MASKED_SIGNALS: [Signal; 4] = [
    Signal::SIGALRM,
    Signal::SIGABRT,
    Signal::SIGUSR2,
    INTERRUPT_SIGNAL,
];

extern "C" fn on_interrupt(_signal: nix::libc::c_int) {}

static HANDLER: OnceLock<std::result::Result<(), nix::Error>> = OnceLock::new();

/// Installs the no-op interrupt handler once per process.
pub fn install_interrupt_handler() -> Result<()> {
    let outcome = HANDLER.get_or_init(|| {
        let action = SigAction::new(
            SigHandler::Handler(on_interrupt),
            SaFlags::empty(),
            SigSet::empty(),
        );
        // SAFETY: the handler performs no work at all, so it is async-signal-safe.
        unsafe { sigaction(INTERRUPT_SIGNAL, &action) }.map(|_| {
            debug!("Installed {:?} interrupt handler", INTERRUPT_SIGNAL);
        })
    });
    outcome
        .as_ref()
        .map(|_| ())
        .map_err(|e| TransportError::signal("install interrupt handler", *e))
}

fn stop_set() -> SigSet {
    let mut set = SigSet::empty();
    for signal in STOP_SIGNALS {
        set.add(signal);
    }
    set
}

/// Blocks the stop signals and the interrupt signal on the calling thread.
///
/// Call from `main` before spawning any thread. Returns the stop set for
/// [`wait_for_stop_signal`].
pub fn block_stop_signals() -> Result<SigSet> {
    let stops = stop_set();
    let mut all = stops;
    for signal in MASKED_SIGNALS {
        all.add(signal);
    }
    all.thread_block()
        .map_err(|e| TransportError::signal("block stop signals", e))?;
    Ok(stops)
}

/// Waits for one of the stop signals blocked by [`block_stop_signals`].
pub fn wait_for_stop_signal(stops: &SigSet) -> Result<Signal> {
    stops
        .wait()
        .map_err(|e| TransportError::signal("wait for stop signal", e))
}

/// Lets the interrupt signal reach the calling thread.
pub fn unblock_interrupt_for_current_thread() -> Result<()> {
    let mut set = SigSet::empty();
    set.add(INTERRUPT_SIGNAL);
    set.thread_unblock()
        .map_err(|e| TransportError::signal("unblock interrupt signal", e))
}

/// Delivers the interrupt signal to one thread.
pub fn interrupt_thread(thread: Pthread) -> Result<()> {
    pthread_kill(thread, INTERRUPT_SIGNAL)
        .map_err(|e| TransportError::signal("deliver interrupt", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_install_is_idempotent() {
        install_interrupt_handler().unwrap();
        install_interrupt_handler().unwrap();
    }

    #[test]
    fn stop_set_contains_termination_signals() {
        let set = stop_set();
        assert!(set.contains(Signal::SIGTERM));
        assert!(set.contains(Signal::SIGINT));
        assert!(!set.contains(INTERRUPT_SIGNAL));
    }
}
