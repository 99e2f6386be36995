//! Interrupt Handling
//!
//! Maps SIGINT/SIGTERM onto the runner's running flag. The handler performs
//! a single atomic store; logging and shutdown happen on the consumer thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Interrupt handler installation error.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// A handler is already installed in this process.
    #[error("an interrupt handler is already installed")]
    AlreadyInstalled,
    /// The platform refused the handler.
    #[error("failed to install interrupt handler: {0}")]
    Install(#[source] ctrlc::Error),
}

impl From<ctrlc::Error> for SignalError {
    fn from(e: ctrlc::Error) -> Self {
        match e {
            ctrlc::Error::MultipleHandlers => Self::AlreadyInstalled,
            other => Self::Install(other),
        }
    }
}

/// Clear `running` when the process is interrupted.
///
/// # Errors
///
/// Returns [`SignalError::AlreadyInstalled`] on a second call in the same
/// process.
pub fn install_interrupt_flag(running: &Arc<AtomicBool>) -> Result<(), SignalError> {
    let running = Arc::clone(running);
    ctrlc::set_handler(move || running.store(false, Ordering::Release))?;
    Ok(())
}
