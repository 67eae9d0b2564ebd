//! Where the user goes when the session cannot continue

pub trait Navigator: Send + Sync {
    /// Send the user to the unauthenticated entry point (sign-in)
    fn redirect_to_sign_in(&self);
}

/// Navigator for headless use: records the redirect in the log only
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn redirect_to_sign_in(&self) {
        tracing::warn!("Session ended; sign in again to continue");
    }
}
