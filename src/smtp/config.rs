//! Listener configuration

use std::time::Duration;

/// Default `SIZE` advertised in the EHLO reply
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 10_000_000;

/// Default per-line idle timeout
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Unrecognized commands tolerated in a row before the session is closed
pub const DEFAULT_MAX_ERRORS: u32 = 2;

/// Immutable settings shared by every session of one listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host identity used in the greeting and HELO/EHLO replies
    pub hostname: String,
    /// Extension names listed after the host in the EHLO reply
    pub extensions: Vec<String>,
    /// Idle timeout for every line read and every write on a connection
    pub idle_timeout: Duration,
    /// The session closes once this many unrecognized commands in a row
    /// have been exceeded
    pub max_errors: u32,
    /// Reject RCPT until MAIL has been accepted
    pub require_sender: bool,
    /// Clear sender and recipients after a message is stored
    pub reset_after_data: bool,
}

impl ServerConfig {
    /// Configuration with the default extensions (`STARTTLS`, `SIZE`)
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_owned(),
            extensions: default_extensions(DEFAULT_MAX_MESSAGE_SIZE),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_errors: DEFAULT_MAX_ERRORS,
            require_sender: false,
            reset_after_data: false,
        }
    }

    /// Advertise `size` in the `SIZE` extension
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.extensions = default_extensions(size);
        self
    }

    /// Set the per-line idle timeout; zero disables it
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set how many unrecognized commands in a row are tolerated
    pub fn with_max_errors(mut self, max_errors: u32) -> Self {
        self.max_errors = max_errors;
        self
    }

    /// Reject RCPT before MAIL
    pub fn with_require_sender(mut self, require: bool) -> Self {
        self.require_sender = require;
        self
    }

    /// Clear the transaction after each stored message
    pub fn with_reset_after_data(mut self, reset: bool) -> Self {
        self.reset_after_data = reset;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("localhost")
    }
}

fn default_extensions(size: usize) -> Vec<String> {
    vec!["STARTTLS".to_owned(), format!("SIZE {size}")]
}
