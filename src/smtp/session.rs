//! SMTP session state management

use crate::smtp::address::Address;

/// Where a session is in the mail transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpState {
    /// Greeting sent, no command dispatched yet
    Start,
    /// No transaction in progress
    Ready,
    /// MAIL FROM accepted
    HaveSender,
    /// At least one RCPT TO accepted
    HaveRecipients,
    /// DATA accepted, body being received
    InTransfer,
}

/// Transaction state for a single connection
#[derive(Debug, Default)]
pub struct SmtpSession {
    /// Reverse-path from MAIL FROM; `Some(Address::Null)` for `<>`
    pub sender: Option<Address>,
    /// Forward-paths in the order they were accepted, duplicates included
    pub recipients: Vec<Address>,
    /// Unrecognized commands received in a row
    pub error_count: u32,
    /// Set by QUIT or the error limit; nothing is processed afterwards
    pub closed: bool,
    started: bool,
    in_transfer: bool,
}

impl SmtpSession {
    /// Create a new SMTP session
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current state
    pub fn state(&self) -> SmtpState {
        if self.in_transfer {
            SmtpState::InTransfer
        } else if !self.recipients.is_empty() {
            SmtpState::HaveRecipients
        } else if self.sender.is_some() {
            SmtpState::HaveSender
        } else if self.started {
            SmtpState::Ready
        } else {
            SmtpState::Start
        }
    }

    /// Clear sender and recipients together
    pub fn reset(&mut self) {
        self.sender = None;
        self.recipients.clear();
        self.in_transfer = false;
    }

    /// Begin a new transaction with `sender`
    pub fn set_sender(&mut self, sender: Address) {
        self.recipients.clear();
        self.sender = Some(sender);
    }

    /// Add a recipient
    pub fn add_recipient(&mut self, recipient: Address) {
        self.recipients.push(recipient);
    }

    /// Whether a concrete (non-null) sender is set
    pub fn has_concrete_sender(&self) -> bool {
        matches!(&self.sender, Some(Address::Mailbox(_)))
    }

    /// Mark the session as closed
    pub fn close(&mut self) {
        self.closed = true;
        self.in_transfer = false;
    }

    pub(crate) fn mark_started(&mut self) {
        self.started = true;
    }

    pub(crate) fn set_in_transfer(&mut self, in_transfer: bool) {
        self.in_transfer = in_transfer;
    }

    /// Count an unrecognized command and report whether `max` is exceeded
    pub(crate) fn record_error(&mut self, max: u32) -> bool {
        self.error_count = self.error_count.saturating_add(1);
        self.error_count > max
    }
}
