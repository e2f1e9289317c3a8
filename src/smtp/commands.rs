//! Implementation of SMTP commands

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::smtp::address::{Address, PathKind};
use crate::smtp::config::ServerConfig;
use crate::smtp::error::SmtpError;
use crate::smtp::parser::{Command, Verb};
use crate::smtp::response::Reply;
use crate::smtp::session::SmtpSession;
use crate::smtp::storage::Storage;

/// What the transport should do after a command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send nothing (blank line, or the session is already closed)
    None,
    /// Send the reply and wait for the next command
    Reply(Reply),
    /// Send the reply, read a dot-terminated body and pass it to
    /// [`SmtpCommandHandler::finish_data`]
    ReadBody(Reply),
    /// Send the reply and close the connection
    Close(Reply),
}

impl Action {
    /// The reply to send, if any
    pub fn reply(&self) -> Option<&Reply> {
        match self {
            Action::None => None,
            Action::Reply(reply) | Action::ReadBody(reply) | Action::Close(reply) => Some(reply),
        }
    }
}

/// Dispatches commands against a session and produces replies.
///
/// Holds no per-connection state, so one handler serves every session of a
/// listener.
#[derive(Clone)]
pub struct SmtpCommandHandler {
    config: Arc<ServerConfig>,
    storage: Arc<dyn Storage>,
}

impl SmtpCommandHandler {
    /// Create a new command handler
    pub fn new(config: Arc<ServerConfig>, storage: Arc<dyn Storage>) -> Self {
        Self { config, storage }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Reply sent once when a client connects
    pub fn greeting(&self) -> Reply {
        Reply::greeting(&self.config.hostname)
    }

    /// Process a command line (without its line terminator)
    pub fn process_command(&self, line: &str, session: &mut SmtpSession) -> Action {
        if session.closed {
            return Action::None;
        }
        let Some(command) = Command::parse(line) else {
            return Action::None;
        };

        debug!(verb = command.verb.as_str(), args = command.args.len(), "command");
        session.mark_started();

        let result = match command.verb {
            Verb::Ehlo => Ok(self.handle_ehlo(session)),
            Verb::Helo => Ok(self.handle_helo(session)),
            Verb::Mail => self.handle_mail(&command.args, session),
            Verb::Rcpt => self.handle_rcpt(&command.args, session),
            Verb::Data => self.handle_data(session),
            Verb::Rset => Ok(self.handle_rset(session)),
            Verb::Noop => Ok(Action::Reply(Reply::new(250, "noop ok"))),
            Verb::Quit => Ok(self.handle_quit(session)),
            Verb::Unknown(_) => return self.handle_unknown(session),
        };
        session.error_count = 0;

        result.unwrap_or_else(|e| {
            debug!(error = %e, "command rejected");
            Action::Reply(e.reply())
        })
    }

    /// Store a decoded body for the transaction in progress.
    ///
    /// A storage failure leaves sender and recipients in place so the client
    /// can retry DATA or reset.
    pub fn finish_data(&self, body: &[u8], session: &mut SmtpSession) -> Reply {
        session.set_in_transfer(false);

        let id = Uuid::new_v4().to_string();
        match self.storage.put(&id, body) {
            Ok(()) => {
                info!(
                    id = %id,
                    size = body.len(),
                    recipients = session.recipients.len(),
                    "message stored"
                );
                if self.config.reset_after_data {
                    session.reset();
                }
                Reply::new(250, "data ok")
            }
            Err(e) => {
                warn!(id = %id, error = %e, "failed to store message");
                SmtpError::from(e).reply()
            }
        }
    }

    /// Handle EHLO command
    fn handle_ehlo(&self, session: &mut SmtpSession) -> Action {
        session.reset();
        Action::Reply(Reply::ehlo(&self.config.hostname, &self.config.extensions))
    }

    /// Handle HELO command
    fn handle_helo(&self, session: &mut SmtpSession) -> Action {
        session.reset();
        Action::Reply(Reply::helo(&self.config.hostname))
    }

    /// Handle MAIL command
    fn handle_mail(
        &self,
        args: &[String],
        session: &mut SmtpSession,
    ) -> Result<Action, SmtpError> {
        let param = single_param(args, PathKind::Reverse)?;
        let sender = Address::parse_param(param, PathKind::Reverse)?;
        session.set_sender(sender);
        Ok(Action::Reply(Reply::new(250, "sender ok")))
    }

    /// Handle RCPT command
    fn handle_rcpt(
        &self,
        args: &[String],
        session: &mut SmtpSession,
    ) -> Result<Action, SmtpError> {
        if self.config.require_sender && session.sender.is_none() {
            return Err(SmtpError::NoSender);
        }

        let param = single_param(args, PathKind::Forward)?;
        let recipient = Address::parse_param(param, PathKind::Forward)?;
        session.add_recipient(recipient);
        Ok(Action::Reply(Reply::new(250, "rcpt ok")))
    }

    /// Handle DATA command
    fn handle_data(&self, session: &mut SmtpSession) -> Result<Action, SmtpError> {
        if session.recipients.is_empty() {
            return Err(SmtpError::NoRecipients);
        }

        session.set_in_transfer(true);
        Ok(Action::ReadBody(Reply::data_start()))
    }

    /// Handle RSET command
    fn handle_rset(&self, session: &mut SmtpSession) -> Action {
        session.reset();
        Action::Reply(Reply::new(250, "rset ok"))
    }

    /// Handle QUIT command
    fn handle_quit(&self, session: &mut SmtpSession) -> Action {
        session.close();
        Action::Close(Reply::quit())
    }

    /// Unrecognized verbs count towards the error limit; past it the session
    /// is closed as if the client had sent QUIT.
    fn handle_unknown(&self, session: &mut SmtpSession) -> Action {
        if session.record_error(self.config.max_errors) {
            info!(errors = session.error_count, "too many invalid commands, closing");
            return self.handle_quit(session);
        }
        Action::Reply(SmtpError::InvalidCommand.reply())
    }
}

/// MAIL and RCPT take exactly one `KEYWORD:<address>` parameter
fn single_param(args: &[String], kind: PathKind) -> Result<&str, SmtpError> {
    match args {
        [param] => Ok(param.as_str()),
        [] => Err(SmtpError::MissingParameter {
            keyword: kind.label(),
        }),
        _ => Err(SmtpError::MalformedParameter {
            keyword: kind.label(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smtp::session::SmtpState;
    use crate::smtp::storage::{MemoryStorage, StorageError};

    struct FailingStorage;

    impl Storage for FailingStorage {
        fn put(&self, _name: &str, _content: &[u8]) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("offline".to_owned()))
        }
    }

    fn create_handler() -> (SmtpCommandHandler, Arc<MemoryStorage>) {
        create_handler_with(ServerConfig::new("test.local"))
    }

    fn create_handler_with(config: ServerConfig) -> (SmtpCommandHandler, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let handler = SmtpCommandHandler::new(Arc::new(config), storage.clone());
        (handler, storage)
    }

    fn reply(handler: &SmtpCommandHandler, line: &str, session: &mut SmtpSession) -> String {
        handler
            .process_command(line, session)
            .reply()
            .map(Reply::format)
            .unwrap_or_default()
    }

    fn ready_for_data(handler: &SmtpCommandHandler, session: &mut SmtpSession) {
        reply(handler, "MAIL FROM:<a@b.com>", session);
        reply(handler, "RCPT TO:<c@d.com>", session);
    }

    #[test]
    fn test_greeting() {
        let (handler, _) = create_handler();
        assert_eq!(
            handler.greeting().format(),
            "220 test.local ESMTP service ready\r\n"
        );
    }

    #[test]
    fn test_ehlo_command() {
        let (handler, _) = create_handler();
        let mut session = SmtpSession::new();

        assert_eq!(
            reply(&handler, "EHLO example.com", &mut session),
            "250-test.local\r\n250-STARTTLS\r\n250 SIZE 10000000\r\n"
        );
        assert_eq!(session.state(), SmtpState::Ready);
    }

    #[test]
    fn test_helo_command() {
        let (handler, _) = create_handler();
        let mut session = SmtpSession::new();

        assert_eq!(reply(&handler, "HELO", &mut session), "250 test.local\r\n");
    }

    #[test]
    fn test_greetings_and_rset_clear_transaction() {
        let (handler, _) = create_handler();

        for verb in ["EHLO x", "HELO x", "RSET"] {
            let mut session = SmtpSession::new();
            ready_for_data(&handler, &mut session);
            assert_eq!(session.state(), SmtpState::HaveRecipients);

            let response = reply(&handler, verb, &mut session);
            assert!(response.starts_with("250"), "{verb}: {response}");
            assert!(session.sender.is_none());
            assert!(session.recipients.is_empty());
        }
    }

    #[test]
    fn test_mail_command() {
        let (handler, _) = create_handler();
        let mut session = SmtpSession::new();

        assert_eq!(
            reply(&handler, "MAIL FROM:<sender@example.com>", &mut session),
            "250 sender ok\r\n"
        );
        assert_eq!(session.sender.as_ref().unwrap().to_string(), "<sender@example.com>");
    }

    #[test]
    fn test_mail_clears_recipients() {
        let (handler, _) = create_handler();
        let mut session = SmtpSession::new();

        ready_for_data(&handler, &mut session);
        reply(&handler, "MAIL FROM:<other@b.com>", &mut session);
        assert!(session.recipients.is_empty());
    }

    #[test]
    fn test_mail_null_sender() {
        let (handler, _) = create_handler();
        let mut session = SmtpSession::new();

        assert_eq!(
            reply(&handler, "MAIL FROM:<>", &mut session),
            "250 sender ok\r\n"
        );
        assert!(!session.has_concrete_sender());

        reply(&handler, "RSET", &mut session);
        assert!(session.sender.is_none());
    }

    #[test]
    fn test_mail_errors() {
        let (handler, _) = create_handler();
        let mut session = SmtpSession::new();

        assert_eq!(reply(&handler, "MAIL", &mut session), "500 missing from\r\n");
        assert_eq!(
            reply(&handler, "MAIL sender@example.com", &mut session),
            "500 invalid from\r\n"
        );
        assert_eq!(
            reply(&handler, "MAIL TO:<sender@example.com>", &mut session),
            "500 invalid from\r\n"
        );
        assert_eq!(
            reply(&handler, "MAIL FROM:<a@b.com> SIZE=100", &mut session),
            "500 invalid from\r\n"
        );
        assert_eq!(
            reply(&handler, "MAIL FROM:<nobody>", &mut session),
            "500 invalid address\r\n"
        );
        assert!(session.sender.is_none());
    }

    #[test]
    fn test_rcpt_command() {
        let (handler, _) = create_handler();
        let mut session = SmtpSession::new();

        reply(&handler, "MAIL FROM:<sender@example.com>", &mut session);
        assert_eq!(
            reply(&handler, "RCPT TO:<recipient@example.com>", &mut session),
            "250 rcpt ok\r\n"
        );
        assert_eq!(session.recipients.len(), 1);
        assert_eq!(session.state(), SmtpState::HaveRecipients);
    }

    #[test]
    fn test_rcpt_without_mail_is_accepted_by_default() {
        let (handler, _) = create_handler();
        let mut session = SmtpSession::new();

        assert_eq!(
            reply(&handler, "RCPT TO:<recipient@example.com>", &mut session),
            "250 rcpt ok\r\n"
        );
    }

    #[test]
    fn test_rcpt_without_mail_when_sender_required() {
        let (handler, _) =
            create_handler_with(ServerConfig::new("test.local").with_require_sender(true));
        let mut session = SmtpSession::new();

        assert_eq!(
            reply(&handler, "RCPT TO:<recipient@example.com>", &mut session),
            "500 no sender\r\n"
        );
        assert!(session.recipients.is_empty());

        reply(&handler, "MAIL FROM:<>", &mut session);
        assert_eq!(
            reply(&handler, "RCPT TO:<recipient@example.com>", &mut session),
            "250 rcpt ok\r\n"
        );
    }

    #[test]
    fn test_rcpt_errors_leave_recipients_unchanged() {
        let (handler, _) = create_handler();
        let mut session = SmtpSession::new();
        ready_for_data(&handler, &mut session);

        assert_eq!(reply(&handler, "RCPT", &mut session), "500 missing to\r\n");
        assert_eq!(
            reply(&handler, "RCPT FROM:<x@y.com>", &mut session),
            "500 invalid to\r\n"
        );
        assert_eq!(
            reply(&handler, "RCPT TO:<not-an-address>", &mut session),
            "500 invalid address\r\n"
        );
        assert_eq!(
            reply(&handler, "RCPT TO:<>", &mut session),
            "500 invalid address\r\n"
        );
        assert_eq!(session.recipients.len(), 1);
    }

    #[test]
    fn test_data_command() {
        let (handler, _) = create_handler();
        let mut session = SmtpSession::new();
        ready_for_data(&handler, &mut session);

        let action = handler.process_command("DATA", &mut session);
        assert_eq!(action, Action::ReadBody(Reply::data_start()));
        assert_eq!(session.state(), SmtpState::InTransfer);
    }

    #[test]
    fn test_data_without_recipients() {
        let (handler, storage) = create_handler();
        let mut session = SmtpSession::new();
        reply(&handler, "MAIL FROM:<a@b.com>", &mut session);

        let action = handler.process_command("DATA", &mut session);
        assert_eq!(action, Action::Reply(Reply::new(500, "no recipients")));
        assert!(storage.is_empty());
    }

    #[test]
    fn test_finish_data_stores_message() {
        let (handler, storage) = create_handler();
        let mut session = SmtpSession::new();
        ready_for_data(&handler, &mut session);
        handler.process_command("DATA", &mut session);

        let response = handler.finish_data(b"Hello.\r\n", &mut session);
        assert_eq!(response.format(), "250 data ok\r\n");
        assert_eq!(storage.len(), 1);

        // The transaction is kept unless reset_after_data is set
        assert_eq!(session.state(), SmtpState::HaveRecipients);
    }

    #[test]
    fn test_finish_data_with_reset_after_data() {
        let (handler, _) =
            create_handler_with(ServerConfig::new("test.local").with_reset_after_data(true));
        let mut session = SmtpSession::new();
        ready_for_data(&handler, &mut session);
        handler.process_command("DATA", &mut session);

        handler.finish_data(b"Hello.\r\n", &mut session);
        assert_eq!(session.state(), SmtpState::Ready);
    }

    #[test]
    fn test_finish_data_storage_failure_keeps_transaction() {
        let handler = SmtpCommandHandler::new(
            Arc::new(ServerConfig::new("test.local")),
            Arc::new(FailingStorage),
        );
        let mut session = SmtpSession::new();
        ready_for_data(&handler, &mut session);
        handler.process_command("DATA", &mut session);

        let response = handler.finish_data(b"Hello.\r\n", &mut session);
        assert_eq!(response.format(), "500 failed to store message\r\n");
        assert!(session.sender.is_some());
        assert_eq!(session.recipients.len(), 1);
    }

    #[test]
    fn test_noop_command() {
        let (handler, _) = create_handler();
        let mut session = SmtpSession::new();

        assert_eq!(reply(&handler, "noop", &mut session), "250 noop ok\r\n");
    }

    #[test]
    fn test_quit_command() {
        let (handler, _) = create_handler();
        let mut session = SmtpSession::new();

        let action = handler.process_command("QUIT", &mut session);
        assert_eq!(action, Action::Close(Reply::quit()));
        assert!(session.closed);

        // Nothing is processed once closed
        assert_eq!(handler.process_command("NOOP", &mut session), Action::None);
    }

    #[test]
    fn test_blank_line_is_ignored() {
        let (handler, _) = create_handler();
        let mut session = SmtpSession::new();

        assert_eq!(handler.process_command("", &mut session), Action::None);
        assert_eq!(handler.process_command("  ", &mut session), Action::None);
        assert_eq!(session.state(), SmtpState::Start);
    }

    #[test]
    fn test_too_many_invalid_commands() {
        let (handler, _) = create_handler();
        let mut session = SmtpSession::new();

        assert_eq!(reply(&handler, "ERROR", &mut session), "500 invalid command\r\n");
        assert_eq!(reply(&handler, "ERROR", &mut session), "500 invalid command\r\n");

        let action = handler.process_command("ERROR", &mut session);
        assert_eq!(action, Action::Close(Reply::quit()));
        assert!(session.closed);
    }

    #[test]
    fn test_valid_command_resets_error_count() {
        let (handler, _) = create_handler();
        let mut session = SmtpSession::new();

        reply(&handler, "ERROR", &mut session);
        reply(&handler, "ERROR", &mut session);
        reply(&handler, "NOOP", &mut session);
        assert_eq!(session.error_count, 0);

        assert_eq!(reply(&handler, "ERROR", &mut session), "500 invalid command\r\n");
        assert!(!session.closed);
    }
}
