//! # smtp-intake
//!
//! An inbound SMTP server that accepts mail transactions and hands each
//! finished message to a pluggable [`Storage`] backend.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smtp_intake::{ChannelStorage, ServerConfig, SmtpServer};
//! use std::sync::Arc;
//! use std::thread;
//! use std::time::Duration;
//!
//! let (storage, rx) = ChannelStorage::new();
//! let server = SmtpServer::new(ServerConfig::new("mx.example.com"), Arc::new(storage));
//!
//! thread::spawn(move || {
//!     server.start("127.0.0.1:2525").unwrap();
//! });
//!
//! // Application sends email to localhost:2525
//! // ...
//!
//! if let Ok(message) = rx.recv_timeout(Duration::from_millis(100)) {
//!     println!("Stored {} ({} bytes)", message.name, message.content.len());
//! }
//! ```
//!
//! ## Supported SMTP commands
//!
//! - `EHLO` / `HELO` - Identify the client and reset the transaction
//! - `MAIL FROM` - Specify the sender (`<>` is accepted)
//! - `RCPT TO` - Add a recipient
//! - `DATA` - Send the dot-terminated message body
//! - `RSET` - Reset the current transaction
//! - `NOOP` - Do nothing
//! - `QUIT` - Close the connection
//!
//! `STARTTLS` and `SIZE` are advertised in the EHLO reply, but neither
//! encryption nor the size limit is applied.
//!
//! ## Notes
//!
//! - Each message is stored under a freshly generated UUID.
//! - Storage failures are reported to the client and never retried.
//! - Relaying, queuing and authentication are not supported.
//! - The session closes after too many unrecognized commands in a row.

mod smtp;

pub use smtp::{
    Action, Address, ChannelStorage, Command, DirectoryStorage, Mailbox, MemoryStorage, PathKind,
    Reply, ServerConfig, SmtpCommandHandler, SmtpError, SmtpServer, SmtpSession, SmtpState,
    Storage, StorageError, StoredMessage, Verb,
};
pub use smtp::{config, dot};
