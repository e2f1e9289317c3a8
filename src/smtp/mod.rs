//! SMTP server implementation

pub mod address;
pub mod commands;
pub mod config;
pub mod dot;
pub mod error;
pub mod parser;
pub mod response;
pub mod server;
pub mod session;
pub mod storage;

pub use address::{Address, Mailbox, PathKind};
pub use commands::{Action, SmtpCommandHandler};
pub use config::ServerConfig;
pub use error::SmtpError;
pub use parser::{Command, Verb};
pub use response::Reply;
pub use server::SmtpServer;
pub use session::{SmtpSession, SmtpState};
pub use storage::{
    ChannelStorage, DirectoryStorage, MemoryStorage, Storage, StorageError, StoredMessage,
};
