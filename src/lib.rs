//! A two-connection file transfer protocol: requests and status lines travel
//! on a long-lived control connection, each listing or file body on its own
//! single-use data connection.

pub mod cmd;
pub mod console;
pub mod error;
pub mod files;
pub mod frame;
pub mod logging;
pub mod network;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transfer;

pub use error::{Error, FrameError, Result};
pub use protocol::{Command, FileStatus};
pub use session::{Outcome, SessionConfig, SyncMode};
