//! Client side sequencing of one request: control connection first, the data
//! connection only once the server has taken the request in, and both closed
//! on every way out.

use std::net::TcpStream;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::console::Reporter;
use crate::error::{Error, Result};
use crate::files::{copy_name, digest_hex, Storage};
use crate::network;
use crate::protocol::{self, Command, FileStatus, Request, STATUS_ERROR_PREFIX};
use crate::transfer;

/// Pause used by legacy peers in place of the ready acknowledgment.
pub const LEGACY_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// How the client learns the server is listening on the data port. Both ends
/// must agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Wait for `Ready` (list) or `Found` (get) on the control connection.
    Acknowledged,
    /// Sleep and hope. Racy on slow links; only for peers that never send
    /// `Ready`.
    SettleDelay(Duration),
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub data_port: u16,
    pub sync: SyncMode,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Listed(Vec<String>),
    Received {
        path: PathBuf,
        bytes: usize,
        sha256: String,
    },
    NotFound(String),
}

/// The connections of one session. Dropping it closes whatever is still open.
struct Session<'a> {
    config: &'a SessionConfig,
    control: Option<TcpStream>,
    data: Option<TcpStream>,
}

impl<'a> Session<'a> {
    fn open(config: &'a SessionConfig) -> Result<Session<'a>> {
        let control = network::connect(&config.host, config.port)?;
        network::apply_timeout(&control, config.timeout)?;
        info!(host = %config.host, port = config.port, "control connection open");
        Ok(Session {
            config,
            control: Some(control),
            data: None,
        })
    }

    fn control(&mut self) -> Result<&mut TcpStream> {
        self.control
            .as_mut()
            .ok_or_else(|| Error::Protocol("control connection already closed".to_string()))
    }

    fn open_data(&mut self) -> Result<&mut TcpStream> {
        let stream = network::connect(&self.config.host, self.config.data_port)?;
        network::apply_timeout(&stream, self.config.timeout)?;
        info!(data_port = self.config.data_port, "data connection open");
        Ok(self.data.insert(stream))
    }

    fn settle(&self) {
        if let SyncMode::SettleDelay(delay) = self.config.sync {
            debug!(?delay, "waiting for server to listen");
            thread::sleep(delay);
        }
    }

    fn close_control(&mut self) {
        if let Some(stream) = self.control.take() {
            network::close(&stream, "control");
        }
    }

    fn close_data(&mut self) {
        if let Some(stream) = self.data.take() {
            network::close(&stream, "data");
        }
    }

    fn list(&mut self, reporter: &dyn Reporter) -> Result<Outcome> {
        let config = self.config;
        let request = Request {
            command: Command::ListDirectory,
            data_port: config.data_port,
        };
        protocol::make_request(self.control()?, &request)?;
        if config.sync == SyncMode::Acknowledged {
            protocol::await_ready(self.control()?)?;
        }
        self.settle();

        let data = self.open_data()?;
        reporter.report(&format!(
            "Receiving directory structure from {}: {}",
            config.host, config.data_port
        ));
        let names = transfer::recv_listing(data)?;
        for name in names.iter().filter(|n| !n.is_empty()) {
            reporter.report(name);
        }

        self.close_control();
        self.close_data();
        Ok(Outcome::Listed(names))
    }

    fn get(
        &mut self,
        filename: &str,
        reporter: &dyn Reporter,
        storage: &dyn Storage,
    ) -> Result<Outcome> {
        let request = Request {
            command: Command::GetFile(filename.to_string()),
            data_port: self.config.data_port,
        };
        let control = self.control()?;
        protocol::make_request(control, &request)?;
        protocol::send_filename(control, filename)?;

        match protocol::recv_status(control)? {
            FileStatus::NotFound(reason) => {
                reporter.report(&format!(
                    "{}:{} says {} {}",
                    self.config.host, self.config.port, STATUS_ERROR_PREFIX, reason
                ));
                self.close_control();
                Ok(Outcome::NotFound(reason))
            }
            FileStatus::Found => {
                reporter.report(&format!(
                    "Receiving \"{}\" from {}: {}",
                    filename, self.config.host, self.config.data_port
                ));
                self.settle();
                let body = transfer::recv_file(self.open_data()?)?;

                let target = destination_name(filename, reporter, storage);
                let path = storage.persist(&target, &body)?;
                let sha256 = digest_hex(&body);
                info!(path = %path.display(), bytes = body.len(), %sha256, "file received");
                reporter.report(&format!(
                    "File transfer complete. {} bytes, sha256 {}",
                    body.len(),
                    sha256
                ));

                self.close_control();
                self.close_data();
                Ok(Outcome::Received {
                    path,
                    bytes: body.len(),
                    sha256,
                })
            }
        }
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.close_control();
        self.close_data();
    }
}

fn destination_name(filename: &str, reporter: &dyn Reporter, storage: &dyn Storage) -> String {
    if !storage.exists(filename) {
        return filename.to_string();
    }
    if reporter.confirm_overwrite(filename) {
        reporter.report(&format!("File {} was overwritten", filename));
        filename.to_string()
    } else {
        let copy = copy_name(filename);
        reporter.report(&format!("File was saved as {}", copy));
        copy
    }
}

/// Runs one request to completion. A missing file is an [`Outcome`], not an
/// error; every error leaves both connections closed.
pub fn run(
    config: &SessionConfig,
    command: &Command,
    reporter: &dyn Reporter,
    storage: &dyn Storage,
) -> Result<Outcome> {
    let mut session = Session::open(config)?;
    match command {
        Command::ListDirectory => session.list(reporter),
        Command::GetFile(filename) => session.get(filename, reporter, storage),
    }
}
