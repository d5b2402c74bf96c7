//! Serving end: answers list and get requests for the regular files of one
//! directory. Each control connection gets its own thread and its own data
//! listener.

use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::files::{list_dir, read_served};
use crate::network;
use crate::protocol::{self, Command, FileStatus, NOT_FOUND_REASON};
use crate::session::SyncMode;
use crate::transfer;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Interface for both the control listener and the data listeners.
    pub bind: String,
    pub root: PathBuf,
    pub sync: SyncMode,
}

pub fn serve(config: ServerConfig) -> Result<()> {
    let listener = network::listen(&config.bind, config.port)?;
    info!(port = config.port, root = %config.root.display(), "server listening");
    serve_on(listener, Arc::new(config))
}

/// Accepts control connections forever.
pub fn serve_on(listener: TcpListener, config: Arc<ServerConfig>) -> Result<()> {
    for conn in listener.incoming() {
        match conn {
            Ok(stream) => {
                let config = Arc::clone(&config);
                thread::spawn(move || {
                    if let Err(e) = handle_control(stream, &config) {
                        error!(error = %e, "request failed");
                    }
                });
            }
            Err(e) => warn!(error = %e, "accept error"),
        }
    }
    Ok(())
}

/// Accepts and answers a single control connection on the calling thread.
pub fn serve_one(listener: &TcpListener, config: &ServerConfig) -> Result<()> {
    let (stream, _) = listener.accept()?;
    handle_control(stream, config)
}

fn handle_control(mut control: TcpStream, config: &ServerConfig) -> Result<()> {
    let peer = control
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    info!(%peer, "control connection opened");

    let result = answer(&mut control, config);
    // the client normally closes first
    network::close(&control, "control");
    result
}

fn answer(control: &mut TcpStream, config: &ServerConfig) -> Result<()> {
    let request = match protocol::read_request(control) {
        Ok(request) => request,
        Err(Error::Protocol(msg)) => {
            warn!(%msg, "rejecting request");
            return protocol::send_status(control, &FileStatus::NotFound(msg));
        }
        Err(e) => return Err(e),
    };

    match request.command {
        Command::ListDirectory => {
            info!(data_port = request.data_port, "list directory requested");
            let names = match list_dir(&config.root) {
                Ok(names) => names,
                Err(e) => {
                    refuse(control, &format!("cannot read directory: {}", e))?;
                    return Err(e.into());
                }
            };
            let listener = match network::listen(&config.bind, request.data_port) {
                Ok(listener) => listener,
                Err(e) => {
                    refuse(control, &e.to_string())?;
                    return Err(e);
                }
            };
            if config.sync == SyncMode::Acknowledged {
                protocol::send_ready(control)?;
            }
            let mut data = accept_data(&listener, request.data_port)?;
            transfer::send_listing(&mut data, &names)?;
            info!(entries = names.len(), "directory contents sent");
            network::close(&data, "data");
        }
        Command::GetFile(filename) => {
            info!(%filename, data_port = request.data_port, "file requested");
            let body = match read_served(&config.root, &filename)? {
                Some(body) => body,
                None => {
                    info!(%filename, "no such file");
                    let status = FileStatus::NotFound(NOT_FOUND_REASON.to_string());
                    return protocol::send_status(control, &status);
                }
            };
            let listener = match network::listen(&config.bind, request.data_port) {
                Ok(listener) => listener,
                Err(e) => {
                    refuse(control, &e.to_string())?;
                    return Err(e);
                }
            };
            protocol::send_status(control, &FileStatus::Found)?;
            let mut data = accept_data(&listener, request.data_port)?;
            transfer::send_file(&mut data, &body)?;
            info!(%filename, bytes = body.len(), "file sent");
            network::close(&data, "data");
        }
    }
    Ok(())
}

fn accept_data(listener: &TcpListener, data_port: u16) -> Result<TcpStream> {
    let (data, _) = listener.accept()?;
    info!(data_port, "data connection opened");
    Ok(data)
}

/// Tells the client the request cannot be served, in the slot where it
/// expects `Ready` or a status line.
fn refuse(control: &mut TcpStream, reason: &str) -> Result<()> {
    warn!(reason, "refusing request");
    protocol::send_status(control, &FileStatus::NotFound(reason.to_string()))
}
