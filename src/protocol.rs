//! Control connection messages, for both the requesting and the serving end.
//!
//! A request is the framed command string (`"-l\0"` or `"-g\0"`) followed by
//! the data port as a fixed int. A get request then carries the filename
//! length as a fixed int and the framed, NUL-terminated filename. The server
//! answers a get with one framed status line, and in acknowledged mode tells
//! the client the data listener is up with a framed `Ready`.

use std::io::{Read, Write};

use tracing::debug;

use crate::error::{Error, FrameError, Result};
use crate::frame::{recv_fixed_int, recv_framed, send_fixed_int, send_framed};

/// Ports a client may name, for the control and the data connection alike.
pub const MIN_PORT: u16 = 1024;
pub const MAX_PORT: u16 = 65535;

pub const CMD_LIST: &str = "-l";
pub const CMD_GET: &str = "-g";

pub const STATUS_FOUND: &str = "Found";
/// Older servers answer with this instead of [`STATUS_FOUND`].
pub const STATUS_FOUND_LEGACY: &str = "File found";
pub const STATUS_ERROR_PREFIX: &str = "Error:";
pub const READY: &str = "Ready";

pub const NOT_FOUND_REASON: &str = "The requested file was not found in the directory";
pub const INVALID_COMMAND_REASON: &str =
    "Invalid command entered: use -l to list directory files or -g to get a file";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ListDirectory,
    GetFile(String),
}

impl Command {
    pub fn flag(&self) -> &'static str {
        match self {
            Command::ListDirectory => CMD_LIST,
            Command::GetFile(_) => CMD_GET,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub command: Command,
    pub data_port: u16,
}

/// Server verdict on a get request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Found,
    NotFound(String),
}

/// A message that knows its own wire layout on the control connection.
pub trait Shovable: Sized {
    fn shove<W: Write>(&self, conn: &mut W) -> std::result::Result<(), FrameError>;
    fn pull<R: Read>(conn: &mut R) -> std::result::Result<Self, FrameError>;
}

/// The bare command frame; which of `-l` / `-g` was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    List,
    Get,
}

impl Shovable for Verb {
    fn shove<W: Write>(&self, conn: &mut W) -> std::result::Result<(), FrameError> {
        let flag = match self {
            Verb::List => CMD_LIST,
            Verb::Get => CMD_GET,
        };
        send_framed(conn, &nul_terminated(flag))
    }

    fn pull<R: Read>(conn: &mut R) -> std::result::Result<Self, FrameError> {
        let text = decode_text(&recv_framed(conn)?)?;
        match text.as_str() {
            CMD_LIST => Ok(Verb::List),
            CMD_GET => Ok(Verb::Get),
            other => Err(FrameError::Malformed(format!("unknown command {:?}", other))),
        }
    }
}

/// Filename length as a fixed int, then the framed name with its NUL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filename(pub String);

impl Shovable for Filename {
    fn shove<W: Write>(&self, conn: &mut W) -> std::result::Result<(), FrameError> {
        let len = i32::try_from(self.0.len())
            .map_err(|_| FrameError::Malformed("filename too long".to_string()))?;
        send_fixed_int(conn, len)?;
        send_framed(conn, &nul_terminated(&self.0))
    }

    fn pull<R: Read>(conn: &mut R) -> std::result::Result<Self, FrameError> {
        let declared = recv_fixed_int(conn)?;
        let declared = usize::try_from(declared)
            .map_err(|_| FrameError::Malformed(format!("negative filename length {}", declared)))?;
        let raw = recv_framed(conn)?;
        if raw.len() != declared + 1 || raw.last() != Some(&0) {
            return Err(FrameError::Malformed(format!(
                "filename frame of {} bytes does not match declared length {}",
                raw.len(),
                declared
            )));
        }
        Ok(Filename(decode_text(&raw)?))
    }
}

impl Shovable for FileStatus {
    fn shove<W: Write>(&self, conn: &mut W) -> std::result::Result<(), FrameError> {
        let line = match self {
            FileStatus::Found => STATUS_FOUND.to_string(),
            FileStatus::NotFound(reason) => format!("{} {}", STATUS_ERROR_PREFIX, reason),
        };
        send_framed(conn, line.as_bytes())
    }

    fn pull<R: Read>(conn: &mut R) -> std::result::Result<Self, FrameError> {
        let text = decode_text(&recv_framed(conn)?)?;
        parse_status(&text)
    }
}

fn parse_status(text: &str) -> std::result::Result<FileStatus, FrameError> {
    if text == STATUS_FOUND || text == STATUS_FOUND_LEGACY {
        return Ok(FileStatus::Found);
    }
    match text.strip_prefix(STATUS_ERROR_PREFIX) {
        Some(reason) => Ok(FileStatus::NotFound(reason.trim().to_string())),
        None => Err(FrameError::Malformed(format!("unexpected status {:?}", text))),
    }
}

/// Client side: command frame then data port.
pub fn make_request<W: Write>(conn: &mut W, request: &Request) -> Result<()> {
    let verb = match request.command {
        Command::ListDirectory => Verb::List,
        Command::GetFile(_) => Verb::Get,
    };
    verb.shove(conn)?;
    send_fixed_int(conn, i32::from(request.data_port))?;
    debug!(command = request.command.flag(), data_port = request.data_port, "request sent");
    Ok(())
}

pub fn send_filename<W: Write>(conn: &mut W, filename: &str) -> Result<()> {
    if filename.is_empty() || filename.contains('\0') {
        return Err(Error::Usage(format!("invalid filename {:?}", filename)));
    }
    Filename(filename.to_string()).shove(conn)?;
    debug!(filename, "filename sent");
    Ok(())
}

pub fn recv_status<R: Read>(conn: &mut R) -> Result<FileStatus> {
    let status = FileStatus::pull(conn)?;
    debug!(?status, "status received");
    Ok(status)
}

pub fn await_ready<R: Read>(conn: &mut R) -> Result<()> {
    let text = decode_text(&recv_framed(conn)?)?;
    if text == READY {
        return Ok(());
    }
    // a server that rejects the request says so where Ready would be
    match text.strip_prefix(STATUS_ERROR_PREFIX) {
        Some(reason) => Err(Error::Protocol(reason.trim().to_string())),
        None => Err(Error::Protocol(format!("expected {}, got {:?}", READY, text))),
    }
}

/// Server side: reads a whole request. An unrecognised command surfaces as
/// [`Error::Protocol`] so the caller can answer it on the same connection.
pub fn read_request<R: Read>(conn: &mut R) -> Result<Request> {
    let verb = match Verb::pull(conn) {
        Ok(verb) => verb,
        Err(FrameError::Malformed(msg)) => {
            debug!(%msg, "unknown command");
            return Err(Error::Protocol(INVALID_COMMAND_REASON.to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    let port = recv_fixed_int(conn)?;
    let data_port = u16::try_from(port)
        .ok()
        .filter(|p| (MIN_PORT..=MAX_PORT).contains(p))
        .ok_or_else(|| Error::Protocol(format!("invalid data port {}", port)))?;
    let command = match verb {
        Verb::List => Command::ListDirectory,
        Verb::Get => Command::GetFile(Filename::pull(conn)?.0),
    };
    Ok(Request { command, data_port })
}

pub fn send_status<W: Write>(conn: &mut W, status: &FileStatus) -> Result<()> {
    status.shove(conn)?;
    Ok(())
}

pub fn send_ready<W: Write>(conn: &mut W) -> Result<()> {
    send_framed(conn, READY.as_bytes())?;
    Ok(())
}

fn nul_terminated(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len() + 1);
    bytes.extend_from_slice(text.as_bytes());
    bytes.push(0);
    bytes
}

/// UTF-8 text, minus one trailing NUL if present.
pub fn decode_text(raw: &[u8]) -> std::result::Result<String, FrameError> {
    let raw = raw.strip_suffix(&[0u8]).unwrap_or(raw);
    String::from_utf8(raw.to_vec())
        .map_err(|e| FrameError::Malformed(format!("invalid utf-8 text: {}", e)))
}
