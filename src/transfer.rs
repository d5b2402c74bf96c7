//! The single-use data connection: one frame carrying either a directory
//! listing or a file body.

use std::io::{Read, Write};

use tracing::debug;

use crate::error::{Error, FrameError, Result};
use crate::frame::{recv_framed, send_framed};

pub const LISTING_DELIMITER: char = '\0';

/// Splits a listing payload on NUL. A trailing delimiter leaves a trailing
/// empty entry in place.
pub fn split_listing(text: &str) -> Vec<String> {
    text.split(LISTING_DELIMITER).map(str::to_string).collect()
}

pub fn join_listing<S: AsRef<str>>(names: &[S]) -> String {
    let mut joined = String::new();
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            joined.push(LISTING_DELIMITER);
        }
        joined.push_str(name.as_ref());
    }
    joined
}

pub fn recv_listing<R: Read>(conn: &mut R) -> Result<Vec<String>> {
    let payload = recv_data_frame(conn)?;
    // the trailing NUL, if any, is a delimiter here and must reach the split
    let text = String::from_utf8(payload)
        .map_err(|e| FrameError::Malformed(format!("invalid utf-8 listing: {}", e)))?;
    let names = split_listing(&text);
    debug!(entries = names.len(), "listing received");
    Ok(names)
}

/// Receives the file body as opaque bytes.
pub fn recv_file<R: Read>(conn: &mut R) -> Result<Vec<u8>> {
    let body = recv_data_frame(conn)?;
    debug!(bytes = body.len(), "file body received");
    Ok(body)
}

pub fn send_listing<W: Write, S: AsRef<str>>(conn: &mut W, names: &[S]) -> Result<()> {
    send_framed(conn, join_listing(names).as_bytes())?;
    Ok(())
}

pub fn send_file<W: Write>(conn: &mut W, body: &[u8]) -> Result<()> {
    send_framed(conn, body)?;
    Ok(())
}

fn recv_data_frame<R: Read>(conn: &mut R) -> Result<Vec<u8>> {
    recv_framed(conn).map_err(|e| match e {
        FrameError::ConnectionClosed { expected, received } => {
            Error::TransferIncomplete { expected, received }
        }
        other => other.into(),
    })
}
