//! Length-prefixed frames and fixed-width integers.
//!
//! Every integer on the wire is 4 bytes, little-endian. A frame is a `u32`
//! payload length followed by exactly that many payload bytes. Standalone
//! integers (ports, filename lengths) are `i32` with no prefix of their own.

use std::io::{ErrorKind, Read, Write};

use crate::error::FrameError;

pub const PREFIX_LEN: usize = 4;

/// Upper bound on how much the receive buffer grows per read.
pub const TRANSFER_BUFF_SIZE: usize = 262144; // 256 * 1024 bytes

pub fn send_framed<W: Write>(conn: &mut W, payload: &[u8]) -> Result<(), FrameError> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        FrameError::Malformed(format!("payload of {} bytes exceeds frame limit", payload.len()))
    })?;
    conn.write_all(&len.to_le_bytes())?;
    conn.write_all(payload)?;
    conn.flush()?;
    Ok(())
}

pub fn recv_framed<R: Read>(conn: &mut R) -> Result<Vec<u8>, FrameError> {
    recv_framed_counted(conn).map(|(payload, _)| payload)
}

/// Like [`recv_framed`], also returning how many payload reads it took.
pub fn recv_framed_counted<R: Read>(conn: &mut R) -> Result<(Vec<u8>, usize), FrameError> {
    let mut prefix = [0u8; PREFIX_LEN];
    fill_exact(conn, &mut prefix)?;
    let expected = u32::from_le_bytes(prefix) as usize;

    // grow in bounded steps; the prefix alone never decides the allocation
    let mut payload = Vec::with_capacity(expected.min(TRANSFER_BUFF_SIZE));
    let mut received = 0;
    let mut reads = 0;
    while received < expected {
        if payload.len() == received {
            let grow = (expected - received).min(TRANSFER_BUFF_SIZE);
            payload.resize(received + grow, 0);
        }
        match conn.read(&mut payload[received..]) {
            Ok(0) => return Err(FrameError::ConnectionClosed { expected, received }),
            Ok(n) => {
                received += n;
                reads += 1;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok((payload, reads))
}

pub fn send_fixed_int<W: Write>(conn: &mut W, value: i32) -> Result<(), FrameError> {
    conn.write_all(&value.to_le_bytes())?;
    conn.flush()?;
    Ok(())
}

pub fn recv_fixed_int<R: Read>(conn: &mut R) -> Result<i32, FrameError> {
    let mut buf = [0u8; PREFIX_LEN];
    fill_exact(conn, &mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn fill_exact<R: Read>(conn: &mut R, buf: &mut [u8]) -> Result<(), FrameError> {
    let mut filled = 0;
    while filled < buf.len() {
        match conn.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(FrameError::ConnectionClosed {
                    expected: buf.len(),
                    received: filled,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    /// Hands out at most `chunk` bytes per read.
    struct Trickle {
        data: Cursor<Vec<u8>>,
        chunk: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.chunk);
            self.data.read(&mut buf[..n])
        }
    }

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut wire = Vec::new();
        send_framed(&mut wire, payload).unwrap();
        wire
    }

    #[test]
    fn empty_payload_round_trips() {
        let wire = framed(b"");
        assert_eq!(wire, vec![0, 0, 0, 0]);
        let (payload, reads) = recv_framed_counted(&mut Cursor::new(wire)).unwrap();
        assert!(payload.is_empty());
        assert_eq!(reads, 0);
    }

    #[test]
    fn large_payload_reassembles_from_partial_reads() {
        let body: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let mut conn = Trickle {
            data: Cursor::new(framed(&body)),
            chunk: 4096,
        };
        let (payload, reads) = recv_framed_counted(&mut conn).unwrap();
        assert_eq!(payload, body);
        assert_eq!(reads, (body.len() + 4095) / 4096);
    }

    #[test]
    fn prefix_split_across_reads() {
        let mut conn = Trickle {
            data: Cursor::new(framed(b"hello world")),
            chunk: 1,
        };
        assert_eq!(recv_framed(&mut conn).unwrap(), b"hello world");
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let mut wire = 10u32.to_le_bytes().to_vec();
        wire.extend_from_slice(b"abc");
        match recv_framed(&mut Cursor::new(wire)) {
            Err(FrameError::ConnectionClosed { expected, received }) => {
                assert_eq!(expected, 10);
                assert_eq!(received, 3);
            }
            other => panic!("expected ConnectionClosed, got {:?}", other),
        }
    }

    #[test]
    fn truncated_prefix_is_an_error() {
        let err = recv_framed(&mut Cursor::new(vec![5u8, 0])).unwrap_err();
        assert!(matches!(
            err,
            FrameError::ConnectionClosed { expected: 4, received: 2 }
        ));
    }

    #[test]
    fn fixed_int_is_four_little_endian_bytes() {
        let mut wire = Vec::new();
        send_fixed_int(&mut wire, 5000).unwrap();
        assert_eq!(wire, 5000i32.to_le_bytes());
        assert_eq!(recv_fixed_int(&mut Cursor::new(wire)).unwrap(), 5000);
    }
}
