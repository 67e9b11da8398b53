//! Wire frame codec
//!
//! Every message on the stream is
//!
//! ```text
//! length (u32 big-endian) || type (1 byte) || payload (length bytes)
//! ```
//!
//! where `length` counts the payload only; the encoded size on the wire is
//! `4 + 1 + payload_length`. A stream that ends before a frame completes
//! is a fatal `UnexpectedEof`.

use crate::errors::{Error, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Largest payload a peer will accept
pub const MAX_FRAME_SIZE: usize = 256 * 1024 * 1024;

pub fn write_frame<W: Write>(writer: &mut W, kind: u8, payload: &[u8]) -> Result<()> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(Error::ProtocolViolation(format!(
            "frame of {} bytes exceeds the {MAX_FRAME_SIZE} byte limit",
            payload.len()
        )));
    }

    writer.write_u32::<BigEndian>(payload.len() as u32)?;
    writer.write_u8(kind)?;
    writer.write_all(payload)?;
    writer.flush()?;

    Ok(())
}

pub fn read_frame<R: Read>(reader: &mut R) -> Result<(u8, Vec<u8>)> {
    let length = reader.read_u32::<BigEndian>().map_err(map_eof)? as usize;
    if length > MAX_FRAME_SIZE {
        return Err(Error::ProtocolViolation(format!(
            "peer announced a {length} byte frame, limit is {MAX_FRAME_SIZE}"
        )));
    }

    let kind = reader.read_u8().map_err(map_eof)?;

    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload).map_err(map_eof)?;

    Ok((kind, payload))
}

fn map_eof(err: std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::UnexpectedEof
    } else {
        err.into()
    }
}
