use crate::artifacts::index::CHECKSUM_SIZE;
use crate::errors::{Error, Result};
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::io::{Read, Write};

/// IO wrapper that folds every byte read or written into a running SHA-256
///
/// Index files end with the digest of everything before it; this wrapper
/// lets the load path verify and the save path append that footer without
/// buffering the whole file twice.
#[derive(Debug)]
pub struct Checksum<IO> {
    io: IO,
    digest: Sha256,
}

impl<IO> Checksum<IO> {
    pub fn new(io: IO) -> Self {
        Checksum {
            io,
            digest: Sha256::new(),
        }
    }
}

impl<IO: Read> Checksum<IO> {
    pub fn read(&mut self, size: usize) -> Result<Bytes> {
        let mut buffer = vec![0; size];
        self.io
            .read_exact(&mut buffer)
            .map_err(|_| Error::CorruptIndex("unexpected end of index file".to_string()))?;

        self.digest.update(&buffer);
        Ok(Bytes::from(buffer))
    }

    /// Read the trailing footer and compare it against the running digest
    pub fn verify(mut self) -> Result<()> {
        let mut expected = [0u8; CHECKSUM_SIZE];
        self.io
            .read_exact(&mut expected)
            .map_err(|_| Error::CorruptIndex("missing checksum footer".to_string()))?;

        let actual = self.digest.finalize();
        if expected != actual.as_slice() {
            return Err(Error::CorruptIndex("checksum mismatch".to_string()));
        }

        Ok(())
    }
}

impl<IO: Write> Checksum<IO> {
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.io.write_all(data)?;
        self.digest.update(data);
        Ok(())
    }

    /// Append the footer over everything written so far
    pub fn write_checksum(mut self) -> Result<()> {
        let checksum = self.digest.finalize();
        self.io.write_all(&checksum)?;
        self.io.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn write_then_verify_round_trips() {
        let mut buffer = Vec::new();
        let mut writer = Checksum::new(&mut buffer);
        writer.write(b"header").unwrap();
        writer.write(b"entries").unwrap();
        writer.write_checksum().unwrap();

        let mut reader = Checksum::new(std::io::Cursor::new(buffer));
        reader.read(6).unwrap();
        reader.read(7).unwrap();
        reader.verify().unwrap();
    }

    #[rstest]
    fn flipped_byte_fails_verification() {
        let mut buffer = Vec::new();
        let mut writer = Checksum::new(&mut buffer);
        writer.write(b"payload").unwrap();
        writer.write_checksum().unwrap();

        buffer[2] ^= 0x40;

        let mut reader = Checksum::new(std::io::Cursor::new(buffer));
        reader.read(7).unwrap();
        assert!(matches!(reader.verify(), Err(Error::CorruptIndex(_))));
    }

    #[rstest]
    fn truncated_footer_fails_verification() {
        let mut buffer = Vec::new();
        let mut writer = Checksum::new(&mut buffer);
        writer.write(b"payload").unwrap();
        writer.write_checksum().unwrap();

        buffer.truncate(buffer.len() - 1);

        let mut reader = Checksum::new(std::io::Cursor::new(buffer));
        reader.read(7).unwrap();
        assert!(matches!(reader.verify(), Err(Error::CorruptIndex(_))));
    }
}
