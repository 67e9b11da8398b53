use crate::artifacts::index::{SIGNATURE, VERSION};
use crate::errors::{Error, Result};
use byteorder::{ByteOrder, NetworkEndian, WriteBytesExt};
use bytes::Bytes;
use derive_new::new;

/// Index file header: magic, version, entry count
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct IndexHeader {
    pub entry_count: u32,
}

impl IndexHeader {
    pub fn serialize(&self) -> Result<Bytes> {
        let mut header_bytes = Vec::with_capacity(12);
        header_bytes.extend_from_slice(SIGNATURE);
        header_bytes.write_u32::<NetworkEndian>(VERSION)?;
        header_bytes.write_u32::<NetworkEndian>(self.entry_count)?;

        Ok(Bytes::from(header_bytes))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 12 {
            return Err(Error::CorruptIndex("truncated header".to_string()));
        }
        if &bytes[0..4] != SIGNATURE {
            return Err(Error::CorruptIndex("bad magic".to_string()));
        }

        let version = NetworkEndian::read_u32(&bytes[4..8]);
        if version != VERSION {
            return Err(Error::CorruptIndex(format!(
                "unsupported version {version}"
            )));
        }

        Ok(IndexHeader {
            entry_count: NetworkEndian::read_u32(&bytes[8..12]),
        })
    }
}
