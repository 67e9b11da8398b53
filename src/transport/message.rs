//! Protocol messages
//!
//! | Code | Name                | Payload |
//! |------|---------------------|---------|
//! | 1    | NegotiateRequest    | `"{op}\0{owner}\0{repo}"` |
//! | 2    | NegotiateResponse   | ASCII version string |
//! | 3    | RefAdvertisement    | lines `"{refname} {hex}\n"` |
//! | 4    | RefUpdate           | `"{refname}\0{hex}"` |
//! | 5    | RefWanted           | newline-separated ref names |
//! | 6    | PackData            | 64 hex chars, then compressed object bytes |
//! | 7    | PackComplete        | empty |
//! | 8    | Ok                  | UTF-8 detail |
//! | 9    | Error               | UTF-8 detail |

use crate::artifacts::objects::HEX_DIGEST_LENGTH;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{Error, Result};
use crate::transport::frame::{read_frame, write_frame};
use bytes::Bytes;
use std::io::{Read, Write};

/// Protocol version both ends must agree on
pub const PROTOCOL_VERSION: &str = "v1";

/// Operation requested during negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Push,
    Pull,
    Pr,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Push => "push",
            Op::Pull => "pull",
            Op::Pr => "pr",
        }
    }
}

impl TryFrom<&str> for Op {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        match value {
            "push" => Ok(Op::Push),
            "pull" => Ok(Op::Pull),
            "pr" => Ok(Op::Pr),
            other => Err(Error::ProtocolViolation(format!("unknown op {other:?}"))),
        }
    }
}

/// One frame of the peer protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    NegotiateRequest {
        op: Op,
        owner: String,
        repo: String,
    },
    NegotiateResponse {
        version: String,
    },
    RefAdvertisement {
        refs: Vec<(String, ObjectId)>,
    },
    RefUpdate {
        name: String,
        id: ObjectId,
    },
    RefWanted {
        names: Vec<String>,
    },
    PackData {
        id: ObjectId,
        bytes: Bytes,
    },
    PackComplete,
    Ok {
        detail: String,
    },
    Error {
        detail: String,
    },
}

impl Message {
    pub fn code(&self) -> u8 {
        match self {
            Message::NegotiateRequest { .. } => 1,
            Message::NegotiateResponse { .. } => 2,
            Message::RefAdvertisement { .. } => 3,
            Message::RefUpdate { .. } => 4,
            Message::RefWanted { .. } => 5,
            Message::PackData { .. } => 6,
            Message::PackComplete => 7,
            Message::Ok { .. } => 8,
            Message::Error { .. } => 9,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Message::NegotiateRequest { .. } => "NegotiateRequest",
            Message::NegotiateResponse { .. } => "NegotiateResponse",
            Message::RefAdvertisement { .. } => "RefAdvertisement",
            Message::RefUpdate { .. } => "RefUpdate",
            Message::RefWanted { .. } => "RefWanted",
            Message::PackData { .. } => "PackData",
            Message::PackComplete => "PackComplete",
            Message::Ok { .. } => "Ok",
            Message::Error { .. } => "Error",
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Message::NegotiateRequest { op, owner, repo } => {
                format!("{}\0{owner}\0{repo}", op.as_str()).into_bytes()
            }
            Message::NegotiateResponse { version } => version.clone().into_bytes(),
            Message::RefAdvertisement { refs } => refs
                .iter()
                .map(|(name, id)| format!("{name} {}\n", id.to_hex()))
                .collect::<String>()
                .into_bytes(),
            Message::RefUpdate { name, id } => format!("{name}\0{}", id.to_hex()).into_bytes(),
            Message::RefWanted { names } => names.join("\n").into_bytes(),
            Message::PackData { id, bytes } => {
                let mut payload = id.to_hex().into_bytes();
                payload.extend_from_slice(bytes);
                payload
            }
            Message::PackComplete => Vec::new(),
            Message::Ok { detail } => detail.clone().into_bytes(),
            Message::Error { detail } => detail.clone().into_bytes(),
        }
    }

    pub fn decode(code: u8, payload: &[u8]) -> Result<Message> {
        match code {
            1 => {
                let text = as_text(payload)?;
                let fields: Vec<&str> = text.splitn(3, '\0').collect();
                if fields.len() < 3 {
                    return Err(Error::ProtocolViolation(
                        "negotiate request needs op, owner, and repo".to_string(),
                    ));
                }

                Ok(Message::NegotiateRequest {
                    op: Op::try_from(fields[0])?,
                    owner: fields[1].to_string(),
                    repo: fields[2].to_string(),
                })
            }
            2 => Ok(Message::NegotiateResponse {
                version: as_text(payload)?,
            }),
            3 => {
                let text = as_text(payload)?;
                let mut refs = Vec::new();
                for line in text.lines().filter(|line| !line.is_empty()) {
                    let (name, hex_digest) = line.split_once(' ').ok_or_else(|| {
                        Error::ProtocolViolation(format!("bad advertisement line {line:?}"))
                    })?;
                    let id = ObjectId::try_parse(hex_digest).map_err(|_| {
                        Error::ProtocolViolation(format!("bad advertised digest {hex_digest:?}"))
                    })?;
                    refs.push((name.to_string(), id));
                }

                Ok(Message::RefAdvertisement { refs })
            }
            4 => {
                let text = as_text(payload)?;
                let (name, hex_digest) = text.split_once('\0').ok_or_else(|| {
                    Error::ProtocolViolation("ref update needs name and digest".to_string())
                })?;
                let id = ObjectId::try_parse(hex_digest).map_err(|_| {
                    Error::ProtocolViolation(format!("bad update digest {hex_digest:?}"))
                })?;

                Ok(Message::RefUpdate {
                    name: name.to_string(),
                    id,
                })
            }
            5 => {
                let text = as_text(payload)?;
                let names = text
                    .split('\n')
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect();

                Ok(Message::RefWanted { names })
            }
            6 => {
                if payload.len() < HEX_DIGEST_LENGTH {
                    return Err(Error::ProtocolViolation(
                        "pack data shorter than its id field".to_string(),
                    ));
                }
                let hex_digest = std::str::from_utf8(&payload[..HEX_DIGEST_LENGTH])
                    .map_err(|_| Error::ProtocolViolation("pack id is not ASCII".to_string()))?;
                let id = ObjectId::try_parse(hex_digest).map_err(|_| {
                    Error::ProtocolViolation(format!("bad pack id {hex_digest:?}"))
                })?;

                Ok(Message::PackData {
                    id,
                    bytes: Bytes::copy_from_slice(&payload[HEX_DIGEST_LENGTH..]),
                })
            }
            7 => Ok(Message::PackComplete),
            8 => Ok(Message::Ok {
                detail: as_text(payload)?,
            }),
            9 => Ok(Message::Error {
                detail: as_text(payload)?,
            }),
            other => Err(Error::ProtocolViolation(format!(
                "unknown message code {other}"
            ))),
        }
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_frame(writer, self.code(), &self.encode())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Message> {
        let (code, payload) = read_frame(reader)?;
        Message::decode(code, &payload)
    }
}

fn as_text(payload: &[u8]) -> Result<String> {
    String::from_utf8(payload.to_vec())
        .map_err(|_| Error::ProtocolViolation("payload is not UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::codec;
    use crate::artifacts::objects::object_type::ObjectType;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn round_trip(message: Message) -> Message {
        let mut wire = Vec::new();
        message.write_to(&mut wire).unwrap();
        Message::read_from(&mut std::io::Cursor::new(wire)).unwrap()
    }

    #[rstest]
    fn negotiate_request_round_trips() {
        let message = Message::NegotiateRequest {
            op: Op::Push,
            owner: "alice".to_string(),
            repo: "project".to_string(),
        };
        assert_eq!(round_trip(message.clone()), message);
    }

    #[rstest]
    fn negotiate_request_with_missing_fields_is_rejected() {
        assert!(matches!(
            Message::decode(1, b"push\0only-owner"),
            Err(Error::ProtocolViolation(_))
        ));
        assert!(matches!(
            Message::decode(1, b"steal\0alice\0project"),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[rstest]
    fn ref_advertisement_round_trips() {
        let head = codec::compute_id(ObjectType::Commit, b"tip");
        let message = Message::RefAdvertisement {
            refs: vec![
                ("HEAD".to_string(), head),
                ("refs/heads/main".to_string(), head),
            ],
        };
        assert_eq!(round_trip(message.clone()), message);
    }

    #[rstest]
    fn empty_advertisement_round_trips() {
        let message = Message::RefAdvertisement { refs: vec![] };
        assert_eq!(round_trip(message.clone()), message);
    }

    #[rstest]
    fn ref_wanted_empty_means_nothing_wanted() {
        let message = Message::RefWanted { names: vec![] };
        let decoded = round_trip(message);
        assert_eq!(decoded, Message::RefWanted { names: vec![] });
    }

    #[rstest]
    fn pack_data_round_trips() {
        let (id, compressed) = codec::serialize(ObjectType::Blob, b"packed").unwrap();
        let message = Message::PackData {
            id,
            bytes: compressed,
        };
        assert_eq!(round_trip(message.clone()), message);
    }

    #[rstest]
    fn pack_data_shorter_than_id_is_rejected() {
        assert!(matches!(
            Message::decode(6, b"deadbeef"),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[rstest]
    fn unknown_code_is_rejected() {
        assert!(matches!(
            Message::decode(42, b""),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[rstest]
    #[case(Message::PackComplete)]
    #[case(Message::Ok { detail: "2 refs updated".to_string() })]
    #[case(Message::Error { detail: "no such repository".to_string() })]
    #[case(Message::NegotiateResponse { version: "v1".to_string() })]
    fn simple_messages_round_trip(#[case] message: Message) {
        assert_eq!(round_trip(message.clone()), message);
    }
}
