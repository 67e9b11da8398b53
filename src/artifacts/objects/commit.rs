//! Commit object
//!
//! Commits tie a tree snapshot to its history:
//!
//! ```text
//! tree <hex-digest>
//! parent <hex-digest>        (zero or more)
//! author <signature>
//! committer <signature>
//!
//! <message>
//! ```
//!
//! with `signature = "Name <email> unix_seconds ±HHMM"`.

use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{Error, Result};
use bytes::Bytes;
use chrono::{DateTime, FixedOffset};

/// Author or committer identity with timestamp
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Signature {
    name: String,
    email: String,
    timestamp: DateTime<FixedOffset>,
}

impl Signature {
    /// New signature stamped with the current local time
    pub fn new(name: String, email: String) -> Self {
        Signature {
            name,
            email,
            timestamp: chrono::Local::now().fixed_offset(),
        }
    }

    pub fn new_with_timestamp(
        name: String,
        email: String,
        timestamp: DateTime<FixedOffset>,
    ) -> Self {
        Signature {
            name,
            email,
            timestamp,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }

    /// Canonical text form: `Name <email> unix_seconds ±HHMM`
    pub fn display(&self) -> String {
        format!(
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.timestamp.timestamp(),
            self.timestamp.format("%z")
        )
    }

    fn parse_offset(token: &str) -> Result<FixedOffset> {
        let bad = || Error::MalformedObject(format!("bad timezone offset {token:?}"));

        if token.len() != 5 {
            return Err(bad());
        }
        let (sign, digits) = token.split_at(1);
        let hours: i32 = digits[..2].parse().map_err(|_| bad())?;
        let minutes: i32 = digits[2..].parse().map_err(|_| bad())?;
        let seconds = (hours * 60 + minutes) * 60;

        match sign {
            "+" => FixedOffset::east_opt(seconds).ok_or_else(bad),
            "-" => FixedOffset::west_opt(seconds).ok_or_else(bad),
            _ => Err(bad()),
        }
    }
}

impl TryFrom<&str> for Signature {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        // split from the right: offset, unix seconds, then "Name <email>"
        let parts: Vec<&str> = value.rsplitn(3, ' ').collect();
        if parts.len() < 3 {
            return Err(Error::MalformedObject(format!("bad signature {value:?}")));
        }

        let offset = Self::parse_offset(parts[0])?;
        let seconds: i64 = parts[1]
            .parse()
            .map_err(|_| Error::MalformedObject(format!("bad signature timestamp {:?}", parts[1])))?;
        let name_email = parts[2];

        let email_start = name_email.find('<').ok_or_else(|| {
            Error::MalformedObject("signature missing '<' around email".to_string())
        })?;
        let email_end = name_email.find('>').ok_or_else(|| {
            Error::MalformedObject("signature missing '>' around email".to_string())
        })?;

        let name = name_email[..email_start].trim().to_string();
        let email = name_email[email_start + 1..email_end].to_string();

        let timestamp = DateTime::from_timestamp(seconds, 0)
            .ok_or_else(|| {
                Error::MalformedObject(format!("signature timestamp {seconds} out of range"))
            })?
            .with_timezone(&offset);

        Ok(Signature {
            name,
            email,
            timestamp,
        })
    }
}

/// Snapshot plus history metadata
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Commit {
    tree: ObjectId,
    parents: Vec<ObjectId>,
    author: Signature,
    committer: Signature,
    message: String,
}

impl Commit {
    /// New commit with the author doubling as committer
    pub fn new(tree: ObjectId, parents: Vec<ObjectId>, author: Signature, message: String) -> Self {
        Commit {
            tree,
            parents,
            committer: author.clone(),
            author,
            message,
        }
    }

    pub fn tree(&self) -> ObjectId {
        self.tree
    }

    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }

    pub fn first_parent(&self) -> Option<ObjectId> {
        self.parents.first().copied()
    }

    pub fn author(&self) -> &Signature {
        &self.author
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// First line of the message
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.author.timestamp()
    }
}

impl Packable for Commit {
    fn pack(&self) -> Result<Bytes> {
        let mut lines = Vec::new();

        lines.push(format!("tree {}", self.tree.to_hex()));
        for parent in &self.parents {
            lines.push(format!("parent {}", parent.to_hex()));
        }
        lines.push(format!("author {}", self.author.display()));
        lines.push(format!("committer {}", self.committer.display()));
        lines.push(String::new());
        lines.push(self.message.clone());

        Ok(Bytes::from(lines.join("\n")))
    }
}

impl Unpackable for Commit {
    fn unpack(content: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(content)
            .map_err(|_| Error::MalformedObject("commit content is not UTF-8".to_string()))?;

        // headers end at the first blank line; everything after it is the
        // message, byte for byte
        let (headers, message) = text.split_once("\n\n").ok_or_else(|| {
            Error::MalformedObject("commit missing blank line before message".to_string())
        })?;
        let mut lines = headers.lines();

        let tree_line = lines
            .next()
            .ok_or_else(|| Error::MalformedObject("commit missing tree line".to_string()))?;
        let tree = ObjectId::try_parse(
            tree_line
                .strip_prefix("tree ")
                .ok_or_else(|| Error::MalformedObject("commit tree line malformed".to_string()))?,
        )
        .map_err(|err| Error::MalformedObject(err.to_string()))?;

        let mut parents = Vec::new();
        let mut next_line = lines
            .next()
            .ok_or_else(|| Error::MalformedObject("commit missing author line".to_string()))?;

        while let Some(parent_hex) = next_line.strip_prefix("parent ") {
            parents.push(
                ObjectId::try_parse(parent_hex)
                    .map_err(|err| Error::MalformedObject(err.to_string()))?,
            );
            next_line = lines
                .next()
                .ok_or_else(|| Error::MalformedObject("commit missing author line".to_string()))?;
        }

        let author = Signature::try_from(next_line.strip_prefix("author ").ok_or_else(|| {
            Error::MalformedObject("commit author line malformed".to_string())
        })?)?;

        let committer_line = lines
            .next()
            .ok_or_else(|| Error::MalformedObject("commit missing committer line".to_string()))?;
        let committer = Signature::try_from(
            committer_line.strip_prefix("committer ").ok_or_else(|| {
                Error::MalformedObject("commit committer line malformed".to_string())
            })?,
        )?;

        Ok(Commit {
            tree,
            parents,
            author,
            committer,
            message: message.to_string(),
        })
    }
}

impl Object for Commit {
    fn object_type(&self) -> ObjectType {
        ObjectType::Commit
    }
}
