use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// `name:version` identifier addressing a bento or a model artifact.
///
/// A tag without a version (or with the literal version `latest`) is resolved
/// against a store index before use; resolution orders versions by creation
/// time, never by version-string comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    pub name: String,
    pub version: Option<String>,
}

impl Tag {
    pub fn new(name: impl Into<String>, version: Option<&str>) -> Result<Tag> {
        let name = name.into();
        validate_component(&name, "name")?;
        let version = match version {
            Some(v) => {
                validate_component(v, "version")?;
                Some(v.to_string())
            }
            None => None,
        };
        Ok(Tag { name, version })
    }

    /// Parse a `name[:version]` string, splitting on the last `:`.
    pub fn parse(s: &str) -> Result<Tag> {
        match s.rsplit_once(':') {
            Some((name, version)) => Tag::new(name, Some(version)),
            None => Tag::new(s, None),
        }
    }

    /// True when this tag still needs store resolution.
    pub fn is_latest(&self) -> bool {
        match self.version.as_deref() {
            None => true,
            Some(v) => v == "latest",
        }
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Same name, concrete version.
    pub fn with_version(&self, version: &str) -> Result<Tag> {
        Tag::new(self.name.clone(), Some(version))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}:{}", self.name, version),
            None => write!(f, "{}", self.name),
        }
    }
}

impl FromStr for Tag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Tag> {
        Tag::parse(s)
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Tag, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Tag::parse(&raw).map_err(D::Error::custom)
    }
}

fn validate_component(s: &str, field: &str) -> Result<()> {
    if s.is_empty() {
        return Err(Error::invalid_tag(s, format!("{field} must not be empty")));
    }
    if let Some(bad) = s
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.')))
    {
        return Err(Error::invalid_tag(
            s,
            format!("{field} contains {bad:?}, expected lowercase alphanumerics, '-', '_' or '.'"),
        ));
    }
    Ok(())
}

const BASE32_ALPHABET: &[u8; 32] = b"0123456789abcdefghjkmnpqrstvwxyz";

/// Generate a fresh version string: current millisecond timestamp in the high
/// bits, random salt in the low bits, base32-encoded. Fixed width, so
/// versions generated later sort later.
pub fn generate_version() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u128;
    let salt = rand::random::<u32>() as u128;
    let mut value = (millis << 32) | salt;

    let mut out = [0u8; 16];
    for slot in out.iter_mut().rev() {
        *slot = BASE32_ALPHABET[(value & 0x1f) as usize];
        value >>= 5;
    }
    // 16 base32 digits hold 80 bits, enough for the full millis<<32 value
    String::from_utf8_lossy(&out).into_owned()
}
