// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Entity identifiers and the cache keys derived from them.
//!
//! Every entity carries a [`Gid`]. A storage instance is bound to one
//! [`KeyDomain`] when it is built and derives all of its [`EntityKey`]s through
//! [`KeyDomain::key_for`], so a single instance never mixes text and integer keys.

use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::Error;

/// A globally unique, snowflake-style entity identifier.
///
/// A `Gid` exposes two forms: its 64-bit integer value and a base64 text form
/// (the standard base64 encoding of the decimal digits).
///
/// # Examples
///
/// ```
/// use tierstore_tier::Gid;
///
/// let gid = Gid::new(1_288_834_974_657);
/// assert_eq!(gid.as_integer(), 1_288_834_974_657);
/// assert_eq!(Gid::from_text(&gid.as_text()).unwrap(), gid);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Gid(i64);

impl Gid {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the integer form.
    #[must_use]
    pub const fn as_integer(&self) -> i64 {
        self.0
    }

    /// Returns the base64 text form.
    #[must_use]
    pub fn as_text(&self) -> String {
        STANDARD.encode(self.0.to_string())
    }

    /// Parses the base64 text form produced by [`Gid::as_text`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the text is not valid base64 or does
    /// not decode to a decimal integer.
    pub fn from_text(text: &str) -> Result<Self, Error> {
        let bytes = STANDARD.decode(text).map_err(Error::serialization)?;
        let digits = String::from_utf8(bytes).map_err(Error::serialization)?;
        digits.parse::<i64>().map(Self).map_err(Error::serialization)
    }
}

impl From<i64> for Gid {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The concrete key a tier stores an entity under.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityKey {
    /// A key in the text domain.
    Text(String),
    /// A key in the integer domain.
    Integer(i64),
}

impl EntityKey {
    /// Returns the domain this key belongs to.
    #[must_use]
    pub const fn domain(&self) -> KeyDomain {
        match self {
            Self::Text(_) => KeyDomain::Text,
            Self::Integer(_) => KeyDomain::Integer,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Integer(id) => write!(f, "{id}"),
        }
    }
}

impl From<&str> for EntityKey {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for EntityKey {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<i64> for EntityKey {
    fn from(id: i64) -> Self {
        Self::Integer(id)
    }
}

/// The key domain a storage instance is bound to.
///
/// Parsing any name other than `text`/`string` or `integer`/`int64` fails with
/// [`Error::UnsupportedKeyDomain`], so a misconfigured instance is rejected
/// when it is built rather than on its first request.
///
/// # Examples
///
/// ```
/// use tierstore_tier::{EntityKey, Gid, KeyDomain};
///
/// let domain: KeyDomain = "integer".parse().unwrap();
/// assert_eq!(domain.key_for(&Gid::new(7)), EntityKey::Integer(7));
/// assert!("uuid".parse::<KeyDomain>().is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum KeyDomain {
    /// Keys are the base64 text form of the GID.
    Text,
    /// Keys are the integer form of the GID.
    #[default]
    Integer,
}

impl KeyDomain {
    /// Derives the key for `gid` in this domain.
    #[must_use]
    pub fn key_for(self, gid: &Gid) -> EntityKey {
        match self {
            Self::Text => EntityKey::Text(gid.as_text()),
            Self::Integer => EntityKey::Integer(gid.as_integer()),
        }
    }

    /// Returns the canonical name of the domain.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
        }
    }
}

impl FromStr for KeyDomain {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "text" | "string" => Ok(Self::Text),
            "integer" | "int64" => Ok(Self::Integer),
            _ => Err(Error::UnsupportedKeyDomain(name.to_owned())),
        }
    }
}

impl TryFrom<String> for KeyDomain {
    type Error = Error;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

impl From<KeyDomain> for String {
    fn from(domain: KeyDomain) -> Self {
        domain.as_str().to_owned()
    }
}

impl fmt::Display for KeyDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
