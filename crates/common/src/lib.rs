//! Shared vocabulary for the job workspace: file identities, digest keys,
//! job kinds, coordinates, and the synthetic URI scheme.
//!
//! Every other crate speaks in these types, so nothing here depends on the
//! registry, the bus, or the virtual filesystem.

pub mod position;
pub mod uri;

pub use position::{last_position, LineIndex, LineSeparator, Position, Range, TranslateError};
pub use uri::{ShadowUri, UriError, SCHEME};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable key for a source file: its path, normalised to forward slashes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileIdentity(String);

impl FileIdentity {
    pub fn new(path: impl Into<String>) -> Self {
        let path: String = path.into();
        Self(path.replace('\\', "/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File extension without the dot, if the final segment has one.
    ///
    /// ```
    /// # use common::FileIdentity;
    /// assert_eq!(FileIdentity::new("src/a.ts").extension(), Some("ts"));
    /// assert_eq!(FileIdentity::new("Makefile").extension(), None);
    /// ```
    pub fn extension(&self) -> Option<&str> {
        let name = self.0.rsplit('/').next().unwrap_or(&self.0);
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
            _ => None,
        }
    }
}

impl fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileIdentity {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// Error returned when a digest key cannot be parsed from its hex form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid digest `{0}`: expected 64 hex characters")]
pub struct DigestParseError(pub String);

macro_rules! digest_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(into = "String", try_from = "String")]
        pub struct $name(blake3::Hash);

        impl $name {
            pub fn to_hex(&self) -> String {
                self.0.to_hex().to_string()
            }

            /// First `n` hex characters, for compact display.
            pub fn short(&self, n: usize) -> String {
                let mut hex = self.to_hex();
                hex.truncate(n);
                hex
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                self.0.as_bytes()
            }
        }

        impl From<blake3::Hash> for $name {
            fn from(hash: blake3::Hash) -> Self {
                Self(hash)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = DigestParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                blake3::Hash::from_hex(s)
                    .map(Self)
                    .map_err(|_| DigestParseError(s.to_string()))
            }
        }

        impl From<$name> for String {
            fn from(key: $name) -> Self {
                key.to_hex()
            }
        }

        impl TryFrom<String> for $name {
            type Error = DigestParseError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }
    };
}

digest_key!(
    /// Primary key of a job: BLAKE3 digest of its defining parameters.
    JobHash
);

digest_key!(
    /// Key of a file record: BLAKE3 digest of the file identity.
    FileHash
);

/// Edit families. Closed set; the tag is part of the job hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum JobKind {
    /// Move one top-level declaration in front of another.
    ReorderDeclarations = 0,
    /// Replace a range with repaired text.
    RepairCode = 1,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::ReorderDeclarations => "reorder-declarations",
            JobKind::RepairCode => "repair-code",
        }
    }

    pub fn tag(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permission of a virtual file entry. Absence means writable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Permission {
    ReadOnly,
}
