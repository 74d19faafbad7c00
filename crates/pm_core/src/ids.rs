//! Name newtypes for regions and candidates.
//!
//! Region and candidate names come straight from external poll data
//! ("Maine CD-2", "Kamala Harris"), so unlike opaque registry tokens they may
//! contain spaces and punctuation. The invariant is narrower: trimmed,
//! non-empty, at most 128 bytes, and free of control characters.

use core::borrow::Borrow;
use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

const MAX_NAME_LEN: usize = 128;

fn is_name(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_NAME_LEN
        && s.trim() == s
        && !s.chars().any(char::is_control)
}

macro_rules! def_name {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Build from free text, trimming surrounding whitespace first.
            pub fn new(s: impl AsRef<str>) -> Result<Self, CoreError> {
                let t = s.as_ref().trim();
                if is_name(t) { Ok(Self(t.to_string())) } else { Err(CoreError::InvalidName) }
            }

            pub fn as_str(&self) -> &str { &self.0 }

            /// Case-insensitive comparison against free text (Unicode lowercase).
            pub fn eq_ignore_case(&self, other: &str) -> bool {
                let lower = |s: &str| s.chars().flat_map(char::to_lowercase).collect::<Vec<_>>();
                let other = other.trim();
                if self.0.is_ascii() && other.is_ascii() {
                    self.0.eq_ignore_ascii_case(other)
                } else {
                    lower(&self.0) == lower(other)
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
        }

        impl FromStr for $name {
            type Err = CoreError;
            fn from_str(s: &str) -> Result<Self, Self::Err> { Self::new(s) }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;
            fn try_from(s: String) -> Result<Self, Self::Error> { Self::new(s) }
        }

        impl From<$name> for String {
            fn from(v: $name) -> String { v.0 }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str { &self.0 }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str { &self.0 }
        }
    };
}

def_name!(
    /// Geographic voting unit; the primary key of every regional table.
    RegionId
);
def_name!(
    /// Candidate as named in the poll data.
    CandidateId
);
