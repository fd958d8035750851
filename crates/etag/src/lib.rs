//! Ordered document positions for RavenDB 3.x.
//!
//! Every document written to a RavenDB 3.x database is stamped with an etag:
//! 16 bytes rendered as `01000000-0000-0001-0000-000000000005`. The first
//! eight bytes count database restarts, the last eight count changes since
//! that restart. Comparing two etags therefore means comparing the two
//! halves in order, never the text.
//!
//! # Example
//!
//! ```rust
//! use raven_etag::Etag;
//!
//! let acked: Etag = "01000000-0000-0001-0000-000000000003".parse().unwrap();
//! let latest: Etag = "01000000-0000-0001-0000-00000000000A".parse().unwrap();
//!
//! assert!(latest.is_greater_than(&acked));
//! assert!(Etag::EMPTY < acked);
//! ```

use std::fmt;
use std::str::FromStr;

/// Errors produced when an etag token cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EtagParseError {
    /// The token was empty or only whitespace.
    #[error("etag is empty")]
    Empty,

    /// The token did not have the dashed 8-4-4-4-12 layout or 32 bare digits.
    #[error("invalid etag layout '{0}': expected XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX")]
    Layout(String),

    /// The token contained a character that is not a hex digit.
    #[error("invalid etag '{token}': '{found}' is not a hex digit")]
    Digit { token: String, found: char },
}

/// Positions of the dashes in the canonical form.
const DASH_POSITIONS: [usize; 4] = [8, 13, 18, 23];

/// A RavenDB document position.
///
/// The derived ordering compares `restarts` first and `changes` second, which
/// is the order the server assigns etags in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Etag {
    restarts: u64,
    changes: u64,
}

impl Etag {
    /// The minimum etag, meaning "nothing acknowledged yet".
    pub const EMPTY: Etag = Etag {
        restarts: 0,
        changes: 0,
    };

    pub const fn new(restarts: u64, changes: u64) -> Self {
        Self { restarts, changes }
    }

    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    pub fn changes(&self) -> u64 {
        self.changes
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// Strictly after `other`.
    pub fn is_greater_than(&self, other: &Etag) -> bool {
        self > other
    }

    /// After or equal to `other`.
    pub fn is_greater_than_or_equal(&self, other: &Etag) -> bool {
        self >= other
    }

    /// Parse the dashed or bare hex form of an etag.
    pub fn parse(token: &str) -> Result<Self, EtagParseError> {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(EtagParseError::Empty);
        }

        let digits: String = match trimmed.len() {
            36 => {
                for (idx, ch) in trimmed.char_indices() {
                    let dash_expected = DASH_POSITIONS.contains(&idx);
                    if dash_expected != (ch == '-') {
                        return Err(EtagParseError::Layout(trimmed.to_string()));
                    }
                }
                trimmed.chars().filter(|c| *c != '-').collect()
            }
            32 => trimmed.to_string(),
            _ => return Err(EtagParseError::Layout(trimmed.to_string())),
        };

        if let Some(found) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(EtagParseError::Digit {
                token: trimmed.to_string(),
                found,
            });
        }

        let value = u128::from_str_radix(&digits, 16)
            .map_err(|_| EtagParseError::Layout(trimmed.to_string()))?;

        Ok(Self {
            restarts: (value >> 64) as u64,
            changes: value as u64,
        })
    }
}

impl FromStr for Etag {
    type Err = EtagParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Etag::parse(s)
    }
}

impl fmt::Display for Etag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = format!("{:016X}{:016X}", self.restarts, self.changes);
        write!(
            f,
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        )
    }
}
