//! Three-character ligand codes.

use darcflow_common::{DarcError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::database::DisallowedSet;

/// Symbols a code is drawn from, in enumeration order.
pub const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Number of distinct codes, 36³.
pub const CODE_SPACE: usize = 36 * 36 * 36;

/// A residue code such as `002` or `A7Z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LigandCode([u8; 3]);

impl LigandCode {
    /// Code at position `index` of the lexicographic enumeration.
    pub fn from_index(index: usize) -> Option<Self> {
        if index >= CODE_SPACE {
            return None;
        }
        Some(Self([
            ALPHABET[index / (36 * 36)],
            ALPHABET[(index / 36) % 36],
            ALPHABET[index % 36],
        ]))
    }

    pub fn as_str(&self) -> &str {
        // Only ASCII bytes from ALPHABET are ever stored.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for LigandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LigandCode {
    type Err = DarcError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(|b| ALPHABET.contains(b)) {
            return Err(DarcError::InvalidIdentifier(s.to_string()));
        }
        Ok(Self([bytes[0], bytes[1], bytes[2]]))
    }
}

impl TryFrom<String> for LigandCode {
    type Error = DarcError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<LigandCode> for String {
    fn from(code: LigandCode) -> Self {
        code.as_str().to_string()
    }
}

/// Lazy walk over every code, `000` to `ZZZ`.
///
/// One enumerator is owned by a batch run and never rewound, so each code is
/// handed out at most once per run.
#[derive(Debug, Clone, Default)]
pub struct CodeEnumerator {
    next: usize,
}

impl CodeEnumerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many codes have been drawn so far, allowed or not.
    pub fn consumed(&self) -> usize {
        self.next
    }

    /// Next code not present in `disallowed`.
    pub fn next_allowed(&mut self, disallowed: &DisallowedSet) -> Result<LigandCode> {
        self.find(|code| !disallowed.contains(code))
            .ok_or(DarcError::IdentifierExhaustion { exhausted_after: CODE_SPACE })
    }
}

impl Iterator for CodeEnumerator {
    type Item = LigandCode;

    fn next(&mut self) -> Option<LigandCode> {
        let code = LigandCode::from_index(self.next)?;
        self.next += 1;
        Some(code)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = CODE_SPACE.saturating_sub(self.next);
        (left, Some(left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enumeration_order() {
        let codes: Vec<String> = CodeEnumerator::new().take(12).map(|c| c.to_string()).collect();
        assert_eq!(codes[0], "000");
        assert_eq!(codes[9], "009");
        assert_eq!(codes[10], "00A");
        assert_eq!(codes[11], "00B");

        assert_eq!(LigandCode::from_index(36).unwrap().as_str(), "010");
        assert_eq!(LigandCode::from_index(CODE_SPACE - 1).unwrap().as_str(), "ZZZ");
        assert!(LigandCode::from_index(CODE_SPACE).is_none());
    }

    #[test]
    fn test_enumerates_whole_space_once() {
        let all: Vec<LigandCode> = CodeEnumerator::new().collect();
        assert_eq!(all.len(), CODE_SPACE);
        assert!(all.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_parse_code() {
        assert_eq!("A7Z".parse::<LigandCode>().unwrap().to_string(), "A7Z");
        assert!("a7z".parse::<LigandCode>().is_err());
        assert!("AB".parse::<LigandCode>().is_err());
        assert!("ABCD".parse::<LigandCode>().is_err());
        assert!("A-Z".parse::<LigandCode>().is_err());
    }

    #[test]
    fn test_next_allowed_skips_disallowed() {
        let disallowed = DisallowedSet::from_codes(["000", "001", "003"]);
        let mut codes = CodeEnumerator::new();
        assert_eq!(codes.next_allowed(&disallowed).unwrap().as_str(), "002");
        assert_eq!(codes.next_allowed(&disallowed).unwrap().as_str(), "004");
        assert_eq!(codes.consumed(), 5);
    }

    #[test]
    fn test_exhaustion() {
        let disallowed = DisallowedSet::from_codes(CodeEnumerator::new().map(String::from));
        let mut codes = CodeEnumerator::new();
        let err = codes.next_allowed(&disallowed).unwrap_err();
        assert!(matches!(err, DarcError::IdentifierExhaustion { .. }));
    }
}
