//! Core identifiers: Ticker, AccountId, StrategyId

use std::fmt;

/// Exchange ticker, stored inline as up to 8 bytes.
///
/// B3 tickers fit comfortably (`PETR4`, `BOVA11`, `WINFUT`). Copy + inline
/// storage keeps position maps free of heap traffic.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticker([u8; 8]);

impl Ticker {
    /// Create a ticker from a string. Panics if longer than 8 bytes;
    /// use [`Ticker::try_new`] for untrusted input.
    pub fn new(s: &str) -> Self {
        match Self::try_new(s) {
            Some(t) => t,
            None => panic!("ticker '{s}' exceeds 8 bytes"),
        }
    }

    /// Create a ticker, returning `None` if the string exceeds 8 bytes.
    pub fn try_new(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() > 8 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[..bytes.len()].copy_from_slice(bytes);
        Some(Ticker(buf))
    }

    /// The ticker as a string slice.
    pub fn as_str(&self) -> &str {
        // Zero bytes are padding; the prefix came from a valid &str.
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(8);
        std::str::from_utf8(&self.0[..len]).unwrap_or("")
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // pad() honors width flags so tickers line up in display tables
        f.pad(self.as_str())
    }
}

impl fmt::Debug for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ticker({})", self.as_str())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Ticker {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Ticker {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ticker::try_new(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("ticker '{s}' exceeds 8 bytes")))
    }
}

/// Brokerage account identifier assigned by the backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}", self.0)
    }
}

/// Strategy identifier. Free-form, assigned by the operations desk.
pub type StrategyId = String;
