//! Byte size value object

use std::fmt;
use std::str::FromStr;

use crate::domain::error::ByteSizeParseError;

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;

/// A number of bytes, parsed from strings like "512KB", "200MB" or "1GB".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteSize(u64);

impl ByteSize {
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    pub const fn from_mb(mb: u64) -> Self {
        Self(mb * MB)
    }

    pub const fn as_bytes(&self) -> u64 {
        self.0
    }

    /// Human-readable rendering used in logs and error messages
    pub fn human_readable(&self) -> String {
        let bytes = self.0;
        if bytes < KB {
            format!("{} B", bytes)
        } else if bytes < MB {
            format!("{:.1} KB", bytes as f64 / KB as f64)
        } else if bytes < GB {
            format!("{:.1} MB", bytes as f64 / MB as f64)
        } else {
            format!("{:.1} GB", bytes as f64 / GB as f64)
        }
    }
}

impl FromStr for ByteSize {
    type Err = ByteSizeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim().to_uppercase();
        let split = input
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(input.len());
        let (digits, unit) = input.split_at(split);

        let value: u64 = digits.parse().map_err(|_| ByteSizeParseError {
            input: s.to_string(),
        })?;
        let multiplier = match unit.trim() {
            "" | "B" => 1,
            "K" | "KB" => KB,
            "M" | "MB" => MB,
            "G" | "GB" => GB,
            _ => {
                return Err(ByteSizeParseError {
                    input: s.to_string(),
                })
            }
        };

        value
            .checked_mul(multiplier)
            .filter(|bytes| *bytes > 0)
            .map(Self)
            .ok_or_else(|| ByteSizeParseError {
                input: s.to_string(),
            })
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0;
        if bytes % GB == 0 {
            write!(f, "{}GB", bytes / GB)
        } else if bytes % MB == 0 {
            write!(f, "{}MB", bytes / MB)
        } else if bytes % KB == 0 {
            write!(f, "{}KB", bytes / KB)
        } else {
            write!(f, "{}B", bytes)
        }
    }
}
