//! Which status codes count as success for a call.

use std::fmt::{Display, Formatter};
use std::ops::RangeInclusive;
use std::str::FromStr;

use thiserror::Error;

/// Set of accepted HTTP status codes, stored as inclusive ranges.
///
/// The default is `200-299`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessPolicy {
    ranges: Vec<RangeInclusive<u16>>,
}

impl Default for SuccessPolicy {
    fn default() -> Self {
        Self::success()
    }
}

impl SuccessPolicy {
    pub fn success() -> Self {
        Self::range(200, 299)
    }

    /// Codes `low..=high`. Bounds are swapped when given in reverse.
    pub fn range(low: u16, high: u16) -> Self {
        Self {
            ranges: vec![low.min(high)..=low.max(high)],
        }
    }

    pub fn codes<I>(codes: I) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        Self {
            ranges: codes.into_iter().map(|code| code..=code).collect(),
        }
    }

    pub fn and_range(mut self, low: u16, high: u16) -> Self {
        self.ranges.push(low.min(high)..=low.max(high));
        self
    }

    pub fn and_code(mut self, code: u16) -> Self {
        self.ranges.push(code..=code);
        self
    }

    pub fn contains(&self, code: u16) -> bool {
        self.ranges.iter().any(|range| range.contains(&code))
    }
}

impl Display for SuccessPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (index, range) in self.ranges.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            if range.start() == range.end() {
                write!(f, "{}", range.start())?;
            } else {
                write!(f, "{}-{}", range.start(), range.end())?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParsePolicyError {
    #[error("success policy cannot be empty")]
    Empty,
    #[error("invalid status code '{value}' in success policy")]
    InvalidCode { value: String },
    #[error("inverted range {low}-{high} in success policy")]
    InvertedRange { low: u16, high: u16 },
}

impl FromStr for SuccessPolicy {
    type Err = ParsePolicyError;

    /// Parses `"200-299,304"` style lists of codes and ranges.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut ranges = Vec::new();

        for part in value.split(',').map(str::trim).filter(|part| !part.is_empty()) {
            let range = match part.split_once('-') {
                Some((low, high)) => {
                    let low = parse_code(low)?;
                    let high = parse_code(high)?;
                    if low > high {
                        return Err(ParsePolicyError::InvertedRange { low, high });
                    }
                    low..=high
                }
                None => {
                    let code = parse_code(part)?;
                    code..=code
                }
            };
            ranges.push(range);
        }

        if ranges.is_empty() {
            return Err(ParsePolicyError::Empty);
        }

        Ok(Self { ranges })
    }
}

fn parse_code(raw: &str) -> Result<u16, ParsePolicyError> {
    let raw = raw.trim();
    match raw.parse::<u16>() {
        Ok(code) if (100..=599).contains(&code) => Ok(code),
        _ => Err(ParsePolicyError::InvalidCode {
            value: raw.to_owned(),
        }),
    }
}
