use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MycoError;

/// Portal slug used to query the JGI file listing, e.g. `Aspni7`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrganismId(String);

impl OrganismId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrganismId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrganismId {
    type Err = MycoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let is_valid = !normalized.is_empty()
            && !normalized
                .chars()
                .any(|ch| ch.is_whitespace() || ch == '/' || ch == '\\');
        if !is_valid {
            return Err(MycoError::InvalidOrganismId(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

/// Length window applied by the sequence filter; both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LengthWindow {
    pub min: usize,
    pub max: usize,
}

impl LengthWindow {
    pub fn new(min: usize, max: usize) -> Result<Self, MycoError> {
        if min > max {
            return Err(MycoError::InvalidConfig(format!(
                "min_length {min} exceeds max_length {max}"
            )));
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, length: usize) -> bool {
        (self.min..=self.max).contains(&length)
    }
}

impl Default for LengthWindow {
    fn default() -> Self {
        Self {
            min: 50,
            max: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_bounds_are_inclusive() {
        let window = LengthWindow::default();
        assert!(window.contains(50));
        assert!(window.contains(10_000));
        assert!(!window.contains(49));
        assert!(!window.contains(10_001));
    }

    #[test]
    fn organism_id_is_trimmed() {
        let id: OrganismId = "  Aspni7 ".parse().unwrap();
        assert_eq!(id.as_str(), "Aspni7");
    }
}
