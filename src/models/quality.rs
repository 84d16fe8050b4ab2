//! Self-reported recall quality for a single review.

use crate::error::ReviewError;
use std::fmt;

/// The three grades a learner can give. Only the raw values `1`, `3` and `5`
/// are accepted; nothing in between is rounded to a neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Quality {
    Forgot = 1,
    Hard = 3,
    Easy = 5,
}

impl Quality {
    pub fn is_lapse(self) -> bool {
        self == Quality::Forgot
    }
}

impl TryFrom<u8> for Quality {
    type Error = ReviewError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Quality::Forgot),
            3 => Ok(Quality::Hard),
            5 => Ok(Quality::Easy),
            other => Err(ReviewError::InvalidQuality(other)),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Quality::Forgot => "forgot",
            Quality::Hard => "hard",
            Quality::Easy => "easy",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_only_three_grades() {
        assert_eq!(Quality::try_from(1).unwrap(), Quality::Forgot);
        assert_eq!(Quality::try_from(3).unwrap(), Quality::Hard);
        assert_eq!(Quality::try_from(5).unwrap(), Quality::Easy);

        for value in [0u8, 2, 4, 6, 255] {
            assert!(matches!(
                Quality::try_from(value),
                Err(ReviewError::InvalidQuality(v)) if v == value
            ));
        }
    }
}
