//! Warning/critical bounds shared by every threshold based check

use std::fmt;

use thiserror::Error;

/// Raised when a warning bound would trigger after the critical bound
#[derive(Debug, Error, PartialEq, Clone, Copy)]
#[error("warning value {warn} can not be greater than critical value {crit}")]
pub struct InvalidThreshold {
    pub warn: f64,
    pub crit: f64,
}

/// A validated warning/critical pair
///
/// Values are not bounded to `[0, 1]`: fractional checks interpret them as a
/// ratio of a whole, count checks as a number of entities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    warn: f64,
    crit: f64,
}

impl ThresholdPolicy {
    pub fn new<W: Into<f64>, C: Into<f64>>(warn: W, crit: C) -> Result<Self, InvalidThreshold> {
        let (warn, crit) = (warn.into(), crit.into());
        if warn > crit {
            return Err(InvalidThreshold { warn, crit });
        }
        Ok(ThresholdPolicy { warn, crit })
    }

    /// The default for checks that compare a used/total ratio
    pub fn fractions() -> Self {
        ThresholdPolicy {
            warn: 0.75,
            crit: 0.9,
        }
    }

    /// The default for checks that count failures
    pub fn counts() -> Self {
        ThresholdPolicy {
            warn: 7.0,
            crit: 15.0,
        }
    }

    /// Replace either side of `self` and validate the resulting pair
    pub fn with_overrides(
        &self,
        warn: Option<f64>,
        crit: Option<f64>,
    ) -> Result<Self, InvalidThreshold> {
        ThresholdPolicy::new(warn.unwrap_or(self.warn), crit.unwrap_or(self.crit))
    }

    pub fn warn(&self) -> f64 {
        self.warn
    }

    pub fn crit(&self) -> f64 {
        self.crit
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        ThresholdPolicy::fractions()
    }
}

impl fmt::Display for ThresholdPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "warn={} crit={}", self.warn, self.crit)
    }
}
