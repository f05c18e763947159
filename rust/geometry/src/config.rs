// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Numerical tolerances shared by overlap detection and clipping.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tunable tolerances. All distances are in map units (usually metres).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    /// Contacts closer than this to a line endpoint or a shared polygon vertex
    /// count as touching rather than crossing.
    pub touch_epsilon: f64,
    /// Clipped polygons with a smaller XZ area are dropped.
    pub min_clip_area: f64,
    /// Rings with a smaller area are rejected as degenerate.
    pub degenerate_area: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            touch_epsilon: 1e-3,
            min_clip_area: 1e-9,
            degenerate_area: 1e-9,
        }
    }
}

impl Tolerances {
    /// Reject non-finite or negative values
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("touch_epsilon", self.touch_epsilon),
            ("min_clip_area", self.min_clip_area),
            ("degenerate_area", self.degenerate_area),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Builder-style override of the touch tolerance
    pub fn with_touch_epsilon(mut self, touch_epsilon: f64) -> Self {
        self.touch_epsilon = touch_epsilon;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Tolerances::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_negative_and_nan() {
        let negative = Tolerances::default().with_touch_epsilon(-1.0);
        assert!(matches!(negative.validate(), Err(Error::InvalidConfig(_))));

        let nan = Tolerances {
            min_clip_area: f64::NAN,
            ..Tolerances::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let tolerances: Tolerances = serde_json::from_str(r#"{"touch_epsilon": 0.01}"#).unwrap();
        assert_eq!(tolerances.touch_epsilon, 0.01);
        assert_eq!(tolerances.min_clip_area, Tolerances::default().min_clip_area);

        let json = serde_json::to_string(&tolerances).unwrap();
        let back: Tolerances = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tolerances);
    }
}
