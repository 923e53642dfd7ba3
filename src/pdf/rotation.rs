//! Page rotation deltas

use crate::error::{Error, Result};
use serde::Serialize;

/// A clockwise rotation delta applied on top of each page's current rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rotation(i64);

impl Rotation {
    /// Accepts the quarter turns offered by the rotate tool: 90, 180 or 270.
    pub fn new(degrees: i32) -> Result<Self> {
        match degrees {
            90 | 180 | 270 => Ok(Self(degrees as i64)),
            _ => Err(Error::InvalidRotation { degrees }),
        }
    }

    pub fn degrees(self) -> i64 {
        self.0
    }

    /// New page angle for a page currently at `current` degrees.
    pub fn apply(self, current: i64) -> i64 {
        rotate_angle(current, self.0)
    }
}

/// `(current + delta) mod 360`, always in `0..360`.
pub fn rotate_angle(current: i64, delta: i64) -> i64 {
    (current + delta).rem_euclid(360)
}
