//! Discretizes object positions into a 4-bit state code and a reward.
//!
//! The container position splits the floor into four quadrants. A quadrant
//! is balanced when it holds as many objects of the first color group as of
//! the second. Objects lying exactly on either axis through the container
//! are not counted in any quadrant.

use std::fmt;

use crate::error::{MixError, Result};

/// Number of quadrants, and therefore of bits in a state code.
pub const QUADRANTS: usize = 4;

/// Which quadrants are balanced, one bit each.
///
/// Bit 0 is quadrant A (left, above), bit 1 quadrant B (right, above),
/// bit 2 quadrant C (left, below), bit 3 quadrant D (right, below).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StateCode(u8);

impl StateCode {
    /// Every quadrant balanced.
    pub const GOAL: StateCode = StateCode(15);

    pub fn new(value: u8) -> Result<Self> {
        if value > Self::GOAL.0 {
            return Err(MixError::InvalidStateCode(value));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_goal(self) -> bool {
        self == Self::GOAL
    }

    pub fn is_balanced(self, quadrant: usize) -> bool {
        quadrant < QUADRANTS && self.0 & (1 << quadrant) != 0
    }

    pub fn balanced_quadrants(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Network input: the code as four 0/1 floats, most significant bit first.
    pub fn bits(self) -> [f32; QUADRANTS] {
        let mut bits = [0.0; QUADRANTS];
        for (i, bit) in bits.iter_mut().enumerate() {
            if self.0 & (1 << (QUADRANTS - 1 - i)) != 0 {
                *bit = 1.0;
            }
        }
        bits
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04b}", self.0)
    }
}

/// Per-quadrant object counts, `[group one, group two]`, indexed like the
/// bits of [`StateCode`].
pub type QuadrantCounts = [[usize; 2]; QUADRANTS];

/// One encoded look at the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub state: StateCode,
    pub reward: f32,
    pub counts: QuadrantCounts,
}

fn quadrant_of(container: [f64; 2], object: [f64; 2]) -> Option<usize> {
    let [bx, by] = container;
    let [x, y] = object;
    if x < bx && y > by {
        Some(0)
    } else if x > bx && y > by {
        Some(1)
    } else if x < bx && y < by {
        Some(2)
    } else if x > bx && y < by {
        Some(3)
    } else {
        None
    }
}

/// Counts each color group per quadrant.
///
/// The first `objects.len() / 2` objects form group one, the rest group two.
pub fn count_quadrants(container: [f64; 2], objects: &[[f64; 2]]) -> QuadrantCounts {
    let half = objects.len() / 2;
    let mut counts = [[0; 2]; QUADRANTS];
    for (i, &object) in objects.iter().enumerate() {
        if let Some(q) = quadrant_of(container, object) {
            let group = usize::from(i >= half);
            counts[q][group] += 1;
        }
    }
    counts
}

/// Encodes the scene: +1 reward per balanced quadrant, -1 per unbalanced one.
///
/// Recomputed from scratch on every call.
pub fn encode(container: [f64; 2], objects: &[[f64; 2]]) -> Observation {
    let counts = count_quadrants(container, objects);
    let mut code = 0u8;
    let mut reward = 0.0;
    for (q, [one, two]) in counts.iter().enumerate() {
        if one == two {
            code |= 1 << q;
            reward += 1.0;
        } else {
            reward -= 1.0;
        }
    }
    Observation {
        state: StateCode(code),
        reward,
        counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_are_most_significant_first() {
        assert_eq!(StateCode::new(0).unwrap().bits(), [0.0, 0.0, 0.0, 0.0]);
        assert_eq!(StateCode::new(1).unwrap().bits(), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(StateCode::new(6).unwrap().bits(), [0.0, 1.0, 1.0, 0.0]);
        assert_eq!(StateCode::new(8).unwrap().bits(), [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(StateCode::GOAL.bits(), [1.0; 4]);
    }

    #[test]
    fn out_of_range_code_is_rejected() {
        assert!(matches!(
            StateCode::new(16),
            Err(MixError::InvalidStateCode(16))
        ));
    }

    #[test]
    fn display_is_zero_padded_binary() {
        assert_eq!(StateCode::new(5).unwrap().to_string(), "0101");
    }

    #[test]
    fn quadrant_layout_matches_bits() {
        let c = [0.0, 0.0];
        assert_eq!(quadrant_of(c, [-1.0, 1.0]), Some(0));
        assert_eq!(quadrant_of(c, [1.0, 1.0]), Some(1));
        assert_eq!(quadrant_of(c, [-1.0, -1.0]), Some(2));
        assert_eq!(quadrant_of(c, [1.0, -1.0]), Some(3));
        assert_eq!(quadrant_of(c, [0.0, 1.0]), None);
        assert_eq!(quadrant_of(c, [1.0, 0.0]), None);
    }
}
