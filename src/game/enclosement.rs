//! Enclosement (Shrinking Map)
//!
//! When the round timer crosses the threshold, hard blocks spiral inward
//! from the outer ring, crushing anything they land on. The spiral order is
//! precomputed once and consumed one tile per interval.

use serde::{Deserialize, Serialize};

/// How deep the spiral fills.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnclosementDepth {
    /// No shrinking at all.
    None,
    /// Outer two rings.
    #[default]
    #[serde(rename = "A Little")]
    ALittle,
    /// Outer four rings.
    #[serde(rename = "A Lot")]
    ALot,
    /// Every ring down to the center.
    #[serde(rename = "All The Way!")]
    AllTheWay,
}

/// Ring count for a full fill of a `width` x `height` grid.
pub fn max_rings(width: u8, height: u8) -> u32 {
    (u32::from(width.min(height)) + 1) / 2
}

/// Ring count the given depth fills.
pub fn rings_to_fill(depth: EnclosementDepth, width: u8, height: u8) -> u32 {
    match depth {
        EnclosementDepth::None => 0,
        EnclosementDepth::ALittle => 2,
        EnclosementDepth::ALot => 4,
        EnclosementDepth::AllTheWay => max_rings(width, height),
    }
}

/// Spiral fill order: each ring clockwise from its top-left corner, outer
/// ring first.
pub fn enclosement_order(width: u8, height: u8, depth: EnclosementDepth) -> Vec<(u8, u8)> {
    let rings = rings_to_fill(depth, width, height);
    let mut coords = Vec::new();
    let w = i32::from(width);
    let h = i32::from(height);

    for r in 0..rings as i32 {
        let left = r;
        let top = r;
        let right = w - 1 - r;
        let bottom = h - 1 - r;
        if left > right || top > bottom {
            break;
        }

        for x in left..=right {
            coords.push((x as u8, top as u8));
        }
        for y in top + 1..=bottom {
            coords.push((right as u8, y as u8));
        }
        if bottom != top {
            for x in (left..right).rev() {
                coords.push((x as u8, bottom as u8));
            }
        }
        if left != right {
            for y in (top + 1..bottom).rev() {
                coords.push((left as u8, y as u8));
            }
        }
    }

    coords
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_empty() {
        assert!(enclosement_order(15, 11, EnclosementDepth::None).is_empty());
    }

    #[test]
    fn test_outer_ring_order_5x4() {
        let order = enclosement_order(5, 4, EnclosementDepth::ALittle);
        let ring: Vec<(u8, u8)> = order.into_iter().take(14).collect();
        assert_eq!(
            ring,
            vec![
                (0, 0),
                (1, 0),
                (2, 0),
                (3, 0),
                (4, 0),
                (4, 1),
                (4, 2),
                (4, 3),
                (3, 3),
                (2, 3),
                (1, 3),
                (0, 3),
                (0, 2),
                (0, 1),
            ]
        );
    }

    #[test]
    fn test_all_the_way_covers_grid_once() {
        let order = enclosement_order(7, 5, EnclosementDepth::AllTheWay);
        assert_eq!(order.len(), 35);
        let mut seen = std::collections::BTreeSet::new();
        for c in order {
            assert!(seen.insert(c));
        }
    }

    #[test]
    fn test_rings_clamp_to_grid() {
        assert_eq!(max_rings(15, 11), 6);
        assert_eq!(rings_to_fill(EnclosementDepth::AllTheWay, 5, 5), 3);
    }
}
