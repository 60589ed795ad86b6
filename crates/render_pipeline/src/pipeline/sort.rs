//! Fixed-point sort keys
//!
//! Opaque keys grow with distance so ascending order is front-to-back.
//! Transparent keys grow as distance shrinks, plus a constant offset that
//! places every transparent key above every opaque key.

use crate::core::SortingConfig;
use crate::pipeline::draw_list::DrawListEntry;

// Bounded by max_key_magnitude, which validation keeps well inside i64
#[allow(clippy::cast_possible_truncation)]
fn encode(distance: f32, sorting: &SortingConfig) -> i64 {
    let clamped = f64::from(distance).clamp(-sorting.max_distance, sorting.max_distance);
    (clamped * sorting.depth_scale).round() as i64
}

/// Key for an opaque entry at `distance` along the camera forward axis
pub fn opaque_key(distance: f32, sorting: &SortingConfig) -> i64 {
    encode(distance, sorting)
}

/// Key for a transparent entry at `distance` along the camera forward axis
pub fn transparent_key(distance: f32, sorting: &SortingConfig) -> i64 {
    encode(-distance, sorting) + sorting.transparent_offset
}

/// Order a bucket by ascending key
///
/// Equal keys keep their build order, so sequential and parallel builds of
/// the same scene produce identical lists.
pub fn sort_bucket(bucket: &mut [DrawListEntry]) {
    bucket.sort_by_key(|entry| (entry.key, entry.order));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::EntityId;

    fn entry(key: i64, order: usize) -> DrawListEntry {
        DrawListEntry {
            entity: EntityId::default(),
            submeshes: vec![0],
            distance: 0.0,
            key,
            order,
        }
    }

    #[test]
    fn test_opaque_keys_increase_with_distance() {
        let sorting = SortingConfig::default();
        assert!(opaque_key(1.0, &sorting) < opaque_key(2.0, &sorting));
        assert_eq!(opaque_key(10.0, &sorting), 10_000_000);
        assert_eq!(opaque_key(-0.5, &sorting), -500_000);
    }

    #[test]
    fn test_transparent_keys_decrease_with_distance() {
        let sorting = SortingConfig::default();
        assert!(transparent_key(1.0, &sorting) > transparent_key(2.0, &sorting));
        assert_eq!(transparent_key(5.0, &sorting), sorting.transparent_offset - 5_000_000);
    }

    #[test]
    fn test_transparent_always_above_opaque() {
        let sorting = SortingConfig::default();
        let extremes = [f32::MIN, -1.0e9, -3.0, 0.0, 3.0, 1.0e9, f32::MAX];
        for &opaque in &extremes {
            for &transparent in &extremes {
                assert!(transparent_key(transparent, &sorting) > opaque_key(opaque, &sorting));
            }
        }
    }

    #[test]
    fn test_sort_is_stable_on_equal_keys() {
        let mut bucket = vec![entry(5, 0), entry(1, 1), entry(5, 2), entry(1, 3)];
        sort_bucket(&mut bucket);
        let orders: Vec<_> = bucket.iter().map(|e| e.order).collect();
        assert_eq!(orders, [1, 3, 0, 2]);
    }
}
