//! # Utility Module
//!
//! Small numeric helpers shared by the octree builder and the geometry code.
//!
//! ## Example Function: `dedup_sorted`
//!
//! `dedup_sorted` collapses runs of nearly equal values in a sorted list,
//! keeping the first value of every run.

/// Removes values closer than `epsilon` to the value kept before them.
///
/// # Arguments
///
/// * `values` - A list sorted in ascending order.
/// * `epsilon` - The largest difference still treated as equal.
///
/// # Examples
///
/// ```
/// use sector_pvs::utils::util::dedup_sorted;
///
/// let mut values = vec![1.0, 1.00001, 2.0, 3.0, 3.00002];
/// dedup_sorted(&mut values, 1e-4);
/// assert_eq!(values, vec![1.0, 2.0, 3.0]);
/// ```
pub fn dedup_sorted(values: &mut Vec<f32>, epsilon: f32) {
    values.dedup_by(|next, kept| (*next - *kept).abs() <= epsilon);
}

/// True when `a` and `b` differ by at most `epsilon`.
pub fn approx_eq(a: f32, b: f32, epsilon: f32) -> bool {
    (a - b).abs() <= epsilon
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_keeps_first_of_run() {
        // A chain of close values collapses onto the first one.
        let mut values = vec![0.0, 0.00005, 0.0001, 0.5];
        dedup_sorted(&mut values, 1e-4);
        assert_eq!(values, vec![0.0, 0.5]);
    }

    #[test]
    fn test_dedup_empty() {
        let mut values: Vec<f32> = Vec::new();
        dedup_sorted(&mut values, 1e-4);
        assert!(values.is_empty());
    }

    #[test]
    fn test_approx_eq() {
        assert!(approx_eq(1.0, 1.00005, 1e-4));
        assert!(!approx_eq(1.0, 1.01, 1e-4));
    }
}
