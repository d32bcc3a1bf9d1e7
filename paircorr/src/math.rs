//! Small numerical helpers shared by the pairwise statistics.
use std::f64::consts::PI;

/// Convert a non-negative `value` (typically `r / dr`) to a histogram bin by
/// truncation toward zero. Returns `None` when the value does not fall inside
/// `[0, n_bins)`, which happens for distances right at the cutoff because of
/// floating point rounding.
#[inline]
pub fn truncate_to_bin(value: f64, n_bins: usize) -> Option<usize> {
    // this also rejects NaN
    if !(value >= 0.0 && value < n_bins as f64) {
        return None;
    }

    let bin = truncate(value) as usize;
    if bin < n_bins {
        Some(bin)
    } else {
        None
    }
}

#[cfg(all(target_arch = "x86_64", target_feature = "sse2"))]
#[inline]
#[allow(unused_unsafe)]
fn truncate(value: f64) -> i64 {
    use std::arch::x86_64::{_mm_cvttsd_si64, _mm_set_sd};
    // SAFETY: sse2 is statically enabled for this target
    unsafe { _mm_cvttsd_si64(_mm_set_sd(value)) }
}

#[cfg(not(all(target_arch = "x86_64", target_feature = "sse2")))]
#[inline]
fn truncate(value: f64) -> i64 {
    value as i64
}

/// Center of the bin between `r_min` and `r_max`, weighted by the area of
/// the corresponding ring
pub fn shell_center(r_min: f64, r_max: f64) -> f64 {
    let r_min_3 = r_min * r_min * r_min;
    let r_max_3 = r_max * r_max * r_max;
    2.0 / 3.0 * (r_max_3 - r_min_3) / (r_max * r_max - r_min * r_min)
}

/// Volume of the shell between `r_min` and `r_max`, or area of the ring
/// between them in 2D
pub fn shell_volume(r_min: f64, r_max: f64, is_2d: bool) -> f64 {
    sphere_volume(r_max, is_2d) - sphere_volume(r_min, is_2d)
}

/// Volume of the sphere of the given `radius`, or area of the disk in 2D
pub fn sphere_volume(radius: f64, is_2d: bool) -> f64 {
    if is_2d {
        PI * radius * radius
    } else {
        4.0 / 3.0 * PI * radius * radius * radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn truncation() {
        assert_eq!(truncate_to_bin(0.0, 3), Some(0));
        assert_eq!(truncate_to_bin(0.999, 3), Some(0));
        assert_eq!(truncate_to_bin(1.0, 3), Some(1));
        assert_eq!(truncate_to_bin(2.5, 3), Some(2));
        assert_eq!(truncate_to_bin(2.9999999, 3), Some(2));

        assert_eq!(truncate_to_bin(3.0, 3), None);
        assert_eq!(truncate_to_bin(1e300, 3), None);
        assert_eq!(truncate_to_bin(-0.5, 3), None);
        assert_eq!(truncate_to_bin(f64::NAN, 3), None);
        assert_eq!(truncate_to_bin(f64::INFINITY, 3), None);
    }

    #[test]
    fn truncation_matches_cast() {
        for i in 0..1000 {
            let value = i as f64 * 0.0137;
            assert_eq!(truncate(value), value as i64);
        }
    }

    #[test]
    fn shells() {
        // first shell center is 2/3 of the bin width
        assert_relative_eq!(shell_center(0.0, 1.0), 2.0 / 3.0);
        assert_relative_eq!(shell_center(1.0, 2.0), 2.0 / 3.0 * 7.0 / 3.0);
        // the weighted center is above the arithmetic mean
        assert!(shell_center(1.0, 2.0) > 1.5);

        assert_relative_eq!(sphere_volume(1.0, true), PI);
        assert_relative_eq!(sphere_volume(1.0, false), 4.0 / 3.0 * PI);
        assert_relative_eq!(shell_volume(1.0, 2.0, false), 4.0 / 3.0 * PI * 7.0);
        assert_relative_eq!(shell_volume(1.0, 2.0, true), PI * 3.0);
    }
}
