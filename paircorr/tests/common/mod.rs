#![allow(dead_code)]

use paircorr::{PeriodicBox, Vector3D};

use rand::distr::{Distribution, Uniform};
use rand_xoshiro::Xoshiro256PlusPlus;
use rand_xoshiro::rand_core::SeedableRng;

/// Generate `n_points` random points uniformly distributed in `periodic_box`
pub fn random_points(periodic_box: &PeriodicBox, n_points: usize, seed: u64) -> Vec<Vector3D> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let uniform = Uniform::new(0.0, 1.0).unwrap();

    (0..n_points).map(|_| {
        let z = if periodic_box.is_2d() { 0.0 } else { uniform.sample(&mut rng) };
        let fractional = Vector3D::new(uniform.sample(&mut rng), uniform.sample(&mut rng), z);
        let mut position = periodic_box.cartesian(fractional);
        if periodic_box.is_2d() {
            position[2] = 0.0;
        }
        position
    }).collect()
}

/// Squared distances between all pairs of points, computed without cell
/// list. Pairs between a point and itself are skipped if `exclude_self` is
/// true.
pub fn all_distances2(periodic_box: &PeriodicBox, ref_points: &[Vector3D], points: &[Vector3D], exclude_self: bool) -> Vec<(usize, usize, f64)> {
    let mut distances = Vec::new();
    for (i, &ref_point) in ref_points.iter().enumerate() {
        for (j, &point) in points.iter().enumerate() {
            if exclude_self && i == j {
                continue;
            }
            distances.push((i, j, periodic_box.distance2(ref_point, point)));
        }
    }
    return distances;
}
