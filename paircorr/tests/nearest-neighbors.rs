use approx::assert_relative_eq;

use paircorr::{Error, NearestNeighbors, NearestNeighborsParameters, PeriodicBox, Vector3D};

mod common;
use common::{all_distances2, random_points};

#[test]
fn radius_growth() {
    // regular tetrahedron with a point at its center, all edges are 0.52
    let center = Vector3D::new(5.0, 5.0, 5.0);
    let scale = 0.52 / f64::sqrt(8.0);
    let points = [
        center + scale * Vector3D::new(1.0, 1.0, 1.0),
        center + scale * Vector3D::new(1.0, -1.0, -1.0),
        center + scale * Vector3D::new(-1.0, 1.0, -1.0),
        center + scale * Vector3D::new(-1.0, -1.0, 1.0),
        center,
    ];

    let periodic_box = PeriodicBox::cubic(10.0).unwrap();
    let mut nn = NearestNeighbors::new(NearestNeighborsParameters {
        max_radius: 0.5,
        n_neighbors: 3,
    }).unwrap();

    nn.compute(periodic_box, &points, &points).unwrap();

    // the vertices only have one neighbor closer than 0.5, a single growth
    // step is enough to find the other vertices
    assert_relative_eq!(nn.max_radius(), 0.55, max_relative = 1e-12);

    for i in 0..4 {
        let neighbors = nn.neighbor_list(i);
        assert_eq!(neighbors[0], 4);
        assert!(!neighbors.iter().any(|&j| j == i));

        let distances2 = nn.distances2();
        assert_relative_eq!(distances2[[i, 1]], 0.52 * 0.52, max_relative = 1e-12);
        assert_relative_eq!(distances2[[i, 2]], 0.52 * 0.52, max_relative = 1e-12);
    }

    let mut center_neighbors = nn.neighbor_list(4).to_vec();
    center_neighbors.sort_unstable();
    assert_eq!(center_neighbors.len(), 3);
    assert!(center_neighbors.iter().all(|&j| j < 4));
}

#[test]
fn neighbor_at_radius_is_excluded() {
    let periodic_box = PeriodicBox::cubic(10.0).unwrap();
    let points = [Vector3D::new(1.0, 1.0, 1.0), Vector3D::new(3.0, 1.0, 1.0)];

    let mut nn = NearestNeighbors::new(NearestNeighborsParameters {
        max_radius: 2.0,
        n_neighbors: 1,
    }).unwrap();
    nn.compute(periodic_box, &points, &points).unwrap();

    assert!(nn.max_radius() > 2.0);
    assert_eq!(nn.neighbor_list(0).to_vec(), [1]);
    assert_eq!(nn.neighbor_list(1).to_vec(), [0]);
    assert_eq!(nn.distances2()[[0, 0]], 4.0);
}

fn check_brute_force(periodic_box: PeriodicBox, n_neighbors: usize, seed: u64) {
    let points = random_points(&periodic_box, 200, seed);
    let ref_points = random_points(&periodic_box, 50, seed + 1000);

    let mut nn = NearestNeighbors::new(NearestNeighborsParameters {
        max_radius: 0.5,
        n_neighbors: n_neighbors,
    }).unwrap();

    for (ref_points, is_same) in [(&points, true), (&ref_points, false)] {
        nn.compute(periodic_box, ref_points, &points).unwrap();
        assert_eq!(nn.neighbors().dim(), (ref_points.len(), n_neighbors));

        let mut all = vec![Vec::new(); ref_points.len()];
        // the neighbor with the same index is always skipped
        for (i, j, distance2) in all_distances2(&periodic_box, ref_points, &points, true) {
            all[i].push((distance2, j));
        }

        for (i, mut expected) in all.into_iter().enumerate() {
            expected.sort_by(|a, b| a.0.total_cmp(&b.0));

            let neighbors = nn.neighbor_list(i);
            let distances2 = nn.distances2().row(i).to_owned();

            // sorted by distance
            assert!(distances2.windows(2).into_iter().all(|w| w[0] <= w[1]));

            for k in 0..n_neighbors {
                assert_eq!(distances2[k], expected[k].0, "wrong distance for point {} ({})", i, is_same);
                assert_eq!(neighbors[k], expected[k].1, "wrong neighbor for point {} ({})", i, is_same);
            }

            // every other point is further away
            let last = distances2[n_neighbors - 1];
            assert!(expected[n_neighbors..].iter().all(|&(distance2, _)| distance2 >= last));
        }
    }
}

#[test]
fn brute_force_cubic() {
    check_brute_force(PeriodicBox::cubic(10.0).unwrap(), 6, 0);
}

#[test]
fn brute_force_triclinic() {
    check_brute_force(PeriodicBox::triclinic(8.0, 9.0, 10.0, 85.0, 95.0, 80.0).unwrap(), 4, 1);
}

#[test]
fn brute_force_2d() {
    check_brute_force(PeriodicBox::square(10.0).unwrap(), 5, 2);
}

#[test]
fn too_many_neighbors() {
    let periodic_box = PeriodicBox::cubic(10.0).unwrap();
    let points = random_points(&periodic_box, 10, 7);

    let mut nn = NearestNeighbors::new(NearestNeighborsParameters {
        max_radius: 1.0,
        n_neighbors: 11,
    }).unwrap();
    let result = nn.compute(periodic_box, &points, &points);
    assert!(matches!(result, Err(Error::InvalidParameter(_))));

    // all the other points are neighbors, the search ends up looking at
    // every point
    nn.set_n_neighbors(9).unwrap();
    nn.compute(periodic_box, &points, &points).unwrap();
    assert_eq!(nn.max_radius(), 5.0);

    // each point would need to be its own neighbor
    nn.set_n_neighbors(10).unwrap();
    let result = nn.compute(periodic_box, &points, &points);
    assert!(matches!(result, Err(Error::Geometry(_))));
}
