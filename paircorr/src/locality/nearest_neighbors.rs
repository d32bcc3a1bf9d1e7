use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{Array2, ArrayView1, ArrayView2, Zip};
use thread_local::ThreadLocal;

use crate::{Error, Vector3D};
use super::{CellList, PeriodicBox};

/// Factor used to grow the search radius when some points did not find
/// enough neighbors
const RADIUS_GROWTH: f64 = 1.1;

/// Parameters for the k-nearest neighbors search
#[derive(Debug, Clone, Copy, PartialEq)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NearestNeighborsParameters {
    /// Initial search radius. The radius is increased as needed until all
    /// points have at least `n_neighbors` neighbors inside of it.
    pub max_radius: f64,
    /// Number of neighbors to find for each reference point
    pub n_neighbors: usize,
}

impl NearestNeighborsParameters {
    fn validate(&self) -> Result<(), Error> {
        if !(self.max_radius > 0.0 && self.max_radius.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "max_radius must be positive and finite, got {}", self.max_radius
            )));
        }

        if self.n_neighbors == 0 {
            return Err(Error::InvalidParameter(
                "n_neighbors must be at least 1".into()
            ));
        }

        Ok(())
    }
}

/// Where to look for candidate neighbors during a search pass
#[derive(Clone, Copy)]
enum Candidates<'a> {
    /// Only look in the adjacent cells, up to the given squared radius
    Cells(&'a CellList, f64),
    /// Look at every point
    All(&'a PeriodicBox),
}

/// Find the `k` nearest neighbors of a set of reference points among another
/// set of points, in a periodic box.
///
/// The search starts by looking for neighbors within `max_radius` of the
/// reference points, using a [`CellList`]. If any reference point has less
/// than `k` neighbors inside this radius, the radius is increased by 10% and
/// the search is done again for all points. The grown radius is kept for the
/// next calls to [`NearestNeighbors::compute`].
///
/// The radius can not grow above half of the box size, since the cell list
/// would no longer be able to find all neighbors. When reaching this limit,
/// the last search pass considers all points, without any radius.
pub struct NearestNeighbors {
    parameters: NearestNeighborsParameters,
    /// current search radius
    max_radius: f64,
    cell_list: Option<CellList>,
    /// per-thread buffer for the candidate (distance², index) pairs
    candidates: ThreadLocal<RefCell<Vec<(f64, usize)>>>,
    neighbors: Array2<usize>,
    distances2: Array2<f64>,
}

impl std::fmt::Debug for NearestNeighbors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NearestNeighbors {{ n_neighbors: {}, max_radius: {} }}", self.parameters.n_neighbors, self.max_radius)
    }
}

impl NearestNeighbors {
    /// Create a new `NearestNeighbors` with the given parameters
    pub fn new(parameters: NearestNeighborsParameters) -> Result<NearestNeighbors, Error> {
        parameters.validate()?;

        return Ok(NearestNeighbors {
            parameters: parameters,
            max_radius: parameters.max_radius,
            cell_list: None,
            candidates: ThreadLocal::new(),
            neighbors: Array2::zeros((0, parameters.n_neighbors)),
            distances2: Array2::zeros((0, parameters.n_neighbors)),
        });
    }

    /// Create a new `NearestNeighbors` from JSON parameters
    pub fn from_json(parameters: &str) -> Result<NearestNeighbors, Error> {
        let parameters = serde_json::from_str::<NearestNeighborsParameters>(parameters)?;
        return NearestNeighbors::new(parameters);
    }

    /// Get the parameters used to create this `NearestNeighbors` as JSON
    pub fn parameters(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(&self.parameters)?)
    }

    /// Get the number of neighbors to find for each point
    pub fn n_neighbors(&self) -> usize {
        self.parameters.n_neighbors
    }

    /// Change the number of neighbors to find for each point. The results
    /// will be re-allocated by the next call to `compute`.
    pub fn set_n_neighbors(&mut self, n_neighbors: usize) -> Result<(), Error> {
        let parameters = NearestNeighborsParameters {
            n_neighbors: n_neighbors,
            ..self.parameters
        };
        parameters.validate()?;
        self.parameters = parameters;
        Ok(())
    }

    /// Get the current search radius. This can be larger than the initial
    /// radius if it had to grow to find enough neighbors.
    pub fn max_radius(&self) -> f64 {
        self.max_radius
    }

    /// Set the search radius for the next call to `compute`
    pub fn set_max_radius(&mut self, max_radius: f64) -> Result<(), Error> {
        let parameters = NearestNeighborsParameters {
            max_radius: max_radius,
            ..self.parameters
        };
        parameters.validate()?;
        self.parameters = parameters;
        self.max_radius = max_radius;
        Ok(())
    }

    /// Get the number of reference points in the last call to `compute`
    pub fn n_ref(&self) -> usize {
        self.neighbors.nrows()
    }

    /// Get the indexes of the neighbors of all reference points, sorted by
    /// increasing distance. This is a `n_ref x n_neighbors` array.
    pub fn neighbors(&self) -> ArrayView2<'_, usize> {
        self.neighbors.view()
    }

    /// Get the squared distances to the neighbors of all reference points, in
    /// the same order as [`NearestNeighbors::neighbors`].
    pub fn distances2(&self) -> ArrayView2<'_, f64> {
        self.distances2.view()
    }

    /// Get the indexes of the neighbors of the reference point `i`
    pub fn neighbor_list(&self, i: usize) -> ArrayView1<'_, usize> {
        self.neighbors.row(i)
    }

    /// Find the `n_neighbors` nearest neighbors of each of the `ref_points`
    /// among `points`. A reference point is never its own neighbor: the
    /// point `i` in `points` is skipped when searching neighbors of the
    /// reference point `i`.
    #[time_graph::instrument(name = "NearestNeighbors::compute")]
    pub fn compute(&mut self, periodic_box: PeriodicBox, ref_points: &[Vector3D], points: &[Vector3D]) -> Result<(), Error> {
        if ref_points.is_empty() || points.is_empty() {
            return Err(Error::EmptyInput(
                "nearest neighbors search requires at least one point and one reference point".into()
            ));
        }

        let n_neighbors = self.parameters.n_neighbors;
        if n_neighbors > points.len() {
            return Err(Error::InvalidParameter(format!(
                "can not find {} neighbors among {} points", n_neighbors, points.len()
            )));
        }

        let distances = periodic_box.nearest_plane_distance();
        let mut radius_limit = f64::min(distances[0], distances[1]);
        if !periodic_box.is_2d() {
            radius_limit = f64::min(radius_limit, distances[2]);
        }
        radius_limit *= 0.5;

        let shape = (ref_points.len(), n_neighbors);
        if self.neighbors.dim() != shape {
            self.neighbors = Array2::zeros(shape);
            self.distances2 = Array2::zeros(shape);
        }

        loop {
            let deficit = if self.max_radius < radius_limit {
                let cell_list = match self.cell_list.take() {
                    Some(mut cell_list) if *cell_list.periodic_box() == periodic_box => {
                        cell_list.set_cell_width(self.max_radius)?;
                        cell_list
                    }
                    _ => CellList::new(periodic_box, self.max_radius)?,
                };
                let cell_list = self.cell_list.insert(cell_list);
                cell_list.compute(periodic_box, points)?;

                search_pass(
                    &self.candidates,
                    &mut self.neighbors,
                    &mut self.distances2,
                    ref_points,
                    points,
                    Candidates::Cells(cell_list, self.max_radius * self.max_radius),
                )
            } else {
                search_pass(
                    &self.candidates,
                    &mut self.neighbors,
                    &mut self.distances2,
                    ref_points,
                    points,
                    Candidates::All(&periodic_box),
                )
            };

            if deficit == 0 {
                return Ok(());
            }

            if self.max_radius >= radius_limit {
                return Err(Error::Geometry(format!(
                    "could not find {} neighbors for all reference points, \
                    {} neighbors are missing", n_neighbors, deficit
                )));
            }

            self.max_radius *= RADIUS_GROWTH;
            if self.max_radius >= radius_limit {
                self.max_radius = radius_limit;
                log::warn!(
                    "nearest neighbors search radius reached half of the box size ({}), \
                    searching among all points", radius_limit
                );
            } else {
                log::debug!(
                    "missing {} neighbors, growing the search radius to {}",
                    deficit, self.max_radius
                );
            }
        }
    }
}

/// Run a single search pass for all reference points, and return the total
/// number of missing neighbors. Rows without missing neighbors are
/// overwritten with the new results.
fn search_pass(
    candidates: &ThreadLocal<RefCell<Vec<(f64, usize)>>>,
    neighbors: &mut Array2<usize>,
    distances2: &mut Array2<f64>,
    ref_points: &[Vector3D],
    points: &[Vector3D],
    search: Candidates<'_>,
) -> usize {
    let n_neighbors = neighbors.ncols();
    let deficit = AtomicUsize::new(0);

    Zip::indexed(neighbors.rows_mut())
        .and(distances2.rows_mut())
        .par_for_each(|i, mut neighbors, mut distances2| {
            let mut buffer = candidates.get_or(|| RefCell::new(Vec::new())).borrow_mut();
            buffer.clear();

            let ref_point = ref_points[i];
            match search {
                Candidates::Cells(cell_list, max_radius2) => {
                    let periodic_box = cell_list.periodic_box();
                    for &cell in cell_list.cell_neighbors(cell_list.cell_of(ref_point)) {
                        for j in cell_list.iter_cell(cell) {
                            if i == j {
                                continue;
                            }

                            let distance2 = periodic_box.distance2(ref_point, points[j]);
                            if distance2 < max_radius2 {
                                buffer.push((distance2, j));
                            }
                        }
                    }
                }
                Candidates::All(periodic_box) => {
                    for (j, &point) in points.iter().enumerate() {
                        if i != j {
                            buffer.push((periodic_box.distance2(ref_point, point), j));
                        }
                    }
                }
            }

            if buffer.len() < n_neighbors {
                deficit.fetch_add(n_neighbors - buffer.len(), Ordering::Relaxed);
                return;
            }

            buffer.sort_by(|a, b| a.0.total_cmp(&b.0));
            for (k, &(distance2, j)) in buffer.iter().take(n_neighbors).enumerate() {
                neighbors[k] = j;
                distances2[k] = distance2;
            }
        });

    return deficit.into_inner();
}
