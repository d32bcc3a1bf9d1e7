use ndarray::{Array1, ArrayView1, Zip};

use crate::locality::{CellList, PeriodicBox};
use crate::math::sphere_volume;
use crate::{Error, Vector3D};

/// Parameters for local density calculations
#[derive(Debug, Clone, Copy, PartialEq)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LocalDensityParameters {
    /// Radius of the sphere (or disk in 2D) in which neighbors are counted
    pub cutoff: f64,
    /// Volume (or area in 2D) of a single point
    pub volume: f64,
    /// Diameter of the points, neighbors closer than `diameter / 2` to the
    /// edge of the sphere (inside or outside) only partially contribute to
    /// the density
    pub diameter: f64,
}

/// Local density around a set of reference points.
///
/// Each neighbor contributes a weight of 1 if it is entirely inside the
/// cutoff sphere, and a weight decreasing linearly to 0 if it straddles the
/// edge of the sphere, i.e. if its center is within `diameter / 2` of the
/// edge. Neighbors are then searched up to `cutoff + diameter / 2`, which
/// must be less than half of the box size. Reference points in the set of
/// neighbor points contribute to their own density.
#[derive(Debug)]
pub struct LocalDensity {
    parameters: LocalDensityParameters,
    cell_list: Option<CellList>,
    /// box used in the last successful call to `compute`
    periodic_box: Option<PeriodicBox>,
    num_neighbors: Array1<f64>,
    density: Array1<f64>,
}

impl LocalDensity {
    /// Create a new `LocalDensity` with the given parameters
    pub fn new(parameters: LocalDensityParameters) -> Result<LocalDensity, Error> {
        if !(parameters.cutoff > 0.0 && parameters.cutoff.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "cutoff must be positive and finite, got {}", parameters.cutoff
            )));
        }

        if !(parameters.volume > 0.0 && parameters.volume.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "volume must be positive and finite, got {}", parameters.volume
            )));
        }

        if !(parameters.diameter >= 0.0 && parameters.diameter.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "diameter must be positive or zero, got {}", parameters.diameter
            )));
        }

        return Ok(LocalDensity {
            parameters: parameters,
            cell_list: None,
            periodic_box: None,
            num_neighbors: Array1::zeros(0),
            density: Array1::zeros(0),
        });
    }

    /// Create a new `LocalDensity` from JSON parameters
    pub fn from_json(parameters: &str) -> Result<LocalDensity, Error> {
        let parameters = serde_json::from_str::<LocalDensityParameters>(parameters)?;
        return LocalDensity::new(parameters);
    }

    /// Get the parameters used to create this `LocalDensity` as JSON
    pub fn parameters(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(&self.parameters)?)
    }

    /// Compute the local density around each of the `ref_points`, using
    /// `points` as neighbors. This overwrites the results of previous calls.
    #[time_graph::instrument(name = "LocalDensity::compute")]
    pub fn compute(&mut self, periodic_box: PeriodicBox, ref_points: &[Vector3D], points: &[Vector3D]) -> Result<(), Error> {
        if ref_points.is_empty() {
            return Err(Error::EmptyInput("local density requires at least one reference point".into()));
        }

        let cutoff = self.parameters.cutoff;
        let diameter = self.parameters.diameter;
        let half_diameter = 0.5 * diameter;
        let search_radius = cutoff + half_diameter;

        let cell_list = match self.cell_list.take() {
            Some(cell_list) => cell_list,
            None => CellList::new(periodic_box, search_radius)?,
        };
        let cell_list = self.cell_list.insert(cell_list);
        cell_list.compute(periodic_box, points)?;
        let cell_list = &*cell_list;

        if self.num_neighbors.len() != ref_points.len() {
            self.num_neighbors = Array1::zeros(ref_points.len());
            self.density = Array1::zeros(ref_points.len());
        }

        let search_radius2 = search_radius * search_radius;
        let normalization = self.parameters.volume / sphere_volume(cutoff, periodic_box.is_2d());

        Zip::indexed(&mut self.num_neighbors)
            .and(&mut self.density)
            .par_for_each(|i, num_neighbors, density| {
                let ref_point = ref_points[i];

                let mut count = 0.0;
                for &cell in cell_list.cell_neighbors(cell_list.cell_of(ref_point)) {
                    for j in cell_list.iter_cell(cell) {
                        let distance2 = periodic_box.distance2(ref_point, points[j]);
                        if distance2 >= search_radius2 {
                            continue;
                        }

                        let distance = distance2.sqrt();
                        if diameter <= 0.0 || distance < cutoff - half_diameter {
                            count += 1.0;
                        } else {
                            count += (cutoff + half_diameter - distance) / diameter;
                        }
                    }
                }

                *num_neighbors = count;
                *density = count * normalization;
            });

        self.periodic_box = Some(periodic_box);

        Ok(())
    }

    /// Get the box used in the last call to `compute`, if any
    pub fn periodic_box(&self) -> Option<PeriodicBox> {
        self.periodic_box
    }

    /// Get the weighted number of neighbors of each reference point
    pub fn num_neighbors(&self) -> ArrayView1<'_, f64> {
        self.num_neighbors.view()
    }

    /// Get the local density around each reference point
    pub fn density(&self) -> ArrayView1<'_, f64> {
        self.density.view()
    }
}
