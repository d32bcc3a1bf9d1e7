use ndarray::{Array1, ArrayView1};

use crate::locality::PeriodicBox;
use crate::math::shell_volume;
use crate::{Error, Vector3D};
use super::PairHistogram;

/// Parameters for radial distribution functions
#[derive(Debug, Clone, Copy, PartialEq)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RdfParameters {
    /// Pairs further apart than this distance are ignored. This must be less
    /// than half of the box size.
    pub max_radius: f64,
    /// Width of the distance bins
    pub bin_width: f64,
}

/// Radial distribution function `g(r)` of a set of points around a set of
/// reference points, averaged over multiple frames.
///
/// The RDF is normalized using the density of points in the last frame, and
/// the average number of points in each bin is available as
/// [`Rdf::cumulative_counts`], integrated up to the end of each bin.
#[derive(Debug)]
pub struct Rdf {
    parameters: RdfParameters,
    histogram: PairHistogram<()>,
    /// density of points in the last frame
    density: f64,
    is_2d: bool,
    rdf: Array1<f64>,
    cumulative_counts: Array1<f64>,
    reduced: bool,
}

impl Rdf {
    /// Create a new `Rdf` with the given parameters
    pub fn new(parameters: RdfParameters) -> Result<Rdf, Error> {
        let histogram = PairHistogram::new(parameters.max_radius, parameters.bin_width)?;
        let n_bins = histogram.n_bins();
        return Ok(Rdf {
            parameters: parameters,
            histogram: histogram,
            density: 0.0,
            is_2d: false,
            rdf: Array1::zeros(n_bins),
            cumulative_counts: Array1::zeros(n_bins),
            reduced: true,
        });
    }

    /// Create a new `Rdf` from JSON parameters
    pub fn from_json(parameters: &str) -> Result<Rdf, Error> {
        let parameters = serde_json::from_str::<RdfParameters>(parameters)?;
        return Rdf::new(parameters);
    }

    /// Get the parameters used to create this `Rdf` as JSON
    pub fn parameters(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(&self.parameters)?)
    }

    /// Add the pairs between `ref_points` and `points` in a new frame to this
    /// RDF. If `ref_points` and `points` are the same slice, a point is not
    /// paired with itself.
    pub fn accumulate(&mut self, periodic_box: PeriodicBox, ref_points: &[Vector3D], points: &[Vector3D]) -> Result<(), Error> {
        self.histogram.accumulate(periodic_box, ref_points, points, |_, _| ())?;

        self.density = points.len() as f64 / periodic_box.volume();
        self.is_2d = periodic_box.is_2d();
        self.reduced = false;

        Ok(())
    }

    /// Compute the RDF of a single frame, discarding all previously
    /// accumulated data
    pub fn compute(&mut self, periodic_box: PeriodicBox, ref_points: &[Vector3D], points: &[Vector3D]) -> Result<(), Error> {
        self.reset();
        self.accumulate(periodic_box, ref_points, points)
    }

    fn reduce(&mut self) {
        if self.reduced {
            return;
        }

        let frame_count = self.histogram.frame_count();
        let n_ref = self.histogram.n_ref();
        let bin_width = self.histogram.bin_width();
        let density = self.density;
        let is_2d = self.is_2d;

        let counts = self.histogram.counts();
        let normalization = (n_ref * frame_count) as f64;

        let mut cumulative = 0.0;
        for (bin, &count) in counts.iter().enumerate() {
            let average = count as f64 / normalization;
            cumulative += average;

            let volume = shell_volume(bin as f64 * bin_width, (bin + 1) as f64 * bin_width, is_2d);
            self.rdf[bin] = average / (volume * density);
            self.cumulative_counts[bin] = cumulative;
        }

        self.reduced = true;
    }

    /// Get the radial distribution function `g(r)`
    pub fn rdf(&mut self) -> ArrayView1<'_, f64> {
        self.reduce();
        self.rdf.view()
    }

    /// Get the average number of points closer than the outer edge of each
    /// bin to a reference point
    pub fn cumulative_counts(&mut self) -> ArrayView1<'_, f64> {
        self.reduce();
        self.cumulative_counts.view()
    }

    /// Get the total number of pairs in each bin
    pub fn counts(&mut self) -> ArrayView1<'_, usize> {
        self.histogram.counts()
    }

    /// Get the distance associated with each bin
    pub fn bin_centers(&self) -> ArrayView1<'_, f64> {
        self.histogram.bin_centers()
    }

    /// Get the box used in the last accumulated frame, if any
    pub fn periodic_box(&self) -> Option<PeriodicBox> {
        self.histogram.periodic_box()
    }

    /// Get the number of bins
    pub fn n_bins(&self) -> usize {
        self.histogram.n_bins()
    }

    /// Get the number of frames accumulated so far
    pub fn frame_count(&self) -> usize {
        self.histogram.frame_count()
    }

    /// Remove all the accumulated data
    pub fn reset(&mut self) {
        self.histogram.reset();
        self.rdf.fill(0.0);
        self.cumulative_counts.fill(0.0);
        self.density = 0.0;
        self.reduced = true;
    }
}
