use std::ops::Mul;

use ndarray::ArrayView1;
use num_complex::Complex64;

use crate::locality::PeriodicBox;
use crate::{Error, Vector3D};
use super::{BinValue, PairHistogram};

/// Parameters for pair correlation functions
#[derive(Debug, Clone, Copy, PartialEq)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CorrelationParameters {
    /// Pairs further apart than this distance are ignored. This must be less
    /// than half of the box size.
    pub max_radius: f64,
    /// Width of the distance bins
    pub bin_width: f64,
}

/// Correlation function between values attached to points, as a function
/// of the distance between the points.
///
/// For each bin, this computes the sum over all pairs `(i, j)` in this bin of
/// `ref_values[i] * values[j]`, divided by the number of reference points.
/// Multiple frames can be accumulated one after the other, in which case the
/// sums run over all the pairs in all the frames.
#[derive(Debug)]
pub struct CorrelationFunction<T: BinValue> {
    parameters: CorrelationParameters,
    histogram: PairHistogram<T>,
}

/// Correlation function of real values
pub type FloatCF = CorrelationFunction<f64>;
/// Correlation function of complex values
pub type ComplexCF = CorrelationFunction<Complex64>;

impl<T> CorrelationFunction<T> where T: BinValue + Mul<Output = T> {
    /// Create a new `CorrelationFunction` with the given parameters
    pub fn new(parameters: CorrelationParameters) -> Result<CorrelationFunction<T>, Error> {
        let histogram = PairHistogram::new(parameters.max_radius, parameters.bin_width)?;
        return Ok(CorrelationFunction {
            parameters,
            histogram,
        });
    }

    /// Create a new `CorrelationFunction` from JSON parameters
    pub fn from_json(parameters: &str) -> Result<CorrelationFunction<T>, Error> {
        let parameters = serde_json::from_str::<CorrelationParameters>(parameters)?;
        return CorrelationFunction::new(parameters);
    }

    /// Get the parameters used to create this `CorrelationFunction` as JSON
    pub fn parameters(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(&self.parameters)?)
    }

    /// Add the contribution of a new frame to the correlation function.
    ///
    /// `ref_values` contains one value for each of the `ref_points`, and
    /// `values` one value for each of the `points`. If `ref_points` and
    /// `points` are the same slice, a point is not paired with itself.
    pub fn accumulate(
        &mut self,
        periodic_box: PeriodicBox,
        ref_points: &[Vector3D],
        ref_values: &[T],
        points: &[Vector3D],
        values: &[T],
    ) -> Result<(), Error> {
        if ref_points.len() != ref_values.len() {
            return Err(Error::InvalidParameter(format!(
                "expected {} reference values, got {}", ref_points.len(), ref_values.len()
            )));
        }

        if points.len() != values.len() {
            return Err(Error::InvalidParameter(format!(
                "expected {} values, got {}", points.len(), values.len()
            )));
        }

        self.histogram.accumulate(periodic_box, ref_points, points, |i, j| {
            ref_values[i] * values[j]
        })
    }

    /// Compute the correlation function for a single frame, discarding all
    /// previously accumulated data
    pub fn compute(
        &mut self,
        periodic_box: PeriodicBox,
        ref_points: &[Vector3D],
        ref_values: &[T],
        points: &[Vector3D],
        values: &[T],
    ) -> Result<(), Error> {
        self.reset();
        self.accumulate(periodic_box, ref_points, ref_values, points, values)
    }

    /// Get the box used in the last accumulated frame, if any
    pub fn periodic_box(&self) -> Option<PeriodicBox> {
        self.histogram.periodic_box()
    }

    /// Get the correlation function, averaged over reference points
    pub fn correlation(&mut self) -> ArrayView1<'_, T> {
        self.histogram.values()
    }

    /// Get the number of pairs in each bin
    pub fn counts(&mut self) -> ArrayView1<'_, usize> {
        self.histogram.counts()
    }

    /// Get the distance associated with each bin
    pub fn bin_centers(&self) -> ArrayView1<'_, f64> {
        self.histogram.bin_centers()
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
    }
}
