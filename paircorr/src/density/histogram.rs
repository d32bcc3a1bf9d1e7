use std::cell::RefCell;

use ndarray::{Array1, ArrayView1, Zip};
use num_complex::Complex64;
use rayon::prelude::*;
use thread_local::ThreadLocal;

use crate::math::{shell_center, truncate_to_bin};
use crate::locality::{CellList, PeriodicBox};
use crate::{Error, Vector3D};

/// Values that can be accumulated in the bins of a [`PairHistogram`]
pub trait BinValue: Copy + Send + Sync + 'static {
    /// Get the neutral value for accumulation
    fn zero() -> Self;
    /// Add `other` to `self`
    fn accumulate(&mut self, other: Self);
    /// Divide `self` by `n`
    #[must_use]
    fn divide(self, n: f64) -> Self;
}

impl BinValue for f64 {
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn accumulate(&mut self, other: Self) {
        *self += other;
    }

    fn divide(self, n: f64) -> Self {
        self / n
    }
}

impl BinValue for Complex64 {
    fn zero() -> Self {
        <Complex64 as num_traits::Zero>::zero()
    }

    #[inline]
    fn accumulate(&mut self, other: Self) {
        *self += other;
    }

    fn divide(self, n: f64) -> Self {
        self / n
    }
}

/// Histograms only counting pairs use `()` as their value
impl BinValue for () {
    fn zero() -> Self {}

    #[inline]
    fn accumulate(&mut self, _: Self) {}

    fn divide(self, _: f64) -> Self {}
}

/// Per-thread partial histogram
#[derive(Debug, Clone)]
struct LocalBins<T> {
    counts: Array1<usize>,
    values: Array1<T>,
}

impl<T: BinValue> LocalBins<T> {
    fn new(n_bins: usize) -> LocalBins<T> {
        LocalBins {
            counts: Array1::zeros(n_bins),
            values: Array1::from_elem(n_bins, T::zero()),
        }
    }

    fn reset(&mut self) {
        self.counts.fill(0);
        self.values.fill(T::zero());
    }
}

/// Histogram of a pairwise quantity as a function of the distance between
/// the points in a pair, accumulated over multiple frames.
///
/// The bin `i` contains all pairs with a distance in `[i * bin_width, (i + 1)
/// * bin_width)`. Each thread accumulates in its own copy of the bins during
/// [`PairHistogram::accumulate`], and all these copies are summed together
/// the next time the results are accessed.
pub struct PairHistogram<T: BinValue> {
    max_radius: f64,
    bin_width: f64,
    n_bins: usize,
    cell_list: Option<CellList>,
    /// box used in the last frame
    periodic_box: Option<PeriodicBox>,
    local_bins: ThreadLocal<RefCell<LocalBins<T>>>,
    bin_centers: Array1<f64>,
    counts: Array1<usize>,
    values: Array1<T>,
    /// number of reference points in the last frame
    n_ref: usize,
    frame_count: usize,
    reduced: bool,
}

impl<T: BinValue> std::fmt::Debug for PairHistogram<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairHistogram")
            .field("max_radius", &self.max_radius)
            .field("bin_width", &self.bin_width)
            .field("n_bins", &self.n_bins)
            .field("frame_count", &self.frame_count)
            .finish_non_exhaustive()
    }
}

impl<T: BinValue> PairHistogram<T> {
    /// Create a new histogram for pairs closer than `max_radius`, using bins
    /// of size `bin_width`.
    pub fn new(max_radius: f64, bin_width: f64) -> Result<PairHistogram<T>, Error> {
        if !(max_radius > 0.0 && max_radius.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "max_radius must be positive and finite, got {}", max_radius
            )));
        }

        if !(bin_width > 0.0 && bin_width.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "bin_width must be positive and finite, got {}", bin_width
            )));
        }

        if bin_width > max_radius {
            return Err(Error::InvalidParameter(format!(
                "bin_width ({}) can not be larger than max_radius ({})", bin_width, max_radius
            )));
        }

        let n_bins = f64::floor(max_radius / bin_width) as usize;
        let bin_centers = (0..n_bins).map(|bin| {
            shell_center(bin as f64 * bin_width, (bin + 1) as f64 * bin_width)
        }).collect::<Array1<f64>>();

        return Ok(PairHistogram {
            max_radius: max_radius,
            bin_width: bin_width,
            n_bins: n_bins,
            cell_list: None,
            periodic_box: None,
            local_bins: ThreadLocal::new(),
            bin_centers: bin_centers,
            counts: Array1::zeros(n_bins),
            values: Array1::from_elem(n_bins, T::zero()),
            n_ref: 0,
            frame_count: 0,
            reduced: true,
        });
    }

    /// Get the number of bins in this histogram
    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// Get the cutoff radius of this histogram
    pub fn max_radius(&self) -> f64 {
        self.max_radius
    }

    /// Get the width of the bins of this histogram
    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    /// Get the number of frames accumulated since creation or the last reset
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Get the number of reference points used in the last frame
    pub fn n_ref(&self) -> usize {
        self.n_ref
    }

    /// Get the box used in the last accumulated frame, if any
    pub fn periodic_box(&self) -> Option<PeriodicBox> {
        self.periodic_box
    }

    /// Get the area weighted center of each bin
    pub fn bin_centers(&self) -> ArrayView1<'_, f64> {
        self.bin_centers.view()
    }

    /// Get the number of pairs in each bin, summed over all frames
    pub fn counts(&mut self) -> ArrayView1<'_, usize> {
        self.reduce();
        self.counts.view()
    }

    /// Get the sum of the pair values in each bin over all frames, divided by
    /// the number of reference points in the last frame
    pub fn values(&mut self) -> ArrayView1<'_, T> {
        self.reduce();
        self.values.view()
    }

    /// Accumulate the pairs between `ref_points` and `points` closer than
    /// the cutoff into the histogram. Each pair `(i, j)` contributes one
    /// count and the value `pair_value(i, j)` to its bin.
    ///
    /// If `ref_points` and `points` are the same slice, the pairs between a
    /// point and itself are skipped.
    #[time_graph::instrument(name = "PairHistogram::accumulate")]
    pub fn accumulate<F>(&mut self, periodic_box: PeriodicBox, ref_points: &[Vector3D], points: &[Vector3D], pair_value: F) -> Result<(), Error>
        where F: Fn(usize, usize) -> T + Sync
    {
        if ref_points.is_empty() || points.is_empty() {
            return Err(Error::EmptyInput(
                "accumulating a histogram requires at least one point and one reference point".into()
            ));
        }

        let cell_list = match self.cell_list.take() {
            Some(cell_list) => cell_list,
            None => CellList::new(periodic_box, self.max_radius)?,
        };
        let cell_list = self.cell_list.insert(cell_list);
        cell_list.compute(periodic_box, points)?;
        let cell_list = &*cell_list;

        let exclude_self = std::ptr::eq(ref_points, points);
        let max_radius2 = self.max_radius * self.max_radius;
        let bin_width = self.bin_width;
        let n_bins = self.n_bins;
        let local_bins = &self.local_bins;

        ref_points.par_iter().enumerate().for_each(|(i, &ref_point)| {
            let mut bins = local_bins.get_or(|| RefCell::new(LocalBins::new(n_bins))).borrow_mut();
            let bins = &mut *bins;

            for &cell in cell_list.cell_neighbors(cell_list.cell_of(ref_point)) {
                for j in cell_list.iter_cell(cell) {
                    if exclude_self && i == j {
                        continue;
                    }

                    let distance2 = periodic_box.distance2(ref_point, points[j]);
                    if distance2 >= max_radius2 {
                        continue;
                    }

                    if let Some(bin) = truncate_to_bin(distance2.sqrt() / bin_width, n_bins) {
                        bins.counts[bin] += 1;
                        bins.values[bin].accumulate(pair_value(i, j));
                    }
                }
            }
        });

        self.periodic_box = Some(periodic_box);
        self.n_ref = ref_points.len();
        self.frame_count += 1;
        self.reduced = false;

        Ok(())
    }

    /// Sum the per-thread histograms into the final counts and values. This
    /// is done automatically when accessing the results.
    #[time_graph::instrument(name = "PairHistogram::reduce")]
    pub fn reduce(&mut self) {
        if self.reduced {
            return;
        }

        self.counts.fill(0);
        self.values.fill(T::zero());

        let local_bins = self.local_bins.iter_mut()
            .map(|bins| &*bins.get_mut())
            .collect::<Vec<_>>();

        let n_ref = self.n_ref as f64;
        Zip::indexed(&mut self.counts)
            .and(&mut self.values)
            .par_for_each(|bin, count, value| {
                for local in &local_bins {
                    *count += local.counts[bin];
                    value.accumulate(local.values[bin]);
                }

                if *count != 0 {
                    *value = value.divide(n_ref);
                }
            });

        self.reduced = true;
    }

    /// Remove all accumulated data from this histogram
    pub fn reset(&mut self) {
        for bins in self.local_bins.iter_mut() {
            bins.get_mut().reset();
        }

        self.counts.fill(0);
        self.values.fill(T::zero());
        self.periodic_box = None;
        self.n_ref = 0;
        self.frame_count = 0;
        self.reduced = true;
    }
}
