use crate::{Error, Vector3D};
use super::PeriodicBox;

/// Marker for the end of a cell bucket in [`CellList`]
pub const CELL_TERMINATOR: usize = usize::MAX;

/// Maximal number of cells in a [`CellList`]. Together with the points (at
/// most `isize::MAX / size_of::<Vector3D>()` of them), the buckets always fit
/// in a single allocation.
const MAX_CELLS: usize = isize::MAX as usize / (2 * std::mem::size_of::<usize>());

/// Flatten three dimensional cell coordinates to a single cell index, with
/// `x` varying the fastest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Index3D {
    dimensions: [usize; 3],
}

impl Index3D {
    /// Create a new indexer for a grid with the given `dimensions`
    pub fn new(dimensions: [usize; 3]) -> Index3D {
        Index3D { dimensions }
    }

    /// Get the number of cells along each axis
    pub fn dimensions(&self) -> [usize; 3] {
        self.dimensions
    }

    /// Get the total number of cells in the grid
    pub fn size(&self) -> usize {
        self.dimensions[0] * self.dimensions[1] * self.dimensions[2]
    }

    /// Get the linear index of the cell at `(x, y, z)`
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        debug_assert!(x < self.dimensions[0] && y < self.dimensions[1] && z < self.dimensions[2]);
        x + self.dimensions[0] * (y + self.dimensions[1] * z)
    }

    /// Get the `(x, y, z)` coordinates of the cell with the given linear index
    #[inline]
    pub fn coordinates(&self, index: usize) -> [usize; 3] {
        let x = index % self.dimensions[0];
        let yz = index / self.dimensions[0];
        [x, yz % self.dimensions[1], yz / self.dimensions[1]]
    }
}

/// The cell list sorts points inside cells of a uniform grid covering the
/// periodic box.
///
/// Every cell is at least `cell_width` wide, so all the points closer than
/// `cell_width` to a point in a given cell are either in the same cell or in
/// one of the directly adjacent cells, as listed by
/// [`CellList::cell_neighbors`].
///
/// Points are stored as one linked list per cell inside a single vector: the
/// slot `n_points + cell` contains the first point of the cell, and the slot
/// `i` contains the point following `i` in its cell, or [`CELL_TERMINATOR`].
#[derive(Debug, Clone)]
pub struct CellList {
    /// Box defining periodic boundary conditions
    periodic_box: PeriodicBox,
    /// Minimal width of a cell
    cell_width: f64,
    /// Indexer for the cells grid
    indexer: Index3D,
    /// Linked lists of points in each cell
    links: Vec<usize>,
    /// Number of points currently in the cell list
    n_points: usize,
    /// Sorted list of neighboring cells for each cell, including itself
    neighbors: Vec<Vec<usize>>,
}

impl CellList {
    /// Create a new empty `CellList` in the given box, with cells at least
    /// `cell_width` wide.
    pub fn new(periodic_box: PeriodicBox, cell_width: f64) -> Result<CellList, Error> {
        let dimensions = cells_dimensions(&periodic_box, cell_width)?;
        let indexer = Index3D::new(dimensions);

        let mut cell_list = CellList {
            periodic_box: periodic_box,
            cell_width: cell_width,
            indexer: indexer,
            links: vec![CELL_TERMINATOR; indexer.size()],
            n_points: 0,
            neighbors: Vec::new(),
        };
        cell_list.compute_cell_neighbors();

        return Ok(cell_list);
    }

    /// Change the minimal width of the cells. On error, the cell list is left
    /// unchanged.
    pub fn set_cell_width(&mut self, cell_width: f64) -> Result<(), Error> {
        let dimensions = cells_dimensions(&self.periodic_box, cell_width)?;
        self.cell_width = cell_width;
        self.set_dimensions(dimensions);
        Ok(())
    }

    /// Use a new periodic box for this cell list. On error, the cell list is
    /// left unchanged.
    pub fn update_box(&mut self, periodic_box: PeriodicBox) -> Result<(), Error> {
        if periodic_box == self.periodic_box {
            return Ok(());
        }

        let dimensions = cells_dimensions(&periodic_box, self.cell_width)?;
        self.periodic_box = periodic_box;
        self.set_dimensions(dimensions);
        Ok(())
    }

    /// Sort all the `points` in the cells, using the given `periodic_box`.
    /// The previous content of the cell list is discarded.
    #[time_graph::instrument(name = "CellList::compute")]
    pub fn compute(&mut self, periodic_box: PeriodicBox, points: &[Vector3D]) -> Result<(), Error> {
        if points.is_empty() {
            return Err(Error::EmptyInput("can not build a cell list without points".into()));
        }

        self.update_box(periodic_box)?;

        let n_points = points.len();
        let n_cells = self.n_cells();

        // re-use the allocation from previous calls
        self.links.clear();
        self.links.resize(n_points + n_cells, CELL_TERMINATOR);

        // going backward keeps the points of each cell in increasing order
        for (i, &point) in points.iter().enumerate().rev() {
            let cell = self.cell_of(point);
            self.links[i] = self.links[n_points + cell];
            self.links[n_points + cell] = i;
        }
        self.n_points = n_points;

        Ok(())
    }

    /// Get the index of the cell containing the given `point`
    #[inline]
    pub fn cell_of(&self, point: Vector3D) -> usize {
        let fractional = self.periodic_box.wrapped_fractional(point);
        let dimensions = self.indexer.dimensions();

        // the modulo takes care of fractional coordinates rounded up to 1.0
        let x = (f64::floor(fractional[0] * dimensions[0] as f64) as usize) % dimensions[0];
        let y = (f64::floor(fractional[1] * dimensions[1] as f64) as usize) % dimensions[1];
        let z = if self.periodic_box.is_2d() {
            0
        } else {
            (f64::floor(fractional[2] * dimensions[2] as f64) as usize) % dimensions[2]
        };

        return self.indexer.index(x, y, z);
    }

    /// Get the sorted list of cells adjacent to `cell`, including `cell`
    /// itself.
    pub fn cell_neighbors(&self, cell: usize) -> &[usize] {
        &self.neighbors[cell]
    }

    /// Iterate over the indexes of the points in the given `cell`
    pub fn iter_cell(&self, cell: usize) -> CellIterator<'_> {
        CellIterator {
            links: &self.links,
            current: self.links[self.n_points + cell],
        }
    }

    /// Get the total number of cells
    pub fn n_cells(&self) -> usize {
        self.indexer.size()
    }

    /// Get the number of cells along each axis
    pub fn dimensions(&self) -> [usize; 3] {
        self.indexer.dimensions()
    }

    /// Get the indexer used to go from cell coordinates to cell index
    pub fn cell_indexer(&self) -> Index3D {
        self.indexer
    }

    /// Get the minimal cell width
    pub fn cell_width(&self) -> f64 {
        self.cell_width
    }

    /// Get the periodic box used by this cell list
    pub fn periodic_box(&self) -> &PeriodicBox {
        &self.periodic_box
    }

    /// Get the number of points sorted by the last call to `compute`
    pub fn n_points(&self) -> usize {
        self.n_points
    }

    fn set_dimensions(&mut self, dimensions: [usize; 3]) {
        if dimensions == self.indexer.dimensions() {
            return;
        }

        self.indexer = Index3D::new(dimensions);
        // the points are no longer sorted in the right cells
        self.n_points = 0;
        self.links.clear();
        self.links.resize(self.indexer.size(), CELL_TERMINATOR);

        self.compute_cell_neighbors();
    }

    fn compute_cell_neighbors(&mut self) {
        let dimensions = self.indexer.dimensions();
        log::debug!(
            "building cell list adjacency for {}x{}x{} cells",
            dimensions[0], dimensions[1], dimensions[2]
        );

        let offsets = [
            neighbor_offsets(dimensions[0]),
            neighbor_offsets(dimensions[1]),
            if self.periodic_box.is_2d() { &[0][..] } else { neighbor_offsets(dimensions[2]) },
        ];

        let n_cells = self.indexer.size();
        self.neighbors.clear();
        self.neighbors.reserve(n_cells);
        for cell in 0..n_cells {
            let [x, y, z] = self.indexer.coordinates(cell);

            let mut neighbors = Vec::with_capacity(offsets[0].len() * offsets[1].len() * offsets[2].len());
            for &dx in offsets[0] {
                for &dy in offsets[1] {
                    for &dz in offsets[2] {
                        neighbors.push(self.indexer.index(
                            wrap_offset(x, dx, dimensions[0]),
                            wrap_offset(y, dy, dimensions[1]),
                            wrap_offset(z, dz, dimensions[2]),
                        ));
                    }
                }
            }
            neighbors.sort_unstable();

            self.neighbors.push(neighbors);
        }
    }
}

/// Get the offsets to use when looking for neighboring cells along an axis
/// containing `n_cells` cells, without visiting the same cell twice.
fn neighbor_offsets(n_cells: usize) -> &'static [isize] {
    match n_cells {
        0 | 1 => &[0],
        2 => &[0, 1],
        _ => &[-1, 0, 1],
    }
}

fn wrap_offset(position: usize, offset: isize, n_cells: usize) -> usize {
    let n_cells = n_cells as isize;
    (position as isize + offset).rem_euclid(n_cells) as usize
}

/// Get the number of cells along each axis for a given box and cell width,
/// checking that pairs closer than `cell_width` can be found by only looking
/// at adjacent cells.
fn cells_dimensions(periodic_box: &PeriodicBox, cell_width: f64) -> Result<[usize; 3], Error> {
    if !(cell_width > 0.0 && cell_width.is_finite()) {
        return Err(Error::InvalidParameter(format!(
            "cell width must be positive and finite, got {}", cell_width
        )));
    }

    let distances = periodic_box.nearest_plane_distance();
    let n_periodic = if periodic_box.is_2d() { 2 } else { 3 };

    let mut dimensions = [1; 3];
    for axis in 0..n_periodic {
        if cell_width > 0.5 * distances[axis] {
            return Err(Error::Geometry(format!(
                "cell width ({}) is larger than half of the box size along axis {} ({})",
                cell_width, axis, 0.5 * distances[axis]
            )));
        }

        let n_cells = f64::floor(distances[axis] / cell_width);
        if !n_cells.is_finite() || n_cells >= usize::MAX as f64 {
            return Err(Error::Geometry(format!(
                "too many cells required along axis {} for a cell width of {}",
                axis, cell_width
            )));
        }
        dimensions[axis] = usize::max(n_cells as usize, 1);
    }

    let total = dimensions[0].checked_mul(dimensions[1])
        .and_then(|n| n.checked_mul(dimensions[2]));
    match total {
        Some(total) if total <= MAX_CELLS => Ok(dimensions),
        _ => Err(Error::Geometry(format!(
            "too many cells required for a cell width of {} ({}x{}x{})",
            cell_width, dimensions[0], dimensions[1], dimensions[2]
        ))),
    }
}

/// Iterator over the points in a single cell of a [`CellList`]
#[derive(Debug, Clone)]
pub struct CellIterator<'a> {
    links: &'a [usize],
    current: usize,
}

impl<'a> Iterator for CellIterator<'a> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.current == CELL_TERMINATOR {
            return None;
        }

        let point = self.current;
        self.current = self.links[point];
        return Some(point);
    }
}

impl<'a> std::iter::FusedIterator for CellIterator<'a> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_neighbors(cell_list: &CellList, expected_size: usize) {
        for cell in 0..cell_list.n_cells() {
            let neighbors = cell_list.cell_neighbors(cell);
            assert_eq!(neighbors.len(), expected_size);
            assert_eq!(neighbors.iter().filter(|&&c| c == cell).count(), 1);
            assert!(neighbors.windows(2).all(|w| w[0] < w[1]));
            assert!(neighbors.iter().all(|&c| c < cell_list.n_cells()));
        }
    }

    #[test]
    fn indexer() {
        let indexer = Index3D::new([3, 4, 5]);
        assert_eq!(indexer.size(), 60);
        assert_eq!(indexer.index(0, 0, 0), 0);
        assert_eq!(indexer.index(1, 0, 0), 1);
        assert_eq!(indexer.index(0, 1, 0), 3);
        assert_eq!(indexer.index(0, 0, 1), 12);

        for cell in 0..indexer.size() {
            let [x, y, z] = indexer.coordinates(cell);
            assert_eq!(indexer.index(x, y, z), cell);
        }
    }

    #[test]
    fn dimensions() {
        let cell_list = CellList::new(PeriodicBox::cubic(10.0).unwrap(), 3.0).unwrap();
        assert_eq!(cell_list.dimensions(), [3, 3, 3]);
        assert_eq!(cell_list.n_cells(), 27);

        let cell_list = CellList::new(PeriodicBox::orthorhombic(10.0, 20.0, 12.0).unwrap(), 5.0).unwrap();
        assert_eq!(cell_list.dimensions(), [2, 4, 2]);

        let cell_list = CellList::new(PeriodicBox::rectangle(10.0, 7.0).unwrap(), 1.0).unwrap();
        assert_eq!(cell_list.dimensions(), [10, 7, 1]);
    }

    #[test]
    fn neighbors_3d() {
        // three or more cells along each axis
        let cell_list = CellList::new(PeriodicBox::cubic(10.0).unwrap(), 2.0).unwrap();
        check_neighbors(&cell_list, 27);

        // two cells along each axis
        let cell_list = CellList::new(PeriodicBox::cubic(10.0).unwrap(), 5.0).unwrap();
        assert_eq!(cell_list.dimensions(), [2, 2, 2]);
        check_neighbors(&cell_list, 8);
        assert_eq!(cell_list.cell_neighbors(0), &[0, 1, 2, 3, 4, 5, 6, 7]);

        // mixed
        let cell_list = CellList::new(PeriodicBox::orthorhombic(10.0, 20.0, 12.0).unwrap(), 5.0).unwrap();
        check_neighbors(&cell_list, 2 * 3 * 2);

        let cell_list = CellList::new(PeriodicBox::triclinic(10.0, 10.0, 10.0, 80.0, 90.0, 100.0).unwrap(), 3.0).unwrap();
        check_neighbors(&cell_list, 27);
    }

    #[test]
    fn neighbors_2d() {
        let cell_list = CellList::new(PeriodicBox::square(10.0).unwrap(), 2.0).unwrap();
        assert_eq!(cell_list.dimensions(), [5, 5, 1]);
        check_neighbors(&cell_list, 9);

        let cell_list = CellList::new(PeriodicBox::square(10.0).unwrap(), 5.0).unwrap();
        assert_eq!(cell_list.dimensions(), [2, 2, 1]);
        check_neighbors(&cell_list, 4);

        let cell_list = CellList::new(PeriodicBox::rectangle(10.0, 30.0).unwrap(), 5.0).unwrap();
        assert_eq!(cell_list.dimensions(), [2, 6, 1]);
        check_neighbors(&cell_list, 6);
    }

    #[test]
    fn invalid_width() {
        let periodic_box = PeriodicBox::cubic(10.0).unwrap();
        assert!(matches!(CellList::new(periodic_box, 0.0), Err(Error::InvalidParameter(_))));
        assert!(matches!(CellList::new(periodic_box, -1.0), Err(Error::InvalidParameter(_))));
        assert!(matches!(CellList::new(periodic_box, f64::NAN), Err(Error::InvalidParameter(_))));
        assert!(matches!(CellList::new(periodic_box, 5.1), Err(Error::Geometry(_))));

        // the z direction is not checked in 2D
        let periodic_box = PeriodicBox::square(10.0).unwrap();
        assert!(CellList::new(periodic_box, 5.0).is_ok());
        assert!(matches!(CellList::new(periodic_box, 5.5), Err(Error::Geometry(_))));
    }

    #[test]
    fn failed_updates_keep_state() {
        let mut cell_list = CellList::new(PeriodicBox::cubic(10.0).unwrap(), 2.0).unwrap();
        cell_list.compute(PeriodicBox::cubic(10.0).unwrap(), &[Vector3D::new(1.0, 1.0, 1.0)]).unwrap();

        assert!(cell_list.set_cell_width(6.0).is_err());
        assert_eq!(cell_list.cell_width(), 2.0);
        assert_eq!(cell_list.dimensions(), [5, 5, 5]);

        assert!(cell_list.update_box(PeriodicBox::cubic(3.0).unwrap()).is_err());
        assert_eq!(cell_list.periodic_box(), &PeriodicBox::cubic(10.0).unwrap());

        let result = cell_list.compute(PeriodicBox::cubic(3.0).unwrap(), &[Vector3D::zero()]);
        assert!(matches!(result, Err(Error::Geometry(_))));
        assert_eq!(cell_list.n_points(), 1);

        let result = cell_list.compute(PeriodicBox::cubic(10.0).unwrap(), &[]);
        assert!(matches!(result, Err(Error::EmptyInput(_))));
        assert_eq!(cell_list.n_points(), 1);
        assert_eq!(cell_list.iter_cell(cell_list.cell_of(Vector3D::new(1.0, 1.0, 1.0))).collect::<Vec<_>>(), [0]);

        cell_list.set_cell_width(2.5).unwrap();
        assert_eq!(cell_list.dimensions(), [4, 4, 4]);
    }

    #[test]
    fn too_many_cells() {
        let periodic_box = PeriodicBox::cubic(10.0).unwrap();
        let result = CellList::new(periodic_box, 1e-6);
        assert!(matches!(result, Err(Error::Geometry(_))));

        // below the overflow, but still too large to allocate
        let result = CellList::new(periodic_box, 1e-5);
        assert!(matches!(result, Err(Error::Geometry(_))));

        let mut cell_list = CellList::new(periodic_box, 2.0).unwrap();
        assert!(matches!(cell_list.set_cell_width(1e-6), Err(Error::Geometry(_))));
        assert_eq!(cell_list.dimensions(), [5, 5, 5]);
    }

    #[test]
    fn adjacency_is_kept_with_same_dimensions() {
        let mut cell_list = CellList::new(PeriodicBox::cubic(10.0).unwrap(), 2.0).unwrap();
        let neighbors = cell_list.cell_neighbors(0).as_ptr();

        // still 5 cells along each axis
        cell_list.update_box(PeriodicBox::cubic(10.5).unwrap()).unwrap();
        assert_eq!(cell_list.dimensions(), [5, 5, 5]);
        assert_eq!(cell_list.cell_neighbors(0).as_ptr(), neighbors);

        cell_list.set_cell_width(2.05).unwrap();
        assert_eq!(cell_list.dimensions(), [5, 5, 5]);
        assert_eq!(cell_list.cell_neighbors(0).as_ptr(), neighbors);

        cell_list.update_box(PeriodicBox::cubic(12.5).unwrap()).unwrap();
        assert_eq!(cell_list.dimensions(), [6, 6, 6]);
        assert_eq!(cell_list.n_cells(), 216);
        check_neighbors(&cell_list, 27);
    }

    #[test]
    fn cell_of() {
        let cell_list = CellList::new(PeriodicBox::cubic(10.0).unwrap(), 2.0).unwrap();
        let indexer = cell_list.cell_indexer();
        assert_eq!(cell_list.cell_of(Vector3D::new(0.0, 0.0, 0.0)), 0);
        assert_eq!(cell_list.cell_of(Vector3D::new(3.0, 5.0, 9.9)), indexer.index(1, 2, 4));
        // outside of the box
        assert_eq!(cell_list.cell_of(Vector3D::new(-1.0, 13.0, 10.5)), indexer.index(4, 1, 0));
        // rounded up to 1.0 in fractional coordinates
        assert_eq!(cell_list.cell_of(Vector3D::new(-1e-17, 0.0, 0.0)), 0);

        let cell_list = CellList::new(PeriodicBox::square(10.0).unwrap(), 2.0).unwrap();
        assert_eq!(cell_list.cell_of(Vector3D::new(3.0, 5.0, 0.0)), cell_list.cell_indexer().index(1, 2, 0));
    }

    #[test]
    fn buckets() {
        let periodic_box = PeriodicBox::cubic(10.0).unwrap();
        let mut cell_list = CellList::new(periodic_box, 5.0).unwrap();

        let points = [
            Vector3D::new(1.0, 1.0, 1.0),
            Vector3D::new(6.0, 1.0, 1.0),
            Vector3D::new(2.0, 3.0, 4.0),
            Vector3D::new(7.0, 8.0, 9.0),
            Vector3D::new(11.0, 1.0, 1.0),
        ];
        cell_list.compute(periodic_box, &points).unwrap();
        assert_eq!(cell_list.n_points(), 5);

        assert_eq!(cell_list.iter_cell(0).collect::<Vec<_>>(), [0, 2, 4]);
        assert_eq!(cell_list.iter_cell(1).collect::<Vec<_>>(), [1]);
        assert_eq!(cell_list.iter_cell(7).collect::<Vec<_>>(), [3]);
        assert_eq!(cell_list.iter_cell(2).count(), 0);

        let total = (0..cell_list.n_cells()).map(|cell| cell_list.iter_cell(cell).count()).sum::<usize>();
        assert_eq!(total, points.len());

        // the iterator can be restarted
        let iter = cell_list.iter_cell(0);
        assert_eq!(iter.clone().count(), 3);
        assert_eq!(iter.count(), 3);

        // fewer points in the next frame
        cell_list.compute(periodic_box, &points[3..]).unwrap();
        assert_eq!(cell_list.n_points(), 2);
        assert_eq!(cell_list.iter_cell(0).collect::<Vec<_>>(), [1]);
        assert_eq!(cell_list.iter_cell(7).collect::<Vec<_>>(), [0]);
    }
}
