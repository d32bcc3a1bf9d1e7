//! Spatial data structures used to find pairs of points in periodic systems

mod periodic_box;
pub use self::periodic_box::{PeriodicBox, BoxShape};

mod cell_list;
pub use self::cell_list::{CellList, CellIterator, Index3D, CELL_TERMINATOR};

mod nearest_neighbors;
pub use self::nearest_neighbors::{NearestNeighbors, NearestNeighborsParameters};
