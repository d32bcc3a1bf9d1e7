//! The `PeriodicBox` type represents the enclosing box of a simulated system,
//! with periodic boundary conditions along all its axes.
use crate::{Error, Matrix3, Vector3D};

/// The shape of a box determine how we will be able to compute the periodic
/// boundaries condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxShape {
    /// Orthorhombic box, with cuboid (or rectangular in 2D) shape
    Orthorhombic,
    /// Triclinic box, with arbitrary parallelepiped (or parallelogram in 2D)
    /// shape
    Triclinic,
}

/// A `PeriodicBox` defines the system physical boundaries.
///
/// The box is described by a matrix whose rows are the three box vectors.
/// Two dimensional boxes use the `x` and `y` components of the first two
/// vectors, and are never wrapped along `z`. Points in a 2D box are expected
/// to have a zero `z` component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicBox {
    /// Box matrix, one box vector per row
    matrix: Matrix3,
    /// Transpose of the box matrix, cached from matrix
    transpose: Matrix3,
    /// Inverse of the transpose of the box matrix, cached from matrix
    inverse: Matrix3,
    /// Box shape
    shape: BoxShape,
    /// Is this a two dimensional box?
    is_2d: bool,
}

impl PeriodicBox {
    /// Create a three dimensional box from the given `matrix`, where each row
    /// contains one of the box vectors.
    pub fn from_matrix(matrix: Matrix3) -> Result<PeriodicBox, Error> {
        PeriodicBox::build(matrix, false)
    }

    /// Create a cubic box, with side lengths `length, length, length`.
    pub fn cubic(length: f64) -> Result<PeriodicBox, Error> {
        PeriodicBox::orthorhombic(length, length, length)
    }

    /// Create an orthorhombic box, with side lengths `a, b, c`.
    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Result<PeriodicBox, Error> {
        check_lengths(&[a, b, c])?;
        PeriodicBox::build(Matrix3::new([
            [a, 0.0, 0.0],
            [0.0, b, 0.0],
            [0.0, 0.0, c],
        ]), false)
    }

    /// Create a triclinic box, with side lengths `a, b, c` and angles
    /// `alpha, beta, gamma` (in degrees).
    pub fn triclinic(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Result<PeriodicBox, Error> {
        check_lengths(&[a, b, c])?;
        let cos_alpha = alpha.to_radians().cos();
        let cos_beta = beta.to_radians().cos();
        let (sin_gamma, cos_gamma) = gamma.to_radians().sin_cos();

        let b_x = b * cos_gamma;
        let b_y = b * sin_gamma;

        let c_x = c * cos_beta;
        let c_y = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let c_z = f64::sqrt(c * c - c_y * c_y - c_x * c_x);

        return PeriodicBox::build(Matrix3::new([
            [a,   0.0, 0.0],
            [b_x, b_y, 0.0],
            [c_x, c_y, c_z],
        ]), false);
    }

    /// Create a two dimensional square box with side length `length`
    pub fn square(length: f64) -> Result<PeriodicBox, Error> {
        PeriodicBox::rectangle(length, length)
    }

    /// Create a two dimensional rectangular box with side lengths `a, b`
    pub fn rectangle(a: f64, b: f64) -> Result<PeriodicBox, Error> {
        check_lengths(&[a, b])?;
        PeriodicBox::oblique_2d([a, 0.0], [0.0, b])
    }

    /// Create a two dimensional box from the two box vectors `a` and `b`
    pub fn oblique_2d(a: [f64; 2], b: [f64; 2]) -> Result<PeriodicBox, Error> {
        PeriodicBox::build(Matrix3::new([
            [a[0], a[1], 0.0],
            [b[0], b[1], 0.0],
            [0.0,  0.0,  1.0],
        ]), true)
    }

    fn build(matrix: Matrix3, is_2d: bool) -> Result<PeriodicBox, Error> {
        let determinant = matrix.determinant();
        if !(determinant.abs() > 1e-6) {
            return Err(Error::InvalidParameter(format!(
                "the box matrix is not invertible (determinant is {})", determinant
            )));
        }

        let is_close_0 = |value| f64::abs(value) < 1e-6;
        let is_diagonal = is_close_0(matrix[0][1]) && is_close_0(matrix[0][2]) &&
                          is_close_0(matrix[1][0]) && is_close_0(matrix[1][2]) &&
                          is_close_0(matrix[2][0]) && is_close_0(matrix[2][1]);

        let shape = if is_diagonal {
            BoxShape::Orthorhombic
        } else {
            BoxShape::Triclinic
        };

        return Ok(PeriodicBox {
            matrix: matrix,
            transpose: matrix.transposed(),
            inverse: matrix.transposed().inverse(),
            shape: shape,
            is_2d: is_2d,
        });
    }

    /// Get the box shape
    pub fn shape(&self) -> BoxShape {
        self.shape
    }

    /// Is this a two dimensional box?
    pub fn is_2d(&self) -> bool {
        self.is_2d
    }

    /// Get the matricial representation of the box
    pub fn matrix(&self) -> Matrix3 {
        self.matrix
    }

    /// Get the volume of the box, or its area for two dimensional boxes
    pub fn volume(&self) -> f64 {
        match self.shape {
            BoxShape::Orthorhombic => {
                let volume = self.matrix[0][0] * self.matrix[1][1];
                if self.is_2d {
                    volume.abs()
                } else {
                    (volume * self.matrix[2][2]).abs()
                }
            }
            // the mixed product of the three vectors, with c = (0, 0, 1) in 2D
            BoxShape::Triclinic => self.matrix.determinant().abs(),
        }
    }

    /// Get the distances between opposite faces of the box. The `z` distance
    /// of two dimensional boxes is meaningless and set to 1.
    pub fn nearest_plane_distance(&self) -> Vector3D {
        if self.shape == BoxShape::Orthorhombic {
            let distances = Vector3D::new(
                self.matrix[0][0].abs(),
                self.matrix[1][1].abs(),
                self.matrix[2][2].abs(),
            );
            return distances;
        }

        let (a, b, c) = (self.a_vector(), self.b_vector(), self.c_vector());
        // unit normals of the faces
        let na = (b ^ c).normalized();
        let nb = (c ^ a).normalized();
        let nc = (a ^ b).normalized();

        Vector3D::new(f64::abs(na * a), f64::abs(nb * b), f64::abs(nc * c))
    }

    /// Get the first vector of the box
    fn a_vector(&self) -> Vector3D {
        self.matrix[0].into()
    }

    /// Get the second vector of the box
    fn b_vector(&self) -> Vector3D {
        self.matrix[1].into()
    }

    /// Get the third vector of the box
    fn c_vector(&self) -> Vector3D {
        self.matrix[2].into()
    }
}

/// Geometric operations using periodic boundary conditions
impl PeriodicBox {
    /// Get the fractional representation of the `vector` in this box
    #[inline]
    pub fn fractional(&self, vector: Vector3D) -> Vector3D {
        // this needs to use the inverse of the transpose of the matrix, since
        // we only have code to multiply a vector by a matrix on the left
        return self.inverse * vector;
    }

    /// Get the Cartesian representation of the `fractional` vector in this
    /// box
    #[inline]
    pub fn cartesian(&self, fractional: Vector3D) -> Vector3D {
        return self.transpose * fractional;
    }

    /// Get the fractional coordinates of the image of `position` inside the
    /// box, with all components in `[0, 1)`. The `z` component is always 0
    /// for two dimensional boxes.
    #[inline]
    pub fn wrapped_fractional(&self, position: Vector3D) -> Vector3D {
        let mut fractional = self.fractional(position);
        fractional[0] -= f64::floor(fractional[0]);
        fractional[1] -= f64::floor(fractional[1]);
        if self.is_2d {
            fractional[2] = 0.0;
        } else {
            fractional[2] -= f64::floor(fractional[2]);
        }
        return fractional;
    }

    /// Get the image of `position` inside the box. For a cubic box of side
    /// length `L`, this produce a vector with all components in `[0, L)`.
    pub fn wrap_into(&self, position: Vector3D) -> Vector3D {
        let mut wrapped = self.cartesian(self.wrapped_fractional(position));
        if self.is_2d {
            wrapped[2] = position[2];
        }
        return wrapped;
    }

    /// Find the minimal image of a displacement vector, obeying the periodic
    /// boundary conditions. For a cubic box of side length `L`, this produce a
    /// vector with all components in `[-L/2, L/2]`.
    #[inline]
    pub fn wrap(&self, mut vector: Vector3D) -> Vector3D {
        match self.shape {
            BoxShape::Orthorhombic => {
                let a = self.matrix[0][0];
                let b = self.matrix[1][1];
                vector[0] -= f64::round(vector[0] / a) * a;
                vector[1] -= f64::round(vector[1] / b) * b;
                if !self.is_2d {
                    let c = self.matrix[2][2];
                    vector[2] -= f64::round(vector[2] / c) * c;
                }
                return vector;
            }
            BoxShape::Triclinic => {
                let mut fractional = self.fractional(vector);
                fractional[0] -= f64::round(fractional[0]);
                fractional[1] -= f64::round(fractional[1]);
                if !self.is_2d {
                    fractional[2] -= f64::round(fractional[2]);
                }
                return self.cartesian(fractional);
            }
        }
    }

    /// Periodic boundary conditions squared distance between the point `u` and
    /// the point `v`
    #[inline]
    pub fn distance2(&self, u: Vector3D, v: Vector3D) -> f64 {
        return self.wrap(v - u).norm2();
    }

    /// Periodic boundary conditions distance between the point `u` and
    /// the point `v`
    pub fn distance(&self, u: Vector3D, v: Vector3D) -> f64 {
        return f64::sqrt(self.distance2(u, v));
    }
}

fn check_lengths(lengths: &[f64]) -> Result<(), Error> {
    if lengths.iter().all(|&length| length > 0.0 && length.is_finite()) {
        Ok(())
    } else {
        Err(Error::InvalidParameter(format!(
            "box lengths must be positive and finite, got {:?}", lengths
        )))
    }
}
