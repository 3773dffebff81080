use nalgebra::{
    Point3,
    Vector3,
};

use crate::mesh::{
    IndexBox,
    SpaceDim,
};

/// Problem domain of one refinement level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    pub dims: SpaceDim,

    /// Cell-centered index box of the physical domain.
    pub domain: IndexBox,

    /// Physical position of the low corner of cell `domain.lo`.
    pub origin: Point3<f64>,

    pub cell_size: Vector3<f64>,

    pub periodic: [bool; 3],
}

impl Geometry {
    pub fn is_periodic(&self, axis: usize) -> bool {
        self.periodic[axis]
    }

    pub fn periodicity(&self) -> Periodicity {
        let size = self.domain.size();
        Periodicity {
            dims: self.dims,
            period: Vector3::from_fn(|axis, _| {
                if axis < self.dims.num_axes() && self.periodic[axis] {
                    size[axis]
                }
                else {
                    0
                }
            }),
        }
    }

    /// Physical position of a cell centre.
    pub fn cell_center(&self, cell: &Point3<i64>) -> Point3<f64> {
        let offset = (cell - self.domain.lo).map(|i| i as f64).add_scalar(0.5);
        self.origin + offset.component_mul(&self.cell_size)
    }

    /// Geometry of the next coarser level.
    pub fn coarsen(&self, ratio: &Vector3<i64>) -> Self {
        Self {
            dims: self.dims,
            domain: self.domain.coarsen(ratio),
            origin: self.origin,
            cell_size: self.cell_size.component_mul(&ratio.map(|r| r as f64)),
            periodic: self.periodic,
        }
    }
}

/// Periodic images of the domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Periodicity {
    dims: SpaceDim,

    /// Domain length along periodic axes, 0 along the others.
    period: Vector3<i64>,
}

impl Periodicity {
    pub fn non_periodic(dims: SpaceDim) -> Self {
        Self {
            dims,
            period: Vector3::zeros(),
        }
    }

    pub fn period(&self) -> &Vector3<i64> {
        &self.period
    }

    pub fn is_any_periodic(&self) -> bool {
        self.period != Vector3::zeros()
    }

    /// All image shifts, starting with the zero shift.
    pub fn shifts(&self) -> Vec<Vector3<i64>> {
        let mut shifts = vec![Vector3::zeros()];

        for axis in self.dims.axes() {
            let period = self.period[axis];
            if period == 0 {
                continue;
            }
            let n = shifts.len();
            for i in 0..n {
                for sign in [-1, 1] {
                    let mut shift = shifts[i];
                    shift[axis] += sign * period;
                    shifts.push(shift);
                }
            }
        }

        shifts
    }
}
