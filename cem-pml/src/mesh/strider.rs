use nalgebra::{
    Point3,
    Vector3,
    Vector4,
};

use crate::mesh::IndexBox;

/// Maps the global indices of a box to linear indices into its storage.
#[derive(Clone, Copy, Debug)]
pub struct Strider {
    lo: Point3<i64>,
    size: Vector3<usize>,
    strides: Vector4<usize>,
}

impl Strider {
    pub fn new(bx: &IndexBox) -> Self {
        let size = if bx.is_empty() {
            Vector3::zeros()
        }
        else {
            bx.size().map(|n| n as usize)
        };

        Self {
            lo: bx.lo,
            size,
            strides: strides_for_size(&size),
        }
    }

    pub fn index_unchecked(&self, point: &Point3<i64>) -> usize {
        (point - self.lo).map(|x| x as usize).dot(&self.strides.xyz())
    }

    pub fn index(&self, point: &Point3<i64>) -> Option<usize> {
        self.is_inside(point).then(|| self.index_unchecked(point))
    }

    pub fn len(&self) -> usize {
        self.strides.w
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_inside(&self, point: &Point3<i64>) -> bool {
        (0..3).all(|axis| {
            point[axis] >= self.lo[axis] && ((point[axis] - self.lo[axis]) as usize) < self.size[axis]
        })
    }
}

fn strides_for_size(size: &Vector3<usize>) -> Vector4<usize> {
    let mut strides = Vector4::zeros();
    strides.x = 1;
    strides.y = strides.x * size.x;
    strides.z = strides.y * size.y;
    strides.w = strides.z * size.z;
    strides
}
