use std::{
    fmt::{
        self,
        Display,
    },
    ops::BitAnd,
};

use arrayvec::ArrayVec;
use nalgebra::{
    Point3,
    Vector3,
};
use serde::{
    Deserialize,
    Serialize,
};

use crate::mesh::Staggering;

/// Box of integer indices `lo..=hi` (both inclusive).
///
/// Indices are global cell (or node) coordinates. A box is empty if `lo > hi`
/// along any axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexBox {
    pub lo: Point3<i64>,
    pub hi: Point3<i64>,
    pub staggering: Staggering,
}

impl IndexBox {
    /// Cell-centered box.
    pub fn new(lo: Point3<i64>, hi: Point3<i64>) -> Self {
        Self {
            lo,
            hi,
            staggering: Staggering::CELL,
        }
    }

    pub fn with_staggering(lo: Point3<i64>, hi: Point3<i64>, staggering: Staggering) -> Self {
        Self { lo, hi, staggering }
    }

    pub fn is_empty(&self) -> bool {
        self.lo.x > self.hi.x || self.lo.y > self.hi.y || self.lo.z > self.hi.z
    }

    /// Number of indices along each axis.
    pub fn size(&self) -> Vector3<i64> {
        (self.hi - self.lo).add_scalar(1)
    }

    pub fn length(&self, axis: usize) -> i64 {
        self.hi[axis] - self.lo[axis] + 1
    }

    pub fn num_points(&self) -> usize {
        if self.is_empty() {
            0
        }
        else {
            self.size().map(|n| n as usize).product()
        }
    }

    pub fn contains(&self, point: &Point3<i64>) -> bool {
        (0..3).all(|axis| self.lo[axis] <= point[axis] && point[axis] <= self.hi[axis])
    }

    pub fn intersection(&self, other: &IndexBox) -> IndexBox {
        debug_assert_eq!(
            self.staggering, other.staggering,
            "intersecting boxes with different staggering"
        );
        IndexBox {
            lo: self.lo.sup(&other.lo),
            hi: self.hi.inf(&other.hi),
            staggering: self.staggering,
        }
    }

    pub fn intersects(&self, other: &IndexBox) -> bool {
        !self.intersection(other).is_empty()
    }

    pub fn grow(&self, n: &Vector3<i64>) -> Self {
        Self {
            lo: self.lo - n,
            hi: self.hi + n,
            staggering: self.staggering,
        }
    }

    pub fn grow_axis(&self, axis: usize, n: i64) -> Self {
        self.grow_lo(axis, n).grow_hi(axis, n)
    }

    pub fn grow_lo(&self, axis: usize, n: i64) -> Self {
        let mut grown = *self;
        grown.lo[axis] -= n;
        grown
    }

    pub fn grow_hi(&self, axis: usize, n: i64) -> Self {
        let mut grown = *self;
        grown.hi[axis] += n;
        grown
    }

    pub fn shift(&self, shift: &Vector3<i64>) -> Self {
        Self {
            lo: self.lo + shift,
            hi: self.hi + shift,
            staggering: self.staggering,
        }
    }

    /// The `n` cells directly below this box along `axis`.
    pub fn adj_cell_lo(&self, axis: usize, n: i64) -> Self {
        let mut adjacent = self.enclosed_cells();
        adjacent.hi[axis] = self.lo[axis] - 1;
        adjacent.lo[axis] = self.lo[axis] - n;
        adjacent
    }

    /// The `n` cells directly above this box along `axis`.
    pub fn adj_cell_hi(&self, axis: usize, n: i64) -> Self {
        let mut adjacent = self.enclosed_cells();
        adjacent.lo[axis] = adjacent.hi[axis] + 1;
        adjacent.hi[axis] = adjacent.hi[axis] + n;
        adjacent
    }

    /// Same cells, but indices of a differently staggered quantity.
    pub fn convert(&self, staggering: Staggering) -> Self {
        Self {
            lo: self.lo,
            hi: self.hi + staggering.as_vector() - self.staggering.as_vector(),
            staggering,
        }
    }

    pub fn enclosed_cells(&self) -> Self {
        self.convert(Staggering::CELL)
    }

    /// Coarsen by an integer ratio per axis.
    pub fn coarsen(&self, ratio: &Vector3<i64>) -> Self {
        let nodal = self.staggering.as_vector();
        let lo = self.lo.coords.zip_map(ratio, i64::div_euclid);
        let hi = Vector3::from_fn(|axis, _| {
            let (hi, ratio) = (self.hi[axis], ratio[axis]);
            if nodal[axis] == 1 && hi.rem_euclid(ratio) != 0 {
                hi.div_euclid(ratio) + 1
            }
            else {
                hi.div_euclid(ratio)
            }
        });
        Self {
            lo: lo.into(),
            hi: hi.into(),
            staggering: self.staggering,
        }
    }

    pub fn points(&self) -> PointIter {
        PointIter {
            lo: self.lo,
            hi: self.hi,
            next: (!self.is_empty()).then_some(self.lo),
        }
    }
}

impl BitAnd for IndexBox {
    type Output = IndexBox;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.intersection(&rhs)
    }
}

impl BitAnd for &IndexBox {
    type Output = IndexBox;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.intersection(rhs)
    }
}

impl Display for IndexBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(({},{},{}) ({},{},{}) {:?})",
            self.lo.x, self.lo.y, self.lo.z, self.hi.x, self.hi.y, self.hi.z, self.staggering
        )
    }
}

/// Result of [`box_diff`]: at most 2 slabs per axis.
pub type BoxDiff = ArrayVec<IndexBox, 6>;

/// Disjoint boxes covering exactly the indices of `a` that are not in `b`.
///
/// The difference is built from slabs: along each axis the parts of `a` below
/// and above `b` are cut off, and the remainder is narrowed to `b` before
/// moving to the next axis.
pub fn box_diff(a: &IndexBox, b: &IndexBox) -> BoxDiff {
    let mut pieces = BoxDiff::new();

    if a.is_empty() {
        return pieces;
    }
    if !a.intersects(b) {
        pieces.push(*a);
        return pieces;
    }

    let mut remainder = *a;
    for axis in 0..3 {
        if b.lo[axis] > remainder.lo[axis] {
            let mut piece = remainder;
            piece.hi[axis] = b.lo[axis] - 1;
            pieces.push(piece);
            remainder.lo[axis] = b.lo[axis];
        }
        if b.hi[axis] < remainder.hi[axis] {
            let mut piece = remainder;
            piece.lo[axis] = b.hi[axis] + 1;
            pieces.push(piece);
            remainder.hi[axis] = b.hi[axis];
        }
    }

    pieces
}

/// Iterates over the indices of a box, x fastest.
#[derive(Clone, Copy, Debug)]
pub struct PointIter {
    lo: Point3<i64>,
    hi: Point3<i64>,
    next: Option<Point3<i64>>,
}

impl Iterator for PointIter {
    type Item = Point3<i64>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;

        let mut next = current;
        next.x += 1;
        if next.x > self.hi.x {
            next.x = self.lo.x;
            next.y += 1;
            if next.y > self.hi.y {
                next.y = self.lo.y;
                next.z += 1;
            }
        }
        self.next = (next.z <= self.hi.z).then_some(next);

        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.next.map_or(0, |next| {
            let size = (self.hi - self.lo).add_scalar(1).map(|n| n as usize);
            let done = (next.z - self.lo.z) as usize * size.y * size.x
                + (next.y - self.lo.y) as usize * size.x
                + (next.x - self.lo.x) as usize;
            size.product() - done
        });
        (n, Some(n))
    }
}

impl ExactSizeIterator for PointIter {}
