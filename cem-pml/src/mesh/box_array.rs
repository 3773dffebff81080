use std::ops::Index;

use nalgebra::{
    Point3,
    Vector3,
};
use serde::{
    Deserialize,
    Serialize,
};

use crate::mesh::{
    IndexBox,
    Staggering,
    box_diff,
};

/// An ordered list of boxes with the same staggering.
///
/// Empty boxes are never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxArray {
    boxes: Vec<IndexBox>,
}

impl BoxArray {
    pub fn new(boxes: impl IntoIterator<Item = IndexBox>) -> Self {
        let boxes = boxes
            .into_iter()
            .filter(|bx| !bx.is_empty())
            .collect::<Vec<_>>();

        if let Some(first) = boxes.first() {
            assert!(
                boxes.iter().all(|bx| bx.staggering == first.staggering),
                "all boxes in a BoxArray must have the same staggering"
            );
        }

        Self { boxes }
    }

    /// Decomposes `domain` into blocks of at most `max_size` indices per
    /// axis. Blocks are as even as possible along each axis.
    pub fn chop(domain: &IndexBox, max_size: &Vector3<i64>) -> Self {
        let size = domain.size();
        let splits: [Vec<(i64, i64)>; 3] = std::array::from_fn(|axis| {
            let n = size[axis];
            let max = max_size[axis].max(1);
            let count = (n + max - 1) / max;
            // (first index, length) of each block along the axis
            (0..count)
                .map(|i| {
                    let start = i * n / count;
                    let end = (i + 1) * n / count;
                    (domain.lo[axis] + start, end - start)
                })
                .collect()
        });

        let mut boxes = vec![];
        let [xs, ys, zs] = &splits;
        for (z, nz) in zs {
            for (y, ny) in ys {
                for (x, nx) in xs {
                    let lo = Point3::new(*x, *y, *z);
                    let hi = lo + Vector3::new(nx - 1, ny - 1, nz - 1);
                    boxes.push(IndexBox::with_staggering(lo, hi, domain.staggering));
                }
            }
        }

        Self::new(boxes)
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IndexBox> {
        self.boxes.iter()
    }

    pub fn as_slice(&self) -> &[IndexBox] {
        &self.boxes
    }

    pub fn staggering(&self) -> Staggering {
        self.boxes
            .first()
            .map_or(Staggering::CELL, |bx| bx.staggering)
    }

    pub fn num_points(&self) -> usize {
        self.boxes.iter().map(IndexBox::num_points).sum()
    }

    /// Smallest box containing all boxes.
    pub fn minimal_box(&self) -> Option<IndexBox> {
        let (first, rest) = self.boxes.split_first()?;
        Some(rest.iter().fold(*first, |bounds, bx| {
            IndexBox {
                lo: bounds.lo.inf(&bx.lo),
                hi: bounds.hi.sup(&bx.hi),
                staggering: bounds.staggering,
            }
        }))
    }

    /// Indices of all boxes that intersect `bx` when grown by `grow`.
    pub fn intersections(&self, bx: &IndexBox, grow: &Vector3<i64>) -> Vec<usize> {
        self.boxes
            .iter()
            .enumerate()
            .filter(|(_, other)| other.grow(grow).intersects(bx))
            .map(|(index, _)| index)
            .collect()
    }

    /// Disjoint boxes covering the indices of `bx` that are not covered by
    /// any box of this array.
    pub fn complement_in(&self, bx: &IndexBox) -> Vec<IndexBox> {
        self.boxes.iter().fold(vec![*bx], |pieces, covered| {
            pieces
                .iter()
                .flat_map(|piece| box_diff(piece, covered))
                .collect()
        })
    }

    /// Removes overlap between boxes.
    ///
    /// Every box loses the indices already owned by the boxes before it. The
    /// union of all boxes stays the same.
    pub fn remove_overlap(&self) -> Self {
        let mut disjoint: Vec<IndexBox> = Vec::with_capacity(self.boxes.len());

        for bx in &self.boxes {
            let pieces = disjoint.iter().fold(vec![*bx], |pieces, owned| {
                pieces
                    .iter()
                    .flat_map(|piece| box_diff(piece, owned))
                    .collect()
            });
            disjoint.extend(pieces);
        }

        Self { boxes: disjoint }
    }

    /// Clips every box to `bx`, dropping boxes outside of it.
    pub fn intersect_box(&self, bx: &IndexBox) -> Self {
        Self::new(self.boxes.iter().map(|other| other & bx))
    }

    pub fn grow(&self, n: &Vector3<i64>) -> Self {
        Self::new(self.boxes.iter().map(|bx| bx.grow(n)))
    }

    pub fn coarsen(&self, ratio: &Vector3<i64>) -> Self {
        Self::new(self.boxes.iter().map(|bx| bx.coarsen(ratio)))
    }

    pub fn convert(&self, staggering: Staggering) -> Self {
        Self::new(self.boxes.iter().map(|bx| bx.convert(staggering)))
    }

    pub fn enclosed_cells(&self) -> Self {
        self.convert(Staggering::CELL)
    }
}

impl Index<usize> for BoxArray {
    type Output = IndexBox;

    fn index(&self, index: usize) -> &Self::Output {
        &self.boxes[index]
    }
}

impl<'a> IntoIterator for &'a BoxArray {
    type Item = &'a IndexBox;
    type IntoIter = std::slice::Iter<'a, IndexBox>;

    fn into_iter(self) -> Self::IntoIter {
        self.boxes.iter()
    }
}

impl FromIterator<IndexBox> for BoxArray {
    fn from_iter<T: IntoIterator<Item = IndexBox>>(iter: T) -> Self {
        Self::new(iter)
    }
}
