//! Block-structured mesh container.
//!
//! This is a small in-process stand-in for a distributed array library: box
//! algebra ([`IndexBox`], [`BoxArray`]), the problem [`Geometry`] and fields
//! defined over a set of boxes with guard cells ([`MultiField`]).
//!
//! All index vectors have three components. In 2-D the third component is
//! always 0 and is never grown, shifted or iterated (see [`SpaceDim`]).

mod box_array;
mod geometry;
mod index_box;
mod multi_field;
mod strider;

use std::ops::Range;

use bitflags::bitflags;
use nalgebra::Vector3;
use serde::{
    Deserialize,
    Serialize,
};

pub use crate::mesh::{
    box_array::BoxArray,
    geometry::{
        Geometry,
        Periodicity,
    },
    index_box::{
        BoxDiff,
        IndexBox,
        PointIter,
        box_diff,
    },
    multi_field::{
        Fab,
        MultiField,
    },
    strider::Strider,
};

/// Number of spatial dimensions of the simulation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpaceDim {
    Two,
    #[default]
    Three,
}

impl SpaceDim {
    pub fn num_axes(&self) -> usize {
        match self {
            Self::Two => 2,
            Self::Three => 3,
        }
    }

    pub fn axes(&self) -> Range<usize> {
        0..self.num_axes()
    }

    /// A vector with `n` along every active axis and 0 otherwise.
    pub fn uniform(&self, n: i64) -> Vector3<i64> {
        Vector3::from_fn(|axis, _| if axis < self.num_axes() { n } else { 0 })
    }

    /// Next active axis after `axis`, wrapping around.
    pub fn next_axis(&self, axis: usize, step: usize) -> usize {
        (axis + step) % self.num_axes()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Self; 3] = [Self::X, Self::Y, Self::Z];

    pub fn index(&self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
        }
    }
}

bitflags! {
    /// Axes along which a quantity is node-centered.
    ///
    /// An empty set is a cell-centered quantity.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Staggering: u8 {
        const X = 0b001;
        const Y = 0b010;
        const Z = 0b100;
    }
}

impl Staggering {
    pub const CELL: Self = Self::empty();

    pub fn from_axis(axis: Axis) -> Self {
        match axis {
            Axis::X => Self::X,
            Axis::Y => Self::Y,
            Axis::Z => Self::Z,
        }
    }

    /// Node-centered along all active axes.
    pub fn nodal(dims: SpaceDim) -> Self {
        Axis::ALL[dims.axes()]
            .iter()
            .fold(Self::CELL, |staggering, axis| staggering | Self::from_axis(*axis))
    }

    /// False for indices that are not an axis.
    pub fn is_nodal(&self, axis: usize) -> bool {
        Axis::ALL
            .get(axis)
            .is_some_and(|axis| self.contains(Self::from_axis(*axis)))
    }

    /// 1 for every nodal axis, 0 otherwise.
    pub fn as_vector(&self) -> Vector3<i64> {
        Vector3::from_fn(|axis, _| i64::from(self.is_nodal(axis)))
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector3;

    use crate::mesh::{
        Axis,
        SpaceDim,
        Staggering,
    };

    #[test]
    fn uniform_vectors_skip_inactive_axes() {
        assert_eq!(SpaceDim::Two.uniform(3), Vector3::new(3, 3, 0));
        assert_eq!(SpaceDim::Three.uniform(3), Vector3::new(3, 3, 3));
    }

    #[test]
    fn nodal_staggering_covers_active_axes() {
        assert_eq!(Staggering::nodal(SpaceDim::Two), Staggering::X | Staggering::Y);
        assert_eq!(
            (Staggering::Y | Staggering::Z).as_vector(),
            Vector3::new(0, 1, 1)
        );
    }

    #[test]
    fn staggering_is_looked_up_by_axis() {
        let staggering = Staggering::from_axis(Axis::X) | Staggering::from_axis(Axis::Z);
        assert_eq!(staggering, Staggering::X | Staggering::Z);
        assert!(staggering.is_nodal(0));
        assert!(!staggering.is_nodal(1));
        assert!(staggering.is_nodal(2));
        assert!(!Staggering::nodal(SpaceDim::Three).is_nodal(3));
    }
}
