#![warn(clippy::todo, unused_qualifications)]

//! Perfectly matched layer (PML) for a block-structured electromagnetic
//! solver.
//!
//! The layer is a set of tiles surrounding the interior blocks. Inside the
//! tiles every field component is split into per-axis sub-components that
//! are damped independently, so outgoing waves are absorbed instead of
//! reflected at the domain edges.
//!
//! A rough outline of how a solver uses this crate:
//!
//! 1. Describe the interior with a [`mesh::BoxArray`] and a
//!    [`mesh::Geometry`], and the layer with a [`PmlConfig`].
//! 2. Construct the layer with [`Pml::new`]. It returns `Ok(None)` if no
//!    layer is needed (e.g. a fully periodic domain).
//! 3. Whenever the time step changes, call [`Pml::compute_pml_factors`].
//! 4. Every step, exchange fields between the interior and the layer with
//!    [`Pml::exchange_e`], [`Pml::exchange_b`] etc., and refresh the layer's
//!    guard cells with [`Pml::fill_boundary`].

pub mod config;
pub mod error;
pub mod material;
pub mod mesh;
mod parallel;
pub mod pml;

pub use crate::{
    config::{
        MaxwellSolver,
        PmlConfig,
        PmlPlacement,
    },
    error::Error,
    material::PhysicalConstants,
    pml::{
        Pml,
        PmlDomain,
    },
};

pub fn format_size<T>(value: T) -> humansize::SizeFormatter<T, humansize::FormatSizeOptions>
where
    T: humansize::ToF64 + humansize::Unsigned,
{
    humansize::SizeFormatter::new(value, humansize::BINARY)
}
