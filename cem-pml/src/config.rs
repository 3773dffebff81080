use serde::{
    Deserialize,
    Serialize,
};

use crate::material::PhysicalConstants;

/// Where the layer sits relative to the physical domain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PmlPlacement {
    /// The layer extends `ncell` cells beyond the domain.
    #[default]
    Outside,

    /// The layer overlaps the outermost `ncell` cells of the domain.
    InDomain,
}

impl PmlPlacement {
    pub fn is_in_domain(&self) -> bool {
        matches!(self, Self::InDomain)
    }
}

/// The interior Maxwell solver. This determines the guard widths of the
/// layer's fields and whether the layer is advanced spectrally.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxwellSolver {
    #[default]
    Yee,
    Ckc,
    Psatd,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PmlConfig {
    /// Thickness of the layer in cells.
    pub ncell: i64,

    /// Thickness over which the damping profile rises to its maximum.
    pub delta: i64,

    pub placement: PmlPlacement,

    /// Enable the layer on the low side of each axis.
    pub lo: [bool; 3],

    /// Enable the layer on the high side of each axis.
    pub hi: [bool; 3],

    pub divergence_cleaning: bool,

    pub moving_window: bool,

    pub maxwell_solver: MaxwellSolver,

    /// Order of the spectral stencil per axis. Only used with
    /// [`MaxwellSolver::Psatd`].
    pub spectral_order: [i64; 3],

    /// Fields are all node-centered (spectral solver only).
    pub nodal: bool,

    /// Refinement ratio between the fine and coarse patch.
    pub ref_ratio: [i64; 3],

    pub physical_constants: PhysicalConstants,
}

impl Default for PmlConfig {
    fn default() -> Self {
        Self {
            ncell: 10,
            delta: 10,
            placement: PmlPlacement::Outside,
            lo: [true; 3],
            hi: [true; 3],
            divergence_cleaning: false,
            moving_window: false,
            maxwell_solver: MaxwellSolver::Yee,
            spectral_order: [16; 3],
            nodal: false,
            ref_ratio: [2; 3],
            physical_constants: PhysicalConstants::SI,
        }
    }
}

impl PmlConfig {
    /// Number of split sub-components of E (and F). The diagonal components
    /// are only needed with divergence cleaning.
    pub fn num_e_components(&self) -> usize {
        if self.divergence_cleaning { 3 } else { 2 }
    }
}
