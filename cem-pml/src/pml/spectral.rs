//! Coupling to a spectral (PSATD) field solver.
//!
//! The solver itself is provided by the caller. The layer only decides which
//! split component goes into which spectral slot.

use nalgebra::Vector3;

use crate::{
    mesh::{
        BoxArray,
        MultiField,
    },
    pml::fields::{
        FieldKind,
        PmlComponent,
        SplitFieldSet,
    },
};

/// Spectral slots of the split fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpectralPmlIndex {
    Exy,
    Exz,
    Eyz,
    Eyx,
    Ezx,
    Ezy,
    Bxy,
    Bxz,
    Byz,
    Byx,
    Bzx,
    Bzy,
}

/// Which split component is transformed into which spectral slot, in
/// transform order.
pub const SPECTRAL_PML_MAPPING: [(FieldKind, PmlComponent, SpectralPmlIndex); 12] = [
    (FieldKind::E, PmlComponent::Xy, SpectralPmlIndex::Exy),
    (FieldKind::E, PmlComponent::Xz, SpectralPmlIndex::Exz),
    (FieldKind::E, PmlComponent::Yz, SpectralPmlIndex::Eyz),
    (FieldKind::E, PmlComponent::Yx, SpectralPmlIndex::Eyx),
    (FieldKind::E, PmlComponent::Zx, SpectralPmlIndex::Ezx),
    (FieldKind::E, PmlComponent::Zy, SpectralPmlIndex::Ezy),
    (FieldKind::B, PmlComponent::Xy, SpectralPmlIndex::Bxy),
    (FieldKind::B, PmlComponent::Xz, SpectralPmlIndex::Bxz),
    (FieldKind::B, PmlComponent::Yz, SpectralPmlIndex::Byz),
    (FieldKind::B, PmlComponent::Yx, SpectralPmlIndex::Byx),
    (FieldKind::B, PmlComponent::Zx, SpectralPmlIndex::Bzx),
    (FieldKind::B, PmlComponent::Zy, SpectralPmlIndex::Bzy),
];

/// A spectral solver for one patch of the layer.
pub trait SpectralSolver: Send {
    /// Transforms one component of `field` into the spectral slot `index`.
    fn forward_transform(&mut self, field: &MultiField, index: SpectralPmlIndex, component: usize);

    /// Advances all spectral slots by one time step, using the split-field
    /// equations.
    fn push_spectral_fields(&mut self);

    /// Transforms the spectral slot `index` back into one component of
    /// `field`.
    fn backward_transform(
        &mut self,
        field: &mut MultiField,
        index: SpectralPmlIndex,
        component: usize,
    );
}

/// Parameters for creating the spectral solver of one patch.
#[derive(Clone, Debug)]
pub struct SpectralSolverParams {
    pub level: usize,

    /// Cell-centered tiles grown by the E-field guard width.
    pub realspace_boxes: BoxArray,

    pub order: [i64; 3],
    pub nodal: bool,
    pub cell_size: Vector3<f64>,
    pub dt: f64,

    /// Always `true` here: the solver must use the split-field equations.
    pub in_pml: bool,
}

pub trait SpectralSolverFactory {
    fn create(&self, params: &SpectralSolverParams) -> Box<dyn SpectralSolver>;
}

/// Advances the E and B split fields of one patch by one step.
pub fn push_single_patch(solver: &mut dyn SpectralSolver, fields: &mut SplitFieldSet) {
    for (kind, component, index) in SPECTRAL_PML_MAPPING {
        if let Some(field) = fields.get(kind, component.field_axis()) {
            solver.forward_transform(field, index, component.index());
        }
    }

    solver.push_spectral_fields();

    for (kind, component, index) in SPECTRAL_PML_MAPPING {
        if let Some(field) = fields.get_mut(kind, component.field_axis()) {
            solver.backward_transform(field, index, component.index());
        }
    }
}
