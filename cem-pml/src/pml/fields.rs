use std::fmt::{
    self,
    Display,
};

use nalgebra::Vector3;
use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    config::{
        MaxwellSolver,
        PmlConfig,
    },
    material::{
        MacroscopicMedium,
        MediumProperty,
    },
    mesh::{
        BoxArray,
        Geometry,
        MultiField,
        SpaceDim,
        Staggering,
    },
};

pub use crate::mesh::Axis;

/// The fields that live in the layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    E,
    B,
    /// Only allocated with the `magnetization` feature.
    H,
    /// Current density.
    J,
    /// Divergence cleaning scalar. Only allocated with divergence cleaning.
    F,
}

impl FieldKind {
    pub const ALL: [Self; 5] = [Self::E, Self::B, Self::H, Self::J, Self::F];

    fn index(&self) -> usize {
        match self {
            Self::E => 0,
            Self::B => 1,
            Self::H => 2,
            Self::J => 3,
            Self::F => 4,
        }
    }

    /// `F` is a scalar and stored under [`Axis::X`].
    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::F)
    }

    /// Axes under which this kind is stored.
    pub fn axes(&self) -> &'static [Axis] {
        if self.is_scalar() {
            &[Axis::X]
        }
        else {
            &Axis::ALL
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::E => "E",
            Self::B => "B",
            Self::H => "H",
            Self::J => "j",
            Self::F => "F",
        }
    }
}

impl Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Fine or coarse resolution of a two-level mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatchType {
    Fine,
    Coarse,
}

impl PatchType {
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Fine => "fp",
            Self::Coarse => "cp",
        }
    }
}

/// Identity of a split sub-component.
///
/// The component of field `a` damped along axis `b` is `ab`. Both split
/// components of one field are stored in the same [`MultiField`]; the
/// diagonal components `aa` only exist with divergence cleaning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PmlComponent {
    Xy,
    Xz,
    Yz,
    Yx,
    Zx,
    Zy,
    Xx,
    Yy,
    Zz,
}

impl PmlComponent {
    /// Index of the sub-component in the field of its axis.
    pub fn index(&self) -> usize {
        match self {
            Self::Xy | Self::Yz | Self::Zx => 0,
            Self::Xz | Self::Yx | Self::Zy => 1,
            Self::Xx | Self::Yy | Self::Zz => 2,
        }
    }

    /// Axis of the field this component belongs to.
    pub fn field_axis(&self) -> Axis {
        match self {
            Self::Xy | Self::Xz | Self::Xx => Axis::X,
            Self::Yz | Self::Yx | Self::Yy => Axis::Y,
            Self::Zx | Self::Zy | Self::Zz => Axis::Z,
        }
    }
}

/// Staggering of the interior solver's fields. The layer's fields use the
/// same staggering, so values can be copied between them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldStaggering {
    pub e: [Staggering; 3],
    pub b: [Staggering; 3],
    pub h: [Staggering; 3],
    pub j: [Staggering; 3],
    pub f: Staggering,
}

impl FieldStaggering {
    /// Yee lattice: E and J on edges, B and H on faces, F on nodes.
    pub fn yee(dims: SpaceDim) -> Self {
        let nodal = Staggering::nodal(dims);
        let edges = Axis::ALL.map(|axis| nodal - Staggering::from_axis(axis));
        let faces = Axis::ALL.map(|axis| nodal & Staggering::from_axis(axis));
        Self {
            e: edges,
            b: faces,
            h: faces,
            j: edges,
            f: nodal,
        }
    }

    /// Everything on nodes.
    pub fn nodal(dims: SpaceDim) -> Self {
        let nodal = Staggering::nodal(dims);
        Self {
            e: [nodal; 3],
            b: [nodal; 3],
            h: [nodal; 3],
            j: [nodal; 3],
            f: nodal,
        }
    }

    pub fn get(&self, kind: FieldKind, axis: Axis) -> Staggering {
        match kind {
            FieldKind::E => self.e[axis.index()],
            FieldKind::B => self.b[axis.index()],
            FieldKind::H => self.h[axis.index()],
            FieldKind::J => self.j[axis.index()],
            FieldKind::F => self.f,
        }
    }
}

/// Guard widths of the layer's fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuardWidths {
    /// E and the macroscopic fields.
    pub e: Vector3<i64>,
    /// B, H and J.
    pub b: Vector3<i64>,
    pub f: Vector3<i64>,
}

impl GuardWidths {
    pub fn new(config: &PmlConfig, dims: SpaceDim) -> Self {
        let e = dims.uniform(2);
        let b = dims.uniform(2);
        let mut ngf = if config.moving_window { 2 } else { 0 };
        if config.maxwell_solver == MaxwellSolver::Ckc {
            ngf = ngf.max(1);
        }
        let f = dims.uniform(ngf);

        if config.maxwell_solver == MaxwellSolver::Psatd {
            // wide enough for the spectral stencil, and the same for all fields
            let stencil = Vector3::from_fn(|axis, _| {
                if axis >= dims.num_axes() {
                    0
                }
                else if config.nodal {
                    config.spectral_order[axis]
                }
                else {
                    config.spectral_order[axis] / 2
                }
            });
            let widest = stencil.sup(&e).sup(&b).sup(&f);
            Self {
                e: widest,
                b: widest,
                f: widest,
            }
        }
        else {
            Self { e, b, f }
        }
    }

    /// Guard widths on the coarse patch. Only the spectral solver needs wide
    /// guards there.
    pub fn coarse(&self, config: &PmlConfig, dims: SpaceDim) -> Self {
        if config.maxwell_solver == MaxwellSolver::Psatd {
            *self
        }
        else {
            Self {
                e: dims.uniform(1),
                b: dims.uniform(1),
                f: self.f,
            }
        }
    }

    pub fn get(&self, kind: FieldKind) -> Vector3<i64> {
        match kind {
            FieldKind::E => self.e,
            FieldKind::B | FieldKind::H | FieldKind::J => self.b,
            FieldKind::F => self.f,
        }
    }
}

/// The split fields of one patch, indexed by field kind and axis.
#[derive(Clone, Debug)]
pub struct SplitFieldSet {
    fields: [[Option<MultiField>; 3]; 5],
}

impl SplitFieldSet {
    /// Allocates zero-initialized fields over `tiles`.
    pub fn new(
        tiles: &BoxArray,
        config: &PmlConfig,
        staggering: &FieldStaggering,
        guard_widths: &GuardWidths,
    ) -> Self {
        let mut fields: [[Option<MultiField>; 3]; 5] = Default::default();

        for kind in FieldKind::ALL {
            let Some(num_components) = Self::num_components(kind, config)
            else {
                continue;
            };
            for axis in kind.axes() {
                fields[kind.index()][axis.index()] = Some(MultiField::new(
                    tiles.convert(staggering.get(kind, *axis)),
                    num_components,
                    guard_widths.get(kind),
                ));
            }
        }

        Self { fields }
    }

    /// Number of split sub-components of a field kind, or `None` if it is not
    /// allocated.
    pub fn num_components(kind: FieldKind, config: &PmlConfig) -> Option<usize> {
        match kind {
            FieldKind::E => Some(config.num_e_components()),
            FieldKind::B => Some(2),
            FieldKind::H => cfg!(feature = "magnetization").then_some(2),
            FieldKind::J => Some(1),
            FieldKind::F => config.divergence_cleaning.then_some(3),
        }
    }

    pub fn get(&self, kind: FieldKind, axis: Axis) -> Option<&MultiField> {
        self.fields[kind.index()][axis.index()].as_ref()
    }

    pub fn get_mut(&mut self, kind: FieldKind, axis: Axis) -> Option<&mut MultiField> {
        self.fields[kind.index()][axis.index()].as_mut()
    }

    pub fn contains(&self, kind: FieldKind) -> bool {
        self.get(kind, Axis::X).is_some()
    }

    /// The divergence cleaning field.
    pub fn f(&self) -> Option<&MultiField> {
        self.get(FieldKind::F, Axis::X)
    }

    pub fn f_mut(&mut self) -> Option<&mut MultiField> {
        self.get_mut(FieldKind::F, Axis::X)
    }

    /// Mutable references to all axes of a vector field.
    pub fn vector_mut(&mut self, kind: FieldKind) -> Option<[&mut MultiField; 3]> {
        let [x, y, z] = &mut self.fields[kind.index()];
        Some([x.as_mut()?, y.as_mut()?, z.as_mut()?])
    }

    /// All allocated fields.
    pub fn iter(&self) -> impl Iterator<Item = (FieldKind, Axis, &MultiField)> {
        FieldKind::ALL.into_iter().flat_map(move |kind| {
            kind.axes()
                .iter()
                .filter_map(move |axis| Some((kind, *axis, self.get(kind, *axis)?)))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (FieldKind, Axis, &mut MultiField)> {
        self.fields
            .iter_mut()
            .zip(FieldKind::ALL)
            .flat_map(|(fields, kind)| {
                fields
                    .iter_mut()
                    .zip(Axis::ALL)
                    .filter_map(move |(field, axis)| Some((kind, axis, field.as_mut()?)))
            })
    }

    pub fn memory_size(&self) -> usize {
        self.iter().map(|(_, _, field)| field.memory_size()).sum()
    }
}

/// Permittivity, permeability and conductivity at the cell centres of one
/// patch's tiles, guard cells included.
#[derive(Clone, Debug)]
pub struct MacroscopicFields {
    pub permittivity: MultiField,
    pub permeability: MultiField,
    pub conductivity: MultiField,
}

impl MacroscopicFields {
    pub fn new(
        tiles: &BoxArray,
        guard_width: &Vector3<i64>,
        medium: &MacroscopicMedium,
        geometry: &Geometry,
    ) -> Self {
        let init = |property: &MediumProperty| {
            let mut field = MultiField::new(tiles.enclosed_cells(), 1, *guard_width);
            field.set_with(0, |cell| property.evaluate(&geometry.cell_center(cell)));
            field
        };

        Self {
            permittivity: init(&medium.permittivity),
            permeability: init(&medium.permeability),
            conductivity: init(&medium.conductivity),
        }
    }

    pub fn memory_size(&self) -> usize {
        self.permittivity.memory_size()
            + self.permeability.memory_size()
            + self.conductivity.memory_size()
    }
}
