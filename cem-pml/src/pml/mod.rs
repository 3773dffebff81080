//! The absorbing layer of one refinement level.

pub mod checkpoint;
pub mod exchange;
pub mod fields;
pub mod sigma;
pub mod spectral;
pub mod tiling;

use std::path::Path;

use nalgebra::Vector3;

use crate::{
    config::{
        MaxwellSolver,
        PmlConfig,
    },
    error::Error,
    format_size,
    material::MacroscopicMedium,
    mesh::{
        BoxArray,
        Geometry,
        MultiField,
    },
    pml::{
        checkpoint::{
            checkpoint_path,
            read_field,
            write_field,
        },
        exchange::{
            copy_to_pml,
            exchange,
        },
        fields::{
            Axis,
            FieldKind,
            FieldStaggering,
            GuardWidths,
            MacroscopicFields,
            PatchType,
            SplitFieldSet,
        },
        sigma::MultiSigmaBox,
        spectral::{
            SpectralSolver,
            SpectralSolverFactory,
            SpectralSolverParams,
            push_single_patch,
        },
        tiling::{
            make_tiles,
            num_tile_cells,
            reduced_grids,
        },
    },
};

/// What the layer needs to know about the interior of one level.
#[derive(Clone, Copy)]
pub struct PmlDomain<'a> {
    pub level: usize,

    /// Interior blocks of the fine patch.
    pub grids: &'a BoxArray,

    pub geometry: &'a Geometry,

    /// Geometry of the coarse patch. The layer only has a coarse patch if
    /// this is set.
    pub coarse_geometry: Option<&'a Geometry>,

    pub dt: f64,

    /// Staggering of the interior solver's fields.
    pub staggering: &'a FieldStaggering,

    /// Medium extending into the layer. Allocates the macroscopic fields.
    pub medium: Option<&'a MacroscopicMedium>,

    /// Required for [`MaxwellSolver::Psatd`].
    pub spectral: Option<&'a dyn SpectralSolverFactory>,
}

/// State of the layer at one resolution.
#[derive(derive_more::Debug)]
struct Patch {
    geometry: Geometry,
    tiles: BoxArray,
    guard_widths: GuardWidths,
    fields: SplitFieldSet,
    sigma_boxes: MultiSigmaBox,
    macroscopic: Option<MacroscopicFields>,
    #[debug(skip)]
    spectral_solver: Option<Box<dyn SpectralSolver>>,
}

impl Patch {
    #[allow(clippy::too_many_arguments)]
    fn new(
        patch_type: PatchType,
        config: &PmlConfig,
        domain: &PmlDomain,
        geometry: &Geometry,
        tiles: BoxArray,
        sigma_grids: &BoxArray,
        ncell: i64,
        delta: i64,
        guard_widths: GuardWidths,
    ) -> Result<Self, Error> {
        let fields = SplitFieldSet::new(&tiles, config, domain.staggering, &guard_widths);

        let sigma_boxes = MultiSigmaBox::new(
            &tiles,
            sigma_grids,
            &geometry.cell_size,
            ncell,
            delta,
            geometry.dims,
            &config.physical_constants,
        )?;

        let macroscopic = domain
            .medium
            .map(|medium| MacroscopicFields::new(&tiles, &guard_widths.e, medium, geometry));

        let spectral_solver = if config.maxwell_solver == MaxwellSolver::Psatd {
            let factory = domain.spectral.ok_or(Error::SpectralSolverUnavailable)?;
            Some(factory.create(&SpectralSolverParams {
                level: domain.level,
                realspace_boxes: tiles.enclosed_cells().grow(&guard_widths.e),
                order: config.spectral_order,
                nodal: config.nodal,
                cell_size: geometry.cell_size,
                dt: domain.dt,
                in_pml: true,
            }))
        }
        else {
            None
        };

        let memory_size = fields.memory_size()
            + macroscopic
                .as_ref()
                .map_or(0, MacroscopicFields::memory_size);
        tracing::info!(
            level = domain.level,
            patch = patch_type.suffix(),
            tiles = tiles.len(),
            cells = num_tile_cells(&tiles),
            guard_e = ?guard_widths.e,
            guard_b = ?guard_widths.b,
            guard_f = ?guard_widths.f,
            memory = %format_size(memory_size),
            "allocated PML patch"
        );

        Ok(Self {
            geometry: *geometry,
            tiles,
            guard_widths,
            fields,
            sigma_boxes,
            macroscopic,
            spectral_solver,
        })
    }
}

/// Perfectly matched layer around the interior of one refinement level.
#[derive(Debug)]
pub struct Pml {
    config: PmlConfig,
    fine: Patch,
    coarse: Option<Patch>,
}

impl Pml {
    /// Builds the layer's tiles, damping profiles and fields.
    ///
    /// Returns `Ok(None)` if no layer is needed, e.g. because all axes are
    /// periodic or all sides are disabled.
    pub fn new(config: &PmlConfig, domain: PmlDomain) -> Result<Option<Self>, Error> {
        let geometry = domain.geometry;
        let dims = geometry.dims;
        let ncell = config.ncell;

        if config.maxwell_solver == MaxwellSolver::Psatd && domain.spectral.is_none() {
            return Err(Error::SpectralSolverUnavailable);
        }

        let grids = if config.placement.is_in_domain() {
            reduced_grids(geometry, domain.grids, &dims.uniform(ncell), config)
        }
        else {
            domain.grids.clone()
        };

        let tiles = make_tiles(geometry, &grids, ncell, config)?;
        if tiles.is_empty() {
            tracing::info!(level = domain.level, "no PML needed");
            return Ok(None);
        }

        let guard_widths = GuardWidths::new(config, dims);
        let fine = Patch::new(
            PatchType::Fine,
            config,
            &domain,
            geometry,
            tiles,
            &grids,
            ncell,
            config.delta,
            guard_widths,
        )?;

        let coarse = domain
            .coarse_geometry
            .map(|coarse_geometry| {
                Self::new_coarse_patch(config, &domain, coarse_geometry, &guard_widths)
            })
            .transpose()?
            .flatten();

        Ok(Some(Self {
            config: *config,
            fine,
            coarse,
        }))
    }

    fn new_coarse_patch(
        config: &PmlConfig,
        domain: &PmlDomain,
        geometry: &Geometry,
        fine_guard_widths: &GuardWidths,
    ) -> Result<Option<Patch>, Error> {
        let dims = geometry.dims;
        let ref_ratio = Vector3::from(config.ref_ratio);
        let coarse_grids = domain.grids.coarsen(&ref_ratio);

        // the layer has the same physical thickness on both patches, assuming
        // the same refinement ratio along all axes
        let (grids, ncell, delta) = if config.placement.is_in_domain() {
            let shrink = dims
                .uniform(config.ncell)
                .zip_map(&ref_ratio, |ncell, ratio| ncell / ratio);
            (
                reduced_grids(geometry, &coarse_grids, &shrink, config),
                config.ncell / ref_ratio.x,
                config.delta / ref_ratio.x,
            )
        }
        else {
            (coarse_grids, config.ncell, config.delta)
        };

        let tiles = make_tiles(geometry, &grids, ncell, config)?;
        if tiles.is_empty() {
            tracing::debug!(level = domain.level, "no PML needed on the coarse patch");
            return Ok(None);
        }

        Patch::new(
            PatchType::Coarse,
            config,
            domain,
            geometry,
            tiles,
            &grids,
            ncell,
            delta,
            fine_guard_widths.coarse(config, dims),
        )
        .map(Some)
    }

    pub fn config(&self) -> &PmlConfig {
        &self.config
    }

    pub fn has_coarse_patch(&self) -> bool {
        self.coarse.is_some()
    }

    fn patch(&self, patch_type: PatchType) -> Option<&Patch> {
        match patch_type {
            PatchType::Fine => Some(&self.fine),
            PatchType::Coarse => self.coarse.as_ref(),
        }
    }

    fn patch_mut(&mut self, patch_type: PatchType) -> Option<&mut Patch> {
        match patch_type {
            PatchType::Fine => Some(&mut self.fine),
            PatchType::Coarse => self.coarse.as_mut(),
        }
    }

    fn patches_mut(&mut self) -> impl Iterator<Item = (PatchType, &mut Patch)> {
        std::iter::once((PatchType::Fine, &mut self.fine))
            .chain(self.coarse.as_mut().map(|patch| (PatchType::Coarse, patch)))
    }

    pub fn tiles(&self, patch_type: PatchType) -> Option<&BoxArray> {
        self.patch(patch_type).map(|patch| &patch.tiles)
    }

    pub fn geometry(&self, patch_type: PatchType) -> Option<&Geometry> {
        self.patch(patch_type).map(|patch| &patch.geometry)
    }

    pub fn guard_widths(&self, patch_type: PatchType) -> Option<&GuardWidths> {
        self.patch(patch_type).map(|patch| &patch.guard_widths)
    }

    pub fn fields(&self, patch_type: PatchType) -> Option<&SplitFieldSet> {
        self.patch(patch_type).map(|patch| &patch.fields)
    }

    pub fn fields_mut(&mut self, patch_type: PatchType) -> Option<&mut SplitFieldSet> {
        self.patch_mut(patch_type).map(|patch| &mut patch.fields)
    }

    pub fn sigma_boxes(&self, patch_type: PatchType) -> Option<&MultiSigmaBox> {
        self.patch(patch_type).map(|patch| &patch.sigma_boxes)
    }

    pub fn macroscopic(&self, patch_type: PatchType) -> Option<&MacroscopicFields> {
        self.patch(patch_type)
            .and_then(|patch| patch.macroscopic.as_ref())
    }

    /// Updates the damping factors for a new time step. Cheap if `dt` didn't
    /// change since the last call.
    pub fn compute_pml_factors(&mut self, dt: f64) {
        for (_, patch) in self.patches_mut() {
            let cell_size = patch.geometry.cell_size;
            patch.sigma_boxes.compute_factors_b(&cell_size, dt);
            patch.sigma_boxes.compute_factors_e(&cell_size, dt);
        }
    }

    fn exchange_vector(
        &mut self,
        kind: FieldKind,
        patch_type: PatchType,
        interior: [&mut MultiField; 3],
    ) {
        let placement = self.config.placement;
        let Some(patch) = self.patch_mut(patch_type)
        else {
            return;
        };
        let periodicity = patch.geometry.periodicity();
        let Some(fields) = patch.fields.vector_mut(kind)
        else {
            return;
        };

        for (pml, interior) in fields.into_iter().zip(interior) {
            exchange(pml, interior, &periodicity, placement);
        }
    }

    /// Exchanges E between the interior fields (x, y, z) and the layer.
    pub fn exchange_e(&mut self, patch_type: PatchType, interior: [&mut MultiField; 3]) {
        self.exchange_vector(FieldKind::E, patch_type, interior);
    }

    pub fn exchange_b(&mut self, patch_type: PatchType, interior: [&mut MultiField; 3]) {
        self.exchange_vector(FieldKind::B, patch_type, interior);
    }

    /// Does nothing without the `magnetization` feature.
    pub fn exchange_h(&mut self, patch_type: PatchType, interior: [&mut MultiField; 3]) {
        self.exchange_vector(FieldKind::H, patch_type, interior);
    }

    /// Does nothing without divergence cleaning.
    pub fn exchange_f(&mut self, patch_type: PatchType, interior: &mut MultiField) {
        let placement = self.config.placement;
        if let Some(patch) = self.patch_mut(patch_type) {
            let periodicity = patch.geometry.periodicity();
            if let Some(pml) = patch.fields.f_mut() {
                exchange(pml, interior, &periodicity, placement);
            }
        }
    }

    /// Copies the interior current density into the layer.
    pub fn copy_j_to_pml(&mut self, patch_type: PatchType, interior: [&MultiField; 3]) {
        let Some(patch) = self.patch_mut(patch_type)
        else {
            return;
        };
        let periodicity = patch.geometry.periodicity();

        for (axis, interior) in Axis::ALL.into_iter().zip(interior) {
            if let Some(pml) = patch.fields.get_mut(FieldKind::J, axis) {
                copy_to_pml(pml, interior, &periodicity);
            }
        }
    }

    fn fill_boundary_kind(&mut self, kind: FieldKind, patch_type: PatchType) {
        let Some(patch) = self.patch_mut(patch_type)
        else {
            return;
        };
        let periodicity = patch.geometry.periodicity();

        for axis in kind.axes() {
            if let Some(field) = patch.fields.get_mut(kind, *axis) {
                field.fill_boundary(&periodicity);
            }
        }
    }

    pub fn fill_boundary_e(&mut self, patch_type: PatchType) {
        self.fill_boundary_kind(FieldKind::E, patch_type);
    }

    pub fn fill_boundary_b(&mut self, patch_type: PatchType) {
        self.fill_boundary_kind(FieldKind::B, patch_type);
    }

    pub fn fill_boundary_h(&mut self, patch_type: PatchType) {
        self.fill_boundary_kind(FieldKind::H, patch_type);
    }

    pub fn fill_boundary_f(&mut self, patch_type: PatchType) {
        self.fill_boundary_kind(FieldKind::F, patch_type);
    }

    /// Refreshes the guard cells of E, B and F on both patches.
    pub fn fill_boundary(&mut self) {
        for patch_type in [PatchType::Fine, PatchType::Coarse] {
            self.fill_boundary_e(patch_type);
            self.fill_boundary_b(patch_type);
            self.fill_boundary_f(patch_type);
        }
    }

    /// Writes E, B, H and F of both patches to `<prefix>_<field>_<patch>`.
    pub fn checkpoint(&self, prefix: impl AsRef<Path>) -> Result<(), Error> {
        let prefix = prefix.as_ref();
        for patch_type in [PatchType::Fine, PatchType::Coarse] {
            let Some(patch) = self.patch(patch_type)
            else {
                continue;
            };
            for (kind, axis, field) in patch.fields.iter() {
                if let Some(name) = checkpoint_name(kind, axis, patch_type) {
                    write_field(&checkpoint_path(prefix, &name), field)?;
                }
            }
        }
        tracing::info!(prefix = %prefix.display(), "wrote PML checkpoint");
        Ok(())
    }

    /// Reads fields written by [`checkpoint`](Self::checkpoint).
    pub fn restart(&mut self, prefix: impl AsRef<Path>) -> Result<(), Error> {
        let prefix = prefix.as_ref();
        for (patch_type, patch) in self.patches_mut() {
            for (kind, axis, field) in patch.fields.iter_mut() {
                if let Some(name) = checkpoint_name(kind, axis, patch_type) {
                    read_field(&checkpoint_path(prefix, &name), field)?;
                }
            }
        }
        tracing::info!(prefix = %prefix.display(), "restarted PML from checkpoint");
        Ok(())
    }

    /// Advances the split E and B fields with the spectral solver, first on
    /// the fine, then on the coarse patch. Does nothing for other solvers.
    pub fn push_spectral(&mut self) {
        for (_, patch) in self.patches_mut() {
            if let Some(solver) = &mut patch.spectral_solver {
                push_single_patch(solver.as_mut(), &mut patch.fields);
            }
        }
    }
}

/// Name of a field's checkpoint file. The current density is not saved.
fn checkpoint_name(kind: FieldKind, axis: Axis, patch_type: PatchType) -> Option<String> {
    match kind {
        FieldKind::J => None,
        FieldKind::F => Some(format!("F_{}", patch_type.suffix())),
        _ => Some(format!("{kind}{}_{}", axis.name(), patch_type.suffix())),
    }
}
