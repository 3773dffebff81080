//! Field exchange between the interior and the layer.

use nalgebra::Vector3;

use crate::{
    config::PmlPlacement,
    mesh::{
        MultiField,
        Periodicity,
    },
};

/// Merges the layer field `pml` with the interior field `interior`.
///
/// The sum of the split components is written back to the interior: to its
/// valid cells for in-domain placement, otherwise only to its guard cells.
/// Then the interior values are written to the first split component in the
/// layer's guard cells and the other split components there are zeroed.
pub fn exchange(
    pml: &mut MultiField,
    interior: &mut MultiField,
    periodicity: &Periodicity,
    placement: PmlPlacement,
) {
    let interior_guard = *interior.guard_width();
    let pml_guard = *pml.guard_width();
    let num_components = pml.num_components();
    let no_guard = Vector3::zeros();

    let mut tmp = MultiField::new(interior.boxes().clone(), num_components, interior_guard);
    let total = pml.sum_components();

    if placement.is_in_domain() {
        // valid cells of the layer and the interior overlap
        interior.parallel_copy(&total, 0, 0, 1, &no_guard, &no_guard, periodicity);
    }
    else if interior.has_guard_cells() {
        // the layer only overlaps the interior's guard cells (and its outermost
        // valid nodes, which are left alone)
        tmp.copy_components(interior, 0, 0, 1, &interior_guard);
        tmp.parallel_copy(&total, 0, 0, 1, &no_guard, &interior_guard, periodicity);
        interior.copy_guard_cells(&tmp, 0);
    }

    tmp.copy_components(interior, 0, 0, 1, &no_guard);
    if num_components > 1 {
        tmp.set_val_components(0.0, 1, num_components - 1, &no_guard);
    }

    if placement.is_in_domain() {
        // keep the layer's own valid values where they overlap the interior
        tmp.parallel_copy(
            pml,
            0,
            0,
            num_components,
            &no_guard,
            &no_guard,
            periodicity,
        );
    }

    pml.parallel_copy(
        &tmp,
        0,
        0,
        num_components,
        &no_guard,
        &pml_guard,
        periodicity,
    );
}

/// Copies the interior field into the first component of the layer field,
/// guard cells included.
pub fn copy_to_pml(pml: &mut MultiField, interior: &MultiField, periodicity: &Periodicity) {
    let pml_guard = *pml.guard_width();
    pml.parallel_copy(
        interior,
        0,
        0,
        1,
        &Vector3::zeros(),
        &pml_guard,
        periodicity,
    );
}
