use nalgebra::Vector3;

use crate::{
    config::PmlConfig,
    error::Error,
    mesh::{
        BoxArray,
        Geometry,
        IndexBox,
        SpaceDim,
    },
};

/// Builds the disjoint tiles of the layer around `grids`.
///
/// The layer is `ncell` cells thick and only grows on the enabled sides of
/// non-periodic axes. For in-domain placement `grids` must already be reduced
/// with [`reduced_grids`].
pub fn make_tiles(
    geometry: &Geometry,
    grids: &BoxArray,
    ncell: i64,
    config: &PmlConfig,
) -> Result<BoxArray, Error> {
    let dims = geometry.dims;
    let layer_axes = dims
        .axes()
        .filter(|axis| !geometry.is_periodic(*axis))
        .collect::<Vec<_>>();

    let mut domain = geometry.domain;
    for &axis in &layer_axes {
        if config.lo[axis] {
            domain = domain.grow_lo(axis, ncell);
        }
        if config.hi[axis] {
            domain = domain.grow_hi(axis, ncell);
        }
    }

    if !config.placement.is_in_domain() {
        // tiles of neighbouring blocks must not overlap each other's blocks
        for grid in grids {
            for &axis in &layer_axes {
                let extent = grid.length(axis);
                if (config.lo[axis] || config.hi[axis]) && extent <= ncell {
                    return Err(Error::BlockTooSmall {
                        block: *grid,
                        axis,
                        extent,
                        ncell,
                    });
                }
            }
        }
    }

    let neighbour_offsets = neighbour_offsets(dims);

    let mut tiles = vec![];
    for grid in grids {
        let size = grid.size();
        let bx = grid.grow(&dims.uniform(ncell)) & domain;

        let boundary_boxes = neighbour_offsets
            .iter()
            .map(|offset| grid.shift(&size.component_mul(offset)) & bx)
            .filter(|shifted| !shifted.is_empty())
            .collect::<Vec<_>>();

        for uncovered in grids.complement_in(&bx) {
            tiles.extend(
                boundary_boxes
                    .iter()
                    .map(|boundary| uncovered & *boundary)
                    .filter(|tile| !tile.is_empty()),
            );
        }
    }

    Ok(BoxArray::new(tiles).remove_overlap())
}

/// Interior blocks clipped to the bounding box of `grids` shrunk by `ncell`
/// on the enabled sides of non-periodic axes.
///
/// Tiles built around the reduced blocks overlap the outermost `ncell` cells
/// of the interior.
pub fn reduced_grids(
    geometry: &Geometry,
    grids: &BoxArray,
    ncell: &Vector3<i64>,
    config: &PmlConfig,
) -> BoxArray {
    let Some(mut reduced) = grids.minimal_box()
    else {
        return BoxArray::default();
    };

    for axis in geometry.dims.axes() {
        if !geometry.is_periodic(axis) {
            if config.lo[axis] {
                reduced = reduced.grow_lo(axis, -ncell[axis]);
            }
            if config.hi[axis] {
                reduced = reduced.grow_hi(axis, -ncell[axis]);
            }
        }
    }

    grids.intersect_box(&reduced)
}

/// Offsets of the 8 (2-D) or 26 (3-D) neighbours of a block, in units of the
/// block size.
fn neighbour_offsets(dims: SpaceDim) -> Vec<Vector3<i64>> {
    let k_range = match dims {
        SpaceDim::Two => 0..=0,
        SpaceDim::Three => -1..=1,
    };

    let mut offsets = vec![];
    for k in k_range {
        for j in -1..=1 {
            for i in -1..=1 {
                if (i, j, k) != (0, 0, 0) {
                    offsets.push(Vector3::new(i, j, k));
                }
            }
        }
    }
    offsets
}

/// Total number of cells in the tiles, for logging.
pub(super) fn num_tile_cells(tiles: &BoxArray) -> usize {
    tiles.iter().map(IndexBox::num_points).sum()
}
