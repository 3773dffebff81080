use std::ops::{
    Index,
    RangeInclusive,
};

use arrayvec::ArrayVec;
use nalgebra::Vector3;

use crate::{
    error::Error,
    material::PhysicalConstants,
    mesh::{
        BoxArray,
        IndexBox,
        SpaceDim,
    },
    parallel,
};

/// 1-D array of damping values indexed by global cell coordinate.
///
/// The first value belongs to index `lo`. Indices are never shifted to start
/// at 0.
#[derive(Clone, Debug, PartialEq)]
pub struct SigmaArray {
    lo: i64,
    values: Box<[f64]>,
}

impl SigmaArray {
    fn zeros(range: RangeInclusive<i64>) -> Self {
        let len = (range.end() - range.start() + 1).max(0) as usize;
        Self {
            lo: *range.start(),
            values: vec![0.0; len].into_boxed_slice(),
        }
    }

    pub fn lo(&self) -> i64 {
        self.lo
    }

    /// Last valid index (inclusive).
    pub fn hi(&self) -> i64 {
        self.lo + self.values.len() as i64 - 1
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: i64) -> Option<f64> {
        let offset = usize::try_from(index - self.lo).ok()?;
        self.values.get(offset).copied()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    fn set(&mut self, index: i64, value: f64) {
        let offset = (index - self.lo) as usize;
        self.values[offset] = value;
    }

    fn update_from(&mut self, source: &SigmaArray, f: impl Fn(f64) -> f64) {
        debug_assert_eq!(self.lo, source.lo);
        for (target, source) in self.values.iter_mut().zip(&source.values) {
            *target = f(*source);
        }
    }
}

impl Index<i64> for SigmaArray {
    type Output = f64;

    fn index(&self, index: i64) -> &Self::Output {
        &self.values[(index - self.lo) as usize]
    }
}

/// Damping profile of one tile along one axis.
///
/// `sigma` and `sigma_cumsum` are sampled at cell boundaries, the `star`
/// variants half a cell further out. Values are written once during
/// construction. The `*_fac` arrays are derived from them by
/// [`compute_factors_e`](Self::compute_factors_e) and
/// [`compute_factors_b`](Self::compute_factors_b).
#[derive(Clone, Debug)]
pub struct DampingProfile {
    sigma: SigmaArray,
    sigma_cumsum: SigmaArray,
    sigma_star: SigmaArray,
    sigma_star_cumsum: SigmaArray,
    sigma_fac: SigmaArray,
    sigma_cumsum_fac: SigmaArray,
    sigma_star_fac: SigmaArray,
    sigma_star_cumsum_fac: SigmaArray,
}

impl DampingProfile {
    /// Zero profile for `lo..=hi+1` of a tile.
    fn new(lo: i64, hi: i64) -> Self {
        let zeros = SigmaArray::zeros(lo..=hi + 1);
        Self {
            sigma: zeros.clone(),
            sigma_cumsum: zeros.clone(),
            sigma_star: zeros.clone(),
            sigma_star_cumsum: zeros.clone(),
            sigma_fac: zeros.clone(),
            sigma_cumsum_fac: zeros.clone(),
            sigma_star_fac: zeros.clone(),
            sigma_star_cumsum_fac: zeros,
        }
    }

    pub fn sigma(&self) -> &SigmaArray {
        &self.sigma
    }

    pub fn sigma_cumsum(&self) -> &SigmaArray {
        &self.sigma_cumsum
    }

    pub fn sigma_star(&self) -> &SigmaArray {
        &self.sigma_star
    }

    pub fn sigma_star_cumsum(&self) -> &SigmaArray {
        &self.sigma_star_cumsum
    }

    pub fn sigma_fac(&self) -> &SigmaArray {
        &self.sigma_fac
    }

    pub fn sigma_cumsum_fac(&self) -> &SigmaArray {
        &self.sigma_cumsum_fac
    }

    pub fn sigma_star_fac(&self) -> &SigmaArray {
        &self.sigma_star_fac
    }

    pub fn sigma_star_cumsum_fac(&self) -> &SigmaArray {
        &self.sigma_star_cumsum_fac
    }

    /// Writes `overlap.lo ..= overlap.hi + 1`. `offset(i)` returns the
    /// distance from the interior boundary for the primary and the staggered
    /// sample.
    fn fill(
        &mut self,
        overlap: RangeInclusive<i64>,
        strength: &Strength,
        offset: impl Fn(i64) -> (f64, f64),
    ) {
        for i in *overlap.start()..=*overlap.end() + 1 {
            let (offset, offset_star) = offset(i);
            self.sigma.set(i, strength.sigma(offset));
            self.sigma_cumsum.set(i, strength.cumsum(offset));
            self.sigma_star.set(i, strength.sigma(offset_star));
            self.sigma_star_cumsum.set(i, strength.cumsum(offset_star));
        }
    }

    fn fill_lo(&mut self, overlap: RangeInclusive<i64>, grid_lo: i64, strength: &Strength) {
        self.fill(overlap, strength, |i| {
            let offset = (grid_lo - i) as f64;
            (offset, offset - 0.5)
        });
    }

    fn fill_hi(&mut self, overlap: RangeInclusive<i64>, grid_hi: i64, strength: &Strength) {
        self.fill(overlap, strength, |i| {
            ((i - grid_hi - 1) as f64, (i - grid_hi) as f64 - 0.5)
        });
    }

    fn fill_zero(&mut self, overlap: RangeInclusive<i64>) {
        self.fill(overlap, &Strength::ZERO, |_| (0.0, 0.0));
    }

    /// Factors for the E-field update, `exp(-sigma dt)` and
    /// `exp(-sigma_cumsum dx)`.
    pub fn compute_factors_e(&mut self, dx: f64, dt: f64) {
        self.sigma_fac.update_from(&self.sigma, |sigma| (-sigma * dt).exp());
        self.sigma_cumsum_fac
            .update_from(&self.sigma_cumsum, |cumsum| (-cumsum * dx).exp());
    }

    /// Factors for the B-field update, same as for E but from the staggered
    /// samples.
    pub fn compute_factors_b(&mut self, dx: f64, dt: f64) {
        self.sigma_star_fac
            .update_from(&self.sigma_star, |sigma| (-sigma * dt).exp());
        self.sigma_star_cumsum_fac
            .update_from(&self.sigma_star_cumsum, |cumsum| (-cumsum * dx).exp());
    }
}

/// Quadratic damping strength `fac * offset^2` and its antiderivative divided
/// by the speed of light.
#[derive(Clone, Copy, Debug)]
struct Strength {
    fac: f64,
    speed_of_light: f64,
}

impl Strength {
    const ZERO: Self = Self {
        fac: 0.0,
        speed_of_light: 1.0,
    };

    fn new(dx: f64, delta: i64, physical_constants: &PhysicalConstants) -> Self {
        let speed_of_light = physical_constants.speed_of_light();
        Self {
            fac: 4.0 * speed_of_light / (dx * (delta * delta) as f64),
            speed_of_light,
        }
    }

    fn sigma(&self, offset: f64) -> f64 {
        self.fac * (offset * offset)
    }

    fn cumsum(&self, offset: f64) -> f64 {
        self.fac * (offset * offset * offset) / 3.0 / self.speed_of_light
    }
}

/// How an interior block relates to a tile, seen along one axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Adjacency {
    /// The block grown along the axis reaches the tile.
    DirectFace,

    /// The block grown along another axis reaches the tile.
    SideFace { axis: usize },

    /// The block grown along the axis and one other axis reaches the tile
    /// (3-D only).
    DirectSideEdge { side_axis: usize },

    /// The block grown along both other axes reaches the tile (3-D only).
    SideSideEdge,

    /// Anything else reached by the block grown along all axes.
    Corner,
}

impl Adjacency {
    pub fn classify(
        grid: &IndexBox,
        tile: &IndexBox,
        axis: usize,
        ncell: i64,
        dims: SpaceDim,
    ) -> Self {
        let j = dims.next_axis(axis, 1);
        let reaches = |bx: IndexBox| bx.intersects(tile);

        if reaches(grid.grow_axis(axis, ncell)) {
            return Self::DirectFace;
        }
        if reaches(grid.grow_axis(j, ncell)) {
            return Self::SideFace { axis: j };
        }

        if dims == SpaceDim::Three {
            let k = dims.next_axis(axis, 2);
            if reaches(grid.grow_axis(k, ncell)) {
                return Self::SideFace { axis: k };
            }
            for side_axis in [j, k] {
                if reaches(grid.grow_axis(axis, ncell).grow_axis(side_axis, ncell)) {
                    return Self::DirectSideEdge { side_axis };
                }
            }
            if reaches(grid.grow_axis(j, ncell).grow_axis(k, ncell)) {
                return Self::SideSideEdge;
            }
        }

        Self::Corner
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::DirectFace => "direct face",
            Self::SideFace { .. } => "side face",
            Self::DirectSideEdge { .. } => "direct side edge",
            Self::SideSideEdge => "side side edge",
            Self::Corner => "corner",
        }
    }

    /// Categories are filled in ascending order, so direct faces are written
    /// last and win where fills overlap.
    fn fill_order(&self) -> u8 {
        match self {
            Self::Corner => 0,
            Self::SideSideEdge => 1,
            Self::DirectSideEdge { .. } => 2,
            Self::SideFace { .. } => 3,
            Self::DirectFace => 4,
        }
    }
}

/// Per-axis damping profiles of one tile.
#[derive(Clone, Debug)]
pub struct SigmaBox {
    tile: IndexBox,
    profiles: ArrayVec<DampingProfile, 3>,
}

impl SigmaBox {
    /// Builds the profiles of `tile` from the interior blocks in `grids`.
    pub fn new(
        tile: &IndexBox,
        grids: &BoxArray,
        cell_size: &Vector3<f64>,
        ncell: i64,
        delta: i64,
        dims: SpaceDim,
        physical_constants: &PhysicalConstants,
    ) -> Result<Self, Error> {
        assert!(
            tile.staggering.is_empty(),
            "damping profiles are built on cell-centered tiles"
        );

        let neighbours = grids.intersections(tile, &dims.uniform(ncell));

        let mut profiles = ArrayVec::new();
        for axis in dims.axes() {
            let strength = Strength::new(cell_size[axis], delta, physical_constants);
            let mut profile = DampingProfile::new(tile.lo[axis], tile.hi[axis]);

            let mut classified = neighbours
                .iter()
                .map(|index| {
                    let grid = &grids[*index];
                    (Adjacency::classify(grid, tile, axis, ncell, dims), grid)
                })
                .collect::<Vec<_>>();

            let num_direct_faces = classified
                .iter()
                .filter(|(adjacency, _)| *adjacency == Adjacency::DirectFace)
                .count();
            if num_direct_faces > 1 {
                return Err(Error::AmbiguousDirectFace {
                    tile: *tile,
                    axis,
                    count: num_direct_faces,
                });
            }

            // stable, so blocks of one category keep their order
            classified.sort_by_key(|(adjacency, _)| adjacency.fill_order());

            for (adjacency, grid) in classified {
                fill_profile(
                    &mut profile,
                    adjacency,
                    grid,
                    tile,
                    axis,
                    ncell,
                    dims,
                    &strength,
                )?;
            }

            profiles.push(profile);
        }

        Ok(Self {
            tile: *tile,
            profiles,
        })
    }

    pub fn tile(&self) -> &IndexBox {
        &self.tile
    }

    pub fn profile(&self, axis: usize) -> &DampingProfile {
        &self.profiles[axis]
    }

    pub fn profiles(&self) -> &[DampingProfile] {
        &self.profiles
    }

    pub fn compute_factors_e(&mut self, cell_size: &Vector3<f64>, dt: f64) {
        for (axis, profile) in self.profiles.iter_mut().enumerate() {
            profile.compute_factors_e(cell_size[axis], dt);
        }
    }

    pub fn compute_factors_b(&mut self, cell_size: &Vector3<f64>, dt: f64) {
        for (axis, profile) in self.profiles.iter_mut().enumerate() {
            profile.compute_factors_b(cell_size[axis], dt);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn fill_profile(
    profile: &mut DampingProfile,
    adjacency: Adjacency,
    grid: &IndexBox,
    tile: &IndexBox,
    axis: usize,
    ncell: i64,
    dims: SpaceDim,
    strength: &Strength,
) -> Result<(), Error> {
    let mut other_axes = dims.uniform(ncell);
    other_axes[axis] = 0;

    let invalid = || {
        Error::InvalidAdjacency {
            category: adjacency.name(),
            tile: *tile,
            block: *grid,
            axis,
        }
    };

    match adjacency {
        Adjacency::SideFace { .. } | Adjacency::SideSideEdge => {
            let overlap = grid.grow(&other_axes) & *tile;
            if overlap.is_empty() {
                return Err(invalid());
            }
            profile.fill_zero(overlap.lo[axis]..=overlap.hi[axis]);
        }
        Adjacency::DirectFace | Adjacency::DirectSideEdge { .. } | Adjacency::Corner => {
            let widen = if adjacency == Adjacency::DirectFace {
                Vector3::zeros()
            }
            else {
                other_axes
            };

            let lo_overlap = grid.adj_cell_lo(axis, ncell).grow(&widen) & *tile;
            if !lo_overlap.is_empty() {
                profile.fill_lo(
                    lo_overlap.lo[axis]..=lo_overlap.hi[axis],
                    grid.lo[axis],
                    strength,
                );
            }

            let hi_overlap = grid.adj_cell_hi(axis, ncell).grow(&widen) & *tile;
            if !hi_overlap.is_empty() {
                profile.fill_hi(
                    hi_overlap.lo[axis]..=hi_overlap.hi[axis],
                    grid.hi[axis],
                    strength,
                );
            }

            if lo_overlap.is_empty() && hi_overlap.is_empty() {
                return Err(invalid());
            }
        }
    }

    Ok(())
}

/// The damping profiles of all tiles of one patch.
#[derive(Clone, Debug)]
pub struct MultiSigmaBox {
    sigma_boxes: Vec<SigmaBox>,
    last_e: Option<(Vector3<f64>, f64)>,
    last_b: Option<(Vector3<f64>, f64)>,
}

impl MultiSigmaBox {
    pub fn new(
        tiles: &BoxArray,
        grids: &BoxArray,
        cell_size: &Vector3<f64>,
        ncell: i64,
        delta: i64,
        dims: SpaceDim,
        physical_constants: &PhysicalConstants,
    ) -> Result<Self, Error> {
        let sigma_boxes = parallel::map(tiles.as_slice(), |_, tile| {
            SigmaBox::new(
                tile,
                grids,
                cell_size,
                ncell,
                delta,
                dims,
                physical_constants,
            )
        })
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            sigma_boxes,
            last_e: None,
            last_b: None,
        })
    }

    pub fn len(&self) -> usize {
        self.sigma_boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sigma_boxes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SigmaBox> {
        self.sigma_boxes.iter()
    }

    /// Profiles of the tile with the same index in the patch's tile array.
    pub fn get(&self, index: usize) -> Option<&SigmaBox> {
        self.sigma_boxes.get(index)
    }

    /// Does nothing if called again with the same cell size and time step.
    pub fn compute_factors_e(&mut self, cell_size: &Vector3<f64>, dt: f64) {
        if self.last_e == Some((*cell_size, dt)) {
            return;
        }
        self.last_e = Some((*cell_size, dt));

        tracing::debug!(?cell_size, dt, "computing E-field damping factors");
        parallel::for_each_mut(&mut self.sigma_boxes, |_, sigma_box| {
            sigma_box.compute_factors_e(cell_size, dt);
        });
    }

    /// Does nothing if called again with the same cell size and time step.
    pub fn compute_factors_b(&mut self, cell_size: &Vector3<f64>, dt: f64) {
        if self.last_b == Some((*cell_size, dt)) {
            return;
        }
        self.last_b = Some((*cell_size, dt));

        tracing::debug!(?cell_size, dt, "computing B-field damping factors");
        parallel::for_each_mut(&mut self.sigma_boxes, |_, sigma_box| {
            sigma_box.compute_factors_b(cell_size, dt);
        });
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{
        Point3,
        Vector3,
    };

    use crate::{
        error::Error,
        material::PhysicalConstants,
        mesh::{
            BoxArray,
            IndexBox,
            SpaceDim,
        },
        pml::sigma::{
            Adjacency,
            MultiSigmaBox,
            SigmaBox,
        },
    };

    const C: PhysicalConstants = PhysicalConstants::REDUCED;

    fn cell_box(lo: [i64; 3], hi: [i64; 3]) -> IndexBox {
        IndexBox::new(Point3::from(lo), Point3::from(hi))
    }

    fn assert_close(a: f64, b: f64) {
        assert!(
            (a - b).abs() <= 1e-12 * a.abs().max(b.abs()).max(1.0),
            "{a} != {b}"
        );
    }

    fn single_block() -> BoxArray {
        BoxArray::new([cell_box([0, 0, 0], [15, 15, 0])])
    }

    fn sigma_box(tile: IndexBox, grids: &BoxArray) -> Result<SigmaBox, Error> {
        SigmaBox::new(
            &tile,
            grids,
            &Vector3::new(0.5, 0.5, 1.0),
            8,
            8,
            SpaceDim::Two,
            &C,
        )
    }

    #[test]
    fn it_classifies_faces_and_corners() {
        let grid = cell_box([0, 0, 0], [15, 15, 0]);
        let face = cell_box([-8, 0, 0], [-1, 15, 0]);
        let corner = cell_box([-8, -8, 0], [-1, -1, 0]);

        assert_eq!(
            Adjacency::classify(&grid, &face, 0, 8, SpaceDim::Two),
            Adjacency::DirectFace
        );
        assert_eq!(
            Adjacency::classify(&grid, &face, 1, 8, SpaceDim::Two),
            Adjacency::SideFace { axis: 0 }
        );
        assert_eq!(
            Adjacency::classify(&grid, &corner, 0, 8, SpaceDim::Two),
            Adjacency::Corner
        );
    }

    #[test]
    fn it_classifies_edges_in_3d() {
        let grid = cell_box([0, 0, 0], [15, 15, 15]);
        let edge = cell_box([-4, -4, 0], [-1, -1, 15]);

        // along x, the block must grow along x and y to reach the x-y edge
        assert_eq!(
            Adjacency::classify(&grid, &edge, 0, 4, SpaceDim::Three),
            Adjacency::DirectSideEdge { side_axis: 1 }
        );
        // along z, it must grow along x and y, neither of which is z
        assert_eq!(
            Adjacency::classify(&grid, &edge, 2, 4, SpaceDim::Three),
            Adjacency::SideSideEdge
        );
    }

    #[test]
    fn damping_increases_away_from_the_interior() {
        let sigma_box = sigma_box(cell_box([-8, 0, 0], [-1, 15, 0]), &single_block()).unwrap();
        let sigma = sigma_box.profile(0).sigma();

        assert_eq!(sigma.lo(), -8);
        assert_eq!(sigma.hi(), 0);
        assert_eq!(sigma[0], 0.0);

        // 4 c / (dx delta^2) * delta^2
        assert_close(sigma[-8], 4.0 * C.speed_of_light() / 0.5);

        for i in -8..0 {
            assert!(sigma[i] >= sigma[i + 1], "sigma[{i}] < sigma[{}]", i + 1);
        }

        // the tile is not damped along y
        let sigma_y = sigma_box.profile(1);
        assert!(sigma_y.sigma().as_slice().iter().all(|x| *x == 0.0));
        assert!(sigma_y.sigma_star().as_slice().iter().all(|x| *x == 0.0));
    }

    #[test]
    fn cumsum_is_the_antiderivative_of_sigma() {
        let grids = single_block();
        let fac = 4.0 * C.speed_of_light() / (0.5 * 64.0);

        let lo = sigma_box(cell_box([-8, 0, 0], [-1, 15, 0]), &grids).unwrap();
        let profile = lo.profile(0);
        for i in -8..=0 {
            let offset = (0 - i) as f64;
            assert_close(profile.sigma()[i], fac * offset * offset);
            assert_close(
                profile.sigma_cumsum()[i],
                fac * offset.powi(3) / 3.0 / C.speed_of_light(),
            );
            let offset = offset - 0.5;
            assert_close(
                profile.sigma_star_cumsum()[i],
                fac * offset.powi(3) / 3.0 / C.speed_of_light(),
            );
        }

        let hi = sigma_box(cell_box([0, 16, 0], [15, 23, 0]), &grids).unwrap();
        let profile = hi.profile(1);
        for i in 16..=24 {
            let offset = (i - 15 - 1) as f64;
            assert_close(profile.sigma()[i], fac * offset * offset);
            assert_close(
                profile.sigma_cumsum()[i],
                fac * offset.powi(3) / 3.0 / C.speed_of_light(),
            );
            let offset = (i - 15) as f64 - 0.5;
            assert_close(profile.sigma_star()[i], fac * offset * offset);
        }
    }

    #[test]
    fn corners_are_damped_along_each_axis() {
        let sigma_box = sigma_box(cell_box([-8, -8, 0], [-1, -1, 0]), &single_block()).unwrap();
        for axis in 0..2 {
            let sigma = sigma_box.profile(axis).sigma();
            assert_eq!(sigma[0], 0.0);
            assert_close(sigma[-8], 4.0 * C.speed_of_light() / 0.5);
        }
    }

    #[test]
    fn it_rejects_multiple_direct_faces() {
        let grids = BoxArray::new([
            cell_box([0, 0, 0], [7, 7, 0]),
            cell_box([12, 0, 0], [19, 7, 0]),
        ]);
        let result = SigmaBox::new(
            &cell_box([8, 0, 0], [11, 7, 0]),
            &grids,
            &Vector3::repeat(1.0),
            4,
            4,
            SpaceDim::Two,
            &C,
        );
        assert!(matches!(
            result,
            Err(Error::AmbiguousDirectFace {
                axis: 0,
                count: 2,
                ..
            })
        ));
    }

    #[test]
    fn it_rejects_tiles_inside_a_block() {
        let result = sigma_box(cell_box([4, 4, 0], [7, 7, 0]), &single_block());
        assert!(matches!(
            result,
            Err(Error::InvalidAdjacency {
                category: "direct face",
                axis: 0,
                ..
            })
        ));
    }

    #[test]
    fn factor_refresh_is_idempotent() {
        let tiles = BoxArray::new([
            cell_box([-8, 0, 0], [-1, 15, 0]),
            cell_box([16, -8, 0], [23, -1, 0]),
        ]);
        let cell_size = Vector3::new(0.5, 0.5, 1.0);
        let mut sigma_boxes =
            MultiSigmaBox::new(&tiles, &single_block(), &cell_size, 8, 8, SpaceDim::Two, &C)
                .unwrap();

        sigma_boxes.compute_factors_e(&cell_size, 0.1);
        sigma_boxes.compute_factors_b(&cell_size, 0.1);
        let first = sigma_boxes.clone();

        sigma_boxes.compute_factors_e(&cell_size, 0.1);
        sigma_boxes.compute_factors_b(&cell_size, 0.1);
        for (a, b) in first.iter().zip(sigma_boxes.iter()) {
            for (a, b) in a.profiles().iter().zip(b.profiles()) {
                assert_eq!(a.sigma_fac(), b.sigma_fac());
                assert_eq!(a.sigma_star_cumsum_fac(), b.sigma_star_cumsum_fac());
            }
        }

        let profile = sigma_boxes.get(0).unwrap().profile(0);
        assert_close(profile.sigma_fac()[-8], (-profile.sigma()[-8] * 0.1).exp());
        assert_close(
            profile.sigma_star_cumsum_fac()[-8],
            (-profile.sigma_star_cumsum()[-8] * 0.5).exp(),
        );
        assert_eq!(profile.sigma_fac()[0], 1.0);

        sigma_boxes.compute_factors_e(&cell_size, 0.2);
        let profile = sigma_boxes.get(0).unwrap().profile(0);
        assert_close(profile.sigma_fac()[-8], (-profile.sigma()[-8] * 0.2).exp());
    }
}
