use std::path::{
    Path,
    PathBuf,
};

use cem_pml::{
    PmlConfig,
    material::MacroscopicMedium,
    mesh::{
        BoxArray,
        Geometry,
        IndexBox,
        SpaceDim,
    },
};
use color_eyre::eyre::{
    Error,
    bail,
};
use nalgebra::{
    Point3,
    Vector3,
};
use serde::{
    Deserialize,
    Serialize,
};

/// A domain with an absorbing layer, read from a TOML file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub domain: DomainConfig,

    #[serde(default)]
    pub pml: PmlConfig,

    /// Medium extending into the layer.
    #[serde(default)]
    pub medium: Option<MacroscopicMedium>,

    #[serde(default = "default_steps")]
    pub steps: usize,

    /// Courant number used to derive the time step.
    #[serde(default = "default_cfl")]
    pub cfl: f64,

    /// Write a checkpoint with this prefix after the last step.
    #[serde(default)]
    pub checkpoint: Option<PathBuf>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            domain: Default::default(),
            pml: Default::default(),
            medium: None,
            steps: default_steps(),
            cfl: default_cfl(),
            checkpoint: None,
        }
    }
}

fn default_steps() -> usize {
    100
}

fn default_cfl() -> f64 {
    0.9
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DomainConfig {
    pub dims: SpaceDim,

    /// Number of cells along each axis. Ignored along inactive axes.
    pub cells: [i64; 3],

    pub cell_size: [f64; 3],

    #[serde(default)]
    pub periodic: [bool; 3],

    /// Blocks the domain is decomposed into are at most this many cells
    /// long.
    #[serde(default = "default_max_block_size")]
    pub max_block_size: i64,

    /// Also build the layer for a coarse patch.
    #[serde(default)]
    pub coarse_patch: bool,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            dims: SpaceDim::Two,
            cells: [64, 64, 1],
            cell_size: [1e-3; 3],
            periodic: [false; 3],
            max_block_size: default_max_block_size(),
            coarse_patch: false,
        }
    }
}

fn default_max_block_size() -> i64 {
    32
}

impl Scenario {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let toml = std::fs::read_to_string(path)?;
        let scenario: Self = toml::from_str(&toml)?;

        let num_axes = scenario.domain.dims.num_axes();
        if scenario.domain.cells[..num_axes].iter().any(|n| *n <= 0) {
            bail!("{}: domain must have at least one cell per axis", path.display());
        }
        if scenario.domain.max_block_size <= 0 {
            bail!("{}: max_block_size must be positive", path.display());
        }

        Ok(scenario)
    }

    pub fn geometry(&self) -> Geometry {
        let dims = self.domain.dims;
        let hi = Vector3::from_fn(|axis, _| {
            if axis < dims.num_axes() {
                self.domain.cells[axis] - 1
            }
            else {
                0
            }
        });

        Geometry {
            dims,
            domain: IndexBox::new(Point3::origin(), hi.into()),
            origin: Point3::origin(),
            cell_size: Vector3::from(self.domain.cell_size),
            periodic: self.domain.periodic,
        }
    }

    pub fn coarse_geometry(&self) -> Option<Geometry> {
        self.domain
            .coarse_patch
            .then(|| self.geometry().coarsen(&Vector3::from(self.pml.ref_ratio)))
    }

    pub fn grids(&self) -> BoxArray {
        let dims = self.domain.dims;
        let max_size = Vector3::from_fn(|axis, _| {
            if axis < dims.num_axes() {
                self.domain.max_block_size
            }
            else {
                1
            }
        });
        BoxArray::chop(&self.geometry().domain, &max_size)
    }

    /// Time step from the Courant condition of the Yee scheme.
    pub fn dt(&self) -> f64 {
        let geometry = self.geometry();
        let c = self.pml.physical_constants.speed_of_light();
        let inv_dx2 = geometry
            .dims
            .axes()
            .map(|axis| geometry.cell_size[axis].powi(-2))
            .sum::<f64>();
        self.cfl / (c * inv_dx2.sqrt())
    }
}
