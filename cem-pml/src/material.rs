use std::{
    fmt::Debug,
    sync::Arc,
};

use nalgebra::Point3;
use serde::{
    Deserialize,
    Serialize,
};

#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalConstants {
    pub vacuum_permittivity: f64,
    pub vacuum_permeability: f64,
}

impl Debug for PhysicalConstants {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalConstants")
            .field("vacuum_permittivity", &self.vacuum_permittivity)
            .field("vacuum_permeability", &self.vacuum_permeability)
            .field("speed_of_light", &self.speed_of_light())
            .finish()
    }
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self::SI
    }
}

impl PhysicalConstants {
    pub const SI: Self = Self {
        vacuum_permittivity: 8.8541878188e-12,
        vacuum_permeability: 1.25663706127e-6,
    };

    pub const REDUCED: Self = Self {
        vacuum_permittivity: 1.0,
        vacuum_permeability: 1.0,
    };

    pub fn speed_of_light(&self) -> f64 {
        (self.vacuum_permittivity * self.vacuum_permeability).powf(-0.5)
    }
}

/// How one macroscopic property is initialized over the layer.
#[derive(Clone, derive_more::Debug, Serialize, Deserialize)]
pub enum MediumProperty {
    Constant(f64),

    /// Evaluated at every cell centre (physical coordinates).
    #[serde(skip)]
    Function(#[debug("Fn(Point3<f64>) -> f64")] Arc<dyn Fn(&Point3<f64>) -> f64 + Send + Sync>),
}

impl MediumProperty {
    pub fn function(f: impl Fn(&Point3<f64>) -> f64 + Send + Sync + 'static) -> Self {
        Self::Function(Arc::new(f))
    }

    pub fn evaluate(&self, position: &Point3<f64>) -> f64 {
        match self {
            Self::Constant(value) => *value,
            Self::Function(f) => f(position),
        }
    }
}

/// Permittivity, permeability and conductivity of a macroscopic medium that
/// extends into the layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MacroscopicMedium {
    pub permittivity: MediumProperty,
    pub permeability: MediumProperty,
    pub conductivity: MediumProperty,
}

impl MacroscopicMedium {
    pub fn vacuum(physical_constants: &PhysicalConstants) -> Self {
        Self {
            permittivity: MediumProperty::Constant(physical_constants.vacuum_permittivity),
            permeability: MediumProperty::Constant(physical_constants.vacuum_permeability),
            conductivity: MediumProperty::Constant(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Point3;

    use crate::material::{
        MediumProperty,
        PhysicalConstants,
    };

    #[test]
    fn reduced_units_have_unit_speed_of_light() {
        assert_eq!(PhysicalConstants::REDUCED.speed_of_light(), 1.0);
    }

    #[test]
    fn it_evaluates_medium_functions() {
        let property = MediumProperty::function(|x| 2.0 * x.x);
        assert_eq!(property.evaluate(&Point3::new(1.5, 0.0, 0.0)), 3.0);
        assert_eq!(
            MediumProperty::Constant(4.0).evaluate(&Point3::origin()),
            4.0
        );
    }
}
