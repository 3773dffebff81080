use std::path::Path;

use cem_pml::{
    Pml,
    PmlDomain,
    format_size,
    mesh::{
        BoxArray,
        Geometry,
        MultiField,
    },
    pml::fields::{
        Axis,
        FieldKind,
        FieldStaggering,
        PatchType,
    },
};
use color_eyre::eyre::{
    Error,
    bail,
};
use nalgebra::Vector3;
use serde::Serialize;

use crate::scenario::Scenario;

struct Setup {
    grids: BoxArray,
    geometry: Geometry,
    coarse_geometry: Option<Geometry>,
    staggering: FieldStaggering,
    dt: f64,
}

impl Setup {
    fn new(scenario: &Scenario) -> Self {
        let dims = scenario.domain.dims;
        Self {
            grids: scenario.grids(),
            geometry: scenario.geometry(),
            coarse_geometry: scenario.coarse_geometry(),
            staggering: if scenario.pml.nodal {
                FieldStaggering::nodal(dims)
            }
            else {
                FieldStaggering::yee(dims)
            },
            dt: scenario.dt(),
        }
    }

    fn build(&self, scenario: &Scenario) -> Result<Option<Pml>, Error> {
        tracing::info!(
            blocks = self.grids.len(),
            domain = %self.geometry.domain,
            dt = self.dt,
            "building PML"
        );

        let pml = Pml::new(
            &scenario.pml,
            PmlDomain {
                level: 0,
                grids: &self.grids,
                geometry: &self.geometry,
                coarse_geometry: self.coarse_geometry.as_ref(),
                dt: self.dt,
                staggering: &self.staggering,
                medium: scenario.medium.as_ref(),
                spectral: None,
            },
        )?;
        Ok(pml)
    }

    /// An interior field with the same guard width as the layer.
    fn interior(&self, pml: &Pml, kind: FieldKind, axis: Axis) -> MultiField {
        let guard_width = pml
            .guard_widths(PatchType::Fine)
            .map_or_else(Vector3::zeros, |guard_widths| guard_widths.get(kind));
        MultiField::new(
            self.grids.convert(self.staggering.get(kind, axis)),
            1,
            guard_width,
        )
    }
}

pub fn run(scenario: &Scenario, restart: Option<&Path>) -> Result<(), Error> {
    let setup = Setup::new(scenario);
    let Some(mut pml) = setup.build(scenario)?
    else {
        tracing::info!("nothing to absorb");
        return Ok(());
    };

    if let Some(prefix) = restart {
        pml.restart(prefix)?;
    }

    pml.compute_pml_factors(setup.dt);

    let mut e = Axis::ALL.map(|axis| setup.interior(&pml, FieldKind::E, axis));
    let mut b = Axis::ALL.map(|axis| setup.interior(&pml, FieldKind::B, axis));
    let mut f = pml
        .fields(PatchType::Fine)
        .is_some_and(|fields| fields.contains(FieldKind::F))
        .then(|| setup.interior(&pml, FieldKind::F, Axis::X));

    // gaussian pulse in the out-of-plane (2-D) or z (3-D) component of E
    let center = setup.geometry.domain.lo.map(|x| x as f64)
        + setup.geometry.domain.size().map(|n| n as f64 / 2.0);
    let width = setup.geometry.domain.size().map(|n| n as f64 / 8.0);
    e[Axis::Z.index()].set_with(0, |point| {
        let r2: f64 = (0..setup.geometry.dims.num_axes())
            .map(|axis| ((point[axis] as f64 - center[axis]) / width[axis]).powi(2))
            .sum();
        (-r2).exp()
    });

    for step in 0..scenario.steps {
        let [ex, ey, ez] = &mut e;
        pml.exchange_e(PatchType::Fine, [ex, ey, ez]);

        let [bx, by, bz] = &mut b;
        pml.exchange_b(PatchType::Fine, [bx, by, bz]);

        if let Some(f) = &mut f {
            pml.exchange_f(PatchType::Fine, f);
        }

        pml.fill_boundary();

        if step % 10 == 0 {
            tracing::debug!(step, layer_energy = layer_energy(&pml), "step");
        }
    }

    tracing::info!(
        steps = scenario.steps,
        layer_energy = layer_energy(&pml),
        "done"
    );

    if let Some(prefix) = &scenario.checkpoint {
        pml.checkpoint(prefix)?;
    }

    Ok(())
}

/// Sum of the squared split E components in the layer's valid cells.
fn layer_energy(pml: &Pml) -> f64 {
    let Some(fields) = pml.fields(PatchType::Fine)
    else {
        return 0.0;
    };

    Axis::ALL
        .into_iter()
        .filter_map(|axis| fields.get(FieldKind::E, axis))
        .flat_map(|field| field.fabs())
        .map(|fab| {
            (0..fab.num_components())
                .flat_map(|component| {
                    fab.valid_box()
                        .points()
                        .filter_map(move |point| fab.get(&point, component))
                })
                .map(|value| value * value)
                .sum::<f64>()
        })
        .sum()
}

#[derive(Debug, Serialize)]
struct PatchTiles<'a> {
    patch: PatchType,
    tiles: &'a BoxArray,
    memory: String,
}

pub fn print_tiles(scenario: &Scenario, format: &str) -> Result<(), Error> {
    let setup = Setup::new(scenario);
    let Some(pml) = setup.build(scenario)?
    else {
        println!("no PML needed");
        return Ok(());
    };

    let patches = [PatchType::Fine, PatchType::Coarse]
        .into_iter()
        .filter_map(|patch| {
            let tiles = pml.tiles(patch)?;
            let memory = pml.fields(patch)?.memory_size();
            Some(PatchTiles {
                patch,
                tiles,
                memory: format_size(memory).to_string(),
            })
        })
        .collect::<Vec<_>>();

    match format {
        "text" => {
            for patch in &patches {
                println!(
                    "{}: {} tiles, {}",
                    patch.patch.suffix(),
                    patch.tiles.len(),
                    patch.memory
                );
                for tile in patch.tiles {
                    println!("  {tile}");
                }
            }
        }
        "json" => println!("{}", serde_json::to_string_pretty(&patches)?),
        _ => bail!("Invalid format: {format}"),
    }

    Ok(())
}
