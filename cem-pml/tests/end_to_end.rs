use cem_pml::{
    Error,
    PhysicalConstants,
    Pml,
    PmlConfig,
    PmlDomain,
    PmlPlacement,
    mesh::{
        BoxArray,
        Geometry,
        IndexBox,
        MultiField,
        SpaceDim,
    },
    pml::fields::{
        Axis,
        FieldKind,
        FieldStaggering,
        PatchType,
    },
};
use nalgebra::{
    Point3,
    Vector3,
};

const DX: f64 = 1e-3;

fn cell_box(lo: [i64; 3], hi: [i64; 3]) -> IndexBox {
    IndexBox::new(Point3::from(lo), Point3::from(hi))
}

fn geometry(domain: IndexBox) -> Geometry {
    geometry_in(SpaceDim::Two, domain)
}

fn geometry_in(dims: SpaceDim, domain: IndexBox) -> Geometry {
    Geometry {
        dims,
        domain,
        origin: Point3::origin(),
        cell_size: Vector3::new(DX, DX, DX),
        periodic: [false; 3],
    }
}

fn config() -> PmlConfig {
    PmlConfig {
        ncell: 8,
        delta: 8,
        physical_constants: PhysicalConstants::SI,
        ..Default::default()
    }
}

fn dt() -> f64 {
    0.5 * DX / PhysicalConstants::SI.speed_of_light()
}

fn build(grids: &BoxArray, geometry: &Geometry, staggering: &FieldStaggering) -> Option<Pml> {
    build_with(&config(), grids, geometry, staggering)
}

fn build_with(
    config: &PmlConfig,
    grids: &BoxArray,
    geometry: &Geometry,
    staggering: &FieldStaggering,
) -> Option<Pml> {
    Pml::new(
        config,
        PmlDomain {
            level: 0,
            grids,
            geometry,
            coarse_geometry: None,
            dt: dt(),
            staggering,
            medium: None,
            spectral: None,
        },
    )
    .unwrap()
}

/// `[0, n)` along every active axis.
fn cube(dims: SpaceDim, n: i64) -> IndexBox {
    IndexBox::new(Point3::origin(), Point3::from(dims.uniform(n - 1)))
}

fn chop(dims: SpaceDim, domain: &IndexBox, max_size: i64) -> BoxArray {
    BoxArray::chop(domain, &dims.uniform(max_size).map(|n| n.max(1)))
}

fn assert_close(a: f64, b: f64) {
    assert!(
        (a - b).abs() <= 1e-12 * a.abs().max(b.abs()),
        "{a} != {b}"
    );
}

#[test]
fn single_block_gets_faces_and_corners() {
    let domain = cell_box([0, 0, 0], [15, 15, 0]);
    let grids = BoxArray::new([domain]);
    let staggering = FieldStaggering::yee(SpaceDim::Two);
    let pml = build(&grids, &geometry(domain), &staggering).unwrap();

    let tiles = pml.tiles(PatchType::Fine).unwrap();
    assert_eq!(tiles.len(), 8);
    assert_eq!(tiles.num_points(), 32 * 32 - 16 * 16);
    for (i, a) in tiles.iter().enumerate() {
        for b in tiles.iter().skip(i + 1) {
            assert!(!a.intersects(b), "{a} and {b} overlap");
        }
    }
    assert!(!pml.has_coarse_patch());

    let c = PhysicalConstants::SI.speed_of_light();
    let sigma_boxes = pml.sigma_boxes(PatchType::Fine).unwrap();
    let low_x = sigma_boxes
        .iter()
        .find(|sigma_box| sigma_box.tile().lo == Point3::new(-8, 0, 0))
        .unwrap();
    let sigma = low_x.profile(0).sigma();

    assert_close(sigma[-8], 4.0 * c / DX);
    assert_eq!(sigma[0], 0.0);
    for i in -8..0 {
        assert!(sigma[i] >= sigma[i + 1]);
    }

    let high_y = sigma_boxes
        .iter()
        .find(|sigma_box| sigma_box.tile().lo == Point3::new(0, 16, 0))
        .unwrap();
    let sigma = high_y.profile(1).sigma();
    assert_eq!(sigma[16], 0.0);
    assert_close(sigma[24], 4.0 * c / DX);
    // the face tile is not damped along the face
    assert!(high_y.profile(0).sigma().as_slice().iter().all(|s| *s == 0.0));
}

#[test]
fn factor_refresh_is_idempotent() {
    let domain = cell_box([0, 0, 0], [15, 15, 0]);
    let grids = BoxArray::new([domain]);
    let staggering = FieldStaggering::yee(SpaceDim::Two);
    let mut pml = build(&grids, &geometry(domain), &staggering).unwrap();

    pml.compute_pml_factors(dt());
    let first = pml.sigma_boxes(PatchType::Fine).unwrap().clone();
    pml.compute_pml_factors(dt());
    let second = pml.sigma_boxes(PatchType::Fine).unwrap();

    for (a, b) in first.iter().zip(second.iter()) {
        for (a, b) in a.profiles().iter().zip(b.profiles()) {
            assert_eq!(a.sigma_fac(), b.sigma_fac());
            assert_eq!(a.sigma_cumsum_fac(), b.sigma_cumsum_fac());
            assert_eq!(a.sigma_star_fac(), b.sigma_star_fac());
            assert_eq!(a.sigma_star_cumsum_fac(), b.sigma_star_cumsum_fac());
        }
    }

    // fully damped at the outermost node, undamped at the interior boundary
    let low_x = second
        .iter()
        .find(|sigma_box| sigma_box.tile().lo == Point3::new(-8, 0, 0))
        .unwrap();
    let sigma_fac = low_x.profile(0).sigma_fac();
    assert_eq!(sigma_fac[0], 1.0);
    assert!(sigma_fac[-8] < sigma_fac[-1]);
}

#[test]
fn exchange_leaves_a_constant_interior_unchanged() {
    let domain = cell_box([0, 0, 0], [31, 31, 0]);
    let grids = BoxArray::chop(&domain, &Vector3::new(16, 16, 1));
    assert_eq!(grids.len(), 4);
    let staggering = FieldStaggering::yee(SpaceDim::Two);
    let mut pml = build(&grids, &geometry(domain), &staggering).unwrap();

    let tiles = pml.tiles(PatchType::Fine).unwrap();
    assert_eq!(tiles.num_points(), 48 * 48 - 32 * 32);

    let mut e = Axis::ALL.map(|axis| {
        let mut field = MultiField::new(
            grids.convert(staggering.get(FieldKind::E, axis)),
            1,
            Vector3::new(2, 2, 0),
        );
        field.set_val(1.25);
        field
    });

    for _ in 0..2 {
        let [x, y, z] = &mut e;
        pml.exchange_e(PatchType::Fine, [x, y, z]);
        pml.fill_boundary();
    }

    for field in &e {
        for bx in field.boxes() {
            for point in bx.points() {
                assert_eq!(field.get(&point, 0), Some(1.25), "{point:?}");
            }
        }
    }

    // second split component is zero wherever the layer overlaps the interior
    let fields = pml.fields(PatchType::Fine).unwrap();
    for axis in Axis::ALL {
        let field = fields.get(FieldKind::E, axis).unwrap();
        for fab in field.fabs() {
            for point in fab.grown_box().points() {
                if domain.contains(&point) {
                    assert_eq!(fab.get(&point, 1), Some(0.0));
                }
            }
        }
    }
}

#[test]
fn periodic_domains_need_no_layer() {
    let domain = cell_box([0, 0, 0], [15, 15, 0]);
    let grids = BoxArray::new([domain]);
    let staggering = FieldStaggering::yee(SpaceDim::Two);
    let geometry = Geometry {
        periodic: [true, true, false],
        ..geometry(domain)
    };
    assert!(build(&grids, &geometry, &staggering).is_none());
}

#[test]
fn small_blocks_are_rejected() {
    let domain = cell_box([0, 0, 0], [15, 15, 0]);
    let grids = BoxArray::chop(&domain, &Vector3::new(8, 8, 1));
    let staggering = FieldStaggering::yee(SpaceDim::Two);
    let geometry = geometry(domain);

    let result = Pml::new(
        &config(),
        PmlDomain {
            level: 0,
            grids: &grids,
            geometry: &geometry,
            coarse_geometry: None,
            dt: 1e-12,
            staggering: &staggering,
            medium: None,
            spectral: None,
        },
    );
    assert!(matches!(
        result,
        Err(Error::BlockTooSmall {
            extent: 8,
            ncell: 8,
            ..
        })
    ));
}

#[test]
fn damping_is_quadratic_in_the_distance_on_multi_block_grids() {
    let c = PhysicalConstants::SI.speed_of_light();
    let fac = 4.0 * c / (DX * 64.0);

    for dims in [SpaceDim::Two, SpaceDim::Three] {
        let domain = cube(dims, 32);
        let grids = chop(dims, &domain, 16);
        let geometry = geometry_in(dims, domain);
        let staggering = FieldStaggering::yee(dims);

        for placement in [PmlPlacement::Outside, PmlPlacement::InDomain] {
            let config = PmlConfig {
                placement,
                ..config()
            };
            let pml = build_with(&config, &grids, &geometry, &staggering).unwrap();
            let sigma_boxes = pml.sigma_boxes(PatchType::Fine).unwrap();
            assert_eq!(sigma_boxes.len(), pml.tiles(PatchType::Fine).unwrap().len());

            let mut max: f64 = 0.0;
            for sigma_box in sigma_boxes.iter() {
                assert_eq!(sigma_box.profiles().len(), dims.num_axes());
                for profile in sigma_box.profiles() {
                    for sigma in profile.sigma().as_slice() {
                        let distance = (sigma / fac).sqrt();
                        assert!(
                            (distance - distance.round()).abs() < 1e-6,
                            "{dims:?}, {placement:?}: sigma = {sigma} in {}",
                            sigma_box.tile()
                        );
                        assert!(distance.round() <= 8.0);
                        max = max.max(*sigma);
                    }
                }
            }
            assert_close(max, fac * 64.0);
        }
    }
}

fn check_constant_exchange(
    dims: SpaceDim,
    nodal: bool,
    divergence_cleaning: bool,
    periodic_x: bool,
) {
    let case = format!(
        "{dims:?}, nodal: {nodal}, divergence cleaning: {divergence_cleaning}, periodic x: {periodic_x}"
    );

    let domain = cube(dims, 32);
    let grids = chop(dims, &domain, 16);
    let geometry = Geometry {
        periodic: [periodic_x, false, false],
        ..geometry_in(dims, domain)
    };
    let staggering = if nodal {
        FieldStaggering::nodal(dims)
    }
    else {
        FieldStaggering::yee(dims)
    };
    let config = PmlConfig {
        divergence_cleaning,
        // gives F guard cells
        moving_window: true,
        ..config()
    };
    let mut pml = build_with(&config, &grids, &geometry, &staggering).unwrap();
    pml.compute_pml_factors(dt());

    let guard_widths = pml.guard_widths(PatchType::Fine).unwrap();
    let e_guard = guard_widths.get(FieldKind::E);
    let b_guard = guard_widths.get(FieldKind::B);
    let f_guard = guard_widths.get(FieldKind::F);

    let constant = |kind: FieldKind, axis: Axis, guard_width: Vector3<i64>| {
        let mut field =
            MultiField::new(grids.convert(staggering.get(kind, axis)), 1, guard_width);
        field.set_val(3.0);
        field
    };
    let mut e = Axis::ALL.map(|axis| constant(FieldKind::E, axis, e_guard));
    let mut b = Axis::ALL.map(|axis| constant(FieldKind::B, axis, b_guard));
    let mut f = constant(FieldKind::F, Axis::X, f_guard);

    for _ in 0..2 {
        let [x, y, z] = &mut e;
        pml.exchange_e(PatchType::Fine, [x, y, z]);
        let [x, y, z] = &mut b;
        pml.exchange_b(PatchType::Fine, [x, y, z]);
        pml.exchange_f(PatchType::Fine, &mut f);
        pml.fill_boundary();
    }

    for field in e.iter().chain(&b).chain([&f]) {
        for bx in field.boxes() {
            for point in bx.points() {
                assert_eq!(field.get(&point, 0), Some(3.0), "{case}: {point:?}");
            }
        }
    }

    // inside the domain the layer holds the interior value in its first split
    // component and nothing in the others
    let fields = pml.fields(PatchType::Fine).unwrap();
    assert_eq!(fields.contains(FieldKind::F), divergence_cleaning, "{case}");
    for (kind, axis, field) in fields.iter() {
        if matches!(kind, FieldKind::H | FieldKind::J) {
            continue;
        }
        for fab in field.fabs() {
            for point in fab.grown_box().points() {
                if !domain.contains(&point) {
                    continue;
                }
                assert_eq!(
                    fab.get(&point, 0),
                    Some(3.0),
                    "{case}: {kind}{} at {point:?}",
                    axis.name()
                );
                for component in 1..fab.num_components() {
                    assert_eq!(
                        fab.get(&point, component),
                        Some(0.0),
                        "{case}: {kind}{} at {point:?}",
                        axis.name()
                    );
                }
            }
        }
    }

    if periodic_x {
        // guard cells beyond the periodic boundary see the far side of the
        // interior
        let mut point = Point3::from(dims.uniform(5));
        point.x = -1;
        point.y = 1;
        let ex = fields.get(FieldKind::E, Axis::X).unwrap();
        let mut found = 0;
        for fab in ex.fabs() {
            if fab.grown_box().contains(&point) {
                assert_eq!(fab.get(&point, 0), Some(3.0), "{case}");
                found += 1;
            }
        }
        assert!(found > 0, "{case}");
    }
}

#[test]
fn exchange_keeps_constant_fields_on_multi_block_grids() {
    for nodal in [false, true] {
        for divergence_cleaning in [false, true] {
            for periodic_x in [false, true] {
                check_constant_exchange(SpaceDim::Two, nodal, divergence_cleaning, periodic_x);
            }
        }
    }

    check_constant_exchange(SpaceDim::Three, false, true, true);
    check_constant_exchange(SpaceDim::Three, true, false, false);
}

/// Writes a position dependent value into the valid cells of one field kind
/// and `-1` into its guard cells, fills the guard cells and checks that every
/// guard cell covered by another tile got that tile's value.
fn check_fill_boundary(kind: FieldKind, fill_boundary: impl Fn(&mut Pml, PatchType)) {
    let domain = cell_box([0, 0, 0], [31, 31, 0]);
    let grids = chop(SpaceDim::Two, &domain, 16);
    let staggering = FieldStaggering::yee(SpaceDim::Two);
    let config = PmlConfig {
        divergence_cleaning: true,
        moving_window: true,
        ..config()
    };
    let mut pml = build_with(&config, &grids, &geometry(domain), &staggering).unwrap();
    let value = |point: &Point3<i64>| ((point.x + 64) + 1000 * (point.y + 64)) as f64;

    let fields = pml.fields_mut(PatchType::Fine).unwrap();
    for axis in kind.axes() {
        let field = fields.get_mut(kind, *axis).unwrap();
        for fab in field.fabs_mut() {
            let valid = *fab.valid_box();
            let grown = *fab.grown_box();
            for point in grown.points() {
                *fab.get_mut(&point, 0).unwrap() = if valid.contains(&point) {
                    value(&point)
                }
                else {
                    -1.0
                };
            }
        }
    }

    fill_boundary(&mut pml, PatchType::Fine);

    let fields = pml.fields(PatchType::Fine).unwrap();
    for axis in kind.axes() {
        let field = fields.get(kind, *axis).unwrap();
        let mut filled = 0;
        for fab in field.fabs() {
            for point in fab.grown_box().points() {
                let covered = field.boxes().iter().any(|bx| bx.contains(&point));
                let expected = if covered { value(&point) } else { -1.0 };
                if covered && !fab.valid_box().contains(&point) {
                    filled += 1;
                }
                assert_eq!(
                    fab.get(&point, 0),
                    Some(expected),
                    "{kind}{} at {point:?}",
                    axis.name()
                );
            }
        }
        assert!(filled > 0, "{kind}{}", axis.name());
    }
}

#[test]
fn fill_boundary_f_copies_between_tiles() {
    check_fill_boundary(FieldKind::F, Pml::fill_boundary_f);
}

#[cfg(feature = "magnetization")]
#[test]
fn fill_boundary_h_copies_between_tiles() {
    check_fill_boundary(FieldKind::H, Pml::fill_boundary_h);
}
