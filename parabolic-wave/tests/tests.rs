use approx::assert_relative_eq;
use ndarray::Array2;

use parabolic_wave::config::Config;
use parabolic_wave::export::{self, DataExporter};
use parabolic_wave::geometry::{Parabola, Point2D};
use parabolic_wave::materials::Material;
use parabolic_wave::params::{MaterialConfig, SimulationConfig, WaveParams};
use parabolic_wave::simulation::DualParabolicSimulation;
use parabolic_wave::source::{morlet, MorletSource};
use parabolic_wave::stability;
use parabolic_wave::wavefield::{FieldState, WaveField};

/// Reference reflectors around a focus at the origin
pub fn reflectors() -> (Parabola, Parabola) {
    let focus = Point2D::new(0.0, 0.0);
    (
        Parabola::umbrella(508.0, 100.0, focus).unwrap(),
        Parabola::bowl(200.0, 50.0, focus).unwrap(),
    )
}

/// 41x41 square domain [-100, 100] mm with a uniform medium, so the CFL bound is
/// the single-speed one
pub fn uniform_square(time_step_factor: f64) -> DualParabolicSimulation {
    let n = 41;
    let dx = 200.0 / (n - 1) as f64;
    let dt_max = stability::stable_time_step(dx, dx, 343_000.0);
    let config = SimulationConfig {
        grid_size: n,
        x_min: -100.0,
        x_max: 100.0,
        y_min: -100.0,
        y_max: 100.0,
        time_step: dt_max * time_step_factor,
        ..SimulationConfig::default()
    };
    let materials = MaterialConfig {
        parabolic_speed: 343_000.0,
        ..MaterialConfig::default()
    };
    let (major, minor) = reflectors();
    DualParabolicSimulation::from_parts(
        config,
        WaveParams::default(),
        materials,
        major,
        minor,
        Point2D::new(0.0, 0.0),
    )
    .unwrap()
}

/// Reference geometry on a coarse grid, stepping at the CFL bound
pub fn coarse_reference(grid_size: usize) -> WaveField {
    let mut config = SimulationConfig {
        grid_size,
        ..SimulationConfig::default()
    };
    let grid = config.grid().unwrap();
    config.time_step = stability::stable_time_step(grid.dx, grid.dy, 1_500_000.0);
    let (major, minor) = reflectors();
    WaveField::new(
        &config,
        WaveParams::default(),
        &MaterialConfig::default(),
        &major,
        &minor,
        Point2D::new(0.0, 0.0),
    )
    .unwrap()
}

fn rigid_cells_are_zero(field: &WaveField) -> bool {
    field
        .materials()
        .cells()
        .indexed_iter()
        .filter(|(_, m)| **m == Material::Rigid)
        .all(|(idx, _)| field.displacement()[idx] == 0.0 && field.previous_displacement()[idx] == 0.0)
}

// ==================================================================================
// Field invariants
// ==================================================================================

#[test]
fn silent_source_keeps_the_field_at_zero() {
    let mut field = coarse_reference(61);
    field.set_amplitude(0.0).unwrap();
    let dt = field.stable_time_step();
    for _ in 0..300 {
        field.update(dt);
    }
    assert!(field.displacement().iter().all(|&v| v == 0.0));
    assert!(field.previous_displacement().iter().all(|&v| v == 0.0));
    assert_eq!(field.energy(), 0.0);
}

#[test]
fn rigid_cells_stay_zero_after_every_step() {
    let mut field = coarse_reference(81);
    let dt = field.stable_time_step();
    for _ in 0..400 {
        field.update(dt);
        assert!(rigid_cells_are_zero(&field));
    }
    // The pulse actually reached the grid
    assert!(field.max_abs() > 0.0);
}

#[test]
fn parallel_and_serial_sweeps_match_bit_for_bit() {
    let mut parallel = coarse_reference(71);
    let mut serial = parallel.clone();
    let dt = parallel.stable_time_step();
    for _ in 0..250 {
        parallel.update(dt);
        serial.update_serial(dt);
    }
    assert_eq!(parallel.displacement(), serial.displacement());
    assert_eq!(parallel.previous_displacement(), serial.previous_displacement());
    assert_eq!(parallel.time(), serial.time());
}

#[test]
fn reset_replays_identically() {
    let mut field = coarse_reference(61);
    let dt = field.stable_time_step();
    for _ in 0..200 {
        field.update(dt);
    }
    let first: Array2<f64> = field.displacement().clone();
    assert_eq!(field.state(), FieldState::Advancing);

    field.reset();
    assert_eq!(field.state(), FieldState::Ready);
    assert_eq!(field.time(), 0.0);
    assert_eq!(field.max_abs(), 0.0);

    for _ in 0..200 {
        field.update(dt);
    }
    assert_eq!(field.displacement(), &first);
}

#[test]
fn classification_survives_reset() {
    let mut field = coarse_reference(61);
    let before = field.materials().codes();
    field.update(field.stable_time_step());
    field.reset();
    assert_eq!(field.materials().codes(), before);
}

// ==================================================================================
// Stability
// ==================================================================================

#[test]
fn stays_bounded_at_the_cfl_limit() {
    let mut sim = uniform_square(1.0);
    let peak = MorletSource::new(1000.0, 1.0).peak();
    let mut largest: f64 = 0.0;
    for _ in 0..1000 {
        sim.update();
        assert!(sim.field().is_finite());
        largest = largest.max(sim.field().max_abs());
    }
    assert!(largest > 0.0);
    assert!(largest < 100.0 * peak, "max |u| = {largest}, peak = {peak}");
}

#[test]
fn reflector_geometry_stays_bounded_at_the_cfl_limit() {
    // Air and reflector speeds differ, so dt is set by the faster medium
    let mut field = coarse_reference(101);
    let dt = field.stable_time_step();
    let peak = field.morlet().peak();
    let mut largest: f64 = 0.0;
    for _ in 0..1000 {
        field.update(dt);
        assert!(field.is_finite());
        largest = largest.max(field.max_abs());
    }
    assert!(largest > 0.0);
    assert!(largest < 100.0 * peak, "max |u| = {largest}, peak = {peak}");
}

#[test]
fn diverges_well_past_the_cfl_limit() {
    let mut sim = uniform_square(3.0);
    let mut blew_up = false;
    for _ in 0..1000 {
        sim.update();
        if !sim.field().is_finite() || sim.field().max_abs() > 1e6 {
            blew_up = true;
            break;
        }
    }
    assert!(blew_up);
}

#[test]
fn stable_step_uses_the_fastest_material() {
    let field = coarse_reference(101);
    let grid = field.grid();
    assert_relative_eq!(
        field.stable_time_step(),
        0.4 * grid.min_spacing() / (1_500_000.0 * 2f64.sqrt())
    );
}

// ==================================================================================
// Source and geometry
// ==================================================================================

#[test]
fn wavelet_shape() {
    let sigma: f64 = 6.0;
    let kappa = (-0.5 * sigma * sigma).exp();
    let c_sigma = (1.0 + (-sigma * sigma).exp() - 2.0 * (-0.75 * sigma * sigma).exp()).powf(-0.5);
    assert_relative_eq!(
        morlet(0.0),
        c_sigma * std::f64::consts::PI.powf(-0.25) * (1.0 - kappa),
        epsilon = 1e-15
    );

    let source = MorletSource::new(1000.0, 1.0);
    assert_eq!(source.amplitude_at(source.pulse_center() + 4.01e-3), 0.0);
    assert_eq!(source.amplitude_at(source.pulse_center() - 4.01e-3), 0.0);
    assert_relative_eq!(source.amplitude_at(3e-3), 15.0 * morlet(0.0), epsilon = 1e-12);
}

#[test]
fn major_reflector_geometry() {
    let sim = DualParabolicSimulation::with_parameters(61, 600.0, 343.0, 1e-7, 1.0).unwrap();
    let major = sim.major_parabola();
    assert_eq!(major.vertex(), Point2D::new(0.0, 100.0));
    assert_eq!(major.focal_length(), 100.0);
    assert_eq!(major.slope_at(0.0), 0.0);
    assert_eq!(major.normal_at(0.0), Point2D::new(0.0, 1.0));

    let r = major.reflection_direction(Point2D::new(0.0, 100.0), Point2D::new(0.0, -1.0));
    assert_relative_eq!(r.x, 0.0);
    assert_relative_eq!(r.y, 1.0);
}

#[test]
fn rays_from_the_focus_leave_parallel_to_the_axis() {
    let (major, minor) = reflectors();
    for parabola in [major, minor] {
        let focus = parabola.focus();
        for x in [-90.0, -40.0, 15.0, 75.0] {
            let hit = Point2D::new(x, parabola.y_at(x));
            let d = hit - focus;
            let r = parabola.reflection_direction(hit, d * (1.0 / d.length()));
            assert_relative_eq!(r.x, 0.0, epsilon = 1e-9);
            assert_relative_eq!(r.y.abs(), 1.0, epsilon = 1e-9);
        }
    }
}

#[test]
fn focus_outside_the_domain_is_clamped() {
    let (major, minor) = reflectors();
    let config = SimulationConfig {
        grid_size: 51,
        ..SimulationConfig::default()
    };
    let field = WaveField::new(
        &config,
        WaveParams::default(),
        &MaterialConfig::default(),
        &major,
        &minor,
        Point2D::new(1000.0, -1000.0),
    )
    .unwrap();
    assert_eq!(field.focus_cell(), (50, 50));
}

// ==================================================================================
// Configuration and export
// ==================================================================================

#[test]
fn config_file_drives_the_simulation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sim.toml");
    std::fs::write(
        &path,
        r#"
        [grid]
        size = 81
        x_min = -150.0
        x_max = 150.0
        y_min = -150.0
        y_max = 150.0

        [reflectors.major]
        diameter = 250.0
        focal_length = 60.0

        [wave]
        frequency = 2000.0

        [materials]
        rigid_margin = 3

        [simulation]
        steps = 10
        "#,
    )
    .unwrap();

    let config = Config::from_file(path.to_str().unwrap()).unwrap();
    let sim = DualParabolicSimulation::from_config(&config).unwrap();
    assert_eq!(sim.config().grid_size, 81);
    assert_eq!(sim.major_parabola().diameter(), 250.0);
    assert_eq!(sim.minor_parabola().diameter(), 200.0);
    assert_eq!(sim.wave_params().frequency, 2000.0);
    assert_eq!(sim.material_config().rigid_margin, 3);
    assert_relative_eq!(sim.time_step(), sim.stable_time_step());
    assert_eq!(sim.material_at(2, 40), Material::Rigid);
    assert_ne!(sim.material_at(3, 40), Material::Rigid);
}

#[test]
fn missing_config_file_names_the_path() {
    let err = Config::from_file("/definitely/not/here.toml").unwrap_err();
    assert!(err.to_string().contains("/definitely/not/here.toml"));
}

#[test]
fn exported_snapshots_read_back_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let mut sim = DualParabolicSimulation::with_parameters(41, 400.0, 343.0, 2e-7, 1.0).unwrap();
    let mut exporter = DataExporter::new(dir.path(), 50).unwrap();
    exporter.write_materials(&sim).unwrap();

    let mut expected = Vec::new();
    for step in 0..=150u64 {
        if step > 0 {
            sim.update();
        }
        if exporter.should_capture(step) {
            exporter.capture(&sim).unwrap();
            expected.push(sim.displacement().clone());
        }
    }
    assert_eq!(exporter.captures(), 4);

    for (index, grid) in expected.iter().enumerate() {
        let path = dir.path().join(export::snapshot_name(index));
        assert_eq!(&export::read_grid(&path).unwrap(), grid);
    }

    let types = export::read_grid(&dir.path().join(export::TYPES_FILE)).unwrap();
    let mask = export::read_grid(&dir.path().join(export::MASK_FILE)).unwrap();
    assert_eq!(types.dim(), (41, 41));
    assert_eq!(types, sim.materials().codes().mapv(f64::from));
    assert_eq!(mask, sim.boundary_mask().mapv(f64::from));

    let metadata = exporter.write_metadata(&sim).unwrap();
    let entries = export::read_metadata(&metadata).unwrap();
    let get = |key: &str| {
        entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .unwrap()
    };
    assert_eq!(get("grid_size"), "41");
    assert_eq!(get("num_captures"), "4");
    assert_eq!(get("x_min_mm"), "-200");
    assert_eq!(get("domain_width_mm"), "400");
    assert_eq!(get("domain_height_mm"), "400");
    assert_eq!(get("minor_parabola_diameter_mm"), "200");
    assert_eq!(get("rigid_margin_cells"), "5");
}

#[test]
fn metadata_duration_covers_steps_past_the_last_capture() {
    let dir = tempfile::tempdir().unwrap();
    let mut sim = DualParabolicSimulation::with_parameters(41, 400.0, 343.0, 2e-7, 1.0).unwrap();
    let mut exporter = DataExporter::new(dir.path(), 20).unwrap();
    for step in 0..=30u64 {
        if step > 0 {
            sim.update();
        }
        if exporter.should_capture(step) {
            exporter.capture(&sim).unwrap();
        }
    }
    assert_eq!(exporter.captures(), 2);

    let entries = export::read_metadata(&exporter.write_metadata(&sim).unwrap()).unwrap();
    let get = |key: &str| entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone()).unwrap();
    assert_eq!(get("num_time_steps"), "30");
    let duration: f64 = get("total_duration_s").parse().unwrap();
    assert_relative_eq!(duration, 30.0 * 2e-7, max_relative = 1e-9);
}
