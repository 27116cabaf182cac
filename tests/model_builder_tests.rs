//! Integration tests for building layered models from G-code
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gcode_layers::config::BuildSettings;
use gcode_layers::error::{ConfigError, Error, GeometryError, SimulationError};
use gcode_layers::geometry::{Point3, Vec2};
use gcode_layers::parser::{parse_text, CommandStream};
use gcode_layers::toolpath::{
    build_model, load_model, BuildControl, BuildOutcome, Model, ModelBuilder, Stage,
};
use tempfile::NamedTempFile;

fn build(text: &str) -> Result<Model, Error> {
    build_model(parse_text(text, true)?, BuildSettings::default())
}

/// Square perimeter at `z`, extruder continuing from `e`
fn square_layer(z: f64, size: f64, e: &mut f64) -> String {
    let mut out = format!("G0 X0 Y0 Z{z}\n");
    for (x, y) in [(size, 0.0), (size, size), (0.0, size), (0.0, 0.0)] {
        *e += 1.0;
        out.push_str(&format!("G1 X{x} Y{y} E{e}\n"));
    }
    out
}

#[test]
fn test_two_layers_and_heights() {
    let model = build(
        "G1 Z0.2\n\
         G1 X10 E1\n\
         G1 X20 E2\n\
         G1 Z0.4\n\
         G1 X10 E3\n\
         G1 X0 E4\n",
    )
    .unwrap();

    assert_eq!(model.layer_count(), 2);
    assert_eq!(model.layer_range(), Some(1..=2));
    assert_eq!(model.layer_z(1), Some(0.2));
    assert_eq!(model.layer_z(2), Some(0.4));
    assert_eq!(model.layer_height(1), Some(0.2));
    assert_eq!(model.layer_height(2), Some(0.2));
    assert!(model.priming_layer().is_none());
}

#[test]
fn test_layer_z_strictly_increasing() {
    let mut e = 0.0;
    let mut text = String::new();
    for z in [0.2, 0.4, 0.6, 0.8] {
        text.push_str(&square_layer(z, 10.0, &mut e));
    }
    let model = build(&text).unwrap();

    let heights: Vec<f64> = model.layers().map(|(_, z, _)| z).collect();
    assert_eq!(heights.len(), 4);
    assert!(heights.windows(2).all(|w| w[1] > w[0]));
    for (_, _, layer) in model.layers() {
        assert!(layer.paths().iter().all(|p| p.len() >= 2));
    }
}

#[test]
fn test_priming_layer_detected() {
    let text = "\
G1 Z0.1
G1 X50 Y0 E5
G1 Z0.05
G1 X0 Y0 E6
G1 Z0.25
G1 X10 Y0 E7
";
    let model = build(text).unwrap();

    assert_eq!(model.priming_layer_z(), Some(0.1));
    assert!(model.priming_layer().is_some());
    assert_eq!(model.layer_count(), 2);
    assert_eq!(model.layer_z(1), Some(0.05));
    assert_eq!(model.layer_z(2), Some(0.25));
}

#[test]
fn test_descent_after_priming_fails() {
    let text = "\
G1 Z0.1
G1 X50 Y0 E5
G1 Z0.05
G1 X0 Y0 E6
G1 Z0.25
G1 X10 Y0 E7
G1 Z0.15
G1 X20 Y0 E8
";
    let err = build(text).unwrap_err();
    let Error::Geometry(GeometryError::PostPrimingDescent {
        cur_layer_z,
        prev_layer_z,
    }) = err
    else {
        panic!("Expected post priming descent, got {err:?}");
    };
    assert_eq!(cur_layer_z, 0.15);
    assert_eq!(prev_layer_z, 0.25);
}

#[test]
fn test_late_descent_fails_with_layer_count() {
    let mut e = 0.0;
    let mut text = String::new();
    for z in [0.2, 0.4, 0.6] {
        text.push_str(&square_layer(z, 10.0, &mut e));
    }
    text.push_str(&square_layer(0.3, 10.0, &mut e));

    let err = build(&text).unwrap_err();
    assert!(matches!(
        err,
        Error::Geometry(GeometryError::LateEffectorDescent {
            prev_layer_count: 3,
            ..
        })
    ));
    assert!(err.as_markdown().contains("after printing 3 layers"));
}

#[test]
fn test_padding_moves_path_ends_by_half_nozzle() {
    let settings = BuildSettings {
        nozzle_diameter: 0.6,
        ..BuildSettings::default()
    };
    let commands = parse_text("G1 Z0.2\nG1 X10 E1\nG1 Y10 E2\n", true).unwrap();
    let model = build_model(commands, settings).unwrap();

    let path = &model.layer(1).unwrap().paths()[0];
    assert_eq!(path.points(), &[
        Vec2::new(-0.3, 0.0),
        Vec2::new(10.0, 0.0),
        Vec2::new(10.0, 10.3),
    ]);
    assert_eq!(model.nozzle_diameter(), 0.6);
}

#[test]
fn test_boundaries_with_and_without_priming() {
    let text = "\
G1 Z0.3
G1 X100 Y0 E5
G1 Z0.2
G0 X10 Y10
G1 X20 Y10 E6
";
    let settings = BuildSettings {
        nozzle_diameter: 0.5,
        ..BuildSettings::default()
    };
    let model = build_model(parse_text(text, true).unwrap(), settings).unwrap();

    let without = model.boundaries(false);
    assert_eq!(without.min, Point3::new(9.75, 10.0, 0.0));
    assert_eq!(without.max, Point3::new(20.25, 10.0, 0.2));

    let with = model.boundaries(true);
    assert_eq!(with.min, Point3::new(-0.25, 0.0, 0.0));
    assert_eq!(with.max, Point3::new(100.25, 10.0, 0.3));
    assert_eq!(with.center().x, 50.0);
}

#[test]
fn test_empty_input_gives_empty_model() {
    let model = build("; nothing to print\nG28\n").unwrap();
    assert_eq!(model.layer_count(), 0);
    assert!(model.layer_range().is_none());
    assert_eq!(model.boundaries(true).size(), Point3::ORIGIN);

    let info = model.info();
    assert!(info.layers.is_empty());
    assert!(info.feedrate_min.is_none());
}

#[test]
fn test_model_info_statistics() {
    let text = "\
M104 S205
G1 Z0.2 F1800
G1 X10 E1
G1 X20 E2 F1200
M109 S215
G1 Z0.5
G1 X10 E3
";
    let info = build(text).unwrap().info();

    assert_eq!(info.layer_count, 2);
    assert_eq!(info.temperature_min, Some(205.0));
    assert_eq!(info.temperature_max, Some(215.0));
    assert_eq!(info.feedrate_min, Some(1200.0));
    assert_eq!(info.feedrate_max, Some(1800.0));
    assert_eq!(info.layer_height_min, Some(0.2));
    assert_eq!(info.layer_height_max, Some(0.3));

    let first = info.layer(1).unwrap();
    let feedrate = first.feedrate.unwrap();
    assert_eq!(feedrate.avg, 1500.0);
}

#[test]
fn test_strict_machine_through_builder() {
    let commands = parse_text("G28\nM106 S255\nG1 X1", true).unwrap();
    let settings = BuildSettings {
        skip_unknown: false,
        ..BuildSettings::default()
    };
    let err = build_model(commands, settings).unwrap_err();
    assert!(matches!(
        err,
        Error::Simulation(SimulationError::UnknownCommand { line_number: 2, .. })
    ));
}

#[test]
fn test_invalid_settings_rejected() {
    let settings = BuildSettings {
        arc_max_error: 0.0,
        ..BuildSettings::default()
    };
    assert!(matches!(build_model(Vec::new(), settings), Err(Error::Config(_))));
}

#[test]
fn test_vanishing_arc_error() {
    let text = "G1 X10 Y0 Z0.2\nG3 X0 Y10 I-10 J0 E1\n";
    let settings = BuildSettings {
        arc_max_error: 1e-18,
        ..BuildSettings::default()
    };

    let err = build_model(parse_text(text, true).unwrap(), settings).unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::BelowMinimum {
            name: "arc_max_error",
            ..
        })
    ));

    // The builder itself does not validate; the arc is capped, not a panic
    let mut builder = ModelBuilder::new(settings);
    for command in parse_text(text, true).unwrap() {
        builder.handle_command(&command).unwrap();
    }
    let model = builder.into_model();
    assert_eq!(model.layer_count(), 1);
    assert_eq!(model.layer(1).unwrap().paths().len(), 1);
}

#[test]
fn test_cancellation_mid_stream() {
    let mut e = 0.0;
    let mut text = String::new();
    for i in 1..=50 {
        text.push_str(&square_layer(i as f64 * 0.2, 20.0, &mut e));
    }

    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    let mut seen = 0;
    let commands = CommandStream::new(text.as_bytes(), true).inspect(move |_| {
        seen += 1;
        if seen == 20 {
            flag.store(true, Ordering::Relaxed);
        }
    });

    let mut control = BuildControl::new().with_stop_flag(stop);
    let outcome = ModelBuilder::new(BuildSettings::default())
        .build(commands, &mut control)
        .unwrap();
    assert!(outcome.is_cancelled());
}

#[test]
fn test_load_model_from_file_with_progress() {
    let mut e = 0.0;
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "; sliced").unwrap();
    writeln!(file, "M104 S210").unwrap();
    for z in [0.2, 0.4] {
        write!(file, "{}", square_layer(z, 5.0, &mut e)).unwrap();
    }
    file.flush().unwrap();

    let mut stages = Vec::new();
    let outcome = {
        let mut control = BuildControl::new()
            .with_expected_commands(12)
            .with_progress(|stage, _| stages.push(stage));
        load_model(file.path(), BuildSettings::default(), &mut control).unwrap()
    };

    let BuildOutcome::Completed(model) = outcome else {
        panic!("Expected completed build");
    };
    assert_eq!(model.layer_count(), 2);
    assert_eq!(model.layer(1).unwrap().paths().len(), 1);
    assert_eq!(stages.last(), Some(&Stage::Finalizing));
}

#[test]
fn test_load_model_reports_syntax_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "G1 Z0.2\nG1 X1 E1\nG1 X2 Q2\n").unwrap();
    file.flush().unwrap();

    let err = load_model(file.path(), BuildSettings::default(), &mut BuildControl::new())
        .unwrap_err();
    assert!(matches!(err, Error::Syntax(ref e) if e.line_number == 3));
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn test_sliced_fixture() {
    let mut control = BuildControl::new();
    let outcome = load_model(
        "tests/fixtures/bracket.gcode",
        BuildSettings::default(),
        &mut control,
    )
    .expect("load fixture");
    let model = outcome.into_model().expect("completed build");

    // Purge line at 0.3 followed by the real first layer at 0.2
    assert_eq!(model.priming_layer_z(), Some(0.3));
    assert_eq!(model.layer_count(), 5);
    for index in 1..=5 {
        assert_eq!(model.layer_height(index), Some(0.2));
        // Perimeter, arc corner included, is one continuous path
        assert_eq!(model.layer(index).unwrap().paths().len(), 1);
    }

    assert_eq!(model.temperature_min(), Some(205.0));
    assert_eq!(model.temperature_max(), Some(210.0));
    assert_eq!(model.feedrate_min(), Some(1800.0));
    assert_eq!(model.feedrate_max(), Some(1800.0));

    let without = model.boundaries(false);
    assert!(close(without.min.x, 19.8) && close(without.min.y, 19.8));
    assert!(close(without.max.x, 40.0) && close(without.max.y, 40.0));
    assert_eq!(without.max.z, 1.0);

    let with = model.boundaries(true);
    assert!(close(with.min.x, 4.8) && close(with.min.y, 5.0));
    assert!(close(with.max.x, 60.0) && close(with.max.y, 40.0));
}
