use anyhow::{Context, Result};

use gcode_layers::config::Config;
use gcode_layers::toolpath::{load_model, BuildControl, BuildOutcome, ModelInfo};

fn main() -> Result<()> {
    // Parse configuration from command line and environment
    let config = Config::from_args_and_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    let mut control = BuildControl::new();
    let outcome = load_model(&config.path, config.settings, &mut control).map_err(|e| {
        log::error!("{}", e.as_markdown());
        e
    });
    let outcome = outcome.with_context(|| format!("failed to load {}", config.path.display()))?;

    let BuildOutcome::Completed(model) = outcome else {
        log::warn!("build cancelled");
        return Ok(());
    };

    let info = model.info();
    if config.json {
        let json = serde_json::to_string_pretty(&info).context("failed to serialize model")?;
        println!("{}", json);
    } else {
        print_summary(&info);
    }

    Ok(())
}

fn print_summary(info: &ModelInfo) {
    println!("layers:          {}", info.layer_count);
    if let Some((first, last)) = info.layer_range {
        println!("layer range:     {}..={}", first, last);
    }
    if let Some(z) = info.priming_layer_z {
        println!("priming layer:   {:.3} mm", z);
    }
    println!("nozzle diameter: {} mm", info.nozzle_diameter);

    let size = info.boundaries_without_priming.size();
    println!("model size:      {:.3} x {:.3} x {:.3} mm", size.x, size.y, size.z);
    let size = info.boundaries.size();
    println!("with priming:    {:.3} x {:.3} x {:.3} mm", size.x, size.y, size.z);

    print_range("layer height", info.layer_height_min, info.layer_height_max, "mm");
    print_range("temperature", info.temperature_min, info.temperature_max, "°C");
    print_range("feedrate", info.feedrate_min, info.feedrate_max, "mm/min");

    for layer in &info.layers {
        println!(
            "  #{:<5} z={:<8.3} h={:<6.3} paths={:<5} points={}",
            layer.index, layer.z, layer.height, layer.path_count, layer.point_count
        );
    }
}

fn print_range(label: &str, min: Option<f64>, max: Option<f64>, unit: &str) {
    if let (Some(min), Some(max)) = (min, max) {
        println!("{:<16} {} - {} {}", format!("{}:", label), min, max, unit);
    }
}
