use gcode_layers::config::BuildSettings;
use gcode_layers::parser::{parse_line, CommandParser};
use gcode_layers::toolpath::build_model;

const PRINT: &str = "\
M104 S205 ; heat
G28
G1 Z0.2 F1800
G1 X10 Y0 E1
G2 X20 Y0 I5 J0 E2
G1 Z0.4
G1 X10 Y0 E3
";

fn main() {
    println!("=== Parser Demo ===");

    let parser = CommandParser::new(true);
    let test_lines = [
        "G1 X10 Y20.5 Z0.2 ; linear move",
        "M104 S200 ; set temperature",
        "G90 M83 G1 X5 E1",
        "; another comment",
        "",
        "M106 S255 ; fan, not modelled",
        "G1 X10 Q5",
    ];

    for (index, line) in test_lines.into_iter().enumerate() {
        println!("\nInput: '{}'", line);
        match parse_line(line, index + 1, &parser) {
            Ok(commands) => {
                for command in commands {
                    println!("Parsed: {} ({:?})", command, command.kind);
                }
            }
            Err(err) => println!("Error: {}", err),
        }
    }

    println!("\n=== Model Demo ===");
    let commands = match gcode_layers::parse_text(PRINT, true) {
        Ok(commands) => commands,
        Err(err) => {
            eprintln!("{}", err.as_markdown());
            return;
        }
    };
    match build_model(commands, BuildSettings::default()) {
        Ok(model) => {
            for (index, z, layer) in model.layers() {
                println!(
                    "layer {} at z={} with {} path(s)",
                    index,
                    z,
                    layer.paths().len()
                );
            }
        }
        Err(err) => eprintln!("{}", err.as_markdown()),
    }
}
