// This file is an example of how to use the `spore_vision` library.
// The main library entry point is `src/lib.rs`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use spore_vision::config::ChamberConfig;
use spore_vision::pipeline::{PlateOutcome, PlatePipeline};

fn main() -> ExitCode {
    env_logger::init();
    println!("Spore Vision - Example Runner");

    // Usage: spore_vision <frame.png> [chamber_config.json]
    let mut args = std::env::args().skip(1);
    let Some(frame_path) = args.next().map(PathBuf::from) else {
        eprintln!("usage: spore_vision <frame.png> [chamber_config.json]");
        return ExitCode::FAILURE;
    };

    let config = match args.next() {
        Some(path) => match ChamberConfig::from_json_file(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("cannot load chamber config {path}: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => ChamberConfig::default(),
    };

    let captured_at = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let pipeline = match PlatePipeline::new(config, "captured_images") {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("invalid chamber config: {e}");
            return ExitCode::FAILURE;
        }
    };

    match pipeline.process_capture(&frame_path, &captured_at) {
        Ok(report) => {
            for outcome in &report.plates {
                match outcome {
                    PlateOutcome::Analyzed(a) => println!(
                        "{}: {} contour(s), {} mm^2",
                        a.plate,
                        a.contours.len(),
                        a.growth_area_mm2
                    ),
                    PlateOutcome::Skipped { plate, reason } => {
                        println!("{plate}: skipped ({reason})")
                    }
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("capture cycle failed: {e}");
            ExitCode::FAILURE
        }
    }
}
