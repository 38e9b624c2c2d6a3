mod bounds;
mod config;
mod convert;
mod dates;
mod error;
mod inventory;
mod mosaic;
mod pipeline;
mod raster;
mod samples;
mod series;
mod warp;

use config::RunConfig;
use pipeline::Pipeline;
use raster::gdal::GdalEngine;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());
    let config = RunConfig::from_file(&config_path)?;

    let engine = GdalEngine::new();
    let pipeline = Pipeline::new(&config, &engine, &engine);

    // Ctrl-C stops the run at the next stage boundary
    let cancel = pipeline.cancel_flag();
    ctrlc::set_handler(move || cancel.cancel())?;

    let summary = pipeline.run()?;

    println!(
        "Assembled {} cells across {} dates -> {}",
        summary.rows,
        summary.dates.len(),
        summary.table_path.display()
    );
    if summary.skipped_files > 0 {
        println!(
            "Skipped {} files with unparseable names",
            summary.skipped_files
        );
    }
    if !summary.excluded.is_empty() {
        println!("Excluded dates:");
        for exclusion in &summary.excluded {
            println!("  {exclusion}");
        }
    }

    Ok(())
}
