//! Prints the Static Maps `path` value and zoom level for a ward GeoJSON file.

use clap::Parser;
use greenward::core::geo::{build_static_map_path, choose_zoom};
use greenward::utils::logger;
use greenward::WardMetadata;
use serde_json::{json, Value};
use std::io::Read;

#[derive(Debug, Parser)]
#[command(name = "map_path")]
#[command(about = "Show the static map path and zoom a ward boundary would produce")]
struct Args {
    /// GeoJSON Feature, geometry or FeatureCollection; stdin when omitted
    file: Option<String>,

    /// Map zoom the user was looking at
    #[arg(long)]
    view_zoom: Option<f64>,

    #[arg(short, long, help = "Enable verbose output")]
    verbose: bool,
}

fn read_input(file: Option<&str>) -> anyhow::Result<String> {
    let mut content = String::new();
    match file {
        Some(path) => content = std::fs::read_to_string(path)?,
        None => {
            std::io::stdin().read_to_string(&mut content)?;
        }
    }
    Ok(content)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let geojson: Value = serde_json::from_str(&read_input(args.file.as_deref())?)?;
    let mut metadata = json!({ "ward_geojson": geojson });
    if let Some(zoom) = args.view_zoom {
        metadata["map_view"] = json!({ "zoom": zoom });
    }
    let metadata = WardMetadata::from_value(metadata).unwrap_or_default();

    match metadata.ward_geojson().and_then(build_static_map_path) {
        Some(path) => {
            tracing::debug!(length = path.len(), "Encoded ward boundary");
            println!("path: {}", path);
        }
        None => println!("path: <none> (no Polygon or MultiPolygon ring found)"),
    }
    println!("zoom: {}", choose_zoom(&metadata));
    Ok(())
}
