//! Map Sector - command-line harness for the sector index
//!
//! Loads a JSON map extract, indexes it, bakes the neighborhood of a coordinate and prints
//! either a summary or the full scenes as JSON.

mod error;
mod extract;
mod logging;
mod settings;

use error::Result;
use extract::MapExtract;
use map_sector_lib::{IndexConfig, MapIndex, SectorScene, WayKind};
use settings::Settings;
use std::io::Write;
use std::process::ExitCode;

fn main() -> ExitCode {
    let settings = Settings::from_cli();
    let _guard = logging::setup_logging();

    match run(&settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(settings: &Settings) -> Result<()> {
    #[cfg(feature = "profiling")]
    profiling::scope!("map_sector::run");

    let document = MapExtract::from_path(&settings.map)?.into_document(settings.keep_all_ways)?;
    let lat = settings.lat.unwrap_or(document.bounds().center_lat());
    let lon = settings.lon.unwrap_or(document.bounds().center_lon());

    let mut index = MapIndex::new(IndexConfig {
        node_altitude: settings.altitude,
        ..IndexConfig::default()
    });
    let report = index.ingest(document)?;
    if !report.dropped_ways.is_empty() {
        tracing::warn!("{} ways were dropped", report.dropped_ways.len());
    }

    let scenes = index.bake(lat, lon)?;
    if scenes.is_empty() {
        tracing::warn!("No indexed sector at ({}, {})", lat, lon);
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if settings.json {
        serde_json::to_writer_pretty(&mut out, &scenes)?;
        writeln!(out)?;
    } else {
        let info = index.info();
        writeln!(
            out,
            "Indexed {} nodes, {} ways in {} sectors ({} bottom)",
            info.node_count, info.way_count, info.sector_count, info.bottom_sector_count
        )?;
        writeln!(out, "Query ({:.6}, {:.6}): {} sectors", lat, lon, scenes.len())?;
        for scene in &scenes {
            write_scene_summary(&mut out, scene)?;
        }
    }

    Ok(())
}

fn write_scene_summary(out: &mut impl Write, scene: &SectorScene) -> std::io::Result<()> {
    let count = |kind: WayKind| scene.ways.iter().filter(|w| w.kind == kind).count();

    writeln!(
        out,
        "  {} @ ({:.6}, {:.6}) placed at x={:.1} z={:.1}: {} nodes, {} buildings, {} roads, {} areas, {} lines",
        scene.sector,
        scene.reference.latitude,
        scene.reference.longitude,
        scene.placement.x,
        scene.placement.z,
        scene.nodes.len(),
        count(WayKind::Building),
        count(WayKind::Road),
        count(WayKind::Area),
        count(WayKind::Line),
    )
}
