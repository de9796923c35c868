use clap::{Parser, Subcommand, ValueEnum};
use osmix::cli_error::OsmCliError;
use osmix::config::{AlgorithmConfig, Config, MetricConfig};
use osmix::routing::{astar, bidirectional_bfs, build_graph, default_speeds, dijkstra, Metric};
use osmix::Osm;
use std::path::Path;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct OsmixArguments {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum MetricArg {
    Distance,
    Time,
}

#[derive(Clone, Copy, ValueEnum)]
enum AlgorithmArg {
    Dijkstra,
    Astar,
    Bidirectional,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a .pbf file and report entity counts and bbox.
    Import {
        pbf_file: String,
        #[arg(long, help = "path to a .toml or .json run configuration")]
        config: Option<String>,
    },
    /// Find a route between two node ids in a .pbf file.
    Route {
        pbf_file: String,
        from: i64,
        to: i64,
        #[arg(long)]
        metric: Option<MetricArg>,
        #[arg(long)]
        algorithm: Option<AlgorithmArg>,
    },
    /// Merge a patch dataset onto a base dataset and write the result.
    Merge { base_pbf: String, patch_pbf: String, out_pbf: String },
    /// Render way geometry in a bbox extent to a raw RGBA buffer.
    Tile { pbf_file: String, extent: String, width: u32, height: u32, out_file: String },
    /// Round-trip a .pbf file through the dataset and write it back out.
    Write { pbf_file: String, out_pbf: String },
}

fn load_config(path: &Option<String>) -> Result<Config, OsmCliError> {
    match path {
        None => Ok(Config::default()),
        Some(f) => {
            log::info!("reading run configuration from {f}");
            Config::try_from(Path::new(f))
        }
    }
}

fn run(command: &Command) -> Result<(), OsmCliError> {
    match command {
        Command::Import { pbf_file, config } => {
            let _config = load_config(config)?;
            let bytes = std::fs::read(pbf_file)?;
            let osm = Osm::load_from_pbf(&bytes)?;
            let bbox = osm.nodes().bbox();
            println!(
                "nodes={} ways={} relations={} bbox=({:.6},{:.6},{:.6},{:.6})",
                osm.node_count(),
                osm.way_count(),
                osm.relation_count(),
                bbox.min_lon,
                bbox.min_lat,
                bbox.max_lon,
                bbox.max_lat,
            );
            Ok(())
        }
        Command::Route { pbf_file, from, to, metric, algorithm } => {
            let config = Config::default();
            let bytes = std::fs::read(pbf_file)?;
            let osm = Osm::load_from_pbf(&bytes)?;
            let graph = build_graph(&osm, |_| true, &default_speeds())?;

            let metric = match metric {
                Some(MetricArg::Distance) => Metric::Distance,
                Some(MetricArg::Time) => Metric::Time,
                None => match config.routing.metric {
                    MetricConfig::Distance => Metric::Distance,
                    MetricConfig::Time => Metric::Time,
                },
            };
            let algorithm = algorithm.map(|a| match a {
                AlgorithmArg::Dijkstra => AlgorithmConfig::Dijkstra,
                AlgorithmArg::Astar => AlgorithmConfig::Astar,
                AlgorithmArg::Bidirectional => AlgorithmConfig::Bidirectional,
            });
            let algorithm = algorithm.unwrap_or(config.routing.algorithm);

            let start = osm.nodes().index_of(*from).ok_or_else(|| {
                OsmCliError::ConfigurationError(format!("node {from} not found in {pbf_file}"))
            })?;
            let end = osm.nodes().index_of(*to).ok_or_else(|| {
                OsmCliError::ConfigurationError(format!("node {to} not found in {pbf_file}"))
            })?;

            let coord_of = |ix: usize| osm.nodes().coord_of(ix);
            let path = match algorithm {
                AlgorithmConfig::Dijkstra => dijkstra(&graph, start, end, metric),
                AlgorithmConfig::Astar => astar(&graph, start, end, metric, &coord_of)?,
                AlgorithmConfig::Bidirectional => bidirectional_bfs(&graph, start, end),
            };

            match path {
                Some(path) => {
                    println!("route found: {} segments, cost={:.2}", path.len(), path.last().unwrap().cost);
                    Ok(())
                }
                None => {
                    println!("no route found");
                    Ok(())
                }
            }
        }
        Command::Merge { base_pbf, patch_pbf, out_pbf } => {
            let base = Osm::load_from_pbf(&std::fs::read(base_pbf)?)?;
            let patch = Osm::load_from_pbf(&std::fs::read(patch_pbf)?)?;
            let (merged, stats) = osmix::merge::merge(&base, &patch)?;
            println!(
                "merged: {} nodes, {} ways, {} relations (deduplicated {} nodes, synthesized {} intersections)",
                merged.node_count(),
                merged.way_count(),
                merged.relation_count(),
                stats.deduplicated_nodes,
                stats.intersection_points_found,
            );
            std::fs::write(out_pbf, merged.write_pbf()?)?;
            Ok(())
        }
        Command::Tile { pbf_file, extent, width, height, out_file } => {
            let osm = Osm::load_from_pbf(&std::fs::read(pbf_file)?)?;
            let parts: Vec<f64> = extent
                .split(',')
                .map(|s| {
                    s.trim()
                        .parse()
                        .map_err(|_| OsmCliError::ConfigurationError(format!("invalid extent: {extent}")))
                })
                .collect::<Result<_, OsmCliError>>()?;
            if parts.len() != 4 {
                return Err(OsmCliError::ConfigurationError(format!(
                    "expected extent as minlon,minlat,maxlon,maxlat, got '{extent}'"
                )));
            }
            let extent = osmix::raster::TileExtent {
                min_lon: parts[0],
                min_lat: parts[1],
                max_lon: parts[2],
                max_lat: parts[3],
            };
            let image = osmix::raster::render_tile(&osm, extent, *width, *height, &osmix::raster::Style::default())?;
            std::fs::write(out_file, image.pixels)?;
            Ok(())
        }
        Command::Write { pbf_file, out_pbf } => {
            let osm = Osm::load_from_pbf(&std::fs::read(pbf_file)?)?;
            std::fs::write(out_pbf, osm.write_pbf()?)?;
            Ok(())
        }
    }
}

fn main() {
    env_logger::init();
    let args = OsmixArguments::parse();
    if let Err(e) = run(&args.command) {
        eprintln!("osmix failed: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osmix::pbf::blob::write_blob;
    use osmix::pbf::encode_header_block;
    use osmix::node_table::BBox;

    fn write_minimal_pbf(path: &std::path::Path) {
        let bbox = BBox { min_lon: 7.40, min_lat: 43.70, max_lon: 7.45, max_lat: 43.75 };
        let mut bytes = Vec::new();
        write_blob(&mut bytes, "OSMHeader", &encode_header_block(&bbox, &["OsmSchema-V0.6", "DenseNodes"])).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn import_smoke_test_reports_zero_entities_for_a_header_only_pbf() {
        let path = std::env::temp_dir().join("osmix_test_import_smoke.osm.pbf");
        write_minimal_pbf(&path);

        let result = run(&Command::Import { pbf_file: path.to_string_lossy().to_string(), config: None });
        std::fs::remove_file(&path).ok();
        assert!(result.is_ok());
    }

    #[test]
    fn route_against_a_missing_node_id_is_a_readable_configuration_error() {
        let path = std::env::temp_dir().join("osmix_test_route_smoke.osm.pbf");
        write_minimal_pbf(&path);

        let result = run(&Command::Route {
            pbf_file: path.to_string_lossy().to_string(),
            from: 1,
            to: 2,
            metric: None,
            algorithm: None,
        });
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(OsmCliError::ConfigurationError(_))));
    }
}
