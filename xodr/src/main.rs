//! Loads an OpenDRIVE file, reports accumulated parse errors, and optionally
//! runs the link validator and a whole-map tessellation.
//!
//! ```text
//! xodr map.xodr --validate-links --tessellate
//! ```
//!
//! The exit status is non-zero when the map has fatal (geometry or
//! connectivity) errors or when link validation finds problems.

#[macro_use]
extern crate log;

use std::process;
use std::time::Instant;

use glam::DVec2;
use structopt::StructOpt;

use xodr::XodrMap;

#[derive(StructOpt)]
#[structopt(name = "xodr", about = "Load and validate an OpenDRIVE map.")]
struct Opts {
    /// The .xodr file to load
    input: String,

    /// Run full link validation and print each error found
    #[structopt(long)]
    validate_links: bool,

    /// Check every road's lane widths against its curvature radii
    #[structopt(long)]
    validate_widths: bool,

    /// Tessellate every road and print the map bounds and vertex counts
    #[structopt(long)]
    tessellate: bool,
}

fn main() {
    Logger::setup();
    let opts = Opts::from_args();

    let start = Instant::now();
    let result = match XodrMap::from_file(&opts.input) {
        Ok(result) => result,
        Err(err) => {
            error!("{:#}", err);
            process::exit(1);
        }
    };
    info!("parsed {} in {:.2}s", opts.input, start.elapsed().as_secs_f64());

    for parse_error in result.errors() {
        let class = if parse_error.invalidates_road_geometry() && parse_error.invalidates_connectivity() {
            "ALL"
        } else if parse_error.invalidates_road_geometry() {
            "GEOMETRY"
        } else if parse_error.invalidates_connectivity() {
            "CONNECTIVITY"
        } else {
            "warning"
        };
        warn!("[{}] {}", class, parse_error.description());
    }

    let has_valid_geometry = result.has_valid_geometry();
    let has_valid_connectivity = result.has_valid_connectivity();
    let (map, errors) = result.into_parts();

    info!(
        "{} roads, {} junctions, {} lanes, {} parse errors",
        map.roads().len(),
        map.junctions().len(),
        map.total_num_lanes(),
        errors.len()
    );
    let total_length: f64 = map.roads().iter().map(|road| road.reference_line().end_s()).sum();
    info!("total reference line length: {:.1}m", total_length);

    let mut failed = !has_valid_geometry || !has_valid_connectivity;

    if opts.tessellate {
        if has_valid_geometry {
            tessellate(&map);
        } else {
            warn!("skipping tessellation; the map's geometry is invalid");
        }
    }

    if opts.validate_widths {
        if has_valid_geometry {
            let mut num_violations = 0;
            for road in map.roads() {
                let mut violations = Vec::new();
                xodr::validation::RoadWidthValidator::new(road, 1.0).validate_road_width(&mut violations);
                for violation in &violations {
                    warn!("road {}: {}", road.id(), violation.description());
                }
                num_violations += violations.len();
            }
            if num_violations == 0 {
                info!("width validation passed");
            } else {
                info!("width validation found {} violations", num_violations);
                failed = true;
            }
        } else {
            warn!("skipping width validation; the map's geometry is invalid");
        }
    }

    if opts.validate_links {
        if has_valid_connectivity {
            let link_errors = map.validate_links();
            for link_error in &link_errors {
                warn!("{}", link_error.description(&map));
            }
            if link_errors.is_empty() {
                info!("link validation passed");
            } else {
                info!("link validation found {} errors", link_errors.len());
                failed = true;
            }
        } else {
            warn!("skipping link validation; the map's connectivity is invalid");
        }
    }

    if failed {
        process::exit(1);
    }
}

fn tessellate(map: &XodrMap) {
    let mut min = DVec2::splat(f64::MAX);
    let mut max = DVec2::splat(f64::MIN);
    let mut num_boundary_vertices = 0;

    for road in map.roads() {
        for lane_section in road.lane_sections() {
            let ref_line_tess = road
                .reference_line()
                .tessellate(lane_section.start_s(), lane_section.end_s());
            let boundaries = lane_section.tessellate_lane_boundary_curves(&ref_line_tess);
            for boundary in &boundaries {
                for vertex in &boundary.vertices {
                    min = min.min(*vertex);
                    max = max.max(*vertex);
                    num_boundary_vertices += 1;
                }
            }
        }
    }

    info!(
        "tessellated {} lane boundary vertices, bounds ({:.1}, {:.1}) to ({:.1}, {:.1})",
        num_boundary_vertices, min.x, min.y, max.x, max.y
    );
}

/// Prints `log` records to stdout.
struct Logger;

impl Logger {
    fn setup() {
        log::set_boxed_logger(Box::new(Logger)).unwrap();
        log::set_max_level(log::LevelFilter::Info);
    }
}

impl log::Log for Logger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let target = if !record.target().is_empty() {
            record.target()
        } else {
            record.module_path().unwrap_or_default()
        };
        println!("[{}] {}: {}", record.level(), target, record.args());
    }

    fn flush(&self) {}
}
