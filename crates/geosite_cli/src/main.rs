//! Command-line front end for the coordinate engine and project database.
//!
//! # Responsibility
//! - Expose conversions and coordinate file parsing for quick field checks.
//! - Run project-level maintenance (stats, batch import, repositioning)
//!   against the configured database.
//! - Keep output line-oriented and deterministic.

use clap::{Args, Parser, Subcommand};
use geosite_core::import::{read_coordinate_file, BatchOptions, CoordinateType};
use geosite_core::persistence::{CoordinateFields, DeclaredOrigin};
use geosite_core::{
    apply_batch, core_version, init_logging, load_project_items, read_batch_file,
    reposition_project, resolve_import, CachedOriginStore, CoordinateBundle,
    CoreConfig, GeoPoint, Hemisphere, ItemKind, MapItemStore, MarkerSyncEngine, OriginStore,
    ProjectId, ProjectOrigin, SqlitePersistence, UtmCoordinate,
};
use log::{info, warn};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "geosite", version, about = "Geo-tagged placement toolkit")]
struct Cli {
    /// JSON config file (datum, log_level, log_dir, db_path)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to this absolute directory; overrides the config
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// SQLite database file; overrides the config
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// WGS84 latitude/longitude to UTM
    #[command(allow_negative_numbers = true)]
    Utm { lat: f64, lng: f64 },
    /// UTM to WGS84 latitude/longitude
    #[command(allow_negative_numbers = true)]
    Geo {
        easting: f64,
        northing: f64,
        zone: u8,
        /// N or S
        hemisphere: String,
    },
    /// WGS84 latitude/longitude to all three frames
    #[command(allow_negative_numbers = true)]
    Local {
        lat: f64,
        lng: f64,
        #[command(flatten)]
        origin: OriginArgs,
        #[arg(long, default_value_t = 0.0)]
        z: f64,
    },
    /// Parse a coordinate sidecar file
    #[command(allow_negative_numbers = true)]
    Parse {
        file: PathBuf,
        #[command(flatten)]
        origin: OriginArgs,
    },
    /// Item counts of a project
    Stats {
        #[arg(long)]
        project: ProjectId,
    },
    /// Assign coordinates to project media from a CSV/TXT table
    #[command(allow_negative_numbers = true)]
    Import {
        file: PathBuf,
        #[arg(long)]
        project: ProjectId,
        /// local, utm or geo
        #[arg(long = "type", value_parser = parse_coordinate_type)]
        coordinate_type: CoordinateType,
        /// UTM zone of the table rows
        #[arg(long, default_value_t = geosite_core::import::DEFAULT_UTM_ZONE)]
        zone: u8,
        /// UTM rows are in the southern hemisphere
        #[arg(long)]
        south: bool,
        /// Session origin; wins over the stored project origin
        #[command(flatten)]
        origin: OriginArgs,
    },
    /// Save a new project origin and recalculate item coordinates
    #[command(allow_negative_numbers = true)]
    Reposition {
        #[arg(long)]
        project: ProjectId,
        #[command(flatten)]
        origin: OriginArgs,
        /// Only save the origin
        #[arg(long)]
        no_recalculate: bool,
    },
    /// Print the core version
    Version,
}

#[derive(Args)]
struct OriginArgs {
    #[arg(long, requires = "origin_lng")]
    origin_lat: Option<f64>,
    #[arg(long, requires = "origin_lat")]
    origin_lng: Option<f64>,
    /// Frame rotation in degrees, counter-clockwise positive
    #[arg(long, default_value_t = 0.0)]
    rotation: f64,
}

impl OriginArgs {
    fn resolve(&self) -> Result<Option<ProjectOrigin>, Box<dyn Error>> {
        match (self.origin_lat, self.origin_lng) {
            (Some(latitude), Some(longitude)) => Ok(Some(ProjectOrigin {
                origin: GeoPoint::new(latitude, longitude)?,
                rotation_degrees: self.rotation,
            })),
            _ => Ok(None),
        }
    }
}

fn parse_coordinate_type(value: &str) -> Result<CoordinateType, String> {
    CoordinateType::parse(value).ok_or_else(|| format!("expected local|utm|geo, got `{value}`"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };
    if cli.db.is_some() {
        config.db_path = cli.db.clone();
    }
    if let Some(log_dir) = cli.log_dir.as_ref().or(config.log_dir.as_ref()) {
        init_logging(&config.log_level, log_dir)?;
    }
    let builder = config.bundle_builder()?;

    match cli.command {
        Command::Utm { lat, lng } => {
            let utm = builder.projector().to_utm(GeoPoint::new(lat, lng)?);
            print_utm(&utm);
        }
        Command::Geo {
            easting,
            northing,
            zone,
            hemisphere,
        } => {
            if !(1..=60).contains(&zone) {
                return Err(format!("zone must be within 1..=60, got {zone}").into());
            }
            let hemisphere = Hemisphere::parse(&hemisphere)
                .ok_or_else(|| format!("hemisphere must be N or S, got `{hemisphere}`"))?;
            let geo = builder.projector().to_geo(&UtmCoordinate {
                easting,
                northing,
                zone,
                hemisphere,
                datum: builder.projector().datum(),
            });
            println!("latitude={:.8} longitude={:.8}", geo.latitude, geo.longitude);
        }
        Command::Local { lat, lng, origin, z } => {
            let origin = origin.resolve()?;
            let bundle = builder.build_at_height(GeoPoint::new(lat, lng)?, origin.as_ref(), z);
            print_bundle(&bundle);
        }
        Command::Parse { file, origin } => {
            let parsed = read_coordinate_file(&file)?;
            info!(
                "event=cli_parse module=cli status=ok format={:?}",
                parsed.format
            );
            println!(
                "format={:?} x={:?} y={:?} z={:?} latitude={:?} longitude={:?}",
                parsed.format, parsed.x, parsed.y, parsed.z, parsed.latitude, parsed.longitude
            );
            let origin = origin.resolve()?;
            let (bundle, source) = resolve_import(&parsed, origin.as_ref(), &builder)?;
            println!("source={}", source.as_str());
            print_bundle(&bundle);
        }
        Command::Stats { project } => {
            let conn = config.open_database()?;
            let store = load_store(&SqlitePersistence::new(&conn), project);
            let stats = store.stats();
            println!(
                "project={} photos360={} gallery_images={} incidents={} with_coordinates={}",
                project,
                stats.photos360,
                stats.gallery_images,
                stats.incidents,
                stats.with_coordinates
            );
            for kind in ItemKind::ALL {
                for item in store.items_of_kind(kind) {
                    let position = item.position().map_or_else(
                        || "unplaced".to_string(),
                        |geo| format!("{:.8},{:.8}", geo.latitude, geo.longitude),
                    );
                    println!(
                        "{} {} {} {} source={}",
                        kind.as_str(),
                        item.id,
                        item.payload.label(),
                        position,
                        item.source.as_str()
                    );
                }
            }
        }
        Command::Import {
            file,
            project,
            coordinate_type,
            zone,
            south,
            origin,
        } => {
            let table = read_batch_file(&file)?;
            let conn = config.open_database()?;
            let client = SqlitePersistence::new(&conn);
            let mut origins = CachedOriginStore::new(client);
            if let Some(session) = origin.resolve()? {
                origins.cache_origin(
                    project,
                    DeclaredOrigin {
                        origin: Some(session.origin),
                        rotation_degrees: Some(session.rotation_degrees),
                    },
                );
            }
            let project_origin = origins.get_origin(project);
            let mut store = load_store(&client, project);
            let options = BatchOptions {
                coordinate_type,
                utm_zone: zone,
                hemisphere: if south {
                    Hemisphere::South
                } else {
                    Hemisphere::North
                },
            };
            let (report, _) = apply_batch(
                &mut MarkerSyncEngine::new(),
                &client,
                &mut store,
                &table,
                &options,
                project_origin.as_ref(),
                &builder,
            );
            println!(
                "type={} rows={} updated={} errors={}",
                coordinate_type.as_str(),
                report.total_rows,
                report.updated,
                report.errors.len()
            );
            for error in &report.errors {
                println!("error {error}");
            }
        }
        Command::Reposition {
            project,
            origin,
            no_recalculate,
        } => {
            let origin = origin
                .resolve()?
                .ok_or("reposition needs --origin-lat and --origin-lng")?;
            let conn = config.open_database()?;
            let client = SqlitePersistence::new(&conn);
            let mut origins = CachedOriginStore::new(client);
            let mut store = load_store(&client, project);
            let (report, _) = reposition_project(
                &mut MarkerSyncEngine::new(),
                &client,
                &mut origins,
                &mut store,
                origin,
                !no_recalculate,
                &builder,
            )?;
            println!(
                "origin={:.8},{:.8} rotation={} items={} updated={} errors={}",
                origin.origin.latitude,
                origin.origin.longitude,
                origin.rotation_degrees,
                report.total_items,
                report.updated,
                report.errors.len()
            );
            for (id, message) in &report.errors {
                println!("error {id}: {message}");
            }
        }
        Command::Version => println!("geosite_core version={}", core_version()),
    }
    Ok(())
}

fn load_store(client: &SqlitePersistence<'_>, project: ProjectId) -> MapItemStore {
    let report = load_project_items(client, project);
    for kind in report.unavailable_kinds() {
        info!(
            "event=cli_load module=cli status=partial project_id={} kind={}",
            project,
            kind.as_str()
        );
    }
    for kind in report.failed_kinds() {
        warn!(
            "event=cli_load module=cli status=degraded project_id={} kind={}",
            project,
            kind.as_str()
        );
        eprintln!("warning: {} could not be loaded", kind.as_str());
    }
    report.into_store(project)
}

fn print_utm(utm: &UtmCoordinate) {
    println!(
        "zone={}{} easting={:.3} northing={:.3} datum={}",
        utm.zone,
        utm.hemisphere.as_char(),
        utm.easting,
        utm.northing,
        utm.datum.tag()
    );
}

fn print_bundle(bundle: &CoordinateBundle) {
    for (key, value) in CoordinateFields::from_bundle(bundle, bundle.height()).to_form_pairs() {
        println!("{key}={value}");
    }
    if bundle.local.is_none() {
        println!("local=none");
    }
}
