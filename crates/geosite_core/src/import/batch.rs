//! Batch coordinate import from delimited tables.
//!
//! # Responsibility
//! - Parse CSV/TXT tables of `name, x, y[, z]` rows with flexible headers.
//! - Resolve each row into a bundle for the chosen coordinate type.
//! - Match rows to media items by file name and push them through marker sync.
//!
//! # Invariants
//! - The delimiter comes from the header line: `;`, then `,`, then tab.
//! - A bad row is reported and skipped; it never aborts the other rows.
//! - Geodetic rows read `y` as latitude and `x` as longitude.

use crate::geodesy::bundle::BundleBuilder;
use crate::import::coords_file::ImportError;
use crate::model::geo::{
    CoordinateBundle, GeoPoint, Hemisphere, LocalCoordinate, ProjectOrigin, UtmCoordinate,
};
use crate::model::item::{CoordinateSource, ItemId, ItemKind};
use crate::persistence::PersistenceClient;
use crate::store::item_store::MapItemStore;
use crate::sync::marker_sync::{MarkerSyncEngine, SyncOutcome};
use log::{info, warn};
use std::fmt::{Display, Formatter};
use std::path::Path;

const NAME_COLUMNS: &[&str] = &[
    "nombre_imagen",
    "nombre",
    "imagen",
    "filename",
    "file",
    "name",
    "photo",
];
const X_COLUMNS: &[&str] = &["x", "easting", "longitude", "lon", "lng", "project_x"];
const Y_COLUMNS: &[&str] = &["y", "northing", "latitude", "lat", "project_y"];
const Z_COLUMNS: &[&str] = &[
    "z",
    "altura",
    "elevation",
    "altitud",
    "height",
    "project_z",
    "cota",
];

/// Zone assumed for UTM tables when none is given.
pub const DEFAULT_UTM_ZONE: u8 = 30;

const MEDIA_KINDS: [ItemKind; 2] = [ItemKind::Photo360, ItemKind::GalleryImage];

/// Frame the `x`/`y` columns of a table are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateType {
    Local,
    Utm,
    Geo,
}

impl CoordinateType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Utm => "utm",
            Self::Geo => "geo",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Some(Self::Local),
            "utm" => Some(Self::Utm),
            "geo" => Some(Self::Geo),
            _ => None,
        }
    }

    pub fn source(self) -> CoordinateSource {
        match self {
            Self::Local => CoordinateSource::Local,
            Self::Utm => CoordinateSource::Utm,
            Self::Geo => CoordinateSource::Geo,
        }
    }
}

/// How the rows of one table are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub coordinate_type: CoordinateType,
    /// Used for UTM rows only.
    pub utm_zone: u8,
    pub hemisphere: Hemisphere,
}

impl BatchOptions {
    pub fn new(coordinate_type: CoordinateType) -> Self {
        Self {
            coordinate_type,
            utm_zone: DEFAULT_UTM_ZONE,
            hemisphere: Hemisphere::North,
        }
    }
}

/// One data row; `line` is 1-based and counts the header.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRow {
    pub line: usize,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Row that was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

impl Display for RowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Parsed table: usable rows plus rows rejected while parsing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchTable {
    pub rows: Vec<BatchRow>,
    pub rejected: Vec<RowError>,
}

impl BatchTable {
    pub fn total_rows(&self) -> usize {
        self.rows.len() + self.rejected.len()
    }
}

/// Result of applying a table to a project.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchReport {
    pub total_rows: usize,
    pub updated: usize,
    pub errors: Vec<RowError>,
}

/// Parses a delimited coordinate table.
///
/// # Errors
/// - `NoCoordinates` when the text has no header line.
/// - `MissingColumn` when no name column, or no x/y column, is found.
pub fn parse_batch_table(text: &str) -> Result<BatchTable, ImportError> {
    let text = text.trim_start_matches('\u{feff}');
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());
    let (_, header) = lines.next().ok_or(ImportError::NoCoordinates)?;

    let delimiter = detect_delimiter(header);
    let columns: Vec<String> = split_fields(header, delimiter)
        .map(|field| field.to_ascii_lowercase())
        .collect();
    let name_col = required_column(&columns, NAME_COLUMNS, "name")?;
    let x_col = required_column(&columns, X_COLUMNS, "x")?;
    let y_col = required_column(&columns, Y_COLUMNS, "y")?;
    let z_col = find_column(&columns, Z_COLUMNS);

    let mut table = BatchTable::default();
    for (index, line) in lines {
        let fields: Vec<&str> = split_fields(line, delimiter).collect();
        let line = index + 1;
        match parse_row(&fields, name_col, x_col, y_col, z_col) {
            Ok((name, x, y, z)) => table.rows.push(BatchRow {
                line,
                name,
                x,
                y,
                z,
            }),
            Err(message) => table.rejected.push(RowError { line, message }),
        }
    }
    Ok(table)
}

/// Reads and parses a coordinate table file.
pub fn read_batch_file(path: &Path) -> Result<BatchTable, ImportError> {
    let text = std::fs::read_to_string(path)?;
    parse_batch_table(&text)
}

/// Builds the bundle for one row.
///
/// # Errors
/// - `MissingOrigin` for local rows without a project origin.
/// - `InvalidZone` for UTM rows with a zone outside `1..=60`.
/// - `InvalidPoint` when the row resolves outside the valid range.
pub fn resolve_row(
    row: &BatchRow,
    options: &BatchOptions,
    origin: Option<&ProjectOrigin>,
    builder: &BundleBuilder,
) -> Result<(CoordinateBundle, CoordinateSource), ImportError> {
    let bundle = match options.coordinate_type {
        CoordinateType::Local => {
            let origin = origin.ok_or(ImportError::MissingOrigin)?;
            let local = LocalCoordinate {
                x: row.x,
                y: row.y,
                z: row.z,
            };
            builder.build_from_local(&local, origin)?
        }
        CoordinateType::Utm => {
            if !(1..=60).contains(&options.utm_zone) {
                return Err(ImportError::InvalidZone(options.utm_zone));
            }
            let utm = UtmCoordinate {
                easting: row.x,
                northing: row.y,
                zone: options.utm_zone,
                hemisphere: options.hemisphere,
                datum: builder.projector().datum(),
            };
            builder.build_from_utm(&utm, origin, row.z)?
        }
        CoordinateType::Geo => {
            let geo = GeoPoint::new(row.y, row.x)?;
            builder.build_at_height(geo, origin, row.z)
        }
    };
    Ok((bundle, options.coordinate_type.source()))
}

/// First media item whose file name contains `name`, photos360 first.
pub fn match_item(store: &MapItemStore, name: &str) -> Option<ItemId> {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    MEDIA_KINDS.iter().find_map(|kind| {
        store
            .items_of_kind(*kind)
            .find(|item| item.payload.label().to_lowercase().contains(&needle))
            .map(|item| item.id)
    })
}

/// Applies every row of `table` through the marker sync protocol.
///
/// Returns the report together with the sync outcome of each applied row.
pub fn apply_batch<C: PersistenceClient + ?Sized>(
    engine: &mut MarkerSyncEngine,
    client: &C,
    store: &mut MapItemStore,
    table: &BatchTable,
    options: &BatchOptions,
    origin: Option<&ProjectOrigin>,
    builder: &BundleBuilder,
) -> (BatchReport, Vec<SyncOutcome>) {
    let mut report = BatchReport {
        total_rows: table.total_rows(),
        updated: 0,
        errors: table.rejected.clone(),
    };
    let mut outcomes = Vec::with_capacity(table.rows.len());

    for row in &table.rows {
        let Some(id) = match_item(store, &row.name) else {
            report.errors.push(RowError {
                line: row.line,
                message: format!("no item named `{}` in the project", row.name),
            });
            continue;
        };
        let (bundle, source) = match resolve_row(row, options, origin, builder) {
            Ok(resolved) => resolved,
            Err(err) => {
                report.errors.push(RowError {
                    line: row.line,
                    message: err.to_string(),
                });
                continue;
            }
        };
        let outcome = match engine.apply_assignment(client, store, id, bundle, source) {
            Ok(outcome) => outcome,
            Err(err) => {
                report.errors.push(RowError {
                    line: row.line,
                    message: err.to_string(),
                });
                continue;
            }
        };
        match &outcome {
            SyncOutcome::Committed { .. } => report.updated += 1,
            SyncOutcome::RolledBack { error, .. } | SyncOutcome::Superseded { error, .. } => {
                report.errors.push(RowError {
                    line: row.line,
                    message: error.to_string(),
                });
            }
            SyncOutcome::Stale { .. } => {}
        }
        outcomes.push(outcome);
    }

    report.errors.sort_by_key(|error| error.line);
    if report.errors.is_empty() {
        info!(
            "event=batch_import module=import status=ok type={} rows={} updated={}",
            options.coordinate_type.as_str(),
            report.total_rows,
            report.updated
        );
    } else {
        warn!(
            "event=batch_import module=import status=partial type={} rows={} updated={} errors={}",
            options.coordinate_type.as_str(),
            report.total_rows,
            report.updated,
            report.errors.len()
        );
    }
    (report, outcomes)
}

fn detect_delimiter(header: &str) -> char {
    if header.contains(';') {
        ';'
    } else if header.contains(',') {
        ','
    } else {
        '\t'
    }
}

fn split_fields(line: &str, delimiter: char) -> impl Iterator<Item = &str> {
    line.split(delimiter)
        .map(|field| field.trim().trim_matches('"').trim())
}

fn find_column(columns: &[String], aliases: &[&str]) -> Option<usize> {
    columns
        .iter()
        .position(|column| aliases.contains(&column.as_str()))
}

fn required_column(
    columns: &[String],
    aliases: &[&str],
    column: &'static str,
) -> Result<usize, ImportError> {
    find_column(columns, aliases).ok_or_else(|| ImportError::MissingColumn {
        column,
        available: columns.to_vec(),
    })
}

fn parse_row(
    fields: &[&str],
    name_col: usize,
    x_col: usize,
    y_col: usize,
    z_col: Option<usize>,
) -> Result<(String, f64, f64, f64), String> {
    let name = fields
        .get(name_col)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| "missing file name".to_string())?;
    let x = number(fields, x_col, "x")?;
    let y = number(fields, y_col, "y")?;
    let z = match z_col {
        Some(col) if fields.get(col).is_some_and(|raw| !raw.is_empty()) => {
            number(fields, col, "z")?
        }
        _ => 0.0,
    };
    Ok((name.to_string(), x, y, z))
}

fn number(fields: &[&str], col: usize, field: &str) -> Result<f64, String> {
    let raw = fields.get(col).copied().unwrap_or_default();
    raw.parse::<f64>()
        .map_err(|_| format!("invalid number for `{field}`: `{raw}`"))
}
