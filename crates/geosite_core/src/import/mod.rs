//! Coordinate assignment from sidecar text files and batch tables.

pub mod batch;
pub mod coords_file;

pub use batch::{
    apply_batch, match_item, parse_batch_table, read_batch_file, resolve_row, BatchOptions,
    BatchReport, BatchRow, BatchTable, CoordinateType, RowError, DEFAULT_UTM_ZONE,
};
pub use coords_file::{
    parse_coordinate_text, read_coordinate_file, resolve_import, CoordinateFormat, ImportError,
    ParsedCoordinates,
};
