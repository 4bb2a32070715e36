//! CSV summary of the aggregate.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::ExportError;
use crate::aggregate::Snapshot;

pub const HEADER: [&str; 3] = ["IP Address", "Protocol", "Ports"];

/// Write `snapshot` as CSV to `path`. Returns the number of data rows.
pub fn export_structured(path: &Path, snapshot: &Snapshot) -> Result<usize, ExportError> {
    let file = File::create(path)?;
    write_csv(file, snapshot)
}

/// One row per (address, protocol) with ports; IPv4 rows first.
pub fn write_csv<W: Write>(writer: W, snapshot: &Snapshot) -> Result<usize, ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(HEADER)?;
    let rows = snapshot.all_rows();
    for row in &rows {
        wtr.write_record([
            row.address.to_string(),
            row.protocol.to_string(),
            row.ports_joined(),
        ])?;
    }
    wtr.flush()?;
    Ok(rows.len())
}
