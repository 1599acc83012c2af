//! JSON encoding of page records

use crate::crawler::PageRecord;
use crate::output::OutputResult;
use std::io::Write;

/// Writes the records as a pretty-printed JSON array
///
/// Non-ASCII text (titles, cell contents) is written as-is, not escaped.
pub fn write_json<W: Write>(records: &[PageRecord], mut writer: W) -> OutputResult<()> {
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.write_all(b"\n")?;
    Ok(())
}
