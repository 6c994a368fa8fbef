//! Output formatting: the leaf-level rendering of aggregated rows/flow
//! records, kept deliberately dumb (no IP/TCP pretty-printers) — numeric
//! fields render as plain integers, address fields as hex.
//!
//! Grounded in `workflow::file::OutputFile`'s CSV writer, generalized from
//! "always CSV" to a small `OutputFormat` choice, plus a "pretty"
//! fixed-width-column renderer in the same idiom.

use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::error::Result;
use crate::flow::record::{FieldId, FieldValue, FlowRecord};
use crate::flow::table::AggregatedRow;

/// How a result set is rendered to the output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Fixed-width, human-aligned columns (the default for a terminal).
    Pretty,
    /// RFC 4180 CSV, one row per record, header row first.
    Csv,
}

impl OutputFormat {
    fn header_row(fields: &[FieldId]) -> Vec<String> {
        fields.iter().map(|f| format!("{f:?}")).collect()
    }

    fn cell(value: Option<FieldValue>) -> String {
        match value {
            None => String::new(),
            Some(FieldValue::U64(v)) => v.to_string(),
            Some(FieldValue::Bytes16(b)) => b.iter().map(|byte| format!("{byte:02x}")).collect(),
        }
    }

    /// Render a sequence of aggregated rows to `out`, column order following
    /// the order fields were given in.
    pub fn write_rows(self, out: &mut impl Write, fields: &[FieldId], rows: &[&AggregatedRow]) -> Result<()> {
        let records: Vec<_> = rows.iter().map(|r| r.to_record()).collect();
        let values: Vec<Vec<String>> = records
            .iter()
            .map(|rec| fields.iter().map(|f| Self::cell(rec.get(*f))).collect())
            .collect();
        self.write_table(out, fields, &values)
    }

    /// Render a sequence of plain (un-aggregated) flow records, used by the
    /// `list` driver.
    pub fn write_records(self, out: &mut impl Write, fields: &[FieldId], records: &[FlowRecord]) -> Result<()> {
        let values: Vec<Vec<String>> = records
            .iter()
            .map(|rec| fields.iter().map(|f| Self::cell(rec.get(*f))).collect())
            .collect();
        self.write_table(out, fields, &values)
    }

    fn write_table(self, out: &mut impl Write, fields: &[FieldId], rows: &[Vec<String>]) -> Result<()> {
        let header = Self::header_row(fields);
        match self {
            OutputFormat::Csv => {
                // `has_headers(false)` because we write the header ourselves below,
                // same convention as `workflow::file::OutputFile::open_file`.
                let mut writer = WriterBuilder::new()
                    .has_headers(false)
                    .terminator(csv::Terminator::Any(b'\n'))
                    .from_writer(out);
                writer.write_record(&header)?;
                for row in rows {
                    writer.write_record(row)?;
                }
                writer.flush()?;
            }
            OutputFormat::Pretty => {
                let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
                for row in rows {
                    for (i, cell) in row.iter().enumerate() {
                        widths[i] = widths[i].max(cell.len());
                    }
                }
                write_padded_row(out, &header, &widths)?;
                for row in rows {
                    write_padded_row(out, row, &widths)?;
                }
            }
        }
        Ok(())
    }
}

fn write_padded_row(out: &mut impl Write, cells: &[String], widths: &[usize]) -> Result<()> {
    let mut line = String::new();
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            line.push_str("  ");
        }
        line.push_str(&format!("{:>width$}", cell, width = widths[i]));
    }
    writeln!(out, "{line}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{FieldRole, FieldSet, FieldSpec};
    use std::collections::HashMap;

    fn sample_rows() -> (Vec<FieldId>, Vec<AggregatedRow>) {
        let schema = FieldSet::new(vec![
            FieldSpec { field: FieldId::Protocol, role: FieldRole::Key },
            FieldSpec { field: FieldId::Octets, role: FieldRole::AggregateSum },
        ]);
        let mut table = crate::flow::table::AggregationTable::new(schema, crate::flow::table::SortMode::SortedDesc);
        let mut rec = crate::flow::record::FlowRecord::new();
        rec.set(FieldId::Protocol, FieldValue::U64(6));
        rec.set(FieldId::Octets, FieldValue::U64(1234));
        table.write(&rec);
        let rows: Vec<AggregatedRow> = table.cursor().into_iter().cloned().collect();
        let _ = HashMap::<FieldId, FieldValue>::new();
        (vec![FieldId::Protocol, FieldId::Octets], rows)
    }

    #[test]
    fn csv_output_has_header_and_one_row_per_record() {
        let (fields, rows) = sample_rows();
        let refs: Vec<&AggregatedRow> = rows.iter().collect();
        let mut out = Vec::new();
        OutputFormat::Csv.write_rows(&mut out, &fields, &refs).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), "Protocol,Octets");
        assert_eq!(lines.next().unwrap(), "6,1234");
    }

    #[test]
    fn pretty_output_aligns_columns() {
        let (fields, rows) = sample_rows();
        let refs: Vec<&AggregatedRow> = rows.iter().collect();
        let mut out = Vec::new();
        OutputFormat::Pretty.write_rows(&mut out, &fields, &refs).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Protocol"));
        assert!(text.contains("1234"));
    }

    #[test]
    fn write_records_renders_plain_flow_records() {
        let mut rec = crate::flow::record::FlowRecord::new();
        rec.set(FieldId::Protocol, FieldValue::U64(17));
        rec.set(FieldId::Octets, FieldValue::U64(42));
        let mut out = Vec::new();
        OutputFormat::Csv
            .write_records(&mut out, &[FieldId::Protocol, FieldId::Octets], std::slice::from_ref(&rec))
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "Protocol,Octets\n17,42\n");
    }
}
