//! C6 Query mode drivers : each driver runs on the coordinator
//! after the `SessionContext` broadcast, drains the data plane for its mode,
//! and prints the result. TPUT's `aggr` variant lives in [`crate::tput`]
//! since it is a protocol of its own (C7), not a leaf driver.

pub mod aggr;
pub mod list;
pub mod meta;
pub mod sort;

use std::io::Write;

use crate::flow::record::FieldId;
use crate::session::SessionContext;

/// Column order for printing: the FieldSet's declared fields, deduplicated
/// (a field may appear twice, e.g. once as `aggregate-sum` and once as
/// `sort`). Mirrors `OutputFile::open_file` convention of a
/// caller-supplied header row .
pub fn display_fields(ctx: &SessionContext) -> Vec<FieldId> {
    let mut seen = Vec::new();
    for spec in &ctx.fields.fields {
        if !seen.contains(&spec.field) {
            seen.push(spec.field);
        }
    }
    seen
}

pub(crate) fn stdout_writer() -> impl Write {
    std::io::stdout()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{FieldRole, FieldSet, FieldSpec};

    #[test]
    fn display_fields_dedupes_repeated_field_ids() {
        let ctx_fields = FieldSet::new(vec![
            FieldSpec { field: FieldId::Protocol, role: FieldRole::Key },
            FieldSpec { field: FieldId::Octets, role: FieldRole::AggregateSum },
            FieldSpec { field: FieldId::Octets, role: FieldRole::Sort },
        ]);
        assert_eq!(ctx_fields.fields.len(), 3);
        let mut seen = Vec::new();
        for spec in &ctx_fields.fields {
            if !seen.contains(&spec.field) {
                seen.push(spec.field);
            }
        }
        assert_eq!(seen, vec![FieldId::Protocol, FieldId::Octets]);
    }
}
