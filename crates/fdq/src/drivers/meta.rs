//! `meta` driver: workers send no data records in this mode, only progress
//! updates and the final statistics gather, so there is nothing for the
//! coordinator to drain on [`crate::wire::transport::Tag::Data`]. The
//! driver is a no-op; the session lifecycle's barrier is what actually
//! synchronizes workers finishing their file lists, and
//! `fdq::stats::print_summary` renders the result after the reduce.

use crate::error::Result;
use crate::session::SessionContext;
use crate::wire::transport::Transport;

pub fn run(_transport: &dyn Transport, _ctx: &SessionContext) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::record::FieldId;
    use crate::session::{FieldRole, FieldSet, FieldSpec, SortDirection, WorkingMode};
    use crate::wire::transport::LoopbackTransport;

    #[test]
    fn meta_driver_returns_immediately_without_touching_the_wire() {
        let group = LoopbackTransport::group(2);
        let coordinator = group.into_iter().next().unwrap();
        let ctx = SessionContext {
            mode: WorkingMode::Meta,
            fields: FieldSet::new(vec![FieldSpec { field: FieldId::Octets, role: FieldRole::AggregateSum }]),
            limit: 0,
            time_interval: None,
            filter_expr: None,
            path: "/flows".into(),
            use_tput: false,
            sort_direction: SortDirection::Desc,
            xchg_buff_size: 64 * 1024,
            progress: crate::progress::ProgressConfig::disabled(),
            output_format: crate::format::OutputFormat::Csv,
        };
        run(&coordinator, &ctx).unwrap();
    }
}
