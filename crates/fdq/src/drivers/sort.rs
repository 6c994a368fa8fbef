//! `sort` driver : "merges the (already per-worker sorted, N-capped)
//! framed record streams into one coordinator-side table keyed the same way,
//! then prints the top N rows in the configured sort direction." A zero limit
//! prints every row.

use crate::drivers::{display_fields, stdout_writer};
use crate::error::Result;
use crate::flow::table::AggregationTable;
use crate::session::SessionContext;
use crate::wire::receiver::CoordinatorReceiver;
use crate::wire::transport::Transport;
use crate::worker::pipeline::sort_mode_for;

pub fn run(transport: &dyn Transport, ctx: &SessionContext) -> Result<()> {
    let mut table = AggregationTable::new(ctx.fields.clone(), sort_mode_for(ctx));

    CoordinatorReceiver::new(transport).run(|_from, bytes| table.write_raw(bytes))?;

    let cursor = table.cursor();
    let take = if ctx.limit == 0 { cursor.len() } else { ctx.limit };
    let rows: Vec<_> = cursor.into_iter().take(take).collect();

    let fields = display_fields(ctx);
    ctx.output_format.write_rows(&mut stdout_writer(), &fields, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::record::{FieldId, FieldValue, FlowRecord};
    use crate::session::{FieldRole, FieldSet, FieldSpec, SortDirection, WorkingMode};
    use crate::wire::receiver::send_records;
    use crate::wire::transport::{LoopbackTransport, Tag};

    fn ctx() -> SessionContext {
        SessionContext {
            mode: WorkingMode::Sort,
            fields: FieldSet::new(vec![
                FieldSpec { field: FieldId::Protocol, role: FieldRole::Key },
                FieldSpec { field: FieldId::Octets, role: FieldRole::AggregateSum },
                FieldSpec { field: FieldId::Octets, role: FieldRole::Sort },
            ]),
            limit: 1,
            time_interval: None,
            filter_expr: None,
            path: "/flows".into(),
            use_tput: false,
            sort_direction: SortDirection::Desc,
            xchg_buff_size: 64 * 1024,
            progress: crate::progress::ProgressConfig::disabled(),
            output_format: crate::format::OutputFormat::Csv,
        }
    }

    #[test]
    fn merges_worker_partials_and_truncates_to_limit() {
        let group = LoopbackTransport::group(3);
        let mut iter = group.into_iter();
        let coordinator = iter.next().unwrap();
        let mut workers = iter.collect::<Vec<_>>().into_iter();
        let w1 = workers.next().unwrap();
        let w2 = workers.next().unwrap();

        let mk = |proto: u64, octets: u64| {
            let mut r = FlowRecord::new();
            r.set(FieldId::Protocol, FieldValue::U64(proto));
            r.set(FieldId::Octets, FieldValue::U64(octets));
            r.encode()
        };

        let h1 = std::thread::spawn(move || {
            send_records(&w1, 0, Tag::Data, 1024, vec![mk(6, 10)].into_iter()).unwrap();
        });
        let h2 = std::thread::spawn(move || {
            send_records(&w2, 0, Tag::Data, 1024, vec![mk(17, 90)].into_iter()).unwrap();
        });

        run(&coordinator, &ctx()).unwrap();

        h1.join().unwrap();
        h2.join().unwrap();
    }
}
