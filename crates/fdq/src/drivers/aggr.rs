//! `aggr` driver : plain aggregation merges every worker's
//! per-key partial sums into one coordinator-side table and prints the
//! result. When the session asked for TPUT (`ctx.use_tput`), dispatch to the
//! exact three-phase protocol (C7, [`crate::tput`]) instead.

use crate::drivers::{display_fields, stdout_writer};
use crate::error::Result;
use crate::flow::table::AggregationTable;
use crate::session::SessionContext;
use crate::tput;
use crate::wire::receiver::CoordinatorReceiver;
use crate::wire::transport::Transport;
use crate::worker::pipeline::sort_mode_for;

pub fn run(transport: &dyn Transport, ctx: &SessionContext) -> Result<()> {
    let fields = display_fields(ctx);

    if ctx.use_tput {
        let rows = tput::run_coordinator(transport, &ctx.fields, sort_mode_for(ctx), ctx.limit)?;
        let refs: Vec<_> = rows.iter().collect();
        return ctx.output_format.write_rows(&mut stdout_writer(), &fields, &refs);
    }

    let mut table = AggregationTable::new(ctx.fields.clone(), sort_mode_for(ctx));
    CoordinatorReceiver::new(transport).run(|_from, bytes| table.write_raw(bytes))?;

    let cursor = table.cursor();
    let take = if ctx.limit == 0 { cursor.len() } else { ctx.limit };
    let rows: Vec<_> = cursor.into_iter().take(take).collect();
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
            mode: WorkingMode::Aggr,
            fields: FieldSet::new(vec![
                FieldSpec { field: FieldId::Protocol, role: FieldRole::Key },
                FieldSpec { field: FieldId::Octets, role: FieldRole::AggregateSum },
            ]),
            limit: 0,
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
    fn sums_the_same_key_across_workers() {
        let group = LoopbackTransport::group(3);
        let mut iter = group.into_iter();
        let coordinator = iter.next().unwrap();
        let mut workers = iter.collect::<Vec<_>>().into_iter();
        let w1 = workers.next().unwrap();
        let w2 = workers.next().unwrap();

        let mk = |octets: u64| {
            let mut r = FlowRecord::new();
            r.set(FieldId::Protocol, FieldValue::U64(6));
            r.set(FieldId::Octets, FieldValue::U64(octets));
            r.encode()
        };

        let h1 = std::thread::spawn(move || {
            send_records(&w1, 0, Tag::Data, 1024, vec![mk(10)].into_iter()).unwrap();
        });
        let h2 = std::thread::spawn(move || {
            send_records(&w2, 0, Tag::Data, 1024, vec![mk(5)].into_iter()).unwrap();
        });

        run(&coordinator, &ctx()).unwrap();

        h1.join().unwrap();
        h2.join().unwrap();
    }
}
