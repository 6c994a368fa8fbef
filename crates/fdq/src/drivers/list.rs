//! `list` driver : "receives framed records from every worker in
//! arrival order, decodes and prints each one up to the session limit, and
//! keeps draining (without printing) until every worker terminates."

use crate::drivers::{display_fields, stdout_writer};
use crate::error::Result;
use crate::flow::record::FlowRecord;
use crate::format::OutputFormat;
use crate::session::SessionContext;
use crate::wire::receiver::CoordinatorReceiver;
use crate::wire::transport::Transport;

pub fn run(transport: &dyn Transport, ctx: &SessionContext) -> Result<()> {
    let mut printed = Vec::new();
    let limit = ctx.limit;

    CoordinatorReceiver::new(transport).run(|_from, bytes| {
        if limit == 0 || printed.len() < limit {
            if let Some(record) = FlowRecord::decode(bytes) {
                printed.push(record);
            }
        }
        Ok(())
    })?;

    let fields = display_fields(ctx);
    ctx.output_format.write_records(&mut stdout_writer(), &fields, &printed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::record::{FieldId, FieldValue};
    use crate::session::{FieldRole, FieldSet, FieldSpec, WorkingMode};
    use crate::wire::receiver::send_records;
    use crate::wire::transport::{LoopbackTransport, Tag};

    fn ctx(limit: usize) -> SessionContext {
        SessionContext {
            mode: WorkingMode::List,
            fields: FieldSet::new(vec![
                FieldSpec { field: FieldId::Protocol, role: FieldRole::Key },
                FieldSpec { field: FieldId::Octets, role: FieldRole::Key },
            ]),
            limit,
            time_interval: None,
            filter_expr: None,
            path: "/flows".into(),
            use_tput: false,
            sort_direction: crate::session::SortDirection::Desc,
            xchg_buff_size: 64 * 1024,
            progress: crate::progress::ProgressConfig::disabled(),
            output_format: OutputFormat::Csv,
        }
    }

    #[test]
    fn list_stops_printing_past_the_limit_but_still_drains() {
        let group = LoopbackTransport::group(3);
        let mut iter = group.into_iter();
        let coordinator = iter.next().unwrap();
        let workers: Vec<_> = iter.collect();

        let handles: Vec<_> = workers
            .into_iter()
            .map(|w| {
                std::thread::spawn(move || {
                    let mut rec = FlowRecord::new();
                    rec.set(FieldId::Protocol, FieldValue::U64(6));
                    rec.set(FieldId::Octets, FieldValue::U64(1));
                    let records = vec![rec.encode(), rec.encode()];
                    send_records(&w, 0, Tag::Data, 1024, records.into_iter()).unwrap();
                })
            })
            .collect();

        run(&coordinator, &ctx(1)).unwrap();

        for h in handles {
            h.join().unwrap();
        }
    }
}
