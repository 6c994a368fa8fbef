//! Clap-derive CLI surface and configuration resolution. Resolution happens
//! once, only on the coordinator, before the `SessionContext` broadcast:
//! workers never parse CLI flags themselves, they receive the resolved
//! context over the wire.

use clap::{Parser, Subcommand};

use fdq::error::{Error, Result};
use fdq::flow::filter::field_by_name;
use fdq::format::OutputFormat;
use fdq::progress::ProgressConfig;
use fdq::session::{FieldRole, FieldSet, FieldSpec, SessionContext, SortDirection, TimeInterval, WorkingMode};
use fdq::wire::DEFAULT_XCHG_BUFF_SIZE;

#[derive(Parser, Debug)]
#[command(name = "fdq", about = "Distributed flow-record query engine")]
pub struct Cli {
    #[command(subcommand)]
    pub mode: ModeCommand,

    /// Run as the coordinator, listening on this address for worker connections.
    #[arg(long, global = true, conflicts_with = "connect")]
    pub listen: Option<String>,

    /// Number of worker connections the coordinator should accept (ignored by workers).
    #[arg(long, global = true, default_value_t = 1)]
    pub workers: u32,

    /// Run as a worker, connecting to the coordinator at this address.
    #[arg(long, global = true, conflicts_with = "listen")]
    pub connect: Option<String>,

    /// Increase message verbosity (may be repeated).
    #[arg(short = 'v', long = "verbose", global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Decrease message verbosity.
    #[arg(short = 'q', long = "quiet", global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ModeCommand {
    /// Print matching records as they arrive, up to an optional limit.
    List(QueryArgs),
    /// Aggregate by key and print the top N rows by the sort field.
    Sort(QueryArgs),
    /// Aggregate by key across all workers.
    Aggr(QueryArgs),
    /// Print only summary statistics over the matched input, no per-record output.
    Meta(QueryArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct QueryArgs {
    /// Path to a flow file, a directory to walk recursively, or a strftime
    /// rotation template (used with --start/--end).
    #[arg(long)]
    pub path: String,

    /// Field selection, repeatable: `name=role` where role is one of
    /// `key`, `sum`, `min`, `max`, `sort` (e.g. `--field protocol=key --field octets=sum`).
    #[arg(long = "field", value_parser = parse_field_spec)]
    pub fields: Vec<FieldSpec>,

    /// Record/row limit; 0 means unbounded.
    #[arg(long, default_value_t = 0)]
    pub limit: usize,

    /// Filter expression, e.g. `"proto == 6 and octets > 1000"`.
    #[arg(long)]
    pub filter: Option<String>,

    /// Inclusive start of the time range (unix seconds); required with a strftime path template.
    #[arg(long)]
    pub start: Option<i64>,

    /// Exclusive end of the time range (unix seconds); required with a strftime path template.
    #[arg(long)]
    pub end: Option<i64>,

    /// Use the three-phase TPUT top-N protocol instead of full aggregation (`aggr` mode only).
    #[arg(long)]
    pub tput: bool,

    /// Sort direction for the configured sort field.
    #[arg(long, value_enum, default_value_t = SortDirectionArg::Desc)]
    pub sort_direction: SortDirectionArg,

    /// Report progress after every N files a worker completes; 0 disables progress reporting.
    #[arg(long, default_value_t = 0)]
    pub progress_every: usize,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormatArg::Pretty)]
    pub format: OutputFormatArg,

    /// Exchange buffer size in bytes (tuning knob, may also be set via the
    /// `FDQ_XCHG_BUFF_SIZE` environment variable).
    #[arg(long)]
    pub xchg_buff_size: Option<usize>,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
pub enum SortDirectionArg {
    Asc,
    Desc,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormatArg {
    Pretty,
    Csv,
}

fn parse_field_spec(s: &str) -> std::result::Result<FieldSpec, String> {
    let (name, role) = s.split_once('=').ok_or_else(|| format!("expected `name=role`, got {s:?}"))?;
    let field = field_by_name(name)?;
    let role = match role.to_ascii_lowercase().as_str() {
        "key" => FieldRole::Key,
        "sum" => FieldRole::AggregateSum,
        "min" => FieldRole::AggregateMin,
        "max" => FieldRole::AggregateMax,
        "sort" => FieldRole::Sort,
        other => return Err(format!("unknown field role {other:?} (expected key/sum/min/max/sort)")),
    };
    Ok(FieldSpec { field, role })
}

/// Resolve parsed CLI flags into a broadcastable [`SessionContext`]. Runs
/// only on the coordinator.
pub fn resolve_session_context(args: &QueryArgs, mode: WorkingMode) -> Result<SessionContext> {
    let time_interval = match (args.start, args.end) {
        (Some(start), Some(end)) => Some(TimeInterval { start, end }),
        (None, None) => None,
        _ => {
            return Err(Error::bad_argument(
                "--start and --end must both be given or both omitted",
                fdq::origin!(),
            ))
        }
    };

    let xchg_buff_size = args
        .xchg_buff_size
        .or_else(|| std::env::var("FDQ_XCHG_BUFF_SIZE").ok().and_then(|s| s.parse().ok()))
        .unwrap_or(DEFAULT_XCHG_BUFF_SIZE);

    let ctx = SessionContext {
        mode,
        fields: FieldSet::new(args.fields.clone()),
        limit: args.limit,
        time_interval,
        filter_expr: args.filter.clone(),
        path: args.path.clone(),
        use_tput: args.tput,
        sort_direction: match args.sort_direction {
            SortDirectionArg::Asc => SortDirection::Asc,
            SortDirectionArg::Desc => SortDirection::Desc,
        },
        xchg_buff_size,
        progress: if args.progress_every == 0 {
            ProgressConfig::disabled()
        } else {
            ProgressConfig::every(args.progress_every)
        },
        output_format: match args.format {
            OutputFormatArg::Pretty => OutputFormat::Pretty,
            OutputFormatArg::Csv => OutputFormat::Csv,
        },
    };
    ctx.validate().map_err(|detail| Error::bad_argument(detail, fdq::origin!()))?;
    Ok(ctx)
}

impl ModeCommand {
    pub fn working_mode(&self) -> WorkingMode {
        match self {
            ModeCommand::List(_) => WorkingMode::List,
            ModeCommand::Sort(_) => WorkingMode::Sort,
            ModeCommand::Aggr(_) => WorkingMode::Aggr,
            ModeCommand::Meta(_) => WorkingMode::Meta,
        }
    }

    pub fn args(&self) -> &QueryArgs {
        match self {
            ModeCommand::List(a) | ModeCommand::Sort(a) | ModeCommand::Aggr(a) | ModeCommand::Meta(a) => a,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(path: &str, fields: &[&str]) -> QueryArgs {
        QueryArgs {
            path: path.to_string(),
            fields: fields.iter().map(|f| parse_field_spec(f).unwrap()).collect(),
            limit: 0,
            filter: None,
            start: None,
            end: None,
            tput: false,
            sort_direction: SortDirectionArg::Desc,
            progress_every: 0,
            format: OutputFormatArg::Pretty,
            xchg_buff_size: None,
        }
    }

    #[test]
    fn aggr_with_a_representative_flag_set_resolves() {
        let a = args("/flows", &["protocol=key", "octets=sum"]);
        let ctx = resolve_session_context(&a, WorkingMode::Aggr).unwrap();
        assert_eq!(ctx.fields.fields.len(), 2);
        assert_eq!(ctx.mode, WorkingMode::Aggr);
    }

    #[test]
    fn sort_mode_without_a_sort_field_is_bad_argument() {
        let a = args("/flows", &["protocol=key", "octets=sum"]);
        let err = resolve_session_context(&a, WorkingMode::Sort).unwrap_err();
        assert_eq!(err.code(), fdq::error::ErrorCode::BadArgument);
    }

    #[test]
    fn one_sided_time_range_is_rejected() {
        let mut a = args("/flows/%Y%m%d.flow", &["protocol=key", "octets=sum"]);
        a.start = Some(0);
        let err = resolve_session_context(&a, WorkingMode::Aggr).unwrap_err();
        assert_eq!(err.code(), fdq::error::ErrorCode::BadArgument);
    }

    #[test]
    fn tput_requires_positive_limit_and_sort_field() {
        let mut a = args("/flows", &["protocol=key", "octets=sum", "octets=sort"]);
        a.tput = true;
        let err = resolve_session_context(&a, WorkingMode::Aggr).unwrap_err();
        assert_eq!(err.code(), fdq::error::ErrorCode::BadArgument);

        a.limit = 10;
        let ctx = resolve_session_context(&a, WorkingMode::Aggr).unwrap();
        assert!(ctx.use_tput);
    }
}
