//! `fdq`: the coordinator/worker binary.
//!
//! Every rank in the static W+1 process group runs this same binary with the
//! same query flags; `--listen` selects the coordinator role, `--connect`
//! selects a worker. Only the coordinator's resolved `SessionContext` is
//! authoritative — it is broadcast to every worker (step 4) before any mode
//! driver or worker pipeline runs. The coordinator then runs its mode driver
//! and the progress side-channel concurrently (step 5), since `recv_any`
//! only ever waits on one tag at a time.

use std::process::ExitCode;

use clap::Parser;

use fdq::progress::run_coordinator_loop;
use fdq::session::Session;
use fdq::stats::{print_summary, reduce, MetadataSummary, ProcessedSummary};
use fdq::wire::Transport;
use fdq::workflow::{Config, Counters};
use fdq::{Error, Result, Role, SessionContext, WorkingMode};

use fdq_node::bootstrap::{bootstrap_coordinator, bootstrap_worker};
use fdq_node::cli::{resolve_session_context, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("fdq: {}", err.display_verbose());
            ExitCode::from(err.code() as u8)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mode = cli.mode.working_mode();
    let args = cli.mode.args().clone();

    let (transport, role): (Box<dyn Transport>, Role) = match (&cli.listen, &cli.connect) {
        (Some(listen_addr), None) => {
            if cli.workers == 0 {
                return Err(Error::bad_argument("--workers must be at least 1", fdq::origin!()));
            }
            let transport = bootstrap_coordinator(listen_addr, cli.workers)?;
            (Box::new(transport), Role::Coordinator)
        }
        (None, Some(connect_addr)) => {
            let transport = bootstrap_worker(connect_addr)?;
            let rank = transport.rank();
            (Box::new(transport), Role::Worker(rank))
        }
        (Some(_), Some(_)) | (None, None) => {
            return Err(Error::bad_argument(
                "exactly one of --listen (coordinator) or --connect (worker) is required",
                fdq::origin!(),
            ))
        }
    };

    if transport.size() < 2 {
        return Err(Error::InsufficientParallelism {
            origin: fdq::origin!(),
            size: transport.size() as usize,
        });
    }

    // Step 3-4: resolve the context on the coordinator only, then broadcast
    // the encoded bytes verbatim; a worker decodes whatever the coordinator
    // sent, discarding its own parse of the query flags.
    let mut ctx_bytes = match role {
        Role::Coordinator => bincode::serialize(&resolve_session_context(&args, mode)?)?,
        Role::Worker(_) => Vec::new(),
    };
    transport.broadcast(0, &mut ctx_bytes)?;
    let context: SessionContext = bincode::deserialize(&ctx_bytes)?;

    let session = Session::new("fdq", Config::new(), Counters::new("fdq", &[]), context, role);

    let (processed, metadata) = match session.role {
        Role::Coordinator => {
            run_coordinator(&*transport, &session)?;
            (ProcessedSummary::default(), MetadataSummary::default())
        }
        Role::Worker(_) => {
            let outcome = fdq::worker::run(&*transport, &session.context)?;
            (outcome.processed, outcome.metadata)
        }
    };

    // Step 6: every rank rendezvouses before the statistics reduction so a
    // straggler worker can't race the coordinator's summary print.
    transport.barrier()?;

    // Step 7: reduce processed/metadata summaries onto the coordinator.
    if let Some((processed, metadata)) = reduce(&*transport, processed, metadata)? {
        print_summary(&session.ctrs, &processed, &metadata);
    }

    Ok(())
}

/// Run the mode driver and, if enabled, the progress loop concurrently.
/// The progress loop drains `Tag::Progress`; the mode driver drains
/// `Tag::Data` (or the TPUT tags) — two independent tags on the same
/// transport, which is exactly what `TcpTransport`'s per-tag demux
/// mailboxes exist to make safe to read from two threads at once.
fn run_coordinator(transport: &dyn Transport, session: &Session) -> Result<()> {
    let worker_count = transport.size() - 1;
    std::thread::scope(|scope| -> Result<()> {
        let progress_handle = session.context.progress.is_enabled().then(|| {
            scope.spawn(|| run_coordinator_loop(transport, &session.log, worker_count))
        });

        dispatch_driver(transport, &session.context)?;

        if let Some(handle) = progress_handle {
            handle
                .join()
                .map_err(|_| Error::internal("progress loop thread panicked", fdq::origin!()))??;
        }
        Ok(())
    })
}

fn dispatch_driver(transport: &dyn Transport, ctx: &SessionContext) -> Result<()> {
    match ctx.mode {
        WorkingMode::List => fdq::drivers::list::run(transport, ctx),
        WorkingMode::Sort => fdq::drivers::sort::run(transport, ctx),
        WorkingMode::Aggr => fdq::drivers::aggr::run(transport, ctx),
        WorkingMode::Meta => fdq::drivers::meta::run(transport, ctx),
    }
}
