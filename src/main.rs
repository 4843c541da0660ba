use anyhow::Context;
use clap::Parser;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use tripload::archive::path_to_csvnum;
use tripload::chunk::checked_chunk_size;
use tripload::credentials::{self, ConnectTarget, DEFAULT_PORT};
use tripload::duck::DuckStore;
use tripload::error::IngestError;
use tripload::ingest::{RunConfig, RunController, RunSummary, StopReason};
use tripload::schema::{ride_schema, RIDE_TABLE};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Idempotent chunked loader for zipped taxi trip CSV archives"
)]
struct Args {
    /// Archive to load, named `trip_data_<n>.csv.zip`
    file: PathBuf,

    /// Rows per chunk (also the delete window)
    #[arg(short = 'c', long = "chunksize", default_value = "1000", value_parser = parse_chunk_size)]
    chunk_size: NonZeroUsize,

    /// Stop at the first chunk boundary after this many rows were inserted
    #[arg(long = "upperlimit")]
    upper_limit: Option<u64>,

    /// Delete this archive's stored rows before loading
    #[arg(long)]
    delete: bool,

    #[arg(long, env = "PGHOST", default_value = "localhost")]
    host: String,

    #[arg(long, env = "PGPORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    #[arg(long, env = "PGDATABASE", default_value = "taxis")]
    database: String,

    #[arg(long, env = "PGUSER", default_value = "postgres")]
    user: String,

    #[arg(long, default_value = "postgresql")]
    scheme: String,

    /// Password file, `host:port:database:user:password` per line
    #[arg(long)]
    passfile: Option<PathBuf>,

    #[arg(long, default_value = RIDE_TABLE)]
    table: String,

    /// Load into a local DuckDB file instead of PostgreSQL
    #[arg(long)]
    duckdb: Option<PathBuf>,
}

fn parse_chunk_size(s: &str) -> Result<NonZeroUsize, String> {
    let size: NonZeroUsize = s.parse().map_err(|e| format!("{e}"))?;
    checked_chunk_size(size).map_err(|e| e.to_string())
}

impl Args {
    fn target(&self) -> ConnectTarget {
        ConnectTarget {
            scheme: self.scheme.clone(),
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
            user: self.user.clone(),
        }
    }

    fn run_config(&self) -> RunConfig {
        RunConfig {
            chunk_size: self.chunk_size,
            upper_limit: self.upper_limit,
            delete_first: self.delete,
        }
    }
}

enum Backend {
    Local(PathBuf),
    Postgres(url::Url),
}

impl Backend {
    fn open(&self, table: &str) -> tripload::Result<DuckStore> {
        let store = match self {
            Backend::Local(path) => DuckStore::open(path, table),
            Backend::Postgres(url) => DuckStore::attach_postgres(url, table),
        };
        store.map_err(IngestError::Connect)
    }
}

fn resolve_backend(args: &Args) -> tripload::Result<Backend> {
    if let Some(path) = &args.duckdb {
        info!(path = %path.display(), "using local duckdb");
        return Ok(Backend::Local(path.clone()));
    }
    let target = args.target();
    let passfile = credentials::resolve_passfile(args.passfile.clone());
    let password = credentials::lookup_password(passfile.as_deref(), &target)?;
    let url = target.connection_url(&password)?;
    Ok(Backend::Postgres(url))
}

fn report(summary: &RunSummary) {
    if let Some(purge) = &summary.purge {
        println!(
            "deleted {} rows of archive {} in {} windows",
            purge.rows_deleted,
            summary.csvnum,
            purge.windows.len()
        );
    }
    let how = match summary.stop {
        StopReason::Exhausted => "done",
        StopReason::UpperLimit => "stopped at upper limit",
        StopReason::Cancelled => "cancelled",
    };
    println!(
        "{how}: archive {}, {} chunks read, {} written, {} rows inserted{}",
        summary.csvnum,
        summary.chunks_read,
        summary.chunks_written,
        summary.rows_inserted,
        summary
            .last_rownum
            .map(|r| format!(", last row {r}"))
            .unwrap_or_default()
    );
}

async fn run(args: Args) -> anyhow::Result<RunSummary> {
    let config = args.run_config();
    // fail on a bad file name before touching credentials or the database
    path_to_csvnum(&args.file)?;
    let backend = resolve_backend(&args)?;

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping at the next chunk boundary");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    let table = args.table.clone();
    let file = args.file.clone();
    let summary = tokio::task::spawn_blocking(move || {
        let store = backend.open(&table)?;
        RunController::new(store, ride_schema(), config)
            .with_cancel(cancel)
            .run(&file)
    })
    .await
    .context("loader task panicked")??;
    Ok(summary)
}

#[tokio::main]
async fn main() -> ExitCode {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    // ─── 2) parse args ───────────────────────────────────────────────
    let args = Args::parse();
    info!(file = %args.file.display(), chunk_size = args.chunk_size.get(), "startup");

    // ─── 3) load ─────────────────────────────────────────────────────
    match run(args).await {
        Ok(summary) => {
            report(&summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            let code = e
                .downcast_ref::<IngestError>()
                .map_or(1, IngestError::exit_code);
            error!(error = %e, code, "load failed");
            eprintln!("error: {e:#}");
            ExitCode::from(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripload::chunk::MAX_CHUNK_SIZE;

    #[test]
    fn chunk_size_is_bounded_by_the_parser() {
        let args = Args::try_parse_from(["tripload", "trip_data_1.csv.zip"]).unwrap();
        assert_eq!(args.chunk_size.get(), 1000);

        let max = MAX_CHUNK_SIZE.to_string();
        let args = Args::try_parse_from(["tripload", "trip_data_1.csv.zip", "-c", &max]).unwrap();
        assert_eq!(args.chunk_size.get(), MAX_CHUNK_SIZE);

        let over = (MAX_CHUNK_SIZE + 1).to_string();
        for bad in ["0", over.as_str(), "18446744073709551615"] {
            assert!(
                Args::try_parse_from(["tripload", "trip_data_1.csv.zip", "--chunksize", bad])
                    .is_err(),
                "{bad}"
            );
        }
    }
}
