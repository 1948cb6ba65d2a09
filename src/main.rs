use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use locusdb::{
    BatchRecord, Conservation, ParallelProcessor, Position, SourceReader, Store, WriterBuilder,
};
use parking_lot::Mutex;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use cli::{BuildArgs, Cli, Command, GetArgs, StoreArgs};

fn run_build(args: &BuildArgs) -> Result<()> {
    let mut builder = WriterBuilder::default()
        .assembly(args.assembly)
        .merge_existing(!args.no_merge)
        .compression(!args.no_compression);
    if let Some(bucket_size) = args.store.bucket_size {
        builder = builder.bucket_size(bucket_size);
    }
    let writer = builder.build(&args.store.db)?;
    let source = SourceReader::from_path(&args.input)?;
    let stats = writer.build_from(source)?;
    writer.finish()?;
    eprint!("{stats}");
    Ok(())
}

/// Collects lookup results from all threads, printed sorted by position
#[derive(Clone)]
struct Lookup {
    results: Arc<Mutex<Vec<(Position, Option<Conservation>)>>>,
    local: Vec<(Position, Option<Conservation>)>,
}
impl ParallelProcessor for Lookup {
    fn process_record(
        &mut self,
        position: Position,
        record: Option<&BatchRecord>,
    ) -> locusdb::Result<()> {
        let scores = match record {
            Some(record) => record.get_conservation(&position)?,
            None => None,
        };
        self.local.push((position, scores));
        Ok(())
    }

    fn on_batch_complete(&mut self) -> locusdb::Result<()> {
        self.results.lock().append(&mut self.local);
        Ok(())
    }
}

fn lookup(args: &GetArgs) -> Result<()> {
    let mut options = args.store.options().enforce_assembly(!args.lenient);
    if let Some(assembly) = args.assembly {
        options = options.assembly(assembly);
    }
    let store = Store::open_with(&args.store.db, options)?;

    let processor = Lookup {
        results: Arc::new(Mutex::new(Vec::with_capacity(args.positions.len()))),
        local: Vec::new(),
    };
    store.process_parallel(&args.positions, processor.clone(), args.threads)?;

    let mut results = std::mem::take(&mut *processor.results.lock());
    results.sort_by_key(|(position, _)| *position);

    let mut out = io::BufWriter::new(io::stdout().lock());
    for (position, scores) in results {
        let scores = scores.unwrap_or_default();
        writeln!(out, "{}\t{}\t{scores}", position.chromosome, position.value)?;
    }
    out.flush()?;
    Ok(())
}

fn show_info(args: &StoreArgs) -> Result<()> {
    let store = Store::open_with(&args.db, args.options())?;
    let metadata = store.metadata();
    println!("path\t{}", store.path().display());
    println!("format_version\t{}", metadata.format_version);
    println!("assembly\t{}", metadata.assembly);
    println!("bucket_size\t{}", store.bucket_size());
    for group in store.schema().groups() {
        let types: Vec<_> = group.compression.types().iter().map(|t| t.name()).collect();
        println!("group\t{}\t{}", group.name, types.join(","));
    }
    Ok(())
}

fn run_verify(args: &StoreArgs) -> Result<()> {
    let store = Store::open_with(&args.db, args.options())?;
    let report = store.verify()?;
    for (chromosome, records) in &report.per_chromosome {
        println!("{chromosome}\t{records}");
    }
    println!("total\t{}\t{} bytes", report.records, report.bytes);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    match &cli.command {
        Command::Build(args) => run_build(args)?,
        Command::Get(args) => lookup(args)?,
        Command::Info(args) => show_info(args)?,
        Command::Verify(args) => run_verify(args)?,
    }
    info!("done");
    Ok(())
}
