use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use pagestore::catalog::Schema;
use pagestore::common::types::{DEFAULT_PAGE_SIZE, PageId};
use pagestore::storage::disk::HeapFile;
use pagestore::transaction::wal::{LogManager, LogRecordContent};

#[derive(Parser)]
#[command(author, version, about = "Pagestore - inspect heap files and write-ahead logs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print page occupancy of a heap file
    Inspect {
        /// Heap file to read
        file: PathBuf,

        /// Column types, e.g. "int,int,text:16"
        #[arg(short, long)]
        schema: String,

        /// Page size the file was written with
        #[arg(short, long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: usize,

        /// Also print every stored tuple
        #[arg(short, long)]
        tuples: bool,
    },

    /// Print the records of a write-ahead log file
    Log {
        /// Log file to read
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Inspect {
            file,
            schema,
            page_size,
            tuples,
        } => inspect(file, &schema, page_size, tuples),
        Commands::Log { file } => dump_log(file),
    }
}

fn inspect(path: PathBuf, schema: &str, page_size: usize, show_tuples: bool) -> Result<()> {
    if !path.is_file() {
        bail!("{} is not a file", path.display());
    }
    let schema = Schema::parse(schema).context("Invalid schema")?;
    println!("Schema: {} ({} bytes per tuple)", schema, schema.tuple_width());

    let table_id = 1;
    let file = HeapFile::open(&path, table_id, Arc::new(schema), page_size)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let num_pages = file.num_pages()?;
    println!("{}: {} pages of {} bytes", path.display(), num_pages, page_size);

    let mut total = 0;
    for page_no in 0..num_pages {
        let page = file.read_page(PageId::new(table_id, page_no))?;
        let used = page.num_slots() - page.num_empty_slots();
        total += used;
        println!("  page {:>5}: {:>4}/{} slots used", page_no, used, page.num_slots());

        if show_tuples {
            for tuple in page.tuples()? {
                println!("    {}", tuple);
            }
        }
    }
    println!("{} tuples", total);
    Ok(())
}

fn dump_log(path: PathBuf) -> Result<()> {
    let records = LogManager::read_file(&path)
        .with_context(|| format!("Failed to read log {}", path.display()))?;

    for record in &records {
        match &record.content {
            LogRecordContent::Data(data) => println!(
                "{:>8} {} {:?} page {} ({} bytes)",
                record.lsn,
                record.txn_id,
                record.record_type,
                data.page_id,
                data.after_image.len()
            ),
            LogRecordContent::Transaction(_) => {
                println!("{:>8} {} {:?}", record.lsn, record.txn_id, record.record_type)
            }
        }
    }
    println!("{} records", records.len());
    Ok(())
}
