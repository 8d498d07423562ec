mod console;

use clap::{Parser, Subcommand};
use pagetree::btree::BTree;
use pagetree::config::StorageConfig;
use pagetree::err;
use pagetree::errors::Error;
use pagetree::monoid::{Count, Pair, ValueExtent};
use pagetree::storage::PageStorage;
use pagetree::unboxed::{I64, U64};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::process::ExitCode;
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");

type Summary = Pair<Count, ValueExtent<I64>>;
type Tree = BTree<Box<dyn PageStorage>, U64, I64, Summary>;

#[derive(Parser)]
#[command(
    name = "pagetree",
    version = VERSION,
    about = "Paged B+Tree of u64 keys and i64 values with range summaries."
)]
struct Cli {
    #[command(flatten)]
    storage: StorageConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Random puts and gets checked against an in-memory map, then a full integrity check.
    Stress {
        /// Number of operations.
        #[arg(long, default_value_t = 100_000)]
        ops: usize,
        /// Seed of the random workload.
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Keys are drawn from `0..key-space`.
        #[arg(long, default_value_t = 10_000, value_parser = clap::value_parser!(u64).range(1..))]
        key_space: u64,
    },
    /// Insert or overwrite a key.
    Put { key: u64, value: i64 },
    /// Look up a key.
    Get { key: u64 },
    /// Count, minimum and maximum value over the keys in `low..=high`.
    Range { low: u64, high: u64 },
    /// Print every page of the tree.
    Dump,
    /// Verify the tree structure.
    Check,
}

fn open_tree(config: &StorageConfig) -> Result<Tree, Error> {
    let storage = config.open()?;
    let summary = Pair::new(Count, ValueExtent::new(I64));
    if storage.page_count() > 0 {
        // Page 0 is the first root; parent links lead from it to the current one.
        BTree::open(storage, U64, I64, summary, 0)
    } else {
        BTree::create(storage, U64, I64, summary)
    }
}

fn stress(tree: &mut Tree, ops: usize, seed: u64, key_space: u64) -> Result<(), Error> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut reference = BTreeMap::new();
    tree.for_each_entry(|key, value| {
        reference.insert(key, value);
    })?;

    for op in 0..ops {
        let key = rng.random_range(0..key_space);
        if rng.random_bool(0.5) {
            let value = rng.random_range(-1_000_000..1_000_000i64);
            let expected = reference.insert(key, value);
            let previous = tree.put(&key, &value)?;
            if previous != expected {
                return Err(err!(
                    Other,
                    "Op {}: put({}) returned {:?}, expected {:?}",
                    op,
                    key,
                    previous,
                    expected
                ));
            }
        } else {
            let expected = reference.get(&key).copied();
            let found = tree.get(&key)?;
            if found != expected {
                return Err(err!(
                    Other,
                    "Op {}: get({}) returned {:?}, expected {:?}",
                    op,
                    key,
                    found,
                    expected
                ));
            }
        }
    }

    let stats = tree.check()?;
    if stats.entries != reference.len() {
        return Err(err!(
            Other,
            "Tree holds {} entries, expected {}",
            stats.entries,
            reference.len()
        ));
    }
    let expected_extent = reference
        .values()
        .fold(None, |extent: Option<(i64, i64)>, &v| match extent {
            None => Some((v, v)),
            Some((min, max)) => Some((min.min(v), max.max(v))),
        });
    let summary = tree.summary()?;
    if summary != (reference.len() as u64, expected_extent) {
        return Err(err!(
            Other,
            "Tree summary {:?} disagrees with the reference map",
            summary
        ));
    }

    info!(ops, seed, depth = stats.depth, "Stress run passed");
    println!(
        "{} ops ok: {} entries, depth {}, {} leaf pages, {} interior pages",
        ops, stats.entries, stats.depth, stats.leaf_pages, stats.interior_pages
    );
    Ok(())
}

fn run(cli: Cli) -> Result<(), Error> {
    let mut tree = open_tree(&cli.storage)?;
    match cli.command {
        Command::Stress {
            ops,
            seed,
            key_space,
        } => stress(&mut tree, ops, seed, key_space)?,
        Command::Put { key, value } => match tree.put(&key, &value)? {
            Some(previous) => println!("{} = {} (was {})", key, value, previous),
            None => println!("{} = {}", key, value),
        },
        Command::Get { key } => match tree.get(&key)? {
            Some(value) => println!("{}", value),
            None => println!("{} not found", key),
        },
        Command::Range { low, high } => match tree.aggregate(low..=high)? {
            (count, Some((min, max))) => println!("count={} min={} max={}", count, min, max),
            (count, None) => println!("count={}", count),
        },
        Command::Dump => {
            let (columns, rows) = tree.describe()?;
            print!("{}", console::render_table(&columns, &rows));
        }
        Command::Check => {
            let stats = tree.check()?;
            println!(
                "ok: {} entries, depth {}, {} leaf pages, {} interior pages",
                stats.entries, stats.depth, stats.leaf_pages, stats.interior_pages
            );
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
