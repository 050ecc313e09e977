use clap::{Parser, Subcommand};
use sketch_index_lib::{
    ExecutionContext, HostIndexSnapshot, IndexBuilder, IndexConfiguration, IndexDescriptor, IndexStatistics,
    InMemorySequenceSource, MemoryPool, SequenceSource, SketchIndex, group_reads_into_descriptors,
};
use std::time::Instant;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "sketch-index")]
#[command(version = "0.1.0")]
#[command(about = "Build minimizer sketch indices over sequencing reads", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build sketch indices from an input file
    Build {
        /// Input FASTA/FASTQ file
        #[arg(short, long)]
        input: String,

        /// K-mer length
        #[arg(short, long)]
        k: usize,

        /// Number of consecutive k-mers per window
        #[arg(short, long)]
        w: usize,

        /// Filtering parameter: drop representations making up at least this
        /// fraction of all sketch elements (1.0 = keep everything)
        #[arg(short = 'f', long, default_value = "1.0")]
        filtering_parameter: f64,

        /// Order k-mers by their plain encoding instead of a hash of it
        #[arg(long, default_value = "false")]
        no_hash: bool,

        /// Maximum basepairs per index (0 = one index for the whole file)
        #[arg(short = 'b', long, default_value = "0")]
        max_basepairs: u64,

        /// Number of threads (0 = all available cores)
        #[arg(short = 't', long, default_value = "0")]
        threads: usize,

        /// Working-memory limit in MiB (0 = unlimited)
        #[arg(short = 'r', long, default_value = "0")]
        memory_limit: usize,

        /// Verify the ordering invariants of every index
        #[arg(long, default_value = "false")]
        check: bool,

        /// Copy every index to a host snapshot and back, and compare
        #[arg(long, default_value = "false")]
        snapshot_roundtrip: bool,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing: use RUST_LOG if set, otherwise default to info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            k,
            w,
            filtering_parameter,
            no_hash,
            max_basepairs,
            threads,
            memory_limit,
            check,
            snapshot_roundtrip,
        } => {
            let config = IndexConfiguration::new(k, w)?
                .with_filtering_parameter(filtering_parameter)?
                .with_hash_representations(!no_hash);
            build_command(&input, config, max_basepairs, threads, memory_limit, check, snapshot_roundtrip)?;
        }
    }

    Ok(())
}

/// Build one index per descriptor of the input reads
fn build_command(
    input: &str,
    config: IndexConfiguration,
    max_basepairs: u64,
    threads: usize,
    memory_limit_mib: usize,
    check: bool,
    snapshot_roundtrip: bool,
) -> anyhow::Result<()> {
    info!("Building sketch indices...");
    info!("  Input: {}", input);
    config.print();
    info!("  Threads: {}", if threads == 0 { "all available cores".to_string() } else { threads.to_string() });

    let start = Instant::now();
    let source = InMemorySequenceSource::from_fastx(input)?;
    info!(
        "  Loaded {} reads ({} bp) in {:.2?}",
        source.number_of_reads(),
        source.total_basepairs(),
        start.elapsed()
    );

    let descriptors = if max_basepairs == 0 {
        vec![IndexDescriptor::whole_source(&source)]
    } else {
        group_reads_into_descriptors(&source, max_basepairs)?
    };
    info!("  Building {} indices", descriptors.len());

    let allocator = if memory_limit_mib == 0 {
        MemoryPool::unbounded()
    } else {
        MemoryPool::with_capacity(memory_limit_mib << 20)
    };
    let ctx = ExecutionContext::with_allocator(allocator, threads)?;
    let builder = IndexBuilder::new(config)?;

    // Queue everything first; construction overlaps with submission.
    let indices = descriptors
        .iter()
        .map(|descriptor| builder.build(&source, descriptor, &ctx))
        .collect::<Result<Vec<_>, _>>()?;

    for (descriptor, index) in descriptors.iter().zip(&indices) {
        index.wait_until_ready()?;
        info!(
            "Index of reads {}..{}:",
            descriptor.first_read_id,
            descriptor.past_the_last_read_id()
        );
        IndexStatistics::from_index(index)?.print_summary();
        if let Some(filtered) = index.filter_statistics()? {
            info!(
                "  Filter removed {} representations ({} elements), threshold {}",
                filtered.representations_removed(),
                filtered.elements_removed(),
                filtered.threshold
            );
        }
        if check {
            index.check_invariants()?;
            info!("  Invariants hold");
        }
        if snapshot_roundtrip {
            roundtrip(index, &ctx)?;
        }
    }

    info!(
        "Built {} indices in {:.2?} (peak working memory {} bytes)",
        indices.len(),
        start.elapsed(),
        ctx.allocator().peak()
    );
    Ok(())
}

/// Copy an index to host memory and back, then compare the two
fn roundtrip(index: &SketchIndex, ctx: &ExecutionContext) -> anyhow::Result<()> {
    let snapshot = HostIndexSnapshot::from_index(index, ctx)?;
    let restored = SketchIndex::from_host_snapshot(snapshot, ctx)?;
    restored.wait_until_ready()?;

    let original = index.arrays()?;
    let copy = restored.arrays()?;
    let identical = original.representations[..] == copy.representations[..]
        && original.read_ids[..] == copy.read_ids[..]
        && original.positions_in_reads[..] == copy.positions_in_reads[..]
        && original.directions[..] == copy.directions[..]
        && original.unique_representations[..] == copy.unique_representations[..]
        && original.first_occurrence[..] == copy.first_occurrence[..];
    if identical {
        info!("  Snapshot round trip reproduced all arrays");
        Ok(())
    } else {
        warn!("  Snapshot round trip changed the arrays");
        anyhow::bail!("snapshot round trip of reads starting at {} differs", index.first_read_id())
    }
}
