use std::path::PathBuf;
use std::process::ExitCode;

use blifmerge_r::pipeline::{self, MergeConfig, PartitionerConfig, DEFAULT_THRESHOLD};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use argh::FromArgs;
#[derive(FromArgs)]
/// Partition a BLIF circuit with ABC and merge the fragments into shards
struct Args {
    /// circuit to partition (ignored with --skip-partition)
    #[argh(positional)]
    input: PathBuf,

    /// directory for fragments and shards
    #[argh(positional)]
    outdir: PathBuf,

    /// statements per shard before a new one is started
    #[argh(option, short = 't', default = "DEFAULT_THRESHOLD")]
    threshold: usize,

    /// path of the abc binary
    #[argh(option, default = "PathBuf::from(\"abc\")")]
    abc: PathBuf,

    /// cell library passed to pif
    #[argh(option, default = "PathBuf::from(\"lib9.dsd\")")]
    library: PathBuf,

    /// merge an already partitioned outdir; the input argument is not read
    #[argh(switch)]
    skip_partition: bool,

    /// normalize fragments on one thread
    #[argh(switch)]
    sequential: bool,

    /// debug logging
    #[argh(switch, short = 'v')]
    verbose: bool,

    /// errors only
    #[argh(switch, short = 'q')]
    quiet: bool,
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if quiet {
            "error"
        } else if verbose {
            "debug"
        } else {
            "info"
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let arguments: Args = argh::from_env();
    setup_logging(arguments.verbose, arguments.quiet);

    let cfg = MergeConfig {
        threshold: arguments.threshold,
        parallel: !arguments.sequential,
    };
    let partitioner = PartitionerConfig {
        program: arguments.abc,
        library: arguments.library,
    };
    let partitioner = if arguments.skip_partition {
        None
    } else {
        Some(&partitioner)
    };

    match pipeline::run(&arguments.input, &arguments.outdir, partitioner, &cfg) {
        Ok(report) => {
            info!(
                "{} fragments, {} renamed, {} normalized, {} shards in {}",
                report.fragments,
                report.renamed,
                report.normalized,
                report.shards.len(),
                arguments.outdir.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
