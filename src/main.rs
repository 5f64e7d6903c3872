use agegroup_bench::explore::ExploreOptions;
use agegroup_bench::pipeline::{self, PipelineOptions};
use agegroup_bench::preprocess::{DegeneratePolicy, SplitOptions};
use agegroup_bench::provider::{DataSource, SyntheticOptions};
use anyhow::ensure;
use std::path::PathBuf;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, StructOpt)]
#[structopt(about = "Explores NHANES health measurements and benchmarks age-group classifiers")]
struct Opt {
    /// CSV file with the feature columns and `age_group` (or a raw age column).
    /// The synthetic generator is used when omitted.
    #[structopt(long, parse(from_os_str))]
    data: Option<PathBuf>,

    #[structopt(long, default_value = ",")]
    delimiter: char,

    /// Rows drawn by the synthetic generator.
    #[structopt(long, default_value = "2278")]
    samples: usize,

    #[structopt(long, default_value = "42")]
    seed: u64,

    #[structopt(long, default_value = "0.2")]
    test_fraction: f64,

    /// Split each class separately to keep class proportions.
    #[structopt(long)]
    stratify: bool,

    /// Fail on zero-variance training features instead of centering them.
    #[structopt(long)]
    strict_scaling: bool,

    #[structopt(long, default_value = "0.7")]
    correlation_threshold: f64,

    /// Histogram bins; chosen from the data when omitted.
    #[structopt(long)]
    bins: Option<usize>,

    #[structopt(long)]
    no_charts: bool,

    /// Writes a JSON summary of the results to this path. With `-` the JSON
    /// goes to stdout and the text report to stderr.
    #[structopt(long)]
    json: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    ensure!(opt.delimiter.is_ascii(), "delimiter must be an ASCII character");
    let source = match &opt.data {
        Some(path) => DataSource::Csv {
            path: path.clone(),
            delimiter: opt.delimiter as u8,
        },
        None => DataSource::Synthetic(
            SyntheticOptions::default()
                .samples(opt.samples)
                .seed(opt.seed),
        ),
    };
    let mut explore = ExploreOptions::default().correlation_threshold(opt.correlation_threshold);
    if let Some(bins) = opt.bins {
        explore = explore.bins(bins);
    }
    let degenerate = if opt.strict_scaling {
        DegeneratePolicy::Reject
    } else {
        DegeneratePolicy::UnitScale
    };
    let split = SplitOptions::default()
        .test_fraction(opt.test_fraction)
        .seed(opt.seed)
        .stratify(opt.stratify)
        .degenerate(degenerate);
    let options = PipelineOptions::default()
        .source(source)
        .explore(explore)
        .split(split)
        .seed(opt.seed)
        .charts(!opt.no_charts);

    // With `--json -` stdout carries only the JSON; the report moves to stderr.
    let json_to_stdout = opt.json.as_deref() == Some("-");
    let report = if json_to_stdout {
        pipeline::run(&options, std::io::stderr().lock())?
    } else {
        pipeline::run(&options, std::io::stdout().lock())?
    };

    match opt.json.as_deref() {
        Some("-") => pipeline::write_summary(&report, std::io::stdout().lock())?,
        Some(path) => {
            let file = std::fs::File::create(path)?;
            pipeline::write_summary(&report, std::io::BufWriter::new(file))?;
        }
        None => {}
    }
    Ok(())
}
