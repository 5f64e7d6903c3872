//! End-to-end run: load, explore, split and scale, train, evaluate, report.
use crate::dataset::{AgeGroup, Dataset, Feature};
use crate::explore::{
    self, BoxPlot, Exploration, ExploreError, ExploreOptions, NullRenderer, TextRenderer,
};
use crate::metrics::{ClassificationReport, ComparisonTable};
use crate::model_bank::{ModelBank, ModelBankError, ModelResult};
use crate::preprocess::{self, PreprocessError, ScalingParameters, SplitOptions};
use crate::provider::{DataLoadError, DataSource};
use serde::Serialize;
use std::io::{self, Write};
use thiserror::Error;
use tracing::info;

const HEAD_ROWS: usize = 5;
const BAR_WIDTH: usize = 40;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub source: DataSource,
    pub explore: ExploreOptions,
    pub split: SplitOptions,
    /// Seed of the randomized models.
    pub seed: u64,
    pub charts: bool,
}

impl PipelineOptions {
    pub fn source(mut self, source: DataSource) -> Self {
        self.source = source;
        self
    }

    pub fn explore(mut self, explore: ExploreOptions) -> Self {
        self.explore = explore;
        self
    }

    pub fn split(mut self, split: SplitOptions) -> Self {
        self.split = split;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn charts(mut self, enabled: bool) -> Self {
        self.charts = enabled;
        self
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            source: DataSource::default(),
            explore: ExploreOptions::default(),
            split: SplitOptions::default(),
            seed: 42,
            charts: true,
        }
    }
}

#[derive(Debug)]
pub struct PipelineReport {
    pub rows: usize,
    pub class_counts: [usize; 2],
    pub train_rows: usize,
    pub test_rows: usize,
    pub scaling: ScalingParameters,
    pub exploration: Exploration,
    pub results: Vec<ModelResult>,
    pub comparison: ComparisonTable,
}

impl PipelineReport {
    pub fn best(&self) -> Option<&ModelResult> {
        let best = self.comparison.best()?;
        self.results.iter().find(|r| r.name == best.classifier)
    }

    pub fn summary(&self) -> Summary<'_> {
        Summary {
            rows: self.rows,
            class_counts: AgeGroup::ALL
                .iter()
                .map(|&g| (g, self.class_counts[g.index()]))
                .collect(),
            train_rows: self.train_rows,
            test_rows: self.test_rows,
            scaling: &self.scaling,
            models: self
                .results
                .iter()
                .map(|r| ModelSummary {
                    name: &r.name,
                    accuracy: r.accuracy,
                    report: &r.report,
                })
                .collect(),
            best: self.comparison.best().map(|b| b.classifier.as_str()),
        }
    }
}

/// Serializable view of a finished run.
#[derive(Debug, Serialize)]
pub struct Summary<'a> {
    pub rows: usize,
    pub class_counts: Vec<(AgeGroup, usize)>,
    pub train_rows: usize,
    pub test_rows: usize,
    pub scaling: &'a ScalingParameters,
    pub models: Vec<ModelSummary<'a>>,
    pub best: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct ModelSummary<'a> {
    pub name: &'a str,
    pub accuracy: f64,
    pub report: &'a ClassificationReport,
}

/// Runs every stage in order and writes the console report to `out`.
pub fn run<W: Write>(
    options: &PipelineOptions,
    mut out: W,
) -> Result<PipelineReport, PipelineError> {
    info!("loading data");
    let dataset = options.source.load().map_err(PipelineError::DataLoad)?;
    write_dataset(&mut out, &dataset)?;

    info!("exploring data");
    writeln!(out, "\n== Exploration ==\n")?;
    let exploration = if options.charts {
        let mut renderer = TextRenderer::new(&mut out);
        explore::explore(&dataset, &options.explore, &mut renderer)
    } else {
        explore::explore(&dataset, &options.explore, &mut NullRenderer)
    }
    .map_err(PipelineError::Explore)?;

    info!("splitting and scaling");
    let (partition, scaling) =
        preprocess::split_and_scale(&dataset, &options.split).map_err(PipelineError::Preprocess)?;
    writeln!(out, "\n== Preprocessing ==\n")?;
    writeln!(out, "Training set size: {} samples", partition.train_len())?;
    writeln!(out, "Testing set size: {} samples", partition.test_len())?;

    info!("training models");
    let results = ModelBank::standard(options.seed)
        .run(&partition)
        .map_err(PipelineError::ModelBank)?;
    writeln!(out, "\n== Classification ==")?;
    for r in &results {
        writeln!(out, "\n{}", r.name)?;
        writeln!(out, "Accuracy: {:.4}", r.accuracy)?;
        writeln!(out, "Classification Report:\n{}", r.report)?;
    }

    let comparison = ComparisonTable::from_results(&results);
    writeln!(out, "== Results ==\n")?;
    writeln!(out, "{}", comparison)?;
    write_accuracy_chart(&mut out, &comparison)?;
    if let Some(best) = comparison.best() {
        writeln!(
            out,
            "The best-performing model is {} with an accuracy of {:.4}",
            best.classifier, best.accuracy
        )?;
        info!(model = %best.classifier, accuracy = best.accuracy, "best model");
    }

    write_limitations(&mut out, &dataset, &exploration, &options.explore)?;

    Ok(PipelineReport {
        rows: dataset.rows_len(),
        class_counts: dataset.labels().class_counts(),
        train_rows: partition.train_len(),
        test_rows: partition.test_len(),
        scaling,
        exploration,
        results,
        comparison,
    })
}

/// Writes the run summary as pretty JSON and flushes `out`.
pub fn write_summary<W: Write>(
    report: &PipelineReport,
    mut out: W,
) -> Result<(), PipelineError> {
    serde_json::to_writer_pretty(&mut out, &report.summary())?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

fn write_dataset<W: Write>(mut out: W, dataset: &Dataset) -> Result<(), PipelineError> {
    let features = dataset.features();
    writeln!(out, "== Dataset ==\n")?;
    writeln!(
        out,
        "{} rows, {} features",
        dataset.rows_len(),
        features.features_len()
    )?;

    writeln!(out, "\nFirst {} rows:", HEAD_ROWS.min(dataset.rows_len()))?;
    for name in features.names() {
        write!(out, "{:>10}", name)?;
    }
    writeln!(out, " {:>11}", "age_group")?;
    for (i, row) in features.rows().take(HEAD_ROWS).enumerate() {
        for x in row {
            write!(out, "{:>10.2}", x)?;
        }
        writeln!(out, " {:>11}", dataset.labels().labels()[i])?;
    }

    writeln!(out, "\nSummary statistics:")?;
    let summaries = explore::describe(features).map_err(PipelineError::Explore)?;
    explore::write_summaries(&mut out, &summaries)?;

    writeln!(out, "\nLabel distribution:")?;
    let counts = dataset.labels().class_counts();
    for group in AgeGroup::ALL {
        let count = counts[group.index()];
        writeln!(
            out,
            "{:>11} {:>6} ({:.1}%)",
            group,
            count,
            100.0 * count as f64 / dataset.rows_len().max(1) as f64
        )?;
    }
    Ok(())
}

fn write_accuracy_chart<W: Write>(mut out: W, comparison: &ComparisonTable) -> io::Result<()> {
    writeln!(out, "Model Accuracy Comparison")?;
    let width = comparison
        .rows()
        .iter()
        .map(|r| r.classifier.len())
        .max()
        .unwrap_or(0);
    for row in comparison.rows() {
        let bar = (row.accuracy.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize;
        writeln!(
            out,
            "  {:>w$} |{:<bw$} {:.4}",
            row.classifier,
            "#".repeat(bar),
            row.accuracy,
            w = width,
            bw = BAR_WIDTH
        )?;
    }
    writeln!(out)
}

fn write_limitations<W: Write>(
    mut out: W,
    dataset: &Dataset,
    exploration: &Exploration,
    explore: &ExploreOptions,
) -> io::Result<()> {
    writeln!(out, "\n== Limitations ==\n")?;

    let counts = dataset.labels().class_counts();
    let minority = counts.iter().copied().min().unwrap_or(0);
    writeln!(
        out,
        "- Classes are imbalanced ({:.1}% in the minority class); minority-class recall is the weak spot.",
        100.0 * minority as f64 / dataset.rows_len().max(1) as f64
    )?;

    let strong = exploration
        .correlation
        .strong_pairs(explore.correlation_threshold)
        .len();
    if strong == 0 {
        writeln!(
            out,
            "- No feature pair reaches |r| >= {}; engineered features may carry more signal.",
            explore.correlation_threshold
        )?;
    } else {
        writeln!(
            out,
            "- {} feature pairs reach |r| >= {}; some inputs are redundant.",
            strong, explore.correlation_threshold
        )?;
    }

    if let Some(insulin) = dataset.features().column_by_name(Feature::Insulin.code()) {
        let outliers = BoxPlot::new("", insulin).outliers.len();
        writeln!(
            out,
            "- Blood insulin has {} values beyond 1.5 IQR that can sway distance and kernel models.",
            outliers
        )?;
    }
    writeln!(
        out,
        "- Only default hyperparameters and a single split of {} rows were evaluated.",
        dataset.rows_len()
    )?;
    Ok(())
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("data loading failed")]
    DataLoad(#[source] DataLoadError),

    #[error("exploration failed")]
    Explore(#[source] ExploreError),

    #[error("preprocessing failed")]
    Preprocess(#[source] PreprocessError),

    #[error("model training failed")]
    ModelBank(#[source] ModelBankError),

    #[error("failed to write the report")]
    Report(#[from] io::Error),

    #[error("failed to write the JSON summary")]
    Summary(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SyntheticOptions;

    fn small() -> PipelineOptions {
        PipelineOptions::default()
            .source(DataSource::Synthetic(SyntheticOptions::default().samples(120)))
    }

    #[test]
    fn writes_every_section() -> Result<(), anyhow::Error> {
        let mut out = Vec::new();
        let report = run(&small(), &mut out)?;
        let text = String::from_utf8(out)?;

        for section in [
            "== Dataset ==",
            "Summary statistics:",
            "Age Group Distribution",
            "Training set size: 96 samples",
            "Testing set size: 24 samples",
            "Accuracy: ",
            "Model Accuracy Comparison",
            "The best-performing model is",
            "== Limitations ==",
        ] {
            assert!(text.contains(section), "missing {:?}", section);
        }
        assert_eq!(report.results.len(), 5);
        assert_eq!(report.train_rows + report.test_rows, 120);
        assert!(report.best().is_some());

        let json = serde_json::to_value(report.summary())?;
        assert_eq!(json["models"].as_array().map(Vec::len), Some(5));
        Ok(())
    }

    #[test]
    fn charts_can_be_disabled() -> Result<(), anyhow::Error> {
        let mut out = Vec::new();
        run(&small().charts(false), &mut out)?;
        let text = String::from_utf8(out)?;
        assert!(!text.contains("Correlation Matrix"));
        assert!(text.contains("== Results =="));
        Ok(())
    }

    /// Accepts every write and fails on flush.
    struct FlushFails;

    impl Write for FlushFails {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "device full"))
        }
    }

    #[test]
    fn summary_write_failures_propagate() -> Result<(), anyhow::Error> {
        let report = run(&small().charts(false), io::sink())?;

        let mut json = Vec::new();
        write_summary(&report, &mut json)?;
        let value: serde_json::Value = serde_json::from_slice(&json)?;
        assert_eq!(value["test_rows"], 24);

        // The summary fits the buffer, so only the final flush reaches the device.
        let buffered = io::BufWriter::new(FlushFails);
        assert!(matches!(
            write_summary(&report, buffered),
            Err(PipelineError::Report(_))
        ));

        let full = io::BufWriter::with_capacity(16, FlushFails);
        assert!(write_summary(&report, full).is_err());
        Ok(())
    }

    #[test]
    fn errors_name_the_stage() {
        let options = small().source(DataSource::csv("/nonexistent/nhanes.csv"));
        let err = run(&options, io::sink()).err();
        assert!(matches!(err, Some(PipelineError::DataLoad(_))));

        let options = small().split(SplitOptions::default().test_fraction(1.5));
        let err = run(&options, io::sink()).err();
        assert_eq!(
            err.map(|e| e.to_string()),
            Some("preprocessing failed".to_owned())
        );
    }
}
