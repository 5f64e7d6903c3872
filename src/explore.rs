//! Descriptive statistics, correlations and distribution charts.
//!
//! Charts are computed as plain data ([`Chart`]) and handed to a
//! [`ChartRenderer`]; [`TextRenderer`] draws them as text.
use crate::dataset::{AgeGroup, Dataset, Feature, FeatureTable};
use crate::functions;
use itertools::Itertools as _;
use ordered_float::OrderedFloat;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};
use thiserror::Error;
use tracing::info;

const MAX_BINS: usize = 60;

/// `describe()`-style summary of one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl ColumnSummary {
    pub fn new(name: &str, values: &[f64]) -> Result<Self, ExploreError> {
        if values.is_empty() {
            return Err(ExploreError::EmptyColumn(name.to_owned()));
        }
        let sorted = functions::sorted(values.iter().copied());
        Ok(Self {
            name: name.to_owned(),
            count: values.len(),
            mean: functions::mean(values.iter().copied()),
            std: functions::sample_stddev(values.iter().copied()),
            min: sorted[0],
            q25: functions::quantile(&sorted, 0.25),
            median: functions::quantile(&sorted, 0.5),
            q75: functions::quantile(&sorted, 0.75),
            max: sorted[sorted.len() - 1],
        })
    }
}

pub fn describe(table: &FeatureTable) -> Result<Vec<ColumnSummary>, ExploreError> {
    table
        .names()
        .iter()
        .zip(table.columns())
        .map(|(name, column)| ColumnSummary::new(name, column))
        .collect()
}

pub fn write_summaries<W: Write>(mut out: W, summaries: &[ColumnSummary]) -> io::Result<()> {
    writeln!(
        out,
        "{:<10} {:>6} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
    )?;
    for s in summaries {
        writeln!(
            out,
            "{:<10} {:>6} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
            s.name, s.count, s.mean, s.std, s.min, s.q25, s.median, s.q75, s.max
        )?;
    }
    Ok(())
}

/// Pearson correlations between every pair of feature columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    names: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn new(table: &FeatureTable) -> Self {
        let n = table.features_len();
        let mut values = vec![vec![1.0; n]; n];
        for (i, j) in (0..n).tuple_combinations() {
            let r = functions::pearson(table.column(i), table.column(j));
            values[i][j] = r;
            values[j][i] = r;
        }
        Self {
            names: table.names().to_vec(),
            values,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i][j]
    }

    /// Cells with `|r| >= threshold`; the rest (and undefined ones) are hidden.
    pub fn masked(&self, threshold: f64) -> Vec<Vec<Option<f64>>> {
        self.values
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&r| if r.abs() >= threshold { Some(r) } else { None })
                    .collect()
            })
            .collect()
    }

    pub fn cells(&self) -> Vec<Vec<Option<f64>>> {
        self.values
            .iter()
            .map(|row| row.iter().map(|&r| Some(r).filter(|r| !r.is_nan())).collect())
            .collect()
    }

    /// Distinct feature pairs with `|r| >= threshold`, strongest first.
    pub fn strong_pairs(&self, threshold: f64) -> Vec<(&str, &str, f64)> {
        let n = self.names.len();
        (0..n)
            .tuple_combinations()
            .filter(|&(i, j)| self.values[i][j].abs() >= threshold)
            .map(|(i, j)| (self.names[i].as_str(), self.names[j].as_str(), self.values[i][j]))
            .sorted_by_key(|&(_, _, r)| std::cmp::Reverse(OrderedFloat(r.abs())))
            .collect()
    }
}

pub fn correlation_matrix(table: &FeatureTable) -> CorrelationMatrix {
    CorrelationMatrix::new(table)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    HistogramDensity,
    BoxPlot,
    Bar,
    Pie,
}

/// Column a chart is drawn from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    Label,
    Feature(String),
}

#[derive(Debug, Clone)]
pub struct ChartRequest {
    pub column: ColumnRef,
    pub title: String,
    pub kinds: Vec<ChartKind>,
}

impl ChartRequest {
    pub fn feature(feature: Feature, kinds: Vec<ChartKind>) -> Self {
        Self {
            column: ColumnRef::Feature(feature.code().to_owned()),
            title: format!("{} Distribution", feature.description()),
            kinds,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExploreOptions {
    pub charts: Vec<ChartRequest>,
    pub correlation_threshold: f64,
    pub bins: Option<usize>,
}

impl ExploreOptions {
    pub fn correlation_threshold(mut self, threshold: f64) -> Self {
        self.correlation_threshold = threshold;
        self
    }

    pub fn bins(mut self, bins: usize) -> Self {
        self.bins = Some(bins);
        self
    }
}

impl Default for ExploreOptions {
    fn default() -> Self {
        use ChartKind::*;

        let mut charts = vec![ChartRequest {
            column: ColumnRef::Label,
            title: "Age Group Distribution".to_owned(),
            kinds: vec![Bar, Pie],
        }];
        for feature in [Feature::Gender, Feature::PhysicalActivity, Feature::Diabetes] {
            charts.push(ChartRequest::feature(feature, vec![Bar, Pie]));
        }
        for feature in [Feature::BodyMassIndex, Feature::Glucose, Feature::Insulin] {
            charts.push(ChartRequest::feature(feature, vec![HistogramDensity, BoxPlot]));
        }
        Self {
            charts,
            correlation_threshold: 0.7,
            bins: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub title: String,
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
    /// Kernel density estimate at each bin center, scaled to expected counts.
    pub density: Vec<f64>,
}

impl Histogram {
    pub fn new(title: &str, values: &[f64], bins: Option<usize>) -> Self {
        let sorted = functions::sorted(values.iter().copied());
        let (min, max) = (sorted[0], sorted[sorted.len() - 1]);
        let bins = bins.unwrap_or_else(|| auto_bins(&sorted)).max(1).min(MAX_BINS);
        let (lo, hi) = if max > min { (min, max) } else { (min - 0.5, max + 0.5) };
        let width = (hi - lo) / bins as f64;
        let edges = (0..=bins).map(|i| lo + width * i as f64).collect::<Vec<_>>();

        let mut counts = vec![0; bins];
        for &x in values {
            let bin = (((x - lo) / width).floor() as usize).min(bins - 1);
            counts[bin] += 1;
        }

        let bandwidth = scott_bandwidth(values);
        let n = values.len() as f64;
        let density = edges
            .windows(2)
            .map(|w| kde(values, bandwidth, (w[0] + w[1]) / 2.0) * n * width)
            .collect();
        Self {
            title: title.to_owned(),
            edges,
            counts,
            density,
        }
    }
}

/// Larger of the Sturges and Freedman-Diaconis bin counts.
fn auto_bins(sorted: &[f64]) -> usize {
    let n = sorted.len() as f64;
    let range = sorted[sorted.len() - 1] - sorted[0];
    if range <= 0.0 {
        return 1;
    }
    let sturges = range / (n.log2() + 1.0);
    let iqr = functions::quantile(sorted, 0.75) - functions::quantile(sorted, 0.25);
    let fd = 2.0 * iqr * n.powf(-1.0 / 3.0);
    let width = if fd > 0.0 { fd.min(sturges) } else { sturges };
    (range / width).ceil() as usize
}

fn scott_bandwidth(values: &[f64]) -> f64 {
    let std = functions::sample_stddev(values.iter().copied());
    let h = std * (values.len() as f64).powf(-0.2);
    if h.is_finite() && h > 0.0 {
        h
    } else {
        1.0
    }
}

fn kde(values: &[f64], bandwidth: f64, x: f64) -> f64 {
    let norm = (2.0 * std::f64::consts::PI).sqrt() * bandwidth * values.len() as f64;
    values
        .iter()
        .map(|v| (-0.5 * ((x - v) / bandwidth).powi(2)).exp())
        .sum::<f64>()
        / norm
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxPlot {
    pub title: String,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Most extreme values within 1.5 IQR of the quartiles.
    pub whiskers: (f64, f64),
    pub outliers: Vec<f64>,
}

impl BoxPlot {
    pub fn new(title: &str, values: &[f64]) -> Self {
        let sorted = functions::sorted(values.iter().copied());
        let q1 = functions::quantile(&sorted, 0.25);
        let median = functions::quantile(&sorted, 0.5);
        let q3 = functions::quantile(&sorted, 0.75);
        let iqr = q3 - q1;
        let (lo_fence, hi_fence) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);
        let inside = sorted
            .iter()
            .copied()
            .filter(|&x| lo_fence <= x && x <= hi_fence)
            .collect::<Vec<_>>();
        let whiskers = (
            inside.first().copied().unwrap_or(q1),
            inside.last().copied().unwrap_or(q3),
        );
        let outliers = sorted
            .into_iter()
            .filter(|&x| x < lo_fence || hi_fence < x)
            .collect();
        Self {
            title: title.to_owned(),
            q1,
            median,
            q3,
            whiskers,
            outliers,
        }
    }
}

/// Category counts with their share of the total, used for bar and pie
/// charts.
#[derive(Debug, Clone, PartialEq)]
pub struct Categories {
    pub title: String,
    pub counts: Vec<(String, usize)>,
}

impl Categories {
    pub fn new(title: &str, counts: Vec<(String, usize)>) -> Self {
        Self {
            title: title.to_owned(),
            counts,
        }
    }

    pub fn from_values(title: &str, values: &[f64]) -> Self {
        let mut counts = BTreeMap::<OrderedFloat<f64>, usize>::new();
        for &v in values {
            *counts.entry(OrderedFloat(v)).or_default() += 1;
        }
        let counts = counts
            .into_iter()
            .map(|(v, c)| (format_category(v.0), c))
            .collect();
        Self::new(title, counts)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, c)| c).sum()
    }

    /// Percentage of the total per category.
    pub fn percentages(&self) -> Vec<f64> {
        let total = self.total().max(1) as f64;
        self.counts
            .iter()
            .map(|&(_, c)| 100.0 * c as f64 / total)
            .collect()
    }

    /// Categories by descending count, as a pie chart lists its slices.
    pub fn by_count(&self) -> Vec<(String, usize)> {
        self.counts
            .iter()
            .cloned()
            .sorted_by_key(|(_, c)| std::cmp::Reverse(*c))
            .collect()
    }
}

fn format_category(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    pub title: String,
    pub names: Vec<String>,
    pub cells: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Chart {
    Histogram(Histogram),
    BoxPlot(BoxPlot),
    Bar(Categories),
    Pie(Categories),
    Heatmap(Heatmap),
}

pub trait ChartRenderer {
    fn render(&mut self, chart: &Chart) -> io::Result<()>;
}

/// Discards every chart.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl ChartRenderer for NullRenderer {
    fn render(&mut self, _chart: &Chart) -> io::Result<()> {
        Ok(())
    }
}

/// Draws charts as text, `width` characters for the longest bar.
#[derive(Debug)]
pub struct TextRenderer<W> {
    out: W,
    width: usize,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out, width: 50 }
    }

    pub fn width(mut self, width: usize) -> Self {
        self.width = width.max(10);
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn scaled(&self, value: f64, max: f64) -> usize {
        if max <= 0.0 {
            0
        } else {
            ((value / max) * self.width as f64).round() as usize
        }
    }

    fn histogram(&mut self, h: &Histogram) -> io::Result<()> {
        writeln!(self.out, "{}  (# count, * density)", h.title)?;
        let max = h
            .counts
            .iter()
            .map(|&c| c as f64)
            .chain(h.density.iter().copied())
            .fold(0.0, f64::max);
        let bins = h.edges.windows(2).zip(&h.counts).zip(&h.density);
        for ((edges, &count), &density) in bins {
            let bar = self.scaled(count as f64, max);
            let mark = self.scaled(density, max);
            let mut line = vec![b' '; self.width + 1];
            line[..bar].fill(b'#');
            line[mark.min(self.width)] = b'*';
            writeln!(
                self.out,
                "  [{:>9.2}, {:>9.2}) |{} {}",
                edges[0],
                edges[1],
                String::from_utf8_lossy(&line).trim_end(),
                count
            )?;
        }
        writeln!(self.out)
    }

    fn box_plot(&mut self, b: &BoxPlot) -> io::Result<()> {
        writeln!(self.out, "{}", b.title)?;
        let lo = b.outliers.first().copied().unwrap_or(b.whiskers.0).min(b.whiskers.0);
        let hi = b.outliers.last().copied().unwrap_or(b.whiskers.1).max(b.whiskers.1);
        let span = hi - lo;
        let pos = |x: f64| -> usize {
            if span <= 0.0 {
                0
            } else {
                (((x - lo) / span) * self.width as f64).round() as usize
            }
        };

        let mut line = vec![b' '; self.width + 1];
        line[pos(b.whiskers.0)..=pos(b.whiskers.1)].fill(b'-');
        line[pos(b.q1)..=pos(b.q3)].fill(b'=');
        line[pos(b.whiskers.0)] = b'|';
        line[pos(b.whiskers.1)] = b'|';
        line[pos(b.median)] = b'M';
        for &o in &b.outliers {
            line[pos(o)] = b'o';
        }
        writeln!(self.out, "  {}", String::from_utf8_lossy(&line).trim_end())?;
        writeln!(
            self.out,
            "  whiskers [{:.2}, {:.2}]  q1 {:.2}  median {:.2}  q3 {:.2}  outliers {}",
            b.whiskers.0,
            b.whiskers.1,
            b.q1,
            b.median,
            b.q3,
            b.outliers.len()
        )?;
        writeln!(self.out)
    }

    fn bar(&mut self, c: &Categories) -> io::Result<()> {
        writeln!(self.out, "{}", c.title)?;
        let label_width = c.counts.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
        let max = c.counts.iter().map(|&(_, n)| n).max().unwrap_or(0) as f64;
        for ((label, count), pct) in c.counts.iter().zip(c.percentages()) {
            let bar = "#".repeat(self.scaled(*count as f64, max));
            writeln!(
                self.out,
                "  {:>w$} |{:<bar_w$} {} ({:.1}%)",
                label,
                bar,
                count,
                pct,
                w = label_width,
                bar_w = self.width
            )?;
        }
        writeln!(self.out)
    }

    fn pie(&mut self, c: &Categories) -> io::Result<()> {
        writeln!(self.out, "{}", c.title)?;
        let total = c.total().max(1) as f64;
        let label_width = c.counts.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
        for (label, count) in c.by_count() {
            let share = count as f64 / total;
            let bar = "o".repeat(self.scaled(share, 1.0));
            writeln!(
                self.out,
                "  {:>w$} {:<bar_w$} {:.1}%",
                label,
                bar,
                100.0 * share,
                w = label_width,
                bar_w = self.width
            )?;
        }
        writeln!(self.out)
    }

    fn heatmap(&mut self, h: &Heatmap) -> io::Result<()> {
        writeln!(self.out, "{}", h.title)?;
        let w = h.names.iter().map(String::len).max().unwrap_or(0).max(6);
        write!(self.out, "  {:w$}", "", w = w)?;
        for name in &h.names {
            write!(self.out, " {:>w$}", name, w = w)?;
        }
        writeln!(self.out)?;
        for (name, row) in h.names.iter().zip(&h.cells) {
            write!(self.out, "  {:<w$}", name, w = w)?;
            for cell in row {
                match cell {
                    Some(r) => write!(self.out, " {:>w$.2}", r, w = w)?,
                    None => write!(self.out, " {:>w$}", "", w = w)?,
                }
            }
            writeln!(self.out)?;
        }
        writeln!(self.out)
    }
}

impl<W: Write> ChartRenderer for TextRenderer<W> {
    fn render(&mut self, chart: &Chart) -> io::Result<()> {
        match chart {
            Chart::Histogram(h) => self.histogram(h),
            Chart::BoxPlot(b) => self.box_plot(b),
            Chart::Bar(c) => self.bar(c),
            Chart::Pie(c) => self.pie(c),
            Chart::Heatmap(h) => self.heatmap(h),
        }
    }
}

/// What exploration computed besides the rendered charts.
#[derive(Debug, Clone, Serialize)]
pub struct Exploration {
    pub summaries: Vec<ColumnSummary>,
    pub correlation: CorrelationMatrix,
}

/// Builds the configured charts in order, then the full and the thresholded
/// correlation heatmaps.
pub fn charts(
    dataset: &Dataset,
    correlation: &CorrelationMatrix,
    options: &ExploreOptions,
) -> Result<Vec<Chart>, ExploreError> {
    let mut charts = Vec::new();
    for request in &options.charts {
        match &request.column {
            ColumnRef::Label => {
                let counts = dataset.labels().class_counts();
                let categories = AgeGroup::ALL
                    .iter()
                    .filter(|g| counts[g.index()] > 0)
                    .map(|g| (g.to_string(), counts[g.index()]))
                    .collect();
                let categories = Categories::new(&request.title, categories);
                for kind in &request.kinds {
                    charts.push(match kind {
                        ChartKind::Bar => Chart::Bar(categories.clone()),
                        ChartKind::Pie => Chart::Pie(categories.clone()),
                        ChartKind::HistogramDensity | ChartKind::BoxPlot => {
                            return Err(ExploreError::UnsupportedChart {
                                column: "age_group".to_owned(),
                                kind: *kind,
                            })
                        }
                    });
                }
            }
            ColumnRef::Feature(name) => {
                let values = feature_column(dataset.features(), name)?;
                for kind in &request.kinds {
                    charts.push(match kind {
                        ChartKind::HistogramDensity => {
                            Chart::Histogram(Histogram::new(&request.title, values, options.bins))
                        }
                        ChartKind::BoxPlot => Chart::BoxPlot(BoxPlot::new(&request.title, values)),
                        ChartKind::Bar => {
                            Chart::Bar(Categories::from_values(&request.title, values))
                        }
                        ChartKind::Pie => {
                            Chart::Pie(Categories::from_values(&request.title, values))
                        }
                    });
                }
            }
        }
    }

    charts.push(Chart::Heatmap(Heatmap {
        title: "Correlation Matrix".to_owned(),
        names: correlation.names().to_vec(),
        cells: correlation.cells(),
    }));
    charts.push(Chart::Heatmap(Heatmap {
        title: format!(
            "Correlation Matrix (correlations > {})",
            options.correlation_threshold
        ),
        names: correlation.names().to_vec(),
        cells: correlation.masked(options.correlation_threshold),
    }));
    Ok(charts)
}

fn feature_column<'a>(table: &'a FeatureTable, name: &str) -> Result<&'a [f64], ExploreError> {
    // Requests use canonical codes; files may carry an alias header instead.
    let aliases = Feature::ALL
        .iter()
        .find(|f| f.code().eq_ignore_ascii_case(name))
        .map(|f| f.aliases())
        .unwrap_or(&[]);
    let values = table
        .column_by_name(name)
        .or_else(|| aliases.iter().find_map(|a| table.column_by_name(a)))
        .ok_or_else(|| ExploreError::UnknownColumn(name.to_owned()))?;
    if values.is_empty() {
        return Err(ExploreError::EmptyColumn(name.to_owned()));
    }
    Ok(values)
}

/// Computes summaries and correlations and renders every configured chart.
pub fn explore<R: ChartRenderer + ?Sized>(
    dataset: &Dataset,
    options: &ExploreOptions,
    renderer: &mut R,
) -> Result<Exploration, ExploreError> {
    let summaries = describe(dataset.features())?;
    let correlation = correlation_matrix(dataset.features());
    let charts = charts(dataset, &correlation, options)?;
    info!(charts = charts.len(), "rendering exploration charts");
    for chart in &charts {
        renderer.render(chart)?;
    }

    for (a, b, r) in correlation.strong_pairs(options.correlation_threshold) {
        info!(a, b, r, "strongly correlated features");
    }
    Ok(Exploration {
        summaries,
        correlation,
    })
}

#[derive(Debug, Error)]
pub enum ExploreError {
    #[error("unknown column {0:?}")]
    UnknownColumn(String),

    #[error("column {0:?} has no values")]
    EmptyColumn(String),

    #[error("{kind:?} charts are not available for column {column:?}")]
    UnsupportedChart { column: String, kind: ChartKind },

    #[error("failed to render chart")]
    Render(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{
        AgeGroup::{NonSenior, Senior},
        LabelTable,
    };
    use crate::provider::SyntheticOptions;

    #[test]
    fn summary_matches_describe() -> Result<(), anyhow::Error> {
        let s = ColumnSummary::new("x", &[4.0, 1.0, 3.0, 2.0])?;
        assert_eq!(s.count, 4);
        assert_eq!(s.mean, 2.5);
        assert_eq!((s.min, s.q25, s.median, s.q75, s.max), (1.0, 1.75, 2.5, 3.25, 4.0));
        assert!((s.std - 1.290_994_448_7).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn correlation_and_mask() -> Result<(), anyhow::Error> {
        let table = FeatureTable::new(
            vec!["a".to_owned(), "b".to_owned(), "c".to_owned()],
            vec![
                vec![1.0, 2.0, 3.0, 4.0],
                vec![2.0, 4.1, 5.9, 8.0],
                vec![1.0, -1.0, 1.0, -1.0],
            ],
        )?;
        let corr = correlation_matrix(&table);
        assert_eq!(corr.get(0, 0), 1.0);
        assert!(corr.get(0, 1) > 0.99);
        assert_eq!(corr.get(0, 1), corr.get(1, 0));

        let masked = corr.masked(0.7);
        assert!(masked[0][1].is_some());
        assert!(masked[0][2].is_none());
        assert!(masked[2][2].is_some());

        let pairs = corr.strong_pairs(0.7);
        assert_eq!(pairs.len(), 1);
        assert_eq!((pairs[0].0, pairs[0].1), ("a", "b"));
        Ok(())
    }

    #[test]
    fn histogram_counts_every_value() {
        let values = (0..100).map(|i| (i % 10) as f64).collect::<Vec<_>>();
        let h = Histogram::new("h", &values, Some(5));
        assert_eq!(h.counts, vec![20; 5]);
        assert_eq!(h.edges.len(), 6);
        assert_eq!(h.density.len(), 5);

        let auto = Histogram::new("h", &values, None);
        assert_eq!(auto.counts.iter().sum::<usize>(), 100);

        let flat = Histogram::new("flat", &[2.0; 3], None);
        assert_eq!(flat.counts, vec![3]);
    }

    #[test]
    fn box_plot_finds_outliers() {
        let mut values = (1..=20).map(f64::from).collect::<Vec<_>>();
        values.push(100.0);
        let b = BoxPlot::new("b", &values);
        assert_eq!(b.outliers, vec![100.0]);
        assert_eq!(b.whiskers, (1.0, 20.0));
        assert_eq!(b.median, 11.0);
    }

    #[test]
    fn categories_report_percentages() {
        let c = Categories::from_values("c", &[0.0, 1.0, 1.0, 1.0]);
        assert_eq!(c.counts, vec![("0".to_owned(), 1), ("1".to_owned(), 3)]);
        assert_eq!(c.percentages(), vec![25.0, 75.0]);
        assert_eq!(c.by_count()[0].0, "1");
    }

    #[test]
    fn renders_default_roster() -> Result<(), anyhow::Error> {
        let dataset = SyntheticOptions::default().samples(200).generate()?;
        let mut renderer = TextRenderer::new(Vec::new()).width(30);
        let exploration = explore(&dataset, &ExploreOptions::default(), &mut renderer)?;
        assert_eq!(exploration.summaries.len(), 7);

        let text = String::from_utf8(renderer.into_inner())?;
        assert!(text.contains("Age Group Distribution"));
        assert!(text.contains("BMI Distribution"));
        assert!(text.contains("Correlation Matrix (correlations > 0.7)"));
        assert!(text.contains('%'));
        Ok(())
    }

    #[test]
    fn chart_roster_shape() -> Result<(), anyhow::Error> {
        let dataset = SyntheticOptions::default().samples(50).generate()?;
        let correlation = correlation_matrix(dataset.features());
        let charts = charts(&dataset, &correlation, &ExploreOptions::default())?;
        // 7 columns with two charts each, plus two heatmaps.
        assert_eq!(charts.len(), 16);
        assert!(matches!(charts[0], Chart::Bar(_)));
        assert!(matches!(charts[15], Chart::Heatmap(_)));
        Ok(())
    }

    #[test]
    fn heatmaps_share_one_matrix() -> Result<(), anyhow::Error> {
        let dataset = SyntheticOptions::default().samples(80).generate()?;
        let correlation = correlation_matrix(dataset.features());
        let options = ExploreOptions {
            charts: Vec::new(),
            ..Default::default()
        }
        .correlation_threshold(0.05);
        let charts = charts(&dataset, &correlation, &options)?;
        assert_eq!(charts.len(), 2);
        match (&charts[0], &charts[1]) {
            (Chart::Heatmap(full), Chart::Heatmap(masked)) => {
                assert_eq!(full.cells, correlation.cells());
                assert_eq!(masked.cells, correlation.masked(0.05));
                assert_eq!(full.names, correlation.names());
            }
            other => panic!("unexpected charts {:?}", other),
        }

        let exploration = explore(&dataset, &options, &mut NullRenderer)?;
        // Constant columns give NaN, so compare the visible cells.
        assert_eq!(exploration.correlation.cells(), correlation.cells());
        Ok(())
    }

    #[test]
    fn label_chart_counts_classes() -> Result<(), anyhow::Error> {
        let features = FeatureTable::new(vec!["RIAGENDR".to_owned()], vec![vec![0.0, 1.0, 1.0]])?;
        let labels = LabelTable::new(vec![NonSenior, Senior, NonSenior]);
        let dataset = Dataset::new(features, labels)?;
        let options = ExploreOptions {
            charts: vec![ChartRequest {
                column: ColumnRef::Label,
                title: "labels".to_owned(),
                kinds: vec![ChartKind::Bar],
            }],
            ..Default::default()
        };
        let correlation = correlation_matrix(dataset.features());
        let charts = charts(&dataset, &correlation, &options)?;
        match &charts[0] {
            Chart::Bar(c) => assert_eq!(
                c.counts,
                vec![("non-senior".to_owned(), 2), ("senior".to_owned(), 1)]
            ),
            other => panic!("unexpected chart {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn unknown_column_fails() -> Result<(), anyhow::Error> {
        let dataset = SyntheticOptions::default().samples(10).generate()?;
        let options = ExploreOptions {
            charts: vec![ChartRequest {
                column: ColumnRef::Feature("nope".to_owned()),
                title: "nope".to_owned(),
                kinds: vec![ChartKind::Bar],
            }],
            ..Default::default()
        };
        assert!(matches!(
            explore(&dataset, &options, &mut NullRenderer),
            Err(ExploreError::UnknownColumn(_))
        ));
        Ok(())
    }
}
