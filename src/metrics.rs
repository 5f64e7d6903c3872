//! Accuracy, per-class reports and model comparison.
use crate::dataset::{AgeGroup, LabelTable};
use crate::table::CLASSES;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Fraction of rows where the prediction equals the truth.
pub fn accuracy(predicted: &LabelTable, truth: &LabelTable) -> Result<f64, MetricsError> {
    check_lengths(predicted, truth)?;
    let hits = predicted
        .iter()
        .zip(truth.iter())
        .filter(|(p, t)| p == t)
        .count();
    Ok(hits as f64 / truth.len() as f64)
}

fn check_lengths(predicted: &LabelTable, truth: &LabelTable) -> Result<(), MetricsError> {
    if truth.is_empty() {
        return Err(MetricsError::Empty);
    }
    if predicted.len() != truth.len() {
        return Err(MetricsError::LengthMismatch {
            predicted: predicted.len(),
            truth: truth.len(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class precision, recall, F1 and support with macro and
/// support-weighted averages. Undefined ratios are reported as 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub classes: Vec<(AgeGroup, ClassMetrics)>,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    pub fn new(predicted: &LabelTable, truth: &LabelTable) -> Result<Self, MetricsError> {
        check_lengths(predicted, truth)?;

        // confusion[truth][predicted]
        let mut confusion = [[0usize; CLASSES]; CLASSES];
        for (p, t) in predicted.iter().zip(truth.iter()) {
            confusion[t.index()][p.index()] += 1;
        }

        let classes = AgeGroup::ALL
            .iter()
            .map(|&class| {
                let c = class.index();
                let tp = confusion[c][c] as f64;
                let predicted_c = (0..CLASSES).map(|t| confusion[t][c]).sum::<usize>() as f64;
                let support = confusion[c].iter().sum::<usize>();
                let precision = ratio(tp, predicted_c);
                let recall = ratio(tp, support as f64);
                let f1 = ratio(2.0 * precision * recall, precision + recall);
                (
                    class,
                    ClassMetrics {
                        precision,
                        recall,
                        f1,
                        support,
                    },
                )
            })
            .collect::<Vec<_>>();

        let total = truth.len();
        let average = |weight: &dyn Fn(&ClassMetrics) -> f64| {
            let norm = classes.iter().map(|(_, m)| weight(m)).sum::<f64>();
            let avg = |f: fn(&ClassMetrics) -> f64| {
                ratio(
                    classes.iter().map(|(_, m)| weight(m) * f(m)).sum::<f64>(),
                    norm,
                )
            };
            ClassMetrics {
                precision: avg(|m| m.precision),
                recall: avg(|m| m.recall),
                f1: avg(|m| m.f1),
                support: total,
            }
        };
        let macro_avg = average(&|_| 1.0);
        let weighted_avg = average(&|m| m.support as f64);

        Ok(Self {
            accuracy: accuracy(predicted, truth)?,
            classes,
            macro_avg,
            weighted_avg,
        })
    }

    pub fn support(&self) -> usize {
        self.classes.iter().map(|(_, m)| m.support).sum()
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = 12;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}",
            "",
            "precision",
            "recall",
            "f1-score",
            "support",
            width = width
        )?;
        writeln!(f)?;
        for (class, m) in &self.classes {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                class,
                m.precision,
                m.recall,
                m.f1,
                m.support,
                width = width
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy",
            "",
            "",
            self.accuracy,
            self.support(),
            width = width
        )?;
        for (name, m) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name,
                m.precision,
                m.recall,
                m.f1,
                m.support,
                width = width
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub classifier: String,
    pub accuracy: f64,
}

/// One row per model, in evaluation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonTable {
    rows: Vec<ComparisonRow>,
}

impl ComparisonTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<S: Into<String>>(&mut self, classifier: S, accuracy: f64) {
        self.rows.push(ComparisonRow {
            classifier: classifier.into(),
            accuracy,
        });
    }

    pub fn rows(&self) -> &[ComparisonRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The first row holding the maximum accuracy.
    pub fn best(&self) -> Option<&ComparisonRow> {
        self.rows.iter().fold(None, |best, row| match best {
            Some(b) if b.accuracy >= row.accuracy => Some(b),
            _ => Some(row),
        })
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for ComparisonTable {
    fn from_iter<T: IntoIterator<Item = (S, f64)>>(iter: T) -> Self {
        let mut table = Self::new();
        for (name, accuracy) in iter {
            table.push(name, accuracy);
        }
        table
    }
}

impl fmt::Display for ComparisonTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .rows
            .iter()
            .map(|r| r.classifier.len())
            .chain(std::iter::once("Classifier".len()))
            .max()
            .unwrap_or_default();
        writeln!(f, "   {:<width$}  {:>8}", "Classifier", "Accuracy", width = width)?;
        for (i, row) in self.rows.iter().enumerate() {
            writeln!(
                f,
                "{:<2} {:<width$}  {:>8.4}",
                i,
                row.classifier,
                row.accuracy,
                width = width
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetricsError {
    #[error("cannot evaluate an empty label table")]
    Empty,

    #[error("{predicted} predictions for {truth} true labels")]
    LengthMismatch { predicted: usize, truth: usize },
}
