//! The fixed roster of classifiers and the fit/predict/evaluate loop.
use crate::classifier::{ClassWeight, Classifier, FitError};
use crate::dataset::LabelTable;
use crate::decision_tree::{DecisionTreeClassifier, DecisionTreeOptions};
use crate::knn::KNearestNeighbors;
use crate::metrics::{self, ClassificationReport, ComparisonTable, MetricsError};
use crate::naive_bayes::GaussianNaiveBayes;
use crate::preprocess::Partition;
use crate::random_forest::{RandomForestClassifier, RandomForestOptions};
use crate::svm::{SupportVectorMachine, SvmOptions};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

pub const KNN_NEIGHBORS: usize = 7;

#[derive(Debug)]
pub struct ModelResult {
    pub name: String,
    pub model: Box<dyn Classifier>,
    pub predictions: LabelTable,
    pub accuracy: f64,
    pub report: ClassificationReport,
}

/// Classifiers evaluated in insertion order.
#[derive(Debug, Default)]
pub struct ModelBank {
    models: Vec<Box<dyn Classifier>>,
}

impl ModelBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Random forest, decision tree, k-nearest neighbours, Gaussian naive
    /// Bayes and an RBF support vector machine, with every seeded model using
    /// `seed`.
    pub fn standard(seed: u64) -> Self {
        let forest = RandomForestOptions::default()
            .class_weight(ClassWeight::Balanced)
            .seed(seed);
        let tree = DecisionTreeOptions::default()
            .class_weight(ClassWeight::Balanced)
            .seed(seed);
        let svm = SvmOptions::default()
            .class_weight(ClassWeight::Balanced)
            .probability(true)
            .seed(seed);

        Self::new()
            .with(RandomForestClassifier::new(forest))
            .with(DecisionTreeClassifier::new(tree))
            .with(KNearestNeighbors::new(KNN_NEIGHBORS))
            .with(GaussianNaiveBayes::new())
            .with(SupportVectorMachine::new(svm))
    }

    pub fn with<C: Classifier + 'static>(mut self, model: C) -> Self {
        self.models.push(Box::new(model));
        self
    }

    pub fn names(&self) -> impl '_ + Iterator<Item = &str> {
        self.models.iter().map(|m| m.name())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Fits every model on the training side and scores it on the test side.
    /// The first failure stops the run.
    pub fn run(self, partition: &Partition) -> Result<Vec<ModelResult>, ModelBankError> {
        let mut results = Vec::with_capacity(self.models.len());
        for mut model in self.models {
            let name = model.name().to_owned();
            info!(model = %name, "training");
            let start = Instant::now();

            let fit_error = |source| ModelFitError {
                model: name.clone(),
                source,
            };
            model
                .fit(&partition.train_features, &partition.train_labels)
                .map_err(fit_error)?;
            let predictions = model.predict(&partition.test_features).map_err(fit_error)?;
            debug!(model = %name, elapsed = ?start.elapsed(), "fitted and predicted");

            let accuracy = metrics::accuracy(&predictions, &partition.test_labels)?;
            let report = ClassificationReport::new(&predictions, &partition.test_labels)?;
            info!(model = %name, accuracy, "evaluated");
            results.push(ModelResult {
                name,
                model,
                predictions,
                accuracy,
                report,
            });
        }
        Ok(results)
    }
}

impl ComparisonTable {
    pub fn from_results(results: &[ModelResult]) -> Self {
        results
            .iter()
            .map(|r| (r.name.as_str(), r.accuracy))
            .collect()
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("failed to fit {model}")]
pub struct ModelFitError {
    pub model: String,
    #[source]
    pub source: FitError,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelBankError {
    #[error(transparent)]
    Fit(#[from] ModelFitError),

    #[error("failed to evaluate predictions")]
    Metrics(#[from] MetricsError),
}
