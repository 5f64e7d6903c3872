//! Exploratory analysis and a five-classifier benchmark for predicting the
//! NHANES age group (`senior` vs `non-senior`) from health measurements.
pub use classifier::{ClassWeight, Classifier, FitError};
pub use dataset::{AgeGroup, Dataset, Feature, FeatureTable, LabelTable};
pub use decision_tree::{DecisionTreeClassifier, DecisionTreeOptions};
pub use knn::KNearestNeighbors;
pub use model_bank::{ModelBank, ModelBankError, ModelFitError, ModelResult};
pub use naive_bayes::GaussianNaiveBayes;
pub use pipeline::{PipelineError, PipelineOptions, PipelineReport};
pub use random_forest::{RandomForestClassifier, RandomForestOptions};
pub use svm::{Gamma, SupportVectorMachine, SvmOptions};

pub mod dataset;
pub mod explore;
pub mod metrics;
pub mod model_bank;
pub mod pipeline;
pub mod preprocess;
pub mod provider;

mod classifier;
mod decision_tree;
mod functions;
mod knn;
mod naive_bayes;
mod random_forest;
mod svm;
mod table;
