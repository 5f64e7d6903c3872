//! Dataset sources: a delimited file or a seeded synthetic generator.
use crate::dataset::{
    schema_names, AgeGroup, Dataset, Feature, FeatureTable, LabelTable, TableError,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Normal};
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const LABEL_COLUMN: &str = "age_group";
const AGE_COLUMNS: [&str; 2] = ["age", "RIDAGEYR"];

/// Where the dataset comes from.
#[derive(Debug, Clone)]
pub enum DataSource {
    Csv { path: PathBuf, delimiter: u8 },
    Synthetic(SyntheticOptions),
}

impl DataSource {
    pub fn csv<P: Into<PathBuf>>(path: P) -> Self {
        DataSource::Csv {
            path: path.into(),
            delimiter: b',',
        }
    }

    pub fn load(&self) -> Result<Dataset, DataLoadError> {
        match self {
            DataSource::Csv { path, delimiter } => read_csv_file(path, *delimiter),
            DataSource::Synthetic(options) => options.generate(),
        }
    }
}

impl Default for DataSource {
    fn default() -> Self {
        DataSource::Synthetic(SyntheticOptions::default())
    }
}

pub fn read_csv_file(path: &Path, delimiter: u8) -> Result<Dataset, DataLoadError> {
    info!(path = %path.display(), "loading dataset");
    let file = std::fs::File::open(path).map_err(|e| DataLoadError::Open {
        path: path.to_owned(),
        source: e,
    })?;
    read_csv(file, delimiter)
}

/// Reads a delimited table with a header row.
///
/// Feature columns are located by header name. The label comes from an
/// `age_group` column when present, otherwise it is derived from a raw age
/// column.
pub fn read_csv<R: Read>(reader: R, delimiter: u8) -> Result<Dataset, DataLoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let find = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

    let mut names = Vec::with_capacity(Feature::ALL.len());
    let mut feature_indices = Vec::with_capacity(Feature::ALL.len());
    for feature in Feature::ALL.iter() {
        let (index, name) = feature
            .aliases()
            .iter()
            .find_map(|alias| find(alias).map(|i| (i, *alias)))
            .ok_or_else(|| DataLoadError::MissingColumn(feature.code().to_owned()))?;
        names.push(name.to_owned());
        feature_indices.push(index);
    }

    let label_source = if let Some(i) = find(LABEL_COLUMN) {
        LabelSource::Label(i)
    } else if let Some(i) = AGE_COLUMNS.iter().find_map(|name| find(name)) {
        debug!(column = &headers[i], "deriving age group from raw age");
        LabelSource::Age(i)
    } else {
        return Err(DataLoadError::MissingColumn(LABEL_COLUMN.to_owned()));
    };

    let mut columns = vec![Vec::new(); names.len()];
    let mut labels = Vec::new();
    for (i, record) in csv_reader.records().enumerate() {
        let record = record?;
        // Header is line 1.
        let line = i + 2;
        for ((column, &index), name) in columns.iter_mut().zip(&feature_indices).zip(&names) {
            column.push(parse_value(&record, index, line, name)?);
        }

        let label = match label_source {
            LabelSource::Label(index) => {
                let text = record.get(index).unwrap_or_default();
                text.parse::<AgeGroup>()
                    .map_err(|text| DataLoadError::InvalidLabel { line, text })?
            }
            LabelSource::Age(index) => {
                AgeGroup::from_age(parse_value(&record, index, line, &headers[index])?)
            }
        };
        labels.push(label);
    }

    if labels.is_empty() {
        return Err(DataLoadError::Empty);
    }

    let features = FeatureTable::new(names, columns)?;
    let dataset = Dataset::new(features, LabelTable::new(labels))?;
    info!(rows = dataset.rows_len(), "dataset loaded");
    Ok(dataset)
}

#[derive(Debug, Clone, Copy)]
enum LabelSource {
    Label(usize),
    Age(usize),
}

fn parse_value(
    record: &csv::StringRecord,
    index: usize,
    line: usize,
    column: &str,
) -> Result<f64, DataLoadError> {
    let text = record.get(index).unwrap_or_default();
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(DataLoadError::InvalidValue {
            line,
            column: column.to_owned(),
            text: text.to_owned(),
        }),
    }
}

/// Parameters of the synthetic NHANES-like generator.
#[derive(Debug, Clone)]
pub struct SyntheticOptions {
    pub samples: usize,
    pub seed: u64,
}

impl SyntheticOptions {
    pub fn samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Draws the feature columns one after another in schema order, then the
    /// labels, all from one seeded generator.
    pub fn generate(&self) -> Result<Dataset, DataLoadError> {
        if self.samples == 0 {
            return Err(DataLoadError::Empty);
        }
        info!(
            samples = self.samples,
            seed = self.seed,
            "generating synthetic dataset"
        );

        let mut rng = StdRng::seed_from_u64(self.seed);
        let n = self.samples;

        let gender = bernoulli(&mut rng, n, 0.5135);
        let activity = bernoulli(&mut rng, n, 0.178);
        let bmi = normal(&mut rng, n, 28.5, 6.5)?;
        let glucose = normal(&mut rng, n, 100.0, 25.0)?;
        let diabetes = bernoulli(&mut rng, n, 0.009);
        let glycohemoglobin = normal(&mut rng, n, 5.5, 1.0)?;
        let exp: Exp<f64> =
            Exp::new(1.0 / 12.0).map_err(|e| DataLoadError::Distribution(e.to_string()))?;
        let insulin = (0..n)
            .map(|_| exp.sample(&mut rng).max(0.0).min(100.0))
            .collect::<Vec<_>>();

        let labels = (0..n)
            .map(|_| {
                if rng.gen_bool(0.156) {
                    AgeGroup::Senior
                } else {
                    AgeGroup::NonSenior
                }
            })
            .collect::<Vec<_>>();

        let mut names = schema_names();
        names[Feature::GlucoseTolerance.index()] = "LBXGH".to_owned();
        let features = FeatureTable::new(
            names,
            vec![
                gender,
                activity,
                bmi,
                glucose,
                diabetes,
                glycohemoglobin,
                insulin,
            ],
        )?;
        Ok(Dataset::new(features, LabelTable::new(labels))?)
    }
}

impl Default for SyntheticOptions {
    fn default() -> Self {
        Self {
            samples: 2278,
            seed: 42,
        }
    }
}

fn bernoulli<R: Rng + ?Sized>(rng: &mut R, n: usize, p: f64) -> Vec<f64> {
    (0..n)
        .map(|_| if rng.gen_bool(p) { 1.0 } else { 0.0 })
        .collect()
}

fn normal<R: Rng + ?Sized>(
    rng: &mut R,
    n: usize,
    mean: f64,
    stddev: f64,
) -> Result<Vec<f64>, DataLoadError> {
    let dist = Normal::new(mean, stddev).map_err(|e| DataLoadError::Distribution(e.to_string()))?;
    Ok((0..n).map(|_| dist.sample(&mut *rng)).collect())
}

#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("cannot open {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed delimited input")]
    Csv(#[from] csv::Error),

    #[error("required column {0:?} is missing")]
    MissingColumn(String),

    #[error("line {line}: column {column:?} has invalid value {text:?}")]
    InvalidValue {
        line: usize,
        column: String,
        text: String,
    },

    #[error("line {line}: unknown age group {text:?}")]
    InvalidLabel { line: usize, text: String },

    #[error("dataset has no rows")]
    Empty,

    #[error("invalid distribution parameters: {0}")]
    Distribution(String),

    #[error(transparent)]
    Table(#[from] TableError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn synthetic_is_deterministic() -> Result<(), anyhow::Error> {
        let a = SyntheticOptions::default().samples(300).generate()?;
        let b = SyntheticOptions::default().samples(300).generate()?;
        assert_eq!(a.features(), b.features());
        assert_eq!(a.labels(), b.labels());
        assert_eq!(a.rows_len(), 300);
        assert_eq!(a.features().features_len(), 7);
        assert_eq!(a.features().names()[5], "LBXGH");

        let c = SyntheticOptions::default().samples(300).seed(7).generate()?;
        assert_ne!(a.features(), c.features());
        Ok(())
    }

    #[test]
    fn synthetic_respects_distributions() -> Result<(), anyhow::Error> {
        let dataset = SyntheticOptions::default().generate()?;
        let features = dataset.features();
        assert_eq!(dataset.rows_len(), 2278);

        for feature in [Feature::Gender, Feature::PhysicalActivity, Feature::Diabetes] {
            assert!(features
                .column(feature.index())
                .iter()
                .all(|&x| x == 0.0 || x == 1.0));
        }
        let insulin = features.column(Feature::Insulin.index());
        assert!(insulin.iter().all(|&x| (0.0..=100.0).contains(&x)));

        let bmi_mean = crate::functions::mean(
            features.column(Feature::BodyMassIndex.index()).iter().copied(),
        );
        assert!((bmi_mean - 28.5).abs() < 1.0);

        let seniors = dataset.labels().class_counts()[AgeGroup::Senior.index()] as f64 / 2278.0;
        assert!((seniors - 0.156).abs() < 0.03);
        Ok(())
    }

    #[test]
    fn zero_samples_fails() {
        assert!(matches!(
            SyntheticOptions::default().samples(0).generate(),
            Err(DataLoadError::Empty)
        ));
    }

    #[test]
    fn reads_label_column() -> Result<(), anyhow::Error> {
        let input = "\
SEQN,age_group,RIDAGEYR,RIAGENDR,PAQ605,BMXBMI,LBXGLU,DIQ010,LBXGLT,LBXIN
73564.0,Adult,61.0,2.0,2.0,35.7,110.0,2.0,150.0,14.91
73568.0,Senior,66.0,2.0,2.0,20.3,89.0,2.0,80.0,3.85
";
        let dataset = read_csv(input.as_bytes(), b',')?;
        assert_eq!(dataset.rows_len(), 2);
        assert_eq!(
            dataset.labels().labels(),
            &[AgeGroup::NonSenior, AgeGroup::Senior]
        );
        assert_eq!(dataset.features().names()[5], "LBXGLT");
        assert_eq!(dataset.features().row(1), vec![2.0, 2.0, 20.3, 89.0, 2.0, 80.0, 3.85]);
        Ok(())
    }

    #[test]
    fn derives_label_from_age() -> Result<(), anyhow::Error> {
        let input = "\
age;LBXIN;LBXGH;DIQ010;LBXGLU;BMXBMI;PAQ605;RIAGENDR
65;1;5.1;0;90;22.0;1;0
70;2;5.9;1;120;31.5;0;1
";
        let dataset = read_csv(input.as_bytes(), b';')?;
        assert_eq!(
            dataset.labels().labels(),
            &[AgeGroup::NonSenior, AgeGroup::Senior]
        );
        assert_eq!(dataset.features().row(0), vec![0.0, 1.0, 22.0, 90.0, 0.0, 5.1, 1.0]);
        Ok(())
    }

    #[test]
    fn reports_malformed_input() {
        let missing = "RIAGENDR,PAQ605,BMXBMI,LBXGLU,DIQ010,LBXGLT,age\n1,0,20,90,0,100,30\n";
        assert!(matches!(
            read_csv(missing.as_bytes(), b','),
            Err(DataLoadError::MissingColumn(c)) if c == "LBXIN"
        ));

        let bad_value =
            "RIAGENDR,PAQ605,BMXBMI,LBXGLU,DIQ010,LBXGLT,LBXIN,age\n1,0,x,90,0,100,3,30\n";
        assert!(matches!(
            read_csv(bad_value.as_bytes(), b','),
            Err(DataLoadError::InvalidValue { line: 2, ref column, .. }) if column == "BMXBMI"
        ));

        let bad_label =
            "RIAGENDR,PAQ605,BMXBMI,LBXGLU,DIQ010,LBXGLT,LBXIN,age_group\n1,0,1,90,0,100,3,kid\n";
        assert!(matches!(
            read_csv(bad_label.as_bytes(), b','),
            Err(DataLoadError::InvalidLabel { line: 2, .. })
        ));

        let ragged = "RIAGENDR,PAQ605,BMXBMI,LBXGLU,DIQ010,LBXGLT,LBXIN,age\n\
                      1,0,20,90,0,100,3,30\n\
                      1,0,20\n";
        assert!(matches!(
            read_csv(ragged.as_bytes(), b','),
            Err(DataLoadError::Csv(_))
        ));

        let infinite =
            "RIAGENDR,PAQ605,BMXBMI,LBXGLU,DIQ010,LBXGLT,LBXIN,age\n1,0,inf,90,0,100,3,30\n";
        assert!(matches!(
            read_csv(infinite.as_bytes(), b','),
            Err(DataLoadError::InvalidValue { line: 2, ref column, ref text })
                if column == "BMXBMI" && text == "inf"
        ));

        let nan_age =
            "RIAGENDR,PAQ605,BMXBMI,LBXGLU,DIQ010,LBXGLT,LBXIN,age\n1,0,20,90,0,100,3,NaN\n";
        assert!(matches!(
            read_csv(nan_age.as_bytes(), b','),
            Err(DataLoadError::InvalidValue { ref column, .. }) if column == "age"
        ));

        let empty = "RIAGENDR,PAQ605,BMXBMI,LBXGLU,DIQ010,LBXGLT,LBXIN,age_group\n";
        assert!(matches!(
            read_csv(empty.as_bytes(), b','),
            Err(DataLoadError::Empty)
        ));
    }

    #[test]
    fn loads_from_file() -> Result<(), anyhow::Error> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "RIAGENDR,PAQ605,BMXBMI,LBXGLU,DIQ010,LBXGLT,LBXIN,age")?;
        writeln!(file, "1,0,25.0,95,0,110,8.0,80")?;
        let dataset = DataSource::csv(file.path()).load()?;
        assert_eq!(dataset.labels().labels(), &[AgeGroup::Senior]);

        let missing = DataSource::csv("/nonexistent/nhanes.csv").load();
        assert!(matches!(missing, Err(DataLoadError::Open { .. })));
        Ok(())
    }
}
