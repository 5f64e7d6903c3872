use agegroup_bench::metrics::ComparisonTable;
use agegroup_bench::pipeline::{self, PipelineOptions};
use agegroup_bench::preprocess::{split_and_scale, SplitOptions};
use agegroup_bench::provider::{read_csv_file, DataSource, SyntheticOptions};
use agegroup_bench::ModelBank;
use std::io::Write as _;

#[test]
fn synthetic_benchmark_end_to_end() -> Result<(), anyhow::Error> {
    let mut out = Vec::new();
    let report = pipeline::run(&PipelineOptions::default(), &mut out)?;
    let text = String::from_utf8(out)?;

    assert_eq!(report.rows, 2278);
    assert_eq!(report.train_rows, 1822);
    assert_eq!(report.test_rows, 456);
    assert_eq!(report.results.len(), 5);
    assert_eq!(report.comparison.len(), 5);

    for r in &report.results {
        assert!((0.0..=1.0).contains(&r.accuracy));
        assert_eq!(r.report.support(), 456);
        assert!(text.contains(&format!("Accuracy: {:.4}", r.accuracy)));
    }

    let max = report
        .results
        .iter()
        .map(|r| r.accuracy)
        .fold(f64::NEG_INFINITY, f64::max);
    let best = report.comparison.best().map(|b| b.accuracy);
    assert_eq!(best, Some(max));
    Ok(())
}

#[test]
fn seeded_runs_are_reproducible() -> Result<(), anyhow::Error> {
    let dataset = SyntheticOptions::default().samples(300).seed(7).generate()?;
    let options = SplitOptions::default().seed(7);
    let (a, scaling_a) = split_and_scale(&dataset, &options)?;
    let (b, scaling_b) = split_and_scale(&dataset, &options)?;
    assert_eq!(a.test_rows, b.test_rows);
    assert_eq!(scaling_a, scaling_b);

    let first = ModelBank::standard(7).run(&a)?;
    let second = ModelBank::standard(7).run(&b)?;
    let first = ComparisonTable::from_results(&first);
    let second = ComparisonTable::from_results(&second);
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn csv_dataset_runs_through_the_pipeline() -> Result<(), anyhow::Error> {
    let synthetic = SyntheticOptions::default().samples(150).generate()?;
    let mut file = tempfile::NamedTempFile::new()?;
    // Columns out of schema order, with the glycohemoglobin header and a raw age.
    writeln!(file, "LBXIN,RIAGENDR,PAQ605,BMXBMI,LBXGLU,DIQ010,LBXGH,RIDAGEYR")?;
    for (i, row) in synthetic.features().rows().enumerate() {
        let age = if synthetic.labels().labels()[i].as_str() == "senior" {
            70
        } else {
            40
        };
        writeln!(
            file,
            "{},{},{},{},{},{},{},{}",
            row[6], row[0], row[1], row[2], row[3], row[4], row[5], age
        )?;
    }
    file.flush()?;

    let loaded = read_csv_file(file.path(), b',')?;
    assert_eq!(loaded.labels(), synthetic.labels());
    assert_eq!(loaded.features().column(2), synthetic.features().column(2));

    let options = PipelineOptions::default()
        .source(DataSource::csv(file.path()))
        .charts(false);
    let report = pipeline::run(&options, std::io::sink())?;
    assert_eq!(report.rows, 150);
    assert_eq!(report.test_rows, 30);
    Ok(())
}
