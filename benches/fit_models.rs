use agegroup_bench::preprocess::{split_and_scale, SplitOptions};
use agegroup_bench::provider::SyntheticOptions;
use agegroup_bench::{
    Classifier, DecisionTreeClassifier, DecisionTreeOptions, GaussianNaiveBayes,
    KNearestNeighbors, ModelBank, RandomForestClassifier, RandomForestOptions,
    SupportVectorMachine, SvmOptions,
};
use criterion::{criterion_group, criterion_main, Criterion};

fn fit_each(c: &mut Criterion) {
    let dataset = SyntheticOptions::default().samples(500).generate().unwrap();
    let (partition, _) = split_and_scale(&dataset, &SplitOptions::default()).unwrap();
    let (x, y) = (&partition.train_features, &partition.train_labels);

    c.bench_function("random forest, n=400", |b| {
        b.iter(|| RandomForestClassifier::new(RandomForestOptions::default().seed(0)).fit(x, y))
    });
    c.bench_function("decision tree, n=400", |b| {
        b.iter(|| DecisionTreeClassifier::new(DecisionTreeOptions::default().seed(0)).fit(x, y))
    });
    c.bench_function("knn predict, n=400", |b| {
        let mut knn = KNearestNeighbors::new(7);
        knn.fit(x, y).unwrap();
        b.iter(|| knn.predict(&partition.test_features))
    });
    c.bench_function("naive bayes, n=400", |b| {
        b.iter(|| GaussianNaiveBayes::new().fit(x, y))
    });
    c.bench_function("svm, n=400", |b| {
        b.iter(|| SupportVectorMachine::new(SvmOptions::default()).fit(x, y))
    });
}

fn roster(c: &mut Criterion) {
    let dataset = SyntheticOptions::default().samples(500).generate().unwrap();
    let (partition, _) = split_and_scale(&dataset, &SplitOptions::default()).unwrap();

    let mut group = c.benchmark_group("roster");
    group.sample_size(10);
    group.bench_function("standard, n=500", |b| {
        b.iter(|| ModelBank::standard(42).run(&partition).unwrap())
    });
    group.finish();
}

criterion_group!(benches, fit_each, roster);
criterion_main!(benches);
