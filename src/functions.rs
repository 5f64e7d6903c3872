use ordered_float::OrderedFloat;

pub fn mean(xs: impl Iterator<Item = f64>) -> f64 {
    let mut count = 0;
    let mut total = 0.0;
    for x in xs {
        count += 1;
        total += x;
    }
    assert_ne!(count, 0);
    total / count as f64
}

/// Mean and population standard deviation.
pub fn mean_and_stddev(xs: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let n = xs.clone().count() as f64;
    let m = mean(xs.clone());
    let s = (xs.map(|x| (x - m).powi(2)).sum::<f64>() / n).sqrt();
    (m, s)
}

/// Population variance.
pub fn variance(xs: impl Iterator<Item = f64> + Clone) -> f64 {
    let (_, s) = mean_and_stddev(xs);
    s * s
}

/// Sample (n - 1) standard deviation; `NaN` for fewer than two values.
pub fn sample_stddev(xs: impl Iterator<Item = f64> + Clone) -> f64 {
    let n = xs.clone().count();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(xs.clone());
    (xs.map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
}

pub fn sorted(xs: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut xs = xs.collect::<Vec<_>>();
    xs.sort_by_key(|&x| OrderedFloat(x));
    xs
}

/// Quantile of already sorted values with linear interpolation between ranks.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    assert!(!sorted.is_empty());
    let pos = q.max(0.0).min(1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Pearson correlation coefficient; `NaN` when either side is constant.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    debug_assert_eq!(xs.len(), ys.len());
    let mx = mean(xs.iter().copied());
    let my = mean(ys.iter().copied());
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (&x, &y) in xs.iter().zip(ys.iter()) {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx.sqrt() * syy.sqrt())).max(-1.0).min(1.0)
}

pub fn squared_distance(xs: &[f64], ys: &[f64]) -> f64 {
    xs.iter().zip(ys.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Index of the first maximum.
pub fn argmax(xs: &[f64]) -> usize {
    let mut best = 0;
    for (i, &x) in xs.iter().enumerate().skip(1) {
        if x > xs[best] {
            best = i;
        }
    }
    best
}
