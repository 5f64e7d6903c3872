//! Binary C-SVC with an RBF kernel.
//!
//! The dual problem is solved by SMO with second-order working set selection.
//! Probability estimates use Platt scaling fitted on cross-validated decision
//! values. `Senior` is the positive class.
use crate::classifier::{check_features, check_training_set, ClassWeight, Classifier, FitError};
use crate::dataset::{AgeGroup, FeatureTable, LabelTable};
use crate::functions;
use crate::table::CLASSES;
use rand::rngs::StdRng;
use rand::seq::SliceRandom as _;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

const TAU: f64 = 1e-12;
const PROBABILITY_FOLDS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gamma {
    /// `1 / (n_features * var(X))` over every value of the training matrix.
    Scale,
    Value(f64),
}

#[derive(Debug, Clone)]
pub struct SvmOptions {
    pub c: f64,
    pub gamma: Gamma,
    pub class_weight: ClassWeight,
    pub probability: bool,
    pub tolerance: f64,
    pub max_iter: usize,
    pub seed: Option<u64>,
}

impl SvmOptions {
    pub fn c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn gamma(mut self, gamma: Gamma) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.class_weight = class_weight;
        self
    }

    pub fn probability(mut self, enabled: bool) -> Self {
        self.probability = enabled;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Default for SvmOptions {
    fn default() -> Self {
        Self {
            c: 1.0,
            gamma: Gamma::Scale,
            class_weight: ClassWeight::Uniform,
            probability: false,
            tolerance: 1e-3,
            max_iter: 10_000_000,
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
struct Model {
    support_vectors: Vec<Vec<f64>>,
    /// `alpha_i * y_i` per support vector.
    coefficients: Vec<f64>,
    rho: f64,
    gamma: f64,
    platt: Option<(f64, f64)>,
    features_len: usize,
}

impl Model {
    fn decision_value(&self, xs: &[f64]) -> f64 {
        self.support_vectors
            .iter()
            .zip(self.coefficients.iter())
            .map(|(sv, c)| c * rbf(self.gamma, sv, xs))
            .sum::<f64>()
            - self.rho
    }
}

#[derive(Debug)]
pub struct SupportVectorMachine {
    options: SvmOptions,
    model: Option<Model>,
}

impl SupportVectorMachine {
    pub fn new(options: SvmOptions) -> Self {
        Self {
            options,
            model: None,
        }
    }

    fn fitted(&self, features: &FeatureTable) -> Result<&Model, FitError> {
        let model = self.model.as_ref().ok_or(FitError::NotFitted)?;
        check_features(features, model.features_len)?;
        Ok(model)
    }

    /// Signed distance to the separating surface; positive means `Senior`.
    pub fn decision_function(&self, features: &FeatureTable) -> Result<Vec<f64>, FitError> {
        let model = self.fitted(features)?;
        Ok(features.rows().map(|xs| model.decision_value(&xs)).collect())
    }

    /// Platt-scaled class probabilities. Requires `probability` at fit time.
    pub fn predict_proba(&self, features: &FeatureTable) -> Result<Vec<[f64; CLASSES]>, FitError> {
        let model = self.fitted(features)?;
        let (a, b) = model.platt.ok_or_else(|| {
            FitError::InvalidParameter("probability estimates were not enabled".to_owned())
        })?;
        Ok(features
            .rows()
            .map(|xs| {
                let p = sigmoid_predict(model.decision_value(&xs), a, b);
                [1.0 - p, p]
            })
            .collect())
    }

    pub fn support_vectors_len(&self) -> usize {
        self.model.as_ref().map_or(0, |m| m.support_vectors.len())
    }
}

impl Classifier for SupportVectorMachine {
    fn name(&self) -> &str {
        "Support Vector Machine"
    }

    fn fit(&mut self, features: &FeatureTable, labels: &LabelTable) -> Result<(), FitError> {
        if !(self.options.c > 0.0) {
            return Err(FitError::InvalidParameter("C must be positive".to_owned()));
        }
        let target = check_training_set(features, labels)?;
        let counts = labels.class_counts();
        if counts.iter().any(|&c| c == 0) {
            return Err(FitError::SingleClass);
        }

        let rows = features.rows().collect::<Vec<_>>();
        let gamma = match self.options.gamma {
            Gamma::Value(g) if g > 0.0 => g,
            Gamma::Value(_) => {
                return Err(FitError::InvalidParameter("gamma must be positive".to_owned()))
            }
            Gamma::Scale => {
                let var = functions::variance(rows.iter().flatten().copied());
                if var > 0.0 {
                    1.0 / (features.features_len() as f64 * var)
                } else {
                    1.0
                }
            }
        };

        let y = target
            .iter()
            .map(|&t| if t == AgeGroup::Senior.index() { 1.0 } else { -1.0 })
            .collect::<Vec<_>>();
        let class_weights = self.options.class_weight.class_weights(labels);
        let upper = target
            .iter()
            .map(|&t| self.options.c * class_weights[t])
            .collect::<Vec<_>>();

        let gram = Gram::new(&rows, gamma);
        let all = (0..rows.len()).collect::<Vec<_>>();
        let solution = self.solve(&gram, &all, &y, &upper);
        debug!(
            iterations = solution.iterations,
            support_vectors = solution.alpha.iter().filter(|&&a| a > 0.0).count(),
            "SMO finished"
        );

        let platt = if self.options.probability {
            let seed = self.options.seed.unwrap_or_else(|| rand::thread_rng().gen());
            let decisions = self.cross_validated_decisions(&gram, &y, &upper, seed);
            Some(sigmoid_train(&decisions, &y))
        } else {
            None
        };

        let mut support_vectors = Vec::new();
        let mut coefficients = Vec::new();
        for (i, &alpha) in solution.alpha.iter().enumerate() {
            if alpha > 0.0 {
                support_vectors.push(rows[i].clone());
                coefficients.push(alpha * y[i]);
            }
        }
        self.model = Some(Model {
            support_vectors,
            coefficients,
            rho: solution.rho,
            gamma,
            platt,
            features_len: features.features_len(),
        });
        Ok(())
    }

    fn predict(&self, features: &FeatureTable) -> Result<LabelTable, FitError> {
        Ok(self
            .decision_function(features)?
            .into_iter()
            .map(|d| {
                if d > 0.0 {
                    AgeGroup::Senior
                } else {
                    AgeGroup::NonSenior
                }
            })
            .collect())
    }
}

impl SupportVectorMachine {
    fn solve(&self, gram: &Gram, indices: &[usize], y: &[f64], upper: &[f64]) -> Solution {
        let problem = Problem {
            gram,
            indices,
            y: indices.iter().map(|&i| y[i]).collect(),
            upper: indices.iter().map(|&i| upper[i]).collect(),
        };
        let solution = problem.solve(self.options.tolerance, self.options.max_iter);
        if solution.iterations >= self.options.max_iter {
            warn!(
                max_iter = self.options.max_iter,
                "SMO reached the iteration limit before converging"
            );
        }
        solution
    }

    /// Decision values for every training row, each computed by a model that
    /// did not see that row.
    fn cross_validated_decisions(
        &self,
        gram: &Gram,
        y: &[f64],
        upper: &[f64],
        seed: u64,
    ) -> Vec<f64> {
        let n = y.len();
        let mut perm = (0..n).collect::<Vec<_>>();
        perm.shuffle(&mut StdRng::seed_from_u64(seed));

        let mut decisions = vec![0.0; n];
        for fold in 0..PROBABILITY_FOLDS {
            let begin = fold * n / PROBABILITY_FOLDS;
            let end = (fold + 1) * n / PROBABILITY_FOLDS;
            let train = perm[..begin]
                .iter()
                .chain(perm[end..].iter())
                .copied()
                .collect::<Vec<_>>();

            let positives = train.iter().filter(|&&i| y[i] > 0.0).count();
            let negatives = train.len() - positives;
            if positives == 0 || negatives == 0 {
                let d = if positives > 0 {
                    1.0
                } else if negatives > 0 {
                    -1.0
                } else {
                    0.0
                };
                for &i in &perm[begin..end] {
                    decisions[i] = d;
                }
                continue;
            }

            let solution = self.solve(gram, &train, y, upper);
            for &i in &perm[begin..end] {
                decisions[i] = train
                    .iter()
                    .zip(solution.alpha.iter())
                    .filter(|(_, &a)| a > 0.0)
                    .map(|(&j, a)| a * y[j] * gram.get(j, i))
                    .sum::<f64>()
                    - solution.rho;
            }
        }
        decisions
    }
}

fn rbf(gamma: f64, xs: &[f64], ys: &[f64]) -> f64 {
    (-gamma * functions::squared_distance(xs, ys)).exp()
}

/// Precomputed kernel matrix over the training rows.
#[derive(Debug)]
struct Gram {
    n: usize,
    values: Vec<f64>,
}

impl Gram {
    fn new(rows: &[Vec<f64>], gamma: f64) -> Self {
        let n = rows.len();
        let mut values = vec![0.0; n * n];
        for i in 0..n {
            values[i * n + i] = 1.0;
            for j in 0..i {
                let k = rbf(gamma, &rows[i], &rows[j]);
                values[i * n + j] = k;
                values[j * n + i] = k;
            }
        }
        Self { n, values }
    }

    fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }
}

#[derive(Debug)]
struct Solution {
    alpha: Vec<f64>,
    rho: f64,
    iterations: usize,
}

/// Dual problem over a subset of the Gram matrix rows.
struct Problem<'a> {
    gram: &'a Gram,
    indices: &'a [usize],
    y: Vec<f64>,
    upper: Vec<f64>,
}

impl Problem<'_> {
    fn k(&self, a: usize, b: usize) -> f64 {
        self.gram.get(self.indices[a], self.indices[b])
    }

    fn q(&self, a: usize, b: usize) -> f64 {
        self.y[a] * self.y[b] * self.k(a, b)
    }

    fn solve(&self, tolerance: f64, max_iter: usize) -> Solution {
        let n = self.y.len();
        let mut alpha = vec![0.0; n];
        // Gradient of 0.5 a'Qa - e'a.
        let mut grad = vec![-1.0; n];

        let mut iterations = 0;
        while iterations < max_iter {
            let (i, j) = match self.select_working_set(&alpha, &grad, tolerance) {
                Some(pair) => pair,
                None => break,
            };
            iterations += 1;

            let (old_i, old_j) = (alpha[i], alpha[j]);
            self.update_pair(&mut alpha, &grad, i, j);

            let delta_i = alpha[i] - old_i;
            let delta_j = alpha[j] - old_j;
            for (t, g) in grad.iter_mut().enumerate() {
                *g += self.q(i, t) * delta_i + self.q(j, t) * delta_j;
            }
        }

        let rho = self.rho(&alpha, &grad);
        Solution {
            alpha,
            rho,
            iterations,
        }
    }

    fn is_upper_bound(&self, alpha: &[f64], t: usize) -> bool {
        alpha[t] >= self.upper[t]
    }

    fn is_lower_bound(alpha: &[f64], t: usize) -> bool {
        alpha[t] <= 0.0
    }

    fn select_working_set(
        &self,
        alpha: &[f64],
        grad: &[f64],
        tolerance: f64,
    ) -> Option<(usize, usize)> {
        let n = self.y.len();

        let mut gmax = f64::NEG_INFINITY;
        let mut gmax_index = None;
        for t in 0..n {
            let candidate = if self.y[t] > 0.0 {
                (!self.is_upper_bound(alpha, t)).then(|| -grad[t])
            } else {
                (!Self::is_lower_bound(alpha, t)).then(|| grad[t])
            };
            if let Some(v) = candidate {
                if v >= gmax {
                    gmax = v;
                    gmax_index = Some(t);
                }
            }
        }
        let i = gmax_index?;

        let mut gmax2 = f64::NEG_INFINITY;
        let mut best = None;
        let mut obj_diff_min = f64::INFINITY;
        for t in 0..n {
            let (eligible, yg) = if self.y[t] > 0.0 {
                (!Self::is_lower_bound(alpha, t), grad[t])
            } else {
                (!self.is_upper_bound(alpha, t), -grad[t])
            };
            if !eligible {
                continue;
            }
            gmax2 = gmax2.max(yg);

            let grad_diff = gmax + yg;
            if grad_diff > 0.0 {
                let mut quad = self.k(i, i) + self.k(t, t) - 2.0 * self.k(i, t);
                if quad <= 0.0 {
                    quad = TAU;
                }
                let obj_diff = -(grad_diff * grad_diff) / quad;
                if obj_diff <= obj_diff_min {
                    obj_diff_min = obj_diff;
                    best = Some(t);
                }
            }
        }

        if gmax + gmax2 < tolerance {
            return None;
        }
        best.map(|j| (i, j))
    }

    fn update_pair(&self, alpha: &mut [f64], grad: &[f64], i: usize, j: usize) {
        let (c_i, c_j) = (self.upper[i], self.upper[j]);
        let mut quad = self.k(i, i) + self.k(j, j) - 2.0 * self.k(i, j);
        if quad <= 0.0 {
            quad = TAU;
        }

        if self.y[i] != self.y[j] {
            let delta = (-grad[i] - grad[j]) / quad;
            let diff = alpha[i] - alpha[j];
            alpha[i] += delta;
            alpha[j] += delta;

            if diff > 0.0 {
                if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = diff;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = -diff;
            }
            if diff > c_i - c_j {
                if alpha[i] > c_i {
                    alpha[i] = c_i;
                    alpha[j] = c_i - diff;
                }
            } else if alpha[j] > c_j {
                alpha[j] = c_j;
                alpha[i] = c_j + diff;
            }
        } else {
            let delta = (grad[i] - grad[j]) / quad;
            let sum = alpha[i] + alpha[j];
            alpha[i] -= delta;
            alpha[j] += delta;

            if sum > c_i {
                if alpha[i] > c_i {
                    alpha[i] = c_i;
                    alpha[j] = sum - c_i;
                }
            } else if alpha[j] < 0.0 {
                alpha[j] = 0.0;
                alpha[i] = sum;
            }
            if sum > c_j {
                if alpha[j] > c_j {
                    alpha[j] = c_j;
                    alpha[i] = sum - c_j;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = sum;
            }
        }
    }

    fn rho(&self, alpha: &[f64], grad: &[f64]) -> f64 {
        let mut free = 0;
        let mut sum_free = 0.0;
        let mut ub = f64::INFINITY;
        let mut lb = f64::NEG_INFINITY;
        for t in 0..self.y.len() {
            let yg = self.y[t] * grad[t];
            if self.is_upper_bound(alpha, t) {
                if self.y[t] < 0.0 {
                    ub = ub.min(yg);
                } else {
                    lb = lb.max(yg);
                }
            } else if Self::is_lower_bound(alpha, t) {
                if self.y[t] > 0.0 {
                    ub = ub.min(yg);
                } else {
                    lb = lb.max(yg);
                }
            } else {
                free += 1;
                sum_free += yg;
            }
        }
        if free > 0 {
            sum_free / free as f64
        } else {
            (ub + lb) / 2.0
        }
    }
}

/// Fits `P(y = +1 | f) = 1 / (1 + exp(A f + B))` by Newton's method with
/// backtracking line search, using regularized targets.
fn sigmoid_train(decisions: &[f64], y: &[f64]) -> (f64, f64) {
    const MAX_ITER: usize = 100;
    const MIN_STEP: f64 = 1e-10;
    const SIGMA: f64 = 1e-12;
    const EPS: f64 = 1e-5;

    let prior1 = y.iter().filter(|&&v| v > 0.0).count() as f64;
    let prior0 = y.len() as f64 - prior1;
    let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
    let lo_target = 1.0 / (prior0 + 2.0);
    let targets = y
        .iter()
        .map(|&v| if v > 0.0 { hi_target } else { lo_target })
        .collect::<Vec<_>>();

    let objective = |a: f64, b: f64| {
        decisions
            .iter()
            .zip(targets.iter())
            .map(|(&d, &t)| {
                let f = d * a + b;
                if f >= 0.0 {
                    t * f + (-f).exp().ln_1p()
                } else {
                    (t - 1.0) * f + f.exp().ln_1p()
                }
            })
            .sum::<f64>()
    };

    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = objective(a, b);

    for _ in 0..MAX_ITER {
        let mut h11 = SIGMA;
        let mut h22 = SIGMA;
        let mut h21 = 0.0;
        let mut g1 = 0.0;
        let mut g2 = 0.0;
        for (&d, &t) in decisions.iter().zip(targets.iter()) {
            let f = d * a + b;
            let (p, q) = if f >= 0.0 {
                let e = (-f).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = f.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let d2 = p * q;
            h11 += d * d * d2;
            h22 += d2;
            h21 += d * d2;
            let d1 = t - p;
            g1 += d * d1;
            g2 += d1;
        }
        if g1.abs() < EPS && g2.abs() < EPS {
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let da = -(h22 * g1 - h21 * g2) / det;
        let db = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * da + g2 * db;

        let mut step = 1.0;
        while step >= MIN_STEP {
            let new_a = a + step * da;
            let new_b = b + step * db;
            let new_f = objective(new_a, new_b);
            if new_f < fval + 0.0001 * step * gd {
                a = new_a;
                b = new_b;
                fval = new_f;
                break;
            }
            step /= 2.0;
        }
        if step < MIN_STEP {
            debug!("Platt scaling line search failed");
            break;
        }
    }
    (a, b)
}

fn sigmoid_predict(decision: f64, a: f64, b: f64) -> f64 {
    let f = decision * a + b;
    if f >= 0.0 {
        (-f).exp() / (1.0 + (-f).exp())
    } else {
        1.0 / (1.0 + f.exp())
    }
}
