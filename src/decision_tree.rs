use crate::classifier::{check_features, check_training_set, ClassWeight, Classifier, FitError};
use crate::dataset::{AgeGroup, FeatureTable, LabelTable};
use crate::functions;
use crate::table::{Table, CLASSES};
use rand::rngs::StdRng;
use rand::seq::SliceRandom as _;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct DecisionTreeOptions {
    pub class_weight: ClassWeight,
    pub max_features: Option<usize>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub seed: Option<u64>,
}

impl DecisionTreeOptions {
    pub fn class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.class_weight = class_weight;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub(crate) fn growth(&self) -> TreeGrowth {
        TreeGrowth {
            max_features: self.max_features,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split.max(2),
        }
    }
}

impl Default for DecisionTreeOptions {
    fn default() -> Self {
        Self {
            class_weight: ClassWeight::Uniform,
            max_features: None,
            max_depth: None,
            min_samples_split: 2,
            seed: None,
        }
    }
}

/// CART classifier grown on weighted Gini impurity.
#[derive(Debug)]
pub struct DecisionTreeClassifier {
    options: DecisionTreeOptions,
    fitted: Option<(Tree, usize)>,
}

impl DecisionTreeClassifier {
    pub fn new(options: DecisionTreeOptions) -> Self {
        Self {
            options,
            fitted: None,
        }
    }

    pub fn predict_proba(&self, features: &FeatureTable) -> Result<Vec<[f64; CLASSES]>, FitError> {
        let (tree, features_len) = self.fitted.as_ref().ok_or(FitError::NotFitted)?;
        check_features(features, *features_len)?;
        Ok(features.rows().map(|xs| tree.predict_proba(&xs)).collect())
    }

    pub fn depth(&self) -> Option<usize> {
        self.fitted.as_ref().map(|(tree, _)| tree.depth())
    }
}

impl Classifier for DecisionTreeClassifier {
    fn name(&self) -> &str {
        "Decision Tree"
    }

    fn fit(&mut self, features: &FeatureTable, labels: &LabelTable) -> Result<(), FitError> {
        let target = check_training_set(features, labels)?;
        let weights = self.options.class_weight.sample_weights(labels);
        let table = Table::new(
            features.columns().iter().map(Vec::as_slice).collect(),
            &target,
            &weights,
        )?;

        let seed = self.options.seed.unwrap_or_else(|| rand::thread_rng().gen());
        let mut rng = StdRng::seed_from_u64(seed);
        let tree = Tree::fit(&mut rng, table, self.options.growth());
        self.fitted = Some((tree, features.features_len()));
        Ok(())
    }

    fn predict(&self, features: &FeatureTable) -> Result<LabelTable, FitError> {
        Ok(self
            .predict_proba(features)?
            .iter()
            .map(|p| to_label(p))
            .collect())
    }
}

pub(crate) fn to_label(distribution: &[f64; CLASSES]) -> AgeGroup {
    AgeGroup::from_index(functions::argmax(distribution)).expect("never fails")
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeGrowth {
    pub max_features: Option<usize>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

#[derive(Debug)]
pub struct Tree {
    root: Node,
}

impl Tree {
    pub(crate) fn fit<R: Rng + ?Sized>(rng: &mut R, mut table: Table, growth: TreeGrowth) -> Self {
        let mut builder = NodeBuilder { rng, growth };
        let root = builder.build(&mut table, 0);
        Self { root }
    }

    /// Weighted class distribution of the leaf `xs` falls into.
    pub fn predict_proba(&self, xs: &[f64]) -> [f64; CLASSES] {
        self.root.predict_proba(xs)
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }
}

#[derive(Debug)]
struct Node {
    distribution: [f64; CLASSES],
    children: Option<Children>,
}

impl Node {
    fn new(class_weights: [f64; CLASSES]) -> Self {
        let total = class_weights.iter().sum::<f64>();
        let mut distribution = [0.0; CLASSES];
        if total > 0.0 {
            for (p, w) in distribution.iter_mut().zip(class_weights.iter()) {
                *p = w / total;
            }
        }
        Self {
            distribution,
            children: None,
        }
    }

    fn predict_proba(&self, xs: &[f64]) -> [f64; CLASSES] {
        if let Some(children) = &self.children {
            if xs[children.split.column] <= children.split.threshold {
                children.left.predict_proba(xs)
            } else {
                children.right.predict_proba(xs)
            }
        } else {
            self.distribution
        }
    }

    fn depth(&self) -> usize {
        self.children.as_ref().map_or(0, |c| {
            1 + std::cmp::max(c.left.depth(), c.right.depth())
        })
    }
}

#[derive(Debug)]
struct Children {
    split: SplitPoint,
    left: Box<Node>,
    right: Box<Node>,
}

#[derive(Debug)]
struct SplitPoint {
    information_gain: f64,
    column: usize,
    threshold: f64,
}

#[derive(Debug)]
struct NodeBuilder<R> {
    rng: R,
    growth: TreeGrowth,
}

impl<R: Rng> NodeBuilder<R> {
    fn build(&mut self, table: &mut Table, depth: usize) -> Node {
        let class_weights = table.class_weights();
        let mut node = Node::new(class_weights);
        if table.is_single_target()
            || table.rows_len() < self.growth.min_samples_split
            || self.growth.max_depth.map_or(false, |max| depth >= max)
        {
            return node;
        }

        let impurity = gini(&class_weights);
        let total = class_weights.iter().sum::<f64>();

        let max_features = self
            .growth
            .max_features
            .unwrap_or_else(|| table.features_len());
        let mut columns = (0..table.features_len()).collect::<Vec<_>>();
        columns.shuffle(&mut self.rng);

        // Columns constant within this node do not count against `max_features`.
        let mut visited = 0;
        let mut best: Option<SplitPoint> = None;
        for column in columns {
            if visited >= max_features {
                break;
            }
            table.sort_rows_by_feature(column);
            let thresholds = table.thresholds(column).collect::<Vec<_>>();
            if thresholds.is_empty() {
                continue;
            }
            visited += 1;

            let cumulative = table.cumulative_class_weights();
            for (row, threshold) in thresholds {
                let left = cumulative[row - 1];
                let mut right = class_weights;
                for (r, l) in right.iter_mut().zip(left.iter()) {
                    *r -= l;
                }
                let n_l = left.iter().sum::<f64>() / total;
                let n_r = 1.0 - n_l;

                let information_gain = impurity - (n_l * gini(&left) + n_r * gini(&right));
                if best
                    .as_ref()
                    .map_or(true, |t| t.information_gain < information_gain)
                {
                    best = Some(SplitPoint {
                        information_gain,
                        column,
                        threshold,
                    });
                }
            }
        }

        if let Some(best) = best {
            node.children = Some(self.build_children(table, best, depth));
        }
        node
    }

    fn build_children(&mut self, table: &mut Table, split: SplitPoint, depth: usize) -> Children {
        table.sort_rows_by_feature(split.column);
        let row = table
            .feature(split.column)
            .take_while(|&f| f <= split.threshold)
            .count();
        let (left, right) = table.with_split(row, |table| Box::new(self.build(table, depth + 1)));
        Children { split, left, right }
    }
}

fn gini(class_weights: &[f64; CLASSES]) -> f64 {
    let total = class_weights.iter().sum::<f64>();
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - class_weights
        .iter()
        .map(|w| (w / total).powi(2))
        .sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::AgeGroup::{NonSenior, Senior};

    fn xor_like() -> Result<(FeatureTable, LabelTable), anyhow::Error> {
        let rows = vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.1, 0.1],
            vec![0.1, 0.9],
            vec![0.9, 0.1],
            vec![0.9, 0.9],
        ];
        let features = FeatureTable::from_rows(vec!["a".to_owned(), "b".to_owned()], &rows)?;
        let labels = LabelTable::new(vec![
            NonSenior, Senior, Senior, NonSenior, NonSenior, Senior, Senior, NonSenior,
        ]);
        Ok((features, labels))
    }

    #[test]
    fn fits_training_data_exactly() -> Result<(), anyhow::Error> {
        let (features, labels) = xor_like()?;
        let mut tree = DecisionTreeClassifier::new(DecisionTreeOptions::default().seed(0));
        tree.fit(&features, &labels)?;
        assert_eq!(tree.predict(&features)?, labels);
        assert!(tree.depth().unwrap_or(0) >= 2);
        Ok(())
    }

    #[test]
    fn max_depth_limits_growth() -> Result<(), anyhow::Error> {
        let (features, labels) = xor_like()?;
        let mut tree =
            DecisionTreeClassifier::new(DecisionTreeOptions::default().seed(0).max_depth(1));
        tree.fit(&features, &labels)?;
        assert_eq!(tree.depth(), Some(1));
        Ok(())
    }

    #[test]
    fn balanced_weights_shift_leaf_votes() -> Result<(), anyhow::Error> {
        // One constant feature: the tree is a single leaf holding the class mix.
        let features = FeatureTable::new(vec!["a".to_owned()], vec![vec![1.0; 4]])?;
        let labels = LabelTable::new(vec![NonSenior, NonSenior, NonSenior, Senior]);

        let mut uniform = DecisionTreeClassifier::new(DecisionTreeOptions::default().seed(0));
        uniform.fit(&features, &labels)?;
        assert_eq!(uniform.predict_proba(&features)?[0], [0.75, 0.25]);

        let mut balanced = DecisionTreeClassifier::new(
            DecisionTreeOptions::default()
                .seed(0)
                .class_weight(ClassWeight::Balanced),
        );
        balanced.fit(&features, &labels)?;
        let p = balanced.predict_proba(&features)?[0];
        assert!((p[0] - 0.5).abs() < 1e-12 && (p[1] - 0.5).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn predict_requires_fit() -> Result<(), anyhow::Error> {
        let (features, _) = xor_like()?;
        let tree = DecisionTreeClassifier::new(Default::default());
        assert_eq!(tree.predict(&features).err(), Some(FitError::NotFitted));
        Ok(())
    }

    #[test]
    fn gini_works() {
        assert_eq!(gini(&[1.0, 1.0]), 0.5);
        assert_eq!(gini(&[2.0, 0.0]), 0.0);
        assert_eq!(gini(&[0.0, 0.0]), 0.0);
    }
}
