//! Offline sentiment classifier: TF-IDF features and a multinomial Naive
//! Bayes model. Both halves share the review tokenizer, so training and
//! inference always see identical features.

use crate::sentiment::Sentiment;
use crate::tokenizer::{is_stopword, tokenize};
use crate::{Error, MetadataStore, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Sparse row: (feature index, value), ascending by index.
pub type SparseVector = Vec<(usize, f64)>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub seed: u64,
    /// Share of labeled reviews held out to measure accuracy.
    pub validation_fraction: f64,
    pub max_features: usize,
    /// Additive (Laplace) smoothing.
    pub alpha: f64,
    /// Refit the persisted artifact on every labeled review after validation.
    pub refit_on_full: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self { seed: 42, validation_fraction: 0.2, max_features: 5000, alpha: 1.0, refit_on_full: true }
    }
}

fn features(text: &str) -> impl Iterator<Item = String> {
    tokenize(text).into_iter().filter(|t| !is_stopword(t))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    /// Keep the `max_features` most frequent terms (ties broken by term), then
    /// compute smoothed idf `ln((1 + n) / (1 + df)) + 1`.
    pub fn fit<S: AsRef<str>>(texts: &[S], max_features: usize) -> Self {
        let mut freq: HashMap<String, u64> = HashMap::new();
        let mut df: HashMap<String, u64> = HashMap::new();
        for text in texts {
            let mut counts: HashMap<String, u64> = HashMap::new();
            for term in features(text.as_ref()) {
                *counts.entry(term).or_insert(0) += 1;
            }
            for (term, c) in counts {
                *freq.entry(term.clone()).or_insert(0) += c;
                *df.entry(term).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(String, u64)> = freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(max_features);

        let mut kept: Vec<String> = ranked.into_iter().map(|(t, _)| t).collect();
        kept.sort_unstable();

        let n = texts.len() as f64;
        let idf: Vec<f64> = kept
            .iter()
            .map(|t| ((1.0 + n) / (1.0 + df[t] as f64)).ln() + 1.0)
            .collect();
        let vocabulary: BTreeMap<String, usize> = kept.into_iter().enumerate().map(|(i, t)| (t, i)).collect();
        Self { vocabulary, idf }
    }

    pub fn num_features(&self) -> usize { self.idf.len() }

    /// L2-normalized TF-IDF row for one text. Out-of-vocabulary terms are ignored.
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in features(text) {
            if let Some(&i) = self.vocabulary.get(&term) {
                *counts.entry(i).or_insert(0.0) += 1.0;
            }
        }
        let mut row: SparseVector = counts.into_iter().map(|(i, tf)| (i, tf * self.idf[i])).collect();
        let norm = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in row.iter_mut() {
                *v /= norm;
            }
        }
        row
    }
}

fn class_index(label: Sentiment) -> usize {
    match label {
        Sentiment::Negative => 0,
        Sentiment::Positive => 1,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaiveBayesModel {
    /// Indexed by [`class_index`].
    class_log_prior: [f64; 2],
    feature_log_prob: [Vec<f64>; 2],
}

impl NaiveBayesModel {
    pub fn fit(rows: &[SparseVector], labels: &[Sentiment], num_features: usize, alpha: f64) -> Self {
        let mut class_count = [0usize; 2];
        let mut feature_count = [vec![0.0f64; num_features], vec![0.0f64; num_features]];
        for (row, label) in rows.iter().zip(labels) {
            let c = class_index(*label);
            class_count[c] += 1;
            for &(i, v) in row {
                feature_count[c][i] += v;
            }
        }

        let total = rows.len().max(1) as f64;
        let class_log_prior = class_count.map(|n| (n as f64 / total).ln());
        let feature_log_prob: [Vec<f64>; 2] = feature_count.map(|counts| {
            let denom = counts.iter().sum::<f64>() + alpha * num_features as f64;
            counts.iter().map(|c| ((c + alpha) / denom).ln()).collect()
        });
        Self { class_log_prior, feature_log_prob }
    }

    /// Joint log-likelihood argmax; ties go to negative.
    pub fn predict(&self, row: &SparseVector) -> Sentiment {
        let score = |c: usize| {
            self.class_log_prior[c]
                + row.iter().map(|&(i, v)| v * self.feature_log_prob[c][i]).sum::<f64>()
        };
        if score(1) > score(0) { Sentiment::Positive } else { Sentiment::Negative }
    }
}

/// Trained vectorizer + model. Immutable; persisted and loaded as a pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    pub vectorizer: TfidfVectorizer,
    pub model: NaiveBayesModel,
}

impl ClassifierArtifact {
    pub fn predict_one(&self, text: &str) -> Sentiment {
        self.model.predict(&self.vectorizer.transform(text))
    }

    pub fn predict<S: AsRef<str>>(&self, texts: &[S]) -> Vec<Sentiment> {
        texts.iter().map(|t| self.predict_one(t.as_ref())).collect()
    }

    /// Confirm the vectorizer and model were fitted together: every
    /// vocabulary index has an idf weight and both classes carry exactly one
    /// log-probability per feature.
    pub fn check_shape(&self) -> std::result::Result<(), String> {
        let n = self.vectorizer.num_features();
        if let Some((term, i)) = self.vectorizer.vocabulary.iter().find(|&(_, &i)| i >= n) {
            return Err(format!("term {term:?} maps to feature {i} but the vectorizer has {n}"));
        }
        for (c, probs) in self.model.feature_log_prob.iter().enumerate() {
            if probs.len() != n {
                return Err(format!("model class {c} has {} features but the vectorizer has {n}", probs.len()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub support: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub num_train: usize,
    pub num_validation: usize,
    pub num_features: usize,
    /// None when the validation split is empty.
    pub accuracy: Option<f64>,
    pub positive: ClassMetrics,
    pub negative: ClassMetrics,
}

/// Labeled texts from the metadata store in ID order. Unrated reviews are
/// left out.
pub fn labeled_reviews(metadata: &MetadataStore) -> Vec<(String, Sentiment)> {
    metadata
        .iter()
        .filter_map(|(_, meta)| meta.rating.map(|r| (meta.text.clone(), Sentiment::from_rating(r))))
        .collect()
}

fn select<'a>(labeled: &'a [(String, Sentiment)], idx: &[usize]) -> (Vec<&'a str>, Vec<Sentiment>) {
    idx.iter().map(|&i| (labeled[i].0.as_str(), labeled[i].1)).unzip()
}

fn fit_pair(texts: &[&str], labels: &[Sentiment], config: &TrainConfig) -> ClassifierArtifact {
    let vectorizer = TfidfVectorizer::fit(texts, config.max_features);
    let rows: Vec<SparseVector> = texts.iter().map(|t| vectorizer.transform(t)).collect();
    let model = NaiveBayesModel::fit(&rows, labels, vectorizer.num_features(), config.alpha);
    ClassifierArtifact { vectorizer, model }
}

fn class_metrics(truth: &[Sentiment], predicted: &[Sentiment], class: Sentiment) -> ClassMetrics {
    let tp = truth.iter().zip(predicted).filter(|(t, p)| **t == class && **p == class).count();
    let predicted_n = predicted.iter().filter(|p| **p == class).count();
    let support = truth.iter().filter(|t| **t == class).count();
    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    ClassMetrics { precision: ratio(tp, predicted_n), recall: ratio(tp, support), support }
}

/// Train a classifier on `(text, label)` pairs.
///
/// The split is a seeded shuffle, so the same input and config always give
/// the same report and artifact.
pub fn train(labeled: &[(String, Sentiment)], config: &TrainConfig) -> Result<(ClassifierArtifact, TrainingReport)> {
    if !(0.0..1.0).contains(&config.validation_fraction) {
        return Err(Error::user_input(format!(
            "validation fraction must be in [0, 1), got {}",
            config.validation_fraction
        )));
    }
    if labeled.is_empty() {
        return Err(Error::Training("no labeled reviews".into()));
    }
    if !labeled.iter().any(|(_, l)| *l == Sentiment::Positive)
        || !labeled.iter().any(|(_, l)| *l == Sentiment::Negative)
    {
        return Err(Error::Training("labeled reviews contain a single class".into()));
    }

    let mut order: Vec<usize> = (0..labeled.len()).collect();
    order.shuffle(&mut StdRng::seed_from_u64(config.seed));
    let num_validation = (labeled.len() as f64 * config.validation_fraction).round() as usize;
    let num_validation = num_validation.min(labeled.len() - 1);
    let (val_idx, train_idx) = order.split_at(num_validation);

    let (train_texts, train_labels) = select(labeled, train_idx);
    let (val_texts, val_labels) = select(labeled, val_idx);

    let split_artifact = fit_pair(&train_texts, &train_labels, config);
    let predicted = split_artifact.predict(&val_texts);
    let correct = predicted.iter().zip(&val_labels).filter(|(p, t)| p == t).count();
    let accuracy = (!val_labels.is_empty()).then(|| correct as f64 / val_labels.len() as f64);

    let artifact = if config.refit_on_full {
        let (texts, labels): (Vec<&str>, Vec<Sentiment>) =
            labeled.iter().map(|(t, l)| (t.as_str(), *l)).unzip();
        fit_pair(&texts, &labels, config)
    } else {
        split_artifact
    };

    let report = TrainingReport {
        num_train: train_idx.len(),
        num_validation,
        num_features: artifact.vectorizer.num_features(),
        accuracy,
        positive: class_metrics(&val_labels, &predicted, Sentiment::Positive),
        negative: class_metrics(&val_labels, &predicted, Sentiment::Negative),
    };
    tracing::info!(
        num_train = report.num_train,
        num_validation = report.num_validation,
        num_features = report.num_features,
        accuracy = ?report.accuracy,
        "trained sentiment classifier"
    );
    Ok((artifact, report))
}
