//! Boundary to an externally trained probability model
//!
//! A model artifact is the tuple (feature names, scaler, model parameters,
//! training metadata). It is read and validated completely before a
//! [`Classifier`] exists, so a half-written or mismatched artifact can never
//! be scored against. When no artifact is available the classifier reports
//! [`Probability::Unavailable`], which gated policies treat as a failed gate.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::features::FeatureRow;

/// Largest magnitude an input may carry after sanitizing
const INPUT_CLAMP: f64 = 1e10;

/// Directory layout file names
const FEATURES_FILE: &str = "feature_names.json";
const SCALER_FILE: &str = "scaler.json";
const MODEL_FILE: &str = "model.json";
const METADATA_FILE: &str = "metadata.json";

/// Standard scaler: `(x - mean) / scale`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl ScalerParams {
    fn transform(&self, x: &mut [f64]) {
        for ((v, mean), scale) in x.iter_mut().zip(&self.mean).zip(&self.scale) {
            // zero-variance features were constant at training time
            let scale = if *scale == 0.0 { 1.0 } else { *scale };
            *v = (*v - mean) / scale;
        }
    }
}

/// One node of a regression tree. Children always have larger indices than
/// their parent, which validation enforces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    /// A path longer than the node count means a cycle; it scores 0.
    fn evaluate(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { value }) => return *value,
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = x.get(*feature).copied().unwrap_or(0.0);
                    idx = if value <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
        0.0
    }

    fn validate(&self, tree_idx: usize, n_features: usize) -> EngineResult<()> {
        if self.nodes.is_empty() {
            return Err(EngineError::Artifact(format!("tree {} has no nodes", tree_idx)));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(EngineError::Artifact(format!(
                            "tree {} node {} splits on feature {} of {}",
                            tree_idx, idx, feature, n_features
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(EngineError::Artifact(format!(
                            "tree {} node {} has a non-finite threshold",
                            tree_idx, idx
                        )));
                    }
                    for child in [*left, *right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(EngineError::Artifact(format!(
                                "tree {} node {} points to invalid child {}",
                                tree_idx, idx, child
                            )));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(EngineError::Artifact(format!(
                            "tree {} node {} has a non-finite leaf",
                            tree_idx, idx
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Parameters of the supported model families
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelParams {
    Logistic {
        weights: Vec<f64>,
        intercept: f64,
    },
    /// Additive regression trees with a sigmoid link (gradient boosting)
    TreeEnsemble {
        trees: Vec<Tree>,
        #[serde(default)]
        base_score: f64,
    },
}

impl ModelParams {
    fn raw_score(&self, x: &[f64]) -> f64 {
        match self {
            ModelParams::Logistic { weights, intercept } => {
                intercept + weights.iter().zip(x).map(|(w, v)| w * v).sum::<f64>()
            }
            ModelParams::TreeEnsemble { trees, base_score } => {
                base_score + trees.iter().map(|t| t.evaluate(x)).sum::<f64>()
            }
        }
    }

    fn family(&self) -> &'static str {
        match self {
            ModelParams::Logistic { .. } => "logistic",
            ModelParams::TreeEnsemble { .. } => "tree_ensemble",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingMetadata {
    #[serde(default)]
    pub training_date: Option<String>,
    #[serde(default, alias = "val_accuracy")]
    pub accuracy: Option<f64>,
    #[serde(default, alias = "val_roc_auc")]
    pub auc: Option<f64>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Everything needed to score a feature row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub feature_names: Vec<String>,
    pub scaler_params: ScalerParams,
    pub model_params: ModelParams,
    #[serde(default)]
    pub metadata: TrainingMetadata,
}

impl ModelArtifact {
    pub fn validate(&self) -> EngineResult<()> {
        let n = self.feature_names.len();
        if n == 0 {
            return Err(EngineError::Artifact("artifact lists no features".into()));
        }
        if self.scaler_params.mean.len() != n || self.scaler_params.scale.len() != n {
            return Err(EngineError::Artifact(format!(
                "scaler has {}/{} entries for {} features",
                self.scaler_params.mean.len(),
                self.scaler_params.scale.len(),
                n
            )));
        }
        let scaler_finite = self
            .scaler_params
            .mean
            .iter()
            .chain(&self.scaler_params.scale)
            .all(|v| v.is_finite());
        if !scaler_finite {
            return Err(EngineError::Artifact("scaler holds non-finite values".into()));
        }
        match &self.model_params {
            ModelParams::Logistic { weights, intercept } => {
                if weights.len() != n {
                    return Err(EngineError::Artifact(format!(
                        "logistic model has {} weights for {} features",
                        weights.len(),
                        n
                    )));
                }
                if !intercept.is_finite() || !weights.iter().all(|w| w.is_finite()) {
                    return Err(EngineError::Artifact("logistic model holds non-finite values".into()));
                }
            }
            ModelParams::TreeEnsemble { trees, base_score } => {
                if trees.is_empty() || !base_score.is_finite() {
                    return Err(EngineError::Artifact("tree ensemble is empty or malformed".into()));
                }
                for (i, tree) in trees.iter().enumerate() {
                    tree.validate(i, n)?;
                }
            }
        }
        Ok(())
    }

    /// Probability for a live row: features are taken in the recorded
    /// order, absent ones default to 0, then sanitized and scaled.
    pub fn predict(&self, row: &FeatureRow) -> f64 {
        let mut x: Vec<f64> = self
            .feature_names
            .iter()
            .map(|name| sanitize(row.get(name).unwrap_or(0.0)))
            .collect();
        self.scaler_params.transform(&mut x);
        sigmoid(self.model_params.raw_score(&x))
    }
}

/// NaN becomes 0, infinities are clamped to +/-1e10
pub fn sanitize(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-INPUT_CLAMP, INPUT_CLAMP)
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Read and validate an artifact from a single JSON file or a directory of
/// `feature_names.json`, `scaler.json`, `model.json` and (optionally)
/// `metadata.json`. Returns the artifact and its SHA-256 version id.
pub fn load_artifact(path: &Path) -> EngineResult<(ModelArtifact, String)> {
    let (artifact, digest) = if path.is_dir() {
        load_dir(path)?
    } else {
        let bytes = fs::read(path)?;
        let artifact: ModelArtifact = serde_json::from_slice(&bytes)?;
        (artifact, fingerprint(&[&bytes]))
    };
    artifact.validate()?;
    Ok((artifact, digest))
}

fn load_dir(dir: &Path) -> EngineResult<(ModelArtifact, String)> {
    let features = fs::read(dir.join(FEATURES_FILE))?;
    let scaler = fs::read(dir.join(SCALER_FILE))?;
    let model = fs::read(dir.join(MODEL_FILE))?;
    let metadata_path = dir.join(METADATA_FILE);
    let metadata = if metadata_path.exists() {
        fs::read(metadata_path)?
    } else {
        b"{}".to_vec()
    };

    let artifact = ModelArtifact {
        feature_names: serde_json::from_slice(&features)?,
        scaler_params: serde_json::from_slice(&scaler)?,
        model_params: serde_json::from_slice(&model)?,
        metadata: serde_json::from_slice(&metadata)?,
    };
    let digest = fingerprint(&[&features, &scaler, &model, &metadata]);
    Ok((artifact, digest))
}

fn fingerprint(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    format!("{:x}", hasher.finalize())
}

/// Classifier output as seen by decision policies
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Probability {
    Available(f64),
    Unavailable,
}

impl Probability {
    /// Unavailable counts as 0 so a gate can never pass without a model
    pub fn value_or_zero(self) -> f64 {
        match self {
            Probability::Available(p) => p,
            Probability::Unavailable => 0.0,
        }
    }

    pub fn is_available(self) -> bool {
        matches!(self, Probability::Available(_))
    }
}

/// Anything that turns a feature row into a probability
pub trait ProbabilityModel: Send + Sync {
    fn probability(&self, row: &FeatureRow) -> Probability;
}

#[derive(Debug, Clone)]
struct LoadedModel {
    artifact: ModelArtifact,
    version: String,
    source: PathBuf,
}

/// A loaded artifact, or the explicit absence of one
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    model: Option<LoadedModel>,
}

impl Classifier {
    pub fn unavailable() -> Self {
        Self { model: None }
    }

    pub fn from_artifact(artifact: ModelArtifact, version: impl Into<String>) -> EngineResult<Self> {
        artifact.validate()?;
        Ok(Self {
            model: Some(LoadedModel {
                artifact,
                version: version.into(),
                source: PathBuf::new(),
            }),
        })
    }

    pub fn try_load(path: &Path) -> EngineResult<Self> {
        let (artifact, version) = load_artifact(path)?;
        let short = &version[..12.min(version.len())];
        info!(
            path = %path.display(),
            version = %short,
            family = artifact.model_params.family(),
            features = artifact.feature_names.len(),
            trained = artifact.metadata.training_date.as_deref().unwrap_or("unknown"),
            "Loaded model artifact"
        );
        Ok(Self {
            model: Some(LoadedModel {
                artifact,
                version,
                source: path.to_path_buf(),
            }),
        })
    }

    /// Load, or degrade to an unavailable classifier with a warning
    pub fn load_or_unavailable(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(classifier) => classifier,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "No usable model artifact");
                Self::unavailable()
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.model.is_some()
    }

    /// SHA-256 of the artifact bytes
    pub fn version(&self) -> Option<&str> {
        self.model.as_ref().map(|m| m.version.as_str())
    }

    pub fn source(&self) -> Option<&Path> {
        self.model.as_ref().map(|m| m.source.as_path())
    }

    pub fn artifact(&self) -> Option<&ModelArtifact> {
        self.model.as_ref().map(|m| &m.artifact)
    }

    /// Probability in [0, 1]; 0 when no model is loaded
    pub fn predict(&self, row: &FeatureRow) -> f64 {
        self.probability(row).value_or_zero()
    }

    /// Like `predict`, but a missing model is an error
    pub fn try_predict(&self, row: &FeatureRow) -> EngineResult<f64> {
        match &self.model {
            Some(m) => Ok(m.artifact.predict(row)),
            None => Err(EngineError::MissingModel(
                "no classifier artifact loaded".into(),
            )),
        }
    }
}

impl ProbabilityModel for Classifier {
    fn probability(&self, row: &FeatureRow) -> Probability {
        match &self.model {
            Some(m) => {
                let p = m.artifact.predict(row);
                debug!(probability = p, "Classifier prediction");
                Probability::Available(p)
            }
            None => Probability::Unavailable,
        }
    }
}

/// Per-symbol artifacts under one root: `<root>/<SYMBOL>/`, falling back to
/// `<root>/latest/`.
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn classifier_for(&self, symbol: &str) -> Classifier {
        let specific = self.root.join(symbol);
        if specific.join(MODEL_FILE).exists() {
            return Classifier::load_or_unavailable(&specific);
        }
        let latest = self.root.join("latest");
        if latest.join(MODEL_FILE).exists() {
            return Classifier::load_or_unavailable(&latest);
        }
        warn!(symbol, root = %self.root.display(), "No model artifact for symbol");
        Classifier::unavailable()
    }

    /// Symbols that have their own artifact directory
    pub fn symbols(&self) -> EngineResult<Vec<String>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name != "latest" && entry.path().join(MODEL_FILE).exists() {
                out.push(name);
            }
        }
        out.sort();
        Ok(out)
    }
}
