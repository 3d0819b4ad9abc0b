//! Labels attached to every workflow submitted by a batch.
//!
//! The server's label index is the only record of which batch a workflow
//! belongs to and whether it still counts towards that batch, so every label
//! set is checked here before anything is sent to the server.

use crate::constants::{labels as keys, UNIQUE_SUFFIX_LEN};
use crate::errors::LabelError;
use crate::model::BatchStatus;
use once_cell::sync::Lazy;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

static LABEL_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("label value pattern is a valid regex")
});

pub fn is_valid_label_value(value: &str) -> bool {
    LABEL_VALUE.is_match(value)
}

pub fn validate_label_value(kind: &str, value: &str) -> Result<(), LabelError> {
    if is_valid_label_value(value) {
        Ok(())
    } else {
        Err(LabelError::InvalidValue {
            kind: kind.to_string(),
            value: value.to_string(),
        })
    }
}

pub fn derive_batch_sample_label(batch: &str, sample: &str) -> String {
    format!("{}_{}", batch, sample)
}

pub fn derive_unique_label(workflow_name: &str, batch: &str, sample: &str) -> String {
    format!(
        "{}_{}_{}_{}",
        workflow_name,
        batch,
        sample,
        random_suffix(UNIQUE_SUFFIX_LEN)
    )
}

fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// When a label set is being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStage {
    /// Before submission a missing unique label is tolerated.
    PreSubmission,
    /// Once a workflow exists on the server every required label must be present.
    Submitted,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(pub BTreeMap<String, String>);

impl LabelSet {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builds the complete label set for one sample of a batch.
    pub fn for_sample(workflow_name: &str, batch: &str, sample: &str) -> Result<Self, LabelError> {
        let mut problems: Vec<LabelError> = [("batch name", batch), ("sample name", sample)]
            .into_iter()
            .filter_map(|(kind, value)| validate_label_value(kind, value).err())
            .collect();
        if problems.len() > 1 {
            return Err(LabelError::Multiple {
                context: derive_batch_sample_label(batch, sample),
                problems: problems.iter().map(ToString::to_string).collect(),
            });
        }
        if let Some(problem) = problems.pop() {
            return Err(problem);
        }

        let mut labels = Self::new();
        labels
            .insert(keys::BATCH, batch)
            .insert(keys::SAMPLE, sample)
            .insert(keys::BATCH_SAMPLE, derive_batch_sample_label(batch, sample))
            .insert(keys::BATCH_STATUS, BatchStatus::Include.as_str())
            .insert(keys::UNIQUE, derive_unique_label(workflow_name, batch, sample));
        Ok(labels)
    }

    /// A single-label patch setting the batch status.
    pub fn batch_status_patch(status: BatchStatus) -> Self {
        let mut labels = Self::new();
        labels.insert(keys::BATCH_STATUS, status.as_str());
        labels
    }

    pub fn insert<K, V>(&mut self, key: K, val: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.insert(key.into(), val.into());
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|s| s.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn batch(&self) -> Option<&str> {
        self.get(keys::BATCH)
    }

    pub fn sample(&self) -> Option<&str> {
        self.get(keys::SAMPLE)
    }

    pub fn batch_sample(&self) -> Option<&str> {
        self.get(keys::BATCH_SAMPLE)
    }

    pub fn unique(&self) -> Option<&str> {
        self.get(keys::UNIQUE)
    }

    pub fn batch_status(&self) -> Option<BatchStatus> {
        self.get(keys::BATCH_STATUS).and_then(|v| v.parse().ok())
    }

    /// True if every entry of `filter` is present here with the same value.
    pub fn matches(&self, filter: &BTreeMap<String, String>) -> bool {
        filter
            .iter()
            .all(|(k, v)| self.0.get(k).is_some_and(|own| own == v))
    }

    /// Name used to identify this label set in messages.
    pub fn display_name(&self) -> &str {
        self.unique()
            .or_else(|| self.batch_sample())
            .or_else(|| self.sample())
            .unwrap_or("<unlabelled workflow>")
    }

    pub fn validate(&self, stage: LabelStage) -> Result<(), LabelError> {
        let context = self.display_name().to_string();

        let missing: Vec<String> = keys::REQUIRED
            .iter()
            .filter(|key| !self.contains(key))
            .filter(|key| !(stage == LabelStage::PreSubmission && **key == keys::UNIQUE))
            .map(|key| key.to_string())
            .collect();

        if stage == LabelStage::PreSubmission && !self.contains(keys::UNIQUE) {
            tracing::warn!(
                "Label set for '{}' has no {}; the server will not be able to tell resubmissions apart.",
                context,
                keys::UNIQUE
            );
        }

        let mut problems = Vec::new();
        for (kind, key) in [("batch label", keys::BATCH), ("sample label", keys::SAMPLE)] {
            if let Some(value) = self.get(key) {
                if let Err(e) = validate_label_value(kind, value) {
                    problems.push(e);
                }
            }
        }
        if let Some(value) = self.get(keys::BATCH_STATUS) {
            if value.parse::<BatchStatus>().is_err() {
                problems.push(LabelError::InvalidBatchStatus {
                    label: context.clone(),
                    value: value.to_string(),
                });
            }
        }
        if let (Some(batch), Some(sample), Some(batch_sample)) =
            (self.batch(), self.sample(), self.batch_sample())
        {
            let expected = derive_batch_sample_label(batch, sample);
            if batch_sample != expected {
                problems.push(LabelError::InvalidValue {
                    kind: format!("{} (expected '{}')", keys::BATCH_SAMPLE, expected),
                    value: batch_sample.to_string(),
                });
            }
        }

        match (missing.is_empty(), problems.len()) {
            (true, 0) => Ok(()),
            (false, 0) => Err(LabelError::Missing { context, missing }),
            (true, 1) => Err(problems.remove(0)),
            _ => {
                let mut all: Vec<String> = Vec::new();
                if !missing.is_empty() {
                    all.push(format!("missing required label(s): {}", missing.join(", ")));
                }
                all.extend(problems.iter().map(ToString::to_string));
                Err(LabelError::Multiple {
                    context,
                    problems: all,
                })
            }
        }
    }
}

impl FromIterator<(String, String)> for LabelSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> LabelSet {
        LabelSet::for_sample("RNAseq", "B1", "S1").unwrap()
    }

    #[test]
    fn test_complete_label_set_is_valid() {
        let labels = complete();
        assert!(labels.validate(LabelStage::Submitted).is_ok());
        assert!(labels.validate(LabelStage::PreSubmission).is_ok());
        assert_eq!(labels.batch_status(), Some(BatchStatus::Include));
    }

    #[test]
    fn test_removing_any_required_label_names_it() {
        for key in keys::REQUIRED {
            let mut labels = complete();
            labels.remove(key);
            let err = labels.validate(LabelStage::Submitted).unwrap_err();
            match err {
                LabelError::Missing { missing, .. } => assert_eq!(missing, vec![key.to_string()]),
                other => panic!("expected missing label error for {}, got {:?}", key, other),
            }
        }
    }

    #[test]
    fn test_missing_labels_are_all_reported() {
        let mut labels = complete();
        labels.remove(keys::BATCH);
        labels.remove(keys::BATCH_STATUS);
        let err = labels.validate(LabelStage::Submitted).unwrap_err();
        assert_eq!(
            err,
            LabelError::Missing {
                context: labels.unique().unwrap().to_string(),
                missing: vec![keys::BATCH_STATUS.to_string(), keys::BATCH.to_string()],
            }
        );
    }

    #[test]
    fn test_unique_label_tolerated_before_submission() {
        let mut labels = complete();
        labels.remove(keys::UNIQUE);
        assert!(labels.validate(LabelStage::PreSubmission).is_ok());
        assert!(labels.validate(LabelStage::Submitted).is_err());
    }

    #[test]
    fn test_batch_sample_label_is_order_sensitive() {
        assert_eq!(derive_batch_sample_label("B1", "S1"), "B1_S1");
        assert_ne!(derive_batch_sample_label("S1", "B1"), "B1_S1");
    }

    #[test]
    fn test_unique_label_shape() {
        let label = derive_unique_label("RNAseq", "B1", "S1");
        let suffix = label.strip_prefix("RNAseq_B1_S1_").unwrap();
        assert_eq!(suffix.len(), UNIQUE_SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_unique_labels_differ_across_calls() {
        let labels: std::collections::HashSet<_> = (0..500)
            .map(|_| derive_unique_label("wf", "B1", "S1"))
            .collect();
        assert_eq!(labels.len(), 500);
    }

    #[test]
    fn test_label_value_grammar() {
        assert!(is_valid_label_value("batch_01-a"));
        assert!(is_valid_label_value("7"));
        assert!(!is_valid_label_value(""));
        assert!(!is_valid_label_value("-leading"));
        assert!(!is_valid_label_value("_leading"));
        assert!(!is_valid_label_value("has space"));
        assert!(!is_valid_label_value("dot.name"));
    }

    #[test]
    fn test_for_sample_rejects_bad_names_before_anything_else() {
        let err = LabelSet::for_sample("wf", "bad batch", "S1").unwrap_err();
        assert!(matches!(err, LabelError::InvalidValue { .. }));

        let err = LabelSet::for_sample("wf", "bad batch", "bad/sample").unwrap_err();
        match err {
            LabelError::Multiple { problems, .. } => assert_eq!(problems.len(), 2),
            other => panic!("expected both names reported, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_batch_status_and_missing_reported_together() {
        let mut labels = complete();
        labels.insert(keys::BATCH_STATUS, "maybe");
        labels.remove(keys::SAMPLE);
        let err = labels.validate(LabelStage::Submitted).unwrap_err();
        match err {
            LabelError::Multiple { problems, .. } => {
                assert_eq!(problems.len(), 2);
                assert!(problems[0].contains(keys::SAMPLE));
                assert!(problems[1].contains("maybe"));
            }
            other => panic!("expected combined report, got {:?}", other),
        }
    }

    #[test]
    fn test_mismatched_batch_sample_label() {
        let mut labels = complete();
        labels.insert(keys::BATCH_SAMPLE, "B1_S2");
        assert!(matches!(
            labels.validate(LabelStage::Submitted),
            Err(LabelError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_matches_is_superset_match() {
        let labels = complete();
        let mut filter = BTreeMap::new();
        filter.insert(keys::BATCH.to_string(), "B1".to_string());
        assert!(labels.matches(&filter));
        filter.insert(keys::BATCH_STATUS.to_string(), "exclude".to_string());
        assert!(!labels.matches(&filter));
    }
}
