//! Label vocabulary shared by the fine-tuning driver and the classifier.
//!
//! Ids are assigned by lexicographic order of the distinct labels observed in
//! the clause table, so the mapping is deterministic for a fixed label set.
//! The driver persists the map as `labels.json` and the service reads it back
//! verbatim instead of re-deriving it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Bidirectional `label <-> id` mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    /// Labels indexed by id; sorted ascending.
    labels: Vec<String>,
}

/// On-disk form, mirroring the `id2label` / `label2id` pair of a model config.
#[derive(Debug, Serialize, Deserialize)]
struct LabelMapFile {
    id2label: BTreeMap<usize, String>,
    label2id: BTreeMap<String, usize>,
}

impl LabelMap {
    /// Build from the labels observed in the data, in any order, duplicates allowed.
    pub fn from_observed<I, S>(observed: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let distinct: BTreeSet<String> = observed
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        if distinct.is_empty() {
            return Err(CoreError::NoLabels);
        }
        Ok(Self {
            labels: distinct.into_iter().collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Id of `label`, if known.
    pub fn id(&self, label: &str) -> Option<usize> {
        self.labels
            .binary_search_by(|candidate| candidate.as_str().cmp(label))
            .ok()
    }

    /// Id of `label`, or [`CoreError::UnknownLabel`].
    pub fn require_id(&self, label: &str) -> Result<usize, CoreError> {
        self.id(label)
            .ok_or_else(|| CoreError::UnknownLabel(label.to_string()))
    }

    /// Label for `id`, if in range.
    pub fn label(&self, id: usize) -> Option<&str> {
        self.labels.get(id).map(String::as_str)
    }

    /// Labels in id order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label2id(&self) -> BTreeMap<String, usize> {
        self.labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i))
            .collect()
    }

    pub fn id2label(&self) -> BTreeMap<usize, String> {
        self.labels.iter().cloned().enumerate().collect()
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        let file = LabelMapFile {
            id2label: self.id2label(),
            label2id: self.label2id(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Parse a `labels.json` document, checking both directions agree.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let file: LabelMapFile = serde_json::from_str(json)?;

        if file.id2label.len() != file.label2id.len() {
            return Err(CoreError::InconsistentLabels(format!(
                "{} ids but {} labels",
                file.id2label.len(),
                file.label2id.len()
            )));
        }
        if file.id2label.is_empty() {
            return Err(CoreError::NoLabels);
        }

        let mut labels = Vec::with_capacity(file.id2label.len());
        for (expected, (id, label)) in file.id2label.into_iter().enumerate() {
            if id != expected {
                return Err(CoreError::InconsistentLabels(format!(
                    "ids are not contiguous: expected {expected}, found {id}"
                )));
            }
            match file.label2id.get(&label) {
                Some(&back) if back == id => {}
                other => {
                    return Err(CoreError::InconsistentLabels(format!(
                        "id2label[{id}] = {label:?} but label2id maps it to {other:?}"
                    )));
                }
            }
            labels.push(label);
        }

        if labels.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CoreError::InconsistentLabels(
                "labels are not in sorted id order".into(),
            ));
        }

        Ok(Self { labels })
    }

    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            return Err(CoreError::MissingFile(path.to_path_buf()));
        }
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_sorted_order() {
        let map = LabelMap::from_observed(["Non-Compete", "Exclusivity", "Anti-Assignment"]).unwrap();
        assert_eq!(map.id("Anti-Assignment"), Some(0));
        assert_eq!(map.id("Exclusivity"), Some(1));
        assert_eq!(map.id("Non-Compete"), Some(2));
        assert_eq!(map.label(1), Some("Exclusivity"));
        assert_eq!(map.label(3), None);
    }

    #[test]
    fn mapping_is_stable_across_input_orders() {
        let a = LabelMap::from_observed(["b", "a", "c", "a", "b"]).unwrap();
        let b = LabelMap::from_observed(["c", "b", "a"]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.label2id(), b.label2id());
    }

    #[test]
    fn empty_observation_is_an_error() {
        let err = LabelMap::from_observed(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, CoreError::NoLabels));
    }

    #[test]
    fn unknown_label_is_reported() {
        let map = LabelMap::from_observed(["x"]).unwrap();
        assert!(matches!(
            map.require_id("y"),
            Err(CoreError::UnknownLabel(l)) if l == "y"
        ));
    }

    #[test]
    fn json_round_trip_through_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("labels.json");
        let map = LabelMap::from_observed(["Exclusivity", "Cap On Liability"]).unwrap();
        map.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"id2label\""));
        assert!(text.contains("\"0\": \"Cap On Liability\""));

        assert_eq!(LabelMap::load(&path).unwrap(), map);
    }

    #[test]
    fn load_missing_file_errors() {
        let err = LabelMap::load(Path::new("/nonexistent/labels.json")).unwrap_err();
        assert!(matches!(err, CoreError::MissingFile(_)));
    }

    #[test]
    fn rejects_disagreeing_directions() {
        let json = r#"{"id2label": {"0": "a", "1": "b"}, "label2id": {"a": 1, "b": 0}}"#;
        assert!(matches!(
            LabelMap::from_json(json),
            Err(CoreError::InconsistentLabels(_))
        ));
    }

    #[test]
    fn rejects_gaps_in_ids() {
        let json = r#"{"id2label": {"0": "a", "2": "b"}, "label2id": {"a": 0, "b": 2}}"#;
        assert!(matches!(
            LabelMap::from_json(json),
            Err(CoreError::InconsistentLabels(_))
        ));
    }
}
