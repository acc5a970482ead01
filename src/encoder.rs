//! Category encoding for countries and genres.
//!
//! A [`Taxonomy`] is plain data: an ordered list of canonical groups and a map
//! from raw lower-cased labels to the groups they belong to. It is injected
//! into a [`CategoryEncoder`], so alternative taxonomies only need a different
//! JSON document.
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;

use crate::error::{PipelineError, Result};

const DEFAULT_CONTINENTS: &str = include_str!("../taxonomy/continents.json");
const DEFAULT_GENRES: &str = include_str!("../taxonomy/genres.json");

#[derive(Debug, Clone, Deserialize)]
pub struct Taxonomy {
    /// Canonical groups, in indicator-vector order.
    pub groups: Vec<String>,
    /// Raw label -> groups. An empty list encodes to the zero vector.
    pub labels: BTreeMap<String, Vec<String>>,
}

impl Taxonomy {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }
}

/// Maps raw category labels to canonical groups and one-hot vectors.
#[derive(Debug, Clone)]
pub struct CategoryEncoder {
    kind: &'static str,
    groups: Vec<String>,
    labels: HashMap<String, Vec<usize>>,
}

impl CategoryEncoder {
    /// Builds an encoder, checking that every label points at a declared group.
    pub fn new(kind: &'static str, taxonomy: Taxonomy) -> Result<Self> {
        let index: HashMap<&str, usize> = taxonomy
            .groups
            .iter()
            .enumerate()
            .map(|(i, g)| (g.as_str(), i))
            .collect();

        let mut labels = HashMap::with_capacity(taxonomy.labels.len());
        for (label, groups) in &taxonomy.labels {
            let mut positions = Vec::with_capacity(groups.len());
            for group in groups {
                let &pos = index.get(group.as_str()).ok_or_else(|| {
                    PipelineError::UnknownCategory {
                        kind: "group",
                        label: group.clone(),
                    }
                })?;
                if !positions.contains(&pos) {
                    positions.push(pos);
                }
            }
            labels.insert(normalize(label), positions);
        }

        Ok(Self {
            kind,
            groups: taxonomy.groups,
            labels,
        })
    }

    /// Country -> continent encoder built from the bundled taxonomy.
    pub fn continents() -> Result<Self> {
        Self::new("country", Taxonomy::from_json(DEFAULT_CONTINENTS)?)
    }

    /// Raw genre -> canonical genre encoder built from the bundled taxonomy.
    pub fn genres() -> Result<Self> {
        Self::new("genre", Taxonomy::from_json(DEFAULT_GENRES)?)
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Resolves a raw label to its canonical groups.
    ///
    /// Unknown labels are an error: a silent default would skew every
    /// aggregate built on top of the encoding.
    pub fn encode(&self, raw_label: &str) -> Result<Vec<&str>> {
        Ok(self
            .positions(raw_label)?
            .iter()
            .map(|&i| self.groups[i].as_str())
            .collect())
    }

    /// Indicator vector of a canonical group.
    ///
    /// # Panics
    ///
    /// Panics if `group` is not one of [`CategoryEncoder::groups`]. Group labels
    /// only ever come out of [`CategoryEncoder::encode`].
    pub fn group_to_vector(&self, group: &str) -> Vec<u8> {
        let pos = self
            .groups
            .iter()
            .position(|g| g == group)
            .unwrap_or_else(|| panic!("{group:?} is not a canonical {} group", self.kind));
        let mut vector = vec![0; self.groups.len()];
        vector[pos] = 1;
        vector
    }

    /// Coordinate-wise maximum of the vectors of every group `raw_label` maps to.
    pub fn encode_vector(&self, raw_label: &str) -> Result<Vec<u8>> {
        let mut vector = vec![0; self.groups.len()];
        for group in self.encode(raw_label)? {
            for (slot, bit) in vector.iter_mut().zip(self.group_to_vector(group)) {
                *slot = (*slot).max(bit);
            }
        }
        Ok(vector)
    }

    fn positions(&self, raw_label: &str) -> Result<&[usize]> {
        self.labels
            .get(&normalize(raw_label))
            .map(Vec::as_slice)
            .ok_or_else(|| PipelineError::UnknownCategory {
                kind: self.kind,
                label: raw_label.to_string(),
            })
    }
}

fn normalize(label: &str) -> String {
    label.trim().to_lowercase()
}
