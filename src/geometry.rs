//! GeoJSON feature collections and the area-code index built over them.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::Retention;

/// A single GeoJSON feature. The geometry is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub geometry: Value,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Map<String, Value>,
    /// `id`, `bbox` and any foreign members.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Feature {
    /// Same geometry and members, with a caller-chosen property set.
    pub fn with_properties(&self, properties: Map<String, Value>) -> Self {
        Self {
            kind: self.kind.clone(),
            geometry: self.geometry.clone(),
            properties,
            extra: self.extra.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
    /// `name`, `crs` and any other top-level members.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features,
            extra: Map::new(),
        }
    }

    /// An empty collection sharing this one's top-level members.
    pub fn empty_like(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            features: Vec::new(),
            extra: self.extra.clone(),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Reads the area code a feature exposes under `key_field`.
///
/// Numeric codes are accepted and rendered as their JSON text.
pub fn area_code(feature: &Feature, key_field: &str) -> Option<String> {
    match feature.properties.get(key_field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Boundary features indexed by area code.
///
/// Features keep their file order. When a code repeats, the later feature
/// replaces the earlier one in place.
#[derive(Debug)]
pub struct GeometryStore {
    template: FeatureCollection,
    features: Vec<Feature>,
    codes: Vec<String>,
    index: HashMap<String, usize>,
    matched: HashSet<String>,
}

impl GeometryStore {
    /// Loads and indexes a GeoJSON feature collection.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed, or if any feature lacks
    /// a string or numeric `key_field` property.
    #[tracing::instrument(skip(path), fields(path = %path.display()))]
    pub fn load(path: &Path, key_field: &str) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open geometry file {}", path.display()))?;
        let collection: FeatureCollection = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse geometry file {}", path.display()))?;

        let store = Self::from_collection(collection, key_field)?;
        info!(features = store.len(), key_field, "Geometry loaded");
        Ok(store)
    }

    pub fn from_collection(collection: FeatureCollection, key_field: &str) -> Result<Self> {
        let mut template = collection;
        let incoming = std::mem::take(&mut template.features);

        let mut store = Self {
            template,
            features: Vec::with_capacity(incoming.len()),
            codes: Vec::with_capacity(incoming.len()),
            index: HashMap::with_capacity(incoming.len()),
            matched: HashSet::new(),
        };

        for (position, feature) in incoming.into_iter().enumerate() {
            let Some(code) = area_code(&feature, key_field) else {
                bail!("feature {position} has no usable '{key_field}' property");
            };

            match store.index.get(&code) {
                Some(&slot) => {
                    warn!(area_code = %code, position, "Duplicate area code, keeping the later feature");
                    store.features[slot] = feature;
                }
                None => {
                    store.index.insert(code.clone(), store.features.len());
                    store.features.push(feature);
                    store.codes.push(code);
                }
            }
        }

        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.index.contains_key(code)
    }

    pub fn get(&self, code: &str) -> Option<&Feature> {
        self.index.get(code).map(|&slot| &self.features[slot])
    }

    pub fn get_mut(&mut self, code: &str) -> Option<&mut Feature> {
        self.index.get(code).map(|&slot| &mut self.features[slot])
    }

    /// Area codes in file order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }

    /// Records that `code` received joined data. Unknown codes are ignored.
    pub fn mark_matched(&mut self, code: &str) {
        if self.index.contains_key(code) && !self.matched.contains(code) {
            self.matched.insert(code.to_string());
        }
    }

    pub fn is_matched(&self, code: &str) -> bool {
        self.matched.contains(code)
    }

    pub fn matched_count(&self) -> usize {
        self.matched.len()
    }

    /// Rebuilds a feature collection in file order.
    pub fn into_collection(self, retention: Retention) -> FeatureCollection {
        let Self {
            template,
            features,
            codes,
            matched,
            ..
        } = self;

        let total = features.len();
        let features: Vec<Feature> = features
            .into_iter()
            .zip(codes)
            .filter(|(_, code)| retention == Retention::All || matched.contains(code))
            .map(|(feature, _)| feature)
            .collect();

        debug!(kept = features.len(), total, ?retention, "Collection rebuilt");

        FeatureCollection {
            features,
            ..template
        }
    }
}
