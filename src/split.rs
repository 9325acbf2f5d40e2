//! Regroups merged `{variable}_{year}` properties into one collection per
//! variable.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use crate::geometry::{Feature, FeatureCollection};
use crate::keys::MergedKey;

/// Distinct variable names across every feature, sorted.
///
/// Only keys ending in a four-digit year count; base properties such as the
/// area code or `Shape__Length` are ignored.
pub fn variable_names<'a>(features: impl IntoIterator<Item = &'a Feature>) -> BTreeSet<String> {
    features
        .into_iter()
        .flat_map(|feature| feature.properties.keys())
        .filter_map(|key| MergedKey::parse(key))
        .map(|key| key.variable)
        .collect()
}

/// Builds one collection per variable.
///
/// Every input feature appears in every output collection with its
/// geometry, the `key_field` property, and exactly the properties whose
/// decoded variable equals that collection's variable.
pub fn split(collection: &FeatureCollection, key_field: &str) -> BTreeMap<String, FeatureCollection> {
    let names = variable_names(&collection.features);
    info!(variables = names.len(), "Splitting by variable");

    let mut outputs: BTreeMap<String, FeatureCollection> = names
        .into_iter()
        .map(|name| (name, collection.empty_like()))
        .collect();

    for feature in &collection.features {
        let mut per_variable: BTreeMap<String, Map<String, Value>> = BTreeMap::new();

        for (key, value) in &feature.properties {
            if let Some(merged) = MergedKey::parse(key) {
                per_variable
                    .entry(merged.variable)
                    .or_default()
                    .insert(key.clone(), value.clone());
            }
        }

        for (name, output) in outputs.iter_mut() {
            let mut properties = per_variable.remove(name).unwrap_or_default();
            if let Some(code) = feature.properties.get(key_field) {
                properties.insert(key_field.to_string(), code.clone());
            }
            output.features.push(feature.with_properties(properties));
        }
    }

    outputs
}
