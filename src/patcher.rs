use std::collections::HashSet;

use serde_json::{json, Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::geometry::{RegionCoords, ALL_REGION_NAMES};
use crate::region_map::{
    entry_name, find_region_maps, find_region_maps_mut, RegionMapRef, RegionMapShape,
    FULL_REGION_COUNT, PARTIAL_REGION_COUNT,
};

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("malformed settings document: {0}")]
    MalformedDocument(String),
    #[error("no lighting profile has 18 or 5 screen sampler regions named wl11 to wl36")]
    NoQualifyingRegionMap,
    #[error("extended {extended} of {expected} partial screen sampler profiles")]
    PartialExtensionMismatch { expected: usize, extended: usize },
    #[error("failed to serialize settings document: {0}")]
    SerializationFailure(String),
}

impl PatchError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedDocument(_) => "MALFORMED_DOCUMENT",
            Self::NoQualifyingRegionMap => "NO_QUALIFYING_REGION_MAP",
            Self::PartialExtensionMismatch { .. } => "PARTIAL_EXTENSION_MISMATCH",
            Self::SerializationFailure(_) => "SERIALIZATION_FAILURE",
        }
    }
}

/// Counts of qualifying region maps found in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validation {
    pub full: usize,
    pub partial: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchReport {
    pub validation: Validation,
    pub extended: usize,
    pub rewritten: usize,
}

pub fn parse_document(bytes: &[u8]) -> Result<Value, PatchError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|error| PatchError::MalformedDocument(format!("settings are not UTF-8: {error}")))?;
    serde_json::from_str(text)
        .map_err(|error| PatchError::MalformedDocument(format!("invalid JSON: {error}")))
}

/// Pretty-printed with two-space indentation and non-ASCII kept verbatim.
pub fn serialize_document(document: &Value) -> Result<String, PatchError> {
    serde_json::to_string_pretty(document)
        .map_err(|error| PatchError::SerializationFailure(error.to_string()))
}

/// Number of region maps with exactly `expected` entries, each named from the
/// fixed `wl11..wl36` set with no name repeated.
pub fn count_region_maps(document: &Value, expected: usize) -> Result<usize, PatchError> {
    let count = find_region_maps(document)?
        .iter()
        .filter(|map| map.len() == expected && map.region_names().is_some())
        .count();
    Ok(count)
}

pub fn validate_document(document: &Value) -> Result<Validation, PatchError> {
    let validation = Validation {
        full: count_region_maps(document, FULL_REGION_COUNT)?,
        partial: count_region_maps(document, PARTIAL_REGION_COUNT)?,
    };
    tracing::info!(
        full = validation.full,
        partial = validation.partial,
        "validated screen sampler profiles"
    );
    if validation.full == 0 && validation.partial == 0 {
        return Err(PatchError::NoQualifyingRegionMap);
    }
    Ok(validation)
}

/// Hands out UUID-formatted identifiers that never repeat within a run and
/// never collide with identifiers already present in the document.
#[derive(Debug, Default)]
pub struct IdGenerator {
    issued: HashSet<String>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_document(document: &Value) -> Result<Self, PatchError> {
        let mut generator = Self::new();
        for map in find_region_maps(document)? {
            for (key, entry) in map.entries() {
                generator.reserve(key);
                if let Some(id) = entry.get("id").and_then(Value::as_str) {
                    generator.reserve(id);
                }
            }
        }
        Ok(generator)
    }

    pub fn reserve(&mut self, id: &str) {
        self.issued.insert(id.to_ascii_lowercase());
    }

    pub fn next_id(&mut self) -> String {
        loop {
            let candidate = Uuid::new_v4().to_string();
            if self.issued.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

/// Grows every 5-region profile to the full 18 regions by cloning one of its
/// entries for each grid name it lacks. Each such profile must carry five
/// distinct grid names; if any does not, the document is left untouched and
/// `PartialExtensionMismatch` is returned.
pub fn extend_region_maps(document: &mut Value) -> Result<usize, PatchError> {
    let mut ids = IdGenerator::for_document(document)?;
    extend_with(document, &mut ids)
}

fn extend_with(document: &mut Value, ids: &mut IdGenerator) -> Result<usize, PatchError> {
    let mut maps = find_region_maps_mut(document)?
        .into_iter()
        .filter(|map| map.shape() == RegionMapShape::Partial)
        .collect::<Vec<_>>();
    let expected = maps.len();

    let mut planned = Vec::with_capacity(expected);
    for map in &maps {
        match plan_extension(map.view(), ids) {
            Some(additions) => planned.push(additions),
            None => tracing::warn!(
                profile = map.profile_key,
                "partial profile does not carry five distinct region names"
            ),
        }
    }
    if planned.len() != expected {
        return Err(PatchError::PartialExtensionMismatch {
            expected,
            extended: planned.len(),
        });
    }

    for (map, additions) in maps.iter_mut().zip(planned) {
        for (id, entry) in additions {
            map.entries.insert(id, entry);
        }
        tracing::info!(
            profile = map.profile_key,
            regions = map.entries.len(),
            "extended partial screen sampler profile"
        );
    }
    Ok(expected)
}

fn plan_extension(map: RegionMapRef<'_>, ids: &mut IdGenerator) -> Option<Vec<(String, Value)>> {
    let present = map.region_names()?;
    let template = map.entries().values().next()?;
    let additions = ALL_REGION_NAMES
        .iter()
        .filter(|name| !present.contains(*name))
        .map(|name| {
            let id = ids.next_id();
            let mut entry = template.clone();
            if let Some(fields) = entry.as_object_mut() {
                fields.insert("name".to_owned(), json!(name.as_str()));
                fields.insert("id".to_owned(), json!(id));
            }
            (id, entry)
        })
        .collect();
    Some(additions)
}

/// Overwrites the geometry of every recognised entry in every 18-region
/// profile. Returns the number of profiles processed.
pub fn rewrite_geometry(document: &mut Value, coords: &RegionCoords) -> Result<usize, PatchError> {
    let mut rewritten = 0;
    for map in find_region_maps_mut(document)? {
        if map.shape() != RegionMapShape::Full {
            continue;
        }
        for entry in map.entries.values_mut() {
            let Some(rect) = entry_name(entry).and_then(|name| coords.get_by_str(name)) else {
                continue;
            };
            let rect = *rect;
            if let Some(fields) = entry.as_object_mut() {
                set_geometry(fields, "top", rect.top);
                set_geometry(fields, "bottom", rect.bottom);
                set_geometry(fields, "left", rect.left);
                set_geometry(fields, "right", rect.right);
            }
        }
        tracing::info!(profile = map.profile_key, "rewrote screen sampler geometry");
        rewritten += 1;
    }
    Ok(rewritten)
}

fn set_geometry(fields: &mut Map<String, Value>, key: &str, value: f64) {
    fields.insert(key.to_owned(), json!(value));
}

/// Runs validate, extend and rewrite over a loaded document. Extension runs
/// only when a qualifying 5-region profile exists. Only reports success when
/// at least one profile was rewritten.
pub fn patch_document(document: &mut Value, coords: &RegionCoords) -> Result<PatchReport, PatchError> {
    let validation = validate_document(document)?;
    let extended = if validation.partial > 0 {
        extend_region_maps(document)?
    } else {
        0
    };
    let rewritten = rewrite_geometry(document, coords)?;
    if rewritten == 0 {
        return Err(PatchError::NoQualifyingRegionMap);
    }
    Ok(PatchReport {
        validation,
        extended,
        rewritten,
    })
}
