use serde_json::{Map, Value};

use crate::geometry::RegionName;
use crate::patcher::PatchError;

pub const PROFILE_KEY_MARKER: &str = "lighting_effects";
pub const SAMPLER_INFO_KEY: &str = "screenSamplerInfo";
pub const REGION_MAP_KEY: &str = "regionMap";
pub const MIN_TOP_LEVEL_KEYS: usize = 10;

pub const FULL_REGION_COUNT: usize = 18;
pub const PARTIAL_REGION_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionMapShape {
    Full,
    Partial,
    Other(usize),
}

impl RegionMapShape {
    fn from_len(len: usize) -> Self {
        match len {
            FULL_REGION_COUNT => Self::Full,
            PARTIAL_REGION_COUNT => Self::Partial,
            other => Self::Other(other),
        }
    }
}

/// Rejects documents that cannot plausibly be a G Hub settings export.
pub fn check_plausible(document: &Value) -> Result<&Map<String, Value>, PatchError> {
    let object = document
        .as_object()
        .ok_or_else(|| PatchError::MalformedDocument("top level is not a JSON object".to_owned()))?;
    if object.len() < MIN_TOP_LEVEL_KEYS {
        return Err(PatchError::MalformedDocument(format!(
            "document has {} top-level keys, expected at least {MIN_TOP_LEVEL_KEYS}",
            object.len()
        )));
    }
    Ok(object)
}

fn check_plausible_mut(document: &mut Value) -> Result<&mut Map<String, Value>, PatchError> {
    check_plausible(document)?;
    document
        .as_object_mut()
        .ok_or_else(|| PatchError::MalformedDocument("top level is not a JSON object".to_owned()))
}

fn region_map_of(profile: &Value) -> Option<&Map<String, Value>> {
    profile
        .get(SAMPLER_INFO_KEY)?
        .get(REGION_MAP_KEY)?
        .as_object()
}

fn region_map_of_mut(profile: &mut Value) -> Option<&mut Map<String, Value>> {
    profile
        .get_mut(SAMPLER_INFO_KEY)?
        .get_mut(REGION_MAP_KEY)?
        .as_object_mut()
}

/// Read-only view of one lighting profile's `regionMap`.
#[derive(Debug, Clone, Copy)]
pub struct RegionMapRef<'a> {
    pub profile_key: &'a str,
    entries: &'a Map<String, Value>,
}

impl<'a> RegionMapRef<'a> {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn shape(&self) -> RegionMapShape {
        RegionMapShape::from_len(self.len())
    }

    /// Entry `name` fields; `None` for entries without a string name.
    pub fn names(&self) -> impl Iterator<Item = Option<&'a str>> + 'a {
        self.entries.values().map(entry_name)
    }

    /// Region names of the entries, provided every entry is named from the
    /// fixed grid and no name repeats.
    pub fn region_names(&self) -> Option<Vec<RegionName>> {
        let mut seen = Vec::with_capacity(self.len());
        for name in self.names() {
            let name = name.and_then(RegionName::parse)?;
            if seen.contains(&name) {
                return None;
            }
            seen.push(name);
        }
        Some(seen)
    }

    pub fn entries(&self) -> &'a Map<String, Value> {
        self.entries
    }
}

/// Mutable view of one lighting profile's `regionMap`.
#[derive(Debug)]
pub struct RegionMapMut<'a> {
    pub profile_key: &'a str,
    pub entries: &'a mut Map<String, Value>,
}

impl RegionMapMut<'_> {
    pub fn view(&self) -> RegionMapRef<'_> {
        RegionMapRef {
            profile_key: self.profile_key,
            entries: &*self.entries,
        }
    }

    pub fn shape(&self) -> RegionMapShape {
        RegionMapShape::from_len(self.entries.len())
    }
}

pub fn entry_name(entry: &Value) -> Option<&str> {
    entry.get("name").and_then(Value::as_str)
}

pub fn find_region_maps(document: &Value) -> Result<Vec<RegionMapRef<'_>>, PatchError> {
    let object = check_plausible(document)?;
    let maps = object
        .iter()
        .filter(|(key, _)| key.contains(PROFILE_KEY_MARKER))
        .filter_map(|(key, profile)| {
            region_map_of(profile).map(|entries| RegionMapRef {
                profile_key: key.as_str(),
                entries,
            })
        })
        .collect::<Vec<_>>();
    tracing::debug!(count = maps.len(), "located screen sampler region maps");
    Ok(maps)
}

pub fn find_region_maps_mut(document: &mut Value) -> Result<Vec<RegionMapMut<'_>>, PatchError> {
    let object = check_plausible_mut(document)?;
    Ok(object
        .iter_mut()
        .filter(|(key, _)| key.contains(PROFILE_KEY_MARKER))
        .filter_map(|(key, profile)| {
            region_map_of_mut(profile).map(|entries| RegionMapMut {
                profile_key: key.as_str(),
                entries,
            })
        })
        .collect())
}
