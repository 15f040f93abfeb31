use std::collections::HashSet;

use serde_json::{json, Map, Value};
use wlights::geometry::{generate, GeometryParams, ScreenSize, ALL_REGION_NAMES};
use wlights::patcher::{
    count_region_maps, extend_region_maps, parse_document, patch_document, rewrite_geometry,
    serialize_document, PatchError,
};

const FULL_HD: ScreenSize = ScreenSize {
    width: 1920,
    height: 1080,
};

fn sampler_profile(names: &[&str]) -> Value {
    let mut entries = Map::new();
    for (index, name) in names.iter().enumerate() {
        let id = format!("a1b2c3d4-0000-4000-8000-{index:012}");
        entries.insert(
            id.clone(),
            json!({
                "id": id,
                "name": name,
                "top": 0.5,
                "bottom": 0.25,
                "left": 0.125,
                "right": 0.0625,
                "zoneColor": "#ff8800",
                "keys": [format!("KEY_{index}")]
            }),
        );
    }
    json!({
        "name": "World of Warcraft",
        "screenSamplerInfo": { "regionMap": entries, "sampleRate": 30 },
        "effect": "SCREEN_SAMPLER"
    })
}

fn settings(profiles: Vec<(&str, Value)>) -> Value {
    let mut object = Map::new();
    object.insert("schema_version".to_owned(), json!(11));
    for key in [
        "applications",
        "devices",
        "backgrounds",
        "cards",
        "profiles",
        "keybinds",
        "macros",
        "user",
        "locale",
    ] {
        object.insert(key.to_owned(), json!({ "label": format!("{key} – données") }));
    }
    for (key, profile) in profiles {
        object.insert(key.to_owned(), profile);
    }
    Value::Object(object)
}

fn full_names() -> Vec<&'static str> {
    ALL_REGION_NAMES.iter().map(|name| name.as_str()).collect()
}

fn region_map<'a>(document: &'a Value, key: &str) -> &'a Map<String, Value> {
    document[key]["screenSamplerInfo"]["regionMap"]
        .as_object()
        .expect("region map should be an object")
}

#[test]
fn full_profile_gets_exact_default_geometry() {
    let mut document = settings(vec![(
        "lighting_effects_wow",
        sampler_profile(&full_names()),
    )]);
    let coords = generate(FULL_HD, &GeometryParams::default());

    let rewritten = rewrite_geometry(&mut document, &coords).expect("rewrite should succeed");
    assert_eq!(rewritten, 1);

    let wl11 = region_map(&document, "lighting_effects_wow")
        .values()
        .find(|entry| entry["name"] == "wl11")
        .expect("wl11 should exist");
    assert_eq!(wl11["top"].as_f64(), Some((1080.0 - 5.0 * 2.0 - 5.0 + 0.0) / 1080.0));
    assert_eq!(wl11["bottom"].as_f64(), Some((1080.0 - 1070.0) / 1080.0));
    assert_eq!(wl11["left"].as_f64(), Some(0.0));
    assert_eq!(wl11["right"].as_f64(), Some((1920.0 - 5.0) / 1920.0));
    assert_eq!(wl11["zoneColor"], "#ff8800");
    assert_eq!(wl11["keys"], json!(["KEY_0"]));
}

#[test]
fn partial_profile_is_extended_then_rewritten() {
    let mut document = settings(vec![(
        "lighting_effects_wow",
        sampler_profile(&["wl11", "wl12", "wl13", "wl14", "wl15"]),
    )]);
    assert_eq!(count_region_maps(&document, 5).expect("count"), 1);
    assert_eq!(count_region_maps(&document, 18).expect("count"), 0);

    let extended = extend_region_maps(&mut document).expect("extend should succeed");
    assert_eq!(extended, 1);
    assert_eq!(count_region_maps(&document, 18).expect("count"), 1);

    let ids = region_map(&document, "lighting_effects_wow")
        .values()
        .map(|entry| entry["id"].as_str().expect("id").to_owned())
        .collect::<HashSet<_>>();
    assert_eq!(ids.len(), 18, "every region should have a distinct id");

    let coords = generate(FULL_HD, &GeometryParams::default());
    assert_eq!(rewrite_geometry(&mut document, &coords).expect("rewrite"), 1);

    for entry in region_map(&document, "lighting_effects_wow").values() {
        let name = entry["name"].as_str().expect("name");
        let rect = coords.get_by_str(name).expect("generated rect");
        assert_eq!(entry["top"].as_f64(), Some(rect.top), "{name} top");
        assert_eq!(entry["bottom"].as_f64(), Some(rect.bottom), "{name} bottom");
        assert_eq!(entry["left"].as_f64(), Some(rect.left), "{name} left");
        assert_eq!(entry["right"].as_f64(), Some(rect.right), "{name} right");
    }
}

#[test]
fn short_document_is_refused_everywhere() {
    let mut document = json!({
        "lighting_effects_wow": sampler_profile(&full_names()),
        "user": {}
    });
    let before = document.clone();
    let coords = generate(FULL_HD, &GeometryParams::default());

    assert!(matches!(
        count_region_maps(&document, 18),
        Err(PatchError::MalformedDocument(_))
    ));
    assert!(matches!(
        extend_region_maps(&mut document),
        Err(PatchError::MalformedDocument(_))
    ));
    assert!(matches!(
        rewrite_geometry(&mut document, &coords),
        Err(PatchError::MalformedDocument(_))
    ));
    assert!(matches!(
        patch_document(&mut document, &coords),
        Err(PatchError::MalformedDocument(_))
    ));
    assert_eq!(document, before);
}

#[test]
fn every_full_profile_is_rewritten() {
    let mut document = settings(vec![
        ("lighting_effects_wow_raid", sampler_profile(&full_names())),
        ("lighting_effects_wow_pvp", sampler_profile(&full_names())),
    ]);
    let coords = generate(
        ScreenSize {
            width: 3440,
            height: 1440,
        },
        &GeometryParams::default(),
    );
    let report = patch_document(&mut document, &coords).expect("patch should succeed");
    assert_eq!(report.rewritten, 2);
    assert_eq!(report.extended, 0);

    let raid = region_map(&document, "lighting_effects_wow_raid");
    let pvp = region_map(&document, "lighting_effects_wow_pvp");
    for (a, b) in raid.values().zip(pvp.values()) {
        assert_eq!(a["top"], b["top"]);
        assert_eq!(a["right"], b["right"]);
    }
}

#[test]
fn foreign_region_names_do_not_qualify() {
    let mut names = full_names();
    names[4] = "Region 5";
    let mut document = settings(vec![("lighting_effects_other", sampler_profile(&names))]);
    assert_eq!(count_region_maps(&document, 18).expect("count"), 0);

    let coords = generate(FULL_HD, &GeometryParams::default());
    assert!(matches!(
        patch_document(&mut document, &coords),
        Err(PatchError::NoQualifyingRegionMap)
    ));
}

#[test]
fn serialized_patch_round_trips_unrelated_content() {
    let mut document = settings(vec![(
        "lighting_effects_wow",
        sampler_profile(&["wl11", "wl12", "wl13", "wl14", "wl15"]),
    )]);
    let coords = generate(FULL_HD, &GeometryParams::default());
    patch_document(&mut document, &coords).expect("patch should succeed");

    let text = serialize_document(&document).expect("serialize should succeed");
    assert!(text.contains("macros – données"), "non-ASCII should stay unescaped");
    assert!(text.starts_with("{\n  \"schema_version\": 11,"));

    let reparsed = parse_document(text.as_bytes()).expect("output should parse");
    assert_eq!(reparsed, document);
    assert_eq!(reparsed["lighting_effects_wow"]["effect"], "SCREEN_SAMPLER");
    assert_eq!(
        reparsed["lighting_effects_wow"]["screenSamplerInfo"]["sampleRate"],
        30
    );
}
