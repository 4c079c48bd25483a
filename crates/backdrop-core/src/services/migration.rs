//! 旧版设置迁移
//!
//! Blobs written before 1.5.1 kept one flat wallpaper plus day/week path
//! arrays. They are rewritten into the slot array in place, on the raw JSON,
//! before typed deserialisation.

use serde_json::{Map, Value};

use crate::models::{WallpaperConfig, CURRENT_VERSION, DAY_SLOT, RESERVED_SLOTS, WEEKLY_START};

/// Blobs older than this are migrated.
pub const MIGRATION_VERSION: &str = "1.5.1";

const LEGACY_MARKERS: &[&str] = &["wallpaperPath", "scheduledWallpapers", "scheduled"];

/// Flat keys and the slot field each maps to.
const FLAT_FIELDS: &[(&str, &str)] = &[
    ("zIndex", "zIndex"),
    ("opacity", "opacity"),
    ("playbackSpeed", "playbackSpeed"),
    ("Quality", "Quality"),
    ("blurRadius", "blurRadius"),
    ("Reposition", "Reposition"),
    ("PositionX", "positionX"),
    ("PositionY", "positionY"),
    ("Position", "position"),
    ("Scale", "Scale"),
    ("useObjectFit", "useObjectFit"),
];

const OBSOLETE_KEYS: &[&str] = &[
    "wallpaperPath",
    "wallpaperType",
    "playbackSpeed",
    "Quality",
    "Reposition",
    "opacity",
    "zIndex",
    "blurRadius",
    "brightness",
    "PositionX",
    "PositionY",
    "Position",
    "Scale",
    "useObjectFit",
];

/// Dotted version comparison; missing parts count as 0.
pub fn is_version_less(current: &str, target: &str) -> bool {
    let parse = |v: &str| -> Vec<u64> {
        v.trim()
            .split('.')
            .map(|p| p.trim().parse::<u64>().unwrap_or(0))
            .collect()
    };
    let (current, target) = (parse(current), parse(target));
    for (i, t) in target.iter().enumerate() {
        let c = current.get(i).copied().unwrap_or(0);
        if c != *t {
            return c < *t;
        }
    }
    false
}

/// Whether `blob` predates the slot array layout.
pub fn needs_migration(blob: &Map<String, Value>) -> bool {
    match blob.get("LatestVersion").and_then(Value::as_str) {
        Some(version) => is_version_less(version, MIGRATION_VERSION),
        None => LEGACY_MARKERS.iter().any(|k| blob.contains_key(*k)),
    }
}

/// Migrate `blob` in place. Returns `true` if anything was rewritten.
pub fn migrate_legacy(blob: &mut Map<String, Value>) -> bool {
    if !needs_migration(blob) {
        return false;
    }
    let from = blob
        .get("LatestVersion")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();
    tracing::info!(
        from = %from,
        to = CURRENT_VERSION,
        "迁移旧版设置"
    );

    let mut scheduled = blob
        .get("scheduledWallpapers")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    split_combined_arrays(&mut scheduled);

    let mut configs: Vec<Value> = blob
        .get("WallpaperConfigs")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for i in configs.len()..RESERVED_SLOTS {
        configs.push(default_slot(i));
    }

    let overlay = flat_overlay(blob);

    if let Some(path) = blob
        .get("wallpaperPath")
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
    {
        let kind = valid_kind(blob.get("wallpaperType"));
        let slot = merged_slot(configs.first(), &overlay, path, kind, 0);
        configs[0] = slot.clone();

        let global = blob
            .entry("globalConfig")
            .or_insert_with(|| serde_json::json!({ "enabled": true }));
        if let Some(global) = global.as_object_mut() {
            global.insert("config".to_string(), slot);
        }
    }

    for (paths_key, types_key, first_slot) in [
        ("wallpaperDayPaths", "wallpaperDayTypes", DAY_SLOT),
        ("wallpaperWeekPaths", "wallpaperWeekTypes", WEEKLY_START),
    ] {
        let Some(paths) = scheduled.get(paths_key).and_then(Value::as_array) else {
            continue;
        };
        let types = scheduled.get(types_key).and_then(Value::as_array);
        for (i, path) in paths.iter().enumerate() {
            let slot = first_slot + i;
            if slot >= configs.len() {
                break;
            }
            let path = path.as_str().unwrap_or_default();
            let kind = valid_kind(types.and_then(|t| t.get(i)));
            configs[slot] = merged_slot(configs.get(slot), &overlay, path, kind, slot);
        }
    }

    blob.insert("WallpaperConfigs".to_string(), Value::Array(configs));
    blob.remove("scheduledWallpapers");
    blob.remove("scheduled");
    for key in OBSOLETE_KEYS {
        blob.remove(*key);
    }
    blob.insert("LatestVersion".to_string(), Value::from(CURRENT_VERSION));
    true
}

/// Oldest layout kept day and week paths in one array.
fn split_combined_arrays(scheduled: &mut Map<String, Value>) {
    if let Some(Value::Array(paths)) = scheduled.remove("wallpaperPaths") {
        let day: Vec<Value> = (0..2)
            .map(|i| paths.get(i).cloned().unwrap_or_else(|| Value::from("")))
            .collect();
        let week: Vec<Value> = paths.iter().skip(2).take(7).cloned().collect();
        scheduled.insert("wallpaperDayPaths".to_string(), Value::Array(day));
        scheduled.insert("wallpaperWeekPaths".to_string(), Value::Array(week));
    }
    if let Some(Value::Array(types)) = scheduled.remove("wallpaperTypes") {
        let day: Vec<Value> = (0..2)
            .map(|i| Value::from(valid_kind(types.get(i))))
            .collect();
        let week: Vec<Value> = types
            .iter()
            .skip(2)
            .take(7)
            .map(|t| Value::from(valid_kind(Some(t))))
            .collect();
        scheduled.insert("wallpaperDayTypes".to_string(), Value::Array(day));
        scheduled.insert("wallpaperWeekTypes".to_string(), Value::Array(week));
    }
}

fn valid_kind(value: Option<&Value>) -> &'static str {
    match value.and_then(Value::as_str) {
        Some("video") => "video",
        Some("gif") => "gif",
        _ => "image",
    }
}

fn default_slot(index: usize) -> Value {
    serde_json::to_value(WallpaperConfig::for_slot(index)).unwrap_or(Value::Null)
}

fn flat_overlay(blob: &Map<String, Value>) -> Map<String, Value> {
    FLAT_FIELDS
        .iter()
        .filter_map(|(from, to)| blob.get(*from).map(|v| (to.to_string(), v.clone())))
        .collect()
}

/// Defaults, then the existing slot, then the flat fields, then media.
fn merged_slot(
    existing: Option<&Value>,
    overlay: &Map<String, Value>,
    path: &str,
    kind: &str,
    index: usize,
) -> Value {
    let mut slot = match default_slot(index) {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if let Some(Value::Object(existing)) = existing {
        slot.extend(existing.clone());
    }
    slot.extend(overlay.clone());
    slot.insert("path".to_string(), Value::from(path));
    slot.insert("type".to_string(), Value::from(kind));
    slot.insert("Index".to_string(), Value::from(index));
    Value::Object(slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BackdropSettings;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_is_version_less() {
        assert!(is_version_less("1.4.9", "1.5.1"));
        assert!(is_version_less("1.5", "1.5.1"));
        assert!(!is_version_less("1.5.1", "1.5.1"));
        assert!(!is_version_less("1.5.8", "1.5.1"));
        assert!(!is_version_less("2.0.0", "1.5.1"));
    }

    #[test]
    fn test_current_blob_untouched() {
        let mut blob = object(json!({ "LatestVersion": "1.5.8", "wallpaperPath": "x.png" }));
        assert!(!migrate_legacy(&mut blob));
        assert!(blob.contains_key("wallpaperPath"));
    }

    #[test]
    fn test_flat_fields_become_slot_zero_and_global() {
        let mut blob = object(json!({
            "LatestVersion": "1.4.0",
            "wallpaperPath": "plugins/b/wallpaper/old.mp4",
            "wallpaperType": "video",
            "opacity": 55,
            "PositionX": 20,
            "brightness": 90,
            "Color": "#fff"
        }));
        assert!(migrate_legacy(&mut blob));

        let settings: BackdropSettings = serde_json::from_value(Value::Object(blob)).unwrap();
        let slot = &settings.wallpaper_configs[0];
        assert_eq!(slot.path, "plugins/b/wallpaper/old.mp4");
        assert_eq!(slot.kind, crate::models::WallpaperKind::Video);
        assert_eq!(slot.opacity, 55.0);
        assert_eq!(slot.position_x, 20.0);
        assert_eq!(settings.global_config.config.path, slot.path);
        assert!(settings.global_config.enabled);
        assert_eq!(settings.latest_version, CURRENT_VERSION);
        assert!(settings.extra.contains_key("Color"));
        assert!(!settings.extra.contains_key("brightness"));
        assert!(!settings.extra.contains_key("wallpaperPath"));
    }

    #[test]
    fn test_scheduled_arrays_fill_day_and_week_slots() {
        let mut blob = object(json!({
            "LatestVersion": "1.5.0",
            "scheduledWallpapers": {
                "wallpaperDayPaths": ["day.png", "night.gif"],
                "wallpaperDayTypes": ["image", "gif"],
                "wallpaperWeekPaths": ["mon.png", "tue.png"],
                "options": { "dayNightMode": true }
            }
        }));
        assert!(migrate_legacy(&mut blob));
        assert!(!blob.contains_key("scheduledWallpapers"));

        let configs = blob["WallpaperConfigs"].as_array().unwrap();
        assert_eq!(configs.len(), RESERVED_SLOTS);
        assert_eq!(configs[1]["path"], "day.png");
        assert_eq!(configs[2]["type"], "gif");
        assert_eq!(configs[3]["path"], "mon.png");
        assert_eq!(configs[4]["Index"], 4);
        assert_eq!(configs[5]["path"], "");
    }

    #[test]
    fn test_combined_arrays_are_split() {
        let mut blob = object(json!({
            "scheduledWallpapers": {
                "wallpaperPaths": ["d.png", "n.png", "w0.png", "w1.png"],
                "wallpaperTypes": ["image", "bogus", "video"]
            }
        }));
        assert!(migrate_legacy(&mut blob));

        let configs = blob["WallpaperConfigs"].as_array().unwrap();
        assert_eq!(configs[1]["path"], "d.png");
        assert_eq!(configs[2]["path"], "n.png");
        assert_eq!(configs[2]["type"], "image");
        assert_eq!(configs[3]["path"], "w0.png");
        assert_eq!(configs[3]["type"], "video");
        assert_eq!(configs[4]["path"], "w1.png");
        assert_eq!(configs[4]["type"], "image");
    }
}
