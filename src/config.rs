use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error_codes::CodedError;
use crate::geometry::{GeometryParams, GeometryPreset, ScreenBounds, ScreenSize};

const DEFAULT_CONFIG_DIR_NAME: &str = "wlights";
const DEFAULT_CONFIG_FILE_NAME: &str = "config.yaml";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundsFile {
    #[serde(default)]
    pub min_width: Option<u32>,
    #[serde(default)]
    pub max_width: Option<u32>,
    #[serde(default)]
    pub min_height: Option<u32>,
    #[serde(default)]
    pub max_height: Option<u32>,
}

/// On-disk shape of `config.yaml`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub preset: Option<GeometryPreset>,
    #[serde(default)]
    pub grid_size: Option<u32>,
    #[serde(default)]
    pub aspect_scale: Option<f64>,
    #[serde(default)]
    pub shift: Option<i32>,
    #[serde(default)]
    pub margin: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub bounds: Option<BoundsFile>,
}

/// Command-line values layered over the config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub preset: Option<GeometryPreset>,
    pub grid_size: Option<u32>,
    pub aspect_scale: Option<f64>,
    pub shift: Option<i32>,
    pub margin: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub params: GeometryParams,
    pub screen: Option<ScreenSize>,
    pub bounds: ScreenBounds,
}

impl Settings {
    /// The validated screen size, or a usage error naming what is missing.
    pub fn screen(&self) -> Result<ScreenSize> {
        let Some(screen) = self.screen else {
            return Err(anyhow!(CodedError::usage(
                "MISSING_SCREEN_SIZE",
                "screen size is required: pass --width and --height or set them in the config file",
            )));
        };
        self.bounds.validate(screen)?;
        Ok(screen)
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    let base = user_config_dir()?;
    Ok(base
        .join(DEFAULT_CONFIG_DIR_NAME)
        .join(DEFAULT_CONFIG_FILE_NAME))
}

/// Loads an explicit config path, or the default one when it exists.
pub fn load_config_file(config_override: Option<&Path>) -> Result<ConfigFile> {
    let path = match config_override {
        Some(path) => path.to_path_buf(),
        None => {
            let path = default_config_path()?;
            if !path.exists() {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(ConfigFile::default());
            }
            path
        }
    };

    let text = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    if text.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    let parsed: ConfigFile = serde_yaml::from_str(&text)
        .with_context(|| format!("failed to parse config yaml at {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(parsed)
}

pub fn resolve_settings(file: &ConfigFile, overrides: &Overrides) -> Result<Settings> {
    let preset = overrides
        .preset
        .or(file.preset)
        .unwrap_or(GeometryPreset::Default);
    let base = preset.params();

    let params = GeometryParams {
        grid_size: overrides
            .grid_size
            .or(file.grid_size)
            .unwrap_or(base.grid_size),
        aspect_scale: overrides
            .aspect_scale
            .or(file.aspect_scale)
            .unwrap_or(base.aspect_scale),
        shift: overrides.shift.or(file.shift).unwrap_or(base.shift),
        margin: overrides.margin.or(file.margin).unwrap_or(base.margin),
    };
    params.validate()?;

    let bounds = resolve_bounds(file.bounds.unwrap_or_default())?;

    let width = overrides.width.or(file.width);
    let height = overrides.height.or(file.height);
    let screen = match (width, height) {
        (Some(width), Some(height)) => Some(ScreenSize { width, height }),
        (None, None) => None,
        _ => {
            return Err(anyhow!(CodedError::usage(
                "MISSING_SCREEN_SIZE",
                "width and height must be given together",
            )
            .with_details(json!({ "width": width, "height": height }))));
        }
    };

    Ok(Settings {
        params,
        screen,
        bounds,
    })
}

fn resolve_bounds(file: BoundsFile) -> Result<ScreenBounds> {
    let defaults = ScreenBounds::default();
    let min_width = file.min_width.unwrap_or(*defaults.width.start());
    let max_width = file.max_width.unwrap_or(*defaults.width.end());
    let min_height = file.min_height.unwrap_or(*defaults.height.start());
    let max_height = file.max_height.unwrap_or(*defaults.height.end());

    if min_width == 0 || min_height == 0 {
        bail!("screen bounds must be positive");
    }
    if min_width > max_width || min_height > max_height {
        bail!(
            "screen bounds are inverted: width {min_width}..={max_width}, height {min_height}..={max_height}"
        );
    }
    Ok(ScreenBounds {
        width: min_width..=max_width,
        height: min_height..=max_height,
    })
}

fn user_config_dir() -> Result<PathBuf> {
    let home = || env::var_os("HOME").map(PathBuf::from);
    let dir = if cfg!(target_os = "windows") {
        env::var_os("APPDATA").map(PathBuf::from).or_else(|| {
            env::var_os("USERPROFILE")
                .map(|profile| PathBuf::from(profile).join("AppData").join("Roaming"))
        })
    } else if cfg!(target_os = "macos") {
        home().map(|home| home.join("Library").join("Application Support"))
    } else {
        env::var_os("XDG_CONFIG_HOME")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .or_else(|| home().map(|home| home.join(".config")))
    };
    dir.ok_or_else(|| anyhow!("no user config directory could be resolved on {}", env::consts::OS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_reproduce_fixed_layout() {
        let settings =
            resolve_settings(&ConfigFile::default(), &Overrides::default()).expect("resolve");
        assert_eq!(settings.params, GeometryParams::default());
        assert_eq!(settings.screen, None);
        assert_eq!(settings.bounds, ScreenBounds::default());
        assert!(settings.screen().is_err());
    }

    #[test]
    fn overrides_win_over_file_and_preset() {
        let file = ConfigFile {
            preset: Some(GeometryPreset::Windows),
            shift: Some(7),
            width: Some(2560),
            height: Some(1440),
            ..ConfigFile::default()
        };
        let overrides = Overrides {
            margin: Some(0),
            width: Some(1920),
            height: Some(1080),
            ..Overrides::default()
        };
        let settings = resolve_settings(&file, &overrides).expect("resolve");
        assert_eq!(
            settings.params,
            GeometryParams {
                grid_size: 5,
                aspect_scale: 1.2,
                shift: 7,
                margin: 0,
            }
        );
        assert_eq!(
            settings.screen().expect("screen"),
            ScreenSize {
                width: 1920,
                height: 1080
            }
        );
    }

    #[test]
    fn half_a_screen_size_is_rejected() {
        let overrides = Overrides {
            width: Some(1920),
            ..Overrides::default()
        };
        assert!(resolve_settings(&ConfigFile::default(), &overrides).is_err());
    }

    #[test]
    fn bounds_from_file_loosen_validation() {
        let file = ConfigFile {
            bounds: Some(BoundsFile {
                min_width: Some(640),
                min_height: Some(480),
                ..BoundsFile::default()
            }),
            width: Some(800),
            height: Some(600),
            ..ConfigFile::default()
        };
        let settings = resolve_settings(&file, &Overrides::default()).expect("resolve");
        assert!(settings.screen().is_ok());

        let inverted = ConfigFile {
            bounds: Some(BoundsFile {
                min_width: Some(5000),
                max_width: Some(4000),
                ..BoundsFile::default()
            }),
            ..ConfigFile::default()
        };
        assert!(resolve_settings(&inverted, &Overrides::default()).is_err());
    }

    #[test]
    fn load_config_file_reads_yaml() {
        let dir = tempdir().expect("tempdir should create");
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "preset: windows\ngrid_size: 6\nbounds:\n  max_width: 10000\n",
        )
        .expect("config should write");

        let file = load_config_file(Some(path.as_path())).expect("config should load");
        assert_eq!(file.preset, Some(GeometryPreset::Windows));
        assert_eq!(file.grid_size, Some(6));
        assert_eq!(file.bounds.and_then(|bounds| bounds.max_width), Some(10000));
    }

    #[test]
    fn load_config_file_rejects_unknown_fields() {
        let dir = tempdir().expect("tempdir should create");
        let path = dir.path().join("config.yaml");
        fs::write(&path, "gridsize: 6\n").expect("config should write");
        assert!(load_config_file(Some(path.as_path())).is_err());
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    #[test]
    fn default_config_path_lives_under_the_config_dir() {
        let path = default_config_path().expect("config path should resolve");
        assert!(path.ends_with("wlights/config.yaml"), "{}", path.display());
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let dir = tempdir().expect("tempdir should create");
        assert!(load_config_file(Some(dir.path().join("absent.yaml").as_path())).is_err());
    }
}
