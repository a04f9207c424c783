use std::io::ErrorKind;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default = "RenderSettings::default_true")]
    pub deferred_enabled: bool,
    #[serde(default = "RenderSettings::default_true")]
    pub frustum_culling: bool,
    /// Additive light passes per forward object; `null` means unlimited.
    #[serde(default = "RenderSettings::default_max_forward_lights")]
    pub max_forward_lights: Option<u32>,
    #[serde(default = "RenderSettings::default_deferred_light_effect")]
    pub deferred_light_effect: String,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default = "RenderSettings::default_aux_buffer_count")]
    pub aux_buffer_count: u32,
    #[serde(default = "RenderSettings::default_clear_color")]
    pub clear_color: [f32; 4],
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            deferred_enabled: true,
            frustum_culling: true,
            max_forward_lights: Self::default_max_forward_lights(),
            deferred_light_effect: Self::default_deferred_light_effect(),
            resolution: Resolution::default(),
            aux_buffer_count: Self::default_aux_buffer_count(),
            clear_color: Self::default_clear_color(),
        }
    }
}

impl RenderSettings {
    pub fn load() -> Self {
        Self::load_from_path("settings.json")
    }

    /// Reads settings from a JSON file. Missing, unreadable or malformed
    /// files yield the defaults; parsed values pass through [`Self::validate`].
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("No render settings at {}, using defaults", path.display());
                return Self::default();
            }
            Err(err) => {
                warn!("Cannot read {}: {}; using default settings", path.display(), err);
                return Self::default();
            }
        };

        serde_json::from_str::<Self>(&text)
            .map(|settings| {
                info!("Render settings read from {}", path.display());
                settings.validate()
            })
            .unwrap_or_else(|err| {
                warn!("Invalid render settings in {}: {}; using defaults", path.display(), err);
                Self::default()
            })
    }

    pub fn validate(mut self) -> Self {
        if self.resolution.width == 0 || self.resolution.height == 0 {
            warn!("Resolution must be greater than zero. Using default resolution.");
            self.resolution = Resolution::default();
        }

        if self.aux_buffer_count < Self::MIN_AUX_BUFFERS {
            warn!(
                "Post processing needs at least {} auxiliary buffers. Using {}.",
                Self::MIN_AUX_BUFFERS,
                Self::MIN_AUX_BUFFERS
            );
            self.aux_buffer_count = Self::MIN_AUX_BUFFERS;
        }

        if self.deferred_light_effect.trim().is_empty() {
            warn!("Deferred light effect name is empty. Using default.");
            self.deferred_light_effect = Self::default_deferred_light_effect();
        }

        if self.clear_color.iter().any(|c| !c.is_finite()) {
            warn!("Clear color must be finite. Using default.");
            self.clear_color = Self::default_clear_color();
        }

        self
    }

    pub const MIN_AUX_BUFFERS: u32 = 2;

    const fn default_true() -> bool {
        true
    }

    const fn default_max_forward_lights() -> Option<u32> {
        Some(8)
    }

    fn default_deferred_light_effect() -> String {
        "deferred_light".to_owned()
    }

    const fn default_aux_buffer_count() -> u32 {
        Self::MIN_AUX_BUFFERS
    }

    const fn default_clear_color() -> [f32; 4] {
        [0.0, 0.0, 0.0, 1.0]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}
