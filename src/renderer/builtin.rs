// renderer/builtin.rs
//! Content the engine provides itself: the copy effect used for blits and a
//! default deferred light effect.

use log::{debug, error};
use serde_json::{json, Value};

use super::device::GraphicsDevice;
use super::material::Material;
use crate::asset::{Content, ContentError, Handle};

pub const COPY: &str = "builtin_copy";
pub const DEFERRED_LIGHT: &str = "deferred_light";

const SOURCES: [(&str, &str); 7] = [
    ("builtin_copy.vert", include_str!("shaders/builtin_copy.vert")),
    ("builtin_copy.frag", include_str!("shaders/builtin_copy.frag")),
    ("deferred_common.glsl", include_str!("shaders/deferred_common.glsl")),
    ("deferred_light.vert", include_str!("shaders/deferred_light.vert")),
    ("deferred_light.frag", include_str!("shaders/deferred_light.frag")),
    ("deferred_light_ambient.frag", include_str!("shaders/deferred_light_ambient.frag")),
    ("deferred_light_debug.frag", include_str!("shaders/deferred_light_debug.frag")),
];

fn fullscreen_state() -> Value {
    json!({ "cull": false, "depthTest": false, "depthWrite": false })
}

fn copy_effect() -> Value {
    json!({
        "renderQueue": "effect",
        "passes": [{
            "name": "copy",
            "state": fullscreen_state(),
            "program": { "name": COPY, "shaders": ["builtin_copy.vert", "builtin_copy.frag"] }
        }]
    })
}

fn deferred_light_effect() -> Value {
    let additive = json!({
        "cull": false,
        "depthTest": false,
        "depthWrite": false,
        "blend": { "source": "one", "dest": "one" }
    });
    let pass = |name: &str, state: &Value, fragment: &str| {
        json!({
            "name": name,
            "lightMode": "deferred",
            "state": state,
            "program": {
                "name": format!("{DEFERRED_LIGHT}_{name}"),
                "shaders": ["deferred_light.vert", fragment]
            }
        })
    };
    json!({
        "renderQueue": "effect",
        "passes": [
            pass("ambient", &additive, "deferred_light_ambient.frag"),
            pass("light", &additive, "deferred_light.frag"),
            pass("debug", &fullscreen_state(), "deferred_light_debug.frag"),
        ]
    })
}

fn is_unknown(content: &Content, name: &str) -> bool {
    content.assets.effects.find(name).is_none()
        && matches!(content.document(name), Err(ContentError::UnknownContent(_)))
}

/// Registers built-in sources and descriptions that the content does not
/// already define.
pub fn register_defaults(content: &mut Content) {
    let copy = is_unknown(content, COPY);
    let deferred = is_unknown(content, DEFERRED_LIGHT);
    if !copy && !deferred {
        return;
    }

    for (name, source) in SOURCES {
        content.register_source(name, source);
    }
    if copy {
        content.register_document(COPY, copy_effect());
    }
    if deferred {
        debug!("Using built-in '{}' effect", DEFERRED_LIGHT);
        content.register_document(DEFERRED_LIGHT, deferred_light_effect());
    }
}

/// The material every blit without a material of its own goes through.
pub fn copy_material(
    device: &mut dyn GraphicsDevice,
    content: &mut Content,
) -> Option<Handle<Material>> {
    if let Some(material) = content.assets.materials.find(COPY) {
        return Some(material);
    }
    match content.material(device, &json!({ "name": COPY, "effect": COPY })) {
        Ok(material) => Some(material),
        Err(err) => {
            error!("Built-in copy material unavailable: {}", err);
            None
        }
    }
}
