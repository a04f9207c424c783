//! Named content resolution and pooling.
//!
//! Descriptions are JSON documents registered in memory or stored as
//! `<root>/<name>.json`; shader sources are registered in memory or read
//! from `<root>/<name>`. Anything requested by name is created once and
//! handed out by handle afterwards.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde_json::Value;
use thiserror::Error;

use super::compressed::CompressedImage;
use super::{Assets, Handle, Mesh};
use crate::renderer::device::{GraphicsDevice, SamplerParams, TextureId};
use crate::renderer::error::ShaderError;
use crate::renderer::shader::{preprocess, Shader, ShaderProgram};
use crate::renderer::{Effect, Material, Texture};

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("no content named '{0}'")]
    UnknownContent(String),
    #[error("invalid description for '{name}': {reason}")]
    InvalidDescription { name: String, reason: String },
    #[error("could not read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse '{name}': {source}")]
    Json {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("texture blob truncated: expected {expected} bytes, got {actual}")]
    TruncatedBlob { expected: usize, actual: usize },
    #[error("unsupported texture format 0x{0:04X}")]
    UnsupportedTextureFormat(i32),
    #[error(transparent)]
    Shader(#[from] ShaderError),
}

fn invalid(name: &str, reason: impl Into<String>) -> ContentError {
    ContentError::InvalidDescription {
        name: name.to_owned(),
        reason: reason.into(),
    }
}

#[derive(Default)]
pub struct Content {
    root: Option<PathBuf>,
    documents: HashMap<String, Value>,
    sources: HashMap<String, String>,
    pub assets: Assets,
}

impl Content {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::default()
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn register_document(&mut self, name: impl Into<String>, json: Value) {
        self.documents.insert(name.into(), json);
    }

    pub fn register_source(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(name.into(), source.into());
    }

    fn read_file(&self, file: &str) -> Result<Option<String>, ContentError> {
        let Some(root) = &self.root else {
            return Ok(None);
        };
        let path = root.join(file);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ContentError::Io { path, source }),
        }
    }

    /// The JSON document registered or stored under `name`.
    pub fn document(&self, name: &str) -> Result<Value, ContentError> {
        if let Some(json) = self.documents.get(name) {
            return Ok(json.clone());
        }
        let text = self
            .read_file(&format!("{name}.json"))?
            .ok_or_else(|| ContentError::UnknownContent(name.to_owned()))?;
        serde_json::from_str(&text).map_err(|source| ContentError::Json {
            name: name.to_owned(),
            source,
        })
    }

    pub fn source(&self, name: &str) -> Result<String, ContentError> {
        if let Some(source) = self.sources.get(name) {
            return Ok(source.clone());
        }
        self.read_file(name)?
            .ok_or_else(|| ContentError::UnknownContent(name.to_owned()))
    }

    pub fn shader(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: &str,
    ) -> Result<Handle<Shader>, ContentError> {
        if let Some(handle) = self.assets.shaders.find(name) {
            return Ok(handle);
        }

        let text = self.source(name)?;
        let resolve = |include: &str| self.source(include).ok();
        let source = preprocess(name, &text, &resolve)?;

        let shader = Shader::compile(device, name, &source);
        Ok(self.assets.shaders.insert_named(name, shader))
    }

    /// Resolves a program reference: a document name, a `{ name, shaders }`
    /// object or an array of shader names.
    pub fn program(
        &mut self,
        device: &mut dyn GraphicsDevice,
        json: &Value,
    ) -> Result<Handle<ShaderProgram>, ContentError> {
        match json {
            Value::String(name) => {
                if let Some(handle) = self.assets.programs.find(name) {
                    return Ok(handle);
                }
                let doc = self.document(name)?;
                self.build_program(device, Some(name), &doc)
            }
            Value::Object(_) => {
                let name = json.get("name").and_then(Value::as_str);
                if let Some(handle) = name.and_then(|n| self.assets.programs.find(n)) {
                    return Ok(handle);
                }
                self.build_program(device, name, json)
            }
            Value::Array(_) => {
                let names = shader_names("program", json)?;
                let name = names.join("+");
                if let Some(handle) = self.assets.programs.find(&name) {
                    return Ok(handle);
                }
                self.link(device, Some(&name), &names)
            }
            _ => Err(invalid("program", "expected a name, object or array")),
        }
    }

    fn build_program(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: Option<&str>,
        json: &Value,
    ) -> Result<Handle<ShaderProgram>, ContentError> {
        let label = name.unwrap_or("<inline program>");
        let shaders = json
            .get("shaders")
            .ok_or_else(|| invalid(label, "missing 'shaders'"))?;
        let names = shader_names(label, shaders)?;
        self.link(device, name, &names)
    }

    fn link(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: Option<&str>,
        shader_names: &[String],
    ) -> Result<Handle<ShaderProgram>, ContentError> {
        let handles = shader_names
            .iter()
            .map(|s| self.shader(device, s))
            .collect::<Result<Vec<_>, _>>()?;
        let stages: Vec<&Shader> = handles
            .iter()
            .filter_map(|&h| self.assets.shaders.get(h))
            .collect();

        let label = name.unwrap_or("<inline program>");
        let program = ShaderProgram::link(device, label, &stages);
        debug!("Linked program '{}' (good: {})", label, program.is_good());

        Ok(match name {
            Some(name) => self.assets.programs.insert_named(name, program),
            None => self.assets.programs.insert(program),
        })
    }

    /// Resolves an effect by name or from an inline description. Passes with
    /// unusable programs are reported here, once per effect.
    pub fn effect(
        &mut self,
        device: &mut dyn GraphicsDevice,
        json: &Value,
    ) -> Result<Handle<Effect>, ContentError> {
        let (name, doc) = match self.pooled_or_document(json, |a, n| a.effects.find(n))? {
            Pooled::Found(handle) => return Ok(handle),
            Pooled::Build(name, doc) => (name, doc),
        };
        let label = name.as_deref().unwrap_or("<inline effect>");

        let mut programs: Vec<(Value, Option<Handle<ShaderProgram>>)> = Vec::new();
        for pass in doc
            .get("passes")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let Some(reference) = pass.get("program") else {
                continue;
            };
            if programs.iter().any(|(r, _)| r == reference) {
                continue;
            }
            let handle = match self.program(device, reference) {
                Ok(handle) => Some(handle),
                Err(err) => {
                    warn!("Effect '{}': {}", label, err);
                    None
                }
            };
            programs.push((reference.clone(), handle));
        }

        let textures = &self.assets;
        let effect = Effect::from_json(
            label,
            &doc,
            &mut |reference| {
                programs
                    .iter()
                    .find(|(r, _)| r == reference)
                    .and_then(|(_, h)| *h)
            },
            &mut |texture| textures.texture_id(texture),
        );
        effect.report_unusable_passes(&self.assets.programs);

        Ok(match name {
            Some(name) => self.assets.effects.insert_named(name, effect),
            None => self.assets.effects.insert(effect),
        })
    }

    pub fn material(
        &mut self,
        device: &mut dyn GraphicsDevice,
        json: &Value,
    ) -> Result<Handle<Material>, ContentError> {
        let (name, doc) = match self.pooled_or_document(json, |a, n| a.materials.find(n))? {
            Pooled::Found(handle) => return Ok(handle),
            Pooled::Build(name, doc) => (name, doc),
        };
        let mut material = Material::new(name.as_deref().unwrap_or("<inline material>"));

        if let Some(effect_json) = doc.get("effect") {
            let handle = self.effect(device, effect_json)?;
            if let Some(effect) = self.assets.effects.get(handle) {
                material.set_effect(handle, effect);
            }
        }
        if let Some(properties) = doc.get("properties") {
            let assets = &self.assets;
            material.assign_json(properties, &mut |texture| assets.texture_id(texture));
        }

        Ok(match name {
            Some(name) => self.assets.materials.insert_named(name, material),
            None => self.assets.materials.insert(material),
        })
    }

    fn pooled_or_document<T>(
        &self,
        json: &Value,
        find: impl Fn(&Assets, &str) -> Option<Handle<T>>,
    ) -> Result<Pooled<T>, ContentError> {
        match json {
            Value::String(name) => match find(&self.assets, name) {
                Some(handle) => Ok(Pooled::Found(handle)),
                None => Ok(Pooled::Build(Some(name.clone()), self.document(name)?)),
            },
            Value::Object(_) => {
                let name = json.get("name").and_then(Value::as_str).map(str::to_owned);
                match name.as_deref().and_then(|n| find(&self.assets, n)) {
                    Some(handle) => Ok(Pooled::Found(handle)),
                    None => Ok(Pooled::Build(name, json.clone())),
                }
            }
            _ => Err(invalid("content", "expected a name or an object")),
        }
    }

    pub fn register_texture(&mut self, name: impl Into<String>, texture: Texture) -> Handle<Texture> {
        self.assets.textures.insert_named(name, texture)
    }

    /// 1x1 RGBA texture of a single colour.
    pub fn register_solid_texture(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        rgba: [u8; 4],
    ) -> Handle<Texture> {
        let texture = Texture::from_rgba8(device, name, 1, 1, &rgba, true, SamplerParams::POINT_REPEAT);
        self.register_texture(name, texture)
    }

    pub fn load_texture_blob(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        bytes: &[u8],
    ) -> Result<Handle<Texture>, ContentError> {
        let image = CompressedImage::parse(bytes)?;
        let texture = Texture::from_compressed(device, name, &image)?;
        Ok(self.register_texture(name, texture))
    }

    /// Loads `<root>/<name>` as a compressed texture blob.
    pub fn load_texture_file(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: &str,
    ) -> Result<Handle<Texture>, ContentError> {
        if let Some(handle) = self.assets.textures.find(name) {
            return Ok(handle);
        }
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| ContentError::UnknownContent(name.to_owned()))?;
        let path = root.join(name);
        let bytes = fs::read(&path).map_err(|source| ContentError::Io { path, source })?;
        info!("Importing texture '{}' ({} bytes)", name, bytes.len());
        self.load_texture_blob(device, name, &bytes)
    }

    pub fn add_mesh(&mut self, name: impl Into<String>, mesh: Mesh) -> Handle<Mesh> {
        self.assets.meshes.insert_named(name, mesh)
    }
}

enum Pooled<T> {
    Found(Handle<T>),
    Build(Option<String>, Value),
}

fn shader_names(owner: &str, json: &Value) -> Result<Vec<String>, ContentError> {
    let names = json.as_array().and_then(|items| {
        items
            .iter()
            .map(|v| v.as_str().map(str::to_owned))
            .collect::<Option<Vec<_>>>()
    });
    match names {
        Some(names) if !names.is_empty() => Ok(names),
        _ => Err(invalid(owner, "shaders must be a non-empty array of names")),
    }
}
