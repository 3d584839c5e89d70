//! Loading of meshes, materials and textures from external files.
//!
//! Bytes come from an [`AssetSource`]; [`ResourceManager`] parses them with
//! [`obj`] and memoizes the results in per-kind [`cache::ResourceCache`]s.

use std::{collections::HashMap, fmt, future::Future, rc::Rc};

use crate::{
    context::InitContext,
    data_structures::{model::ModelAsset, texture::Texture},
    error::{EngineError, Result},
};

use self::cache::ResourceCache;

pub mod cache;
pub mod obj;

/// Byte-fetch capability for asset paths.
pub trait AssetSource {
    fn fetch(&self, path: &str) -> impl Future<Output = Result<Vec<u8>>>;

    fn fetch_string(&self, path: &str) -> impl Future<Output = Result<String>> {
        async move {
            let bytes = self.fetch(path).await?;
            String::from_utf8(bytes).map_err(|e| EngineError::fetch(path, e))
        }
    }
}

/// Reads assets below `root`: a directory on native targets, a path below
/// the page origin on the web.
#[derive(Clone, Debug)]
pub struct FileSource {
    root: String,
}

impl FileSource {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(root: &str, file_name: &str) -> Result<reqwest::Url> {
    let window = web_sys::window().ok_or_else(|| EngineError::fetch(file_name, "no window"))?;
    let origin = window
        .location()
        .origin()
        .map_err(|e| EngineError::fetch(file_name, format!("{e:?}")))?;
    let base = reqwest::Url::parse(&format!("{}/{}/", origin, root.trim_matches('/')))
        .map_err(|e| EngineError::fetch(file_name, e))?;
    base.join(file_name).map_err(|e| EngineError::fetch(file_name, e))
}

impl AssetSource for FileSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        #[cfg(target_arch = "wasm32")]
        let data = {
            let url = format_url(&self.root, path)?;
            let response = reqwest::get(url)
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| EngineError::fetch(path, e))?;
            response
                .bytes()
                .await
                .map_err(|e| EngineError::fetch(path, e))?
                .to_vec()
        };
        #[cfg(not(target_arch = "wasm32"))]
        let data = {
            let full = std::path::Path::new(&self.root).join(path);
            tokio::fs::read(&full)
                .await
                .map_err(|e| EngineError::fetch(full.display().to_string(), e))?
        };

        Ok(data)
    }
}

/// Assets held in memory, e.g. embedded with `include_bytes!`.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    files: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), bytes.into());
    }
}

impl AssetSource for MemorySource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| EngineError::fetch(path, "not found"))
    }
}

/// Cache key of a model load. The same file loaded with and without its
/// material library yields two different assets.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModelKey {
    Plain(String),
    Textured(String),
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKey::Plain(url) => write!(f, "{url}"),
            ModelKey::Textured(url) => write!(f, "{url} (textured)"),
        }
    }
}

/// Owns every loaded model and texture. Scoped to its owner, never global.
///
/// Handles given out are shared; callers must not destroy the textures they
/// receive.
pub struct ResourceManager<S> {
    source: Rc<S>,
    models: ResourceCache<ModelKey, ModelAsset>,
    textures: ResourceCache<String, Texture>,
    gpu: Option<InitContext>,
}

impl<S: AssetSource + 'static> ResourceManager<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Rc::new(source),
            models: ResourceCache::new(),
            textures: ResourceCache::new(),
            gpu: None,
        }
    }

    /// Makes texture loading possible. Model loads work without a device.
    pub fn bind_device(&mut self, gpu: InitContext) {
        self.gpu = Some(gpu);
    }

    pub fn has_device(&self) -> bool {
        self.gpu.is_some()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Loads a mesh in the colored layout.
    pub async fn load_model(&self, url: &str) -> Result<Rc<ModelAsset>> {
        let source = self.source.clone();
        let path = url.to_string();
        self.models
            .get_or_load(ModelKey::Plain(path.clone()), move || async move {
                let text = source.fetch_string(&path).await?;
                let mesh = obj::parse_mesh(&text);
                log::info!("loaded model {} with {} vertices", path, mesh.vertex_count);
                Ok(ModelAsset {
                    mesh,
                    texture_path: None,
                })
            })
            .await
    }

    /// Loads a mesh in the textured layout together with the diffuse texture
    /// path from its material library. A missing or unreadable library only
    /// means the model has no texture.
    pub async fn load_model_with_texture(&self, url: &str) -> Result<Rc<ModelAsset>> {
        let source = self.source.clone();
        let path = url.to_string();
        self.models
            .get_or_load(ModelKey::Textured(path.clone()), move || async move {
                let text = source.fetch_string(&path).await?;
                let materials = match obj::extract_material_lib_reference(&text, &path) {
                    Some(lib) => match source.fetch_string(&lib).await {
                        Ok(lib_text) => obj::parse_material_lib(&lib_text, &lib),
                        Err(e) => {
                            log::warn!("material library {lib} unavailable: {e}");
                            Vec::new()
                        }
                    },
                    None => Vec::new(),
                };
                let textured = obj::parse_mesh_with_texture(&text, &materials);
                log::info!(
                    "loaded textured model {} with {} vertices",
                    path,
                    textured.mesh.vertex_count
                );
                Ok(ModelAsset {
                    mesh: textured.mesh,
                    texture_path: textured.texture_path,
                })
            })
            .await
    }

    /// Fetches, decodes and uploads a texture as RGBA8.
    ///
    /// Fails with [`EngineError::ResourceNotReady`] until [`bind_device`](Self::bind_device)
    /// has been called; callers are expected to defer and retry.
    pub async fn load_texture(&self, url: &str) -> Result<Rc<Texture>> {
        let Some(gpu) = self.gpu.clone() else {
            return Err(EngineError::ResourceNotReady("texture loading"));
        };
        let source = self.source.clone();
        let path = url.to_string();
        self.textures
            .get_or_load(path.clone(), move || async move {
                let bytes = source.fetch(&path).await?;
                let texture = Texture::from_bytes(&gpu.device, &gpu.queue, &bytes, &path)?;
                log::info!("loaded texture {path}");
                Ok(texture)
            })
            .await
    }

    pub fn cached_model(&self, key: &ModelKey) -> Option<Rc<ModelAsset>> {
        self.models.get(key)
    }

    pub fn cached_texture(&self, url: &str) -> Option<Rc<Texture>> {
        self.textures.get(&url.to_string())
    }
}
