//! Avatar model loading
//!
//! Parses GLB/VRM documents with the `gltf` crate and keeps the summary a rig
//! needs: humanoid bone map, node and mesh counts, and standing height.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::AsyncReadExt;

use crate::error::LoadError;

/// Height used when a model carries neither mesh bounds nor a head bone
pub const DEFAULT_AVATAR_HEIGHT: f32 = 1.6;

/// Largest model the loader will read
pub const DEFAULT_MAX_MODEL_BYTES: u64 = 64 * 1024 * 1024;

/// GLB header: magic(4) + version(4) + length(4), then chunk length(4) + type(4)
const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_JSON_OFFSET: usize = 20;

/// A parsed avatar model
#[derive(Debug, Clone, PartialEq)]
pub struct AvatarModel {
    name: String,
    node_count: usize,
    mesh_count: usize,
    /// VRM humanoid bone name (lowercase) → node index
    bone_to_node: HashMap<String, usize>,
    height: f32,
}

impl AvatarModel {
    /// Parse a GLB or glTF JSON document
    pub fn from_slice(name: &str, data: &[u8]) -> Result<Self, LoadError> {
        let gltf = gltf::Gltf::from_slice(data).map_err(|e| LoadError::Parse {
            name: name.to_string(),
            message: e.to_string(),
        })?;

        let node_count = gltf.nodes().count();
        let mesh_count = gltf.meshes().count();

        let bone_to_node = document_json(data)
            .map(|root| parse_humanoid_bones(&root))
            .unwrap_or_default();

        let height = mesh_height(&gltf)
            .or_else(|| head_height(&gltf, &bone_to_node))
            .unwrap_or(DEFAULT_AVATAR_HEIGHT);

        tracing::debug!(
            "Parsed model {}: {} nodes, {} meshes, {} humanoid bones, height {:.2}",
            name,
            node_count,
            mesh_count,
            bone_to_node.len(),
            height
        );

        Ok(Self {
            name: name.to_string(),
            node_count,
            mesh_count,
            bone_to_node,
            height,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn mesh_count(&self) -> usize {
        self.mesh_count
    }

    /// Humanoid bone map (empty for plain glTF models)
    pub fn bones(&self) -> &HashMap<String, usize> {
        &self.bone_to_node
    }

    /// Whether the model declares a VRM humanoid
    pub fn is_vrm(&self) -> bool {
        !self.bone_to_node.is_empty()
    }

    /// Standing height in meters
    pub fn height(&self) -> f32 {
        self.height
    }
}

/// Extract the JSON chunk of a GLB, or parse the whole slice as glTF JSON.
fn document_json(data: &[u8]) -> Option<serde_json::Value> {
    if data.starts_with(GLB_MAGIC) {
        if data.len() < GLB_JSON_OFFSET {
            return None;
        }
        let json_length = u32::from_le_bytes([data[12], data[13], data[14], data[15]]) as usize;
        let json_data = data.get(GLB_JSON_OFFSET..GLB_JSON_OFFSET + json_length)?;
        serde_json::from_slice(json_data).ok()
    } else {
        serde_json::from_slice(data).ok()
    }
}

/// VRM 1.0 (`VRMC_vrm`) first, then VRM 0.x (`VRM`)
fn parse_humanoid_bones(root: &serde_json::Value) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    let extensions = match root.get("extensions") {
        Some(e) => e,
        None => return map,
    };

    if let Some(bones) = extensions
        .get("VRMC_vrm")
        .and_then(|v| v.get("humanoid"))
        .and_then(|h| h.get("humanBones"))
        .and_then(|b| b.as_object())
    {
        for (bone_name, data) in bones {
            if let Some(node) = data.get("node").and_then(|n| n.as_u64()) {
                map.insert(bone_name.to_lowercase(), node as usize);
            }
        }
    }

    if map.is_empty() {
        if let Some(bones) = extensions
            .get("VRM")
            .and_then(|v| v.get("humanoid"))
            .and_then(|h| h.get("humanBones"))
            .and_then(|b| b.as_array())
        {
            for bone in bones {
                if let (Some(name), Some(node)) = (
                    bone.get("bone").and_then(|b| b.as_str()),
                    bone.get("node").and_then(|n| n.as_u64()),
                ) {
                    map.insert(name.to_lowercase(), node as usize);
                }
            }
        }
    }

    map
}

/// Vertical extent of all mesh primitive bounds
fn mesh_height(gltf: &gltf::Gltf) -> Option<f32> {
    let mut min_y = f32::INFINITY;
    let mut max_y = f32::NEG_INFINITY;

    for mesh in gltf.meshes() {
        for primitive in mesh.primitives() {
            let bounds = primitive.bounding_box();
            min_y = min_y.min(bounds.min[1]);
            max_y = max_y.max(bounds.max[1]);
        }
    }

    (max_y > min_y).then_some(max_y - min_y)
}

/// Head bone height from accumulated rest translations (rotations ignored)
fn head_height(gltf: &gltf::Gltf, bones: &HashMap<String, usize>) -> Option<f32> {
    let head = *bones.get("head")?;

    let node_count = gltf.nodes().count();
    let mut parents = vec![None; node_count];
    let mut local_y = vec![0.0f32; node_count];
    for node in gltf.nodes() {
        for child in node.children() {
            parents[child.index()] = Some(node.index());
        }
        let (translation, _, _) = node.transform().decomposed();
        local_y[node.index()] = translation[1];
    }

    let mut current = Some(head).filter(|&i| i < node_count);
    let mut height = 0.0;
    let mut steps = 0;
    while let Some(index) = current {
        height += local_y[index];
        current = parents[index];
        steps += 1;
        if steps > node_count {
            // Cyclic hierarchy; give up rather than loop
            return None;
        }
    }

    (height > 0.0).then_some(height)
}

/// Asynchronous avatar model source
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Fetch and parse the model at `url`
    async fn load(&self, url: &str) -> Result<AvatarModel, LoadError>;
}

/// Loads models over HTTP(S) or from the local filesystem
pub struct GltfLoader {
    client: reqwest::Client,
    max_bytes: u64,
}

impl GltfLoader {
    /// Create a loader whose HTTP requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, LoadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoadError::Fetch {
                url: String::new(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            max_bytes: DEFAULT_MAX_MODEL_BYTES,
        })
    }

    /// Refuse models larger than `max_bytes`
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    async fn read(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            self.read_remote(url).await
        } else {
            self.read_file(url.strip_prefix("file://").unwrap_or(url)).await
        }
    }

    async fn read_remote(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        let fetch_err = |message: String| LoadError::Fetch {
            url: url.to_string(),
            message,
        };
        let too_large = || LoadError::TooLarge {
            url: url.to_string(),
            limit: self.max_bytes,
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(fetch_err(format!("status {}", response.status())));
        }
        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(too_large());
        }

        let mut data = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| fetch_err(e.to_string()))? {
            if (data.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(too_large());
            }
            data.extend_from_slice(&chunk);
        }
        Ok(data)
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, LoadError> {
        let read_err = |e: std::io::Error| LoadError::Read {
            path: path.to_string(),
            message: e.to_string(),
        };

        // Device files report no length, so cap the read itself
        let file = tokio::fs::File::open(path).await.map_err(read_err)?;
        let mut data = Vec::new();
        file.take(self.max_bytes + 1)
            .read_to_end(&mut data)
            .await
            .map_err(read_err)?;

        if data.len() as u64 > self.max_bytes {
            return Err(LoadError::TooLarge {
                url: path.to_string(),
                limit: self.max_bytes,
            });
        }
        Ok(data)
    }
}

#[async_trait]
impl ModelLoader for GltfLoader {
    async fn load(&self, url: &str) -> Result<AvatarModel, LoadError> {
        tracing::debug!("Loading avatar model from {}", url);
        let data = self.read(url).await?;
        let name = model_name(url);

        let parse_name = name.clone();
        tokio::task::spawn_blocking(move || AvatarModel::from_slice(&parse_name, &data))
            .await
            .map_err(|e| LoadError::Parse {
                name,
                message: e.to_string(),
            })?
    }
}

/// Accept only http(s) URLs; local paths are for trusted callers
pub fn require_remote_url(url: &str) -> Result<(), LoadError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(LoadError::UnsupportedUrl(url.to_string()))
    }
}

/// Last path segment of a URL, without query or fragment
pub fn model_name(url: &str) -> String {
    let path = url.split(|c| c == '?' || c == '#').next().unwrap_or(url);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("model")
        .to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal VRM 1.0 document: hips at 0.9m, head 0.7m above hips
    pub(crate) fn vrm_json() -> String {
        serde_json::json!({
            "asset": { "version": "2.0" },
            "scenes": [{ "nodes": [0] }],
            "nodes": [
                { "name": "Hips", "translation": [0.0, 0.9, 0.0], "children": [1] },
                { "name": "Head", "translation": [0.0, 0.7, 0.0] }
            ],
            "extensions": {
                "VRMC_vrm": {
                    "specVersion": "1.0",
                    "humanoid": {
                        "humanBones": {
                            "hips": { "node": 0 },
                            "head": { "node": 1 },
                            "leftHand": { "node": 1 }
                        }
                    }
                }
            }
        })
        .to_string()
    }

    /// Wrap a JSON document in a GLB container
    pub(crate) fn to_glb(json: &str) -> Vec<u8> {
        let mut chunk = json.as_bytes().to_vec();
        while chunk.len() % 4 != 0 {
            chunk.push(b' ');
        }
        let total = 12 + 8 + chunk.len();

        let mut glb = Vec::with_capacity(total);
        glb.extend_from_slice(GLB_MAGIC);
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&(total as u32).to_le_bytes());
        glb.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"JSON");
        glb.extend_from_slice(&chunk);
        glb
    }

    #[test]
    fn test_parse_vrm_json() {
        let model = AvatarModel::from_slice("avatar.vrm", vrm_json().as_bytes()).unwrap();
        assert_eq!(model.name(), "avatar.vrm");
        assert_eq!(model.node_count(), 2);
        assert_eq!(model.mesh_count(), 0);
        assert!(model.is_vrm());
        assert_eq!(model.bones().get("head"), Some(&1));
        assert_eq!(model.bones().get("lefthand"), Some(&1));
        assert!((model.height() - 1.6).abs() < 1e-5);
    }

    #[test]
    fn test_parse_glb_container() {
        let glb = to_glb(&vrm_json());
        let model = AvatarModel::from_slice("avatar.vrm", &glb).unwrap();
        assert!(model.is_vrm());
        assert_eq!(model.bones().len(), 3);
    }

    #[test]
    fn test_vrm0_bones() {
        let json = serde_json::json!({
            "asset": { "version": "2.0" },
            "nodes": [{ "name": "Head", "translation": [0.0, 1.4, 0.0] }],
            "extensions": {
                "VRM": {
                    "humanoid": {
                        "humanBones": [{ "bone": "Head", "node": 0 }]
                    }
                }
            }
        })
        .to_string();

        let model = AvatarModel::from_slice("old.vrm", json.as_bytes()).unwrap();
        assert_eq!(model.bones().get("head"), Some(&0));
        assert!((model.height() - 1.4).abs() < 1e-5);
    }

    #[test]
    fn test_plain_gltf_uses_default_height() {
        let json = r#"{"asset":{"version":"2.0"},"nodes":[{"name":"box"}]}"#;
        let model = AvatarModel::from_slice("box.glb", json.as_bytes()).unwrap();
        assert!(!model.is_vrm());
        assert_eq!(model.height(), DEFAULT_AVATAR_HEIGHT);
    }

    #[test]
    fn test_rejects_garbage() {
        let err = AvatarModel::from_slice("bad.vrm", b"definitely not a model").unwrap_err();
        assert!(matches!(err, LoadError::Parse { ref name, .. } if name == "bad.vrm"));
    }

    #[test]
    fn test_require_remote_url() {
        assert!(require_remote_url("https://host/a.vrm").is_ok());
        assert!(require_remote_url("http://host/a.vrm").is_ok());
        for url in ["/etc/hostname", "file:///etc/hostname", "avatar.vrm"] {
            assert!(matches!(
                require_remote_url(url),
                Err(LoadError::UnsupportedUrl(_))
            ));
        }
    }

    #[test]
    fn test_model_name() {
        assert_eq!(model_name("https://host/ipfs/abc/avatar.vrm?x=1"), "avatar.vrm");
        assert_eq!(model_name("/tmp/models/a.glb"), "a.glb");
        assert_eq!(model_name(""), "model");
    }

    #[tokio::test]
    async fn test_loader_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("avatar.vrm");
        std::fs::write(&path, to_glb(&vrm_json())).unwrap();

        let loader = GltfLoader::new(Duration::from_secs(5)).unwrap();
        let url = format!("file://{}", path.display());
        let model = loader.load(&url).await.unwrap();
        assert_eq!(model.name(), "avatar.vrm");
        assert!(model.is_vrm());

        let missing = loader.load("/nonexistent/avatar.vrm").await.unwrap_err();
        assert!(matches!(missing, LoadError::Read { .. }));
    }

    #[tokio::test]
    async fn test_loader_caps_model_size() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("huge.vrm");
        std::fs::write(&path, vec![b' '; 4096]).unwrap();

        let loader = GltfLoader::new(Duration::from_secs(5))
            .unwrap()
            .with_max_bytes(1024);
        let err = loader.load(path.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, LoadError::TooLarge { limit: 1024, .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_loader_stops_on_endless_file() {
        let loader = GltfLoader::new(Duration::from_secs(5))
            .unwrap()
            .with_max_bytes(1024);
        let err = loader.load("/dev/zero").await.unwrap_err();
        assert!(matches!(err, LoadError::TooLarge { .. }));
    }
}
