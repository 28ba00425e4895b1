//! Content preview switchboard
//!
//! Picks a renderer from a content reference's extension and fills a
//! [`Container`] with the elements that show it.

pub mod element;

pub use element::{CameraView, Container, Element};

use glam::Vec3;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::PreviewConfig;
use crate::error::{LoadError, PreviewError};
use crate::rig::{AvatarModel, Rig, RigOptions};
use crate::storage::ContentStore;

/// Supported content types, keyed by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Png,
    Mp4,
    Mp3,
    Vrm,
    Html,
}

impl FromStr for ContentKind {
    type Err = PreviewError;

    fn from_str(ext: &str) -> Result<Self, Self::Err> {
        match ext {
            "png" => Ok(ContentKind::Png),
            "mp4" => Ok(ContentKind::Mp4),
            "mp3" => Ok(ContentKind::Mp3),
            "vrm" => Ok(ContentKind::Vrm),
            "html" => Ok(ContentKind::Html),
            other => Err(PreviewError::UnsupportedType(other.to_string())),
        }
    }
}

/// A piece of stored content, as given by `?hash=...&ext=...`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContentRef {
    pub hash: String,
    pub ext: String,
}

impl ContentRef {
    pub fn new(hash: impl Into<String>, ext: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            ext: ext.into(),
        }
    }
}

/// Renders content references into a container
pub struct Previewer {
    store: Arc<dyn ContentStore>,
    config: PreviewConfig,
}

impl Previewer {
    pub fn new(store: Arc<dyn ContentStore>, config: PreviewConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Render `content` into `container`.
    ///
    /// An unknown extension fails before the container is touched.
    pub async fn render(
        &self,
        content: &ContentRef,
        container: &mut Container,
    ) -> Result<(), PreviewError> {
        let kind: ContentKind = content.ext.parse()?;
        let src = self.store.url_for(&content.hash)?;
        tracing::debug!("Previewing {} as {:?}", src, kind);

        match kind {
            ContentKind::Png => {
                container.set_content(Some(Element::Image { src }));
                self.store.probe(&content.hash).await?;
            }
            ContentKind::Mp4 => {
                container.set_content(Some(Element::Video { src }));
                self.store.probe(&content.hash).await?;
            }
            ContentKind::Html => {
                container.set_content(Some(Element::Iframe { src }));
                self.store.probe(&content.hash).await?;
            }
            ContentKind::Mp3 => self.render_audio(&content.hash, src, container).await?,
            ContentKind::Vrm => self.render_model(&content.hash, src, container).await?,
        }

        Ok(())
    }

    async fn render_audio(
        &self,
        hash: &str,
        src: String,
        container: &mut Container,
    ) -> Result<(), PreviewError> {
        container.set_content(None);

        // The waveform data and the playable stream load side by side
        let (data, ()) = tokio::try_join!(self.store.fetch(hash), self.store.probe(hash))?;
        tracing::debug!("Loaded {} bytes of audio from {}", data.len(), src);

        container.append(Element::Blocker);
        container.append(Element::Waveform {
            bars: self.config.waveform_bars,
        });
        container.append(Element::Audio { src });
        Ok(())
    }

    async fn render_model(
        &self,
        hash: &str,
        src: String,
        container: &mut Container,
    ) -> Result<(), PreviewError> {
        let data = self.store.fetch(hash).await?;
        let name = hash.to_string();
        let parse_name = name.clone();
        let model = tokio::task::spawn_blocking(move || AvatarModel::from_slice(&parse_name, &data))
            .await
            .map_err(|e| LoadError::Parse {
                name,
                message: e.to_string(),
            })??;

        let rig = preview_rig(Arc::new(model));
        let model = rig.model().map(Arc::clone);
        let height = rig.height();

        let [x, y, z] = self.config.camera_position;
        let camera = CameraView {
            position: Vec3::new(x, y, z),
            look_at: Vec3::new(0.0, height / 2.0, 0.0),
            fov: self.config.camera_fov,
        };

        container.set_content(Some(Element::ModelView {
            src,
            name: model.as_ref().map(|m| m.name().to_string()).unwrap_or_default(),
            height,
            bones: model.as_ref().map(|m| m.bones().len()).unwrap_or(0),
            camera,
        }));
        Ok(())
    }
}

/// A rig standing still at its model height, with all tracking disabled
pub fn preview_rig(model: Arc<AvatarModel>) -> Rig {
    let mut rig = Rig::new(Some(model), RigOptions::default());
    rig.set_top_enabled(false);
    rig.set_hand_enabled(0, false);
    rig.set_hand_enabled(1, false);
    rig.set_bottom_enabled(false);
    rig.inputs.hmd.position.y = rig.height();
    rig.update();
    rig
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::rig::model::tests::{to_glb, vrm_json};
    use crate::storage::MemoryStore;

    fn previewer() -> (Previewer, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new("https://ipfs.io"));
        let previewer = Previewer::new(store.clone(), PreviewConfig::default());
        (previewer, store)
    }

    #[test]
    fn test_content_kind() {
        assert_eq!("png".parse::<ContentKind>().unwrap(), ContentKind::Png);
        assert_eq!("vrm".parse::<ContentKind>().unwrap(), ContentKind::Vrm);
        assert!(matches!(
            "PNG".parse::<ContentKind>(),
            Err(PreviewError::UnsupportedType(ref ext)) if ext == "PNG"
        ));
    }

    #[tokio::test]
    async fn test_png_renders_one_image() {
        let (previewer, store) = previewer();
        store.insert("QmImage", b"png".to_vec());

        let mut container = Container::new();
        container.append(Element::Blocker);
        container.append(Element::Waveform { bars: 256 });
        previewer
            .render(&ContentRef::new("QmImage", "png"), &mut container)
            .await
            .unwrap();

        assert_eq!(
            container.children(),
            &[Element::Image {
                src: "https://ipfs.io/ipfs/QmImage".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_unknown_extension_renders_nothing() {
        let (previewer, store) = previewer();
        store.insert("QmThing", b"?".to_vec());

        let mut container = Container::new();
        let err = previewer
            .render(&ContentRef::new("QmThing", "xyz"), &mut container)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "unknown extension: xyz");
        assert!(container.is_empty());
    }

    #[tokio::test]
    async fn test_missing_content_fails_load() {
        let (previewer, _store) = previewer();

        let mut container = Container::new();
        let err = previewer
            .render(&ContentRef::new("QmGone", "mp4"), &mut container)
            .await
            .unwrap_err();

        assert!(matches!(err, PreviewError::Load(StorageError::NotFound(_))));
        // The element is placed before loading starts
        assert_eq!(container.children().len(), 1);
    }

    #[tokio::test]
    async fn test_audio_layout() {
        let (previewer, store) = previewer();
        store.insert("QmSong", b"mp3".to_vec());

        let mut container = Container::new();
        container.append(Element::Blocker);
        previewer
            .render(&ContentRef::new("QmSong", "mp3"), &mut container)
            .await
            .unwrap();

        let children = container.children();
        assert_eq!(children.len(), 3);
        assert_eq!(children[0], Element::Blocker);
        assert_eq!(children[1], Element::Waveform { bars: 256 });
        assert!(matches!(children[2], Element::Audio { .. }));
    }

    #[tokio::test]
    async fn test_vrm_preview() {
        let (previewer, store) = previewer();
        store.insert("QmAvatar", to_glb(&vrm_json()));

        let mut container = Container::new();
        previewer
            .render(&ContentRef::new("QmAvatar", "vrm"), &mut container)
            .await
            .unwrap();

        match container.children() {
            [Element::ModelView {
                height,
                bones,
                camera,
                ..
            }] => {
                assert!((height - 1.6).abs() < 1e-5);
                assert_eq!(*bones, 3);
                assert_eq!(camera.position, Vec3::new(0.0, 2.0, -2.0));
                assert!((camera.look_at.y - 0.8).abs() < 1e-5);
                assert_eq!(camera.fov, 60.0);
            }
            other => panic!("unexpected container: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_vrm_parse_failure() {
        let (previewer, store) = previewer();
        store.insert("QmBroken", b"not a model".to_vec());

        let mut container = Container::new();
        let err = previewer
            .render(&ContentRef::new("QmBroken", "vrm"), &mut container)
            .await
            .unwrap_err();
        assert!(matches!(err, PreviewError::Model(LoadError::Parse { .. })));
    }

    #[test]
    fn test_preview_rig_is_still() {
        let model = AvatarModel::from_slice("a.vrm", vrm_json().as_bytes()).unwrap();
        let rig = preview_rig(Arc::new(model));

        assert!(!rig.top_enabled());
        assert!(!rig.bottom_enabled());
        assert!(!rig.hand_enabled(0));
        assert!(!rig.hand_enabled(1));
        assert!((rig.inputs.hmd.position.y - rig.height()).abs() < 1e-6);
        assert_eq!(rig.frames(), 1);
    }
}
