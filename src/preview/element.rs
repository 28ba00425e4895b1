//! Preview page elements rendered as HTML fragments

use glam::Vec3;
use std::fmt::Write;

/// Placement of the model viewer camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    pub position: Vec3,
    pub look_at: Vec3,
    pub fov: f32,
}

/// One element of the preview container
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Image { src: String },
    Video { src: String },
    Audio { src: String },
    Iframe { src: String },
    /// Scrub position indicator laid over the waveform
    Blocker,
    /// Canvas the client draws the audio waveform into
    Waveform { bars: usize },
    /// Canvas the client renders a posed avatar into
    ModelView {
        src: String,
        name: String,
        height: f32,
        bones: usize,
        camera: CameraView,
    },
}

impl Element {
    pub fn to_html(&self) -> String {
        match self {
            Element::Image { src } => {
                format!(r#"<img class="content img" src="{}">"#, escape(src))
            }
            Element::Video { src } => format!(
                r#"<video class="content video" src="{}" controls autoplay muted></video>"#,
                escape(src)
            ),
            Element::Audio { src } => format!(
                r#"<audio class="content audio" src="{}" controls></audio>"#,
                escape(src)
            ),
            Element::Iframe { src } => {
                format!(r#"<iframe class="content iframe" src="{}"></iframe>"#, escape(src))
            }
            Element::Blocker => {
                r#"<div class="blocker" style="position: absolute; left: 0; width: 100vw; height: 50vh; transform-origin: 0 50%;"></div>"#
                    .to_string()
            }
            Element::Waveform { bars } => format!(
                r#"<canvas class="waveform" data-bars="{}" style="width: 100vw; height: 50vh;"></canvas>"#,
                bars
            ),
            Element::ModelView {
                src,
                name,
                height,
                bones,
                camera,
            } => format!(
                r#"<canvas class="content model" data-src="{}" data-name="{}" data-height="{:.3}" data-bones="{}" data-camera="{:.3},{:.3},{:.3}" data-look-at="{:.3},{:.3},{:.3}" data-fov="{}"></canvas>"#,
                escape(src),
                escape(name),
                height,
                bones,
                camera.position.x,
                camera.position.y,
                camera.position.z,
                camera.look_at.x,
                camera.look_at.y,
                camera.look_at.z,
                camera.fov,
            ),
        }
    }
}

/// The preview container: an ordered list of elements
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Container {
    children: Vec<Element>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the container content with `element`, or clear it
    pub fn set_content(&mut self, element: Option<Element>) {
        self.children.clear();
        self.children.extend(element);
    }

    pub fn append(&mut self, element: Element) {
        self.children.push(element);
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn to_html(&self) -> String {
        let mut html = String::new();
        for child in &self.children {
            let _ = writeln!(html, "{}", child.to_html());
        }
        html
    }
}

/// Escape text for use inside HTML attributes and content
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
