//! Paged gallery of stored content

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::GalleryConfig;
use crate::error::GalleryError;
use crate::preview::element::escape;

/// Card size in the gallery grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardSize {
    #[default]
    Small,
    Medium,
    Large,
}

impl std::fmt::Display for CardSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CardSize::Small => write!(f, "small"),
            CardSize::Medium => write!(f, "medium"),
            CardSize::Large => write!(f, "large"),
        }
    }
}

/// A gallery entry pointing at stored content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booth {
    pub name: String,
    pub hash: String,
    pub ext: String,
}

/// Actions the gallery responds to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum GalleryAction {
    GetBooths { page: u32 },
}

/// Booths loaded so far, keyed by page (1 through the page count)
#[derive(Debug, Clone, Default)]
pub struct GalleryState {
    pub booths: HashMap<u32, Vec<Booth>>,
}

pub struct Gallery {
    catalog: Vec<Booth>,
    page_size: usize,
    card_size: CardSize,
    state: RwLock<GalleryState>,
}

impl Gallery {
    pub fn new(config: &GalleryConfig) -> Self {
        Self {
            catalog: config.catalog.clone(),
            page_size: config.page_size.max(1),
            card_size: CardSize::Small,
            state: RwLock::new(GalleryState::default()),
        }
    }

    pub fn dispatch(&self, action: GalleryAction) -> Result<(), GalleryError> {
        match action {
            GalleryAction::GetBooths { page } => {
                if page == 0 || page > self.page_count() {
                    return Err(GalleryError::InvalidPage(page));
                }

                let start = (page as usize - 1).saturating_mul(self.page_size);
                let booths: Vec<Booth> = self
                    .catalog
                    .iter()
                    .skip(start)
                    .take(self.page_size)
                    .cloned()
                    .collect();

                tracing::debug!("Gallery page {}: {} booths", page, booths.len());
                self.state.write().booths.insert(page, booths);
                Ok(())
            }
        }
    }

    /// Booths of `page`, if that page has been fetched
    pub fn booths(&self, page: u32) -> Option<Vec<Booth>> {
        self.state.read().booths.get(&page).cloned()
    }

    /// Number of pages fetched so far
    pub fn cached_pages(&self) -> usize {
        self.state.read().booths.len()
    }

    pub fn page_count(&self) -> u32 {
        let pages = self.catalog.len().div_ceil(self.page_size);
        pages.max(1) as u32
    }

    /// Cards for `page`, or a loading placeholder when it was never fetched
    pub fn render_page(&self, page: u32) -> String {
        let booths = match self.booths(page) {
            Some(booths) => booths,
            None => return r#"<div class="loading">Loading...</div>"#.to_string(),
        };

        let cards: String = booths.iter().map(|b| self.render_card(b)).collect();
        format!(r#"<div class="gallery">{}</div>"#, cards)
    }

    fn render_card(&self, booth: &Booth) -> String {
        format!(
            r#"<a class="card card-{size}" href="/preview?hash={hash}&amp;ext={ext}"><span class="card-name">{name}</span><span class="card-ext">{ext}</span></a>"#,
            size = self.card_size,
            hash = escape(&booth.hash),
            ext = escape(&booth.ext),
            name = escape(&booth.name),
        )
    }
}
