//! HTMX pages and partials for the gallery and previews

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{PreviewError, StorageError};
use crate::gallery::GalleryAction;
use crate::preview::element::escape;
use crate::preview::{Container, ContentRef};
use crate::AppState;

/// Render the gallery page shell; cards load through the partial
pub async fn index_page(State(state): State<Arc<AppState>>) -> Html<String> {
    let pages = state.gallery.page_count();
    let peers = state.rigs.peer_count();

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Gallery - rigview</title>
    <script src="https://unpkg.com/htmx.org@1.9.12"></script>
</head>
<body>
    <div class="dashboard">
        <header class="header">
            <h1>rigview</h1>
            <span class="version">v{version}</span>
            <span class="peers">{peers} peers</span>
        </header>

        <main class="main">
            <section class="panel">
                <h2>Gallery</h2>
                <div id="gallery" hx-get="/htmx/gallery?page=1" hx-trigger="load" hx-swap="innerHTML">
                    <div class="loading">Loading...</div>
                </div>
                <nav class="pages">{nav}</nav>
            </section>
        </main>
    </div>
</body>
</html>"#,
        version = crate::VERSION,
        peers = peers,
        nav = page_nav(pages),
    );

    Html(html)
}

fn page_nav(pages: u32) -> String {
    (1..=pages)
        .map(|page| {
            format!(
                r##"<button hx-get="/htmx/gallery?page={page}" hx-target="#gallery" class="btn">{page}</button>"##,
                page = page
            )
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "first_page")]
    pub page: u32,
}

fn first_page() -> u32 {
    1
}

/// Gallery cards for one page
pub async fn gallery_partial(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Response {
    if let Err(e) = state
        .gallery
        .dispatch(GalleryAction::GetBooths { page: query.page })
    {
        return (StatusCode::BAD_REQUEST, Html(error_fragment(&e.to_string()))).into_response();
    }

    Html(state.gallery.render_page(query.page)).into_response()
}

/// Full-page preview of one piece of content
pub async fn preview_page(
    State(state): State<Arc<AppState>>,
    Query(content): Query<ContentRef>,
) -> Response {
    let mut container = Container::new();

    let (status, body) = match state.previewer.render(&content, &mut container).await {
        Ok(()) => (StatusCode::OK, container.to_html()),
        Err(e) => {
            let status = match &e {
                PreviewError::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                PreviewError::Load(StorageError::InvalidHash(_)) => StatusCode::BAD_REQUEST,
                PreviewError::Load(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
                PreviewError::Load(_) | PreviewError::Model(_) => StatusCode::BAD_GATEWAY,
            };
            tracing::warn!("Preview of {}.{} failed: {}", content.hash, content.ext, e);
            (status, error_fragment(&e.to_string()))
        }
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Preview - rigview</title>
    <style>
        body {{
            margin: 0;
            padding: 0;
            background: #1a1a1a;
        }}
        #container {{
            position: relative;
            width: 100vw;
            height: 100vh;
        }}
        .content {{
            max-width: 100%;
            max-height: 100vh;
        }}
    </style>
</head>
<body>
    <div id="container" data-hash="{hash}" data-ext="{ext}">
{body}
    </div>
</body>
</html>"#,
        hash = escape(&content.hash),
        ext = escape(&content.ext),
        body = body,
    );

    (status, Html(html)).into_response()
}

fn error_fragment(message: &str) -> String {
    format!(r#"<div class="error">{}</div>"#, escape(message))
}
