//! Development HTTP server for the output directory.
//!
//! The page is served with a small live-reload client appended; every
//! message on the reload channel becomes a `reload` Server-Sent Event.

use std::convert::Infallible;
use std::path::PathBuf;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use futures::stream::Stream;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub const RELOAD_PATH: &str = "/__stagehand/reload";

const RELOAD_CLIENT: &str = concat!(
    "<script>new EventSource(\"/__stagehand/reload\")",
    ".addEventListener(\"reload\",function(){location.reload()});</script>"
);

#[derive(Clone)]
pub struct ServeState {
    pub out_dir: PathBuf,
    /// File name of the rendered page, e.g. `index.html`
    pub page: String,
    pub reload: broadcast::Sender<()>,
}

pub fn router(state: ServeState) -> Router {
    let files = ServeDir::new(&state.out_dir);
    let page_path = format!("/{}", state.page);

    Router::new()
        .route(RELOAD_PATH, get(reload_events))
        .route("/", get(page))
        .route(&page_path, get(page))
        .fallback_service(files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn page(State(state): State<ServeState>) -> Response {
    let path = state.out_dir.join(&state.page);
    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Html(inject_reload_client(&html)).into_response(),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "page not available");
            (StatusCode::NOT_FOUND, "page not built yet").into_response()
        }
    }
}

async fn reload_events(
    State(state): State<ServeState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // A lagged receiver still only needs one reload.
    let stream = BroadcastStream::new(state.reload.subscribe())
        .map(|_| Ok::<_, Infallible>(Event::default().event("reload").data("reload")));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Insert the reload client before `</body>`, or append it when the page
/// has no body end tag.
pub fn inject_reload_client(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(at) => {
            let mut out = String::with_capacity(html.len() + RELOAD_CLIENT.len());
            out.push_str(&html[..at]);
            out.push_str(RELOAD_CLIENT);
            out.push_str(&html[at..]);
            out
        }
        None => format!("{html}{RELOAD_CLIENT}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn state(dir: &TempDir) -> ServeState {
        let (reload, _) = broadcast::channel(4);
        ServeState {
            out_dir: dir.path().to_path_buf(),
            page: "index.html".to_owned(),
            reload,
        }
    }

    async fn get_body(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn client_goes_before_body_end() {
        let html = "<html><BODY><p>x</p></BODY></html>";
        let out = inject_reload_client(html);
        assert!(out.starts_with("<html><BODY><p>x</p><script>"));
        assert!(out.ends_with("</script></BODY></html>"));
        assert!(out.contains(RELOAD_PATH));
    }

    #[test]
    fn client_appended_without_body() {
        let out = inject_reload_client("<p>x</p>");
        assert!(out.starts_with("<p>x</p><script>"));
    }

    #[tokio::test]
    async fn serves_page_with_reload_client() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<body>hi</body>").unwrap();

        let (status, body) = get_body(router(state(&dir)), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("<body>hi<script>"));

        let (_, body) = get_body(router(state(&dir)), "/index.html").await;
        assert!(body.contains(RELOAD_PATH));
    }

    #[tokio::test]
    async fn serves_other_files_verbatim() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.js"), "console.log(1)").unwrap();

        let (status, body) = get_body(router(state(&dir)), "/index.js").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "console.log(1)");
    }

    #[tokio::test]
    async fn missing_page_is_not_found() {
        let dir = TempDir::new().unwrap();
        let (status, _) = get_body(router(state(&dir)), "/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
