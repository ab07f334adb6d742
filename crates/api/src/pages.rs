use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "../../templates"]
struct Templates;

fn embedded_file_response(path: &str) -> Response {
    match Templates::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            let content_type = HeaderValue::from_str(mime.as_ref())
                .unwrap_or(HeaderValue::from_static("text/html"));
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, content_type)],
                Body::from(content.data.into_owned()),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "Page not found").into_response(),
    }
}

pub async fn index_page() -> Response {
    embedded_file_response("index.html")
}

pub async fn projects_page() -> Response {
    embedded_file_response("projects.html")
}

pub async fn alerts_page() -> Response {
    embedded_file_response("alerts.html")
}

pub async fn monitoring_page() -> Response {
    embedded_file_response("monitoring.html")
}
