//! The shop server: serves a [`LocalShop`] over HTTP.
//!
//! Wire contract, matched by [`bakery_registry::HttpShop`]:
//!
//! - `POST /get_pastry` with form fields `name` and `version` (a version
//!   spec) resolves the best stocked match and answers with the archive
//!   bytes plus an `X-Pastry-Version` header carrying the resolved version.
//! - `POST /upload_pastry` with multipart fields `name`, `version`, `force`
//!   and a `pastry` file part stocks the archive.
//!
//! Failures answer with a 4xx/5xx status and a JSON
//! `{"result": "Error", "errors": [...]}` body.

use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::extract::{DefaultBodyLimit, Form, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use bakery_core::{Pastry, VersionSpec};
use bakery_registry::{
    LocalShop, RegistryError, ShopBackend, ShopResponse, GET_PASTRY_ROUTE, UPLOAD_PASTRY_ROUTE,
    VERSION_HEADER,
};

use crate::config::ShopConfig;

const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

struct AppState {
    shop: Mutex<LocalShop>,
}

/// Serve the shop described by `config_path` until interrupted.
pub fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = ShopConfig::load_or_default(config_path)?;
    let shop = LocalShop::open(&config.pastries_root)?;
    info!(
        root = %config.pastries_root.display(),
        stocked = shop.menu().len(),
        "opened shop"
    );

    let app = router(Arc::new(AppState {
        shop: Mutex::new(shop),
    }));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
        info!("shop listening on {}", listener.local_addr()?);
        axum::serve(listener, app).await?;
        Ok::<(), anyhow::Error>(())
    })
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(GET_PASTRY_ROUTE, post(get_pastry))
        .route(UPLOAD_PASTRY_ROUTE, post(upload_pastry))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub(crate) fn test_router(shop: LocalShop) -> Router {
    router(Arc::new(AppState {
        shop: Mutex::new(shop),
    }))
}

#[derive(Debug, Deserialize)]
struct GetPastryForm {
    name: String,
    #[serde(default)]
    version: Option<String>,
}

async fn get_pastry(State(state): State<Arc<AppState>>, Form(form): Form<GetPastryForm>) -> Response {
    let spec = match form.version.as_deref() {
        None | Some("") => VersionSpec::any(),
        Some(raw) => match VersionSpec::parse(raw) {
            Ok(spec) => spec,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, vec![e.to_string()]),
        },
    };

    let shop = match state.shop.lock() {
        Ok(shop) => shop,
        Err(_) => return poisoned(),
    };
    let pastry = match shop.resolve(&form.name, &spec) {
        Ok(pastry) => pastry,
        Err(e) => return registry_error_response(e),
    };
    let archive = match std::fs::read(shop.archive_path(&pastry)) {
        Ok(bytes) => bytes,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, vec![e.to_string()]),
    };

    (
        [
            ("content-type", "application/zip".to_string()),
            (VERSION_HEADER, pastry.version.to_string()),
        ],
        archive,
    )
        .into_response()
}

async fn upload_pastry(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let mut name = None;
    let mut version = None;
    let mut force = false;
    let mut archive = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, vec![e.to_string()]),
        };
        let field_name = field.name().unwrap_or("").to_string();
        let result = match field_name.as_str() {
            "name" => field.text().await.map(|text| name = Some(text)),
            "version" => field.text().await.map(|text| version = Some(text)),
            "force" => field
                .text()
                .await
                .map(|text| force = matches!(text.as_str(), "true" | "1")),
            "pastry" => field.bytes().await.map(|bytes| archive = Some(bytes)),
            // Unknown fields are ignored.
            _ => Ok(()),
        };
        if let Err(e) = result {
            return error_response(StatusCode::BAD_REQUEST, vec![e.to_string()]);
        }
    }

    let mut errors = Vec::new();
    if name.is_none() {
        errors.push("missing field 'name'".to_string());
    }
    if version.is_none() {
        errors.push("missing field 'version'".to_string());
    }
    if archive.is_none() {
        errors.push("missing file field 'pastry'".to_string());
    }
    if !errors.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, errors);
    }
    let (name, version, archive) = (
        name.unwrap_or_default(),
        version.unwrap_or_default(),
        archive.unwrap_or_default(),
    );

    let pastry = match Pastry::new(name, &version) {
        Ok(pastry) => pastry,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, vec![e.to_string()]),
    };

    let mut shop = match state.shop.lock() {
        Ok(shop) => shop,
        Err(_) => return poisoned(),
    };
    match shop.upload(&pastry, &archive, force) {
        Ok(()) => (StatusCode::OK, Json(ShopResponse::ok())).into_response(),
        Err(e) => registry_error_response(e),
    }
}

fn registry_error_response(error: RegistryError) -> Response {
    let status = match &error {
        RegistryError::NotFound { .. } => StatusCode::NOT_FOUND,
        RegistryError::Core(_)
        | RegistryError::Archive(_)
        | RegistryError::ArtifactMismatch { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, vec![error.to_string()])
}

fn error_response(status: StatusCode, errors: Vec<String>) -> Response {
    (status, Json(ShopResponse::error(errors))).into_response()
}

fn poisoned() -> Response {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        vec!["shop state poisoned".to_string()],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use bakery_core::{Ingredient, PastryManifest};
    use bakery_registry::{deposit, FetchedPastry, HttpShop, RegistryError};

    /// Bind an ephemeral port, serve the app on a background runtime, and
    /// return the base URL for blocking clients.
    fn spawn_server(root: &Path) -> (tokio::runtime::Runtime, String) {
        let shop = LocalShop::open(root).unwrap();
        let app = router(Arc::new(AppState {
            shop: Mutex::new(shop),
        }));

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let addr = listener.local_addr().unwrap();
        runtime.spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (runtime, format!("http://{addr}"))
    }

    fn packed_archive(dir: &Path, name: &str, version: &str, payload: &str) -> std::path::PathBuf {
        std::fs::write(dir.join("payload.txt"), payload).unwrap();
        let pastry = Pastry::new(name, version).unwrap();
        let manifest = PastryManifest::new(&pastry, Vec::new());
        let archive = dir.join(pastry.file_name());
        bakery_archive::pack(&archive, &manifest, &[Ingredient::new("payload.txt")], dir).unwrap();
        archive
    }

    #[test]
    fn upload_then_fetch_over_http() {
        let dir = tempfile::tempdir().unwrap();
        let (_runtime, url) = spawn_server(&dir.path().join("shop"));
        let mut client = HttpShop::new(&url).unwrap();

        for version in ["1.0.0", "1.1.0"] {
            let archive = packed_archive(dir.path(), "foo", version, version);
            deposit(&mut client, &archive, false).unwrap();
        }

        let scratch = dir.path().join("scratch");
        let spec = VersionSpec::parse(">=1.0.0,<2.0.0").unwrap();
        let FetchedPastry {
            pastry,
            archive_path,
        } = client.fetch("foo", &spec, &scratch, &mut |_, _| {}).unwrap();

        // The header carried the resolved version, the body the archive.
        assert_eq!(pastry, Pastry::new("foo", "1.1.0").unwrap());
        let manifest = bakery_archive::read_manifest(&archive_path).unwrap();
        assert_eq!(manifest.pastry(), pastry);
    }

    #[test]
    fn unknown_pastry_is_a_shop_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let (_runtime, url) = spawn_server(&dir.path().join("shop"));
        let client = HttpShop::new(&url).unwrap();

        let result = client.fetch(
            "nope",
            &VersionSpec::any(),
            &dir.path().join("scratch"),
            &mut |_, _| {},
        );
        match result {
            Err(RegistryError::ShopRejected { status, errors }) => {
                assert_eq!(status, 404);
                assert!(!errors.is_empty());
            }
            other => panic!("expected ShopRejected, got {other:?}"),
        }
    }

    #[test]
    fn upload_with_undeclared_identity_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let shop_root = dir.path().join("shop");
        let (_runtime, url) = spawn_server(&shop_root);
        let mut client = HttpShop::new(&url).unwrap();

        // Claim foo 2.0.0 for an archive whose manifest declares 1.0.0.
        let archive = packed_archive(dir.path(), "foo", "1.0.0", "foo payload");
        let bytes = std::fs::read(&archive).unwrap();
        let claimed = Pastry::new("foo", "2.0.0").unwrap();
        let result = client.upload(&claimed, &bytes, false);
        match result {
            Err(RegistryError::ShopRejected { status, errors }) => {
                assert_eq!(status, 400);
                assert!(!errors.is_empty());
            }
            other => panic!("expected ShopRejected, got {other:?}"),
        }
        assert!(!shop_root.join("foo_2.0.0.zip").exists());
    }

    #[test]
    fn duplicate_upload_needs_force_to_replace() {
        let dir = tempfile::tempdir().unwrap();
        let shop_root = dir.path().join("shop");
        let (_runtime, url) = spawn_server(&shop_root);
        let mut client = HttpShop::new(&url).unwrap();

        let archive = packed_archive(dir.path(), "foo", "1.0.0", "original");
        deposit(&mut client, &archive, false).unwrap();
        let original = std::fs::read(shop_root.join("foo_1.0.0.zip")).unwrap();

        // Re-pack with a different payload under the same descriptor.
        let archive = packed_archive(dir.path(), "foo", "1.0.0", "changed");

        deposit(&mut client, &archive, false).unwrap();
        assert_eq!(
            std::fs::read(shop_root.join("foo_1.0.0.zip")).unwrap(),
            original
        );

        deposit(&mut client, &archive, true).unwrap();
        assert_ne!(
            std::fs::read(shop_root.join("foo_1.0.0.zip")).unwrap(),
            original
        );
    }
}
