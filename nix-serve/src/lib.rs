#![warn(clippy::dbg_macro)]

//! A Nix binary cache server for the local store.
//!
//! Serves `/nix-cache-info`, narinfos, NARs and realisations of
//! content-addressed derivations straight from the store, without
//! compression, optionally signing narinfos with an Ed25519 key.

use std::fmt::Display;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpResponse, HttpServer, http, middleware, web};
use nix_serve_core::PathInfo;
use url::Url;

/// Macro for building byte vectors efficiently from parts
#[macro_export]
macro_rules! build_bytes {
    ($($part:expr),* $(,)?) => {{
        let parts: &[&[u8]] = &[$($part),*];
        let capacity = parts.iter().map(|p| p.len()).sum();
        let mut result = Vec::with_capacity(capacity);
        for part in parts {
            result.extend_from_slice(part);
        }
        result
    }};
}

macro_rules! some_or_404 {
    ($res:expr, $body:expr) => {
        match $res {
            Some(val) => val,
            None => return Ok($crate::not_found($body)),
        }
    };
}
pub(crate) use some_or_404;

mod cacheinfo;
pub mod config;
pub mod error;
mod nar;
mod narinfo;
mod realisation;
pub mod routes;
pub mod signing;
pub mod store;

use config::Config;
use error::{CacheError, IoErrorContext, Result};
use routes::RouteTable;
use signing::Signer;
use store::{LocalStore, Store};

pub(crate) const NO_SUCH_PATH: &str = "No such path.\n";
pub(crate) const INCORRECT_NAR_HASH: &str =
    "Incorrect NAR hash. Maybe the path has been recreated.\n";
pub(crate) const NO_SUCH_DRV_OUTPUT: &str = "No such derivation output.\n";

fn cache_control_max_age(max_age: u32) -> http::header::CacheControl {
    http::header::CacheControl(vec![http::header::CacheDirective::MaxAge(max_age)])
}

fn cache_control_max_age_1y() -> http::header::CacheControl {
    cache_control_max_age(365 * 24 * 60 * 60)
}

fn cache_control_max_age_1d() -> http::header::CacheControl {
    cache_control_max_age(24 * 60 * 60)
}

fn cache_control_no_store() -> http::header::CacheControl {
    http::header::CacheControl(vec![http::header::CacheDirective::NoStore])
}

pub(crate) fn not_found(body: &'static str) -> HttpResponse {
    HttpResponse::NotFound()
        .insert_header(cache_control_no_store())
        .insert_header((http::header::CONTENT_TYPE, "text/plain"))
        .body(body)
}

#[derive(Debug)]
pub struct ServerError {
    err: CacheError,
}

impl Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.err)
    }
}

impl actix_web::error::ResponseError for ServerError {
    fn status_code(&self) -> http::StatusCode {
        http::StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        log::error!("{}", self.err);
        HttpResponse::build(self.status_code())
            .insert_header((http::header::CONTENT_TYPE, "text/plain"))
            .body(format!("Error 500\n{}", self.err))
    }
}

impl From<CacheError> for ServerError {
    fn from(err: CacheError) -> ServerError {
        ServerError { err }
    }
}

type ServerResult = std::result::Result<HttpResponse, ServerError>;

/// State shared by all workers.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub signer: Signer,
    pub priority: usize,
    pub(crate) routes: RouteTable,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, signer: Signer, priority: usize) -> Result<Self> {
        Ok(Self {
            store,
            signer,
            priority,
            routes: RouteTable::new()?,
        })
    }
}

/// Resolve a hash part to the metadata of its store path. `None` when the
/// hash part names no valid path.
pub(crate) async fn resolve_path_info(
    state: &AppState,
    hash_part: &str,
) -> Result<Option<PathInfo>> {
    let store = state.store.clone();
    let hash_part = hash_part.to_string();
    web::block(move || match store.query_path_from_hash_part(&hash_part)? {
        Some(path) => store.query_path_info(&path),
        None => Ok(None),
    })
    .await?
}

pub fn build_app(
    state: web::Data<AppState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .wrap(middleware::Logger::default())
        .app_data(state)
        .default_service(web::to(routes::dispatch))
}

pub async fn run(mut config: Config) -> Result<()> {
    let store = LocalStore::open(
        config.store_dir.clone(),
        config.real_nix_store.clone(),
        &config.db_path,
    )?;
    let signer = Signer::new(config.secret_key.take());
    if let Some(public_key) = signer.public_key() {
        log::info!("signing narinfos, public key: {public_key}");
    }

    let state = web::Data::new(AppState::new(Arc::new(store), signer, config.priority)?);
    let mut server = HttpServer::new(move || build_app(state.clone()))
        // default is 5 seconds, which is too small when doing mass requests on slow machines
        .client_request_timeout(Duration::from_secs(30))
        .workers(config.workers)
        .max_connection_rate(config.max_connection_rate);

    let try_url = Url::parse(&config.bind);
    let (bind, uds) = if let Ok(url) = try_url.as_ref() {
        if url.scheme() != "unix" {
            (config.bind.as_str(), false)
        } else if url.host().is_none() {
            (url.path(), true)
        } else {
            return Err(error::ServerError::Startup {
                reason: "Can only bind to file URLs without host portion.".to_string(),
            }
            .into());
        }
    } else {
        (config.bind.as_str(), false)
    };

    if uds {
        let socket_path = Path::new(bind);
        server = server
            .bind_uds(socket_path)
            .io_context("Failed to bind to Unix domain socket")?;
        fs::set_permissions(socket_path, fs::Permissions::from_mode(0o777))
            .io_context("Failed to set socket permissions")?;
        log::info!("listening on unix:{}", socket_path.display());
    } else {
        server = server
            .bind(bind)
            .io_context(format!("Failed to bind to {bind}"))?;
        for addr in server.addrs() {
            log::info!("listening on {addr}");
        }
    }

    server.run().await.io_context("Failed to start server")
}
