//! Request routing.
//!
//! A fixed, ordered table of path patterns; the first match wins. Only
//! `GET` is served and everything else is a plain 404, so the whole table
//! sits behind a single default service instead of actix's router.

use actix_web::http::Method;
use actix_web::{HttpRequest, web};
use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::error::{Result, ServerError};
use crate::{AppState, cacheinfo, nar, narinfo, not_found, realisation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteKind {
    CacheInfo,
    NarInfo,
    Nar,
    NarDeprecated,
    Realisation,
}

const ROUTES: &[(&str, RouteKind)] = &[
    (r"^/nix-cache-info$", RouteKind::CacheInfo),
    (r"^/([0-9a-z]+)\.narinfo$", RouteKind::NarInfo),
    (r"^/nar/([0-9a-z]+)-([0-9a-z]+)\.nar$", RouteKind::Nar),
    (r"^/nar/([0-9a-z]+)\.nar$", RouteKind::NarDeprecated),
    (r"^/realisations/(.*)\.doi$", RouteKind::Realisation),
];

/// A matched request with its captures.
#[derive(Debug, PartialEq, Eq)]
pub enum Route<'a> {
    CacheInfo,
    NarInfo { hash_part: &'a str },
    Nar { hash_part: &'a str, nar_hash: &'a str },
    NarDeprecated { hash_part: &'a str },
    Realisation { doi: &'a str },
}

pub struct RouteTable {
    routes: Vec<(Regex, RouteKind)>,
}

impl RouteTable {
    pub fn new() -> Result<Self> {
        let routes = ROUTES
            .iter()
            .map(|(pattern, kind)| {
                Regex::new(pattern)
                    .map(|re| (re, *kind))
                    .map_err(|e| ServerError::Startup {
                        reason: format!("Invalid route pattern '{pattern}': {e}"),
                    })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { routes })
    }

    /// Match a decoded request path. Methods other than `GET` never match.
    pub fn resolve<'a>(&self, method: &Method, path: &'a str) -> Option<Route<'a>> {
        if *method != Method::GET {
            return None;
        }

        self.routes.iter().find_map(|(re, kind)| {
            let caps = re.captures(path)?;
            let cap = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or_default();
            Some(match kind {
                RouteKind::CacheInfo => Route::CacheInfo,
                RouteKind::NarInfo => Route::NarInfo { hash_part: cap(1) },
                RouteKind::Nar => Route::Nar {
                    hash_part: cap(1),
                    nar_hash: cap(2),
                },
                RouteKind::NarDeprecated => Route::NarDeprecated { hash_part: cap(1) },
                RouteKind::Realisation => Route::Realisation { doi: cap(1) },
            })
        })
    }
}

/// The single service every request goes through.
pub(crate) async fn dispatch(req: HttpRequest, state: web::Data<AppState>) -> crate::ServerResult {
    let Ok(path) = percent_decode_str(req.path()).decode_utf8() else {
        return Ok(not_found(""));
    };

    match state.routes.resolve(req.method(), &path) {
        None => Ok(not_found("")),
        Some(Route::CacheInfo) => Ok(cacheinfo::get(&state)),
        Some(Route::NarInfo { hash_part }) => narinfo::get(hash_part, &state).await,
        Some(Route::Nar {
            hash_part,
            nar_hash,
        }) => nar::get(hash_part, nar_hash, &state).await,
        Some(Route::NarDeprecated { hash_part }) => nar::get_deprecated(hash_part, &state).await,
        Some(Route::Realisation { doi }) => realisation::get(doi, &state).await,
    }
}
