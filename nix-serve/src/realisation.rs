use actix_web::{HttpResponse, web};
use nix_serve_core::DrvOutput;

use crate::error::CacheError;
use crate::{AppState, NO_SUCH_DRV_OUTPUT, not_found, some_or_404};

/// `/realisations/<drv output id>.doi`
pub(crate) async fn get(doi: &str, state: &AppState) -> crate::ServerResult {
    let id: DrvOutput = match doi.parse() {
        Ok(id) => id,
        Err(e) => {
            log::debug!("{e}");
            return Ok(not_found(NO_SUCH_DRV_OUTPUT));
        }
    };

    let store = state.store.clone();
    let realisation = some_or_404!(
        web::block(move || store.query_realisation(&id))
            .await
            .map_err(CacheError::from)??,
        NO_SUCH_DRV_OUTPUT
    );

    Ok(HttpResponse::Ok().json(realisation))
}
