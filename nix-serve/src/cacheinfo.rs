use actix_web::{HttpResponse, http};

use crate::AppState;

pub(crate) fn get(state: &AppState) -> HttpResponse {
    let priority_str = state.priority.to_string();

    let body = crate::build_bytes!(
        b"StoreDir: ",
        state.store.store_dir().as_str().as_bytes(),
        b"\nWantMassQuery: 1\nPriority: ",
        priority_str.as_bytes(),
        b"\n"
    );

    HttpResponse::Ok()
        .insert_header((http::header::CONTENT_TYPE, "text/plain"))
        .body(body)
}
