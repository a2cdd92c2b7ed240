use std::convert::Infallible;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use actix_web::web::Bytes;
use actix_web::{HttpResponse, http};
use futures::stream::{BoxStream, Stream, StreamExt};
use nix_serve_core::{Hash, PathInfo};

use crate::{
    AppState, INCORRECT_NAR_HASH, NO_SUCH_PATH, cache_control_max_age_1y, not_found,
    resolve_path_info, some_or_404,
};

/// Response body for a NAR.
///
/// Once the response head is sent the status can no longer change, so a
/// serialization failure is logged and ends the body early. Clients notice
/// the truncation when the NAR hash does not match.
struct ArchiveStream {
    inner: BoxStream<'static, io::Result<Bytes>>,
    store_path: String,
    finished: bool,
}

impl ArchiveStream {
    fn new(inner: BoxStream<'static, io::Result<Bytes>>, store_path: String) -> Self {
        Self {
            inner,
            store_path,
            finished: false,
        }
    }
}

impl Stream for ArchiveStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match ready!(self.inner.poll_next_unpin(cx)) {
            Some(Ok(chunk)) => Poll::Ready(Some(Ok(chunk))),
            Some(Err(e)) => {
                log::error!("Failed to stream NAR of {}: {}", self.store_path, e);
                self.finished = true;
                Poll::Ready(None)
            }
            None => {
                self.finished = true;
                Poll::Ready(None)
            }
        }
    }
}

impl Drop for ArchiveStream {
    fn drop(&mut self) {
        if !self.finished {
            log::debug!(
                "Client disconnected while streaming NAR of {}",
                self.store_path
            );
        }
    }
}

fn stream_nar(state: &AppState, info: &PathInfo) -> HttpResponse {
    let store = &state.store;
    let body = ArchiveStream::new(
        store.nar_stream(&info.path),
        store.store_dir().display(&info.path).to_string(),
    );

    HttpResponse::Ok()
        .insert_header((http::header::CONTENT_TYPE, "text/plain"))
        .insert_header(cache_control_max_age_1y())
        .streaming(body)
}

/// `/nar/<hashpart>-<narhash>.nar`
pub(crate) async fn get(hash_part: &str, nar_hash: &str, state: &AppState) -> crate::ServerResult {
    let info = some_or_404!(resolve_path_info(state, hash_part).await?, NO_SUCH_PATH);

    // The narinfo a client cached may describe an older incarnation of the
    // path; the URL carries the hash it expects.
    let expected = &info.nar_hash;
    let matches = Hash::parse_any(nar_hash, expected.algo()).is_ok_and(|h| &h == expected);
    if !matches {
        return Ok(not_found(INCORRECT_NAR_HASH));
    }

    Ok(stream_nar(state, &info))
}

/// `/nar/<hashpart>.nar`, kept for narinfos cached from old servers. No
/// hash is checked.
pub(crate) async fn get_deprecated(hash_part: &str, state: &AppState) -> crate::ServerResult {
    let info = some_or_404!(resolve_path_info(state, hash_part).await?, NO_SUCH_PATH);
    Ok(stream_nar(state, &info))
}
