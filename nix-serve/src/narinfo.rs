use actix_web::{HttpResponse, http};
use nix_serve_core::{PathInfo, StoreDir};

use crate::error::Result;
use crate::signing::Signer;
use crate::{AppState, NO_SUCH_PATH, cache_control_max_age_1d, resolve_path_info, some_or_404};

#[derive(Debug)]
struct NarInfo {
    store_path: String,
    url: String,
    compression: &'static str,
    nar_hash: String,
    nar_size: u64,
    references: Vec<String>,
    deriver: Option<String>,
    sig: Option<String>,
}

impl NarInfo {
    fn new(store_dir: &StoreDir, info: &PathInfo, signer: &Signer) -> Result<Self> {
        // The URL and NarHash carry the same bare digest.
        let nar_hash = info.nar_hash.to_base32_bare();
        Ok(Self {
            store_path: store_dir.display(&info.path).to_string(),
            url: format!("nar/{}-{}.nar", info.path.hash_part(), nar_hash),
            compression: "none",
            nar_hash,
            nar_size: info.nar_size,
            references: info
                .references
                .iter()
                .map(|r| store_dir.display(r).to_string())
                .collect(),
            deriver: info
                .deriver
                .as_ref()
                .map(|d| store_dir.display(d).to_string()),
            sig: signer.sign(store_dir, info)?,
        })
    }
}

/// Helper macro for adding lines to narinfo
macro_rules! push_line {
    ($buf:expr, $prefix:literal, $value:expr) => {
        $buf.extend_from_slice($prefix);
        $buf.extend_from_slice($value);
        $buf.push(b'\n');
    };
}

fn format_narinfo_txt(narinfo: &NarInfo) -> Vec<u8> {
    let nar_size_str = narinfo.nar_size.to_string();

    let mut result = Vec::with_capacity(512);

    push_line!(result, b"StorePath: ", narinfo.store_path.as_bytes());
    push_line!(result, b"URL: ", narinfo.url.as_bytes());
    push_line!(result, b"Compression: ", narinfo.compression.as_bytes());
    push_line!(result, b"NarHash: ", narinfo.nar_hash.as_bytes());
    push_line!(result, b"NarSize: ", nar_size_str.as_bytes());

    if !narinfo.references.is_empty() {
        result.extend_from_slice(b"References:");
        for r in &narinfo.references {
            result.push(b' ');
            result.extend_from_slice(r.as_bytes());
        }
        result.push(b'\n');
    }

    if let Some(drv) = &narinfo.deriver {
        push_line!(result, b"Deriver: ", drv.as_bytes());
    }

    if let Some(sig) = &narinfo.sig {
        push_line!(result, b"Sig: ", sig.as_bytes());
    }

    result
}

pub(crate) async fn get(hash_part: &str, state: &AppState) -> crate::ServerResult {
    let info = some_or_404!(resolve_path_info(state, hash_part).await?, NO_SUCH_PATH);
    let narinfo = NarInfo::new(state.store.store_dir(), &info, &state.signer)?;

    Ok(HttpResponse::Ok()
        .insert_header((http::header::CONTENT_TYPE, "text/plain"))
        .insert_header(cache_control_max_age_1d())
        .body(format_narinfo_txt(&narinfo)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix_serve_core::{Hash, SigningKey, StorePath};
    use std::collections::BTreeSet;

    fn path(base_name: &str) -> StorePath {
        StorePath::from_base_name(base_name).unwrap()
    }

    fn hello() -> PathInfo {
        PathInfo {
            path: path("26xbg1ndr7hbcncrlf9nhx5is2b25d13-hello-2.12.1"),
            nar_hash: Hash::parse_prefixed(
                "sha256:1mkvday29m2qxg1fnbv8xh9s6151bh8a2xzhh0k86j7lqhyfwibh",
            )
            .unwrap(),
            nar_size: 226560,
            references: BTreeSet::new(),
            deriver: None,
        }
    }

    fn render(info: &PathInfo, signer: &Signer) -> String {
        let narinfo = NarInfo::new(&StoreDir::default(), info, signer).unwrap();
        String::from_utf8(format_narinfo_txt(&narinfo)).unwrap()
    }

    #[test]
    fn test_format_narinfo_minimal() {
        assert_eq!(
            render(&hello(), &Signer::default()),
            "StorePath: /nix/store/26xbg1ndr7hbcncrlf9nhx5is2b25d13-hello-2.12.1\n\
             URL: nar/26xbg1ndr7hbcncrlf9nhx5is2b25d13-1mkvday29m2qxg1fnbv8xh9s6151bh8a2xzhh0k86j7lqhyfwibh.nar\n\
             Compression: none\n\
             NarHash: 1mkvday29m2qxg1fnbv8xh9s6151bh8a2xzhh0k86j7lqhyfwibh\n\
             NarSize: 226560\n"
        );
    }

    #[test]
    fn test_nar_hash_matches_url() {
        let mut info = hello();
        info.nar_size = 128;
        let text = render(&info, &Signer::default());

        let url_hash = text
            .lines()
            .find_map(|l| l.strip_prefix("URL: nar/26xbg1ndr7hbcncrlf9nhx5is2b25d13-"))
            .and_then(|rest| rest.strip_suffix(".nar"))
            .unwrap();
        assert!(text.contains(&format!("\nNarHash: {url_hash}\nNarSize: 128\n")));
    }

    #[test]
    fn test_format_narinfo_full() {
        let mut info = hello();
        info.references = BTreeSet::from([
            path("26xbg1ndr7hbcncrlf9nhx5is2b25d13-hello-2.12.1"),
            path("sl141d1g77wvhr050ah87lcyz2czdxa3-glibc-2.40-36"),
        ]);
        info.deriver = Some(path("qxrsxjv5yhy1p4ga5n2bzrqpqxzrcsb6-hello-2.12.1.drv"));

        let key =
            SigningKey::parse("cache.example.com-1:BwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwc=")
                .unwrap();
        let sig = key.sign_detached(&info.fingerprint(&StoreDir::default()).unwrap());
        let text = render(&info, &Signer::new(Some(key)));

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 8);
        assert_eq!(
            lines[5],
            "References: /nix/store/26xbg1ndr7hbcncrlf9nhx5is2b25d13-hello-2.12.1 /nix/store/sl141d1g77wvhr050ah87lcyz2czdxa3-glibc-2.40-36"
        );
        assert_eq!(
            lines[6],
            "Deriver: /nix/store/qxrsxjv5yhy1p4ga5n2bzrqpqxzrcsb6-hello-2.12.1.drv"
        );
        assert_eq!(lines[7], format!("Sig: {sig}"));
        assert!(text.ends_with('\n'));
    }
}
