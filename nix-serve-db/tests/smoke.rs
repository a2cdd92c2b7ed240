// SPDX-License-Identifier: MIT

//! Smoke tests for nix-serve-db against freshly created databases.

use std::collections::BTreeSet;

use nix_serve_db::{Error, OpenMode, RegisterPathParams, StoreDb};
use rstest::rstest;

fn make_path(hash: &str, name: &str) -> String {
    format!("/nix/store/{hash}-{name}")
}

fn nar_hash(c: char) -> String {
    format!("sha256:{}", c.to_string().repeat(64))
}

#[test]
fn test_schema_creation() {
    let db = StoreDb::open_memory().unwrap();
    assert!(db.has_ca_schema().unwrap());
    assert_eq!(db.count_valid_paths().unwrap(), 0);
}

#[test]
fn test_path_info_with_references() {
    let mut db = StoreDb::open_memory().unwrap();

    let glibc = RegisterPathParams {
        path: make_path("gggggggggggggggggggggggggggggggg", "glibc"),
        hash: nar_hash('0'),
        nar_size: Some(1000),
        ..Default::default()
    };
    let app_path = make_path("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "myapp");
    let app = RegisterPathParams {
        path: app_path.clone(),
        hash: nar_hash('1'),
        nar_size: Some(12345),
        deriver: Some(make_path("dddddddddddddddddddddddddddddddd", "myapp.drv")),
        // self-reference plus an unknown path that gets skipped
        references: BTreeSet::from([
            glibc.path.clone(),
            app_path.clone(),
            make_path("zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz", "missing"),
        ]),
        ..Default::default()
    };

    db.register_valid_path(&glibc).unwrap();
    db.register_valid_path(&app).unwrap();
    assert_eq!(db.count_valid_paths().unwrap(), 2);

    let info = db.query_path_info(&app.path).unwrap().unwrap();
    assert_eq!(info.path, app.path);
    assert_eq!(info.hash, app.hash);
    assert_eq!(info.nar_size, Some(12345));
    assert_eq!(info.deriver, app.deriver);
    assert_eq!(
        info.references,
        BTreeSet::from([app_path.clone(), glibc.path.clone()])
    );

    let glibc_info = db.query_path_info(&glibc.path).unwrap().unwrap();
    assert!(glibc_info.references.is_empty());
    assert_eq!(glibc_info.deriver, None);

    assert!(
        db.query_path_info(&make_path("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb", "x"))
            .unwrap()
            .is_none()
    );
}

#[rstest]
#[case::exact("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", Some("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa-hello"))]
#[case::other("cccccccccccccccccccccccccccccccc", Some("cccccccccccccccccccccccccccccccc-world"))]
#[case::between("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb", None)]
#[case::past_end("dddddddddddddddddddddddddddddddd", None)]
fn test_query_path_from_hash_part(#[case] hash_part: &str, #[case] expected: Option<&str>) {
    let mut db = StoreDb::open_memory().unwrap();
    for (hash, name) in [
        ("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "hello"),
        ("cccccccccccccccccccccccccccccccc", "world"),
    ] {
        db.register_valid_path(&RegisterPathParams {
            path: make_path(hash, name),
            hash: nar_hash('0'),
            ..Default::default()
        })
        .unwrap();
    }

    let found = db
        .query_path_from_hash_part("/nix/store", hash_part)
        .unwrap();
    assert_eq!(found, expected.map(|base| format!("/nix/store/{base}")));
}

#[test]
fn test_realisations() {
    let mut db = StoreDb::open_memory().unwrap();
    let lib_id = db
        .register_valid_path(&RegisterPathParams {
            path: make_path("llllllllllllllllllllllllllllllll", "lib"),
            hash: nar_hash('0'),
            ..Default::default()
        })
        .unwrap();
    let out_id = db
        .register_valid_path(&RegisterPathParams {
            path: make_path("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "app"),
            hash: nar_hash('1'),
            ..Default::default()
        })
        .unwrap();

    let drv_hash = nar_hash('a');
    let dep_hash = nar_hash('b');
    let dep = db
        .register_realisation(&dep_hash, "lib", lib_id, None)
        .unwrap();
    let realisation = db
        .register_realisation(&drv_hash, "out", out_id, Some("cache-1:sig1 cache-2:sig2"))
        .unwrap();
    db.add_realisation_reference(realisation, dep).unwrap();

    let found = db.query_realisation(&drv_hash, "out").unwrap().unwrap();
    assert_eq!(found.output_path, make_path("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "app"));
    assert_eq!(found.signatures(), vec!["cache-1:sig1", "cache-2:sig2"]);

    let deps = db.query_realisation_references(found.id).unwrap();
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].drv_hash, dep_hash);
    assert_eq!(deps[0].output_name, "lib");
    assert_eq!(deps[0].output_path, make_path("llllllllllllllllllllllllllllllll", "lib"));

    assert!(db.query_realisation(&drv_hash, "dev").unwrap().is_none());
    assert!(db.query_realisation(&dep_hash, "out").unwrap().is_none());
}

#[test]
fn test_read_only_sees_committed_writes() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("db.sqlite");

    let mut writer = StoreDb::open(&db_path, OpenMode::Create).unwrap();
    let reader = StoreDb::open(&db_path, OpenMode::ReadOnly).unwrap();
    assert_eq!(reader.count_valid_paths().unwrap(), 0);

    let path = make_path("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "late");
    writer
        .register_valid_path(&RegisterPathParams {
            path: path.clone(),
            hash: nar_hash('0'),
            ..Default::default()
        })
        .unwrap();

    assert!(reader.query_path_info(&path).unwrap().is_some());
}

#[test]
fn test_read_only_missing_database() {
    let dir = tempfile::tempdir().unwrap();
    let result = StoreDb::open(dir.path().join("nope.sqlite"), OpenMode::ReadOnly);
    assert!(matches!(result, Err(Error::DatabaseNotFound(_))));
}

#[test]
fn test_database_without_ca_tables() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("db.sqlite");
    {
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "create table ValidPaths (id integer primary key, path text unique not null, \
             hash text not null, registrationTime integer not null, deriver text, narSize integer);",
        )
        .unwrap();
    }

    let db = StoreDb::open(&db_path, OpenMode::ReadOnly).unwrap();
    assert!(!db.has_ca_schema().unwrap());
    assert!(db.query_realisation(&nar_hash('a'), "out").unwrap().is_none());
}
