use cafemap_core::db::open_db_in_memory;
use cafemap_core::{
    CafeRecord, CafeRepository, CafeStore, CafeValidationError, LatLng, RepoError,
    SqliteCafeRepository, SqliteCafeStore,
};

fn cafe(id: &str, name: &str) -> CafeRecord {
    let mut record = CafeRecord::new(id, name, LatLng::new(20.97, -89.61));
    record.rating = Some(4.5);
    record.review_count = Some(120);
    record.link = Some(format!("https://maps.example/{id}"));
    record
}

#[test]
fn insert_and_list_preserve_order_and_fields() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCafeRepository::new(&conn);

    let mut b = cafe("b", "Café B");
    b.image_url = Some("https://img.example/b.jpg".to_string());
    let inserted = repo.insert_cafes(&[cafe("a", "Café A"), b.clone()]).unwrap();

    assert_eq!(inserted, 2);
    let listed = repo.list_cafes().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, "a");
    assert_eq!(listed[1], b);
}

#[test]
fn insert_skips_existing_ids_without_overwriting() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCafeRepository::new(&conn);

    repo.insert_cafes(&[cafe("a", "Original")]).unwrap();
    let inserted = repo
        .insert_cafes(&[cafe("a", "Renamed"), cafe("b", "Café B")])
        .unwrap();

    assert_eq!(inserted, 1);
    assert_eq!(repo.get_cafe("a").unwrap().unwrap().name, "Original");
}

#[test]
fn invalid_record_rejects_whole_batch() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCafeRepository::new(&conn);

    let bad = CafeRecord::new("bad", "Bad", LatLng::new(91.0, 0.0));
    let err = repo.insert_cafes(&[cafe("a", "Café A"), bad]).unwrap_err();

    assert!(matches!(
        err,
        RepoError::Validation(CafeValidationError::LatitudeOutOfRange(_))
    ));
    assert!(repo.list_cafes().unwrap().is_empty());
}

#[test]
fn get_missing_cafe_returns_none() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCafeRepository::new(&conn);

    assert!(repo.get_cafe("nope").unwrap().is_none());
}

#[test]
fn corrupted_row_is_reported_as_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO cafes (id, name, lat, lng) VALUES ('x', 'X', 200.0, 0.0);",
        [],
    )
    .unwrap();
    let repo = SqliteCafeRepository::new(&conn);

    assert!(matches!(repo.list_cafes(), Err(RepoError::InvalidData(_))));
}

#[tokio::test]
async fn sqlite_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cafemap.sqlite3");

    let store = SqliteCafeStore::open(&path).unwrap();
    assert_eq!(store.insert_many(&[cafe("a", "Café A")]).await.unwrap(), 1);
    drop(store);

    let reopened = SqliteCafeStore::open(&path).unwrap();
    let all = reopened.read_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(reopened.get_by_id("a").await.unwrap(), Some(cafe("a", "Café A")));
}
