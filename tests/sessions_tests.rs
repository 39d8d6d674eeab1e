use mosaic::sessions::SessionRegistry;
use uuid::Uuid;

#[test]
fn test_insert_take_roundtrip() {
    let registry = SessionRegistry::new();
    let file_id = Uuid::new_v4();
    let client_id = Uuid::new_v4();

    assert!(registry.is_empty());
    registry.insert(file_id, client_id);
    assert_eq!(registry.len(), 1);

    // take consumes the entry
    assert_eq!(registry.take(file_id), Some(client_id));
    assert!(registry.is_empty());
    assert_eq!(registry.take(file_id), None);
}

#[test]
fn test_insert_is_an_upsert() {
    let registry = SessionRegistry::new();
    let file_id = Uuid::new_v4();
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    registry.insert(file_id, first);
    registry.insert(file_id, second);

    // latest session token wins, and there is still only one entry
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.take(file_id), Some(second));
}
