use super::*;

#[tokio::test]
async fn test_fresh_database_is_not_unclean() {
    let (db, _file) = open_temp_db().await;
    assert!(!db.was_unclean_shutdown().await.unwrap());
}

#[tokio::test]
async fn test_start_without_shutdown_is_unclean() {
    let (db, _file) = open_temp_db().await;
    db.set_clean_start().await.unwrap();
    assert!(db.was_unclean_shutdown().await.unwrap());

    db.set_clean_shutdown().await.unwrap();
    assert!(!db.was_unclean_shutdown().await.unwrap());
}

#[tokio::test]
async fn test_set_state_overwrites_value() {
    let (db, _file) = open_temp_db().await;
    assert_eq!(db.get_state("k").await.unwrap(), None);

    db.set_state("k", "one").await.unwrap();
    db.set_state("k", "two").await.unwrap();
    assert_eq!(db.get_state("k").await.unwrap().as_deref(), Some("two"));
}
