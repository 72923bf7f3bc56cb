//! Database connection and test utilities

pub use sea_orm;
mod connection;

pub use connection::{establish_connection, DbConnection};

pub mod test_utils;

#[cfg(test)]
mod tests {
    use super::*;
    use lure_entities::realms;
    use sea_orm::{ActiveModelTrait, EntityTrait, Set};

    #[tokio::test]
    async fn test_establish_connection_runs_migrations() {
        let db = establish_connection("sqlite::memory:").await.unwrap();
        let realms = realms::Entity::find().all(db.as_ref()).await.unwrap();
        assert!(realms.is_empty());
    }

    #[tokio::test]
    async fn test_timestamps_are_stamped_on_insert() {
        let test_db = test_utils::TestDatabase::with_migrations().await.unwrap();
        let realm = realms::ActiveModel {
            name: Set("acme".into()),
            domain: Set("acme.test".into()),
            attributes: Set(serde_json::json!({"tenant-domain": "acme.test"})),
            features: Set(serde_json::json!({})),
            ..Default::default()
        }
        .insert(test_db.db.as_ref())
        .await
        .unwrap();

        assert!(realm.created_at <= chrono::Utc::now());
        assert_eq!(realm.created_at, realm.updated_at);
    }
}
