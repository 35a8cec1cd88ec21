use serde_json::Value;
use uuid::Uuid;

use crate::{
    accounts::repo_types::{Account, AccountPatch, PreferencesPatch},
    db::{DocumentStore, StoreResult},
    repo::{Document, Repository},
    roommates::preferences::RoommatePreferences,
};

const DORMS_FIELD: &str = "dorms";
const ROOMMATES_FIELD: &str = "roommates";

impl Account {
    /// Find an account by its exact username.
    pub async fn find_by_username(
        store: &dyn DocumentStore,
        username: &str,
    ) -> StoreResult<Option<Account>> {
        Repository::<Account>::new(store)
            .find_by("username", &Value::String(username.to_string()))
            .await
    }

    pub async fn find_by_id(store: &dyn DocumentStore, id: Uuid) -> StoreResult<Option<Account>> {
        Repository::<Account>::new(store).get(id).await
    }

    /// Create a new account with an already hashed password. A taken username
    /// fails with `StoreError::Conflict`.
    pub async fn create(
        store: &dyn DocumentStore,
        username: String,
        email: String,
        password_hash: String,
    ) -> StoreResult<Account> {
        Repository::<Account>::new(store)
            .create(|id| Account::new(id, username, email, password_hash))
            .await
    }

    pub async fn update(
        store: &dyn DocumentStore,
        id: Uuid,
        patch: &AccountPatch,
    ) -> StoreResult<Option<Account>> {
        Repository::<Account>::new(store).update(id, patch).await
    }

    pub async fn set_roommate_preferences(
        store: &dyn DocumentStore,
        id: Uuid,
        preferences: &RoommatePreferences,
    ) -> StoreResult<Option<Account>> {
        let patch = PreferencesPatch {
            roommate_preferences: preferences,
            updated_at: time::OffsetDateTime::now_utc(),
        };
        Repository::<Account>::new(store).update(id, &patch).await
    }

    /// Every account, in registration order.
    pub async fn all(store: &dyn DocumentStore) -> StoreResult<Vec<Account>> {
        Repository::<Account>::new(store).scan(&[]).await
    }

    pub async fn delete(store: &dyn DocumentStore, id: Uuid) -> StoreResult<bool> {
        Repository::<Account>::new(store).delete(id).await
    }

    pub async fn link_dorm(store: &dyn DocumentStore, owner: Uuid, dorm: Uuid) -> StoreResult<()> {
        store
            .add_to_set(Self::COLLECTION, owner, DORMS_FIELD, &dorm.to_string())
            .await
    }

    pub async fn unlink_dorm(store: &dyn DocumentStore, owner: Uuid, dorm: Uuid) -> StoreResult<()> {
        store
            .pull(Self::COLLECTION, owner, DORMS_FIELD, &dorm.to_string())
            .await
    }

    pub async fn link_roommate_request(
        store: &dyn DocumentStore,
        owner: Uuid,
        request: Uuid,
    ) -> StoreResult<()> {
        store
            .add_to_set(Self::COLLECTION, owner, ROOMMATES_FIELD, &request.to_string())
            .await
    }

    pub async fn unlink_roommate_request(
        store: &dyn DocumentStore,
        owner: Uuid,
        request: Uuid,
    ) -> StoreResult<()> {
        store
            .pull(Self::COLLECTION, owner, ROOMMATES_FIELD, &request.to_string())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, StoreError};
    use time::OffsetDateTime;

    #[tokio::test]
    async fn usernames_are_unique() {
        let store = MemoryStore::new();
        Account::create(&store, "alice".into(), "a@x.com".into(), "h".into())
            .await
            .unwrap();
        let err = Account::create(&store, "alice".into(), "b@x.com".into(), "h".into())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { field: "username" }));
    }

    #[tokio::test]
    async fn dorm_links_are_a_set() {
        let store = MemoryStore::new();
        let account = Account::create(&store, "bob".into(), "b@x.com".into(), "h".into())
            .await
            .unwrap();
        let dorm = Uuid::new_v4();

        Account::link_dorm(&store, account.id, dorm).await.unwrap();
        Account::link_dorm(&store, account.id, dorm).await.unwrap();
        let loaded = Account::find_by_id(&store, account.id).await.unwrap().unwrap();
        assert_eq!(loaded.dorms, vec![dorm]);

        Account::unlink_dorm(&store, account.id, dorm).await.unwrap();
        let loaded = Account::find_by_id(&store, account.id).await.unwrap().unwrap();
        assert!(loaded.dorms.is_empty());
    }

    #[tokio::test]
    async fn patch_leaves_other_fields_alone() {
        let store = MemoryStore::new();
        let account = Account::create(&store, "carol".into(), "c@x.com".into(), "h".into())
            .await
            .unwrap();
        let patch = AccountPatch {
            username: None,
            email: Some("new@x.com".into()),
            password_hash: None,
            updated_at: OffsetDateTime::now_utc(),
        };
        let updated = Account::update(&store, account.id, &patch).await.unwrap().unwrap();
        assert_eq!(updated.email, "new@x.com");
        assert_eq!(updated.username, "carol");
        assert_eq!(updated.password_hash, "h");

        let by_name = Account::find_by_username(&store, "carol").await.unwrap().unwrap();
        assert_eq!(by_name.id, account.id);
    }

    #[tokio::test]
    async fn preferences_are_replaced_whole() {
        use crate::roommates::preferences::{RoommatePreferences, SleepSchedule};

        let store = MemoryStore::new();
        let account = Account::create(&store, "dave".into(), "d@x.com".into(), "h".into())
            .await
            .unwrap();
        assert!(account.roommate_preferences.is_none());

        let first = RoommatePreferences {
            sleep_schedule: Some(SleepSchedule::Late),
            is_smoker: Some(false),
            ..Default::default()
        };
        Account::set_roommate_preferences(&store, account.id, &first)
            .await
            .unwrap();

        let second = RoommatePreferences {
            has_pets: Some(true),
            ..Default::default()
        };
        let updated = Account::set_roommate_preferences(&store, account.id, &second)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.roommate_preferences, Some(second));
        assert_eq!(updated.username, "dave");

        assert!(Account::set_roommate_preferences(&store, Uuid::new_v4(), &first)
            .await
            .unwrap()
            .is_none());
        assert_eq!(Account::all(&store).await.unwrap().len(), 1);
    }
}
