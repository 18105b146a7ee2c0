//! User accounts: registration, credential checks and lookups.

use tracing::{debug, info};

use antipoff_shared::constants::{ADMIN_ROLE_NAME, DEFAULT_ROLE_ID};
use antipoff_shared::dto::{UserInfo, UserRegister};
use antipoff_shared::password::{hash_password, verify_password};
use antipoff_shared::Email;
use antipoff_store::{Filter, NewUser, Repository, Role, User};

use crate::db::DbPool;
use crate::error::ServerError;

#[derive(Clone)]
pub struct IdentityService {
    db: DbPool,
}

impl IdentityService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn find_by_email(&self, email: &Email) -> Result<Option<User>, ServerError> {
        let email = email.clone();
        self.db
            .transaction(move |conn| Repository::<User>::find_by_email(conn, &email))
            .await
    }

    pub async fn find_by_id(&self, user_id: i64) -> Result<Option<User>, ServerError> {
        self.db
            .transaction(move |conn| Repository::<User>::find_by_id(conn, user_id))
            .await
    }

    pub async fn list_all_users(&self) -> Result<Vec<User>, ServerError> {
        self.db
            .transaction(|conn| Repository::<User>::find_all(conn, &Filter::new()))
            .await
    }

    /// Look up `email` and check `password` against the stored hash.
    /// Unknown emails and wrong passwords both yield `None`.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>, ServerError> {
        let email = Email::parse(email)?;
        let Some(user) = self.find_by_email(&email).await? else {
            debug!(email = %email, "Login for unknown email");
            return Ok(None);
        };

        let hash = user.password.clone();
        let password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| ServerError::Internal(format!("password task failed: {e}")))??;

        if !matches {
            debug!(user_id = user.id, "Login with wrong password");
            return Ok(None);
        }
        Ok(Some(user))
    }

    /// Create an account with the default role.
    pub async fn register(&self, request: &UserRegister) -> Result<User, ServerError> {
        let email = request.validate()?;

        if self.find_by_email(&email).await?.is_some() {
            return Err(ServerError::Conflict("User already exists".into()));
        }

        let password = request.password.clone();
        let hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| ServerError::Internal(format!("password task failed: {e}")))??;

        let new_user = NewUser {
            username: request.username.trim().to_string(),
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            password: hash,
            email,
            is_active: true,
            role_id: DEFAULT_ROLE_ID,
        };

        let user = self
            .db
            .transaction(move |conn| Repository::<User>::add(conn, &new_user))
            .await
            .map_err(|e| match e {
                ServerError::Conflict(_) => ServerError::Conflict("User already exists".into()),
                other => other,
            })?;

        info!(user_id = user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Whether `user`'s role is the admin role.
    pub async fn is_admin(&self, user: &User) -> Result<bool, ServerError> {
        let role_id = user.role_id;
        let role = self
            .db
            .transaction(move |conn| Repository::<Role>::find_by_id(conn, role_id))
            .await?;
        Ok(role.is_some_and(|r| r.name == ADMIN_ROLE_NAME))
    }
}

/// Public projection of a user; never includes the password hash.
pub fn user_info(user: &User) -> UserInfo {
    UserInfo {
        id: user.id,
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        full_name: user.full_name(),
        email: user.email.clone(),
        is_active: user.is_active,
        role_id: user.role_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use antipoff_shared::constants::ADMIN_ROLE_ID;
    use antipoff_store::Value;

    use crate::config::DatabaseLocation;

    fn registration(username: &str, email: &str) -> UserRegister {
        UserRegister {
            username: username.into(),
            first_name: "Test".into(),
            last_name: "User".into(),
            email: email.into(),
            password: "password1".into(),
            confirm_password: "password1".into(),
        }
    }

    fn service() -> (IdentityService, DbPool) {
        let db = DbPool::open(&DatabaseLocation::Memory).unwrap();
        (IdentityService::new(db.clone()), db)
    }

    #[tokio::test]
    async fn test_register_and_authenticate() {
        let (identity, _db) = service();
        let user = identity
            .register(&registration("testuser1", "test1@example.com"))
            .await
            .unwrap();

        assert_eq!(user.role_id, DEFAULT_ROLE_ID);
        assert!(user.is_active);
        assert_ne!(user.password, "password1");

        let authenticated = identity.authenticate("test1@example.com", "password1").await.unwrap();
        assert_eq!(authenticated, Some(user));
        assert!(identity.authenticate("test1@example.com", "wrong-pass").await.unwrap().is_none());
        assert!(identity.authenticate("nobody@example.com", "password1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let (identity, _db) = service();
        identity
            .register(&registration("testuser1", "test1@example.com"))
            .await
            .unwrap();

        let err = identity
            .register(&registration("testuser2", "test1@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_duplicate_username_is_conflict() {
        let (identity, _db) = service();
        identity
            .register(&registration("testuser1", "test1@example.com"))
            .await
            .unwrap();

        let err = identity
            .register(&registration("testuser1", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_invalid_registration_is_validation_error() {
        let (identity, _db) = service();
        let mut request = registration("testuser1", "test1@example.com");
        request.confirm_password = "different".into();
        assert!(matches!(
            identity.register(&request).await,
            Err(ServerError::Validation(_))
        ));
        assert!(identity.list_all_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lookups_and_admin_role() {
        let (identity, db) = service();
        let user = identity
            .register(&registration("testuser1", "test1@example.com"))
            .await
            .unwrap();

        let by_id = identity.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(by_id, user);
        let email = Email::parse("test1@example.com").unwrap();
        assert_eq!(identity.find_by_email(&email).await.unwrap(), Some(user.clone()));
        assert!(!identity.is_admin(&user).await.unwrap());

        let id = user.id;
        db.transaction(move |conn| {
            Repository::<User>::update(conn, &Filter::by_id(id), &[("role_id", Value::Integer(ADMIN_ROLE_ID))])
        })
        .await
        .unwrap();
        let promoted = identity.find_by_id(user.id).await.unwrap().unwrap();
        assert!(identity.is_admin(&promoted).await.unwrap());
    }

    #[test]
    fn test_user_info_projection() {
        let now = chrono::Utc::now();
        let user = User {
            id: 7,
            username: "john_doe".into(),
            first_name: "John".into(),
            last_name: "Doe".into(),
            password: "$argon2id$hash".into(),
            email: "john.doe@example.com".into(),
            is_active: true,
            role_id: DEFAULT_ROLE_ID,
            create_ts: now,
            update_ts: now,
        };
        let info = user_info(&user);
        assert_eq!(info.full_name, "John Doe");
        assert!(!serde_json::to_string(&info).unwrap().contains("argon2"));
    }
}
