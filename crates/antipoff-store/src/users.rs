//! Identity tables: [`Role`] and [`User`].

use antipoff_shared::Email;
use rusqlite::types::Value;
use rusqlite::{Connection, Row};

use crate::error::Result;
use crate::models::{NewRole, NewUser, Role, User};
use crate::repository::{timestamp_at, Entity, Filter, Repository};

impl Entity for Role {
    const TABLE: &'static str = "roles";
    const COLUMNS: &'static [&'static str] = &["id", "name", "create_ts", "update_ts"];
    const SEARCHABLE: &'static [&'static str] = &["name"];
    const SORTABLE: &'static [&'static str] = &["id", "name"];

    type New = NewRole;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Role {
            id: row.get(0)?,
            name: row.get(1)?,
            create_ts: timestamp_at(row, 2)?,
            update_ts: timestamp_at(row, 3)?,
        })
    }

    fn insert_values(new: &NewRole) -> Vec<(&'static str, Value)> {
        vec![("name", Value::Text(new.name.clone()))]
    }
}

impl Entity for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "username",
        "first_name",
        "last_name",
        "password",
        "email",
        "is_active",
        "role_id",
        "create_ts",
        "update_ts",
    ];
    const SEARCHABLE: &'static [&'static str] = &["username", "email"];
    const SORTABLE: &'static [&'static str] = &["id", "username", "role_id"];

    type New = NewUser;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            password: row.get(4)?,
            email: row.get(5)?,
            is_active: row.get(6)?,
            role_id: row.get(7)?,
            create_ts: timestamp_at(row, 8)?,
            update_ts: timestamp_at(row, 9)?,
        })
    }

    fn insert_values(new: &NewUser) -> Vec<(&'static str, Value)> {
        vec![
            ("username", Value::Text(new.username.clone())),
            ("first_name", Value::Text(new.first_name.clone())),
            ("last_name", Value::Text(new.last_name.clone())),
            ("password", Value::Text(new.password.clone())),
            ("email", Value::Text(new.email.as_str().to_string())),
            ("is_active", Value::from(new.is_active)),
            ("role_id", Value::Integer(new.role_id)),
        ]
    }
}

impl Repository<User> {
    pub fn find_by_email(conn: &Connection, email: &Email) -> Result<Option<User>> {
        Self::find_one_or_none(conn, &Filter::new().eq("email", email.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::error::StoreError;
    use antipoff_shared::constants::{ADMIN_ROLE_ID, DEFAULT_ROLE_ID};

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            first_name: "John".into(),
            last_name: "Doe".into(),
            password: "$argon2id$placeholder".into(),
            email: Email::parse(email).unwrap(),
            is_active: true,
            role_id: DEFAULT_ROLE_ID,
        }
    }

    #[test]
    fn seeded_roles_exist() {
        let db = Database::open_in_memory().unwrap();
        let user = Repository::<Role>::find_by_id(db.conn(), DEFAULT_ROLE_ID).unwrap().unwrap();
        let admin = Repository::<Role>::find_by_id(db.conn(), ADMIN_ROLE_ID).unwrap().unwrap();
        assert_eq!(user.name, "user");
        assert_eq!(admin.name, "admin");
    }

    #[test]
    fn create_and_find_user_by_email() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn();
        let created = Repository::<User>::add(conn, &new_user("john_doe", "john.doe@example.com")).unwrap();

        assert_eq!(created.full_name(), "John Doe");
        assert!(created.is_active);
        assert_eq!(created.role_id, DEFAULT_ROLE_ID);

        let email = Email::parse("john.doe@EXAMPLE.com").unwrap();
        let found = Repository::<User>::find_by_email(conn, &email).unwrap().unwrap();
        assert_eq!(found, created);
    }

    #[test]
    fn duplicate_email_or_username_is_conflict() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn();
        Repository::<User>::add(conn, &new_user("john_doe", "john.doe@example.com")).unwrap();

        let same_email = Repository::<User>::add(conn, &new_user("jane", "john.doe@example.com"));
        assert!(matches!(same_email, Err(StoreError::Conflict(_))));

        let same_username = Repository::<User>::add(conn, &new_user("john_doe", "other@example.com"));
        assert!(matches!(same_username, Err(StoreError::Conflict(_))));
    }

    #[test]
    fn unknown_role_is_foreign_key_error() {
        let db = Database::open_in_memory().unwrap();
        let mut user = new_user("ghost", "ghost@example.com");
        user.role_id = 99;
        assert!(matches!(
            Repository::<User>::add(db.conn(), &user),
            Err(StoreError::ForeignKey(_))
        ));
    }
}
