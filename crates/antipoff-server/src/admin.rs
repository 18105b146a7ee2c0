//! Admin panel API.
//!
//! Every table gets the same views: a searchable, sortable, paged list,
//! create, a detail view with its related row attached, edit and delete.
//! All of them require the admin role.
//!
//! Created and edited values go through the same checks as the public
//! endpoints (field lengths, email and cadastral number formats), and user
//! passwords are hashed before they are stored.

use axum::extract::{Path, Query as UrlQuery, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;

use antipoff_shared::constants::{DEFAULT_ROLE_ID, MAX_FIELD_LEN, MAX_PASSWORD_LEN, MIN_PASSWORD_LEN};
use antipoff_shared::dto::{check_len, MessageResponse, UserRegister};
use antipoff_shared::password::hash_password;
use antipoff_shared::{CadastralNumber, Email};
use antipoff_store::{
    Connection, Entity, Filter, History, ListQuery, NewHistory, NewQuery, NewRole, NewUser, Query,
    Repository, Role, SortOrder, User, Value as SqlValue,
};

use crate::api::AppState;
use crate::error::ServerError;
use crate::session::AdminUser;

/// Upper bound on `limit`, so one request cannot page through everything.
const MAX_PAGE_SIZE: u32 = 500;

/// How a table is shown and edited in the admin panel.
pub trait AdminView: Entity + Send + 'static {
    /// Path segment and display name.
    const NAME: &'static str;

    /// Columns the edit view may change.
    const EDITABLE: &'static [&'static str];

    /// Body accepted by the create view.
    type Form: DeserializeOwned + Send + 'static;

    /// Row as shown in list views.
    fn summary(&self) -> Value;

    /// Row as shown in the detail view, with related rows attached.
    fn detail(&self, _conn: &Connection) -> antipoff_store::Result<Value> {
        Ok(self.summary())
    }

    /// Validate a create form into an insertable row.
    fn prepare_new(form: Self::Form) -> Result<Self::New, ServerError>;

    /// Validate one edited field and convert it to its stored value.
    /// `column` is always one of [`AdminView::EDITABLE`].
    fn edit_value(column: &'static str, value: Value) -> Result<SqlValue, ServerError>;

    /// Turn an edit body into column/value pairs for the repository.
    fn prepare_changes(body: Map<String, Value>) -> Result<Vec<(&'static str, SqlValue)>, ServerError> {
        if body.is_empty() {
            return Err(ServerError::BadRequest("No fields to update".into()));
        }
        body.into_iter()
            .map(|(key, value)| {
                let column = Self::EDITABLE
                    .iter()
                    .copied()
                    .find(|c| *c == key)
                    .ok_or_else(|| ServerError::BadRequest(format!("'{key}' is not editable")))?;
                Ok((column, Self::edit_value(column, value)?))
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct RoleForm {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UserForm {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub is_active: Option<bool>,
    pub role_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct QueryForm {
    pub cadastral_number: CadastralNumber,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
pub struct HistoryForm {
    pub query_id: i64,
    pub history: bool,
}

impl AdminView for Role {
    const NAME: &'static str = "roles";
    const EDITABLE: &'static [&'static str] = &["name"];

    type Form = RoleForm;

    fn summary(&self) -> Value {
        json!({ "id": self.id, "name": self.name })
    }

    fn prepare_new(form: RoleForm) -> Result<NewRole, ServerError> {
        check_len("name", &form.name, 1, MAX_FIELD_LEN)?;
        Ok(NewRole {
            name: form.name.trim().to_string(),
        })
    }

    fn edit_value(column: &'static str, value: Value) -> Result<SqlValue, ServerError> {
        short_text(column, value)
    }
}

impl AdminView for User {
    const NAME: &'static str = "users";
    const EDITABLE: &'static [&'static str] = &[
        "username",
        "first_name",
        "last_name",
        "email",
        "password",
        "is_active",
        "role_id",
    ];

    type Form = UserForm;

    fn summary(&self) -> Value {
        json!({
            "id": self.id,
            "username": self.username,
            "full_name": self.full_name(),
            "email": self.email,
            "is_active": self.is_active,
            "role_id": self.role_id,
        })
    }

    fn detail(&self, conn: &Connection) -> antipoff_store::Result<Value> {
        let mut value = self.summary();
        let role = Repository::<Role>::find_by_id(conn, self.role_id)?;
        value["role"] = role.map_or(Value::Null, |r| r.summary());
        Ok(value)
    }

    fn prepare_new(form: UserForm) -> Result<NewUser, ServerError> {
        let UserForm {
            username,
            first_name,
            last_name,
            email,
            password,
            is_active,
            role_id,
        } = form;
        let register = UserRegister {
            username,
            first_name,
            last_name,
            email,
            confirm_password: password.clone(),
            password,
        };
        let email = register.validate()?;

        Ok(NewUser {
            username: register.username.trim().to_string(),
            first_name: register.first_name.trim().to_string(),
            last_name: register.last_name.trim().to_string(),
            password: hash_password(&register.password)?,
            email,
            is_active: is_active.unwrap_or(true),
            role_id: role_id.unwrap_or(DEFAULT_ROLE_ID),
        })
    }

    fn edit_value(column: &'static str, value: Value) -> Result<SqlValue, ServerError> {
        match column {
            "email" => {
                let email = Email::parse(&text(column, value)?)?;
                Ok(SqlValue::Text(email.as_ref().to_string()))
            }
            "password" => {
                let password = text(column, value)?;
                check_len(column, &password, MIN_PASSWORD_LEN, MAX_PASSWORD_LEN)?;
                Ok(SqlValue::Text(hash_password(&password)?))
            }
            "is_active" => boolean(column, value),
            "role_id" => integer(column, value),
            _ => short_text(column, value),
        }
    }
}

impl AdminView for Query {
    const NAME: &'static str = "queries";
    const EDITABLE: &'static [&'static str] = &["cadastral_number", "latitude", "longitude"];

    type Form = QueryForm;

    fn summary(&self) -> Value {
        json!({
            "id": self.id,
            "cadastral_number": self.cadastral_number,
            "latitude": self.latitude,
            "longitude": self.longitude,
        })
    }

    fn prepare_new(form: QueryForm) -> Result<NewQuery, ServerError> {
        Ok(NewQuery {
            cadastral_number: form.cadastral_number,
            latitude: form.latitude,
            longitude: form.longitude,
        })
    }

    fn edit_value(column: &'static str, value: Value) -> Result<SqlValue, ServerError> {
        match column {
            "cadastral_number" => {
                let number = CadastralNumber::parse(&text(column, value)?)?;
                Ok(SqlValue::Text(number.as_ref().to_string()))
            }
            _ => real(column, value),
        }
    }
}

impl AdminView for History {
    const NAME: &'static str = "histories";
    const EDITABLE: &'static [&'static str] = &["query_id", "history"];

    type Form = HistoryForm;

    fn summary(&self) -> Value {
        json!({ "id": self.id, "query_id": self.query_id, "history": self.history })
    }

    fn detail(&self, conn: &Connection) -> antipoff_store::Result<Value> {
        let mut value = self.summary();
        let query = Repository::<Query>::find_by_id(conn, self.query_id)?;
        value["query"] = query.map_or(Value::Null, |q| q.summary());
        Ok(value)
    }

    fn prepare_new(form: HistoryForm) -> Result<NewHistory, ServerError> {
        Ok(NewHistory {
            query_id: form.query_id,
            history: form.history,
        })
    }

    fn edit_value(column: &'static str, value: Value) -> Result<SqlValue, ServerError> {
        match column {
            "history" => boolean(column, value),
            _ => integer(column, value),
        }
    }
}

// -- Field conversions for edits --

fn wrong_type(column: &str, expected: &str) -> ServerError {
    ServerError::BadRequest(format!("'{column}' must be {expected}"))
}

fn text(column: &str, value: Value) -> Result<String, ServerError> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(wrong_type(column, "a string")),
    }
}

/// Non-empty name-like field, trimmed.
fn short_text(column: &'static str, value: Value) -> Result<SqlValue, ServerError> {
    let value = text(column, value)?;
    check_len(column, &value, 1, MAX_FIELD_LEN)?;
    Ok(SqlValue::Text(value.trim().to_string()))
}

fn integer(column: &str, value: Value) -> Result<SqlValue, ServerError> {
    value
        .as_i64()
        .map(SqlValue::Integer)
        .ok_or_else(|| wrong_type(column, "an integer"))
}

fn real(column: &str, value: Value) -> Result<SqlValue, ServerError> {
    value
        .as_f64()
        .map(SqlValue::Real)
        .ok_or_else(|| wrong_type(column, "a number"))
}

fn boolean(column: &str, value: Value) -> Result<SqlValue, ServerError> {
    value
        .as_bool()
        .map(|b| SqlValue::Integer(i64::from(b)))
        .ok_or_else(|| wrong_type(column, "a boolean"))
}

/// Password hashing is CPU-bound; keep it off the async workers.
async fn off_runtime<T, F>(f: F) -> Result<T, ServerError>
where
    F: FnOnce() -> Result<T, ServerError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServerError::Internal(format!("admin task failed: {e}")))?
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    let router = Router::new().route("/", get(index));
    let router = with_views::<User>(router);
    let router = with_views::<Role>(router);
    let router = with_views::<Query>(router);
    with_views::<History>(router)
}

fn with_views<E: AdminView>(router: Router<AppState>) -> Router<AppState> {
    router
        .route(&format!("/{}", E::NAME), get(list_view::<E>).post(create_view::<E>))
        .route(
            &format!("/{}/{{id}}", E::NAME),
            get(detail_view::<E>)
                .patch(edit_view::<E>)
                .delete(delete_view::<E>),
        )
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListParams {
    fn into_list_query(self) -> Result<ListQuery, ServerError> {
        let order = match self.order.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => SortOrder::Asc,
            Some("desc") => SortOrder::Desc,
            Some(other) => {
                return Err(ServerError::BadRequest(format!(
                    "order must be 'asc' or 'desc', got '{other}'"
                )))
            }
        };

        Ok(ListQuery {
            search: self.search,
            sort: self.sort.filter(|s| !s.is_empty()),
            order,
            limit: self.limit.map(|l| l.min(MAX_PAGE_SIZE)),
            offset: self.offset,
        })
    }
}

/// Row counts per table.
async fn index(State(state): State<AppState>, _admin: AdminUser) -> Result<Json<Value>, ServerError> {
    let counts = state
        .db
        .transaction(|conn| {
            let all = Filter::new();
            Ok(json!({
                "users": Repository::<User>::count(conn, &all)?,
                "roles": Repository::<Role>::count(conn, &all)?,
                "queries": Repository::<Query>::count(conn, &all)?,
                "histories": Repository::<History>::count(conn, &all)?,
            }))
        })
        .await?;
    Ok(Json(counts))
}

async fn list_view<E: AdminView>(
    State(state): State<AppState>,
    _admin: AdminUser,
    UrlQuery(params): UrlQuery<ListParams>,
) -> Result<Json<Vec<Value>>, ServerError> {
    let list = params.into_list_query()?;
    let rows = state
        .db
        .transaction(move |conn| Repository::<E>::list(conn, &list))
        .await?;
    Ok(Json(rows.iter().map(E::summary).collect()))
}

async fn create_view<E: AdminView>(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(form): Json<E::Form>,
) -> Result<(StatusCode, Json<Value>), ServerError> {
    let new = off_runtime(move || E::prepare_new(form)).await?;
    let row = state
        .db
        .transaction(move |conn| Repository::<E>::add(conn, &new))
        .await?;

    let summary = row.summary();
    info!(admin_id = admin.id, table = E::NAME, id = %summary["id"], "Admin created row");
    Ok((StatusCode::CREATED, Json(summary)))
}

async fn detail_view<E: AdminView>(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ServerError> {
    let detail = state
        .db
        .transaction(move |conn| match Repository::<E>::find_by_id(conn, id)? {
            Some(row) => row.detail(conn).map(Some),
            None => Ok(None),
        })
        .await?;

    detail
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("No {} row with id {id}", E::NAME)))
}

async fn edit_view<E: AdminView>(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<Value>, ServerError> {
    let changes = off_runtime(move || E::prepare_changes(body)).await?;
    let columns: Vec<&'static str> = changes.iter().map(|(column, _)| *column).collect();

    let detail = state
        .db
        .transaction(move |conn| {
            if Repository::<E>::update(conn, &Filter::by_id(id), &changes)? == 0 {
                return Ok(None);
            }
            match Repository::<E>::find_by_id(conn, id)? {
                Some(row) => row.detail(conn).map(Some),
                None => Ok(None),
            }
        })
        .await?;

    let Some(detail) = detail else {
        return Err(ServerError::NotFound(format!("No {} row with id {id}", E::NAME)));
    };
    info!(admin_id = admin.id, table = E::NAME, id, ?columns, "Admin edited row");
    Ok(Json(detail))
}

async fn delete_view<E: AdminView>(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ServerError> {
    let deleted = state
        .db
        .transaction(move |conn| Repository::<E>::delete(conn, &Filter::by_id(id), false))
        .await?;

    if deleted == 0 {
        return Err(ServerError::NotFound(format!("No {} row with id {id}", E::NAME)));
    }

    info!(admin_id = admin.id, table = E::NAME, id, "Admin deleted row");
    Ok(Json(MessageResponse::new(format!("Deleted {} {id}", E::NAME))))
}
