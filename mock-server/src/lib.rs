//! In-memory HTTP peer for the client's integration tests.
//!
//! Serves a todo collection plus fixtures for each way a response can fail:
//! a JSON `{"message": ...}` 404, a plain-text 400 for an unparsable id, a
//! 200 whose body is not JSON, and a multipart upload endpoint that reports
//! what it received.

use std::{collections::BTreeMap, collections::HashMap, sync::Arc};

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: Uuid,
    pub title: String,
    pub completed: bool,
}

/// Body of `POST /todos`.
#[derive(Debug, Deserialize)]
pub struct NewTodo {
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

/// Body of `PUT` and `PATCH /todos/{id}`; absent fields are left alone.
#[derive(Debug, Default, Deserialize)]
pub struct TodoPatch {
    pub title: Option<String>,
    pub completed: Option<bool>,
}

impl TodoPatch {
    pub fn apply(self, todo: &mut Todo) {
        if let Some(title) = self.title {
            todo.title = title;
        }
        if let Some(completed) = self.completed {
            todo.completed = completed;
        }
    }
}

/// `?completed=` on `GET /todos`.
#[derive(Debug, Default, Deserialize)]
pub struct ListFilter {
    pub completed: Option<bool>,
}

impl ListFilter {
    pub fn matches(&self, todo: &Todo) -> bool {
        self.completed.map_or(true, |completed| todo.completed == completed)
    }
}

/// What `POST /uploads` saw.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadReceipt {
    pub field: String,
    pub file_name: Option<String>,
    pub size: usize,
    pub fields: BTreeMap<String, String>,
}

/// Shared todo storage. Clones share the same map.
#[derive(Clone, Default)]
pub struct Store(Arc<RwLock<HashMap<Uuid, Todo>>>);

impl Store {
    pub async fn list(&self, filter: &ListFilter) -> Vec<Todo> {
        let todos = self.0.read().await;
        todos.values().filter(|todo| filter.matches(todo)).cloned().collect()
    }

    pub async fn insert(&self, new: NewTodo) -> Todo {
        let todo = Todo {
            id: Uuid::new_v4(),
            title: new.title,
            completed: new.completed,
        };
        self.0.write().await.insert(todo.id, todo.clone());
        todo
    }

    pub async fn get(&self, id: Uuid) -> Option<Todo> {
        self.0.read().await.get(&id).cloned()
    }

    pub async fn patch(&self, id: Uuid, patch: TodoPatch) -> Option<Todo> {
        let mut todos = self.0.write().await;
        let todo = todos.get_mut(&id)?;
        patch.apply(todo);
        Some(todo.clone())
    }

    pub async fn remove(&self, id: Uuid) -> Option<Todo> {
        self.0.write().await.remove(&id)
    }
}

/// Error response with a JSON `{"message": ...}` body.
#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    message: &'static str,
}

impl ApiFailure {
    pub fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: "not found",
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "message": self.message });
        (self.status, Json(body)).into_response()
    }
}

pub fn app() -> Router {
    app_with(Store::default())
}

/// Router over an existing store, so tests can seed or inspect it.
pub fn app_with(store: Store) -> Router {
    Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route(
            "/todos/{id}",
            get(get_todo)
                .put(patch_todo)
                .patch(patch_todo)
                .delete(delete_todo),
        )
        .route("/broken", get(broken))
        .route("/uploads", post(upload))
        .with_state(store)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn list_todos(State(store): State<Store>, Query(filter): Query<ListFilter>) -> Json<Vec<Todo>> {
    Json(store.list(&filter).await)
}

async fn create_todo(State(store): State<Store>, Json(new): Json<NewTodo>) -> (StatusCode, Json<Todo>) {
    (StatusCode::CREATED, Json(store.insert(new).await))
}

async fn get_todo(State(store): State<Store>, Path(id): Path<Uuid>) -> Result<Json<Todo>, ApiFailure> {
    store.get(id).await.map(Json).ok_or_else(ApiFailure::not_found)
}

async fn patch_todo(
    State(store): State<Store>,
    Path(id): Path<Uuid>,
    Json(patch): Json<TodoPatch>,
) -> Result<Json<Todo>, ApiFailure> {
    store.patch(id, patch).await.map(Json).ok_or_else(ApiFailure::not_found)
}

async fn delete_todo(State(store): State<Store>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiFailure> {
    store
        .remove(id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(ApiFailure::not_found)
}

/// A success status with a body that is not JSON.
async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::OK, "<html>definitely not json</html>")
}

async fn upload(mut multipart: Multipart) -> Result<(StatusCode, Json<UploadReceipt>), MultipartError> {
    let mut receipt = UploadReceipt::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                receipt.size = field.bytes().await?.len();
                receipt.field = name;
                receipt.file_name = Some(file_name);
            }
            None => {
                receipt.fields.insert(name, field.text().await?);
            }
        }
    }
    Ok((StatusCode::CREATED, Json(receipt)))
}
