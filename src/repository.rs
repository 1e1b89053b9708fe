use crate::{
    error::{AppError, AppResult, ConflictKind},
    hierarchy::{MenuStore, MenuTransaction},
    models::{ClosureEdge, MenuNode, NewUser, User},
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// UserRepository Trait
///
/// Persistence contract for credential records, used by the auth orchestrator.
/// `Send + Sync + async_trait` make `Arc<dyn UserRepository>` shareable across handlers.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;
    /// Persists a new record. Write failures surface as `AppError::Persistence`.
    async fn create(&self, user: NewUser) -> AppResult<User>;
}

/// UserRepositoryState
///
/// The concrete type used to share credential persistence across the application state.
pub type UserRepositoryState = Arc<dyn UserRepository>;

// --- Postgres ---

/// PostgresMenuStore
///
/// `MenuStore` backed by the `menu` and `menu_closure` tables.
pub struct PostgresMenuStore {
    pool: PgPool,
}

impl PostgresMenuStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MenuStore for PostgresMenuStore {
    /// begin
    ///
    /// Opens a REPEATABLE READ transaction so the duplicate checks and the closure copy
    /// see one consistent snapshot of both tables.
    async fn begin(&self) -> AppResult<Box<dyn MenuTransaction>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;
        Ok(Box::new(PostgresMenuTransaction { tx }))
    }

    async fn nodes(&self) -> AppResult<Vec<MenuNode>> {
        let nodes = sqlx::query_as::<_, MenuNode>("SELECT id, label, path FROM menu ORDER BY seq")
            .fetch_all(&self.pool)
            .await?;
        Ok(nodes)
    }

    async fn edges(&self) -> AppResult<Vec<ClosureEdge>> {
        let edges = sqlx::query_as::<_, ClosureEdge>(
            "SELECT ancestor, descendant, depth FROM menu_closure ORDER BY seq",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(edges)
    }
}

struct PostgresMenuTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PostgresMenuTransaction {
    async fn find_node_where(&mut self, column: &str, value: &str) -> AppResult<Option<MenuNode>> {
        // `column` is always one of the fixed names below, never caller input.
        let sql = format!("SELECT id, label, path FROM menu WHERE {column} = $1 LIMIT 1");
        let node = sqlx::query_as::<_, MenuNode>(&sql)
            .bind(value)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(node)
    }
}

#[async_trait]
impl MenuTransaction for PostgresMenuTransaction {
    async fn find_node_by_id(&mut self, id: &str) -> AppResult<Option<MenuNode>> {
        self.find_node_where("id", id).await
    }

    async fn find_node_by_path(&mut self, path: &str) -> AppResult<Option<MenuNode>> {
        self.find_node_where("path", path).await
    }

    async fn find_node_by_label(&mut self, label: &str) -> AppResult<Option<MenuNode>> {
        self.find_node_where("label", label).await
    }

    async fn insert_node(&mut self, node: &MenuNode) -> AppResult<()> {
        sqlx::query("INSERT INTO menu (id, label, path) VALUES ($1, $2, $3)")
            .bind(&node.id)
            .bind(&node.label)
            .bind(&node.path)
            .execute(&mut *self.tx)
            .await
            .map_err(menu_write_error)?;
        Ok(())
    }

    async fn edges_to(&mut self, descendant: &str) -> AppResult<Vec<ClosureEdge>> {
        let edges = sqlx::query_as::<_, ClosureEdge>(
            "SELECT ancestor, descendant, depth FROM menu_closure WHERE descendant = $1 ORDER BY seq",
        )
        .bind(descendant)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(edges)
    }

    async fn edge_exists(&mut self, edge: &ClosureEdge) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM menu_closure WHERE ancestor = $1 AND descendant = $2 AND depth = $3)",
        )
        .bind(&edge.ancestor)
        .bind(&edge.descendant)
        .bind(edge.depth)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn insert_edge(&mut self, edge: &ClosureEdge) -> AppResult<()> {
        sqlx::query("INSERT INTO menu_closure (ancestor, descendant, depth) VALUES ($1, $2, $3)")
            .bind(&edge.ancestor)
            .bind(&edge.descendant)
            .bind(edge.depth)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let this = *self;
        this.tx.commit().await.map_err(menu_write_error)
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        let this = *self;
        this.tx.rollback().await?;
        Ok(())
    }
}

/// Unique violations raced past the in-transaction checks still name the colliding column.
fn menu_write_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.constraint() {
            Some("menu_pkey") => return AppError::Conflict(ConflictKind::Id),
            Some("menu_path_key") => return AppError::Conflict(ConflictKind::Path),
            Some("menu_label_key") => return AppError::Conflict(ConflictKind::Label),
            _ => {}
        }
    }
    AppError::from(err)
}

/// PostgresUserRepository
///
/// `UserRepository` backed by the `user_info` table.
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password, email, mobile_number, created_at FROM user_info WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO user_info (id, username, password, email, mobile_number)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, password, email, mobile_number, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.password_digest)
        .bind(&user.email)
        .bind(&user.mobile_number)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db_err) if db_err.constraint() == Some("user_info_username_key") => {
                AppError::Conflict(ConflictKind::Username)
            }
            _ => AppError::Persistence(err.to_string()),
        })
    }
}

// --- In-memory ---

#[derive(Debug, Clone, Default)]
struct MenuTables {
    nodes: Vec<MenuNode>,
    edges: Vec<ClosureEdge>,
}

/// MemoryMenuStore
///
/// In-process `MenuStore` for tests and local experiments. Transactions are serialized by a
/// single lock and stage their writes on a copy that replaces the tables on commit.
#[derive(Clone, Default)]
pub struct MemoryMenuStore {
    tables: Arc<Mutex<MenuTables>>,
}

impl MemoryMenuStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MenuStore for MemoryMenuStore {
    async fn begin(&self) -> AppResult<Box<dyn MenuTransaction>> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryMenuTransaction { guard, staged }))
    }

    async fn nodes(&self) -> AppResult<Vec<MenuNode>> {
        Ok(self.tables.lock().await.nodes.clone())
    }

    async fn edges(&self) -> AppResult<Vec<ClosureEdge>> {
        Ok(self.tables.lock().await.edges.clone())
    }
}

struct MemoryMenuTransaction {
    guard: OwnedMutexGuard<MenuTables>,
    staged: MenuTables,
}

impl MemoryMenuTransaction {
    fn find_node(&self, matches: impl Fn(&MenuNode) -> bool) -> Option<MenuNode> {
        self.staged.nodes.iter().find(|node| matches(node)).cloned()
    }
}

#[async_trait]
impl MenuTransaction for MemoryMenuTransaction {
    async fn find_node_by_id(&mut self, id: &str) -> AppResult<Option<MenuNode>> {
        Ok(self.find_node(|node| node.id == id))
    }

    async fn find_node_by_path(&mut self, path: &str) -> AppResult<Option<MenuNode>> {
        Ok(self.find_node(|node| node.path.as_deref() == Some(path)))
    }

    async fn find_node_by_label(&mut self, label: &str) -> AppResult<Option<MenuNode>> {
        Ok(self.find_node(|node| node.label == label))
    }

    async fn insert_node(&mut self, node: &MenuNode) -> AppResult<()> {
        self.staged.nodes.push(node.clone());
        Ok(())
    }

    async fn edges_to(&mut self, descendant: &str) -> AppResult<Vec<ClosureEdge>> {
        Ok(self
            .staged
            .edges
            .iter()
            .filter(|edge| edge.descendant == descendant)
            .cloned()
            .collect())
    }

    async fn edge_exists(&mut self, edge: &ClosureEdge) -> AppResult<bool> {
        Ok(self.staged.edges.contains(edge))
    }

    async fn insert_edge(&mut self, edge: &ClosureEdge) -> AppResult<()> {
        self.staged.edges.push(edge.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryMenuTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

/// MemoryUserRepository
///
/// In-process `UserRepository`. `new_failing` simulates a datastore that rejects every write.
#[derive(Default)]
pub struct MemoryUserRepository {
    users: Mutex<Vec<User>>,
    /// When true, `create` reports a persistence failure.
    pub should_fail: bool,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let users = self.users.lock().await;
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn create(&self, user: NewUser) -> AppResult<User> {
        if self.should_fail {
            return Err(AppError::Persistence("simulated write failure".to_string()));
        }
        let mut users = self.users.lock().await;
        if users.iter().any(|u| u.username == user.username) {
            return Err(AppError::Conflict(ConflictKind::Username));
        }
        if users.iter().any(|u| u.email == user.email) {
            return Err(AppError::Persistence(format!("duplicate email {}", user.email)));
        }
        let created = User {
            id: Uuid::new_v4(),
            username: user.username,
            password: user.password_digest,
            email: user.email,
            mobile_number: user.mobile_number,
            created_at: Utc::now(),
        };
        users.push(created.clone());
        Ok(created)
    }
}
