use menu_portal::{
    AppError, ConflictKind, HierarchyStore, PostgresMenuStore, PostgresUserRepository,
    hierarchy::{MENU_CREATED, MenuStore, MenuTransaction},
    models::{ClosureEdge, CreateMenuRequest, MenuNode, NewUser},
    repository::UserRepository,
};
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::test;
use uuid::Uuid;

// --- Test Context and Setup ---

/// Holds the pool for one test. Tests share the database, so every row a test writes is
/// namespaced by `tag`.
struct DbTestContext {
    pool: PgPool,
    tag: String,
}

impl DbTestContext {
    /// `None` when no database is configured, so the suite still runs on machines without Postgres.
    async fn setup() -> Option<Self> {
        dotenv::dotenv().ok();

        let Ok(db_url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping Postgres integration test");
            return None;
        };

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        let tag = Uuid::new_v4().simple().to_string()[..8].to_string();
        Some(DbTestContext { pool, tag })
    }

    fn menu_store(&self) -> PostgresMenuStore {
        PostgresMenuStore::new(self.pool.clone())
    }

    fn hierarchy(&self) -> HierarchyStore {
        HierarchyStore::new(Arc::new(self.menu_store()))
    }

    fn users(&self) -> PostgresUserRepository {
        PostgresUserRepository::new(self.pool.clone())
    }

    /// Test-unique version of a name.
    fn name(&self, base: &str) -> String {
        format!("{}-{base}", self.tag)
    }

    fn menu(&self, id: &str, label: &str, path: Option<&str>, parent: Option<&str>) -> CreateMenuRequest {
        CreateMenuRequest {
            id: self.name(id),
            label: self.name(label),
            path: path.map(|p| format!("/{}{p}", self.tag)),
            parent_id: parent.map(|p| self.name(p)),
        }
    }

    /// Closure edges touching this test's nodes.
    async fn own_edges(&self) -> HashSet<ClosureEdge> {
        self.menu_store()
            .edges()
            .await
            .expect("Failed to list closure edges")
            .into_iter()
            .filter(|edge| edge.descendant.starts_with(&self.tag))
            .collect()
    }

    async fn menu_rows(&self, id: &str) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM menu WHERE id = $1")
            .bind(self.name(id))
            .fetch_one(&self.pool)
            .await
            .expect("Failed to count menu rows")
    }
}

// --- Menu Hierarchy ---

#[test]
async fn test_root_and_child_write_closure_edges() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let hierarchy = ctx.hierarchy();

    assert_eq!(hierarchy.insert(ctx.menu("A1", "Home", None, None)).await, Ok(MENU_CREATED));
    assert_eq!(
        hierarchy.insert(ctx.menu("A2", "Sub", None, Some("A1"))).await,
        Ok(MENU_CREATED)
    );

    let (a1, a2) = (ctx.name("A1"), ctx.name("A2"));
    let expected: HashSet<ClosureEdge> = [
        ClosureEdge::new(&a1, &a1, 0),
        ClosureEdge::new(&a2, &a2, 0),
        ClosureEdge::new(&a1, &a2, 1),
    ]
    .into_iter()
    .collect();
    assert_eq!(ctx.own_edges().await, expected);

    let forest = hierarchy.list_all().await.expect("list_all failed");
    let root = forest.iter().find(|tree| tree.id == a1).expect("A1 must be a root");
    assert_eq!(root.children.len(), 1);
    assert_eq!(root.children[0].id, a2);
    assert!(root.children[0].children.is_empty());
    assert!(forest.iter().all(|tree| tree.id != a2), "A2 must not be listed as a root");
}

#[test]
async fn test_conflict_precedence_is_id_path_label() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let hierarchy = ctx.hierarchy();
    hierarchy
        .insert(ctx.menu("A1", "Home", Some("/home"), None))
        .await
        .expect("seed insert failed");

    let all_three = hierarchy.insert(ctx.menu("A1", "Home", Some("/home"), None)).await;
    assert_eq!(all_three, Err(AppError::Conflict(ConflictKind::Id)));

    let path_and_label = hierarchy.insert(ctx.menu("B1", "Home", Some("/home"), None)).await;
    assert_eq!(path_and_label, Err(AppError::Conflict(ConflictKind::Path)));

    let label_only = hierarchy.insert(ctx.menu("B1", "Home", Some("/other"), None)).await;
    assert_eq!(label_only, Err(AppError::Conflict(ConflictKind::Label)));

    assert_eq!(ctx.menu_rows("B1").await, 0);
}

#[test]
async fn test_unique_constraints_map_to_conflict_kinds() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let store = ctx.menu_store();
    ctx.hierarchy()
        .insert(ctx.menu("A1", "Home", Some("/home"), None))
        .await
        .expect("seed insert failed");

    // Write straight through the transaction, past the lookups, so only the constraints fire.
    let cases = [
        (ctx.name("A1"), ctx.name("Fresh1"), None, ConflictKind::Id),
        (ctx.name("B1"), ctx.name("Fresh2"), Some(format!("/{}/home", ctx.tag)), ConflictKind::Path),
        (ctx.name("B2"), ctx.name("Home"), None, ConflictKind::Label),
    ];
    for (id, label, path, kind) in cases {
        let mut tx = store.begin().await.expect("begin failed");
        let err = tx
            .insert_node(&MenuNode { id, label, path })
            .await
            .expect_err("constraint should reject the row");
        assert_eq!(err, AppError::Conflict(kind));
        tx.rollback().await.expect("rollback failed");
    }
}

#[test]
async fn test_missing_parent_leaves_no_menu_row() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let hierarchy = ctx.hierarchy();

    let result = hierarchy.insert(ctx.menu("A2", "Sub", None, Some("ghost"))).await;
    assert_eq!(result, Err(AppError::Conflict(ConflictKind::ParentNotFound)));

    assert_eq!(ctx.menu_rows("A2").await, 0, "the orphan node must be rolled back");
    assert!(ctx.own_edges().await.is_empty());
}

#[test]
async fn test_children_are_listed_in_insertion_order() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let hierarchy = ctx.hierarchy();
    hierarchy.insert(ctx.menu("root", "Root", None, None)).await.unwrap();
    // Inserted out of alphabetical order on purpose.
    hierarchy.insert(ctx.menu("zeta", "Zeta", None, Some("root"))).await.unwrap();
    hierarchy.insert(ctx.menu("alpha", "Alpha", None, Some("root"))).await.unwrap();

    let forest = hierarchy.list_all().await.expect("list_all failed");
    let root = forest
        .iter()
        .find(|tree| tree.id == ctx.name("root"))
        .expect("root must be listed");
    let child_ids: Vec<&str> = root.children.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(child_ids, vec![ctx.name("zeta"), ctx.name("alpha")]);
}

#[test]
async fn test_empty_parent_id_inserts_root() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let mut req = ctx.menu("A1", "Home", None, None);
    req.parent_id = Some(String::new());

    assert_eq!(ctx.hierarchy().insert(req).await, Ok(MENU_CREATED));

    let a1 = ctx.name("A1");
    assert_eq!(ctx.own_edges().await, HashSet::from([ClosureEdge::reflexive(&a1)]));
}

// --- Credentials ---

fn new_user(username: &str, email: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        password_digest: "$argon2id$v=19$test-digest".to_string(),
        email: email.to_string(),
        mobile_number: None,
    }
}

#[test]
async fn test_user_create_and_find() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let users = ctx.users();
    let username = ctx.name("alice");

    let created = users
        .create(new_user(&username, &format!("{username}@example.com")))
        .await
        .expect("create failed");
    assert_eq!(created.username, username);

    let found = users
        .find_by_username(&username)
        .await
        .expect("lookup failed")
        .expect("user must exist");
    assert_eq!(found.id, created.id);
    assert_eq!(found.password, "$argon2id$v=19$test-digest");

    assert!(users.find_by_username(&ctx.name("nobody")).await.unwrap().is_none());
}

#[test]
async fn test_user_unique_constraints_map_to_faults() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let users = ctx.users();
    let username = ctx.name("alice");
    let email = format!("{username}@example.com");
    users.create(new_user(&username, &email)).await.expect("create failed");

    let dup_username = users
        .create(new_user(&username, &format!("other-{email}")))
        .await;
    assert_eq!(dup_username.unwrap_err(), AppError::Conflict(ConflictKind::Username));

    let dup_email = users.create(new_user(&ctx.name("bob"), &email)).await;
    assert!(matches!(dup_email, Err(AppError::Persistence(_))));
}
