//! Closure-table menu hierarchy.
//!
//! Nodes live in one table and every ancestor/descendant pair, with its distance, lives in
//! a second one. Inserting a node copies the parent's ancestry one level deeper, so the
//! edge set is always the full transitive closure of the parent relation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::{AppError, AppResult, ConflictKind},
    models::{ClosureEdge, CreateMenuRequest, MenuNode, MenuTree},
};

/// Confirmation returned by a committed insert.
pub const MENU_CREATED: &str = "菜单项新增成功";

/// MenuTransaction
///
/// One atomic unit of work against the menu tables. Writes become visible only after
/// `commit`; dropping the transaction without committing discards them.
#[async_trait]
pub trait MenuTransaction: Send {
    async fn find_node_by_id(&mut self, id: &str) -> AppResult<Option<MenuNode>>;
    async fn find_node_by_path(&mut self, path: &str) -> AppResult<Option<MenuNode>>;
    async fn find_node_by_label(&mut self, label: &str) -> AppResult<Option<MenuNode>>;
    async fn insert_node(&mut self, node: &MenuNode) -> AppResult<()>;
    /// All edges whose descendant is `descendant`, in insertion order.
    async fn edges_to(&mut self, descendant: &str) -> AppResult<Vec<ClosureEdge>>;
    async fn edge_exists(&mut self, edge: &ClosureEdge) -> AppResult<bool>;
    async fn insert_edge(&mut self, edge: &ClosureEdge) -> AppResult<()>;
    async fn commit(self: Box<Self>) -> AppResult<()>;
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// MenuStore
///
/// Datastore seam for the hierarchy. Implemented by the Postgres store and the in-memory store.
#[async_trait]
pub trait MenuStore: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn MenuTransaction>>;
    async fn nodes(&self) -> AppResult<Vec<MenuNode>>;
    /// Every closure edge, in insertion order.
    async fn edges(&self) -> AppResult<Vec<ClosureEdge>>;
}

pub type MenuStoreState = Arc<dyn MenuStore>;

/// HierarchyStore
///
/// Owns both menu tables through its `MenuStore`. Nothing else writes to them.
#[derive(Clone)]
pub struct HierarchyStore {
    store: MenuStoreState,
}

impl HierarchyStore {
    pub fn new(store: MenuStoreState) -> Self {
        Self { store }
    }

    /// insert
    ///
    /// Adds a node under `parent_id` (or as a root) and extends the closure table.
    /// Uniqueness checks and writes share one transaction; any failure rolls back everything.
    pub async fn insert(&self, req: CreateMenuRequest) -> AppResult<&'static str> {
        if req.id.trim().is_empty() {
            return Err(AppError::Validation("menu id must not be empty".to_string()));
        }
        if req.label.trim().is_empty() {
            return Err(AppError::Validation("menu label must not be empty".to_string()));
        }

        let mut tx = self.store.begin().await?;
        match insert_in(tx.as_mut(), &req).await {
            Ok(()) => {
                tx.commit().await?;
                tracing::debug!(menu_id = %req.id, parent_id = ?req.parent_id, "menu node committed");
                Ok(MENU_CREATED)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "menu insert rollback failed");
                }
                Err(err)
            }
        }
    }

    /// list_all
    ///
    /// Loads both tables and rebuilds the forest of roots with nested children.
    pub async fn list_all(&self) -> AppResult<Vec<MenuTree>> {
        let nodes = self.store.nodes().await?;
        let edges = self.store.edges().await?;
        Ok(build_tree(nodes, &edges))
    }
}

async fn insert_in(tx: &mut dyn MenuTransaction, req: &CreateMenuRequest) -> AppResult<()> {
    // Order matters: id, then path, then label.
    if tx.find_node_by_id(&req.id).await?.is_some() {
        return Err(AppError::Conflict(ConflictKind::Id));
    }
    if let Some(path) = req.path.as_deref() {
        if tx.find_node_by_path(path).await?.is_some() {
            return Err(AppError::Conflict(ConflictKind::Path));
        }
    }
    if tx.find_node_by_label(&req.label).await?.is_some() {
        return Err(AppError::Conflict(ConflictKind::Label));
    }

    let node = MenuNode {
        id: req.id.clone(),
        label: req.label.clone(),
        path: req.path.clone(),
    };
    tx.insert_node(&node).await?;

    // Forms send an empty parentId for a top-level entry.
    let parent_id = req.parent_id.as_deref().filter(|id| !id.trim().is_empty());
    if let Some(parent_id) = parent_id {
        if tx.find_node_by_id(parent_id).await?.is_none() {
            return Err(AppError::Conflict(ConflictKind::ParentNotFound));
        }
        for parent_edge in tx.edges_to(parent_id).await? {
            let edge = ClosureEdge::new(parent_edge.ancestor, node.id.clone(), parent_edge.depth + 1);
            insert_edge_once(tx, &edge).await?;
        }
    }

    insert_edge_once(tx, &ClosureEdge::reflexive(node.id.clone())).await
}

async fn insert_edge_once(tx: &mut dyn MenuTransaction, edge: &ClosureEdge) -> AppResult<()> {
    if tx.edge_exists(edge).await? {
        return Ok(());
    }
    tx.insert_edge(edge).await
}

/// build_tree
///
/// Assembles roots and their nested children from flat node and edge sets.
///
/// Only depth-1 edges attach children, in edge order. A node is a root when it holds its
/// reflexive edge and no depth-1 edge points at it. Edges naming unknown nodes are ignored.
pub fn build_tree(nodes: Vec<MenuNode>, edges: &[ClosureEdge]) -> Vec<MenuTree> {
    let mut by_id: HashMap<String, MenuNode> =
        nodes.into_iter().map(|node| (node.id.clone(), node)).collect();

    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut has_parent: HashSet<&str> = HashSet::new();
    for edge in edges.iter().filter(|e| e.depth == 1) {
        if by_id.contains_key(&edge.ancestor) && by_id.contains_key(&edge.descendant) {
            children
                .entry(edge.ancestor.as_str())
                .or_default()
                .push(edge.descendant.as_str());
            has_parent.insert(edge.descendant.as_str());
        }
    }

    let mut seen_roots: HashSet<&str> = HashSet::new();
    let roots: Vec<&str> = edges
        .iter()
        .filter(|e| e.is_reflexive())
        .map(|e| e.ancestor.as_str())
        .filter(|id| by_id.contains_key(*id) && !has_parent.contains(id))
        .filter(|id| seen_roots.insert(*id))
        .collect();

    roots
        .into_iter()
        .filter_map(|id| assemble(id, &children, &mut by_id))
        .collect()
}

fn assemble(
    id: &str,
    children: &HashMap<&str, Vec<&str>>,
    by_id: &mut HashMap<String, MenuNode>,
) -> Option<MenuTree> {
    // Removing the node places it at most once, which also cuts any cycle short.
    let node = by_id.remove(id)?;
    let mut tree = MenuTree::from(node);
    if let Some(child_ids) = children.get(id) {
        for child_id in child_ids {
            if let Some(child) = assemble(child_id, children, by_id) {
                tree.children.push(child);
            }
        }
    }
    Some(tree)
}
