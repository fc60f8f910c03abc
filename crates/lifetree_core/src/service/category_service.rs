//! Category tree use-case service.
//!
//! # Responsibility
//! - Run one load -> mutate -> save cycle per edit against a `TreeStore`.
//! - Create the default personal tree on first access.
//! - Validate titles and ids above the engine.
//!
//! # Invariants
//! - A service instance acts for exactly one owner; every store call is
//!   scoped to that owner.
//! - A failed edit never reaches the store, and neither does an edit that
//!   changed nothing.
//! - Saves carry the revision that was loaded; concurrent edits surface as
//!   `StoreError::Conflict` and are not retried here.
//! - An empty parent id addresses the tree root.

use crate::model::category::{Category, CategoryId};
use crate::model::codec::CodecError;
use crate::model::tree::{CategoryTree, ParentRef, TreeError};
use crate::repo::tree_store::{StoreError, TreeStore};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Well-known id of the one personal tree every owner has.
pub const PERSONAL_TREE_ID: &str = "1SBsF9WrcSmBwWvzWVojegYR6z2";
/// Display name given to a freshly created personal tree.
pub const PERSONAL_TREE_NAME: &str = "Life Categories";
const PERSONAL_DEFAULT_CATEGORIES: [&str; 2] = ["Life", "Work"];

/// Errors from category service operations.
#[derive(Debug)]
pub enum ServiceError {
    /// Title is blank after trim.
    InvalidTitle,
    /// A required category or tree id is empty.
    MissingId(&'static str),
    /// No tree is stored under this id.
    TreeNotFound(String),
    /// Engine rejected the structural edit.
    Tree(TreeError),
    /// Stored bytes could not be decoded or tree could not be encoded.
    Codec(CodecError),
    /// Store-level failure, including revision conflicts.
    Store(StoreError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTitle => write!(f, "category title must not be blank"),
            Self::MissingId(what) => write!(f, "{what} id is required"),
            Self::TreeNotFound(id) => write!(f, "category tree not found: {id}"),
            Self::Tree(err) => write!(f, "{err}"),
            Self::Codec(err) => write!(f, "stored category tree is unreadable: {err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Tree(err) => Some(err),
            Self::Codec(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TreeError> for ServiceError {
    fn from(value: TreeError) -> Self {
        Self::Tree(value)
    }
}

impl From<CodecError> for ServiceError {
    fn from(value: CodecError) -> Self {
        Self::Codec(value)
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

struct LoadedTree {
    tree: CategoryTree,
    revision: i64,
}

/// Category tree service facade acting for one owner.
pub struct CategoryService<S: TreeStore> {
    store: S,
    owner: String,
}

impl<S: TreeStore> CategoryService<S> {
    /// Creates service from store implementation, scoped to `owner`.
    ///
    /// A blank owner is reported as `MissingId("owner")` by every operation.
    pub fn new(store: S, owner: impl Into<String>) -> Self {
        Self {
            store,
            owner: owner.into().trim().to_string(),
        }
    }

    pub fn owner(&self) -> &str {
        self.owner.as_str()
    }

    /// Loads one tree; the personal tree is created with defaults on first
    /// access.
    pub fn get_tree(&self, tree_id: &str) -> Result<CategoryTree, ServiceError> {
        self.load(tree_id).map(|loaded| loaded.tree)
    }

    /// Pre-order listing of every category in the tree, each with its
    /// subtree attached.
    pub fn list_categories(&self, tree_id: &str) -> Result<Vec<Category>, ServiceError> {
        let tree = self.get_tree(tree_id)?;
        Ok(tree
            .all_children()
            .iter()
            .map(|view| view.to_category())
            .collect())
    }

    /// Replaces the whole stored tree, creating it when absent.
    pub fn replace_tree(&self, tree: &CategoryTree) -> Result<(), ServiceError> {
        let owner = self.require_owner()?;
        if tree.id().trim().is_empty() {
            return Err(ServiceError::MissingId("tree"));
        }
        tree.validate()?;
        let revision = self
            .store
            .load(owner, tree.id())?
            .map(|stored| stored.revision);
        self.store.save(owner, tree.id(), &tree.to_bytes()?, revision)?;
        info!(
            "event=tree_replace module=service status=ok tree_id={} categories={}",
            tree.id(),
            tree.len()
        );
        Ok(())
    }

    /// Removes the whole stored tree.
    pub fn delete_tree(&self, tree_id: &str) -> Result<(), ServiceError> {
        let owner = self.require_owner()?;
        if tree_id.trim().is_empty() {
            return Err(ServiceError::MissingId("tree"));
        }
        self.store.delete(owner, tree_id)?;
        info!("event=tree_delete module=service status=ok tree_id={tree_id}");
        Ok(())
    }

    /// Adds a new category under `parent_id` (empty means root).
    pub fn add_category(
        &self,
        tree_id: &str,
        parent_id: &str,
        category_id: &str,
        title: &str,
    ) -> Result<CategoryId, ServiceError> {
        let category_id = require_id(category_id, "category")?;
        let title = normalize_title(title)?;
        self.edit(tree_id, "add", |tree| {
            let category = Category::with_id(category_id, title);
            Ok(tree.add_child(&parent_ref(parent_id), category)?)
        })
    }

    /// Replaces the title of an existing category.
    pub fn update_category(
        &self,
        tree_id: &str,
        category_id: &str,
        title: &str,
    ) -> Result<(), ServiceError> {
        let category_id = require_id(category_id, "category")?;
        let title = normalize_title(title)?;
        self.edit(tree_id, "update", |tree| {
            Ok(tree.rename(category_id.as_str(), title)?)
        })
    }

    /// Moves a category under `new_parent_id` (empty means root).
    pub fn move_category(
        &self,
        tree_id: &str,
        category_id: &str,
        new_parent_id: &str,
    ) -> Result<(), ServiceError> {
        let category_id = require_id(category_id, "category")?;
        self.edit(tree_id, "move", |tree| {
            Ok(tree.move_to(category_id.as_str(), &parent_ref(new_parent_id))?)
        })
    }

    /// Removes a category and its subtree.
    ///
    /// Returns `false` when the category did not exist; that case is not an
    /// error and leaves the stored tree untouched.
    pub fn delete_category(&self, tree_id: &str, category_id: &str) -> Result<bool, ServiceError> {
        let category_id = require_id(category_id, "category")?;
        self.edit_if_changed(tree_id, "delete", |tree| {
            let removed = tree.remove_by_id(category_id.as_str()).is_some();
            Ok((removed, removed))
        })
    }

    /// Moves a category up one level; level-1 categories stay where they are.
    pub fn outdent_category(&self, tree_id: &str, category_id: &str) -> Result<(), ServiceError> {
        let category_id = require_id(category_id, "category")?;
        self.edit(tree_id, "outdent", |tree| {
            Ok(tree.outdent(category_id.as_str())?)
        })
    }

    /// Moves a category under an existing sibling or other category.
    pub fn indent_category(
        &self,
        tree_id: &str,
        category_id: &str,
        new_parent_id: &str,
    ) -> Result<(), ServiceError> {
        let category_id = require_id(category_id, "category")?;
        let new_parent_id = require_id(new_parent_id, "parent")?;
        self.edit(tree_id, "indent", |tree| {
            Ok(tree.indent(category_id.as_str(), new_parent_id.as_str())?)
        })
    }

    fn edit<T>(
        &self,
        tree_id: &str,
        op: &'static str,
        apply: impl FnOnce(&mut CategoryTree) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        self.edit_if_changed(tree_id, op, |tree| apply(tree).map(|output| (output, true)))
    }

    /// Load, apply, save. `apply` returns its output plus whether the tree
    /// changed; unchanged trees are not written back.
    fn edit_if_changed<T>(
        &self,
        tree_id: &str,
        op: &'static str,
        apply: impl FnOnce(&mut CategoryTree) -> Result<(T, bool), ServiceError>,
    ) -> Result<T, ServiceError> {
        let started_at = Instant::now();
        let result = self.load(tree_id).and_then(|mut loaded| {
            let (output, changed) = apply(&mut loaded.tree)?;
            if changed {
                let data = loaded.tree.to_bytes()?;
                self.store
                    .save(&self.owner, tree_id, &data, Some(loaded.revision))?;
            }
            Ok((output, changed))
        });

        match &result {
            Ok((_, true)) => info!(
                "event=category_edit module=service status=ok op={op} tree_id={tree_id} duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Ok((_, false)) => info!(
                "event=category_edit module=service status=noop op={op} tree_id={tree_id}"
            ),
            Err(err) => error!(
                "event=category_edit module=service status=error op={op} tree_id={tree_id} duration_ms={} error={err}",
                started_at.elapsed().as_millis()
            ),
        }
        result.map(|(output, _)| output)
    }

    fn load(&self, tree_id: &str) -> Result<LoadedTree, ServiceError> {
        let owner = self.require_owner()?;
        if tree_id.trim().is_empty() {
            return Err(ServiceError::MissingId("tree"));
        }
        if let Some(loaded) = self.load_stored(tree_id)? {
            return Ok(loaded);
        }
        if tree_id != PERSONAL_TREE_ID {
            return Err(ServiceError::TreeNotFound(tree_id.to_string()));
        }

        let tree = default_personal_tree()?;
        match self.store.save(owner, tree_id, &tree.to_bytes()?, None) {
            Ok(revision) => {
                info!("event=tree_init module=service status=ok tree_id={tree_id}");
                Ok(LoadedTree { tree, revision })
            }
            // Another caller created it first; use theirs.
            Err(StoreError::Conflict { .. }) => {
                info!("event=tree_init module=service status=raced tree_id={tree_id}");
                self.load_stored(tree_id)?
                    .ok_or_else(|| ServiceError::TreeNotFound(tree_id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn load_stored(&self, tree_id: &str) -> Result<Option<LoadedTree>, ServiceError> {
        let Some(stored) = self.store.load(&self.owner, tree_id)? else {
            return Ok(None);
        };
        Ok(Some(LoadedTree {
            tree: CategoryTree::from_bytes(&stored.data)?,
            revision: stored.revision,
        }))
    }

    fn require_owner(&self) -> Result<&str, ServiceError> {
        if self.owner.is_empty() {
            return Err(ServiceError::MissingId("owner"));
        }
        Ok(self.owner.as_str())
    }
}

/// Builds the tree handed to a user on first access.
pub fn default_personal_tree() -> Result<CategoryTree, TreeError> {
    let mut tree = CategoryTree::with_id(PERSONAL_TREE_ID, PERSONAL_TREE_NAME);
    for title in PERSONAL_DEFAULT_CATEGORIES {
        tree.add_child(&ParentRef::Root, Category::new(title))?;
    }
    Ok(tree)
}

fn parent_ref(parent_id: &str) -> ParentRef {
    let trimmed = parent_id.trim();
    if trimmed.is_empty() {
        ParentRef::Root
    } else {
        ParentRef::Category(trimmed.to_string())
    }
}

fn require_id(value: &str, what: &'static str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::MissingId(what));
    }
    Ok(trimmed.to_string())
}

fn normalize_title(value: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidTitle);
    }
    Ok(trimmed.to_string())
}
