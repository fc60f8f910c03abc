//! Detached category node.
//!
//! # Responsibility
//! - Represent one category together with the subtree it carries.
//! - Build "disconnected" subtrees before they are spliced into a tree.
//! - Act as the nested wire shape for serialization and listings.
//!
//! # Invariants
//! - `id` is assigned once and never regenerated by structural operations.
//! - After `add_child`, every descendant level equals parent level + 1.
//! - `children` order is insertion order and is significant for equality.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque category identifier, unique within one tree.
///
/// Kept as a type alias so caller-supplied ids (UUIDs, KSUIDs, ...) pass
/// through without conversion.
pub type CategoryId = String;

/// Level assigned to a node that is not attached to any parent yet.
pub const DETACHED_LEVEL: u32 = 1;

/// Generates a fresh category or tree id.
pub fn new_category_id() -> CategoryId {
    Uuid::new_v4().to_string()
}

/// One category with its owned, ordered subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    /// Depth below the tree root; direct root children are level 1.
    pub level: u32,
    pub title: String,
    /// Serialized as `categories` to match the stored document schema.
    #[serde(rename = "categories", default)]
    pub children: Vec<Category>,
}

impl Category {
    /// Creates a detached category with a generated id.
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_id(new_category_id(), title)
    }

    /// Creates a detached category with a caller-provided id.
    pub fn with_id(id: impl Into<CategoryId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            level: DETACHED_LEVEL,
            title: title.into(),
            children: Vec::new(),
        }
    }

    /// Appends `child` and returns the attached copy.
    ///
    /// The child's carried subtree is detached and re-attached node by node so
    /// every descendant is re-leveled relative to `self`.
    pub fn add_child(&mut self, mut child: Category) -> &mut Category {
        let carried = std::mem::take(&mut child.children);
        child.level = self.level + 1;
        for grandchild in carried {
            child.add_child(grandchild);
        }
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Returns the first immediate child titled `name`.
    pub fn child_by_name(&self, name: &str) -> Option<&Category> {
        self.children.iter().find(|child| child.title == name)
    }

    /// Pre-order search by title. Returns the match and its immediate parent;
    /// for a direct child the parent is `self`.
    pub fn find_by_name(&self, name: &str) -> Option<(&Category, &Category)> {
        self.find_first(&|candidate: &Category| candidate.title == name)
    }

    /// Pre-order search by id. Same parent contract as [`Category::find_by_name`].
    pub fn find_by_id(&self, id: &str) -> Option<(&Category, &Category)> {
        self.find_first(&|candidate: &Category| candidate.id == id)
    }

    /// Removes the first immediate child titled `name`.
    pub fn remove_child_by_name(&mut self, name: &str) -> Option<Category> {
        let index = self.children.iter().position(|child| child.title == name)?;
        Some(self.children.remove(index))
    }

    /// Removes the first node with `id` anywhere below `self`.
    pub fn remove_child_by_id(&mut self, id: &str) -> Option<Category> {
        if let Some(index) = self.children.iter().position(|child| child.id == id) {
            return Some(self.children.remove(index));
        }
        self.children
            .iter_mut()
            .find_map(|child| child.remove_child_by_id(id))
    }

    /// Pre-order flattening of every descendant (excluding `self`).
    pub fn all_children(&self) -> Vec<&Category> {
        let mut out = Vec::new();
        for child in &self.children {
            out.push(child);
            out.extend(child.all_children());
        }
        out
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(Category::subtree_len)
            .sum::<usize>()
    }

    /// Number of levels in this subtree, `self` included.
    pub fn height(&self) -> u32 {
        let mut deepest = 1;
        let mut stack = vec![(self, 1u32)];
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            stack.extend(node.children.iter().map(|child| (child, depth + 1)));
        }
        deepest
    }

    fn find_first(&self, matches: &dyn Fn(&Category) -> bool) -> Option<(&Category, &Category)> {
        for child in &self.children {
            if matches(child) {
                return Some((child, self));
            }
            if let Some(found) = child.find_first(matches) {
                return Some(found);
            }
        }
        None
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{},{}, children:{}",
            self.id,
            self.level,
            self.title,
            self.children.len()
        )
    }
}
