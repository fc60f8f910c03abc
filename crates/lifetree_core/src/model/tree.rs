//! Category tree engine.
//!
//! # Responsibility
//! - Own every node of one user tree in an id-indexed arena.
//! - Provide structural edits: add, rename, remove, move, outdent, indent.
//! - Provide lookups and the pre-order flattening used by list views.
//!
//! # Invariants
//! - Every node level equals parent level + 1 (root children are level 1).
//! - No node sits deeper than `MAX_LEVEL`; edits that would exceed it fail.
//! - Node ids are unique within one tree; the arena is keyed by id.
//! - Child order is insertion order; moves append to the new parent.
//! - Failed operations leave the tree unmodified.
//!
//! # See also
//! - `model::codec` for the byte representation.

use crate::model::category::{new_category_id, Category, CategoryId};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Virtual level of the tree root.
pub const ROOT_LEVEL: u32 = 0;

/// Deepest level a category may occupy.
///
/// Stored documents nest two JSON containers per level; this keeps every
/// valid tree well inside the decoder's nesting limit.
pub const MAX_LEVEL: u32 = 50;

/// Result type used by tree engine operations.
pub type TreeResult<T> = Result<T, TreeError>;

/// Errors from structural tree operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Target node does not exist in this tree.
    NodeNotFound(CategoryId),
    /// Requested parent node does not exist in this tree.
    ParentNotFound(CategoryId),
    /// Inserted subtree carries an id already present (or repeated).
    DuplicateId(CategoryId),
    /// Move would place a node under itself or one of its descendants.
    CycleDetected {
        node_id: CategoryId,
        parent_id: CategoryId,
    },
    /// Edit would place a category below `MAX_LEVEL`.
    TooDeep {
        node_id: CategoryId,
        level: u32,
        max: u32,
    },
    /// Internal links or levels disagree with the tree shape.
    Inconsistent(String),
}

impl Display for TreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NodeNotFound(id) => write!(f, "category not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent category not found: {id}"),
            Self::DuplicateId(id) => write!(f, "category id already present: {id}"),
            Self::CycleDetected { node_id, parent_id } => write!(
                f,
                "move would create cycle: category {node_id} under parent {parent_id}"
            ),
            Self::TooDeep {
                node_id,
                level,
                max,
            } => write!(
                f,
                "category {node_id} would reach level {level}, deeper than {max}"
            ),
            Self::Inconsistent(message) => write!(f, "inconsistent category tree: {message}"),
        }
    }
}

impl Error for TreeError {}

/// Position of a node relative to the tree root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParentRef {
    /// The tree root itself; its children are level 1.
    Root,
    /// An existing category.
    Category(CategoryId),
}

impl ParentRef {
    pub fn category_id(&self) -> Option<&str> {
        match self {
            Self::Root => None,
            Self::Category(id) => Some(id.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot {
    title: String,
    level: u32,
    parent: ParentRef,
    children: Vec<CategoryId>,
}

/// Borrowed view of one attached node.
#[derive(Debug, Clone, Copy)]
pub struct CategoryView<'a> {
    tree: &'a CategoryTree,
    id: &'a CategoryId,
    slot: &'a Slot,
}

impl<'a> CategoryView<'a> {
    pub fn id(&self) -> &'a str {
        self.id.as_str()
    }

    pub fn title(&self) -> &'a str {
        self.slot.title.as_str()
    }

    pub fn level(&self) -> u32 {
        self.slot.level
    }

    pub fn parent(&self) -> &'a ParentRef {
        &self.slot.parent
    }

    /// Immediate children in order.
    pub fn children(&self) -> Vec<CategoryView<'a>> {
        self.tree.views(&self.slot.children)
    }

    /// Copies this node and its subtree into the detached form.
    pub fn to_category(&self) -> Category {
        Category {
            id: self.id.clone(),
            level: self.slot.level,
            title: self.slot.title.clone(),
            children: self
                .children()
                .iter()
                .map(CategoryView::to_category)
                .collect(),
        }
    }
}

/// Lookup hit: the node plus its immediate parent.
#[derive(Debug, Clone, Copy)]
pub struct Found<'a> {
    pub node: CategoryView<'a>,
    pub parent: &'a ParentRef,
}

/// One user-owned tree of categories.
///
/// Equality is structural and order-sensitive: ids, name, titles, levels and
/// child order must all match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTree {
    id: String,
    name: String,
    roots: Vec<CategoryId>,
    slots: HashMap<CategoryId, Slot>,
}

impl CategoryTree {
    /// Creates an empty tree with a generated id.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(new_category_id(), name)
    }

    /// Creates an empty tree with a caller-provided id.
    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            roots: Vec::new(),
            slots: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Total number of attached categories.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    /// Returns the node with `id`, if attached.
    pub fn get(&self, id: &str) -> Option<CategoryView<'_>> {
        self.slots
            .get_key_value(id)
            .map(|(id, slot)| CategoryView {
                tree: self,
                id,
                slot,
            })
    }

    /// Immediate children of `parent` in order. Unknown parents have none.
    pub fn children(&self, parent: &ParentRef) -> Vec<CategoryView<'_>> {
        match self.child_ids(parent) {
            Some(ids) => self.views(ids),
            None => Vec::new(),
        }
    }

    /// Attaches `child` (with any subtree it carries) as the last child of
    /// `parent`, recomputing every carried level.
    ///
    /// # Errors
    /// - `ParentNotFound` when `parent` names an unknown category.
    /// - `DuplicateId` when any carried id is already attached or repeated.
    /// - `TooDeep` when the deepest carried node would pass `MAX_LEVEL`.
    pub fn add_child(&mut self, parent: &ParentRef, child: Category) -> TreeResult<CategoryId> {
        let parent_level = self.level_of(parent)?;
        check_depth(&child.id, parent_level, child.height())?;

        let carried = {
            let mut incoming = HashSet::new();
            collect_ids(&child, &mut incoming, &self.slots)?;
            incoming.len()
        };

        let id = self.attach(parent.clone(), parent_level + 1, child);
        debug!(
            "event=category_attach module=tree status=ok tree_id={} nodes={}",
            self.id, carried
        );
        Ok(id)
    }

    /// First immediate child of `parent` titled `name`.
    pub fn child_by_name(&self, parent: &ParentRef, name: &str) -> Option<CategoryView<'_>> {
        self.children(parent)
            .into_iter()
            .find(|view| view.title() == name)
    }

    /// Pre-order search by title; the first match wins.
    pub fn find_by_name(&self, name: &str) -> Option<Found<'_>> {
        let mut stack = self.roots.iter().rev().collect::<Vec<_>>();
        while let Some(id) = stack.pop() {
            let view = self.get(id)?;
            if view.title() == name {
                return Some(Found {
                    node: view,
                    parent: view.parent(),
                });
            }
            stack.extend(view.slot.children.iter().rev());
        }
        None
    }

    /// Lookup by id. A direct root child reports `ParentRef::Root`.
    pub fn find_by_id(&self, id: &str) -> Option<Found<'_>> {
        self.get(id).map(|node| Found {
            node,
            parent: node.parent(),
        })
    }

    /// Replaces the title of an attached node.
    pub fn rename(&mut self, id: &str, title: impl Into<String>) -> TreeResult<()> {
        let slot = self
            .slots
            .get_mut(id)
            .ok_or_else(|| TreeError::NodeNotFound(id.to_string()))?;
        slot.title = title.into();
        Ok(())
    }

    /// Removes the first immediate child of `parent` titled `name`.
    ///
    /// Returns the detached subtree, or `None` when nothing matched.
    pub fn remove_child_by_name(&mut self, parent: &ParentRef, name: &str) -> Option<Category> {
        let id = self.child_by_name(parent, name)?.id().to_string();
        self.remove_by_id(&id)
    }

    /// Removes the node with `id` from wherever it is attached.
    ///
    /// Returns the detached subtree (levels as they were), or `None` when the
    /// id is unknown.
    pub fn remove_by_id(&mut self, id: &str) -> Option<Category> {
        let parent = self.slots.get(id)?.parent.clone();
        if let Some(siblings) = self.child_ids_mut(&parent) {
            siblings.retain(|sibling| sibling != id);
        }
        self.detach(id)
    }

    /// Relocates `id` to the end of `new_parent`'s children, carrying its
    /// subtree and recomputing levels.
    ///
    /// # Errors
    /// - `NodeNotFound` when `id` is unknown.
    /// - `ParentNotFound` when `new_parent` names an unknown category.
    /// - `CycleDetected` when `new_parent` is `id` or one of its descendants.
    /// - `TooDeep` when the moved subtree would pass `MAX_LEVEL`.
    pub fn move_to(&mut self, id: &str, new_parent: &ParentRef) -> TreeResult<()> {
        if !self.contains(id) {
            return Err(TreeError::NodeNotFound(id.to_string()));
        }
        if let ParentRef::Category(parent_id) = new_parent {
            if !self.contains(parent_id) {
                return Err(TreeError::ParentNotFound(parent_id.clone()));
            }
            if self.is_self_or_ancestor(id, parent_id) {
                return Err(TreeError::CycleDetected {
                    node_id: id.to_string(),
                    parent_id: parent_id.clone(),
                });
            }
        }
        check_depth(id, self.level_of(new_parent)?, self.height(id))?;

        let detached = self
            .remove_by_id(id)
            .ok_or_else(|| TreeError::NodeNotFound(id.to_string()))?;
        self.add_child(new_parent, detached)?;
        debug!(
            "event=category_move module=tree status=ok tree_id={} parent={}",
            self.id,
            new_parent.category_id().unwrap_or("root")
        );
        Ok(())
    }

    /// Moves `id` up one level, under its grandparent.
    ///
    /// Level-1 nodes cannot be outdented further; that case is a no-op.
    pub fn outdent(&mut self, id: &str) -> TreeResult<()> {
        let parent = self
            .slots
            .get(id)
            .ok_or_else(|| TreeError::NodeNotFound(id.to_string()))?
            .parent
            .clone();
        let grandparent = match &parent {
            ParentRef::Root => return Ok(()),
            ParentRef::Category(parent_id) => self
                .slots
                .get(parent_id)
                .ok_or_else(|| {
                    TreeError::Inconsistent(format!("dangling parent {parent_id} for {id}"))
                })?
                .parent
                .clone(),
        };
        self.move_to(id, &grandparent)
    }

    /// Moves `id` under the existing category `new_parent_id`.
    ///
    /// An unknown `new_parent_id` is rejected instead of falling back to root.
    pub fn indent(&mut self, id: &str, new_parent_id: &str) -> TreeResult<()> {
        if !self.contains(new_parent_id) {
            return Err(TreeError::ParentNotFound(new_parent_id.to_string()));
        }
        self.move_to(id, &ParentRef::Category(new_parent_id.to_string()))
    }

    /// Depth-first pre-order flattening of the whole tree.
    pub fn all_children(&self) -> Vec<CategoryView<'_>> {
        let mut out = Vec::with_capacity(self.slots.len());
        let mut stack = self.roots.iter().rev().collect::<Vec<_>>();
        while let Some(id) = stack.pop() {
            if let Some(view) = self.get(id) {
                stack.extend(view.slot.children.iter().rev());
                out.push(view);
            }
        }
        out
    }

    /// Copies the level-1 nodes with their subtrees into detached form.
    pub fn to_categories(&self) -> Vec<Category> {
        self.children(&ParentRef::Root)
            .iter()
            .map(CategoryView::to_category)
            .collect()
    }

    /// Checks parent links, levels, and reachability of every node.
    pub fn validate(&self) -> TreeResult<()> {
        let mut seen = 0usize;
        let mut stack = self
            .roots
            .iter()
            .map(|id| (id, ParentRef::Root, ROOT_LEVEL + 1))
            .collect::<Vec<_>>();
        while let Some((id, expected_parent, expected_level)) = stack.pop() {
            let slot = self
                .slots
                .get(id)
                .ok_or_else(|| TreeError::Inconsistent(format!("missing slot for {id}")))?;
            if slot.parent != expected_parent {
                return Err(TreeError::Inconsistent(format!("wrong parent link on {id}")));
            }
            if slot.level > MAX_LEVEL {
                return Err(TreeError::TooDeep {
                    node_id: id.clone(),
                    level: slot.level,
                    max: MAX_LEVEL,
                });
            }
            if slot.level != expected_level {
                return Err(TreeError::Inconsistent(format!(
                    "level {} on {id}, expected {expected_level}",
                    slot.level
                )));
            }
            seen += 1;
            for child in &slot.children {
                stack.push((child, ParentRef::Category(id.clone()), expected_level + 1));
            }
        }
        if seen != self.slots.len() {
            return Err(TreeError::Inconsistent(format!(
                "{} unreachable categories",
                self.slots.len().saturating_sub(seen)
            )));
        }
        Ok(())
    }

    fn level_of(&self, parent: &ParentRef) -> TreeResult<u32> {
        match parent {
            ParentRef::Root => Ok(ROOT_LEVEL),
            ParentRef::Category(id) => self
                .slots
                .get(id)
                .map(|slot| slot.level)
                .ok_or_else(|| TreeError::ParentNotFound(id.clone())),
        }
    }

    fn child_ids(&self, parent: &ParentRef) -> Option<&Vec<CategoryId>> {
        match parent {
            ParentRef::Root => Some(&self.roots),
            ParentRef::Category(id) => self.slots.get(id).map(|slot| &slot.children),
        }
    }

    fn child_ids_mut(&mut self, parent: &ParentRef) -> Option<&mut Vec<CategoryId>> {
        match parent {
            ParentRef::Root => Some(&mut self.roots),
            ParentRef::Category(id) => self.slots.get_mut(id).map(|slot| &mut slot.children),
        }
    }

    fn views<'a>(&'a self, ids: &'a [CategoryId]) -> Vec<CategoryView<'a>> {
        ids.iter().filter_map(|id| self.get(id)).collect()
    }

    fn attach(&mut self, parent: ParentRef, level: u32, node: Category) -> CategoryId {
        let Category {
            id,
            title,
            children,
            ..
        } = node;
        self.slots.insert(
            id.clone(),
            Slot {
                title,
                level,
                parent: parent.clone(),
                children: Vec::with_capacity(children.len()),
            },
        );
        if let Some(siblings) = self.child_ids_mut(&parent) {
            siblings.push(id.clone());
        }
        let own = ParentRef::Category(id.clone());
        for child in children {
            self.attach(own.clone(), level + 1, child);
        }
        id
    }

    fn detach(&mut self, id: &str) -> Option<Category> {
        let (id, slot) = self.slots.remove_entry(id)?;
        let children = slot
            .children
            .iter()
            .filter_map(|child| self.detach(child))
            .collect();
        Some(Category {
            id,
            level: slot.level,
            title: slot.title,
            children,
        })
    }

    /// Number of levels in the attached subtree rooted at `id`, itself included.
    fn height(&self, id: &str) -> u32 {
        let Some(top) = self.slots.get(id) else {
            return 0;
        };
        let mut deepest = top.level;
        let mut stack = vec![top];
        while let Some(slot) = stack.pop() {
            deepest = deepest.max(slot.level);
            stack.extend(slot.children.iter().filter_map(|child| self.slots.get(child)));
        }
        deepest - top.level + 1
    }

    /// Walks up from `candidate` looking for `id`.
    fn is_self_or_ancestor(&self, id: &str, candidate: &str) -> bool {
        let mut visited = HashSet::new();
        let mut cursor = Some(candidate);
        while let Some(current) = cursor {
            if current == id || !visited.insert(current) {
                return true;
            }
            cursor = self
                .slots
                .get(current)
                .and_then(|slot| slot.parent.category_id());
        }
        false
    }
}

fn check_depth(id: &str, parent_level: u32, height: u32) -> TreeResult<()> {
    let level = parent_level.saturating_add(height);
    if level > MAX_LEVEL {
        return Err(TreeError::TooDeep {
            node_id: id.to_string(),
            level,
            max: MAX_LEVEL,
        });
    }
    Ok(())
}

fn collect_ids<'a>(
    node: &'a Category,
    incoming: &mut HashSet<&'a str>,
    attached: &HashMap<CategoryId, Slot>,
) -> TreeResult<()> {
    if attached.contains_key(&node.id) || !incoming.insert(node.id.as_str()) {
        return Err(TreeError::DuplicateId(node.id.clone()));
    }
    for child in &node.children {
        collect_ids(child, incoming, attached)?;
    }
    Ok(())
}
