//! Byte encoding for whole category trees.
//!
//! # Responsibility
//! - Serialize a `CategoryTree` into a self-describing JSON document.
//! - Rebuild a tree from stored bytes, rejecting documents that break tree
//!   invariants instead of repairing them.
//!
//! # Invariants
//! - `from_bytes(to_bytes(t)) == t` for every valid tree `t`.
//! - Field names are stable: `id`, `name`, `categories`, `level`, `title`.

use crate::model::category::Category;
use crate::model::tree::{CategoryTree, ParentRef, TreeError, ROOT_LEVEL};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CodecResult<T> = Result<T, CodecError>;

#[derive(Debug)]
pub enum CodecError {
    Json(serde_json::Error),
    /// Stored level does not match the nesting depth of the node.
    LevelMismatch {
        id: String,
        expected: u32,
        found: u32,
    },
    /// Document shape violates a tree invariant (e.g. repeated ids).
    Tree(TreeError),
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "{err}"),
            Self::LevelMismatch {
                id,
                expected,
                found,
            } => write!(
                f,
                "category {id} stored with level {found}, expected {expected}"
            ),
            Self::Tree(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::LevelMismatch { .. } => None,
            Self::Tree(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<TreeError> for CodecError {
    fn from(value: TreeError) -> Self {
        Self::Tree(value)
    }
}

/// Nested document shape of one stored tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeDocument {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl From<&CategoryTree> for TreeDocument {
    fn from(tree: &CategoryTree) -> Self {
        Self {
            id: tree.id().to_string(),
            name: tree.name().to_string(),
            categories: tree.to_categories(),
        }
    }
}

impl TryFrom<TreeDocument> for CategoryTree {
    type Error = CodecError;

    fn try_from(document: TreeDocument) -> Result<Self, Self::Error> {
        for category in &document.categories {
            check_levels(category, ROOT_LEVEL + 1)?;
        }
        let mut tree = CategoryTree::with_id(document.id, document.name);
        for category in document.categories {
            tree.add_child(&ParentRef::Root, category)?;
        }
        Ok(tree)
    }
}

impl Serialize for CategoryTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TreeDocument::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CategoryTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let document = TreeDocument::deserialize(deserializer)?;
        CategoryTree::try_from(document).map_err(serde::de::Error::custom)
    }
}

impl CategoryTree {
    /// Encodes the whole tree as JSON bytes.
    pub fn to_bytes(&self) -> CodecResult<Vec<u8>> {
        Ok(serde_json::to_vec(&TreeDocument::from(self))?)
    }

    /// Decodes a tree previously produced by [`CategoryTree::to_bytes`].
    ///
    /// # Errors
    /// - `Json` for malformed documents.
    /// - `LevelMismatch` when a stored level contradicts nesting.
    /// - `Tree(DuplicateId)` when an id appears twice.
    /// - `Tree(TooDeep)` when a category sits below `MAX_LEVEL`.
    pub fn from_bytes(data: &[u8]) -> CodecResult<Self> {
        let document: TreeDocument = serde_json::from_slice(data)?;
        Self::try_from(document)
    }
}

fn check_levels(category: &Category, expected: u32) -> CodecResult<()> {
    if category.level != expected {
        return Err(CodecError::LevelMismatch {
            id: category.id.clone(),
            expected,
            found: category.level,
        });
    }
    for child in &category.children {
        check_levels(child, expected + 1)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CodecError, TreeDocument};
    use crate::model::category::Category;
    use crate::model::tree::{CategoryTree, ParentRef, TreeError, MAX_LEVEL};

    /// Detached chain `c0 -> c1 -> ...` with `len` levels.
    fn chain(len: u32) -> Category {
        let mut node = Category::with_id(format!("c{}", len - 1), "leaf");
        for step in (0..len - 1).rev() {
            let mut parent = Category::with_id(format!("c{step}"), "link");
            parent.add_child(node);
            node = parent;
        }
        node
    }

    fn sample() -> CategoryTree {
        let mut tree = CategoryTree::with_id("tree-1", "Life Categories");
        let life = tree
            .add_child(&ParentRef::Root, Category::with_id("life", "Life"))
            .unwrap();
        let mut games = Category::with_id("games", "Games");
        games.add_child(Category::with_id("monopoly", "Monopoly"));
        tree.add_child(&ParentRef::Category(life), games).unwrap();
        tree.add_child(&ParentRef::Root, Category::with_id("work", "Work"))
            .unwrap();
        tree
    }

    #[test]
    fn bytes_round_trip_preserves_structure() {
        let tree = sample();
        let bytes = tree.to_bytes().unwrap();
        let restored = CategoryTree::from_bytes(&bytes).unwrap();
        assert_eq!(restored, tree);
    }

    #[test]
    fn document_uses_stable_field_names() {
        let value: serde_json::Value = serde_json::to_value(&sample()).unwrap();
        assert_eq!(value["id"], "tree-1");
        assert_eq!(value["name"], "Life Categories");
        let life = &value["categories"][0];
        assert_eq!(life["title"], "Life");
        assert_eq!(life["level"], 1);
        assert_eq!(life["categories"][0]["categories"][0]["title"], "Monopoly");
        assert_eq!(value["categories"][1]["id"], "work");
    }

    #[test]
    fn decode_accepts_missing_child_lists() {
        let raw = br#"{"id":"t","name":"n","categories":[{"id":"a","level":1,"title":"A"}]}"#;
        let tree = CategoryTree::from_bytes(raw).unwrap();
        assert_eq!(tree.len(), 1);
        assert!(tree.get("a").unwrap().children().is_empty());
    }

    #[test]
    fn decode_rejects_level_mismatch() {
        let raw = br#"{"id":"t","name":"n","categories":[{"id":"a","level":2,"title":"A"}]}"#;
        let err = CategoryTree::from_bytes(raw).unwrap_err();
        assert!(matches!(err, CodecError::LevelMismatch { expected: 1, found: 2, .. }));
    }

    #[test]
    fn decode_rejects_duplicate_ids() {
        let mut document = TreeDocument::from(&sample());
        document.categories.push(Category::with_id("games", "Games copy"));
        let bytes = serde_json::to_vec(&document).unwrap();
        let err = CategoryTree::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Tree(TreeError::DuplicateId(ref id)) if id == "games"
        ));
    }

    #[test]
    fn deepest_allowed_tree_round_trips() {
        let mut tree = CategoryTree::with_id("deep", "Deep");
        tree.add_child(&ParentRef::Root, chain(MAX_LEVEL)).unwrap();

        let restored = CategoryTree::from_bytes(&tree.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, tree);
        let deepest = format!("c{}", MAX_LEVEL - 1);
        assert_eq!(restored.get(&deepest).unwrap().level(), MAX_LEVEL);
    }

    #[test]
    fn decode_rejects_documents_deeper_than_max_level() {
        let document = TreeDocument {
            id: "deep".to_string(),
            name: "Deep".to_string(),
            categories: vec![chain(MAX_LEVEL + 1)],
        };
        let bytes = serde_json::to_vec(&document).unwrap();
        let err = CategoryTree::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Tree(TreeError::TooDeep { level, .. }) if level == MAX_LEVEL + 1
        ));
    }
}
