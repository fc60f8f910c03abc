//! Request-facing gateway over the category service.
//!
//! # Responsibility
//! - Decode one edit intent (`ADD|MOVE|DELETE|UPDATE`) from a request body.
//! - Dispatch intents to the service and wrap outcomes in response envelopes.
//! - Classify failures so callers can map them onto transport status codes.
//!
//! # Invariants
//! - Gateway entry points never panic; every failure becomes an envelope.
//! - Malformed intents are rejected before any tree is loaded.

use crate::model::category::Category;
use crate::model::tree::{CategoryTree, TreeError};
use crate::repo::tree_store::{StoreError, TreeStore};
use crate::service::category_service::{CategoryService, ServiceError};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("valid id regex"));

/// Raw edit request as sent by the UI.
///
/// `operation` and `id` are required for every action, `parentID` for ADD
/// and MOVE (empty addresses the root), `title` for ADD and UPDATE.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditRequest {
    #[serde(default)]
    pub operation: String,
    #[serde(rename = "parentID", default)]
    pub parent_id: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
}

/// Validated edit intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditIntent {
    Add {
        id: String,
        parent_id: String,
        title: String,
    },
    Update {
        id: String,
        title: String,
    },
    Move {
        id: String,
        parent_id: String,
    },
    Delete {
        id: String,
    },
}

impl EditIntent {
    /// Wire name of this operation.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Add { .. } => "ADD",
            Self::Update { .. } => "UPDATE",
            Self::Move { .. } => "MOVE",
            Self::Delete { .. } => "DELETE",
        }
    }
}

/// Coarse failure classes exposed to gateway callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorKind {
    InvalidRequest,
    NotFound,
    Conflict,
    StorageFailure,
    InternalInconsistency,
}

/// Gateway-level failure with its classification.
#[derive(Debug)]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
}

impl GatewayError {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::InvalidRequest,
            message: message.into(),
        }
    }
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for GatewayError {}

impl From<ServiceError> for GatewayError {
    fn from(value: ServiceError) -> Self {
        let kind = match &value {
            ServiceError::InvalidTitle | ServiceError::MissingId(_) => {
                GatewayErrorKind::InvalidRequest
            }
            ServiceError::TreeNotFound(_) => GatewayErrorKind::NotFound,
            ServiceError::Tree(TreeError::NodeNotFound(_))
            | ServiceError::Tree(TreeError::ParentNotFound(_)) => GatewayErrorKind::NotFound,
            ServiceError::Tree(TreeError::DuplicateId(_))
            | ServiceError::Tree(TreeError::CycleDetected { .. })
            | ServiceError::Tree(TreeError::TooDeep { .. }) => {
                GatewayErrorKind::InvalidRequest
            }
            ServiceError::Tree(TreeError::Inconsistent(_)) => {
                GatewayErrorKind::InternalInconsistency
            }
            ServiceError::Store(StoreError::Conflict { .. }) => GatewayErrorKind::Conflict,
            ServiceError::Codec(_) | ServiceError::Store(_) => GatewayErrorKind::StorageFailure,
        };
        Self {
            kind,
            message: value.to_string(),
        }
    }
}

impl TryFrom<EditRequest> for EditIntent {
    type Error = GatewayError;

    fn try_from(request: EditRequest) -> Result<Self, Self::Error> {
        let id = request.id.trim().to_string();
        if id.is_empty() {
            return Err(GatewayError::invalid("category action requires `id`"));
        }
        if !ID_RE.is_match(&id) {
            return Err(GatewayError::invalid(format!("invalid category id `{id}`")));
        }

        let parent_id = request.parent_id.trim().to_string();
        if !parent_id.is_empty() && !ID_RE.is_match(&parent_id) {
            return Err(GatewayError::invalid(format!(
                "invalid parent id `{parent_id}`"
            )));
        }

        let title = request.title.trim().to_string();
        let require_title = |operation: &str| {
            if title.is_empty() {
                Err(GatewayError::invalid(format!(
                    "{operation} requires a non-blank `title`"
                )))
            } else {
                Ok(title.clone())
            }
        };

        match request.operation.as_str() {
            "ADD" => Ok(Self::Add {
                title: require_title("ADD")?,
                id,
                parent_id,
            }),
            "UPDATE" => Ok(Self::Update {
                title: require_title("UPDATE")?,
                id,
            }),
            "MOVE" => Ok(Self::Move { id, parent_id }),
            "DELETE" => Ok(Self::Delete { id }),
            other => Err(GatewayError::invalid(format!(
                "no matching operation `{other}`; expected ADD|MOVE|DELETE|UPDATE"
            ))),
        }
    }
}

/// Decodes and validates one JSON edit request body.
pub fn decode_edit_request(body: &[u8]) -> Result<EditIntent, GatewayError> {
    let request: EditRequest = serde_json::from_slice(body).map_err(|err| {
        GatewayError::invalid(format!(
            "body does not match the category action structure: {err}"
        ))
    })?;
    EditIntent::try_from(request)
}

/// Response envelope returned by every gateway entry point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<GatewayErrorKind>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<T>,
}

impl<T> GatewayResponse<T> {
    fn success(message: impl Into<String>, body: Option<T>) -> Self {
        Self {
            ok: true,
            kind: None,
            message: message.into(),
            body,
        }
    }

    fn failure(err: GatewayError) -> Self {
        Self {
            ok: false,
            kind: Some(err.kind),
            message: err.message,
            body: None,
        }
    }

    fn from_result(result: Result<T, GatewayError>, message: &str) -> Self {
        match result {
            Ok(body) => Self::success(message, Some(body)),
            Err(err) => Self::failure(err),
        }
    }
}

/// Gateway facade bound to one store and one authenticated owner.
pub struct Gateway<S: TreeStore> {
    service: CategoryService<S>,
}

impl<S: TreeStore> Gateway<S> {
    pub fn new(store: S, owner: impl Into<String>) -> Self {
        Self {
            service: CategoryService::new(store, owner),
        }
    }

    /// Returns the whole tree.
    pub fn get_tree(&self, tree_id: &str) -> GatewayResponse<CategoryTree> {
        GatewayResponse::from_result(
            self.service.get_tree(tree_id).map_err(GatewayError::from),
            "ok",
        )
    }

    /// Returns the pre-order flattening of the tree.
    pub fn list(&self, tree_id: &str) -> GatewayResponse<Vec<Category>> {
        GatewayResponse::from_result(
            self.service
                .list_categories(tree_id)
                .map_err(GatewayError::from),
            "ok",
        )
    }

    /// Decodes one edit request body and applies it.
    pub fn patch(&self, tree_id: &str, body: &[u8]) -> GatewayResponse<()> {
        match decode_edit_request(body) {
            Ok(intent) => self.apply(tree_id, intent),
            Err(err) => {
                warn!(
                    "event=category_patch module=gateway status=rejected tree_id={tree_id} error={err}"
                );
                GatewayResponse::failure(err)
            }
        }
    }

    /// Applies one validated intent.
    pub fn apply(&self, tree_id: &str, intent: EditIntent) -> GatewayResponse<()> {
        let operation = intent.operation();
        let result = match intent {
            EditIntent::Add {
                id,
                parent_id,
                title,
            } => self
                .service
                .add_category(tree_id, &parent_id, &id, &title)
                .map(|_| ()),
            EditIntent::Update { id, title } => {
                self.service.update_category(tree_id, &id, &title)
            }
            EditIntent::Move { id, parent_id } => {
                self.service.move_category(tree_id, &id, &parent_id)
            }
            EditIntent::Delete { id } => self.service.delete_category(tree_id, &id).map(|_| ()),
        };

        applied(result, operation)
    }

    /// Moves a category one level up.
    pub fn outdent(&self, tree_id: &str, id: &str) -> GatewayResponse<()> {
        applied(self.service.outdent_category(tree_id, id), "OUTDENT")
    }

    /// Moves a category under `parent_id`.
    pub fn indent(&self, tree_id: &str, id: &str, parent_id: &str) -> GatewayResponse<()> {
        applied(
            self.service.indent_category(tree_id, id, parent_id),
            "INDENT",
        )
    }

    /// Drops the stored tree.
    pub fn reset(&self, tree_id: &str) -> GatewayResponse<()> {
        applied(self.service.delete_tree(tree_id), "RESET")
    }
}

fn applied(result: Result<(), ServiceError>, operation: &str) -> GatewayResponse<()> {
    match result {
        Ok(()) => GatewayResponse::success(format!("{operation} applied."), None),
        Err(err) => GatewayResponse::failure(GatewayError::from(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_edit_request, EditIntent, GatewayErrorKind};

    #[test]
    fn decodes_add_with_empty_parent_as_root_add() {
        let intent =
            decode_edit_request(br#"{"operation":"ADD","id":"abc","title":" Games "}"#).unwrap();
        assert_eq!(
            intent,
            EditIntent::Add {
                id: "abc".to_string(),
                parent_id: String::new(),
                title: "Games".to_string(),
            }
        );
    }

    #[test]
    fn decodes_move_with_parent_field_name() {
        let intent =
            decode_edit_request(br#"{"operation":"MOVE","id":"abc","parentID":"work"}"#).unwrap();
        assert_eq!(intent.operation(), "MOVE");
        assert!(matches!(intent, EditIntent::Move { ref parent_id, .. } if parent_id == "work"));
    }

    #[test]
    fn rejects_missing_id_unknown_operation_and_blank_title() {
        for body in [
            &br#"{"operation":"DELETE"}"#[..],
            &br#"{"operation":"RENAME","id":"abc"}"#[..],
            &br#"{"operation":"UPDATE","id":"abc","title":"   "}"#[..],
            &br#"{"operation":"add","id":"abc","title":"x"}"#[..],
            &br#"{"operation":"DELETE","id":"../etc"}"#[..],
            &b"not json"[..],
        ] {
            let err = decode_edit_request(body).unwrap_err();
            assert_eq!(err.kind, GatewayErrorKind::InvalidRequest);
        }
    }
}
