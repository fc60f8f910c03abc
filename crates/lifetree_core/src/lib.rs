//! Core domain logic for LifeTree category trees.
//! This crate is the single source of truth for tree invariants.

pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::CoreConfig;
pub use gateway::{
    decode_edit_request, EditIntent, EditRequest, Gateway, GatewayError, GatewayErrorKind,
    GatewayResponse,
};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status, LoggingError};
pub use model::category::{new_category_id, Category, CategoryId};
pub use model::codec::{CodecError, TreeDocument};
pub use model::tree::{
    CategoryTree, CategoryView, Found, ParentRef, TreeError, TreeResult, MAX_LEVEL,
};
pub use repo::tree_store::{SqliteTreeStore, StoreError, StoreResult, StoredTree, TreeStore};
pub use service::category_service::{
    default_personal_tree, CategoryService, ServiceError, PERSONAL_TREE_ID, PERSONAL_TREE_NAME,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
