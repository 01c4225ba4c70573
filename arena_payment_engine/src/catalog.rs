//! Read-only item definitions.
//!
//! The catalog is maintained elsewhere; the engine only consumes immutable item definitions when
//! validating and pricing a new order. [`StaticCatalog`] is the standard implementation, loading a
//! JSON document once at startup.

use std::{collections::HashMap, path::Path, sync::Arc};

use ap_common::Credits;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::ItemType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceKind {
    RenameNickname,
    ReclaimNickname,
    ResetStats,
}

/// What a catalog item grants when its order completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemKind {
    Credits { amount: Credits },
    Membership { tier: String, days: i64 },
    Service { service: ServiceKind },
}

impl ItemKind {
    pub fn item_type(&self) -> ItemType {
        match self {
            ItemKind::Credits { .. } => ItemType::Credits,
            ItemKind::Membership { .. } => ItemType::Membership,
            ItemKind::Service { .. } => ItemType::Service,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub price: Credits,
    #[serde(flatten)]
    pub kind: ItemKind,
}

/// Supplies immutable item definitions. External collaborator; specified only at this interface.
pub trait CatalogProvider: Clone + Send + Sync {
    fn item(&self, item_id: &str) -> Option<CatalogItem>;
    fn items(&self) -> Vec<CatalogItem>;
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Could not read catalog file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not parse catalog file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Duplicate item id in catalog: {0}")]
    DuplicateItem(String),
}

#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    items: Arc<HashMap<String, CatalogItem>>,
}

impl StaticCatalog {
    pub fn from_items<I: IntoIterator<Item = CatalogItem>>(items: I) -> Result<Self, CatalogError> {
        let mut map = HashMap::new();
        for item in items {
            if map.contains_key(&item.id) {
                return Err(CatalogError::DuplicateItem(item.id));
            }
            map.insert(item.id.clone(), item);
        }
        Ok(Self { items: Arc::new(map) })
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let items: Vec<CatalogItem> = serde_json::from_str(json)?;
        Self::from_items(items)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl CatalogProvider for StaticCatalog {
    fn item(&self, item_id: &str) -> Option<CatalogItem> {
        self.items.get(item_id).cloned()
    }

    fn items(&self) -> Vec<CatalogItem> {
        self.items.values().cloned().collect()
    }
}
