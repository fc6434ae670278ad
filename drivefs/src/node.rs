//! Remote metadata tree.
//!
//! Nodes are owned by the tree (parents hold `Arc`s to children); file handles
//! only keep `Weak` references and go through [`RemoteNode::store`] and
//! [`RemoteNode::add_child`] to mutate anything.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, Weak};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata of a remote object as returned by the drive API.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMeta {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub size: i64,
    /// Download url; `None` for placeholders that have no content yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_dir: bool,
}

impl NodeMeta {
    pub fn file(id: impl Into<String>, name: impl Into<String>, size: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            size,
            ..Default::default()
        }
    }

    pub fn dir(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_dir: true,
            ..Default::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// The view of a tree node a file handle is allowed to have.
pub trait RemoteNode: Send + Sync {
    fn meta(&self) -> NodeMeta;

    fn size(&self) -> i64 {
        self.meta().size
    }

    fn url(&self) -> Option<String> {
        self.meta().url
    }

    /// Replace this node's metadata in place.
    fn store(&self, meta: NodeMeta);

    /// Insert a child built from `meta` and return it.
    fn add_child(&self, meta: NodeMeta) -> Arc<dyn RemoteNode>;
}

pub struct DriveNode {
    meta: RwLock<NodeMeta>,
    parent: Weak<DriveNode>,
    children: RwLock<BTreeMap<String, Arc<DriveNode>>>,
    this: Weak<DriveNode>,
}

impl DriveNode {
    pub fn root(meta: NodeMeta) -> Arc<Self> {
        Self::with_parent(meta, Weak::new())
    }

    fn with_parent(meta: NodeMeta, parent: Weak<DriveNode>) -> Arc<Self> {
        Arc::new_cyclic(|this| DriveNode {
            meta: RwLock::new(meta),
            parent,
            children: RwLock::new(BTreeMap::new()),
            this: this.clone(),
        })
    }

    pub fn parent(&self) -> Option<Arc<DriveNode>> {
        self.parent.upgrade()
    }

    pub fn name(&self) -> String {
        self.read_meta().name.clone()
    }

    pub fn child(&self, name: &str) -> Option<Arc<DriveNode>> {
        self.children
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    pub fn children(&self) -> Vec<Arc<DriveNode>> {
        self.children
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    /// Insert a child node, replacing any same-named entry.
    pub fn insert(&self, meta: NodeMeta) -> Arc<DriveNode> {
        let child = Self::with_parent(meta, self.this.clone());
        let name = child.name();
        self.children
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name, child.clone());
        child
    }

    /// Detach a child from the tree; handles still pointing at it lose their node.
    pub fn remove(&self, name: &str) -> Option<Arc<DriveNode>> {
        self.children
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name)
    }

    fn read_meta(&self) -> std::sync::RwLockReadGuard<'_, NodeMeta> {
        self.meta.read().unwrap_or_else(|e| e.into_inner())
    }
}

impl RemoteNode for DriveNode {
    fn meta(&self) -> NodeMeta {
        self.read_meta().clone()
    }

    fn size(&self) -> i64 {
        self.read_meta().size
    }

    fn url(&self) -> Option<String> {
        self.read_meta().url.clone()
    }

    fn store(&self, meta: NodeMeta) {
        let old_name = {
            let mut current = self.meta.write().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *current, meta).name
        };
        // keep the parent's index in sync with a rename
        let new_name = self.name();
        if old_name != new_name {
            if let Some(parent) = self.parent() {
                let mut siblings = parent.children.write().unwrap_or_else(|e| e.into_inner());
                if let Some(me) = siblings.remove(&old_name) {
                    siblings.insert(new_name, me);
                }
            }
        }
    }

    fn add_child(&self, meta: NodeMeta) -> Arc<dyn RemoteNode> {
        self.insert(meta)
    }
}

impl std::fmt::Debug for DriveNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveNode")
            .field("meta", &*self.read_meta())
            .finish_non_exhaustive()
    }
}
