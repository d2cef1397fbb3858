//! # Entity Record
//!
//! A provisioning record as the workflow host stores it: identity, kind,
//! current status, child references and the kind-specific payload the steps
//! read (manifests on scanners, layout sections on channels).

use crate::state_machine::{EntityKind, EntityStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One source manifest a scanner was asked to scan
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub url: String,
}

impl Manifest {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// One "Layouts" section of a channel record
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LayoutSection {
    /// Name of the layout the channel should be placed into
    pub layout_match: Option<String>,
    /// Slot key the channel was assigned, `layout/sequence`
    pub position: Option<String>,
}

impl LayoutSection {
    pub fn for_layout(layout: impl Into<String>) -> Self {
        Self {
            layout_match: Some(layout.into()),
            position: None,
        }
    }

    /// Layout name, if the section names a non-blank one
    pub fn requested_layout(&self) -> Option<&str> {
        self.layout_match
            .as_deref()
            .map(str::trim)
            .filter(|layout| !layout.is_empty())
    }
}

/// Addressable field of a record that steps write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum FieldRef {
    /// "Layout Position" of the `section`-th Layouts section
    LayoutPosition { section: usize },
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LayoutPosition { section } => write!(f, "Layouts[{section}].Layout Position"),
        }
    }
}

/// Persisted provisioning record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: Uuid,
    pub kind: EntityKind,
    pub status: EntityStatus,
    pub name: String,
    /// Scanners of a provision, channels of a scanner
    #[serde(default)]
    pub children: Vec<Uuid>,
    #[serde(default)]
    pub manifests: Vec<Manifest>,
    #[serde(default)]
    pub layouts: Vec<LayoutSection>,
}

impl EntityRecord {
    /// New record with a fresh identifier
    pub fn new(kind: EntityKind, status: EntityStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            status,
            name: String::new(),
            children: Vec::new(),
            manifests: Vec::new(),
            layouts: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_children(mut self, children: Vec<Uuid>) -> Self {
        self.children = children;
        self
    }

    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.manifests.push(manifest);
        self
    }

    pub fn with_layout(mut self, section: LayoutSection) -> Self {
        self.layouts.push(section);
        self
    }

    /// Name for incident logs; unnamed records show as `N/A`
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "N/A"
        } else {
            &self.name
        }
    }

    /// Layout sections that request a placement, with their section index
    pub fn requested_layouts(&self) -> impl Iterator<Item = (usize, &str)> {
        self.layouts
            .iter()
            .enumerate()
            .filter_map(|(index, section)| section.requested_layout().map(|l| (index, l)))
    }
}
