//! # Data Models
//!
//! Records the workflow host persists and the typed request views each
//! step builds from its parameter bag.

pub mod entity;
pub mod requests;

pub use entity::{EntityRecord, FieldRef, LayoutSection, Manifest};
pub use requests::{ChannelRequest, ProvisionAction, ProvisionRequest, ScannerRequest};
