//! Declarative resource provider for the Duo Admin API.
//!
//! Maps users, phones, integrations, administrators, administrator
//! authentication methods and group/phone memberships onto signed Admin API
//! calls. Every operation is one awaited call (plus a read-back), and every
//! response is checked against the `stat` envelope.

pub mod config;
mod envelope;
mod error;
pub mod protocol;
mod provider;
pub mod resources;
pub mod schema;

pub use envelope::StatEnvelope;
pub use error::{ProviderError, Result};
pub use provider::{PlannedChange, Provider};
pub use resources::{composite_id, DynResource, ResourceHandler};
pub use schema::{AttributeSchema, AttributeType, Presence, ResourceSchema};
