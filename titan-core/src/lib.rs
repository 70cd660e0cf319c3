//! # titan-core
//!
//! Foundation crate for the Titan-AAS runtime:
//!
//! - structured error taxonomy mapped to IDTA error codes ([`errors`])
//! - Base64URL-without-padding identifier codec ([`ids`])
//! - canonical JSON bytes and strong ETag derivation ([`canonical`])
//! - tenant context carried through every operation ([`tenant`])
//! - process settings loaded from the environment ([`settings`])
//!
//! Everything here is transport-agnostic; the server crate decides how
//! errors and documents are serialized on the wire.

pub mod canonical;
pub mod entity;
pub mod errors;
pub mod ids;
pub mod settings;
pub mod tenant;

pub use canonical::{canonicalize, canonicalize_to_value, etag_hex, strong_etag};
pub use entity::EntityKind;
pub use errors::{TitanError, TitanResult};
pub use ids::{decode_id, encode_id};
pub use settings::{BlobStorageKind, Settings};
pub use tenant::{TenantContext, TenantId};
