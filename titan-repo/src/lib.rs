//! # titan-repo
//!
//! The repository layer: every identifiable entity is persisted in dual
//! representation - an indexable document for filter queries and the
//! immutable canonical bytes the fast GET path and ETag derivation use.
//! Both are written atomically through the [`store::DocumentStore`] seam.
//!
//! Writes canonicalize, externalize blobs, persist, then publish an event;
//! the Single Writer reconciles the cache afterwards, so the store stays
//! the single authority. Conditional requests (`If-Match`) are the
//! linearization point for concurrent writers.

pub mod concept_descriptions;
pub mod descriptors;
pub mod discovery;
pub mod elements;
pub mod invocations;
pub mod memory;
pub mod repo;
pub mod shells;
pub mod store;
pub mod submodels;
pub mod templates;

pub use concept_descriptions::ConceptDescriptionRepository;
pub use descriptors::DescriptorRepository;
pub use discovery::{encode_asset_id, AssetIdFilter, DiscoveryService};
pub use elements::CreatedElement;
pub use invocations::{
    ExecutionState, InvocationService, InvokeRequest, OperationArgument, OperationInvocation,
};
pub use memory::MemoryDocumentStore;
pub use repo::{EntityPage, IfMatch, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
pub use shells::ShellRepository;
pub use store::{DocumentStore, EntityRow, ListFilter};
pub use submodels::SubmodelRepository;
pub use templates::{instantiate_template, InstantiationRequest};
