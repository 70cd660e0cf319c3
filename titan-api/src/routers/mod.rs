pub mod blobs;
pub mod concept_descriptions;
pub mod description;
pub mod descriptors;
pub mod discovery;
pub mod health;
pub mod jobs;
pub mod serialization;
pub mod shells;
pub mod submodels;
