//! # titan-projection
//!
//! Read-side projection engine (IDTA-01002 Part 2): `idShortPath`
//! navigation into nested submodel elements and the serialization
//! modifiers `content`, `level`, `extent`.
//!
//! Projections are pure functions over JSON documents - the input is never
//! mutated, and the same input always yields the same output. The write
//! path reuses [`merge::merge_patch`] for RFC-7396-style merge patches.

pub mod error;
pub mod merge;
pub mod modifiers;
pub mod navigate;
pub mod path;
pub mod value;

pub use error::ProjectionError;
pub use merge::merge_patch;
pub use modifiers::{apply_projection, Content, Extent, Level, ProjectionModifiers};
pub use navigate::{navigate, navigate_mut};
pub use path::{append_index, append_segment, parse_id_short_path, PathStep};
pub use value::{collect_paths, element_reference, extract_value};
