//! Type descriptors and the registry that caches them.

mod registry;
mod type_descriptor;
mod version;

pub use registry::DescriptorRegistry;
pub use type_descriptor::{DescriptorFlags, FieldAccessor, StreamField, TypeDescriptor};
pub use version::{compute_array_version_tag, compute_version_tag, structural_hash};
