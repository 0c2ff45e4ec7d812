//! Metadata normalization
//!
//! Rebuilds, from the newer dialect's schema description, the relationship
//! information the client's object model requires.
//!
//! # Architecture
//!
//! - `model.rs` - schema description types
//! - `key_shape.rs` - dual key representation expected by the store
//! - `associations.rs` - association accumulator keyed by unordered type pair
//! - `normalizer.rs` - merge, key consolidation and association synthesis
//! - `store.rs` - metadata store seam

mod associations;
mod key_shape;
mod model;
mod normalizer;
mod store;

pub use key_shape::{EntityKeyRef, KeyShape, PropertyRef};
pub use model::{
    AssociationDescriptor, AssociationEnd, ConstraintRole, CsdlMetadata, DataServices,
    EntityContainer, EntitySet, EntityTypeDescriptor, Multiplicity, NavigationPropertyDescriptor,
    ReferentialConstraint, SchemaSegment,
};
pub use normalizer::MetadataNormalizer;
pub use store::{InMemoryMetadataStore, MetadataStore};
