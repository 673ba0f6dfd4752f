pub mod buckets;
pub mod entity;
pub mod staleness;
pub mod text;
pub mod vocabulary;

pub use buckets::DomainBuckets;
pub use entity::{
	CatalogEntity, DashboardExploreMapping, EntityKind, Field, FieldKind, ParseVariantError,
	Variant,
};
pub use vocabulary::VocabularyExpander;
