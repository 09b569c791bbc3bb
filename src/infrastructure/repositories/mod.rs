pub mod catalog_repository;
pub mod metadata_repository;

pub use catalog_repository::CatalogRepository;
pub use metadata_repository::{MetadataRepository, METADATA_TABLE};
