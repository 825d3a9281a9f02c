//! Attribute catalog: decoded variable metadata, loading, and filtering.
//!
//! ```text
//!  .csv / .parquet / .json
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse file → Catalog
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ Catalog   │  Vec<CatalogRow>, unique values per column
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  FilterSpec → matching variable codes
//!   └──────────┘
//! ```

pub mod decode;
pub mod filter;
pub mod loader;
pub mod model;
