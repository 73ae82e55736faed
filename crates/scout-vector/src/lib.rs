//! # scout-vector
//!
//! Exact in-memory similarity index used by the ee-scout knowledge store to
//! answer nearest-neighbour queries over entity embeddings.
//!
//! ## Quick Start
//!
//! ```rust
//! use scout_vector::{DistanceMetric, FlatIndex};
//!
//! let index = FlatIndex::new(DistanceMetric::Cosine);
//! index.upsert("component:TPS54620", vec![0.9, 0.1, 0.0]).unwrap();
//! index.upsert("component:IPD90N04", vec![0.1, 0.9, 0.0]).unwrap();
//!
//! let hits = index.search(&[1.0, 0.0, 0.0], 1).unwrap();
//! assert_eq!(hits[0].id, "component:TPS54620");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod distance;
pub mod error;
pub mod index;

// Re-exports for convenience
pub use distance::DistanceMetric;
pub use error::{Error, Result};
pub use index::{FlatIndex, SearchResult};
