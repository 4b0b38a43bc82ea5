//! Core data structures for exact vector search.
//!
//! This module contains the vector representation and the metric library
//! used to score candidates against a query.

pub mod distance;
pub mod vector;
