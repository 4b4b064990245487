//! Store abstraction shared by the bookstore runner and its backends.
//!
//! This crate provides:
//!
//! - **Document traits** ([`document`]) - Defining and serializing stored records
//! - **Store backend abstraction** ([`backend`]) - The trait every backend implements
//! - **Query and filtering API** ([`query`]) - Filters, projections, sorting, offset/limit
//! - **Aggregation pipelines** ([`pipeline`]) - Group, sort, limit and project stages
//! - **Index specifications** ([`index`]) - Single-field and compound indexes
//! - **Collections interface** ([`collection`]) - Typed and untyped collection handles
//! - **Document store** ([`store`]) - Owner of one backend connection
//! - **Pagination** ([`page`]) - Page parameters and page results
//! - **Error handling** ([`error`]) - Error and result types

#[allow(unused_extern_crates)]
extern crate self as bookstore_core;

pub mod backend;
pub mod collection;
pub mod document;
pub mod error;
pub mod index;
pub mod page;
pub mod pipeline;
pub mod query;
pub mod store;
