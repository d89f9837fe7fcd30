//! Fluent construction of a [`crate::Pool`] from scratch.

mod pool_builder;

pub use pool_builder::PoolBuilder;
