//! Implementations of the storage seams in [`crate::ports`].

pub mod in_memory;
