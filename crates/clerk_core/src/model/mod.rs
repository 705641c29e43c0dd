//! Domain model definitions for catalog keys, collections, items and
//! batch descriptors.

pub mod batch;
pub mod collection;
pub mod item;
pub mod key;
