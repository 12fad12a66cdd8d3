//! Helper tables exposed to recipe scripts.

pub mod path;
