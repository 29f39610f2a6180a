//! HTTP handler modules for illume-api.

pub mod generation;
pub mod notes;
pub mod objects;
