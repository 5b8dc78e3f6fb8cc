//! Opaque unique task identifiers

use uuid::Uuid;

/// Source of opaque, globally unique task identifiers.
///
/// A trait seam so tests can substitute a deterministic sequence.
pub trait IdGen {
    fn next(&mut self) -> String;
}

/// Production generator backed by random v4 UUIDs
#[derive(Debug, Default)]
pub struct Slugid;

impl IdGen for Slugid {
    fn next(&mut self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}
