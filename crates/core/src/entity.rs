//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// This is the compile-time capability contract the storage layer programs
/// against: anything with a strongly-typed identifier can be kept in a typed
/// store. There is no runtime probing of objects for persistence support.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
