//! Entity trait: identity that survives attribute changes.

/// Anything identified by its id rather than by its attribute values.
///
/// Products and warehouses are renamed, repriced or deactivated without
/// becoming a different thing; stock movements never change at all but are
/// still addressed by id.
pub trait Entity {
    /// Strongly-typed identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Two entities are the same entity when their ids match.
    fn same_identity_as(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}
