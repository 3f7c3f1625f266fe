use crate::{connection::ScopeId, signal::SignalId};

/// The narrow, signature-independent face a signal shows to the scopes managing its entries.
///
/// A [`ScopedConnection`](crate::ScopedConnection) holds these as weak handles so that one scope
/// can manage entries on signals of different signatures.
pub(crate) trait ScopedSignal {
    fn signal_id(&self) -> SignalId;

    /// Remove every entry managed by `scope` without notifying it
    fn disconnect_scope(&self, scope: ScopeId);

    /// Leave every entry managed by `scope` connected, but unmanaged
    fn release_scope(&self, scope: ScopeId);
}
