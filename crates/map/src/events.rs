//! Map change notifications.

/// An observable change to the map, delivered through a broadcast channel.
///
/// `local` distinguishes a client's own mutations (emitted synchronously at
/// issue time) from remote mutations (emitted when their op is applied).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapEvent {
    /// A key was set or deleted.
    ValueChanged {
        /// The key that changed.
        key: String,
        /// Whether the change originated on this client.
        local: bool,
    },

    /// The map was cleared.
    Cleared {
        /// Whether the clear originated on this client.
        local: bool,
    },

    /// This client started uploading a compacted tree.
    StartFlush,

    /// A flush op was applied and the tree root swapped.
    Flushed {
        /// Whether this client is currently the leader.
        is_leader: bool,
    },
}
