//! Leadership tracking: the oldest quorum member leads.
//!
//! Election is deterministic: every client observes the same membership
//! stream, ranks members by join sequence (client id as tie-break), and
//! independently arrives at the same leader. The tracker only reports
//! transitions for the local client; the controller consumes them as its
//! promoted/demoted signal.

use std::collections::BTreeSet;

/// A change in the local client's leadership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderChange {
    /// The local client became the oldest quorum member.
    Promoted,
    /// The local client ceased to be the oldest quorum member.
    Demoted,
}

/// Tracks quorum membership and the local client's leadership.
#[derive(Debug)]
pub struct LeaderTracker {
    local_client: String,
    /// Members ranked by (join sequence, client id); the first entry leads.
    members: BTreeSet<(u64, String)>,
    is_leader: bool,
}

impl LeaderTracker {
    /// Creates a tracker for `local_client`, initially not a member.
    pub fn new(local_client: impl Into<String>) -> Self {
        Self { local_client: local_client.into(), members: BTreeSet::new(), is_leader: false }
    }

    /// Records a member joining the quorum at `join_seq`.
    ///
    /// Returns the local client's leadership transition, if any.
    pub fn member_joined(&mut self, join_seq: u64, client: &str) -> Option<LeaderChange> {
        self.members.insert((join_seq, client.to_string()));
        self.recompute()
    }

    /// Records a member leaving the quorum.
    ///
    /// Returns the local client's leadership transition, if any.
    pub fn member_left(&mut self, client: &str) -> Option<LeaderChange> {
        self.members.retain(|(_, id)| id != client);
        self.recompute()
    }

    /// Whether the local client currently leads.
    pub fn is_leader(&self) -> bool {
        self.is_leader
    }

    /// The current leader's client id, if the quorum is non-empty.
    pub fn leader(&self) -> Option<&str> {
        self.members.iter().next().map(|(_, id)| id.as_str())
    }

    fn recompute(&mut self) -> Option<LeaderChange> {
        let leads = self.leader() == Some(self.local_client.as_str());
        if leads == self.is_leader {
            return None;
        }
        self.is_leader = leads;
        if leads {
            tracing::debug!(client = %self.local_client, "promoted to flush leader");
            Some(LeaderChange::Promoted)
        } else {
            tracing::debug!(client = %self.local_client, "demoted from flush leader");
            Some(LeaderChange::Demoted)
        }
    }
}
