//! Logical tables.

use std::fmt;

/// A logical table. Each backend maps a table onto its own keyspace
/// (one named LMDB database, one in-memory map).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    /// Schema version and sequence counters.
    Meta,
    /// Poll records by poll id.
    Polls,
    /// Live ballot per (poll, mode, voter).
    Ballots,
    /// Section draw per (poll, mode, voter), written once.
    Draws,
    /// Delegation edges by id.
    Delegations,
    /// Active outgoing delegation per (mode, delegator).
    DelegationOutgoing,
    /// Active incoming delegations per (mode, delegate, delegator).
    DelegationIncoming,
    /// Delegation role per (mode, user): delegator or receiver.
    DelegationRoles,
    /// Which delegate ballot carries a delegator on a poll.
    Carried,
    /// Stake positions by (poll, stake id).
    Stakes,
    /// Rollback actions by poll id.
    Rollbacks,
    /// Petition signatures per (poll, signer).
    Signatures,
    /// Shadow consensus snapshots by poll id.
    Snapshots,
    /// Constitutional document.
    Constitution,
    /// Parameter whitelist entries by name.
    Whitelist,
    /// Founder rollback authority row.
    Authority,
}

impl Table {
    pub const ALL: [Table; 16] = [
        Table::Meta,
        Table::Polls,
        Table::Ballots,
        Table::Draws,
        Table::Delegations,
        Table::DelegationOutgoing,
        Table::DelegationIncoming,
        Table::DelegationRoles,
        Table::Carried,
        Table::Stakes,
        Table::Rollbacks,
        Table::Signatures,
        Table::Snapshots,
        Table::Constitution,
        Table::Whitelist,
        Table::Authority,
    ];

    /// Stable name, used as the LMDB database name.
    pub fn name(&self) -> &'static str {
        match self {
            Table::Meta => "meta",
            Table::Polls => "polls",
            Table::Ballots => "ballots",
            Table::Draws => "draws",
            Table::Delegations => "delegations",
            Table::DelegationOutgoing => "delegation_outgoing",
            Table::DelegationIncoming => "delegation_incoming",
            Table::DelegationRoles => "delegation_roles",
            Table::Carried => "carried",
            Table::Stakes => "stakes",
            Table::Rollbacks => "rollbacks",
            Table::Signatures => "signatures",
            Table::Snapshots => "snapshots",
            Table::Constitution => "constitution",
            Table::Whitelist => "whitelist",
            Table::Authority => "authority",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
