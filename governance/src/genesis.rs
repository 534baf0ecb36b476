//! One-time seeding of read-mostly configuration: the constitution, the
//! parameter whitelist and the founder's rollback allowance.
//!
//! Every row is written insert-if-absent, so seeding an already seeded store
//! changes nothing and reports zero.

use tracing::info;

use dyad_consti::ConstiDocument;
use dyad_store::{GovernanceStore, Table, WriteBatch};
use dyad_types::{GovernanceParams, Timestamp};

use crate::codec::{self, keys};
use crate::error::GovernanceError;
use crate::rollback::FounderAuthority;
use crate::whitelist::default_whitelist;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub constitution: bool,
    pub whitelist_entries: usize,
    pub founder_authority: bool,
}

fn insert_if_absent(store: &dyn GovernanceStore, table: Table, key: &[u8], value: &[u8]) -> Result<bool, GovernanceError> {
    let mut batch = WriteBatch::new();
    batch.expect_absent(table, key).put(table, key, value);
    Ok(store.commit(&batch)?.is_committed())
}

pub fn seed_genesis(
    store: &dyn GovernanceStore,
    params: &GovernanceParams,
    now: Timestamp,
) -> Result<SeedReport, GovernanceError> {
    let mut report = SeedReport {
        constitution: insert_if_absent(
            store,
            Table::Constitution,
            keys::CONSTITUTION,
            &codec::encode(&ConstiDocument::genesis())?,
        )?,
        ..SeedReport::default()
    };

    for entry in default_whitelist(params, now) {
        if insert_if_absent(store, Table::Whitelist, entry.name.as_bytes(), &codec::encode(&entry)?)? {
            report.whitelist_entries += 1;
        }
    }

    if let Some(founder) = &params.founder {
        let authority = FounderAuthority {
            founder: founder.clone(),
            remaining: params.founder_token_allowance,
            version: 0,
            expires_at: now.plus_secs(params.founder_transition_secs),
        };
        report.founder_authority = insert_if_absent(store, Table::Authority, keys::FOUNDER, &codec::encode(&authority)?)?;
    }

    info!(
        constitution = report.constitution,
        whitelist = report.whitelist_entries,
        founder = report.founder_authority,
        "genesis seeded"
    );
    Ok(report)
}
