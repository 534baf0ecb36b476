//! Conviction staking: escrowed bets on a poll's outcome.
//!
//! Stakes are taken while a poll is open and settled once it resolves.
//! Winners get their stake back plus a pro-rata share of the losing pool
//! after the protocol fee; the fee and rounding dust are burned. A poll that
//! ends without quorum, is withdrawn, or has no winning side refunds
//! everyone in full.
//!
//! Every token movement carries a reference derived from the position, and
//! the token economy treats a repeated reference as a no-op. Settlement may
//! therefore be retried or run by several sweepers at once; each position's
//! status changes exactly once through its own guarded commit.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use dyad_store::{Table, WriteBatch};
use dyad_types::{IdentityMode, PollId, StakeId, Timestamp, TokenAmount, UserId};

use crate::codec::{self, keys, Versioned};
use crate::engine::GovernanceEngine;
use crate::error::GovernanceError;
use crate::poll::{Outcome, Poll, PollStatus};
use crate::spans;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakeStatus {
    Active,
    Won,
    Lost,
    Refunded,
}

impl fmt::Display for StakeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StakeStatus::Active => "active",
            StakeStatus::Won => "won",
            StakeStatus::Lost => "lost",
            StakeStatus::Refunded => "refunded",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakePosition {
    pub id: StakeId,
    pub poll_id: PollId,
    pub user: UserId,
    pub mode: IdentityMode,
    /// `Passed` or `Failed`.
    pub predicted: Outcome,
    pub amount: TokenAmount,
    pub status: StakeStatus,
    /// Released on settlement: stake plus winnings, the full stake on
    /// refund, zero on loss.
    pub payout: TokenAmount,
    pub created_at: Timestamp,
    pub settled_at: Option<Timestamp>,
}

impl StakePosition {
    fn reference(&self) -> String {
        format!("stake-{}-{}", self.poll_id.as_u64(), self.id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StakeRequest {
    pub poll_id: PollId,
    pub user: UserId,
    pub mode: IdentityMode,
    pub predicted: Outcome,
    pub amount: TokenAmount,
}

/// Result of settling one poll's stakes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Settlement {
    pub won: usize,
    pub lost: usize,
    pub refunded: usize,
    pub burned: TokenAmount,
}

/// How a poll's pool is split. Pure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct PoolSplit {
    pub winners_total: u128,
    pub distributable: u128,
    pub burned: u128,
}

pub(crate) fn split_pool(positions: &[StakePosition], outcome: Outcome, fee_bps: u32) -> PoolSplit {
    let (winners_total, losers_total) = positions.iter().fold((0u128, 0u128), |(w, l), p| {
        if p.predicted == outcome {
            (w + p.amount.raw(), l)
        } else {
            (w, l + p.amount.raw())
        }
    });
    let fee = TokenAmount::new(losers_total).portion_bps(fee_bps).raw();
    let distributable = losers_total - fee;
    let paid: u128 = positions
        .iter()
        .filter(|p| p.predicted == outcome)
        .map(|p| winnings(p.amount.raw(), distributable, winners_total))
        .sum();
    PoolSplit {
        winners_total,
        distributable,
        burned: fee + (distributable - paid),
    }
}

fn winnings(amount: u128, distributable: u128, winners_total: u128) -> u128 {
    if winners_total == 0 {
        return 0;
    }
    // Split as quotient and remainder so the intermediate product stays small.
    let whole = distributable / winners_total * amount;
    let rest = distributable % winners_total * amount / winners_total;
    whole + rest
}

impl GovernanceEngine {
    pub fn stake(&self, request: StakeRequest) -> Result<StakePosition, GovernanceError> {
        let _span = spans::stake_span(request.poll_id).entered();
        request.user.validate()?;
        let params = self.effective_params()?;
        if request.predicted == Outcome::NoQuorum {
            return Err(GovernanceError::InvalidInput("stakes predict PASSED or FAILED".into()));
        }
        if request.amount.is_zero() || request.amount.raw() < params.min_stake as u128 {
            return Err(GovernanceError::InvalidInput(format!(
                "stake must be at least {} raw units",
                params.min_stake.max(1)
            )));
        }
        self.require_verified(&request.user, request.mode)?;

        let now = self.now();
        let poll = self.load_poll(request.poll_id)?.value;
        if poll.status != PollStatus::Open {
            return Err(GovernanceError::PollNotOpen(poll.status));
        }
        if now >= poll.closes_at {
            return Err(GovernanceError::VotingClosed);
        }

        let id = self.store.next_sequence("stakes")?;
        let position = StakePosition {
            id,
            poll_id: request.poll_id,
            user: request.user,
            mode: request.mode,
            predicted: request.predicted,
            amount: request.amount,
            status: StakeStatus::Active,
            payout: TokenAmount::ZERO,
            created_at: now,
            settled_at: None,
        };
        let reference = position.reference();
        self.tokens.escrow(&position.user, position.amount, &reference)?;

        let key = keys::poll_id_pair(position.poll_id, id);
        let recorded = codec::encode(&position).and_then(|bytes| {
            let mut batch = WriteBatch::new();
            batch
                .expect_value(Table::Meta, &keys::open_gate(position.poll_id), b"open")
                .expect_absent(Table::Stakes, &key)
                .put(Table::Stakes, &key, &bytes);
            Ok(self.store.commit(&batch)?.is_committed())
        });

        match recorded {
            Ok(true) => {
                info!(poll = %position.poll_id, stake = id, amount = %position.amount, "stake escrowed");
                Ok(position)
            }
            failed => {
                if let Err(e) = self
                    .tokens
                    .release(&position.user, position.amount, &format!("{reference}-unwind"))
                {
                    warn!(stake = id, error = %e, "could not return escrow of unrecorded stake");
                }
                match failed {
                    Err(e) => Err(e),
                    _ => Err(GovernanceError::PollNotOpen(self.load_poll(position.poll_id)?.value.status)),
                }
            }
        }
    }

    pub fn stakes_for(&self, poll_id: PollId) -> Result<Vec<StakePosition>, GovernanceError> {
        Ok(self
            .load_stakes(poll_id)?
            .into_iter()
            .map(|v| v.value)
            .collect())
    }

    fn load_stakes(&self, poll_id: PollId) -> Result<Vec<Versioned<StakePosition>>, GovernanceError> {
        codec::load_all(self.store.as_ref(), Table::Stakes, &keys::poll(poll_id))
    }

    /// Settle or refund every active stake of a finished poll.
    ///
    /// Does nothing for polls still open or closed but unresolved, and for
    /// polls already marked settled.
    pub fn settle_stakes(&self, poll_id: PollId) -> Result<Settlement, GovernanceError> {
        let _span = spans::stake_span(poll_id).entered();
        let poll = self.load_poll(poll_id)?.value;
        if poll.stakes_settled {
            return Ok(Settlement::default());
        }
        let decisive = match (poll.status, poll.outcome) {
            (PollStatus::Resolved | PollStatus::RolledBack, Some(o @ (Outcome::Passed | Outcome::Failed))) => Some(o),
            (PollStatus::Resolved | PollStatus::RolledBack, _) | (PollStatus::Withdrawn, _) => None,
            _ => return Ok(Settlement::default()),
        };

        let params = self.effective_params()?;
        let positions = self.load_stakes(poll_id)?;
        let all: Vec<StakePosition> = positions.iter().map(|v| v.value.clone()).collect();
        let split = decisive.map(|o| (o, split_pool(&all, o, params.stake_fee_bps)));
        // A decisive poll nobody predicted correctly refunds like no quorum.
        let split = split.filter(|(_, s)| s.winners_total > 0);

        let mut settlement = Settlement::default();
        for position in positions {
            if position.value.status != StakeStatus::Active {
                continue;
            }
            let p = &position.value;
            let (status, payout) = match &split {
                Some((outcome, s)) if p.predicted == *outcome => (
                    StakeStatus::Won,
                    p.amount.raw() + winnings(p.amount.raw(), s.distributable, s.winners_total),
                ),
                Some(_) => (StakeStatus::Lost, 0),
                None => (StakeStatus::Refunded, p.amount.raw()),
            };
            if payout > 0 {
                self.tokens
                    .release(&p.user, TokenAmount::new(payout), &format!("{}-{}", p.reference(), status))?;
            }
            if self.finish_position(&position, status, TokenAmount::new(payout))? {
                match status {
                    StakeStatus::Won => settlement.won += 1,
                    StakeStatus::Lost => settlement.lost += 1,
                    _ => settlement.refunded += 1,
                }
            }
        }

        if let Some((_, s)) = &split {
            if s.burned > 0 {
                self.tokens
                    .burn(TokenAmount::new(s.burned), &format!("stake-{}-fee", poll_id.as_u64()))?;
                settlement.burned = TokenAmount::new(s.burned);
            }
        }
        self.mark_stakes_settled(poll_id)?;

        if settlement != Settlement::default() {
            info!(
                poll = %poll_id,
                won = settlement.won,
                lost = settlement.lost,
                refunded = settlement.refunded,
                burned = %settlement.burned,
                "stakes settled"
            );
        }
        Ok(settlement)
    }

    /// Active → final status. `false` if another settler got there first.
    fn finish_position(
        &self,
        position: &Versioned<StakePosition>,
        status: StakeStatus,
        payout: TokenAmount,
    ) -> Result<bool, GovernanceError> {
        let mut finished = position.value.clone();
        finished.status = status;
        finished.payout = payout;
        finished.settled_at = Some(self.now());
        let key = keys::poll_id_pair(finished.poll_id, finished.id);
        let mut batch = WriteBatch::new();
        batch
            .expect_value(Table::Stakes, &key, &position.raw)
            .put(Table::Stakes, &key, &codec::encode(&finished)?);
        Ok(self.store.commit(&batch)?.is_committed())
    }

    fn mark_stakes_settled(&self, poll_id: PollId) -> Result<(), GovernanceError> {
        self.retry_commit("mark stakes settled", || {
            let current = self.load_poll(poll_id)?;
            if current.value.stakes_settled {
                return Ok(Some(()));
            }
            let updated = Poll {
                stakes_settled: true,
                ..current.value.clone()
            };
            let key = keys::poll(poll_id);
            let mut batch = WriteBatch::new();
            batch
                .expect_value(Table::Polls, &key, &current.raw)
                .put(Table::Polls, &key, &codec::encode(&updated)?);
            Ok(self.store.commit(&batch)?.is_committed().then_some(()))
        })
    }
}
