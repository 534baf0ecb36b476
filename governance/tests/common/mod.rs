//! Shared fixture: an engine wired to deterministic in-memory doubles.

#![allow(dead_code)]

use std::sync::Arc;

use dyad_governance::{
    seed_genesis, BallotRequest, BallotView, Choice, Collaborators, CreatePoll, GovernanceEngine, ParameterChange,
    Poll, PollKind,
};
use dyad_nullables::{NullClock, NullEntropy, NullIdentity, NullStore, NullTokens};
use dyad_types::{GovernanceParams, IdentityMode, ParamValue, PollId, QuorumConfig, Timestamp, UserId};

pub const START: u64 = 1_700_000_000;

pub struct Harness {
    pub engine: GovernanceEngine,
    pub store: Arc<NullStore>,
    pub clock: Arc<NullClock>,
    pub identity: Arc<NullIdentity>,
    pub tokens: Arc<NullTokens>,
    pub entropy: Arc<NullEntropy>,
}

/// Small-community parameters: fixed 1.0 multiplier, quorum of one vote,
/// a founder with three tokens.
pub fn test_params() -> GovernanceParams {
    GovernanceParams {
        multiplier_min_bps: 10_000,
        multiplier_max_bps: 10_000,
        general_quorum: QuorumConfig::absolute(1),
        min_proposer_reputation: 5,
        founder: Some(UserId::new("founder")),
        founder_token_allowance: 3,
        petition_signature_threshold: 3,
        ..GovernanceParams::defaults()
    }
}

impl Harness {
    /// Seeded store with [`test_params`].
    pub fn new() -> Self {
        Self::with_params(test_params())
    }

    pub fn with_params(params: GovernanceParams) -> Self {
        let h = Self::unseeded(params);
        seed_genesis(h.store.as_ref(), h.engine.base_params(), h.clock_now()).unwrap();
        h
    }

    /// No constitution or whitelist rows: base parameters apply unmodified.
    pub fn unseeded(params: GovernanceParams) -> Self {
        let store = Arc::new(NullStore::new());
        let clock = Arc::new(NullClock::new(START));
        let identity = Arc::new(NullIdentity::new());
        let tokens = Arc::new(NullTokens::new());
        let entropy = Arc::new(NullEntropy::new(vec![0x5a, 0x13, 0xc7, 0x01, 0x99, 0x42, 0x08, 0xee]));
        let engine = GovernanceEngine::new(
            store.clone(),
            params,
            Collaborators {
                clock: clock.clone(),
                identity: identity.clone(),
                tokens: tokens.clone(),
                entropy: entropy.clone(),
            },
        );
        Self {
            engine,
            store,
            clock,
            identity,
            tokens,
            entropy,
        }
    }

    /// A second engine over the same store and doubles.
    pub fn sibling(&self, params: GovernanceParams) -> GovernanceEngine {
        GovernanceEngine::new(
            self.store.clone(),
            params,
            Collaborators {
                clock: self.clock.clone(),
                identity: self.identity.clone(),
                tokens: self.tokens.clone(),
                entropy: self.entropy.clone(),
            },
        )
    }

    pub fn clock_now(&self) -> Timestamp {
        use dyad_external::Clock;
        self.clock.now()
    }

    pub fn user(&self, name: &str) -> UserId {
        let user = UserId::new(name);
        self.identity.verify(&user, 10);
        user
    }

    pub fn users(&self, prefix: &str, n: usize) -> Vec<UserId> {
        (0..n).map(|i| self.user(&format!("{prefix}{i}"))).collect()
    }

    pub fn general_poll(&self) -> Poll {
        let creator = self.user("creator");
        self.engine
            .create_poll(CreatePoll {
                kind: PollKind::General,
                title: "Adopt the community charter".into(),
                description: String::new(),
                creator,
            })
            .unwrap()
    }

    pub fn parameter_poll(&self, parameter: &str, value: ParamValue) -> Poll {
        let creator = self.user("creator");
        self.engine
            .create_poll(CreatePoll {
                kind: PollKind::ParameterVote(ParameterChange::new(parameter, value)),
                title: format!("Change {parameter}"),
                description: String::new(),
                creator,
            })
            .unwrap()
    }

    pub fn vote(&self, poll: PollId, voter: &UserId, mode: IdentityMode, choice: Choice) -> BallotView {
        self.engine
            .cast_vote(BallotRequest::new(poll, voter.clone(), mode, choice))
            .unwrap()
    }

    /// Move past the poll's close and sweep it to resolution.
    pub fn finish(&self, poll: &Poll) -> Poll {
        self.clock.set(poll.closes_at.as_secs());
        self.engine.run_sweeps().unwrap();
        self.engine.get_poll(poll.id).unwrap()
    }

    /// A parameter poll that passed and enacted `parameter = value`.
    pub fn enacted(&self, parameter: &str, value: ParamValue) -> Poll {
        let poll = self.parameter_poll(parameter, value);
        let voter = self.user("enactor");
        self.vote(poll.id, &voter, IdentityMode::TrueSelf, Choice::Yes);
        self.finish(&poll)
    }
}
