//! On-chain Settlement
//!
//! Interfaces to the staking contract and the player's wallet, plus the
//! report a finished match contributes to settlement. The chain client
//! itself lives outside this crate; implementors plug in behind the traits.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::audit::MatchRecord;
use crate::core::hash::OutcomeDigest;
use crate::game::state::ContestantId;
use crate::network::session::MatchSummary;

/// Base units per whole coin (8 decimals).
pub const BASE_UNITS_PER_COIN: u64 = 100_000_000;

/// Transaction hash returned by the chain.
pub type TxHash = String;

/// Settlement errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettlementError {
    /// Stake amount could not be parsed.
    #[error("invalid stake amount: {0}")]
    InvalidStake(String),

    /// Only the winner may claim.
    #[error("only the winner can claim")]
    NotWinner,

    /// Record has no outcome yet.
    #[error("match has not ended")]
    MatchNotEnded,

    /// Wallet refused or failed to sign.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Transaction rejected or failed on chain.
    #[error("transaction failed: {0}")]
    Transaction(String),
}

/// Game lifecycle on the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    /// Created, waiting for an opponent.
    Waiting,
    /// Both stakes locked.
    Active,
    /// Any later status code.
    Settled(u8),
}

impl From<u8> for GameStatus {
    fn from(code: u8) -> Self {
        match code {
            0 => GameStatus::Waiting,
            1 => GameStatus::Active,
            other => GameStatus::Settled(other),
        }
    }
}

/// Contract view of a game, keyed by creator address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameInfo {
    /// Contract-assigned game number.
    pub game_id: u64,
    /// Creator address.
    pub player1: String,
    /// Joiner address (empty until joined).
    pub player2: String,
    /// Stake per player, in base units.
    pub stake_amount: u64,
    /// Lifecycle status.
    pub status: GameStatus,
    /// Winner address, once decided.
    pub winner: Option<String>,
    /// Reported score of player 1.
    pub player1_score: u32,
    /// Reported score of player 2.
    pub player2_score: u32,
    /// Player 1 has submitted.
    pub player1_submitted: bool,
    /// Player 2 has submitted.
    pub player2_submitted: bool,
}

impl GameInfo {
    /// Open for a second player.
    pub fn is_joinable(&self) -> bool {
        self.status == GameStatus::Waiting
    }

    /// Both players have staked.
    pub fn is_ready(&self) -> bool {
        self.status == GameStatus::Active
    }
}

/// The player's signing wallet.
pub trait WalletProvider: Send + Sync {
    /// Account address.
    fn address(&self) -> &str;

    /// Sign an arbitrary message.
    fn sign_message(
        &self,
        message: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, SettlementError>> + Send;
}

/// The staking contract.
pub trait SettlementContract: Send + Sync {
    /// Open a game with `stake` base units escrowed.
    fn create_game(
        &self,
        stake: u64,
        contract_address: &str,
    ) -> impl Future<Output = Result<TxHash, SettlementError>> + Send;

    /// Join the game opened by `creator`, matching its stake.
    fn join_game(&self, creator: &str) -> impl Future<Output = Result<TxHash, SettlementError>> + Send;

    /// Report this player's result.
    fn submit_result(
        &self,
        creator: &str,
        score: u32,
        won: bool,
    ) -> impl Future<Output = Result<TxHash, SettlementError>> + Send;

    /// Pay out the pot to the winner.
    fn claim_winnings(
        &self,
        creator: &str,
        contract_address: &str,
    ) -> impl Future<Output = Result<TxHash, SettlementError>> + Send;

    /// Read a game; `None` if `creator` has none.
    fn get_game(
        &self,
        creator: &str,
    ) -> impl Future<Output = Result<Option<GameInfo>, SettlementError>> + Send;
}

/// What one participant submits after a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReport {
    /// Outcome digest of the match.
    pub digest: OutcomeDigest,
    /// This participant's score.
    pub score: u32,
    /// This participant won.
    pub won: bool,
}

impl SettlementReport {
    /// Report from a session's final summary.
    pub fn from_summary(summary: &MatchSummary) -> Self {
        Self {
            digest: summary.digest,
            score: summary.score(),
            won: summary.won(),
        }
    }

    /// Report for `contestant` from a finished record.
    pub fn from_record(record: &MatchRecord, contestant: ContestantId) -> Result<Self, SettlementError> {
        let outcome = record.outcome.ok_or(SettlementError::MatchNotEnded)?;
        let score = match contestant {
            ContestantId::One => record.scores.0,
            ContestantId::Two => record.scores.1,
        };
        Ok(Self {
            digest: record.digest,
            score,
            won: outcome.winner() == Some(contestant),
        })
    }

    /// Canonical text signed by the reporting wallet.
    pub fn signing_message(&self, creator: &str) -> String {
        format!("{}|{}|{}|{}", creator, self.score, self.won, self.digest)
    }
}

/// A report with the reporter's signature attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedReport {
    /// The report.
    pub report: SettlementReport,
    /// Signing account.
    pub signer: String,
    /// Hex signature over [`SettlementReport::signing_message`].
    pub signature: String,
}

/// Sign `report` with `wallet` for the game opened by `creator`.
pub async fn sign_report<W: WalletProvider>(
    wallet: &W,
    creator: &str,
    report: &SettlementReport,
) -> Result<SignedReport, SettlementError> {
    let message = report.signing_message(creator);
    let signature = wallet.sign_message(message.as_bytes()).await?;
    Ok(SignedReport {
        report: report.clone(),
        signer: wallet.address().to_string(),
        signature: hex::encode(signature),
    })
}

/// Submit `report` for the game opened by `creator`.
pub async fn submit_report<C: SettlementContract>(
    contract: &C,
    creator: &str,
    report: &SettlementReport,
) -> Result<TxHash, SettlementError> {
    let tx = contract.submit_result(creator, report.score, report.won).await?;
    info!(creator, score = report.score, won = report.won, digest = %report.digest, tx = %tx, "Result submitted");
    Ok(tx)
}

/// Claim the pot. Refused locally unless `report` is a win.
pub async fn claim<C: SettlementContract>(
    contract: &C,
    creator: &str,
    contract_address: &str,
    report: &SettlementReport,
) -> Result<TxHash, SettlementError> {
    if !report.won {
        return Err(SettlementError::NotWinner);
    }
    let tx = contract.claim_winnings(creator, contract_address).await?;
    info!(creator, tx = %tx, "Winnings claimed");
    Ok(tx)
}

/// Parse a decimal coin amount ("1.5") into base units, truncating past 8 decimals.
pub fn parse_stake(amount: &str) -> Result<u64, SettlementError> {
    let invalid = || SettlementError::InvalidStake(amount.to_string());
    let amount = amount.trim();
    let (whole, frac) = amount.split_once('.').unwrap_or((amount, ""));
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
    let mut frac_units = 0u64;
    let mut scale = BASE_UNITS_PER_COIN / 10;
    for digit in frac.bytes().take(8) {
        frac_units += u64::from(digit - b'0') * scale;
        scale /= 10;
    }

    whole
        .checked_mul(BASE_UNITS_PER_COIN)
        .and_then(|units| units.checked_add(frac_units))
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::engine::Engine;
    use crate::game::events::MatchOutcome;
    use crate::game::state::MatchMode;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockContract {
        calls: Mutex<Vec<String>>,
    }

    impl MockContract {
        fn record(&self, call: String) -> Result<TxHash, SettlementError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call);
            Ok(format!("0xtx{}", calls.len()))
        }
    }

    impl SettlementContract for MockContract {
        async fn create_game(&self, stake: u64, contract_address: &str) -> Result<TxHash, SettlementError> {
            self.record(format!("create {stake} {contract_address}"))
        }

        async fn join_game(&self, creator: &str) -> Result<TxHash, SettlementError> {
            self.record(format!("join {creator}"))
        }

        async fn submit_result(&self, creator: &str, score: u32, won: bool) -> Result<TxHash, SettlementError> {
            self.record(format!("submit {creator} {score} {won}"))
        }

        async fn claim_winnings(&self, creator: &str, contract_address: &str) -> Result<TxHash, SettlementError> {
            self.record(format!("claim {creator} {contract_address}"))
        }

        async fn get_game(&self, creator: &str) -> Result<Option<GameInfo>, SettlementError> {
            Ok((creator == "0xhost").then(|| GameInfo {
                game_id: 7,
                player1: "0xhost".into(),
                player2: String::new(),
                stake_amount: BASE_UNITS_PER_COIN,
                status: GameStatus::from(0),
                winner: None,
                player1_score: 0,
                player2_score: 0,
                player1_submitted: false,
                player2_submitted: false,
            }))
        }
    }

    struct MockWallet;

    impl WalletProvider for MockWallet {
        fn address(&self) -> &str {
            "0xguest"
        }

        async fn sign_message(&self, message: &[u8]) -> Result<Vec<u8>, SettlementError> {
            if message.is_empty() {
                return Err(SettlementError::Signing("empty message".into()));
            }
            Ok(message.iter().rev().take(4).copied().collect())
        }
    }

    fn summary(contestant: ContestantId, outcome: MatchOutcome) -> MatchSummary {
        MatchSummary {
            contestant,
            outcome,
            scores: (4, 2),
            digest: OutcomeDigest([3u8; 32]),
        }
    }

    #[test]
    fn test_parse_stake() {
        assert_eq!(parse_stake("1").unwrap(), 100_000_000);
        assert_eq!(parse_stake("0.5").unwrap(), 50_000_000);
        assert_eq!(parse_stake(".25").unwrap(), 25_000_000);
        assert_eq!(parse_stake("2.123456789").unwrap(), 212_345_678);
        assert!(parse_stake("").is_err());
        assert!(parse_stake(".").is_err());
        assert!(parse_stake("-1").is_err());
        assert!(parse_stake("1e3").is_err());
        assert!(parse_stake("999999999999999").is_err());
    }

    #[test]
    fn test_report_from_summary() {
        let report = SettlementReport::from_summary(&summary(ContestantId::Two, MatchOutcome::Won(ContestantId::One)));
        assert_eq!(report.score, 2);
        assert!(!report.won);

        let report = SettlementReport::from_summary(&summary(ContestantId::One, MatchOutcome::Won(ContestantId::One)));
        assert_eq!(report.score, 4);
        assert!(report.won);
    }

    #[test]
    fn test_report_from_record() {
        let engine = Engine::new("0xhost", MatchMode::Duel, 0);
        let running = MatchRecord::from_engine(&engine, 1);
        assert_eq!(
            SettlementReport::from_record(&running, ContestantId::One),
            Err(SettlementError::MatchNotEnded)
        );

        let mut engine = engine;
        engine.advance(crate::MATCH_DURATION_MS);
        let record = MatchRecord::from_engine(&engine, crate::MATCH_DURATION_MS);
        let report = SettlementReport::from_record(&record, ContestantId::Two).unwrap();
        assert_eq!(report.digest, engine.outcome_digest());
        assert!(!report.won);
    }

    #[tokio::test]
    async fn test_submit_and_claim() {
        let contract = MockContract::default();
        let lost = SettlementReport::from_summary(&summary(ContestantId::Two, MatchOutcome::Won(ContestantId::One)));
        let won = SettlementReport::from_summary(&summary(ContestantId::One, MatchOutcome::Won(ContestantId::One)));

        assert_eq!(submit_report(&contract, "0xhost", &lost).await.unwrap(), "0xtx1");
        assert_eq!(claim(&contract, "0xhost", "0xcontract", &lost).await, Err(SettlementError::NotWinner));
        assert_eq!(claim(&contract, "0xhost", "0xcontract", &won).await.unwrap(), "0xtx2");

        let calls = contract.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["submit 0xhost 2 false", "claim 0xhost 0xcontract"]);
    }

    #[tokio::test]
    async fn test_sign_report() {
        let report = SettlementReport::from_summary(&summary(ContestantId::Two, MatchOutcome::Draw));
        let message = report.signing_message("0xhost");
        assert!(message.starts_with("0xhost|2|false|0303"));

        let signed = sign_report(&MockWallet, "0xhost", &report).await.unwrap();
        assert_eq!(signed.signer, "0xguest");
        assert_eq!(signed.report, report);
        // Mock signature: the last four message bytes ("0303") reversed.
        assert_eq!(signed.signature, "33303330");
    }

    #[tokio::test]
    async fn test_lobby_flow() {
        let contract = MockContract::default();
        contract.create_game(parse_stake("1").unwrap(), "0xcontract").await.unwrap();

        let game = contract.get_game("0xhost").await.unwrap().unwrap();
        assert!(game.is_joinable());
        assert!(!game.is_ready());
        assert_eq!(contract.get_game("0xnobody").await.unwrap(), None);

        contract.join_game("0xhost").await.unwrap();
        assert_eq!(GameStatus::from(1), GameStatus::Active);
        assert_eq!(GameStatus::from(2), GameStatus::Settled(2));
    }
}
