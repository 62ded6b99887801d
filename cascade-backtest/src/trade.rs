//! Trade records, P&L math, and aggregate summaries

use crate::timeframe::Timeframe;
use cascade_core::{Category, Follower, RelationshipType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Entry prices are floored here before division.
const ENTRY_FLOOR: f64 = 0.001;

/// Why a follower did or did not produce a usable trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Ok,
    NoClobId,
    NoData,
    NoEntryPrice,
    NoExitPrice,
}

/// Position direction implied by the relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Short,
}

impl Direction {
    pub fn from_same_outcome(is_same_outcome: bool) -> Self {
        if is_same_outcome {
            Direction::Buy
        } else {
            Direction::Short
        }
    }
}

/// One simulated trade on a follower market.
///
/// Threshold mode fills `exit_price`/`pnl_pct`; resolution-shock mode fills
/// the per-horizon `pnl` map instead. Trades exist only inside a run's result
/// payload and are never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestTrade {
    pub market_id: String,
    pub name: String,
    pub category: Category,
    pub volume: f64,
    pub clob_token_id: String,
    pub confidence_score: f64,
    pub is_same_outcome: bool,
    pub relationship_type: RelationshipType,
    pub rationale: String,

    pub status: TradeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    pub entry_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pnl: BTreeMap<Timeframe, Option<f64>>,
}

impl BacktestTrade {
    /// A trade that never got off the ground, tagged with the reason.
    pub fn skipped(follower: &Follower, status: TradeStatus) -> Self {
        Self {
            market_id: follower.market.id.clone(),
            name: follower.market.name.clone(),
            category: follower.market.category,
            volume: follower.market.volume,
            clob_token_id: follower.market.clob_token_id.clone(),
            confidence_score: follower.confidence_score,
            is_same_outcome: follower.is_same_outcome,
            relationship_type: follower.relationship_type,
            rationale: follower.rationale.clone(),
            status,
            direction: None,
            entry_price: None,
            exit_price: None,
            pnl_pct: None,
            pnl: BTreeMap::new(),
        }
    }

    /// A live trade with its entry locked in; P&L fields are filled by the
    /// engine afterwards.
    pub fn entered(follower: &Follower, entry_price: f64) -> Self {
        let mut trade = Self::skipped(follower, TradeStatus::Ok);
        trade.direction = Some(Direction::from_same_outcome(follower.is_same_outcome));
        trade.entry_price = Some(round4(entry_price));
        trade
    }
}

/// Percentage P&L for a position opened at `entry` and closed at `exit`.
///
/// Same-outcome relationships are long the YES probability; opposite-outcome
/// ones hold the complement (a short on YES). Entries at or below the floor
/// yield 0 rather than a division blow-up.
pub fn pnl_percent(entry: f64, exit: f64, is_same_outcome: bool) -> f64 {
    if is_same_outcome {
        if entry > ENTRY_FLOOR {
            (exit - entry) / entry * 100.0
        } else {
            0.0
        }
    } else {
        let entry_no = 1.0 - entry;
        let exit_no = 1.0 - exit;
        if entry_no > ENTRY_FLOOR {
            (exit_no - entry_no) / entry_no * 100.0
        } else {
            0.0
        }
    }
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Aggregate statistics over the P&L values of `ok` trades.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PnlStats {
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub avg_pnl: f64,
    pub best_pnl: f64,
    pub worst_pnl: f64,
}

fn pnl_stats(pnls: &[f64]) -> Option<PnlStats> {
    if pnls.is_empty() {
        return None;
    }

    let wins = pnls.iter().filter(|p| **p > 0.0).count();
    let avg = pnls.iter().sum::<f64>() / pnls.len() as f64;
    let best = pnls.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let worst = pnls.iter().cloned().fold(f64::INFINITY, f64::min);

    Some(PnlStats {
        trades: pnls.len(),
        wins,
        losses: pnls.len() - wins,
        avg_pnl: round2(avg),
        best_pnl: round2(best),
        worst_pnl: round2(worst),
    })
}

/// Run-level summary. Only `ok` trades contribute to the statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub total_trades: usize,
    pub skipped_trades: usize,
    /// Threshold mode: statistics over the single scalar P&L
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall: Option<PnlStats>,
    /// Resolution-shock mode: statistics per horizon (None where no trade
    /// resolved an exit at that horizon)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub by_timeframe: BTreeMap<Timeframe, Option<PnlStats>>,
}

pub fn summarize_threshold(trades: &[BacktestTrade]) -> BacktestSummary {
    let ok: Vec<&BacktestTrade> = trades.iter().filter(|t| t.status == TradeStatus::Ok).collect();
    let pnls: Vec<f64> = ok.iter().filter_map(|t| t.pnl_pct).collect();

    BacktestSummary {
        total_trades: ok.len(),
        skipped_trades: trades.len() - ok.len(),
        overall: pnl_stats(&pnls),
        by_timeframe: BTreeMap::new(),
    }
}

pub fn summarize_resolution(trades: &[BacktestTrade]) -> BacktestSummary {
    let ok: Vec<&BacktestTrade> = trades.iter().filter(|t| t.status == TradeStatus::Ok).collect();

    let by_timeframe = Timeframe::ALL
        .iter()
        .map(|tf| {
            let pnls: Vec<f64> = ok
                .iter()
                .filter_map(|t| t.pnl.get(tf).copied().flatten())
                .collect();
            (*tf, pnl_stats(&pnls))
        })
        .collect();

    BacktestSummary {
        total_trades: ok.len(),
        skipped_trades: trades.len() - ok.len(),
        overall: None,
        by_timeframe,
    }
}
