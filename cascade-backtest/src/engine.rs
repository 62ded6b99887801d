//! Streaming backtest runs
//!
//! Both modes follow the same shape: establish a signal time on the leader,
//! acquire followers (provided by the caller or discovered via the two-pass
//! LLM pipeline), fetch each follower's price history, locate entry and exit
//! prices, and aggregate P&L. Progress is streamed as typed events; dropping
//! the stream cancels the run.

use crate::pricing::{
    find_nearest_price, find_threshold_signal, format_timestamp, parse_end_date, ThresholdSignal,
};
use crate::timeframe::{HoldPeriod, Timeframe};
use crate::trade::{
    pnl_percent, round2, round4, summarize_resolution, summarize_threshold, BacktestTrade,
    Direction, TradeStatus,
};
use cascade_core::{
    Category, Follower, Market, PricePoint, PriceHistoryProvider, ProgressEvent,
};
use cascade_discovery::{
    active_categories, discover_relationships, prefilter_categories, reconcile_relationships,
    Cancelled, Emitter, BATCH_SIZE,
};
use cascade_llm::OpenAiClient;
use futures::Stream;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

/// Open markets outside this probability band are effectively resolved and
/// make poor backtest candidates.
const MIN_CANDIDATE_PROB: f64 = 0.05;
const MAX_CANDIDATE_PROB: f64 = 0.95;

/// Tunables for a backtest run.
#[derive(Debug, Clone)]
pub struct BacktestConfig {
    /// Candidate volume floor in USD when discovery runs inside the backtest
    pub min_volume: f64,

    /// Courtesy delay between consecutive follower history fetches
    pub fetch_delay_ms: u64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            min_volume: 10_000.0,
            fetch_delay_ms: 150,
        }
    }
}

/// Where the follower set comes from.
pub enum FollowerSource {
    /// Use a follower list the caller already has (e.g. a prior discovery run)
    Provided(Vec<Follower>),
    /// Run the two-pass discovery pipeline over the candidate pool
    Discover,
}

/// Parameters for a threshold-mode run.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdParams {
    /// Probability the leader must reach to fire the signal
    pub threshold: f64,
    /// Holding period after the signal
    pub hold: HoldPeriod,
}

/// Run a resolution-shock backtest: the signal is the leader's parsed
/// resolution date and P&L is measured at the four fixed horizons.
pub fn run_resolution_shock(
    leader: Market,
    pool: Vec<Market>,
    source: FollowerSource,
    llm: OpenAiClient,
    provider: Arc<dyn PriceHistoryProvider>,
    config: BacktestConfig,
) -> impl Stream<Item = ProgressEvent> {
    let (tx, rx) = mpsc::channel(64);

    tokio::spawn(async move {
        let emitter = Emitter::new(tx);
        let _ = resolution_worker(&emitter, leader, pool, source, &llm, provider, &config).await;
    });

    ReceiverStream::new(rx)
}

/// Run a threshold-mode backtest: the signal is the first leader price point
/// at or above the threshold.
pub fn run_threshold(
    leader: Market,
    pool: Vec<Market>,
    source: FollowerSource,
    params: ThresholdParams,
    llm: OpenAiClient,
    provider: Arc<dyn PriceHistoryProvider>,
    config: BacktestConfig,
) -> impl Stream<Item = ProgressEvent> {
    let (tx, rx) = mpsc::channel(64);

    tokio::spawn(async move {
        let emitter = Emitter::new(tx);
        let _ =
            threshold_worker(&emitter, leader, pool, source, params, &llm, provider, &config).await;
    });

    ReceiverStream::new(rx)
}

async fn resolution_worker(
    emitter: &Emitter,
    leader: Market,
    pool: Vec<Market>,
    source: FollowerSource,
    llm: &OpenAiClient,
    provider: Arc<dyn PriceHistoryProvider>,
    config: &BacktestConfig,
) -> Result<(), Cancelled> {
    emitter
        .step("Determining resolution time from endDate")
        .await?;

    let end_date = leader.end_date.clone().unwrap_or_default();
    let Some(resolution_time) = parse_end_date(&end_date) else {
        emitter
            .error(format!(
                "Could not parse endDate: '{}'. Cannot determine resolution time.",
                end_date
            ))
            .await?;
        return Ok(());
    };

    emitter
        .result_with(
            format!("Resolution time: {}", format_timestamp(resolution_time)),
            json!({"resolution_time": resolution_time}),
        )
        .await?;

    let Some(followers) =
        acquire_followers(emitter, &leader, pool, source, llm, resolution_time, config).await?
    else {
        return Ok(());
    };

    emitter
        .step(format!(
            "Fetching price data for {} related markets",
            followers.len()
        ))
        .await?;

    let mut trades = Vec::new();
    for (index, follower) in followers.iter().enumerate() {
        trades.push(evaluate_resolution_trade(provider.as_ref(), follower, resolution_time).await);

        if index + 1 < followers.len() {
            tokio::time::sleep(Duration::from_millis(config.fetch_delay_ms)).await;
        }
    }

    let ok_count = trades
        .iter()
        .filter(|t| t.status == TradeStatus::Ok)
        .count();
    emitter
        .result(format!(
            "Fetched price data: {} trades OK, {} skipped",
            ok_count,
            trades.len() - ok_count
        ))
        .await?;

    let summary = summarize_resolution(&trades);
    let timeframes: Vec<&str> = Timeframe::ALL.iter().map(Timeframe::as_str).collect();

    emitter
        .done(json!({
            "leader": {
                "id": leader.id,
                "question": leader.name,
                "resolution_time": resolution_time,
                "resolution_time_formatted": format_timestamp(resolution_time),
                "end_date": leader.end_date,
            },
            "timeframes": timeframes,
            "trades": trades,
            "summary": summary,
        }))
        .await?;

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn threshold_worker(
    emitter: &Emitter,
    leader: Market,
    pool: Vec<Market>,
    source: FollowerSource,
    params: ThresholdParams,
    llm: &OpenAiClient,
    provider: Arc<dyn PriceHistoryProvider>,
    config: &BacktestConfig,
) -> Result<(), Cancelled> {
    emitter
        .step(format!(
            "Scanning leader history for first price >= {:.2}",
            params.threshold
        ))
        .await?;

    if leader.clob_token_id.is_empty() {
        emitter.error("Leader market has no CLOB token ID").await?;
        return Ok(());
    }

    let mut leader_history = match provider.price_history(&leader.clob_token_id).await {
        Ok(history) if !history.is_empty() => history,
        Ok(_) => {
            emitter
                .error("No price history available for leader market")
                .await?;
            return Ok(());
        }
        Err(e) => {
            emitter
                .error(format!("Failed to fetch leader history: {}", e))
                .await?;
            return Ok(());
        }
    };
    leader_history.sort_by_key(|p| p.timestamp);

    let (signal_time, signal_price) = match find_threshold_signal(&leader_history, params.threshold)
    {
        ThresholdSignal::Crossed { timestamp, price } => (timestamp, price),
        ThresholdSignal::NeverReached { max_price } => {
            emitter
                .error(format!(
                    "Leader never reached {:.2}; maximum observed price was {:.2}",
                    params.threshold, max_price
                ))
                .await?;
            return Ok(());
        }
    };

    emitter
        .result_with(
            format!(
                "Signal at {} (price {:.2})",
                format_timestamp(signal_time),
                signal_price
            ),
            json!({"signal_time": signal_time, "signal_price": signal_price}),
        )
        .await?;

    let Some(followers) =
        acquire_followers(emitter, &leader, pool, source, llm, signal_time, config).await?
    else {
        return Ok(());
    };

    emitter
        .step(format!(
            "Fetching price data for {} related markets",
            followers.len()
        ))
        .await?;

    let mut trades = Vec::new();
    for (index, follower) in followers.iter().enumerate() {
        trades.push(
            evaluate_threshold_trade(provider.as_ref(), follower, signal_time, params.hold).await,
        );

        if index + 1 < followers.len() {
            tokio::time::sleep(Duration::from_millis(config.fetch_delay_ms)).await;
        }
    }

    let ok_count = trades
        .iter()
        .filter(|t| t.status == TradeStatus::Ok)
        .count();
    emitter
        .result(format!(
            "Fetched price data: {} trades OK, {} skipped",
            ok_count,
            trades.len() - ok_count
        ))
        .await?;

    let summary = summarize_threshold(&trades);

    emitter
        .done(json!({
            "leader": {
                "id": leader.id,
                "question": leader.name,
                "threshold": params.threshold,
                "hold": params.hold.label(),
                "signal_time": signal_time,
                "signal_time_formatted": format_timestamp(signal_time),
            },
            "trades": trades,
            "summary": summary,
        }))
        .await?;

    Ok(())
}

/// Obtain the follower set for a run, emitting progress along the way.
///
/// Returns `None` after emitting a terminal `error` event; `Some` otherwise.
async fn acquire_followers(
    emitter: &Emitter,
    leader: &Market,
    pool: Vec<Market>,
    source: FollowerSource,
    llm: &OpenAiClient,
    signal_time: i64,
    config: &BacktestConfig,
) -> Result<Option<Vec<Follower>>, Cancelled> {
    let followers = match source {
        FollowerSource::Provided(followers) => {
            emitter
                .result(format!("Using {} provided followers", followers.len()))
                .await?;
            followers
        }
        FollowerSource::Discover => {
            emitter.step("Loading candidate markets").await?;

            let mut skipped_time = 0usize;
            let candidates: Vec<Market> = pool
                .into_iter()
                .filter(|m| {
                    if m.id == leader.id || m.volume < config.min_volume {
                        return false;
                    }
                    // Open markets near 0% or 100% are effectively settled;
                    // closed markets are expected to be there.
                    if !m.closed
                        && !(MIN_CANDIDATE_PROB..=MAX_CANDIDATE_PROB).contains(&m.probability)
                    {
                        return false;
                    }
                    // The candidate must have existed at signal time.
                    if let Some(start) = m.start_date.as_deref().and_then(parse_end_date) {
                        if start > signal_time {
                            skipped_time += 1;
                            return false;
                        }
                    }
                    true
                })
                .collect();

            let time_msg = if skipped_time > 0 {
                format!(", {} skipped (started after signal)", skipped_time)
            } else {
                String::new()
            };
            emitter
                .result_with(
                    format!(
                        "Loaded {} candidate markets (vol >= ${:.0}{})",
                        candidates.len(),
                        config.min_volume,
                        time_msg
                    ),
                    json!({"count": candidates.len()}),
                )
                .await?;

            if candidates.is_empty() {
                emitter.error("No candidate markets found").await?;
                return Ok(None);
            }

            let available = active_categories(&candidates);
            emitter
                .step("Pass 1: Identifying relevant categories")
                .await?;

            let prefilter =
                match prefilter_categories(llm, &leader.name, &available, emitter).await? {
                    Ok(prefilter) => prefilter,
                    Err(e) => {
                        emitter.error(format!("Pass 1 failed: {}", e)).await?;
                        return Ok(None);
                    }
                };

            let mut relevant = prefilter.categories;
            if !relevant.contains(&leader.category) {
                relevant.push(leader.category);
            }

            emitter
                .result_with(
                    format!(
                        "Relevant categories: {}",
                        relevant
                            .iter()
                            .map(Category::as_str)
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                    json!({"categories": &relevant}),
                )
                .await?;

            emitter
                .step("Filtering candidates by relevant categories")
                .await?;

            let relevant_set: HashSet<Category> = relevant.iter().copied().collect();
            let mut filtered: Vec<Market> = candidates
                .iter()
                .filter(|m| relevant_set.contains(&m.category))
                .cloned()
                .collect();

            if filtered.is_empty() {
                emitter
                    .result("No candidates matched — falling back to all candidates")
                    .await?;
                filtered = candidates;
            } else {
                emitter
                    .result(format!(
                        "{} -> {} candidates after category filter",
                        candidates.len(),
                        filtered.len()
                    ))
                    .await?;
            }

            let questions: Vec<String> = filtered.iter().map(|m| m.name.clone()).collect();
            let batches: Vec<&[String]> = questions.chunks(BATCH_SIZE).collect();
            let total_batches = batches.len();

            emitter
                .step(format!(
                    "Pass 2: Discovering relationships across {} batch{} ({} candidates)",
                    total_batches,
                    if total_batches > 1 { "es" } else { "" },
                    questions.len()
                ))
                .await?;

            let mut raw = Vec::new();
            for (index, batch) in batches.iter().enumerate() {
                let batch_num = index + 1;
                emitter
                    .step(format!(
                        "Batch {}/{}: Analyzing {} candidates",
                        batch_num,
                        total_batches,
                        batch.len()
                    ))
                    .await?;

                match discover_relationships(llm, &leader.name, batch, emitter).await? {
                    Ok(found) => {
                        emitter
                            .result(format!(
                                "Batch {}/{}: found {} related markets",
                                batch_num,
                                total_batches,
                                found.len()
                            ))
                            .await?;
                        raw.extend(found);
                    }
                    Err(e) => {
                        emitter
                            .result(format!(
                                "Batch {}/{}: skipped ({})",
                                batch_num,
                                total_batches,
                                truncate(&e.to_string(), 80)
                            ))
                            .await?;
                    }
                }
            }

            if raw.is_empty() {
                emitter
                    .error("No related markets found. Try a different market.")
                    .await?;
                return Ok(None);
            }

            emitter
                .step(format!("Matching {} results to market database", raw.len()))
                .await?;

            let (followers, skipped) = reconcile_relationships(&raw, &filtered);

            let mut message = format!("Matched {} related markets", followers.len());
            if skipped > 0 {
                message.push_str(&format!(
                    " ({} skipped — couldn't match to database)",
                    skipped
                ));
            }
            emitter.result(message).await?;

            if followers.is_empty() {
                emitter
                    .error("No related markets could be matched. Try a different market.")
                    .await?;
                return Ok(None);
            }

            followers
        }
    };

    if followers.is_empty() {
        emitter.error("No followers to backtest").await?;
        return Ok(None);
    }

    Ok(Some(followers))
}

/// Simulate one resolution-shock trade: entry at the signal, exits at every
/// fixed horizon.
async fn evaluate_resolution_trade(
    provider: &dyn PriceHistoryProvider,
    follower: &Follower,
    signal_time: i64,
) -> BacktestTrade {
    let (history, entry) = match locate_entry(provider, follower, signal_time).await {
        Ok(located) => located,
        Err(status) => return BacktestTrade::skipped(follower, status),
    };

    let mut trade = BacktestTrade::entered(follower, entry);
    for timeframe in Timeframe::ALL {
        let exit_time = signal_time + timeframe.offset_secs();
        let exit = resolve_exit_price(&history, exit_time, timeframe.tolerance_secs());
        trade.pnl.insert(
            timeframe,
            exit.map(|price| round2(pnl_percent(entry, price, follower.is_same_outcome))),
        );
    }

    trade
}

/// Simulate one threshold-mode trade with a single exit.
async fn evaluate_threshold_trade(
    provider: &dyn PriceHistoryProvider,
    follower: &Follower,
    signal_time: i64,
    hold: HoldPeriod,
) -> BacktestTrade {
    let (history, entry) = match locate_entry(provider, follower, signal_time).await {
        Ok(located) => located,
        Err(status) => return BacktestTrade::skipped(follower, status),
    };

    let exit = match hold {
        HoldPeriod::Fixed(timeframe) => resolve_exit_price(
            &history,
            signal_time + timeframe.offset_secs(),
            timeframe.tolerance_secs(),
        ),
        HoldPeriod::ToResolution => history.last().map(|p| p.price),
    };

    match exit {
        Some(exit_price) => {
            let mut trade = BacktestTrade::entered(follower, entry);
            trade.exit_price = Some(round4(exit_price));
            trade.pnl_pct = Some(round2(pnl_percent(
                entry,
                exit_price,
                follower.is_same_outcome,
            )));
            trade
        }
        None => {
            let mut trade = BacktestTrade::skipped(follower, TradeStatus::NoExitPrice);
            trade.direction = Some(Direction::from_same_outcome(follower.is_same_outcome));
            trade.entry_price = Some(round4(entry));
            trade
        }
    }
}

/// Fetch and sort a follower's history, then locate the entry price near the
/// signal. The error side is the trade status explaining the failure.
async fn locate_entry(
    provider: &dyn PriceHistoryProvider,
    follower: &Follower,
    signal_time: i64,
) -> Result<(Vec<PricePoint>, f64), TradeStatus> {
    if follower.market.clob_token_id.is_empty() {
        return Err(TradeStatus::NoClobId);
    }

    let mut history = match provider.price_history(&follower.market.clob_token_id).await {
        Ok(history) if !history.is_empty() => history,
        _ => return Err(TradeStatus::NoData),
    };
    history.sort_by_key(|p| p.timestamp);

    match find_nearest_price(&history, signal_time, Timeframe::OneHour.tolerance_secs()) {
        Some(entry) => Ok((history, entry)),
        None => {
            debug!(
                market = %follower.market.id,
                signal = %format_timestamp(signal_time),
                data_start = history.first().map(|p| p.timestamp).unwrap_or_default(),
                data_end = history.last().map(|p| p.timestamp).unwrap_or_default(),
                "no price near signal"
            );
            Err(TradeStatus::NoEntryPrice)
        }
    }
}

/// Nearest price within tolerance, falling back to the last known price when
/// the market stopped trading before the target time.
fn resolve_exit_price(history: &[PricePoint], exit_time: i64, tolerance: i64) -> Option<f64> {
    if let Some(price) = find_nearest_price(history, exit_time, tolerance) {
        return Some(price);
    }

    match history.last() {
        Some(last) if last.timestamp < exit_time => Some(last.price),
        _ => None,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cascade_core::{CascadeError, CascadeResult, RelationshipType};
    use std::collections::HashMap;
    use tokio_stream::StreamExt;

    /// 2024-01-01T00:00:00Z
    const RESOLUTION_TS: i64 = 1_704_067_200;

    struct StubProvider {
        histories: HashMap<String, Vec<PricePoint>>,
    }

    #[async_trait]
    impl PriceHistoryProvider for StubProvider {
        async fn price_history(&self, clob_token_id: &str) -> CascadeResult<Vec<PricePoint>> {
            self.histories
                .get(clob_token_id)
                .cloned()
                .ok_or_else(|| CascadeError::not_found(clob_token_id.to_string()))
        }
    }

    fn market(id: &str, clob: &str, end_date: Option<&str>) -> Market {
        Market {
            id: id.to_string(),
            name: format!("Market {}", id),
            slug: id.to_string(),
            category: Category::Other,
            volume: 50_000.0,
            probability: 0.5,
            clob_token_id: clob.to_string(),
            start_date: None,
            end_date: end_date.map(String::from),
            closed: false,
        }
    }

    fn follower(id: &str, clob: &str, is_same_outcome: bool) -> Follower {
        Follower {
            market: market(id, clob, None),
            confidence_score: 0.8,
            is_same_outcome,
            relationship_type: RelationshipType::Direct,
            rationale: String::new(),
        }
    }

    fn history(points: &[(i64, f64)]) -> Vec<PricePoint> {
        points
            .iter()
            .map(|(t, p)| PricePoint::new(*t, *p))
            .collect()
    }

    fn test_config() -> BacktestConfig {
        BacktestConfig {
            min_volume: 10_000.0,
            fetch_delay_ms: 0,
        }
    }

    async fn collect(stream: impl futures::Stream<Item = ProgressEvent>) -> Vec<ProgressEvent> {
        tokio::pin!(stream);
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }
        events
    }

    fn done_data(events: &[ProgressEvent]) -> &serde_json::Value {
        match events.last() {
            Some(ProgressEvent::Done { data }) => data,
            other => panic!("expected done event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_threshold_signal_and_pnl() {
        let mut histories = HashMap::new();
        histories.insert("leader-token".to_string(), history(&[(0, 0.10), (100, 0.96)]));
        histories.insert("f-token".to_string(), history(&[(95, 0.40), (115, 0.50)]));

        let events = collect(run_threshold(
            market("leader", "leader-token", None),
            Vec::new(),
            FollowerSource::Provided(vec![follower("f", "f-token", true)]),
            ThresholdParams {
                threshold: 0.95,
                hold: HoldPeriod::Fixed(Timeframe::FiveMinutes),
            },
            OpenAiClient::with_api_key("test-key"),
            Arc::new(StubProvider { histories }),
            test_config(),
        ))
        .await;

        let data = done_data(&events);
        assert_eq!(data["leader"]["signal_time"], 100);

        let trade = &data["trades"][0];
        assert_eq!(trade["status"], "ok");
        assert_eq!(trade["direction"], "BUY");
        assert_eq!(trade["entry_price"], 0.4);
        // Exit target 400 is past the data; last point predates it, so the
        // last known price 0.50 applies: (0.50 - 0.40) / 0.40 = +25%
        assert_eq!(trade["pnl_pct"], 25.0);

        assert_eq!(data["summary"]["total_trades"], 1);
        assert_eq!(data["summary"]["overall"]["wins"], 1);
    }

    #[tokio::test]
    async fn test_threshold_never_reached_reports_max() {
        let mut histories = HashMap::new();
        histories.insert("leader-token".to_string(), history(&[(0, 0.10), (100, 0.96)]));

        let events = collect(run_threshold(
            market("leader", "leader-token", None),
            Vec::new(),
            FollowerSource::Provided(vec![follower("f", "f-token", true)]),
            ThresholdParams {
                threshold: 0.99,
                hold: HoldPeriod::ToResolution,
            },
            OpenAiClient::with_api_key("test-key"),
            Arc::new(StubProvider { histories }),
            test_config(),
        ))
        .await;

        match events.last() {
            Some(ProgressEvent::Error { message }) => {
                assert!(message.contains("0.96"), "message was: {}", message);
            }
            other => panic!("expected error event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolution_shock_multi_horizon_pnl() {
        let t = RESOLUTION_TS;
        let mut histories = HashMap::new();
        histories.insert(
            "f-token".to_string(),
            history(&[(t - 60, 0.40), (t + 320, 0.44), (t + 3660, 0.50)]),
        );

        let events = collect(run_resolution_shock(
            market("leader", "leader-token", Some("2024-01-01T00:00:00Z")),
            Vec::new(),
            FollowerSource::Provided(vec![follower("f", "f-token", true)]),
            OpenAiClient::with_api_key("test-key"),
            Arc::new(StubProvider { histories }),
            test_config(),
        ))
        .await;

        let data = done_data(&events);
        assert_eq!(data["leader"]["resolution_time"], t);

        let pnl = &data["trades"][0]["pnl"];
        // 5m: nearest point t+320 (diff 20s <= 3m) at 0.44 -> +10%
        assert_eq!(pnl["5m"], 10.0);
        // 1h: nearest point t+3660 (diff 60s <= 15m) at 0.50 -> +25%
        assert_eq!(pnl["1h"], 25.0);
        // 1d and 1w: nothing within tolerance, but the market stopped trading
        // before the target, so the last price 0.50 applies
        assert_eq!(pnl["1d"], 25.0);
        assert_eq!(pnl["1w"], 25.0);

        let five_min_stats = &data["summary"]["by_timeframe"]["5m"];
        assert_eq!(five_min_stats["avg_pnl"], 10.0);
    }

    #[tokio::test]
    async fn test_resolution_shock_unparseable_end_date() {
        let events = collect(run_resolution_shock(
            market("leader", "leader-token", Some("whenever")),
            Vec::new(),
            FollowerSource::Provided(vec![follower("f", "f-token", true)]),
            OpenAiClient::with_api_key("test-key"),
            Arc::new(StubProvider {
                histories: HashMap::new(),
            }),
            test_config(),
        ))
        .await;

        match events.last() {
            Some(ProgressEvent::Error { message }) => {
                assert!(message.contains("Could not parse endDate"));
            }
            other => panic!("expected error event, got {:?}", other),
        }
        // No partial done after a terminal error
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, ProgressEvent::Done { .. }))
                .count(),
            0
        );
    }

    #[tokio::test]
    async fn test_follower_failure_statuses() {
        let t = RESOLUTION_TS;
        let mut histories = HashMap::new();
        // Data exists but nowhere near the signal
        histories.insert("far-token".to_string(), history(&[(t - 900_000, 0.30)]));

        let events = collect(run_resolution_shock(
            market("leader", "leader-token", Some("2024-01-01T00:00:00Z")),
            Vec::new(),
            FollowerSource::Provided(vec![
                follower("no-clob", "", true),
                follower("no-data", "missing-token", true),
                follower("far", "far-token", true),
            ]),
            OpenAiClient::with_api_key("test-key"),
            Arc::new(StubProvider { histories }),
            test_config(),
        ))
        .await;

        let data = done_data(&events);
        let trades = data["trades"].as_array().unwrap();
        assert_eq!(trades[0]["status"], "no_clob_id");
        assert_eq!(trades[1]["status"], "no_data");
        assert_eq!(trades[2]["status"], "no_entry_price");
        assert_eq!(data["summary"]["total_trades"], 0);
        assert_eq!(data["summary"]["skipped_trades"], 3);
    }

    #[tokio::test]
    async fn test_short_direction_pnl() {
        let t = RESOLUTION_TS;
        let mut histories = HashMap::new();
        histories.insert(
            "f-token".to_string(),
            history(&[(t, 0.40), (t + 300, 0.60)]),
        );

        let events = collect(run_resolution_shock(
            market("leader", "leader-token", Some("2024-01-01T00:00:00Z")),
            Vec::new(),
            FollowerSource::Provided(vec![follower("f", "f-token", false)]),
            OpenAiClient::with_api_key("test-key"),
            Arc::new(StubProvider { histories }),
            test_config(),
        ))
        .await;

        let data = done_data(&events);
        let trade = &data["trades"][0];
        assert_eq!(trade["direction"], "SHORT");
        // entry_no 0.60 -> exit_no 0.40: -33.33%
        assert_eq!(trade["pnl"]["5m"], -33.33);
    }
}
