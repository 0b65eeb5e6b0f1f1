use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rust_decimal::Decimal;
use serde_json::json;
use tokio::sync::broadcast;
use tokio::time::timeout;

use sluice_core::{Candle, Position, Timeframe, Trade, Wallet};
use sluice_exec::{
    ExecutionConfig, ExecutionDeps, ExecutionEvent, PriceFeed, Quota, ResultsSnapshot,
    SharedPriceFeed, StrategyExecution, ThrottledHistory,
};
use sluice_test_utils::{
    FeedHandle, Journal, RecordingState, RecordingStrategy, SimClock, StaticHistory, StaticPerf,
};

const SYMBOL: &str = "tBTCUSD";
const W: i64 = 60_000;

fn candle(mts: i64, close: i64) -> Candle {
    Candle {
        symbol: SYMBOL.into(),
        tf: Timeframe::OneMinute,
        mts,
        open: Decimal::from(close - 1),
        high: Decimal::from(close + 1),
        low: Decimal::from(close - 2),
        close: Decimal::from(close),
        volume: Decimal::ONE,
    }
}

fn trade(id: i64, mts: i64, price: i64) -> Trade {
    Trade {
        id,
        mts,
        price: Decimal::from(price),
        amount: Decimal::ONE,
        symbol: SYMBOL.into(),
    }
}

fn wallet(currency: &str, kind: &str, balance: i64, available: i64) -> Wallet {
    Wallet {
        currency: currency.into(),
        kind: kind.into(),
        balance: Decimal::from(balance),
        balance_available: Decimal::from(available),
    }
}

fn test_quota() -> Quota {
    Quota::per_second(NonZeroU32::new(1_000).unwrap())
}

struct Harness {
    exec: StrategyExecution<RecordingStrategy>,
    feed: FeedHandle,
    journal: Arc<Journal>,
    history: Arc<StaticHistory>,
    perf: Arc<StaticPerf>,
    price_feed: Arc<SharedPriceFeed>,
}

async fn launch(
    config: ExecutionConfig,
    strategy: RecordingStrategy,
    journal: Arc<Journal>,
    history_candles: Vec<Candle>,
    base_ms: i64,
) -> Result<Harness> {
    let _ = tracing_subscriber::fmt::try_init();
    let (feed, handle) = sluice_test_utils::ScriptedFeed::new();
    let history = Arc::new(StaticHistory::new(history_candles));
    let price_feed = Arc::new(SharedPriceFeed::new());
    let perf = Arc::new(StaticPerf::new());
    let deps = ExecutionDeps::new(
        Box::new(feed),
        ThrottledHistory::with_quota(history.clone(), test_quota()),
        price_feed.clone(),
        perf.clone(),
    )
    .with_clock(Arc::new(SimClock::starting_at(base_ms)));
    let exec =
        StrategyExecution::execute(strategy, RecordingState::default(), config, deps).await?;
    Ok(Harness {
        exec,
        feed: handle,
        journal,
        history,
        perf,
        price_feed,
    })
}

async fn next_results(
    rx: &mut broadcast::Receiver<ExecutionEvent>,
) -> Result<Arc<ResultsSnapshot>> {
    loop {
        match rx.recv().await? {
            ExecutionEvent::ExecutionResults(snapshot) => return Ok(snapshot),
            _ => continue,
        }
    }
}

#[tokio::test(start_paused = true)]
async fn happy_path_closes_on_transition_then_watchdog() -> Result<()> {
    let config = ExecutionConfig::new(SYMBOL, Timeframe::OneMinute).with_seed_candle_count(3);
    let (strategy, journal) = RecordingStrategy::new(SYMBOL);
    let history = vec![candle(0, 100), candle(W, 101), candle(2 * W, 102)];
    let mut harness = launch(config, strategy, journal, history, 3 * W).await?;

    assert_eq!(harness.journal.seed_mts(), vec![0, W, 2 * W]);
    assert_eq!(
        harness.feed.subscriptions(),
        vec![format!("candles:trade:1m:{SYMBOL}")]
    );

    // The live bar at 180000 closes the seeded bar at 120000 and nothing else.
    harness.feed.candle(candle(3 * W, 103));
    timeout(Duration::from_secs(3_600), harness.journal.wait_for_candles(1)).await?;
    assert_eq!(harness.journal.candle_mts(), vec![2 * W]);

    // No further candle arrives; at t = 270000 the watchdog synthesizes the
    // 240000 bar, which closes 180000.
    timeout(Duration::from_secs(3_600), harness.journal.wait_for_candles(2)).await?;
    let closed = harness.journal.candles();
    assert_eq!(closed[1].mts, 3 * W);
    assert_eq!(closed[1].close, Decimal::from(103));

    harness.exec.stop_execution().await?;
    let state = harness.exec.final_state().expect("terminal state");
    assert!(state.candle_mts.starts_with(&[2 * W, 3 * W]));
    assert!(state.ended);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn watchdog_closes_a_stalled_bar() -> Result<()> {
    let config = ExecutionConfig::new(SYMBOL, Timeframe::OneMinute).with_seed_candle_count(0);
    let (strategy, journal) = RecordingStrategy::new(SYMBOL);
    let mut harness = launch(config, strategy, journal, Vec::new(), W).await?;

    harness.feed.candle(candle(W, 100));
    // Wall clock reaches 150000 with no successor; a synthetic 120000 bar is
    // fed through the normal path and closes 60000.
    timeout(Duration::from_secs(3_600), harness.journal.wait_for_candles(1)).await?;
    let closed = harness.journal.candles();
    assert_eq!(closed[0].mts, W);
    assert_eq!(closed[0].close, Decimal::from(100));

    harness.exec.stop_execution().await?;
    Ok(())
}

#[tokio::test]
async fn candle_updates_do_not_close_until_transition() -> Result<()> {
    let config = ExecutionConfig::new(SYMBOL, Timeframe::OneMinute).with_seed_candle_count(0);
    let (strategy, journal) = RecordingStrategy::new(SYMBOL);
    let mut harness = launch(config, strategy, journal, Vec::new(), W).await?;

    harness.feed.candle(candle(W, 100));
    harness.feed.candle(candle(W, 101));
    harness.feed.candle(candle(W, 102));
    harness.feed.candle(candle(2 * W, 103));
    timeout(Duration::from_secs(5), harness.journal.wait_for_candles(1)).await?;

    let closed = harness.journal.candles();
    let at_60000: Vec<&Candle> = closed.iter().filter(|c| c.mts == W).collect();
    assert_eq!(at_60000.len(), 1, "exactly one closure for the updated bar");
    assert_eq!(at_60000[0].close, Decimal::from(102), "final payload wins");

    harness.exec.stop_execution().await?;
    Ok(())
}

#[tokio::test]
async fn duplicate_and_stale_trades_are_dropped() -> Result<()> {
    let config = ExecutionConfig::new(SYMBOL, Timeframe::OneMinute)
        .with_seed_candle_count(0)
        .with_trades(true);
    let (strategy, journal) = RecordingStrategy::new(SYMBOL);
    let mut harness = launch(config, strategy, journal, Vec::new(), 0).await?;

    assert_eq!(
        harness.feed.subscriptions(),
        vec![
            format!("candles:trade:1m:{SYMBOL}"),
            format!("trades:{SYMBOL}"),
        ]
    );

    harness.feed.trade(trade(1, 1_000, 100));
    harness.feed.trade(trade(2, 2_000, 101));
    harness.feed.trade(trade(2, 2_500, 102));
    harness.feed.trade(trade(3, 3_000, 103));
    timeout(Duration::from_secs(5), harness.journal.wait_for_trades(3)).await?;
    assert_eq!(harness.journal.trade_ids(), vec![1, 2, 3]);

    // The duplicate still advanced the price watermark.
    assert_eq!(harness.price_feed.last().unwrap().mts, 3_000);

    // An id above the watermark with a stale mts is processed but must not
    // move the price feed backwards.
    harness.feed.trade(trade(4, 2_500, 90));
    timeout(Duration::from_secs(5), harness.journal.wait_for_trades(4)).await?;
    let last = harness.price_feed.last().unwrap();
    assert_eq!(last.mts, 3_000);
    assert_eq!(last.price, Decimal::from(103));

    harness.exec.stop_execution().await?;
    let state = harness.exec.final_state().expect("terminal state");
    assert_eq!(state.trade_ids, vec![1, 2, 3, 4]);
    Ok(())
}

#[tokio::test]
async fn wallet_stream_follows_snapshot_then_update_semantics() -> Result<()> {
    let config = ExecutionConfig::new(SYMBOL, Timeframe::OneMinute).with_seed_candle_count(0);
    let (strategy, journal) = RecordingStrategy::new(SYMBOL);
    let mut harness = launch(config, strategy, journal, Vec::new(), W).await?;
    let mut events = harness.exec.events();

    harness
        .feed
        .wallet_snapshot(vec![wallet("USD", "exchange", 100, 100)]);
    harness.feed.wallet_update(wallet("USD", "exchange", 150, 150));
    // No matching entry: ignored.
    harness.feed.wallet_update(wallet("BTC", "exchange", 1, 1));
    harness.feed.candle(candle(W, 100));

    let snapshot = timeout(Duration::from_secs(5), next_results(&mut events)).await??;
    assert_eq!(
        snapshot.wallets,
        vec![wallet("USD", "exchange", 150, 150)]
    );

    harness.exec.stop_execution().await?;
    Ok(())
}

#[tokio::test]
async fn order_close_payloads_are_forwarded_verbatim() -> Result<()> {
    let config = ExecutionConfig::new(SYMBOL, Timeframe::OneMinute).with_seed_candle_count(0);
    let (strategy, journal) = RecordingStrategy::new(SYMBOL);
    let mut harness = launch(config, strategy, journal, Vec::new(), 0).await?;

    let payload = json!({ "id": 77, "status": "EXECUTED", "price": "100.5" });
    harness.feed.order_closed(payload.clone());
    timeout(Duration::from_secs(5), harness.journal.wait_for_orders(1)).await?;
    assert_eq!(harness.journal.orders(), vec![payload]);

    harness.exec.stop_execution().await?;
    let state = harness.exec.final_state().expect("terminal state");
    assert_eq!(state.orders, 1);
    Ok(())
}

#[tokio::test]
async fn failing_callback_keeps_last_good_state_and_surfaces_error() -> Result<()> {
    let config = ExecutionConfig::new(SYMBOL, Timeframe::OneMinute).with_seed_candle_count(0);
    let (strategy, journal) = RecordingStrategy::new(SYMBOL);
    let strategy = strategy.failing_on_candles([W]);
    let mut harness = launch(config, strategy, journal, Vec::new(), W).await?;
    let mut events = harness.exec.events();

    harness.feed.candle(candle(W, 100));
    harness.feed.candle(candle(2 * W, 101));
    harness.feed.candle(candle(3 * W, 102));
    timeout(Duration::from_secs(5), harness.journal.wait_for_candles(2)).await?;

    // Both closures were attempted, in order.
    assert_eq!(harness.journal.candle_mts(), vec![W, 2 * W]);

    let error = timeout(Duration::from_secs(5), async {
        loop {
            if let ExecutionEvent::Error(err) = events.recv().await.unwrap() {
                return err;
            }
        }
    })
    .await?;
    assert!(error.to_string().contains("scripted failure"));

    harness.exec.stop_execution().await?;
    let state = harness.exec.final_state().expect("terminal state");
    // The failed transition was not adopted; processing continued after it.
    assert_eq!(state.candle_mts, vec![2 * W]);
    Ok(())
}

#[tokio::test]
async fn invoke_is_funneled_through_the_serial_processor() -> Result<()> {
    let config = ExecutionConfig::new(SYMBOL, Timeframe::OneMinute).with_seed_candle_count(0);
    let (strategy, journal) = RecordingStrategy::new(SYMBOL);
    let mut harness = launch(config, strategy, journal, Vec::new(), W).await?;

    harness.exec.invoke(|mut state| {
        state.invokes += 1;
        state
    })?;
    harness.feed.candle(candle(W, 100));
    harness.feed.candle(candle(2 * W, 101));
    timeout(Duration::from_secs(5), harness.journal.wait_for_candles(1)).await?;

    harness.exec.stop_execution().await?;
    let state = harness.exec.final_state().expect("terminal state");
    assert_eq!(state.invokes, 1);
    assert!(harness
        .exec
        .invoke(|state| state)
        .is_err_and(|err| matches!(err, sluice_exec::ExecError::Stopped)));
    Ok(())
}

#[tokio::test]
async fn perf_ticks_emit_result_snapshots() -> Result<()> {
    let config = ExecutionConfig::new(SYMBOL, Timeframe::OneMinute).with_seed_candle_count(0);
    let (strategy, journal) = RecordingStrategy::new(SYMBOL);
    let mut harness = launch(config, strategy, journal, Vec::new(), W).await?;
    let mut events = harness.exec.events();

    harness
        .perf
        .set_equity_curve(vec![Decimal::from(100), Decimal::from(110)]);
    harness.perf.set_available_funds(Decimal::from(900));
    harness.perf.tick();

    let snapshot = timeout(Duration::from_secs(5), next_results(&mut events)).await??;
    assert_eq!(snapshot.perf.available_funds, Decimal::from(900));
    let stats = snapshot.equity_stats.expect("stats over a non-empty curve");
    assert_eq!(stats.min, Decimal::from(100));
    assert_eq!(stats.max, Decimal::from(110));

    harness.exec.stop_execution().await?;
    Ok(())
}

#[tokio::test]
async fn open_position_data_carries_pnl_from_the_strategy() -> Result<()> {
    let config = ExecutionConfig::new(SYMBOL, Timeframe::OneMinute).with_seed_candle_count(0);
    let (strategy, journal) = RecordingStrategy::new(SYMBOL);
    let strategy = strategy.with_realized_pnl(Decimal::from(7));
    let slot = strategy.position_slot();
    *slot.lock().unwrap() = Some(Position {
        symbol: SYMBOL.into(),
        amount: Decimal::from(2),
        base_price: Decimal::from(95),
    });
    let mut harness = launch(config, strategy, journal, Vec::new(), W).await?;
    let mut events = harness.exec.events();

    harness.feed.candle(candle(W, 100));
    let report = timeout(Duration::from_secs(5), async {
        loop {
            if let ExecutionEvent::OpenedPositionData(report) = events.recv().await.unwrap() {
                return report;
            }
        }
    })
    .await?;
    assert_eq!(report.realized_pnl, Decimal::from(7));
    // (100 - 95) * 2
    assert_eq!(report.unrealized_pnl, Decimal::from(10));

    harness.exec.stop_execution().await?;
    let state = harness.exec.final_state().expect("terminal state");
    assert!(state.flattened, "open position requested closed at stop");
    assert_eq!(harness.journal.close_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn snapshots_and_unknown_frames_are_dropped_at_intake() -> Result<()> {
    let config = ExecutionConfig::new(SYMBOL, Timeframe::OneMinute)
        .with_seed_candle_count(0)
        .with_trades(true);
    let (strategy, journal) = RecordingStrategy::new(SYMBOL);
    let mut harness = launch(config, strategy, journal, Vec::new(), W).await?;

    // Multi-candle snapshots, trade snapshots and unknown frames all drop.
    harness
        .feed
        .candle_snapshot(vec![candle(0, 98), candle(W, 99)]);
    harness.feed.trade_snapshot(vec![trade(1, 1_000, 100)]);
    harness.feed.raw("ticker", json!({ "bid": 99.5 }));
    // A one-element candle snapshot is the open bar re-sent.
    harness.feed.candle_snapshot(vec![candle(W, 100)]);
    harness.feed.candle(candle(2 * W, 101));

    timeout(Duration::from_secs(5), harness.journal.wait_for_candles(1)).await?;
    let closed = harness.journal.candles();
    assert_eq!(closed[0].mts, W);
    assert_eq!(closed[0].close, Decimal::from(100));
    assert!(harness.journal.trade_ids().is_empty());

    harness.exec.stop_execution().await?;
    Ok(())
}

#[tokio::test]
async fn seeding_pages_through_thousand_candle_windows() -> Result<()> {
    let config = ExecutionConfig::new(SYMBOL, Timeframe::OneMinute).with_seed_candle_count(1_500);
    let (strategy, journal) = RecordingStrategy::new(SYMBOL);
    let history: Vec<Candle> = (0..1_500).map(|k| candle(k * W, 100 + k % 7)).collect();
    let mut harness = launch(config, strategy, journal, history, 1_500 * W).await?;

    assert_eq!(harness.journal.seed_mts().len(), 1_500);
    let queries = harness.history.queries();
    assert_eq!(queries.len(), 2, "1500 candles fetched in two pages");
    assert_eq!(queries[0].limit, Some(1_000));
    assert_eq!(queries[0].start, Some(0));
    assert_eq!(queries[1].end, Some(1_500 * W));

    harness.exec.stop_execution().await?;
    Ok(())
}
