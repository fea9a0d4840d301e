//! A small trading bot showing every cache attribute together with logging.
//!
//! Run it twice: the second run reads exchange metadata from
//! `demo_cache/` instead of "downloading" it again. Log output goes to the
//! console and to `demo_logs/bot.log`, including `println!` output.

use cachet::logging::{restore_std_streams, setup_logging, LoggingConfig};
use cachet::{cache_for_n_calls, dynamic_cache_to_binary, dynamic_cache_to_json};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Market {
    symbol: String,
    tick_size: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Candle {
    close: f64,
}

#[derive(Debug)]
struct ExchangeError(String);

#[derive(Serialize)]
struct Connector {
    exchange_name: String,
    market_type: String,
}

impl Connector {
    #[dynamic_cache_to_json("demo_cache/{exchange_name}/{market_type}/")]
    fn markets(&self) -> Vec<Market> {
        log::info!("downloading markets from {}", self.exchange_name);
        thread::sleep(Duration::from_millis(500));
        vec![
            Market {
                symbol: "BTCUSDT".to_string(),
                tick_size: 0.01,
            },
            Market {
                symbol: "ETHUSDT".to_string(),
                tick_size: 0.01,
            },
        ]
    }

    #[dynamic_cache_to_binary("demo_cache/{exchange_name}/{market_type}/", file_name = "history.bin")]
    fn history(&self) -> Result<Vec<Candle>, ExchangeError> {
        log::info!("downloading candle history");
        thread::sleep(Duration::from_millis(500));
        if self.market_type == "options" {
            return Err(ExchangeError("history not available".to_string()));
        }
        Ok((0..500).map(|i| Candle { close: 100.0 + i as f64 }).collect())
    }
}

static BALANCE_REQUESTS: AtomicU64 = AtomicU64::new(0);

#[cache_for_n_calls(n = 3, name = "balance")]
fn portfolio_balance() -> f64 {
    let request = BALANCE_REQUESTS.fetch_add(1, Ordering::SeqCst) + 1;
    log::info!("requesting balance (request #{})", request);
    10_000.0 + request as f64
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_logging(
        &LoggingConfig::default()
            .with_level(LevelFilter::Debug)
            .with_log_file("demo_logs/bot.log"),
    )?;

    log::info!("=== cachet trading bot demo ===");
    println!("stdout is captured by the logger as INFO");

    let connector = Connector {
        exchange_name: "binance".to_string(),
        market_type: "spot".to_string(),
    };
    for market in connector.markets() {
        log::info!("market {} (tick {})", market.symbol, market.tick_size);
    }
    // Served from demo_cache/binance/spot/markets.json
    let _ = connector.markets();

    match connector.history() {
        Ok(candles) => log::info!("loaded {} candles", candles.len()),
        Err(err) => log::error!("history failed: {:?}", err),
    }

    let options = Connector {
        exchange_name: "binance".to_string(),
        market_type: "options".to_string(),
    };
    if let Err(err) = options.history() {
        // Errors are never cached: the next run tries again
        log::warn!("options history unavailable: {:?}", err);
    }

    for tick in 1..=7 {
        log::info!("tick {}: balance {:.2}", tick, portfolio_balance());
    }

    #[cfg(feature = "stats")]
    {
        for name in cachet::stats_registry::list() {
            if let Some(stats) = cachet::stats_registry::get(&name) {
                log::info!(
                    "{}: {} hits, {} misses, hit rate {:.1}%",
                    name,
                    stats.hits(),
                    stats.misses(),
                    stats.hit_rate() * 100.0
                );
            }
        }
    }

    restore_std_streams()?;
    println!("streams restored; see demo_logs/bot.log");
    Ok(())
}
