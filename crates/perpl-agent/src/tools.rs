//! Tool catalogue and dispatcher.
//!
//! The catalogue is fixed; every tool dispatches to the router, tracker, or
//! simulator. Results are JSON objects; a `_report` field, when present,
//! carries preformatted text the transport renders separately from the
//! structured payload.
//!
//! Write tools (open_position, close_position, cancel_order) carry a
//! contract that the model must obtain explicit user confirmation before
//! invoking them; enforcement is policy in the system prompt, not a hard
//! gate here.

use crate::anthropic::ToolDef;
use crate::error::{AgentError, AgentResult};
use alloy::providers::Provider;
use perpl_chain::walk_book;
use perpl_core::{AccountId, LeverageHdths, Lns, PerpetualId, Pns};
use perpl_liq::{closed_form_liquidation_price, LiquidationSimulator, Side};
use perpl_router::HybridRouter;
use perpl_state::StateTracker;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// Blocks past head within which a submitted order must execute.
const EXECUTION_WINDOW_BLOCKS: u64 = 100;

const DEFAULT_BOOK_DEPTH: usize = 10;
const DEFAULT_TRADE_LIMIT: usize = 20;

/// Components the tools dispatch to.
pub struct ToolContext {
    pub router: Arc<HybridRouter>,
    pub tracker: Arc<StateTracker>,
    pub simulator: Option<Arc<LiquidationSimulator>>,
    pub account: AccountId,
    pub markets: Vec<PerpetualId>,
    pub maintenance_margin: f64,
}

impl ToolContext {
    /// Execute one tool by name.
    pub async fn execute(&self, name: &str, input: &Value) -> AgentResult<Value> {
        info!(tool = name, "Executing tool");
        match name {
            "account_summary" => self.account_summary(),
            "positions" => self.positions().await,
            "markets" => self.markets_overview().await,
            "open_orders" => self.open_orders(input).await,
            "funding_info" => self.funding_info(input).await,
            "liquidation_analysis" => self.liquidation_analysis(input).await,
            "trading_fees" => self.trading_fees().await,
            "order_book" => self.order_book(input).await,
            "recent_trades" => self.recent_trades(input).await,
            "debug_transaction" => self.debug_transaction(input).await,
            "simulate_strategy" => self.simulate_strategy(input).await,
            "dry_run_trade" => self.dry_run_trade(input).await,
            "open_position" => self.open_position(input).await,
            "close_position" => self.close_position(input).await,
            "cancel_order" => self.cancel_order(input).await,
            other => Err(AgentError::UnknownTool(other.to_string())),
        }
    }

    // ========================================================================
    // Read tools
    // ========================================================================

    fn account_summary(&self) -> AgentResult<Value> {
        Ok(json!({
            "balance": self.tracker.balance_cns().to_amount(),
            "locked": self.tracker.locked_cns().to_amount(),
            "available": self.tracker.available_cns().to_amount(),
            "total_unrealized_pnl": self.tracker.total_unrealized_pnl_cns().to_amount(),
            "total_equity": self.tracker.total_equity_cns().to_amount(),
            "head_block": self.tracker.head_block(),
        }))
    }

    async fn positions(&self) -> AgentResult<Value> {
        let positions = self
            .router
            .get_positions(self.account, &self.markets)
            .await
            .map_err(|e| tool_failed("positions", e))?;

        let mut out = Vec::new();
        for position in positions {
            let perp = self
                .router
                .get_perpetual_info(position.perpetual)
                .await
                .map_err(|e| tool_failed("positions", e))?;
            out.push(json!({
                "market": position.perpetual,
                "symbol": perp.symbol,
                "side": position.kind,
                "size": position.lot_lns.to_lot(perp.lot_decimals),
                "entry_price": position.entry_price_pns.to_price(perp.price_decimals),
                "collateral": position.deposit_cns.to_amount(),
                "unrealized_pnl": position.unrealized_pnl_cns.to_amount(),
            }));
        }
        Ok(json!({ "positions": out }))
    }

    async fn markets_overview(&self) -> AgentResult<Value> {
        let mut out = Vec::new();
        for &market in &self.markets {
            let perp = self
                .router
                .get_perpetual_info(market)
                .await
                .map_err(|e| tool_failed("markets", e))?;
            out.push(json!({
                "market": perp.id,
                "symbol": perp.symbol,
                "name": perp.name,
                "mark": perp.mark_pns.to_price(perp.price_decimals),
                "oracle": perp.oracle_pns.to_price(perp.price_decimals),
                "funding_pct": perp.funding_rate_pct(),
                "open_interest_long": perp.open_interest_long.to_lot(perp.lot_decimals),
                "open_interest_short": perp.open_interest_short.to_lot(perp.lot_decimals),
                "paused": perp.paused,
            }));
        }
        Ok(json!({ "markets": out }))
    }

    async fn open_orders(&self, input: &Value) -> AgentResult<Value> {
        let markets: Vec<PerpetualId> = match optional_u64(input, "market") {
            Some(market) => vec![market],
            None => self.markets.clone(),
        };

        let mut out = Vec::new();
        for market in markets {
            let orders = self
                .router
                .get_open_orders(market, self.account)
                .await
                .map_err(|e| tool_failed("open_orders", e))?;
            let perp = self
                .router
                .get_perpetual_info(market)
                .await
                .map_err(|e| tool_failed("open_orders", e))?;
            for order in orders {
                out.push(json!({
                    "order_id": order.order_id,
                    "market": market,
                    "kind": order.kind,
                    "price": order.price_pns.to_price(perp.price_decimals),
                    "size": order.lot_lns.to_lot(perp.lot_decimals),
                    "leverage": order.leverage_hdths.to_leverage(),
                    "status": order.status,
                }));
            }
        }
        Ok(json!({ "orders": out }))
    }

    async fn funding_info(&self, input: &Value) -> AgentResult<Value> {
        let market = require_u64(input, "market")?;
        let perp = self
            .router
            .get_perpetual_info(market)
            .await
            .map_err(|e| tool_failed("funding_info", e))?;
        Ok(json!({
            "market": market,
            "symbol": perp.symbol,
            "funding_per_100k": perp.funding_per_100k,
            "funding_pct": perp.funding_rate_pct(),
            "open_interest_long": perp.open_interest_long.to_lot(perp.lot_decimals),
            "open_interest_short": perp.open_interest_short.to_lot(perp.lot_decimals),
        }))
    }

    async fn liquidation_analysis(&self, input: &Value) -> AgentResult<Value> {
        let market = require_u64(input, "market")?;
        let perp = self
            .router
            .get_perpetual_info(market)
            .await
            .map_err(|e| tool_failed("liquidation_analysis", e))?;
        let view = self
            .router
            .chain()
            .get_position(market, self.account)
            .await
            .map_err(|e| tool_failed("liquidation_analysis", e))?;

        let position = &view.position;
        let side = match position.kind {
            perpl_core::PositionKind::Long => Side::Long,
            perpl_core::PositionKind::Short => Side::Short,
            perpl_core::PositionKind::None => {
                return Ok(json!({
                    "market": market,
                    "position": null,
                    "_report": format!("No open position on {}.", perp.symbol),
                }))
            }
        };

        let entry = position.entry_price_pns.to_price(perp.price_decimals);
        let size = position.lot_lns.abs().to_lot(perp.lot_decimals);
        let collateral = position.deposit_cns.to_amount();
        let mark = view.mark_pns.to_price(perp.price_decimals);
        let math_price =
            closed_form_liquidation_price(entry, size, collateral, self.maintenance_margin, side);

        let mut result = json!({
            "market": market,
            "symbol": perp.symbol,
            "side": side,
            "entry_price": entry,
            "size": size,
            "collateral": collateral,
            "current_mark": mark,
            "estimated_liquidation_price": math_price,
        });

        // Fork verification when a simulator is configured; the estimate
        // stands alone otherwise.
        if let Some(simulator) = &self.simulator {
            match simulator.simulate(market, self.account).await {
                Ok(report) => {
                    result["fork_liquidation_price"] = json!(report.fork_price);
                    result["divergence_abs"] = json!(report.divergence_abs);
                    result["divergence_pct"] = json!(report.divergence_pct);
                    result["already_liquidatable"] = json!(report.already_liquidatable);
                    result["_report"] = json!(format!(
                        "{} {:?}: closed-form liquidation at {:.2}, fork-verified {:.2} \
                         (divergence {:+.2}%). Current mark {:.2}.",
                        perp.symbol,
                        side,
                        math_price,
                        report.fork_price,
                        report.divergence_pct,
                        mark,
                    ));
                }
                Err(e) => {
                    result["fork_error"] = json!(e.to_string());
                    result["_report"] = json!(format!(
                        "{} {:?}: closed-form liquidation at {:.2} (fork verification \
                         unavailable: {e}). Current mark {:.2}.",
                        perp.symbol, side, math_price, mark,
                    ));
                }
            }
        } else {
            result["_report"] = json!(format!(
                "{} {:?}: closed-form liquidation at {:.2}. Current mark {:.2}.",
                perp.symbol, side, math_price, mark,
            ));
        }

        Ok(result)
    }

    async fn trading_fees(&self) -> AgentResult<Value> {
        let (taker, maker) = self
            .router
            .get_fees()
            .await
            .map_err(|e| tool_failed("trading_fees", e))?;
        Ok(json!({
            "taker_fee_hdth_bps": taker,
            "maker_fee_hdth_bps": maker,
            "taker_fee_pct": taker as f64 / 10_000.0,
            "maker_fee_pct": maker as f64 / 10_000.0,
        }))
    }

    async fn order_book(&self, input: &Value) -> AgentResult<Value> {
        let market = require_u64(input, "market")?;
        let depth = optional_u64(input, "depth").unwrap_or(DEFAULT_BOOK_DEPTH as u64) as usize;

        let perp = self
            .router
            .get_perpetual_info(market)
            .await
            .map_err(|e| tool_failed("order_book", e))?;
        let view = walk_book(self.router.chain().as_ref(), &perp, depth)
            .await
            .map_err(|e| tool_failed("order_book", e))?;

        let level = |l: &perpl_chain::BookLevelView| {
            json!({
                "price": l.price_pns.to_price(perp.price_decimals),
                "size": l.volume_lns.to_lot(perp.lot_decimals),
            })
        };
        Ok(json!({
            "market": market,
            "bids": view.bids.iter().map(level).collect::<Vec<_>>(),
            "asks": view.asks.iter().map(level).collect::<Vec<_>>(),
            "total_orders": view.total_orders,
            "spread": view.spread_pns.map(|s| s as f64 / 10f64.powi(perp.price_decimals as i32)),
        }))
    }

    async fn recent_trades(&self, input: &Value) -> AgentResult<Value> {
        let market = require_u64(input, "market")?;
        let limit = optional_u64(input, "limit").unwrap_or(DEFAULT_TRADE_LIMIT as u64) as usize;
        let perp = self
            .router
            .get_perpetual_info(market)
            .await
            .map_err(|e| tool_failed("recent_trades", e))?;

        let trades: Vec<Value> = self
            .tracker
            .recent_trades(market, limit)
            .iter()
            .map(|t| {
                json!({
                    "price": t.price_pns.to_price(perp.price_decimals),
                    "size": t.lot_lns.to_lot(perp.lot_decimals),
                    "taker_buy": t.taker_buy,
                    "at": t.at,
                })
            })
            .collect();
        Ok(json!({ "market": market, "trades": trades }))
    }

    async fn debug_transaction(&self, input: &Value) -> AgentResult<Value> {
        let hash = input
            .get("hash")
            .and_then(|v| v.as_str())
            .ok_or_else(|| missing_param("debug_transaction", "hash"))?;

        let receipt: Value = self
            .router
            .chain()
            .provider()
            .raw_request("eth_getTransactionReceipt".into(), (hash,))
            .await
            .map_err(|e| tool_failed("debug_transaction", e))?;

        if receipt.is_null() {
            return Ok(json!({
                "hash": hash,
                "found": false,
                "_report": format!("Transaction {hash} not found."),
            }));
        }

        let status = receipt.get("status").and_then(|v| v.as_str()).unwrap_or("");
        let succeeded = status == "0x1";
        Ok(json!({
            "hash": hash,
            "found": true,
            "succeeded": succeeded,
            "block": receipt.get("blockNumber"),
            "gas_used": receipt.get("gasUsed"),
            "logs": receipt.get("logs").and_then(|l| l.as_array()).map(|l| l.len()).unwrap_or(0),
        }))
    }

    // ========================================================================
    // Simulation tools
    // ========================================================================

    async fn simulate_strategy(&self, input: &Value) -> AgentResult<Value> {
        let market = require_u64(input, "market")?;
        let strategy = input
            .get("strategy")
            .and_then(|v| v.as_str())
            .ok_or_else(|| missing_param("simulate_strategy", "strategy"))?;
        let size = require_f64(input, "size")?;
        let leverage = require_f64(input, "leverage")?;

        let perp = self
            .router
            .get_perpetual_info(market)
            .await
            .map_err(|e| tool_failed("simulate_strategy", e))?;
        let mark = perp.mark_pns.to_price(perp.price_decimals);

        let orders = match strategy {
            "grid" => {
                let levels = input
                    .get("params")
                    .and_then(|p| p.get("levels"))
                    .and_then(|v| v.as_u64())
                    .unwrap_or(5) as i64;
                let spacing_pct = input
                    .get("params")
                    .and_then(|p| p.get("spacing_pct"))
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.5);
                let per_level = size / (levels as f64 * 2.0);
                let mut orders = Vec::new();
                for i in 1..=levels {
                    let offset = mark * spacing_pct / 100.0 * i as f64;
                    orders.push(json!({"side": "buy", "price": mark - offset, "size": per_level}));
                    orders.push(json!({"side": "sell", "price": mark + offset, "size": per_level}));
                }
                orders
            }
            "mm" => {
                let half_spread_pct = input
                    .get("params")
                    .and_then(|p| p.get("half_spread_pct"))
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.1);
                let offset = mark * half_spread_pct / 100.0;
                vec![
                    json!({"side": "buy", "price": mark - offset, "size": size / 2.0}),
                    json!({"side": "sell", "price": mark + offset, "size": size / 2.0}),
                ]
            }
            other => {
                return Err(AgentError::ToolExecutionFailed {
                    name: "simulate_strategy".to_string(),
                    message: format!("unknown strategy '{other}', expected grid or mm"),
                })
            }
        };

        let margin_required = size * mark / leverage.max(1.0);
        let report = format!(
            "Simulated {strategy} on {}: {} orders around mark {mark:.2}, \
             margin required ~{margin_required:.2}. No orders were placed.",
            perp.symbol,
            orders.len(),
        );
        Ok(json!({
            "market": market,
            "strategy": strategy,
            "mark": mark,
            "orders": orders,
            "margin_required": margin_required,
            "_report": report,
        }))
    }

    async fn dry_run_trade(&self, input: &Value) -> AgentResult<Value> {
        let market = require_u64(input, "market")?;
        let side = require_side(input)?;
        let size = require_f64(input, "size")?;
        let leverage = require_f64(input, "leverage")?;

        let perp = self
            .router
            .get_perpetual_info(market)
            .await
            .map_err(|e| tool_failed("dry_run_trade", e))?;
        let mark = perp.mark_pns.to_price(perp.price_decimals);
        let price = optional_f64(input, "price").unwrap_or(mark);

        let notional = size * price;
        let margin_required = notional / leverage.max(1.0);
        let (taker, _) = self
            .router
            .get_fees()
            .await
            .map_err(|e| tool_failed("dry_run_trade", e))?;
        let fee = notional * taker as f64 / 1_000_000.0;
        let liq_estimate = closed_form_liquidation_price(
            price,
            size,
            margin_required,
            self.maintenance_margin,
            side,
        );

        Ok(json!({
            "market": market,
            "side": side,
            "size": size,
            "price": price,
            "notional": notional,
            "margin_required": margin_required,
            "estimated_fee": fee,
            "estimated_liquidation_price": liq_estimate,
            "available": self.tracker.available_cns().to_amount(),
            "_report": format!(
                "Dry run: {side:?} {size} {} @ {price:.2} would lock ~{margin_required:.2} \
                 margin, fee ~{fee:.4}, est. liquidation {liq_estimate:.2}. Nothing submitted.",
                perp.symbol,
            ),
        }))
    }

    // ========================================================================
    // Write tools (require explicit user confirmation per the system prompt)
    // ========================================================================

    async fn open_position(&self, input: &Value) -> AgentResult<Value> {
        let market = require_u64(input, "market")?;
        let side = require_side(input)?;
        let size = require_f64(input, "size")?;
        let leverage = require_f64(input, "leverage")?;

        let perp = self
            .router
            .get_perpetual_info(market)
            .await
            .map_err(|e| tool_failed("open_position", e))?;
        let price_pns = match optional_f64(input, "price") {
            Some(price) => Some(
                Pns::from_price(price, perp.price_decimals)
                    .map_err(|e| tool_failed("open_position", e))?,
            ),
            None => None,
        };
        let lot = Lns::from_lot(size, perp.lot_decimals)
            .map_err(|e| tool_failed("open_position", e))?;

        let receipt = self
            .router
            .open_position(
                market,
                self.account,
                side == Side::Long,
                price_pns,
                lot,
                LeverageHdths::from_leverage(leverage),
                self.execution_deadline().await?,
            )
            .await
            .map_err(|e| tool_failed("open_position", e))?;

        Ok(write_receipt_json("open_position", market, receipt))
    }

    async fn close_position(&self, input: &Value) -> AgentResult<Value> {
        let market = require_u64(input, "market")?;

        let view = self
            .router
            .chain()
            .get_position(market, self.account)
            .await
            .map_err(|e| tool_failed("close_position", e))?;
        let position = &view.position;
        let long = match position.kind {
            perpl_core::PositionKind::Long => true,
            perpl_core::PositionKind::Short => false,
            perpl_core::PositionKind::None => {
                return Err(AgentError::ToolExecutionFailed {
                    name: "close_position".to_string(),
                    message: format!("no open position on market {market}"),
                })
            }
        };

        let perp = self
            .router
            .get_perpetual_info(market)
            .await
            .map_err(|e| tool_failed("close_position", e))?;
        let lot = match optional_f64(input, "size") {
            Some(size) => Lns::from_lot(size, perp.lot_decimals)
                .map_err(|e| tool_failed("close_position", e))?,
            None => position.lot_lns.abs(),
        };
        let price_pns = match optional_f64(input, "price") {
            Some(price) => Some(
                Pns::from_price(price, perp.price_decimals)
                    .map_err(|e| tool_failed("close_position", e))?,
            ),
            None => None,
        };
        let linked = self.tracker.position_with_id(market).map(|(id, _)| id);

        let receipt = self
            .router
            .close_position(
                market,
                self.account,
                long,
                price_pns,
                lot,
                linked,
                self.execution_deadline().await?,
            )
            .await
            .map_err(|e| tool_failed("close_position", e))?;

        Ok(write_receipt_json("close_position", market, receipt))
    }

    async fn cancel_order(&self, input: &Value) -> AgentResult<Value> {
        let market = require_u64(input, "market")?;
        let order_id = require_u64(input, "order_id")?;

        let receipt = self
            .router
            .cancel_order(
                market,
                self.account,
                order_id,
                self.execution_deadline().await?,
            )
            .await
            .map_err(|e| tool_failed("cancel_order", e))?;

        Ok(write_receipt_json("cancel_order", market, receipt))
    }

    /// Last-execution-block bound for outgoing orders.
    async fn execution_deadline(&self) -> AgentResult<u64> {
        let head = self.tracker.head_block();
        let head = if head > 0 {
            head
        } else {
            self.router
                .chain()
                .provider()
                .get_block_number()
                .await
                .map_err(|e| tool_failed("execution_deadline", e))?
        };
        Ok(head + EXECUTION_WINDOW_BLOCKS)
    }
}

fn write_receipt_json(
    tool: &str,
    market: PerpetualId,
    receipt: perpl_router::WriteReceipt,
) -> Value {
    match receipt {
        perpl_router::WriteReceipt::Ws { rq } => json!({
            "market": market,
            "submitted_via": "websocket",
            "request_id": rq,
            "_report": format!("{tool} submitted over the trading socket (rq {rq})."),
        }),
        perpl_router::WriteReceipt::Chain { tx } => json!({
            "market": market,
            "submitted_via": "contract",
            "tx": format!("{tx:#x}"),
            "_report": format!("{tool} executed on chain in {tx:#x}."),
        }),
    }
}

fn tool_failed(name: &str, e: impl std::fmt::Display) -> AgentError {
    AgentError::ToolExecutionFailed {
        name: name.to_string(),
        message: e.to_string(),
    }
}

fn missing_param(tool: &str, param: &str) -> AgentError {
    AgentError::ToolExecutionFailed {
        name: tool.to_string(),
        message: format!("missing required parameter '{param}'"),
    }
}

fn require_u64(input: &Value, key: &str) -> AgentResult<u64> {
    input
        .get(key)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| missing_param("tool", key))
}

fn optional_u64(input: &Value, key: &str) -> Option<u64> {
    input.get(key).and_then(|v| v.as_u64())
}

fn require_f64(input: &Value, key: &str) -> AgentResult<f64> {
    input
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| missing_param("tool", key))
}

fn optional_f64(input: &Value, key: &str) -> Option<f64> {
    input.get(key).and_then(|v| v.as_f64())
}

fn require_side(input: &Value) -> AgentResult<Side> {
    match input.get("side").and_then(|v| v.as_str()) {
        Some("long") | Some("buy") => Ok(Side::Long),
        Some("short") | Some("sell") => Ok(Side::Short),
        _ => Err(missing_param("tool", "side")),
    }
}

/// The fixed catalogue advertised to the model.
pub fn tool_catalogue() -> Vec<ToolDef> {
    fn market_prop() -> Value {
        json!({"type": "integer", "description": "Perpetual market id"})
    }
    vec![
        ToolDef {
            name: "account_summary".to_string(),
            description: "Balance, locked margin, available funds, unrealized PnL, and equity."
                .to_string(),
            input_schema: schema(json!({}), &[]),
        },
        ToolDef {
            name: "positions".to_string(),
            description: "All open positions with size, entry, collateral, and PnL.".to_string(),
            input_schema: schema(json!({}), &[]),
        },
        ToolDef {
            name: "markets".to_string(),
            description: "Overview of every market: mark, oracle, funding, open interest."
                .to_string(),
            input_schema: schema(json!({}), &[]),
        },
        ToolDef {
            name: "open_orders".to_string(),
            description: "Open orders, optionally filtered to one market.".to_string(),
            input_schema: schema(json!({"market": market_prop()}), &[]),
        },
        ToolDef {
            name: "funding_info".to_string(),
            description: "Funding rate and open interest for a market.".to_string(),
            input_schema: schema(json!({"market": market_prop()}), &["market"]),
        },
        ToolDef {
            name: "liquidation_analysis".to_string(),
            description: "Liquidation price analysis for the position on a market: closed-form \
                          estimate plus fork verification when available."
                .to_string(),
            input_schema: schema(json!({"market": market_prop()}), &["market"]),
        },
        ToolDef {
            name: "trading_fees".to_string(),
            description: "Current taker and maker fees.".to_string(),
            input_schema: schema(json!({"market": market_prop()}), &[]),
        },
        ToolDef {
            name: "order_book".to_string(),
            description: "L2 order book for a market, reconstructed from chain.".to_string(),
            input_schema: schema(
                json!({"market": market_prop(),
                       "depth": {"type": "integer", "description": "Levels per side"}}),
                &["market"],
            ),
        },
        ToolDef {
            name: "recent_trades".to_string(),
            description: "Recent trades for a market.".to_string(),
            input_schema: schema(
                json!({"market": market_prop(),
                       "limit": {"type": "integer", "description": "Max trades to return"}}),
                &["market"],
            ),
        },
        ToolDef {
            name: "debug_transaction".to_string(),
            description: "Inspect a transaction by hash: status, block, gas, log count."
                .to_string(),
            input_schema: schema(
                json!({"hash": {"type": "string", "description": "Transaction hash"}}),
                &["hash"],
            ),
        },
        ToolDef {
            name: "simulate_strategy".to_string(),
            description: "Preview the order ladder of a grid or mm strategy without placing \
                          anything."
                .to_string(),
            input_schema: schema(
                json!({
                    "market": market_prop(),
                    "strategy": {"type": "string", "enum": ["grid", "mm"]},
                    "size": {"type": "number"},
                    "leverage": {"type": "number"},
                    "params": {"type": "object"}
                }),
                &["market", "strategy", "size", "leverage"],
            ),
        },
        ToolDef {
            name: "dry_run_trade".to_string(),
            description: "Estimate margin, fees, and liquidation for a hypothetical trade; \
                          nothing is submitted."
                .to_string(),
            input_schema: trade_schema(),
        },
        ToolDef {
            name: "open_position".to_string(),
            description: "Open a position. WRITE: requires explicit user confirmation before \
                          invocation."
                .to_string(),
            input_schema: trade_schema(),
        },
        ToolDef {
            name: "close_position".to_string(),
            description: "Close (part of) the position on a market. WRITE: requires explicit \
                          user confirmation before invocation."
                .to_string(),
            input_schema: schema(
                json!({
                    "market": market_prop(),
                    "size": {"type": "number", "description": "Size to close; whole position when omitted"},
                    "price": {"type": "number", "description": "Limit price; market order when omitted"}
                }),
                &["market"],
            ),
        },
        ToolDef {
            name: "cancel_order".to_string(),
            description: "Cancel an order by contract order id. WRITE: requires explicit user \
                          confirmation before invocation."
                .to_string(),
            input_schema: schema(
                json!({
                    "market": market_prop(),
                    "order_id": {"type": "integer", "description": "Contract order id"}
                }),
                &["market", "order_id"],
            ),
        },
    ]
}

fn trade_schema() -> Value {
    schema(
        json!({
            "market": {"type": "integer", "description": "Perpetual market id"},
            "side": {"type": "string", "enum": ["long", "short"]},
            "size": {"type": "number"},
            "leverage": {"type": "number"},
            "price": {"type": "number", "description": "Limit price; market order when omitted"}
        }),
        &["market", "side", "size", "leverage"],
    )
}

fn schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_is_complete() {
        let names: Vec<String> = tool_catalogue().into_iter().map(|t| t.name).collect();
        let expected = [
            "account_summary",
            "positions",
            "markets",
            "open_orders",
            "funding_info",
            "liquidation_analysis",
            "trading_fees",
            "order_book",
            "recent_trades",
            "debug_transaction",
            "simulate_strategy",
            "dry_run_trade",
            "open_position",
            "close_position",
            "cancel_order",
        ];
        assert_eq!(names.len(), expected.len());
        for name in expected {
            assert!(names.contains(&name.to_string()), "missing tool {name}");
        }
    }

    #[test]
    fn test_write_tools_declare_confirmation_contract() {
        for tool in tool_catalogue() {
            let is_write = matches!(
                tool.name.as_str(),
                "open_position" | "close_position" | "cancel_order"
            );
            if is_write {
                assert!(
                    tool.description.contains("confirmation"),
                    "{} must carry the confirmation contract",
                    tool.name
                );
            }
        }
    }

    #[test]
    fn test_schemas_are_objects_with_required_lists() {
        for tool in tool_catalogue() {
            assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
            assert!(tool.input_schema["required"].is_array(), "{}", tool.name);
        }
    }

    #[test]
    fn test_require_side_accepts_aliases() {
        assert_eq!(require_side(&json!({"side": "long"})).unwrap(), Side::Long);
        assert_eq!(require_side(&json!({"side": "buy"})).unwrap(), Side::Long);
        assert_eq!(require_side(&json!({"side": "sell"})).unwrap(), Side::Short);
        assert!(require_side(&json!({})).is_err());
    }
}
