//! Fork-based liquidation verifier.
//!
//! Sweeps mark prices across a window around the current mark, finds the
//! bracketing (safe, liquidatable) pair, then binary-searches the exact
//! boundary under the contract's own solvency rule. Every snapshot is paired
//! with exactly one revert, on success and error paths alike; the anvil
//! child is terminated on every exit path.

use crate::config::LiqConfig;
use crate::discovery::{apply_price, discover_layout, PackedPriceLayout};
use crate::error::{LiqError, LiqResult};
use crate::fork::AnvilFork;
use crate::math::{closed_form_liquidation_price, Side};
use alloy::primitives::Address;
use perpl_chain::ChainClient;
use perpl_core::{AccountId, PerpetualId, Pns, PositionKind};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// One sweep sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepPoint {
    pub price: f64,
    pub liquidatable: bool,
}

/// Outcome of a simulation.
#[derive(Debug, Clone, Serialize)]
pub struct LiquidationReport {
    pub perpetual: PerpetualId,
    pub account: AccountId,
    pub side: Side,
    pub entry_price: f64,
    pub size: f64,
    pub collateral: f64,
    pub current_mark: f64,
    /// Closed-form estimate.
    pub math_price: f64,
    /// Fork-verified boundary.
    pub fork_price: f64,
    /// fork - math.
    pub divergence_abs: f64,
    /// Divergence relative to the closed form, percent.
    pub divergence_pct: f64,
    /// The position was liquidatable at the current mark; the sweep was
    /// skipped and the mark reported as the boundary.
    pub already_liquidatable: bool,
}

/// Fork-based liquidation simulator.
pub struct LiquidationSimulator {
    config: LiqConfig,
    /// Upstream RPC the fork is created from.
    fork_url: String,
    exchange: Address,
}

impl LiquidationSimulator {
    pub fn new(config: LiqConfig, fork_url: impl Into<String>, exchange: Address) -> Self {
        Self {
            config,
            fork_url: fork_url.into(),
            exchange,
        }
    }

    /// Run one simulation. Owns the anvil child for the duration; the
    /// process is killed before returning on every path.
    pub async fn simulate(
        &self,
        perp: PerpetualId,
        account: AccountId,
    ) -> LiqResult<LiquidationReport> {
        let fork = AnvilFork::spawn(
            &self.config.anvil_path,
            &self.fork_url,
            Duration::from_millis(self.config.anvil_timeout_ms),
        )
        .await?;

        let result = self.simulate_on(&fork, perp, account).await;
        fork.shutdown().await;
        result
    }

    async fn simulate_on(
        &self,
        fork: &AnvilFork,
        perp: PerpetualId,
        account: AccountId,
    ) -> LiqResult<LiquidationReport> {
        let chain = ChainClient::from_provider(fork.provider().clone(), self.exchange);

        let perp_info = chain.get_perpetual_info(perp).await?;
        let view = chain.get_position(perp, account).await?;
        let position = &view.position;

        let side = match position.kind {
            PositionKind::Long => Side::Long,
            PositionKind::Short => Side::Short,
            PositionKind::None => return Err(LiqError::NoPosition { perpetual: perp, account }),
        };
        if position.lot_lns.is_zero() {
            return Err(LiqError::NoPosition { perpetual: perp, account });
        }

        let decimals = perp_info.price_decimals;
        let entry_price = position.entry_price_pns.to_price(decimals);
        let size = position.lot_lns.abs().to_lot(perp_info.lot_decimals);
        let collateral = position.deposit_cns.to_amount();
        let current_mark = view.mark_pns.to_price(decimals);
        let maintenance = self.config.maintenance_margin;

        let math_price =
            closed_form_liquidation_price(entry_price, size, collateral, maintenance, side);
        info!(
            perp,
            account,
            ?side,
            entry_price,
            size,
            collateral,
            math_price,
            "Closed-form liquidation estimate"
        );

        // Already liquidatable: the current mark is the boundary; skip the
        // sweep entirely.
        if check_liquidatable(&chain, perp, account, maintenance).await? {
            return Ok(build_report(
                perp,
                account,
                side,
                entry_price,
                size,
                collateral,
                current_mark,
                math_price,
                current_mark,
                true,
            ));
        }

        // Layout discovery is re-run per simulation; never cached.
        let layout = discover_layout(fork, self.exchange, perp).await?;

        let points = self
            .coarse_sweep(
                fork,
                &chain,
                &layout,
                perp,
                account,
                current_mark,
                decimals,
                maintenance,
            )
            .await?;

        let (mut liq_price, mut safe_price) =
            find_boundary(&points, side).ok_or(LiqError::SweepNoBoundary)?;
        debug!(liq_price, safe_price, "Sweep boundary bracket");

        for _ in 0..self.config.binary_search_iterations {
            let mid = (liq_price + safe_price) / 2.0;
            let liquidatable = self
                .check_at_price(fork, &chain, &layout, perp, account, mid, decimals, maintenance)
                .await?;
            if liquidatable {
                liq_price = mid;
            } else {
                safe_price = mid;
            }
        }
        let fork_price = (liq_price + safe_price) / 2.0;

        Ok(build_report(
            perp,
            account,
            side,
            entry_price,
            size,
            collateral,
            current_mark,
            math_price,
            fork_price,
            false,
        ))
    }

    /// Sample `price_steps` points uniformly across the configured window.
    #[allow(clippy::too_many_arguments)]
    async fn coarse_sweep(
        &self,
        fork: &AnvilFork,
        chain: &ChainClient,
        layout: &PackedPriceLayout,
        perp: PerpetualId,
        account: AccountId,
        current_mark: f64,
        decimals: u32,
        maintenance: f64,
    ) -> LiqResult<Vec<SweepPoint>> {
        let prices = sweep_prices(current_mark, self.config.price_range_pct, self.config.price_steps);
        let mut points = Vec::with_capacity(prices.len());

        for price in prices {
            let liquidatable = self
                .check_at_price(fork, chain, layout, perp, account, price, decimals, maintenance)
                .await?;
            points.push(SweepPoint {
                price,
                liquidatable,
            });
        }

        debug!(
            total = points.len(),
            liquidatable = points.iter().filter(|p| p.liquidatable).count(),
            "Coarse sweep complete"
        );
        Ok(points)
    }

    /// Write one hypothetical mark and evaluate solvency, under a balanced
    /// snapshot/revert pair.
    #[allow(clippy::too_many_arguments)]
    async fn check_at_price(
        &self,
        fork: &AnvilFork,
        chain: &ChainClient,
        layout: &PackedPriceLayout,
        perp: PerpetualId,
        account: AccountId,
        price: f64,
        decimals: u32,
        maintenance: f64,
    ) -> LiqResult<bool> {
        let pns = Pns::from_price(price, decimals)
            .map_err(|e| LiqError::PriceVerificationFailed(e.to_string()))?;
        fork.with_snapshot(|| async {
            apply_price(fork, self.exchange, layout, pns).await?;
            check_liquidatable(chain, perp, account, maintenance).await
        })
        .await
    }
}

/// The contract's own solvency rule: equity (deposit + PnL) below the
/// maintenance fraction of the position's value at the reported mark.
async fn check_liquidatable(
    chain: &ChainClient,
    perp: PerpetualId,
    account: AccountId,
    maintenance: f64,
) -> LiqResult<bool> {
    let view = chain.get_position(perp, account).await?;
    let equity = view.position.equity_cns().0 as f64;
    let value = view.position.value_cns(view.mark_pns).0 as f64;
    Ok(equity < maintenance * value)
}

/// Uniform sweep points across `[mark*(1-r), mark*(1+r)]`.
pub fn sweep_prices(mark: f64, range_pct: f64, steps: usize) -> Vec<f64> {
    if steps == 0 {
        return Vec::new();
    }
    let r = range_pct / 100.0;
    let low = mark * (1.0 - r);
    let high = mark * (1.0 + r);
    if steps == 1 {
        return vec![mark];
    }
    (0..steps)
        .map(|i| low + (high - low) * i as f64 / (steps - 1) as f64)
        .collect()
}

/// Find the bracketing (liquidatable, safe) pair around the boundary.
///
/// Points are sorted by price. For a long the safe side is the higher price;
/// for a short it is the lower. Returns None when every point is safe or
/// every point is liquidatable.
pub fn find_boundary(points: &[SweepPoint], side: Side) -> Option<(f64, f64)> {
    let mut sorted: Vec<SweepPoint> = points.to_vec();
    sorted.sort_by(|a, b| a.price.total_cmp(&b.price));

    match side {
        Side::Long => sorted
            .windows(2)
            .find(|w| w[0].liquidatable && !w[1].liquidatable)
            .map(|w| (w[0].price, w[1].price)),
        Side::Short => sorted
            .windows(2)
            .find(|w| !w[0].liquidatable && w[1].liquidatable)
            .map(|w| (w[1].price, w[0].price)),
    }
}

#[allow(clippy::too_many_arguments)]
fn build_report(
    perpetual: PerpetualId,
    account: AccountId,
    side: Side,
    entry_price: f64,
    size: f64,
    collateral: f64,
    current_mark: f64,
    math_price: f64,
    fork_price: f64,
    already_liquidatable: bool,
) -> LiquidationReport {
    let divergence_abs = fork_price - math_price;
    let divergence_pct = if math_price == 0.0 {
        0.0
    } else {
        divergence_abs / math_price * 100.0
    };
    LiquidationReport {
        perpetual,
        account,
        side,
        entry_price,
        size,
        collateral,
        current_mark,
        math_price,
        fork_price,
        divergence_abs,
        divergence_pct,
        already_liquidatable,
    }
}
