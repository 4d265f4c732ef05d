//! Packed storage-word discovery.
//!
//! The exchange keeps markPNS, oraclePNS, markTimestamp, and (possibly)
//! oracleTimestamp packed into one 256-bit word per perpetual. Rather than
//! assuming a layout, the simulator discovers it on the fork:
//!
//! 1. trace `getPerpetualInfo` and collect the slots it SLOADs;
//! 2. for each candidate slot, zero it under a snapshot and check whether
//!    the reported mark price changes; that slot is the price word;
//! 3. probe 32-bit windows with distinctive values to locate each field;
//! 4. locate oracleTimestamp heuristically near markTimestamp, filtered by
//!    wall-clock plausibility.

use crate::error::{LiqError, LiqResult};
use crate::fork::AnvilFork;
use crate::window::{candidate_offsets, read_window, write_window};
use alloy::network::Ethereum;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::DynProvider;
use alloy::sol_types::SolCall;
use perpl_chain::abi::Exchange;
use perpl_core::{PerpetualId, Pns};
use tracing::{debug, info, warn};

/// Distinctive probe values, one per field, unlikely to collide with live
/// state.
const PROBE_MARK: u32 = 0x1A2B_3C01;
const PROBE_ORACLE: u32 = 0x1A2B_3C02;
const PROBE_MARK_TS: u32 = 0x1A2B_3C03;

/// Plausibility window for a timestamp field: within one year of wall-clock.
const TIMESTAMP_PLAUSIBLE_SECS: i64 = 365 * 24 * 3600;

/// Discovered layout of the packed price word.
///
/// Never cached across simulations; the exchange may be upgraded between
/// runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedPriceLayout {
    pub slot: U256,
    pub mark_offset: usize,
    /// Offset of oraclePNS; may coincide with the mark offset on
    /// deployments that alias the two.
    pub oracle_offset: Option<usize>,
    pub mark_ts_offset: Option<usize>,
    pub oracle_ts_offset: Option<usize>,
}

type ExchangeReader = Exchange::ExchangeInstance<DynProvider<Ethereum>>;

/// Run the full discovery for one perpetual.
pub async fn discover_layout(
    fork: &AnvilFork,
    exchange: Address,
    perp: PerpetualId,
) -> LiqResult<PackedPriceLayout> {
    let reader = Exchange::new(exchange, fork.provider().clone());
    let baseline = read_info(&reader, perp).await?;

    let slot = find_price_slot(fork, exchange, &reader, perp, baseline.markPNS).await?;
    let word = fork.get_storage(exchange, slot).await?;

    let mark_offset = probe_field(fork, exchange, &reader, perp, slot, word, PROBE_MARK, |info| {
        info.markPNS as i128
    })
    .await?
    .ok_or_else(|| {
        LiqError::SlotDiscoveryFailed("no 32-bit window moves markPNS".to_string())
    })?;

    let oracle_offset = probe_field(
        fork,
        exchange,
        &reader,
        perp,
        slot,
        word,
        PROBE_ORACLE,
        |info| info.oraclePNS as i128,
    )
    .await?;
    if oracle_offset.is_none() {
        warn!("oraclePNS window not found; oracle price will not be written");
    }

    let mark_ts_offset = probe_field(
        fork,
        exchange,
        &reader,
        perp,
        slot,
        word,
        PROBE_MARK_TS,
        |info| info.markTimestamp as i128,
    )
    .await?;
    if mark_ts_offset.is_none() {
        warn!("markTimestamp window not found; timestamps will not be refreshed");
    }

    let oracle_ts_offset = mark_ts_offset.and_then(|ts_offset| {
        locate_oracle_timestamp(word, ts_offset, mark_offset, oracle_offset)
    });

    let layout = PackedPriceLayout {
        slot,
        mark_offset,
        oracle_offset,
        mark_ts_offset,
        oracle_ts_offset,
    };
    info!(?layout, "Discovered packed price layout");
    Ok(layout)
}

/// Zero each SLOAD'd slot under a snapshot and watch for the mark to move.
async fn find_price_slot(
    fork: &AnvilFork,
    exchange: Address,
    reader: &ExchangeReader,
    perp: PerpetualId,
    baseline_mark: i64,
) -> LiqResult<U256> {
    let calldata = Exchange::getPerpetualInfoCall { perpId: perp }.abi_encode();
    let slots = fork.trace_sload_slots(exchange, calldata.into()).await?;
    if slots.is_empty() {
        return Err(LiqError::SlotDiscoveryFailed(
            "trace produced no SLOADs".to_string(),
        ));
    }

    for slot in slots {
        let moved = fork
            .with_snapshot(|| async {
                fork.set_storage(exchange, B256::from(slot), B256::ZERO)
                    .await?;
                let info = read_info(reader, perp).await?;
                Ok(info.markPNS != baseline_mark)
            })
            .await?;
        if moved {
            debug!(%slot, "Price slot identified");
            return Ok(slot);
        }
    }

    Err(LiqError::SlotDiscoveryFailed(
        "no traced slot affects markPNS".to_string(),
    ))
}

/// Probe 32-bit windows for the field read by `extract`.
async fn probe_field(
    fork: &AnvilFork,
    exchange: Address,
    reader: &ExchangeReader,
    perp: PerpetualId,
    slot: U256,
    word: U256,
    probe: u32,
    extract: impl Fn(&Exchange::PerpetualInfo) -> i128,
) -> LiqResult<Option<usize>> {
    for offset in candidate_offsets() {
        let matched = fork
            .with_snapshot(|| async {
                let probed = write_window(word, offset, probe);
                fork.set_storage(exchange, B256::from(slot), B256::from(probed))
                    .await?;
                let info = read_info(reader, perp).await?;
                Ok(extract(&info) == probe as i128)
            })
            .await?;
        if matched {
            return Ok(Some(offset));
        }
    }
    Ok(None)
}

/// Heuristic for oracleTimestamp: a window at +-32 or +-64 bits from
/// markTimestamp whose current value is a plausible wall-clock timestamp.
fn locate_oracle_timestamp(
    word: U256,
    mark_ts_offset: usize,
    mark_offset: usize,
    oracle_offset: Option<usize>,
) -> Option<usize> {
    let now = chrono::Utc::now().timestamp();
    for delta in [32i64, -32, 64, -64] {
        let offset = mark_ts_offset as i64 + delta;
        if !(0..=224).contains(&offset) {
            continue;
        }
        let offset = offset as usize;
        if offset == mark_offset || Some(offset) == oracle_offset {
            continue;
        }
        let value = read_window(word, offset) as i64;
        if (value - now).abs() <= TIMESTAMP_PLAUSIBLE_SECS {
            return Some(offset);
        }
    }
    None
}

/// Read-modify-write the packed word to set a mark (and oracle) price,
/// refreshing the timestamps, with a single storage write committing the
/// word.
pub async fn apply_price(
    fork: &AnvilFork,
    exchange: Address,
    layout: &PackedPriceLayout,
    price: Pns,
) -> LiqResult<()> {
    let pns = u32::try_from(price.0).map_err(|_| {
        LiqError::PriceVerificationFailed(format!("price {price} exceeds the 32-bit window"))
    })?;

    let mut word = fork.get_storage(exchange, layout.slot).await?;
    word = write_window(word, layout.mark_offset, pns);
    if let Some(oracle_offset) = layout.oracle_offset {
        if oracle_offset != layout.mark_offset {
            word = write_window(word, oracle_offset, pns);
        }
    }

    let now = chrono::Utc::now().timestamp() as u32;
    if let Some(ts_offset) = layout.mark_ts_offset {
        word = write_window(word, ts_offset, now);
    }
    if let Some(ts_offset) = layout.oracle_ts_offset {
        word = write_window(word, ts_offset, now);
    }

    fork.set_storage(exchange, B256::from(layout.slot), B256::from(word))
        .await?;

    // Read back to confirm the write took.
    let committed = fork.get_storage(exchange, layout.slot).await?;
    if read_window(committed, layout.mark_offset) != pns {
        return Err(LiqError::PriceVerificationFailed(format!(
            "mark window reads back {} after writing {pns}",
            read_window(committed, layout.mark_offset)
        )));
    }
    Ok(())
}

async fn read_info(
    reader: &ExchangeReader,
    perp: PerpetualId,
) -> LiqResult<Exchange::PerpetualInfo> {
    reader
        .getPerpetualInfo(perp)
        .call()
        .await
        .map_err(|e| LiqError::Rpc(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oracle_timestamp_heuristic_accepts_plausible_neighbor() {
        let now = chrono::Utc::now().timestamp() as u32;
        // markTimestamp at 96; plausible oracle timestamp at 128.
        let mut word = U256::ZERO;
        word = write_window(word, 96, now);
        word = write_window(word, 128, now - 30);

        let offset = locate_oracle_timestamp(word, 96, 0, Some(32));
        assert_eq!(offset, Some(128));
    }

    #[test]
    fn test_oracle_timestamp_heuristic_rejects_implausible() {
        // Neighbor windows hold prices, not timestamps.
        let mut word = U256::ZERO;
        word = write_window(word, 96, chrono::Utc::now().timestamp() as u32);
        word = write_window(word, 128, 950_000);
        word = write_window(word, 64, 949_900);

        assert_eq!(locate_oracle_timestamp(word, 96, 0, Some(32)), None);
    }

    #[test]
    fn test_oracle_timestamp_skips_known_price_offsets() {
        let now = chrono::Utc::now().timestamp() as u32;
        let mut word = U256::ZERO;
        // Plausible value sits at the oracle-price offset; must be skipped.
        word = write_window(word, 128, now);
        word = write_window(word, 160, now - 5);

        let offset = locate_oracle_timestamp(word, 96, 0, Some(128));
        assert_eq!(offset, Some(160));
    }
}
