//! Order-book reconstruction from the contract's walk primitives.
//!
//! Without indexer support, L2 levels are rebuilt by walking price offsets:
//! bids from the best bid downward, asks from the worst ask downward keeping
//! the last N levels, which are the ones closest to the spread. An empty book
//! is signalled by both summary offsets being zero and performs no walker
//! calls at all.

use crate::error::ChainResult;
use perpl_core::{Lns, Ons, Perpetual, PerpetualId, Pns};
use tracing::debug;

/// The two walk primitives the contract exposes.
///
/// Abstracted so the walk logic is testable against an in-memory book.
pub trait BookSource {
    /// Resting volume at a book price offset.
    fn volume_at(
        &self,
        perp: PerpetualId,
        ons: Ons,
    ) -> impl std::future::Future<Output = ChainResult<Lns>> + Send;

    /// Next lower offset with resting orders; zero when none remain.
    fn next_below(
        &self,
        perp: PerpetualId,
        ons: Ons,
    ) -> impl std::future::Future<Output = ChainResult<Ons>> + Send;
}

/// One reconstructed book level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookLevelView {
    pub ons: Ons,
    pub price_pns: Pns,
    pub volume_lns: Lns,
}

/// Reconstructed book, best levels first on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookView {
    pub bids: Vec<BookLevelView>,
    pub asks: Vec<BookLevelView>,
    pub total_orders: u64,
    /// Best ask minus best bid; None when either side is empty.
    pub spread_pns: Option<i64>,
}

/// Walk the book for `perp`, keeping up to `depth` levels per side.
pub async fn walk_book<S: BookSource>(
    source: &S,
    perp: &Perpetual,
    depth: usize,
) -> ChainResult<BookView> {
    if perp.book_is_empty() {
        debug!(perp = perp.id, "Book summary empty, skipping walk");
        return Ok(BookView {
            bids: Vec::new(),
            asks: Vec::new(),
            total_orders: perp.total_orders,
            spread_pns: None,
        });
    }

    let bids = walk_bids(source, perp, depth).await?;
    let asks = walk_asks(source, perp, depth).await?;

    let spread_pns = match (bids.first(), asks.first()) {
        (Some(bid), Some(ask)) => Some(ask.price_pns.0 - bid.price_pns.0),
        _ => None,
    };

    Ok(BookView {
        bids,
        asks,
        total_orders: perp.total_orders,
        spread_pns,
    })
}

/// Bids: start at the best bid and walk down; the first `depth` levels are
/// the closest to the spread.
async fn walk_bids<S: BookSource>(
    source: &S,
    perp: &Perpetual,
    depth: usize,
) -> ChainResult<Vec<BookLevelView>> {
    let mut levels = Vec::new();
    if perp.max_bid_ons.is_zero() || depth == 0 {
        return Ok(levels);
    }

    let mut cur = perp.max_bid_ons;
    loop {
        let volume = source.volume_at(perp.id, cur).await?;
        if volume.0 > 0 {
            levels.push(BookLevelView {
                ons: cur,
                price_pns: cur.to_pns(perp.base_price_pns),
                volume_lns: volume,
            });
            if levels.len() >= depth {
                break;
            }
        }
        let next = source.next_below(perp.id, cur).await?;
        if next.is_zero() {
            break;
        }
        cur = next;
    }

    Ok(levels)
}

/// Asks: start at the worst (highest) ask and walk down, keeping only the
/// last `depth` levels seen; those are the lowest-priced, closest to the
/// spread. Returned best (lowest) first.
async fn walk_asks<S: BookSource>(
    source: &S,
    perp: &Perpetual,
    depth: usize,
) -> ChainResult<Vec<BookLevelView>> {
    let mut seen: Vec<BookLevelView> = Vec::new();
    if perp.max_ask_ons.is_zero() || depth == 0 {
        return Ok(seen);
    }

    let mut cur = perp.max_ask_ons;
    loop {
        let volume = source.volume_at(perp.id, cur).await?;
        if volume.0 > 0 {
            seen.push(BookLevelView {
                ons: cur,
                price_pns: cur.to_pns(perp.base_price_pns),
                volume_lns: volume,
            });
        }
        let next = source.next_below(perp.id, cur).await?;
        if next.is_zero() || next < perp.min_ask_ons {
            break;
        }
        cur = next;
    }

    // Keep the tail of the walk and flip to best-first.
    let keep = seen.len().saturating_sub(depth);
    let mut levels: Vec<BookLevelView> = seen.split_off(keep);
    levels.reverse();
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory book: offset -> volume, walked high to low.
    struct FakeBook {
        levels: BTreeMap<i64, i64>,
        calls: AtomicUsize,
    }

    impl FakeBook {
        fn new(levels: &[(i64, i64)]) -> Self {
            Self {
                levels: levels.iter().copied().collect(),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::Relaxed)
        }
    }

    impl BookSource for FakeBook {
        async fn volume_at(&self, _perp: PerpetualId, ons: Ons) -> ChainResult<Lns> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(Lns(self.levels.get(&ons.0).copied().unwrap_or(0)))
        }

        async fn next_below(&self, _perp: PerpetualId, ons: Ons) -> ChainResult<Ons> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(Ons(self
                .levels
                .range(..ons.0)
                .next_back()
                .map(|(k, _)| *k)
                .unwrap_or(0)))
        }
    }

    fn perp(max_bid: i64, min_bid: i64, max_ask: i64, min_ask: i64) -> Perpetual {
        Perpetual {
            id: 16,
            name: "Bitcoin".to_string(),
            symbol: "BTC".to_string(),
            price_decimals: 1,
            lot_decimals: 5,
            base_price_pns: Pns(900000),
            mark_pns: Pns(950000),
            oracle_pns: Pns(950000),
            mark_timestamp: 0,
            oracle_timestamp: 0,
            funding_per_100k: 0,
            open_interest_long: Lns(0),
            open_interest_short: Lns(0),
            max_bid_ons: Ons(max_bid),
            min_bid_ons: Ons(min_bid),
            max_ask_ons: Ons(max_ask),
            min_ask_ons: Ons(min_ask),
            total_orders: 12,
            paused: false,
        }
    }

    #[tokio::test]
    async fn test_empty_book_makes_no_walker_calls() {
        let book = FakeBook::new(&[]);
        let view = walk_book(&book, &perp(0, 0, 0, 0), 5).await.unwrap();
        assert!(view.bids.is_empty());
        assert!(view.asks.is_empty());
        assert_eq!(view.total_orders, 12);
        assert_eq!(view.spread_pns, None);
        assert_eq!(book.call_count(), 0);
    }

    #[tokio::test]
    async fn test_ask_walk_keeps_levels_closest_to_spread() {
        // Five ask levels; depth 3 must keep the three lowest-priced.
        let book = FakeBook::new(&[
            (60000, 10000),
            (58000, 10000),
            (55000, 10000),
            (53000, 10000),
            (51000, 10000),
        ]);
        let perp = perp(0, 0, 60000, 51000);
        // Book is not empty (max ask set), so asks are walked.
        let view = walk_book(&book, &perp, 3).await.unwrap();

        let offsets: Vec<i64> = view.asks.iter().map(|l| l.ons.0).collect();
        assert_eq!(offsets, vec![51000, 53000, 55000]);
        assert!(view.asks.iter().all(|l| l.volume_lns == Lns(10000)));
    }

    #[tokio::test]
    async fn test_bid_walk_takes_top_levels() {
        let book = FakeBook::new(&[(49000, 100), (48000, 200), (47000, 300), (46000, 400)]);
        let perp = perp(49000, 46000, 0, 0);
        let view = walk_book(&book, &perp, 2).await.unwrap();

        let offsets: Vec<i64> = view.bids.iter().map(|l| l.ons.0).collect();
        assert_eq!(offsets, vec![49000, 48000]);
    }

    #[tokio::test]
    async fn test_spread_and_prices() {
        let book = FakeBook::new(&[(49000, 100), (51000, 150)]);
        let perp = perp(49000, 49000, 51000, 51000);
        let view = walk_book(&book, &perp, 4).await.unwrap();

        assert_eq!(view.bids[0].price_pns, Pns(949000));
        assert_eq!(view.asks[0].price_pns, Pns(951000));
        assert_eq!(view.spread_pns, Some(2000));
    }

    #[tokio::test]
    async fn test_skips_empty_levels() {
        let book = FakeBook::new(&[(49000, 0), (48000, 500)]);
        let perp = perp(49000, 48000, 0, 0);
        let view = walk_book(&book, &perp, 3).await.unwrap();

        let offsets: Vec<i64> = view.bids.iter().map(|l| l.ons.0).collect();
        assert_eq!(offsets, vec![48000]);
    }
}
