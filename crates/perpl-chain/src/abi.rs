//! Generated contract bindings and conversions to domain types.

use crate::error::{ChainError, ChainResult};
use alloy::sol;
use perpl_core::{
    Account, Cns, LeverageHdths, Lns, Ons, Order, OrderDescriptor, OrderFlags, OrderKind,
    OrderStatus, Perpetual, Pns, Position, PositionKind,
};

sol! {
    #[derive(Debug)]
    #[sol(rpc)]
    contract Exchange {
        struct OrderDesc {
            uint64 descId;
            uint64 perpId;
            uint8 orderType;
            uint64 orderId;
            int64 pricePNS;
            int64 lotLNS;
            uint64 expiryBlock;
            bool postOnly;
            bool fillOrKill;
            bool immediateOrCancel;
            uint32 maxMatches;
            uint32 leverageHdths;
            uint64 lastExecutionBlock;
            uint128 amountCNS;
        }

        struct AccountInfo {
            uint64 id;
            address owner;
            uint128 balanceCNS;
            uint128 lockedBalanceCNS;
        }

        struct PositionInfo {
            uint64 perpId;
            uint64 accountId;
            uint8 positionType;
            int64 entryPricePNS;
            int64 lotLNS;
            uint128 depositCNS;
            int128 pnlCNS;
        }

        struct PerpetualInfo {
            uint64 id;
            string name;
            string symbol;
            uint32 priceDecimals;
            uint32 lotDecimals;
            int64 basePricePNS;
            int64 markPNS;
            int64 oraclePNS;
            uint64 markTimestamp;
            uint64 oracleTimestamp;
            int64 fundingPer100k;
            int64 openInterestLongLNS;
            int64 openInterestShortLNS;
            int64 maxBidPriceONS;
            int64 minBidPriceONS;
            int64 maxAskPriceONS;
            int64 minAskPriceONS;
            uint64 totalOrders;
            bool paused;
        }

        struct OpenOrder {
            uint64 orderId;
            uint8 orderType;
            int64 pricePNS;
            int64 lotLNS;
            uint32 leverageHdths;
            uint32 flags;
            uint64 expiryBlock;
        }

        function getAccountById(uint64 accountId) external view returns (AccountInfo memory);
        function getAccountByAddress(address owner) external view returns (AccountInfo memory);
        function getPerpetualInfo(uint64 perpId) external view returns (PerpetualInfo memory);
        function getPosition(uint64 perpId, uint64 accountId)
            external view returns (PositionInfo memory, int64 markPricePNS, bool markPriceValid);
        function getOpenOrders(uint64 perpId, uint64 accountId)
            external view returns (OpenOrder[] memory);
        function getVolumeAtBookPrice(uint64 perpId, int64 ons) external view returns (int64);
        function getNextPriceBelowWithOrders(uint64 perpId, int64 ons) external view returns (int64);
        function getTakerFee() external view returns (uint32);
        function getMakerFee() external view returns (uint32);

        function execOrder(OrderDesc calldata desc) external;
        function execOrders(OrderDesc[] calldata descs, bool revertOnFail) external;
        function depositCollateral(uint64 accountId, uint128 amountCNS) external;
        function increasePositionCollateral(uint64 perpId, uint128 amountCNS) external;
        function requestDecreasePositionCollateral(uint64 perpId, uint128 amountCNS) external;
        function decreasePositionCollateral(uint64 perpId, uint128 amountCNS, bool clampToMaximum) external;
    }

    /// Owner/operator proxy. The owner deploys it and allowlists trading
    /// selectors; operator-keyed transactions are rejected unless they target
    /// an allowlisted selector.
    #[derive(Debug)]
    #[sol(rpc)]
    contract AccountProxy {
        function forwardCall(address target, bytes calldata data) external returns (bytes memory);
        function setOperatorAllowlist(address operator, bytes4[] calldata selectors, bool allowed) external;
        function owner() external view returns (address);
    }
}

impl TryFrom<&OrderDescriptor> for Exchange::OrderDesc {
    type Error = ChainError;

    fn try_from(desc: &OrderDescriptor) -> ChainResult<Self> {
        let amount = u128::try_from(desc.amount_cns.0)
            .map_err(|_| ChainError::OutOfRange(format!("amountCNS {}", desc.amount_cns)))?;
        Ok(Self {
            descId: desc.descriptor_id,
            perpId: desc.perpetual,
            orderType: desc.kind.contract_code(),
            orderId: desc.order_id,
            pricePNS: desc.price_pns.0,
            lotLNS: desc.lot_lns.0,
            expiryBlock: desc.expiry_block,
            postOnly: desc.flags.post_only,
            fillOrKill: desc.flags.fill_or_kill,
            immediateOrCancel: desc.flags.immediate_or_cancel,
            maxMatches: desc.max_matches,
            leverageHdths: desc.leverage_hdths.0,
            lastExecutionBlock: desc.last_execution_block,
            amountCNS: amount,
        })
    }
}

impl TryFrom<&Exchange::OrderDesc> for OrderDescriptor {
    type Error = ChainError;

    fn try_from(desc: &Exchange::OrderDesc) -> ChainResult<Self> {
        let kind = OrderKind::from_contract_code(desc.orderType)
            .map_err(|e| ChainError::OutOfRange(e.to_string()))?;
        Ok(Self {
            descriptor_id: desc.descId,
            perpetual: desc.perpId,
            kind,
            order_id: desc.orderId,
            price_pns: Pns(desc.pricePNS),
            lot_lns: Lns(desc.lotLNS),
            expiry_block: desc.expiryBlock,
            flags: OrderFlags {
                post_only: desc.postOnly,
                fill_or_kill: desc.fillOrKill,
                immediate_or_cancel: desc.immediateOrCancel,
            },
            max_matches: desc.maxMatches,
            leverage_hdths: LeverageHdths(desc.leverageHdths),
            last_execution_block: desc.lastExecutionBlock,
            amount_cns: Cns(desc.amountCNS as i128),
        })
    }
}

impl From<Exchange::AccountInfo> for Account {
    fn from(info: Exchange::AccountInfo) -> Self {
        Self {
            id: info.id,
            owner: format!("{:#x}", info.owner),
            balance_cns: Cns(info.balanceCNS as i128),
            locked_balance_cns: Cns(info.lockedBalanceCNS as i128),
        }
    }
}

impl From<Exchange::PositionInfo> for Position {
    fn from(info: Exchange::PositionInfo) -> Self {
        Self {
            perpetual: info.perpId,
            account: info.accountId,
            kind: PositionKind::from_code(info.positionType),
            entry_price_pns: Pns(info.entryPricePNS),
            lot_lns: Lns(info.lotLNS),
            deposit_cns: Cns(info.depositCNS as i128),
            realized_pnl_cns: Cns::ZERO,
            unrealized_pnl_cns: Cns(info.pnlCNS),
        }
    }
}

impl From<Exchange::PerpetualInfo> for Perpetual {
    fn from(info: Exchange::PerpetualInfo) -> Self {
        Self {
            id: info.id,
            name: info.name,
            symbol: info.symbol,
            price_decimals: info.priceDecimals,
            lot_decimals: info.lotDecimals,
            base_price_pns: Pns(info.basePricePNS),
            mark_pns: Pns(info.markPNS),
            oracle_pns: Pns(info.oraclePNS),
            mark_timestamp: info.markTimestamp,
            oracle_timestamp: info.oracleTimestamp,
            funding_per_100k: info.fundingPer100k,
            open_interest_long: Lns(info.openInterestLongLNS),
            open_interest_short: Lns(info.openInterestShortLNS),
            max_bid_ons: Ons(info.maxBidPriceONS),
            min_bid_ons: Ons(info.minBidPriceONS),
            max_ask_ons: Ons(info.maxAskPriceONS),
            min_ask_ons: Ons(info.minAskPriceONS),
            total_orders: info.totalOrders,
            paused: info.paused,
        }
    }
}

impl Exchange::OpenOrder {
    /// Domain view of an on-chain open order.
    pub fn into_order(
        self,
        perpetual: perpl_core::PerpetualId,
        account: perpl_core::AccountId,
    ) -> ChainResult<Order> {
        let kind = OrderKind::from_contract_code(self.orderType)
            .map_err(|e| ChainError::OutOfRange(e.to_string()))?;
        Ok(Order {
            order_id: self.orderId,
            perpetual,
            account,
            kind,
            price_pns: Pns(self.pricePNS),
            lot_lns: Lns(self.lotLNS),
            leverage_hdths: LeverageHdths(self.leverageHdths),
            flags: OrderFlags::from_bits(self.flags),
            expiry_block: self.expiryBlock,
            status: OrderStatus::Open,
        })
    }
}
