//! Per-operation path policy.

/// Routed operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Open, close, cancel. Never the API; order ids stay authoritative.
    SubmitOrder,
    /// Open-orders read. Ids must come from the contract.
    OpenOrders,
    /// Current positions; the API batches N perpetuals in one call.
    Positions,
    /// Orders/fills/positions/account history; the contract offers no
    /// history query.
    History,
    /// Market and perpetual info; canonical on chain, no freshness
    /// ambiguity.
    MarketInfo,
    /// Current mark and oracle for liquidation math; authoritative on chain.
    LiquidationRead,
    /// Fee schedule.
    Fees,
}

/// Resolution paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Path {
    ContractOnly,
    ApiOnly,
    /// API when an authenticated session exists, contract fallback.
    PreferApi,
    /// Trading socket when attached and authenticated, contract otherwise,
    /// including transparently when trading authentication failed.
    WsThenContract,
}

/// The policy table.
pub fn route(op: Operation) -> Path {
    match op {
        Operation::SubmitOrder => Path::WsThenContract,
        Operation::OpenOrders => Path::ContractOnly,
        Operation::Positions => Path::PreferApi,
        Operation::History => Path::ApiOnly,
        Operation::MarketInfo => Path::ContractOnly,
        Operation::LiquidationRead => Path::ContractOnly,
        Operation::Fees => Path::ContractOnly,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_writes_prefer_socket_then_contract() {
        assert_eq!(route(Operation::SubmitOrder), Path::WsThenContract);
    }

    #[test]
    fn test_authoritative_ids_never_route_to_api() {
        assert_eq!(route(Operation::OpenOrders), Path::ContractOnly);
        // Neither write delivery path ever consults the API.
        assert_ne!(route(Operation::SubmitOrder), Path::ApiOnly);
        assert_ne!(route(Operation::SubmitOrder), Path::PreferApi);
    }

    #[test]
    fn test_history_is_api_only() {
        assert_eq!(route(Operation::History), Path::ApiOnly);
    }

    #[test]
    fn test_positions_prefer_api() {
        assert_eq!(route(Operation::Positions), Path::PreferApi);
    }

    #[test]
    fn test_reference_reads_are_contract() {
        assert_eq!(route(Operation::MarketInfo), Path::ContractOnly);
        assert_eq!(route(Operation::LiquidationRead), Path::ContractOnly);
        assert_eq!(route(Operation::Fees), Path::ContractOnly);
    }
}
