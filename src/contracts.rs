//! Contract Method Definitions
//!
//! Every read-only method the registry needs, declared as a `CallSpec`
//! (selector + ordered argument kinds + return shape). Selectors are
//! keccak256(signature)[..4], written out so no ABI machinery runs at
//! call time.
//!
//! Factory protocol generations disagree on three methods; those live in
//! two `MethodSet`s and the set is picked once, from the configured
//! protocol version.

use crate::types::ProtocolVersion;
use alloy::primitives::{keccak256, B256};
use once_cell::sync::Lazy;

/// Kind of a single 32-byte argument word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Address,
    Uint,
}

/// How the first return word is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    Address,
    Uint,
    String,
}

/// Declarative description of one contract method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSpec {
    pub name: &'static str,
    pub selector: [u8; 4],
    pub args: &'static [ArgKind],
    pub returns: ReturnShape,
}

impl CallSpec {
    pub const fn new(
        name: &'static str,
        selector: [u8; 4],
        args: &'static [ArgKind],
        returns: ReturnShape,
    ) -> Self {
        Self {
            name,
            selector,
            args,
            returns,
        }
    }
}

// ── V1 factory / exchange ────────────────────────────────────────────

/// tokenCount()
pub const V1_TOKEN_COUNT: CallSpec =
    CallSpec::new("tokenCount", [0x9f, 0x18, 0x1b, 0x5e], &[], ReturnShape::Uint);

/// getExchange(address token)
pub const V1_GET_EXCHANGE: CallSpec = CallSpec::new(
    "getExchange",
    [0x06, 0xf2, 0xbf, 0x62],
    &[ArgKind::Address],
    ReturnShape::Address,
);

/// getToken(address exchange)
pub const V1_GET_TOKEN: CallSpec = CallSpec::new(
    "getToken",
    [0x59, 0x77, 0x04, 0x38],
    &[ArgKind::Address],
    ReturnShape::Address,
);

/// getTokenWithId(uint256 id)
pub const V1_GET_TOKEN_WITH_ID: CallSpec = CallSpec::new(
    "getTokenWithId",
    [0xaa, 0x65, 0xa6, 0xc0],
    &[ArgKind::Uint],
    ReturnShape::Address,
);

/// factoryAddress() on a V1 exchange
pub const V1_FACTORY_ADDRESS: CallSpec =
    CallSpec::new("factoryAddress", [0x96, 0x6d, 0xae, 0x0e], &[], ReturnShape::Address);

/// tokenAddress() on a V1 exchange
pub const V1_TOKEN_ADDRESS: CallSpec =
    CallSpec::new("tokenAddress", [0x9d, 0x76, 0xea, 0x58], &[], ReturnShape::Address);

// ── V2 factory / pair ────────────────────────────────────────────────

/// allPairsLength()
pub const V2_ALL_PAIRS_LENGTH: CallSpec =
    CallSpec::new("allPairsLength", [0x57, 0x4f, 0x2b, 0xa3], &[], ReturnShape::Uint);

/// allPairs(uint256 index)
pub const V2_ALL_PAIRS: CallSpec = CallSpec::new(
    "allPairs",
    [0x1e, 0x3d, 0xd1, 0x8b],
    &[ArgKind::Uint],
    ReturnShape::Address,
);

/// factory() on a V2 pair
pub const V2_FACTORY: CallSpec =
    CallSpec::new("factory", [0xc4, 0x5a, 0x01, 0x55], &[], ReturnShape::Address);

/// token0() on a V2 pair
pub const V2_TOKEN0: CallSpec =
    CallSpec::new("token0", [0x0d, 0xfe, 0x16, 0x81], &[], ReturnShape::Address);

/// token1() on a V2 pair
pub const V2_TOKEN1: CallSpec =
    CallSpec::new("token1", [0xd2, 0x12, 0x20, 0xa7], &[], ReturnShape::Address);

// ── ERC20 ────────────────────────────────────────────────────────────

pub const ERC20_SYMBOL: CallSpec =
    CallSpec::new("symbol", [0x95, 0xd8, 0x9b, 0x41], &[], ReturnShape::String);

pub const ERC20_BALANCE_OF: CallSpec = CallSpec::new(
    "balanceOf",
    [0x70, 0xa0, 0x82, 0x31],
    &[ArgKind::Address],
    ReturnShape::Uint,
);

pub const ERC20_TOTAL_SUPPLY: CallSpec =
    CallSpec::new("totalSupply", [0x18, 0x16, 0x0d, 0xdd], &[], ReturnShape::Uint);

// ── Protocol selector sets ───────────────────────────────────────────

/// The methods whose selector depends on the factory generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSet {
    pub protocol: ProtocolVersion,
    /// Token count (V1) / pair count (V2)
    pub factory_token_count: CallSpec,
    /// Exchange by token (V1) / exchange by pair index (V2)
    pub factory_exchange: CallSpec,
    /// Exchange → its factory
    pub exchange_factory: CallSpec,
}

pub const V1_METHODS: MethodSet = MethodSet {
    protocol: ProtocolVersion::V1,
    factory_token_count: V1_TOKEN_COUNT,
    factory_exchange: V1_GET_EXCHANGE,
    exchange_factory: V1_FACTORY_ADDRESS,
};

pub const V2_METHODS: MethodSet = MethodSet {
    protocol: ProtocolVersion::V2,
    factory_token_count: V2_ALL_PAIRS_LENGTH,
    factory_exchange: V2_ALL_PAIRS,
    exchange_factory: V2_FACTORY,
};

impl MethodSet {
    pub fn for_protocol(protocol: ProtocolVersion) -> &'static MethodSet {
        match protocol {
            ProtocolVersion::V1 => &V1_METHODS,
            ProtocolVersion::V2 => &V2_METHODS,
        }
    }
}

// ── Creation events ──────────────────────────────────────────────────

/// NewExchange(address indexed token, address indexed exchange)
pub static NEW_EXCHANGE_TOPIC: Lazy<B256> =
    Lazy::new(|| keccak256(b"NewExchange(address,address)"));

/// PairCreated(address indexed token0, address indexed token1, address pair, uint256)
pub static PAIR_CREATED_TOPIC: Lazy<B256> =
    Lazy::new(|| keccak256(b"PairCreated(address,address,address,uint256)"));

/// Creation-event topic for a protocol generation
pub fn creation_topic(protocol: ProtocolVersion) -> B256 {
    match protocol {
        ProtocolVersion::V1 => *NEW_EXCHANGE_TOPIC,
        ProtocolVersion::V2 => *PAIR_CREATED_TOPIC,
    }
}
