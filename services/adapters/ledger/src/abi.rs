//! SimpleDEX and ERC-20 ABIs
//!
//! The exchange contract doubles as the LP token, so `balanceOf` and
//! `totalSupply` on the DEX address describe LP holdings.

use ethers::abi::{parse_abi, Abi, ParseError};
use ethers::types::H256;
use ethers::utils::keccak256;
use types::HistoryKind;

/// SimpleDEX exchange contract
pub const DEX_ABI: &[&str] = &[
    "function getReserves() view returns (uint256, uint256)",
    "function getSwapOutput(address tokenIn, uint256 amountIn) view returns (uint256)",
    "function swap(address tokenIn, uint256 amountIn) returns (uint256)",
    "function addLiquidity(uint256 amountA, uint256 amountB) returns (uint256)",
    "function removeLiquidity(uint256 liquidity) returns (uint256, uint256)",
    "function balanceOf(address owner) view returns (uint256)",
    "function totalSupply() view returns (uint256)",
    "event Swap(address indexed user, address tokenIn, uint256 amountIn, uint256 amountOut)",
    "event LiquidityAdded(address indexed provider, uint256 amountA, uint256 amountB, uint256 liquidity)",
    "event LiquidityRemoved(address indexed provider, uint256 amountA, uint256 amountB, uint256 liquidity)",
];

/// Pool tokens: only what the client calls
pub const ERC20_ABI: &[&str] = &[
    "function balanceOf(address owner) view returns (uint256)",
    "function approve(address spender, uint256 amount) returns (bool)",
];

/// Canonical event signatures
pub mod events {
    /// event Swap(address indexed user, address tokenIn, uint256 amountIn, uint256 amountOut)
    pub const SWAP: &str = "Swap(address,address,uint256,uint256)";
    /// event LiquidityAdded(address indexed provider, uint256 amountA, uint256 amountB, uint256 liquidity)
    pub const LIQUIDITY_ADDED: &str = "LiquidityAdded(address,uint256,uint256,uint256)";
    /// event LiquidityRemoved(address indexed provider, uint256 amountA, uint256 amountB, uint256 liquidity)
    pub const LIQUIDITY_REMOVED: &str = "LiquidityRemoved(address,uint256,uint256,uint256)";
}

pub fn dex_abi() -> Result<Abi, ParseError> {
    parse_abi(DEX_ABI)
}

pub fn erc20_abi() -> Result<Abi, ParseError> {
    parse_abi(ERC20_ABI)
}

/// Topic0 of the event backing a history kind
pub fn event_topic(kind: HistoryKind) -> H256 {
    let signature = match kind {
        HistoryKind::Swap => events::SWAP,
        HistoryKind::AddLiquidity => events::LIQUIDITY_ADDED,
        HistoryKind::RemoveLiquidity => events::LIQUIDITY_REMOVED,
    };
    H256::from(keccak256(signature.as_bytes()))
}
