//! Interface panels
//!
//! Each panel holds the typed inputs of one action, clamps them to the
//! best-known balance, keeps its advisory read (quote or withdrawal preview)
//! debounced and owns one [`MutationSequencer`]. Inputs are edited through
//! `&mut self`; a panel has exactly one user.

use crate::cache::{CacheKey, ReadState, ReadStateCache};
use crate::connection::ConnectionManager;
use crate::debounce::DebouncedRead;
use crate::sequencer::{MutationRequest, MutationSequencer};
use ethers::types::U256;
use ledger::LedgerError;
use simpledex_amm::{
    clamp_to_balance, parse_amount, to_wei, AmountError, Decimal, PoolMath, QuickFill,
};
use simpledex_config::{DebounceConfig, SequencerConfig};
use tokio::sync::watch;
use types::{
    BalanceSnapshot, GuardRejection, LpPosition, MutationJob, MutationOutcome, ReserveSnapshot,
    SwapDirection, TokenId,
};

/// Fraction digits kept by swap and add-liquidity quick-fill
pub const TOKEN_FILL_DECIMALS: u32 = 6;

/// Fraction digits kept by remove-liquidity quick-fill
pub const LP_FILL_DECIMALS: u32 = 4;

/// Parse typed text into wei
pub fn parse_input(text: &str) -> Result<U256, GuardRejection> {
    parse_amount(text)
        .and_then(to_wei)
        .map_err(|e| match e {
            AmountError::Empty => GuardRejection::EmptyInput,
            _ => GuardRejection::InvalidNumber(text.trim().to_string()),
        })
}

/// Lookups into the read-state cache for the current session
#[derive(Clone)]
struct Balances {
    connection: ConnectionManager,
    cache: ReadStateCache,
}

impl Balances {
    fn token(&self, token: TokenId) -> Option<U256> {
        let account = self.connection.current()?.account;
        self.cache
            .peek::<BalanceSnapshot>(CacheKey::Balances(account))
            .filter(ReadState::is_known)
            .map(|state| state.value.balance_of(token))
    }

    fn lp(&self) -> Option<U256> {
        let account = self.connection.current()?.account;
        self.cache
            .peek::<LpPosition>(CacheKey::LpPosition(account))
            .filter(ReadState::is_known)
            .map(|state| state.value.lp_balance)
    }

    fn reserves(&self) -> Option<ReserveSnapshot> {
        self.cache
            .peek::<ReserveSnapshot>(CacheKey::Reserves)
            .filter(ReadState::is_known)
            .map(|state| state.value)
    }
}

fn clamp_known(amount: U256, balance: Option<U256>) -> U256 {
    match balance {
        Some(balance) => clamp_to_balance(amount, balance),
        None => amount,
    }
}

pub struct SwapPanel {
    balances: Balances,
    sequencer: MutationSequencer,
    direction: SwapDirection,
    amount_in: U256,
    quote: DebouncedRead<(TokenId, U256), U256>,
}

impl SwapPanel {
    pub fn new(
        connection: ConnectionManager,
        cache: ReadStateCache,
        sequencer: &SequencerConfig,
        debounce: &DebounceConfig,
    ) -> Self {
        let quote_connection = connection.clone();
        let quote = DebouncedRead::new(
            "swap quote",
            debounce.quote(),
            move |(token_in, amount_in): (TokenId, U256)| {
                let session = quote_connection.current();
                async move {
                    let session = session.ok_or(LedgerError::NoAccounts)?;
                    session.reader.swap_quote(token_in, amount_in).await
                }
            },
        );

        Self {
            sequencer: MutationSequencer::new(connection.clone(), cache.clone(), sequencer.clone()),
            balances: Balances { connection, cache },
            direction: SwapDirection::AToB,
            amount_in: U256::zero(),
            quote,
        }
    }

    pub fn direction(&self) -> SwapDirection {
        self.direction
    }

    /// Flip the direction; the typed amount and quote are discarded
    pub fn toggle_direction(&mut self) -> SwapDirection {
        self.direction = self.direction.reversed();
        self.amount_in = U256::zero();
        self.quote.clear();
        self.direction
    }

    pub fn amount_in(&self) -> U256 {
        self.amount_in
    }

    /// Set the input amount from typed text, clamped to the in-token balance
    pub fn set_amount(&mut self, text: &str) -> Result<U256, GuardRejection> {
        match parse_input(text) {
            Ok(amount) => Ok(self.apply_amount(amount)),
            Err(e) => {
                self.apply_amount(U256::zero());
                Err(e)
            }
        }
    }

    pub fn quick_fill(&mut self, fill: QuickFill) -> U256 {
        let balance = self.balances.token(self.direction.token_in()).unwrap_or_default();
        self.apply_amount(fill.apply(balance, TOKEN_FILL_DECIMALS))
    }

    fn apply_amount(&mut self, amount: U256) -> U256 {
        let amount = clamp_known(amount, self.balances.token(self.direction.token_in()));
        self.amount_in = amount;
        if amount.is_zero() {
            self.quote.clear();
        } else {
            self.quote.set_input((self.direction.token_in(), amount));
        }
        amount
    }

    /// Debounced advisory output
    pub fn quote(&self) -> ReadState<U256> {
        self.quote.current()
    }

    pub fn subscribe_quote(&self) -> watch::Receiver<ReadState<U256>> {
        self.quote.subscribe()
    }

    fn fresh_quote(&self) -> Option<U256> {
        let quote = self.quote.current();
        (quote.is_fresh() && !quote.value.is_zero()).then_some(quote.value)
    }

    /// Output per unit of input for the current quote
    pub fn rate(&self) -> Decimal {
        self.fresh_quote()
            .map_or(Decimal::ZERO, |out| PoolMath::swap_rate(self.amount_in, out))
    }

    pub fn price_impact(&self) -> Decimal {
        PoolMath::price_impact(self.amount_in, self.fresh_quote())
    }

    pub fn sequencer(&self) -> &MutationSequencer {
        &self.sequencer
    }

    pub fn progress(&self) -> watch::Receiver<Option<MutationJob>> {
        self.sequencer.subscribe()
    }

    /// Swap the current amount; inputs reset after a confirmed swap
    pub async fn submit(&mut self) -> Result<MutationOutcome, GuardRejection> {
        let outcome = self
            .sequencer
            .run(MutationRequest::Swap {
                token_in: self.direction.token_in(),
                amount_in: self.amount_in,
            })
            .await?;
        if outcome.succeeded() {
            self.amount_in = U256::zero();
            self.quote.clear();
        }
        Ok(outcome)
    }
}

pub struct AddLiquidityPanel {
    balances: Balances,
    sequencer: MutationSequencer,
    amount_a: U256,
    amount_b: U256,
}

impl AddLiquidityPanel {
    pub fn new(connection: ConnectionManager, cache: ReadStateCache, sequencer: &SequencerConfig) -> Self {
        Self {
            sequencer: MutationSequencer::new(connection.clone(), cache.clone(), sequencer.clone()),
            balances: Balances { connection, cache },
            amount_a: U256::zero(),
            amount_b: U256::zero(),
        }
    }

    pub fn amounts(&self) -> (U256, U256) {
        (self.amount_a, self.amount_b)
    }

    pub fn set_amount(&mut self, token: TokenId, text: &str) -> Result<U256, GuardRejection> {
        let parsed = parse_input(text);
        let amount = clamp_known(
            parsed.clone().unwrap_or_default(),
            self.balances.token(token),
        );
        match token {
            TokenId::A => self.amount_a = amount,
            TokenId::B => self.amount_b = amount,
        }
        parsed.map(|_| amount)
    }

    pub fn quick_fill(&mut self, token: TokenId, fill: QuickFill) -> U256 {
        let balance = self.balances.token(token).unwrap_or_default();
        let amount = fill.apply(balance, TOKEN_FILL_DECIMALS);
        match token {
            TokenId::A => self.amount_a = amount,
            TokenId::B => self.amount_b = amount,
        }
        amount
    }

    /// Share of the pool the token A amount would represent, in percent
    pub fn pool_share(&self) -> Decimal {
        let reserve_a = self
            .balances
            .reserves()
            .map_or(U256::zero(), |reserves| reserves.reserve_a);
        PoolMath::percent_of_pool(self.amount_a, reserve_a)
    }

    pub fn sequencer(&self) -> &MutationSequencer {
        &self.sequencer
    }

    pub fn progress(&self) -> watch::Receiver<Option<MutationJob>> {
        self.sequencer.subscribe()
    }

    pub async fn submit(&mut self) -> Result<MutationOutcome, GuardRejection> {
        let outcome = self
            .sequencer
            .run(MutationRequest::AddLiquidity {
                amount_a: self.amount_a,
                amount_b: self.amount_b,
            })
            .await?;
        if outcome.succeeded() {
            self.amount_a = U256::zero();
            self.amount_b = U256::zero();
        }
        Ok(outcome)
    }
}

pub struct RemoveLiquidityPanel {
    balances: Balances,
    sequencer: MutationSequencer,
    lp_amount: U256,
    preview: DebouncedRead<U256, (U256, U256)>,
}

impl RemoveLiquidityPanel {
    pub fn new(
        connection: ConnectionManager,
        cache: ReadStateCache,
        sequencer: &SequencerConfig,
        debounce: &DebounceConfig,
    ) -> Self {
        let preview_connection = connection.clone();
        let preview = DebouncedRead::new(
            "withdrawal preview",
            debounce.withdrawal_preview(),
            move |lp_amount: U256| {
                let session = preview_connection.current();
                async move {
                    let session = session.ok_or(LedgerError::NoAccounts)?;
                    let (reserve_a, reserve_b) = session.reader.reserves().await?;
                    let total_supply = session.reader.lp_total_supply().await?;
                    Ok(PoolMath::withdrawal_preview(
                        lp_amount,
                        reserve_a,
                        reserve_b,
                        total_supply,
                    ))
                }
            },
        );

        Self {
            sequencer: MutationSequencer::new(connection.clone(), cache.clone(), sequencer.clone()),
            balances: Balances { connection, cache },
            lp_amount: U256::zero(),
            preview,
        }
    }

    pub fn lp_amount(&self) -> U256 {
        self.lp_amount
    }

    /// Set the LP amount from typed text, clamped to the LP balance
    pub fn set_amount(&mut self, text: &str) -> Result<U256, GuardRejection> {
        match parse_input(text) {
            Ok(amount) => Ok(self.apply_amount(amount)),
            Err(e) => {
                self.apply_amount(U256::zero());
                Err(e)
            }
        }
    }

    pub fn quick_fill(&mut self, fill: QuickFill) -> U256 {
        let balance = self.balances.lp().unwrap_or_default();
        self.apply_amount(fill.apply(balance, LP_FILL_DECIMALS))
    }

    fn apply_amount(&mut self, amount: U256) -> U256 {
        let amount = clamp_known(amount, self.balances.lp());
        self.lp_amount = amount;
        if amount.is_zero() {
            self.preview.clear();
        } else {
            self.preview.set_input(amount);
        }
        amount
    }

    /// Debounced `(token_a, token_b)` amounts returned for the LP amount
    pub fn preview(&self) -> ReadState<(U256, U256)> {
        self.preview.current()
    }

    pub fn subscribe_preview(&self) -> watch::Receiver<ReadState<(U256, U256)>> {
        self.preview.subscribe()
    }

    pub fn sequencer(&self) -> &MutationSequencer {
        &self.sequencer
    }

    pub fn progress(&self) -> watch::Receiver<Option<MutationJob>> {
        self.sequencer.subscribe()
    }

    pub async fn submit(&mut self) -> Result<MutationOutcome, GuardRejection> {
        let outcome = self
            .sequencer
            .run(MutationRequest::RemoveLiquidity {
                lp_amount: self.lp_amount,
            })
            .await?;
        if outcome.succeeded() {
            self.lp_amount = U256::zero();
            self.preview.clear();
        }
        Ok(outcome)
    }
}
