//! In-memory ledger and wallet shared by the client integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use ledger::{
    Inclusion, LedgerError, LedgerHandles, LedgerReader, LedgerResult, LedgerWriter,
    WalletProvider, WalletSignal,
};
use parking_lot::Mutex;
use simpledex_client::{DexClient, Observation, ReadState, Session};
use simpledex_config::DexConfig;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Notify};
use types::{Address, ChainId, HistoryEntry, HistoryKind, TokenId, WalletKind, H256, U256};

/// `n` whole tokens in wei
pub fn tokens(n: u64) -> U256 {
    U256::from(n) * U256::exp10(18)
}

pub fn alice() -> Address {
    Address::repeat_byte(0xa1)
}

pub fn bob() -> Address {
    Address::repeat_byte(0xb0)
}

/// Ledger operations a test can fail or inspect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Reserves,
    TokenBalance,
    LpBalance,
    TotalSupply,
    Quote,
    BlockNumber,
    Events(HistoryKind),
    Approve(TokenId),
    Swap,
    AddLiquidity,
    RemoveLiquidity,
    Wait,
}

/// Recorded calls with their arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Reserves,
    TokenBalance(TokenId, Address),
    LpBalance(Address),
    TotalSupply,
    Quote(TokenId, U256),
    BlockNumber,
    Events(HistoryKind, u64, u64),
    Approve(TokenId, U256),
    Swap(TokenId, U256),
    AddLiquidity(U256, U256),
    RemoveLiquidity(U256),
    Wait(H256),
}

impl Call {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Call::Approve(..)
                | Call::Swap(..)
                | Call::AddLiquidity(..)
                | Call::RemoveLiquidity(..)
                | Call::Wait(..)
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Rejected,
    Network,
    Revert(&'static str),
    /// The call is accepted but its receipt reports a revert
    RevertedReceipt,
}

impl Failure {
    fn error(&self) -> LedgerError {
        match self {
            Failure::Rejected => LedgerError::Rejected,
            Failure::Network => LedgerError::Transport("connection refused".to_string()),
            Failure::Revert(reason) => LedgerError::Reverted {
                reason: reason.to_string(),
                tx_hash: None,
            },
            Failure::RevertedReceipt => LedgerError::Rpc("unexpected".to_string()),
        }
    }
}

struct State {
    account: Address,
    reserves: (U256, U256),
    balances: (U256, U256),
    lp_balance: U256,
    total_supply: U256,
    quote: U256,
    queued_quotes: VecDeque<U256>,
    block: u64,
    events: Vec<HistoryEntry>,
    failures: HashMap<Op, Failure>,
    reverted_txs: HashSet<H256>,
    calls: Vec<Call>,
}

pub struct MockLedger {
    state: Mutex<State>,
    next_tx: AtomicU64,
    approve_gate: Mutex<Option<Arc<Notify>>>,
    balance_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                account: Address::zero(),
                reserves: (tokens(1_000), tokens(2_000)),
                balances: (tokens(100), tokens(100)),
                lp_balance: tokens(10),
                total_supply: tokens(100),
                quote: tokens(1),
                queued_quotes: VecDeque::new(),
                block: 20_000,
                events: Vec::new(),
                failures: HashMap::new(),
                reverted_txs: HashSet::new(),
                calls: Vec::new(),
            }),
            next_tx: AtomicU64::new(0),
            approve_gate: Mutex::new(None),
            balance_gate: Mutex::new(None),
        })
    }

    pub fn set_reserves(&self, a: U256, b: U256) {
        self.state.lock().reserves = (a, b);
    }

    pub fn set_balances(&self, a: U256, b: U256) {
        self.state.lock().balances = (a, b);
    }

    pub fn set_lp(&self, lp_balance: U256, total_supply: U256) {
        let mut state = self.state.lock();
        state.lp_balance = lp_balance;
        state.total_supply = total_supply;
    }

    pub fn set_quote(&self, quote: U256) {
        self.state.lock().quote = quote;
    }

    /// Quotes returned before falling back to the fixed one
    pub fn queue_quotes(&self, quotes: impl IntoIterator<Item = U256>) {
        self.state.lock().queued_quotes.extend(quotes);
    }

    pub fn set_block(&self, block: u64) {
        self.state.lock().block = block;
    }

    pub fn push_event(&self, kind: HistoryKind, block_number: u64) {
        let hash = H256::from_low_u64_be(block_number * 10 + kind as u64);
        self.state
            .lock()
            .events
            .push(HistoryEntry::new(kind, block_number, hash));
    }

    pub fn fail(&self, op: Op, failure: Failure) {
        self.state.lock().failures.insert(op, failure);
    }

    /// Approvals wait for the returned gate before returning
    pub fn gate_approvals(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.approve_gate.lock() = Some(gate.clone());
        gate
    }

    /// Token balance reads wait for the returned gate before returning
    pub fn gate_balances(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.balance_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: Call, op: Op) -> LedgerResult<()> {
        let mut state = self.state.lock();
        state.calls.push(call);
        match state.failures.get(&op) {
            Some(Failure::RevertedReceipt) | None => Ok(()),
            Some(failure) => Err(failure.error()),
        }
    }

    fn transaction(&self, op: Op) -> H256 {
        let hash = H256::from_low_u64_be(self.next_tx.fetch_add(1, Ordering::SeqCst) + 1);
        let mut state = self.state.lock();
        if matches!(state.failures.get(&op), Some(Failure::RevertedReceipt)) {
            state.reverted_txs.insert(hash);
        }
        hash
    }
}

#[async_trait]
impl LedgerReader for MockLedger {
    async fn reserves(&self) -> LedgerResult<(U256, U256)> {
        self.record(Call::Reserves, Op::Reserves)?;
        Ok(self.state.lock().reserves)
    }

    async fn token_balance(&self, token: TokenId, owner: Address) -> LedgerResult<U256> {
        let gate = self.balance_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.record(Call::TokenBalance(token, owner), Op::TokenBalance)?;
        let (a, b) = self.state.lock().balances;
        Ok(match token {
            TokenId::A => a,
            TokenId::B => b,
        })
    }

    async fn lp_balance(&self, owner: Address) -> LedgerResult<U256> {
        self.record(Call::LpBalance(owner), Op::LpBalance)?;
        Ok(self.state.lock().lp_balance)
    }

    async fn lp_total_supply(&self) -> LedgerResult<U256> {
        self.record(Call::TotalSupply, Op::TotalSupply)?;
        Ok(self.state.lock().total_supply)
    }

    async fn swap_quote(&self, token_in: TokenId, amount_in: U256) -> LedgerResult<U256> {
        self.record(Call::Quote(token_in, amount_in), Op::Quote)?;
        let mut state = self.state.lock();
        let fixed = state.quote;
        Ok(state.queued_quotes.pop_front().unwrap_or(fixed))
    }

    async fn block_number(&self) -> LedgerResult<u64> {
        self.record(Call::BlockNumber, Op::BlockNumber)?;
        Ok(self.state.lock().block)
    }

    async fn events(
        &self,
        kind: HistoryKind,
        from_block: u64,
        to_block: u64,
    ) -> LedgerResult<Vec<HistoryEntry>> {
        self.record(Call::Events(kind, from_block, to_block), Op::Events(kind))?;
        Ok(self
            .state
            .lock()
            .events
            .iter()
            .filter(|entry| {
                entry.kind == kind
                    && entry.block_number >= from_block
                    && entry.block_number <= to_block
            })
            .copied()
            .collect())
    }
}

#[async_trait]
impl LedgerWriter for MockLedger {
    fn account(&self) -> Address {
        self.state.lock().account
    }

    async fn approve(&self, token: TokenId, amount: U256) -> LedgerResult<H256> {
        let gate = self.approve_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.record(Call::Approve(token, amount), Op::Approve(token))?;
        Ok(self.transaction(Op::Approve(token)))
    }

    async fn swap(&self, token_in: TokenId, amount_in: U256) -> LedgerResult<H256> {
        self.record(Call::Swap(token_in, amount_in), Op::Swap)?;
        let hash = self.transaction(Op::Swap);
        let mut state = self.state.lock();
        let out = state.quote;
        let (a, b) = state.balances;
        state.balances = match token_in {
            TokenId::A => (a.saturating_sub(amount_in), b + out),
            TokenId::B => (a + out, b.saturating_sub(amount_in)),
        };
        Ok(hash)
    }

    async fn add_liquidity(&self, amount_a: U256, amount_b: U256) -> LedgerResult<H256> {
        self.record(Call::AddLiquidity(amount_a, amount_b), Op::AddLiquidity)?;
        Ok(self.transaction(Op::AddLiquidity))
    }

    async fn remove_liquidity(&self, lp_amount: U256) -> LedgerResult<H256> {
        self.record(Call::RemoveLiquidity(lp_amount), Op::RemoveLiquidity)?;
        Ok(self.transaction(Op::RemoveLiquidity))
    }

    async fn wait_for_inclusion(&self, tx_hash: H256) -> LedgerResult<Inclusion> {
        self.record(Call::Wait(tx_hash), Op::Wait)?;
        let state = self.state.lock();
        Ok(Inclusion {
            tx_hash,
            block_number: Some(state.block),
            success: !state.reverted_txs.contains(&tx_hash),
        })
    }
}

pub struct MockWallet {
    kind: WalletKind,
    ledger: Arc<MockLedger>,
    accounts: Mutex<Vec<Address>>,
    chain: Mutex<ChainId>,
    switch_allowed: Mutex<bool>,
    reject_accounts: Mutex<bool>,
    signals: broadcast::Sender<WalletSignal>,
    binds: AtomicU64,
}

impl MockWallet {
    pub fn new(kind: WalletKind, ledger: Arc<MockLedger>, account: Address) -> Arc<Self> {
        let (signals, _) = broadcast::channel(16);
        Arc::new(Self {
            kind,
            ledger,
            accounts: Mutex::new(vec![account]),
            chain: Mutex::new(ChainId::SEPOLIA),
            switch_allowed: Mutex::new(true),
            reject_accounts: Mutex::new(false),
            signals,
            binds: AtomicU64::new(0),
        })
    }

    pub fn set_chain(&self, chain: ChainId) {
        *self.chain.lock() = chain;
    }

    pub fn refuse_switch(&self) {
        *self.switch_allowed.lock() = false;
    }

    pub fn reject_accounts(&self) {
        *self.reject_accounts.lock() = true;
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        *self.accounts.lock() = accounts;
    }

    pub fn binds(&self) -> u64 {
        self.binds.load(Ordering::SeqCst)
    }

    /// Change accounts and notify listeners
    pub fn emit_accounts(&self, accounts: Vec<Address>) {
        self.set_accounts(accounts.clone());
        let _ = self.signals.send(WalletSignal::AccountsChanged(accounts));
    }

    pub fn emit_chain(&self, chain: ChainId) {
        let _ = self.signals.send(WalletSignal::ChainChanged(chain));
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    fn kind(&self) -> WalletKind {
        self.kind
    }

    async fn request_accounts(&self) -> LedgerResult<Vec<Address>> {
        if *self.reject_accounts.lock() {
            return Err(LedgerError::Rejected);
        }
        Ok(self.accounts.lock().clone())
    }

    async fn chain_id(&self) -> LedgerResult<ChainId> {
        Ok(*self.chain.lock())
    }

    async fn switch_chain(&self, chain: ChainId) -> LedgerResult<()> {
        if !*self.switch_allowed.lock() {
            return Err(LedgerError::ChainSwitch {
                requested: chain,
                reason: "user declined".to_string(),
            });
        }
        *self.chain.lock() = chain;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletSignal> {
        self.signals.subscribe()
    }

    async fn bind(&self, account: Address) -> LedgerResult<LedgerHandles> {
        self.binds.fetch_add(1, Ordering::SeqCst);
        self.ledger.state.lock().account = account;
        Ok(LedgerHandles {
            reader: self.ledger.clone(),
            writer: self.ledger.clone(),
        })
    }
}

/// Defaults with polling slow enough that only invalidation refreshes within a test
pub fn quiet_config() -> DexConfig {
    let mut config = DexConfig::default();
    config.polling.reserves_ms = 600_000;
    config.polling.balances_ms = 600_000;
    config.polling.lp_position_ms = 600_000;
    config
}

pub async fn connected_client(
    ledger: Arc<MockLedger>,
    config: DexConfig,
) -> (DexClient, Arc<MockWallet>, Arc<Session>) {
    let client = DexClient::new(config);
    let wallet = MockWallet::new(WalletKind::MetaMask, ledger, alice());
    client.register_wallet(wallet.clone());
    let session = client
        .connect(WalletKind::MetaMask)
        .await
        .expect("mock wallet connects");
    (client, wallet, session)
}

/// Wait until the observation holds a fetched value
pub async fn loaded<T: Clone + Default>(mut observation: Observation<T>) -> ReadState<T> {
    observation
        .wait_for(|state| state.is_known())
        .await
        .expect("registration stays alive")
}
