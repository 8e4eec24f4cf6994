//! `simpledex` command-line front end
//!
//! Signs with the local key from configuration and drives the same panels a
//! graphical front end would.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ledger::{LedgerSettings, LocalKeyWallet};
use simpledex_amm::{format_amount, PoolMath, QuickFill};
use simpledex_client::{
    init_tracing, log_success, DexClient, LogEmoji, Observation, ReadState, ReadStatus,
};
use simpledex_config::{load_config, DexConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use types::{MutationJob, MutationOutcome, SwapDirection, TokenId, WalletKind, U256};

/// Decimal places shown for token amounts
const DISPLAY_DECIMALS: u32 = 4;

/// How long to wait for the first read of a value
const FIRST_READ_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Parser)]
#[command(name = "simpledex")]
#[command(about = "SimpleDEX client - swap and provide liquidity on the SimpleDEX pool")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum TokenArg {
    A,
    B,
}

impl From<TokenArg> for TokenId {
    fn from(token: TokenArg) -> Self {
        match token {
            TokenArg::A => TokenId::A,
            TokenArg::B => TokenId::B,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show pool reserves, exchange rate and the account's balances
    Status,
    /// Swap one pool token for the other
    Swap {
        /// Token to sell
        #[arg(long, value_enum, default_value = "a")]
        from: TokenArg,
        /// Amount to sell
        #[arg(conflicts_with = "percent", required_unless_present = "percent")]
        amount: Option<String>,
        /// Sell a share of the balance instead (25, 50, 75 or 100)
        #[arg(long)]
        percent: Option<u64>,
    },
    /// Deposit both tokens into the pool
    AddLiquidity {
        amount_a: String,
        amount_b: String,
    },
    /// Burn LP tokens for a share of the reserves
    RemoveLiquidity {
        #[arg(conflicts_with = "percent", required_unless_present = "percent")]
        lp_amount: Option<String>,
        /// Burn a share of the LP balance instead (25, 50, 75 or 100)
        #[arg(long)]
        percent: Option<u64>,
    },
    /// List recent exchange activity
    History,
    /// Print reserves and balances as they refresh until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.logging)?;

    info!("🚀 Starting SimpleDEX client on {}", config.network.chain());

    let client = DexClient::new(config.clone());
    client.register_wallet(Arc::new(local_wallet(&config)?));
    let session = client
        .connect(WalletKind::LocalKey)
        .await
        .map_err(|kind| anyhow!("{}", kind.user_message()))?;
    log_success!("Connected {:?}", session.account);

    let result = match cli.command {
        Commands::Status => status(&client).await,
        Commands::Swap {
            from,
            amount,
            percent,
        } => swap(&client, from.into(), amount, percent).await,
        Commands::AddLiquidity { amount_a, amount_b } => {
            add_liquidity(&client, &amount_a, &amount_b).await
        }
        Commands::RemoveLiquidity { lp_amount, percent } => {
            remove_liquidity(&client, lp_amount, percent).await
        }
        Commands::History => history(&client).await,
        Commands::Watch => watch_pool(&client).await,
    };

    client.shutdown();
    result
}

fn local_wallet(config: &DexConfig) -> Result<LocalKeyWallet> {
    if !config.contracts.is_deployed() {
        bail!("contracts.dex, contracts.token_a and contracts.token_b must be configured");
    }
    let key = config
        .wallet
        .private_key
        .as_deref()
        .context("wallet.private_key is not set (SIMPLEDEX__WALLET__PRIVATE_KEY)")?;
    let settings = LedgerSettings::from_config(&config.contracts, &config.sequencer);
    LocalKeyWallet::new(&config.network.rpc_url, key, settings)
}

/// Wait for the first completed fetch, fresh or failed
async fn first_read<T: Clone + Default>(mut observation: Observation<T>) -> ReadState<T> {
    let waited = tokio::time::timeout(
        FIRST_READ_TIMEOUT,
        observation.wait_for(|state| state.status != ReadStatus::Loading),
    )
    .await;
    match waited {
        Ok(Some(state)) => state,
        _ => {
            warn!("⚠️ Timed out waiting for ledger read");
            observation.current()
        }
    }
}

/// Debounced read result for a non-zero input
async fn settled<T: Clone>(
    mut rx: watch::Receiver<ReadState<T>>,
    input: U256,
) -> Option<ReadState<T>> {
    if input.is_zero() {
        return None;
    }
    let waited = tokio::time::timeout(
        FIRST_READ_TIMEOUT,
        rx.wait_for(|state| state.status != ReadStatus::Loading),
    )
    .await;
    match waited {
        Ok(Ok(state)) => Some(state.clone()),
        _ => None,
    }
}

fn describe<T>(state: &ReadState<T>) -> &'static str {
    match state.status {
        ReadStatus::Fresh => "",
        ReadStatus::Loading => " (loading)",
        ReadStatus::Stale(_) => " (stale)",
    }
}

async fn status(client: &DexClient) -> Result<()> {
    let reserves = first_read(client.reserves()).await;
    let balances = first_read(client.balances()).await;
    let lp = first_read(client.lp_position()).await;

    println!("Pool{}", describe(&reserves));
    for token in [TokenId::A, TokenId::B] {
        let reserve = reserves.value.reserve_of(token);
        let other = reserves.value.reserve_of(token.other());
        println!(
            "  {}: {} ({}% of liquidity)",
            token,
            format_amount(reserve, DISPLAY_DECIMALS),
            PoolMath::reserve_share(reserve, other).round_dp(2)
        );
    }
    println!("  1 {} = {} {}", TokenId::A, client.exchange_rate().round_dp(6), TokenId::B);

    println!("Wallet{}", describe(&balances));
    for token in [TokenId::A, TokenId::B] {
        println!(
            "  {}: {}",
            token,
            format_amount(balances.value.balance_of(token), DISPLAY_DECIMALS)
        );
    }
    println!(
        "  LP: {} of {}{}",
        format_amount(lp.value.lp_balance, DISPLAY_DECIMALS),
        format_amount(lp.value.total_supply, DISPLAY_DECIMALS),
        describe(&lp)
    );
    Ok(())
}

fn quick_fill(percent: u64) -> Result<QuickFill> {
    QuickFill::from_percent(percent)
        .with_context(|| format!("--percent must be 25, 50, 75 or 100, got {}", percent))
}

async fn swap(
    client: &DexClient,
    from: TokenId,
    amount: Option<String>,
    percent: Option<u64>,
) -> Result<()> {
    first_read(client.balances()).await;
    let mut panel = client.swap_panel();
    if panel.direction().token_in() != from {
        panel.toggle_direction();
    }
    let direction: SwapDirection = panel.direction();

    let amount_in = match (amount, percent) {
        (_, Some(percent)) => panel.quick_fill(quick_fill(percent)?),
        (Some(text), None) => panel.set_amount(&text)?,
        (None, None) => bail!("an amount or --percent is required"),
    };

    if let Some(state) = settled(panel.subscribe_quote(), amount_in).await {
        if state.is_fresh() {
            println!(
                "Quote: {} {} → {} {} (rate {}, impact {}%)",
                format_amount(amount_in, DISPLAY_DECIMALS),
                direction.token_in(),
                format_amount(state.value, DISPLAY_DECIMALS),
                direction.token_out(),
                panel.rate().round_dp(6),
                panel.price_impact().round_dp(2)
            );
        }
    }

    let progress = print_progress(panel.progress());
    let outcome = panel.submit().await;
    progress.abort();
    report(client, outcome?)
}

async fn add_liquidity(client: &DexClient, amount_a: &str, amount_b: &str) -> Result<()> {
    first_read(client.balances()).await;
    first_read(client.reserves()).await;
    let mut panel = client.add_liquidity_panel();
    let a = panel.set_amount(TokenId::A, amount_a)?;
    let b = panel.set_amount(TokenId::B, amount_b)?;
    println!(
        "Depositing {} {} + {} {} (≈{}% of pool)",
        format_amount(a, DISPLAY_DECIMALS),
        TokenId::A,
        format_amount(b, DISPLAY_DECIMALS),
        TokenId::B,
        panel.pool_share().round_dp(2)
    );

    let progress = print_progress(panel.progress());
    let outcome = panel.submit().await;
    progress.abort();
    report(client, outcome?)
}

async fn remove_liquidity(
    client: &DexClient,
    lp_amount: Option<String>,
    percent: Option<u64>,
) -> Result<()> {
    first_read(client.lp_position()).await;
    let mut panel = client.remove_liquidity_panel();
    let amount = match (lp_amount, percent) {
        (_, Some(percent)) => panel.quick_fill(quick_fill(percent)?),
        (Some(text), None) => panel.set_amount(&text)?,
        (None, None) => bail!("an LP amount or --percent is required"),
    };

    if let Some(state) = settled(panel.subscribe_preview(), amount).await {
        if state.is_fresh() {
            let (out_a, out_b) = state.value;
            println!(
                "Burning {} LP for ≈{} {} + {} {}",
                format_amount(amount, DISPLAY_DECIMALS),
                format_amount(out_a, DISPLAY_DECIMALS),
                TokenId::A,
                format_amount(out_b, DISPLAY_DECIMALS),
                TokenId::B
            );
        }
    }

    let progress = print_progress(panel.progress());
    let outcome = panel.submit().await;
    progress.abort();
    report(client, outcome?)
}

fn print_progress(
    mut progress: watch::Receiver<Option<MutationJob>>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let line = progress.borrow_and_update().as_ref().map(MutationJob::status_text);
            if let Some(line) = line.filter(|line| !line.is_empty()) {
                println!("  {}", line);
            }
        }
    })
}

fn report(client: &DexClient, outcome: MutationOutcome) -> Result<()> {
    if let Some(tx_hash) = outcome.tx_hash {
        println!("  {}", client.explorer_url(tx_hash));
    }
    match outcome.error {
        None => Ok(()),
        Some(kind) => bail!("{} {}: {}", outcome.kind, outcome.job_id, kind.user_message()),
    }
}

async fn history(client: &DexClient) -> Result<()> {
    let entries = first_read(client.history()).await;
    if let ReadStatus::Stale(kind) = entries.status {
        bail!("history unavailable: {}", kind.user_message());
    }
    if entries.value.is_empty() {
        println!("No recent transactions");
    }
    for entry in &entries.value {
        println!(
            "{:<7} block {:>10}  {}  {}",
            entry.kind,
            entry.block_number,
            entry.short_hash(),
            client.explorer_url(entry.tx_hash)
        );
    }
    Ok(())
}

async fn watch_pool(client: &DexClient) -> Result<()> {
    let mut reserves = client.reserves();
    let mut balances = client.balances();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            state = reserves.changed() => match state {
                Some(state) => println!(
                    "{} reserves {} {} / {} {}{}",
                    LogEmoji::CHART,
                    format_amount(state.value.reserve_a, DISPLAY_DECIMALS),
                    TokenId::A,
                    format_amount(state.value.reserve_b, DISPLAY_DECIMALS),
                    TokenId::B,
                    describe(&state)
                ),
                None => return Ok(()),
            },
            state = balances.changed() => match state {
                Some(state) => println!(
                    "💰 balances {} {} / {} {}{}",
                    format_amount(state.value.token_a, DISPLAY_DECIMALS),
                    TokenId::A,
                    format_amount(state.value.token_b, DISPLAY_DECIMALS),
                    TokenId::B,
                    describe(&state)
                ),
                None => return Ok(()),
            },
        }
    }
}
