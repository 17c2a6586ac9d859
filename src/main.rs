use alloy::primitives::U256;
use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use escrow_dapp_rs::balances::render;
use escrow_dapp_rs::utils::parse_address;
use escrow_dapp_rs::{
    load_from_file, save_to_file, ApiServer, BalanceInspector, CreateOperationForm, EscrowApp,
    EscrowChain, EscrowConfig, EscrowError, OperationCard, OperationView, RpcChain, SessionSignal,
    TokenInfo, TxReceipt,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Command-line client for the ERC20 escrow contract
///
/// Connection settings come from the environment (or `.env`):
/// RPC_URL, ESCROW_ADDRESS, PRIVATE_KEY.
#[derive(Debug, Parser)]
#[command(name = "escrow-dapp-rs", about = "ERC20 escrow swap client")]
struct Cli {
    /// JSON file holding resolved token metadata from a previous run
    #[arg(long, global = true)]
    token_cache: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the operation API and keep the session alive
    Serve,

    /// List every operation as seen by the connected account
    Operations {
        /// Keep listing every POLL_INTERVAL_MS
        #[arg(short, long)]
        watch: bool,
    },

    /// Print one operation as JSON
    Operation { id: String },

    /// List allow-listed tokens
    Tokens,

    /// Allow-list a token (admin only)
    AddToken { token: String },

    /// Offer `amount_a` of `token_a` for `amount_b` of `token_b`
    Create {
        token_a: String,
        amount_a: String,
        token_b: String,
        amount_b: String,
    },

    /// Fill someone else's active operation
    Complete { id: String },

    /// Cancel your own active operation
    Cancel { id: String },

    /// Native and token balances of the escrow and the dev accounts
    Balances {
        /// Write the rows as JSON instead of printing a table
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    let config = match EscrowConfig::from_env() {
        Ok(config) => {
            info!(
                rpc_url = %config.rpc_url,
                escrow = %config.escrow_address,
                local_key = config.private_key.is_some(),
                "Configuration loaded"
            );
            config
        }
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let cache = cli.token_cache.as_deref();
    match cli.command {
        Command::Serve => serve(&config).await,
        Command::Operations { watch } => operations(&config, cache, watch).await,
        Command::Operation { id } => {
            let chain = RpcChain::from_config(&config)?;
            let op = chain.get_operation(parse_id(&id)?).await?;
            println!("{}", serde_json::to_string_pretty(&OperationView::from(&op))?);
            Ok(())
        }
        Command::Tokens => {
            let app = EscrowApp::from_config(&config)?;
            let tokens = load_tokens(&app, cache).await;
            if tokens.is_empty() {
                eprintln!("No tokens allowed yet.");
            }
            for token in tokens {
                println!("{:<24} {}  {}", token.label(), token.name, token.address);
            }
            Ok(())
        }
        Command::AddToken { token } => {
            let app = connected(&config).await?;
            let token = parse_address(&token)?;
            report(app.actions.add_token(token).await)?;
            if let Some(path) = cache {
                save_to_file(&app.registry.cached(), path)?;
            }
            Ok(())
        }
        Command::Create {
            token_a,
            amount_a,
            token_b,
            amount_b,
        } => {
            let app = connected(&config).await?;
            load_tokens(&app, cache).await;
            let form = CreateOperationForm::new(&token_a, &amount_a, &token_b, &amount_b);
            report(app.actions.create(&form).await)
        }
        Command::Complete { id } => {
            let app = connected(&config).await?;
            report(app.actions.complete(parse_id(&id)?).await)
        }
        Command::Cancel { id } => {
            let app = connected(&config).await?;
            report(app.actions.cancel(parse_id(&id)?).await)
        }
        Command::Balances { out } => {
            let chain = RpcChain::from_config(&config)?;
            let rows = BalanceInspector::new(Arc::new(chain)).load().await;
            match out {
                Some(path) => {
                    save_to_file(&rows, &path)?;
                    eprintln!("Exported {} balance rows to {}", rows.len(), path.display());
                }
                None => print!("{}", render(&rows)),
            }
            Ok(())
        }
    }
}

/// Build an app and make sure a wallet account is connected for writes.
async fn connected(config: &EscrowConfig) -> anyhow::Result<EscrowApp> {
    let app = EscrowApp::from_config(config)?;
    if !app.session.init().await.is_connected() {
        app.session
            .connect()
            .await
            .map_err(|e| anyhow!(e.user_message()))?;
    }
    Ok(app)
}

/// Seed the registry from the cache file when it loads, otherwise read the
/// allow-list from the chain and write the cache.
async fn load_tokens(app: &EscrowApp, cache: Option<&Path>) -> Vec<TokenInfo> {
    if let Some(path) = cache {
        match load_from_file::<Vec<TokenInfo>>(path) {
            Ok(tokens) => {
                info!(count = tokens.len(), path = %path.display(), "Loaded token cache");
                app.registry.seed(tokens.clone());
                return tokens;
            }
            Err(e) => warn!(error = %e, "Token cache unavailable, reading from chain"),
        }
    }

    let tokens = app.registry.list_allowed_tokens().await;
    if let Some(path) = cache {
        if tokens.is_empty() {
            return tokens;
        }
        if let Err(e) = save_to_file(&tokens, path) {
            warn!(error = %e, "Failed to write token cache");
        }
    }
    tokens
}

async fn operations(config: &EscrowConfig, cache: Option<&Path>, watch: bool) -> anyhow::Result<()> {
    let app = EscrowApp::from_config(config)?;
    app.session.init().await;
    load_tokens(&app, cache).await;

    let mut ticker = interval(config.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let ops = app.book.refresh().await;
        let account = app.session.account();

        if ops.is_empty() {
            println!("No operations found");
        }
        for op in &ops {
            let card = OperationCard::build(op, account, &app.registry).await;
            println!("{}", card.render());
        }
        if !watch {
            return Ok(());
        }
    }
}

/// Run the HTTP API next to a live session. A chain switch in the wallet
/// tears the session down and builds a fresh one.
async fn serve(config: &EscrowConfig) -> anyhow::Result<()> {
    let chain = RpcChain::from_config(config)?;
    let server = ApiServer::new(config.api.clone(), Arc::new(chain));

    let sessions = async {
        loop {
            let app = EscrowApp::from_config(config)?;
            app.init().await;

            let poller = {
                let book = app.book.clone();
                let shutdown = app.shutdown_flag();
                let period = config.poll_interval();
                tokio::spawn(async move { book.poll(period, shutdown).await })
            };

            let signal = app.watch_wallet(config.wallet_poll_interval()).await;
            app.dispose();
            poller.abort();

            match signal {
                SessionSignal::Reload => info!("Rebuilding session after chain change"),
                SessionSignal::Continue => return Ok::<_, EscrowError>(()),
            }
        }
    };

    tokio::select! {
        res = server.run() => res?,
        res = sessions => res?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }
    Ok(())
}

fn parse_id(id: &str) -> anyhow::Result<U256> {
    id.trim()
        .parse::<U256>()
        .with_context(|| format!("invalid operation id '{}'", id))
}

fn report(result: escrow_dapp_rs::Result<TxReceipt>) -> anyhow::Result<()> {
    match result {
        Ok(receipt) => {
            match receipt.block_number {
                Some(block) => eprintln!("Transaction {} confirmed in block {}", receipt.tx_hash, block),
                None => eprintln!("Transaction {} confirmed", receipt.tx_hash),
            }
            Ok(())
        }
        Err(e) => Err(anyhow!(e.user_message())),
    }
}
