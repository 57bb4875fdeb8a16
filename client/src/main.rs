//! LOVE20 command-line client
//!
//! Read views and multi-step writes against a LOVE20 deployment.

use std::sync::Arc;

use clap::{Arg, ArgMatches, Command};
use ethers::types::{Address, U256};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use love20_client::cache::{FileStorage, MemoryStorage, StorageBackend};
use love20_client::chain::{ChainClient, ContractCall, EthersChainClient};
use love20_client::dispatch::load_extension_view;
use love20_client::errors::{ContractErrorDecoder, ErrorBanner, ErrorReporter, Locale, TracingErrorSink};
use love20_client::tx::{join_plan, mint_reward_plan, stake_token_plan, TxSequence, TxState};
use love20_client::views;
use love20_client::{BatchExecutor, ClientError, LocalCache, OperationId, PendingWriteLog, Result, VERSION};
use love20_protocol::abi::STAKE_ABI;
use love20_protocol::{parse_address, ExtensionRegistry, Love20Config, TokenContext};

/// Environment variable holding the signing key
const PRIVATE_KEY_ENV: &str = "LOVE20_PRIVATE_KEY";

type SharedCache = LocalCache<Arc<dyn StorageBackend>>;

/// Everything a command needs
struct Session {
    config: Love20Config,
    client: Arc<dyn ChainClient>,
    executor: BatchExecutor,
    cache: SharedCache,
    registry: ExtensionRegistry,
    reporter: ErrorReporter,
    account: Option<Address>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let log_level = matches
        .get_one::<String>("log-level")
        .map(String::as_str)
        .unwrap_or("info");
    init_logging(log_level)?;

    info!(version = VERSION, "Starting LOVE20 client");

    let session = connect(&matches).await?;

    match matches.subcommand() {
        Some(("token", sub)) => {
            let token = load_token(&session, sub).await?;
            let overview = views::load_token_overview(&session.executor, &token, session.account).await?;
            print_json(&overview)
        }
        Some(("governance", sub)) => {
            let token = load_token(&session, sub).await?;
            let account = require_account(&session)?;
            let view = views::load_governance(&session.executor, &session.config, &token, account).await?;
            print_json(&view)
        }
        Some(("pool", sub)) => {
            let token = load_token(&session, sub).await?;
            let view = views::load_pool(&session.executor, &session.config, &token, session.account).await?;
            print_json(&view)
        }
        Some(("rewards", sub)) => {
            let token = load_token(&session, sub).await?;
            let account = require_account(&session)?;
            let action_id = parse_u64(sub, "action")?;
            let count = parse_u64(sub, "rounds")? as usize;
            let round = current_round(&session).await?;
            let pending = PendingWriteLog::new(std::time::Duration::from_secs(session.config.pending.max_age_seconds));
            let view = views::load_action_rewards(
                &session.executor,
                &session.config,
                &token,
                action_id,
                account,
                &views::recent_rounds(round, count),
                &pending,
            )
            .await?;
            for row in &view.rows {
                println!("round {:>6}  {:>30}  {}", row.record.round, row.record.reward, row.display);
            }
            Ok(())
        }
        Some(("action", sub)) => {
            let token = load_token(&session, sub).await?;
            let action_id = U256::from(parse_u64(sub, "id")?);
            let view = views::load_action_view(
                &session.executor,
                &session.cache,
                &session.config,
                &session.registry,
                &token,
                action_id,
                session.account,
            )
            .await?;
            match view {
                Some(view) => print_json(&view),
                None => Err(ClientError::invalid_input(format!("Action {} not found", action_id))),
            }
        }
        Some(("extension", sub)) => {
            let address = parse_address(required(sub, "address")?)?;
            let view = load_extension_view(&session.executor, &session.registry, address, session.account).await?;
            print_json(&view)
        }
        Some(("stake-token", sub)) => {
            let token = load_token(&session, sub).await?;
            let amount = parse_amount(sub, "amount")?;
            let phases = U256::from(parse_u64(sub, "phases")?);
            let sequence =
                stake_token_plan(session.client.as_ref(), &session.config, &token, amount, phases).await?;
            run_sequence(&session, &sequence).await.map(|_| ())
        }
        Some(("join", sub)) => {
            let token = load_token(&session, sub).await?;
            let action_id = U256::from(parse_u64(sub, "action")?);
            let amount = parse_amount(sub, "amount")?;
            let infos = sub
                .get_many::<String>("verification")
                .map(|values| values.cloned().collect())
                .unwrap_or_default();
            let sequence =
                join_plan(session.client.as_ref(), &session.config, &token, action_id, amount, infos).await?;
            run_sequence(&session, &sequence).await.map(|_| ())
        }
        Some(("mint-reward", sub)) => {
            let token = load_token(&session, sub).await?;
            let account = require_account(&session)?;
            let action_id = parse_u64(sub, "action")?;
            let round = parse_u64(sub, "round")?;
            let sequence = mint_reward_plan(&session.config, &token, round, U256::from(action_id));

            let state = run_sequence(&session, &sequence).await?;
            let pending = PendingWriteLog::new(std::time::Duration::from_secs(session.config.pending.max_age_seconds));
            pending.record(
                OperationId::mint_action_reward(token.address, round, U256::from(action_id), account),
                state.tx_hash(),
            );

            // Re-read so a lagging node shows the mint as pending instead of mintable
            let view = views::load_action_rewards(
                &session.executor,
                &session.config,
                &token,
                action_id,
                account,
                &[round],
                &pending,
            )
            .await?;
            for row in &view.rows {
                println!("round {:>6}  {:>30}  {}", row.record.round, row.record.reward, row.display);
            }
            Ok(())
        }
        _ => {
            cli().print_help()?;
            Ok(())
        }
    }
}

fn cli() -> Command {
    let symbol = || {
        Arg::new("symbol")
            .value_name("SYMBOL")
            .help("Token symbol")
            .required(true)
    };

    Command::new("love20")
        .version(VERSION)
        .about("LOVE20 protocol client")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("STEM")
                .help("Configuration file stem")
                .default_value("config/love20")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)")
                .default_value("info")
                .global(true),
        )
        .arg(
            Arg::new("locale")
                .long("locale")
                .value_name("LOCALE")
                .help("Language for error messages (en, zh)")
                .default_value("en")
                .global(true),
        )
        .arg(
            Arg::new("account")
                .short('a')
                .long("account")
                .value_name("ADDRESS")
                .help("Account to read for; defaults to the signer")
                .global(true),
        )
        .subcommand(Command::new("token").about("Token context, supply and balances").arg(symbol()))
        .subcommand(Command::new("governance").about("Governance votes, stake and APY").arg(symbol()))
        .subcommand(Command::new("pool").about("Liquidity pool against the parent token").arg(symbol()))
        .subcommand(
            Command::new("rewards")
                .about("Action rewards over recent rounds")
                .arg(symbol())
                .arg(Arg::new("action").long("action").value_name("ID").required(true))
                .arg(Arg::new("rounds").long("rounds").value_name("N").default_value("10")),
        )
        .subcommand(
            Command::new("action")
                .about("Action metadata and extension")
                .arg(symbol())
                .arg(Arg::new("id").value_name("ID").required(true)),
        )
        .subcommand(
            Command::new("extension")
                .about("Resolve and load an extension contract")
                .arg(Arg::new("address").value_name("ADDRESS").required(true)),
        )
        .subcommand(
            Command::new("stake-token")
                .about("Approve and stake tokens")
                .arg(symbol())
                .arg(Arg::new("amount").long("amount").value_name("WEI").required(true))
                .arg(Arg::new("phases").long("phases").value_name("N").default_value("4")),
        )
        .subcommand(
            Command::new("join")
                .about("Approve and join an action")
                .arg(symbol())
                .arg(Arg::new("action").long("action").value_name("ID").required(true))
                .arg(Arg::new("amount").long("amount").value_name("WEI").required(true))
                .arg(
                    Arg::new("verification")
                        .long("verification")
                        .value_name("INFO")
                        .action(clap::ArgAction::Append),
                ),
        )
        .subcommand(
            Command::new("mint-reward")
                .about("Mint an action reward")
                .arg(symbol())
                .arg(Arg::new("action").long("action").value_name("ID").required(true))
                .arg(Arg::new("round").long("round").value_name("ROUND").required(true)),
        )
}

/// Initialize logging with the specified level
fn init_logging(log_level: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => {
            eprintln!("Invalid log level: {}. Using 'info'", log_level);
            tracing::Level::INFO
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("love20_client={},love20_protocol={}", level, level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

/// Load configuration and build the session
async fn connect(matches: &ArgMatches) -> Result<Session> {
    let stem = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config/love20");
    info!(config = stem, "Loading configuration");
    let config = Love20Config::load_from(stem)?;
    config.validate()?;

    let locale: Locale = matches
        .get_one::<String>("locale")
        .map(String::as_str)
        .unwrap_or("en")
        .parse()?;

    let mut chain = EthersChainClient::new(&config.network, config.contracts.multicall, config.batching.enabled)?;
    match std::env::var(PRIVATE_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => chain = chain.with_private_key(&key)?,
        _ => info!("No {} set, running read-only", PRIVATE_KEY_ENV),
    }
    chain.verify_chain_id().await?;

    let account = match matches.get_one::<String>("account") {
        Some(value) => Some(parse_address(value)?),
        None => chain.account(),
    };

    let storage: Arc<dyn StorageBackend> = match &config.cache.path {
        Some(path) => Arc::new(FileStorage::open(path)?),
        None => Arc::new(MemoryStorage::new()),
    };

    let client: Arc<dyn ChainClient> = Arc::new(chain);
    let registry = ExtensionRegistry::from_contracts(&config.contracts);
    if registry.is_empty() {
        warn!("No extension factories configured; every extension will be unsupported");
    }

    Ok(Session {
        executor: BatchExecutor::new(client.clone(), config.batching.max_batch_size),
        client,
        cache: LocalCache::new(storage),
        registry,
        reporter: ErrorReporter::new(
            ContractErrorDecoder::new(locale),
            Arc::new(ErrorBanner::new()),
            Arc::new(TracingErrorSink),
        ),
        account,
        config,
    })
}

async fn load_token(session: &Session, sub: &ArgMatches) -> Result<TokenContext> {
    views::load_token(&session.executor, &session.config, required(sub, "symbol")?).await
}

async fn current_round(session: &Session) -> Result<u64> {
    let tokens = ContractCall::new(session.config.contracts.stake, &STAKE_ABI, "currentRound", vec![])
        .read(session.client.as_ref())
        .await?;
    tokens
        .into_iter()
        .next()
        .and_then(ethers::abi::Token::into_uint)
        .map(|round| round.low_u64())
        .ok_or_else(|| ClientError::decode("currentRound", "expected a uint"))
}

/// Execute every step, logging state changes as they happen
async fn run_sequence(session: &Session, sequence: &TxSequence) -> Result<TxState> {
    let mut updates = sequence.subscribe();
    let watcher = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            for step in updates.borrow_and_update().iter() {
                info!(step = %step.label, state = ?step.state, enabled = step.enabled, "Step update");
            }
        }
    });

    let state = sequence
        .execute_all(session.client.as_ref(), &session.reporter)
        .await;
    watcher.abort();

    match state? {
        state @ TxState::Confirmed { .. } => {
            println!("Confirmed: {:?}", state.tx_hash());
            Ok(state)
        }
        TxState::Idle => Err(ClientError::UserRejected("Cancelled".to_string())),
        TxState::Failed { message } => Err(ClientError::internal(message)),
        other => Err(ClientError::internal(format!("Sequence stopped in state {:?}", other))),
    }
}

fn required<'a>(sub: &'a ArgMatches, name: &str) -> Result<&'a str> {
    sub.get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| ClientError::invalid_input(format!("Missing argument: {}", name)))
}

fn parse_u64(sub: &ArgMatches, name: &str) -> Result<u64> {
    let value = required(sub, name)?;
    value
        .parse()
        .map_err(|_| ClientError::invalid_input(format!("Invalid {}: {}", name, value)))
}

fn parse_amount(sub: &ArgMatches, name: &str) -> Result<U256> {
    let value = required(sub, name)?;
    U256::from_dec_str(value).map_err(|_| ClientError::invalid_input(format!("Invalid {}: {}", name, value)))
}

fn require_account(session: &Session) -> Result<Address> {
    session
        .account
        .ok_or_else(|| ClientError::invalid_input("No account: pass --account or set LOVE20_PRIVATE_KEY"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
