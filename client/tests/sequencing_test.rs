//! Integration tests for approve → act sequences and error reporting

mod test_utils;

use std::sync::Arc;

use ethers::abi::Token;
use ethers::types::{Bytes, U256};
use ethers::utils::id;

use love20_client::chain::ContractCall;
use love20_client::errors::{ContractErrorDecoder, ErrorBanner, ErrorReporter, ErrorReport, ErrorSink, Locale};
use love20_client::testing::{FakeChainClient, WriteScript};
use love20_client::tx::{mint_reward_plan, stake_token_plan};
use love20_client::{ClientError, Result, TxState};
use love20_protocol::abi::ERC20_ABI;
use parking_lot::Mutex;

use test_utils::*;

/// Sink that keeps every report
#[derive(Default)]
struct CollectingSink {
    reports: Mutex<Vec<ErrorReport>>,
}

impl ErrorSink for CollectingSink {
    fn report(&self, report: &ErrorReport) {
        self.reports.lock().push(report.clone());
    }
}

fn reporter(locale: Locale) -> (ErrorReporter, Arc<CollectingSink>) {
    let sink = Arc::new(CollectingSink::default());
    let reporter = ErrorReporter::new(ContractErrorDecoder::new(locale), Arc::new(ErrorBanner::new()), sink.clone());
    (reporter, sink)
}

fn script_allowance(fake: &FakeChainClient, spender: ethers::types::Address, allowance: U256) {
    fake.respond(
        &ContractCall::new(
            token_address(),
            &ERC20_ABI,
            "allowance",
            vec![Token::Address(account()), Token::Address(spender)],
        ),
        vec![Token::Uint(allowance)],
    );
}

#[tokio::test]
async fn test_stake_waits_for_approve_confirmation() -> Result<()> {
    let fake = FakeChainClient::new(account());
    let config = sample_config();
    script_allowance(&fake, config.contracts.stake, U256::zero());
    let (reporter, sink) = reporter(Locale::En);

    let sequence = stake_token_plan(&fake, &config, &sample_token(), U256::from(1_000), U256::from(4)).await?;
    assert_eq!(sequence.len(), 2);

    // Stake before approve is refused without touching the chain
    assert!(matches!(sequence.execute(1, &fake, &reporter).await, Err(ClientError::StepLocked { step: 1 })));
    assert!(fake.sent().is_empty());

    let approved = sequence.execute(0, &fake, &reporter).await?;
    assert!(approved.is_confirmed());
    let staked = sequence.execute(1, &fake, &reporter).await?;
    assert!(staked.is_confirmed());

    assert!(sequence.is_complete());
    assert_eq!(fake.sent().len(), 2);
    assert_eq!(fake.sent()[0].target, token_address());
    assert_eq!(fake.sent()[1].target, config.contracts.stake);
    assert!(sink.reports.lock().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_simulation_revert_is_decoded_and_reported() -> Result<()> {
    let fake = FakeChainClient::new(account());
    let config = sample_config();
    fake.script_write(WriteScript::RevertOnSimulate(Bytes::from(id("AlreadyMinted()").to_vec())));
    let (reporter, sink) = reporter(Locale::Zh);

    let sequence = mint_reward_plan(&config, &sample_token(), 10, U256::from(7));
    let state = sequence.execute(0, &fake, &reporter).await?;

    assert_eq!(state, TxState::Failed { message: "奖励已铸造".to_string() });
    assert_eq!(reporter.banner().message().as_deref(), Some("奖励已铸造"));
    let reports = sink.reports.lock();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].context, "mint_action_reward");
    assert_eq!(reports[0].category, "contract_revert");
    // Nothing was broadcast
    assert!(fake.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_rejected_signature_is_silent_and_retryable() -> Result<()> {
    let fake = FakeChainClient::new(account());
    let config = sample_config();
    fake.script_write(WriteScript::Reject);
    let (reporter, sink) = reporter(Locale::En);

    let sequence = mint_reward_plan(&config, &sample_token(), 10, U256::from(7));
    assert_eq!(sequence.execute(0, &fake, &reporter).await?, TxState::Idle);
    assert!(sink.reports.lock().is_empty());
    assert_eq!(reporter.banner().message(), None);

    // The user tries again and signs
    assert!(sequence.execute(0, &fake, &reporter).await?.is_confirmed());
    Ok(())
}

#[tokio::test]
async fn test_network_failure_uses_generic_message() -> Result<()> {
    let fake = FakeChainClient::new(account());
    let config = sample_config();
    fake.script_write(WriteScript::NetworkError("connection reset by peer".to_string()));
    let (reporter, _sink) = reporter(Locale::En);

    let sequence = mint_reward_plan(&config, &sample_token(), 10, U256::from(7));
    let state = sequence.execute(0, &fake, &reporter).await?;

    assert_eq!(state, TxState::Failed { message: "Network error, please try again later".to_string() });
    Ok(())
}
