//! Integration tests for batched reads, caching and derived views

mod test_utils;

use std::sync::Arc;
use std::time::Duration;

use ethers::abi::Token;
use ethers::types::{Address, U256};

use love20_client::batch::SlotStatus;
use love20_client::cache::{keys, CacheOptions, FileStorage, ManualClock, MemoryStorage};
use love20_client::chain::ContractCall;
use love20_client::testing::FakeChainClient;
use love20_client::views::{self, RewardDisplay};
use love20_client::{BatchExecutor, LocalCache, PendingWriteLog, ReadBatch, Result, ViewMemo};
use love20_protocol::abi::{ERC20_ABI, SUBMIT_ABI};
use love20_protocol::ActionInfo;

use test_utils::*;

#[tokio::test]
async fn test_rewards_end_to_end() -> Result<()> {
    let fake = Arc::new(FakeChainClient::new(account()));
    let config = sample_config();
    script_reward(&fake, &config, 10, 7, U256::from(500), false);
    script_reward(&fake, &config, 11, 7, U256::zero(), false);
    let executor = BatchExecutor::new(fake.clone(), config.batching.max_batch_size);
    let pending = PendingWriteLog::new(Duration::from_secs(600));

    let view = views::load_action_rewards(&executor, &config, &sample_token(), 7, account(), &[10, 11], &pending).await?;

    assert_eq!(view.rows.len(), 2);
    assert_eq!(view.rows[0].record.round, 10);
    assert_eq!(view.rows[0].display, RewardDisplay::Mintable);
    assert_eq!(view.rows[1].record.round, 11);
    assert_eq!(view.rows[1].display, RewardDisplay::Empty);
    assert_eq!(view.rows[1].display.to_string(), "-");
    assert_eq!(view.mintable_rounds(), vec![10]);

    // Both rounds in a single round-trip
    assert_eq!(fake.batch_reads(), 1);
    Ok(())
}

#[tokio::test]
async fn test_partial_batch_failure_is_tolerated() -> Result<()> {
    let fake = Arc::new(FakeChainClient::read_only());
    let holder = account();
    let good = ContractCall::new(Address::repeat_byte(0x01), &ERC20_ABI, "balanceOf", vec![Token::Address(holder)]);
    let bad = ContractCall::new(Address::repeat_byte(0x02), &ERC20_ABI, "balanceOf", vec![Token::Address(holder)]);
    fake.respond(&good, vec![Token::Uint(U256::from(42))]);
    fake.fail(&bad, "execution reverted");

    let mut batch = ReadBatch::new();
    let good_slot = batch.push(good);
    let bad_slot = batch.push(bad);
    let skipped = batch.push_if(None);

    let results = BatchExecutor::new(fake, 100).execute(batch).await?;

    assert_eq!(results.status(good_slot), SlotStatus::Success);
    assert_eq!(results.uint(good_slot), Some(U256::from(42)));
    assert_eq!(results.status(bad_slot), SlotStatus::Failure);
    assert_eq!(results.uint_or_zero(bad_slot), U256::zero());
    assert_eq!(results.status(skipped), SlotStatus::Skipped);
    assert_eq!(results.failures(), 1);
    Ok(())
}

#[tokio::test]
async fn test_failed_reward_read_degrades_to_empty() -> Result<()> {
    let fake = Arc::new(FakeChainClient::new(account()));
    let config = sample_config();
    script_reward(&fake, &config, 10, 7, U256::from(500), false);
    // Round 11 left unscripted: that call reverts inside the batch
    let executor = BatchExecutor::new(fake, 100);
    let pending = PendingWriteLog::new(Duration::from_secs(600));

    let view = views::load_action_rewards(&executor, &config, &sample_token(), 7, account(), &[10, 11], &pending).await?;

    assert_eq!(view.rows[0].display, RewardDisplay::Mintable);
    assert_eq!(view.rows[1].display, RewardDisplay::Empty);
    Ok(())
}

#[tokio::test]
async fn test_memoized_rewards_return_same_arc() -> Result<()> {
    let fake = Arc::new(FakeChainClient::new(account()));
    let config = sample_config();
    script_reward(&fake, &config, 10, 7, U256::from(500), false);
    let executor = BatchExecutor::new(fake.clone(), 100);
    let pending = PendingWriteLog::new(Duration::from_secs(600));
    let memo = ViewMemo::new();
    let token = sample_token();

    let first =
        views::load_action_rewards_memoized(&executor, &memo, &config, &token, 7, account(), &[10], &pending).await?;
    let second =
        views::load_action_rewards_memoized(&executor, &memo, &config, &token, 7, account(), &[10], &pending).await?;
    assert!(Arc::ptr_eq(&first, &second));

    // The chain moves on: the reward is minted
    script_reward(&fake, &config, 10, 7, U256::from(500), true);
    let third =
        views::load_action_rewards_memoized(&executor, &memo, &config, &token, 7, account(), &[10], &pending).await?;
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(third.rows[0].display, RewardDisplay::Minted);
    Ok(())
}

#[tokio::test]
async fn test_memoized_rewards_track_requested_rounds() -> Result<()> {
    let fake = Arc::new(FakeChainClient::new(account()));
    let config = sample_config();
    for round in 10..14 {
        script_reward(&fake, &config, round, 7, U256::zero(), false);
    }
    let executor = BatchExecutor::new(fake, 100);
    let pending = PendingWriteLog::new(Duration::from_secs(600));
    let memo = ViewMemo::new();
    let token = sample_token();

    let first =
        views::load_action_rewards_memoized(&executor, &memo, &config, &token, 7, account(), &[10, 11], &pending).await?;
    let second =
        views::load_action_rewards_memoized(&executor, &memo, &config, &token, 7, account(), &[12, 13], &pending).await?;

    // Same raw bytes for every round, but different rounds asked for
    assert!(!Arc::ptr_eq(&first, &second));
    let rounds: Vec<u64> = second.rows.iter().map(|row| row.record.round).collect();
    assert_eq!(rounds, vec![12, 13]);
    Ok(())
}

#[tokio::test]
async fn test_big_integers_survive_file_cache() -> Result<()> {
    let path = std::env::temp_dir().join(format!("love20-it-{}.json", uuid::Uuid::new_v4()));
    let big = U256::from_dec_str("123456789012345678901234567890").map_err(|e| love20_client::ClientError::internal(e.to_string()))?;
    let info = ActionInfo {
        id: U256::from(7),
        author: account(),
        create_at_block: U256::from(100),
        min_stake: big,
        max_random_accounts: U256::from(5),
        white_list_address: Address::zero(),
        title: "Daily reading".to_string(),
        verification_rule: "Post a summary".to_string(),
    };
    let key = keys::action_base_info(&token_address(), info.id);

    {
        let cache = LocalCache::new(FileStorage::open(&path)?);
        cache.set(&key, &info, CacheOptions::never())?;
    }

    let reopened = LocalCache::new(FileStorage::open(&path)?);
    let restored: Option<ActionInfo> = reopened.get(&key);
    assert_eq!(restored.map(|info| info.min_stake), Some(big));

    let _ = std::fs::remove_file(&path);
    Ok(())
}

#[tokio::test]
async fn test_action_infos_served_from_cache_after_first_load() -> Result<()> {
    let fake = Arc::new(FakeChainClient::read_only());
    let config = sample_config();
    let token = sample_token();
    let id = U256::from(7);
    fake.respond(
        &ContractCall::new(
            config.contracts.submit,
            &SUBMIT_ABI,
            "actionInfo",
            vec![Token::Address(token.address), Token::Uint(id)],
        ),
        vec![Token::Tuple(vec![
            Token::Tuple(vec![Token::Uint(id), Token::Address(account()), Token::Uint(U256::from(100))]),
            Token::Tuple(vec![
                Token::Uint(U256::from(1_000)),
                Token::Uint(U256::from(5)),
                Token::Address(Address::zero()),
                Token::String("Daily reading".to_string()),
                Token::String("Post a summary".to_string()),
            ]),
        ])],
    );
    let executor = BatchExecutor::new(fake.clone(), 100);
    let clock = Arc::new(ManualClock::new(0));
    let cache = LocalCache::with_clock(MemoryStorage::new(), clock.clone());

    let first = views::load_action_infos(&executor, &cache, &config, &token, &[id]).await?;
    assert_eq!(first[0].as_ref().map(|info| info.title.as_str()), Some("Daily reading"));

    // Action metadata never expires
    clock.advance(Duration::from_secs(365 * 24 * 3600));
    let second = views::load_action_infos(&executor, &cache, &config, &token, &[id]).await?;
    assert_eq!(first, second);
    assert_eq!(fake.batch_reads(), 1);
    Ok(())
}

#[tokio::test]
async fn test_group_name_expires_and_is_refetched() -> Result<()> {
    let fake = Arc::new(FakeChainClient::read_only());
    let mut config = sample_config();
    config.cache.group_name_ttl_seconds = 60;
    let group = ContractCall::new(
        config.contracts.group,
        &love20_protocol::abi::GROUP_ABI,
        "groupNameOf",
        vec![Token::Uint(U256::from(3))],
    );
    fake.respond(&group, vec![Token::String("readers".to_string())]);
    let executor = BatchExecutor::new(fake.clone(), 100);
    let clock = Arc::new(ManualClock::new(0));
    let cache = LocalCache::with_clock(MemoryStorage::new(), clock.clone());

    views::load_group_names(&executor, &cache, &config, &[U256::from(3)]).await?;
    clock.advance(Duration::from_secs(30));
    views::load_group_names(&executor, &cache, &config, &[U256::from(3)]).await?;
    assert_eq!(fake.batch_reads(), 1);

    clock.advance(Duration::from_secs(30));
    let names = views::load_group_names(&executor, &cache, &config, &[U256::from(3)]).await?;
    assert_eq!(names[&U256::from(3)], "readers");
    assert_eq!(fake.batch_reads(), 2);
    Ok(())
}
