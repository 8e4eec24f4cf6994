//! Mutation sequencer: step order, guards, failure classification and refresh

mod common;

use common::*;
use simpledex_client::{CacheKey, MutationRequest, MutationSequencer};
use std::time::Duration;
use types::{ErrorKind, GuardRejection, MutationStatus, TokenId, H256, U256};

fn tx(n: u64) -> H256 {
    H256::from_low_u64_be(n)
}

async fn wait_for_status(sequencer: &MutationSequencer, status: MutationStatus) {
    let mut progress = sequencer.subscribe();
    let _ = progress
        .wait_for(|job| job.as_ref().is_some_and(|job| job.status == status))
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_add_liquidity_approves_each_token_then_adds() {
    let ledger = MockLedger::new();
    let (client, _wallet, _session) = connected_client(ledger.clone(), quiet_config()).await;
    let mut panel = client.add_liquidity_panel();

    panel.set_amount(TokenId::A, "100").unwrap();
    panel.set_amount(TokenId::B, "50").unwrap();
    let outcome = panel.submit().await.unwrap();

    assert!(outcome.succeeded());
    assert_eq!(outcome.error, None);
    assert_eq!(outcome.tx_hash, Some(tx(3)));
    assert_eq!(
        ledger.writes(),
        vec![
            Call::Approve(TokenId::A, tokens(100)),
            Call::Wait(tx(1)),
            Call::Approve(TokenId::B, tokens(50)),
            Call::Wait(tx(2)),
            Call::AddLiquidity(tokens(100), tokens(50)),
            Call::Wait(tx(3)),
        ]
    );
    // Inputs reset after success
    assert_eq!(panel.amounts(), (U256::zero(), U256::zero()));
}

#[tokio::test(start_paused = true)]
async fn test_failed_step_abandons_the_rest() {
    let ledger = MockLedger::new();
    ledger.fail(Op::Approve(TokenId::B), Failure::Rejected);
    let (client, _wallet, _session) = connected_client(ledger.clone(), quiet_config()).await;
    let mut panel = client.add_liquidity_panel();

    panel.set_amount(TokenId::A, "100").unwrap();
    panel.set_amount(TokenId::B, "50").unwrap();
    let outcome = panel.submit().await.unwrap();

    assert_eq!(outcome.status, MutationStatus::Failed);
    assert_eq!(outcome.error, Some(ErrorKind::UserRejected));
    assert_eq!(
        ledger.writes(),
        vec![
            Call::Approve(TokenId::A, tokens(100)),
            Call::Wait(tx(1)),
            Call::Approve(TokenId::B, tokens(50)),
        ]
    );
    // Inputs survive a failure
    assert_eq!(panel.amounts(), (tokens(100), tokens(50)));
}

#[tokio::test(start_paused = true)]
async fn test_reverted_approval_receipt_fails() {
    let ledger = MockLedger::new();
    ledger.fail(Op::Approve(TokenId::A), Failure::RevertedReceipt);
    let (client, _wallet, _session) = connected_client(ledger.clone(), quiet_config()).await;
    let mut panel = client.swap_panel();

    panel.set_amount("5").unwrap();
    let outcome = panel.submit().await.unwrap();

    assert_eq!(outcome.error, Some(ErrorKind::TransactionFailed));
    assert_eq!(
        ledger.writes(),
        vec![Call::Approve(TokenId::A, tokens(5)), Call::Wait(tx(1))]
    );
}

#[tokio::test(start_paused = true)]
async fn test_revert_reason_is_classified() {
    let ledger = MockLedger::new();
    ledger.fail(Op::Swap, Failure::Revert("Insufficient output amount"));
    let (client, _wallet, _session) = connected_client(ledger.clone(), quiet_config()).await;
    let mut panel = client.swap_panel();

    panel.set_amount("5").unwrap();
    let outcome = panel.submit().await.unwrap();

    assert_eq!(outcome.error, Some(ErrorKind::InsufficientLiquidity));
    assert_eq!(outcome.tx_hash, None);
}

#[tokio::test(start_paused = true)]
async fn test_second_run_while_active_is_rejected() {
    let ledger = MockLedger::new();
    let (client, _wallet, _session) = connected_client(ledger.clone(), quiet_config()).await;
    let panel = client.swap_panel();
    let gate = ledger.gate_approvals();

    let request = MutationRequest::Swap {
        token_in: TokenId::A,
        amount_in: tokens(1),
    };
    let sequencer = panel.sequencer().clone();
    let first = tokio::spawn(async move { sequencer.run(request).await });
    wait_for_status(panel.sequencer(), MutationStatus::Approving).await;

    assert_eq!(panel.sequencer().run(request).await, Err(GuardRejection::Busy));

    gate.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert!(outcome.succeeded());
    assert_eq!(ledger.count(|call| matches!(call, Call::Swap(..))), 1);
    assert_eq!(ledger.count(|call| matches!(call, Call::Approve(..))), 1);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_state_returns_to_idle_after_display_window() {
    let ledger = MockLedger::new();
    ledger.fail(Op::Swap, Failure::Network);
    let (client, _wallet, _session) = connected_client(ledger.clone(), quiet_config()).await;
    let mut panel = client.swap_panel();

    panel.set_amount("1").unwrap();
    let outcome = panel.submit().await.unwrap();
    assert_eq!(outcome.error, Some(ErrorKind::NetworkError));

    let job = panel.sequencer().current().unwrap();
    assert_eq!(job.status, MutationStatus::Failed);
    assert_eq!(job.status_text(), "✗ Swap failed");

    // Still blocking a new job during the window
    assert_eq!(panel.submit().await, Err(GuardRejection::Busy));

    tokio::time::sleep(Duration::from_millis(3_900)).await;
    assert_eq!(panel.sequencer().status(), MutationStatus::Failed);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(panel.sequencer().status(), MutationStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_dismiss_ends_window_early() {
    let ledger = MockLedger::new();
    let (client, _wallet, _session) = connected_client(ledger.clone(), quiet_config()).await;
    let mut panel = client.swap_panel();

    panel.set_amount("1").unwrap();
    assert!(panel.submit().await.unwrap().succeeded());
    assert_eq!(panel.sequencer().status(), MutationStatus::Succeeded);

    assert!(panel.sequencer().dismiss());
    assert_eq!(panel.sequencer().status(), MutationStatus::Idle);
    assert!(!panel.sequencer().dismiss());
}

#[tokio::test(start_paused = true)]
async fn test_success_refreshes_balances_immediately_and_later() {
    let ledger = MockLedger::new();
    ledger.set_quote(tokens(2));
    let (client, _wallet, session) = connected_client(ledger.clone(), quiet_config()).await;
    let before = loaded(client.balances()).await;
    assert_eq!(before.value.token_a, tokens(100));

    let balance_reads = || ledger.count(|call| matches!(call, Call::TokenBalance(..)));
    let reserve_reads = || ledger.count(|call| matches!(call, Call::Reserves));
    let initial_balance_reads = balance_reads();

    let mut panel = client.swap_panel();
    panel.set_amount("10").unwrap();
    let outcome = panel.submit().await.unwrap();
    assert!(outcome.succeeded());
    let reserves_after_submit = reserve_reads();

    tokio::time::sleep(Duration::from_millis(10)).await;
    let after = client.balances().current();
    assert_eq!(after.value.token_a, tokens(90));
    assert_eq!(after.value.token_b, tokens(102));
    assert_eq!(balance_reads(), initial_balance_reads + 2);
    assert!(reserve_reads() > reserves_after_submit);

    // Delayed passes at 5 s and 10 s
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(balance_reads(), initial_balance_reads + 6);
    assert!(client.connection().is_current(session.id));
}

#[tokio::test(start_paused = true)]
async fn test_delayed_refresh_skipped_after_disconnect() {
    let ledger = MockLedger::new();
    let (client, _wallet, _session) = connected_client(ledger.clone(), quiet_config()).await;
    let mut panel = client.swap_panel();

    panel.set_amount("1").unwrap();
    assert!(panel.submit().await.unwrap().succeeded());
    tokio::time::sleep(Duration::from_millis(10)).await;

    client.disconnect();
    let reads = ledger.calls().len();
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(ledger.calls().len(), reads);
}

#[tokio::test(start_paused = true)]
async fn test_empty_pool_fails_before_any_approval() {
    let ledger = MockLedger::new();
    ledger.set_reserves(U256::zero(), tokens(5));
    let (client, _wallet, _session) = connected_client(ledger.clone(), quiet_config()).await;
    let mut panel = client.swap_panel();

    panel.set_amount("1").unwrap();
    let outcome = panel.submit().await.unwrap();

    assert_eq!(outcome.status, MutationStatus::Failed);
    assert_eq!(outcome.error, Some(ErrorKind::PoolEmpty));
    assert!(ledger.writes().is_empty());
    assert_eq!(panel.sequencer().current().unwrap().status_text(), "✗ Liquidity issue");
}

#[tokio::test(start_paused = true)]
async fn test_zero_or_empty_lp_amount_never_submits() {
    let ledger = MockLedger::new();
    let (client, _wallet, _session) = connected_client(ledger.clone(), quiet_config()).await;
    let mut panel = client.remove_liquidity_panel();

    assert_eq!(panel.set_amount("0").unwrap(), U256::zero());
    assert_eq!(panel.submit().await, Err(GuardRejection::ZeroAmount));

    assert_eq!(panel.set_amount(""), Err(GuardRejection::EmptyInput));
    assert_eq!(panel.submit().await, Err(GuardRejection::ZeroAmount));

    assert!(ledger.writes().is_empty());
    assert_eq!(panel.sequencer().status(), MutationStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_remove_liquidity_needs_no_approval() {
    let ledger = MockLedger::new();
    let (client, _wallet, _session) = connected_client(ledger.clone(), quiet_config()).await;
    loaded(client.lp_position()).await;
    let mut panel = client.remove_liquidity_panel();

    panel.set_amount("4").unwrap();
    let outcome = panel.submit().await.unwrap();

    assert!(outcome.succeeded());
    assert_eq!(
        ledger.writes(),
        vec![Call::RemoveLiquidity(tokens(4)), Call::Wait(tx(1))]
    );
}

#[tokio::test(start_paused = true)]
async fn test_no_session_is_rejected() {
    let client = simpledex_client::DexClient::new(quiet_config());
    let mut panel = client.swap_panel();

    panel.set_amount("1").unwrap();
    assert_eq!(panel.submit().await, Err(GuardRejection::NoSession));
}

#[tokio::test(start_paused = true)]
async fn test_over_balance_request_is_rejected() {
    let ledger = MockLedger::new();
    let (client, _wallet, _session) = connected_client(ledger.clone(), quiet_config()).await;
    loaded(client.balances()).await;
    let sequencer = client.swap_panel().sequencer().clone();

    let result = sequencer
        .run(MutationRequest::Swap {
            token_in: TokenId::B,
            amount_in: tokens(101),
        })
        .await;
    assert_eq!(result, Err(GuardRejection::ExceedsBalance));
    assert!(ledger.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_session_change_abandons_job() {
    let ledger = MockLedger::new();
    let (client, wallet, _session) = connected_client(ledger.clone(), quiet_config()).await;
    let panel = client.add_liquidity_panel();
    let gate = ledger.gate_approvals();

    let sequencer = panel.sequencer().clone();
    let job = tokio::spawn(async move {
        sequencer
            .run(MutationRequest::AddLiquidity {
                amount_a: tokens(10),
                amount_b: tokens(5),
            })
            .await
    });
    wait_for_status(panel.sequencer(), MutationStatus::Approving).await;

    wallet.emit_accounts(vec![bob()]);
    let mut sessions = client.connection().subscribe();
    let _ = sessions
        .wait_for(|state| state.as_ref().is_some_and(|s| s.account == bob()))
        .await
        .unwrap();

    gate.notify_one();
    let outcome = job.await.unwrap().unwrap();

    assert_eq!(outcome.error, Some(ErrorKind::SessionChanged));
    // The approval already in flight completes; nothing after it is issued
    assert_eq!(
        ledger.writes(),
        vec![Call::Approve(TokenId::A, tokens(10)), Call::Wait(tx(1))]
    );
}

#[tokio::test(start_paused = true)]
async fn test_slippage_guard_rejects_moved_quote() {
    let ledger = MockLedger::new();
    let mut config = quiet_config();
    config.sequencer.slippage_guard_bps = Some(100);
    let (client, _wallet, _session) = connected_client(ledger.clone(), config.clone()).await;
    let sequencer = MutationSequencer::new(
        client.connection().clone(),
        client.cache().clone(),
        config.sequencer.clone(),
    );
    let request = MutationRequest::Swap {
        token_in: TokenId::A,
        amount_in: tokens(10),
    };

    // 10% worse on re-quote
    ledger.queue_quotes([tokens(10), tokens(9)]);
    let outcome = sequencer.run(request).await.unwrap();
    assert_eq!(outcome.error, Some(ErrorKind::InsufficientLiquidity));
    assert_eq!(sequencer.current().unwrap().quote, Some(tokens(10)));
    assert_eq!(ledger.count(|call| matches!(call, Call::Swap(..))), 0);

    assert!(sequencer.dismiss());

    // 0.5% worse is within 1%
    ledger.queue_quotes([tokens(10), tokens(10) * U256::from(995u64) / U256::from(1_000u64)]);
    let outcome = sequencer.run(request).await.unwrap();
    assert!(outcome.succeeded());
    assert_eq!(ledger.count(|call| matches!(call, Call::Swap(..))), 1);
}

#[tokio::test(start_paused = true)]
async fn test_progress_reports_each_step() {
    let ledger = MockLedger::new();
    let (client, _wallet, _session) = connected_client(ledger.clone(), quiet_config()).await;
    let panel = client.swap_panel();
    let mut progress = panel.progress();
    let sequencer = panel.sequencer().clone();

    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        while progress.changed().await.is_ok() {
            let status = progress.borrow_and_update().as_ref().map(|job| job.status);
            if let Some(status) = status {
                if seen.last() != Some(&status) {
                    seen.push(status);
                }
                if status.is_terminal() {
                    break;
                }
            }
        }
        seen
    });

    let gate = ledger.gate_approvals();
    let run = tokio::spawn(async move {
        sequencer
            .run(MutationRequest::Swap {
                token_in: TokenId::B,
                amount_in: tokens(1),
            })
            .await
    });
    wait_for_status(panel.sequencer(), MutationStatus::Approving).await;
    let job = panel.sequencer().current().unwrap();
    assert_eq!(job.status_text(), "Approving TKNB...");
    // Let the watcher observe the blocked step
    tokio::time::sleep(Duration::from_millis(1)).await;
    gate.notify_one();

    assert!(run.await.unwrap().unwrap().succeeded());
    let seen = watcher.await.unwrap();
    assert!(seen.contains(&MutationStatus::Approving));
    assert_eq!(seen.last(), Some(&MutationStatus::Succeeded));
    assert!(client.cache().is_registered(CacheKey::History));
}
