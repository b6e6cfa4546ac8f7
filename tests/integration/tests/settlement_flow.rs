//! Integration test: settlement-layer properties across crates.
//!
//! Exercises fee conservation, batch independence, redirect resolution at
//! transfer time, and the native-currency round-trip on rejection.

use subflow_core::types::{AccountId, Amount, CorrelationTag, PaymentKind, TokenId};
use subflow_integration_tests::Harness;
use subflow_settlement::{SettlementError, TokenLedger};

fn acct(name: &str) -> AccountId {
    AccountId::new(name)
}

fn usdc() -> TokenId {
    TokenId::new("usdc")
}

fn tag(n: u8) -> CorrelationTag {
    CorrelationTag::from_bytes([n; 32])
}

// =========================================================================
// Fee conservation
// =========================================================================

#[test]
fn test_fee_conservation_across_batch() {
    let h = Harness::new();
    // 1.37% fee: awkward enough to exercise per-line flooring.
    h.fees
        .set_base_fee(&h.root, PaymentKind::OnDemand, 137)
        .expect("set fee");

    let senders = [acct("s1"), acct("s2"), acct("s3")];
    for sender in &senders {
        h.fund(sender, 1_000_000);
    }
    let receivers = [acct("r1"), acct("r2")];
    let amounts = vec![vec![12_345, 67_890], vec![999, 1], vec![500_000, 250_000]];
    let gross: Amount = amounts.iter().flatten().sum();

    let results = h
        .settlement
        .batch_transfer(
            &usdc(),
            &senders,
            &receivers,
            &amounts,
            &acct("merchant"),
            PaymentKind::OnDemand,
            &[tag(1), tag(2), tag(3)],
        )
        .expect("batch transfer");
    assert_eq!(results, vec![true, true, true]);

    // Every unit pulled ends up with a receiver or the fee collector.
    let delivered = h.balance(&acct("r1")) + h.balance(&acct("r2"));
    let fee = h.balance(&h.config.fee_collector);
    assert_eq!(delivered + fee, gross);

    // Per-line floor: fee(12_345) = floor(12_345 * 137 / 10_000) = 169.
    assert_eq!(h.balance(&acct("r1")), (12_345 - 169) + (999 - 13) + (500_000 - 6850));

    // Custody fully drained.
    assert_eq!(h.balance(&TokenLedger::custody_account()), 0);
}

// =========================================================================
// Batch independence
// =========================================================================

#[test]
fn test_one_delinquent_sender_never_affects_others() {
    let h = Harness::new();
    h.fund(&acct("payer-a"), 10_000);
    h.fund(&acct("payer-b"), 1); // cannot cover its item
    h.fund(&acct("payer-c"), 10_000);

    let receivers = [acct("shop")];
    let amounts = vec![vec![4_000], vec![4_000], vec![4_000]];

    let results = h
        .settlement
        .batch_transfer(
            &usdc(),
            &[acct("payer-a"), acct("payer-b"), acct("payer-c")],
            &receivers,
            &amounts,
            &acct("shop"),
            PaymentKind::FixedRecurring,
            &[tag(1), tag(2), tag(3)],
        )
        .expect("batch transfer");

    assert_eq!(results, vec![true, false, true]);
    assert_eq!(h.balance(&acct("shop")), 8_000);
    assert_eq!(h.balance(&acct("payer-b")), 1);
}

// =========================================================================
// Redirects resolve at transfer time
// =========================================================================

#[test]
fn test_retroactive_redirect() {
    let h = Harness::new();
    let v2 = TokenId::new("usdc-v2");
    h.directory.add_token(&h.root, &v2).expect("add v2");

    // Funds already live under the successor when the redirect lands.
    h.settlement
        .ledger()
        .deposit(&acct("alice"), &v2, 5_000)
        .expect("deposit");
    h.settlement
        .ledger()
        .authorize(&acct("alice"), &v2, 5_000)
        .expect("authorize");
    h.directory.redirect(&h.root, &usdc(), &v2).expect("redirect");

    // A transfer naming the retired identifier settles in the successor.
    let ok = h
        .settlement
        .transfer(
            &usdc(),
            &acct("alice"),
            &[acct("bob")],
            &[1_234],
            &acct("merchant"),
            PaymentKind::OneTime,
            tag(7),
        )
        .expect("transfer");
    assert!(ok);
    assert_eq!(
        h.settlement
            .ledger()
            .balance_of(&acct("bob"), &v2)
            .expect("balance"),
        1_234
    );
}

#[test]
fn test_paused_token_rejects_call_level() {
    let h = Harness::new();
    h.fund(&acct("alice"), 1_000);
    h.directory.pause(&h.root, &usdc()).expect("pause");

    let before = h.events.len();
    let result = h.settlement.transfer(
        &usdc(),
        &acct("alice"),
        &[acct("bob")],
        &[100],
        &acct("merchant"),
        PaymentKind::OneTime,
        tag(1),
    );
    assert!(matches!(result, Err(SettlementError::InactiveToken(_))));
    // Call-level rejection: nothing emitted, nothing moved.
    assert_eq!(h.events.len(), before);
    assert_eq!(h.balance(&acct("alice")), 1_000);
}

// =========================================================================
// Native currency
// =========================================================================

#[test]
fn test_native_mismatch_round_trips() {
    let h = Harness::new();
    h.settlement
        .ledger()
        .deposit(&acct("alice"), &TokenId::native(), 10_000)
        .expect("deposit");
    let before = h.events.len();

    let result = h.settlement.transfer_native(
        &acct("alice"),
        &[acct("bob"), acct("carol")],
        &[600, 300],
        1_000, // attached != 900
        &acct("merchant"),
        tag(1),
    );
    assert!(matches!(
        result,
        Err(SettlementError::NativeValueMismatch {
            attached: 1_000,
            required: 900,
        })
    ));
    assert_eq!(h.native_balance(&acct("alice")), 10_000);
    assert_eq!(h.native_balance(&acct("bob")), 0);
    assert_eq!(h.native_balance(&acct("carol")), 0);
    assert_eq!(h.events.len(), before);
}

#[test]
fn test_native_success_with_fee() {
    let h = Harness::new();
    h.fees
        .set_base_fee(&h.root, PaymentKind::OneTime, 250)
        .expect("set fee");
    h.settlement
        .ledger()
        .deposit(&acct("alice"), &TokenId::native(), 1_000)
        .expect("deposit");

    h.settlement
        .transfer_native(
            &acct("alice"),
            &[acct("bob")],
            &[1_000],
            1_000,
            &acct("merchant"),
            tag(1),
        )
        .expect("native transfer");

    assert_eq!(h.native_balance(&acct("alice")), 0);
    assert_eq!(h.native_balance(&acct("bob")), 975);
    assert_eq!(h.native_balance(&h.config.fee_collector), 25);
}

// =========================================================================
// Account-specific fee override
// =========================================================================

#[test]
fn test_account_override_beats_base_rate() {
    let h = Harness::new();
    h.fees
        .set_base_fee(&h.root, PaymentKind::OneTime, 500)
        .expect("set base");
    h.fees
        .set_account_fee(&h.root, &acct("vip"), PaymentKind::OneTime, 100)
        .expect("set override");
    h.fund(&acct("alice"), 20_000);

    // Fee account "vip": 1% instead of 5%.
    h.settlement
        .transfer(
            &usdc(),
            &acct("alice"),
            &[acct("shop")],
            &[10_000],
            &acct("vip"),
            PaymentKind::OneTime,
            tag(1),
        )
        .expect("transfer");
    assert_eq!(h.balance(&acct("shop")), 9_900);
    assert_eq!(h.balance(&h.config.fee_collector), 100);
}
