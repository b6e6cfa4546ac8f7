//! Integration test: variable-recurring billing, including the worked
//! 30-day scenario and the duplicate-batch guard.

use subflow_billing::{BillOutcome, BillingError, PayoutConfig, PlanCap, ReceiverShare};
use subflow_core::types::{AccountId, PlanId, TokenId};
use subflow_integration_tests::Harness;

const T0: u64 = 1_700_000_000;
const MONTH: u64 = 2_592_000; // 30 days
const DAY: u64 = 86_400;

fn acct(name: &str) -> AccountId {
    AccountId::new(name)
}

fn create_plan(h: &Harness, max_amount: u128) -> PlanId {
    h.variable
        .plans()
        .create_plan_at(
            &acct("merchant"),
            "metered",
            &TokenId::new("usdc"),
            MONTH,
            PayoutConfig::Shares(vec![
                ReceiverShare {
                    account: acct("merchant"),
                    share_bps: 9_000,
                },
                ReceiverShare {
                    account: acct("partner"),
                    share_bps: 1_000,
                },
            ]),
            PlanCap::MaxAmount(max_amount),
            T0,
        )
        .expect("create plan")
}

// =========================================================================
// The worked scenario: period 2_592_000, maxAmount 4000
// =========================================================================

#[test]
fn test_thirty_day_scenario() {
    let h = Harness::new();
    let plan_id = create_plan(&h, 4_000);
    let alice = acct("alice");
    h.fund(&alice, 100_000);
    let id = h
        .variable
        .subscribe_at(&alice, &plan_id, T0)
        .expect("subscribe");

    // Billed 2000 at day 31: succeeds, and the cycle anchor advances by
    // exactly one period, not to "now".
    let day31 = T0 + 31 * DAY;
    let outcomes = h
        .variable
        .bill_at(&acct("merchant"), &plan_id, &[id], &[2_000], day31)
        .expect("bill");
    assert_eq!(outcomes, vec![BillOutcome::Billed]);

    // Percentage receivers [9000, 1000] on a 2000 billing with 0% fee:
    // receiver amounts [1800, 200], fee 0.
    assert_eq!(h.balance(&acct("merchant")), 1_800);
    assert_eq!(h.balance(&acct("partner")), 200);
    assert_eq!(h.balance(&h.config.fee_collector), 0);

    // Re-billed immediately after, before the next expiry: filtered out
    // as ineligible, with no notification of either kind.
    let before = h.events.len();
    let result = h
        .variable
        .bill_at(&acct("merchant"), &plan_id, &[id], &[2_000], day31 + 60);
    assert!(matches!(result, Err(BillingError::NoEligibleSubscriptions)));
    assert_eq!(h.events.len(), before);
}

#[test]
fn test_amount_above_cap_disqualifies_item() {
    let h = Harness::new();
    let plan_id = create_plan(&h, 4_000);
    let alice = acct("alice");
    let bob = acct("bob");
    h.fund(&alice, 100_000);
    h.fund(&bob, 100_000);
    let a = h
        .variable
        .subscribe_at(&alice, &plan_id, T0)
        .expect("subscribe");
    let b = h.variable.subscribe_at(&bob, &plan_id, T0).expect("subscribe");

    // Alice's request exceeds maxAmount and is skipped; Bob's lands.
    let outcomes = h
        .variable
        .bill_at(
            &acct("merchant"),
            &plan_id,
            &[a, b],
            &[4_001, 4_000],
            T0 + MONTH + 1,
        )
        .expect("bill");
    assert_eq!(outcomes, vec![BillOutcome::Skipped, BillOutcome::Billed]);
    assert_eq!(h.balance(&alice), 100_000);
    assert_eq!(h.balance(&bob), 96_000);
}

// =========================================================================
// Duplicate-batch guard
// =========================================================================

#[test]
fn test_duplicate_id_rejects_batch_outright() {
    let h = Harness::new();
    let plan_id = create_plan(&h, 4_000);
    let alice = acct("alice");
    let bob = acct("bob");
    h.fund(&alice, 100_000);
    h.fund(&bob, 100_000);
    let a = h
        .variable
        .subscribe_at(&alice, &plan_id, T0)
        .expect("subscribe");
    let b = h.variable.subscribe_at(&bob, &plan_id, T0).expect("subscribe");

    let before = h.events.len();
    let result = h.variable.bill_at(
        &acct("merchant"),
        &plan_id,
        &[a, b, a],
        &[1_000, 1_000, 1_000],
        T0 + MONTH + 1,
    );
    assert!(matches!(result, Err(BillingError::DuplicateInBatch)));
    // Zero notifications emitted, zero state mutated — even for the
    // non-duplicated entry.
    assert_eq!(h.events.len(), before);
    assert_eq!(h.balance(&alice), 100_000);
    assert_eq!(h.balance(&bob), 100_000);
}

// =========================================================================
// Deferred cancellation
// =========================================================================

#[test]
fn test_cancellation_request_settles_then_removes() {
    let h = Harness::new();
    let plan_id = create_plan(&h, 4_000);
    let alice = acct("alice");
    h.fund(&alice, 10_000);
    let id = h
        .variable
        .subscribe_at(&alice, &plan_id, T0)
        .expect("subscribe");

    h.variable
        .request_cancellation_at(&alice, &id, T0 + DAY)
        .expect("request");
    // Still subscribed until a successful billing honors the request.
    assert!(h.variable.is_subscribed(&plan_id, &alice).expect("check"));

    let outcomes = h
        .variable
        .bill_at(&acct("merchant"), &plan_id, &[id], &[1_500], T0 + 2 * DAY)
        .expect("bill");
    assert_eq!(outcomes, vec![BillOutcome::Billed]);
    assert_eq!(h.balance(&alice), 8_500);
    assert!(!h.variable.is_subscribed(&plan_id, &alice).expect("check"));
}

#[test]
fn test_cancellation_request_survives_failed_billing() {
    let h = Harness::new();
    let plan_id = create_plan(&h, 4_000);
    let alice = acct("alice");
    h.fund(&alice, 100);
    let id = h
        .variable
        .subscribe_at(&alice, &plan_id, T0)
        .expect("subscribe");
    h.variable
        .request_cancellation_at(&alice, &id, T0 + DAY)
        .expect("request");

    // The final charge fails for funds: the subscription stays, still
    // flagged, and a later retry completes the cancellation.
    let outcomes = h
        .variable
        .bill_at(&acct("merchant"), &plan_id, &[id], &[1_500], T0 + 2 * DAY)
        .expect("bill");
    assert_eq!(outcomes, vec![BillOutcome::Failed]);
    assert!(h.variable.is_subscribed(&plan_id, &alice).expect("check"));

    h.fund(&alice, 10_000);
    let outcomes = h
        .variable
        .bill_at(&acct("merchant"), &plan_id, &[id], &[1_500], T0 + 3 * DAY)
        .expect("bill");
    assert_eq!(outcomes, vec![BillOutcome::Billed]);
    assert!(!h.variable.is_subscribed(&plan_id, &alice).expect("check"));
}
