//! Integration test: on-demand billing against customer-set allowances.

use subflow_billing::{BillOutcome, BillingError, CycleState, PayoutConfig, PlanCap, ReceiverShare};
use subflow_core::types::{AccountId, PlanId, TokenId};
use subflow_integration_tests::Harness;

const T0: u64 = 1_700_000_000;
const WEEK: u64 = 604_800;

fn acct(name: &str) -> AccountId {
    AccountId::new(name)
}

fn create_plan(h: &Harness, min_allowance: u128) -> PlanId {
    h.on_demand
        .plans()
        .create_plan_at(
            &acct("provider"),
            "usage",
            &TokenId::new("usdc"),
            WEEK,
            PayoutConfig::Shares(vec![ReceiverShare {
                account: acct("provider"),
                share_bps: 10_000,
            }]),
            PlanCap::MinAllowance(min_allowance),
            T0,
        )
        .expect("create plan")
}

#[test]
fn test_no_payment_at_subscribe() {
    let h = Harness::new();
    let plan_id = create_plan(&h, 500);
    let alice = acct("alice");
    h.fund(&alice, 10_000);

    h.on_demand
        .subscribe_on_demand_at(&alice, &plan_id, 2_000, T0)
        .expect("subscribe");
    assert_eq!(h.balance(&alice), 10_000);
}

#[test]
fn test_spent_accumulates_and_resets_per_window() {
    let h = Harness::new();
    let plan_id = create_plan(&h, 500);
    let alice = acct("alice");
    h.fund(&alice, 100_000);
    let id = h
        .on_demand
        .subscribe_on_demand_at(&alice, &plan_id, 2_000, T0)
        .expect("subscribe");

    // Window 1: 800 + 1200 exactly exhausts the allowance.
    h.on_demand
        .bill_at(&acct("provider"), &plan_id, &[id], &[800], T0 + 100)
        .expect("bill");
    h.on_demand
        .bill_at(&acct("provider"), &plan_id, &[id], &[1_200], T0 + 200)
        .expect("bill");
    let result = h
        .on_demand
        .bill_at(&acct("provider"), &plan_id, &[id], &[1], T0 + 300);
    assert!(matches!(result, Err(BillingError::NoEligibleSubscriptions)));

    // Window 2 (a week later): the ceiling is fresh.
    let outcomes = h
        .on_demand
        .bill_at(&acct("provider"), &plan_id, &[id], &[2_000], T0 + WEEK + 50)
        .expect("bill");
    assert_eq!(outcomes, vec![BillOutcome::Billed]);
    assert_eq!(h.balance(&alice), 100_000 - 4_000);

    match h
        .on_demand
        .get_subscription(&id)
        .expect("get")
        .expect("present")
        .state
    {
        CycleState::OnDemand { spent, .. } => assert_eq!(spent, 2_000),
        _ => panic!("expected on-demand state"),
    }
}

#[test]
fn test_windows_anchor_to_subscription_time() {
    let h = Harness::new();
    let plan_id = create_plan(&h, 500);
    let alice = acct("alice");
    h.fund(&alice, 100_000);
    // Subscribed mid-week relative to T0; windows run from subscribe time.
    let subscribed = T0 + 3 * 86_400;
    let id = h
        .on_demand
        .subscribe_on_demand_at(&alice, &plan_id, 1_000, subscribed)
        .expect("subscribe");

    h.on_demand
        .bill_at(&acct("provider"), &plan_id, &[id], &[1_000], subscribed + 100)
        .expect("bill");

    // Still inside the subscriber's first window just before it rolls.
    let result = h.on_demand.bill_at(
        &acct("provider"),
        &plan_id,
        &[id],
        &[1_000],
        subscribed + WEEK - 1,
    );
    assert!(matches!(result, Err(BillingError::NoEligibleSubscriptions)));

    // First instant of the second window.
    let outcomes = h
        .on_demand
        .bill_at(
            &acct("provider"),
            &plan_id,
            &[id],
            &[1_000],
            subscribed + WEEK,
        )
        .expect("bill");
    assert_eq!(outcomes, vec![BillOutcome::Billed]);
}

#[test]
fn test_allowance_update_applies_to_future_billing() {
    let h = Harness::new();
    let plan_id = create_plan(&h, 500);
    let alice = acct("alice");
    h.fund(&alice, 100_000);
    let id = h
        .on_demand
        .subscribe_on_demand_at(&alice, &plan_id, 1_000, T0)
        .expect("subscribe");

    // 3000 exceeds the current ceiling.
    let result = h
        .on_demand
        .bill_at(&acct("provider"), &plan_id, &[id], &[3_000], T0 + 100);
    assert!(matches!(result, Err(BillingError::NoEligibleSubscriptions)));

    h.on_demand
        .change_allowance(&alice, &id, 5_000)
        .expect("raise allowance");
    let outcomes = h
        .on_demand
        .bill_at(&acct("provider"), &plan_id, &[id], &[3_000], T0 + 200)
        .expect("bill");
    assert_eq!(outcomes, vec![BillOutcome::Billed]);
}

#[test]
fn test_cancel_is_immediate() {
    let h = Harness::new();
    let plan_id = create_plan(&h, 500);
    let alice = acct("alice");
    h.fund(&alice, 100_000);
    let id = h
        .on_demand
        .subscribe_on_demand_at(&alice, &plan_id, 1_000, T0)
        .expect("subscribe");

    h.on_demand.cancel(&alice, &id).expect("cancel");
    assert!(!h.on_demand.is_subscribed(&plan_id, &alice).expect("check"));

    // Billing the removed id finds nothing.
    let result = h
        .on_demand
        .bill_at(&acct("provider"), &plan_id, &[id], &[100], T0 + 100);
    assert!(matches!(result, Err(BillingError::NoEligibleSubscriptions)));
}

#[test]
fn test_mixed_batch_across_subscribers() {
    let h = Harness::new();
    let plan_id = create_plan(&h, 500);
    let alice = acct("alice");
    let bob = acct("bob");
    let carol = acct("carol");
    h.fund(&alice, 100_000);
    h.fund(&bob, 10); // underfunded
    h.fund(&carol, 100_000);

    let a = h
        .on_demand
        .subscribe_on_demand_at(&alice, &plan_id, 5_000, T0)
        .expect("subscribe");
    let b = h
        .on_demand
        .subscribe_on_demand_at(&bob, &plan_id, 5_000, T0)
        .expect("subscribe");
    let c = h
        .on_demand
        .subscribe_on_demand_at(&carol, &plan_id, 500, T0)
        .expect("subscribe");

    // Alice pays, Bob fails at settlement, Carol's request exceeds her
    // own allowance and is skipped before settlement.
    let outcomes = h
        .on_demand
        .bill_at(
            &acct("provider"),
            &plan_id,
            &[a, b, c],
            &[1_000, 1_000, 1_000],
            T0 + 100,
        )
        .expect("bill");
    assert_eq!(
        outcomes,
        vec![BillOutcome::Billed, BillOutcome::Failed, BillOutcome::Skipped]
    );
    assert_eq!(h.balance(&acct("provider")), 1_000);

    // Bob's failure left his state untouched: retry succeeds after top-up.
    h.fund(&bob, 10_000);
    let outcomes = h
        .on_demand
        .bill_at(&acct("provider"), &plan_id, &[b], &[1_000], T0 + 200)
        .expect("bill");
    assert_eq!(outcomes, vec![BillOutcome::Billed]);
}
