//! Trial, activation, webhook and limit behaviour against a real SQLite file

mod common;

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use rusqlite::Connection;

use common::TestDb;
use telegencore::billing::limits::{
    can_add_channel, can_add_source, can_generate, decrement_generations, increment_generations, remaining_generations,
    subscription_info,
};
use telegencore::billing::webhooks::{parse_cryptobot_update, parse_monobank_update};
use telegencore::billing::{
    activate_subscription, add_promo_code, ensure_user, expire_subscriptions, handle_cryptobot_update,
    handle_monobank_update, redeem_promo_code, Activation, PromoOutcome, WebhookOutcome,
};
use telegencore::models::{Payment, PaymentMethod, TariffCode};
use telegencore::storage::billing::{
    self, active_plan, count_active_subscriptions, get_payment_by_order_id, get_period_for, get_tariff_by_code,
    NewPayment,
};
use telegencore::storage::users::{get_user_by_id, reset_due_generation_counters, NewUser};
use telegencore::{get_connection, AppError};

fn period_id(conn: &Connection, code: TariffCode, months: i64) -> i64 {
    let tariff = get_tariff_by_code(conn, code).unwrap().unwrap();
    get_period_for(conn, tariff.id, months).unwrap().unwrap().id
}

fn pending_payment(
    conn: &Connection,
    user_id: i64,
    code: TariffCode,
    months: i64,
    method: PaymentMethod,
    order_id: &str,
    external_id: Option<&str>,
) -> Payment {
    billing::create_payment(
        conn,
        &NewPayment {
            user_id,
            amount: 29_900,
            payment_method: method,
            tariff_period_id: Some(period_id(conn, code, months)),
            order_id,
            external_id,
            pay_url: Some("https://pay.example/x"),
        },
    )
    .unwrap()
}

#[test]
fn test_new_user_gets_exactly_one_trial() {
    let db = TestDb::seeded();
    let user = db.user(1001);
    let conn = get_connection(&db.pool).unwrap();

    assert_eq!(count_active_subscriptions(&conn, user.id).unwrap(), 1);
    let (subscription, _, tariff) = active_plan(&conn, user.id).unwrap().unwrap();
    assert!(subscription.is_trial);
    assert_eq!(tariff.code, TariffCode::Free);
    assert_eq!(subscription.end_date - subscription.start_date, Duration::days(10));

    // Second contact neither duplicates the user nor the trial
    let (_, created) = ensure_user(
        &conn,
        &NewUser {
            telegram_id: 1001,
            username: Some("renamed"),
            first_name: Some("Test"),
            last_name: None,
        },
    )
    .unwrap();
    assert!(!created);
    assert_eq!(count_active_subscriptions(&conn, user.id).unwrap(), 1);
}

#[test]
fn test_no_trial_without_free_tariff() {
    let db = TestDb::new();
    let user = db.user(1002);
    let conn = get_connection(&db.pool).unwrap();
    assert_eq!(count_active_subscriptions(&conn, user.id).unwrap(), 0);
    assert!(!can_add_channel(&conn, user.id).unwrap());
    assert!(!can_generate(&conn, user.id, 1).unwrap());
    assert_eq!(remaining_generations(&conn, user.id).unwrap(), None);
}

#[test]
fn test_activation_replaces_trial_and_links_payment() {
    let db = TestDb::seeded();
    let user = db.user(1003);
    let conn = get_connection(&db.pool).unwrap();
    let payment = pending_payment(&conn, user.id, TariffCode::Basic, 6, PaymentMethod::Monobank, "ORDER_1003_a", None);

    let activation = activate_subscription(&conn, &payment).unwrap();
    let Activation::Activated {
        subscription,
        tariff,
        months,
        ..
    } = &activation
    else {
        panic!("expected activation, got {:?}", activation);
    };
    assert_eq!(tariff.code, TariffCode::Basic);
    assert_eq!(*months, 6);
    assert!(!subscription.is_trial);
    assert_eq!(subscription.end_date - subscription.start_date, Duration::days(180));
    assert!(activation.message().unwrap().contains("Сума: 299.00 ₴"));

    assert_eq!(count_active_subscriptions(&conn, user.id).unwrap(), 1);
    let linked = get_payment_by_order_id(&conn, "ORDER_1003_a").unwrap().unwrap();
    assert_eq!(linked.subscription_id, Some(subscription.id));
}

#[test]
fn test_downgrade_is_rejected_and_same_level_renews() {
    let db = TestDb::seeded();
    let user = db.user(1004);
    let conn = get_connection(&db.pool).unwrap();

    let pro = pending_payment(&conn, user.id, TariffCode::Pro, 1, PaymentMethod::Monobank, "ORDER_1004_p", None);
    assert!(matches!(activate_subscription(&conn, &pro).unwrap(), Activation::Activated { .. }));

    let basic = pending_payment(&conn, user.id, TariffCode::Basic, 1, PaymentMethod::Monobank, "ORDER_1004_b", None);
    assert_eq!(
        activate_subscription(&conn, &basic).unwrap(),
        Activation::Rejected {
            current_level: 3,
            new_level: 2
        }
    );
    assert_eq!(active_plan(&conn, user.id).unwrap().unwrap().2.code, TariffCode::Pro);

    let renewal = pending_payment(&conn, user.id, TariffCode::Pro, 12, PaymentMethod::Monobank, "ORDER_1004_r", None);
    assert!(matches!(activate_subscription(&conn, &renewal).unwrap(), Activation::Activated { .. }));
    assert_eq!(count_active_subscriptions(&conn, user.id).unwrap(), 1);
    assert_eq!(active_plan(&conn, user.id).unwrap().unwrap().1.months, 12);
}

#[test]
fn test_monobank_webhook_is_idempotent() {
    let db = TestDb::seeded();
    let user = db.user(1005);
    let conn = get_connection(&db.pool).unwrap();
    pending_payment(
        &conn,
        user.id,
        TariffCode::Basic,
        1,
        PaymentMethod::Monobank,
        "ORDER_1005_m",
        Some("inv_1005"),
    );

    let body = br#"{"invoiceId":"inv_1005","status":"success","reference":"ORDER_1005_m"}"#;
    let update = parse_monobank_update(body).unwrap();

    let first = handle_monobank_update(&conn, &update).unwrap();
    let (telegram_id, text) = first.notification().unwrap();
    assert_eq!(telegram_id, 1005);
    assert!(text.contains("Basic"));

    let second = handle_monobank_update(&conn, &update).unwrap();
    assert_eq!(
        second,
        WebhookOutcome::AlreadyProcessed {
            order_id: "ORDER_1005_m".to_string()
        }
    );
    assert_eq!(count_active_subscriptions(&conn, user.id).unwrap(), 1);
}

#[test]
fn test_monobank_falls_back_to_reference_and_marks_failures() {
    let db = TestDb::seeded();
    let user = db.user(1006);
    let conn = get_connection(&db.pool).unwrap();
    pending_payment(&conn, user.id, TariffCode::Basic, 1, PaymentMethod::Monobank, "ORDER_1006_f", None);

    let update = parse_monobank_update(br#"{"invoiceId":"unknown","status":"expired","reference":"ORDER_1006_f"}"#)
        .unwrap();
    assert_eq!(
        handle_monobank_update(&conn, &update).unwrap(),
        WebhookOutcome::MarkedFailed {
            order_id: "ORDER_1006_f".to_string()
        }
    );

    let processing = parse_monobank_update(br#"{"status":"processing","reference":"ORDER_1006_f"}"#).unwrap();
    assert_eq!(handle_monobank_update(&conn, &processing).unwrap(), WebhookOutcome::Ignored);

    let unknown = parse_monobank_update(br#"{"status":"success","reference":"ORDER_missing"}"#).unwrap();
    assert!(matches!(handle_monobank_update(&conn, &unknown), Err(AppError::NotFound(_))));
}

#[test]
fn test_cryptobot_webhook_uses_hidden_message() {
    let db = TestDb::seeded();
    let user = db.user(1007);
    let conn = get_connection(&db.pool).unwrap();
    pending_payment(
        &conn,
        user.id,
        TariffCode::Pro,
        1,
        PaymentMethod::Cryptobot,
        "ORDER_1007_c",
        Some("777"),
    );

    let ignored = parse_cryptobot_update(br#"{"update_type":"invoice_created","payload":null}"#).unwrap();
    assert_eq!(handle_cryptobot_update(&conn, &ignored).unwrap(), WebhookOutcome::Ignored);

    let paid = parse_cryptobot_update(
        br#"{"update_type":"invoice_paid","payload":{"invoice_id":777,"status":"paid","hidden_message":"Order ORDER_1007_c"}}"#,
    )
    .unwrap();
    let outcome = handle_cryptobot_update(&conn, &paid).unwrap();
    assert!(matches!(outcome, WebhookOutcome::Paid(Activation::Activated { .. })));
    assert_eq!(active_plan(&conn, user.id).unwrap().unwrap().2.code, TariffCode::Pro);

    let replay = handle_cryptobot_update(&conn, &paid).unwrap();
    assert!(matches!(replay, WebhookOutcome::AlreadyProcessed { .. }));
}

#[test]
fn test_expire_subscriptions_reports_owners() {
    let db = TestDb::seeded();
    let user = db.user(1008);
    let conn = get_connection(&db.pool).unwrap();

    assert!(expire_subscriptions(&conn, Utc::now()).unwrap().is_empty());
    let expired = expire_subscriptions(&conn, Utc::now() + Duration::days(11)).unwrap();
    assert_eq!(expired, vec![(1008, true)]);
    assert_eq!(count_active_subscriptions(&conn, user.id).unwrap(), 0);
}

#[test]
fn test_limits_follow_trial_tariff() {
    let db = TestDb::seeded();
    let user = db.user(1009);
    let conn = get_connection(&db.pool).unwrap();

    assert!(can_add_channel(&conn, user.id).unwrap());
    assert!(can_add_source(&conn, user.id, 1).unwrap());
    assert!(!can_add_source(&conn, user.id, 2).unwrap());
    drop(conn);

    db.flow(&user, vec![common::telegram_source("durov")], 5);
    let conn = get_connection(&db.pool).unwrap();
    assert!(!can_add_channel(&conn, user.id).unwrap());

    increment_generations(&conn, user.id, 295).unwrap();
    assert_eq!(remaining_generations(&conn, user.id).unwrap(), Some(5));
    assert!(can_generate(&conn, user.id, 5).unwrap());
    assert!(!can_generate(&conn, user.id, 6).unwrap());

    decrement_generations(&conn, user.id, 1000).unwrap();
    assert_eq!(get_user_by_id(&conn, user.id).unwrap().unwrap().generated_posts_count, 0);

    let info = subscription_info(&conn, user.id).unwrap().unwrap();
    assert!(info.is_trial);
    assert_eq!(info.generations_left(), 300);
}

#[test]
fn test_monthly_reset_zeroes_due_counters() {
    let db = TestDb::seeded();
    let user = db.user(1010);
    let conn = get_connection(&db.pool).unwrap();
    increment_generations(&conn, user.id, 42).unwrap();

    assert_eq!(reset_due_generation_counters(&conn, Utc::now()).unwrap(), 0);
    let later = Utc::now() + Duration::days(40);
    assert_eq!(reset_due_generation_counters(&conn, later).unwrap(), 1);

    let reset = get_user_by_id(&conn, user.id).unwrap().unwrap();
    assert_eq!(reset.generated_posts_count, 0);
    assert!(reset.generation_reset_at > later);
}

#[test]
fn test_failed_activation_leaves_payment_pending() {
    let db = TestDb::seeded();
    let user = db.user(1011);
    let conn = get_connection(&db.pool).unwrap();
    billing::create_payment(
        &conn,
        &NewPayment {
            user_id: user.id,
            amount: 29_900,
            payment_method: PaymentMethod::Monobank,
            tariff_period_id: None,
            order_id: "ORDER_1011_p",
            external_id: Some("inv_1011"),
            pay_url: None,
        },
    )
    .unwrap();

    let update = parse_monobank_update(br#"{"invoiceId":"inv_1011","status":"success"}"#).unwrap();
    assert!(matches!(handle_monobank_update(&conn, &update), Err(AppError::Validation(_))));

    let payment = get_payment_by_order_id(&conn, "ORDER_1011_p").unwrap().unwrap();
    assert!(!payment.is_successful);
    assert!(payment.subscription_id.is_none());
    // the trial is untouched by the rolled back activation
    assert!(active_plan(&conn, user.id).unwrap().unwrap().0.is_trial);

    // a retried delivery fails the same way instead of being swallowed
    assert!(matches!(handle_monobank_update(&conn, &update), Err(AppError::Validation(_))));
}

#[test]
fn test_concurrent_deliveries_activate_once() {
    let db = TestDb::seeded();
    let user = db.user(1012);
    {
        let conn = get_connection(&db.pool).unwrap();
        pending_payment(
            &conn,
            user.id,
            TariffCode::Basic,
            1,
            PaymentMethod::Monobank,
            "ORDER_1012_c",
            Some("inv_1012"),
        );
    }

    let update = parse_monobank_update(br#"{"invoiceId":"inv_1012","status":"success"}"#).unwrap();
    let outcomes: Vec<WebhookOutcome> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let pool = &db.pool;
                let update = &update;
                scope.spawn(move || {
                    let conn = get_connection(pool).unwrap();
                    handle_monobank_update(&conn, update).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let paid = outcomes
        .iter()
        .filter(|o| matches!(o, WebhookOutcome::Paid(_)))
        .count();
    assert_eq!(paid, 1);
    let conn = get_connection(&db.pool).unwrap();
    assert_eq!(count_active_subscriptions(&conn, user.id).unwrap(), 1);
    assert_eq!(active_plan(&conn, user.id).unwrap().unwrap().2.code, TariffCode::Basic);
}

#[test]
fn test_monobank_unknown_invoice_is_not_found() {
    let db = TestDb::seeded();
    let conn = get_connection(&db.pool).unwrap();
    let update = parse_monobank_update(br#"{"invoiceId":"inv_missing","status":"success"}"#).unwrap();
    match handle_monobank_update(&conn, &update) {
        Err(AppError::NotFound(what)) => assert!(what.contains("inv_missing")),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[test]
fn test_promo_code_activates_its_period_once() {
    let db = TestDb::seeded();
    let user = db.user(1020);
    let conn = get_connection(&db.pool).unwrap();
    add_promo_code(&conn, "spring25", TariffCode::Basic, 6).unwrap();

    match redeem_promo_code(&conn, user.id, "  Spring25 ").unwrap() {
        PromoOutcome::Activated { tariff, months, subscription } => {
            assert_eq!(tariff.code, TariffCode::Basic);
            assert_eq!(months, 6);
            assert_eq!(subscription.end_date - subscription.start_date, Duration::days(180));
            assert!(!subscription.is_trial);
        }
        other => panic!("expected activation, got {:?}", other),
    }
    assert_eq!(count_active_subscriptions(&conn, user.id).unwrap(), 1);

    assert_eq!(redeem_promo_code(&conn, user.id, "SPRING25").unwrap(), PromoOutcome::AlreadyUsed);
    assert_eq!(count_active_subscriptions(&conn, user.id).unwrap(), 1);

    // another user can still use it
    let other = db.user(1021);
    assert!(matches!(
        redeem_promo_code(&conn, other.id, "spring25").unwrap(),
        PromoOutcome::Activated { .. }
    ));
}

#[test]
fn test_unknown_or_inactive_promo_code_is_invalid() {
    let db = TestDb::seeded();
    let user = db.user(1022);
    let conn = get_connection(&db.pool).unwrap();
    assert_eq!(redeem_promo_code(&conn, user.id, "NOPE").unwrap(), PromoOutcome::Invalid);

    let promo = add_promo_code(&conn, "OFF", TariffCode::Pro, 1).unwrap();
    billing::set_promo_code_active(&conn, promo.id, false).unwrap();
    assert_eq!(redeem_promo_code(&conn, user.id, "off").unwrap(), PromoOutcome::Invalid);
    assert!(active_plan(&conn, user.id).unwrap().unwrap().0.is_trial);
}

#[test]
fn test_promo_code_downgrade_is_refused_and_stays_unused() {
    let db = TestDb::seeded();
    let user = db.user(1023);
    let conn = get_connection(&db.pool).unwrap();
    add_promo_code(&conn, "PRO1", TariffCode::Pro, 1).unwrap();
    add_promo_code(&conn, "BASIC1", TariffCode::Basic, 1).unwrap();

    assert!(matches!(
        redeem_promo_code(&conn, user.id, "PRO1").unwrap(),
        PromoOutcome::Activated { .. }
    ));
    assert_eq!(
        redeem_promo_code(&conn, user.id, "BASIC1").unwrap(),
        PromoOutcome::Rejected {
            current_level: 3,
            new_level: 2
        }
    );
    assert_eq!(active_plan(&conn, user.id).unwrap().unwrap().2.code, TariffCode::Pro);
    let redemptions: i64 = conn
        .query_row("SELECT COUNT(*) FROM promo_redemptions WHERE user_id = ?1", [user.id], |row| row.get(0))
        .unwrap();
    assert_eq!(redemptions, 1);
}

#[test]
fn test_promo_code_needs_an_existing_period() {
    let db = TestDb::seeded();
    let conn = get_connection(&db.pool).unwrap();
    assert!(matches!(
        add_promo_code(&conn, "FREE6", TariffCode::Free, 6),
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        add_promo_code(&conn, "   ", TariffCode::Basic, 1),
        Err(AppError::Validation(_))
    ));
}
