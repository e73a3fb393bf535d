//! One scheduler cycle against a wiremock Telegram API

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use rusqlite::params;
use serial_test::serial;

use common::{stub_generator, BotHarness, RecordingNotifier};
use telegen::scheduler::{run_scheduled_jobs, CycleReport, SchedulerDeps};
use telegencore::get_connection;
use telegencore::models::PostStatus;
use telegencore::storage::flows::get_flow;
use telegencore::storage::posts::{create_post, get_post, list_posts, mark_scheduled, NewPost};

#[tokio::test]
#[serial]
async fn test_cycle_generates_publishes_and_expires() {
    let h = BotHarness::new().await;
    let user = h.db.user(424242);
    let channel = h.db.channel(&user, "-1001239", "Daily news");
    let flow_id = h.db.flow(&channel);
    let notifier = Arc::new(RecordingNotifier::default());

    let scheduled = {
        let conn = get_connection(&h.db.pool).unwrap();
        let post = create_post(
            &conn,
            flow_id,
            &NewPost {
                content: "<b>Scheduled</b> post",
                original_content: None,
                source_id: Some("manual/scheduled"),
                source_url: None,
                original_link: None,
                original_date: None,
                media: &[],
            },
        )
        .unwrap()
        .unwrap();
        mark_scheduled(&conn, post.id, Utc::now() - Duration::minutes(1)).unwrap();
        conn.execute(
            "UPDATE subscriptions SET end_date = ?1 WHERE user_id = ?2",
            params![Utc::now() - Duration::days(1), user.id],
        )
        .unwrap();
        post
    };

    let deps = SchedulerDeps {
        bot: h.bot.clone(),
        pool: Arc::clone(&h.db.pool),
        generator: stub_generator(&h.db.pool),
        notifier: notifier.clone(),
    };
    let report = run_scheduled_jobs(&deps).await;

    assert_eq!(
        report,
        CycleReport {
            flows_generated: 1,
            posts_created: 5,
            posts_published: 1,
            subscriptions_expired: 1,
            counters_reset: 0,
        }
    );

    let conn = get_connection(&h.db.pool).unwrap();
    let published = get_post(&conn, scheduled.id).unwrap().unwrap();
    assert_eq!(published.status, PostStatus::Published);
    assert!(published.scheduled_time.is_none());
    assert_eq!(list_posts(&conn, flow_id, PostStatus::Draft).unwrap().len(), 5);
    assert!(get_flow(&conn, flow_id).unwrap().unwrap().next_generation_time.unwrap() > Utc::now());

    let sent = h.requests_to("sendMessage").await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["chat_id"], -1001239);
    assert_eq!(sent[0]["text"], "<b>Scheduled</b> post");

    let notifications = notifier.sent.lock().unwrap().clone();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].0, 424242);
    assert!(notifications[0].1.contains("пробний період"));
}

#[tokio::test]
#[serial]
async fn test_second_cycle_is_quiet() {
    let h = BotHarness::new().await;
    let user = h.db.user(434343);
    let channel = h.db.channel(&user, "-1001240", "Quiet");
    h.db.flow(&channel);

    let deps = SchedulerDeps {
        bot: h.bot.clone(),
        pool: Arc::clone(&h.db.pool),
        generator: stub_generator(&h.db.pool),
        notifier: Arc::new(RecordingNotifier::default()),
    };
    assert_eq!(run_scheduled_jobs(&deps).await.flows_generated, 1);
    // the flow is not due again until its frequency has passed
    assert_eq!(run_scheduled_jobs(&deps).await, CycleReport::default());
    assert!(h.requests_to("sendMessage").await.is_empty());
}
