//! Real handlers against a wiremock Telegram API and a temp database

mod common;

use pretty_assertions::assert_eq;
use serial_test::serial;

use common::{callback_from_json, keyboard_data, message_from_json, BotHarness, CHAT_ID, USER_ID};
use telegen::telegram::dialogue::{Stage, State};
use telegen::telegram::handlers::{handle_callback, handle_command, handle_text};
use telegen::telegram::Command;
use telegencore::billing::add_promo_code;
use telegencore::billing::limits::subscription_info;
use telegencore::get_connection;
use telegencore::models::{Frequency, PostStatus, SourceType, TariffCode};
use telegencore::storage::flows::get_flow_by_channel;
use telegencore::storage::posts::{create_post, get_post, NewPost};
use telegencore::storage::users::get_user;

#[tokio::test]
#[serial]
async fn test_start_registers_user_and_shows_main_menu() {
    let h = BotHarness::new().await;
    let msg = message_from_json("/start", CHAT_ID, USER_ID);

    handle_command(&h.bot, &msg, Command::Start, &h.deps, &h.dialogue(CHAT_ID))
        .await
        .unwrap();

    let sent = h.requests_to("sendMessage").await;
    let menu = sent.last().expect("main menu was not sent");
    assert_eq!(keyboard_data(menu), vec!["menu:gen", "menu:buf", "menu:set", "menu:sub"]);
    assert_eq!(menu["parse_mode"], "HTML");

    let conn = get_connection(&h.db.pool).unwrap();
    let user = get_user(&conn, USER_ID as i64).unwrap().expect("user was not created");
    assert_eq!(user.username.as_deref(), Some("testuser"));
}

#[tokio::test]
#[serial]
async fn test_channel_callback_edits_to_channel_menu() {
    let h = BotHarness::new().await;
    let user = h.db.user(USER_ID as i64);
    let channel = h.db.channel(&user, "-1001234", "Kyiv Sport");

    let q = callback_from_json(&format!("ch:{}", channel.id), CHAT_ID, USER_ID);
    handle_callback(&h.bot, &q, &h.deps, &h.dialogue(CHAT_ID)).await.unwrap();

    let edits = h.requests_to("editMessageText").await;
    assert_eq!(edits.len(), 1);
    assert!(edits[0]["text"].as_str().unwrap().contains("Kyiv Sport"));
    assert_eq!(
        keyboard_data(&edits[0]),
        vec![
            format!("flow:new:{}", channel.id),
            format!("flow:show:{}", channel.id),
            format!("flow:gen:{}", channel.id),
            format!("buf:ch:{}", channel.id),
            "menu:gen".to_string(),
        ]
    );
    assert_eq!(h.requests_to("answerCallbackQuery").await.len(), 1);
}

#[tokio::test]
#[serial]
async fn test_foreign_channel_is_refused_with_alert() {
    let h = BotHarness::new().await;
    let owner = h.db.user(777);
    let channel = h.db.channel(&owner, "-1009999", "Not yours");

    let q = callback_from_json(&format!("ch:{}", channel.id), CHAT_ID, USER_ID);
    handle_callback(&h.bot, &q, &h.deps, &h.dialogue(CHAT_ID)).await.unwrap();

    assert!(h.requests_to("editMessageText").await.is_empty());
    let answers = h.requests_to("answerCallbackQuery").await;
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0]["show_alert"], true);
    assert_eq!(answers[0]["text"], "⚠️ Канал не знайдено");
}

#[tokio::test]
#[serial]
async fn test_create_flow_is_refused_when_flow_exists() {
    let h = BotHarness::new().await;
    let user = h.db.user(USER_ID as i64);
    let channel = h.db.channel(&user, "-1001235", "Cooking");
    h.db.flow(&channel);

    let q = callback_from_json(&format!("flow:new:{}", channel.id), CHAT_ID, USER_ID);
    handle_callback(&h.bot, &q, &h.deps, &h.dialogue(CHAT_ID)).await.unwrap();

    let answers = h.requests_to("answerCallbackQuery").await;
    assert_eq!(answers[0]["text"], "У каналу Cooking вже є Флоу");
    assert_eq!(h.dialogue(CHAT_ID).get_or_default().await.unwrap(), State::Idle);
}

#[tokio::test]
#[serial]
async fn test_wizard_custom_theme_and_source_link() {
    let h = BotHarness::new().await;
    let user = h.db.user(USER_ID as i64);
    let channel = h.db.channel(&user, "-1001236", "Tech");
    let dialogue = h.dialogue(CHAT_ID);

    for data in [format!("flow:new:{}", channel.id), "wz:theme_custom".to_string()] {
        let q = callback_from_json(&data, CHAT_ID, USER_ID);
        handle_callback(&h.bot, &q, &h.deps, &dialogue).await.unwrap();
    }

    let msg = message_from_json("Технології", CHAT_ID, USER_ID);
    handle_text(&h.bot, &msg, &h.deps, &dialogue).await.unwrap();

    let State::Wizard(wizard) = dialogue.get_or_default().await.unwrap() else {
        panic!("wizard state expected");
    };
    assert_eq!(wizard.stage, Stage::Sources);
    assert_eq!(wizard.draft.theme, "Технології");

    let q = callback_from_json("wz:src:telegram", CHAT_ID, USER_ID);
    handle_callback(&h.bot, &q, &h.deps, &dialogue).await.unwrap();

    let msg = message_from_json("t.me/tech", CHAT_ID, USER_ID);
    handle_text(&h.bot, &msg, &h.deps, &dialogue).await.unwrap();
    let sent = h.requests_to("sendMessage").await;
    assert!(sent
        .iter()
        .any(|body| body["text"] == "❌ Посилання має починатися з http:// або https://"));

    let msg = message_from_json("https://t.me/tech", CHAT_ID, USER_ID);
    handle_text(&h.bot, &msg, &h.deps, &dialogue).await.unwrap();

    let State::Wizard(wizard) = dialogue.get_or_default().await.unwrap() else {
        panic!("wizard state expected");
    };
    assert_eq!(wizard.draft.sources.len(), 1);
    assert_eq!(wizard.draft.sources[0].source_type, SourceType::Telegram);
    assert_eq!(wizard.awaiting, None);

    let last = h.requests_to("sendMessage").await.pop().unwrap();
    assert!(keyboard_data(&last).contains(&"wz:next".to_string()));

    // nothing is stored until the last stage
    let conn = get_connection(&h.db.pool).unwrap();
    assert!(get_flow_by_channel(&conn, channel.id).unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn test_wizard_cancel_returns_to_channel_menu() {
    let h = BotHarness::new().await;
    let user = h.db.user(USER_ID as i64);
    let channel = h.db.channel(&user, "-1001237", "Regional");
    let dialogue = h.dialogue(CHAT_ID);

    for data in [format!("flow:new:{}", channel.id), "wz:cancel".to_string()] {
        let q = callback_from_json(&data, CHAT_ID, USER_ID);
        handle_callback(&h.bot, &q, &h.deps, &dialogue).await.unwrap();
    }

    assert_eq!(dialogue.get_or_default().await.unwrap(), State::Idle);
    let answers = h.requests_to("answerCallbackQuery").await;
    assert_eq!(answers.last().unwrap()["text"], "❌ Створення флоу скасовано");
}

#[tokio::test]
#[serial]
async fn test_schedule_input_validation() {
    let h = BotHarness::new().await;
    let user = h.db.user(USER_ID as i64);
    let channel = h.db.channel(&user, "-1001238", "Scheduled");
    let flow_id = h.db.flow(&channel);
    let post = {
        let conn = get_connection(&h.db.pool).unwrap();
        create_post(
            &conn,
            flow_id,
            &NewPost {
                content: "Draft to schedule",
                original_content: None,
                source_id: Some("manual/1"),
                source_url: None,
                original_link: None,
                original_date: None,
                media: &[],
            },
        )
        .unwrap()
        .unwrap()
    };
    let dialogue = h.dialogue(CHAT_ID);
    dialogue
        .update(State::AwaitingSchedule {
            flow_id,
            post_id: post.id,
            index: 0,
        })
        .await
        .unwrap();

    for (input, reply) in [
        ("завтра", "❌"),
        ("01.01.2020 10:00", "❌ Час публікації має бути в майбутньому"),
    ] {
        let msg = message_from_json(input, CHAT_ID, USER_ID);
        handle_text(&h.bot, &msg, &h.deps, &dialogue).await.unwrap();
        let last = h.requests_to("sendMessage").await.pop().unwrap();
        assert!(last["text"].as_str().unwrap().starts_with(reply), "{}", input);
        assert!(matches!(
            dialogue.get_or_default().await.unwrap(),
            State::AwaitingSchedule { .. }
        ));
    }

    let msg = message_from_json("01.06.2030 12:30", CHAT_ID, USER_ID);
    handle_text(&h.bot, &msg, &h.deps, &dialogue).await.unwrap();

    assert_eq!(dialogue.get_or_default().await.unwrap(), State::Idle);
    let conn = get_connection(&h.db.pool).unwrap();
    let post = get_post(&conn, post.id).unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Scheduled);
    // Kyiv is UTC+3 in summer
    assert_eq!(
        post.scheduled_time.unwrap().format("%Y-%m-%d %H:%M").to_string(),
        "2030-06-01 09:30"
    );
    let sent = h.requests_to("sendMessage").await;
    assert!(sent
        .iter()
        .any(|body| body["text"].as_str().unwrap_or_default().contains("01.06.2030 12:30")));
}

#[tokio::test]
#[serial]
async fn test_promo_code_entered_after_button() {
    let h = BotHarness::new().await;
    let user = h.db.user(USER_ID as i64);
    {
        let conn = get_connection(&h.db.pool).unwrap();
        add_promo_code(&conn, "SPRING", TariffCode::Basic, 1).unwrap();
    }
    let dialogue = h.dialogue(CHAT_ID);

    let q = callback_from_json("sub:promo", CHAT_ID, USER_ID);
    handle_callback(&h.bot, &q, &h.deps, &dialogue).await.unwrap();
    assert_eq!(dialogue.get_or_default().await.unwrap(), State::AwaitingPromo);

    let msg = message_from_json("autumn", CHAT_ID, USER_ID);
    handle_text(&h.bot, &msg, &h.deps, &dialogue).await.unwrap();
    let last = h.requests_to("sendMessage").await.pop().unwrap();
    assert_eq!(last["text"], "❌ Промокод недійсний");
    assert_eq!(dialogue.get_or_default().await.unwrap(), State::AwaitingPromo);

    let msg = message_from_json(" spring ", CHAT_ID, USER_ID);
    handle_text(&h.bot, &msg, &h.deps, &dialogue).await.unwrap();
    assert_eq!(dialogue.get_or_default().await.unwrap(), State::Idle);
    let sent = h.requests_to("sendMessage").await;
    assert!(sent
        .iter()
        .any(|body| body["text"].as_str().unwrap_or_default().contains("за промокодом")));

    let conn = get_connection(&h.db.pool).unwrap();
    let info = subscription_info(&conn, user.id).unwrap().unwrap();
    assert_eq!(info.tariff.code, TariffCode::Basic);
    assert!(!info.is_trial);
}

#[tokio::test]
#[serial]
async fn test_flow_settings_buttons_and_text() {
    let h = BotHarness::new().await;
    let user = h.db.user(USER_ID as i64);
    let channel = h.db.channel(&user, "-1001239", "Editable");
    h.db.flow(&channel);
    let dialogue = h.dialogue(CHAT_ID);

    let q = callback_from_json(&format!("fs:{}:freq:hourly", channel.id), CHAT_ID, USER_ID);
    handle_callback(&h.bot, &q, &h.deps, &dialogue).await.unwrap();

    let q = callback_from_json(&format!("fs:{}:theme", channel.id), CHAT_ID, USER_ID);
    handle_callback(&h.bot, &q, &h.deps, &dialogue).await.unwrap();
    assert!(matches!(
        dialogue.get_or_default().await.unwrap(),
        State::EditingFlow { .. }
    ));

    let msg = message_from_json("   ", CHAT_ID, USER_ID);
    handle_text(&h.bot, &msg, &h.deps, &dialogue).await.unwrap();
    let last = h.requests_to("sendMessage").await.pop().unwrap();
    assert_eq!(last["text"], "❌ Текст не може бути порожнім");

    let msg = message_from_json("Football", CHAT_ID, USER_ID);
    handle_text(&h.bot, &msg, &h.deps, &dialogue).await.unwrap();
    assert_eq!(dialogue.get_or_default().await.unwrap(), State::Idle);

    let conn = get_connection(&h.db.pool).unwrap();
    let flow = get_flow_by_channel(&conn, channel.id).unwrap().unwrap();
    assert_eq!(flow.frequency, Frequency::Hourly);
    assert_eq!(flow.theme, "Football");
    drop(conn);

    // the only source cannot be removed
    let q = callback_from_json(&format!("fs:{}:src_del:0", channel.id), CHAT_ID, USER_ID);
    handle_callback(&h.bot, &q, &h.deps, &dialogue).await.unwrap();
    let answers = h.requests_to("answerCallbackQuery").await;
    assert_eq!(answers.last().unwrap()["show_alert"], true);
    assert_eq!(answers.last().unwrap()["text"], "❌ Флоу має мати хоча б одне джерело");
    let conn = get_connection(&h.db.pool).unwrap();
    assert_eq!(get_flow_by_channel(&conn, channel.id).unwrap().unwrap().sources.len(), 1);
}

#[tokio::test]
#[serial]
async fn test_buffer_post_text_can_be_edited() {
    let h = BotHarness::new().await;
    let user = h.db.user(USER_ID as i64);
    let channel = h.db.channel(&user, "-1001240", "Edits");
    let flow_id = h.db.flow(&channel);
    let post = {
        let conn = get_connection(&h.db.pool).unwrap();
        create_post(
            &conn,
            flow_id,
            &NewPost {
                content: "Old text",
                source_id: Some("manual/edit"),
                ..NewPost::default()
            },
        )
        .unwrap()
        .unwrap()
    };
    let dialogue = h.dialogue(CHAT_ID);

    let q = callback_from_json(&format!("post:edit:{}:0", post.id), CHAT_ID, USER_ID);
    handle_callback(&h.bot, &q, &h.deps, &dialogue).await.unwrap();
    assert_eq!(
        dialogue.get_or_default().await.unwrap(),
        State::AwaitingPostEdit {
            flow_id,
            post_id: post.id,
            index: 0
        }
    );

    let msg = message_from_json("Fresh <news> & more", CHAT_ID, USER_ID);
    handle_text(&h.bot, &msg, &h.deps, &dialogue).await.unwrap();
    assert_eq!(dialogue.get_or_default().await.unwrap(), State::Idle);

    let conn = get_connection(&h.db.pool).unwrap();
    let edited = get_post(&conn, post.id).unwrap().unwrap();
    assert_eq!(edited.content, "Fresh &lt;news&gt; &amp; more");
    assert_eq!(edited.status, PostStatus::Draft);
}
