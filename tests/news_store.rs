use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use pitchside::news::{BODY_MAX_CHARS, NewsClient, NewsPayload, TITLE_MAX_CHARS};
use pitchside::store::{DocumentStore, SqliteStore};

fn news_client() -> NewsClient {
    let store: Arc<dyn DocumentStore> =
        Arc::new(SqliteStore::open_in_memory().expect("in-memory store"));
    NewsClient::new(store)
}

fn payload(title: &str, body: &str) -> NewsPayload {
    NewsPayload {
        title: title.to_string(),
        body: body.to_string(),
        ..Default::default()
    }
}

#[test]
fn create_trims_and_caps_fields() {
    let news = news_client();
    let long_title = format!("   {}   ", "T".repeat(300));
    let long_body = format!("\n{}\n", "b".repeat(BODY_MAX_CHARS + 500));
    let id = news
        .create(&NewsPayload {
            title: long_title,
            body: long_body,
            image_url: Some("   ".to_string()),
            published_at: None,
        })
        .expect("create");

    let stored = news.get(&id).expect("get").expect("article exists");
    assert_eq!(stored.title.chars().count(), TITLE_MAX_CHARS);
    assert_eq!(stored.body.chars().count(), BODY_MAX_CHARS);
    assert!(!stored.title.starts_with(' '));
    assert_eq!(stored.image_url, None);
    assert!(stored.created_at.is_some());
    assert_eq!(stored.created_at, stored.updated_at);
    assert_eq!(stored.published_at, stored.created_at);
}

#[test]
fn update_trims_and_caps_fields() {
    let news = news_client();
    let id = news.create(&payload("Short", "Body")).expect("create");
    news.update(&id, &payload(&"x".repeat(500), &format!("  {}", "y".repeat(20_000))))
        .expect("update");

    let stored = news.get(&id).unwrap().unwrap();
    assert!(stored.title.chars().count() <= TITLE_MAX_CHARS);
    assert!(stored.body.chars().count() <= BODY_MAX_CHARS);
    assert!(stored.body.starts_with('y'));
}

#[test]
fn caller_published_at_is_kept_on_create() {
    let news = news_client();
    let when = Utc.with_ymd_and_hms(2024, 8, 17, 15, 0, 0).unwrap();
    let id = news
        .create(&NewsPayload {
            published_at: Some(when),
            ..payload("Opening day", "")
        })
        .unwrap();
    assert_eq!(news.get(&id).unwrap().unwrap().published_at, Some(when));
}

#[test]
fn update_keeps_created_at_and_published_at_unless_given() {
    let news = news_client();
    let when = Utc.with_ymd_and_hms(2024, 8, 17, 15, 0, 0).unwrap();
    let id = news
        .create(&NewsPayload {
            published_at: Some(when),
            ..payload("Draft", "")
        })
        .unwrap();
    let before = news.get(&id).unwrap().unwrap();

    thread::sleep(Duration::from_millis(5));
    news.update(&id, &payload("Final", "Text")).unwrap();
    let after = news.get(&id).unwrap().unwrap();
    assert_eq!(after.title, "Final");
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(after.published_at, Some(when));
    assert!(after.updated_at > before.updated_at);

    let later = Utc.with_ymd_and_hms(2024, 9, 1, 10, 0, 0).unwrap();
    news.update(
        &id,
        &NewsPayload {
            published_at: Some(later),
            ..payload("Final", "Text")
        },
    )
    .unwrap();
    assert_eq!(news.get(&id).unwrap().unwrap().published_at, Some(later));
}

#[test]
fn list_orders_by_published_then_created_desc() {
    let news = news_client();
    let early = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
    let late = Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap();

    let mut ids = Vec::new();
    for (title, published_at) in [("a", early), ("b", late), ("c", early), ("d", late)] {
        ids.push(
            news.create(&NewsPayload {
                published_at: Some(published_at),
                ..payload(title, "")
            })
            .unwrap(),
        );
        thread::sleep(Duration::from_millis(3));
    }

    let titles: Vec<String> = news.list().unwrap().into_iter().map(|a| a.title).collect();
    assert_eq!(titles, vec!["d", "b", "c", "a"]);

    let listed = news.list().unwrap();
    for pair in listed.windows(2) {
        let (x, y) = (&pair[0], &pair[1]);
        assert!(
            x.published_at > y.published_at
                || (x.published_at == y.published_at && x.created_at >= y.created_at)
        );
    }
    assert_eq!(listed.len(), ids.len());
}

#[test]
fn get_missing_is_none() {
    let news = news_client();
    assert_eq!(news.get("does-not-exist").expect("no error"), None);
}

#[test]
fn remove_is_unconditional() {
    let news = news_client();
    let id = news.create(&payload("Gone soon", "")).unwrap();
    news.remove(&id).unwrap();
    assert_eq!(news.get(&id).unwrap(), None);
    news.remove(&id).expect("removing again is fine");
}

#[test]
fn update_of_missing_article_fails() {
    let news = news_client();
    assert!(news.update("nope", &payload("t", "b")).is_err());
}
