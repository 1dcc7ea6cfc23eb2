use std::sync::Arc;

use pitchside::identity::LocalIdentity;
use pitchside::news::NewsArticle;
use pitchside::router::Route;
use pitchside::session::{SessionHandle, SessionManager, seed_admin};
use pitchside::state::{AppState, Command, Delta, apply_delta};
use pitchside::store::{DocumentStore, SqliteStore};
use serde_json::json;

fn article(id: &str) -> NewsArticle {
    NewsArticle {
        id: id.to_string(),
        title: format!("Story {id}"),
        body: String::new(),
        image_url: None,
        created_at: None,
        updated_at: None,
        published_at: None,
    }
}

#[test]
fn season_scoped_routes_are_skipped_without_a_season() {
    let mut state = AppState::new(SessionHandle::default(), None);
    for route in [Route::Standings, Route::Fixtures, Route::Teams, Route::Players] {
        assert!(state.commands_for_route(&route).is_empty(), "{route}");
    }
    assert!(
        state
            .logs
            .iter()
            .all(|l| l.contains("No season configured"))
    );
    assert_eq!(state.logs.len(), 4);
}

#[test]
fn team_route_without_season_still_fetches_schedule() {
    let mut state = AppState::new(SessionHandle::default(), None);
    let cmds = state.commands_for_route(&Route::Team { id: "85".into() });
    assert_eq!(cmds.len(), 1);
    assert!(matches!(
        cmds[0],
        Command::FetchSchedule {
            team_id: 85,
            season_id: None
        }
    ));
}

#[test]
fn team_route_with_season_fetches_schedule_and_squad() {
    let mut state = AppState::new(SessionHandle::default(), Some(19686));
    let cmds = state.commands_for_route(&Route::Team { id: "85".into() });
    assert!(matches!(
        cmds.as_slice(),
        [
            Command::FetchSchedule {
                team_id: 85,
                season_id: Some(19686)
            },
            Command::FetchSquad {
                team_id: 85,
                season_id: 19686
            }
        ]
    ));

    let bad = state.commands_for_route(&Route::Team { id: "abc".into() });
    assert!(bad.is_empty());
    assert!(state.logs.back().is_some_and(|l| l.starts_with("[WARN]")));
}

#[test]
fn teams_route_uses_current_page() {
    let mut state = AppState::new(SessionHandle::default(), Some(7));
    state.teams_page = 3;
    let cmds = state.commands_for_route(&Route::Teams);
    assert!(matches!(
        cmds.as_slice(),
        [Command::FetchTeams {
            season_id: 7,
            page: 3
        }]
    ));
}

#[test]
fn news_routes_request_news() {
    let mut state = AppState::new(SessionHandle::default(), None);
    assert!(matches!(
        state.commands_for_route(&Route::News).as_slice(),
        [Command::ListNews]
    ));
    assert!(matches!(
        state.commands_for_route(&Route::AdminNews).as_slice(),
        [Command::ListNews]
    ));
    assert!(matches!(
        state.commands_for_route(&Route::NewsDetail { id: "n1".into() }).as_slice(),
        [Command::GetNews { id }] if id == "n1"
    ));
    assert!(state.commands_for_route(&Route::Admin).is_empty());
}

#[test]
fn results_decrement_pending_but_logs_do_not() {
    let mut state = AppState::new(SessionHandle::default(), Some(1));
    state.pending = 2;

    apply_delta(&mut state, Delta::Log("[INFO] hello".into()));
    assert_eq!(state.pending, 2);

    apply_delta(
        &mut state,
        Delta::SetStandings {
            season_id: 1,
            data: json!([{ "position": 1 }]),
        },
    );
    assert_eq!(state.pending, 1);
    assert!(state.standings.is_some());

    apply_delta(&mut state, Delta::Failed("fixtures: http 500".into()));
    assert_eq!(state.pending, 0);
    assert_eq!(state.logs.back().map(String::as_str), Some("[WARN] fixtures: http 500"));

    apply_delta(&mut state, Delta::Failed("again".into()));
    assert_eq!(state.pending, 0);
}

#[test]
fn news_deltas_update_lists_and_detail() {
    let mut state = AppState::new(SessionHandle::default(), None);
    apply_delta(
        &mut state,
        Delta::SetNews(vec![article("a"), article("b"), article("c")]),
    );
    assert_eq!(state.news.len(), 3);

    apply_delta(&mut state, Delta::NewsRemoved { id: "b".into() });
    let ids: Vec<&str> = state.news.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, ["a", "c"]);

    apply_delta(
        &mut state,
        Delta::SetNewsDetail {
            id: "zz".into(),
            article: None,
        },
    );
    assert!(state.news_detail_missing);
    assert!(state.news_detail.is_none());

    apply_delta(
        &mut state,
        Delta::SetNewsDetail {
            id: "a".into(),
            article: Some(article("a")),
        },
    );
    assert!(!state.news_detail_missing);
    assert_eq!(state.news_detail.as_ref().map(|a| a.id.as_str()), Some("a"));
}

#[test]
fn log_ring_is_bounded() {
    let mut state = AppState::new(SessionHandle::default(), None);
    for i in 0..250 {
        state.push_log(format!("[INFO] line {i}"));
    }
    assert_eq!(state.logs.len(), 200);
    assert_eq!(state.log_total, 250);
    assert_eq!(state.logs.front().map(String::as_str), Some("[INFO] line 50"));
}

#[test]
fn news_edits_follow_the_shared_session() {
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let auth = Arc::new(LocalIdentity::new());
    seed_admin(store.as_ref(), &auth, "boss@club.test", "pw").unwrap();
    auth.register("fan@club.test", "pw").unwrap();

    let manager = SessionManager::start(store, auth);
    let mut state = AppState::new(manager.handle(), None);

    assert!(!state.can_edit_news());
    assert_eq!(state.logs.back().map(String::as_str), Some("[INFO] Session not ready yet"));

    manager.process_pending().unwrap();
    assert!(!state.can_edit_news());
    assert!(state.logs.back().is_some_and(|l| l.contains("Admin role required")));

    manager.login("fan@club.test", "pw").unwrap();
    manager.process_pending().unwrap();
    assert!(!state.can_edit_news());

    manager.logout().unwrap();
    manager.login("boss@club.test", "pw").unwrap();
    manager.process_pending().unwrap();
    assert!(state.can_edit_news());
    assert!(state.session.snapshot().is_admin());
}
