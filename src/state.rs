use std::collections::VecDeque;

use serde_json::Value;

use crate::news::{NewsArticle, NewsPayload};
use crate::router::Route;
use crate::session::SessionHandle;

const MAX_LOGS: usize = 200;

/// Results coming back from the worker thread.
#[derive(Debug, Clone)]
pub enum Delta {
    SetStandings { season_id: u64, data: Value },
    SetTeams { season_id: u64, page: u32, data: Value },
    SetFixtures { season_id: u64, data: Value },
    SetSchedule { team_id: u64, data: Value },
    SetSquad { team_id: u64, data: Value },
    SetNews(Vec<NewsArticle>),
    SetNewsDetail { id: String, article: Option<NewsArticle> },
    NewsSaved { id: String },
    NewsRemoved { id: String },
    /// A command that finished with an error.
    Failed(String),
    Log(String),
}

/// Work requested by the shell.
#[derive(Debug, Clone)]
pub enum Command {
    FetchStandings { season_id: u64 },
    FetchTeams { season_id: u64, page: u32 },
    FetchFixtures { season_id: u64 },
    FetchSchedule { team_id: u64, season_id: Option<u64> },
    FetchSquad { team_id: u64, season_id: u64 },
    ListNews,
    GetNews { id: String },
    CreateNews(NewsPayload),
    UpdateNews { id: String, payload: NewsPayload },
    RemoveNews { id: String },
}

pub struct AppState {
    pub route: Route,
    pub session: SessionHandle,
    pub season_id: Option<u64>,
    pub standings: Option<Value>,
    pub teams: Option<Value>,
    pub teams_page: u32,
    pub fixtures: Option<Value>,
    pub schedule: Option<(u64, Value)>,
    pub squad: Option<(u64, Value)>,
    pub news: Vec<NewsArticle>,
    pub news_detail: Option<NewsArticle>,
    pub news_detail_missing: bool,
    pub pending: usize,
    pub logs: VecDeque<String>,
    /// Lines ever pushed, including ones already dropped from `logs`.
    pub log_total: u64,
}

impl AppState {
    pub fn new(session: SessionHandle, season_id: Option<u64>) -> Self {
        Self {
            route: Route::Home,
            session,
            season_id,
            standings: None,
            teams: None,
            teams_page: 1,
            fixtures: None,
            schedule: None,
            squad: None,
            news: Vec::new(),
            news_detail: None,
            news_detail_missing: false,
            pending: 0,
            logs: VecDeque::new(),
            log_total: 0,
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        self.log_total += 1;
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    /// Editor writes need a resolved session with the admin role.
    pub fn can_edit_news(&mut self) -> bool {
        if !self.session.is_ready() {
            self.push_log("[INFO] Session not ready yet");
            return false;
        }
        if !self.session.snapshot().is_admin() {
            self.push_log("[WARN] Admin role required to edit news");
            return false;
        }
        true
    }

    /// Data the view for `route` needs; anything season-scoped is skipped without a season.
    pub fn commands_for_route(&mut self, route: &Route) -> Vec<Command> {
        let season = self.season_id;
        let needs_season = matches!(
            route,
            Route::Standings | Route::Fixtures | Route::Teams | Route::Players
        );
        if needs_season && season.is_none() {
            self.push_log("[INFO] No season configured (SPORTMONKS_SEASON_ID)");
            return Vec::new();
        }

        match route {
            Route::Standings => vec![Command::FetchStandings {
                season_id: season.unwrap_or_default(),
            }],
            Route::Fixtures => vec![Command::FetchFixtures {
                season_id: season.unwrap_or_default(),
            }],
            Route::Teams | Route::Players => vec![Command::FetchTeams {
                season_id: season.unwrap_or_default(),
                page: self.teams_page,
            }],
            Route::Team { id } => {
                let Ok(team_id) = id.parse::<u64>() else {
                    self.push_log(format!("[WARN] Not a team id: {id}"));
                    return Vec::new();
                };
                let mut cmds = vec![Command::FetchSchedule {
                    team_id,
                    season_id: season,
                }];
                if let Some(season_id) = season {
                    cmds.push(Command::FetchSquad { team_id, season_id });
                }
                cmds
            }
            Route::News | Route::AdminNews => vec![Command::ListNews],
            Route::NewsDetail { id } => vec![Command::GetNews { id: id.clone() }],
            _ => Vec::new(),
        }
    }
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    if !matches!(delta, Delta::Log(_)) {
        state.pending = state.pending.saturating_sub(1);
    }
    match delta {
        Delta::SetStandings { season_id, data } => {
            state.standings = Some(data);
            state.push_log(format!("[INFO] Standings loaded for season {season_id}"));
        }
        Delta::SetTeams {
            season_id,
            page,
            data,
        } => {
            state.teams = Some(data);
            state.teams_page = page;
            state.push_log(format!("[INFO] Teams page {page} loaded for season {season_id}"));
        }
        Delta::SetFixtures { season_id, data } => {
            state.fixtures = Some(data);
            state.push_log(format!("[INFO] Fixtures loaded for season {season_id}"));
        }
        Delta::SetSchedule { team_id, data } => {
            state.schedule = Some((team_id, data));
            state.push_log(format!("[INFO] Schedule loaded for team {team_id}"));
        }
        Delta::SetSquad { team_id, data } => {
            state.squad = Some((team_id, data));
            state.push_log(format!("[INFO] Squad loaded for team {team_id}"));
        }
        Delta::SetNews(articles) => {
            state.push_log(format!("[INFO] {} news articles", articles.len()));
            state.news = articles;
        }
        Delta::SetNewsDetail { id, article } => {
            state.news_detail_missing = article.is_none();
            if article.is_none() {
                state.push_log(format!("[INFO] News {id} not found"));
            }
            state.news_detail = article;
        }
        Delta::NewsSaved { id } => state.push_log(format!("[INFO] News saved: {id}")),
        Delta::NewsRemoved { id } => {
            state.news.retain(|a| a.id != id);
            state.push_log(format!("[INFO] News removed: {id}"));
        }
        Delta::Failed(err) => state.push_log(format!("[WARN] {err}")),
        Delta::Log(msg) => state.push_log(msg),
    }
}
