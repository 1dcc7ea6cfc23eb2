use std::collections::BTreeMap;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde_json::Value;

use crate::config::SportsApiConfig;
use crate::http_client::{http_client, read_success_body};

pub const TOKEN_PARAM: &str = "api_token";
pub const FIXTURE_INCLUDES: &str = "participants;team;league;round;state;scores";
pub const FIXTURES_PER_PAGE: u32 = 200;

/// Query parameters; ordered so URLs and logs are stable.
pub type Params = BTreeMap<String, String>;

pub fn params<K, V, I>(pairs: I) -> Params
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: ToString,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.to_string()))
        .collect()
}

pub fn standings_path(season_id: u64) -> String {
    format!("/standings/seasons/{season_id}")
}

pub fn teams_path(season_id: u64) -> String {
    format!("/teams/seasons/{season_id}")
}

pub fn team_schedule_path(team_id: u64, season_id: Option<u64>) -> String {
    match season_id {
        Some(season_id) => format!("/schedules/seasons/{season_id}/teams/{team_id}"),
        None => format!("/schedules/teams/{team_id}"),
    }
}

pub fn fixtures_path(season_id: u64) -> String {
    format!("/fixtures/seasons/{season_id}")
}

pub fn squad_path(team_id: u64, season_id: u64) -> String {
    format!("/squads/teams/{team_id}/seasons/{season_id}")
}

/// Joins base and path with exactly one slash between them.
pub fn resolve_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    format!("{base}/{path}")
}

/// Caller defaults for the fixtures listing; anything the caller passes wins.
pub fn fixture_params(overrides: &Params) -> Params {
    let mut out = params([
        ("include", FIXTURE_INCLUDES.to_string()),
        ("page", "1".to_string()),
        ("per_page", FIXTURES_PER_PAGE.to_string()),
    ]);
    for (k, v) in overrides {
        out.insert(k.clone(), v.clone());
    }
    out
}

/// Pulls the `data` member out of a response envelope.
pub fn parse_data_envelope(raw: &str) -> Result<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Value::Null);
    }
    let mut root: Value = serde_json::from_str(trimmed).context("invalid sports api json")?;
    Ok(root
        .get_mut("data")
        .map(Value::take)
        .unwrap_or(Value::Null))
}

#[derive(Debug, Clone)]
pub struct SportsApi {
    base_url: String,
    token: Option<String>,
    /// Falls back to the shared client when unset.
    client: Option<Client>,
}

impl SportsApi {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token,
            client: None,
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn from_config(config: &SportsApiConfig) -> Self {
        Self::new(config.base_url.clone(), config.token.clone())
    }

    /// Caller parameters plus the API token. The token always wins.
    pub fn query_for(&self, caller: &Params) -> Params {
        let mut merged = caller.clone();
        if let Some(token) = self.token.as_ref() {
            merged.insert(TOKEN_PARAM.to_string(), token.clone());
        }
        merged
    }

    pub fn get(&self, path: &str, caller: &Params) -> Result<Value> {
        match self.client.as_ref() {
            Some(client) => self.get_with(client, path, caller),
            None => self.get_with(http_client()?, path, caller),
        }
    }

    pub fn get_with(&self, client: &Client, path: &str, caller: &Params) -> Result<Value> {
        let url = resolve_url(&self.base_url, path);
        tracing::info!(target: "pitchside::api", url = %url, params = ?caller, "GET");

        let query = self.query_for(caller);
        let resp = client
            .get(&url)
            .query(&query)
            .send()
            .with_context(|| format!("request failed: {url}"))?;
        let body = read_success_body(resp)?;
        parse_data_envelope(&body)
    }

    pub fn standings_by_season(&self, season_id: u64, extra: &Params) -> Result<Value> {
        self.get(&standings_path(season_id), extra)
            .context("standings request failed")
    }

    pub fn teams_by_season(&self, season_id: u64, page: u32) -> Result<Value> {
        self.get(&teams_path(season_id), &params([("page", page)]))
            .context("teams request failed")
    }

    pub fn team_schedule(
        &self,
        team_id: u64,
        season_id: Option<u64>,
        extra: &Params,
    ) -> Result<Value> {
        self.get(&team_schedule_path(team_id, season_id), extra)
            .context("team schedule request failed")
    }

    pub fn fixtures_by_season(&self, season_id: u64, overrides: &Params) -> Result<Value> {
        self.get(&fixtures_path(season_id), &fixture_params(overrides))
            .context("fixtures request failed")
    }

    pub fn squad_by_team_season(&self, team_id: u64, season_id: u64) -> Result<Value> {
        self.get(&squad_path(team_id, season_id), &Params::new())
            .context("squad request failed")
    }
}
