use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};

use anyhow::Result;

use crate::news::NewsClient;
use crate::sports_api::{Params, SportsApi};
use crate::state::{Command, Delta};

/// Runs commands one at a time off the shell's thread. Exits once the
/// command sender is dropped.
pub fn spawn_worker(
    api: SportsApi,
    news: NewsClient,
    tx: Sender<Delta>,
    cmd_rx: Receiver<Command>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while let Ok(cmd) = cmd_rx.recv() {
            let label = command_label(&cmd);
            let delta = match run_command(&api, &news, cmd) {
                Ok(delta) => delta,
                Err(err) => Delta::Failed(format!("{label}: {err:#}")),
            };
            if tx.send(delta).is_err() {
                break;
            }
        }
    })
}

pub fn run_command(api: &SportsApi, news: &NewsClient, cmd: Command) -> Result<Delta> {
    let delta = match cmd {
        Command::FetchStandings { season_id } => Delta::SetStandings {
            season_id,
            data: api.standings_by_season(season_id, &Params::new())?,
        },
        Command::FetchTeams { season_id, page } => Delta::SetTeams {
            season_id,
            page,
            data: api.teams_by_season(season_id, page)?,
        },
        Command::FetchFixtures { season_id } => Delta::SetFixtures {
            season_id,
            data: api.fixtures_by_season(season_id, &Params::new())?,
        },
        Command::FetchSchedule { team_id, season_id } => Delta::SetSchedule {
            team_id,
            data: api.team_schedule(team_id, season_id, &Params::new())?,
        },
        Command::FetchSquad { team_id, season_id } => Delta::SetSquad {
            team_id,
            data: api.squad_by_team_season(team_id, season_id)?,
        },
        Command::ListNews => Delta::SetNews(news.list()?),
        Command::GetNews { id } => {
            let article = news.get(&id)?;
            Delta::SetNewsDetail { id, article }
        }
        Command::CreateNews(payload) => Delta::NewsSaved {
            id: news.create(&payload)?,
        },
        Command::UpdateNews { id, payload } => {
            news.update(&id, &payload)?;
            Delta::NewsSaved { id }
        }
        Command::RemoveNews { id } => {
            news.remove(&id)?;
            Delta::NewsRemoved { id }
        }
    };
    Ok(delta)
}

fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::FetchStandings { .. } => "Standings fetch",
        Command::FetchTeams { .. } => "Teams fetch",
        Command::FetchFixtures { .. } => "Fixtures fetch",
        Command::FetchSchedule { .. } => "Schedule fetch",
        Command::FetchSquad { .. } => "Squad fetch",
        Command::ListNews => "News list",
        Command::GetNews { .. } => "News get",
        Command::CreateNews(_) => "News create",
        Command::UpdateNews { .. } => "News update",
        Command::RemoveNews { .. } => "News remove",
    }
}
