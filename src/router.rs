use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;

use crate::identity::IdentityProvider;
use crate::session::{ADMIN_ROLE, lookup_role};
use crate::store::DocumentStore;

pub const REDIRECT_PARAM: &str = "redirect";

/// Upper bound on redirect hops for a single `push`.
const MAX_REDIRECTS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Standings,
    Fixtures,
    Teams,
    Team { id: String },
    Players,
    News,
    NewsDetail { id: String },
    Login { redirect: Option<String> },
    Admin,
    AdminSync,
    AdminNews,
    NotFound { path: String },
}

impl Route {
    /// Resolves a location such as `/news/abc` or `/login?redirect=%2Fadmin`.
    pub fn resolve(location: &str) -> Route {
        let (path, query) = split_location(location);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] => Route::Home,
            ["standings"] => Route::Standings,
            ["fixtures"] => Route::Fixtures,
            ["teams"] => Route::Teams,
            ["team", id] => Route::Team { id: id.to_string() },
            ["players"] => Route::Players,
            ["news"] => Route::News,
            ["news", id] => Route::NewsDetail { id: id.to_string() },
            ["login"] => Route::Login {
                redirect: query.get(REDIRECT_PARAM).cloned(),
            },
            ["admin"] => Route::Admin,
            ["admin", "sync"] => Route::AdminSync,
            ["admin", "news"] => Route::AdminNews,
            _ => Route::NotFound {
                path: path.to_string(),
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Route::Home => "home",
            Route::Standings => "standings",
            Route::Fixtures => "fixtures",
            Route::Teams => "teams",
            Route::Team { .. } => "team",
            Route::Players => "players",
            Route::News => "news",
            Route::NewsDetail { .. } => "newsDetail",
            Route::Login { .. } => "login",
            Route::Admin => "admin",
            Route::AdminSync => "adminSync",
            Route::AdminNews => "adminNews",
            Route::NotFound { .. } => "notfound",
        }
    }

    /// Everything under `/admin` inherits the admin requirement.
    pub fn requires_admin(&self) -> bool {
        matches!(self, Route::Admin | Route::AdminSync | Route::AdminNews)
    }

    pub fn full_path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Standings => "/standings".to_string(),
            Route::Fixtures => "/fixtures".to_string(),
            Route::Teams => "/teams".to_string(),
            Route::Team { id } => format!("/team/{id}"),
            Route::Players => "/players".to_string(),
            Route::News => "/news".to_string(),
            Route::NewsDetail { id } => format!("/news/{id}"),
            Route::Login { redirect: None } => "/login".to_string(),
            Route::Login {
                redirect: Some(target),
            } => format!("/login?{REDIRECT_PARAM}={}", urlencoding::encode(target)),
            Route::Admin => "/admin".to_string(),
            Route::AdminSync => "/admin/sync".to_string(),
            Route::AdminNews => "/admin/news".to_string(),
            Route::NotFound { path } => path.clone(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.full_path())
    }
}

fn split_location(location: &str) -> (&str, BTreeMap<String, String>) {
    let location = location.split('#').next().unwrap_or_default();
    let (path, raw_query) = location.split_once('?').unwrap_or((location, ""));
    let mut query = BTreeMap::new();
    for pair in raw_query.split('&').filter(|p| !p.is_empty()) {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        query.insert(decode_component(k), decode_component(v));
    }
    (path, query)
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Allow,
    Redirect(Route),
}

/// Gate in front of admin views.
///
/// The role is read from the store on every check rather than taken from the
/// session manager, so the two may briefly disagree after a role change.
#[derive(Clone)]
pub struct RouteGuard {
    store: Arc<dyn DocumentStore>,
    provider: Arc<dyn IdentityProvider>,
}

impl RouteGuard {
    pub fn new(store: Arc<dyn DocumentStore>, provider: Arc<dyn IdentityProvider>) -> Self {
        Self { store, provider }
    }

    /// `requested` is the full path the user asked for, query included.
    pub fn check(&self, target: &Route, requested: &str) -> Result<NavigationOutcome> {
        if !target.requires_admin() {
            return Ok(NavigationOutcome::Allow);
        }

        let Some(identity) = self.provider.current_identity() else {
            return Ok(NavigationOutcome::Redirect(Route::Login {
                redirect: Some(requested.to_string()),
            }));
        };

        let role = lookup_role(self.store.as_ref(), &identity.uid)?;
        if role.as_deref() != Some(ADMIN_ROLE) {
            tracing::info!(
                target: "pitchside::router",
                uid = %identity.uid,
                to = %requested,
                "admin route refused"
            );
            return Ok(NavigationOutcome::Redirect(Route::Home));
        }
        Ok(NavigationOutcome::Allow)
    }
}

pub struct Router {
    guard: RouteGuard,
    current: Route,
}

impl Router {
    pub fn new(guard: RouteGuard) -> Self {
        Self {
            guard,
            current: Route::Home,
        }
    }

    pub fn current(&self) -> &Route {
        &self.current
    }

    /// Navigates to `location`, following guard redirects; returns where it landed.
    pub fn push(&mut self, location: &str) -> Result<&Route> {
        let mut requested = normalize_location(location);
        let mut target = Route::resolve(&requested);
        for _ in 0..MAX_REDIRECTS {
            match self.guard.check(&target, &requested)? {
                NavigationOutcome::Allow => break,
                NavigationOutcome::Redirect(next) => {
                    tracing::debug!(
                        target: "pitchside::router",
                        from = %requested,
                        to = %next,
                        "redirect"
                    );
                    requested = next.full_path();
                    target = next;
                }
            }
        }
        self.current = target;
        Ok(&self.current)
    }
}

fn normalize_location(location: &str) -> String {
    let trimmed = location.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
