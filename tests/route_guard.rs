use std::sync::Arc;

use pitchside::identity::{IdentityProvider, LocalIdentity};
use pitchside::router::{NavigationOutcome, Route, RouteGuard, Router};
use pitchside::session::{ROLE_FIELD, SessionManager, USERS_COLLECTION};
use pitchside::store::{DocumentStore, Fields, SqliteStore};

struct Harness {
    store: Arc<dyn DocumentStore>,
    auth: Arc<LocalIdentity>,
    guard: RouteGuard,
}

impl Harness {
    fn new() -> Self {
        let store: Arc<dyn DocumentStore> =
            Arc::new(SqliteStore::open_in_memory().expect("in-memory store"));
        let auth = Arc::new(LocalIdentity::new());
        let guard = RouteGuard::new(store.clone(), auth.clone());
        Self { store, auth, guard }
    }

    fn user(&self, email: &str, role: Option<&str>) -> String {
        let identity = self.auth.register(email, "pw").expect("register");
        if let Some(role) = role {
            self.set_role(&identity.uid, role);
        }
        identity.uid
    }

    fn set_role(&self, uid: &str, role: &str) {
        let mut fields = Fields::new();
        fields.insert(ROLE_FIELD.to_string(), role.into());
        self.store
            .set(USERS_COLLECTION, uid, fields)
            .expect("write role document");
    }

    fn check(&self, location: &str) -> NavigationOutcome {
        self.guard
            .check(&Route::resolve(location), location)
            .expect("guard check")
    }
}

const PUBLIC: [&str; 9] = [
    "/",
    "/standings",
    "/fixtures",
    "/teams",
    "/team/85",
    "/players",
    "/news",
    "/news/abc",
    "/definitely/not/here",
];

#[test]
fn public_routes_are_always_allowed() {
    let h = Harness::new();
    for path in PUBLIC {
        assert_eq!(h.check(path), NavigationOutcome::Allow, "anonymous {path}");
    }

    h.user("fan@club.test", Some("fan"));
    h.auth.sign_in("fan@club.test", "pw").unwrap();
    for path in PUBLIC {
        assert_eq!(h.check(path), NavigationOutcome::Allow, "signed in {path}");
    }
}

#[test]
fn anonymous_admin_visit_goes_to_login_with_redirect() {
    let h = Harness::new();
    for path in ["/admin", "/admin/sync", "/admin/news?tab=drafts"] {
        assert_eq!(
            h.check(path),
            NavigationOutcome::Redirect(Route::Login {
                redirect: Some(path.to_string())
            })
        );
    }
}

#[test]
fn non_admin_role_goes_home() {
    let h = Harness::new();
    h.user("editor@club.test", Some("editor"));
    h.auth.sign_in("editor@club.test", "pw").unwrap();
    assert_eq!(h.check("/admin"), NavigationOutcome::Redirect(Route::Home));
}

#[test]
fn missing_role_document_goes_home() {
    let h = Harness::new();
    h.user("new@club.test", None);
    h.auth.sign_in("new@club.test", "pw").unwrap();
    assert_eq!(h.check("/admin/news"), NavigationOutcome::Redirect(Route::Home));
}

#[test]
fn admin_role_is_let_through() {
    let h = Harness::new();
    h.user("boss@club.test", Some("admin"));
    h.auth.sign_in("boss@club.test", "pw").unwrap();
    for path in ["/admin", "/admin/sync", "/admin/news"] {
        assert_eq!(h.check(path), NavigationOutcome::Allow, "{path}");
    }
}

#[test]
fn guard_reads_role_fresh_while_session_keeps_cached_role() {
    let h = Harness::new();
    let uid = h.user("boss@club.test", Some("admin"));
    let session = SessionManager::start(h.store.clone(), h.auth.clone());
    h.auth.sign_in("boss@club.test", "pw").unwrap();
    session.process_pending().unwrap();
    assert!(session.session().is_admin());

    h.set_role(&uid, "editor");

    assert_eq!(h.check("/admin"), NavigationOutcome::Redirect(Route::Home));
    assert!(session.session().is_admin());
}

#[test]
fn router_follows_redirects() {
    let h = Harness::new();
    let mut router = Router::new(h.guard.clone());

    let landed = router.push("/admin/news").unwrap().clone();
    assert_eq!(
        landed,
        Route::Login {
            redirect: Some("/admin/news".to_string())
        }
    );

    h.user("editor@club.test", Some("editor"));
    h.auth.sign_in("editor@club.test", "pw").unwrap();
    assert_eq!(router.push("admin").unwrap(), &Route::Home);

    h.auth.sign_out().unwrap();
    h.user("boss@club.test", Some("admin"));
    h.auth.sign_in("boss@club.test", "pw").unwrap();
    assert_eq!(router.push("/admin/sync/").unwrap(), &Route::AdminSync);
    assert_eq!(router.current(), &Route::AdminSync);
}
