//! Route table and navigation guard.

use crate::session::SessionContext;

/// A navigable route in the portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
  pub name: &'static str,
  pub path: &'static str,
  pub requires_auth: bool,
}

/// Route table shared by the portal and admin views. Static paths come
/// before parameterized ones so `/opinions/create` is not swallowed by
/// `/opinions/:id`.
pub const ROUTES: &[Route] = &[
  Route { name: "home", path: "/", requires_auth: false },
  Route { name: "login", path: "/login", requires_auth: false },
  Route { name: "register", path: "/register", requires_auth: false },
  Route { name: "opinion-list", path: "/opinions", requires_auth: false },
  Route { name: "opinion-create", path: "/opinions/create", requires_auth: true },
  Route { name: "opinion-detail", path: "/opinions/:id", requires_auth: false },
  Route { name: "profile", path: "/profile", requires_auth: true },
  Route { name: "dashboard", path: "/dashboard", requires_auth: true },
  Route { name: "history", path: "/history", requires_auth: true },
];

pub const LOGIN_PATH: &str = "/login";
/// Where an already-authenticated visit to the login page lands.
pub const LANDING_PATH: &str = "/dashboard";

/// Outcome of evaluating the guard for one navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
  Allow,
  /// Redirect to login, carrying the original destination for the
  /// post-login redirect.
  RedirectToLogin { redirect: String },
  /// Already authenticated; the login page bounces to the landing route.
  RedirectToLanding,
}

/// Find the route matching a concrete path, `:param` segments included.
pub fn resolve(path: &str) -> Option<&'static Route> {
  let path = path.split('?').next().unwrap_or(path);
  ROUTES.iter().find(|route| matches(route.path, path))
}

fn matches(pattern: &str, path: &str) -> bool {
  let mut pattern_segments = pattern.split('/');
  let mut path_segments = path.split('/');

  loop {
    match (pattern_segments.next(), path_segments.next()) {
      (None, None) => return true,
      (Some(p), Some(s)) if p.starts_with(':') => {
        if s.is_empty() {
          return false;
        }
      }
      (Some(p), Some(s)) if p == s => {}
      _ => return false,
    }
  }
}

/// Evaluate the navigation guard for a target path.
///
/// Pure predicate over (target, session presence); the caller performs the
/// actual navigation.
pub fn check_navigation(target: &str, session: &SessionContext) -> GuardDecision {
  let logged_in = session.is_logged_in();
  let route = resolve(target);

  if route.map(|r| r.name) == Some("login") && logged_in {
    return GuardDecision::RedirectToLanding;
  }

  let requires_auth = route.map(|r| r.requires_auth).unwrap_or(false);
  if requires_auth && !logged_in {
    return GuardDecision::RedirectToLogin {
      redirect: target.to_string(),
    };
  }

  GuardDecision::Allow
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::session::SessionStore;

  fn anonymous() -> SessionContext {
    let store = SessionStore::open_in_memory().expect("open store");
    SessionContext::load(store).expect("load context")
  }

  fn authenticated() -> SessionContext {
    let ctx = anonymous();
    ctx
      .establish("tok-abc".to_string(), None)
      .expect("establish");
    ctx
  }

  #[test]
  fn test_resolve_matches_static_and_param_routes() {
    assert_eq!(resolve("/opinions").map(|r| r.name), Some("opinion-list"));
    assert_eq!(resolve("/opinions/42").map(|r| r.name), Some("opinion-detail"));
    assert_eq!(resolve("/opinions/create").map(|r| r.name), Some("opinion-create"));
    assert_eq!(resolve("/nope").map(|r| r.name), None);
  }

  #[test]
  fn test_resolve_ignores_query_string() {
    assert_eq!(resolve("/opinions?page=2").map(|r| r.name), Some("opinion-list"));
  }

  #[test]
  fn test_protected_route_redirects_anonymous_to_login() {
    let decision = check_navigation("/profile", &anonymous());
    assert_eq!(
      decision,
      GuardDecision::RedirectToLogin {
        redirect: "/profile".to_string()
      }
    );
  }

  #[test]
  fn test_redirect_carries_full_destination() {
    let decision = check_navigation("/opinions/create?draft=7", &anonymous());
    assert_eq!(
      decision,
      GuardDecision::RedirectToLogin {
        redirect: "/opinions/create?draft=7".to_string()
      }
    );
  }

  #[test]
  fn test_protected_route_allows_authenticated() {
    assert_eq!(check_navigation("/profile", &authenticated()), GuardDecision::Allow);
  }

  #[test]
  fn test_public_route_allows_anonymous() {
    assert_eq!(check_navigation("/opinions/42", &anonymous()), GuardDecision::Allow);
  }

  #[test]
  fn test_login_while_authenticated_bounces_to_landing() {
    assert_eq!(
      check_navigation("/login", &authenticated()),
      GuardDecision::RedirectToLanding
    );
  }

  #[test]
  fn test_login_while_anonymous_is_allowed() {
    assert_eq!(check_navigation("/login", &anonymous()), GuardDecision::Allow);
  }

  #[test]
  fn test_unknown_route_is_allowed() {
    assert_eq!(check_navigation("/does-not-exist", &anonymous()), GuardDecision::Allow);
  }
}
