//! User session actions: login, register, profile, logout.

use std::sync::Arc;

use color_eyre::Result;
use serde_json::json;
use tracing::info;

use crate::api::types::{TokenResponse, User};
use crate::api::{self, Adapter};
use crate::session::SessionContext;

/// Actions that establish, refresh, and destroy the session.
pub struct UserStore<A: Adapter> {
  api: Arc<A>,
  session: Arc<SessionContext>,
}

impl<A: Adapter> UserStore<A> {
  pub fn new(api: Arc<A>, session: Arc<SessionContext>) -> Self {
    Self { api, session }
  }

  /// Log in and persist the session.
  pub async fn login(&self, username: &str, password: &str) -> Result<Option<User>> {
    let token: TokenResponse = api::post_json(
      self.api.as_ref(),
      "/auth/login",
      json!({ "username": username, "password": password }),
    )
    .await?;

    self
      .session
      .establish(token.access_token, token.user.clone())?;
    info!(%username, "logged in");
    Ok(token.user)
  }

  /// Register a new account and log in with it immediately.
  pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<Option<User>> {
    let token: TokenResponse = api::post_json(
      self.api.as_ref(),
      "/auth/register",
      json!({ "username": username, "email": email, "password": password }),
    )
    .await?;

    self
      .session
      .establish(token.access_token, token.user.clone())?;
    Ok(token.user)
  }

  /// Fetch the authenticated profile and refresh the cached copy.
  pub async fn get_profile(&self) -> Result<User> {
    let user: User = api::get_json(self.api.as_ref(), "/auth/me", &[]).await?;
    self.session.update_user(user.clone())?;
    Ok(user)
  }

  /// Destroy the session locally. No server call is involved.
  pub fn logout(&self) -> Result<()> {
    self.session.clear()?;
    info!("logged out");
    Ok(())
  }

  /// Whether a session is currently established.
  pub fn is_logged_in(&self) -> bool {
    self.session.is_logged_in()
  }
}
