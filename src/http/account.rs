//! Profile and newsletter.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::domain::aggregates::{Profile, ProfileUpdate};
use crate::domain::events::DomainEvent;
use crate::http::context::RequestContext;
use crate::http::notice::{Notice, LOGGED_OUT, NEWSLETTER_SUBSCRIBED, PROFILE_UPDATED};
use crate::{AppState, Result};

#[derive(Debug, Serialize)] pub struct ProfileView { pub profile: Profile, pub messages: Vec<Notice> }

pub async fn profile(State(s): State<AppState>, ctx: RequestContext) -> Result<Json<ProfileView>> {
    let user_id = ctx.require_user()?;
    Ok(Json(ProfileView { profile: s.store.profile(user_id).await?, messages: vec![] }))
}

/// Saves the form, then drops the session when `logout` is set.
pub async fn update_profile(State(s): State<AppState>, ctx: RequestContext, Json(r): Json<ProfileUpdate>) -> Result<Json<ProfileView>> {
    let user_id = ctx.require_user()?;
    r.validate()?;
    let profile = s.store.update_profile(user_id, &r).await?;
    let mut messages = vec![Notice::success(PROFILE_UPDATED)];
    if r.logout {
        s.store.flush_session(&ctx.session).await?;
        info!(%user_id, "session flushed on logout");
        messages.push(Notice::info(LOGGED_OUT));
    }
    Ok(Json(ProfileView { profile, messages }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewsletterForm {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Serialize)] pub struct NewsletterView { pub subscribed: bool, pub messages: Vec<Notice> }

/// Idempotent: a repeat signup answers the same notice without a second row.
pub async fn subscribe(State(s): State<AppState>, Json(r): Json<NewsletterForm>) -> Result<Json<NewsletterView>> {
    r.validate()?;
    let email = r.email.trim();
    let subscribed = s.store.subscribe_newsletter(email).await?;
    if subscribed {
        s.events.publish(DomainEvent::NewsletterSubscribed { email: email.to_lowercase() }).await;
    }
    Ok(Json(NewsletterView { subscribed, messages: vec![Notice::success(NEWSLETTER_SUBSCRIBED)] }))
}
