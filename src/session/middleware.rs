//! Cookie-backed session middleware.
//!
//! Every request gets a `Session` extension. New sessions are always saved
//! and announced with a cookie; existing sessions are written back only when
//! a handler modified them.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;

use crate::config::SessionConfig;
use crate::session::store::{SessionRecord, SessionStore};
use crate::session::{Session, SessionId};

const MAX_AGE_CAP_SECS: u64 = 10 * 365 * 24 * 3600;

/// Store handle and cookie settings shared by the middleware.
#[derive(Debug, Clone)]
pub struct SessionLayer {
    store: Arc<dyn SessionStore>,
    config: Arc<SessionConfig>,
}

impl SessionLayer {
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    fn cookie(&self, id: &SessionId) -> Cookie<'static> {
        Cookie::build((self.config.cookie_name.clone(), id.as_str().to_string()))
            .path("/")
            .http_only(true)
            .secure(self.config.secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(self.max_age_secs()))
            .build()
    }

    fn max_age_secs(&self) -> i64 {
        // capped at ten years so expiry arithmetic cannot overflow
        self.config.max_age_secs.min(MAX_AGE_CAP_SECS) as i64
    }

    async fn resume(&self, jar: &CookieJar) -> Option<Session> {
        let raw = jar.get(&self.config.cookie_name)?;
        let id = SessionId::parse(raw.value())?;
        match self.store.load(&id).await {
            Ok(Some(record)) => Some(Session::resumed(id, record.data)),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "Session load failed");
                None
            }
        }
    }
}

/// Attach a session to the request and persist it afterwards.
pub async fn session_middleware(
    State(layer): State<SessionLayer>,
    mut request: Request,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(request.headers());
    let session = match layer.resume(&jar).await {
        Some(session) => session,
        None => Session::fresh(),
    };
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    if session.is_new() || session.is_modified() {
        let record = SessionRecord {
            data: session.data(),
            expires_at: Utc::now() + chrono::Duration::seconds(layer.max_age_secs()),
        };
        if let Err(e) = layer.store.save(session.id(), &record).await {
            tracing::warn!(session_id = %session.id(), error = %e, "Session save failed");
        }
    }

    if session.is_new() {
        let cookie = layer.cookie(session.id());
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!(error = %e, "Session cookie not representable"),
        }
    }

    response
}
