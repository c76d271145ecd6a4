//! Upstream session registry (C2).
//!
//! Maintains one authenticated HTTP session per upstream login: a cookie
//! jar, the last CSRF token observed, and a last-activity timestamp used to
//! decide when a session must be re-authenticated.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Method;
use scraper::{Html, Selector};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::ScrapingError;
use crate::storage::upstream_logins::UpstreamLogin;

use super::rate_limiter::RateLimiter;
use super::redirect;

/// One authenticated session against the upstream platform.
pub struct Session {
    /// The login this session authenticates as.
    pub login_id: Uuid,
    client: reqwest::Client,
    csrf_token: RwLock<Option<String>>,
    authenticated: RwLock<bool>,
    last_activity: RwLock<DateTime<Utc>>,
}

impl Session {
    fn new(client: reqwest::Client, login_id: Uuid) -> Self {
        Self {
            login_id,
            client,
            csrf_token: RwLock::new(None),
            authenticated: RwLock::new(false),
            last_activity: RwLock::new(Utc::now()),
        }
    }

    /// Whether the last authentication attempt for this session succeeded.
    pub async fn is_authenticated(&self) -> bool {
        *self.authenticated.read().await
    }

    async fn touch(&self) {
        *self.last_activity.write().await = Utc::now();
    }

    /// Minutes since this session last made a request.
    pub async fn idle_minutes(&self) -> i64 {
        let last = *self.last_activity.read().await;
        (Utc::now() - last).num_minutes()
    }
}

/// Registry of active sessions, one per upstream login, plus the shared
/// rate limiter every request passes through.
pub struct SessionRegistry {
    base_url: String,
    login_path: String,
    request_timeout: Duration,
    max_redirect_hops: u8,
    session_timeout_minutes: i64,
    rate_limiter: Arc<RateLimiter>,
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
}

impl SessionRegistry {
    /// Build a new, empty session registry.
    pub fn new(
        base_url: String,
        login_path: String,
        request_timeout_secs: u64,
        max_redirect_hops: u8,
        session_timeout_minutes: i64,
        requests_per_second: f64,
    ) -> Self {
        Self {
            base_url,
            login_path,
            request_timeout: Duration::from_secs(request_timeout_secs),
            max_redirect_hops,
            session_timeout_minutes,
            rate_limiter: Arc::new(RateLimiter::new(requests_per_second)),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Return the session for `login`, authenticating (or re-authenticating
    /// a timed-out session) as needed.
    pub async fn ensure_authenticated(
        &self,
        login: &UpstreamLogin,
    ) -> Result<Arc<Session>, ScrapingError> {
        let existing = self.sessions.read().await.get(&login.id).cloned();

        if let Some(session) = existing {
            if session.is_authenticated().await
                && session.idle_minutes().await < self.session_timeout_minutes
            {
                return Ok(session);
            }
        }

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(self.request_timeout)
            .user_agent(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            )
            .build()
            .map_err(|source| ScrapingError::Network { source })?;

        let session = Arc::new(Session::new(client, login.id));
        self.authenticate(&session, login).await?;

        self.sessions
            .write()
            .await
            .insert(login.id, session.clone());
        Ok(session)
    }

    async fn authenticate(
        &self,
        session: &Session,
        login: &UpstreamLogin,
    ) -> Result<(), ScrapingError> {
        let login_url = format!("{}{}", self.base_url, self.login_path);
        let login_url = reqwest::Url::parse(&login_url)
            .map_err(|_| ScrapingError::ParseError {
                message: format!("invalid login url: {login_url}"),
            })?;

        let response = self
            .request_with_redirects(session, Method::GET, login_url.clone(), None)
            .await?;
        let html = response
            .text()
            .await
            .map_err(|source| ScrapingError::Network { source })?;

        let csrf_token = extract_csrf_token(&html).ok_or_else(|| ScrapingError::CsrfTokenMissing {
            context: "login form".to_string(),
        })?;

        let form = [
            ("csrfmiddlewaretoken", csrf_token.as_str()),
            ("username", login.username.as_str()),
            ("password", login.password.as_str()),
            ("next", ""),
        ];

        let post_response = self
            .request_with_redirects(
                session,
                Method::POST,
                login_url.clone(),
                Some(&form),
            )
            .await?;
        drop(post_response);

        let authenticated = self.check_authenticated(session).await?;
        *session.authenticated.write().await = authenticated;
        session.touch().await;

        if !authenticated {
            return Err(ScrapingError::AuthenticationFailed {
                login_id: login.id,
            });
        }

        Ok(())
    }

    async fn check_authenticated(&self, session: &Session) -> Result<bool, ScrapingError> {
        let home_url = reqwest::Url::parse(&self.base_url).map_err(|_| ScrapingError::ParseError {
            message: format!("invalid base url: {}", self.base_url),
        })?;
        let response = self
            .request_with_redirects(session, Method::GET, home_url, None)
            .await?;

        if !response.status().is_success() {
            return Ok(false);
        }
        let html = response
            .text()
            .await
            .map_err(|source| ScrapingError::Network { source })?;

        Ok(has_logout_form(&html))
    }

    /// Perform a request, manually following redirects and sanitizing
    /// backslash-malformed `Location` headers, up to `max_redirect_hops`.
    pub async fn request_with_redirects(
        &self,
        session: &Session,
        method: Method,
        url: reqwest::Url,
        form: Option<&[(&str, &str)]>,
    ) -> Result<reqwest::Response, ScrapingError> {
        let mut current_url = url;
        let mut current_method = method;
        let mut hops = 0u8;

        loop {
            self.rate_limiter.acquire().await;

            let mut builder = session.client.request(current_method.clone(), current_url.clone());
            if current_method == Method::POST {
                if let Some(fields) = form {
                    builder = builder.form(fields);
                }
            }

            let response = builder
                .send()
                .await
                .map_err(|source| ScrapingError::Network { source })?;

            let status = response.status().as_u16();
            if !redirect::is_redirect_status(status) {
                session.touch().await;
                return Ok(response);
            }

            if hops >= self.max_redirect_hops {
                return Err(ScrapingError::TooManyRedirects {
                    max_hops: self.max_redirect_hops,
                });
            }

            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| ScrapingError::ParseError {
                    message: format!("redirect {status} missing Location header"),
                })?
                .to_string();

            current_url = redirect::resolve_location(&current_url, &location).map_err(|_| {
                ScrapingError::ParseError {
                    message: format!("could not resolve redirect location: {location}"),
                }
            })?;
            current_method = redirect::next_method(&current_method, status);
            hops += 1;
        }
    }
}

fn extract_csrf_token(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("input[name=csrfmiddlewaretoken]").ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("value"))
        .map(str::to_string)
}

fn has_logout_form(html: &str) -> bool {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("form[action=\"/accounts/logout/\"]") else {
        return false;
    };
    document.select(&selector).next().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_csrf_token_finds_input_value() {
        let html = r#"<form><input type="hidden" name="csrfmiddlewaretoken" value="abc123"></form>"#;
        assert_eq!(extract_csrf_token(html), Some("abc123".to_string()));
    }

    #[test]
    fn extract_csrf_token_missing_returns_none() {
        let html = "<form><input type=\"text\" name=\"username\"></form>";
        assert_eq!(extract_csrf_token(html), None);
    }

    #[test]
    fn has_logout_form_detects_authenticated_page() {
        let html = r#"<body><form action="/accounts/logout/" method="post"></form></body>"#;
        assert!(has_logout_form(html));
    }

    #[test]
    fn has_logout_form_absent_on_anonymous_page() {
        let html = "<body><form action=\"/accounts/login/\" method=\"post\"></form></body>";
        assert!(!has_logout_form(html));
    }
}
