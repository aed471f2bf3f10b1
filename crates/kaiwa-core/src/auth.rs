//! Session management: token storage and the authenticated-request contract.
//!
//! [`SessionManager`] owns the token pair exclusively. It attaches bearer
//! credentials, performs a single refresh-and-retry on 401, and invalidates
//! the session on terminal failure. Concurrent 401s share one refresh call
//! (single-flight) so a rotated refresh token is never burned twice.

use crate::error::Error;
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use crate::wire::{LoginResponse, RefreshResponse, UserInfo};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// The access/refresh token pair issued by the server.
///
/// Mutated only on login, refresh, or logout; destroyed on logout or terminal
/// refresh failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Persistence for the current token pair. No logic beyond get/set/clear.
pub trait CredentialStore: Send {
    fn get(&self) -> Option<TokenPair>;
    fn set(&mut self, tokens: TokenPair) -> Result<(), Error>;
    fn clear(&mut self) -> Result<(), Error>;
}

/// In-memory credential store. The default for tests and embedders that
/// manage persistence themselves.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    tokens: Option<TokenPair>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<TokenPair> {
        self.tokens.clone()
    }

    fn set(&mut self, tokens: TokenPair) -> Result<(), Error> {
        self.tokens = Some(tokens);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Error> {
        self.tokens = None;
        Ok(())
    }
}

/// Credential store backed by a JSON file (`credentials.json` in the kaiwa
/// home directory). Tokens are cached in memory after load; a missing file
/// means no session.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    tokens: Option<TokenPair>,
}

impl FileCredentialStore {
    /// Load the store from `path`. A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let tokens = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| Error::config(format!("reading {}: {}", path.display(), e)))?;
            Some(
                serde_json::from_str(&content)
                    .map_err(|e| Error::config(format!("parsing {}: {}", path.display(), e)))?,
            )
        } else {
            None
        };
        Ok(Self {
            path: path.to_path_buf(),
            tokens,
        })
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Option<TokenPair> {
        self.tokens.clone()
    }

    fn set(&mut self, tokens: TokenPair) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::config(format!("creating {}: {}", parent.display(), e)))?;
        }
        let content = serde_json::to_string_pretty(&tokens)
            .map_err(|e| Error::config(format!("serializing credentials: {}", e)))?;
        std::fs::write(&self.path, content)
            .map_err(|e| Error::config(format!("writing {}: {}", self.path.display(), e)))?;
        self.tokens = Some(tokens);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Error> {
        self.tokens = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::config(format!(
                "removing {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

/// Owns the authenticated-request contract.
pub struct SessionManager<C> {
    http: C,
    credentials: Mutex<Box<dyn CredentialStore>>,
    /// The one mandatory mutual-exclusion point in the engine: concurrent
    /// 401s queue here and at most one of them actually refreshes.
    refresh_gate: tokio::sync::Mutex<()>,
}

impl<C: HttpClient> SessionManager<C> {
    pub fn new(http: C, credentials: Box<dyn CredentialStore>) -> Self {
        Self {
            http,
            credentials: Mutex::new(credentials),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    fn credentials(&self) -> MutexGuard<'_, Box<dyn CredentialStore>> {
        self.credentials.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    pub(crate) fn http(&self) -> &C {
        &self.http
    }

    /// Current token pair, if any.
    pub fn tokens(&self) -> Option<TokenPair> {
        self.credentials().get()
    }

    /// Current access token, if any.
    pub fn access_token(&self) -> Option<String> {
        self.tokens().map(|t| t.access_token)
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens().is_some()
    }

    /// Authenticate and store the full token pair. On failure any prior
    /// session state is left untouched.
    pub async fn login(&self, login: &str, password: &str) -> Result<TokenPair, Error> {
        let request =
            HttpRequest::post("/auth/login").json(json!({ "login": login, "password": password }));
        let response = self.http.execute(request).await?;
        if response.status == 401 || response.status == 403 {
            return Err(Error::Unauthenticated);
        }
        let body: LoginResponse = response.error_for_status()?.json()?;
        let tokens = body.into_token_pair();
        self.credentials().set(tokens.clone())?;
        Ok(tokens)
    }

    /// Best-effort server notification, then unconditional local clear.
    pub async fn logout(&self) -> Result<(), Error> {
        let request = HttpRequest::post("/auth/logout").bearer(self.access_token().as_deref());
        if let Err(e) = self.http.execute(request).await {
            debug!("logout notification failed (ignored): {}", e);
        }
        self.credentials().clear()
    }

    /// Fetch the current user; validates a restored session.
    pub async fn me(&self) -> Result<UserInfo, Error> {
        let response = self.authorized_request(HttpRequest::get("/auth/me")).await?;
        response.error_for_status()?.json()
    }

    /// Execute `request` with bearer credentials attached.
    ///
    /// On 401: exactly one refresh, then exactly one retry. A second 401 (or
    /// a refresh failure) clears the session and fails with
    /// [`Error::Unauthenticated`]. Non-401 responses pass through untouched,
    /// including other error statuses — mapping those is the caller's job.
    pub async fn authorized_request(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let snapshot = self.access_token();
        let first = self
            .http
            .execute(request.clone().bearer(snapshot.as_deref()))
            .await?;
        if first.status != 401 {
            return Ok(first);
        }

        debug!("401 on {}, attempting token refresh", request.path);
        self.refresh_once(snapshot).await?;

        let token = self.access_token();
        let retry = self.http.execute(request.bearer(token.as_deref())).await?;
        if retry.status == 401 {
            warn!("request still unauthorized after refresh, clearing session");
            self.credentials().clear()?;
            return Err(Error::Unauthenticated);
        }
        Ok(retry)
    }

    /// Single-flight refresh. `seen` is the access token the caller's failed
    /// request went out with; if another caller already rotated the tokens by
    /// the time the gate is acquired, there is nothing left to do.
    async fn refresh_once(&self, seen: Option<String>) -> Result<(), Error> {
        let _gate = self.refresh_gate.lock().await;
        if self.access_token() != seen {
            debug!("token already rotated by a concurrent caller, skipping refresh");
            return Ok(());
        }

        let Some(refresh_token) = self.tokens().and_then(|t| t.refresh_token) else {
            self.credentials().clear()?;
            return Err(Error::Unauthenticated);
        };

        let request =
            HttpRequest::post("/auth/refresh").json(json!({ "refresh_token": refresh_token }));
        let response = self.http.execute(request).await?;
        if !response.is_success() {
            warn!("token refresh rejected ({}), clearing session", response.status);
            self.credentials().clear()?;
            return Err(Error::Unauthenticated);
        }

        let body: RefreshResponse = response.json()?;
        // Atomic update: the new access token and the rotated refresh token
        // (or the old one, if the server did not rotate) land in one set().
        let rotated = TokenPair {
            access_token: body.access_token,
            refresh_token: body.refresh_token.or(Some(refresh_token)),
            token_type: default_token_type(),
            expires_in: body.expires_in,
        };
        self.credentials().set(rotated)?;
        debug!("token refresh succeeded");
        Ok(())
    }
}
