//! Turns an email and a password into an authenticated tenant client.
//!
//! The steps run strictly in order and the procedure is all-or-nothing: the
//! first failing step aborts it with a [`BootstrapError`] naming that step,
//! and no client is handed out.
//!
//! 1. Fetch the runtime configuration (directory URL and bearer token).
//! 2. Build the directory client.
//! 3. Resolve the user's school connection by email.
//! 4. Build the tenant client with the [`AuthInterceptor`] attached.
//! 5. Resolve the user's identity from the password digest.
//! 6. Log in to obtain a session token.
//! 7. Attach the token to the tenant client's default headers.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::auth::{AuthInterceptor, hash_password};
use crate::http::{HttpClient, RequestSpec, Sleeper, TokioSleeper, build_reqwest_client, mask};

use super::{Session, SharedSession, TOKEN_HEADER, login_request, parse_session_token, value_to_id};

/// Well-known location of the runtime configuration.
pub const DEFAULT_CONFIG_URL: &str = "https://config.rollcall.app/runtime-config.json";

/// Body of the runtime configuration document.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub default_home_base_url: String,
    pub auth_token: String,
}

/// Connection details of the user's school as known to the directory.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SchoolConnection {
    pub app_code: String,
    pub api_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectoryRecord {
    school_connection: SchoolConnection,
}

/// The user's identity on the tenant service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_type: String,
    pub internal_id: String,
}

impl UserIdentity {
    fn from_record(record: &Value) -> Result<Self> {
        let user_type = record
            .get("userType")
            .and_then(value_to_id)
            .context("Identity record has no userType")?;
        let internal_id = record
            .get("internalId")
            .and_then(value_to_id)
            .context("Identity record has no internalId")?;
        Ok(Self {
            user_type,
            internal_id,
        })
    }
}

/// Step of the bootstrap, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStep {
    FetchConfig,
    BuildDirectoryClient,
    ResolveSchool,
    BuildTenantClient,
    ResolveIdentity,
    Login,
}

impl std::fmt::Display for BootstrapStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BootstrapStep::FetchConfig => "fetching runtime configuration",
            BootstrapStep::BuildDirectoryClient => "building directory client",
            BootstrapStep::ResolveSchool => "resolving school connection",
            BootstrapStep::BuildTenantClient => "building tenant client",
            BootstrapStep::ResolveIdentity => "resolving user identity",
            BootstrapStep::Login => "logging in",
        };
        f.write_str(name)
    }
}

/// The bootstrap failed at `step`.
#[derive(Debug)]
pub struct BootstrapError {
    pub step: BootstrapStep,
    pub source: anyhow::Error,
}

impl std::fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Session bootstrap failed while {}: {:#}", self.step, self.source)
    }
}

impl std::error::Error for BootstrapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}

trait AtStep<T> {
    fn at(self, step: BootstrapStep) -> std::result::Result<T, BootstrapError>;
}

impl<T> AtStep<T> for Result<T> {
    fn at(self, step: BootstrapStep) -> std::result::Result<T, BootstrapError> {
        self.map_err(|source| BootstrapError { step, source })
    }
}

/// The result of a successful bootstrap.
#[derive(Debug)]
pub struct TenantSession {
    pub directory: HttpClient,
    pub tenant: HttpClient,
    pub session: SharedSession,
    pub connection: SchoolConnection,
}

impl TenantSession {
    pub fn school_code(&self) -> &str {
        &self.connection.app_code
    }
}

/// Runs the login choreography against the remote services.
pub struct SessionBootstrap {
    config_url: String,
    client: Client,
    sleeper: Arc<dyn Sleeper>,
}

impl SessionBootstrap {
    pub fn new(config_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            config_url: config_url.into(),
            client: build_reqwest_client()?,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Reuses an existing reqwest Client for every request of the session.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Sleeper handed to the tenant client's [`AuthInterceptor`].
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn connect(
        &self,
        email: &str,
        password: &str,
    ) -> std::result::Result<TenantSession, BootstrapError> {
        let config = self
            .fetch_runtime_config()
            .await
            .at(BootstrapStep::FetchConfig)?;

        let directory = self
            .directory_client(&config)
            .at(BootstrapStep::BuildDirectoryClient)?;

        let connection = resolve_school(&directory, email)
            .await
            .at(BootstrapStep::ResolveSchool)?;
        info!("Resolved school {} at {}", connection.app_code, connection.api_url);

        let session = SharedSession::new();
        let tenant = self
            .tenant_client(&config, &connection, &session)
            .at(BootstrapStep::BuildTenantClient)?;

        let credential_hash = hash_password(password);
        let identity = resolve_identity(&tenant, &connection.app_code, email, &credential_hash)
            .await
            .at(BootstrapStep::ResolveIdentity)?;

        let token = log_in(&tenant, &connection.app_code, &identity, &credential_hash)
            .await
            .at(BootstrapStep::Login)?;
        debug!("Obtained session token {}", mask(&token));

        session.set(Session {
            school_code: connection.app_code.clone(),
            user_type: identity.user_type,
            user_id: identity.internal_id,
            credential_hash,
            session_token: token.clone(),
        });
        tenant.set_default_header(TOKEN_HEADER, token);

        info!("Logged in to school {}", connection.app_code);

        Ok(TenantSession {
            directory,
            tenant,
            session,
            connection,
        })
    }

    async fn fetch_runtime_config(&self) -> Result<RuntimeConfig> {
        debug!("Fetching runtime configuration from {}...", self.config_url);

        // Short-lived client with no base URL and no defaults.
        let client = HttpClient::builder().client(self.client.clone()).build()?;
        let response = client.execute(RequestSpec::get(self.config_url.as_str())).await?;

        response
            .parse()
            .context("Failed to parse runtime configuration")
    }

    fn directory_client(&self, config: &RuntimeConfig) -> Result<HttpClient> {
        HttpClient::builder()
            .client(self.client.clone())
            .base_url(config.default_home_base_url.as_str())
            .header("Authorization", bearer(&config.auth_token))
            .build()
    }

    fn tenant_client(
        &self,
        config: &RuntimeConfig,
        connection: &SchoolConnection,
        session: &SharedSession,
    ) -> Result<HttpClient> {
        let interceptor = AuthInterceptor::with_sleeper(session.clone(), self.sleeper.clone());

        HttpClient::builder()
            .client(self.client.clone())
            .base_url(tenant_base_url(&connection.api_url))
            .header("Authorization", bearer(&config.auth_token))
            .header("Appcode", connection.app_code.as_str())
            .interceptor(Arc::new(interceptor))
            .build()
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// The tenant API lives under `/api` of the school's URL.
pub fn tenant_base_url(api_url: &str) -> String {
    format!("{}/api", api_url.trim_end_matches('/'))
}

async fn resolve_school(directory: &HttpClient, email: &str) -> Result<SchoolConnection> {
    let response = directory
        .execute(RequestSpec::get("findspruserinfo").query("emailAddress", email))
        .await?;

    let record: DirectoryRecord = first_record(response.parse()?)
        .context("Unexpected directory record")?
        .with_context(|| format!("No school found for {}", email))?;

    Ok(record.school_connection)
}

async fn resolve_identity(
    tenant: &HttpClient,
    school_code: &str,
    login: &str,
    credential_hash: &str,
) -> Result<UserIdentity> {
    let spec = RequestSpec::get("User")
        .query("schoolCode", school_code)
        .query("login", login)
        .query("password", credential_hash);

    let response = tenant.execute(spec).await?;
    let record: Value = first_record(response.parse()?)
        .context("Unexpected identity record")?
        .with_context(|| format!("No user {} in school {}", login, school_code))?;

    UserIdentity::from_record(&record)
}

async fn log_in(
    tenant: &HttpClient,
    school_code: &str,
    identity: &UserIdentity,
    credential_hash: &str,
) -> Result<String> {
    let spec = login_request(
        school_code,
        &identity.user_type,
        &identity.internal_id,
        credential_hash,
    );
    let response = tenant.execute(spec).await?;
    parse_session_token(response)
}

/// First element of a lookup result. `Ok(None)` for an empty array; a first
/// element of the wrong shape is an error.
fn first_record<T: DeserializeOwned>(records: Vec<Value>) -> serde_json::Result<Option<T>> {
    records
        .into_iter()
        .next()
        .map(serde_json::from_value)
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Headers;
    use mockito::{Matcher, Server, ServerGuard};

    const HASH: &str = "W6ph5Mm5Pz8GgiULbPgzG37mj9g=";

    async fn mock_config(server: &mut ServerGuard, directory_url: &str) -> mockito::Mock {
        server
            .mock("GET", "/runtime-config.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"defaultHomeBaseUrl": "{}", "authToken": "T0"}}"#,
                directory_url
            ))
            .create_async()
            .await
    }

    async fn mock_directory(server: &mut ServerGuard, tenant_url: &str) -> mockito::Mock {
        server
            .mock("GET", "/dir/findspruserinfo")
            .match_query(Matcher::UrlEncoded("emailAddress".into(), "a@b.com".into()))
            .match_header("Authorization", "Bearer T0")
            .with_status(200)
            .with_body(format!(
                r#"[{{"schoolConnection": {{"appCode": "S1", "apiUrl": "{}"}}}}]"#,
                tenant_url
            ))
            .create_async()
            .await
    }

    async fn mock_identity(server: &mut ServerGuard) -> mockito::Mock {
        server
            .mock("GET", "/tenant/api/User")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("schoolCode".into(), "S1".into()),
                Matcher::UrlEncoded("login".into(), "a@b.com".into()),
                Matcher::UrlEncoded("password".into(), HASH.into()),
            ]))
            .match_header("Authorization", "Bearer T0")
            .match_header("Appcode", "S1")
            .with_status(200)
            .with_body(r#"[{"userType": 2, "internalId": 77, "name": "Ada"}]"#)
            .create_async()
            .await
    }

    async fn mock_login(server: &mut ServerGuard) -> mockito::Mock {
        server
            .mock("POST", "/tenant/api/User/Login")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("schoolCode".into(), "S1".into()),
                Matcher::UrlEncoded("userType".into(), "2".into()),
                Matcher::UrlEncoded("userId".into(), "77".into()),
                Matcher::UrlEncoded("password".into(), HASH.into()),
            ]))
            .with_status(200)
            .with_body(r#""TOK1""#)
            .create_async()
            .await
    }

    fn bootstrap(server: &ServerGuard) -> SessionBootstrap {
        SessionBootstrap::new(format!("{}/runtime-config.json", server.url())).unwrap()
    }

    #[test]
    fn test_tenant_base_url() {
        assert_eq!(tenant_base_url("https://tenant.test"), "https://tenant.test/api");
        assert_eq!(tenant_base_url("https://tenant.test/"), "https://tenant.test/api");
    }

    #[test]
    fn test_identity_from_record_accepts_strings_and_numbers() {
        let identity =
            UserIdentity::from_record(&serde_json::json!({"userType": "2", "internalId": 77}))
                .unwrap();
        assert_eq!(identity.user_type, "2");
        assert_eq!(identity.internal_id, "77");

        assert!(UserIdentity::from_record(&serde_json::json!({"userType": 2})).is_err());
    }

    #[test]
    fn test_bootstrap_error_display_names_step() {
        let err = BootstrapError {
            step: BootstrapStep::ResolveSchool,
            source: anyhow::anyhow!("No school found"),
        };
        assert_eq!(
            err.to_string(),
            "Session bootstrap failed while resolving school connection: No school found"
        );
    }

    #[tokio::test]
    async fn test_connect_end_to_end() {
        let mut server = Server::new_async().await;
        let dir_url = format!("{}/dir", server.url());
        let tenant_url = format!("{}/tenant", server.url());

        let config = mock_config(&mut server, &dir_url).await;
        let directory = mock_directory(&mut server, &tenant_url).await;
        let identity = mock_identity(&mut server).await;
        let login = mock_login(&mut server).await;

        let result = bootstrap(&server).connect("a@b.com", "password").await.unwrap();

        config.assert_async().await;
        directory.assert_async().await;
        identity.assert_async().await;
        login.assert_async().await;

        let expected: Headers = [
            ("Authorization", "Bearer T0"),
            ("Appcode", "S1"),
            ("Token", "TOK1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        assert_eq!(result.tenant.default_headers(), expected);
        assert_eq!(
            result.tenant.base_url(),
            Some(format!("{}/tenant/api", server.url()))
        );
        assert_eq!(result.directory.base_url(), Some(dir_url));
        assert_eq!(result.school_code(), "S1");
        assert_eq!(result.tenant.interceptors().len(), 1);

        let session = result.session.get().unwrap();
        assert_eq!(session.school_code, "S1");
        assert_eq!(session.user_type, "2");
        assert_eq!(session.user_id, "77");
        assert_eq!(session.credential_hash, HASH);
        assert_eq!(session.session_token, "TOK1");
    }

    #[tokio::test]
    async fn test_connect_fails_on_config_fetch() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/runtime-config.json")
            .with_status(503)
            .create_async()
            .await;

        let err = bootstrap(&server).connect("a@b.com", "password").await.unwrap_err();
        assert_eq!(err.step, BootstrapStep::FetchConfig);
    }

    #[tokio::test]
    async fn test_connect_fails_on_unknown_email() {
        let mut server = Server::new_async().await;
        let dir_url = format!("{}/dir", server.url());
        let _config = mock_config(&mut server, &dir_url).await;
        let _directory = server
            .mock("GET", "/dir/findspruserinfo")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let err = bootstrap(&server).connect("a@b.com", "password").await.unwrap_err();
        assert_eq!(err.step, BootstrapStep::ResolveSchool);
        assert!(err.to_string().contains("a@b.com"));
    }

    #[tokio::test]
    async fn test_connect_fails_on_wrong_password() {
        let mut server = Server::new_async().await;
        let dir_url = format!("{}/dir", server.url());
        let tenant_url = format!("{}/tenant", server.url());
        let _config = mock_config(&mut server, &dir_url).await;
        let _directory = mock_directory(&mut server, &tenant_url).await;
        let _identity = server
            .mock("GET", "/tenant/api/User")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        let login = server
            .mock("POST", "/tenant/api/User/Login")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let err = bootstrap(&server).connect("a@b.com", "wrong").await.unwrap_err();

        login.assert_async().await;
        assert_eq!(err.step, BootstrapStep::ResolveIdentity);
    }

    #[tokio::test]
    async fn test_connect_fails_on_rejected_login() {
        let mut server = Server::new_async().await;
        let dir_url = format!("{}/dir", server.url());
        let tenant_url = format!("{}/tenant", server.url());
        let _config = mock_config(&mut server, &dir_url).await;
        let _directory = mock_directory(&mut server, &tenant_url).await;
        let _identity = mock_identity(&mut server).await;
        let login = server
            .mock("POST", "/tenant/api/User/Login")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("locked")
            .expect(1)
            .create_async()
            .await;

        let err = bootstrap(&server).connect("a@b.com", "password").await.unwrap_err();

        login.assert_async().await;
        assert_eq!(err.step, BootstrapStep::Login);
    }

    #[tokio::test]
    async fn test_connect_fails_on_unreachable_config() {
        let err = SessionBootstrap::new("http://127.0.0.1:1/runtime-config.json")
            .unwrap()
            .connect("a@b.com", "password")
            .await
            .unwrap_err();
        assert_eq!(err.step, BootstrapStep::FetchConfig);
    }

    #[test]
    fn test_first_record_separates_empty_from_malformed() {
        let empty: Option<SchoolConnection> = first_record(vec![]).unwrap();
        assert!(empty.is_none());

        let malformed: serde_json::Result<Option<DirectoryRecord>> =
            first_record(vec![serde_json::json!({"schoolConnection": {"appCode": 5}})]);
        assert!(malformed.is_err());
    }

    #[tokio::test]
    async fn test_connect_reports_malformed_directory_record() {
        let mut server = Server::new_async().await;
        let dir_url = format!("{}/dir", server.url());
        let _config = mock_config(&mut server, &dir_url).await;
        let _directory = server
            .mock("GET", "/dir/findspruserinfo")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"schoolConnection": {"appCode": 5}}]"#)
            .create_async()
            .await;

        let err = bootstrap(&server).connect("a@b.com", "password").await.unwrap_err();

        assert_eq!(err.step, BootstrapStep::ResolveSchool);
        let message = err.to_string();
        assert!(message.contains("Unexpected directory record"));
        assert!(!message.contains("No school found"));
    }

    #[tokio::test]
    async fn test_connect_sends_user_agent() {
        let mut server = Server::new_async().await;
        let config = server
            .mock("GET", "/runtime-config.json")
            .match_header("user-agent", "rollcall-cli")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        let err = bootstrap(&server).connect("a@b.com", "password").await.unwrap_err();

        config.assert_async().await;
        assert_eq!(err.step, BootstrapStep::FetchConfig);
    }
}
