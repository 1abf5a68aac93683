//! GitHub access: token discovery and the releases API.
//!
//! The publish logic in [`crate::publish`] talks to the [`ReleaseApi`] trait;
//! [`GithubClient`] is the real implementation over `reqwest::blocking`.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Default REST API base.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Default asset upload base.
pub const DEFAULT_UPLOAD_URL: &str = "https://uploads.github.com";

/// Default base for release downloads.
pub const DEFAULT_DOWNLOAD_URL: &str = "https://github.com";

/// Environment variable holding an API token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Token file looked up in the home directory.
pub const TOKEN_FILE_NAME: &str = ".github_token";

/// Timeout applied to every HTTP request.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10 * 60);

const USER_AGENT: &str = concat!("toolkit/", env!("CARGO_PKG_VERSION"));

// ──────────────────────────────────────────────
// Token discovery
// ──────────────────────────────────────────────

/// Errors from finding an API token.
#[derive(Error, Debug)]
pub enum AuthError {
    /// A token file exists (or was named explicitly) but could not be read.
    #[error("could not read token file {path}: {source}")]
    Unreadable {
        /// The token file.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// A token file contained only whitespace.
    #[error("token file {path} is empty")]
    Empty {
        /// The token file.
        path: Utf8PathBuf,
    },

    /// No token in any of the searched places.
    #[error("no GitHub token found: pass --token-file, set {TOKEN_ENV}, or create ~/{TOKEN_FILE_NAME}")]
    NotFound,
}

/// Result alias for token discovery.
pub type AuthResult<T> = Result<T, AuthError>;

/// Find a token using the process environment and home directory.
pub fn discover_token(token_file: Option<&Utf8Path>) -> AuthResult<String> {
    let env_token = std::env::var(TOKEN_ENV).ok();
    let home = directories::BaseDirs::new()
        .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.home_dir().to_path_buf()).ok());
    resolve_token(token_file, env_token.as_deref(), home.as_deref())
}

/// Resolve a token: explicit file, then `env_token`, then `<home>/.github_token`.
///
/// File contents are trimmed. An empty environment value counts as unset.
#[instrument(skip(env_token))]
pub fn resolve_token(
    token_file: Option<&Utf8Path>,
    env_token: Option<&str>,
    home: Option<&Utf8Path>,
) -> AuthResult<String> {
    if let Some(path) = token_file {
        debug!(%path, "reading token from explicit file");
        return read_token_file(path);
    }

    if let Some(token) = env_token.map(str::trim).filter(|t| !t.is_empty()) {
        debug!("using token from environment");
        return Ok(token.to_string());
    }

    if let Some(home) = home {
        let path = home.join(TOKEN_FILE_NAME);
        if path.exists() {
            debug!(%path, "reading token from home directory");
            return read_token_file(&path);
        }
    }

    Err(AuthError::NotFound)
}

fn read_token_file(path: &Utf8Path) -> AuthResult<String> {
    let raw = std::fs::read_to_string(path).map_err(|source| AuthError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let token = raw.trim();
    if token.is_empty() {
        return Err(AuthError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(token.to_string())
}

// ──────────────────────────────────────────────
// Releases API
// ──────────────────────────────────────────────

/// Errors from the releases API.
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// The HTTP client could not be built or the request never completed.
    #[error("request to GitHub failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("GitHub API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// The API's error message, verbatim.
        message: String,
    },

    /// The asset file could not be read.
    #[error("could not read asset {path}: {source}")]
    Asset {
        /// The asset file.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
}

/// Result alias for releases API calls.
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// Repository coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Repo<'a> {
    /// Account that owns the repository.
    pub owner: &'a str,
    /// Repository name.
    pub name: &'a str,
}

/// Payload for creating a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRelease {
    /// Tag to create the release from.
    pub tag_name: String,
    /// Display name.
    pub name: String,
    /// Release notes.
    pub body: String,
}

/// A created release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Release identifier.
    pub id: u64,
    /// Tag the release points at.
    pub tag_name: String,
    /// Browser URL of the release page.
    #[serde(default)]
    pub html_url: String,
}

/// An uploaded release asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Asset identifier.
    pub id: u64,
    /// File name shown on the release.
    pub name: String,
    /// Direct download URL.
    #[serde(default)]
    pub browser_download_url: String,
}

/// Operations on a hosting service's releases.
pub trait ReleaseApi {
    /// Create a tagged release.
    fn create_release(&self, repo: Repo<'_>, release: &NewRelease) -> ReleaseResult<Release>;

    /// Attach the file at `path` to a release under `name`.
    fn upload_asset(
        &self,
        repo: Repo<'_>,
        release_id: u64,
        name: &str,
        path: &Utf8Path,
    ) -> ReleaseResult<Asset>;

    /// Delete a release.
    fn delete_release(&self, repo: Repo<'_>, release_id: u64) -> ReleaseResult<()>;
}

/// GitHub REST client.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: Client,
    token: String,
    api_url: String,
    upload_url: String,
}

impl GithubClient {
    /// Client for github.com authenticated with `token`.
    pub fn new(token: impl Into<String>) -> ReleaseResult<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(HTTP_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            token: token.into(),
            api_url: DEFAULT_API_URL.to_string(),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
        })
    }

    /// Point API calls at another base URL (GitHub Enterprise, tests).
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Point asset uploads at another base URL.
    pub fn with_upload_url(mut self, url: impl Into<String>) -> Self {
        self.upload_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    fn releases_url(&self, repo: Repo<'_>) -> String {
        format!("{}/repos/{}/{}/releases", self.api_url, repo.owner, repo.name)
    }
}

impl ReleaseApi for GithubClient {
    #[instrument(skip(self, release), fields(tag = %release.tag_name))]
    fn create_release(&self, repo: Repo<'_>, release: &NewRelease) -> ReleaseResult<Release> {
        let response = self
            .authed(self.http.post(self.releases_url(repo)))
            .json(release)
            .send()?;
        let created: Release = check(response)?.json()?;
        info!(id = created.id, url = %created.html_url, "release created");
        Ok(created)
    }

    #[instrument(skip(self))]
    fn upload_asset(
        &self,
        repo: Repo<'_>,
        release_id: u64,
        name: &str,
        path: &Utf8Path,
    ) -> ReleaseResult<Asset> {
        let data = std::fs::read(path).map_err(|source| ReleaseError::Asset {
            path: path.to_path_buf(),
            source,
        })?;
        let url = format!(
            "{}/repos/{}/{}/releases/{release_id}/assets",
            self.upload_url, repo.owner, repo.name
        );
        debug!(bytes = data.len(), "uploading asset");

        let response = self
            .authed(self.http.post(url))
            .query(&[("name", name)])
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()?;
        let asset: Asset = check(response)?.json()?;
        info!(id = asset.id, name = %asset.name, "asset uploaded");
        Ok(asset)
    }

    #[instrument(skip(self))]
    fn delete_release(&self, repo: Repo<'_>, release_id: u64) -> ReleaseResult<()> {
        let url = format!("{}/{release_id}", self.releases_url(repo));
        let response = self.authed(self.http.delete(url)).send()?;
        check(response)?;
        info!(release_id, "release deleted");
        Ok(())
    }
}

/// Pass successful responses through; turn the rest into [`ReleaseError::Api`].
fn check(response: Response) -> ReleaseResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(ReleaseError::Api {
        status: status.as_u16(),
        message: api_message(status, &body),
    })
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// The `message` field of an API error body, or the raw body if there is none.
fn api_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        return parsed.message;
    }
    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn utf8(path: std::path::PathBuf) -> Utf8PathBuf {
        Utf8PathBuf::try_from(path).unwrap()
    }

    const REPO: Repo<'static> = Repo {
        owner: "acme",
        name: "widget",
    };

    // ── token discovery ──

    #[test]
    fn explicit_file_wins() {
        let tmp = TempDir::new().unwrap();
        let file = utf8(tmp.path().join("token"));
        std::fs::write(&file, "  from-file\n").unwrap();
        std::fs::write(tmp.path().join(TOKEN_FILE_NAME), "from-home").unwrap();

        let home = utf8(tmp.path().to_path_buf());
        let token = resolve_token(Some(&file), Some("from-env"), Some(&home)).unwrap();
        assert_eq!(token, "from-file");
    }

    #[test]
    fn env_beats_home_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(TOKEN_FILE_NAME), "from-home").unwrap();
        let home = utf8(tmp.path().to_path_buf());

        assert_eq!(
            resolve_token(None, Some("from-env"), Some(&home)).unwrap(),
            "from-env"
        );
        assert_eq!(
            resolve_token(None, Some(""), Some(&home)).unwrap(),
            "from-home"
        );
    }

    #[test]
    fn home_file_is_trimmed() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(TOKEN_FILE_NAME), "\nabc123\n\n").unwrap();
        let home = utf8(tmp.path().to_path_buf());

        assert_eq!(resolve_token(None, None, Some(&home)).unwrap(), "abc123");
    }

    #[test]
    fn empty_file_is_rejected() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(TOKEN_FILE_NAME), "  \n").unwrap();
        let home = utf8(tmp.path().to_path_buf());

        assert!(matches!(
            resolve_token(None, None, Some(&home)),
            Err(AuthError::Empty { .. })
        ));
    }

    #[test]
    fn missing_explicit_file_is_unreadable() {
        let tmp = TempDir::new().unwrap();
        let file = utf8(tmp.path().join("absent"));

        assert!(matches!(
            resolve_token(Some(&file), Some("from-env"), None),
            Err(AuthError::Unreadable { .. })
        ));
    }

    #[test]
    fn nothing_found() {
        let tmp = TempDir::new().unwrap();
        let home = utf8(tmp.path().to_path_buf());

        assert!(matches!(
            resolve_token(None, None, Some(&home)),
            Err(AuthError::NotFound)
        ));
        assert!(matches!(resolve_token(None, None, None), Err(AuthError::NotFound)));
    }

    // ── API error messages ──

    #[test]
    fn api_message_prefers_json_message() {
        let body = r#"{"message":"Validation Failed","errors":[{"code":"already_exists"}]}"#;
        assert_eq!(api_message(StatusCode::UNPROCESSABLE_ENTITY, body), "Validation Failed");
    }

    #[test]
    fn api_message_falls_back_to_body_then_reason() {
        assert_eq!(api_message(StatusCode::BAD_GATEWAY, "upstream down"), "upstream down");
        assert_eq!(api_message(StatusCode::NOT_FOUND, ""), "Not Found");
    }

    // ── HTTP round trips ──
    //
    // The blocking client must not run on the async test runtime's threads.

    #[tokio::test(flavor = "multi_thread")]
    async fn create_release_posts_tag_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/widget/releases"))
            .and(header("authorization", "Bearer s3cret"))
            .and(body_json(json!({
                "tag_name": "v1.2.3",
                "name": "v1.2.3",
                "body": "notes"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 7,
                "tag_name": "v1.2.3",
                "html_url": "https://github.com/acme/widget/releases/tag/v1.2.3"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let uri = server.uri();
        let release = tokio::task::spawn_blocking(move || {
            let client = GithubClient::new("s3cret").unwrap().with_api_url(uri);
            client.create_release(
                REPO,
                &NewRelease {
                    tag_name: "v1.2.3".to_string(),
                    name: "v1.2.3".to_string(),
                    body: "notes".to_string(),
                },
            )
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(release.id, 7);
        assert_eq!(release.tag_name, "v1.2.3");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn api_errors_carry_message_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/widget/releases"))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(json!({"message": "Validation Failed"})),
            )
            .mount(&server)
            .await;

        let uri = server.uri();
        let err = tokio::task::spawn_blocking(move || {
            let client = GithubClient::new("t").unwrap().with_api_url(uri);
            client.create_release(
                REPO,
                &NewRelease {
                    tag_name: "v1.0.0".to_string(),
                    name: "v1.0.0".to_string(),
                    body: String::new(),
                },
            )
        })
        .await
        .unwrap()
        .unwrap_err();

        match err {
            ReleaseError::Api { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "Validation Failed");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upload_sends_binary_with_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/widget/releases/7/assets"))
            .and(query_param("name", "widget"))
            .and(header("content-type", "application/octet-stream"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 99,
                "name": "widget",
                "browser_download_url": "https://github.com/acme/widget/releases/download/v1.2.3/widget"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let binary = utf8(tmp.path().join("widget_1.2.3"));
        std::fs::write(&binary, b"\x7fELF").unwrap();

        let uri = server.uri();
        let asset = tokio::task::spawn_blocking(move || {
            let client = GithubClient::new("t").unwrap().with_upload_url(uri);
            client.upload_asset(REPO, 7, "widget", &binary)
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(asset.id, 99);
        assert_eq!(asset.name, "widget");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_release_hits_release_url() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/repos/acme/widget/releases/7"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let uri = server.uri();
        tokio::task::spawn_blocking(move || {
            let client = GithubClient::new("t").unwrap().with_api_url(uri);
            client.delete_release(REPO, 7)
        })
        .await
        .unwrap()
        .unwrap();
    }

    #[test]
    fn unreadable_asset_is_reported_before_any_request() {
        let client = GithubClient::new("t")
            .unwrap()
            .with_upload_url("http://127.0.0.1:9");
        let err = client
            .upload_asset(REPO, 1, "widget", Utf8Path::new("/nonexistent/toolkit/binary"))
            .unwrap_err();
        assert!(matches!(err, ReleaseError::Asset { .. }));
    }
}
