//! Common test utilities and fixtures.

use std::time::Duration;

use httpmock::prelude::*;
use httpmock::Mock;
use kc_cas_server::{AppState, Server, ServerConfig};
use reqwest::header::LOCATION;
use reqwest::{redirect, Client, Response};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use url::Url;

/// Realm served by the test server.
pub const REALM: &str = "test";

/// Alias of the CAS provider.
pub const ALIAS: &str = "cas";

/// Test environment with a fake CAS server and a running broker.
pub struct TestEnv {
    /// Fake CAS server.
    pub cas: MockServer,
    /// Base URL of the running broker.
    pub base_url: String,
    /// HTTP client for testing. Redirects are not followed.
    pub client: Client,
    /// State of the running broker.
    pub state: AppState,
    /// Server shutdown signal.
    _shutdown_tx: oneshot::Sender<()>,
}

impl TestEnv {
    /// Starts a broker with the default test configuration.
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_config(|_| {}).await
    }

    /// Starts a broker after `configure` adjusted its configuration.
    pub async fn with_config<F>(configure: F) -> anyhow::Result<Self>
    where
        F: FnOnce(&mut ServerConfig),
    {
        // Initialize tracing for tests
        let _ = tracing_subscriber::fmt()
            .with_env_filter("kc_cas_server=debug,kc_protocol_cas=debug")
            .try_init();

        let cas = MockServer::start_async().await;

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);

        let mut config = ServerConfig::for_testing(&cas.url("/cas"));
        config.base_url = base_url.clone();
        configure(&mut config);

        let server = Server::new(config)?;
        let state = server.state().clone();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = server.serve(listener, shutdown).await {
                tracing::error!("Server error: {}", e);
            }
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .redirect(redirect::Policy::none())
            .build()?;

        wait_for_server(&client, &base_url).await?;

        Ok(Self {
            cas,
            base_url,
            client,
            state,
            _shutdown_tx: shutdown_tx,
        })
    }

    /// Returns a broker URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Starts a brokered login and returns the CAS login URL the browser
    /// was sent to.
    pub async fn start_login(&self, redirect_uri: Option<&str>) -> anyhow::Result<Url> {
        let mut url = Url::parse(&self.url(&format!("/realms/{REALM}/broker/{ALIAS}/login")))?;
        if let Some(uri) = redirect_uri {
            url.query_pairs_mut().append_pair("redirect_uri", uri);
        }
        let response = self.client.get(url).send().await?;
        anyhow::ensure!(
            response.status().is_redirection(),
            "login did not redirect: {}",
            response.status()
        );
        location(&response)
    }

    /// Returns to the broker the way CAS does after a successful login.
    pub async fn return_with_ticket(&self, service: &str, ticket: &str) -> anyhow::Result<Response> {
        let mut url = Url::parse(service)?;
        url.query_pairs_mut().append_pair("ticket", ticket);
        Ok(self.client.get(url).send().await?)
    }

    /// Registers a validation reply for `ticket`.
    pub async fn cas_validates(&self, ticket: &str, body: &str) -> Mock<'_> {
        self.cas
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/cas/p3/serviceValidate")
                    .query_param("ticket", ticket);
                then.status(200)
                    .header("content-type", "application/xml;charset=UTF-8")
                    .body(body);
            })
            .await
    }

    /// Runs a complete login as `ticket` and returns the user session id.
    pub async fn login(&self, ticket: &str, body: &str) -> anyhow::Result<String> {
        let login = self.start_login(None).await?;
        let _mock = self.cas_validates(ticket, body).await;
        let response = self.return_with_ticket(&query_value(&login, "service")?, ticket).await?;
        anyhow::ensure!(
            response.status().is_redirection(),
            "callback did not redirect: {}",
            response.status()
        );
        query_value(&location(&response)?, "session_state")
    }
}

/// Reads the `Location` header of a redirect.
pub fn location(response: &Response) -> anyhow::Result<Url> {
    let value = response
        .headers()
        .get(LOCATION)
        .ok_or_else(|| anyhow::anyhow!("no location header"))?
        .to_str()?;
    Ok(Url::parse(value)?)
}

/// Returns the single value of a query parameter.
pub fn query_value(url: &Url, name: &str) -> anyhow::Result<String> {
    let values: Vec<String> = url
        .query_pairs()
        .filter(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
        .collect();
    match values.as_slice() {
        [value] => Ok(value.clone()),
        _ => anyhow::bail!("expected exactly one '{name}' in {url}, found {}", values.len()),
    }
}

/// A CAS 3.0 success document.
pub fn success_xml(user: &str, attributes: &[(&str, &str)]) -> String {
    let attributes: String = attributes
        .iter()
        .map(|(name, value)| format!("<cas:{name}>{value}</cas:{name}>"))
        .collect();
    format!(
        r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
  <cas:authenticationSuccess>
    <cas:user>{user}</cas:user>
    <cas:attributes>{attributes}</cas:attributes>
  </cas:authenticationSuccess>
</cas:serviceResponse>"#
    )
}

/// A CAS failure document.
pub fn failure_xml(code: &str, description: &str) -> String {
    format!(
        r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
  <cas:authenticationFailure code="{code}">{description}</cas:authenticationFailure>
</cas:serviceResponse>"#
    )
}

/// Waits for the server to be ready.
async fn wait_for_server(client: &Client, base_url: &str) -> anyhow::Result<()> {
    let health_url = format!("{base_url}/health");
    let max_attempts = 50;

    for _ in 0..max_attempts {
        if let Ok(resp) = client.get(&health_url).send().await {
            if resp.status().is_success() {
                return Ok(());
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    anyhow::bail!("Server did not become ready in time")
}
