use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use shellguard::cache::AuthStateCache;
use shellguard::provider::refresh::DEFAULT_TOKEN_ENDPOINT;
use shellguard::provider::{RefreshTokenProvider, TokenEndpointConfig};
use shellguard::storage::{FileStore, KeyValueStore, REFRESH_TOKEN_KEY};
use shellguard::ui::{LogNotifier, LogOverlay, MemoryNavigator};
use shellguard::{
    ApiRequest, AuthShell, ConfigError, ErrorCode, GuardDecision, HttpSender, ProviderError, RequestSender, ShellConfig,
    ShellError, ShellServices,
};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("{} ({})", .0, .0.error_code())]
    Shell(#[from] ShellError),
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),
    #[error("invalid header `{0}`; expected NAME:VALUE")]
    InvalidHeader(String),
    #[error("server returned HTTP {0}")]
    HttpStatus(u16),
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "shellguard", about = "Auth gate, page guard, and authorized fetch from the command line")]
struct Cli {
    /// JSON file standing in for browser local storage.
    #[arg(long, env = "SHELL_STORE_PATH", default_value = ".shellguard.json")]
    store: PathBuf,

    /// Page path the guard decides for.
    #[arg(long, env = "SHELL_PAGE_PATH", default_value = "/index.html")]
    path: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Restore the session and print the page guard decision.
    Check,
    /// Exchange a refresh token and persist the session.
    Login {
        #[arg(long, env = "SHELL_REFRESH_TOKEN")]
        refresh_token: String,
    },
    /// Forget the stored session.
    Logout,
    /// Send a request through the auth interceptor.
    Fetch(FetchArgs),
}

#[derive(Args, Debug)]
struct FetchArgs {
    url: String,

    #[arg(long, default_value = "GET")]
    method: String,

    #[arg(long = "header", value_name = "NAME:VALUE")]
    headers: Vec<String>,

    #[arg(long)]
    data: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = ShellConfig::from_env()?;
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(cli.store.clone()));

    match cli.command {
        Command::Check => run_check(config, store, &cli.path).await,
        Command::Login { refresh_token } => run_login(config, store, &cli.path, &refresh_token).await,
        Command::Logout => {
            run_logout(&config, store);
            Ok(())
        }
        Command::Fetch(args) => run_fetch(config, store, &cli.path, args).await,
    }
}

/// Wire a shell around a refresh-token provider with log-backed UI.
fn build_shell(
    config: ShellConfig,
    store: Arc<dyn KeyValueStore>,
    path: &str,
    endpoint: TokenEndpointConfig,
) -> Result<(AuthShell, Arc<RefreshTokenProvider>), CliError> {
    let provider = Arc::new(RefreshTokenProvider::new(endpoint, Arc::clone(&store), config.http)?);
    let services = ShellServices {
        store,
        navigator: Arc::new(MemoryNavigator::new(path)),
        notifier: Arc::new(LogNotifier),
        overlay: Arc::new(LogOverlay::default()),
    };
    let shell = AuthShell::new(config, provider.clone(), services);
    shell.initialize_guard();
    Ok((shell, provider))
}

async fn run_check(config: ShellConfig, store: Arc<dyn KeyValueStore>, path: &str) -> Result<(), CliError> {
    let decision = check(config, store, path).await?;
    print_json(&serde_json::to_value(&decision)?)
}

async fn check(config: ShellConfig, store: Arc<dyn KeyValueStore>, path: &str) -> Result<GuardDecision, CliError> {
    // Without a stored session the provider never calls the endpoint, so no
    // API key is needed to report "signed out".
    let endpoint = match TokenEndpointConfig::from_env() {
        Ok(endpoint) => endpoint,
        Err(e) if store.get(REFRESH_TOKEN_KEY).is_none() => {
            debug!(error = %e, "no stored session; token endpoint not configured");
            TokenEndpointConfig { endpoint: DEFAULT_TOKEN_ENDPOINT.to_owned(), api_key: String::new() }
        }
        Err(e) => return Err(e.into()),
    };
    let (shell, provider) = build_shell(config, store, path, endpoint)?;
    provider.start().await;
    Ok(shell.decide(path).await)
}

async fn run_login(
    config: ShellConfig,
    store: Arc<dyn KeyValueStore>,
    path: &str,
    refresh_token: &str,
) -> Result<(), CliError> {
    let (_shell, provider) = build_shell(config, store, path, TokenEndpointConfig::from_env()?)?;
    let user = provider.sign_in_with_refresh_token(refresh_token).await?;
    print_json(&serde_json::to_value(&user)?)
}

fn run_logout(config: &ShellConfig, store: Arc<dyn KeyValueStore>) {
    store.remove(REFRESH_TOKEN_KEY);
    AuthStateCache::new(store, config.freshness_window).clear();
    println!("signed out");
}

async fn run_fetch(
    config: ShellConfig,
    store: Arc<dyn KeyValueStore>,
    path: &str,
    args: FetchArgs,
) -> Result<(), CliError> {
    let http: Arc<dyn RequestSender> = Arc::new(HttpSender::new(config.http)?);
    let (shell, provider) = build_shell(config, store, path, TokenEndpointConfig::from_env()?)?;
    provider.start().await;

    let sender: Arc<dyn RequestSender> = if shell.config().interceptor_enabled() {
        shell.install_interceptor(http)
    } else {
        http
    };

    let request = build_request(args)?;
    let response = sender.send(request).await?;
    match response.json::<Value>() {
        Ok(json) => print_json(&json)?,
        Err(_) => println!("{}", response.text()),
    }
    if !response.is_success() {
        return Err(CliError::HttpStatus(response.status.as_u16()));
    }
    Ok(())
}

fn build_request(args: FetchArgs) -> Result<ApiRequest, CliError> {
    let method = reqwest::Method::from_bytes(args.method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| CliError::InvalidMethod(args.method.clone()))?;
    let mut pairs = Vec::with_capacity(args.headers.len());
    for raw in &args.headers {
        let (name, value) = raw
            .split_once(':')
            .ok_or_else(|| CliError::InvalidHeader(raw.clone()))?;
        pairs.push((name.trim(), value.trim()));
    }

    let mut request = ApiRequest::new(method, args.url).with_headers(pairs)?;
    if let Some(data) = args.data {
        if !request.headers.contains_key(reqwest::header::CONTENT_TYPE) && serde_json::from_str::<Value>(&data).is_ok() {
            request = request.with_header("content-type", "application/json")?;
        }
        request = request.with_body(data);
    }
    Ok(request)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
