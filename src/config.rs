//! Command-line and environment configuration.
//!
//! Every flag falls back to a `CALENDAR_BROKER_*` environment variable, and [`EnvFile::load`] reads
//! a `.env` file into the environment beforehand when one exists.

// std
use std::{
	net::SocketAddr,
	path::{Path, PathBuf},
};
// crates.io
use axum::http::HeaderValue;
use clap::Parser;
// self
use crate::{
	_prelude::*,
	api::AppState,
	auth::ScopeSet,
	calendar::{DEFAULT_CALENDAR_API_BASE, GoogleCalendarClient},
	error::ConfigError,
	flows::AuthorizationCoordinator,
	http::BrokerHttpClient,
	provider::{ClientSecretFile, DefaultProviderStrategy},
	session::{FileSessionStore, MemorySessionStore, SessionStore},
	token::{SessionTokenCodec, SigningSecret},
};

/// Redirect URI used when neither the flag nor the client secret file names one.
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8000/oauthcallback";
/// Scope requested when none is configured.
pub const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/calendar.events";

/// Raw command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "calendar-broker", version, about)]
pub struct Cli {
	/// Address the HTTP server binds to.
	#[arg(long, env = "CALENDAR_BROKER_BIND", default_value = "127.0.0.1:8000")]
	pub bind: SocketAddr,
	/// Google console client secret JSON.
	#[arg(
		long,
		env = "CALENDAR_BROKER_CLIENT_SECRET_FILE",
		default_value = "calendar_credentials.json"
	)]
	pub client_secret_file: PathBuf,
	/// Redirect URI registered with the provider.
	#[arg(long, env = "CALENDAR_BROKER_REDIRECT_URI")]
	pub redirect_uri: Option<Url>,
	/// Scope to request; repeat the flag or separate with commas.
	#[arg(
		long = "scope",
		env = "CALENDAR_BROKER_SCOPES",
		value_delimiter = ',',
		default_value = DEFAULT_SCOPE
	)]
	pub scopes: Vec<String>,
	/// Session token signing secret (at least 32 bytes); random per process when absent.
	#[arg(long, env = "CALENDAR_BROKER_SIGNING_SECRET", hide_env_values = true)]
	pub signing_secret: Option<String>,
	/// Session token lifetime in seconds.
	#[arg(
		long,
		env = "CALENDAR_BROKER_TOKEN_TTL_SECS",
		default_value_t = 3600,
		value_parser = clap::value_parser!(u32).range(1..)
	)]
	pub token_ttl_secs: u32,
	/// Seconds a consent redirect stays redeemable.
	#[arg(
		long,
		env = "CALENDAR_BROKER_PENDING_TTL_SECS",
		default_value_t = 600,
		value_parser = clap::value_parser!(u32).range(1..)
	)]
	pub pending_ttl_secs: u32,
	/// Persist pending authorizations to this JSON file instead of memory.
	#[arg(long, env = "CALENDAR_BROKER_SESSION_FILE")]
	pub session_file: Option<PathBuf>,
	/// Calendar API root.
	#[arg(
		long,
		env = "CALENDAR_BROKER_CALENDAR_API_BASE",
		default_value = DEFAULT_CALENDAR_API_BASE
	)]
	pub calendar_api_base: Url,
	/// Calendar receiving new events.
	#[arg(long, env = "CALENDAR_BROKER_CALENDAR_ID", default_value = "primary")]
	pub calendar_id: String,
	/// Origin allowed to call the API cross-site; repeatable.
	#[arg(
		long = "allowed-origin",
		env = "CALENDAR_BROKER_ALLOWED_ORIGINS",
		value_delimiter = ','
	)]
	pub allowed_origins: Vec<String>,
	/// Mark the session cookie `Secure` (serve behind HTTPS).
	#[arg(long, env = "CALENDAR_BROKER_SECURE_COOKIE")]
	pub secure_cookie: bool,
}
impl Cli {
	/// Validates the arguments.
	pub fn into_config(self) -> Result<Config, ConfigError> {
		let scopes = ScopeSet::new(&self.scopes)?;
		let signing_secret = self.signing_secret.map(SigningSecret::new).transpose()?;
		let allowed_origins = self
			.allowed_origins
			.into_iter()
			.map(|origin| {
				HeaderValue::from_str(origin.trim_end_matches('/'))
					.map_err(|_| ConfigError::InvalidOrigin { origin })
			})
			.collect::<Result<_, _>>()?;

		Ok(Config {
			bind: self.bind,
			client_secret_file: self.client_secret_file,
			redirect_uri: self.redirect_uri,
			scopes,
			signing_secret,
			token_ttl: Duration::seconds(self.token_ttl_secs.into()),
			pending_ttl: Duration::seconds(self.pending_ttl_secs.into()),
			session_file: self.session_file,
			calendar_api_base: self.calendar_api_base,
			calendar_id: self.calendar_id,
			allowed_origins,
			secure_cookie: self.secure_cookie,
		})
	}
}

/// Outcome of reading a `.env` file into the process environment.
///
/// Load it before installing the subscriber so a `RUST_LOG` from the file applies, then call
/// [`EnvFile::log`] once logging is up.
#[derive(Debug)]
pub enum EnvFile {
	/// Variables were read from this file.
	Loaded(PathBuf),
	/// No file was found.
	Missing,
	/// The file exists but could not be read or parsed.
	Unreadable(dotenvy::Error),
}
impl EnvFile {
	/// Loads `.env` from the working directory or one of its ancestors.
	pub fn load() -> Self {
		Self::from_outcome(dotenvy::dotenv())
	}

	/// Loads the file at `path`.
	pub fn load_path(path: impl AsRef<Path>) -> Self {
		let path = path.as_ref();

		Self::from_outcome(dotenvy::from_path(path).map(|()| path.to_path_buf()))
	}

	/// Reports the outcome through `tracing`.
	pub fn log(&self) {
		match self {
			Self::Loaded(path) => {
				tracing::debug!(path = %path.display(), "loaded environment file")
			},
			Self::Missing => {},
			Self::Unreadable(e) => {
				tracing::warn!(error = %e, "ignoring unreadable environment file")
			},
		}
	}

	fn from_outcome(outcome: Result<PathBuf, dotenvy::Error>) -> Self {
		match outcome {
			Ok(path) => Self::Loaded(path),
			Err(e) if e.not_found() => Self::Missing,
			Err(e) => Self::Unreadable(e),
		}
	}
}

/// Validated broker configuration.
#[derive(Clone, Debug)]
pub struct Config {
	/// Listen address.
	pub bind: SocketAddr,
	/// Client secret JSON location.
	pub client_secret_file: PathBuf,
	/// Explicit redirect URI, overriding the client secret file.
	pub redirect_uri: Option<Url>,
	/// Scopes requested at consent.
	pub scopes: ScopeSet,
	/// Configured signing secret; generated at startup when `None`.
	pub signing_secret: Option<SigningSecret>,
	/// Session token lifetime.
	pub token_ttl: Duration,
	/// Pending authorization lifetime.
	pub pending_ttl: Duration,
	/// Session snapshot file; in-memory sessions when `None`.
	pub session_file: Option<PathBuf>,
	/// Calendar API root.
	pub calendar_api_base: Url,
	/// Target calendar.
	pub calendar_id: String,
	/// CORS origins.
	pub allowed_origins: Vec<HeaderValue>,
	/// `Secure` session cookie.
	pub secure_cookie: bool,
}
impl Config {
	/// Reads the client secret file and assembles every handler dependency.
	pub fn build_state(&self) -> Result<AppState> {
		let client_secret = ClientSecretFile::from_path(&self.client_secret_file)?;
		let descriptor = client_secret.descriptor()?;
		let redirect_uri = match (&self.redirect_uri, client_secret.default_redirect_uri()) {
			(Some(uri), _) | (None, Some(uri)) => uri.clone(),
			(None, None) => Url::parse(DEFAULT_REDIRECT_URI)
				.map_err(|source| ConfigError::InvalidUrl { field: "redirect_uri", source })?,
		};
		let http_client = BrokerHttpClient::new()?;
		let coordinator = AuthorizationCoordinator::new(
			descriptor,
			Arc::new(DefaultProviderStrategy),
			client_secret.client_id.as_str(),
			client_secret.client_secret.expose(),
			redirect_uri,
			self.scopes.clone(),
			http_client.clone(),
		)
		.with_pending_ttl(self.pending_ttl);
		let signing_secret = match &self.signing_secret {
			Some(secret) => secret.clone(),
			None => {
				tracing::warn!("no signing secret configured; tokens will not survive a restart");

				SigningSecret::generate()
			},
		};
		let codec = SessionTokenCodec::new(signing_secret).with_ttl(self.token_ttl);
		let sessions: Arc<dyn SessionStore> = match &self.session_file {
			Some(path) => Arc::new(FileSessionStore::open(path)?),
			None => Arc::new(MemorySessionStore::default()),
		};
		let calendar =
			GoogleCalendarClient::new(http_client, &self.calendar_api_base, &self.calendar_id)?;

		tracing::info!(
			redirect_uri = %coordinator.redirect_uri(),
			scopes = %self.scopes.normalized(),
			"broker configured"
		);

		Ok(AppState::new(coordinator, codec, sessions, Arc::new(calendar))
			.with_secure_cookie(self.secure_cookie))
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, fs, process};
	// self
	use super::*;

	fn parse(args: &[&str]) -> Cli {
		Cli::try_parse_from(std::iter::once("calendar-broker").chain(args.iter().copied()))
			.expect("Arguments should parse.")
	}

	#[test]
	fn env_file_values_reach_the_environment() {
		let path = env::temp_dir().join(format!("calendar_broker_env_{}.env", process::id()));

		fs::write(&path, "CALENDAR_BROKER_ENV_FILE_MARKER=from-file\n")
			.expect("Failed to write env file fixture.");

		let outcome = EnvFile::load_path(&path);

		assert!(matches!(&outcome, EnvFile::Loaded(loaded) if loaded == &path));
		assert_eq!(
			env::var("CALENDAR_BROKER_ENV_FILE_MARKER").as_deref(),
			Ok("from-file"),
			"Env file values should be visible to later configuration."
		);

		fs::remove_file(&path).expect("Failed to remove env file fixture.");

		assert!(matches!(EnvFile::load_path(&path), EnvFile::Missing));
	}

	#[test]
	fn defaults_match_the_local_google_setup() {
		let config = parse(&[]).into_config().expect("Defaults should validate.");

		assert_eq!(config.bind, "127.0.0.1:8000".parse().expect("Address should parse."));
		assert_eq!(config.client_secret_file, PathBuf::from("calendar_credentials.json"));
		assert!(config.scopes.contains(DEFAULT_SCOPE));
		assert_eq!(config.token_ttl, Duration::hours(1));
		assert_eq!(config.pending_ttl, Duration::minutes(10));
		assert_eq!(config.calendar_id, "primary");
		assert_eq!(config.calendar_api_base.as_str(), DEFAULT_CALENDAR_API_BASE);
		assert!(config.signing_secret.is_none());
		assert!(config.allowed_origins.is_empty());
		assert!(!config.secure_cookie);
	}

	#[test]
	fn repeated_flags_accumulate() {
		let config = parse(&[
			"--scope",
			"openid",
			"--scope",
			"email,profile",
			"--allowed-origin",
			"https://app.example.com/",
			"--token-ttl-secs",
			"120",
		])
		.into_config()
		.expect("Flags should validate.");

		assert_eq!(config.scopes.normalized(), "email openid profile");
		assert_eq!(config.allowed_origins, [HeaderValue::from_static("https://app.example.com")]);
		assert_eq!(config.token_ttl, Duration::seconds(120));
	}

	#[test]
	fn short_signing_secrets_are_rejected() {
		let err = parse(&["--signing-secret", "short"])
			.into_config()
			.expect_err("Short secrets must be rejected.");

		assert!(matches!(err, ConfigError::WeakSigningSecret { .. }));
		assert!(Cli::try_parse_from(["calendar-broker", "--token-ttl-secs", "0"]).is_err());
	}

	#[test]
	fn state_uses_the_client_secret_redirect_when_unset() {
		let path = env::temp_dir().join(format!(
			"calendar_broker_client_secret_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		));

		fs::write(
			&path,
			r#"{"web":{"client_id":"cid","client_secret":"csecret","redirect_uris":["http://localhost:9000/oauthcallback"]}}"#,
		)
		.expect("Failed to write client secret fixture.");

		let mut config = parse(&[]).into_config().expect("Defaults should validate.");

		config.client_secret_file = path.clone();

		let state = config.build_state().expect("State should build.");

		assert_eq!(
			state.coordinator.redirect_uri().as_str(),
			"http://localhost:9000/oauthcallback"
		);
		assert_eq!(state.codec.ttl(), Duration::hours(1));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove client secret fixture {}: {e}", path.display())
		});
	}
}
