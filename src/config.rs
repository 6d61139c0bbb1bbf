use crate::error::ConfigError;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

const DEFAULT_PORT: u16 = 6379;
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct Config {
    pub storage_type: StorageType,
    pub redis_url: Option<String>,
    pub redis_username: Option<String>,
    pub redis_password: Option<String>,
    pub redis_db: Option<i64>,
    pub redis_timeout_ms: Option<u64>,
    pub redis_order_by_latency: bool,
    pub lock_lifetime: u64, // seconds
    pub lock_key_prefix: String,
    pub server_host: String,
    pub server_port: u16,
    pub memory_cleanup_interval: u64, // seconds
}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageType {
    Memory,
    Redis,
}

impl Config {
    pub fn from_env() -> Self {
        let storage_type = env::var("STORAGE_TYPE")
            .unwrap_or_else(|_| "memory".to_string())
            .to_lowercase();

        let storage_type = match storage_type.as_str() {
            "redis" => StorageType::Redis,
            _ => StorageType::Memory,
        };

        let redis_url = if storage_type == StorageType::Redis {
            Some(env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()))
        } else {
            None
        };

        let redis_username = env::var("REDIS_USERNAME").ok();
        let redis_password = env::var("REDIS_PASSWORD").ok();
        let redis_db = env::var("REDIS_DB")
            .ok()
            .and_then(|s| s.parse::<i64>().ok());
        let redis_timeout_ms = env::var("REDIS_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok());

        let redis_order_by_latency = env::var("REDIS_ORDER_BY_LATENCY")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        let lock_lifetime = env::var("LOCK_LIFETIME")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .unwrap_or(60);

        let lock_key_prefix =
            env::var("LOCK_KEY_PREFIX").unwrap_or_else(|_| crate::key::DEFAULT_PREFIX.to_string());

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        let memory_cleanup_interval = env::var("MEMORY_CLEANUP_INTERVAL")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .unwrap_or(60);

        Self {
            storage_type,
            redis_url,
            redis_username,
            redis_password,
            redis_db,
            redis_timeout_ms,
            redis_order_by_latency,
            lock_lifetime,
            lock_key_prefix,
            server_host,
            server_port,
            memory_cleanup_interval,
        }
    }

    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lock_lifetime)
    }

    /// Parses `redis_url` and applies the separate credential, database and
    /// timeout settings on top of it.
    pub fn store_url(&self) -> Result<StoreUrl, ConfigError> {
        let raw = self
            .redis_url
            .as_deref()
            .ok_or_else(|| ConfigError::InvalidUrl("REDIS_URL is not set".to_string()))?;
        let mut url: StoreUrl = raw.parse()?;

        if let Some(user) = &self.redis_username {
            url.username = Some(user.clone());
        }
        if let Some(pwd) = &self.redis_password {
            url.password = Some(pwd.clone());
        }
        if let Some(db) = self.redis_db {
            url.db = db;
        }
        if let Some(ms) = self.redis_timeout_ms {
            url.timeout = Duration::from_millis(ms);
        }
        Ok(url)
    }
}

/// Resolved connection settings for a pool of redis endpoints.
///
/// Accepts `redis://[user[:password]@]host[:port][,host[:port]...][/db][?timeout_ms=N]`.
/// Query parameters other than `timeout_ms` are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreUrl {
    pub endpoints: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db: i64,
    pub timeout: Duration,
}

impl FromStr for StoreUrl {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| ConfigError::InvalidUrl(s.to_string()))?;
        if scheme != "redis" {
            return Err(ConfigError::UnsupportedScheme(scheme.to_string()));
        }

        // `Url` takes one host, so the comma-separated list is cut out of the
        // authority and every host is checked on its own.
        let authority_end = rest
            .find(|c: char| matches!(c, '/' | '?' | '#'))
            .unwrap_or(rest.len());
        let (authority, tail) = rest.split_at(authority_end);
        let (userinfo, hosts) = match authority.rsplit_once('@') {
            Some((userinfo, hosts)) => (Some(userinfo), hosts),
            None => (None, authority),
        };

        let endpoints = hosts
            .split(',')
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .map(parse_endpoint)
            .collect::<Result<Vec<_>, _>>()?;
        let first = endpoints.first().ok_or(ConfigError::NoEndpoints)?;

        let userinfo = userinfo.map(|u| format!("{}@", u)).unwrap_or_default();
        let url = Url::parse(&format!("redis://{}{}{}", userinfo, first, tail))
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", s, e)))?;

        let username = decode(url.username())?;
        let password = match url.password() {
            Some(pwd) => decode(pwd)?,
            None => None,
        };

        let path = url.path().trim_matches('/');
        let db = if path.is_empty() {
            0
        } else {
            path.parse::<i64>()
                .map_err(|_| ConfigError::InvalidDatabase(path.to_string()))?
        };

        let mut timeout = DEFAULT_TIMEOUT;
        for (name, value) in url.query_pairs() {
            match name.as_ref() {
                "timeout_ms" => {
                    let ms = value.parse::<u64>().map_err(|_| ConfigError::InvalidParam {
                        name: name.to_string(),
                        value: value.to_string(),
                    })?;
                    timeout = Duration::from_millis(ms);
                }
                _ => log::debug!("Ignoring store url parameter {}", name),
            }
        }

        Ok(Self {
            endpoints,
            username,
            password,
            db,
            timeout,
        })
    }
}

/// Percent-decodes one credential; empty means absent.
fn decode(raw: &str) -> Result<Option<String>, ConfigError> {
    if raw.is_empty() {
        return Ok(None);
    }
    urlencoding::decode(raw)
        .map(|s| Some(s.into_owned()))
        .map_err(|_| ConfigError::InvalidUrl("credentials are not valid utf-8".to_string()))
}

/// Validates one `host[:port]` entry and renders it as `host:port`.
fn parse_endpoint(host: &str) -> Result<String, ConfigError> {
    let parsed = Url::parse(&format!("redis://{}", host)).map_err(|e| match e {
        url::ParseError::InvalidPort => ConfigError::InvalidPort(host.to_string()),
        _ => ConfigError::InvalidUrl(host.to_string()),
    })?;
    let name = parsed
        .host_str()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ConfigError::InvalidUrl(host.to_string()))?;
    Ok(format!("{}:{}", name, parsed.port().unwrap_or(DEFAULT_PORT)))
}
