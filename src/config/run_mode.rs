use serde::{ Deserialize, Serialize };
use std::fmt;
use std::str::FromStr;
use url::Url;

use super::ConfigError;

const LOCAL_HOST: &str = "http://localhost";
const DEV_HOST: &str = "http://nervoset.metaelon.space";
const PROD_HOST: &str = "https://prod.metaelon.space";
const PROD_PORT: u16 = 443;
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Local,
    Dev,
    Prod,
}

impl FromStr for RunMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(RunMode::Local),
            "dev" => Ok(RunMode::Dev),
            "prod" => Ok(RunMode::Prod),
            _ => Err(ConfigError::UnknownRunMode(s.to_string())),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunMode::Local => "local",
            RunMode::Dev => "dev",
            RunMode::Prod => "prod",
        };
        f.write_str(name)
    }
}

/// Base URL of the backend a client should talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub run_mode: RunMode,
    pub base_url: Url,
}

impl EndpointDescriptor {
    pub fn for_mode(run_mode: RunMode, port: Option<u16>) -> Result<Self, ConfigError> {
        let (host, port) = match run_mode {
            RunMode::Local => (LOCAL_HOST, port.unwrap_or(DEFAULT_PORT)),
            RunMode::Dev => (DEV_HOST, port.unwrap_or(DEFAULT_PORT)),
            // production is always served over TLS on the default port
            RunMode::Prod => (PROD_HOST, PROD_PORT),
        };
        let raw = format!("{}:{}", host, port);
        let base_url = Url::parse(&raw).map_err(|e| ConfigError::InvalidEndpoint(raw, e))?;
        Ok(Self { run_mode, base_url })
    }

    /// Endpoint served from an arbitrary base URL, mainly for pointing the
    /// client at a local mock server.
    pub fn custom(run_mode: RunMode, raw: &str) -> Result<Self, ConfigError> {
        let base_url = Url::parse(raw).map_err(|e| ConfigError::InvalidEndpoint(raw.to_string(), e))?;
        Ok(Self { run_mode, base_url })
    }

    pub fn url(&self, route: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            route.trim_start_matches('/')
        )
    }
}

impl fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.base_url.as_str().trim_end_matches('/'), self.run_mode)
    }
}

pub fn resolve_endpoint(mode: &str, explicit_port: Option<u16>) -> Result<EndpointDescriptor, ConfigError> {
    let run_mode: RunMode = mode.parse()?;
    EndpointDescriptor::for_mode(run_mode, explicit_port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_uses_explicit_port() {
        let endpoint = resolve_endpoint("local", Some(8080)).unwrap();
        assert_eq!(endpoint.run_mode, RunMode::Local);
        assert_eq!(endpoint.url("/chat/1"), "http://localhost:8080/chat/1");
    }

    #[test]
    fn dev_falls_back_to_default_port() {
        let endpoint = resolve_endpoint(" DEV ", None).unwrap();
        assert_eq!(endpoint.url("send_message"), "http://nervoset.metaelon.space:3000/send_message");
    }

    #[test]
    fn prod_ignores_explicit_port() {
        let endpoint = resolve_endpoint("prod", Some(3000)).unwrap();
        assert_eq!(endpoint.base_url.scheme(), "https");
        assert_eq!(endpoint.url("chat/5"), "https://prod.metaelon.space/chat/5");
    }

    #[test]
    fn unknown_mode_is_an_error() {
        for raw in ["production", "", "lcoal"] {
            assert!(matches!(
                resolve_endpoint(raw, None),
                Err(ConfigError::UnknownRunMode(_))
            ));
        }
    }

    #[test]
    fn custom_endpoint_rejects_garbage() {
        assert!(EndpointDescriptor::custom(RunMode::Local, "not a url").is_err());
        let endpoint = EndpointDescriptor::custom(RunMode::Local, "http://127.0.0.1:4545/").unwrap();
        assert_eq!(endpoint.url("/chat/3"), "http://127.0.0.1:4545/chat/3");
    }
}
