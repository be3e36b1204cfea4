//! Residential gateway backend
//!
//! The vendor exposes one gateway endpoint and picks a fresh residential exit
//! IP for every new connection. Country targeting is encoded in the username
//! as `USER__cr.kz,ru`.

use crate::config::ResidentialConfig;
use crate::proxy::{ProxyError, ProxyHandle, ProxyProtocol, ProxySource};

/// Marker between the account name and the country filter
const COUNTRY_SEPARATOR: &str = "__cr.";

/// Marker between the country filter and the session tag
const SESSION_SEPARATOR: &str = "__sessid.";

pub struct ResidentialGateway {
    host: String,
    port: u16,
    username: String,
    password: String,
    countries: Vec<String>,
    sticky_sessions: bool,
    session: u64,
}

impl ResidentialGateway {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        countries: Vec<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            countries,
            sticky_sessions: false,
            session: 0,
        }
    }

    /// Tags every handle with its own session id
    ///
    /// With sessions enabled each handle pins a distinct exit IP, so
    /// consecutive handles are different values.
    pub fn with_sticky_sessions(mut self, enabled: bool) -> Self {
        self.sticky_sessions = enabled;
        self
    }

    pub fn from_config(config: &ResidentialConfig) -> Result<Self, ProxyError> {
        let password = config.password.clone().ok_or_else(|| {
            ProxyError::Invalid(format!(
                "residential gateway {}:{} has no password",
                config.host, config.port
            ))
        })?;

        Ok(Self::new(
            config.host.clone(),
            config.port,
            config.username.clone(),
            password,
            config.countries.clone(),
        )
        .with_sticky_sessions(config.sticky_sessions))
    }

    fn login(&self, session: Option<u64>) -> String {
        let mut login = self.username.clone();
        if !self.countries.is_empty() {
            login.push_str(COUNTRY_SEPARATOR);
            login.push_str(&self.countries.join(","));
        }
        if let Some(session) = session {
            login.push_str(SESSION_SEPARATOR);
            login.push_str(&session.to_string());
        }
        login
    }
}

impl ProxySource for ResidentialGateway {
    fn next(&mut self) -> Result<ProxyHandle, ProxyError> {
        let session = if self.sticky_sessions {
            self.session += 1;
            Some(self.session)
        } else {
            None
        };

        Ok(
            ProxyHandle::new(self.host.clone(), self.port, ProxyProtocol::Http)
                .with_credentials(self.login(session), self.password.clone()),
        )
    }

    fn available(&self) -> usize {
        if self.sticky_sessions {
            usize::MAX
        } else {
            1
        }
    }

    fn name(&self) -> &str {
        "residential"
    }
}
