//! Anonymizing relay backend
//!
//! Talks SOCKS5 to a local relay. Tor isolates streams by SOCKS credentials,
//! so every handle carries a new `circuit-N` username to get a new circuit and
//! with it a new exit node.

use crate::proxy::{ProxyError, ProxyHandle, ProxyProtocol, ProxySource};

const CIRCUIT_PASSWORD: &str = "harvest";

pub struct AnonymizingRelay {
    host: String,
    port: u16,
    circuit: u64,
}

impl AnonymizingRelay {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            circuit: 0,
        }
    }
}

impl ProxySource for AnonymizingRelay {
    fn next(&mut self) -> Result<ProxyHandle, ProxyError> {
        self.circuit = self.circuit.wrapping_add(1);
        Ok(
            ProxyHandle::new(self.host.clone(), self.port, ProxyProtocol::Socks5)
                .with_credentials(format!("circuit-{}", self.circuit), CIRCUIT_PASSWORD),
        )
    }

    fn available(&self) -> usize {
        usize::MAX
    }

    fn name(&self) -> &str {
        "relay"
    }
}
