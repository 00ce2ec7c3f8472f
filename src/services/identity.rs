use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by an identity handshake
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Handshake rejected: {0}")]
    Rejected(String),
}

/// Outcome of a successful wallet handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub address: String,
    pub chain_id: String,
}

impl Handshake {
    /// Parse a CAIP-10 account id such as `eip155:1:0xabc...`
    ///
    /// A bare address is accepted with `default_chain`.
    pub fn from_account_id(account: &str, default_chain: &str) -> Self {
        let mut parts = account.rsplitn(2, ':');
        let address = parts.next().unwrap_or(account).to_string();
        let chain_id = parts
            .next()
            .and_then(|prefix| prefix.rsplit(':').next())
            .filter(|chain| !chain.is_empty())
            .unwrap_or(default_chain)
            .to_string();

        Self { address, chain_id }
    }
}

/// Performs the actual wallet handshake
///
/// Constructed explicitly and injected into the session manager, so tests can
/// substitute a double.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn connect(&self) -> Result<Handshake, IdentityError>;

    /// Tear down provider-side state; failures are not interesting to callers
    async fn disconnect(&self) {}
}

/// Provider backed by an account id from configuration
///
/// With no account configured every handshake fails, which outside production
/// drives the session manager onto its ephemeral identity.
#[derive(Debug, Clone)]
pub struct ConfiguredIdentityProvider {
    account: Option<String>,
    chain_id: String,
}

impl ConfiguredIdentityProvider {
    pub fn new(account: Option<String>, chain_id: impl Into<String>) -> Self {
        Self {
            account,
            chain_id: chain_id.into(),
        }
    }
}

#[async_trait]
impl IdentityProvider for ConfiguredIdentityProvider {
    async fn connect(&self) -> Result<Handshake, IdentityError> {
        match &self.account {
            Some(account) => Ok(Handshake::from_account_id(account, &self.chain_id)),
            None => Err(IdentityError::Unavailable("no identity account configured".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1111";

    #[test]
    fn test_parse_caip_account() {
        let handshake = Handshake::from_account_id(&format!("eip155:137:{}", ADDR), "1");
        assert_eq!(handshake.address, ADDR);
        assert_eq!(handshake.chain_id, "137");
    }

    #[test]
    fn test_parse_bare_address() {
        let handshake = Handshake::from_account_id(ADDR, "1");
        assert_eq!(handshake.address, ADDR);
        assert_eq!(handshake.chain_id, "1");
    }

    #[tokio::test]
    async fn test_unconfigured_provider_fails() {
        let provider = ConfiguredIdentityProvider::new(None, "1");
        assert!(provider.connect().await.is_err());

        let provider = ConfiguredIdentityProvider::new(Some(ADDR.to_string()), "56");
        let handshake = provider.connect().await.unwrap();
        assert_eq!(handshake.chain_id, "56");
    }
}
