//! Vault as the rollout secret service

use rollout::{DynamicCredential, Error, Host, Result, SecretService};
use vaultkit::Client;

pub struct VaultService;

fn explain(err: &vaultkit::Error) -> String {
    format!("{err} ({})", err.category().advice())
}

impl SecretService for VaultService {
    type Session = Client;

    fn authenticate(&self, address: &str, token: &str) -> Result<Client> {
        Client::authenticate(address, token).map_err(|e| Error::Auth {
            message: explain(&e),
        })
    }

    fn configure(&self, session: &Client) -> Result<()> {
        session.configure().map_err(|e| Error::Configure {
            message: explain(&e),
        })
    }

    fn rekey(&self, session: &Client, host: &Host) -> Result<DynamicCredential> {
        let token = session.rekey_host(host.hostname()).map_err(|e| Error::Rekey {
            host: host.hostname().to_string(),
            message: explain(&e),
        })?;
        Ok(DynamicCredential {
            accessor: token.accessor,
            token: token.token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_address_is_auth_error() {
        let err = VaultService.authenticate("vault.example.net", "t").unwrap_err();
        assert!(matches!(err, Error::Auth { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_rekey_rejects_unusable_host_name() {
        let client = Client::new("http://127.0.0.1:1", "t").unwrap();
        let host = Host::new("web/01", "10.0.0.5");
        let err = VaultService.rekey(&client, &host).unwrap_err();
        assert!(matches!(err, Error::Rekey { ref host, .. } if host == "web/01"));
        assert!(err.to_string().contains("invalid host name"));
    }
}
