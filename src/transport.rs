//! Handing finished messages to an SMTP server.

use std::cell::RefCell;

use lettre::address::{Address, Envelope};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::Transport as _;
use tracing::info;

use crate::config::{Account, TlsMode};
use crate::crypt::{PgpOptions, Recipient, Signer};
use crate::error::{MailError, Result};
use crate::mime::Message;

/// Delivers a finished byte stream.
pub trait Transport {
    /// Deliver `bytes` from `from` to every address in `to`.
    fn send_raw(&self, from: &str, to: &[String], bytes: &[u8]) -> Result<()>;
}

/// Blocking SMTP delivery through `lettre`.
pub struct SmtpTransport {
    inner: lettre::SmtpTransport,
    host: String,
}

impl SmtpTransport {
    /// Build a client from an account's server settings.
    pub fn from_account(account: &Account) -> Result<Self> {
        let server = &account.server;
        if server.host.is_empty() {
            return Err(MailError::Config(format!(
                "account '{}' has no server host",
                account.address
            )));
        }
        let host = server.host.as_str();
        let smtp_err = |e: lettre::transport::smtp::Error| MailError::Transport(e.to_string());

        let builder = match server.tls {
            TlsMode::Wrapper => lettre::SmtpTransport::relay(host).map_err(smtp_err)?,
            TlsMode::Starttls => lettre::SmtpTransport::starttls_relay(host).map_err(smtp_err)?,
            TlsMode::Opportunistic => {
                let params = TlsParameters::new(host.to_string()).map_err(smtp_err)?;
                lettre::SmtpTransport::builder_dangerous(host).tls(Tls::Opportunistic(params))
            }
            TlsMode::None => lettre::SmtpTransport::builder_dangerous(host),
        };

        let mut builder = builder.port(server.port()).timeout(server.timeout());
        if let Some(ref password) = account.password {
            builder = builder.credentials(Credentials::new(
                account.address.clone(),
                password.clone(),
            ));
        }

        Ok(Self {
            inner: builder.build(),
            host: host.to_string(),
        })
    }
}

impl Transport for SmtpTransport {
    fn send_raw(&self, from: &str, to: &[String], bytes: &[u8]) -> Result<()> {
        let envelope = envelope(from, to)?;
        self.inner
            .send_raw(&envelope, bytes)
            .map_err(|e| MailError::Transport(e.to_string()))?;
        info!(
            host = %self.host,
            recipients = to.len(),
            size = bytes.len(),
            "Message delivered"
        );
        Ok(())
    }
}

fn envelope(from: &str, to: &[String]) -> Result<Envelope> {
    let parse = |raw: &str| {
        raw.parse::<Address>()
            .map_err(|e| MailError::Transport(format!("{raw}: {e}")))
    };
    let from = parse(from)?;
    let to = to.iter().map(|a| parse(a)).collect::<Result<Vec<_>>>()?;
    Envelope::new(Some(from), to).map_err(|e| MailError::Transport(e.to_string()))
}

/// Send `message` in the clear to all of its recipients.
pub fn send_message<T: Transport + ?Sized>(transport: &T, message: &Message) -> Result<()> {
    let from = message.effective_sender()?;
    let bytes = message.to_bytes()?;
    transport.send_raw(&from, &message.recipients(), &bytes)
}

/// Send `message` as an encrypted envelope to all of its recipients.
pub fn send_encrypted<T: Transport + ?Sized>(
    transport: &T,
    message: &Message,
    recipient: &Recipient,
    signer: Option<&Signer>,
    options: &PgpOptions,
) -> Result<()> {
    let from = message.effective_sender()?;
    let bytes = message.encrypt(recipient, signer, options)?;
    transport.send_raw(&from, &message.recipients(), &bytes)
}

/// One delivery captured by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub from: String,
    pub to: Vec<String>,
    pub bytes: Vec<u8>,
}

/// Keeps deliveries in memory instead of sending them.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: RefCell<Vec<Delivery>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.sent.borrow().clone()
    }
}

impl Transport for MemoryTransport {
    fn send_raw(&self, from: &str, to: &[String], bytes: &[u8]) -> Result<()> {
        self.sent.borrow_mut().push(Delivery {
            from: from.to_string(),
            to: to.to_vec(),
            bytes: bytes.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    fn message() -> Message {
        let mut m = Message::new();
        m.from("Alice", "a@x.com");
        m.to("", "b@y.com");
        m.cc("", "c@z.com");
        m.bcc("", "d@w.com");
        m.set_subject("hello");
        m
    }

    #[test]
    fn test_send_message_uses_effective_sender_and_recipients() {
        let transport = MemoryTransport::new();
        let mut m = message();
        m.sender("", "s@x.com");
        send_message(&transport, &m).unwrap();

        let sent = transport.deliveries();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "s@x.com");
        assert_eq!(sent[0].to, vec!["b@y.com", "c@z.com", "d@w.com"]);
        assert!(sent[0].bytes.starts_with(b"Sender: s@x.com\r\nFrom: Alice <a@x.com>\r\n"));
    }

    #[test]
    fn test_send_without_sender_fails_before_delivery() {
        let transport = MemoryTransport::new();
        let mut m = Message::new();
        m.to("", "b@y.com");
        let err = send_message(&transport, &m).unwrap_err();
        assert!(matches!(err, MailError::NoSender));
        assert!(transport.deliveries().is_empty());
    }

    #[test]
    fn test_envelope_rejects_bad_address() {
        assert!(envelope("a@x.com", &["b@y.com".into()]).is_ok());
        assert!(matches!(
            envelope("not an address", &["b@y.com".into()]),
            Err(MailError::Transport(_))
        ));
        assert!(matches!(
            envelope("a@x.com", &[]),
            Err(MailError::Transport(_))
        ));
    }

    #[test]
    fn test_from_account_requires_host() {
        let account = Account::default();
        assert!(matches!(
            SmtpTransport::from_account(&account),
            Err(MailError::Config(_))
        ));
    }

    #[test]
    fn test_from_account_builds_without_connecting() {
        for tls in [
            TlsMode::Wrapper,
            TlsMode::Starttls,
            TlsMode::Opportunistic,
            TlsMode::None,
        ] {
            let account = Account {
                address: "a@x.com".into(),
                password: Some("secret".into()),
                server: ServerConfig {
                    host: "localhost".into(),
                    tls,
                    ..ServerConfig::default()
                },
                ..Account::default()
            };
            assert!(SmtpTransport::from_account(&account).is_ok());
        }
    }
}
