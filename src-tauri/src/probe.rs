use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, warn};

pub const DEFAULT_PROBE_ADDRESS: &str = "1.1.1.1:443";
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkStatus {
    Connected,
    Disconnected,
    Error(String),
}

impl NetworkStatus {
    /// Text shown in the speech bubble.
    pub fn message(&self) -> String {
        match self {
            NetworkStatus::Connected => "ネットワーク接続は良好です".to_string(),
            NetworkStatus::Disconnected => "ネットワークに接続されていません".to_string(),
            NetworkStatus::Error(detail) => {
                format!("ネットワークの確認中にエラーが発生しました: {detail}")
            }
        }
    }
}

/// Blocking connectivity check. Callers run it off the UI loop.
pub trait NetworkProbe: Send + Sync {
    fn check_status(&self) -> NetworkStatus;
}

#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_ADDRESS, DEFAULT_PROBE_TIMEOUT)
    }
}

impl NetworkProbe for TcpProbe {
    fn check_status(&self) -> NetworkStatus {
        let target = match self.address.to_socket_addrs() {
            Ok(mut addrs) => match addrs.next() {
                Some(addr) => addr,
                None => {
                    return NetworkStatus::Error(format!(
                        "no address found for {}",
                        self.address
                    ));
                }
            },
            Err(err) => {
                warn!("failed to resolve probe address {}: {err}", self.address);
                return NetworkStatus::Error(err.to_string());
            }
        };

        match TcpStream::connect_timeout(&target, self.timeout) {
            Ok(_) => {
                debug!(%target, "network probe connected");
                NetworkStatus::Connected
            }
            Err(err) => classify_connect_error(&err),
        }
    }
}

fn classify_connect_error(err: &io::Error) -> NetworkStatus {
    match err.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::TimedOut
        | io::ErrorKind::HostUnreachable
        | io::ErrorKind::NetworkUnreachable
        | io::ErrorKind::NetworkDown => {
            debug!("network probe failed to connect: {err}");
            NetworkStatus::Disconnected
        }
        _ => {
            warn!("network probe error: {err}");
            NetworkStatus::Error(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn reachable_listener_reports_connected() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
        let address = listener.local_addr().expect("local addr");
        let probe = TcpProbe::new(address.to_string(), Duration::from_secs(1));
        assert_eq!(probe.check_status(), NetworkStatus::Connected);
    }

    #[test]
    fn refused_port_reports_disconnected() {
        let address = {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
            listener.local_addr().expect("local addr")
        };
        let probe = TcpProbe::new(address.to_string(), Duration::from_secs(1));
        assert_eq!(probe.check_status(), NetworkStatus::Disconnected);
    }

    #[test]
    fn malformed_address_reports_error_with_detail() {
        let probe = TcpProbe::new("not an address", Duration::from_secs(1));
        let status = probe.check_status();
        assert!(matches!(status, NetworkStatus::Error(_)));
        assert!(
            status
                .message()
                .starts_with("ネットワークの確認中にエラーが発生しました: ")
        );
    }

    #[test]
    fn unexpected_io_errors_are_not_treated_as_offline() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(
            classify_connect_error(&err),
            NetworkStatus::Error("denied".to_string())
        );
        let err = io::Error::from(io::ErrorKind::TimedOut);
        assert_eq!(classify_connect_error(&err), NetworkStatus::Disconnected);
    }
}
