use super::ServerFault;

/// Message used when a failure carries neither a status nor any text.
pub const NO_CONNECTION_MESSAGE: &str = "HTTP response status 0 and no message. Likely did not or could not reach server. Is the server running?";

/// Hook invoked last by the normalizer so callers can tag pure network failures.
pub trait ConnectivityClassifier: Send + Sync {
    fn classify(&self, fault: &mut ServerFault);
}

/// Default classifier: a missing or zero status means the server was never reached.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatusZeroClassifier;

impl ConnectivityClassifier for StatusZeroClassifier {
    fn classify(&self, fault: &mut ServerFault) {
        if matches!(fault.status, None | Some(0)) {
            fault.no_connection = true;
            if fault.message.is_empty() {
                fault.message = NO_CONNECTION_MESSAGE.to_string();
            }
        }
    }
}
