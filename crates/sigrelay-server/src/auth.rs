use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Outcome of a token verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOutcome {
    pub ok: bool,
    pub subject: String,
    pub reason: String,
}

impl VerifyOutcome {
    fn accept(subject: impl Into<String>) -> Self {
        Self {
            ok: true,
            subject: subject.into(),
            reason: String::new(),
        }
    }

    fn reject(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            subject: String::new(),
            reason: reason.into(),
        }
    }
}

/// The hub's only dependency on an external authenticator. Implementations
/// are expected to be pure and non-blocking (or bounded-latency); the hub
/// never retries or times out a call on its own.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> VerifyOutcome;
}

/// Reference verifier: tokens are self-contained strings of the form
/// `subject.expiry.hmac-hex`, where `hmac-hex` is HMAC-SHA256 over
/// `subject.expiry` under a shared secret, hex-encoded. `expiry` is a Unix
/// timestamp in seconds; tokens are rejected once expired.
pub struct HmacTokenVerifier {
    secret: String,
}

impl HmacTokenVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Produce a token for `subject`, valid for `ttl_secs` from now. Used by
    /// tests and by any issuer that wants to reuse this scheme directly.
    pub fn issue(&self, subject: &str, ttl_secs: u64) -> String {
        let expiry = now_secs() + ttl_secs;
        let signed = format!("{subject}.{expiry}");
        let sig = hex::encode(self.mac(signed.as_bytes()));
        format!("{signed}.{sig}")
    }

    fn mac(&self, body: &[u8]) -> Vec<u8> {
        let mut mac = <Hmac<Sha256>>::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts a key of any length");
        mac.update(body);
        mac.finalize().into_bytes().to_vec()
    }
}

impl TokenVerifier for HmacTokenVerifier {
    fn verify(&self, token: &str) -> VerifyOutcome {
        let mut parts = token.splitn(3, '.');
        let (Some(subject), Some(expiry_str), Some(sig_hex)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return VerifyOutcome::reject("malformed token");
        };
        if subject.is_empty() {
            return VerifyOutcome::reject("empty subject");
        }
        let Ok(expiry) = expiry_str.parse::<u64>() else {
            return VerifyOutcome::reject("malformed expiry");
        };
        let Ok(expected_sig) = hex::decode(sig_hex) else {
            return VerifyOutcome::reject("malformed signature");
        };

        let signed = format!("{subject}.{expiry_str}");
        let Ok(mut mac) = <Hmac<Sha256>>::new_from_slice(self.secret.as_bytes()) else {
            return VerifyOutcome::reject("invalid verifier key");
        };
        mac.update(signed.as_bytes());
        if mac.verify_slice(&expected_sig).is_err() {
            return VerifyOutcome::reject("signature mismatch");
        }

        if expiry < now_secs() {
            return VerifyOutcome::reject("token expired");
        }

        VerifyOutcome::accept(subject)
    }
}

/// Verifier that rejects every token. Used when no secret is configured, so
/// a misconfigured deployment fails closed instead of accepting everyone.
pub struct DenyAllVerifier;

impl TokenVerifier for DenyAllVerifier {
    fn verify(&self, _token: &str) -> VerifyOutcome {
        VerifyOutcome::reject("no token verifier configured")
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
