//! Session token codec for moderation links.
//!
//! The approve/reject links leave the system by email, so the session
//! identifier they carry is encrypted and authenticated: only a holder of
//! the server secret can mint a token, and a tampered token decodes to
//! nothing rather than to an attacker-chosen session.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};

const NONCE_LEN: usize = 12;

pub struct TokenCodec {
    key: [u8; 32],
}

impl TokenCodec {
    /// Derives the cipher key from the configured secret, truncated or
    /// zero-padded to 32 bytes.
    pub fn new(secret: &str) -> TokenCodec {
        let mut key = [0u8; 32];
        let bytes = secret.as_bytes();
        let len = bytes.len().min(key.len());
        key[..len].copy_from_slice(&bytes[..len]);
        TokenCodec { key }
    }

    /// Encrypts a session identifier into a URL-safe token. Returns None for
    /// an empty identifier. The nonce is drawn fresh per call and appended
    /// to the ciphertext, so encoding the same session twice yields
    /// different tokens.
    pub fn encode(&self, session_id: &str) -> Option<String> {
        if session_id.is_empty() {
            return None;
        }
        let cipher = Aes256Gcm::new_from_slice(&self.key).ok()?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut data = cipher.encrypt(&nonce, session_id.as_bytes()).ok()?;
        data.extend_from_slice(nonce.as_slice());
        Some(base64::encode_config(data, base64::URL_SAFE_NO_PAD))
    }

    /// Recovers the session identifier from a token. Any structural or
    /// authentication failure yields None; this must never panic, as it sits
    /// on an endpoint fed by anyone holding an emailed link.
    pub fn decode(&self, token: &str) -> Option<String> {
        if token.is_empty() {
            return None;
        }
        let data = base64::decode_config(token, base64::URL_SAFE_NO_PAD).ok()?;
        if data.len() <= NONCE_LEN {
            return None;
        }
        let (ciphertext, nonce) = data.split_at(data.len() - NONCE_LEN);
        let cipher = Aes256Gcm::new_from_slice(&self.key).ok()?;
        let plain = cipher.decrypt(Nonce::from_slice(nonce), ciphertext).ok()?;
        String::from_utf8(plain).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new("an example secret that is longer than thirty-two bytes")
    }

    #[test]
    fn round_trips_any_non_empty_session() {
        let codec = codec();
        for session in ["a", "sess_4f2a9c", "unicode-héhé", &"x".repeat(300)] {
            let token = codec.encode(session).expect("encoding failed");
            assert_eq!(codec.decode(&token).as_deref(), Some(session));
        }
    }

    #[test]
    fn tokens_are_url_safe() {
        let codec = codec();
        let token = codec.encode("some session id").unwrap();
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn same_session_encodes_to_distinct_tokens() {
        let codec = codec();
        assert_ne!(codec.encode("abc"), codec.encode("abc"));
    }

    #[test]
    fn empty_input_reports_failure() {
        let codec = codec();
        assert_eq!(codec.encode(""), None);
        assert_eq!(codec.decode(""), None);
    }

    #[test]
    fn tampered_token_decodes_to_none() {
        let codec = codec();
        let token = codec.encode("abc").unwrap();
        let mut bytes = token.into_bytes();
        bytes[0] = if bytes[0] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();
        assert_eq!(codec.decode(&tampered), None);
    }

    #[test]
    fn garbage_never_panics() {
        let codec = codec();
        for garbage in ["not base64 !!", "AAAA", "-", "_", &"A".repeat(1000)] {
            assert_eq!(codec.decode(garbage), None);
        }
    }

    #[test]
    fn token_from_another_secret_is_refused() {
        let token = TokenCodec::new("first secret").encode("abc").unwrap();
        assert_eq!(TokenCodec::new("second secret").decode(&token), None);
    }

    #[test]
    fn short_secrets_are_zero_padded() {
        let codec = TokenCodec::new("short");
        let token = codec.encode("abc").unwrap();
        assert_eq!(codec.decode(&token).as_deref(), Some("abc"));
    }
}
