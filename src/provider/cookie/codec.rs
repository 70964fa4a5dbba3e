use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use cookie::{Cookie, CookieJar, Key};
use rocket::time::OffsetDateTime;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    error::{SessionError, SessionResult},
    store::SessionData,
};

/// Encrypts and authenticates a whole session so it can be stored on the client.
///
/// The session is serialized as JSON along with its issue time, encrypted with
/// AES-256-GCM under the block key, and signed with HMAC-SHA256 under the hash
/// key. Both steps bind the payload to the codec's field name, so a value
/// produced for one name won't decode under another.
pub struct CookieCodec {
    key: Key,
    name: String,
}

/// Payload written by [`CookieCodec::encode`]
#[derive(Serialize)]
struct SerializedPayload<'a> {
    t: i64,
    v: &'a SessionData,
}

/// Payload read by [`CookieCodec::decode`]. Structure should match [`SerializedPayload`].
#[derive(Deserialize)]
struct DeserializedPayload {
    t: i64,
    v: SessionData,
}

impl CookieCodec {
    /// Create a codec. Keys of any length are accepted and stretched with SHA-256.
    pub fn new(block_key: &[u8], hash_key: &[u8], name: &str) -> Self {
        let mut key_material = Vec::with_capacity(64);
        key_material.extend_from_slice(&Sha256::digest(hash_key)); // signing half
        key_material.extend_from_slice(&Sha256::digest(block_key)); // encryption half
        Self {
            key: Key::from(&key_material),
            name: name.to_owned(),
        }
    }

    /// The field name the payloads are bound to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Encode the session data into a URL-safe string
    pub fn encode(&self, data: &SessionData) -> SessionResult<String> {
        self.encode_at(data, OffsetDateTime::now_utc().unix_timestamp())
    }

    fn encode_at(&self, data: &SessionData, issued: i64) -> SessionResult<String> {
        let json = serde_json::to_string(&SerializedPayload { t: issued, v: data })?;

        let mut jar = CookieJar::new();
        jar.private_mut(&self.key)
            .add(Cookie::new(self.name.clone(), json));
        let encrypted = self.sealed_value(&jar)?;

        let mut jar = CookieJar::new();
        jar.signed_mut(&self.key)
            .add(Cookie::new(self.name.clone(), encrypted));
        let signed = self.sealed_value(&jar)?;

        Ok(URL_SAFE_NO_PAD.encode(signed))
    }

    /// Decode a string produced by [`encode`](Self::encode). Fails with
    /// [`SessionError::Authentication`] if the payload was tampered with or produced
    /// under different keys, and with [`SessionError::Expired`] if it was issued more
    /// than `max_age` seconds ago (a `max_age` of 0 disables the age check).
    pub fn decode(&self, text: &str, max_age: u64) -> SessionResult<SessionData> {
        let signed = URL_SAFE_NO_PAD
            .decode(text)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or(SessionError::Authentication)?;

        let jar = CookieJar::new();
        let verified = jar
            .signed(&self.key)
            .verify(Cookie::new(self.name.clone(), signed))
            .ok_or(SessionError::Authentication)?;
        let decrypted = jar
            .private(&self.key)
            .decrypt(verified)
            .ok_or(SessionError::Authentication)?;

        let payload: DeserializedPayload = serde_json::from_str(decrypted.value())?;
        let age = OffsetDateTime::now_utc().unix_timestamp() - payload.t;
        if max_age > 0 && age > i64::try_from(max_age).unwrap_or(i64::MAX) {
            return Err(SessionError::Expired);
        }
        Ok(payload.v)
    }

    fn sealed_value(&self, jar: &CookieJar) -> SessionResult<String> {
        jar.get(&self.name)
            .map(|cookie| cookie.value().to_owned())
            .ok_or_else(|| SessionError::Backend("sealed cookie missing from jar".into()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample_data() -> SessionData {
        let mut data = SessionData::new();
        data.insert("user_id".to_owned(), json!(42));
        data.insert("roles".to_owned(), json!(["admin", "user"]));
        data
    }

    #[test]
    fn decodes_what_it_encodes() {
        let codec = CookieCodec::new(b"block key", b"hash key", "session");
        let encoded = codec.encode(&sample_data()).unwrap();

        assert!(encoded
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
        assert_eq!(codec.decode(&encoded, 60).unwrap(), sample_data());
        assert_eq!(
            codec.decode(&codec.encode(&SessionData::new()).unwrap(), 60).unwrap(),
            SessionData::new()
        );
    }

    #[test]
    fn rejects_other_keys_and_names() {
        let codec = CookieCodec::new(b"block key", b"hash key", "session");
        let encoded = codec.encode(&sample_data()).unwrap();

        let other_block = CookieCodec::new(b"other block", b"hash key", "session");
        let other_hash = CookieCodec::new(b"block key", b"other hash", "session");
        let other_name = CookieCodec::new(b"block key", b"hash key", "other");
        for codec in [other_block, other_hash, other_name] {
            assert!(matches!(
                codec.decode(&encoded, 60),
                Err(SessionError::Authentication)
            ));
        }
    }

    #[test]
    fn rejects_tampered_payloads() {
        let codec = CookieCodec::new(b"block key", b"hash key", "session");
        let encoded = codec.encode(&sample_data()).unwrap();

        let mut tampered = encoded.into_bytes();
        let idx = tampered.len() / 2;
        tampered[idx] = if tampered[idx] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(tampered).unwrap();

        assert!(matches!(
            codec.decode(&tampered, 60),
            Err(SessionError::Authentication)
        ));
        assert!(matches!(
            codec.decode("not base64!", 60),
            Err(SessionError::Authentication)
        ));
    }

    #[test]
    fn rejects_expired_payloads() {
        let codec = CookieCodec::new(b"block key", b"hash key", "session");
        let issued = OffsetDateTime::now_utc().unix_timestamp() - 120;
        let encoded = codec.encode_at(&sample_data(), issued).unwrap();

        assert!(matches!(
            codec.decode(&encoded, 60),
            Err(SessionError::Expired)
        ));
        assert_eq!(codec.decode(&encoded, 0).unwrap(), sample_data());
        assert_eq!(codec.decode(&encoded, 300).unwrap(), sample_data());
    }
}
