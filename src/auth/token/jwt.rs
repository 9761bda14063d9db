//! Unverified JWT payload inspection.
//!
//! The session store only needs the `exp` claim of an access token as a fallback
//! expiry. The signature is not checked; the value is never used for authorization.
//! Encrypted tokens (compact JWE) are opened only for direct symmetric encryption
//! (`alg: dir`) with AES-GCM content encryption.

// crates.io
use aes_gcm::{
	Aes128Gcm, Aes256Gcm, Nonce,
	aead::{Aead, KeyInit, Payload},
};
use base64::{
	Engine as _,
	engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
// self
use crate::{_prelude::*, auth::TokenSecret};

const GCM_NONCE_LEN: usize = 12;

#[derive(Deserialize)]
struct ExpiryClaims {
	exp: Option<i64>,
}

#[derive(Deserialize)]
struct JweHeader {
	alg: String,
	enc: String,
	zip: Option<String>,
}

/// Reads the `exp` claim of a compact JWS, or of a compact JWE that `decryption_key` opens.
///
/// `decryption_key` is the base64-encoded symmetric content encryption key. Returns `None`
/// for opaque tokens, malformed payloads, encrypted tokens that cannot be opened, or a
/// missing claim.
pub fn unverified_expiry(token: &str, decryption_key: Option<&TokenSecret>) -> Option<OffsetDateTime> {
	match token.split('.').collect::<Vec<_>>().as_slice() {
		[_header, payload, _signature] => claims_expiry(&decode_segment(payload)?),
		[header, encrypted_key, iv, ciphertext, tag] => {
			let Some(key) = decryption_key else {
				tracing::debug!("Encrypted access token without a decryption key; expiry is unknown.");

				return None;
			};
			let plaintext = decrypt(header, encrypted_key, iv, ciphertext, tag, key)?;

			match std::str::from_utf8(&plaintext) {
				Ok(nested) if nested.split('.').count() == 3 => unverified_expiry(nested, None),
				_ => claims_expiry(&plaintext),
			}
		},
		_ => None,
	}
}

fn claims_expiry(bytes: &[u8]) -> Option<OffsetDateTime> {
	let claims = serde_json::from_slice::<ExpiryClaims>(bytes).ok()?;

	OffsetDateTime::from_unix_timestamp(claims.exp?).ok()
}

fn decode_segment(segment: &str) -> Option<Vec<u8>> {
	URL_SAFE_NO_PAD.decode(segment.trim_end_matches('=')).ok()
}

fn decrypt(
	header: &str,
	encrypted_key: &str,
	iv: &str,
	ciphertext: &str,
	tag: &str,
	key: &TokenSecret,
) -> Option<Vec<u8>> {
	let parsed = serde_json::from_slice::<JweHeader>(&decode_segment(header)?).ok()?;

	if parsed.alg != "dir" || !encrypted_key.is_empty() || parsed.zip.is_some() {
		tracing::debug!(alg = %parsed.alg, enc = %parsed.enc, "Unsupported JWE; expiry is unknown.");

		return None;
	}

	let key = STANDARD.decode(key.expose().trim()).ok()?;
	let iv = decode_segment(iv)?;

	if iv.len() != GCM_NONCE_LEN {
		return None;
	}

	let mut sealed = decode_segment(ciphertext)?;

	sealed.extend(decode_segment(tag)?);

	let nonce = Nonce::from_slice(&iv);
	// The protected header segment, as sent, is the additional authenticated data.
	let payload = Payload { msg: &sealed, aad: header.as_bytes() };
	let opened = match parsed.enc.as_str() {
		"A128GCM" => Aes128Gcm::new_from_slice(&key).ok()?.decrypt(nonce, payload),
		"A256GCM" => Aes256Gcm::new_from_slice(&key).ok()?.decrypt(nonce, payload),
		other => {
			tracing::debug!(enc = other, "Unsupported JWE content encryption; expiry is unknown.");

			return None;
		},
	};

	opened.inspect_err(|_| tracing::warn!("Unable to decrypt the encrypted access token.")).ok()
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	const KEY: [u8; 32] = [42; 32];

	fn jwt(payload: &str) -> String {
		format!("eyJhbGciOiJub25lIn0.{}.sig", URL_SAFE_NO_PAD.encode(payload))
	}

	fn jwe(header: &str, key: &[u8], plaintext: &str) -> String {
		let header = URL_SAFE_NO_PAD.encode(header);
		let iv = [7_u8; GCM_NONCE_LEN];
		let payload = Payload { msg: plaintext.as_bytes(), aad: header.as_bytes() };
		let sealed = match key.len() {
			16 => Aes128Gcm::new_from_slice(key)
				.expect("Test key should be valid.")
				.encrypt(Nonce::from_slice(&iv), payload),
			_ => Aes256Gcm::new_from_slice(key)
				.expect("Test key should be valid.")
				.encrypt(Nonce::from_slice(&iv), payload),
		}
		.expect("Test payload should encrypt.");
		let (ciphertext, tag) = sealed.split_at(sealed.len() - 16);

		format!(
			"{header}..{}.{}.{}",
			URL_SAFE_NO_PAD.encode(iv),
			URL_SAFE_NO_PAD.encode(ciphertext),
			URL_SAFE_NO_PAD.encode(tag)
		)
	}

	fn key_secret(key: &[u8]) -> TokenSecret {
		TokenSecret::new(STANDARD.encode(key))
	}

	#[test]
	fn reads_exp_claim() {
		let token = jwt("{\"sub\":\"user-1\",\"exp\":1735693200}");

		assert_eq!(unverified_expiry(&token, None), Some(macros::datetime!(2025-01-01 01:00 UTC)));
	}

	#[test]
	fn opaque_or_malformed_tokens_have_no_expiry() {
		assert_eq!(unverified_expiry("opaque-token", None), None);
		assert_eq!(unverified_expiry("a.b", None), None);
		assert_eq!(unverified_expiry("a.b.c.d", None), None);
		assert_eq!(unverified_expiry("a.!!!.c", None), None);
		assert_eq!(unverified_expiry(&jwt("{\"sub\":\"user-1\"}"), None), None);
		assert_eq!(unverified_expiry(&jwt("not json"), None), None);
	}

	#[test]
	fn encrypted_tokens_open_with_the_configured_key() {
		let nested = jwt("{\"exp\":1735693200}");
		let token = jwe(r#"{"alg":"dir","enc":"A256GCM","cty":"JWT"}"#, &KEY, &nested);

		assert_eq!(
			unverified_expiry(&token, Some(&key_secret(&KEY))),
			Some(macros::datetime!(2025-01-01 01:00 UTC))
		);

		let short_key = [9_u8; 16];
		let claims = jwe(r#"{"alg":"dir","enc":"A128GCM"}"#, &short_key, "{\"exp\":1735693200}");

		assert_eq!(
			unverified_expiry(&claims, Some(&key_secret(&short_key))),
			Some(macros::datetime!(2025-01-01 01:00 UTC))
		);
	}

	#[test]
	fn encrypted_tokens_without_a_usable_key_have_no_expiry() {
		let token = jwe(r#"{"alg":"dir","enc":"A256GCM"}"#, &KEY, "{\"exp\":1735693200}");

		assert_eq!(unverified_expiry(&token, None), None);
		assert_eq!(unverified_expiry(&token, Some(&key_secret(&[1; 32]))), None);
		assert_eq!(unverified_expiry(&token, Some(&TokenSecret::new("not base64!"))), None);

		let wrapped = jwe(r#"{"alg":"A256KW","enc":"A256GCM"}"#, &KEY, "{\"exp\":1735693200}");

		assert_eq!(unverified_expiry(&wrapped, Some(&key_secret(&KEY))), None);
	}
}
