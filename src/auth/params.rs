// Auth0 Application Parameters
// Per-request resolution of client credentials and the identity provider domain

use axum::http::request::Parts;
use base64::{
    Engine,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use std::sync::Arc;

use crate::context::WebtaskContext;
use crate::error::WebtaskError;

/// Resolves one option value from the context and request
pub type ParamFn = Arc<dyn Fn(&WebtaskContext, &Parts) -> Option<String> + Send + Sync>;

/// Accepts padded and unpadded input with non-zero trailing bits
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Where each Auth0 parameter comes from
#[derive(Clone)]
pub struct ParamSources {
    pub client_id: ParamFn,
    pub client_secret: ParamFn,
    pub domain: ParamFn,
    pub secret_encoding: ParamFn,
    /// Falls back to the client id
    pub audience: Option<ParamFn>,
}

/// Fully resolved Auth0 application parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthParams {
    pub client_id: String,
    pub client_secret: String,
    pub domain: String,
    pub secret_encoding: String,
    pub audience: String,
}

impl AuthParams {
    /// Resolve all parameters; `None` unless every one of them is present and non-empty.
    pub fn resolve(sources: &ParamSources, ctx: &WebtaskContext, parts: &Parts) -> Option<Self> {
        let present = |value: Option<String>| value.filter(|v| !v.is_empty());

        let client_id = present((sources.client_id)(ctx, parts));
        let audience = match &sources.audience {
            Some(audience) => present(audience(ctx, parts)),
            None => client_id.clone(),
        };

        match (
            client_id,
            present((sources.client_secret)(ctx, parts)),
            present((sources.domain)(ctx, parts)),
            present((sources.secret_encoding)(ctx, parts)),
            audience,
        ) {
            (
                Some(client_id),
                Some(client_secret),
                Some(domain),
                Some(secret_encoding),
                Some(audience),
            ) => Some(Self {
                client_id,
                client_secret,
                domain,
                secret_encoding,
                audience,
            }),
            _ => None,
        }
    }

    /// Base URL of the identity provider
    pub fn domain_url(&self) -> String {
        domain_url(&self.domain)
    }

    /// Expected `iss` of tokens issued for this application
    pub fn issuer(&self) -> String {
        format!("{}/", self.domain_url())
    }

    /// Client secret as key bytes, decoded per `secret_encoding`
    pub fn secret_bytes(&self) -> Result<Vec<u8>, WebtaskError> {
        decode_secret(&self.client_secret, &self.secret_encoding)
    }
}

/// `https://{domain}`, unless the domain already names a scheme
pub fn domain_url(domain: &str) -> String {
    let domain = domain.trim_end_matches('/');
    if domain.starts_with("https://") || domain.starts_with("http://") {
        domain.to_string()
    } else {
        format!("https://{}", domain)
    }
}

/// Decode a secret string into key bytes using a character encoding name
pub fn decode_secret(secret: &str, encoding: &str) -> Result<Vec<u8>, WebtaskError> {
    match encoding.to_ascii_lowercase().as_str() {
        "base64" | "base64url" => {
            let standard: String = secret
                .chars()
                .map(|c| match c {
                    '-' => '+',
                    '_' => '/',
                    other => other,
                })
                .collect();
            LENIENT_BASE64
                .decode(standard.trim())
                .map_err(|e| WebtaskError::config(format!("Client secret is not valid base64: {}", e)))
        }
        "hex" => decode_hex(secret),
        "utf8" | "utf-8" => Ok(secret.as_bytes().to_vec()),
        "latin1" | "binary" | "ascii" => Ok(secret.chars().map(|c| (c as u32 & 0xff) as u8).collect()),
        other => Err(WebtaskError::config(format!(
            "Unsupported secret encoding \"{}\"",
            other
        ))),
    }
}

fn decode_hex(secret: &str) -> Result<Vec<u8>, WebtaskError> {
    let invalid = || WebtaskError::config("Client secret is not valid hex");
    let secret = secret.trim();
    if secret.len() % 2 != 0 {
        return Err(invalid());
    }

    (0..secret.len())
        .step_by(2)
        .map(|i| {
            secret
                .get(i..i + 2)
                .and_then(|byte| u8::from_str_radix(byte, 16).ok())
                .ok_or_else(invalid)
        })
        .collect()
}
