// Auth0 Gateway Configuration
// Overridable hooks and values, normalized once when a webtask is wrapped

use axum::{
    http::{header, request::Parts},
    response::Response,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::error::LoginError;
use super::params::{ParamFn, ParamSources};
use super::responses::{default_login_error, default_login_success};
use super::token::{
    ApiKeyValidator, CreateTokenFn, JwtTokenValidator, LoginTokens, TokenValidator, api_key_creator,
};
use crate::context::WebtaskContext;
use crate::error::WebtaskError;
use crate::routing::{RoutingInfo, parse_query_string};

pub const CLIENT_ID_SECRET: &str = "AUTH0_CLIENT_ID";
pub const CLIENT_SECRET_SECRET: &str = "AUTH0_CLIENT_SECRET";
pub const DOMAIN_SECRET: &str = "AUTH0_DOMAIN";
pub const SECRET_ENCODING_SECRET: &str = "AUTH0_SECRET_ENCODING";
pub const WEBTASK_SECRET: &str = "WEBTASK_SECRET";

pub type RequestPredicate = Arc<dyn Fn(&WebtaskContext, &Parts) -> bool + Send + Sync>;
pub type PathPredicate = Arc<dyn Fn(&WebtaskContext, &Parts, &str) -> bool + Send + Sync>;
pub type TokenExtractor = Arc<dyn Fn(&WebtaskContext, &Parts) -> Option<String> + Send + Sync>;
pub type LoginSuccessFn = Arc<dyn Fn(&WebtaskContext, &Parts, &str) -> Response + Send + Sync>;
pub type LoginErrorFn =
    Arc<dyn Fn(LoginError, &WebtaskContext, &Parts, &str) -> Response + Send + Sync>;
pub type ReturnStateFn =
    Arc<dyn Fn(&WebtaskContext, &Parts, &RoutingInfo, &str) -> Option<Value> + Send + Sync>;

/// Who may call the webtask once authenticated
#[derive(Clone)]
pub enum Authorized {
    /// Verified e-mail addresses, or `@domain` suffixes
    Emails(Vec<String>),
    Predicate(RequestPredicate),
}

impl From<&str> for Authorized {
    fn from(value: &str) -> Self {
        Authorized::Emails(vec![value.to_string()])
    }
}

impl From<String> for Authorized {
    fn from(value: String) -> Self {
        Authorized::Emails(vec![value])
    }
}

impl From<Vec<String>> for Authorized {
    fn from(value: Vec<String>) -> Self {
        Authorized::Emails(value)
    }
}

impl From<Vec<&str>> for Authorized {
    fn from(value: Vec<&str>) -> Self {
        Authorized::Emails(value.into_iter().map(str::to_string).collect())
    }
}

/// App paths served without authentication
#[derive(Clone)]
pub enum Exclude {
    Paths(Vec<String>),
    Predicate(PathPredicate),
}

impl From<&str> for Exclude {
    fn from(value: &str) -> Self {
        Exclude::Paths(vec![value.to_string()])
    }
}

impl From<String> for Exclude {
    fn from(value: String) -> Self {
        Exclude::Paths(vec![value])
    }
}

impl From<Vec<String>> for Exclude {
    fn from(value: Vec<String>) -> Self {
        Exclude::Paths(value)
    }
}

impl From<Vec<&str>> for Exclude {
    fn from(value: Vec<&str>) -> Self {
        Exclude::Paths(value.into_iter().map(str::to_string).collect())
    }
}

/// Options of the Auth0 gateway. Every field is optional and defaulted
/// independently when the webtask is wrapped.
#[derive(Clone, Default)]
pub struct Auth0Options {
    pub exclude: Option<Exclude>,
    pub authorized: Option<Authorized>,
    pub get_access_token: Option<TokenExtractor>,
    pub validate_token: Option<Arc<dyn TokenValidator>>,
    pub login_success: Option<LoginSuccessFn>,
    pub login_error: Option<LoginErrorFn>,
    pub client_id: Option<ParamFn>,
    pub client_secret: Option<ParamFn>,
    pub domain: Option<ParamFn>,
    pub secret_encoding: Option<ParamFn>,
    pub audience: Option<ParamFn>,
    pub create_token: Option<CreateTokenFn>,
    /// Scopes requested in addition to `openid name email email_verified`
    pub scope: Option<String>,
    /// State persisted in a cookie when an unauthenticated GET is sent to login
    pub return_state: Option<ReturnStateFn>,
    pub webtask_secret: Option<ParamFn>,
    /// Issue webtask-signed API keys at login and accept them as bearer tokens
    pub api_keys: bool,
}

impl fmt::Debug for Auth0Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth0Options")
            .field("exclude", &self.exclude.is_some())
            .field("authorized", &self.authorized.is_some())
            .field("scope", &self.scope)
            .field("api_keys", &self.api_keys)
            .finish_non_exhaustive()
    }
}

impl Auth0Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn authorized(mut self, authorized: impl Into<Authorized>) -> Self {
        self.authorized = Some(authorized.into());
        self
    }

    pub fn authorized_fn(
        mut self,
        predicate: impl Fn(&WebtaskContext, &Parts) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.authorized = Some(Authorized::Predicate(Arc::new(predicate)));
        self
    }

    pub fn exclude(mut self, exclude: impl Into<Exclude>) -> Self {
        self.exclude = Some(exclude.into());
        self
    }

    pub fn exclude_fn(
        mut self,
        predicate: impl Fn(&WebtaskContext, &Parts, &str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.exclude = Some(Exclude::Predicate(Arc::new(predicate)));
        self
    }

    pub fn get_access_token(
        mut self,
        extractor: impl Fn(&WebtaskContext, &Parts) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.get_access_token = Some(Arc::new(extractor));
        self
    }

    pub fn validate_token(mut self, validator: impl TokenValidator + 'static) -> Self {
        self.validate_token = Some(Arc::new(validator));
        self
    }

    pub fn login_success(
        mut self,
        responder: impl Fn(&WebtaskContext, &Parts, &str) -> Response + Send + Sync + 'static,
    ) -> Self {
        self.login_success = Some(Arc::new(responder));
        self
    }

    pub fn login_error(
        mut self,
        responder: impl Fn(LoginError, &WebtaskContext, &Parts, &str) -> Response + Send + Sync + 'static,
    ) -> Self {
        self.login_error = Some(Arc::new(responder));
        self
    }

    pub fn client_id(
        mut self,
        source: impl Fn(&WebtaskContext, &Parts) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.client_id = Some(Arc::new(source));
        self
    }

    pub fn client_secret(
        mut self,
        source: impl Fn(&WebtaskContext, &Parts) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.client_secret = Some(Arc::new(source));
        self
    }

    pub fn domain(
        mut self,
        source: impl Fn(&WebtaskContext, &Parts) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.domain = Some(Arc::new(source));
        self
    }

    pub fn secret_encoding(
        mut self,
        source: impl Fn(&WebtaskContext, &Parts) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.secret_encoding = Some(Arc::new(source));
        self
    }

    pub fn audience(
        mut self,
        source: impl Fn(&WebtaskContext, &Parts) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.audience = Some(Arc::new(source));
        self
    }

    pub fn create_token(
        mut self,
        hook: impl Fn(&WebtaskContext, &Parts, &LoginTokens<'_>) -> Result<String, LoginError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.create_token = Some(Arc::new(hook));
        self
    }

    pub fn return_state(
        mut self,
        hook: impl Fn(&WebtaskContext, &Parts, &RoutingInfo, &str) -> Option<Value>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.return_state = Some(Arc::new(hook));
        self
    }

    pub fn webtask_secret(
        mut self,
        source: impl Fn(&WebtaskContext, &Parts) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.webtask_secret = Some(Arc::new(source));
        self
    }

    /// Issue API keys signed with the webtask secret instead of handing out the id_token
    pub fn issue_api_keys(mut self) -> Self {
        self.api_keys = true;
        self
    }

    /// Check values the type system cannot, then fill in every default
    pub(crate) fn resolve(self) -> Result<ResolvedOptions, WebtaskError> {
        self.validate()?;

        let sources = ParamSources {
            client_id: self.client_id.unwrap_or_else(|| secret_param(CLIENT_ID_SECRET)),
            client_secret: self
                .client_secret
                .unwrap_or_else(|| secret_param(CLIENT_SECRET_SECRET)),
            domain: self.domain.unwrap_or_else(|| secret_param(DOMAIN_SECRET)),
            secret_encoding: self.secret_encoding.unwrap_or_else(|| {
                Arc::new(|ctx: &WebtaskContext, _: &Parts| {
                    Some(ctx.secret(SECRET_ENCODING_SECRET).unwrap_or("base64").to_string())
                })
            }),
            audience: self.audience,
        };
        let webtask_secret = self
            .webtask_secret
            .unwrap_or_else(|| secret_param(WEBTASK_SECRET));

        let default_create: CreateTokenFn = if self.api_keys {
            api_key_creator(webtask_secret.clone())
        } else {
            Arc::new(
                |_: &WebtaskContext, _: &Parts, tokens: &LoginTokens<'_>| -> Result<String, LoginError> {
                    Ok(tokens.id_token.to_string())
                },
            )
        };
        let default_validator: Arc<dyn TokenValidator> = if self.api_keys {
            Arc::new(ApiKeyValidator::new(webtask_secret))
        } else {
            Arc::new(JwtTokenValidator::new(sources.clone()))
        };

        Ok(ResolvedOptions {
            exclude: self.exclude.map(exclude_predicate),
            authorized: self.authorized.map(authorized_predicate),
            get_access_token: self
                .get_access_token
                .unwrap_or_else(|| Arc::new(default_access_token)),
            validate_token: self.validate_token.unwrap_or(default_validator),
            login_success: self
                .login_success
                .unwrap_or_else(|| Arc::new(default_login_success)),
            login_error: self
                .login_error
                .unwrap_or_else(|| Arc::new(default_login_error)),
            create_token: self.create_token.unwrap_or(default_create),
            scope: self.scope.filter(|s| !s.trim().is_empty()),
            return_state: self.return_state,
            sources,
        })
    }

    fn validate(&self) -> Result<(), WebtaskError> {
        if let Some(scope) = &self.scope {
            if scope.chars().any(char::is_control) {
                return Err(WebtaskError::config(
                    "The scope option must be a space separated list of scopes.",
                ));
            }
        }

        if let Some(Authorized::Emails(entries)) = &self.authorized {
            if entries.iter().any(|e| e.trim().is_empty() || e.trim() == "@") {
                return Err(WebtaskError::config(
                    "The authorized option must list e-mail addresses or @domain names; entries cannot be empty.",
                ));
            }
        }

        if let Some(Exclude::Paths(paths)) = &self.exclude {
            if paths.iter().any(|p| !p.starts_with('/')) {
                return Err(WebtaskError::config(
                    "The exclude option must list URL paths starting with '/'.",
                ));
            }
        }

        Ok(())
    }
}

/// Options with every hook in place
#[derive(Clone)]
pub(crate) struct ResolvedOptions {
    pub exclude: Option<PathPredicate>,
    pub authorized: Option<RequestPredicate>,
    pub get_access_token: TokenExtractor,
    pub validate_token: Arc<dyn TokenValidator>,
    pub login_success: LoginSuccessFn,
    pub login_error: LoginErrorFn,
    pub create_token: CreateTokenFn,
    pub scope: Option<String>,
    pub return_state: Option<ReturnStateFn>,
    pub sources: ParamSources,
}

fn secret_param(name: &'static str) -> ParamFn {
    Arc::new(move |ctx: &WebtaskContext, _: &Parts| ctx.secret(name).map(str::to_string))
}

/// `Authorization: Bearer <token>`, else the `access_token` query parameter
pub fn default_access_token(_ctx: &WebtaskContext, parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

    bearer.or_else(|| {
        parse_query_string(parts.uri.query().unwrap_or_default())
            .remove("access_token")
            .filter(|token| !token.is_empty())
    })
}

fn authorized_predicate(authorized: Authorized) -> RequestPredicate {
    match authorized {
        Authorized::Predicate(predicate) => predicate,
        Authorized::Emails(entries) => {
            let entries: Vec<String> = entries.iter().map(|e| e.trim().to_lowercase()).collect();
            Arc::new(move |ctx: &WebtaskContext, _: &Parts| {
                ctx.user.as_ref().is_some_and(|user| email_allowed(user, &entries))
            })
        }
    }
}

/// Verified e-mail equal to an entry, or ending with an `@domain` entry
pub fn email_allowed(user: &Value, entries: &[String]) -> bool {
    if user.get("email_verified").and_then(Value::as_bool) != Some(true) {
        return false;
    }
    let Some(email) = user.get("email").and_then(Value::as_str) else {
        return false;
    };
    let email = email.to_lowercase();

    entries
        .iter()
        .any(|entry| email == *entry || (entry.starts_with('@') && email.ends_with(entry.as_str())))
}

fn exclude_predicate(exclude: Exclude) -> PathPredicate {
    match exclude {
        Exclude::Predicate(predicate) => predicate,
        Exclude::Paths(paths) => Arc::new(move |_: &WebtaskContext, _: &Parts, app_path: &str| {
            paths.iter().any(|p| p == app_path)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;

    fn parts(uri: &str, authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header("Authorization", value);
        }
        builder.body(Body::empty()).unwrap().into_parts().0
    }

    fn with_user(user: Value) -> WebtaskContext {
        WebtaskContext {
            user: Some(user),
            ..Default::default()
        }
    }

    #[test]
    fn test_authorized_list_matching() {
        let options = Auth0Options::new()
            .authorized(vec!["bob@example.com", "@corp.example"])
            .resolve()
            .unwrap();
        let authorized = options.authorized.unwrap();
        let p = parts("/", None);

        assert!(authorized(
            &with_user(json!({"email": "Bob@Example.com", "email_verified": true})),
            &p
        ));
        assert!(authorized(
            &with_user(json!({"email": "alice@corp.example", "email_verified": true})),
            &p
        ));
        assert!(!authorized(
            &with_user(json!({"email": "alice@other.example", "email_verified": true})),
            &p
        ));
        assert!(!authorized(
            &with_user(json!({"email": "bob@example.com", "email_verified": false})),
            &p
        ));
        assert!(!authorized(
            &with_user(json!({"email": "bob@example.com"})),
            &p
        ));
        assert!(!authorized(&WebtaskContext::default(), &p));
    }

    #[test]
    fn test_authorized_single_string() {
        let options = Auth0Options::new().authorized("@example.com").resolve().unwrap();
        let authorized = options.authorized.unwrap();
        assert!(authorized(
            &with_user(json!({"email": "ANY@EXAMPLE.COM", "email_verified": true})),
            &parts("/", None)
        ));
    }

    #[test]
    fn test_exclude_list() {
        let options = Auth0Options::new()
            .exclude(vec!["/public", "/health"])
            .resolve()
            .unwrap();
        let exclude = options.exclude.unwrap();
        let ctx = WebtaskContext::default();
        let p = parts("/", None);

        assert!(exclude(&ctx, &p, "/public"));
        assert!(exclude(&ctx, &p, "/health"));
        assert!(!exclude(&ctx, &p, "/private"));
    }

    #[test]
    fn test_invalid_options_rejected() {
        assert!(Auth0Options::new().authorized(vec!["ok@example.com", ""]).resolve().is_err());
        assert!(Auth0Options::new().authorized("@").resolve().is_err());
        assert!(Auth0Options::new().exclude("public").resolve().is_err());
        assert!(Auth0Options::new().scope("read\nwrite").resolve().is_err());

        let err = Auth0Options::new().exclude("public").resolve().err().unwrap();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_default_access_token() {
        let ctx = WebtaskContext::default();
        assert_eq!(
            default_access_token(&ctx, &parts("/", Some("Bearer abc.def"))),
            Some("abc.def".to_string())
        );
        assert_eq!(
            default_access_token(&ctx, &parts("/?access_token=q1", None)),
            Some("q1".to_string())
        );
        assert_eq!(
            default_access_token(&ctx, &parts("/?access_token=q1", Some("Basic xyz"))),
            Some("q1".to_string())
        );
        assert_eq!(default_access_token(&ctx, &parts("/", None)), None);
    }

    #[test]
    fn test_secret_encoding_defaults_to_base64() {
        let options = Auth0Options::new().resolve().unwrap();
        let encoding = (options.sources.secret_encoding)(&WebtaskContext::default(), &parts("/", None));
        assert_eq!(encoding.as_deref(), Some("base64"));
    }

    #[test]
    fn test_blank_scope_ignored() {
        let options = Auth0Options::new().scope("  ").resolve().unwrap();
        assert!(options.scope.is_none());
    }
}
