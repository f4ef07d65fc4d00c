//! # Hosted Identity Provider
//!
//! Client for the user pool behind the vault's sign-in. Two paths produce a
//! session:
//!
//! - **Hosted UI redirect**: the browser is sent to `/oauth2/authorize`
//!   (Google as social provider, authorization-code flow) and comes back to
//!   the entry route with `?code=..&state=..`, which is exchanged at
//!   `/oauth2/token`.
//! - **Password**: `InitiateAuth` with `USER_PASSWORD_AUTH`, plus `SignUp`
//!   and `ConfirmSignUp` for new accounts.
//!
//! The user record is read from the ID token claims. Tokens are received
//! directly from the provider over TLS, so the claims are decoded without
//! re-verifying the signature.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use worker::wasm_bindgen::JsValue;
use worker::{Fetch, Headers, Method, Request, RequestInit, Url};

use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::models::{TokenSet, UserRecord};

/// One field of the sign-up form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormField {
    pub name: &'static str,
    pub label: &'static str,
    pub placeholder: &'static str,
    pub input_type: &'static str,
    pub required: bool,
    pub order: u8,
}

/// Sign-up fields in display order.
pub const SIGN_UP_FIELDS: [FormField; 5] = [
    FormField {
        name: "username",
        label: "Username",
        placeholder: "Enter your username",
        input_type: "text",
        required: true,
        order: 1,
    },
    FormField {
        name: "name",
        label: "Name",
        placeholder: "Enter full name",
        input_type: "text",
        required: true,
        order: 2,
    },
    FormField {
        name: "email",
        label: "Email",
        placeholder: "Enter your email",
        input_type: "email",
        required: true,
        order: 3,
    },
    FormField {
        name: "password",
        label: "Password",
        placeholder: "Enter your password",
        input_type: "password",
        required: true,
        order: 4,
    },
    FormField {
        name: "confirm_password",
        label: "Confirm Password",
        placeholder: "Please confirm your password",
        input_type: "password",
        required: true,
        order: 5,
    },
];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignUpForm {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignUpForm {
    /// Builds the form from submitted `(name, value)` pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, String)>) -> Self {
        let mut form = Self::default();
        for (name, value) in pairs {
            match name {
                "username" => form.username = value.trim().to_string(),
                "name" => form.name = value.trim().to_string(),
                "email" => form.email = value.trim().to_string(),
                "password" => form.password = value,
                "confirm_password" => form.confirm_password = value,
                _ => {}
            }
        }
        form
    }

    pub fn validate(&self) -> AppResult<()> {
        for field in SIGN_UP_FIELDS.iter().filter(|field| field.required) {
            if self.value(field.name).trim().is_empty() {
                return Err(AppError::BadRequest(format!("{} is required", field.label)));
            }
        }
        if self.username.contains('/') {
            return Err(AppError::BadRequest(
                "Username must not contain '/'".to_string(),
            ));
        }
        if !self.email.contains('@') {
            return Err(AppError::BadRequest("Email is not valid".to_string()));
        }
        if self.password != self.confirm_password {
            return Err(AppError::BadRequest("Your passwords must match".to_string()));
        }
        Ok(())
    }

    fn value(&self, name: &str) -> &str {
        match name {
            "username" => &self.username,
            "name" => &self.name,
            "email" => &self.email,
            "password" => &self.password,
            "confirm_password" => &self.confirm_password,
            _ => "",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub confirmed: bool,
    /// Masked destination of the confirmation code, e.g. `a***@e***.com`.
    pub code_destination: Option<String>,
}

#[async_trait(?Send)]
pub trait IdentityProvider {
    /// Exchanges an authorization code from the hosted UI for tokens.
    async fn exchange_code(&self, code: &str) -> AppResult<TokenSet>;

    async fn sign_in(&self, username: &str, password: &str) -> AppResult<TokenSet>;

    async fn sign_up(&self, form: &SignUpForm) -> AppResult<SignUpOutcome>;

    async fn confirm_sign_up(&self, username: &str, code: &str) -> AppResult<()>;
}

/// Hosted-UI authorize URL. `identity_provider` skips the provider chooser.
pub fn authorize_url(
    config: &Config,
    state: &str,
    identity_provider: Option<&str>,
) -> AppResult<Url> {
    let mut url = Url::parse(&format!("{}/oauth2/authorize", config.hosted_ui_base()))
        .map_err(|e| AppError::Config(format!("invalid cognito_domain: {}", e)))?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("response_type", "code")
            .append_pair("client_id", &config.user_pool_client_id)
            .append_pair("redirect_uri", &config.redirect_sign_in)
            .append_pair("scope", &config.oauth_scopes.join(" "))
            .append_pair("state", state);
        if let Some(provider) = identity_provider {
            query.append_pair("identity_provider", provider);
        }
    }
    Ok(url)
}

/// Hosted-UI logout URL; clears the provider's own session cookie.
pub fn sign_out_url(config: &Config) -> AppResult<Url> {
    Url::parse_with_params(
        &format!("{}/logout", config.hosted_ui_base()),
        &[
            ("client_id", config.user_pool_client_id.as_str()),
            ("logout_uri", config.redirect_sign_out.as_str()),
        ],
    )
    .map_err(|e| AppError::Config(format!("invalid cognito_domain: {}", e)))
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    #[serde(rename = "cognito:username")]
    username: Option<String>,
    name: Option<String>,
    picture: Option<String>,
    email: Option<String>,
}

/// Reads the user record from the ID token. A token without a username is
/// an unknown identity.
pub fn user_from_tokens(tokens: &TokenSet) -> AppResult<UserRecord> {
    let payload = tokens
        .id_token
        .split('.')
        .nth(1)
        .ok_or_else(|| AppError::UnknownIdentity("malformed ID token".to_string()))?;
    let decoded = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| AppError::UnknownIdentity("ID token payload is not base64".to_string()))?;
    let claims: IdTokenClaims = serde_json::from_slice(&decoded)
        .map_err(|e| AppError::UnknownIdentity(format!("unreadable ID token claims: {}", e)))?;

    let username = claims
        .username
        .filter(|username| !username.trim().is_empty())
        .ok_or_else(|| AppError::UnknownIdentity("ID token has no username".to_string()))?;

    Ok(UserRecord {
        username,
        display_name: claims.name,
        picture: claims.picture,
        email: claims.email,
    })
}

/// `SECRET_HASH` required by app clients that have a secret.
pub fn secret_hash(username: &str, client_id: &str, client_secret: &str) -> AppResult<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(client_secret.as_bytes())
        .map_err(|_| AppError::Config("unusable client secret".to_string()))?;
    mac.update(username.as_bytes());
    mac.update(client_id.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    id_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

impl TokenEndpointResponse {
    fn into_tokens(self, now: DateTime<Utc>) -> TokenSet {
        TokenSet {
            access_token: self.access_token,
            id_token: self.id_token,
            refresh_token: self.refresh_token,
            expires_at: now + Duration::seconds(self.expires_in),
        }
    }
}

/// Parses an `InitiateAuth` response into tokens.
fn parse_auth_result(body: &Value, now: DateTime<Utc>) -> AppResult<TokenSet> {
    if let Some(challenge) = body.get("ChallengeName").and_then(Value::as_str) {
        return Err(AppError::Unauthorized(format!(
            "sign-in requires an unsupported challenge: {}",
            challenge
        )));
    }
    let result = body
        .get("AuthenticationResult")
        .ok_or_else(|| AppError::Backend("InitiateAuth returned no tokens".to_string()))?;
    let field = |name: &str| {
        result
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AppError::Backend(format!("InitiateAuth result is missing {}", name)))
    };

    Ok(TokenSet {
        access_token: field("AccessToken")?,
        id_token: field("IdToken")?,
        refresh_token: field("RefreshToken").ok(),
        expires_at: now
            + Duration::seconds(
                result
                    .get("ExpiresIn")
                    .and_then(Value::as_i64)
                    .unwrap_or(3600),
            ),
    })
}

/// Maps an error response of the provider to the vault's taxonomy.
pub fn map_identity_error(status: u16, body: &str) -> AppError {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let kind = parsed
        .get("__type")
        .or_else(|| parsed.get("error"))
        .and_then(Value::as_str)
        .unwrap_or("");
    // `__type` may carry a namespace prefix ending in '#'.
    let kind = kind.rsplit('#').next().unwrap_or(kind);
    let message = parsed
        .get("message")
        .or_else(|| parsed.get("error_description"))
        .and_then(Value::as_str)
        .unwrap_or(kind)
        .to_string();

    match kind {
        "NotAuthorizedException"
        | "UserNotFoundException"
        | "UserNotConfirmedException"
        | "PasswordResetRequiredException"
        | "invalid_grant"
        | "unauthorized_client" => AppError::Unauthorized(message),
        "UsernameExistsException"
        | "InvalidPasswordException"
        | "InvalidParameterException"
        | "CodeMismatchException"
        | "ExpiredCodeException"
        | "invalid_request" => AppError::BadRequest(message),
        _ => AppError::Backend(format!(
            "identity provider returned {}: {}",
            status,
            summarize_response_body(body)
        )),
    }
}

fn summarize_response_body(body: &str) -> String {
    let preview: String = body.chars().take(120).collect();
    format!("len={}, body={}", body.len(), preview)
}

/// [`IdentityProvider`] backed by the user pool over `fetch`.
pub struct CognitoClient {
    config: Arc<Config>,
}

impl CognitoClient {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    fn secret_hash_for(&self, username: &str) -> AppResult<Option<String>> {
        self.config
            .client_secret
            .as_deref()
            .map(|secret| secret_hash(username, &self.config.user_pool_client_id, secret))
            .transpose()
    }

    async fn post(&self, url: &str, headers: Headers, body: String) -> AppResult<(u16, String)> {
        let mut init = RequestInit::new();
        init.with_method(Method::Post)
            .with_headers(headers)
            .with_body(Some(JsValue::from_str(&body)));
        let request = Request::new_with_init(url, &init)?;
        let mut response = Fetch::Request(request)
            .send()
            .await
            .map_err(|e| AppError::Backend(format!("identity provider unreachable: {}", e)))?;
        let status = response.status_code();
        let text = response.text().await?;
        Ok((status, text))
    }

    /// Calls one `AWSCognitoIdentityProviderService` action.
    async fn call(&self, action: &str, payload: Value) -> AppResult<Value> {
        let headers = Headers::new();
        headers.set("Content-Type", "application/x-amz-json-1.1")?;
        headers.set(
            "X-Amz-Target",
            &format!("AWSCognitoIdentityProviderService.{}", action),
        )?;

        let (status, text) = self
            .post(&self.config.identity_api_endpoint(), headers, payload.to_string())
            .await?;
        if !(200..300).contains(&status) {
            return Err(map_identity_error(status, &text));
        }
        serde_json::from_str(&text)
            .map_err(|e| AppError::Backend(format!("unreadable {} response: {}", action, e)))
    }
}

#[async_trait(?Send)]
impl IdentityProvider for CognitoClient {
    async fn exchange_code(&self, code: &str) -> AppResult<TokenSet> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "authorization_code")
            .append_pair("client_id", &self.config.user_pool_client_id)
            .append_pair("code", code)
            .append_pair("redirect_uri", &self.config.redirect_sign_in)
            .finish();

        let headers = Headers::new();
        headers.set("Content-Type", "application/x-www-form-urlencoded")?;
        if let Some(secret) = &self.config.client_secret {
            let credentials = BASE64.encode(format!(
                "{}:{}",
                self.config.user_pool_client_id, secret
            ));
            headers.set("Authorization", &format!("Basic {}", credentials))?;
        }

        let url = format!("{}/oauth2/token", self.config.hosted_ui_base());
        let (status, text) = self.post(&url, headers, body).await?;
        if !(200..300).contains(&status) {
            return Err(map_identity_error(status, &text));
        }

        let response: TokenEndpointResponse = serde_json::from_str(&text)
            .map_err(|e| AppError::Backend(format!("unreadable token response: {}", e)))?;
        Ok(response.into_tokens(Utc::now()))
    }

    async fn sign_in(&self, username: &str, password: &str) -> AppResult<TokenSet> {
        let mut parameters = json!({
            "USERNAME": username,
            "PASSWORD": password,
        });
        if let Some(hash) = self.secret_hash_for(username)? {
            parameters["SECRET_HASH"] = Value::String(hash);
        }

        let body = self
            .call(
                "InitiateAuth",
                json!({
                    "AuthFlow": "USER_PASSWORD_AUTH",
                    "ClientId": self.config.user_pool_client_id,
                    "AuthParameters": parameters,
                }),
            )
            .await?;
        parse_auth_result(&body, Utc::now())
    }

    async fn sign_up(&self, form: &SignUpForm) -> AppResult<SignUpOutcome> {
        form.validate()?;

        let mut payload = json!({
            "ClientId": self.config.user_pool_client_id,
            "Username": form.username,
            "Password": form.password,
            "UserAttributes": [
                { "Name": "name", "Value": form.name },
                { "Name": "email", "Value": form.email },
            ],
        });
        if let Some(hash) = self.secret_hash_for(&form.username)? {
            payload["SecretHash"] = Value::String(hash);
        }

        let body = self.call("SignUp", payload).await?;
        Ok(SignUpOutcome {
            confirmed: body
                .get("UserConfirmed")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            code_destination: body
                .pointer("/CodeDeliveryDetails/Destination")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    async fn confirm_sign_up(&self, username: &str, code: &str) -> AppResult<()> {
        let mut payload = json!({
            "ClientId": self.config.user_pool_client_id,
            "Username": username,
            "ConfirmationCode": code.trim(),
        });
        if let Some(hash) = self.secret_hash_for(username)? {
            payload["SecretHash"] = Value::String(hash);
        }
        self.call("ConfirmSignUp", payload).await?;
        Ok(())
    }
}
