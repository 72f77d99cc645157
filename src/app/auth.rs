use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use sqlx::Row;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::error::{require_text, unique_violation, ServiceError, ServiceResult};
use crate::app::users::{user_from_row, USER_COLUMNS};
use crate::domain::user::{RegisteredUser, Role, User};
use crate::infra::db::Db;

const TOKEN_ISSUER: &str = "agora";
const MIN_PASSWORD_LEN: usize = 6;
const MAX_PASSWORD_LEN: usize = 128;
const MAX_USERNAME_LEN: usize = 64;
const MAX_EMAIL_LEN: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: Uuid,
    pub role: Role,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct LoginSession {
    pub access: AccessToken,
    pub user: User,
}

/// Issues and verifies PASETO v4.local access tokens.
#[derive(Clone)]
pub struct TokenSigner {
    key: [u8; 32],
    ttl_minutes: u64,
}

impl TokenSigner {
    pub fn new(key: [u8; 32], ttl_minutes: u64) -> Self {
        Self { key, ttl_minutes }
    }

    pub fn issue(&self, user_id: Uuid, role: Role) -> Result<AccessToken> {
        let duration = std::time::Duration::from_secs(self.ttl_minutes * 60);
        let claims = Claims::new_expires_in(&duration)?;
        self.seal(claims, user_id, role)
    }

    fn seal(&self, mut claims: Claims, user_id: Uuid, role: Role) -> Result<AccessToken> {
        claims.issuer(TOKEN_ISSUER)?;
        claims.audience(TOKEN_ISSUER)?;
        claims.subject(&user_id.to_string())?;
        claims.add_additional("role", role.as_db())?;
        claims.add_additional("typ", "access")?;
        let expires_at = claim_time(&claims, "exp")?;

        let key = SymmetricKey::<V4>::from(&self.key)?;
        let token = local::encrypt(&key, &claims, None, None)?;
        Ok(AccessToken { token, expires_at })
    }

    /// `None` for anything that is not a valid, unexpired access token.
    pub fn verify(&self, token: &str) -> Option<AuthSession> {
        let key = SymmetricKey::<V4>::from(&self.key).ok()?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with(TOKEN_ISSUER);
        rules.validate_audience_with(TOKEN_ISSUER);

        let untrusted = UntrustedToken::<Local, V4>::try_from(token).ok()?;
        let trusted = local::decrypt(&key, &untrusted, &rules, None, None).ok()?;
        let claims = trusted.payload_claims()?;

        if claim_str(claims, "typ") != Some("access") {
            return None;
        }
        let user_id = claim_str(claims, "sub").and_then(|sub| Uuid::parse_str(sub).ok())?;
        let role = claim_str(claims, "role").and_then(Role::from_db)?;
        let issued_at = claim_time(claims, "iat").ok()?;
        let expires_at = claim_time(claims, "exp").ok()?;

        Some(AuthSession {
            user_id,
            role,
            issued_at,
            expires_at,
        })
    }
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
    signer: TokenSigner,
}

impl AuthService {
    pub fn new(db: Db, signer: TokenSigner) -> Self {
        Self { db, signer }
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> ServiceResult<RegisteredUser> {
        let email = normalize_email(email)?;
        let username = require_text("username", username, MAX_USERNAME_LEN)?;
        validate_password(password)?;

        let password_hash = hash_password(password)?;
        let row = sqlx::query(
            "INSERT INTO users (email, username, password_hash) \
             VALUES ($1, $2, $3) \
             RETURNING id, email",
        )
        .bind(&email)
        .bind(&username)
        .bind(password_hash)
        .fetch_one(self.db.pool())
        .await
        .map_err(|err| match unique_violation(&err) {
            Some(constraint) if constraint.contains("username") => {
                ServiceError::conflict("username already taken")
            }
            Some(_) => ServiceError::conflict("email already registered"),
            None => ServiceError::Database(err),
        })?;

        Ok(RegisteredUser {
            id: row.get("id"),
            email: row.get("email"),
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<LoginSession> {
        let row = sqlx::query(&format!(
            "SELECT {}, password_hash FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(self.db.pool())
        .await?;

        let row = row.ok_or(ServiceError::InvalidCredentials)?;
        let password_hash: String = row.get("password_hash");
        if !verify_password(password, &password_hash)? {
            return Err(ServiceError::InvalidCredentials);
        }

        let user = user_from_row(&row)?;
        let access = self.signer.issue(user.id, user.role)?;
        Ok(LoginSession { access, user })
    }

    pub fn issue_access_token(&self, user_id: Uuid, role: Role) -> ServiceResult<AccessToken> {
        Ok(self.signer.issue(user_id, role)?)
    }

    pub fn authenticate_access_token(&self, token: &str) -> Option<AuthSession> {
        self.signer.verify(token)
    }

    pub async fn current_user(&self, user_id: Uuid) -> ServiceResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }
}

fn normalize_email(email: &str) -> ServiceResult<String> {
    let email = require_text("email", email, MAX_EMAIL_LEN)?.to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(ServiceError::validation("email is invalid")),
    }
}

fn validate_password(password: &str) -> ServiceResult<()> {
    let len = password.chars().count();
    if password.trim().is_empty() || len < MIN_PASSWORD_LEN {
        return Err(ServiceError::validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(ServiceError::validation(format!(
            "password must be at most {} characters",
            MAX_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn claim_str<'a>(claims: &'a Claims, name: &str) -> Option<&'a str> {
    claims.get_claim(name).and_then(|value| value.as_str())
}

fn claim_time(claims: &Claims, name: &str) -> Result<OffsetDateTime> {
    let value = claim_str(claims, name).ok_or_else(|| anyhow!("missing {} claim", name))?;
    Ok(OffsetDateTime::parse(value, &Rfc3339)?)
}
