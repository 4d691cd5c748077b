//! Phone one-time-code sign-in for teachers and admins.
//!
//! A code is only sent to numbers in the teacher roster or the configured
//! admin list. Codes are stored as SHA-256 hashes and are single use. A
//! verified code is exchanged for a bearer session whose role claim decides
//! what the holder may open; admin access is never granted by a URL.

use crate::{
    config::AuthSettings,
    core::validation::{PHONE_MESSAGE, is_six_digit_code, is_ten_digit_phone},
    entities::{OtpCode, Session, Teacher, otp_code, session, teacher},
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const COUNTRY_PREFIX: &str = "+91";

/// Role claim carried by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Teacher,
}

impl Role {
    /// Value stored in `sessions.role`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Teacher => "teacher",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "teacher" => Some(Self::Teacher),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The signed-in caller behind a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub role: Role,
    pub phone: String,
    /// Teacher row for the phone, if the caller is on the roster
    pub teacher_id: Option<i64>,
}

impl Principal {
    /// Fails with `Forbidden` unless the session carries the admin claim.
    pub fn require_admin(&self) -> Result<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }

    /// The caller's teacher id, or `Forbidden` when they are not on the roster.
    pub fn require_teacher(&self) -> Result<i64> {
        self.teacher_id.ok_or(Error::Forbidden)
    }
}

/// A freshly issued session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedSession {
    pub token: String,
    pub role: Role,
    pub teacher_id: Option<i64>,
    pub expires_at: DateTime<Utc>,
}

/// Delivers a plain one-time code to a phone.
///
/// Exactly one delivery attempt is made per request.
pub trait OtpDispatcher: Send + Sync {
    fn dispatch(&self, phone: &str, code: &str) -> Result<()>;
}

/// Writes codes to the log instead of sending them. For development only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingOtpDispatcher;

impl OtpDispatcher for LoggingOtpDispatcher {
    fn dispatch(&self, phone: &str, code: &str) -> Result<()> {
        warn!("SMS delivery not configured; one-time code for {phone} is {code}");
        Ok(())
    }
}

/// Normalises input to `+91XXXXXXXXXX`.
///
/// Spaces are ignored; the input must be ten digits with or without the
/// `+91` prefix.
pub fn normalize_phone(input: &str) -> Result<String> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = compact.strip_prefix(COUNTRY_PREFIX).unwrap_or(&compact);

    if is_ten_digit_phone(digits) {
        Ok(format!("{COUNTRY_PREFIX}{digits}"))
    } else {
        Err(Error::validation("phone", PHONE_MESSAGE))
    }
}

fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn generate_code() -> String {
    let bytes = Uuid::new_v4().into_bytes();
    let value = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) % 1_000_000;
    format!("{value:06}")
}

fn is_admin_phone(auth: &AuthSettings, phone: &str) -> bool {
    auth.admin_phones
        .iter()
        .filter_map(|p| normalize_phone(p).ok())
        .any(|p| p == phone)
}

async fn find_teacher(db: &DatabaseConnection, phone: &str) -> Result<Option<teacher::Model>> {
    Teacher::find()
        .filter(teacher::Column::Phone.eq(phone))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Sends a one-time code to a known teacher or admin phone.
///
/// Returns the normalised phone the code was sent to.
#[instrument(skip(db, dispatcher, auth))]
pub async fn request_code(
    db: &DatabaseConnection,
    dispatcher: &dyn OtpDispatcher,
    auth: &AuthSettings,
    phone_input: &str,
) -> Result<String> {
    let phone = normalize_phone(phone_input)?;

    if find_teacher(db, &phone).await?.is_none() && !is_admin_phone(auth, &phone) {
        info!("Code requested for unknown phone {phone}");
        return Err(Error::UnknownTeacherPhone);
    }

    let code = generate_code();
    otp_code::ActiveModel {
        phone: Set(phone.clone()),
        code_hash: Set(hash_code(&code)),
        expires_at: Set(Utc::now() + Duration::minutes(auth.otp_ttl_minutes)),
        attempts: Set(0),
        consumed: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await?;

    dispatcher.dispatch(&phone, &code)?;
    debug!("One-time code issued for {phone}");
    Ok(phone)
}

/// Exchanges a one-time code for a session.
///
/// Only the newest unconsumed, unexpired code for the phone is accepted.
/// Each wrong guess counts against that code, and it is discarded once
/// `max_code_attempts` is reached.
#[instrument(skip(db, auth, code))]
pub async fn verify_code(
    db: &DatabaseConnection,
    auth: &AuthSettings,
    phone_input: &str,
    code: &str,
) -> Result<IssuedSession> {
    let phone = normalize_phone(phone_input)?;
    let code = code.trim();
    if !is_six_digit_code(code) {
        return Err(Error::validation("code", "Please enter the 6-digit code"));
    }

    let now = Utc::now();
    let pending = OtpCode::find()
        .filter(otp_code::Column::Phone.eq(&phone))
        .filter(otp_code::Column::Consumed.eq(false))
        .filter(otp_code::Column::ExpiresAt.gt(now))
        .order_by_desc(otp_code::Column::Id)
        .one(db)
        .await?
        .ok_or(Error::InvalidCode)?;

    if pending.code_hash != hash_code(code) {
        let attempts = pending.attempts + 1;
        let locked = attempts >= auth.max_code_attempts;
        let mut failed: otp_code::ActiveModel = pending.into();
        failed.attempts = Set(attempts);
        failed.consumed = Set(locked);
        failed.update(db).await?;
        if locked {
            warn!("Discarded one-time code for {phone} after {attempts} wrong attempts");
        }
        return Err(Error::InvalidCode);
    }

    let mut consumed: otp_code::ActiveModel = pending.into();
    consumed.consumed = Set(true);
    consumed.update(db).await?;

    let teacher_id = find_teacher(db, &phone).await?.map(|t| t.id);
    let role = if is_admin_phone(auth, &phone) {
        Role::Admin
    } else {
        Role::Teacher
    };

    let token = Uuid::new_v4().simple().to_string();
    let expires_at = now + Duration::hours(auth.session_ttl_hours);
    session::ActiveModel {
        token: Set(token.clone()),
        phone: Set(phone.clone()),
        role: Set(role.as_str().to_string()),
        teacher_id: Set(teacher_id),
        expires_at: Set(expires_at),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Signed in {phone} as {role}");
    Ok(IssuedSession {
        token,
        role,
        teacher_id,
        expires_at,
    })
}

/// Looks up the principal for a bearer token.
pub async fn resolve_session(db: &DatabaseConnection, token: &str) -> Result<Principal> {
    let row = Session::find()
        .filter(session::Column::Token.eq(token))
        .one(db)
        .await?
        .ok_or(Error::Unauthorized)?;

    if row.expires_at <= Utc::now() {
        debug!("Session for {} has expired", row.phone);
        return Err(Error::Unauthorized);
    }

    let role = Role::parse(&row.role).ok_or(Error::Unauthorized)?;
    Ok(Principal {
        role,
        phone: row.phone,
        teacher_id: row.teacher_id,
    })
}
