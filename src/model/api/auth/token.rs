use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{
    errors::Error as JwtError, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use log::debug;
use rocket::{
    http::{Cookie, SameSite},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::engine::Caller;
use crate::model::{common::Cohort, mongodb::Id};

use super::user::{Rights, User};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token representing a specific user with specific rights.
///
/// Tokens are issued by the identity provider; this server only verifies them.
#[derive(Serialize, Deserialize)]
pub struct AuthToken<U> {
    #[serde(rename = "sub")]
    id: Id,
    #[serde(rename = "rgt")]
    rights: Rights,
    name: String,
    /// Absent until the student has completed their profile.
    cohort: Option<Cohort>,
    #[serde(skip)]
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    /// Get the user ID.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Does this token permit the given rights?
    pub fn permits(&self, target: Rights) -> bool {
        self.rights == target
    }

    /// The identity to pass into engine operations.
    pub fn caller(&self) -> Caller {
        Caller {
            id: self.id,
            rights: self.rights,
            name: self.name.clone(),
            cohort: self.cohort.clone(),
        }
    }
}

impl<U> AuthToken<U>
where
    U: User,
{
    /// Create a new [`AuthToken`] for the given caller, with the correct rights
    /// for this user type.
    pub fn new(caller: &Caller) -> Self {
        Self {
            id: caller.id,
            rights: U::RIGHTS,
            name: caller.name.clone(),
            cohort: caller.cohort.clone(),
            phantom: PhantomData,
        }
    }

    /// Serialize this token into a cookie.
    pub fn into_cookie(self, config: &Config) -> Cookie<'static> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .expect("JWT encoding is infallible with default settings");

        Cookie::build(AUTH_TOKEN_COOKIE, token)
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish()
    }

    /// Deserialize a token from a cookie.
    pub fn from_cookie(cookie: &Cookie<'static>, config: &Config) -> Result<Self, JwtError> {
        jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<U>>| claims.claims.token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<U> {
    #[serde(flatten, bound = "")]
    token: AuthToken<U>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, U> FromRequest<'r> for AuthToken<U>
where
    U: User + Send,
{
    type Error = JwtError;

    /// Get an [`AuthToken`] from the cookie and verify that it has the correct
    /// rights for this user type.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        // Forward to any routes that do not require an authentication token.
        let cookie = match req.cookies().get(AUTH_TOKEN_COOKIE) {
            Some(cookie) => cookie,
            None => return Outcome::Forward(()),
        };

        // Decode the token; a bad or expired token is treated as no token.
        let token = match Self::from_cookie(cookie, config) {
            Ok(token) => token,
            Err(e) => {
                debug!("Rejected auth token: {e}");
                return Outcome::Forward(());
            }
        };

        // Check it represents the correct rights.
        if token.permits(U::RIGHTS) {
            Outcome::Success(token)
        } else {
            Outcome::Forward(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::api::auth::{Admin, Voter};

    fn config() -> Config {
        Config::example()
    }

    #[test]
    fn cookie_round_trip() {
        let caller = Caller::voter(Id::new(), "Asha", Cohort::new("BCA", 2, "A"));
        let cookie = AuthToken::<Voter>::new(&caller).into_cookie(&config());
        let token = AuthToken::<Voter>::from_cookie(&cookie, &config()).unwrap();
        assert_eq!(token.caller(), caller);
        assert!(token.permits(Rights::Voter));
        assert!(!token.permits(Rights::Admin));
    }

    #[test]
    fn rights_come_from_user_type() {
        let caller = Caller::admin(Id::new(), "Registrar");
        let token = AuthToken::<Admin>::new(&caller);
        assert!(token.permits(Rights::Admin));
        assert_eq!(token.caller().rights, Rights::Admin);
    }

    #[test]
    fn wrong_secret_rejected() {
        let caller = Caller::admin(Id::new(), "Registrar");
        let cookie = AuthToken::<Admin>::new(&caller).into_cookie(&config());
        let mut other = config();
        other.jwt_secret = "a different secret".to_string();
        assert!(AuthToken::<Admin>::from_cookie(&cookie, &other).is_err());
    }
}
