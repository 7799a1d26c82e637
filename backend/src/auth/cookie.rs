//! Refresh token cookie

use axum_extra::extract::cookie::{Cookie, SameSite};

pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Builds the `Set-Cookie` values that carry the refresh token.
#[derive(Debug, Clone, Copy)]
pub struct RefreshCookie {
    secure: bool,
    max_age_days: i64,
}

impl RefreshCookie {
    pub fn new(secure: bool, max_age_days: i64) -> Self {
        Self {
            secure,
            max_age_days,
        }
    }

    pub fn issue(&self, token: String) -> Cookie<'static> {
        Cookie::build((REFRESH_COOKIE_NAME, token))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(time::Duration::days(self.max_age_days))
            .build()
    }

    /// Cookie with matching attributes for `CookieJar::remove`
    pub fn clear(&self) -> Cookie<'static> {
        Cookie::build((REFRESH_COOKIE_NAME, ""))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_attributes() {
        let cookie = RefreshCookie::new(true, 7).issue("tok".to_string());
        assert_eq!(cookie.name(), REFRESH_COOKIE_NAME);
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(7)));
    }

    #[test]
    fn test_insecure_outside_production() {
        let cookie = RefreshCookie::new(false, 7).issue("tok".to_string());
        assert_eq!(cookie.secure(), Some(false));
    }
}
