//! Refresh token cookie handling

use axum::http::{header::COOKIE, HeaderMap};
use cookie::{Cookie, SameSite};
use time::Duration;

/// Attributes applied to the refresh cookie
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub domain: Option<String>,
    pub secure: bool,
}

impl CookieSettings {
    /// HttpOnly refresh cookie carrying `value` for `max_age`
    pub fn build(&self, value: impl Into<String>, max_age: Duration) -> Cookie<'static> {
        let mut cookie = Cookie::build((self.name.clone(), value.into()))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(max_age)
            .build();

        if let Some(domain) = &self.domain {
            cookie.set_domain(domain.clone());
        }

        cookie
    }

    /// Cookie that makes the browser drop the refresh cookie
    pub fn clear(&self) -> Cookie<'static> {
        let mut cookie = self.build("", Duration::ZERO);
        cookie.make_removal();
        cookie
    }

    /// Read this cookie's value from the request's `Cookie` headers
    pub fn read(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| Cookie::split_parse(value))
            .filter_map(Result::ok)
            .find(|cookie| cookie.name() == self.name)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
    }
}
