//! One-shot messages carried across a redirect in a short-lived cookie.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;

use quill_types::api::Flash;

pub const FLASH_COOKIE: &str = "quill_flash";

pub const SUCCESS: &str = "success";
pub const DANGER: &str = "danger";
pub const INFO: &str = "info";

pub fn set(jar: CookieJar, category: &str, message: &str) -> CookieJar {
    let flash = Flash {
        category: category.to_string(),
        message: message.to_string(),
    };
    // Serializing two strings cannot fail.
    let payload = serde_json::to_vec(&flash).unwrap_or_default();

    jar.add(
        Cookie::build((FLASH_COOKIE, B64.encode(payload)))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

/// Reads and clears the pending flash, if any.
pub fn take(jar: CookieJar) -> (CookieJar, Option<Flash>) {
    let Some(cookie) = jar.get(FLASH_COOKIE) else {
        return (jar, None);
    };

    let flash = B64
        .decode(cookie.value())
        .ok()
        .and_then(|bytes| serde_json::from_slice::<Flash>(&bytes).ok());

    (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), flash)
}
