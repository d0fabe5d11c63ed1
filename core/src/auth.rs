//! Django REST Framework token authentication.

pub const AUTHORIZATION: &str = "Authorization";

/// `Authorization: Token <key>` header pair.
pub fn token_header(token: &str) -> (String, String) {
    (AUTHORIZATION.to_string(), format!("Token {token}"))
}
