//! Invite link parsing.

use reqwest::Url;

/// Name of the query parameter carrying the invitation token.
pub const TOKEN_PARAM: &str = "token";

/// Extract the `token` query parameter from an invite link.
///
/// Accepts absolute URLs (`https://host/?token=...`) as well as relative
/// ones (`/?token=...`, `?token=...`). Returns `None` when the parameter is
/// missing or empty.
pub fn token_from_invite_link(link: &str) -> Option<String> {
    let base = Url::parse("http://localhost/").ok()?;
    let url = base.join(link.trim()).ok()?;

    url.query_pairs()
        .find(|(key, _)| key == TOKEN_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
