//! Stable session-key resolution for the web channel.
//!
//! Order: explicit identifier field, `X-Session-ID` header, `qid` cookie, then a
//! freshly generated v4 UUID. The messaging gateway keys sessions by the
//! sender address and does not go through here.

use uuid::Uuid;

/// Header carrying a session id hint.
pub const SESSION_HEADER: &str = "X-Session-ID";
/// Cookie carrying a session id hint; also where generated ids are persisted.
pub const SESSION_COOKIE: &str = "qid";

/// Identity hints extracted from one inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityHints {
    pub explicit: Option<String>,
    pub header: Option<String>,
    pub cookie: Option<String>,
}

/// Where the resolved key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    Explicit,
    Header,
    Cookie,
    /// Minted for this request; the transport must hand it back to the caller.
    Generated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub key: String,
    pub source: IdentitySource,
}

impl ResolvedIdentity {
    pub fn is_generated(&self) -> bool {
        self.source == IdentitySource::Generated
    }
}

/// First non-blank hint wins; otherwise a random id is generated.
pub fn resolve(hints: &IdentityHints) -> ResolvedIdentity {
    let candidates = [
        (hints.explicit.as_deref(), IdentitySource::Explicit),
        (hints.header.as_deref(), IdentitySource::Header),
        (hints.cookie.as_deref(), IdentitySource::Cookie),
    ];
    candidates
        .into_iter()
        .find_map(|(value, source)| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|key| ResolvedIdentity {
                    key: key.to_string(),
                    source,
                })
        })
        .unwrap_or_else(|| ResolvedIdentity {
            key: generate_session_id(),
            source: IdentitySource::Generated,
        })
}

/// v4 UUIDs draw from the OS CSPRNG, so collisions need no explicit detection.
pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Extracts the value of `name` from a raw `Cookie` header.
pub fn cookie_value(cookie_header: &str, name: &str) -> Option<String> {
    cookie_header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key.trim() == name).then(|| value.trim().trim_matches('"').to_string())
    })
}

/// True for 10 to 15 ASCII digits, the shape of a phone number used as an identity.
pub fn is_phone_like(key: &str) -> bool {
    (10..=15).contains(&key.len()) && key.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn hints(explicit: Option<&str>, header: Option<&str>, cookie: Option<&str>) -> IdentityHints {
        IdentityHints {
            explicit: explicit.map(str::to_string),
            header: header.map(str::to_string),
            cookie: cookie.map(str::to_string),
        }
    }

    #[test]
    fn explicit_identifier_wins() {
        let resolved = resolve(&hints(Some("user-1"), Some("hdr"), Some("cookie")));
        assert_eq!(resolved.key, "user-1");
        assert_eq!(resolved.source, IdentitySource::Explicit);
    }

    #[test]
    fn blank_hints_fall_through() {
        let resolved = resolve(&hints(Some("   "), Some(""), Some(" cookie-9 ")));
        assert_eq!(resolved.key, "cookie-9");
        assert_eq!(resolved.source, IdentitySource::Cookie);

        let resolved = resolve(&hints(None, Some(" hdr "), Some("c")));
        assert_eq!(resolved.key, "hdr");
        assert_eq!(resolved.source, IdentitySource::Header);
    }

    #[test]
    fn generates_when_no_hints() {
        let resolved = resolve(&IdentityHints::default());
        assert!(resolved.is_generated());
        assert!(Uuid::parse_str(&resolved.key).is_ok());
    }

    #[test]
    fn generated_ids_do_not_collide() {
        let ids: HashSet<_> = (0..1_000).map(|_| generate_session_id()).collect();
        assert_eq!(ids.len(), 1_000);
    }

    #[test]
    fn parses_cookie_header() {
        let header = "theme=dark; qid=abc-123; other=1";
        assert_eq!(cookie_value(header, "qid").as_deref(), Some("abc-123"));
        assert_eq!(cookie_value(header, "missing"), None);
        assert_eq!(cookie_value("qid=\"quoted\"", "qid").as_deref(), Some("quoted"));
    }

    #[test]
    fn phone_like_keys() {
        assert!(is_phone_like("5544998765432"));
        assert!(is_phone_like("4436431736"));
        assert!(!is_phone_like("123456789"));
        assert!(!is_phone_like("1234567890123456"));
        assert!(!is_phone_like("55-44-99876-5432"));
        assert!(!is_phone_like("f47ac10b-58cc-4372-a567-0e02b2c3d479"));
    }
}
