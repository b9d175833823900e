use std::borrow::Cow;
use std::fmt;

/// Host every canonical identity is rebuilt on
const CANONICAL_HOST: &str = "www.youtube.com";

/// Registrable host a raw capture must belong to; subdomains are accepted
const PLATFORM_HOST: &str = "youtube.com";

/// Path prefixes that introduce a channel identifier
const DIRECT_PREFIXES: &[&str] = &["channel/", "c/", "user/", "@", "+"];

/// Path segments marking the legacy redirect form (`/browse/<slug>-UC...`)
const REDIRECT_MARKERS: &[&str] = &["browse"];

/// Prefix of platform-assigned channel ids
const CHANNEL_ID_PREFIX: &str = "UC";

/// Upper bound on percent-decoding passes for multiply-encoded captures
const MAX_DECODE_PASSES: usize = 4;

/// Why a raw URL produced no identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// Nothing left after stripping scheme and host decorations
    Empty,
    /// The capture is not on the platform host
    ForeignHost,
    /// The path is a recognized prefix with no identifier after it
    BarePrefix,
    /// No canonicalization rule matched the path
    Unrecognized,
    /// The identifier contains whitespace or control characters
    InvalidIdentifier,
    /// Percent-escapes kept decoding into new escapes
    UndecodableEscapes,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Empty => "empty",
            Self::ForeignHost => "foreign host",
            Self::BarePrefix => "bare prefix",
            Self::Unrecognized => "unrecognized path",
            Self::InvalidIdentifier => "invalid identifier",
            Self::UndecodableEscapes => "undecodable escapes",
        };
        f.write_str(reason)
    }
}

/// Canonicalization rules, tried in this order; the first match wins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    /// `browse/<anything>-UC<id>` becomes `channel/UC<id>`
    LegacyRedirect,
    /// `<prefix><id>` with exactly one identifier segment
    Direct,
}

const RULES: [Rule; 2] = [Rule::LegacyRedirect, Rule::Direct];

/// Reduces raw capture URLs to canonical channel identities
///
/// # Canonicalization Steps
///
/// 1. Percent-decode (repeatedly, until stable)
/// 2. Strip `http://`, `https://` or `//`, then a leading `m.` and `www.`
///    host label, case-insensitively
/// 3. Drop query string and fragment; strip a single trailing slash
/// 4. Split the path into segments
/// 5. Apply the first matching rule (legacy redirect, then direct form)
/// 6. Reject bare prefixes such as `/c/` or `/@`
///
/// The function is pure and total, and canonical output is a fixed point:
/// canonicalizing an identity returns it unchanged.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    canonical_host: &'static str,
    platform_host: &'static str,
    direct_prefixes: &'static [&'static str],
    redirect_markers: &'static [&'static str],
    id_prefix: &'static str,
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self {
            canonical_host: CANONICAL_HOST,
            platform_host: PLATFORM_HOST,
            direct_prefixes: DIRECT_PREFIXES,
            redirect_markers: REDIRECT_MARKERS,
            id_prefix: CHANNEL_ID_PREFIX,
        }
    }
}

impl Canonicalizer {
    /// Canonicalizes a raw capture URL
    ///
    /// # Examples
    ///
    /// ```
    /// use channel_harvest::url::Canonicalizer;
    ///
    /// let canonicalizer = Canonicalizer::default();
    /// assert_eq!(
    ///     canonicalizer.canonicalize("https://m.youtube.com/channel/UCabc123?si=xyz").unwrap(),
    ///     "https://www.youtube.com/channel/UCabc123"
    /// );
    /// assert!(canonicalizer.canonicalize("https://www.youtube.com/c/").is_err());
    /// ```
    pub fn canonicalize(&self, raw: &str) -> Result<String, Rejection> {
        let decoded = decode_until_stable(raw.trim())?;
        let rest = strip_scheme(decoded.trim());
        let rest = strip_prefix_ignore_case(rest, "m.").unwrap_or(rest);
        let rest = strip_prefix_ignore_case(rest, "www.").unwrap_or(rest);
        let rest = cut_query_and_fragment(rest);
        let rest = rest.strip_suffix('/').unwrap_or(rest);

        if rest.is_empty() {
            return Err(Rejection::Empty);
        }

        let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
        if !self.is_platform_host(host) {
            return Err(Rejection::ForeignHost);
        }

        let segments: Vec<&str> = path.split('/').collect();
        for rule in RULES {
            if let Some(canonical_path) = self.apply(rule, path, &segments)? {
                if self.is_bare_prefix(&canonical_path) {
                    return Err(Rejection::BarePrefix);
                }
                return Ok(format!("https://{}/{}", self.canonical_host, canonical_path));
            }
        }

        if self.is_bare_prefix(path) {
            Err(Rejection::BarePrefix)
        } else {
            Err(Rejection::Unrecognized)
        }
    }

    fn apply(&self, rule: Rule, path: &str, segments: &[&str]) -> Result<Option<String>, Rejection> {
        match rule {
            Rule::LegacyRedirect => self.legacy_redirect(segments),
            Rule::Direct => self.direct(path),
        }
    }

    fn legacy_redirect(&self, segments: &[&str]) -> Result<Option<String>, Rejection> {
        let Some(marker) = segments
            .iter()
            .position(|segment| self.redirect_markers.iter().any(|marker| marker == segment))
        else {
            return Ok(None);
        };

        for segment in &segments[marker + 1..] {
            if let Some(pos) = segment.find(self.id_prefix) {
                let id = &segment[pos..];
                if id.len() == self.id_prefix.len() {
                    continue;
                }
                validate_identifier(id)?;
                return Ok(Some(format!("channel/{}", id)));
            }
        }

        Ok(None)
    }

    fn direct(&self, path: &str) -> Result<Option<String>, Rejection> {
        for prefix in self.direct_prefixes {
            let Some(id) = path.strip_prefix(prefix) else {
                continue;
            };
            if id.is_empty() {
                return Err(Rejection::BarePrefix);
            }
            if id.contains('/') {
                return Ok(None);
            }
            validate_identifier(id)?;
            return Ok(Some(format!("{}{}", prefix, id)));
        }
        Ok(None)
    }

    /// The platform host or any subdomain of it, with an optional port
    fn is_platform_host(&self, host: &str) -> bool {
        let host = host
            .rsplit_once(':')
            .filter(|(_, port)| port.chars().all(|c| c.is_ascii_digit()))
            .map_or(host, |(name, _)| name)
            .to_ascii_lowercase();
        host == self.platform_host
            || host
                .strip_suffix(self.platform_host)
                .is_some_and(|sub| sub.len() > 1 && sub.ends_with('.'))
    }

    fn is_bare_prefix(&self, path: &str) -> bool {
        self.direct_prefixes
            .iter()
            .any(|prefix| prefix.trim_end_matches('/') == path)
    }
}

/// Canonicalizes a raw capture URL with the default platform rules
///
/// Returns `None` when the URL is rejected.
pub fn canonicalize(raw: &str) -> Option<String> {
    Canonicalizer::default().canonicalize(raw).ok()
}

fn decode_until_stable(raw: &str) -> Result<Cow<'_, str>, Rejection> {
    let mut current = Cow::Borrowed(raw);
    for _ in 0..MAX_DECODE_PASSES {
        let decoded = urlencoding::decode_binary(current.as_bytes());
        let next = String::from_utf8_lossy(&decoded).into_owned();
        if next == current {
            return Ok(current);
        }
        current = Cow::Owned(next);
    }
    Err(Rejection::UndecodableEscapes)
}

fn strip_scheme(s: &str) -> &str {
    ["https://", "http://", "//"]
        .iter()
        .find_map(|scheme| strip_prefix_ignore_case(s, scheme))
        .unwrap_or(s)
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

fn cut_query_and_fragment(s: &str) -> &str {
    match s.find(['?', '#']) {
        Some(pos) => &s[..pos],
        None => s,
    }
}

fn validate_identifier(id: &str) -> Result<(), Rejection> {
    if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        Err(Rejection::InvalidIdentifier)
    } else {
        Ok(())
    }
}
