//! Mailbox parsing for MAIL and RCPT parameters

use std::fmt;
use std::str::FromStr;

use crate::smtp::error::SmtpError;

/// Which envelope path a parameter belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// `MAIL FROM:`, which also accepts the null path
    Reverse,
    /// `RCPT TO:`
    Forward,
}

impl PathKind {
    fn keyword(self) -> &'static str {
        match self {
            PathKind::Reverse => "FROM",
            PathKind::Forward => "TO",
        }
    }

    /// Lowercase name used in replies ("missing from", "invalid to")
    pub fn label(self) -> &'static str {
        match self {
            PathKind::Reverse => "from",
            PathKind::Forward => "to",
        }
    }
}

/// A validated envelope address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// The empty reverse-path `<>`, used for bounces
    Null,
    Mailbox(Mailbox),
}

impl Address {
    /// Parse a `KEYWORD:<value>` parameter for the given path.
    ///
    /// Only the first colon splits the keyword from the value, so the value
    /// may itself contain colons.
    pub fn parse_param(param: &str, kind: PathKind) -> Result<Self, SmtpError> {
        let malformed = || SmtpError::MalformedParameter {
            keyword: kind.label(),
        };

        let (keyword, value) = param.split_once(':').ok_or_else(malformed)?;
        if !keyword.eq_ignore_ascii_case(kind.keyword()) {
            return Err(malformed());
        }

        if value == "<>" {
            return match kind {
                PathKind::Reverse => Ok(Address::Null),
                PathKind::Forward => Err(SmtpError::InvalidAddress),
            };
        }

        value.parse().map(Address::Mailbox)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Address::Null)
    }

    /// The concrete mailbox, if any
    pub fn mailbox(&self) -> Option<&Mailbox> {
        match self {
            Address::Null => None,
            Address::Mailbox(mailbox) => Some(mailbox),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Null => f.write_str("<>"),
            Address::Mailbox(mailbox) => write!(f, "<{}>", mailbox.address()),
        }
    }
}

/// A concrete `local-part@domain` mailbox with an optional display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    display_name: Option<String>,
    local_part: String,
    domain: String,
}

impl Mailbox {
    /// Display name, if one was given
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Local part as written, including quotes if it was quoted
    pub fn local_part(&self) -> &str {
        &self.local_part
    }

    /// Domain after the `@`
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The bare `local-part@domain` form
    pub fn address(&self) -> String {
        format!("{}@{}", self.local_part, self.domain)
    }
}

impl FromStr for Mailbox {
    type Err = SmtpError;

    /// Accepts `local@domain`, `<local@domain>` and `Name <local@domain>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let (display_name, spec) = match s.strip_suffix('>') {
            Some(inner) => {
                let open = find_unquoted(inner, '<').ok_or(SmtpError::InvalidAddress)?;
                let name = inner[..open].trim();
                let display_name = if name.is_empty() {
                    None
                } else {
                    Some(parse_phrase(name).ok_or(SmtpError::InvalidAddress)?)
                };
                (display_name, &inner[open + 1..])
            }
            None => (None, s),
        };

        let (local_part, domain) = parse_addr_spec(spec).ok_or(SmtpError::InvalidAddress)?;
        Ok(Self {
            display_name,
            local_part: local_part.to_owned(),
            domain: domain.to_owned(),
        })
    }
}

fn is_atext(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-/=?^_`{|}~".contains(c) || !c.is_ascii()
}

fn is_dot_atom(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(|atom| !atom.is_empty() && atom.chars().all(is_atext))
}

/// Byte offset of the first `target` outside a quoted string
fn find_unquoted(s: &str, target: char) -> Option<usize> {
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if quoted && c == '\\' {
            escaped = true;
        } else if c == '"' {
            quoted = !quoted;
        } else if !quoted && c == target {
            return Some(i);
        }
    }
    None
}

/// Parse a quoted string at the start of `s`, returning the unescaped
/// content and the remainder after the closing quote.
fn parse_quoted(s: &str) -> Option<(String, &str)> {
    let rest = s.strip_prefix('"')?;
    let mut content = String::new();
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((content, &rest[i + 1..])),
            '\\' => content.push(chars.next()?.1),
            c if c.is_ascii_control() && c != '\t' => return None,
            c => content.push(c),
        }
    }
    None
}

/// Display names: a run of words, each an atom (dots allowed) or a quoted string
fn parse_phrase(s: &str) -> Option<String> {
    let mut words = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if rest.starts_with('"') {
            let (word, tail) = parse_quoted(rest)?;
            words.push(word);
            rest = tail;
        } else {
            let end = rest
                .find(|c: char| !(is_atext(c) || c == '.'))
                .unwrap_or(rest.len());
            if end == 0 {
                return None;
            }
            words.push(rest[..end].to_owned());
            rest = &rest[end..];
        }
        rest = rest.trim_start();
    }
    (!words.is_empty()).then(|| words.join(" "))
}

fn parse_addr_spec(spec: &str) -> Option<(&str, &str)> {
    let at = spec.rfind('@')?;
    let (local, domain) = (&spec[..at], &spec[at + 1..]);

    let local_ok = if local.starts_with('"') {
        matches!(parse_quoted(local), Some((_, "")))
    } else {
        is_dot_atom(local)
    };

    let domain_ok = match domain.strip_prefix('[').and_then(|d| d.strip_suffix(']')) {
        Some(literal) => literal
            .chars()
            .all(|c| c.is_ascii_graphic() && !"[]\\".contains(c)),
        None => is_dot_atom(domain),
    };

    (local_ok && domain_ok).then_some((local, domain))
}
