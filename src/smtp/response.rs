//! SMTP reply handling

/// A reply sent to the client: one status code and one or more text lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    code: u16,
    /// Never empty; every line but the last is a continuation line
    lines: Vec<String>,
}

impl Reply {
    /// Create a single-line reply
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            lines: vec![message.into()],
        }
    }

    /// Create a multiline reply from its first line and any continuations
    pub fn multiline(
        code: u16,
        first: impl Into<String>,
        rest: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut lines = vec![first.into()];
        lines.extend(rest);
        Self { code, lines }
    }

    /// The SMTP reply code (e.g. 250, 354, 500)
    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Greeting sent once when a client connects (220)
    pub fn greeting(hostname: &str) -> Self {
        Self::new(220, format!("{hostname} ESMTP service ready"))
    }

    /// HELO reply (250)
    pub fn helo(hostname: &str) -> Self {
        Self::new(250, hostname)
    }

    /// EHLO reply (250): host identity followed by one extension per line
    pub fn ehlo(hostname: &str, extensions: &[String]) -> Self {
        Self::multiline(250, hostname, extensions.iter().cloned())
    }

    /// DATA intermediate reply (354)
    pub fn data_start() -> Self {
        Self::new(354, "ready to receive data")
    }

    /// QUIT reply (221)
    pub fn quit() -> Self {
        Self::new(221, "quit ok")
    }

    /// Format the reply for sending over the wire
    pub fn format(&self) -> String {
        let Some((last, rest)) = self.lines.split_last() else {
            return String::new();
        };

        let mut result = String::new();
        for line in rest {
            result.push_str(&format!("{}-{}\r\n", self.code, line));
        }
        result.push_str(&format!("{} {}\r\n", self.code, last));
        result
    }
}
