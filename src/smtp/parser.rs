//! Tokenizing raw command lines

/// The command verbs the server understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    Ehlo,
    Helo,
    Mail,
    Rcpt,
    Data,
    Rset,
    Noop,
    Quit,
    /// Anything else, uppercased
    Unknown(String),
}

impl Verb {
    fn from_token(token: &str) -> Self {
        let upper = token.to_ascii_uppercase();
        match upper.as_str() {
            "EHLO" => Verb::Ehlo,
            "HELO" => Verb::Helo,
            "MAIL" => Verb::Mail,
            "RCPT" => Verb::Rcpt,
            "DATA" => Verb::Data,
            "RSET" => Verb::Rset,
            "NOOP" => Verb::Noop,
            "QUIT" => Verb::Quit,
            _ => Verb::Unknown(upper),
        }
    }

    /// Wire name of the verb
    pub fn as_str(&self) -> &str {
        match self {
            Verb::Ehlo => "EHLO",
            Verb::Helo => "HELO",
            Verb::Mail => "MAIL",
            Verb::Rcpt => "RCPT",
            Verb::Data => "DATA",
            Verb::Rset => "RSET",
            Verb::Noop => "NOOP",
            Verb::Quit => "QUIT",
            Verb::Unknown(verb) => verb.as_str(),
        }
    }
}

/// A single parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: Verb,
    /// Remaining tokens, unmodified
    pub args: Vec<String>,
}

impl Command {
    /// Split a line on ASCII whitespace into a verb and its arguments.
    ///
    /// Returns `None` for a blank line. Quoting is not supported.
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_ascii_whitespace();
        let verb = Verb::from_token(tokens.next()?);
        let args = tokens.map(str::to_owned).collect();
        Some(Self { verb, args })
    }
}
