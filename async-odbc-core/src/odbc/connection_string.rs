//! ODBC connection string parsing.
//!
//! A connection string is a list of `Key=Value` attributes separated by `;`.
//! Values that contain `;` (or start with `{`) are wrapped in braces, with a
//! literal `}` written as `}}`:
//!
//! ```text
//! Driver={ODBC Driver 18 for SQL Server};Server=localhost;PWD={p;ss}
//! ```

use crate::odbc::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// A parsed connection string. Keys keep their original spelling but are
/// looked up case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionString {
    attributes: Vec<(String, String)>,
}

impl ConnectionString {
    pub fn parse(input: &str) -> Result<Self, Error> {
        let mut attributes = Vec::new();
        let mut chars = input.chars().peekable();

        loop {
            // key
            let mut key = String::new();
            let mut saw_equals = false;
            for c in chars.by_ref() {
                match c {
                    '=' => {
                        saw_equals = true;
                        break;
                    }
                    ';' => break,
                    _ => key.push(c),
                }
            }
            let key = key.trim().to_string();

            if !saw_equals {
                if !key.is_empty() {
                    return Err(Error::Configuration(format!(
                        "connection string attribute `{key}` has no value"
                    )));
                }
                if chars.peek().is_none() {
                    break;
                }
                continue;
            }
            if key.is_empty() {
                return Err(Error::Configuration(
                    "connection string attribute has an empty key".into(),
                ));
            }

            // value
            while chars.peek().is_some_and(|c| *c == ' ') {
                chars.next();
            }
            let mut value = String::new();
            if chars.peek() == Some(&'{') {
                chars.next();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    if c == '}' {
                        if chars.peek() == Some(&'}') {
                            chars.next();
                            value.push('}');
                            continue;
                        }
                        closed = true;
                        break;
                    }
                    value.push(c);
                }
                if !closed {
                    return Err(Error::Configuration(format!(
                        "unterminated `{{` in value of `{key}`"
                    )));
                }
                for c in chars.by_ref() {
                    match c {
                        ';' => break,
                        c if c.is_whitespace() => {}
                        c => {
                            return Err(Error::Configuration(format!(
                                "unexpected `{c}` after braced value of `{key}`"
                            )));
                        }
                    }
                }
            } else {
                for c in chars.by_ref() {
                    if c == ';' {
                        break;
                    }
                    value.push(c);
                }
                value = value.trim_end().to_string();
            }

            attributes.push((key, value));
            if chars.peek().is_none() {
                break;
            }
        }

        Ok(Self { attributes })
    }

    /// Value of the last attribute named `key`, ignoring ASCII case.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// The `Driver` attribute, braces removed.
    pub fn driver(&self) -> Option<&str> {
        self.get("Driver")
    }

    pub fn dsn(&self) -> Option<&str> {
        self.get("DSN")
    }

    pub fn database(&self) -> Option<&str> {
        self.get("Database")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Append an attribute.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.push((key.into(), value.into()));
    }
}

impl FromStr for ConnectionString {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for ConnectionString {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for (i, (key, value)) in self.attributes.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            let needs_braces = value.contains(';')
                || value.starts_with('{')
                || value.starts_with(' ')
                || value.ends_with(' ')
                || key.eq_ignore_ascii_case("Driver");
            if needs_braces {
                write!(f, "{key}={{{}}}", value.replace('}', "}}"))?;
            } else {
                write!(f, "{key}={value}")?;
            }
        }
        Ok(())
    }
}
