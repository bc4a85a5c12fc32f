use crate::error::DbManagerError;

/// A parsed `key=value;key=value` connection string.
///
/// Keys are matched case-insensitively and ignoring inner whitespace, so `Data Source`,
/// `datasource` and `DATA SOURCE` are the same key. Values may be wrapped in single or double
/// quotes to carry `;` or `=`; a doubled quote inside a quoted value is a literal quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pairs: Vec<(String, String)>,
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

impl ConnectionString {
    /// Parse a connection string.
    ///
    /// # Errors
    /// Returns `DbManagerError::ConfigError` if a segment has no `=`, a key is empty, or a
    /// quoted value is not terminated.
    pub fn parse(input: &str) -> Result<Self, DbManagerError> {
        let mut pairs = Vec::new();
        let mut chars = input.chars().peekable();

        loop {
            while chars.peek().is_some_and(|c| c.is_whitespace() || *c == ';') {
                chars.next();
            }
            if chars.peek().is_none() {
                break;
            }

            let mut key = String::new();
            let mut saw_eq = false;
            for c in chars.by_ref() {
                match c {
                    '=' => {
                        saw_eq = true;
                        break;
                    }
                    ';' => break,
                    _ => key.push(c),
                }
            }
            let key = key.trim();
            if !saw_eq {
                return Err(DbManagerError::ConfigError(format!(
                    "connection string segment '{key}' is not a key=value pair"
                )));
            }
            if key.is_empty() {
                return Err(DbManagerError::ConfigError(
                    "connection string contains an empty key".to_string(),
                ));
            }

            while chars.peek().is_some_and(|c| *c == ' ' || *c == '\t') {
                chars.next();
            }

            let value = match chars.peek().copied() {
                Some(quote @ ('"' | '\'')) => {
                    chars.next();
                    let mut value = String::new();
                    let mut closed = false;
                    while let Some(c) = chars.next() {
                        if c == quote {
                            if chars.peek() == Some(&quote) {
                                chars.next();
                                value.push(quote);
                            } else {
                                closed = true;
                                break;
                            }
                        } else {
                            value.push(c);
                        }
                    }
                    if !closed {
                        return Err(DbManagerError::ConfigError(format!(
                            "unterminated quoted value for '{key}'"
                        )));
                    }
                    // skip to the next separator
                    for c in chars.by_ref() {
                        if c == ';' {
                            break;
                        }
                    }
                    value
                }
                _ => {
                    let mut value = String::new();
                    for c in chars.by_ref() {
                        if c == ';' {
                            break;
                        }
                        value.push(c);
                    }
                    value.trim().to_string()
                }
            };

            pairs.push((normalize_key(key), value));
        }

        Ok(Self { pairs })
    }

    /// Value of the first key among `aliases` that is present. Later duplicates win.
    #[must_use]
    pub fn get(&self, aliases: &[&str]) -> Option<&str> {
        aliases.iter().find_map(|alias| {
            let wanted = normalize_key(alias);
            self.pairs
                .iter()
                .rev()
                .find(|(k, _)| *k == wanted)
                .map(|(_, v)| v.as_str())
        })
    }

    /// Like [`ConnectionString::get`] but fails when none of the aliases is present.
    ///
    /// # Errors
    /// Returns `DbManagerError::ConfigError` naming the first alias.
    pub fn require(&self, aliases: &[&str]) -> Result<&str, DbManagerError> {
        self.get(aliases).ok_or_else(|| {
            DbManagerError::ConfigError(format!(
                "connection string is missing '{}'",
                aliases.first().copied().unwrap_or_default()
            ))
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Interpret common boolean spellings (`true`, `yes`, `1`, `sspi`).
pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "sspi" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}
