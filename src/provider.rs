use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;

use crate::error::DbManagerError;

static PARAMETER_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("parameter name pattern is valid")
});

/// Database backend selected by provider name.
///
/// Every variant exists in every build so provider names always resolve; executing against a
/// provider whose cargo feature is disabled fails with [`DbManagerError::Unimplemented`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ProviderKind {
    /// SQL Server through `tiberius`
    Mssql,
    /// `PostgreSQL` through `tokio-postgres`
    Postgres,
    /// `SQLite` through `rusqlite`
    Sqlite,
}

/// How a neutral parameter name is spelled for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterStyle {
    /// `@name`
    AtSign,
    /// `:name`
    Colon,
    /// `name`
    Bare,
}

impl ParameterStyle {
    fn prefix(self) -> Option<char> {
        match self {
            ParameterStyle::AtSign => Some('@'),
            ParameterStyle::Colon => Some(':'),
            ParameterStyle::Bare => None,
        }
    }
}

impl ProviderKind {
    /// Resolve a provider from its name.
    ///
    /// Short names (`sqlite`, `postgres`, `mssql`) and the usual invariant names
    /// (`System.Data.SqlClient`, `Npgsql`, `Microsoft.Data.Sqlite`, ...) are accepted,
    /// case-insensitively.
    ///
    /// # Errors
    /// Returns `DbManagerError::ConfigError` for an unknown name.
    pub fn from_name(name: &str) -> Result<Self, DbManagerError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mssql" | "system.data.sqlclient" | "microsoft.data.sqlclient" => {
                Ok(ProviderKind::Mssql)
            }
            "postgres" | "postgresql" | "npgsql" => Ok(ProviderKind::Postgres),
            "sqlite" | "system.data.sqlite" | "microsoft.data.sqlite" => Ok(ProviderKind::Sqlite),
            other => Err(DbManagerError::ConfigError(format!(
                "unknown database provider '{other}'"
            ))),
        }
    }

    #[must_use]
    pub fn parameter_style(self) -> ParameterStyle {
        match self {
            ProviderKind::Mssql => ParameterStyle::AtSign,
            ProviderKind::Sqlite => ParameterStyle::Colon,
            ProviderKind::Postgres => ParameterStyle::Bare,
        }
    }

    /// Translate a neutral parameter name into this provider's syntax.
    ///
    /// ```rust
    /// use db_manager::prelude::*;
    ///
    /// assert_eq!(ProviderKind::Mssql.fix_parameter_name("id").unwrap(), "@id");
    /// assert_eq!(ProviderKind::Sqlite.fix_parameter_name("id").unwrap(), ":id");
    /// assert_eq!(ProviderKind::Postgres.fix_parameter_name("id").unwrap(), "id");
    /// ```
    ///
    /// # Errors
    /// Returns `DbManagerError::ParameterError` if the name is not a plain identifier.
    pub fn fix_parameter_name(self, name: &str) -> Result<String, DbManagerError> {
        let style = self.parameter_style();
        let bare = match style.prefix() {
            Some(prefix) => name.strip_prefix(prefix).unwrap_or(name),
            None => name,
        };
        if !PARAMETER_NAME.is_match(bare) {
            return Err(DbManagerError::ParameterError(format!(
                "invalid parameter name '{name}'"
            )));
        }
        Ok(match style.prefix() {
            Some(prefix) => format!("{prefix}{bare}"),
            None => bare.to_string(),
        })
    }

    /// Positional placeholder for the 1-based parameter `index`.
    #[must_use]
    pub fn placeholder(self, index: usize) -> String {
        match self {
            ProviderKind::Mssql => format!("@P{index}"),
            ProviderKind::Postgres => format!("${index}"),
            ProviderKind::Sqlite => format!("?{index}"),
        }
    }

    /// Quote an identifier, doubling any embedded closing quote.
    #[must_use]
    pub fn quote_identifier(self, ident: &str) -> String {
        match self {
            ProviderKind::Mssql => format!("[{}]", ident.replace(']', "]]")),
            ProviderKind::Postgres | ProviderKind::Sqlite => {
                format!("\"{}\"", ident.replace('"', "\"\""))
            }
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = DbManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ProviderKind::Mssql => "mssql",
            ProviderKind::Postgres => "postgres",
            ProviderKind::Sqlite => "sqlite",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_invariant_and_short_names() {
        assert_eq!(
            ProviderKind::from_name("System.Data.SqlClient").unwrap(),
            ProviderKind::Mssql
        );
        assert_eq!(ProviderKind::from_name("NPGSQL").unwrap(), ProviderKind::Postgres);
        assert_eq!(ProviderKind::from_name(" sqlite ").unwrap(), ProviderKind::Sqlite);
        assert!(matches!(
            ProviderKind::from_name("SqlServer2000"),
            Err(DbManagerError::ConfigError(_))
        ));
    }

    #[test]
    fn bare_product_name_is_not_a_provider() {
        assert!(matches!(
            ProviderKind::from_name("SqlServer"),
            Err(DbManagerError::ConfigError(_))
        ));
    }

    #[test]
    fn prefix_is_not_doubled() {
        assert_eq!(ProviderKind::Mssql.fix_parameter_name("@id").unwrap(), "@id");
        assert_eq!(ProviderKind::Sqlite.fix_parameter_name(":id").unwrap(), ":id");
    }

    #[test]
    fn rejects_names_that_are_not_identifiers() {
        for bad in ["", "1abc", "a b", "x;--", "@@id"] {
            assert!(
                ProviderKind::Mssql.fix_parameter_name(bad).is_err(),
                "{bad} should be rejected"
            );
        }
        // a foreign prefix is not stripped
        assert!(ProviderKind::Postgres.fix_parameter_name("@id").is_err());
    }

    #[test]
    fn placeholders_and_quoting() {
        assert_eq!(ProviderKind::Mssql.placeholder(2), "@P2");
        assert_eq!(ProviderKind::Postgres.placeholder(1), "$1");
        assert_eq!(ProviderKind::Sqlite.placeholder(3), "?3");
        assert_eq!(ProviderKind::Mssql.quote_identifier("a]b"), "[a]]b]");
        assert_eq!(ProviderKind::Sqlite.quote_identifier("a\"b"), "\"a\"\"b\"");
    }
}
