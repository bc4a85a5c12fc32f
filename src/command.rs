use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::error::DbManagerError;
use crate::provider::ProviderKind;
use crate::types::{DbValue, Parameters};

static PROCEDURE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:[A-Za-z_#][A-Za-z0-9_$#@]*|\[[^\]]+\]|"[^"]+")(?:\.(?:[A-Za-z_][A-Za-z0-9_$#@]*|\[[^\]]+\]|"[^"]+")){0,2}$"#)
        .expect("procedure name pattern is valid")
});

/// How the command text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Plain SQL text
    Text,
    /// The name of a stored procedure
    StoredProcedure,
}

/// A parameter after its name has been fixed up for the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParameter {
    pub name: String,
    pub value: DbValue,
}

/// Everything a provider connection needs to run one statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub text: String,
    pub kind: CommandKind,
    /// `None` when the command may run without limit
    pub timeout: Option<Duration>,
    pub parameters: Vec<BoundParameter>,
}

impl Command {
    /// A text command with no parameters.
    #[must_use]
    pub fn text(sql: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            text: sql.into(),
            kind: CommandKind::Text,
            timeout,
            parameters: Vec::new(),
        }
    }

    /// A text command with positional parameters, named after their 1-based position.
    #[must_use]
    pub fn positional(sql: String, values: Vec<DbValue>, timeout: Option<Duration>) -> Self {
        Self {
            text: sql,
            kind: CommandKind::Text,
            timeout,
            parameters: values
                .into_iter()
                .enumerate()
                .map(|(i, value)| BoundParameter {
                    name: (i + 1).to_string(),
                    value,
                })
                .collect(),
        }
    }

    /// Build a stored procedure command, fixing up every parameter name for `provider`.
    ///
    /// # Errors
    /// Returns `DbManagerError::ParameterError` for an invalid procedure or parameter name.
    pub fn stored_procedure(
        provider: ProviderKind,
        name: &str,
        params: &Parameters,
        timeout: Option<Duration>,
    ) -> Result<Self, DbManagerError> {
        // SQLite has no procedures; the text is run as a statement with named parameters.
        if provider != ProviderKind::Sqlite && !PROCEDURE_NAME.is_match(name.trim()) {
            return Err(DbManagerError::ParameterError(format!(
                "invalid stored procedure name '{name}'"
            )));
        }

        let mut parameters = Vec::with_capacity(params.len());
        for (raw, value) in params.iter() {
            parameters.push(BoundParameter {
                name: provider.fix_parameter_name(raw)?,
                value: value.clone(),
            });
        }

        Ok(Self {
            text: name.trim().to_string(),
            kind: CommandKind::StoredProcedure,
            timeout,
            parameters,
        })
    }

    /// Parameter values in binding order.
    #[must_use]
    pub fn values(&self) -> Vec<DbValue> {
        self.parameters.iter().map(|p| p.value.clone()).collect()
    }

    /// The SQL a positional-parameter provider runs for this command.
    ///
    /// Text commands are returned unchanged. Procedures become
    /// `EXEC proc @a = @P1` (SQL Server) or `SELECT * FROM proc(a => $1)` (`PostgreSQL`).
    #[must_use]
    pub fn effective_sql(&self, provider: ProviderKind) -> String {
        if self.kind == CommandKind::Text {
            return self.text.clone();
        }
        let args: Vec<String> = self
            .parameters
            .iter()
            .enumerate()
            .map(|(i, p)| match provider {
                ProviderKind::Mssql => format!("{} = {}", p.name, provider.placeholder(i + 1)),
                ProviderKind::Postgres => format!("{} => {}", p.name, provider.placeholder(i + 1)),
                ProviderKind::Sqlite => provider.placeholder(i + 1),
            })
            .collect();
        match provider {
            ProviderKind::Mssql if args.is_empty() => format!("EXEC {}", self.text),
            ProviderKind::Mssql => format!("EXEC {} {}", self.text, args.join(", ")),
            ProviderKind::Postgres => format!("SELECT * FROM {}({})", self.text, args.join(", ")),
            ProviderKind::Sqlite => self.text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Parameters {
        Parameters::new().with("attribute_id", 1).with("flag", true)
    }

    #[test]
    fn mssql_procedure_uses_exec_with_named_arguments() {
        let cmd =
            Command::stored_procedure(ProviderKind::Mssql, "sp_server_info", &params(), None)
                .unwrap();
        assert_eq!(cmd.parameters[0].name, "@attribute_id");
        assert_eq!(
            cmd.effective_sql(ProviderKind::Mssql),
            "EXEC sp_server_info @attribute_id = @P1, @flag = @P2"
        );
        assert_eq!(cmd.values(), vec![DbValue::Int(1), DbValue::Bool(true)]);
    }

    #[test]
    fn mssql_procedure_without_parameters() {
        let cmd = Command::stored_procedure(
            ProviderKind::Mssql,
            "[dbo].[sp_who]",
            &Parameters::new(),
            None,
        )
        .unwrap();
        assert_eq!(cmd.effective_sql(ProviderKind::Mssql), "EXEC [dbo].[sp_who]");
    }

    #[test]
    fn postgres_procedure_uses_named_notation() {
        let cmd =
            Command::stored_procedure(ProviderKind::Postgres, "public.get_info", &params(), None)
                .unwrap();
        assert_eq!(
            cmd.effective_sql(ProviderKind::Postgres),
            "SELECT * FROM public.get_info(attribute_id => $1, flag => $2)"
        );
    }

    #[test]
    fn sqlite_procedure_keeps_statement_text() {
        let sql = "SELECT * FROM t WHERE id = :attribute_id";
        let cmd = Command::stored_procedure(ProviderKind::Sqlite, sql, &params(), None).unwrap();
        assert_eq!(cmd.parameters[1].name, ":flag");
        assert_eq!(cmd.effective_sql(ProviderKind::Sqlite), sql);
    }

    #[test]
    fn rejects_injection_in_procedure_names() {
        for bad in ["sp_x; DROP TABLE t", "a b", "", "x--"] {
            assert!(
                Command::stored_procedure(ProviderKind::Mssql, bad, &Parameters::new(), None)
                    .is_err(),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn positional_commands_number_their_parameters() {
        let cmd = Command::positional("x".into(), vec![1.into(), 2.into()], None);
        assert_eq!(cmd.parameters[1].name, "2");
        assert_eq!(cmd.effective_sql(ProviderKind::Postgres), "x");
    }
}
