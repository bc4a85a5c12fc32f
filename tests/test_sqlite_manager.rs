#![cfg(feature = "sqlite")]
use std::io;
use std::sync::{Arc, Mutex};

use db_manager::prelude::*;
use tokio::runtime::Runtime;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriter;

/// Collects formatted log output so tests can inspect it.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn lines(&self) -> Vec<String> {
        let buf = self.0.lock().unwrap();
        String::from_utf8_lossy(&buf).lines().map(str::to_string).collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn sqlite_manager(dir: &tempfile::TempDir) -> DbManager {
    let path = dir.path().join("manager.db");
    DbManager::new("sqlite", &format!("Data Source={}", path.display())).unwrap()
}

fn root(err: &DbManagerError) -> &DbManagerError {
    err.root_cause()
}

#[test]
fn constructor_rejects_empty_arguments() {
    assert!(matches!(
        DbManager::new("", "Data Source=x.db"),
        Err(DbManagerError::InvalidArgument { .. })
    ));
    assert!(matches!(
        DbManager::new("Microsoft.Data.Sqlite", ""),
        Err(DbManagerError::InvalidArgument { .. })
    ));
    let mgr = DbManager::new("Microsoft.Data.Sqlite", "Data Source=x.db").unwrap();
    assert_eq!(mgr.provider(), ProviderKind::Sqlite);
    assert_eq!(mgr.fix_parameter_name("id").unwrap(), ":id");
}

#[test]
fn scalar_and_select_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;
    let mgr = sqlite_manager(&dir);

    rt.block_on(async {
        let one = mgr.execute_select_statement_scalar("SELECT 1").await?;
        assert_eq!(one, DbValue::Int(1));

        let ddl = "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT NOT NULL, score REAL);
                   INSERT INTO people (name, score) VALUES ('alice', 1.5), ('bob', NULL);";
        assert_eq!(mgr.execute_non_query(ddl).await?, 2);

        let table = mgr
            .execute_select_statement("SELECT id, name, score FROM people ORDER BY id")
            .await?;
        assert_eq!(table.column_names(), vec!["id", "name", "score"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(0, "name"), Some(&DbValue::Text("alice".into())));
        assert_eq!(table.value(0, "score"), Some(&DbValue::Float(1.5)));
        assert_eq!(table.value(1, "SCORE"), Some(&DbValue::Null));
        assert!(!table.has_changes());

        let json = table.to_json_rows();
        assert_eq!(json[1]["name"], "bob");

        let none = mgr
            .execute_select_statement_scalar("SELECT name FROM people WHERE id = 99")
            .await?;
        assert!(none.is_null());
        Ok::<(), DbManagerError>(())
    })?;
    Ok(())
}

#[test]
fn non_query_counts_affected_rows() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;
    let mgr = sqlite_manager(&dir);

    rt.block_on(async {
        assert_eq!(mgr.execute_non_query("CREATE TABLE t (v INTEGER)").await?, 0);
        assert_eq!(
            mgr.execute_non_query("INSERT INTO t VALUES (1), (2), (3)").await?,
            3
        );
        assert_eq!(mgr.execute_non_query("UPDATE t SET v = v + 1 WHERE v > 1").await?, 2);
        assert_eq!(mgr.execute_non_query("DELETE FROM t WHERE v = 99").await?, 0);
        Ok::<(), DbManagerError>(())
    })?;
    Ok(())
}

#[test]
fn named_parameters_bind_with_or_without_prefix() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;
    let mgr = sqlite_manager(&dir);

    rt.block_on(async {
        mgr.execute_non_query(
            "CREATE TABLE items (id INTEGER PRIMARY KEY, label TEXT);
             INSERT INTO items (label) VALUES ('a'), ('b'), ('c');",
        )
        .await?;

        let params = Parameters::new().with("min", 2).with(":label", "c");
        let table = mgr
            .execute_stored_procedure(
                &params,
                "SELECT id, label FROM items WHERE id >= :min AND label <> :label",
            )
            .await?;
        assert_eq!(table.len(), 1);
        assert_eq!(table.value(0, "label"), Some(&DbValue::Text("b".into())));

        let count = mgr
            .execute_stored_procedure_scalar(
                &Parameters::new().with("min", 1),
                "SELECT COUNT(*) FROM items WHERE id >= :min",
            )
            .await?;
        assert_eq!(count.as_int(), Some(3));
        Ok::<(), DbManagerError>(())
    })?;
    Ok(())
}

#[test]
fn failures_are_wrapped_with_operation_name() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;
    let mgr = sqlite_manager(&dir);

    rt.block_on(async {
        let err = mgr
            .execute_select_statement("SELECT * FROM missing_table")
            .await
            .unwrap_err();
        match &err {
            DbManagerError::OperationFailed { operation, .. } => {
                assert!(operation.ends_with("DbManager::execute_select_statement()"));
            }
            other => panic!("expected OperationFailed, got {other:?}"),
        }
        assert!(matches!(root(&err), DbManagerError::SqliteError(_)));
        assert!(err.to_string().ends_with("- Exception thrown"));

        let bad_param = Parameters::new().with("not a name", 1);
        let err = mgr
            .execute_stored_procedure(&bad_param, "SELECT :x")
            .await
            .unwrap_err();
        assert!(matches!(root(&err), DbManagerError::ParameterError(_)));

        let unknown = Parameters::new().with("other", 1);
        let err = mgr
            .execute_stored_procedure_scalar(&unknown, "SELECT :x")
            .await
            .unwrap_err();
        assert!(matches!(root(&err), DbManagerError::ParameterError(_)));
    });
    Ok(())
}

#[test]
fn connection_string_errors_surface_per_call() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let mgr = DbManager::new("sqlite", "Mode=ReadWrite")?;

    rt.block_on(async {
        let err = mgr.execute_non_query("SELECT 1").await.unwrap_err();
        assert!(matches!(root(&err), DbManagerError::ConfigError(_)));
    });
    Ok(())
}

#[test]
fn long_running_command_times_out() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;
    let mut mgr = sqlite_manager(&dir);
    mgr.set_command_timeout(1);

    rt.block_on(async {
        let err = mgr
            .execute_select_statement_scalar(
                "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) SELECT MAX(x) FROM c",
            )
            .await
            .unwrap_err();
        assert!(matches!(root(&err), DbManagerError::Timeout(1)));
    });
    Ok(())
}

#[test]
fn manager_from_json_config() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;
    let cfg_path = dir.path().join("db.json");
    let db_path = dir.path().join("cfg.db");
    let json = serde_json::json!({
        "provider": "System.Data.SQLite",
        "connection_string": format!("Data Source={}", db_path.display()),
        "command_timeout_secs": 30
    });
    std::fs::write(&cfg_path, json.to_string())?;

    let mgr = DbManager::from_config(&ManagerConfig::from_json_file(&cfg_path)?)?;
    assert_eq!(mgr.command_timeout(), 30);
    let value = rt.block_on(mgr.execute_select_statement_scalar("SELECT 'ok'"))?;
    assert_eq!(value.as_text(), Some("ok"));
    Ok(())
}

#[test]
fn failures_log_operation_then_error() -> Result<(), Box<dyn std::error::Error>> {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_target(false)
        .with_max_level(Level::ERROR)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let dir = tempfile::tempdir()?;
    let mgr = sqlite_manager(&dir);

    let err = rt
        .block_on(mgr.execute_non_query("NOT SQL AT ALL"))
        .unwrap_err();
    let driver_message = err.root_cause().to_string();

    let lines = logs.lines();
    let header = lines
        .iter()
        .position(|l| l.contains("ERROR") && l.ends_with("DbManager::execute_non_query() - Exception thrown"))
        .ok_or("missing operation line")?;
    assert!(lines[header + 1].contains("ERROR"));
    assert!(lines[header + 1].ends_with(&driver_message));

    let err = DbManager::new("sqlite", "").unwrap_err();
    let lines = logs.lines();
    let header = lines
        .iter()
        .position(|l| l.ends_with("DbManager::new() - Exception thrown"))
        .ok_or("missing constructor line")?;
    assert!(lines[header + 1].ends_with(&err.to_string()));
    Ok(())
}
