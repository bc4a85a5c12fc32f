//! Runs against real servers when their connection strings are provided:
//! `DB_MANAGER_MSSQL` (ADO string) and `DB_MANAGER_POSTGRES` (ADO string or URL).
#![cfg(any(feature = "mssql", feature = "postgres"))]
use db_manager::prelude::*;
use tokio::runtime::Runtime;

#[allow(dead_code)]
fn connection_from_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(feature = "mssql")]
#[test]
fn mssql_server_info_and_non_query() -> Result<(), Box<dyn std::error::Error>> {
    let Some(conn) = connection_from_env("DB_MANAGER_MSSQL") else {
        eprintln!("DB_MANAGER_MSSQL not set; skipping");
        return Ok(());
    };
    let rt = Runtime::new()?;
    let mgr = DbManager::new("System.Data.SqlClient", &conn)?;

    rt.block_on(async {
        let info = mgr
            .execute_stored_procedure(&Parameters::new().with("attribute_id", 1), "sp_server_info")
            .await?;
        assert_eq!(info.len(), 1);
        let value = info.value(0, "attribute_value").and_then(DbValue::as_text);
        assert!(value.is_some_and(|v| v.contains("Microsoft SQL Server")));

        let scalar = mgr
            .execute_stored_procedure_scalar(
                &Parameters::new().with("@attribute_id", 2),
                "sp_server_info",
            )
            .await?;
        assert!(scalar.as_int().is_some());

        let times = mgr
            .execute_select_statement(
                "SELECT CAST('2024-03-01T10:00:00+02:00' AS datetimeoffset) AS at, \
                 CAST('12:30:00' AS time) AS t",
            )
            .await?;
        assert_eq!(
            times.value(0, "at").and_then(DbValue::as_timestamp),
            chrono::NaiveDate::from_ymd_opt(2024, 3, 1).and_then(|d| d.and_hms_opt(8, 0, 0))
        );
        assert_eq!(times.value(0, "t").and_then(DbValue::as_text), Some("12:30:00"));

        let err = mgr
            .execute_select_statement("SELECT CAST('<a/>' AS xml) AS doc")
            .await
            .unwrap_err();
        assert!(matches!(err.root_cause(), DbManagerError::ExecutionError(_)));

        assert_eq!(mgr.execute_non_query("IF 1=0 SELECT NULL").await?, 0);
        assert_eq!(mgr.execute_select_statement_scalar("SELECT 1").await?.as_int(), Some(1));
        Ok::<(), DbManagerError>(())
    })?;
    Ok(())
}

#[cfg(feature = "postgres")]
#[test]
fn postgres_function_and_update() -> Result<(), Box<dyn std::error::Error>> {
    let Some(conn) = connection_from_env("DB_MANAGER_POSTGRES") else {
        eprintln!("DB_MANAGER_POSTGRES not set; skipping");
        return Ok(());
    };
    let rt = Runtime::new()?;
    let mgr = DbManager::new("Npgsql", &conn)?;

    rt.block_on(async {
        mgr.execute_non_query(
            "DROP TABLE IF EXISTS dbm_items;
             CREATE TABLE dbm_items (id INT PRIMARY KEY, label TEXT);
             INSERT INTO dbm_items VALUES (1, 'a'), (2, 'b');
             CREATE OR REPLACE FUNCTION dbm_label(item_id INT) RETURNS TEXT
                 AS $$ SELECT label FROM dbm_items WHERE id = item_id $$ LANGUAGE sql;",
        )
        .await?;

        let label = mgr
            .execute_stored_procedure_scalar(&Parameters::new().with("item_id", 2), "dbm_label")
            .await?;
        assert_eq!(label.as_text(), Some("b"));

        let select = "SELECT id, label FROM dbm_items ORDER BY id";
        let mut table = mgr.execute_select_statement(select).await?;
        table.set(0, "label", "z")?;
        table.delete(1)?;
        assert_eq!(mgr.update_table(select, &mut table).await?, 2);
        assert_eq!(
            mgr.execute_select_statement_scalar("SELECT COUNT(*) FROM dbm_items")
                .await?
                .as_int(),
            Some(1)
        );

        mgr.execute_non_query("DROP FUNCTION dbm_label(INT); DROP TABLE dbm_items;")
            .await?;
        Ok::<(), DbManagerError>(())
    })?;
    Ok(())
}
