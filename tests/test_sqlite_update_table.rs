#![cfg(feature = "sqlite")]
use db_manager::prelude::*;
use tokio::runtime::Runtime;

const SELECT_ALL: &str = "SELECT id, name, qty FROM stock ORDER BY id";

async fn seeded(dir: &tempfile::TempDir) -> Result<DbManager, DbManagerError> {
    let path = dir.path().join("update.db");
    let mgr = DbManager::new("sqlite", &format!("Data Source={}", path.display()))?;
    mgr.execute_non_query(
        "CREATE TABLE stock (id INTEGER PRIMARY KEY, name TEXT NOT NULL, qty INTEGER);
         INSERT INTO stock (id, name, qty) VALUES (1, 'bolt', 10), (2, 'nut', 20), (3, 'gear', 5);",
    )
    .await?;
    Ok(mgr)
}

#[test]
fn insert_update_delete_with_catalog_keys() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;

    rt.block_on(async {
        let mgr = seeded(&dir).await?;
        let mut table = mgr.execute_select_statement(SELECT_ALL).await?;
        assert!(table.primary_key().is_empty());

        table.set(0, "qty", 11)?;
        table.delete(2)?;
        table.add_row(vec![DbValue::Int(4), "washer".into(), 100.into()])?;
        assert_eq!(table.pending_changes(), vec![0, 2, 3]);

        let affected = mgr.update_table(SELECT_ALL, &mut table).await?;
        assert_eq!(affected, 3);
        assert!(!table.has_changes());
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows().len(), 3);

        let reread = mgr.execute_select_statement(SELECT_ALL).await?;
        assert_eq!(reread.len(), 3);
        assert_eq!(reread.value(0, "qty"), Some(&DbValue::Int(11)));
        assert_eq!(reread.value(1, "name"), Some(&DbValue::Text("nut".into())));
        assert_eq!(reread.value(2, "name"), Some(&DbValue::Text("washer".into())));
        Ok::<(), DbManagerError>(())
    })?;
    Ok(())
}

#[test]
fn declared_keys_and_auto_increment_columns() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;

    rt.block_on(async {
        let mgr = seeded(&dir).await?;
        let mut table = mgr
            .execute_select_statement("SELECT id, name, qty FROM stock WHERE qty > 6 ORDER BY id")
            .await?;
        table.set_primary_key(&["name"])?;
        table.set_auto_increment("id")?;

        table.set(1, "qty", DbValue::Null)?;
        table.add_row(vec![DbValue::Null, "spring".into(), 7.into()])?;

        let affected = mgr.update_table(SELECT_ALL, &mut table).await?;
        assert_eq!(affected, 2);

        let qty = mgr
            .execute_select_statement_scalar("SELECT qty FROM stock WHERE name = 'nut'")
            .await?;
        assert!(qty.is_null());
        let new_id = mgr
            .execute_select_statement_scalar("SELECT id FROM stock WHERE name = 'spring'")
            .await?;
        assert_eq!(new_id.as_int(), Some(4));
        Ok::<(), DbManagerError>(())
    })?;
    Ok(())
}

#[test]
fn rowid_alias_is_generated_on_insert() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;

    rt.block_on(async {
        let mgr = seeded(&dir).await?;
        let mut table = mgr.execute_select_statement(SELECT_ALL).await?;
        table.add_row(vec![DbValue::Null, "rivet".into(), 3.into()])?;

        assert_eq!(mgr.update_table(SELECT_ALL, &mut table).await?, 1);
        assert!(table.columns()[0].auto_increment);
        assert!(!table.columns()[1].auto_increment);

        let id = mgr
            .execute_select_statement_scalar("SELECT id FROM stock WHERE name = 'rivet'")
            .await?;
        assert_eq!(id.as_int(), Some(4));
        Ok::<(), DbManagerError>(())
    })?;
    Ok(())
}

#[test]
fn composite_keys_are_not_treated_as_generated() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("composite.db");

    rt.block_on(async {
        let mgr = DbManager::new("sqlite", &format!("Data Source={}", path.display()))?;
        mgr.execute_non_query(
            "CREATE TABLE pairs (a INTEGER NOT NULL, b INTEGER NOT NULL, PRIMARY KEY (a, b))",
        )
        .await?;
        let select = "SELECT a, b FROM pairs";
        let mut table = mgr.execute_select_statement(select).await?;
        table.add_row(vec![1.into(), 2.into()])?;

        assert_eq!(mgr.update_table(select, &mut table).await?, 1);
        assert!(table.columns().iter().all(|c| !c.auto_increment));
        Ok::<(), DbManagerError>(())
    })?;
    Ok(())
}

#[test]
fn stale_rows_raise_concurrency_violation() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;

    rt.block_on(async {
        let mgr = seeded(&dir).await?;
        let mut table = mgr.execute_select_statement(SELECT_ALL).await?;

        mgr.execute_non_query("DELETE FROM stock WHERE id = 2").await?;

        table.set(0, "qty", 12)?;
        table.set(1, "qty", 21)?;
        table.set(2, "qty", 6)?;

        let err = mgr.update_table(SELECT_ALL, &mut table).await.unwrap_err();
        assert!(matches!(
            err.root_cause(),
            DbManagerError::ConcurrencyViolation(_)
        ));

        // rows before the failure are written and accepted, the rest stay pending
        assert_eq!(table.rows()[0].state(), RowState::Unchanged);
        assert_eq!(table.rows()[1].state(), RowState::Modified);
        assert_eq!(table.rows()[2].state(), RowState::Modified);
        let qty = mgr
            .execute_select_statement_scalar("SELECT qty FROM stock WHERE id = 1")
            .await?;
        assert_eq!(qty.as_int(), Some(12));
        Ok::<(), DbManagerError>(())
    })?;
    Ok(())
}

#[test]
fn unsupported_select_is_rejected_before_connecting() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let mgr = DbManager::new("sqlite", "Data Source=/nonexistent/dir/never.db;Mode=ReadWrite")?;
    let mut table = DataTable::new(vec![DataColumn::new("a")]);
    table.add_row(vec![1.into()])?;

    rt.block_on(async {
        let err = mgr
            .update_table("SELECT a.x FROM a JOIN b ON a.id = b.id", &mut table)
            .await
            .unwrap_err();
        assert!(matches!(err.root_cause(), DbManagerError::ConfigError(_)));
        assert!(table.has_changes());
    });
    Ok(())
}

#[test]
fn nothing_to_write_returns_zero() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;

    rt.block_on(async {
        let mgr = seeded(&dir).await?;
        let mut table = mgr.execute_select_statement(SELECT_ALL).await?;
        assert_eq!(mgr.update_table(SELECT_ALL, &mut table).await?, 0);
        Ok::<(), DbManagerError>(())
    })?;
    Ok(())
}
