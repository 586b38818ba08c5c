use sqlx::PgPool;

/// All `id` columns must be bigint (entity tables) or smallint (lookup tables).
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_all_pks_are_correct_type(pool: PgPool) {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT table_name, data_type
         FROM information_schema.columns
         WHERE column_name = 'id'
           AND table_schema = 'public'
           AND table_name != '_sqlx_migrations'
         ORDER BY table_name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert!(!rows.is_empty());
    for (table, data_type) in &rows {
        assert!(
            data_type == "bigint" || data_type == "smallint",
            "Table {table}.id should be bigint or smallint, got {data_type}"
        );
    }
}

/// Every table (except _sqlx_migrations) must have created_at and updated_at as timestamptz.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_all_tables_have_timestamps(pool: PgPool) {
    let tables: Vec<(String,)> = sqlx::query_as(
        "SELECT table_name
         FROM information_schema.tables
         WHERE table_schema = 'public'
           AND table_type = 'BASE TABLE'
           AND table_name != '_sqlx_migrations'
         ORDER BY table_name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    for (table,) in &tables {
        for col in ["created_at", "updated_at"] {
            let data_type: Option<(String,)> = sqlx::query_as(
                "SELECT data_type
                 FROM information_schema.columns
                 WHERE table_schema = 'public' AND table_name = $1 AND column_name = $2",
            )
            .bind(table)
            .bind(col)
            .fetch_optional(&pool)
            .await
            .unwrap();

            let (data_type,) =
                data_type.unwrap_or_else(|| panic!("Table {table} is missing column {col}"));
            assert_eq!(
                data_type, "timestamp with time zone",
                "Table {table}.{col} should be timestamptz, got {data_type}"
            );
        }
    }
}

/// TEXT is used for all strings.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_no_varchar_columns(pool: PgPool) {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT table_name, column_name
         FROM information_schema.columns
         WHERE table_schema = 'public'
           AND data_type = 'character varying'
           AND table_name != '_sqlx_migrations'",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert!(rows.is_empty(), "Found varchar columns: {rows:?}");
}

/// The database refuses a completed kind without a URL and a URL on a
/// non-completed kind.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_scene_url_requires_completed_status(pool: PgPool) {
    let project_id: (i64,) =
        sqlx::query_as("INSERT INTO projects (owner_id, name) VALUES (1, 'p') RETURNING id")
            .fetch_one(&pool)
            .await
            .unwrap();

    let completed_without_url = sqlx::query(
        "INSERT INTO scenes (project_id, scene_number, image_status_id) VALUES ($1, 1, 6)",
    )
    .bind(project_id.0)
    .execute(&pool)
    .await;
    assert!(completed_without_url.is_err());

    let url_while_pending = sqlx::query(
        "INSERT INTO scenes (project_id, scene_number, audio_status_id, audio_url) \
         VALUES ($1, 1, 2, 'https://cdn/a.mp3')",
    )
    .bind(project_id.0)
    .execute(&pool)
    .await;
    assert!(url_while_pending.is_err());
}

/// Half-set lock columns are rejected.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_lock_columns_are_set_together(pool: PgPool) {
    let result = sqlx::query(
        "INSERT INTO projects (owner_id, name, lock_session_id) VALUES (1, 'p', 'session')",
    )
    .execute(&pool)
    .await;
    assert!(result.is_err());
}
