//! ScyllaDB schema creation

use scylla::Session;

use crate::error::PersistenceError;

/// Create the keyspace if it doesn't exist
pub async fn create_keyspace(
    session: &Session,
    keyspace: &str,
    replication_factor: u8,
) -> Result<(), PersistenceError> {
    let query = format!(
        "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
        keyspace, replication_factor
    );

    session
        .query_unpaged(query, &[])
        .await
        .map_err(|e| PersistenceError::Schema(format!("Failed to create keyspace: {}", e)))?;

    Ok(())
}

/// Create all required tables and indexes
pub async fn create_tables(session: &Session, keyspace: &str) -> Result<(), PersistenceError> {
    let statements = vec![
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {ks}.campaigns (
                id UUID,
                name TEXT,
                status TEXT,
                script_ref TEXT,
                retry_max_attempts INT,
                retry_delay_minutes INT,
                daily_call_cap INT,
                utc_offset_hours INT,
                created_at TIMESTAMP,
                PRIMARY KEY (id)
            )
        "#,
            ks = keyspace
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {ks}.contacts (
                id UUID,
                campaign_id UUID,
                phone TEXT,
                full_name TEXT,
                company TEXT,
                status TEXT,
                dnc BOOLEAN,
                last_dispatched_at TIMESTAMP,
                created_at TIMESTAMP,
                PRIMARY KEY (id)
            )
        "#,
            ks = keyspace
        ),
        format!("CREATE INDEX IF NOT EXISTS ON {}.contacts (phone)", keyspace),
        format!("CREATE INDEX IF NOT EXISTS ON {}.contacts (status)", keyspace),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {ks}.calls (
                id UUID,
                contact_id UUID,
                campaign_id UUID,
                direction TEXT,
                status TEXT,
                external_ref TEXT,
                started_at TIMESTAMP,
                ended_at TIMESTAMP,
                duration_seconds INT,
                cost_telephony DOUBLE,
                cost_tts DOUBLE,
                cost_asr DOUBLE,
                cost_llm DOUBLE,
                outcome TEXT,
                recording_url TEXT,
                created_at TIMESTAMP,
                PRIMARY KEY (id)
            )
        "#,
            ks = keyspace
        ),
        format!("CREATE INDEX IF NOT EXISTS ON {}.calls (contact_id)", keyspace),
        format!("CREATE INDEX IF NOT EXISTS ON {}.calls (campaign_id)", keyspace),
        format!("CREATE INDEX IF NOT EXISTS ON {}.calls (status)", keyspace),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {ks}.turns (
                call_id UUID,
                turn_number INT,
                state TEXT,
                user_input TEXT,
                bot_response TEXT,
                confidence FLOAT,
                created_at TIMESTAMP,
                PRIMARY KEY ((call_id), turn_number)
            ) WITH CLUSTERING ORDER BY (turn_number ASC)
        "#,
            ks = keyspace
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {ks}.qualification_data (
                contact_id UUID,
                score INT,
                timeline TEXT,
                budget_range TEXT,
                properties_count INT,
                needs_video BOOLEAN,
                needs_photos BOOLEAN,
                decision_maker BOOLEAN,
                updated_at TIMESTAMP,
                PRIMARY KEY (contact_id)
            )
        "#,
            ks = keyspace
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {ks}.dnc_entries (
                phone TEXT,
                reason TEXT,
                source TEXT,
                created_at TIMESTAMP,
                PRIMARY KEY (phone)
            )
        "#,
            ks = keyspace
        ),
    ];

    for statement in statements {
        session
            .query_unpaged(statement, &[])
            .await
            .map_err(|e| PersistenceError::Schema(format!("Failed to create table: {}", e)))?;
    }

    tracing::info!("All tables created successfully");
    Ok(())
}
