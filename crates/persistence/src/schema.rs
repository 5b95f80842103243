//! ScyllaDB schema creation (spec §3's data model, one table per entity,
//! partitioned by `user_id` — the teacher's raw-CQL-in-a-function pattern).

use scylla::Session;

use crate::error::PersistenceError;

pub async fn create_keyspace(session: &Session, keyspace: &str, replication_factor: u8) -> Result<(), PersistenceError> {
    let query = format!(
        "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
        keyspace, replication_factor
    );
    session.query_unpaged(query, &[]).await.map_err(|e| PersistenceError::SchemaError(format!("create keyspace: {e}")))?;
    Ok(())
}

pub async fn create_tables(session: &Session, keyspace: &str) -> Result<(), PersistenceError> {
    // Complex/nested fields (topics, tool_calls, aliases, attributes,
    // embeddings) travel as a `data_json` blob, the same blob-next-to-keys
    // shape the teacher uses for `sessions.memory_json`/`metadata_json`;
    // only the columns needed for partition/clustering/ordering are real.
    let episodes = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {keyspace}.episodes (
            user_id TEXT,
            episode_id UUID,
            state TEXT,
            last_activity_at TIMESTAMP,
            data_json TEXT,
            PRIMARY KEY ((user_id), episode_id)
        ) WITH CLUSTERING ORDER BY (episode_id DESC)
        "#
    );
    session.query_unpaged(episodes, &[]).await.map_err(|e| PersistenceError::SchemaError(format!("episodes: {e}")))?;

    let turns = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {keyspace}.turns (
            episode_id UUID,
            turn_id UUID,
            created_at TIMESTAMP,
            data_json TEXT,
            PRIMARY KEY ((episode_id), turn_id)
        ) WITH CLUSTERING ORDER BY (turn_id ASC)
        "#
    );
    session.query_unpaged(turns, &[]).await.map_err(|e| PersistenceError::SchemaError(format!("turns: {e}")))?;

    let memory_facts = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {keyspace}.memory_facts (
            user_id TEXT,
            fact_id UUID,
            text TEXT,
            source TEXT,
            data_json TEXT,
            PRIMARY KEY ((user_id), fact_id)
        )
        "#
    );
    session.query_unpaged(memory_facts, &[]).await.map_err(|e| PersistenceError::SchemaError(format!("memory_facts: {e}")))?;

    let entities = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {keyspace}.entities (
            user_id TEXT,
            entity_id UUID,
            entity_type TEXT,
            canonical_name TEXT,
            data_json TEXT,
            PRIMARY KEY ((user_id), entity_id)
        )
        "#
    );
    session.query_unpaged(entities, &[]).await.map_err(|e| PersistenceError::SchemaError(format!("entities: {e}")))?;

    let relationships = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {keyspace}.relationships (
            user_id TEXT,
            relationship_id UUID,
            from_entity_id UUID,
            to_entity_id UUID,
            data_json TEXT,
            PRIMARY KEY ((user_id), relationship_id)
        )
        "#
    );
    session
        .query_unpaged(relationships, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("relationships: {e}")))?;

    let context_cache_entries = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {keyspace}.context_cache_entries (
            fingerprint TEXT,
            source_kind TEXT,
            value_json TEXT,
            created_at TIMESTAMP,
            PRIMARY KEY (fingerprint)
        ) WITH default_time_to_live = 3600
        "#
    );
    session
        .query_unpaged(context_cache_entries, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("context_cache_entries: {e}")))?;

    let feedback_records = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {keyspace}.feedback_records (
            user_id TEXT,
            feedback_id UUID,
            recorded_at TIMESTAMP,
            data_json TEXT,
            PRIMARY KEY ((user_id), feedback_id)
        )
        "#
    );
    session
        .query_unpaged(feedback_records, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("feedback_records: {e}")))?;

    let satisfaction_samples = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {keyspace}.satisfaction_samples (
            user_id TEXT,
            turn_id UUID,
            recorded_at TIMESTAMP,
            data_json TEXT,
            PRIMARY KEY ((user_id), turn_id)
        )
        "#
    );
    session
        .query_unpaged(satisfaction_samples, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("satisfaction_samples: {e}")))?;

    let chat_sessions = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {keyspace}.chat_sessions (
            user_id TEXT,
            session_id UUID,
            updated_at TIMESTAMP,
            data_json TEXT,
            PRIMARY KEY ((user_id), session_id)
        ) WITH CLUSTERING ORDER BY (session_id DESC)
        "#
    );
    session
        .query_unpaged(chat_sessions, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("chat_sessions: {e}")))?;

    let chat_session_messages = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {keyspace}.chat_session_messages (
            session_id UUID,
            created_at TIMESTAMP,
            data_json TEXT,
            PRIMARY KEY ((session_id), created_at)
        ) WITH CLUSTERING ORDER BY (created_at ASC)
        "#
    );
    session
        .query_unpaged(chat_session_messages, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("chat_session_messages: {e}")))?;

    // Generic operational audit trail (no RBI-specific compliance logic:
    // spec's Non-goals exclude that, this is just an append-only event log).
    let audit_log = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {keyspace}.audit_log (
            partition_date TEXT,
            id TIMEUUID,
            actor TEXT,
            event_type TEXT,
            resource TEXT,
            outcome TEXT,
            details TEXT,
            PRIMARY KEY ((partition_date), id)
        ) WITH CLUSTERING ORDER BY (id DESC)
          AND default_time_to_live = 7776000
        "#
    );
    session.query_unpaged(audit_log, &[]).await.map_err(|e| PersistenceError::SchemaError(format!("audit_log: {e}")))?;

    tracing::info!("all tables created");
    Ok(())
}
