//! Core schema (spec.md §6.1): `relay`, `event`, `event_relay`, `metadata`,
//! `relay_metadata`, `service_state`, plus the `tags_to_tagvalues` function
//! the `event.tagvalues` generated column depends on and the indexes spec.md
//! §6.1 calls out by name.
//!
//! The generated column and GIN index don't map onto sea_orm_migration's
//! `Table::create` builder, so this migration speaks raw SQL throughout via
//! `execute_unprepared`, the way the teacher's own `setup_db` already issues
//! raw `Statement`s for backend-specific DDL.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION tags_to_tagvalues(tags JSONB)
            RETURNS TEXT[]
            LANGUAGE SQL
            IMMUTABLE
            AS $$
                SELECT COALESCE(array_agg(tag->>1), ARRAY[]::TEXT[])
                FROM jsonb_array_elements(tags) AS tag
                WHERE jsonb_typeof(tag) = 'array'
                  AND char_length(tag->>0) = 1
                  AND jsonb_array_length(tag) > 1;
            $$;
            "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE TABLE IF NOT EXISTS relay (
                url TEXT PRIMARY KEY,
                network TEXT NOT NULL,
                discovered_at BIGINT NOT NULL
            );
            "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE TABLE IF NOT EXISTS event (
                id BYTEA PRIMARY KEY,
                pubkey BYTEA NOT NULL,
                created_at BIGINT NOT NULL,
                kind INTEGER NOT NULL,
                tags JSONB NOT NULL,
                tagvalues TEXT[] GENERATED ALWAYS AS (tags_to_tagvalues(tags)) STORED,
                content TEXT NOT NULL,
                sig BYTEA NOT NULL
            );
            "#,
        )
        .await?;

        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS event_created_at_id_idx ON event (created_at, id);",
        )
        .await?;
        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS event_tagvalues_gin_idx ON event USING GIN (tagvalues);",
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE TABLE IF NOT EXISTS event_relay (
                event_id BYTEA REFERENCES event(id) ON DELETE CASCADE,
                relay_url TEXT REFERENCES relay(url) ON DELETE CASCADE,
                seen_at BIGINT NOT NULL,
                PRIMARY KEY (event_id, relay_url)
            );
            "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE TABLE IF NOT EXISTS metadata (
                id BYTEA,
                type TEXT,
                data JSONB NOT NULL,
                PRIMARY KEY (id, type)
            );
            "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE TABLE IF NOT EXISTS relay_metadata (
                relay_url TEXT REFERENCES relay(url) ON DELETE CASCADE,
                generated_at BIGINT NOT NULL,
                metadata_type TEXT NOT NULL,
                metadata_id BYTEA NOT NULL,
                PRIMARY KEY (relay_url, generated_at, metadata_type),
                FOREIGN KEY (metadata_id, metadata_type) REFERENCES metadata(id, type) ON DELETE CASCADE
            );
            "#,
        )
        .await?;

        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS relay_metadata_latest_idx \
             ON relay_metadata (relay_url, metadata_type, generated_at DESC);",
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE TABLE IF NOT EXISTS service_state (
                service_name TEXT,
                state_type TEXT,
                state_key TEXT,
                state_value JSONB NOT NULL DEFAULT '{}',
                updated_at BIGINT NOT NULL,
                PRIMARY KEY (service_name, state_type, state_key)
            );
            "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE MATERIALIZED VIEW IF NOT EXISTS relay_latest_metadata AS
            SELECT DISTINCT ON (relay_url, metadata_type)
                relay_url, metadata_type, metadata_id, generated_at
            FROM relay_metadata
            ORDER BY relay_url, metadata_type, generated_at DESC;
            "#,
        )
        .await?;
        db.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS relay_latest_metadata_pk \
             ON relay_latest_metadata (relay_url, metadata_type);",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP MATERIALIZED VIEW IF EXISTS relay_latest_metadata;")
            .await?;
        db.execute_unprepared("DROP TABLE IF EXISTS service_state;")
            .await?;
        db.execute_unprepared("DROP TABLE IF EXISTS relay_metadata;")
            .await?;
        db.execute_unprepared("DROP TABLE IF EXISTS metadata;")
            .await?;
        db.execute_unprepared("DROP TABLE IF EXISTS event_relay;")
            .await?;
        db.execute_unprepared("DROP TABLE IF EXISTS event;").await?;
        db.execute_unprepared("DROP TABLE IF EXISTS relay;").await?;
        db.execute_unprepared("DROP FUNCTION IF EXISTS tags_to_tagvalues(JSONB);")
            .await?;
        Ok(())
    }
}
