//! Bulk, array-parameter, idempotent stored functions (spec.md §6.2). The
//! Brotr facade (`src/db/facade.rs`) is a thin Rust shim over exactly these.
//!
//! Every insert function uses `ON CONFLICT DO NOTHING`; `service_state_upsert`
//! is the one exception, per spec.md §6.2. All are `SECURITY INVOKER`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION relay_insert(
                urls TEXT[], networks TEXT[], discovered_ats BIGINT[]
            ) RETURNS INT LANGUAGE plpgsql SECURITY INVOKER AS $$
            DECLARE
                inserted INT;
            BEGIN
                INSERT INTO relay (url, network, discovered_at)
                SELECT * FROM unnest(urls, networks, discovered_ats)
                ON CONFLICT (url) DO NOTHING;
                GET DIAGNOSTICS inserted = ROW_COUNT;
                RETURN inserted;
            END;
            $$;
            "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION event_insert(
                ids BYTEA[], pubkeys BYTEA[], created_ats BIGINT[], kinds INT[],
                tags JSONB[], contents TEXT[], sigs BYTEA[]
            ) RETURNS INT LANGUAGE plpgsql SECURITY INVOKER AS $$
            DECLARE
                inserted INT;
            BEGIN
                INSERT INTO event (id, pubkey, created_at, kind, tags, content, sig)
                SELECT * FROM unnest(ids, pubkeys, created_ats, kinds, tags, contents, sigs)
                ON CONFLICT (id) DO NOTHING;
                GET DIAGNOSTICS inserted = ROW_COUNT;
                RETURN inserted;
            END;
            $$;
            "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION metadata_insert(
                ids BYTEA[], types TEXT[], values JSONB[]
            ) RETURNS INT LANGUAGE plpgsql SECURITY INVOKER AS $$
            DECLARE
                inserted INT;
            BEGIN
                INSERT INTO metadata (id, type, data)
                SELECT * FROM unnest(ids, types, values)
                ON CONFLICT (id, type) DO NOTHING;
                GET DIAGNOSTICS inserted = ROW_COUNT;
                RETURN inserted;
            END;
            $$;
            "#,
        )
        .await?;

        // Plain (non-cascade) junction inserts: assume the owning relay and
        // event/metadata rows already exist.
        db.execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION event_relay_insert(
                ids BYTEA[], relay_urls TEXT[], seen_ats BIGINT[]
            ) RETURNS INT LANGUAGE plpgsql SECURITY INVOKER AS $$
            DECLARE
                inserted INT;
            BEGIN
                INSERT INTO event_relay (event_id, relay_url, seen_at)
                SELECT * FROM unnest(ids, relay_urls, seen_ats)
                ON CONFLICT (event_id, relay_url) DO NOTHING;
                GET DIAGNOSTICS inserted = ROW_COUNT;
                RETURN inserted;
            END;
            $$;
            "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION relay_metadata_insert(
                relay_urls TEXT[], generated_ats BIGINT[], metadata_types TEXT[], metadata_ids BYTEA[]
            ) RETURNS INT LANGUAGE plpgsql SECURITY INVOKER AS $$
            DECLARE
                inserted INT;
            BEGIN
                INSERT INTO relay_metadata (relay_url, generated_at, metadata_type, metadata_id)
                SELECT * FROM unnest(relay_urls, generated_ats, metadata_types, metadata_ids)
                ON CONFLICT (relay_url, generated_at, metadata_type) DO NOTHING;
                GET DIAGNOSTICS inserted = ROW_COUNT;
                RETURN inserted;
            END;
            $$;
            "#,
        )
        .await?;

        // Cascade variants: upsert the owning relay (and, for metadata, the
        // content-addressed document) before the junction, all atomically.
        db.execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION event_relay_insert_cascade(
                ids BYTEA[], pubkeys BYTEA[], created_ats BIGINT[], kinds INT[], tags JSONB[],
                contents TEXT[], sigs BYTEA[], relay_urls TEXT[], seen_ats BIGINT[],
                networks TEXT[], discovered_ats BIGINT[]
            ) RETURNS INT LANGUAGE plpgsql SECURITY INVOKER AS $$
            DECLARE
                inserted INT;
            BEGIN
                INSERT INTO relay (url, network, discovered_at)
                SELECT DISTINCT ON (u.relay_url) u.relay_url, u.network, u.discovered_at
                FROM unnest(relay_urls, networks, discovered_ats) AS u(relay_url, network, discovered_at)
                ON CONFLICT (url) DO NOTHING;

                INSERT INTO event (id, pubkey, created_at, kind, tags, content, sig)
                SELECT * FROM unnest(ids, pubkeys, created_ats, kinds, tags, contents, sigs)
                ON CONFLICT (id) DO NOTHING;

                INSERT INTO event_relay (event_id, relay_url, seen_at)
                SELECT * FROM unnest(ids, relay_urls, seen_ats)
                ON CONFLICT (event_id, relay_url) DO NOTHING;
                GET DIAGNOSTICS inserted = ROW_COUNT;
                RETURN inserted;
            END;
            $$;
            "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION relay_metadata_insert_cascade(
                relay_urls TEXT[], generated_ats BIGINT[], metadata_types TEXT[], metadata_ids BYTEA[],
                metadata_values JSONB[], networks TEXT[], discovered_ats BIGINT[]
            ) RETURNS INT LANGUAGE plpgsql SECURITY INVOKER AS $$
            DECLARE
                inserted INT;
            BEGIN
                INSERT INTO relay (url, network, discovered_at)
                SELECT DISTINCT ON (u.relay_url) u.relay_url, u.network, u.discovered_at
                FROM unnest(relay_urls, networks, discovered_ats) AS u(relay_url, network, discovered_at)
                ON CONFLICT (url) DO NOTHING;

                INSERT INTO metadata (id, type, data)
                SELECT DISTINCT ON (m.id, m.type) m.id, m.type, m.data
                FROM unnest(metadata_ids, metadata_types, metadata_values) AS m(id, type, data)
                ON CONFLICT (id, type) DO NOTHING;

                INSERT INTO relay_metadata (relay_url, generated_at, metadata_type, metadata_id)
                SELECT * FROM unnest(relay_urls, generated_ats, metadata_types, metadata_ids)
                ON CONFLICT (relay_url, generated_at, metadata_type) DO NOTHING;
                GET DIAGNOSTICS inserted = ROW_COUNT;
                RETURN inserted;
            END;
            $$;
            "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION service_state_upsert(
                services TEXT[], types TEXT[], keys TEXT[], values JSONB[], updated_ats BIGINT[]
            ) RETURNS INT LANGUAGE plpgsql SECURITY INVOKER AS $$
            DECLARE
                affected INT;
            BEGIN
                INSERT INTO service_state (service_name, state_type, state_key, state_value, updated_at)
                SELECT DISTINCT ON (u.service_name, u.state_type, u.state_key)
                    u.service_name, u.state_type, u.state_key, u.state_value, u.updated_at
                FROM unnest(services, types, keys, values, updated_ats)
                    AS u(service_name, state_type, state_key, state_value, updated_at)
                ORDER BY u.service_name, u.state_type, u.state_key, u.updated_at DESC
                ON CONFLICT (service_name, state_type, state_key)
                DO UPDATE SET state_value = EXCLUDED.state_value, updated_at = EXCLUDED.updated_at;
                GET DIAGNOSTICS affected = ROW_COUNT;
                RETURN affected;
            END;
            $$;
            "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION service_state_get(svc TEXT, typ TEXT, key TEXT DEFAULT NULL)
            RETURNS TABLE (
                service_name TEXT, state_type TEXT, state_key TEXT,
                state_value JSONB, updated_at BIGINT
            ) LANGUAGE SQL SECURITY INVOKER STABLE AS $$
                SELECT service_name, state_type, state_key, state_value, updated_at
                FROM service_state
                WHERE service_name = svc AND state_type = typ
                  AND (key IS NULL OR state_key = key);
            $$;
            "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION service_state_delete(
                services TEXT[], types TEXT[], keys TEXT[]
            ) RETURNS INT LANGUAGE plpgsql SECURITY INVOKER AS $$
            DECLARE
                deleted INT;
            BEGIN
                DELETE FROM service_state ss
                USING unnest(services, types, keys) AS u(service_name, state_type, state_key)
                WHERE ss.service_name = u.service_name
                  AND ss.state_type = u.state_type
                  AND ss.state_key = u.state_key;
                GET DIAGNOSTICS deleted = ROW_COUNT;
                RETURN deleted;
            END;
            $$;
            "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION orphan_event_delete(batch_size INT)
            RETURNS INT LANGUAGE plpgsql SECURITY INVOKER AS $$
            DECLARE
                deleted INT;
            BEGIN
                DELETE FROM event
                WHERE id IN (
                    SELECT e.id FROM event e
                    LEFT JOIN event_relay er ON er.event_id = e.id
                    WHERE er.event_id IS NULL
                    LIMIT batch_size
                );
                GET DIAGNOSTICS deleted = ROW_COUNT;
                RETURN deleted;
            END;
            $$;
            "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION orphan_metadata_delete(batch_size INT)
            RETURNS INT LANGUAGE plpgsql SECURITY INVOKER AS $$
            DECLARE
                deleted INT;
            BEGIN
                DELETE FROM metadata
                WHERE (id, type) IN (
                    SELECT m.id, m.type FROM metadata m
                    LEFT JOIN relay_metadata rm
                        ON rm.metadata_id = m.id AND rm.metadata_type = m.type
                    WHERE rm.metadata_id IS NULL
                    LIMIT batch_size
                );
                GET DIAGNOSTICS deleted = ROW_COUNT;
                RETURN deleted;
            END;
            $$;
            "#,
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        for func in [
            "orphan_metadata_delete(INT)",
            "orphan_event_delete(INT)",
            "service_state_delete(TEXT[], TEXT[], TEXT[])",
            "service_state_get(TEXT, TEXT, TEXT)",
            "service_state_upsert(TEXT[], TEXT[], TEXT[], JSONB[], BIGINT[])",
            "relay_metadata_insert_cascade(TEXT[], BIGINT[], TEXT[], BYTEA[], JSONB[], TEXT[], BIGINT[])",
            "event_relay_insert_cascade(BYTEA[], BYTEA[], BIGINT[], INT[], JSONB[], TEXT[], BYTEA[], TEXT[], BIGINT[], TEXT[], BIGINT[])",
            "relay_metadata_insert(TEXT[], BIGINT[], TEXT[], BYTEA[])",
            "event_relay_insert(BYTEA[], TEXT[], BIGINT[])",
            "metadata_insert(BYTEA[], TEXT[], JSONB[])",
            "event_insert(BYTEA[], BYTEA[], BIGINT[], INT[], JSONB[], TEXT[], BYTEA[])",
            "relay_insert(TEXT[], TEXT[], BIGINT[])",
        ] {
            db.execute_unprepared(&format!("DROP FUNCTION IF EXISTS {func};"))
                .await?;
        }
        Ok(())
    }
}
