use sqlx::{Executor, PgPool};
use tracing::info;

use super::manager::DatabaseError;

/// Tenant registry in the system database
pub const SYSTEM_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tenants (
    id            UUID PRIMARY KEY,
    name          TEXT NOT NULL UNIQUE,
    display_name  TEXT NOT NULL,
    database      TEXT NOT NULL UNIQUE,
    is_active     BOOLEAN NOT NULL DEFAULT TRUE,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    trashed_at    TIMESTAMPTZ,
    deleted_at    TIMESTAMPTZ
);
"#;

/// Per-tenant publishing tables. Every statement is idempotent.
pub const TENANT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id             UUID PRIMARY KEY,
    email          TEXT NOT NULL UNIQUE,
    name           TEXT NOT NULL,
    password_hash  TEXT NOT NULL,
    role           TEXT NOT NULL DEFAULT 'reader' CHECK (role IN ('reader', 'author', 'admin')),
    created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    deleted_at     TIMESTAMPTZ
);

CREATE TABLE IF NOT EXISTS books (
    id            UUID PRIMARY KEY,
    slug          TEXT NOT NULL UNIQUE,
    title         TEXT NOT NULL,
    subtitle      TEXT,
    description   TEXT,
    author_id     UUID NOT NULL REFERENCES users(id),
    price         NUMERIC(10, 2) NOT NULL CHECK (price >= 0),
    currency      TEXT NOT NULL DEFAULT 'USD',
    cover_url     TEXT,
    isbn          TEXT,
    category      TEXT,
    page_count    INTEGER CHECK (page_count IS NULL OR page_count > 0),
    status        TEXT NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'published', 'archived')),
    featured      BOOLEAN NOT NULL DEFAULT FALSE,
    published_at  TIMESTAMPTZ,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    deleted_at    TIMESTAMPTZ
);
CREATE INDEX IF NOT EXISTS books_status_idx ON books (status, published_at DESC);

CREATE TABLE IF NOT EXISTS courses (
    id                UUID PRIMARY KEY,
    slug              TEXT NOT NULL UNIQUE,
    title             TEXT NOT NULL,
    description       TEXT,
    instructor_id     UUID NOT NULL REFERENCES users(id),
    price             NUMERIC(10, 2) NOT NULL CHECK (price >= 0),
    currency          TEXT NOT NULL DEFAULT 'USD',
    level             TEXT NOT NULL DEFAULT 'beginner' CHECK (level IN ('beginner', 'intermediate', 'advanced')),
    duration_minutes  INTEGER,
    status            TEXT NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'published', 'archived')),
    published_at      TIMESTAMPTZ,
    created_at        TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at        TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    deleted_at        TIMESTAMPTZ
);

CREATE TABLE IF NOT EXISTS events (
    id           UUID PRIMARY KEY,
    slug         TEXT NOT NULL UNIQUE,
    title        TEXT NOT NULL,
    description  TEXT,
    location     TEXT,
    is_online    BOOLEAN NOT NULL DEFAULT FALSE,
    starts_at    TIMESTAMPTZ NOT NULL,
    ends_at      TIMESTAMPTZ NOT NULL,
    capacity     INTEGER CHECK (capacity IS NULL OR capacity > 0),
    price        NUMERIC(10, 2) NOT NULL CHECK (price >= 0),
    currency     TEXT NOT NULL DEFAULT 'USD',
    status       TEXT NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'published', 'archived')),
    created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    deleted_at   TIMESTAMPTZ,
    CHECK (ends_at > starts_at)
);

CREATE TABLE IF NOT EXISTS orders (
    id                 UUID PRIMARY KEY,
    order_number       TEXT NOT NULL UNIQUE,
    user_id            UUID NOT NULL REFERENCES users(id),
    status             TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'paid', 'failed', 'refunded', 'cancelled')),
    total              NUMERIC(12, 2) NOT NULL CHECK (total >= 0),
    currency           TEXT NOT NULL,
    payment_provider   TEXT,
    payment_reference  TEXT,
    paid_at            TIMESTAMPTZ,
    created_at         TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at         TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS orders_user_idx ON orders (user_id, created_at DESC);

CREATE TABLE IF NOT EXISTS order_items (
    id          UUID PRIMARY KEY,
    order_id    UUID NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
    item_type   TEXT NOT NULL CHECK (item_type IN ('book', 'course', 'event')),
    item_id     UUID NOT NULL,
    title       TEXT NOT NULL,
    unit_price  NUMERIC(10, 2) NOT NULL,
    quantity    INTEGER NOT NULL DEFAULT 1 CHECK (quantity > 0)
);
CREATE INDEX IF NOT EXISTS order_items_item_idx ON order_items (item_type, item_id);

CREATE TABLE IF NOT EXISTS enrollments (
    id                UUID PRIMARY KEY,
    user_id           UUID NOT NULL REFERENCES users(id),
    course_id         UUID NOT NULL REFERENCES courses(id),
    order_id          UUID REFERENCES orders(id),
    status            TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'completed', 'cancelled')),
    progress_percent  INTEGER NOT NULL DEFAULT 0 CHECK (progress_percent BETWEEN 0 AND 100),
    enrolled_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    completed_at      TIMESTAMPTZ,
    UNIQUE (user_id, course_id)
);

CREATE TABLE IF NOT EXISTS event_registrations (
    id              UUID PRIMARY KEY,
    event_id        UUID NOT NULL REFERENCES events(id),
    user_id         UUID NOT NULL REFERENCES users(id),
    order_id        UUID REFERENCES orders(id),
    status          TEXT NOT NULL DEFAULT 'registered' CHECK (status IN ('registered', 'cancelled')),
    attendee_name   TEXT NOT NULL,
    attendee_email  TEXT NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (event_id, user_id)
);

CREATE TABLE IF NOT EXISTS reviews (
    id          UUID PRIMARY KEY,
    book_id     UUID NOT NULL REFERENCES books(id),
    user_id     UUID NOT NULL REFERENCES users(id),
    rating      INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
    title       TEXT,
    body        TEXT,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (book_id, user_id)
);

CREATE TABLE IF NOT EXISTS blog_posts (
    id            UUID PRIMARY KEY,
    slug          TEXT NOT NULL UNIQUE,
    title         TEXT NOT NULL,
    excerpt       TEXT,
    content       TEXT NOT NULL,
    author_id     UUID NOT NULL REFERENCES users(id),
    tags          TEXT[] NOT NULL DEFAULT '{}',
    status        TEXT NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'published', 'archived')),
    view_count    BIGINT NOT NULL DEFAULT 0,
    published_at  TIMESTAMPTZ,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    deleted_at    TIMESTAMPTZ
);

CREATE TABLE IF NOT EXISTS reading_progress (
    id            UUID PRIMARY KEY,
    user_id       UUID NOT NULL REFERENCES users(id),
    book_id       UUID NOT NULL REFERENCES books(id),
    current_page  INTEGER NOT NULL CHECK (current_page >= 0),
    total_pages   INTEGER NOT NULL CHECK (total_pages > 0),
    percent       INTEGER NOT NULL CHECK (percent BETWEEN 0 AND 100),
    last_read_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (user_id, book_id)
);

CREATE TABLE IF NOT EXISTS processed_webhooks (
    provider      TEXT NOT NULL,
    event_id      TEXT NOT NULL,
    processed_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (provider, event_id)
);
"#;

pub async fn apply_system_schema(pool: &PgPool) -> Result<(), DatabaseError> {
    pool.execute(SYSTEM_SCHEMA).await?;
    info!("System schema is up to date");
    Ok(())
}

pub async fn apply_tenant_schema(pool: &PgPool) -> Result<(), DatabaseError> {
    pool.execute(TENANT_SCHEMA).await?;
    info!("Tenant schema is up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_schema_is_idempotent() {
        for statement in TENANT_SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            assert!(
                statement.starts_with("CREATE TABLE IF NOT EXISTS") || statement.starts_with("CREATE INDEX IF NOT EXISTS"),
                "non-idempotent statement: {}",
                statement
            );
        }
    }

    #[test]
    fn one_review_per_user_per_book() {
        assert!(TENANT_SCHEMA.contains("UNIQUE (book_id, user_id)"));
        assert!(TENANT_SCHEMA.contains("UNIQUE (user_id, course_id)"));
    }
}
