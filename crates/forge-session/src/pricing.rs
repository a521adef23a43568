//! Per-MTok pricing lookup and cost calculation (spec.md §4.I "Cost model").

use rusqlite::{params, OptionalExtension};

use crate::db::Database;
use crate::error::SessionResult;
use crate::models::{ModelPricing, TokenUsage};

/// Hard-coded fallback rates (USD per million tokens), used when no
/// `model_pricing` row matches. Approximate, current-as-of-authoring public
/// list prices for each provider's flagship model family; a missed
/// `model_pricing` row should never crash an import.
fn fallback_rates(provider: &str) -> (f64, f64, f64) {
    match provider {
        "claude" => (3.0, 15.0, 0.30),
        "codex" => (2.50, 10.0, 0.25),
        "gemini" => (1.25, 5.0, 0.125),
        _ => (1.0, 2.0, 0.10),
    }
}

/// Insert a pricing row.
///
/// # Errors
///
/// Returns [`crate::error::SessionError`] on a database error.
pub fn insert_pricing(db: &Database, row: &ModelPricing) -> SessionResult<()> {
    let conn = db.lock()?;
    conn.execute(
        "INSERT INTO model_pricing (id, provider, model_pattern, input_cost_per_mtok, output_cost_per_mtok, cache_read_cost_per_mtok, effective_from, effective_until) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            row.id,
            row.provider,
            row.model_pattern,
            row.input_cost_per_mtok,
            row.output_cost_per_mtok,
            row.cache_read_cost_per_mtok,
            row.effective_from,
            row.effective_until,
        ],
    )?;
    Ok(())
}

/// Find the best-matching pricing row for `(provider, model)` as of `now`
/// (an RFC3339/`datetime('now')`-comparable timestamp string): exact
/// `model_pattern` equality first, then `LIKE` wildcard match, restricted
/// to rows whose `effective_until` is null or in the future, most specific
/// and then most recent first.
fn lookup_pricing(db: &Database, provider: &str, model: &str, now: &str) -> SessionResult<Option<ModelPricing>> {
    let conn = db.lock()?;
    let row = conn
        .query_row(
            "SELECT id, provider, model_pattern, input_cost_per_mtok, output_cost_per_mtok, cache_read_cost_per_mtok, effective_from, effective_until, \
                    (model_pattern = ?2) AS exact \
             FROM model_pricing \
             WHERE provider = ?1 AND ?2 LIKE model_pattern AND (effective_until IS NULL OR effective_until > ?3) \
             ORDER BY exact DESC, effective_from DESC \
             LIMIT 1",
            params![provider, model, now],
            |r| {
                Ok(ModelPricing {
                    id: r.get(0)?,
                    provider: r.get(1)?,
                    model_pattern: r.get(2)?,
                    input_cost_per_mtok: r.get(3)?,
                    output_cost_per_mtok: r.get(4)?,
                    cache_read_cost_per_mtok: r.get(5)?,
                    effective_from: r.get(6)?,
                    effective_until: r.get(7)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// `calculate_cost(provider, model, usage)`: looks up the best-matching
/// pricing row and bills `usage` against it, falling back to hard-coded
/// rates when nothing matches.
///
/// # Errors
///
/// Returns [`crate::error::SessionError`] on a database error.
pub fn calculate_cost(db: &Database, provider: &str, model: &str, usage: TokenUsage, now: &str) -> SessionResult<f64> {
    let (input_rate, output_rate, cache_rate) = match lookup_pricing(db, provider, model, now)? {
        Some(row) => (row.input_cost_per_mtok, row.output_cost_per_mtok, row.cache_read_cost_per_mtok),
        None => fallback_rates(provider),
    };

    let cost = (usage.input_tokens as f64 * input_rate
        + usage.output_tokens as f64 * output_rate
        + usage.cache_read_tokens as f64 * cache_rate)
        / 1_000_000.0;
    Ok(cost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::ForgePaths;

    fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&ForgePaths::from_root(dir.path())).unwrap();
        (dir, db)
    }

    #[test]
    fn falls_back_to_hard_coded_rates_when_no_row_matches() {
        let (_dir, db) = test_db();
        let usage = TokenUsage {
            input_tokens: 1_000_000,
            output_tokens: 1_000_000,
            cache_read_tokens: 0,
        };
        let cost = calculate_cost(&db, "claude", "claude-opus-5", usage, "2026-01-01").unwrap();
        assert!((cost - 18.0).abs() < 1e-9);
    }

    #[test]
    fn exact_pattern_wins_over_wildcard() {
        let (_dir, db) = test_db();
        insert_pricing(
            &db,
            &ModelPricing {
                id: "p1".to_string(),
                provider: "claude".to_string(),
                model_pattern: "claude-%".to_string(),
                input_cost_per_mtok: 1.0,
                output_cost_per_mtok: 1.0,
                cache_read_cost_per_mtok: 1.0,
                effective_from: "2020-01-01".to_string(),
                effective_until: None,
            },
        )
        .unwrap();
        insert_pricing(
            &db,
            &ModelPricing {
                id: "p2".to_string(),
                provider: "claude".to_string(),
                model_pattern: "claude-opus-5".to_string(),
                input_cost_per_mtok: 5.0,
                output_cost_per_mtok: 5.0,
                cache_read_cost_per_mtok: 5.0,
                effective_from: "2020-01-01".to_string(),
                effective_until: None,
            },
        )
        .unwrap();

        let usage = TokenUsage {
            input_tokens: 1_000_000,
            output_tokens: 0,
            cache_read_tokens: 0,
        };
        let cost = calculate_cost(&db, "claude", "claude-opus-5", usage, "2026-01-01").unwrap();
        assert!((cost - 5.0).abs() < 1e-9);
    }

    #[test]
    fn expired_rows_are_excluded() {
        let (_dir, db) = test_db();
        insert_pricing(
            &db,
            &ModelPricing {
                id: "p1".to_string(),
                provider: "claude".to_string(),
                model_pattern: "claude-opus-5".to_string(),
                input_cost_per_mtok: 5.0,
                output_cost_per_mtok: 5.0,
                cache_read_cost_per_mtok: 5.0,
                effective_from: "2020-01-01".to_string(),
                effective_until: Some("2021-01-01".to_string()),
            },
        )
        .unwrap();
        let usage = TokenUsage {
            input_tokens: 1_000_000,
            output_tokens: 0,
            cache_read_tokens: 0,
        };
        let cost = calculate_cost(&db, "claude", "claude-opus-5", usage, "2026-01-01").unwrap();
        assert!((cost - 3.0).abs() < 1e-9);
    }
}
