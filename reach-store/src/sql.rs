//! libSQL / Turso rule store.
//!
//! Campaigns and rules live in two tables; eligibility aggregates are
//! computed by the database with one grouped query per dimension.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{params, Connection, Database, Row};
use tracing::{debug, info, instrument};

use reach_core::error::{ReachError, Result};
use reach_core::traits::RuleStore;
use reach_core::types::{Campaign, RuleAggregate, TargetingRule};

use crate::file::RuleFixture;
use crate::memory::ImportSummary;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS campaigns (
    campaign_id     TEXT PRIMARY KEY,
    campaign_name   TEXT NOT NULL,
    image_url       TEXT NOT NULL,
    call_to_action  TEXT NOT NULL,
    campaign_status TEXT NOT NULL CHECK (campaign_status IN ('ACTIVE', 'INACTIVE')),
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS targeting_rules (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    campaign_id TEXT NOT NULL REFERENCES campaigns(campaign_id),
    dimension   TEXT NOT NULL,
    type        TEXT NOT NULL CHECK (type IN ('include', 'exclude')),
    value       TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE (campaign_id, dimension, type, value)
);

CREATE INDEX IF NOT EXISTS idx_campaigns_status ON campaigns (campaign_status, campaign_id);
CREATE INDEX IF NOT EXISTS idx_rules_dimension ON targeting_rules (dimension, value);
"#;

const SELECT_ACTIVE: &str = "
    SELECT campaign_id, campaign_name, image_url, call_to_action, campaign_status, created_at, updated_at
    FROM campaigns
    WHERE campaign_status = 'ACTIVE' AND campaign_id > ?1
    ORDER BY campaign_id
    LIMIT ?2";

const SELECT_AGGREGATES: &str = "
    SELECT campaign_id,
           max(type = 'include' AND value = ?2) AS has_include,
           max(type = 'exclude' AND value = ?2) AS has_exclude,
           sum(type = 'include') AS include_count
    FROM targeting_rules
    WHERE dimension = ?1
    GROUP BY campaign_id
    ORDER BY campaign_id";

const UPSERT_CAMPAIGN: &str = "
    INSERT INTO campaigns (campaign_id, campaign_name, image_url, call_to_action, campaign_status, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    ON CONFLICT (campaign_id) DO UPDATE SET
        campaign_name = excluded.campaign_name,
        image_url = excluded.image_url,
        call_to_action = excluded.call_to_action,
        campaign_status = excluded.campaign_status,
        updated_at = excluded.updated_at";

const UPSERT_RULE: &str = "
    INSERT INTO targeting_rules (campaign_id, dimension, type, value, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    ON CONFLICT (campaign_id, dimension, type, value) DO UPDATE SET
        updated_at = excluded.updated_at";

fn storage(err: libsql::Error) -> ReachError {
    ReachError::Storage(err.to_string())
}

fn timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ReachError::Storage(format!("bad timestamp '{}': {}", raw, e)))
}

fn campaign_from_row(row: &Row) -> Result<Campaign> {
    let status: String = row.get(4).map_err(storage)?;
    let created_at: String = row.get(5).map_err(storage)?;
    let updated_at: String = row.get(6).map_err(storage)?;

    Ok(Campaign {
        campaign_id: row.get(0).map_err(storage)?,
        campaign_name: row.get(1).map_err(storage)?,
        image_url: row.get(2).map_err(storage)?,
        call_to_action: row.get(3).map_err(storage)?,
        status: status.parse()?,
        created_at: timestamp(&created_at)?,
        updated_at: timestamp(&updated_at)?,
    })
}

/// Rule store backed by a libSQL database (local file, in-memory, or Turso).
pub struct SqlRuleStore {
    _db: Database,
    conn: Connection,
}

impl SqlRuleStore {
    /// Wraps an opened database and applies the schema.
    pub async fn from_database(db: Database) -> Result<Self> {
        let conn = db.connect().map_err(storage)?;
        let store = Self { _db: db, conn };
        store.migrate().await?;
        Ok(store)
    }

    /// Connects to a remote Turso database.
    pub async fn connect_remote(url: &str, auth_token: &str) -> Result<Self> {
        info!(url, "Connecting to Turso rule store");
        let db = libsql::Builder::new_remote(url.to_string(), auth_token.to_string())
            .build()
            .await
            .map_err(storage)?;
        Self::from_database(db).await
    }

    /// Creates the tables and indexes if they do not exist.
    pub async fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA).await.map_err(storage)?;
        Ok(())
    }

    /// Inserts a campaign or updates its mutable fields.
    #[instrument(skip(self, campaign), fields(campaign_id = %campaign.campaign_id))]
    pub async fn upsert_campaign(&self, campaign: &Campaign) -> Result<()> {
        campaign.validate()?;
        self.conn
            .execute(
                UPSERT_CAMPAIGN,
                params![
                    campaign.campaign_id.as_str(),
                    campaign.campaign_name.as_str(),
                    campaign.image_url.as_str(),
                    campaign.call_to_action.as_str(),
                    campaign.status.as_str(),
                    campaign.created_at.to_rfc3339(),
                    Utc::now().to_rfc3339()
                ],
            )
            .await
            .map_err(storage)?;
        Ok(())
    }

    /// Inserts a rule, or refreshes `updated_at` if it already exists.
    #[instrument(skip(self, rule), fields(campaign_id = %rule.campaign_id, dimension = %rule.dimension))]
    pub async fn upsert_rule(&self, rule: &TargetingRule) -> Result<()> {
        rule.validate()?;
        self.conn
            .execute(
                UPSERT_RULE,
                params![
                    rule.campaign_id.as_str(),
                    rule.dimension.as_str(),
                    rule.rule_type.as_str(),
                    rule.value.as_str(),
                    rule.created_at.to_rfc3339(),
                    Utc::now().to_rfc3339()
                ],
            )
            .await
            .map_err(storage)?;
        Ok(())
    }

    /// Imports campaigns first, then rules.
    pub async fn import(&self, fixture: &RuleFixture) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        for campaign in &fixture.campaigns {
            self.upsert_campaign(campaign).await?;
            summary.campaigns += 1;
        }
        for rule in &fixture.rules {
            self.upsert_rule(rule).await?;
            summary.rules += 1;
        }
        Ok(summary)
    }

    async fn strings(&self, sql: &str, arg: Option<&str>) -> Result<Vec<String>> {
        let mut rows = match arg {
            Some(arg) => self.conn.query(sql, params![arg]).await,
            None => self.conn.query(sql, ()).await,
        }
        .map_err(storage)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage)? {
            out.push(row.get::<String>(0).map_err(storage)?);
        }
        Ok(out)
    }
}

#[async_trait]
impl RuleStore for SqlRuleStore {
    #[instrument(skip(self))]
    async fn active_campaigns(&self, after: Option<&str>, limit: usize) -> Result<Vec<Campaign>> {
        let mut rows = self
            .conn
            .query(SELECT_ACTIVE, params![after.unwrap_or(""), limit as i64])
            .await
            .map_err(storage)?;

        let mut campaigns = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage)? {
            campaigns.push(campaign_from_row(&row)?);
        }

        debug!(count = campaigns.len(), "Fetched active campaigns");
        Ok(campaigns)
    }

    #[instrument(skip(self))]
    async fn rule_aggregates(&self, dimension: &str, value: &str) -> Result<Vec<RuleAggregate>> {
        let mut rows = self
            .conn
            .query(SELECT_AGGREGATES, params![dimension, value])
            .await
            .map_err(storage)?;

        let mut aggregates = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage)? {
            let include_count: i64 = row.get(3).map_err(storage)?;
            aggregates.push(RuleAggregate {
                campaign_id: row.get(0).map_err(storage)?,
                has_include: row.get::<i64>(1).map_err(storage)? != 0,
                has_exclude: row.get::<i64>(2).map_err(storage)? != 0,
                include_count: u32::try_from(include_count)
                    .map_err(|_| ReachError::Storage("include count out of range".into()))?,
            });
        }

        debug!(count = aggregates.len(), "Aggregated rules");
        Ok(aggregates)
    }

    async fn dimensions(&self) -> Result<Vec<String>> {
        self.strings(
            "SELECT DISTINCT dimension FROM targeting_rules ORDER BY dimension",
            None,
        )
        .await
    }

    async fn dimension_values(&self, dimension: &str) -> Result<Vec<String>> {
        self.strings(
            "SELECT DISTINCT value FROM targeting_rules WHERE dimension = ?1 ORDER BY value",
            Some(dimension),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reach_core::types::CampaignStatus;

    async fn memory_store() -> SqlRuleStore {
        let db = libsql::Builder::new_local(":memory:").build().await.unwrap();
        SqlRuleStore::from_database(db).await.unwrap()
    }

    fn campaign(id: &str) -> Campaign {
        Campaign::new(id, id.to_uppercase(), format!("https://cdn/{}.png", id), "Open")
    }

    #[tokio::test]
    async fn test_active_campaigns_keyset() {
        let store = memory_store().await;
        for id in ["b", "a", "d"] {
            store.upsert_campaign(&campaign(id)).await.unwrap();
        }
        store
            .upsert_campaign(&campaign("c").with_status(CampaignStatus::Inactive))
            .await
            .unwrap();

        let page = store.active_campaigns(None, 2).await.unwrap();
        let ids: Vec<_> = page.iter().map(|c| c.campaign_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let page = store.active_campaigns(Some("b"), 2).await.unwrap();
        let ids: Vec<_> = page.iter().map(|c| c.campaign_id.as_str()).collect();
        assert_eq!(ids, vec!["d"]);
    }

    #[tokio::test]
    async fn test_rule_aggregates() {
        let store = memory_store().await;
        store.upsert_campaign(&campaign("a")).await.unwrap();
        store.upsert_campaign(&campaign("b")).await.unwrap();
        store.upsert_rule(&TargetingRule::include("a", "country", "US")).await.unwrap();
        store.upsert_rule(&TargetingRule::include("a", "country", "CA")).await.unwrap();
        store.upsert_rule(&TargetingRule::exclude("b", "country", "US")).await.unwrap();

        let aggs = store.rule_aggregates("country", "US").await.unwrap();
        assert_eq!(
            aggs,
            vec![
                RuleAggregate {
                    campaign_id: "a".into(),
                    has_include: true,
                    has_exclude: false,
                    include_count: 2,
                },
                RuleAggregate {
                    campaign_id: "b".into(),
                    has_include: false,
                    has_exclude: true,
                    include_count: 0,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = memory_store().await;
        store.upsert_campaign(&campaign("a")).await.unwrap();
        let rule = TargetingRule::include("a", "os", "ios");
        store.upsert_rule(&rule).await.unwrap();
        store.upsert_rule(&rule).await.unwrap();

        let aggs = store.rule_aggregates("os", "ios").await.unwrap();
        assert_eq!(aggs.len(), 1);
        assert_eq!(aggs[0].include_count, 1);
    }

    #[tokio::test]
    async fn test_dimensions_and_values() {
        let store = memory_store().await;
        let fixture = RuleFixture {
            campaigns: vec![campaign("a"), campaign("b")],
            rules: vec![
                TargetingRule::include("a", "os", "ios"),
                TargetingRule::exclude("b", "os", "android"),
                TargetingRule::include("b", "country", "DE"),
            ],
        };
        let summary = store.import(&fixture).await.unwrap();
        assert_eq!(summary.rules, 3);

        assert_eq!(store.dimensions().await.unwrap(), vec!["country", "os"]);
        assert_eq!(
            store.dimension_values("os").await.unwrap(),
            vec!["android", "ios"]
        );
    }
}
