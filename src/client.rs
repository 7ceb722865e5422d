//! Async Nucleus client.
//!
//! Every method goes through one [`RequestExecutor`], so concurrent calls on
//! the same client share its cache and rate limit.

use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::bulk::{BulkItemResult, BulkResult, gather, validate_update};
use crate::cache::spawn_sweeper;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::executor::{ApiRequest, RequestExecutor};
use crate::models::{
    Asset, AssetId, AssetUpdate, CreatedAsset, Finding, FindingFilter, FindingUpdate, NewAsset,
    Project, ProjectId, ProjectMetrics, RiskScore,
};

/// Async client for the Nucleus API.
///
/// ```rust,no_run
/// use nucleus_client::{AsyncNucleusClient, ClientConfig, FindingFilter, Severity};
/// use std::time::Duration;
///
/// # async fn example() -> nucleus_client::Result<()> {
/// let config = ClientConfig::new("your-api-key")
///     .cache_ttl(Duration::from_secs(300))
///     .rate_limit(100, Duration::from_secs(60));
/// let client = AsyncNucleusClient::open(config)?;
///
/// let critical = [FindingFilter::severity(Severity::Critical)];
/// let (projects, findings) = tokio::join!(
///     client.get_projects(),
///     client.search_findings(123, &critical),
/// );
/// println!("{} projects, {} critical findings", projects?.len(), findings?.len());
///
/// client.close();
/// # Ok(())
/// # }
/// ```
pub struct AsyncNucleusClient {
    executor: RequestExecutor,
    sweeper: Option<JoinHandle<()>>,
}

impl AsyncNucleusClient {
    /// Build a client. Must run inside a Tokio runtime when a cache sweep
    /// interval is configured.
    pub fn open(config: ClientConfig) -> Result<Self> {
        let executor = RequestExecutor::new(&config)?;
        let sweeper = config
            .cache_sweep_interval
            .filter(|_| !config.cache_ttl.is_zero())
            .map(|every| spawn_sweeper(Arc::clone(executor.cache()), every));

        debug!(
            base_url = %config.base_url,
            cache_ttl_secs = config.cache_ttl.as_secs(),
            rate_limit_calls = config.rate_limit_calls,
            rate_limit_period_secs = config.rate_limit_period.as_secs(),
            "nucleus client opened"
        );
        Ok(Self { executor, sweeper })
    }

    /// Release the client. Dropping it has the same effect.
    pub fn close(self) {}

    pub async fn get_projects(&self) -> Result<Vec<Project>> {
        self.executor.execute_json(ApiRequest::get("/projects")).await
    }

    pub async fn get_project_metrics(&self, project_id: ProjectId) -> Result<ProjectMetrics> {
        self.executor
            .execute_json(ApiRequest::get(format!("/projects/{}/metrics", project_id)))
            .await
    }

    pub async fn get_project_assets(&self, project_id: ProjectId) -> Result<Vec<Asset>> {
        self.executor
            .execute_json(ApiRequest::get(format!("/projects/{}/assets", project_id)))
            .await
    }

    pub async fn create_asset(&self, project_id: ProjectId, asset: &NewAsset) -> Result<CreatedAsset> {
        if asset.asset_name.trim().is_empty() {
            return Err(Error::InvalidRequest("asset_name is empty".into()));
        }
        let body = serde_json::to_value(asset)?;
        self.executor
            .execute_json(ApiRequest::post(format!("/projects/{}/assets", project_id), body))
            .await
    }

    pub async fn update_asset(
        &self,
        project_id: ProjectId,
        asset_id: AssetId,
        update: &AssetUpdate,
    ) -> Result<()> {
        if update.is_empty() {
            return Err(Error::InvalidRequest(format!(
                "update for asset {} changes nothing",
                asset_id
            )));
        }
        let body = serde_json::to_value(update)?;
        self.executor
            .execute(ApiRequest::put(
                format!("/projects/{}/assets/{}", project_id, asset_id),
                body,
            ))
            .await
            .map(|_| ())
    }

    pub async fn search_findings(
        &self,
        project_id: ProjectId,
        filters: &[FindingFilter],
    ) -> Result<Vec<Finding>> {
        self.executor
            .execute_json(ApiRequest::query(
                format!("/projects/{}/findings/search", project_id),
                json!({ "filters": filters }),
            ))
            .await
    }

    pub async fn get_asset_findings(
        &self,
        project_id: ProjectId,
        asset_id: AssetId,
    ) -> Result<Vec<Finding>> {
        self.executor
            .execute_json(ApiRequest::get(format!(
                "/projects/{}/assets/{}/findings",
                project_id, asset_id
            )))
            .await
    }

    /// Findings for each asset, fetched concurrently. One entry per asset,
    /// in input order; a failed asset does not affect the others.
    pub async fn get_findings_for_assets(
        &self,
        project_id: ProjectId,
        asset_ids: &[AssetId],
    ) -> Vec<(AssetId, Result<Vec<Finding>>)> {
        let results = gather(
            asset_ids
                .iter()
                .map(|&asset_id| self.get_asset_findings(project_id, asset_id)),
        )
        .await;
        asset_ids.iter().copied().zip(results).collect()
    }

    /// Apply each update independently. Invalid items fail locally without
    /// a network call.
    pub async fn bulk_update_findings(
        &self,
        project_id: ProjectId,
        updates: &[FindingUpdate],
    ) -> BulkResult {
        let outcomes = gather(updates.iter().map(|update| self.update_finding(project_id, update))).await;

        let items: Vec<BulkItemResult> = updates
            .iter()
            .zip(outcomes)
            .map(|(update, outcome)| BulkItemResult {
                finding_number: update.finding_number.clone(),
                outcome,
            })
            .collect();
        let result = BulkResult { items };
        debug!(project_id, summary = %result, "bulk finding update finished");
        result
    }

    async fn update_finding(&self, project_id: ProjectId, update: &FindingUpdate) -> Result<()> {
        validate_update(update)?;
        let body = serde_json::to_value(update)?;
        self.executor
            .execute(ApiRequest::put(format!("/projects/{}/findings", project_id), body))
            .await
            .map(|_| ())
    }

    pub async fn get_project_risk_score(&self, project_id: ProjectId) -> Result<f64> {
        let score: RiskScore = self
            .executor
            .execute_json(ApiRequest::get(format!("/projects/{}/risk_score", project_id)))
            .await?;
        Ok(score.risk_score)
    }

    pub fn cache_len(&self) -> usize {
        self.executor.cache().len()
    }

    pub fn clear_cache(&self) {
        self.executor.cache().clear();
    }
}

impl Drop for AsyncNucleusClient {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}
