//! Blocking wrapper around [`AsyncNucleusClient`].
//!
//! Each call runs to completion on a private current-thread runtime before
//! returning, so requests go out one at a time. Do not call it from inside an
//! async context.

use tokio::runtime::{Builder, Runtime};

use crate::bulk::BulkResult;
use crate::client::AsyncNucleusClient;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::models::{
    Asset, AssetId, AssetUpdate, CreatedAsset, Finding, FindingFilter, FindingUpdate, NewAsset,
    Project, ProjectId, ProjectMetrics,
};

pub struct NucleusClient {
    // dropped before the runtime so its tasks are aborted first
    inner: AsyncNucleusClient,
    runtime: Runtime,
}

impl NucleusClient {
    pub fn open(config: ClientConfig) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Config(format!("failed to start runtime: {}", e)))?;
        let inner = {
            let _guard = runtime.enter();
            AsyncNucleusClient::open(config)?
        };
        Ok(Self { inner, runtime })
    }

    pub fn close(self) {}

    pub fn get_projects(&self) -> Result<Vec<Project>> {
        self.runtime.block_on(self.inner.get_projects())
    }

    pub fn get_project_metrics(&self, project_id: ProjectId) -> Result<ProjectMetrics> {
        self.runtime.block_on(self.inner.get_project_metrics(project_id))
    }

    pub fn get_project_assets(&self, project_id: ProjectId) -> Result<Vec<Asset>> {
        self.runtime.block_on(self.inner.get_project_assets(project_id))
    }

    pub fn create_asset(&self, project_id: ProjectId, asset: &NewAsset) -> Result<CreatedAsset> {
        self.runtime.block_on(self.inner.create_asset(project_id, asset))
    }

    pub fn update_asset(
        &self,
        project_id: ProjectId,
        asset_id: AssetId,
        update: &AssetUpdate,
    ) -> Result<()> {
        self.runtime
            .block_on(self.inner.update_asset(project_id, asset_id, update))
    }

    pub fn search_findings(
        &self,
        project_id: ProjectId,
        filters: &[FindingFilter],
    ) -> Result<Vec<Finding>> {
        self.runtime
            .block_on(self.inner.search_findings(project_id, filters))
    }

    pub fn get_asset_findings(&self, project_id: ProjectId, asset_id: AssetId) -> Result<Vec<Finding>> {
        self.runtime
            .block_on(self.inner.get_asset_findings(project_id, asset_id))
    }

    /// Updates are sent one after another; a failed item does not stop the rest.
    pub fn bulk_update_findings(&self, project_id: ProjectId, updates: &[FindingUpdate]) -> BulkResult {
        let mut items = Vec::with_capacity(updates.len());
        for update in updates {
            let mut single = self.runtime.block_on(
                self.inner
                    .bulk_update_findings(project_id, std::slice::from_ref(update)),
            );
            items.append(&mut single.items);
        }
        BulkResult { items }
    }

    pub fn get_project_risk_score(&self, project_id: ProjectId) -> Result<f64> {
        self.runtime
            .block_on(self.inner.get_project_risk_score(project_id))
    }

    pub fn cache_len(&self) -> usize {
        self.inner.cache_len()
    }

    pub fn clear_cache(&self) {
        self.inner.clear_cache()
    }
}
