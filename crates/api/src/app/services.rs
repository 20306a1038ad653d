//! Adapter selection and service wiring.

use std::sync::Arc;

use anyhow::Context;

use kinship_infra::{HttpIdentityDirectory, InMemoryIdentityDirectory, InMemoryMembershipStore, PostgresMembershipStore};
use kinship_membership::{
    FamilyService, FamilyStore, IdentityDirectory, InviteService, InviteStore, LeadershipService, MembershipConfig,
};

use crate::config::AppConfig;

pub struct AppServices {
    pub families: FamilyService,
    pub leadership: LeadershipService,
    pub invites: InviteService,
}

impl AppServices {
    /// Wire the three services over one storage adapter and one directory.
    pub fn new<S>(store: Arc<S>, directory: Arc<dyn IdentityDirectory>, config: MembershipConfig) -> Self
    where
        S: FamilyStore + InviteStore + 'static,
    {
        let families: Arc<dyn FamilyStore> = store.clone();
        let invites: Arc<dyn InviteStore> = store;
        Self {
            families: FamilyService::new(families.clone(), invites.clone(), directory.clone(), config),
            leadership: LeadershipService::new(families.clone(), invites.clone(), directory.clone()),
            invites: InviteService::new(invites, families, directory),
        }
    }
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let directory: Arc<dyn IdentityDirectory> = match &config.directory {
        Some(dir) => {
            tracing::info!(base_url = %dir.base_url, "using HTTP identity directory");
            Arc::new(HttpIdentityDirectory::new(dir.clone()).context("building identity directory client")?)
        }
        None => {
            tracing::warn!("IDENTITY_DIRECTORY_URL not set; using empty in-memory identity directory");
            Arc::new(InMemoryIdentityDirectory::new())
        }
    };

    let services = match &config.database_url {
        Some(url) => {
            let store = PostgresMembershipStore::connect(url)
                .await
                .context("connecting to Postgres")?;
            tracing::info!("using Postgres membership store");
            AppServices::new(Arc::new(store), directory, config.membership)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory membership store");
            AppServices::new(Arc::new(InMemoryMembershipStore::new()), directory, config.membership)
        }
    };
    Ok(services)
}
