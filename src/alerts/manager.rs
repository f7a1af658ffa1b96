use std::sync::Arc;

use uuid::Uuid;

use crate::clock::{Clock, SharedClock};
use crate::db::AlertRepository;
use crate::errors::{CoreError, CoreResult};
use crate::models::{Alert, NewAlert};

/// Owner-facing alert operations. An alert belonging to another user is
/// reported as not found.
#[derive(Clone)]
pub struct AlertManager {
    repo: Arc<dyn AlertRepository>,
    clock: SharedClock,
}

impl AlertManager {
    pub fn new(repo: Arc<dyn AlertRepository>, clock: SharedClock) -> Self {
        Self { repo, clock }
    }

    pub async fn create(&self, new_alert: NewAlert) -> CoreResult<Alert> {
        let alert = new_alert.into_alert(self.clock.now())?;
        self.repo.insert_alert(&alert).await.map_err(CoreError::Persistence)?;
        tracing::info!(
            alert_id = %alert.id,
            user_id = %alert.user_id,
            route = %alert.route_key,
            kind = alert.kind.as_str(),
            "Alert created"
        );
        Ok(alert)
    }

    pub async fn list(&self, user_id: &str) -> CoreResult<Vec<Alert>> {
        self.repo.alerts_for_user(user_id).await.map_err(CoreError::Persistence)
    }

    pub async fn set_active(&self, user_id: &str, id: Uuid, is_active: bool) -> CoreResult<Alert> {
        let mut alert = self.owned(user_id, id).await?;
        if !self
            .repo
            .set_alert_active(id, is_active)
            .await
            .map_err(CoreError::Persistence)?
        {
            return Err(CoreError::NotFound(format!("alert {id}")));
        }
        alert.is_active = is_active;
        Ok(alert)
    }

    pub async fn delete(&self, user_id: &str, id: Uuid) -> CoreResult<()> {
        self.owned(user_id, id).await?;
        if !self.repo.delete_alert(id).await.map_err(CoreError::Persistence)? {
            return Err(CoreError::NotFound(format!("alert {id}")));
        }
        tracing::info!(alert_id = %id, %user_id, "Alert deleted");
        Ok(())
    }

    async fn owned(&self, user_id: &str, id: Uuid) -> CoreResult<Alert> {
        match self.repo.get_alert(id).await.map_err(CoreError::Persistence)? {
            Some(alert) if alert.user_id == user_id => Ok(alert),
            _ => Err(CoreError::NotFound(format!("alert {id}"))),
        }
    }
}
