// src/filament/coordinator.rs
use std::sync::Arc;

use crate::hardware::FilamentSource;
use crate::models::{FilamentState, Slot, Spool};
use crate::wizard::WizardError;

/// Filament and spool a slot holds after a successful mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct SpoolChange {
    pub filament: FilamentState,
    pub spool: Spool,
}

/// Requests spool changes from the filament manager.
///
/// Failures are returned as-is and never retried; the caller aborts the wizard session.
#[derive(Clone)]
pub struct SpoolMutationCoordinator {
    source: Arc<dyn FilamentSource>,
}

impl SpoolMutationCoordinator {
    pub fn new(source: Arc<dyn FilamentSource>) -> Self {
        Self { source }
    }

    /// Marks `slot` as holding no spool.
    pub async fn release(&self, slot: Option<Slot>) -> Result<SpoolChange, WizardError> {
        let slot = slot.ok_or(WizardError::MissingSelection("slot"))?;
        let unloaded = Spool::unloaded();
        self.source
            .set_spool_at_channel(&unloaded, slot.channel())
            .await?;
        tracing::info!("Released spool from slot {}", slot);
        Ok(SpoolChange {
            filament: FilamentState::empty(slot),
            spool: unloaded,
        })
    }

    /// Binds `new_spool` to `slot`.
    pub async fn assign(
        &self,
        slot: Option<Slot>,
        new_spool: Option<&Spool>,
    ) -> Result<SpoolChange, WizardError> {
        let slot = slot.ok_or(WizardError::MissingSelection("slot"))?;
        let new_spool = new_spool.ok_or(WizardError::MissingSelection("new spool"))?;
        self.source
            .set_spool_at_channel(new_spool, slot.channel())
            .await?;
        tracing::info!("Assigned spool {} ({}) to slot {}", new_spool.id, new_spool.name, slot);
        Ok(SpoolChange {
            filament: FilamentState::from_spool(u32::from(slot.number()), new_spool),
            spool: new_spool.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::SimulatedFilamentManager;

    fn spool() -> Spool {
        Spool {
            id: 12,
            name: "Jet Black".to_string(),
            material: Some("PLA".to_string()),
            color: Some("#000000".to_string()),
            temperature_offset: None,
        }
    }

    #[tokio::test]
    async fn test_release_reports_empty_slot() {
        let manager = Arc::new(SimulatedFilamentManager::new(vec![spool()], vec![12, -1]));
        let coordinator = SpoolMutationCoordinator::new(manager.clone());
        let slot = Slot::new(1, 5);
        let change = coordinator.release(slot).await.unwrap();
        assert_eq!(change.filament.name, "empty");
        assert_eq!(change.filament.color, "#FFF");
        assert!(!change.filament.enabled);
        assert_eq!(change.spool.id, -1);
        assert_eq!(manager.loaded_spool(0), None);
    }

    #[tokio::test]
    async fn test_assign_builds_filament_from_spool() {
        let manager = Arc::new(SimulatedFilamentManager::new(vec![spool()], vec![]));
        let coordinator = SpoolMutationCoordinator::new(manager.clone());
        let change = coordinator
            .assign(Slot::new(2, 5), Some(&spool()))
            .await
            .unwrap();
        assert_eq!(change.filament.id, 2);
        assert_eq!(change.filament.name, "Jet Black (PLA)");
        assert_eq!(change.filament.color, "#000000");
        assert!(change.filament.enabled);
        assert_eq!(change.spool, spool());
        assert_eq!(manager.loaded_spool(1), Some(12));
    }

    #[tokio::test]
    async fn test_missing_selection_is_an_error() {
        let manager = Arc::new(SimulatedFilamentManager::new(vec![], vec![]));
        let coordinator = SpoolMutationCoordinator::new(manager.clone());
        let err = coordinator.assign(Slot::new(1, 5), None).await.unwrap_err();
        assert!(matches!(err, WizardError::MissingSelection(_)));
        let err = coordinator.release(None).await.unwrap_err();
        assert!(matches!(err, WizardError::MissingSelection("slot")));
        assert_eq!(manager.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_manager_failure_is_not_retried() {
        let manager = Arc::new(SimulatedFilamentManager::new(vec![spool()], vec![]));
        manager.set_failing(true);
        let coordinator = SpoolMutationCoordinator::new(manager.clone());
        let err = coordinator
            .assign(Slot::new(1, 5), Some(&spool()))
            .await
            .unwrap_err();
        assert!(matches!(err, WizardError::FilamentMutation(_)));
        assert_eq!(manager.mutation_count(), 1);
    }
}
