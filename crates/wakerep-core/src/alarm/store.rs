//! Alarm lifecycle store.
//!
//! The canonical alarm list lives behind [`AlarmRepository`]. The store never
//! caches it: every operation loads, mutates and saves the whole list, so
//! whatever reads next (usually the scheduler) sees the persisted truth.

use tracing::info;

use super::model::{Alarm, AlarmPatch, NewAlarm};
use crate::error::{Result, StorageError, ValidationError};

/// Persistence collaborator for the alarm list.
pub trait AlarmRepository {
    fn load_alarms(&self) -> Result<Vec<Alarm>, StorageError>;
    /// Atomic replace-all.
    fn save_alarms(&self, alarms: &[Alarm]) -> Result<(), StorageError>;

    /// Alarm ids that failed to arm on the last reschedule.
    fn load_scheduling_failures(&self) -> Result<Vec<String>, StorageError> {
        Ok(Vec::new())
    }

    fn save_scheduling_failures(&self, _alarm_ids: &[String]) -> Result<(), StorageError> {
        Ok(())
    }
}

impl<R: AlarmRepository + ?Sized> AlarmRepository for &R {
    fn load_alarms(&self) -> Result<Vec<Alarm>, StorageError> {
        (**self).load_alarms()
    }

    fn save_alarms(&self, alarms: &[Alarm]) -> Result<(), StorageError> {
        (**self).save_alarms(alarms)
    }

    fn load_scheduling_failures(&self) -> Result<Vec<String>, StorageError> {
        (**self).load_scheduling_failures()
    }

    fn save_scheduling_failures(&self, alarm_ids: &[String]) -> Result<(), StorageError> {
        (**self).save_scheduling_failures(alarm_ids)
    }
}

pub struct AlarmStore<R> {
    repo: R,
}

impl<R: AlarmRepository> AlarmStore<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn list(&self) -> Result<Vec<Alarm>> {
        Ok(self.repo.load_alarms()?)
    }

    pub fn get(&self, id: &str) -> Result<Option<Alarm>> {
        Ok(self.list()?.into_iter().find(|a| a.id == id))
    }

    /// Validate and persist a new alarm. Returns it with its assigned id.
    pub fn create(&self, new: NewAlarm) -> Result<Alarm> {
        let alarm = new.into_alarm(uuid::Uuid::new_v4().to_string());
        alarm.validate()?;
        let mut alarms = self.repo.load_alarms()?;
        alarms.push(alarm.clone());
        self.repo.save_alarms(&alarms)?;
        info!(alarm_id = %alarm.id, time = %alarm.time, "alarm created");
        Ok(alarm)
    }

    /// Apply a partial update. The result is validated before it is saved.
    pub fn update(&self, id: &str, patch: &AlarmPatch) -> Result<Alarm> {
        let mut alarms = self.repo.load_alarms()?;
        let slot = alarms
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| ValidationError::NotFound(id.to_string()))?;
        let next = patch.apply(slot);
        next.validate()?;
        *slot = next.clone();
        self.repo.save_alarms(&alarms)?;
        if !next.enabled {
            self.forget_failure(id)?;
        }
        info!(alarm_id = %id, "alarm updated");
        Ok(next)
    }

    pub fn toggle(&self, id: &str) -> Result<Alarm> {
        let current = self
            .get(id)?
            .ok_or_else(|| ValidationError::NotFound(id.to_string()))?;
        self.update(
            id,
            &AlarmPatch {
                enabled: Some(!current.enabled),
                ..Default::default()
            },
        )
    }

    /// Remove an alarm. Returns the removed record.
    pub fn delete(&self, id: &str) -> Result<Alarm> {
        let mut alarms = self.repo.load_alarms()?;
        let idx = alarms
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| ValidationError::NotFound(id.to_string()))?;
        let removed = alarms.remove(idx);
        self.repo.save_alarms(&alarms)?;
        self.forget_failure(id)?;
        info!(alarm_id = %id, "alarm deleted");
        Ok(removed)
    }

    /// Drop `id` from the recorded scheduling failures. A deleted or
    /// disabled alarm has nothing left to retry, even when no scheduler runs.
    fn forget_failure(&self, id: &str) -> Result<()> {
        let failures = self.repo.load_scheduling_failures()?;
        if failures.iter().any(|f| f == id) {
            let kept: Vec<String> = failures.into_iter().filter(|f| f != id).collect();
            self.repo.save_scheduling_failures(&kept)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityType;
    use crate::alarm::model::{AlarmTime, Day};
    use crate::error::CoreError;
    use std::cell::RefCell;

    #[derive(Default)]
    struct MemoryRepo {
        alarms: RefCell<Vec<Alarm>>,
        saves: RefCell<u32>,
    }

    impl AlarmRepository for MemoryRepo {
        fn load_alarms(&self) -> Result<Vec<Alarm>, StorageError> {
            Ok(self.alarms.borrow().clone())
        }
        fn save_alarms(&self, alarms: &[Alarm]) -> Result<(), StorageError> {
            *self.saves.borrow_mut() += 1;
            *self.alarms.borrow_mut() = alarms.to_vec();
            Ok(())
        }
    }

    fn new_alarm() -> NewAlarm {
        NewAlarm::new("Wake", AlarmTime::new(7, 0).unwrap(), ActivityType::Squats)
    }

    #[test]
    fn create_assigns_id_and_persists() {
        let store = AlarmStore::new(MemoryRepo::default());
        let a = store.create(new_alarm()).unwrap();
        assert!(!a.id.is_empty());
        assert!(a.enabled);
        assert_eq!(store.list().unwrap(), vec![a]);
    }

    #[test]
    fn invalid_alarm_never_reaches_persistence() {
        let repo = MemoryRepo::default();
        let store = AlarmStore::new(&repo);
        let mut bad = new_alarm();
        bad.days.clear();
        let err = store.create(bad).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::EmptyDays)));
        assert_eq!(*repo.saves.borrow(), 0);

        let a = store.create(new_alarm()).unwrap();
        let err = store
            .update(
                &a.id,
                &AlarmPatch {
                    target_count: Some(0),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::NonPositiveTarget)));
        assert_eq!(store.get(&a.id).unwrap().unwrap().target_count, a.target_count);
    }

    #[test]
    fn update_toggle_delete() {
        let store = AlarmStore::new(MemoryRepo::default());
        let a = store.create(new_alarm()).unwrap();
        let updated = store
            .update(
                &a.id,
                &AlarmPatch {
                    days: Some([Day::Sat].into_iter().collect()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(updated.recurs_on(Day::Sat));
        assert!(!store.toggle(&a.id).unwrap().enabled);
        assert!(store.toggle(&a.id).unwrap().enabled);
        store.delete(&a.id).unwrap();
        assert!(store.list().unwrap().is_empty());
        assert!(matches!(
            store.delete(&a.id),
            Err(CoreError::Validation(ValidationError::NotFound(_)))
        ));
    }

    #[test]
    fn delete_and_disable_clear_recorded_failures() {
        let db = crate::storage::Database::open_memory().unwrap();
        let store = AlarmStore::new(&db);
        let a = store.create(new_alarm()).unwrap();
        let b = store.create(new_alarm()).unwrap();
        let c = store.create(new_alarm()).unwrap();
        db.save_scheduling_failures(&[a.id.clone(), b.id.clone(), c.id.clone()])
            .unwrap();

        store.delete(&a.id).unwrap();
        assert!(!store.toggle(&b.id).unwrap().enabled);
        store
            .update(
                &c.id,
                &AlarmPatch {
                    title: Some("Later".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(db.load_scheduling_failures().unwrap(), vec![c.id.clone()]);
    }
}
