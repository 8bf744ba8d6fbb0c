use super::{AssignmentStore, Collection, StatusUpdate, StoreError};
use vitals_core::models::compare_timestamps;
use vitals_core::{Assignment, Status};

pub struct JsonAssignments {
    docs: Collection<Assignment>,
}

impl JsonAssignments {
    pub fn new(docs: Collection<Assignment>) -> Self {
        Self { docs }
    }
}

impl AssignmentStore for JsonAssignments {
    fn list(&self) -> Result<Vec<Assignment>, StoreError> {
        let mut all = self.docs.read(|docs| docs.to_vec());
        all.sort_by(|a, b| compare_timestamps(&b.timestamp, &a.timestamp));
        Ok(all)
    }

    fn get(&self, patient_id: &str) -> Result<Option<Assignment>, StoreError> {
        Ok(self
            .docs
            .read(|docs| docs.iter().find(|a| a.patient_id == patient_id).cloned()))
    }

    fn find_by_device(&self, device_id: &str) -> Result<Option<Assignment>, StoreError> {
        Ok(self
            .docs
            .read(|docs| docs.iter().find(|a| a.device_id == device_id).cloned()))
    }

    fn register(&self, assignment: Assignment) -> Result<(), StoreError> {
        self.docs.write(|docs| {
            if let Some(existing) = docs.iter().find(|a| a.device_id == assignment.device_id) {
                return Err(StoreError::DeviceAssigned {
                    device_id: assignment.device_id.clone(),
                    patient_id: existing.patient_id.clone(),
                });
            }
            if docs.iter().any(|a| a.patient_id == assignment.patient_id) {
                return Err(StoreError::DuplicatePatient(assignment.patient_id.clone()));
            }
            docs.push(assignment);
            Ok(())
        })
    }

    fn remove(&self, patient_id: &str) -> Result<Assignment, StoreError> {
        self.docs.write(|docs| {
            let idx = docs
                .iter()
                .position(|a| a.patient_id == patient_id)
                .ok_or_else(|| StoreError::NotFound(format!("Patient {patient_id}")))?;
            Ok(docs.remove(idx))
        })
    }

    fn set_status(&self, patient_id: &str, status: Status) -> Result<(), StoreError> {
        self.docs.write(|docs| {
            let assignment = docs
                .iter_mut()
                .find(|a| a.patient_id == patient_id)
                .ok_or_else(|| StoreError::NotFound(format!("Patient {patient_id}")))?;
            assignment.status = status;
            Ok(())
        })
    }

    fn reclassify_device(
        &self,
        device_id: &str,
        grade: &mut dyn FnMut(&Assignment) -> Result<Status, StoreError>,
    ) -> Result<Option<StatusUpdate>, StoreError> {
        self.docs.modify(|docs| {
            let Some(assignment) = docs.iter_mut().find(|a| a.device_id == device_id) else {
                return Ok((None, false));
            };
            let current = grade(assignment)?;
            let update = StatusUpdate {
                patient_id: assignment.patient_id.clone(),
                previous: assignment.status,
                current,
            };
            let changed = current != assignment.status;
            assignment.status = current;
            Ok((Some(update), changed))
        })
    }

    fn count(&self) -> usize {
        self.docs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(patient_id: &str, device_id: &str, ts: &str) -> Assignment {
        Assignment {
            patient_id: patient_id.into(),
            device_id: device_id.into(),
            name: None,
            timestamp: ts.into(),
            status: Status::Unknown,
        }
    }

    #[test]
    fn test_device_conflict_reports_holder() {
        let store = JsonAssignments::new(Collection::in_memory("assignments"));
        store.register(assignment("p1", "w-1", "2025-03-01T10:00:00Z")).unwrap();

        match store.register(assignment("p2", "w-1", "2025-03-01T10:05:00Z")) {
            Err(StoreError::DeviceAssigned { patient_id, .. }) => assert_eq!(patient_id, "p1"),
            other => panic!("expected conflict, got {other:?}"),
        }
        assert!(matches!(
            store.register(assignment("p1", "w-2", "2025-03-01T10:05:00Z")),
            Err(StoreError::DuplicatePatient(_))
        ));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_list_newest_registration_first() {
        let store = JsonAssignments::new(Collection::in_memory("assignments"));
        store.register(assignment("p1", "w-1", "2025-03-01T10:00:00Z")).unwrap();
        store.register(assignment("p2", "w-2", "2025-03-02T10:00:00Z")).unwrap();

        let ids: Vec<String> = store.list().unwrap().into_iter().map(|a| a.patient_id).collect();
        assert_eq!(ids, vec!["p2", "p1"]);
    }

    #[test]
    fn test_remove_and_reuse_device() {
        let store = JsonAssignments::new(Collection::in_memory("assignments"));
        store.register(assignment("p1", "w-1", "2025-03-01T10:00:00Z")).unwrap();

        assert!(matches!(store.remove("ghost"), Err(StoreError::NotFound(_))));
        assert_eq!(store.remove("p1").unwrap().device_id, "w-1");
        assert!(store.get("p1").unwrap().is_none());

        store.register(assignment("p3", "w-1", "2025-03-03T10:00:00Z")).unwrap();
        assert_eq!(store.find_by_device("w-1").unwrap().unwrap().patient_id, "p3");
    }

    #[test]
    fn test_set_status() {
        let store = JsonAssignments::new(Collection::in_memory("assignments"));
        store.register(assignment("p1", "w-1", "2025-03-01T10:00:00Z")).unwrap();
        store.set_status("p1", Status::Critical).unwrap();
        assert_eq!(store.get("p1").unwrap().unwrap().status, Status::Critical);
        assert!(store.set_status("p9", Status::Ok).is_err());
    }

    #[test]
    fn test_reclassify_device() {
        let store = JsonAssignments::new(Collection::in_memory("assignments"));
        store.register(assignment("p1", "w-1", "2025-03-01T10:00:00Z")).unwrap();

        let update = store
            .reclassify_device("w-1", &mut |a| {
                assert_eq!(a.timestamp, "2025-03-01T10:00:00Z");
                Ok(Status::Warning)
            })
            .unwrap()
            .unwrap();
        assert_eq!(update.patient_id, "p1");
        assert_eq!(update.previous, Status::Unknown);
        assert_eq!(update.current, Status::Warning);
        assert_eq!(store.get("p1").unwrap().unwrap().status, Status::Warning);

        // device freed in the meantime: nothing to update, no error
        store.remove("p1").unwrap();
        assert_eq!(store.reclassify_device("w-1", &mut |_| Ok(Status::Critical)).unwrap(), None);

        // a failing grade leaves the stored status untouched
        store.register(assignment("p2", "w-1", "2025-03-02T10:00:00Z")).unwrap();
        let failed = store.reclassify_device("w-1", &mut |_| Err(StoreError::NotFound("window".into())));
        assert!(failed.is_err());
        assert_eq!(store.get("p2").unwrap().unwrap().status, Status::Unknown);
    }
}
