use super::{AuditLog, Collection, StoreError};
use vitals_core::models::compare_timestamps;
use vitals_core::AuditRecord;

pub struct JsonAuditLog {
    docs: Collection<AuditRecord>,
}

impl JsonAuditLog {
    pub fn new(docs: Collection<AuditRecord>) -> Self {
        Self { docs }
    }
}

impl AuditLog for JsonAuditLog {
    fn append(&self, record: AuditRecord) -> Result<(), StoreError> {
        self.docs.push(record)
    }

    fn list(&self) -> Result<Vec<AuditRecord>, StoreError> {
        let mut all: Vec<AuditRecord> = self.docs.read(|docs| docs.iter().rev().cloned().collect());
        all.sort_by(|a, b| compare_timestamps(&b.timestamp, &a.timestamp));
        Ok(all)
    }
}
