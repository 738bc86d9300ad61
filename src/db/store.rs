//! Store collaborator: durable record of structured fields, known patient
//! identifiers, document hashes, and per-document validation errors.
//!
//! All operations are append-only except `set_readmitted`, which flips the
//! readmission flag on already-stored rows when a later document reveals
//! the same patient.

use std::collections::HashSet;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::DatabaseError;
use crate::pipeline::types::{ExtractionRecord, PatientRecord};

/// Persistence contract for the batch pipeline.
pub trait PatientStore: Send + Sync {
    /// Append one patient row (one row per document, never updated except
    /// the readmission flag).
    fn append_record(&self, conn: &Connection, record: &PatientRecord)
        -> Result<(), DatabaseError>;

    /// All distinct non-null UINs currently stored.
    fn known_uins(&self, conn: &Connection) -> Result<HashSet<String>, DatabaseError>;

    /// Mark every stored row of this UIN as a readmission.
    fn set_readmitted(&self, conn: &Connection, uin: &str) -> Result<(), DatabaseError>;

    /// First stored row for the UIN, if any.
    fn find_by_uin(
        &self,
        conn: &Connection,
        uin: &str,
    ) -> Result<Option<PatientRecord>, DatabaseError>;

    /// Append a validation/error report keyed by document id.
    fn append_error_log(
        &self,
        conn: &Connection,
        document_id: &str,
        errors: &serde_json::Value,
    ) -> Result<(), DatabaseError>;

    fn has_document_hash(&self, conn: &Connection, hash: &str) -> Result<bool, DatabaseError>;

    fn add_document_hash(&self, conn: &Connection, hash: &str) -> Result<(), DatabaseError>;
}

/// SQLite-backed [`PatientStore`].
pub struct SqlitePatientStore;

impl PatientStore for SqlitePatientStore {
    fn append_record(
        &self,
        conn: &Connection,
        record: &PatientRecord,
    ) -> Result<(), DatabaseError> {
        let f = &record.fields;
        conn.execute(
            "INSERT INTO patients (
                uin, document_id, full_name, sex, birth_date, address,
                age_at_admission, snils, policy_number, hospital,
                admission_date, discharge_date, death_date, region, readmission
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                record.uin,
                record.document_id,
                f.full_name,
                f.sex,
                f.birth_date,
                f.address,
                record.age_at_admission,
                f.snils,
                f.policy_number,
                f.hospital,
                f.admission_date,
                f.discharge_date,
                f.death_date,
                record.region,
                record.readmission as i64,
            ],
        )?;
        Ok(())
    }

    fn known_uins(&self, conn: &Connection) -> Result<HashSet<String>, DatabaseError> {
        let mut stmt =
            conn.prepare("SELECT DISTINCT uin FROM patients WHERE uin IS NOT NULL")?;
        let uins = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(uins)
    }

    fn set_readmitted(&self, conn: &Connection, uin: &str) -> Result<(), DatabaseError> {
        conn.execute(
            "UPDATE patients SET readmission = 1 WHERE uin = ?1",
            params![uin],
        )?;
        Ok(())
    }

    fn find_by_uin(
        &self,
        conn: &Connection,
        uin: &str,
    ) -> Result<Option<PatientRecord>, DatabaseError> {
        let record = conn
            .query_row(
                "SELECT uin, document_id, full_name, sex, birth_date, address,
                        age_at_admission, snils, policy_number, hospital,
                        admission_date, discharge_date, death_date, region, readmission
                 FROM patients WHERE uin = ?1 LIMIT 1",
                params![uin],
                |row| {
                    Ok(PatientRecord {
                        uin: row.get(0)?,
                        document_id: row.get(1)?,
                        fields: ExtractionRecord {
                            full_name: row.get(2)?,
                            sex: row.get(3)?,
                            birth_date: row.get(4)?,
                            address: row.get(5)?,
                            snils: row.get(7)?,
                            policy_number: row.get(8)?,
                            hospital: row.get(9)?,
                            admission_date: row.get(10)?,
                            discharge_date: row.get(11)?,
                            death_date: row.get(12)?,
                        },
                        age_at_admission: row.get(6)?,
                        region: row.get(13)?,
                        readmission: row.get::<_, i64>(14)? != 0,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn append_error_log(
        &self,
        conn: &Connection,
        document_id: &str,
        errors: &serde_json::Value,
    ) -> Result<(), DatabaseError> {
        conn.execute(
            "INSERT INTO error_log (document_id, errors, logged_at) VALUES (?1, ?2, ?3)",
            params![document_id, errors.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn has_document_hash(&self, conn: &Connection, hash: &str) -> Result<bool, DatabaseError> {
        let found = conn
            .query_row(
                "SELECT 1 FROM document_hashes WHERE hash = ?1",
                params![hash],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn add_document_hash(&self, conn: &Connection, hash: &str) -> Result<(), DatabaseError> {
        conn.execute(
            "INSERT OR IGNORE INTO document_hashes (hash) VALUES (?1)",
            params![hash],
        )?;
        Ok(())
    }
}
