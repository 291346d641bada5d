//! Read-through clinic directory.
//!
//! Reads go through `get_or_load`; every write goes to the store first and
//! then invalidates the regions that could now be stale.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use super::models::{CardRecord, Doctor, Office, Patient, Specialization};
use super::{ClinicCaches, ClinicStore};

pub struct ClinicDirectory<S: ClinicStore> {
    store: Arc<S>,
    caches: ClinicCaches,
}

impl<S: ClinicStore> ClinicDirectory<S> {
    pub fn new(store: Arc<S>, caches: ClinicCaches) -> Self {
        Self { store, caches }
    }

    pub fn caches(&self) -> &ClinicCaches {
        &self.caches
    }

    pub async fn patient(&self, id: i64) -> Result<Option<Patient>> {
        let store = Arc::clone(&self.store);
        let patient = self
            .caches
            .patients_by_id
            .get_or_load(id, move || async move { store.patient(id).await })
            .await?;
        Ok(patient)
    }

    pub async fn patients(&self) -> Result<Arc<Vec<Patient>>> {
        let store = Arc::clone(&self.store);
        let patients = self
            .caches
            .patients
            .get_or_load((), move || async move { anyhow::Ok(Arc::new(store.patients().await?)) })
            .await?;
        Ok(patients)
    }

    pub async fn doctor(&self, id: i64) -> Result<Option<Doctor>> {
        let store = Arc::clone(&self.store);
        let doctor = self
            .caches
            .doctors_by_id
            .get_or_load(id, move || async move { store.doctor(id).await })
            .await?;
        Ok(doctor)
    }

    pub async fn doctors(&self) -> Result<Arc<Vec<Doctor>>> {
        let store = Arc::clone(&self.store);
        let doctors = self
            .caches
            .doctors
            .get_or_load((), move || async move { anyhow::Ok(Arc::new(store.doctors().await?)) })
            .await?;
        Ok(doctors)
    }

    pub async fn offices(&self) -> Result<Arc<Vec<Office>>> {
        let store = Arc::clone(&self.store);
        let offices = self
            .caches
            .offices
            .get_or_load((), move || async move { anyhow::Ok(Arc::new(store.offices().await?)) })
            .await?;
        Ok(offices)
    }

    pub async fn specializations(&self) -> Result<Arc<Vec<Specialization>>> {
        let store = Arc::clone(&self.store);
        let specializations = self
            .caches
            .specializations
            .get_or_load((), move || async move {
                anyhow::Ok(Arc::new(store.specializations().await?))
            })
            .await?;
        Ok(specializations)
    }

    pub async fn card_history(&self, patient_id: i64) -> Result<Arc<Vec<CardRecord>>> {
        let store = Arc::clone(&self.store);
        let history = self
            .caches
            .card_history
            .get_or_load(patient_id, move || async move {
                anyhow::Ok(Arc::new(store.card_history(patient_id).await?))
            })
            .await?;
        Ok(history)
    }

    pub async fn save_patient(&self, patient: Patient) -> Result<()> {
        let id = patient.id;
        self.store.save_patient(patient).await?;

        self.caches.patients_by_id.invalidate(&id);
        self.caches.patients.clear();
        debug!(patient_id = id, "Saved patient, caches invalidated");
        Ok(())
    }

    /// Remove a patient and their card. Returns whether the patient existed.
    pub async fn delete_patient(&self, id: i64) -> Result<bool> {
        let removed = self.store.delete_patient(id).await?;

        self.caches.patients_by_id.invalidate(&id);
        self.caches.patients.clear();
        self.caches.card_history.invalidate(&id);
        debug!(patient_id = id, removed, "Deleted patient, caches invalidated");
        Ok(removed)
    }

    pub async fn save_doctor(&self, doctor: Doctor) -> Result<()> {
        let id = doctor.id;
        self.store.save_doctor(doctor).await?;

        self.caches.doctors_by_id.invalidate(&id);
        self.caches.doctors.clear();
        debug!(doctor_id = id, "Saved doctor, caches invalidated");
        Ok(())
    }

    pub async fn save_office(&self, office: Office) -> Result<()> {
        self.store.save_office(office).await?;
        self.caches.offices.clear();
        Ok(())
    }

    pub async fn save_specialization(&self, specialization: Specialization) -> Result<()> {
        self.store.save_specialization(specialization).await?;
        self.caches.specializations.clear();
        Ok(())
    }

    pub async fn add_card_record(&self, record: CardRecord) -> Result<()> {
        let patient_id = record.patient_id;
        self.store.add_card_record(record).await?;

        self.caches.card_history.invalidate(&patient_id);
        debug!(patient_id, "Added card record, history invalidated");
        Ok(())
    }
}
