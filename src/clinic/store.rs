//! Persistence boundary for the clinic directory.
//!
//! The cache never talks to storage itself; `ClinicStore` methods are what the
//! directory hands to `get_or_load` as loaders.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use dashmap::DashMap;
use tracing::debug;

use super::models::{CardRecord, Doctor, Office, Patient, Specialization};

/// Source of truth behind the clinic caches.
pub trait ClinicStore: Send + Sync + 'static {
    fn patient(&self, id: i64) -> impl Future<Output = Result<Option<Patient>>> + Send;
    fn patients(&self) -> impl Future<Output = Result<Vec<Patient>>> + Send;
    fn save_patient(&self, patient: Patient) -> impl Future<Output = Result<()>> + Send;
    /// Returns whether a patient was removed.
    fn delete_patient(&self, id: i64) -> impl Future<Output = Result<bool>> + Send;

    fn doctor(&self, id: i64) -> impl Future<Output = Result<Option<Doctor>>> + Send;
    fn doctors(&self) -> impl Future<Output = Result<Vec<Doctor>>> + Send;
    fn save_doctor(&self, doctor: Doctor) -> impl Future<Output = Result<()>> + Send;

    fn offices(&self) -> impl Future<Output = Result<Vec<Office>>> + Send;
    fn save_office(&self, office: Office) -> impl Future<Output = Result<()>> + Send;

    fn specializations(&self) -> impl Future<Output = Result<Vec<Specialization>>> + Send;
    fn save_specialization(&self, specialization: Specialization) -> impl Future<Output = Result<()>> + Send;

    /// Visits for one patient, oldest first.
    fn card_history(&self, patient_id: i64) -> impl Future<Output = Result<Vec<CardRecord>>> + Send;
    fn add_card_record(&self, record: CardRecord) -> impl Future<Output = Result<()>> + Send;
}

/// In-memory store with optional read latency and an outage switch.
#[derive(Debug, Default)]
pub struct MemoryStore {
    patients: DashMap<i64, Patient>,
    doctors: DashMap<i64, Doctor>,
    offices: DashMap<i64, Office>,
    specializations: DashMap<i64, Specialization>,
    cards: DashMap<i64, Vec<CardRecord>>,
    latency: Duration,
    reads: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every read by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of reads served so far, failed ones included.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Make every following read fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    async fn read_gate(&self, what: &'static str) -> Result<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        debug!(what, "Store read");
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("store unavailable while reading {what}");
        }
        Ok(())
    }
}

fn sorted_values<T: Clone>(map: &DashMap<i64, T>) -> Vec<T> {
    let mut rows: Vec<(i64, T)> = map
        .iter()
        .map(|row| (*row.key(), row.value().clone()))
        .collect();
    rows.sort_by_key(|(id, _)| *id);
    rows.into_iter().map(|(_, value)| value).collect()
}

impl ClinicStore for MemoryStore {
    async fn patient(&self, id: i64) -> Result<Option<Patient>> {
        self.read_gate("patient").await?;
        Ok(self.patients.get(&id).map(|row| row.clone()))
    }

    async fn patients(&self) -> Result<Vec<Patient>> {
        self.read_gate("patients").await?;
        Ok(sorted_values(&self.patients))
    }

    async fn save_patient(&self, patient: Patient) -> Result<()> {
        self.patients.insert(patient.id, patient);
        Ok(())
    }

    async fn delete_patient(&self, id: i64) -> Result<bool> {
        self.cards.remove(&id);
        Ok(self.patients.remove(&id).is_some())
    }

    async fn doctor(&self, id: i64) -> Result<Option<Doctor>> {
        self.read_gate("doctor").await?;
        Ok(self.doctors.get(&id).map(|row| row.clone()))
    }

    async fn doctors(&self) -> Result<Vec<Doctor>> {
        self.read_gate("doctors").await?;
        Ok(sorted_values(&self.doctors))
    }

    async fn save_doctor(&self, doctor: Doctor) -> Result<()> {
        self.doctors.insert(doctor.id, doctor);
        Ok(())
    }

    async fn offices(&self) -> Result<Vec<Office>> {
        self.read_gate("offices").await?;
        Ok(sorted_values(&self.offices))
    }

    async fn save_office(&self, office: Office) -> Result<()> {
        self.offices.insert(office.id, office);
        Ok(())
    }

    async fn specializations(&self) -> Result<Vec<Specialization>> {
        self.read_gate("specializations").await?;
        Ok(sorted_values(&self.specializations))
    }

    async fn save_specialization(&self, specialization: Specialization) -> Result<()> {
        self.specializations.insert(specialization.id, specialization);
        Ok(())
    }

    async fn card_history(&self, patient_id: i64) -> Result<Vec<CardRecord>> {
        self.read_gate("card history").await?;
        let mut records = self
            .cards
            .get(&patient_id)
            .map(|row| row.clone())
            .unwrap_or_default();
        records.sort_by_key(|record| (record.visited_at, record.id));
        Ok(records)
    }

    async fn add_card_record(&self, record: CardRecord) -> Result<()> {
        self.cards.entry(record.patient_id).or_default().push(record);
        Ok(())
    }
}
