//! Clinic lookups fronted by the cache regions.
//!
//! ## Regions
//!
//! | Name | Key | Value |
//! |---|---|---|
//! | `patientsById` | patient id | patient, if any |
//! | `patients` | `()` | all patients |
//! | `doctorsById` | doctor id | doctor, if any |
//! | `doctors` | `()` | all doctors |
//! | `offices` | `()` | all offices |
//! | `specializations` | `()` | all specializations |
//! | `patientCardHistory` | patient id | visits on the patient's card |

mod directory;
mod models;
mod store;

use std::sync::Arc;

use crate::cache::{CacheManager, CacheRegion, ConfigurationError};
use crate::config::CacheSettings;

pub use directory::ClinicDirectory;
pub use models::{CardRecord, Doctor, Office, Patient, Specialization};
pub use store::{ClinicStore, MemoryStore};

pub const PATIENTS_BY_ID: &str = "patientsById";
pub const PATIENTS: &str = "patients";
pub const DOCTORS_BY_ID: &str = "doctorsById";
pub const DOCTORS: &str = "doctors";
pub const OFFICES: &str = "offices";
pub const SPECIALIZATIONS: &str = "specializations";
pub const PATIENT_CARD_HISTORY: &str = "patientCardHistory";

/// Every region the clinic layer uses.
pub const REGION_NAMES: [&str; 7] = [
    PATIENTS_BY_ID,
    PATIENTS,
    DOCTORS_BY_ID,
    DOCTORS,
    OFFICES,
    SPECIALIZATIONS,
    PATIENT_CARD_HISTORY,
];

/// Typed handles to the clinic regions.
#[derive(Debug, Clone)]
pub struct ClinicCaches {
    pub patients_by_id: CacheRegion<i64, Option<Patient>>,
    pub patients: CacheRegion<(), Arc<Vec<Patient>>>,
    pub doctors_by_id: CacheRegion<i64, Option<Doctor>>,
    pub doctors: CacheRegion<(), Arc<Vec<Doctor>>>,
    pub offices: CacheRegion<(), Arc<Vec<Office>>>,
    pub specializations: CacheRegion<(), Arc<Vec<Specialization>>>,
    pub card_history: CacheRegion<i64, Arc<Vec<CardRecord>>>,
}

impl ClinicCaches {
    /// Create every clinic region from `settings`.
    pub fn register(manager: &CacheManager, settings: &CacheSettings) -> Result<Self, ConfigurationError> {
        settings.validate_overrides(&REGION_NAMES)?;

        Ok(Self {
            patients_by_id: manager.create_region(PATIENTS_BY_ID, settings.region_config(PATIENTS_BY_ID))?,
            patients: manager.create_region(PATIENTS, settings.region_config(PATIENTS))?,
            doctors_by_id: manager.create_region(DOCTORS_BY_ID, settings.region_config(DOCTORS_BY_ID))?,
            doctors: manager.create_region(DOCTORS, settings.region_config(DOCTORS))?,
            offices: manager.create_region(OFFICES, settings.region_config(OFFICES))?,
            specializations: manager.create_region(SPECIALIZATIONS, settings.region_config(SPECIALIZATIONS))?,
            card_history: manager
                .create_region(PATIENT_CARD_HISTORY, settings.region_config(PATIENT_CARD_HISTORY))?,
        })
    }

    /// Look up the regions previously created by [`ClinicCaches::register`].
    pub fn from_manager(manager: &CacheManager) -> Result<Self, ConfigurationError> {
        Ok(Self {
            patients_by_id: manager.region(PATIENTS_BY_ID)?,
            patients: manager.region(PATIENTS)?,
            doctors_by_id: manager.region(DOCTORS_BY_ID)?,
            doctors: manager.region(DOCTORS)?,
            offices: manager.region(OFFICES)?,
            specializations: manager.region(SPECIALIZATIONS)?,
            card_history: manager.region(PATIENT_CARD_HISTORY)?,
        })
    }
}
