#![allow(dead_code)]
//! # Common Test Utilities
//!
//! Shared setup for the domain tests: tracing, plus seeding of a small world
//! with a submitter, an admin reviewer and the reference rows a submission needs.

use anyhow::Result;
use core_access::{Role, User};
use medreturn::{
    reference::{MedicineType, Pharmacy},
    submissions::{self, NewSubmission, Submission},
};
use medreturn_test_utils::TestSetup;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initializes the tracing subscriber for tests.
pub fn setup_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

pub struct World {
    pub setup: TestSetup,
    pub admin: User,
    pub submitter: User,
    pub pharmacy: Pharmacy,
    pub medicine_type: MedicineType,
}

impl World {
    pub async fn new() -> Result<Self> {
        setup_tracing();
        let setup = TestSetup::new().await?;
        let admin = setup.seed_user("Quản Trị", Role::Admin).await?;
        let submitter = setup.seed_user("Nguyễn Văn A", Role::User).await?;
        let pharmacy = setup.seed_pharmacy("Nhà thuốc An Khang").await?;
        let medicine_type = setup.seed_medicine_type("Paracetamol").await?;
        Ok(Self {
            setup,
            admin,
            submitter,
            pharmacy,
            medicine_type,
        })
    }

    pub fn new_submission(&self, quantity: i64) -> NewSubmission {
        NewSubmission {
            pharmacy_id: self.pharmacy.id.clone(),
            medicine_type_id: self.medicine_type.id.clone(),
            quantity,
            unit: Some("viên".to_string()),
            expiry_date: Some("2025-06-01".to_string()),
            certificate_url: None,
            note: None,
        }
    }

    /// Creates a pending submission of `quantity` units for the submitter.
    pub async fn submit(&self, quantity: i64) -> Result<Submission> {
        Ok(submissions::create_submission(
            &self.setup.store,
            &self.submitter,
            self.new_submission(quantity),
        )
        .await?)
    }
}
