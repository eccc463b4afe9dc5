//! Finds one student by the unique code they present.

use crate::error::{ErrorType, IntoResult};
use crate::model::StudentRecord;
use crate::store::StudentStore;
use crate::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Looks up students by unique code in a `StudentStore`.
#[derive(Clone)]
pub struct LookupService {
    store: Arc<dyn StudentStore>,
}

impl LookupService {
    pub fn new(store: Arc<dyn StudentStore>) -> Self {
        Self { store }
    }

    /// Returns the student whose unique code is exactly `code`, or `None`. The code is compared as
    /// given, without trimming or case folding.
    ///
    /// # Errors
    /// - `ErrorType::Storage` if the store cannot be read.
    /// - `ErrorType::DataIntegrity` if the stored payload is corrupt.
    pub async fn find_by_code(&self, code: &str) -> Result<Option<StudentRecord>> {
        debug!("Searching for student with code: [{code}]");
        let stored = self
            .store
            .get_by_code(code)
            .await
            .pub_result(ErrorType::Storage)?;

        match stored {
            None => {
                info!("Student with code [{code}] not found");
                Ok(None)
            }
            Some(stored) => StudentRecord::from_stored(stored)
                .map(Some)
                .pub_result(ErrorType::DataIntegrity),
        }
    }
}
