use crate::commands::Out;
use crate::error::{Error, ErrorType};
use crate::lookup::LookupService;
use crate::model::StudentRecord;
use crate::{Config, Result};

pub(crate) const NOT_FOUND_MESSAGE: &str = "This code is invalid or the student does not exist.";

/// Finds the student whose unique code is exactly `code`.
///
/// # Errors
/// - `ErrorType::NotFound` when no student has `code`.
pub async fn lookup(config: &Config, code: &str) -> Result<Out<StudentRecord>> {
    let service = LookupService::new(config.store());
    match service.find_by_code(code).await? {
        Some(student) => Ok(Out::new(found_message(&student), student)),
        None => Err(Error::message(ErrorType::NotFound, NOT_FOUND_MESSAGE)),
    }
}

pub(crate) fn found_message(student: &StudentRecord) -> String {
    match &student.student_name {
        Some(name) => format!("Found {name} ({})", student.unique_code),
        None => format!("Found {}", student.unique_code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::upload;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_lookup() {
        let env = TestEnv::new().await;
        let file = env
            .write_file(
                "grades.csv",
                "ID,Name,حضور حصة 2,امتحان الشهر,code\n5,Salma,حاضر,18.5,K-77\n".as_bytes(),
            )
            .await;
        upload(&env.config(), &file, TestEnv::PASSWORD)
            .await
            .unwrap();

        let out = lookup(&env.config(), "K-77").await.unwrap();
        assert_eq!(out.message(), "Found Salma (K-77)");
        let student = out.structure().unwrap();
        assert_eq!(student.sessions.len(), 2);
        assert_eq!(
            student.sessions.session(2).unwrap().attendance,
            Some("حاضر".into())
        );
        assert_eq!(
            student.exams.get("امتحان الشهر"),
            Some(&Some(18.5.into()))
        );
    }

    #[tokio::test]
    async fn test_lookup_not_found() {
        let env = TestEnv::new().await;
        let err = lookup(&env.config(), "K-77").await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::NotFound);
        assert_eq!(err.user_message(), NOT_FOUND_MESSAGE);
    }
}
