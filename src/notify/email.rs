//! Email side-channel used as a fallback delivery path.
//!
//! The actual mail infrastructure belongs to the clinic backend; this service
//! only needs a seam to hand the attempt to. A send failure is logged by the
//! caller and never affects the persistence outcome.

pub type EmailError = Box<dyn std::error::Error + Send + Sync>;

pub trait EmailSender: Send + Sync {
    fn send(&self, user_id: i64, subject: &str, body: &str) -> Result<(), EmailError>;
}

/// Default mailer: records the attempt in the log and succeeds. Deployments
/// wire a real implementation in its place.
pub struct LogMailer;

impl EmailSender for LogMailer {
    fn send(&self, user_id: i64, subject: &str, _body: &str) -> Result<(), EmailError> {
        tracing::info!(user_id, subject = %subject, "email side-channel delivery");
        Ok(())
    }
}
