/// Header carrying the authenticated subject, set by the trusted gateway in
/// front of this service.
pub const PRINCIPAL_HEADER: &str = "x-principal-id";

/// Principal context for a request (the authenticated subject).
///
/// Inserted into request extensions by the identity middleware and required
/// by every guarded route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    subject: String,
}

impl PrincipalContext {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}
