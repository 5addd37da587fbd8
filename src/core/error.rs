//! Unified error handling for wireup
//!
//! Resolution, lifecycle and configuration failures share one error type so
//! that the registry, the resolver and the orchestrator never need to depend
//! on each other's error definitions.

use std::{any::Any, fmt};

use super::registry::Capability;

/// Boxed error returned by service hooks and provision constructors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Lifecycle phase a service hook belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Start,
    Stop,
    Finit,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Start => "start",
            Phase::Stop => "stop",
            Phase::Finit => "finit",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw payload recovered from a panicking service hook
pub struct PanicPayload(Box<dyn Any + Send>);

impl PanicPayload {
    pub fn new(payload: Box<dyn Any + Send>) -> Self {
        Self(payload)
    }

    /// Panic message, when the payload is a `&str` or a `String`
    pub fn as_str(&self) -> Option<&str> {
        if let Some(msg) = self.0.downcast_ref::<&'static str>() {
            Some(msg)
        } else {
            self.0.downcast_ref::<String>().map(String::as_str)
        }
    }

    /// Typed access to a non-string payload
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn into_inner(self) -> Box<dyn Any + Send> {
        self.0
    }
}

impl fmt::Debug for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(msg) => f.debug_tuple("PanicPayload").field(&msg).finish(),
            None => f.write_str("PanicPayload(<non-string payload>)"),
        }
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or("<non-string payload>"))
    }
}

/// Unified error types for resolution and orchestration
#[derive(Debug)]
pub enum Error {
    /// A demanded capability has no provision
    ImplementationNotProvided { capability: Capability },

    /// A singular capability has more than one provision
    MultipleProvisionsForSingularSlot { capability: Capability, count: usize },

    /// Capabilities that could not be built because they wait on each other
    CyclicDependency { capabilities: Vec<Capability> },

    /// A capability whose provision depends on a capability that failed
    DependencyNotResolved {
        capability: Capability,
        dependency: Capability,
    },

    /// A provision constructor returned an error
    ProvisionFailed {
        capability: Capability,
        source: Box<Error>,
    },

    /// All errors of a resolution pass, surfaced together
    Resolution(Vec<Error>),

    /// A service failed its init hook
    ServiceInitFailed { service: String, source: BoxError },

    /// A service failed its start hook
    ServiceStartFailed { service: String, source: BoxError },

    /// A hook returned a context not derived from the one it was given
    ContextDiscarded { service: String, phase: Phase },

    /// `init_and_start` was called again before teardown
    AlreadyInitialized,

    /// A service hook panicked
    PanicInService {
        service: String,
        index: usize,
        phase: Phase,
        payload: PanicPayload,
    },

    /// Configuration errors
    Configuration(String),

    /// I/O errors
    Io(std::io::Error),
}

impl Error {
    /// Whether the error was raised while resolving declarations
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Error::ImplementationNotProvided { .. }
                | Error::MultipleProvisionsForSingularSlot { .. }
                | Error::CyclicDependency { .. }
                | Error::DependencyNotResolved { .. }
                | Error::ProvisionFailed { .. }
                | Error::Resolution(_)
        )
    }

    /// Name of the service the error is attributed to, if any
    pub fn service(&self) -> Option<&str> {
        match self {
            Error::ServiceInitFailed { service, .. }
            | Error::ServiceStartFailed { service, .. }
            | Error::ContextDiscarded { service, .. }
            | Error::PanicInService { service, .. } => Some(service),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ImplementationNotProvided { capability } => {
                write!(f, "Implementation not provided: {capability}")
            }
            Error::MultipleProvisionsForSingularSlot { capability, count } => {
                write!(f, "Multiple provisions ({count}) for singular slot: {capability}")
            }
            Error::CyclicDependency { capabilities } => {
                write!(f, "Cyclic dependency between: ")?;
                for (i, capability) in capabilities.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{capability}")?;
                }
                Ok(())
            }
            Error::DependencyNotResolved {
                capability,
                dependency,
            } => write!(f, "Dependency {dependency} of {capability} is not resolved"),
            Error::ProvisionFailed { capability, source } => {
                write!(f, "Provision of {capability} failed: {source}")
            }
            Error::Resolution(errors) => {
                write!(f, "Resolution failed with {} error(s)", errors.len())?;
                for err in errors {
                    write!(f, "; {err}")?;
                }
                Ok(())
            }
            Error::ServiceInitFailed { service, source } => {
                write!(f, "Service '{service}' init failed: {source}")
            }
            Error::ServiceStartFailed { service, source } => {
                write!(f, "Service '{service}' start failed: {source}")
            }
            Error::ContextDiscarded { service, phase } => write!(
                f,
                "Service '{service}' returned a context from {phase} that does not extend its input"
            ),
            Error::AlreadyInitialized => {
                write!(f, "Services are already initialized; stop and finit them first")
            }
            Error::PanicInService {
                service,
                phase,
                payload,
                ..
            } => write!(f, "Service '{service}' panicked during {phase}: {payload}"),
            Error::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            Error::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ProvisionFailed { source, .. } => Some(source.as_ref()),
            Error::ServiceInitFailed { source, .. } | Error::ServiceStartFailed { source, .. } => {
                Some(source.as_ref())
            }
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Configuration(format!("invalid yaml: {err}"))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Error::Configuration(format!("validation failed: {err}"))
    }
}

/// Result type alias for wireup operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Result type returned by service hooks
pub type ServiceResult<T> = std::result::Result<T, BoxError>;

#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::core::error::Error::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::Error::Configuration(format!($fmt, $($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payload_messages() {
        let payload = PanicPayload::new(Box::new("somethingwrong"));
        assert_eq!(payload.as_str(), Some("somethingwrong"));

        let payload = PanicPayload::new(Box::new(String::from("owned")));
        assert_eq!(payload.as_str(), Some("owned"));

        let payload = PanicPayload::new(Box::new(42_u32));
        assert_eq!(payload.as_str(), None);
        assert_eq!(payload.downcast_ref::<u32>(), Some(&42));
        assert_eq!(payload.to_string(), "<non-string payload>");
    }

    #[test]
    fn test_service_errors_name_only_the_failing_service() {
        let err = Error::ServiceStartFailed {
            service: "Service2".to_string(),
            source: "Service2:Start fails".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Service2"));
        assert!(!msg.contains("Service1"));
        assert_eq!(err.service(), Some("Service2"));
        assert!(!err.is_resolution());
    }

    #[test]
    fn test_resolution_error_display() {
        let err = Error::Resolution(vec![
            Error::ImplementationNotProvided {
                capability: Capability::of::<u8>(),
            },
            Error::CyclicDependency {
                capabilities: vec![Capability::of::<u16>(), Capability::collection_of::<u32>()],
            },
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("Resolution failed with 2 error(s)"));
        assert!(msg.contains("Implementation not provided: u8"));
        assert!(msg.contains("u16, [u32]"));
        assert!(err.is_resolution());
    }

    #[test]
    fn test_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_error.into();
        assert!(matches!(err, Error::Io(_)));

        let err = config_error!("bad level {}", "loud");
        assert_eq!(err.to_string(), "Configuration error: bad level loud");
    }
}
