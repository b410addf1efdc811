//! Error types for the undercloud installer.
//!
//! One top-level [`UndercloudError`] wraps the domain errors raised while
//! loading configuration, checking the host, running external commands,
//! building the environment, and talking to the `OpenStack` APIs.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the undercloud installer.
#[derive(Debug, Error)]
pub enum UndercloudError {
    /// Configuration-related errors, including validation failures.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Host precondition failures.
    #[error("Host check failed: {0}")]
    Host(#[from] HostError),

    /// External command failures.
    #[error("{0}")]
    Command(#[from] CommandError),

    /// Environment contract violations.
    #[error("Environment error: {0}")]
    Environment(#[from] EnvironmentError),

    /// `OpenStack` API errors.
    #[error("OpenStack API error: {0}")]
    OpenStack(#[from] OpenStackError),

    /// Remote workflow execution errors.
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Post-install reconciliation errors.
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// An option carried a value that does not fit its type.
    #[error("Invalid value '{value}' for option {option}: {message}")]
    InvalidValue {
        /// Option name.
        option: String,
        /// The rejected raw value.
        value: String,
        /// Why it was rejected.
        message: String,
    },

    /// A configured subnet has no section in the configuration file.
    #[error("Subnet '{name}' is listed in subnets but has no configuration section")]
    MissingSubnetGroup {
        /// Name of the subnet.
        name: String,
    },

    /// Validation failed.
    #[error("{message}")]
    ValidationFailed {
        /// Description of the first violation.
        message: String,
    },

    /// The host operating system is not supported.
    #[error("{distribution} is not supported")]
    UnsupportedDistribution {
        /// Detected distribution name.
        distribution: String,
    },

    /// Two options were combined in a way that cannot work.
    #[error("{message}")]
    Incompatible {
        /// Description of the conflict.
        message: String,
    },
}

/// Host precondition failures.
#[derive(Debug, Error)]
pub enum HostError {
    /// Static and transient hostnames disagree.
    #[error(
        "Static hostname ({static_name}) does not match transient hostname ({transient_name}). \
         Use hostnamectl to set matching hostnames."
    )]
    HostnameMismatch {
        /// Static hostname.
        static_name: String,
        /// Transient hostname.
        transient_name: String,
    },

    /// The hostname has no domain part.
    #[error(
        "Configured hostname is not fully qualified: {hostname}. \
         Add it to /etc/hosts or set undercloud_hostname."
    )]
    NotFullyQualified {
        /// The short hostname.
        hostname: String,
    },

    /// Memory plus swap is below the minimum.
    #[error(
        "An undercloud with less than {required_mb} MB of memory plus swap is unsupported \
         (detected {detected_mb} MB)"
    )]
    InsufficientMemory {
        /// Required megabytes.
        required_mb: u64,
        /// Detected megabytes.
        detected_mb: u64,
    },

    /// Kernel parameters required by the services are not available.
    #[error("Missing sysctl options: {}", options.join(", "))]
    MissingSysctl {
        /// The unavailable sysctl keys.
        options: Vec<String>,
    },

    /// `local_ip` differs from the address of an existing installation.
    #[error(
        "Changing the local_ip is not allowed. Existing IP: {existing}, Configured IP: {configured}"
    )]
    LocalIpChanged {
        /// Address found in the network configuration on disk.
        existing: String,
        /// Address from the configuration file.
        configured: String,
    },

    /// A stackrc exists but its passwords file does not.
    #[error(
        "The {path} file is missing. This will cause all service passwords to change and \
         break the existing undercloud."
    )]
    PasswordsFileMissing {
        /// Expected location of the passwords file.
        path: PathBuf,
    },

    /// Host facts could not be collected.
    #[error("Failed to inspect host: {message}")]
    Inspection {
        /// Description of the failure.
        message: String,
    },
}

/// External command failures.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A captured command exited non-zero.
    #[error("{name} failed with exit status {status:?}: {output}")]
    Failed {
        /// Display name of the command.
        name: String,
        /// Exit status, if the process exited normally.
        status: Option<i32>,
        /// Combined stdout and stderr.
        output: String,
    },

    /// A live command exited non-zero.
    #[error("{name} failed. See log for details.")]
    LiveFailed {
        /// Display name of the command.
        name: String,
    },

    /// The command could not be started.
    #[error("Failed to start {name}: {source}")]
    Spawn {
        /// Display name of the command.
        name: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The command line was empty.
    #[error("Empty command line")]
    Empty,
}

/// Environment contract violations.
#[derive(Debug, Error)]
pub enum EnvironmentError {
    /// The key is not in the allow-list.
    #[error("{key} is not a valid undercloud environment key")]
    KeyNotPermitted {
        /// The rejected key.
        key: String,
    },

    /// A derived value could not be serialized.
    #[error("Failed to serialize {key}: {message}")]
    Serialization {
        /// Key being produced.
        key: String,
        /// Description of the failure.
        message: String,
    },
}

/// `OpenStack` API errors.
#[derive(Debug, Error)]
pub enum OpenStackError {
    /// Authentication failed.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from the service.
        message: String,
    },

    /// The resource already exists or the request conflicts with current state.
    #[error("Conflict: {message}")]
    Conflict {
        /// Error message from the service.
        message: String,
    },

    /// The resource does not exist.
    #[error("{resource} not found: {name}")]
    NotFound {
        /// Kind of resource.
        resource: String,
        /// Name or identifier.
        name: String,
    },

    /// The service catalog has no endpoint of the requested type.
    #[error("No {interface} endpoint for service type {service_type} in catalog")]
    ServiceNotInCatalog {
        /// Service type, e.g. `compute`.
        service_type: String,
        /// Endpoint interface, e.g. `public`.
        interface: String,
    },

    /// Network error.
    #[error("Network error: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from the API.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Remote workflow execution errors.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The execution reached a terminal state other than success.
    #[error("{message}")]
    Failed {
        /// Execution identifier.
        execution_id: String,
        /// Collected diagnostics.
        message: String,
    },

    /// The execution did not finish in time.
    #[error("TIMEOUT waiting for execution {execution_id} to finish. State: {state}")]
    Timeout {
        /// Execution identifier.
        execution_id: String,
        /// Last observed state.
        state: String,
    },
}

/// Post-install reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The local subnet CIDR is bound to another segment.
    #[error(
        "Local subnet cidr already associated. Cidr {cidr} is associated with segment id \
         {segment_id} (subnet {subnet_id})."
    )]
    LocalSubnetConflict {
        /// The conflicting CIDR.
        cidr: String,
        /// Existing subnet id.
        subnet_id: String,
        /// Segment the subnet belongs to.
        segment_id: String,
    },

    /// An expected resource was not available.
    #[error("Failed to reconcile {resource_type} '{name}': {reason}")]
    ResourceReconcileFailed {
        /// Type of resource.
        resource_type: String,
        /// Name of the resource.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// Upgrade refused because stacks are mid-operation.
    #[error("Stacks not in a COMPLETE state: {}", stacks.join(", "))]
    StacksNotComplete {
        /// Offending stack names with their status.
        stacks: Vec<String>,
    },
}

/// Result type alias for undercloud operations.
pub type Result<T> = std::result::Result<T, UndercloudError>;

impl UndercloudError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::OpenStack(OpenStackError::NetworkError { .. }))
    }
}

impl ConfigError {
    /// Creates a validation failure.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }

    /// Creates a parse error for the given file.
    #[must_use]
    pub fn parse(message: impl Into<String>, location: Option<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location,
        }
    }
}

impl OpenStackError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Creates an invalid-response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Returns true if the service reported a conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
