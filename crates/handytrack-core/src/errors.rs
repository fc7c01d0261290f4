use thiserror::Error;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// This taxonomy provides a stable, structured classification of all errors
/// in the migration subsystem. Each kind maps to a stable error code that is
/// surfaced in `MigrationResult` and in CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Store
    /// Cannot open a connection or begin a transaction
    StoreUnavailable,
    /// The migration-history table does not exist yet
    StoreNotInitialized,

    // Migration execution
    /// An upgrade or downgrade step failed
    MigrationFailed,
    /// A rollback target has no downgrade step
    MissingDowngrade,
    /// Definitions do not form a valid total order (duplicate versions)
    VersionOrdering,
    /// A version string could not be parsed
    InvalidVersion,
    /// The point-in-time copy of the store could not be produced
    BackupFailed,

    // Schema consistency
    /// A declared foreign key is absent from the live store
    SchemaDrift,

    // Configuration
    InvalidConfig,

    // Integration/IO
    Io,
    Serialization,
    Persistence,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::StoreUnavailable => "ERR_STORE_UNAVAILABLE",
            ExErrorKind::StoreNotInitialized => "ERR_STORE_NOT_INITIALIZED",
            ExErrorKind::MigrationFailed => "ERR_MIGRATION_FAILED",
            ExErrorKind::MissingDowngrade => "ERR_MISSING_DOWNGRADE",
            ExErrorKind::VersionOrdering => "ERR_VERSION_ORDERING",
            ExErrorKind::InvalidVersion => "ERR_INVALID_VERSION",
            ExErrorKind::BackupFailed => "ERR_BACKUP_FAILED",
            ExErrorKind::SchemaDrift => "ERR_SCHEMA_DRIFT",
            ExErrorKind::InvalidConfig => "ERR_INVALID_CONFIG",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries a classification for programmatic handling plus the migration
/// context (version, description) needed to reproduce a failure from logs.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    version: Option<String>,
    description: Option<String>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            version: None,
            description: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add migration version context
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Add migration description context
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the migration version context, if any
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Get the migration description context, if any
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(version) = &self.version {
            write!(f, " (version: {})", version)?;
        }
        if let Some(description) = &self.description {
            write!(f, " (description: {})", description)?;
        }
        if let Some(source) = &self.source {
            write!(f, " caused by {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Domain error taxonomy for migration operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MigrationError {
    /// The store could not be opened or a transaction could not begin
    #[error("Store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    /// The migration-history table does not exist
    #[error("Store not initialized: history table {table} does not exist")]
    StoreNotInitialized { table: String },

    /// An upgrade or downgrade raised
    #[error("Migration {version} ({description}) failed: {reason}")]
    MigrationExecution {
        version: String,
        description: String,
        reason: String,
    },

    /// Rollback needs a downgrade the definition does not provide
    #[error("Migration {version} has no downgrade step")]
    MissingDowngrade { version: String },

    /// Two definitions share a version
    #[error("Duplicate migration version: {version}")]
    VersionOrdering { version: String },

    /// A version string is not a dotted numeric version
    #[error("Invalid version string: {input:?}")]
    InvalidVersion { input: String },

    /// The store backup could not be produced
    #[error("Backup failed: {reason}")]
    BackupFailed { reason: String },

    /// Runner configuration is unusable
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

/// Conversion from MigrationError to ExError
impl From<MigrationError> for ExError {
    fn from(err: MigrationError) -> Self {
        match err {
            MigrationError::StoreUnavailable { reason } => {
                ExError::new(ExErrorKind::StoreUnavailable)
                    .with_op("open_store")
                    .with_message(reason)
            }

            MigrationError::StoreNotInitialized { table } => {
                ExError::new(ExErrorKind::StoreNotInitialized)
                    .with_op("read_history")
                    .with_message(format!("History table {} does not exist", table))
            }

            MigrationError::MigrationExecution {
                version,
                description,
                reason,
            } => ExError::new(ExErrorKind::MigrationFailed)
                .with_version(version)
                .with_description(description)
                .with_message(reason),

            MigrationError::MissingDowngrade { version } => {
                ExError::new(ExErrorKind::MissingDowngrade)
                    .with_op("rollback")
                    .with_version(version)
                    .with_message("Migration has no downgrade step")
            }

            MigrationError::VersionOrdering { version } => {
                ExError::new(ExErrorKind::VersionOrdering)
                    .with_op("pending_migrations")
                    .with_version(version)
                    .with_message("Duplicate migration version")
            }

            MigrationError::InvalidVersion { input } => ExError::new(ExErrorKind::InvalidVersion)
                .with_op("parse_version")
                .with_message(format!("Invalid version string {:?}", input)),

            MigrationError::BackupFailed { reason } => ExError::new(ExErrorKind::BackupFailed)
                .with_op("backup")
                .with_message(reason),

            MigrationError::InvalidConfig { reason } => ExError::new(ExErrorKind::InvalidConfig)
                .with_op("config")
                .with_message(reason),
        }
    }
}
