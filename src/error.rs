use thiserror::Error;

/// Failures of the PostgreSQL-backed store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Postgres error: {0}")]
    Postgres(tokio_postgres::Error),

    #[error("Store error: {0}")]
    Other(String),
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(err: tokio_postgres::Error) -> Self {
        let unique = err
            .as_db_error()
            .filter(|db| db.code() == &tokio_postgres::error::SqlState::UNIQUE_VIOLATION)
            .map(|db| db.constraint().unwrap_or_default().to_string());

        match unique {
            Some(constraint) => StoreError::UniqueViolation(constraint),
            None => StoreError::Postgres(err),
        }
    }
}

/// Failures of the photo blob store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Authentication failures, each with a stable code and a message shown to the user
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing identity")]
    MissingIdentity,
    #[error("invalid identity")]
    InvalidIdentity,
    #[error("profile not found")]
    ProfileNotFound,
    #[error("profile already exists")]
    ProfileAlreadyExists,
    #[error("email already in use")]
    EmailInUse,
    #[error("invalid email")]
    InvalidEmail,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingIdentity => "auth/missing-identity",
            AuthError::InvalidIdentity => "auth/invalid-identity",
            AuthError::ProfileNotFound => "auth/user-not-found",
            AuthError::ProfileAlreadyExists => "auth/profile-already-exists",
            AuthError::EmailInUse => "auth/email-already-in-use",
            AuthError::InvalidEmail => "auth/invalid-email",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::MissingIdentity => "Необходимо войти в систему",
            AuthError::InvalidIdentity => "Некорректный идентификатор пользователя",
            AuthError::ProfileNotFound => "Пользователь не найден",
            AuthError::ProfileAlreadyExists => "Профиль уже создан",
            AuthError::EmailInUse => "Этот email уже используется",
            AuthError::InvalidEmail => "Некорректный email",
        }
    }
}

/// Errors surfaced by the directory operations
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Photo upload failed: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::Validation(errors.to_string())
    }
}
