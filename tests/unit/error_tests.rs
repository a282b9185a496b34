use taskbridge::errors::AppError;

#[test]
fn display_prefixes_each_domain() {
    assert_eq!(AppError::Config("bad port".into()).to_string(), "config: bad port");
    assert_eq!(AppError::Db("locked".into()).to_string(), "db: locked");
    assert_eq!(AppError::Slack("timeout".into()).to_string(), "slack: timeout");
    assert_eq!(
        AppError::Classifier("no choices".into()).to_string(),
        "classifier: no choices"
    );
    assert_eq!(
        AppError::Tracker("no item id".into()).to_string(),
        "tracker: no item id"
    );
    assert_eq!(AppError::Auth("mismatch".into()).to_string(), "auth: mismatch");
    assert_eq!(
        AppError::Validation("bad shape".into()).to_string(),
        "validation: bad shape"
    );
    assert_eq!(
        AppError::NotFound("thread x".into()).to_string(),
        "not found: thread x"
    );
    assert_eq!(AppError::Io("disk full".into()).to_string(), "io: disk full");
}

#[test]
fn toml_errors_convert_to_config() {
    let err = toml::from_str::<toml::Value>("= broken").unwrap_err();
    let app: AppError = err.into();
    assert!(matches!(app, AppError::Config(_)));
}

#[test]
fn sqlx_errors_convert_to_db() {
    let app: AppError = sqlx::Error::RowNotFound.into();
    assert!(matches!(app, AppError::Db(_)));
}
