//! Dictum maintenance command line.

#![forbid(unsafe_code)]

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use dictum_application::{
    CategoryService, ListSubmittedDataInput, RegisterDictionaryInput, SubmissionService,
    SubmittedDataService, SystemIdGenerator, UploadBatch, UploadSubmissionInput,
};
use dictum_core::{AppError, AppResult, CategoryId, SubmissionId};
use dictum_domain::DataRecord;
use dictum_infrastructure::{
    DisabledSystemIdGenerator, HttpSchemaProvider, MIGRATOR, PostgresAuditRepository,
    PostgresSubmissionStore, RestrictionSchemaValidator, UuidSystemIdGenerator,
};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    database_max_connections: u32,
    schema_service_url: Url,
    schema_service_timeout_ms: u64,
    schema_service_max_attempts: u8,
    system_id_prefix: Option<String>,
    actor: String,
}

/// Dictum maintenance command line.
#[derive(Debug, Parser)]
#[command(name = "dictum-worker", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
enum Command {
    /// Applies pending database migrations.
    Migrate,
    /// Registers a dictionary version and points a category at it.
    RegisterDictionary {
        /// Category name.
        category: String,
        /// Dictionary name at the schema service.
        dictionary: String,
        /// Dictionary version at the schema service.
        version: String,
        /// Default centric entity for compound views.
        centric_entity: Option<String>,
    },
    /// Lists every category.
    Categories,
    /// Stages a JSON array of records as one upload batch.
    Upload {
        /// Category id.
        category_id: i64,
        /// Submitting organization.
        organization: String,
        /// Entity the records belong to.
        entity: String,
        /// Path of a JSON array of record objects.
        path: PathBuf,
    },
    /// Commits a valid submission.
    Commit {
        /// Category id.
        category_id: i64,
        /// Submission id.
        submission_id: i64,
    },
    /// Lists committed records of a category.
    List {
        /// Category id.
        category_id: i64,
        /// Restricts the listing to one organization.
        #[arg(long)]
        organization: Option<String>,
        /// Listing view, `flat` or `compound`.
        #[arg(long, default_value = "flat")]
        view: String,
        /// Restricts a flat listing to an entity; repeatable.
        #[arg(long = "entity")]
        entities: Vec<String>,
        /// One-based page number.
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Rows per page.
        #[arg(long, default_value_t = 20)]
        page_size: u32,
    },
    /// Revalidates committed records against the active dictionary.
    Revalidate {
        /// Category id.
        category_id: i64,
    },
}

struct Services {
    categories: CategoryService,
    submissions: SubmissionService,
    submitted_data: SubmittedDataService,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let command = Cli::parse().command;
    let config = WorkerConfig::load()?;
    let pool = connect_pool(&config).await?;

    if matches!(command, Command::Migrate) {
        MIGRATOR
            .run(&pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;
        info!("migrations applied");
        return Ok(());
    }

    let services = build_services(&config, pool)?;
    run(command, &config, &services).await
}

async fn run(command: Command, config: &WorkerConfig, services: &Services) -> AppResult<()> {
    match command {
        Command::Migrate => Ok(()),
        Command::RegisterDictionary {
            category,
            dictionary,
            version,
            centric_entity,
        } => {
            let registered = services
                .categories
                .register_dictionary(RegisterDictionaryInput {
                    category_name: category,
                    dictionary_name: dictionary,
                    dictionary_version: version,
                    default_centric_entity: centric_entity,
                })
                .await?;
            info!(
                category_id = %registered.category.id(),
                dictionary_id = %registered.dictionary.id(),
                changed = registered.active_dictionary_changed,
                "dictionary registered"
            );
            print_json(&registered.category)
        }
        Command::Categories => print_json(&services.categories.list_categories().await?),
        Command::Upload {
            category_id,
            organization,
            entity,
            path,
        } => {
            let records = read_records(path.as_path())?;
            let batch_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let submission = services
                .submissions
                .upload_submission(
                    config.actor.as_str(),
                    UploadSubmissionInput {
                        category_id: CategoryId::new(category_id),
                        organization,
                        batches: vec![UploadBatch {
                            entity_name: entity,
                            batch_name,
                            records,
                        }],
                    },
                )
                .await?;
            print_json(&submission)
        }
        Command::Commit {
            category_id,
            submission_id,
        } => {
            let committed = services
                .submissions
                .commit_submission(
                    config.actor.as_str(),
                    CategoryId::new(category_id),
                    SubmissionId::new(submission_id),
                )
                .await?;
            print_json(&serde_json::json!({
                "submissionId": committed.submission_id,
                "inserted": committed.inserted_system_ids,
                "updated": committed.updated,
                "deleted": committed.deleted,
            }))
        }
        Command::List {
            category_id,
            organization,
            view,
            entities,
            page,
            page_size,
        } => {
            let scoped = organization.is_some();
            let input = ListSubmittedDataInput {
                category_id: CategoryId::new(category_id),
                organization,
                view: Value::String(view),
                entity_names: entities,
                page,
                page_size,
            };
            let listing = if scoped {
                services.submitted_data.list_by_organization(input).await?
            } else {
                services.submitted_data.list_by_category(input).await?
            };
            print_json(&listing)
        }
        Command::Revalidate { category_id } => {
            let summary = services
                .submitted_data
                .revalidate_category(CategoryId::new(category_id))
                .await?;
            print_json(&serde_json::json!({
                "categoryId": summary.category_id,
                "dictionaryId": summary.dictionary_id,
                "valid": summary.valid,
                "invalid": summary.invalid,
            }))
        }
    }
}

async fn connect_pool(config: &WorkerConfig) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(config.database_url.as_str())
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_services(config: &WorkerConfig, pool: PgPool) -> AppResult<Services> {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.schema_service_timeout_ms))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;
    let schema_provider = Arc::new(HttpSchemaProvider::new(
        http_client,
        config.schema_service_url.clone(),
        config.schema_service_max_attempts,
        250,
    ));
    let store = Arc::new(PostgresSubmissionStore::new(pool.clone()));
    let audit_repository = Arc::new(PostgresAuditRepository::new(pool));
    let schema_validator = Arc::new(RestrictionSchemaValidator);
    let system_id_generator: Arc<dyn SystemIdGenerator> = match &config.system_id_prefix {
        Some(prefix) => Arc::new(UuidSystemIdGenerator::new(prefix.as_str())),
        None => Arc::new(DisabledSystemIdGenerator),
    };

    let categories = CategoryService::new(store.clone(), schema_provider);
    let submissions = SubmissionService::new(
        categories.clone(),
        store.clone(),
        store.clone(),
        schema_validator.clone(),
        system_id_generator,
        audit_repository,
    );
    let submitted_data = SubmittedDataService::new(categories.clone(), store, schema_validator);

    Ok(Services {
        categories,
        submissions,
        submitted_data,
    })
}

fn read_records(path: &Path) -> AppResult<Vec<DataRecord>> {
    let content = std::fs::read_to_string(path).map_err(|error| {
        AppError::Validation(format!("failed to read '{}': {error}", path.display()))
    })?;

    serde_json::from_str::<Vec<DataRecord>>(content.as_str()).map_err(|error| {
        AppError::Parse(format!(
            "'{}' must hold a JSON array of objects: {error}",
            path.display()
        ))
    })
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|error| AppError::Internal(format!("failed to render output: {error}")))?;
    println!("{rendered}");
    Ok(())
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let database_max_connections = parse_env("DATABASE_MAX_CONNECTIONS", 5_u32)?;
        let schema_service_url = required_env("SCHEMA_SERVICE_URL")?;
        let schema_service_url = Url::parse(schema_service_url.as_str()).map_err(|error| {
            AppError::Validation(format!(
                "invalid SCHEMA_SERVICE_URL value '{schema_service_url}': {error}"
            ))
        })?;
        let schema_service_timeout_ms = parse_env("SCHEMA_SERVICE_TIMEOUT_MS", 10_000_u64)?;
        let schema_service_max_attempts = parse_env("SCHEMA_SERVICE_MAX_ATTEMPTS", 3_u8)?;
        let system_id_prefix = env::var("SYSTEM_ID_PREFIX")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.eq_ignore_ascii_case("disabled"));
        let actor = env::var("WORKER_ACTOR")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "dictum-worker".to_owned());

        if database_max_connections == 0 {
            return Err(AppError::Validation(
                "DATABASE_MAX_CONNECTIONS must be greater than zero".to_owned(),
            ));
        }

        if schema_service_max_attempts == 0 {
            return Err(AppError::Validation(
                "SCHEMA_SERVICE_MAX_ATTEMPTS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            database_max_connections,
            schema_service_url,
            schema_service_timeout_ms,
            schema_service_max_attempts,
            system_id_prefix,
            actor,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> AppResult<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value.parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
