use std::{process, sync::Arc};

use folio::{
    application::{
        content::ContentService,
        error::AppError,
        hooks::{ContentEvent, HookDispatcher},
        query::ContentFilter,
    },
    cache::{ContentCache, NoopCache, TtlStore},
    config,
    infra::{db::PostgresRepositories, error::InfraError, telemetry},
};
use serde::Serialize;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let report = error.report();
    if dispatcher::has_been_set() {
        error!(error = %error, chain = ?report.messages, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = ?report.messages, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::validation(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging)?;

    let repositories = init_repositories(&settings).await?;

    match cli_args.command {
        config::Command::Migrate => {
            PostgresRepositories::run_migrations(repositories.pool())
                .await
                .map_err(InfraError::from)?;
            info!(target = "folio::migrate", "migrations applied");
            Ok(())
        }
        command => {
            let service = build_content_service(repositories, &settings);
            run_content_command(&service, command).await
        }
    }
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::from)?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_content_service(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> ContentService {
    let content_settings = settings.content_settings();
    let cache: Arc<dyn ContentCache> = if content_settings.cache.enabled {
        Arc::new(TtlStore::new(&content_settings.cache))
    } else {
        Arc::new(NoopCache)
    };

    let hooks = HookDispatcher::new();
    for event in ["new_content", "update_content", "delete_content"] {
        hooks.on(event, |event: &ContentEvent| {
            info!(target = "folio::hooks", %event, "content event");
        });
    }

    ContentService::new(
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
        repositories,
        cache,
        Arc::new(hooks),
        content_settings,
    )
}

async fn run_content_command(
    service: &ContentService,
    command: config::Command,
) -> Result<(), AppError> {
    match command {
        config::Command::Get(args) => match service.get_one(args.id, args.allow_future).await? {
            Some(record) => print_json(&record),
            None => Err(AppError::NotFound),
        },
        config::Command::Query(args) => {
            let filter = parse_filter(&args.filter)?;
            print_json(&service.query(&filter).await?)
        }
        config::Command::Count(args) => {
            let filter = parse_filter(&args.filter)?;
            print_json(&service.count(&filter).await?)
        }
        config::Command::Resolve(args) => match service.resolve_id_by_path(&args.path).await? {
            Some(id) => print_json(&id),
            None => Err(AppError::NotFound),
        },
        config::Command::Hit(args) => match service.record_hit(args.id).await? {
            Some(hits) => print_json(&hits),
            None => Err(AppError::NotFound),
        },
        config::Command::Delete(args) => {
            if service.delete(args.id).await? {
                print_json(&args.id)
            } else {
                Err(AppError::NotFound)
            }
        }
        config::Command::Migrate => Ok(()),
    }
}

fn parse_filter(raw: &str) -> Result<ContentFilter, AppError> {
    serde_json::from_str(raw).map_err(|err| AppError::validation(format!("invalid filter: {err}")))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let encoded = serde_json::to_string_pretty(value).map_err(InfraError::from)?;
    println!("{encoded}");
    Ok(())
}
