use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use superblog::api::models::PostDraft;
use superblog::config::{Cli, Command, Config};
use superblog::db;
use superblog::error::ClientError;
use superblog::routes::editor::EditorPage;
use superblog::routes::post::PostPage;
use superblog::routes::{self, authorize, Route, Screen};
use superblog::state::AppState;

#[tokio::main]
async fn main() {
    // Logs go to stderr so page output stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        match err.downcast_ref::<ClientError>() {
            Some(client) => eprintln!("{}", client.user_message()),
            None => eprintln!("Error: {err:#}"),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let data_dir = Config::data_dir(&cli)?;
    std::fs::create_dir_all(&data_dir)?;
    tracing::debug!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    let pool = db::create_pool(config.db_path()?)?;
    db::run_migrations(&pool)?;

    let state = AppState::new(config, pool)?;

    // Logging out must not touch the network
    if cli.command != Command::Logout {
        if let Err(err) = state.session.fetch_user_data().await {
            tracing::warn!("Could not resolve session: {}", err);
        }
    }

    match cli.command {
        Command::Logout => {
            routes::auth::logout(&state)?;
            println!("Logged out.");
        }
        Command::Login { username, password } => {
            let user = routes::auth::login(&state, &username, &password).await?;
            println!("Logged in as {}", user.username);
        }
        Command::Register { username, password } => {
            let user = routes::auth::register(&state, &username, &password).await?;
            println!(
                "Registered {}. Log in with: superblog login {} <password>",
                user.username, user.username
            );
        }
        Command::Whoami => println!("{}", routes::auth::whoami(&state.session.snapshot())),
        Command::Posts { search } => show(&state, Route::Home { search }).await,
        Command::Category { name } => show(&state, Route::Category { name }).await,
        Command::Categories => show(&state, Route::Categories).await,
        Command::Post { slug } => show(&state, Route::Post { slug }).await,
        Command::Comment { slug, content } => {
            let page = PostPage::open(&state, &slug).await;
            if let Some(failure) = page.post().failure() {
                return Err(failure.into());
            }
            page.submit_comment(&content).await?;
            print!("{}", page.render());
        }
        Command::Create {
            title,
            content,
            content_file,
            category,
            image,
        } => {
            guard(&state, &Route::NewPost).await?;
            let content = read_content(content, content_file)?.unwrap_or_default();
            let draft = PostDraft {
                title,
                content,
                category,
                image,
            };
            let saved = EditorPage::create(&state).await.submit(&draft).await?;
            println!("Created post {}", saved.slug);
        }
        Command::Edit {
            slug,
            title,
            content,
            content_file,
            category,
            image,
        } => {
            let route = Route::EditPost { slug: slug.clone() };
            guard(&state, &route).await?;
            let editor = EditorPage::edit(&state, &slug).await;
            editor.existing_post()?;
            let mut draft = editor.draft();
            if let Some(title) = title {
                draft.title = title;
            }
            if let Some(content) = read_content(content, content_file)? {
                draft.content = content;
            }
            if let Some(category) = category {
                draft.category = category;
            }
            draft.image = image;
            let saved = editor.submit(&draft).await?;
            println!("Updated post {}", saved.slug);
        }
        Command::Delete { slug } => {
            guard(&state, &Route::DeletePost { slug: slug.clone() }).await?;
            let page = PostPage::open(&state, &slug).await;
            if let Some(failure) = page.post().failure() {
                return Err(failure.into());
            }
            page.delete().await?;
            println!("Deleted post {slug}");
        }
    }
    Ok(())
}

async fn show(state: &AppState, route: Route) {
    print!("{}", routes::open(state, route).await);
}

async fn guard(state: &AppState, route: &Route) -> anyhow::Result<()> {
    state.session.resolved().await;
    match authorize(state, route) {
        Ok(()) => Ok(()),
        Err(Screen::Redirect(Route::Login)) => Err(ClientError::Unauthorized.into()),
        Err(screen) => anyhow::bail!("{screen}"),
    }
}

fn read_content(
    inline: Option<String>,
    file: Option<std::path::PathBuf>,
) -> anyhow::Result<Option<String>> {
    match (inline, file) {
        (Some(text), _) => Ok(Some(text)),
        (None, Some(path)) => std::fs::read_to_string(&path)
            .map(Some)
            .with_context(|| format!("reading {}", path.display())),
        (None, None) => Ok(None),
    }
}
