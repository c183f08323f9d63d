mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    access::{gate, rewrite_admin_path, GateDecision, DEFAULT_FALLBACK_PATH, LOGIN_PATH},
    approvals::{Decision, PendingApplicant, PendingApplicants, PendingKind},
    users::UserDirectory,
    ApiClient, ControllerOptions, CursorFeed, FetchStatus, ListQuery, ListQueryController,
};
use shared::{
    domain::{Filter, SortKey, UserId, UserRole, UserStatus},
    protocol::{PendingAdvertiser, PendingInfluencer},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{load_settings, ConsoleSettings};

#[derive(Parser, Debug)]
#[command(about = "Admin console for the influencer marketplace API")]
struct Args {
    /// API origin, e.g. http://localhost:8080
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[arg(long, global = true)]
    session_cookie: Option<String>,
    #[arg(long, global = true)]
    page_size: Option<u32>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One page of the user directory.
    Users {
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value = "all")]
        role: Filter<UserRole>,
        #[arg(long, default_value = "all")]
        status: Filter<UserStatus>,
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value = "newest")]
        sort: SortKey,
    },
    /// Applicants waiting for review.
    Approvals {
        kind: PendingKind,
        /// Follow cursors until the queue is exhausted.
        #[arg(long)]
        all: bool,
        /// Local filter over the loaded applicants.
        #[arg(long, default_value = "")]
        filter: String,
    },
    Approve {
        kind: PendingKind,
        user_id: String,
    },
    Reject {
        kind: PendingKind,
        user_id: String,
    },
    PendingCount {
        kind: PendingKind,
    },
    Whoami {
        #[arg(long)]
        require_role: Option<UserRole>,
    },
    Logout,
    /// Internal path the web front serves for a host and path.
    Route {
        #[arg(long)]
        host: String,
        #[arg(long)]
        path: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let args = Args::parse();

    // Settings touch the process environment, so load them before the runtime
    // spawns its workers.
    let settings = load_settings();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?
        .block_on(run(args, settings))
}

async fn run(args: Args, mut settings: ConsoleSettings) -> Result<()> {
    if let Some(api_url) = args.api_url {
        settings.api_url = api_url;
    }
    if let Some(cookie) = args.session_cookie {
        settings.session_cookie = Some(cookie);
    }
    if let Some(page_size) = args.page_size {
        settings.page_size = page_size;
    }

    if let Command::Route { host, path } = &args.command {
        match rewrite_admin_path(host, path) {
            Some(rewritten) => println!("{path} -> {rewritten}"),
            None => println!("{path} (unchanged)"),
        }
        return Ok(());
    }

    let client = build_client(&settings)?;
    info!(api = %client.base_url(), "using API");

    match args.command {
        Command::Users {
            page,
            role,
            status,
            search,
            sort,
        } => {
            let query = ListQuery::new(settings.page_size)
                .with_page(page)
                .with_role(role)
                .with_status(status)
                .with_search(search)
                .with_sort(sort);
            list_users(client, &settings, query).await?
        }
        Command::Approvals { kind, all, filter } => match kind {
            PendingKind::Influencers => {
                show_queue::<PendingInfluencer>(client, all, filter).await?
            }
            PendingKind::Advertisers => {
                show_queue::<PendingAdvertiser>(client, all, filter).await?
            }
        },
        Command::Approve { kind, user_id } => {
            decide(&client, kind, &user_id, Decision::Approve).await?
        }
        Command::Reject { kind, user_id } => {
            decide(&client, kind, &user_id, Decision::Reject).await?
        }
        Command::PendingCount { kind } => {
            let count = client
                .pending_count(kind)
                .await
                .with_context(|| format!("failed to count pending {kind}"))?;
            println!("{count} pending {kind}");
        }
        Command::Whoami { require_role } => {
            let current = client.fetch_current_user().await;
            match &current.user {
                Some(user) => println!(
                    "{} ({}) role={}",
                    user.display_name.as_deref().unwrap_or("-"),
                    user.id,
                    user.role
                ),
                None if current.unauthorized => println!("not signed in"),
                None => println!("session unknown"),
            }
            if let Some(role) = require_role {
                match gate(Some(&current), role) {
                    GateDecision::Allowed => println!("access granted"),
                    GateDecision::SignInRequired => println!("sign in required: {LOGIN_PATH}"),
                    GateDecision::Forbidden { required } => {
                        println!("forbidden: {required} only, back to {DEFAULT_FALLBACK_PATH}")
                    }
                    GateDecision::Loading => {}
                }
            }
        }
        Command::Logout => {
            client.logout().await.context("logout failed")?;
            println!("signed out");
        }
        Command::Route { .. } => {}
    }

    Ok(())
}

fn build_client(settings: &ConsoleSettings) -> Result<ApiClient> {
    let mut builder = ApiClient::builder(settings.api_base());
    if let Some(cookie) = &settings.session_cookie {
        builder = builder.session_cookie(cookie.clone());
    }
    builder
        .build()
        .with_context(|| format!("failed to build API client for '{}'", settings.api_base()))
}

async fn list_users(client: ApiClient, settings: &ConsoleSettings, query: ListQuery) -> Result<()> {
    let options = ControllerOptions {
        page_size: settings.page_size,
        debounce: settings.debounce(),
        ..ControllerOptions::default()
    };
    let controller =
        ListQueryController::with_query(Arc::new(UserDirectory::new(client)), options, query);
    controller.start().await;
    let view = controller.wait_settled().await;

    if view.status == FetchStatus::Error {
        anyhow::bail!(
            "user list failed: {}",
            view.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    for user in &view.items {
        println!(
            "{:<24} {:<28} {:<11} {:<9} {}",
            user.id,
            user.email.as_deref().unwrap_or("-"),
            user.role,
            user.status,
            user.created_at.format("%Y-%m-%d")
        );
    }
    let summary = view.summary;
    println!(
        "page {} | total {} | on page {} | active {} | recent logins {}",
        view.query.page, summary.total, summary.page_count, summary.active_count, summary.recent_count
    );
    println!(
        "prev: {} | next: {}",
        if view.can_go_prev { "yes" } else { "no" },
        if view.can_go_next { "yes" } else { "no" }
    );
    Ok(())
}

trait QueueRow {
    fn row(&self) -> String;
}

impl QueueRow for PendingInfluencer {
    fn row(&self) -> String {
        format!(
            "{:<24} {:<28} {:<20} {}",
            self.user_id,
            self.email.as_deref().unwrap_or("-"),
            self.display_name.as_deref().unwrap_or("-"),
            self.categories.as_deref().unwrap_or_default().join(",")
        )
    }
}

impl QueueRow for PendingAdvertiser {
    fn row(&self) -> String {
        format!(
            "{:<24} {:<28} {:<20} {}",
            self.user_id,
            self.email.as_deref().unwrap_or("-"),
            self.company_name.as_deref().unwrap_or("-"),
            self.business_registration_number.as_deref().unwrap_or("-")
        )
    }
}

async fn show_queue<T: PendingApplicant + QueueRow>(
    client: ApiClient,
    all: bool,
    filter: String,
) -> Result<()> {
    let mut feed = CursorFeed::new(Arc::new(PendingApplicants::<T>::new(client)));
    feed.reload().await;
    while all && feed.has_more() && feed.error().is_none() {
        feed.load_more().await;
    }
    if let Some(err) = feed.error() {
        anyhow::bail!("pending {} failed: {err}", T::KIND);
    }

    feed.set_search(filter);
    if feed.is_empty() {
        println!("no pending {}", T::KIND);
        return Ok(());
    }
    for applicant in feed.filtered() {
        println!("{}", applicant.row());
    }
    if feed.has_more() {
        println!("more applicants available (--all)");
    }
    Ok(())
}

async fn decide(
    client: &ApiClient,
    kind: PendingKind,
    user_id: &str,
    decision: Decision,
) -> Result<()> {
    client
        .decide_applicant(kind, &UserId::from(user_id), decision)
        .await
        .with_context(|| format!("failed to {} {kind} applicant {user_id}", decision.segment(kind)))?;
    println!("{user_id}: {}", decision.past_tense(kind));
    Ok(())
}
