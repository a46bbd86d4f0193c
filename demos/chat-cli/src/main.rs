//! Tutor chat CLI
//!
//! Signs in against the tutoring backend and streams chat answers:
//! 1. Restore the stored session, if any
//! 2. Otherwise run the browser sign-in and exchange for a session
//! 3. Stream the answer to a question as it arrives
//!
//! Run with:
//!   TUTOR_API_URL=http://localhost:8000 TUTOR_GOOGLE_CLIENT_ID=... \
//!     cargo run -p tutor-chat-cli -- ask "What is recursion?" --lecture lec-3

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use std::io::Write;
use tutor_session_sdk::{
    AuthState, ChatStreamRequest, ClientConfig, SessionManager, StreamExt, UserRole,
};

#[derive(Parser, Debug)]
#[command(name = "tutor-chat-cli")]
#[command(about = "Sign in to the tutoring backend and stream chat answers")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in, unless a stored session is still valid
    Login {
        /// Role to sign in as (student, teacher, admin)
        #[arg(default_value = "student")]
        role: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the current session
    Status,
    /// Stream an answer to a question
    Ask {
        /// Question to ask
        query: String,

        /// Lecture the question is about
        #[arg(long, short = 'l')]
        lecture: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tutor_session_sdk=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = ClientConfig::from_env().context("TUTOR_API_URL must point at the backend")?;
    let session = SessionManager::new(config)?;

    match args.command {
        Command::Login { role } => login(&session, UserRole::from(role.as_str())).await,
        Command::Logout => {
            session.sign_out();
            println!("✓ Signed out");
            Ok(())
        }
        Command::Status => {
            let state = session.check_auth_state().await;
            print_state(&state);
            Ok(())
        }
        Command::Ask { query, lecture } => ask(&session, &query, lecture.as_deref()).await,
    }
}

async fn login(session: &SessionManager, role: UserRole) -> anyhow::Result<()> {
    let state = session.check_auth_state().await;
    if state.is_authenticated() {
        println!("✓ Already signed in");
        print_state(&state);
        return Ok(());
    }

    let user = session.sign_in_with_google(role).await?;
    println!("✓ Signed in as {}", user.email);
    Ok(())
}

async fn ask(session: &SessionManager, query: &str, lecture: Option<&str>) -> anyhow::Result<()> {
    if !session.check_auth_state().await.is_authenticated() {
        bail!("not signed in; run `tutor-chat-cli login` first");
    }

    let request = match lecture {
        Some(id) => ChatStreamRequest::builder().query(query).lecture_id(id).build(),
        None => ChatStreamRequest::new(query),
    };

    let mut events = session.chat_transport().stream_chat_events(&request).await?;
    let mut stdout = std::io::stdout();
    while let Some(event) = events.next().await {
        let event = event?;
        match event.event_type() {
            "done" | "end" => break,
            "error" => bail!("backend reported an error: {}", event.data),
            _ => {
                print!("{}", event.data);
                stdout.flush()?;
            }
        }
    }
    println!();
    Ok(())
}

fn print_state(state: &AuthState) {
    match &state.user {
        Some(user) if state.is_authenticated() => {
            println!("  User:  {}", user.email);
            println!("  ID:    {}", user.id);
            if let Some(role) = &user.role {
                println!("  Role:  {role}");
            }
        }
        _ => println!("  Not signed in"),
    }
    if let Some(error) = &state.error {
        println!("  Last error: {error}");
    }
}
