use anyhow::Result;
use clap::Parser;
use log::{error, info, LevelFilter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

mod credentials;
mod ui;
mod utils;

use chatline::{ChatClient, ChatSession, TokenStore};
use ui::ChatView;

/// Command line arguments for chatline
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "chatline: a terminal client for the support chat backend.",
    long_about = "chatline logs in, shows the conversation and polls for new messages.\n\n\
    Type a line to send it. Commands:\n\
    /image <PATH>   upload and send an image\n\
    /keywords       list suggested questions\n\
    /bottom         jump to the newest message and mark it read\n\
    /quit           leave"
)]
pub struct Args {
    /// Backend base URL (falls back to CHATLINE_BASE_URL)
    #[arg(long)]
    pub base_url: Option<String>,

    /// API key sent with every request (falls back to CHATLINE_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Phone number to log in with (falls back to CHATLINE_PHONE)
    #[arg(long)]
    pub phone: Option<String>,

    /// Temporary token for the first login (falls back to CHATLINE_TEMP_TOKEN)
    #[arg(long)]
    pub temp_token: Option<String>,

    /// Where the session token is kept between runs
    #[arg(long, value_name = "PATH")]
    pub token_file: Option<PathBuf>,

    /// Log destination
    #[arg(long, value_name = "PATH", default_value = "chatline.log")]
    pub log_file: PathBuf,

    /// Seconds between history polls
    #[arg(long, default_value_t = 3)]
    pub poll_secs: u64,
}

enum Command<'a> {
    Send(&'a str),
    Image(&'a Path),
    Keywords,
    Bottom,
    Quit,
}

fn parse_command(line: &str) -> Command<'_> {
    let trimmed = line.trim();
    match trimmed.split_once(' ') {
        Some(("/image", path)) => Command::Image(Path::new(path.trim())),
        _ => match trimmed {
            "/keywords" => Command::Keywords,
            "/bottom" => Command::Bottom,
            "/quit" | "/exit" => Command::Quit,
            _ => Command::Send(line),
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    utils::setup_logging(args.log_file.to_str(), LevelFilter::Debug)?;
    info!("chatline starting up");
    info!("System information: {} {}", std::env::consts::OS, std::env::consts::ARCH);
    info!("Logging to file: {}", args.log_file.display());

    let store = match &args.token_file {
        Some(path) => TokenStore::at(path),
        None => TokenStore::default_location()?,
    };
    let has_token = matches!(store.load(), Ok(Some(_)));
    let config = credentials::resolve_config(&args, !has_token)?;

    println!("Connecting to {}... please wait...\n", config.base_url);

    let client = ChatClient::new(&config)?;
    let (session, mut events) = ChatSession::new(Arc::new(client), config, Some(store));

    let view_session = session.clone();
    let view_task = tokio::spawn(async move {
        let mut view = ChatView::new();
        while let Some(event) = events.recv().await {
            view.handle(&view_session, event).await;
        }
    });

    session.start().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read input: {}", e);
                break;
            }
        };

        match parse_command(&line) {
            Command::Send(text) => {
                session.send_text(text).await;
            }
            Command::Image(path) => {
                session.send_image(path).await;
            }
            Command::Keywords => {
                for (i, keyword) in session.keywords().await.iter().enumerate() {
                    println!("  {}. {}", i + 1, keyword);
                }
            }
            Command::Bottom => session.scrolled(0.0).await,
            Command::Quit => break,
        }
    }

    session.close();
    drop(session);
    view_task.abort();
    info!("chatline exiting");
    Ok(())
}
