//! CLI for hashtag-feed
//!
//! Subcommands:
//! - `post`: publish one tweet under a hashtag and exit
//! - `follow`: follow a hashtag and print what gets posted under it
//!
//! Broker and topic settings come from `config/default.*`, `.env` and
//! `HASHTAG_FEED_*` environment variables.

use clap::Parser;
use hashtag_feed::client::{ClientEvent, TweetClient};
use hashtag_feed::config::{Settings, load_config};
use hashtag_feed::session::ConnectionStatus;
use hashtag_feed::subscription::TopicEvent;
use hashtag_feed::utils::logging;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info, warn};

const DEFAULT_TWEET: &str = "Hello MQTT!";

#[derive(Parser)]
#[command(name = "hashtag-feed")]
enum Command {
    /// Publish a tweet under a hashtag
    Post {
        /// Name shown in front of the tweet
        #[arg(long, default_value = "user1")]
        user: String,
        /// Hashtag to post under, with or without the leading '#'
        #[arg(long, default_value = "#Sports")]
        hashtag: String,
        /// Tweet text (default: "Hello MQTT!")
        tweet: Vec<String>,
    },
    /// Follow a hashtag; type `sub <tag>`, `unsub` or `quit` while running
    Follow {
        #[arg(long, default_value = "#Sports")]
        hashtag: String,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cmd = Command::parse();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    logging::init(&settings.client.log_level);

    let result = match cmd {
        Command::Post {
            user,
            hashtag,
            tweet,
        } => {
            let body = if tweet.is_empty() {
                DEFAULT_TWEET.to_string()
            } else {
                tweet.join(" ")
            };
            run_post(&settings, &user, &hashtag, &body).await
        }
        Command::Follow { hashtag } => run_follow(&settings, &hashtag).await,
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run_post(
    settings: &Settings,
    user: &str,
    hashtag: &str,
    body: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (client, mut events) = TweetClient::from_settings(settings);
    client.connect()?;

    let timeout = settings.broker.connect_timeout();
    if tokio::time::timeout(timeout, wait_until_connected(&mut events))
        .await
        .is_err()
    {
        client.shutdown();
        let endpoint = client.session().endpoint();
        return Err(format!("no connection to {endpoint} within {timeout:?}").into());
    }

    let outcome = client.publish(user, body, hashtag);
    client.shutdown();
    let receipt = outcome?;

    println!("Topic: {}", receipt.topic);
    println!("Message: {}", receipt.payload);
    Ok(())
}

async fn wait_until_connected(events: &mut UnboundedReceiver<ClientEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ClientEvent::Status {
                status: ConnectionStatus::Connected,
                ..
            } => return,
            ClientEvent::Status {
                reason: Some(reason),
                ..
            } => warn!("Connection attempt failed: {reason}"),
            _ => {}
        }
    }
}

async fn run_follow(settings: &Settings, hashtag: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (client, mut events) = TweetClient::from_settings(settings);
    client.connect()?;
    info!("Following {hashtag} as {}", client.id());

    let stdin = BufReader::new(tokio::io::stdin());
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received. Exiting gracefully."),
            Err(e) => {
                warn!("Cannot listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    follow_loop(&client, &mut events, hashtag, stdin, ctrl_c).await;

    client.shutdown();
    Ok(())
}

/// Prints client events and applies typed commands until `quit`, the end
/// of the event stream, or `shutdown` resolving. `hashtag` is followed on
/// the first connection; later reconnects resubscribe on their own.
async fn follow_loop<R, S>(
    client: &TweetClient,
    events: &mut UnboundedReceiver<ClientEvent>,
    hashtag: &str,
    commands: R,
    shutdown: S,
) where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let mut commands = commands.lines();
    let mut commands_open = true;
    let mut initial_tag = Some(hashtag.to_string());
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if let ClientEvent::Status { status: ConnectionStatus::Connected, .. } = event {
                    if let Some(tag) = initial_tag.take() {
                        if let Err(e) = client.request_subscribe(&tag) {
                            error!("Could not follow {tag}: {e}");
                        }
                    }
                }
                print_event(&event);
            }
            line = commands.next_line(), if commands_open => {
                match line {
                    Ok(Some(line)) => {
                        if !handle_command(client, &mut initial_tag, line.trim()) {
                            break;
                        }
                    }
                    Ok(None) => commands_open = false,
                    Err(e) => {
                        warn!("Stopped reading commands: {e}");
                        commands_open = false;
                    }
                }
            }
            _ = &mut shutdown => break,
        }
    }
}

/// Returns `false` when the user asked to quit.
fn handle_command(client: &TweetClient, initial_tag: &mut Option<String>, line: &str) -> bool {
    let (command, arg) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(c, a)| (c, a.trim()));

    match command {
        "" => {}
        "quit" | "exit" => return false,
        "sub" => {
            if client.status() == ConnectionStatus::Connected {
                if let Err(e) = client.request_subscribe(arg) {
                    println!("Cannot follow '{arg}': {e}");
                }
            } else {
                // Picked up by the first connection.
                *initial_tag = Some(arg.to_string());
                println!("Not connected yet; will follow '{arg}' once connected");
            }
        }
        "unsub" => match client.request_unsubscribe() {
            Ok(None) => println!("Not following any hashtag"),
            Ok(Some(_)) => {}
            Err(e) => println!("Cannot unfollow: {e}"),
        },
        other => println!("Unknown command '{other}' (use: sub <tag>, unsub, quit)"),
    }
    true
}

fn print_event(event: &ClientEvent) {
    match event {
        ClientEvent::Status {
            status,
            endpoint,
            reason: None,
        } => println!("Status: {status} ({endpoint})"),
        ClientEvent::Status {
            status,
            endpoint,
            reason: Some(reason),
        } => println!("Status: {status} ({endpoint}): {reason}"),
        ClientEvent::Topic(TopicEvent::Subscribed { tag, topic }) => {
            println!("Following #{tag} ({topic})")
        }
        ClientEvent::Topic(TopicEvent::Unsubscribed { topic }) => println!("Unfollowed {topic}"),
        ClientEvent::Message(message) => println!(
            "[{}] {}",
            message.received_at.format("%H:%M:%S"),
            message.text
        ),
    }
}
