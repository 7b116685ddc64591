//! Operator CLI binary: submit test requests against a running HTTP/SSE
//! adapter and inspect session memory without a browser.
//!
//! Subcommands: `send` (submit a turn, optionally watching its status
//! stream), `watch` (attach to an in-flight request's status stream),
//! `history`/`summary`/`tool-state` (read or clear session memory),
//! `sessions` (list a user's sessions).

use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde_json::{json, Value};
use std::error::Error;

#[derive(Parser, Debug)]
#[command(name = "orchestrator")]
#[command(about = "Operator CLI for the matchmaker orchestrator's HTTP adapter")]
struct Args {
    /// Base URL of the HTTP/SSE adapter.
    #[arg(long, env = "ORCHESTRATOR_SERVER_URL", default_value = "http://127.0.0.1:8080")]
    server: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a chat turn.
    Send(SendArgs),
    /// Attach to a request's status stream (SSE).
    Watch(WatchArgs),
    /// Read a session's rolling history.
    History(SessionArgs),
    /// Clear a session's (or, with no session, a user's whole) history.
    ClearHistory(SessionArgs),
    /// Read a session's summary, or every summary for the user.
    Summary(SessionArgs),
    /// Read a session's tool-argument state, or every tool state for the user.
    ToolState(SessionArgs),
    /// List a user's sessions and their entry counts.
    Sessions(UserArgs),
}

#[derive(clap::Args, Debug)]
struct SendArgs {
    /// Identity the turn is scoped under.
    user_id: String,
    /// The message text.
    message: String,
    #[arg(long)]
    session_id: Option<String>,
    #[arg(long)]
    person_id: Option<String>,
    #[arg(long)]
    personality_id: Option<String>,
    /// Stream the request's status events to stdout after submitting.
    #[arg(long)]
    watch: bool,
}

#[derive(clap::Args, Debug)]
struct WatchArgs {
    request_id: String,
}

#[derive(clap::Args, Debug)]
struct SessionArgs {
    user_id: String,
    #[arg(long)]
    session_id: Option<String>,
}

#[derive(clap::Args, Debug)]
struct UserArgs {
    user_id: String,
}

fn session_query(session_id: &Option<String>) -> Vec<(&'static str, String)> {
    match session_id {
        Some(id) => vec![("session_id", id.clone())],
        None => vec![],
    }
}

/// Streams an SSE response body to stdout as `event: <name>\ndata: <json>`,
/// one block per record, matching the shape `/chat/status` produces.
async fn print_sse_stream(response: reqwest::Response) -> Result<(), Box<dyn Error>> {
    let mut stream = response.bytes_stream();
    let mut buf = String::new();
    while let Some(chunk) = stream.next().await {
        buf.push_str(&String::from_utf8_lossy(&chunk?));
        while let Some(pos) = buf.find("\n\n") {
            let block: String = buf.drain(..pos + 2).collect();
            for line in block.lines() {
                if let Some(data) = line.strip_prefix("data:") {
                    println!("{}", data.trim());
                } else if let Some(event) = line.strip_prefix("event:") {
                    eprintln!("[{}]", event.trim());
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    orchestrator_config::load_and_apply("orchestrator", None::<&std::path::Path>).ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let client = reqwest::Client::new();

    match args.cmd {
        Command::Send(send) => {
            let body = json!({
                "user_id": send.user_id,
                "message": send.message,
                "session_id": send.session_id,
                "person_id": send.person_id,
                "personality_id": send.personality_id,
            });
            let resp: Value = client
                .post(format!("{}/chat/request", args.server))
                .json(&body)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            println!("{}", serde_json::to_string_pretty(&resp)?);

            if send.watch {
                if let Some(request_id) = resp.get("request_id").and_then(Value::as_str) {
                    let url = format!("{}/chat/status/{}", args.server, request_id);
                    let response = client.get(url).send().await?.error_for_status()?;
                    print_sse_stream(response).await?;
                }
            }
        }
        Command::Watch(watch) => {
            let url = format!("{}/chat/status/{}", args.server, watch.request_id);
            let response = client.get(url).send().await?.error_for_status()?;
            print_sse_stream(response).await?;
        }
        Command::History(sa) => {
            let url = format!("{}/history/{}", args.server, sa.user_id);
            let resp: Value = client
                .get(url)
                .query(&session_query(&sa.session_id))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        Command::ClearHistory(sa) => {
            let url = format!("{}/history/{}", args.server, sa.user_id);
            client
                .delete(url)
                .query(&session_query(&sa.session_id))
                .send()
                .await?
                .error_for_status()?;
            println!("cleared");
        }
        Command::Summary(sa) => {
            let url = format!("{}/summary/{}", args.server, sa.user_id);
            let resp: Value = client
                .get(url)
                .query(&session_query(&sa.session_id))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        Command::ToolState(sa) => {
            let url = format!("{}/tool-state/{}", args.server, sa.user_id);
            let resp: Value = client
                .get(url)
                .query(&session_query(&sa.session_id))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        Command::Sessions(ua) => {
            let url = format!("{}/sessions/{}", args.server, ua.user_id);
            let resp: Value = client.get(url).send().await?.error_for_status()?.json().await?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_query_is_empty_without_a_session_id() {
        assert!(session_query(&None).is_empty());
    }

    #[test]
    fn session_query_carries_the_session_id_when_set() {
        let q = session_query(&Some("s1".to_string()));
        assert_eq!(q, vec![("session_id", "s1".to_string())]);
    }
}
