//! Interactive terminal chat.

use anyhow::Result;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::chat::Turn;
use crate::context::AppContext;
use crate::scheduler;

const HELP: &str = "commands: /upload <path>  /clear  /help  /exit";

/// Run the REPL until EOF or `/exit`, with the scheduler running alongside.
pub async fn repl(ctx: AppContext) -> Result<()> {
    let token = CancellationToken::new();
    let tasks = scheduler::spawn_all(&ctx, &token);

    println!("alter: chatting as {} ({})", ctx.user.name, ctx.model.model_name());
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut history: Vec<Turn> = Vec::new();
    let mut pending = None;
    let max_history = ctx.config.chat.history_turns;

    loop {
        stdout.write_all(b"\nyou> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }

        match message.split_once(' ').map_or((message, ""), |(c, rest)| (c, rest.trim())) {
            ("/exit" | "/quit", _) => break,
            ("/help", _) => {
                println!("{HELP}");
                continue;
            }
            ("/clear", _) => {
                history.clear();
                println!("history cleared");
                continue;
            }
            ("/upload", path) => {
                upload(&ctx, path).await;
                continue;
            }
            _ => {}
        }

        let pb = super::spinner("thinking...");
        let outcome = ctx.chat.turn(message, &history).await;
        pb.finish_and_clear();

        println!("ai> {}", outcome.reply);
        if let Some(handle) = outcome.persisted {
            history.push((message.to_string(), outcome.reply));
            if history.len() > max_history {
                history.drain(..history.len() - max_history);
            }
            pending = Some(handle);
        }
    }

    // let the last turn reach the profile store before exiting
    if let Some(handle) = pending {
        let _ = handle.await;
    }
    token.cancel();
    for task in tasks {
        let _ = task.await;
    }
    println!("bye");
    Ok(())
}

async fn upload(ctx: &AppContext, path: &str) {
    let Some(rag) = &ctx.retrieval else {
        println!("retrieval is disabled in config");
        return;
    };
    if path.is_empty() {
        println!("usage: /upload <path>");
        return;
    }
    match rag.upload(Path::new(path)).await {
        Ok(dest) => println!(
            "added {} ({} document(s) indexed)",
            dest.display(),
            rag.document_count()
        ),
        Err(e) => println!("upload failed: {e:#}"),
    }
}
