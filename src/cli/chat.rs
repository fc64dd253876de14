//! CLI `chat` command — talk to the pipeline from the terminal.

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::config::SoulspaceConfig;

pub async fn chat(config: &SoulspaceConfig) -> Result<()> {
    let state = crate::server::build_state(config).await?;
    let pipeline = state.pipeline;

    println!("SoulSpace terminal chat. Type 'quit' or 'exit' to leave.");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        stdout.write_all(b"\nClient: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("exit") {
            break;
        }
        if input.is_empty() {
            continue;
        }

        let reply = pipeline.respond(input).await;
        println!("Therapist: {}", reply.text());
    }

    Ok(())
}
