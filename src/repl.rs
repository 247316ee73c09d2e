//! Console loop shared by the agent binaries

use crate::agent::{AgentRunner, AgentSession};
use crate::Result;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{error, info};

const PROMPT: &str = "You: ";

fn is_exit(line: &str) -> bool {
    matches!(line.to_ascii_lowercase().as_str(), "exit" | "quit")
}

/// Read lines until `exit`, `quit` or end of input, answering each with the
/// agent's reply. A failed turn is logged and the loop carries on.
pub async fn run_repl<R, W>(runner: &AgentRunner, input: &mut R, output: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut session = runner.new_session();
    info!(agent = %runner.agent().name, session_id = %session.id, "Session started");

    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        let mut line = String::new();
        if input.read_line(&mut line).await? == 0 {
            break;
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_exit(line) {
            break;
        }

        respond(runner, &mut session, line, output).await?;
    }

    info!(agent = %runner.agent().name, session_id = %session.id, "Session ended");
    Ok(())
}

async fn respond<W: AsyncWrite + Unpin>(
    runner: &AgentRunner,
    session: &mut AgentSession,
    line: &str,
    output: &mut W,
) -> Result<()> {
    match runner.run_turn(session, line).await {
        Ok(turn) => {
            let reply = format!("{}: {}\n", runner.agent().name, turn.text.trim());
            output.write_all(reply.as_bytes()).await?;
        }
        Err(e) => {
            error!(agent = %runner.agent().name, error = %e, "Turn failed");
            output
                .write_all(format!("[error] {}\n", e).as_bytes())
                .await?;
        }
    }
    output.flush().await?;
    Ok(())
}

/// [`run_repl`] on the process's stdin and stdout.
pub async fn run_stdio(runner: &AgentRunner) -> Result<()> {
    let mut stdin = BufReader::new(io::stdin());
    let mut stdout = io::stdout();

    let banner = format!(
        "{} ready. Type 'exit' or 'quit' to leave.\n",
        runner.agent().name
    );
    stdout.write_all(banner.as_bytes()).await?;

    run_repl(runner, &mut stdin, &mut stdout).await
}
