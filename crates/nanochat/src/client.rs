//! Interactive client: resolve the server, connect, run the prompt.

use std::net::SocketAddr;
use std::time::Duration;

use nanochat_directory::DirectoryClient;
use nanochat_session::{ClientSession, Command, SessionState};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::NanoChatError;
use crate::config::ClientConfig;

/// Asks the directory which server speaks `config.protocol`.
pub async fn resolve_server(config: &ClientConfig) -> Result<SocketAddr, NanoChatError> {
    let directory = DirectoryClient::connect(&config.directory)
        .await?
        .with_timeout(Duration::from_millis(config.timeout_ms))
        .with_max_attempts(config.max_attempts);
    let addr = directory
        .server_info(config.protocol)
        .await?
        .ok_or(NanoChatError::NoServer(config.protocol))?;
    tracing::info!(server = %addr, "resolved chat server");
    Ok(SocketAddr::V4(addr))
}

/// Resolves and connects, then drives the session from stdin until quit.
pub async fn run_client(config: &ClientConfig) -> Result<(), NanoChatError> {
    let addr = resolve_server(config).await?;
    let session = ClientSession::connect(addr).await?;
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    run_interactive(session, stdin, tokio::io::stdout()).await
}

/// Reads commands from `input` and writes every notice to `output`,
/// while inbound chat keeps arriving between commands.
///
/// End of input counts as `quit`.
pub async fn run_interactive<R, W>(
    mut session: ClientSession,
    input: R,
    mut output: W,
) -> Result<(), NanoChatError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    write_line(&mut output, "* Type help for the list of commands.").await?;

    while session.state() != SessionState::Quit {
        tokio::select! {
            line = lines.next_line() => {
                let command = match line? {
                    Some(line) => match Command::parse(&line) {
                        Ok(Some(command)) => command,
                        Ok(None) => continue,
                        Err(e) => {
                            write_line(&mut output, &format!("* {e}")).await?;
                            continue;
                        }
                    },
                    None => Command::Quit,
                };
                match session.execute(command).await {
                    Ok(notices) => {
                        for notice in notices {
                            write_line(&mut output, &notice.to_string()).await?;
                        }
                    }
                    Err(e) => write_line(&mut output, &format!("* {e}")).await?,
                }
            }
            notice = session.next_inbound() => {
                write_line(&mut output, &notice.to_string()).await?;
            }
        }
    }
    Ok(())
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> std::io::Result<()> {
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}
