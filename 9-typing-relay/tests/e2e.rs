use std::{path::Path, process::Stdio, time::Duration};

use anyhow::{Context, Result, anyhow};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, ChildStdout, Command},
    time::timeout,
};

const READ_TIMEOUT: Duration = Duration::from_secs(3);
const RETRY_TIMEOUT: Duration = Duration::from_millis(250);

#[tokio::test]
async fn pipe_clients_relay_through_the_hub() -> Result<()> {
    let binary = assert_cmd::cargo::cargo_bin!("typing_relay");

    let (mut hub_child, mut hub_stdout) = spawn_hub(&binary).await?;
    let addr = read_hub_addr(&mut hub_stdout).await?;

    let mut alice = spawn_pipe(&binary, "alice", &addr).await?;
    let mut bob = spawn_pipe(&binary, "bob", &addr).await?;

    // Nothing announces registration, so repeat the first line until it lands.
    send_until_received(&mut alice, &mut bob, "hello bob").await?;

    bob.send_line("hi alice").await.context("bob send line")?;
    let alice_hears_bob = read_line_expect(&mut alice.stdout, "waiting for alice to hear bob").await?;
    assert_eq!(alice_hears_bob, "hi alice");

    // Closing stdin ends the client once the hub drops its side.
    drop(alice.stdin);
    ensure_success(&mut alice.child, "alice pipe").await?;
    drop(bob.stdin);
    ensure_success(&mut bob.child, "bob pipe").await?;

    let _ = hub_child.kill().await;
    let _ = hub_child.wait().await;

    Ok(())
}

#[tokio::test]
async fn client_requires_a_username() -> Result<()> {
    let binary = assert_cmd::cargo::cargo_bin!("typing_relay");
    let status = Command::new(binary)
        .arg("client")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .context("failed to run client")?;
    assert!(!status.success());
    Ok(())
}

struct PipeProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    pending: String,
}

impl PipeProcess {
    async fn send_line(&mut self, line: &str) -> Result<()> {
        self.stdin
            .write_all(line.as_bytes())
            .await
            .with_context(|| format!("failed to send line '{line}'"))?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }
}

async fn spawn_hub(binary: &Path) -> Result<(Child, BufReader<ChildStdout>)> {
    let mut cmd = Command::new(binary);
    cmd.arg("hub")
        .arg("--listen")
        .arg("127.0.0.1:0")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = cmd.spawn().context("failed to spawn hub")?;
    let stdout = child
        .stdout
        .take()
        .context("hub stdout missing after spawn")?;

    Ok((child, BufReader::new(stdout)))
}

async fn read_hub_addr(reader: &mut BufReader<ChildStdout>) -> Result<String> {
    let line = read_line_expect(reader, "waiting for hub banner").await?;
    let addr = line
        .split_whitespace()
        .last()
        .context("unexpected hub banner format")?;
    if !addr.contains(':') {
        return Err(anyhow!("hub banner missing socket: {line}"));
    }
    Ok(addr.to_string())
}

async fn spawn_pipe(binary: &Path, username: &str, addr: &str) -> Result<PipeProcess> {
    let mut cmd = Command::new(binary);
    cmd.arg("pipe")
        .arg("--username")
        .arg(username)
        .arg("--server")
        .arg(addr)
        .env("RUST_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to spawn pipe client {username}"))?;

    let stdin = child
        .stdin
        .take()
        .context("pipe stdin missing after spawn")?;
    let stdout = child
        .stdout
        .take()
        .context("pipe stdout missing after spawn")?;

    Ok(PipeProcess {
        child,
        stdin,
        stdout: BufReader::new(stdout),
        pending: String::new(),
    })
}

async fn send_until_received(
    sender: &mut PipeProcess,
    receiver: &mut PipeProcess,
    line: &str,
) -> Result<()> {
    for _ in 0..20 {
        sender.send_line(line).await?;
        // `pending` survives a timed-out read, so a half-read line is not lost.
        match timeout(RETRY_TIMEOUT, receiver.stdout.read_line(&mut receiver.pending)).await {
            Ok(read) => {
                if read? == 0 {
                    return Err(anyhow!("receiver closed its output"));
                }
                let received = receiver.pending.trim_end_matches(['\r', '\n']).to_string();
                receiver.pending.clear();
                assert_eq!(received, line);
                return Ok(());
            }
            Err(_) => continue,
        }
    }
    Err(anyhow!("'{line}' never reached the receiver"))
}

async fn read_line_expect(
    reader: &mut BufReader<ChildStdout>,
    description: &str,
) -> Result<String> {
    match read_line(reader).await {
        Ok(Some(line)) => Ok(line),
        Ok(None) => Err(anyhow!("{description}: stream closed")),
        Err(err) => Err(err.context(format!("{description}: failed to read line"))),
    }
}

async fn read_line(reader: &mut BufReader<ChildStdout>) -> Result<Option<String>> {
    let mut line = String::new();
    let read_future = reader.read_line(&mut line);
    let bytes_io = match timeout(READ_TIMEOUT, read_future).await {
        Ok(result) => result,
        Err(_) => return Err(anyhow!("timed out waiting for line")),
    };
    let byte_count = bytes_io?;
    if byte_count == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

async fn ensure_success(child: &mut Child, name: &str) -> Result<()> {
    let status = timeout(READ_TIMEOUT, child.wait())
        .await
        .map_err(|_| anyhow!("{name} did not exit"))?
        .with_context(|| format!("failed to await {name} process"))?;
    if !status.success() {
        return Err(anyhow!("{name} exited with status {status}"));
    }
    Ok(())
}
