//! Command handlers.

use crate::config::{CliArgs, Settings, read_document_file};
use crate::redact::Redactor;
use crate::status::{self, Health};
use crate::writer::FilesystemWriter;
use anyhow::{Context, bail};
use console::style;
use harpocrates_core::format::{env_pairs, render};
use harpocrates_core::{
    BucketKind, Extractor, OutputFormat, ResultBucket, SecretDocument, SecretFetcher, SecretItem,
    SecretWriter,
};
use harpocrates_vault::StaticFetcher;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// Build the secrets document from `--file`, `--secret` or the inline argument.
///
/// Returns `None` when no input was given at all.
pub fn load_document(
    args: &CliArgs,
    inline: Option<&str>,
) -> anyhow::Result<Option<SecretDocument>> {
    if let Some(path) = &args.file {
        let content = read_document_file(path)?;
        return Ok(Some(SecretDocument::parse(&content)?));
    }

    if !args.secret.is_empty() {
        if args.output.is_none() {
            bail!("--output is required when using --secret");
        }
        return Ok(Some(SecretDocument {
            secrets: args.secret.iter().cloned().map(SecretItem::Path).collect(),
            ..Default::default()
        }));
    }

    match inline {
        Some(input) => Ok(Some(SecretDocument::parse(input)?)),
        None => Ok(None),
    }
}

/// Print a summary of a document that decoded cleanly.
pub fn validate(document: &SecretDocument) {
    println!("{} Secrets document is valid", style("✓").green());
    println!("  Secrets: {}", document.secrets.len());

    for item in &document.secrets {
        match item {
            SecretItem::Path(path) => println!("    - {}", path),
            SecretItem::Configured { path, config } if config.keys.is_empty() => {
                println!("    - {} (all keys)", path)
            }
            SecretItem::Configured { path, config } => {
                println!("    - {} ({} keys)", path, config.keys.len())
            }
        }
    }
}

/// Connect to the secret store: a snapshot file when given, Vault otherwise.
pub async fn connect(
    args: &CliArgs,
    document: &SecretDocument,
) -> anyhow::Result<Arc<dyn SecretFetcher>> {
    if let Some(snapshot) = &args.snapshot {
        let fetcher = StaticFetcher::load_from_file(snapshot)
            .await
            .with_context(|| format!("Failed to load snapshot {}", snapshot.display()))?;
        return Ok(Arc::new(fetcher));
    }

    let config = args.vault_config();
    let client = args.vault_auth(document)?.connect(config).await?;
    info!(address = %client.address(), "Connected to Vault");
    Ok(Arc::new(client))
}

/// Write every bucket. An empty default bucket is skipped.
pub async fn publish(
    buckets: &[ResultBucket],
    writer: &dyn SecretWriter,
    default_filename: &str,
) -> harpocrates_core::Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    for bucket in buckets {
        if bucket.kind == BucketKind::Default && bucket.is_empty() {
            debug!("Default bucket is empty, nothing to write");
            continue;
        }

        let file_name = bucket.filename.as_deref().unwrap_or(default_filename);
        let content = render(bucket)?;
        written.push(writer.write(file_name, &content, bucket.owner).await?);
    }

    Ok(written)
}

/// Fetch, extract and write once.
async fn refresh(
    args: &CliArgs,
    document: &SecretDocument,
    settings: &Settings,
    writer: &FilesystemWriter,
) -> anyhow::Result<Vec<ResultBucket>> {
    let fetcher = connect(args, document).await?;
    let buckets = Extractor::new(fetcher)
        .extract(&document.secrets, settings.defaults())
        .await?;

    for path in publish(&buckets, writer, &settings.filename).await? {
        println!(
            "{} Secrets written to file: {}",
            style("✓").green(),
            path.display()
        );
    }
    Ok(buckets)
}

/// Extract the secrets once, or keep refreshing them in continuous mode.
pub async fn run(args: &CliArgs, document: &SecretDocument) -> anyhow::Result<()> {
    let mut settings = Settings::resolve(args, document);

    let Some(interval) = args.refresh_interval()? else {
        let writer = writer_for(&settings, settings.output.clone());
        refresh(args, document, &settings, &writer).await?;
        return Ok(());
    };

    settings.append = false;
    let writer = writer_for(&settings, settings.output.clone());
    run_continuous(args, document, &settings, &writer, interval).await
}

async fn run_continuous(
    args: &CliArgs,
    document: &SecretDocument,
    settings: &Settings,
    writer: &FilesystemWriter,
    interval: Duration,
) -> anyhow::Result<()> {
    info!(interval = ?interval, "Continuous mode enabled");

    let health: Health = Arc::new(AtomicBool::new(false));
    let addr = args.status_addr();
    let server = tokio::spawn({
        let health = Arc::clone(&health);
        async move {
            if let Err(e) = status::serve(addr, health).await {
                error!(addr = %addr, error = %e, "Status endpoint failed");
            }
        }
    });

    loop {
        match refresh(args, document, settings, writer).await {
            Ok(_) => health.store(true, Ordering::Relaxed),
            Err(e) => {
                health.store(false, Ordering::Relaxed);
                error!(error = %e, "Refreshing secrets failed");
            }
        }

        debug!(interval = ?interval, "Sleeping until next refresh");
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    server.abort();
    Ok(())
}

/// Write secrets to a temporary directory and run `command` with them.
///
/// Returns the exit code of the command.
pub async fn dev(
    args: &CliArgs,
    document: &SecretDocument,
    redact: bool,
    command: &[String],
) -> anyhow::Result<i32> {
    let settings = Settings::resolve(args, document);
    let tmp = tempfile::Builder::new()
        .prefix("harpocrates")
        .tempdir()
        .context("Failed to create temporary directory")?;
    let output = scoped_output(tmp.path(), &settings.output);
    println!("output: {}", output.display());

    let writer = writer_for(&settings, output.clone());
    let buckets = refresh(args, document, &settings, &writer).await?;

    let mut env = child_env(&buckets);
    env.push(("SECRET_PATH".to_string(), output.display().to_string()));
    let redactor = redact.then(|| Redactor::from_buckets(&buckets));

    let code = run_child(&command.join(" "), env, redactor).await?;
    // `tmp` is dropped here, removing the secrets.
    Ok(code)
}

fn writer_for(settings: &Settings, output: PathBuf) -> FilesystemWriter {
    FilesystemWriter::new(output)
        .with_append(settings.append)
        .with_owner(settings.owner)
}

/// Place `output` below `root`, even when it is absolute.
fn scoped_output(root: &Path, output: &Path) -> PathBuf {
    root.join(output.strip_prefix("/").unwrap_or(output))
}

/// Environment for the child: every env-format bucket as `KEY=value`.
fn child_env(buckets: &[ResultBucket]) -> Vec<(String, String)> {
    buckets
        .iter()
        .filter(|bucket| bucket.format == OutputFormat::Env)
        .flat_map(|bucket| env_pairs(&bucket.result))
        .collect()
}

async fn run_child(
    script: &str,
    env: Vec<(String, String)>,
    redactor: Option<Redactor>,
) -> anyhow::Result<i32> {
    debug!(command = %script, "Starting child process");

    let mut cmd = Command::new("bash");
    cmd.arg("-c").arg(script);
    cmd.envs(env);
    cmd.stdin(Stdio::inherit());
    if redactor.is_some() {
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
    }
    cmd.kill_on_drop(true);

    let mut child = cmd.spawn().context("Failed to start bash")?;

    let mut forwarders = Vec::new();
    if let Some(redactor) = redactor {
        let redactor = Arc::new(redactor);
        if let Some(stdout) = child.stdout.take() {
            let redactor = Arc::clone(&redactor);
            forwarders.push(tokio::spawn(forward_lines(stdout, redactor, tokio::io::stdout())));
        }
        if let Some(stderr) = child.stderr.take() {
            let redactor = Arc::clone(&redactor);
            forwarders.push(tokio::spawn(forward_lines(stderr, redactor, tokio::io::stderr())));
        }
    }

    let status = tokio::select! {
        status = child.wait() => status?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, stopping child process");
            child.kill().await?;
            child.wait().await?
        }
    };

    for forwarder in forwarders {
        let _ = forwarder.await;
    }

    Ok(status.code().unwrap_or(-1))
}

/// Copy `reader` to `out` line by line with secret values masked.
async fn forward_lines<R, W>(reader: R, redactor: Arc<Redactor>, mut out: W)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let mut line = redactor.redact(&line);
        line.push('\n');
        if out.write_all(line.as_bytes()).await.is_err() {
            break;
        }
    }
    let _ = out.flush().await;
}
