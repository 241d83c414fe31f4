use std::fs;
use std::io::{self, Read};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use wslink::{ConnectionOptions, Encoding, Event, EventKind, Operation, ReconnectLimit, Transport, TransportError};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to read query from {path}: {source}")]
    Input { path: String, source: io::Error },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("expected a JSON object for `{0}`")]
    NotAnObject(&'static str),
    #[error("server returned errors: {0}")]
    Graphql(String),
}

#[derive(Parser, Debug)]
#[command(name = "wslink", about = "GraphQL over a multiplexed WebSocket")]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ConnectionArgs {
    #[arg(long, env = "WSLINK_URI")]
    uri: String,

    #[arg(long = "protocol", env = "WSLINK_PROTOCOLS", value_delimiter = ',')]
    protocols: Vec<String>,

    #[arg(long, env = "WSLINK_COMPRESS")]
    compress: bool,

    #[arg(long, env = "WSLINK_ENCODING", default_value = "json")]
    encoding: String,

    #[arg(long, env = "WSLINK_KEEPALIVE_MS", default_value_t = 0)]
    keepalive_ms: u64,

    #[arg(long, env = "WSLINK_RECONNECT_ATTEMPTS", default_value = "unlimited", allow_hyphen_values = true)]
    reconnect_attempts: ReconnectLimit,

    #[arg(long, env = "WSLINK_RECONNECT_DELAY_MS", default_value_t = 2000)]
    reconnect_delay_ms: u64,

    #[arg(long, env = "WSLINK_DEBUG", default_value_t = 0)]
    debug: u8,
}

impl ConnectionArgs {
    fn to_options(&self) -> Result<ConnectionOptions, TransportError> {
        ConnectionOptions::builder(self.uri.clone())
            .protocols(self.protocols.iter().cloned())
            .compress(self.compress)
            .encoding(Encoding::parse(&self.encoding))
            .keepalive(Duration::from_millis(self.keepalive_ms))
            .reconnect_attempts(self.reconnect_attempts)
            .reconnect_delay(Duration::from_millis(self.reconnect_delay_ms))
            .debug(self.debug)
            .build()
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one GraphQL operation and print the response.
    Query(QueryArgs),
    /// Send one RAW frame and print frames received while waiting.
    Send(SendArgs),
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Query text; read from --input when omitted.
    query: Option<String>,

    #[arg(long, default_value = "-", help = "Input file path, or - for stdin")]
    input: String,

    #[arg(long)]
    operation_name: Option<String>,

    #[arg(long, help = "Variables as a JSON object")]
    variables: Option<String>,
}

#[derive(Args, Debug)]
struct SendArgs {
    /// Frame type, e.g. PING.
    kind: String,

    #[arg(long, default_value = "{}")]
    data: String,

    #[arg(long, default_value_t = 1000, help = "How long to print received frames")]
    wait_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let transport = Transport::new(cli.connection.to_options()?);
    if transport.options().debug > 0 {
        transport.on(EventKind::Debug, |event| {
            if let Event::Debug(record) = event {
                eprintln!("{}", record.log);
            }
        });
    }

    let result = match cli.command {
        Command::Query(args) => run_query(&transport, args).await,
        Command::Send(args) => run_send(&transport, args).await,
    };
    if let Err(CliError::Transport(e)) = &result {
        tracing::error!(error_code = e.error_code(), retryable = e.retryable(), "cli: {e}");
    }
    transport.disconnect().await?;
    result
}

async fn run_query(transport: &Transport, args: QueryArgs) -> Result<(), CliError> {
    let operation = build_operation(args)?;
    let response = transport.query(operation).await?;
    print_json(&serde_json::to_value(&response)?)?;

    let messages = response.error_messages();
    if response.data.is_none() && !messages.is_empty() {
        return Err(CliError::Graphql(messages.join("; ")));
    }
    Ok(())
}

async fn run_send(transport: &Transport, args: SendArgs) -> Result<(), CliError> {
    let data = serde_json::from_str::<Value>(&args.data)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    transport.on(EventKind::Receive, move |event| {
        if let Event::Receive(frame) = event {
            let _ = tx.send(frame.clone());
        }
    });

    let sent = transport.send(&args.kind, data).await?;
    tracing::info!(id = sent.id, kind = %sent.kind, "cli: frame sent");

    let deadline = tokio::time::sleep(Duration::from_millis(args.wait_ms));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            () = &mut deadline => break,
            frame = rx.recv() => match frame {
                Some(frame) => print_json(&serde_json::to_value(&frame)?)?,
                None => break,
            },
        }
    }
    Ok(())
}

fn build_operation(args: QueryArgs) -> Result<Operation, CliError> {
    let query = match args.query {
        Some(query) => query,
        None => read_input(&args.input)?,
    };

    let mut operation = Operation::new(query);
    if let Some(name) = args.operation_name {
        operation = operation.operation_name(name);
    }
    if let Some(raw) = args.variables {
        operation = operation.variables(parse_object(&raw, "variables")?);
    }
    Ok(operation)
}

fn read_input(path: &str) -> Result<String, CliError> {
    let to_error = |source| CliError::Input { path: path.to_owned(), source };
    if path == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer).map_err(to_error)?;
        Ok(buffer)
    } else {
        fs::read_to_string(path).map_err(to_error)
    }
}

fn parse_object(raw: &str, field: &'static str) -> Result<Map<String, Value>, CliError> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        _ => Err(CliError::NotAnObject(field)),
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
