use clap::{Args, Parser, Subcommand};
use rtmp_stream::device::synthetic::SyntheticDevices;
use rtmp_stream::engine::EngineContext;
use rtmp_stream::transport::{client_config_from_pem_file, NetworkOptions, TcpConnector};
use rtmp_stream::{ChangeEvent, PlayerView, PublisherView, StreamError};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Plays or publishes generated media against an RTMP server, printing every change event
#[derive(Parser)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play a stream into a sink that discards what it renders
    Play {
        #[command(flatten)]
        common: CommonArgs,

        /// Milliseconds to buffer before playback starts
        #[arg(long, default_value_t = 1_000)]
        buffer_ms: i64,
    },

    /// Publish generated audio and video
    Publish {
        #[command(flatten)]
        common: CommonArgs,

        #[arg(long, default_value_t = 1280)]
        width: i64,

        #[arg(long, default_value_t = 720)]
        height: i64,

        #[arg(long, default_value_t = 30)]
        fps: i64,

        /// Video bitrate in bits per second
        #[arg(long, default_value_t = 2_000_000)]
        bitrate: i64,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// rtmp:// or rtmps:// url, ending in the stream key
    url: String,

    /// Stop after this many seconds
    #[arg(long, default_value_t = 30)]
    seconds: u64,

    /// Key appended to the stream name for servers that require one
    #[arg(long, default_value = "")]
    crypto_key: String,

    /// PEM bundle of root certificates for rtmps urls
    #[arg(long)]
    ca_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "Probe failed");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), StreamError> {
    match command {
        Command::Play { common, buffer_ms } => {
            let mut view = PlayerView::with_context(context(&common)?)?;
            view.update_settings(|settings| {
                settings.url = common.url.clone();
                settings.crypto_key = common.crypto_key.clone();
                settings.buffer_time_ms = buffer_ms;
                settings.max_buffer_time_ms = settings.max_buffer_time_ms.max(buffer_ms);
            })?;

            let events = print_events(|listener| view.set_listener(listener));
            check(view.start())?;
            watch(&events, Duration::from_secs(common.seconds));
            check(view.stop())
        }

        Command::Publish {
            common,
            width,
            height,
            fps,
            bitrate,
        } => {
            let mut view = PublisherView::with_context(context(&common)?)?;
            view.update_settings(|settings| {
                settings.url = common.url.clone();
                settings.crypto_key = common.crypto_key.clone();
                settings.video_param.insert("width".to_string(), width);
                settings.video_param.insert("height".to_string(), height);
                settings.video_param.insert("fps".to_string(), fps);
                settings.video_param.insert("bitrate".to_string(), bitrate);
            })?;

            let events = print_events(|listener| view.set_listener(listener));
            check(view.start())?;
            watch(&events, Duration::from_secs(common.seconds));
            check(view.stop())
        }
    }
}

fn context(common: &CommonArgs) -> Result<EngineContext, StreamError> {
    let options = NetworkOptions::new();
    let mut connector = TcpConnector::new(&options);
    if let Some(path) = &common.ca_file {
        connector = connector.with_tls(client_config_from_pem_file(path)?);
    }

    Ok(EngineContext::new(Arc::new(connector), Arc::new(SyntheticDevices::new())))
}

/// Prints each event as it arrives and forwards it so the main thread can notice the end
fn print_events<F>(register: F) -> mpsc::Receiver<ChangeEvent>
where
    F: FnOnce(Box<dyn Fn(&ChangeEvent) + Send + Sync>),
{
    let (sender, receiver) = mpsc::channel();
    let sender = std::sync::Mutex::new(sender);
    register(Box::new(move |event: &ChangeEvent| {
        println!("{:>5}  {}", event.code, event.message);
        if let Ok(sender) = sender.lock() {
            let _ = sender.send(event.clone());
        }
    }));

    receiver
}

/// Waits until the session ends on its own or the time is up
fn watch(events: &mpsc::Receiver<ChangeEvent>, duration: Duration) {
    let deadline = Instant::now() + duration;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(event) if event.event.is_terminal() => return,
            Ok(_) => (),
            Err(_) => return,
        }
    }
}

fn check(status: i32) -> Result<(), StreamError> {
    match status {
        0 => Ok(()),
        code => Err(StreamError::Runtime {
            reason: format!("operation returned status {}", code),
        }),
    }
}
