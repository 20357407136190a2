use clap::Parser;
use log::{error, info};
use player::PlayerClient;
use shared::command::LocalCommand;
use shared::join::JoinLink;
use shared::{render, Peer};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about = "Join a Ludo game", long_about = None)]
struct Args {
    /// Join link from the host, or a bare host:port
    #[arg(short = 'j', long)]
    join: String,

    /// Claim the slot with this name once the lobby arrives
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Endpoint id to reuse, for rejoining a running game
    #[arg(long)]
    id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let link = JoinLink::parse(&args.join)?;
    let local_id = args.id.unwrap_or_else(|| Uuid::new_v4().to_string());

    info!("Joining {} as {}", link, local_id);

    let mut client = PlayerClient::connect(&link, Peer::player(local_id)).await?;
    if let Some(name) = args.name {
        client = client.with_preferred_slot(name);
    }
    println!("Type `help` for commands");

    let mut events = client.subscribe();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Some(line) = render::describe_event(&event) {
                println!("{}", line);
            }
        }
    });

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<LocalCommand>() {
                Ok(command) => {
                    let quit = command == LocalCommand::Quit;
                    if command_tx.send(command).is_err() || quit {
                        break;
                    }
                }
                Err(e) => eprintln!("{}", e),
            }
        }
    });

    tokio::select! {
        result = client.run(command_rx) => {
            if let Err(e) = result {
                error!("{}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("Received Ctrl+C, leaving...");
        }
    }

    Ok(())
}
