use clap::Parser;
use host::HostServer;
use log::info;
use shared::command::LocalCommand;
use shared::{render, Peer};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Local endpoint id of the host's own player slot
const HOST_ID: &str = "host";

#[derive(Parser, Debug)]
#[command(author, version, about = "Host a Ludo game", long_about = None)]
struct Args {
    /// IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "7878")]
    port: u16,

    /// Player slots to create up front, comma separated
    #[arg(long, value_delimiter = ',')]
    slots: Vec<String>,

    /// Maximum simultaneous connections
    #[arg(short, long, default_value = "8")]
    max_connections: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let mut peer = Peer::host(HOST_ID);
    for name in &args.slots {
        peer.add_slot(Some(name.as_str()))?;
    }

    let address = format!("{}:{}", args.host, args.port);
    let mut server = HostServer::bind(&address, peer, args.max_connections).await?;

    println!("Join link: {}", server.join_link());
    println!("Type `help` for commands");
    print!("{}", render::describe_state(server.peer().state()));

    let mut events = server.subscribe();
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
        result = server.run(command_rx) => result?,
        _ = tokio::signal::ctrl_c() => {
            println!("Received Ctrl+C, shutting down...");
        }
    }

    info!("Host stopped");
    Ok(())
}
