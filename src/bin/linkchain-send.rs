#![forbid(unsafe_code)]
//! Dial a LinkChain node and announce one or more blocks to it.

use clap::Parser;
use colored::*;
use futures::SinkExt;
use linkchain::protocol::{Framing, Message, PeerCodec};
use tokio::net::TcpStream;
use tokio_util::codec::FramedWrite;

#[derive(Parser, Debug)]
#[command(name = "linkchain-send", version, about = "Send BLOCK announcements to a node")]
struct Cli {
    /// Peer address of the target node (ip:port)
    #[arg(long)]
    peer: String,

    /// Wire framing the target node uses
    #[arg(long, default_value = "newline")]
    framing: Framing,

    /// Payloads to announce, in order
    #[arg(required = true)]
    payloads: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    println!("🔗 Connecting to peer: {}", cli.peer.bright_white());
    let stream = match TcpStream::connect(&cli.peer).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("{} {}", "❌ Failed:".red(), e);
            return Err(e.into());
        }
    };

    let mut sink = FramedWrite::new(stream, PeerCodec::new(cli.framing));
    for payload in cli.payloads {
        let frame = Message::Block(payload.clone()).encode();
        match sink.send(frame).await {
            Ok(()) => println!("{} {}", "✅ Sent BLOCK".green(), payload),
            Err(e) => {
                eprintln!("{} {}: {}", "❌ Could not send".red(), payload, e);
                return Err(e.into());
            }
        }
    }
    SinkExt::<String>::close(&mut sink).await?;

    Ok(())
}
