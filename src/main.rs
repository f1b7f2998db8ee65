use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use polyomino_session::config::{load_config, load_default_config};
use polyomino_session::engine::models::Position;
use polyomino_session::engine::plugin::RulesEngine;
use polyomino_session::games::sandbox::SandboxEngine;
use polyomino_session::runtime::{
    spawn_client, spawn_engine, ClientNotice, ClientOptions, Gesture, RelayHub, RuntimeError,
};
use polyomino_session::session::Session;

const STEP_LIMIT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(
    name = "polyomino-session",
    about = "Run a scripted multi-client polyomino session against the sandbox engine"
)]
struct Cli {
    /// Path to session.toml (default: auto-discover)
    #[arg(long, env = "POLYOMINO_SESSION_CONFIG")]
    config: Option<PathBuf>,

    /// Placements to complete (overrides config)
    #[arg(long)]
    moves: Option<usize>,

    /// Random seed (overrides config)
    #[arg(long)]
    seed: Option<u64>,

    /// Number of clients (overrides config)
    #[arg(long)]
    clients: Option<usize>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    let mut config = match cli.config {
        Some(ref path) => load_config(path)?,
        None => load_default_config(),
    };
    if let Some(moves) = cli.moves {
        config.moves = moves;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(clients) = cli.clients {
        config.clients = clients;
    }
    config.validate()?;

    let (engine, engine_task) = spawn_engine(SandboxEngine::new(config.board_size, &config.players));
    let hub = RelayHub::new(config.relay_capacity);
    let (notice_tx, mut notices) = mpsc::unbounded_channel();

    let mut clients = Vec::with_capacity(config.clients);
    let mut tasks = Vec::with_capacity(config.clients);
    for id in 0..config.clients {
        let session = Session::from_snapshot(engine.fetch().await?, config.relay)?;
        let options = ClientOptions {
            follow_turns: config.follow_turns,
            notices: Some(notice_tx.clone()),
        };
        let (client, task) = spawn_client(id, session, engine.clone(), &hub, options);
        clients.push(client);
        tasks.push(task);
    }
    tracing::info!(
        clients = clients.len(),
        board_size = config.board_size,
        players = config.players.len(),
        "session started"
    );

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut completed = 0u64;

    'moves: for _ in 0..config.moves {
        let Some(player) = engine.current_player().await? else {
            break;
        };
        let client = &clients[player as usize % clients.len()];
        client.gesture(Gesture::SelectPlayer(player))?;

        for _ in 0..config.attempts_per_move {
            let view = client.view().await?;
            let own: Vec<_> = view.available.iter().filter(|p| p.owner == player).collect();
            let Some(piece) = own.choose(&mut rng) else {
                tracing::info!(player, "player has no pieces left");
                break 'moves;
            };
            let empty: Vec<Position> = (0..config.board_size)
                .flat_map(|row| (0..config.board_size).map(move |col| Position::new(row, col)))
                .filter(|&p| view.board.get(p) == Some(None))
                .collect();
            let Some(&position) = empty.choose(&mut rng) else {
                tracing::info!("board is full");
                break 'moves;
            };

            client.gesture(Gesture::SelectPiece(piece.id))?;
            client.gesture(Gesture::HoverEnter(position))?;
            client.gesture(Gesture::Click(position))?;

            match next_placement_notice(&mut notices, client.id()).await? {
                ClientNotice::Accepted(turn) => {
                    completed = turn.sequence;
                    for other in &clients {
                        other.wait_for_sequence(completed, STEP_LIMIT).await?;
                    }
                    continue 'moves;
                }
                ClientNotice::Rejected(reason) => {
                    tracing::debug!(player, %position, reason = %reason, "attempt rejected");
                }
                _ => {}
            }
        }
        tracing::info!(player, "no placement found, stopping");
        break;
    }

    let mut boards = Vec::with_capacity(clients.len());
    for client in &clients {
        let view = client.view().await?;
        println!("client {} after {} turns:", client.id(), view.last_sequence());
        println!("{}", view.board);
        boards.push(view.board);
    }
    let converged = boards.windows(2).all(|w| w[0] == w[1]);
    tracing::info!(turns = completed, converged, "session finished");

    for client in &clients {
        client.shutdown()?;
    }
    for task in tasks {
        task.await?;
    }
    drop(clients);
    drop(engine);
    let engine = engine_task.await?;
    tracing::debug!(turns = engine.turns().len(), "engine stopped");

    if !converged {
        return Err("client boards diverged".into());
    }
    Ok(())
}

/// Wait for the acting client's verdict on its click.
async fn next_placement_notice(
    notices: &mut mpsc::UnboundedReceiver<(usize, ClientNotice)>,
    client: usize,
) -> Result<ClientNotice, RuntimeError> {
    let wait = async {
        while let Some((from, notice)) = notices.recv().await {
            if from != client {
                continue;
            }
            match notice {
                ClientNotice::Accepted(_) | ClientNotice::Rejected(_) => return Ok(notice),
                ClientNotice::Resynced { .. } | ClientNotice::RemoteApplied(_) => {}
                ClientNotice::ResyncFailed(failure) => {
                    tracing::warn!(client, error = %failure, "client could not resync");
                }
            }
        }
        Err(RuntimeError::EngineUnavailable)
    };
    match tokio::time::timeout(STEP_LIMIT, wait).await {
        Ok(result) => result,
        Err(_) => Err(RuntimeError::Timeout(STEP_LIMIT)),
    }
}
