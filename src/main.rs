use clap::Parser;
use ledger_node::{
    Command, Config, Dialer, InputArg, LedgerError, Node, Opt, OutputArg, PrivateKey, Server,
    TcpDialer, Transaction, TxInput, TxOutput,
};
use log::{error, info, warn, LevelFilter};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

// Sender label for transactions submitted from the command line.
const CLI_ORIGIN: &str = "cli";

fn main() {
    env_logger::builder().filter_level(LevelFilter::Info).init();

    let opt = Opt::parse();
    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Start {
            config,
            listen,
            peers,
            validator_seed,
            data_dir,
        } => {
            let config = load_config(config, listen, peers, validator_seed, data_dir)?;
            start_node(config)?;
        }
        Command::Keygen => {
            let key = PrivateKey::generate();
            println!("Seed: {}", key.seed_string());
            println!("Public key: {}", key.public());
            println!("Address: {}", key.public().address());
        }
        Command::Address { seed } => {
            let key = PrivateKey::from_seed_str(&seed)?;
            println!("{}", key.public().address());
        }
        Command::Send {
            node,
            seed,
            inputs,
            outputs,
        } => {
            let key = PrivateKey::from_seed_str(&seed)?;
            let tx = build_transaction(&key, &inputs, &outputs);
            let client = TcpDialer::new(Config::default().dial_timeout()).dial(&node)?;
            client.handle_transaction(CLI_ORIGIN, CLI_ORIGIN, &tx)?;
            println!("Submitted transaction {}", tx.hash_hex());
        }
    }
    Ok(())
}

/// File first, then environment, then command-line flags.
fn load_config(
    path: Option<PathBuf>,
    listen: Option<String>,
    peers: Vec<String>,
    validator_seed: Option<String>,
    data_dir: Option<PathBuf>,
) -> Result<Config, LedgerError> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env();
    if let Some(listen) = listen {
        config.listen_addr = listen;
    }
    if !peers.is_empty() {
        config.bootstrap_peers = peers;
    }
    if let Some(seed) = validator_seed {
        config.private_key_seed = Some(seed);
        config.is_validator = true;
    }
    if data_dir.is_some() {
        config.data_dir = data_dir;
    }
    config.validate()?;
    Ok(config)
}

fn start_node(config: Config) -> Result<(), LedgerError> {
    let dialer = Arc::new(TcpDialer::new(config.dial_timeout()));
    let node = Node::from_config(&config, dialer)?;
    info!(
        "Starting node {} at height {}",
        node.listen_addr(),
        node.chain().height()
    );

    let server = Server::bind(&config.listen_addr)?;
    let server_thread = server.spawn(Arc::clone(&node))?;

    if let Err(e) = node.bootstrap(&config.bootstrap_peers) {
        warn!("Bootstrap incomplete: {e}");
    }

    let _validator = if node.is_validator() {
        Some(node.start_validator()?)
    } else {
        None
    };

    server_thread
        .join()
        .map_err(|_| LedgerError::Network("Server thread panicked".to_string()))
}

fn build_transaction(key: &PrivateKey, inputs: &[InputArg], outputs: &[OutputArg]) -> Transaction {
    let public_key = key.public().bytes();
    let inputs = inputs
        .iter()
        .map(|input| TxInput::new(&input.tx_hash, input.index, public_key.clone()))
        .collect();
    let outputs = outputs
        .iter()
        .map(|output| TxOutput::new(output.amount, &output.address))
        .collect();
    let mut tx = Transaction::new(inputs, outputs);
    tx.sign_inputs(key);
    tx
}
