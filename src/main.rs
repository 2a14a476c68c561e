use clap::Parser;
use condgate::cli::{
    handle_check, handle_config_init, handle_route, run_watch, Cli, Commands, ConfigCommands,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check(args) => handle_check(&args).map(|output| println!("{}", output)),
        Commands::Route(args) => handle_route(&args).map(|output| println!("{}", output)),
        Commands::Watch(args) => run_watch(args).await,
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init(args) => handle_config_init(&args),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
