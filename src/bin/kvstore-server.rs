use std::net::Ipv4Addr;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use kvstore_core::Server;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// TCP port to listen on.
    #[arg(short, long, default_value_t = 1234)]
    port: u16,

    /// Address to bind the listening socket to.
    #[arg(short, long, default_value_t = Ipv4Addr::LOCALHOST)]
    bind: Ipv4Addr,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let mut server = match Server::bind(args.bind, args.port) {
        Ok(s) => s,
        Err(e) => {
            error!("failed to bind {}:{}: {}", args.bind, args.port, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run() {
        error!("server loop exited: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
