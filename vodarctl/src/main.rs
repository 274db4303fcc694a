use clap::Parser;

fn main() {
    let cli = vodarctl::Cli::parse();
    if let Err(err) = vodarctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
