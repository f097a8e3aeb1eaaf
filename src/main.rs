use nostr_observatory::cli;

#[tokio::main]
async fn main() {
    let code = cli::handle_cli().await;
    std::process::exit(code);
}
