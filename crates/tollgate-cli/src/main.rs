// Tollgate CLI Entry Point

use tollgate_cli::router::CommandRouter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    match CommandRouter::route().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("tollgate: {:#}", e);
            std::process::exit(1);
        }
    }
}
