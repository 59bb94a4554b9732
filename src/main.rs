//! authbridge CLI
//!
//! Run with: cargo run -- serve --private-key-file key.pem

#[tokio::main]
async fn main() {
    // Load .env before reading configuration ($env: references, key paths)
    let _ = dotenvy::dotenv();

    if let Err(e) = authbridge::cli::run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
