//! stockpad application entry point.
//!
//! Bootstraps the server:
//! 1. Load configuration from environment
//! 2. Connect to Redis
//! 3. Build router with API routes, body limit, CORS and security headers
//! 4. Start Axum server
//!
//! Also supports a `sign` subcommand that signs a message with a local key,
//! for driving the login flow from curl without a browser wallet.

use stockpad::{auth::middleware::AppState, auth::verify::sign_personal_message, config::Config, routes};
use std::net::SocketAddr;
use std::sync::Arc;

fn print_sign_usage() {
    eprintln!("Usage: stockpad sign <private-key-hex> <message>");
    eprintln!();
    eprintln!("Sign a login nonce the way a wallet's personal_sign does.");
    eprintln!();
    eprintln!("Example:");
    eprintln!("  NONCE=$(curl -s -XPOST localhost:3000/auth/nonce \\");
    eprintln!("      -H 'content-type: application/json' -d '{{\"address\":\"0x...\"}}' | jq -r .nonce)");
    eprintln!("  stockpad sign 0x<key> \"$NONCE\"");
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && args[1] == "sign" {
        if args.len() != 4 {
            print_sign_usage();
            std::process::exit(1);
        }

        match sign_personal_message(&args[2], &args[3]) {
            Ok((address, signature)) => {
                println!("address:   {}", address);
                println!("signature: {}", signature);
            }
            Err(e) => {
                eprintln!("Error signing message: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    // RUST_LOG controls verbosity
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env().expect("Failed to load config");
    tracing::info!("Starting stockpad on {}", config.bind_addr);
    tracing::debug!(?config, "Loaded configuration");

    let redis_client = redis::Client::open(config.redis_url.as_str()).expect("Invalid Redis URL");

    // Fail fast if Redis is unreachable
    let _con = redis_client
        .get_multiplexed_async_connection()
        .await
        .expect("Failed to connect to Redis");

    let state = AppState {
        redis: redis_client,
        config: Arc::new(config.clone()),
    };

    let app = routes::app(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind");
    tracing::info!("Listening on {}", config.bind_addr);

    // ConnectInfo feeds the per-IP auth rate limit
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
