use backend_api::{run_server, AppState, FileProjectionRepository};
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Environment variables with sane defaults
    let data_path = env::var("DATA_PATH").unwrap_or_else(|_| "data/projection.json".to_string());
    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .unwrap_or(3000);
    let api_token = env::var("API_TOKEN").ok().filter(|t| !t.is_empty());

    println!("Projection API Server");
    println!("=====================");
    println!("Data file: {}", data_path);
    println!("Listening on: {}:{}", host, port);
    if api_token.is_none() {
        println!("[WARN] API_TOKEN not set; any bearer token is accepted for writes");
    }
    println!();

    let state = Arc::new(AppState {
        repo: Arc::new(FileProjectionRepository::new(data_path)),
        api_token,
    });

    run_server(state, &host, port).await?;

    Ok(())
}
