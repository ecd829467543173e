#[tokio::main]
async fn main() {
    if let Err(e) = smartfarm_lib::run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
