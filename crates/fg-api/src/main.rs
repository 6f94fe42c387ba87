#[tokio::main]
async fn main() {
    if let Err(err) = fg_api::run().await {
        tracing::error!(error = %err, "fg-api failed");
        eprintln!("fg-api failed: {err}");
        std::process::exit(1);
    }
}
