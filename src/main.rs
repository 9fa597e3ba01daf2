#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = registro_rust::run().await {
        eprintln!("registro-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
