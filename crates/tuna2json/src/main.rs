use tuna2json::runtime::{boot, run};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    boot::init_logging();
    let pipeline = boot::boot()?;
    run::run(pipeline).await
}
