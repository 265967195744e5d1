use card_sheet_sync::{SheetSync, SyncConfig};
use log::{error, info};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = SyncConfig::from_env();
    info!(
        "Starting: document {:?}, credentials {}, mode {}",
        config.document_name,
        config.credentials_path.display(),
        config.fetch_mode
    );

    let mut sync = SheetSync::builder().config(config).build()?;
    info!("Connected: {}", sync);

    sync.prime()?;
    if let Err(e) = sync.run() {
        error!("Stopping: {}", e);
        return Err(Box::new(e));
    }
    Ok(())
}
