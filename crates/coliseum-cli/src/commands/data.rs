use clap::Subcommand;
use coliseum_core::storage::HistoryStore;

#[derive(Subcommand)]
pub enum DataAction {
    /// Dump the persisted state as pretty JSON
    Export,
}

pub fn run(action: DataAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        DataAction::Export => {
            let store = HistoryStore::load(&HistoryStore::default_path()?);
            println!("{}", serde_json::to_string_pretty(&store)?);
        }
    }
    Ok(())
}
