//! `chorebot state`: inspect or overwrite the chore record directly.

use std::path::Path;

use chorebot::CliResult;
use chorebot_store::ChoreStore;

use crate::StateAction;

pub async fn run(config_path: Option<&Path>, action: StateAction) -> CliResult<()> {
    let config = super::load_config(config_path)?;
    let backend = chorebot::runtime::open_backend(&config).await?;
    let store = ChoreStore::new(backend, config.store.record.clone()).with_offset(config.locale.offset());

    match action {
        StateAction::Show { json } => {
            let state = store.read().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else {
                println!("{}", state.describe());
                if let Some(sent) = state.last_sent {
                    println!("Last reminder: {}", chorebot_core::state::format_timestamp(&sent));
                }
            }
        }
        StateAction::Set { text } => {
            let state = store.update_description(&text).await?;
            println!(
                "Updated {} at {}",
                store.record(),
                chorebot_core::state::format_timestamp(&state.last_updated)
            );
        }
        StateAction::Backups => {
            let backups = store.backups().await?;
            if backups.is_empty() {
                println!("No backups yet.");
            }
            for key in backups {
                println!("{key}");
            }
        }
    }
    Ok(())
}
