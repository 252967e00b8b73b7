use anyhow::Result;
use bookshelf::cli::{actions, start};

// Main function
#[tokio::main]
async fn main() -> Result<()> {
    // Start the program
    let action = start()?;

    // Handle the action
    actions::server::handle(action).await?;

    Ok(())
}
