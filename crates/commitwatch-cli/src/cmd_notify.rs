use clap::Subcommand;
use commitwatch_notify::NotifyConfig;
use commitwatch_store::WatchPaths;

#[derive(Subcommand)]
pub enum NotifyCmd {
    /// Send test notification to all configured channels
    Test,
    /// Show configured notification channels
    Status,
}

pub fn run(cmd: NotifyCmd, paths: &WatchPaths) -> anyhow::Result<()> {
    let config = NotifyConfig::load(paths);

    match cmd {
        NotifyCmd::Test => run_test(&config, paths),
        NotifyCmd::Status => run_status(&config),
    }
}

fn run_test(config: &NotifyConfig, paths: &WatchPaths) -> anyhow::Result<()> {
    if config.channels.is_empty() {
        println!("No notification channels configured.");
        println!();
        println!(
            "Add channels in {} under \"notify_channels\", e.g.:",
            paths.config_json.display()
        );
        println!(
            "  \"notify_channels\": [{{\"type\":\"discord\",\"webhook_url\":\"https://discord.com/api/webhooks/...\"}}]"
        );
        return Ok(());
    }

    println!(
        "Sending test notification to {} channel(s)...",
        config.channels.len()
    );
    for (name, result) in commitwatch_notify::test_channels(config) {
        match result {
            Ok(()) => println!("  OK  {name}"),
            Err(e) => println!("  ERR {name}: {e}"),
        }
    }
    Ok(())
}

fn run_status(config: &NotifyConfig) -> anyhow::Result<()> {
    if config.channels.is_empty() {
        println!("No notification channels configured.");
        return Ok(());
    }

    println!("{} channel(s) configured:", config.channels.len());
    for ch in &config.channels {
        println!("  - {}", ch.display_name());
    }
    Ok(())
}
