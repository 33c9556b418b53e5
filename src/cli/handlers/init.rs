use std::path::Path;

use crate::cli::commands::{ConfigAction, ConfigCmd, InitArgs};
use crate::cli::output::{config_to_json, mask_secret};
use crate::io::config_io;

pub fn cmd_init(config_path: &Path, args: InitArgs) -> Result<(), Box<dyn std::error::Error>> {
    config_io::init_config(config_path, args.force)?;
    println!("Wrote {}", config_path.display());
    println!("Next: `tim config set store.url <url>` and `tim config set store.anon_key <key>`");
    Ok(())
}

pub fn cmd_config(config_path: &Path, cmd: ConfigCmd, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    match cmd.action {
        ConfigAction::Show => {
            let config = config_io::effective_config(config_path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config_to_json(&config))?);
                return Ok(());
            }
            println!("# {}", config_path.display());
            println!("store.url = {}", config.store.url);
            println!("store.anon_key = {}", mask_secret(&config.store.anon_key));
            println!("store.table = {}", config.store.table);
            println!("generator.proxy_url = {}", config.generator.proxy_url);
            println!("list.sort = {}", config.list.sort);
            println!("server.bind = {}", config.server.bind);
            println!("server.model = {}", config.server.model);
            println!("server.upstream_url = {}", config.server.upstream_url);
            Ok(())
        }
        ConfigAction::Set { key, value } => {
            let mut doc = config_io::read_document(config_path)?;
            config_io::set_value(&mut doc, &key, &value)?;
            config_io::write_document(config_path, &doc)?;
            // the written file must still load
            config_io::load_config(config_path)?;
            println!("{} updated", key);
            Ok(())
        }
    }
}
