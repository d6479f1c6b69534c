use std::path::Path;

use worldsim_core::config::ServerConfig;

/// Applies CLI-flag overrides on top of a file-loaded [`ServerConfig`].
/// Flags take priority over the config file, which takes priority over
/// built-in defaults.
pub struct CliOverrides {
    pub port: Option<u16>,
    pub tick_rate: Option<u32>,
    pub max_clients: Option<usize>,
    pub pvp: Option<bool>,
}

pub fn load(config_path: &Path, overrides: CliOverrides) -> anyhow::Result<ServerConfig> {
    let mut config = ServerConfig::load_from_file(config_path)?;

    if let Some(port) = overrides.port {
        config.port = port;
    }
    if let Some(tick_rate) = overrides.tick_rate {
        config.tick_rate = tick_rate;
    }
    if let Some(max_clients) = overrides.max_clients {
        config.max_players = max_clients;
    }
    if let Some(pvp) = overrides.pvp {
        config.pvp_enabled = pvp;
    }

    if config.tick_rate == 0 {
        anyhow::bail!("tick_rate must be non-zero");
    }
    if config.max_players == 0 {
        anyhow::bail!("max_players must be non-zero");
    }

    Ok(config)
}

pub fn bind_addr(bind: &str, port: u16) -> String {
    format!("{bind}:{port}")
}
