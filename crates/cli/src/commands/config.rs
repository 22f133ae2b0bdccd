use innkeep_core::config::{AppConfig, LoadOptions};

/// Print the effective configuration after defaults, file, and
/// environment are merged. Secrets are reported by presence only.
pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("configuration issue: {error}"),
    };

    let mut lines = Vec::new();
    lines.push("[database]".to_string());
    lines.push(format!("url = {}", config.database.url));
    lines.push(format!("max_connections = {}", config.database.max_connections));
    lines.push(format!("timeout_secs = {}", config.database.timeout_secs));

    lines.push(String::new());
    lines.push("[llm]".to_string());
    lines.push(format!("provider = {:?}", config.llm.provider));
    lines.push(format!(
        "api_key = {}",
        if config.llm.api_key.is_some() { "<set>" } else { "<unset>" }
    ));
    lines.push(format!("base_url = {}", config.llm.base_url.as_deref().unwrap_or("<default>")));
    lines.push(format!("model = {}", config.llm.model));
    lines.push(format!("timeout_secs = {}", config.llm.timeout_secs));
    lines.push(format!("max_retries = {}", config.llm.max_retries));

    lines.push(String::new());
    lines.push("[server]".to_string());
    lines.push(format!("bind_address = {}", config.server.bind_address));
    lines.push(format!("port = {}", config.server.port));
    lines.push(format!("health_check_port = {}", config.server.health_check_port));
    lines.push(format!("graceful_shutdown_secs = {}", config.server.graceful_shutdown_secs));

    lines.push(String::new());
    lines.push("[knowledge]".to_string());
    lines.push(format!("corpus_path = {}", config.knowledge.corpus_path.display()));

    lines.push(String::new());
    lines.push("[logging]".to_string());
    lines.push(format!("level = {}", config.logging.level));
    lines.push(format!("format = {:?}", config.logging.format));

    lines.join("\n")
}
