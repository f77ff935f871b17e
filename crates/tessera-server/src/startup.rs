//! Server startup utilities.

use crate::app::App;
use tessera_cache::CacheName;
use tracing::info;

/// Prints the startup banner.
pub fn print_banner() {
    info!(r#"
  ______
 /_  __/__  ______________  _________ _
  / / / _ \/ ___/ ___/ _ \/ ___/ __ `/
 / / /  __(__  |__  )  __/ /  / /_/ /
/_/  \___/____/____/\___/_/   \__,_/

              Cache and Session Layer
    "#);
}

/// Prints the node identity and the topology of every cache.
pub fn print_startup_info(app: &App) {
    let connection = app.connection();
    let container = connection.container();
    let separator = "=".repeat(60);

    info!("{}", separator);
    info!("Node:        {}", connection.node_name());
    info!("Container:   {}", container.name());
    info!("Managed:     {}", connection.is_container_managed());
    info!("Clustered:   {}", container.settings().clustered);
    info!("Members:     {}", container.members().join(", "));
    for name in CacheName::ALL {
        match container.cache_configuration(name) {
            Some(topology) => info!(
                "{:<16} {} {} owners={} segments={}",
                name.as_str(), topology.mode, topology.synchronicity, topology.owners, topology.segments
            ),
            None => info!("{:<16} undefined", name.as_str()),
        }
    }
    info!(
        "Sweeping:    {} every {}s",
        app.sweeper()
            .watched_realms()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", "),
        app.config().sessions.sweep_interval_secs
    );
    info!("{}", separator);
}
