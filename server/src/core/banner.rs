//! Startup banner and URL display

use super::config::{AppConfig, is_all_interfaces};
use super::constants::APP_NAME;

// Label width: "Environment:" is 12 chars, pad to 14 for alignment
const W: usize = 14;

/// Print the startup banner with URLs and tracing backend details
pub fn print_banner(config: &AppConfig) {
    let host = config.server.host.as_str();
    let port = config.server.port;

    // Use localhost for display when binding to all interfaces
    let display_host = if is_all_interfaces(host) {
        "localhost"
    } else {
        host
    };

    println!();
    println!(
        "  \x1b[1m\x1b[36m{}\x1b[0m \x1b[90mv{}\x1b[0m",
        APP_NAME,
        env!("CARGO_PKG_VERSION")
    );
    println!();

    let local_url = format!("http://{}:{}", display_host, port);
    println!(
        "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
        "Pipeline:",
        terminal_link(&local_url)
    );

    if is_all_interfaces(host) {
        if let Ok(interfaces) = local_ip_address::list_afinet_netifas() {
            for (_, ip) in interfaces
                .iter()
                .filter(|(_, ip)| ip.is_ipv4() && !ip.is_loopback())
            {
                let network_url = format!("http://{}:{}", ip, port);
                println!(
                    "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
                    "Network:",
                    terminal_link(&network_url)
                );
            }
        }
    } else if host == "127.0.0.1" || host == "localhost" {
        println!(
            "  \x1b[90m➜  {:<W$} use --host 0.0.0.0 to expose\x1b[0m",
            "Network:"
        );
    }

    println!(
        "  \x1b[33m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
        "Service:", config.service.name
    );
    println!(
        "  \x1b[33m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
        "Environment:", config.service.environment
    );
    println!(
        "  \x1b[35m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
        "APM backend:", config.apm.backend
    );
    if let Some(url) = &config.apm.server_url {
        println!(
            "  \x1b[35m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
            "APM server:",
            terminal_link(url)
        );
    }
    println!(
        "  \x1b[90m➜  {:<W$} {}\x1b[0m",
        "Secret token:",
        token_status(config.apm.secret_token.is_some())
    );

    println!();
}

fn token_status(configured: bool) -> &'static str {
    if configured { "configured" } else { "not set" }
}

/// Clickable OSC 8 hyperlink where the terminal supports it, colored text otherwise
fn terminal_link(url: &str) -> String {
    if supports_hyperlinks::on(supports_hyperlinks::Stream::Stdout) {
        format!("\x1b]8;;{}\x07\x1b[36m{}\x1b[0m\x1b]8;;\x07", url, url)
    } else {
        format!("\x1b[36m{}\x1b[0m", url)
    }
}
