use crate::{
    admin::AdminConfig,
    cli::actions::Action,
    collectors::{COLLECTOR_NAMES, Collector, all_factories},
};
use anyhow::{Result, anyhow};
use clap::ArgMatches;
use secrecy::SecretString;

/// # Errors
///
/// Returns an error if required arguments are missing
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>("port")
        .copied()
        .ok_or_else(|| anyhow!("Port is required. Please provide it using the --port flag."))?;

    let listen = matches
        .get_one::<String>("listen")
        .map(std::string::ToString::to_string);

    let host = matches
        .get_one::<String>("host")
        .cloned()
        .ok_or_else(|| anyhow!("Host is required. Please provide it using the --host flag."))?;

    let admin_port = matches.get_one::<u16>("admin-port").copied().ok_or_else(|| {
        anyhow!("Admin port is required. Please provide it using the --admin-port flag.")
    })?;

    let user = matches
        .get_one::<String>("user")
        .cloned()
        .ok_or_else(|| anyhow!("User is required. Please provide it using the --user flag."))?;

    let password = matches
        .get_one::<String>("password")
        .map(|p| SecretString::from(p.clone()));

    let sslmode = matches
        .get_one::<String>("sslmode")
        .cloned()
        .ok_or_else(|| anyhow!("sslmode is required. Please provide it using the --sslmode flag."))?;

    let databases: Vec<String> = matches
        .get_many::<String>("databases")
        .map(|vals| {
            vals.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Ok(Action::Run {
        port,
        listen,
        admin: AdminConfig {
            host,
            port: admin_port,
            user,
            password,
            sslmode,
        },
        databases,
        collectors: get_enabled_collectors(matches),
    })
}

#[must_use]
pub fn get_enabled_collectors(matches: &ArgMatches) -> Vec<String> {
    let factories = all_factories();

    COLLECTOR_NAMES
        .iter()
        .filter(|&name| {
            let enable_flag = format!("collector.{name}");
            let disable_flag = format!("no-collector.{name}");

            // If explicitly disabled, skip it
            if matches.get_flag(&disable_flag) {
                return false;
            }

            // If explicitly enabled, include it
            if matches.get_flag(&enable_flag) {
                return true;
            }

            // Otherwise, check the collector's default setting
            factories.get(name).is_some_and(|factory| {
                let collector = factory();
                collector.enabled_by_default()
            })
        })
        .map(|&name| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn test_get_enabled_collectors_defaults() {
        let command = commands::new();
        let matches = command.get_matches_from(vec!["pgbouncer_exporter"]);
        let enabled = get_enabled_collectors(&matches);

        assert!(enabled.contains(&"stats".to_string()));
        assert!(enabled.contains(&"pools".to_string()));
        assert!(enabled.contains(&"version".to_string()));
        assert!(!enabled.contains(&"exporter".to_string()));
    }

    #[test]
    fn test_get_enabled_collectors_explicit_enable() {
        let command = commands::new();
        let matches =
            command.get_matches_from(vec!["pgbouncer_exporter", "--collector.exporter"]);
        let enabled = get_enabled_collectors(&matches);

        assert!(enabled.contains(&"stats".to_string()));
        assert!(enabled.contains(&"exporter".to_string()));
    }

    #[test]
    fn test_get_enabled_collectors_explicit_disable() {
        let command = commands::new();
        let matches = command.get_matches_from(vec!["pgbouncer_exporter", "--no-collector.pools"]);
        let enabled = get_enabled_collectors(&matches);

        assert!(!enabled.contains(&"pools".to_string()));
        assert!(enabled.contains(&"stats".to_string()));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_handler_builds_admin_config() {
        let command = commands::new();
        let matches = command.get_matches_from(vec![
            "pgbouncer_exporter",
            "--host",
            "bouncer.internal",
            "--admin-port",
            "6543",
            "--user",
            "monitor",
            "--databases",
            "appdb, reports,",
        ]);

        let action = handler(&matches).unwrap();
        let Action::Run {
            port,
            listen,
            admin,
            databases,
            collectors,
        } = action;

        assert_eq!(port, 9127);
        assert!(listen.is_none());
        assert_eq!(admin.host, "bouncer.internal");
        assert_eq!(admin.port, 6543);
        assert_eq!(admin.user, "monitor");
        assert!(admin.password.is_none());
        assert_eq!(admin.sslmode, "disable");
        assert_eq!(databases, vec!["appdb".to_string(), "reports".to_string()]);
        assert!(collectors.contains(&"stats".to_string()));
    }
}
