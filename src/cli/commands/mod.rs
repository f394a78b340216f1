pub mod collectors;

use clap::{Arg, ColorChoice, Command, value_parser};

#[must_use]
pub fn new() -> Command {
    let command = Command::new("pgbouncer_exporter")
        .about("Prometheus exporter for PgBouncer")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .env("PGBOUNCER_EXPORTER_PORT")
                .default_value("9127")
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new("listen")
                .long("listen")
                .help("Address to bind to (default: auto-detect, IPv6 with IPv4 fallback)")
                .env("PGBOUNCER_EXPORTER_LISTEN"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .help("PgBouncer host")
                .env("PGBOUNCER_EXPORTER_HOST")
                .default_value("localhost"),
        )
        .arg(
            Arg::new("admin-port")
                .long("admin-port")
                .help("PgBouncer listen port")
                .env("PGBOUNCER_EXPORTER_ADMIN_PORT")
                .default_value("6432")
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new("user")
                .long("user")
                .help("Admin console user (must be in stats_users or admin_users)")
                .env("PGBOUNCER_EXPORTER_USER")
                .default_value("stats"),
        )
        .arg(
            Arg::new("password")
                .long("password")
                .help("Admin console password")
                .env("PGBOUNCER_EXPORTER_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("sslmode")
                .long("sslmode")
                .help("TLS mode for the admin connection")
                .env("PGBOUNCER_EXPORTER_SSLMODE")
                .default_value("disable"),
        )
        .arg(
            Arg::new("databases")
                .long("databases")
                .help("Comma-separated list of databases to track (default: all)")
                .env("PGBOUNCER_EXPORTER_DATABASES")
                .value_delimiter(','),
        );

    collectors::add_collectors_args(command)
}
