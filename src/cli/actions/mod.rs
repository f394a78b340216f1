pub mod run;

use crate::admin::AdminConfig;

#[derive(Debug)]
pub enum Action {
    Run {
        port: u16,
        listen: Option<String>,
        admin: AdminConfig,
        databases: Vec<String>,
        collectors: Vec<String>,
    },
}
