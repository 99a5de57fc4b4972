use std::net::SocketAddrV4;

use chrono_tz::Tz;

/// Server configs
#[derive(Debug)]
pub(crate) struct ServerConfig {
    pub addr: SocketAddrV4,
    pub db_read_conn_str: String,
    pub db_write_conn_str: String,
    /// restaurant operating timezone, used for all settlement day cuts
    pub timezone: Tz,
}

impl ServerConfig {
    pub fn new(
        addr: SocketAddrV4,
        db_read_conn_str: String,
        db_write_conn_str: String,
        timezone: Tz,
    ) -> Self {
        Self {
            addr,
            db_read_conn_str,
            db_write_conn_str,
            timezone,
        }
    }
}
