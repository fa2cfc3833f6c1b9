//! SQL Server connection setup.
//!
//! Parses an ADO-style `key=value;` connection string and opens a
//! `tiberius` client over a plain `tokio::net::TcpStream`, bridged
//! through `tokio_util::compat` the way the async ecosystem expects.

use crate::error::{ConvertError, ConvertResult};
use tiberius::{Client, Config};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

pub type SourceClient = Client<Compat<TcpStream>>;

/// Opens a connection to the SQL Server instance described by `conn_str`
/// (spec.md §6): an ADO connection string such as
/// `server=localhost;database=Northwind;user=sa;password=...`.
pub async fn connect(conn_str: &str) -> ConvertResult<SourceClient> {
    let config = Config::from_ado_string(conn_str).map_err(|e| ConvertError::Configuration {
        message: format!("invalid connection string: {e}"),
    })?;

    let tcp = TcpStream::connect(config.get_addr())
        .await
        .map_err(|e| ConvertError::Configuration {
            message: format!("failed to reach SQL Server: {e}"),
        })?;
    tcp.set_nodelay(true)?;

    let client = Client::connect(config, tcp.compat_write())
        .await
        .map_err(ConvertError::from)?;

    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_connection_string_is_a_configuration_error() {
        let err = connect("this is not a connection string").await.unwrap_err();
        assert_eq!(err.category(), "configuration");
    }
}
