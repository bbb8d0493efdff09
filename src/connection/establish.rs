use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::connection::{
    auth, CloseSignal, ConnectionCore, ConnectionInner, ConnectionState, MySqlConnection,
    MySqlStream,
};
use crate::error::{err_packet, Error, Result};
use crate::net::Socket;
use crate::options::ConnectOptions;
use crate::protocol::auth_plugin::AuthPlugin;
use crate::protocol::connect::{
    AuthSwitchRequest, ExtraAuthData, Handshake, HandshakeResponse, SslRequest,
};
use crate::protocol::{Capabilities, MAX_ADVERTISED_PACKET_SIZE};

// https://dev.mysql.com/doc/internals/en/connection-phase.html
//
// the connection phase performs these tasks:
//  - exchange the capabilities of client and server
//  - set up an SSL communication channel if requested
//  - authenticate the client against the server

impl MySqlConnection {
    /// Opens a connection from a `mysql://` URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = url.parse()?;
        Self::connect_with(&options).await
    }

    /// Opens a connection with explicit options.
    ///
    /// The whole attempt, from the socket connect through the end of
    /// authentication, is bounded by the configured connect timeout.
    pub async fn connect_with(options: &ConnectOptions) -> Result<Self> {
        let timeout = options.connect_timeout;

        let core = tokio::time::timeout(timeout, establish(options))
            .await
            .map_err(|_| Error::Timeout(timeout))??;

        let close_signal = Arc::clone(&core.close_signal);

        let connection = MySqlConnection {
            inner: Arc::new(ConnectionInner {
                core: Arc::new(Mutex::new(core)),
                in_transaction: AtomicBool::new(false),
                close_signal,
                options: options.clone(),
            }),
        };

        connection.install_collation().await?;

        Ok(connection)
    }

    // pin the connection charset so that strings survive the round
    // trip regardless of the server default
    async fn install_collation(&self) -> Result<()> {
        let sql = format!(
            "SET @@collation_connection = {}, \
             @@character_set_client = utf8mb4, \
             @@character_set_connection = utf8mb4, \
             @@character_set_results = utf8mb4",
            self.inner.options.collation
        );

        self.execute(&sql).await?;

        Ok(())
    }
}

async fn establish(options: &ConnectOptions) -> Result<ConnectionCore> {
    let socket = match &options.socket {
        Some(path) => Socket::connect_uds(path).await?,
        None => Socket::connect_tcp(&options.host, options.port).await?,
    };

    let mut capabilities = Capabilities::BASE;

    if options.database.is_some() {
        capabilities |= Capabilities::CONNECT_WITH_DB;
    }

    if options.require_tls {
        capabilities |= Capabilities::SSL;
    }

    let mut core = ConnectionCore::new(
        MySqlStream::new(socket, capabilities),
        CloseSignal::new(),
    );

    match handshake(&mut core, options).await {
        Ok(()) => Ok(core),

        Err(e) => {
            core.mark_closed();
            Err(e)
        }
    }
}

async fn handshake(core: &mut ConnectionCore, options: &ConnectOptions) -> Result<()> {
    core.state = ConnectionState::WaitInitialHandshake;

    let handshake: Handshake = core.stream.recv_packet().await?.decode_with(())?;

    tracing::debug!(
        server_version = %handshake.server_version,
        connection_id = handshake.connection_id,
        "received server handshake"
    );

    let server = handshake.capabilities;

    if !server.contains(Capabilities::PROTOCOL_41) {
        return Err(Error::Unsupported(
            "server does not speak the 4.1 protocol".into(),
        ));
    }

    if !server.contains(Capabilities::SECURE_CONNECTION) {
        return Err(Error::Unsupported(
            "server requires the pre-4.1 authentication exchange".into(),
        ));
    }

    if options.require_tls && !server.contains(Capabilities::SSL) {
        return Err(Error::Unsupported("server does not support TLS".into()));
    }

    // advertise only what both sides understand
    core.stream.capabilities &= server;

    if options.require_tls {
        // the SSL request takes the sequence id slot right after the
        // server handshake; the full response then follows encrypted
        core.stream.write_packet(SslRequest {
            max_packet_size: MAX_ADVERTISED_PACKET_SIZE,
            charset: options.charset,
        })?;
        core.stream.flush().await?;

        core.stream.upgrade_tls(&options.host).await?;
    }

    let plugin = handshake
        .auth_plugin
        .unwrap_or(AuthPlugin::MySqlNativePassword);

    let password = options.password.as_deref().unwrap_or_default();
    let auth_response = auth::scramble(plugin, password, &handshake.auth_plugin_data);

    core.stream.write_packet(HandshakeResponse {
        max_packet_size: MAX_ADVERTISED_PACKET_SIZE,
        charset: options.charset,
        username: &options.username,
        database: options.database.as_deref(),
        auth_plugin: plugin,
        auth_response: &auth_response,
    })?;
    core.stream.flush().await?;

    core.state = ConnectionState::HandshakeResponseSent;

    authenticate(core, plugin, password).await?;

    core.state = ConnectionState::Established;

    tracing::debug!("connection established");

    Ok(())
}

/// Drive the tail of the authentication exchange: OK, an auth-switch
/// to `mysql_native_password`, or the `caching_sha2_password`
/// fast/full continuation.
async fn authenticate(
    core: &mut ConnectionCore,
    mut plugin: AuthPlugin,
    password: &str,
) -> Result<()> {
    let mut switched = false;

    loop {
        let packet = core.stream.recv_packet().await?;

        match packet[0] {
            0x00 => {
                // authenticated
                return Ok(());
            }

            // an auth-switch request shares the 0xfe lead with EOF
            // but carries a longer payload
            0xfe if packet.len() >= 9 => {
                if switched {
                    return Err(err_packet!("server asked to switch auth plugins twice"));
                }
                switched = true;

                let switch: AuthSwitchRequest = packet.decode_with(())?;

                if switch.plugin != AuthPlugin::MySqlNativePassword {
                    return Err(Error::Unsupported(format!(
                        "server requested a switch to '{}'",
                        switch.plugin.name()
                    )));
                }

                plugin = switch.plugin;

                let response = auth::scramble(plugin, password, &switch.data);

                // continuation: the sequence id keeps counting
                core.stream.write_packet(&response[..])?;
                core.stream.flush().await?;
            }

            0x01 => {
                let extra: ExtraAuthData = packet.decode_with(())?;

                if plugin != AuthPlugin::CachingSha2Password {
                    return Err(err_packet!(
                        "unexpected extra auth data for '{}'",
                        plugin.name()
                    ));
                }

                match extra.data.first() {
                    // fast path: the server found the account in its
                    // auth cache; an OK follows
                    Some(0x03) => {}

                    // full auth: the password itself must travel,
                    // which is only acceptable over TLS
                    Some(0x04) => {
                        if !core.stream.is_tls() {
                            return Err(Error::UnexpectedState(
                                "caching_sha2_password full authentication requires TLS".into(),
                            ));
                        }

                        let mut cleartext = password.as_bytes().to_vec();
                        cleartext.push(0);

                        core.stream.write_packet(&cleartext[..])?;
                        core.stream.flush().await?;
                    }

                    status => {
                        return Err(Error::Unsupported(format!(
                            "unknown caching_sha2_password status {status:?}"
                        )));
                    }
                }
            }

            tag => {
                return Err(err_packet!(
                    "unexpected packet 0x{tag:02x} during authentication"
                ));
            }
        }
    }
}
