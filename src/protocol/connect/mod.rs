mod auth_switch;
mod extra_auth;
mod handshake;
mod handshake_response;
mod ssl_request;

pub(crate) use auth_switch::AuthSwitchRequest;
pub(crate) use extra_auth::ExtraAuthData;
pub(crate) use handshake::Handshake;
pub(crate) use handshake_response::HandshakeResponse;
pub(crate) use ssl_request::SslRequest;
