//! `VoyagerSD` core -- wire protocol messages and the framed codec shared by
//! the registry server and the discovery client.
//!
//! - **Wire** ([`wire`]): `Registration`, `ServiceQuery`, `ServiceList`,
//!   `HealthRequest`/`HealthResponse`, `Response`, and the `Request`/
//!   `WireResponse` envelopes exchanged over the discovery protocol.
//! - **Codec** ([`codec`]): length-delimited framing plus `MsgPack`
//!   encode/decode for whole wire messages.

pub mod codec;
pub mod wire;

pub use codec::{decode, encode, frame_codec, CodecError};
pub use wire::{
    HealthRequest, HealthResponse, HealthStatus, InstanceId, Registration, Request, Response,
    ServiceList, ServiceQuery, ValidationError, WireError, WireResponse,
};

/// `/services/` is the only key prefix this system reads or writes in the
/// external KV store.
pub const SERVICE_KEY_PREFIX: &str = "/services/";

/// The `VOYAGER_` environment variable prefix used for all configuration
/// options, both server- and client-side.
pub const ENV_PREFIX: &str = "VOYAGER_";

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
